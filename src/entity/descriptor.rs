//! Entity descriptors: what an entity is made of before anything is fetched.
//!
//! Descriptors arrive as JSON objects. They are first read into a loose
//! [`RawDescriptor`] and then converted into the closed [`EntityDescriptor`]
//! enum; that conversion is the only place where the `kind` string is looked
//! at, and an unknown kind is rejected there.

use serde::Deserialize;

use crate::errors::{LoadError, Result};

/// A descriptor exactly as it appears on disk.
///
/// Field names follow the documented format; the aliases accept the older
/// `type` / `vertexShader` / `fragmentShader` / `textureSrc` spelling.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawDescriptor {
    #[serde(alias = "type")]
    pub kind: String,
    #[serde(alias = "vertexShader")]
    pub vertex_shader_path: String,
    #[serde(alias = "fragmentShader")]
    pub fragment_shader_path: String,
    pub vertices: Vec<f32>,
    pub colors: Option<Vec<f32>>,
    #[serde(alias = "textureSrc")]
    pub texture_image_path: Option<String>,
    pub texture_coords: Option<Vec<f32>>,
    pub elements: Option<Vec<u16>>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ColoredDescriptor {
    pub vertex_shader_path: String,
    pub fragment_shader_path: String,
    /// Flat x, y, z triplets.
    pub vertices: Vec<f32>,
    /// Flat r, g, b or r, g, b, a per vertex.
    pub colors: Vec<f32>,
    pub elements: Option<Vec<u16>>,
}

impl ColoredDescriptor {
    pub fn vertex_count(&self) -> usize {
        self.vertices.len() / 3
    }

    /// Colour components per vertex, 3 or 4 for a valid descriptor.
    pub fn color_components(&self) -> u32 {
        match self.vertex_count() {
            0 => 0,
            n => (self.colors.len() / n) as u32,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct TexturedDescriptor {
    pub vertex_shader_path: String,
    pub fragment_shader_path: String,
    pub vertices: Vec<f32>,
    pub texture_image_path: String,
    /// Flat u, v per vertex.
    pub texture_coords: Vec<f32>,
    /// Textured entities are always drawn indexed.
    pub elements: Vec<u16>,
}

impl TexturedDescriptor {
    pub fn vertex_count(&self) -> usize {
        self.vertices.len() / 3
    }
}

/// A validated-shape descriptor for one of the two entity variants.
#[derive(Clone, Debug, PartialEq)]
pub enum EntityDescriptor {
    Colored(ColoredDescriptor),
    Textured(TexturedDescriptor),
}

impl EntityDescriptor {
    /// Parse a JSON descriptor. `path` is only used in error messages.
    pub fn from_json(path: &str, text: &str) -> Result<Self> {
        let raw: RawDescriptor = serde_json::from_str(text).map_err(|source| LoadError::Parse {
            path: path.to_string(),
            source,
        })?;
        raw.try_into()
    }

    pub fn kind(&self) -> &'static str {
        match self {
            EntityDescriptor::Colored(_) => "colored",
            EntityDescriptor::Textured(_) => "textured",
        }
    }

    pub fn vertex_shader_path(&self) -> &str {
        match self {
            EntityDescriptor::Colored(d) => &d.vertex_shader_path,
            EntityDescriptor::Textured(d) => &d.vertex_shader_path,
        }
    }

    pub fn fragment_shader_path(&self) -> &str {
        match self {
            EntityDescriptor::Colored(d) => &d.fragment_shader_path,
            EntityDescriptor::Textured(d) => &d.fragment_shader_path,
        }
    }

    /// Check that the arrays agree with each other.
    ///
    /// Runs before anything is fetched, so a malformed descriptor never costs
    /// a request or a device allocation.
    pub fn validate(&self) -> Result<()> {
        let (vertices, elements) = match self {
            EntityDescriptor::Colored(d) => (&d.vertices, d.elements.as_deref()),
            EntityDescriptor::Textured(d) => (&d.vertices, Some(d.elements.as_slice())),
        };
        if vertices.is_empty() || vertices.len() % 3 != 0 {
            return Err(invalid(format!(
                "expected a non-empty list of x, y, z triplets, got {} floats",
                vertices.len()
            )));
        }
        let vertex_count = vertices.len() / 3;

        match self {
            EntityDescriptor::Colored(d) => {
                let components = d.colors.len() / vertex_count;
                if d.colors.len() % vertex_count != 0 || !(3..=4).contains(&components) {
                    return Err(invalid(format!(
                        "{} colour floats do not give 3 or 4 components for {} vertices",
                        d.colors.len(),
                        vertex_count
                    )));
                }
            }
            EntityDescriptor::Textured(d) => {
                if d.texture_coords.len() != vertex_count * 2 {
                    return Err(invalid(format!(
                        "expected {} texture coordinates for {} vertices, got {}",
                        vertex_count * 2,
                        vertex_count,
                        d.texture_coords.len()
                    )));
                }
            }
        }

        if let Some(elements) = elements {
            if let Some(index) = elements.iter().find(|&&i| i as usize >= vertex_count) {
                return Err(invalid(format!(
                    "element {} is out of range for {} vertices",
                    index, vertex_count
                )));
            }
        }
        Ok(())
    }
}

impl TryFrom<RawDescriptor> for EntityDescriptor {
    type Error = LoadError;

    fn try_from(raw: RawDescriptor) -> Result<Self> {
        match raw.kind.as_str() {
            "colored" => Ok(EntityDescriptor::Colored(ColoredDescriptor {
                vertex_shader_path: raw.vertex_shader_path,
                fragment_shader_path: raw.fragment_shader_path,
                vertices: raw.vertices,
                colors: raw
                    .colors
                    .ok_or_else(|| invalid("colored entity without `colors`"))?,
                elements: raw.elements,
            })),
            "textured" => Ok(EntityDescriptor::Textured(TexturedDescriptor {
                vertex_shader_path: raw.vertex_shader_path,
                fragment_shader_path: raw.fragment_shader_path,
                vertices: raw.vertices,
                texture_image_path: raw
                    .texture_image_path
                    .ok_or_else(|| invalid("textured entity without `textureImagePath`"))?,
                texture_coords: raw
                    .texture_coords
                    .ok_or_else(|| invalid("textured entity without `textureCoords`"))?,
                elements: raw
                    .elements
                    .ok_or_else(|| invalid("textured entity without `elements`"))?,
            })),
            _ => Err(LoadError::UnknownKind(raw.kind)),
        }
    }
}

fn invalid(reason: impl Into<String>) -> LoadError {
    LoadError::InvalidDescriptor(reason.into())
}

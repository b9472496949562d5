//! Shader program compilation and location lookup.

use crate::{
    device::{AttributeLocation, Device, UniformLocation, VertexAttribute},
    errors::{LoadError, Result, ShaderStage},
};

pub const MODEL_VIEW_UNIFORM: &str = "uModelViewMatrix";
pub const PROJECTION_UNIFORM: &str = "uPerspectiveMatrix";

/// The names an entity variant resolves after linking.
#[derive(Clone, Copy, Debug)]
pub struct ProgramInterface {
    /// Vertex positions, always three components.
    pub position: VertexAttribute,
    /// Per-vertex colour or texture coordinate.
    pub payload: VertexAttribute,
    /// Sampler uniform, textured programs only.
    pub sampler: Option<&'static str>,
}

/// A linked program together with the locations an entity binds every frame.
///
/// Only ever constructed from a successful link, so holding one means the
/// program is usable.
pub struct ShaderProgram<D: Device> {
    pub(crate) handle: D::Program,
    pub position: AttributeLocation,
    pub position_components: u32,
    pub payload: AttributeLocation,
    pub payload_components: u32,
    pub model_view: UniformLocation,
    pub projection: UniformLocation,
    pub sampler: UniformLocation,
}

impl<D: Device> std::fmt::Debug for ShaderProgram<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShaderProgram")
            .field("position", &self.position)
            .field("payload", &self.payload)
            .field("model_view", &self.model_view)
            .field("projection", &self.projection)
            .field("sampler", &self.sampler)
            .finish()
    }
}

impl<D: Device> ShaderProgram<D> {
    pub fn handle(&self) -> &D::Program {
        &self.handle
    }

    pub(crate) fn dispose(self, device: &mut D) {
        device.delete_program(self.handle);
    }
}

/// Compile both stages and link them.
///
/// The vertex stage is compiled first; if it fails the fragment stage is never
/// looked at. Linking only happens once both stages compiled. On every error
/// path the stages created so far are released, so no half-built program
/// survives.
pub fn compile_program<D: Device>(
    device: &mut D,
    vertex_source: &str,
    fragment_source: &str,
    attributes: &[VertexAttribute],
) -> Result<D::Program> {
    let vertex = device
        .compile_shader(ShaderStage::Vertex, vertex_source)
        .map_err(|log| LoadError::ShaderCompile {
            stage: ShaderStage::Vertex,
            log,
        })?;

    let fragment = match device.compile_shader(ShaderStage::Fragment, fragment_source) {
        Ok(fragment) => fragment,
        Err(log) => {
            device.delete_shader(vertex);
            return Err(LoadError::ShaderCompile {
                stage: ShaderStage::Fragment,
                log,
            });
        }
    };

    device
        .link_program(vertex, fragment, attributes)
        .map_err(|log| LoadError::ProgramLink { log })
}

/// Compile, link and resolve every location named by `interface`.
///
/// Names missing from the program resolve to the `NONE` sentinels; they are
/// looked up, not validated.
pub fn build_program<D: Device>(
    device: &mut D,
    vertex_source: &str,
    fragment_source: &str,
    interface: &ProgramInterface,
) -> Result<ShaderProgram<D>> {
    let handle = compile_program(
        device,
        vertex_source,
        fragment_source,
        &[interface.position, interface.payload],
    )?;

    let position = device.attribute_location(&handle, interface.position.name);
    let payload = device.attribute_location(&handle, interface.payload.name);
    let model_view = device.uniform_location(&handle, MODEL_VIEW_UNIFORM);
    let projection = device.uniform_location(&handle, PROJECTION_UNIFORM);
    let sampler = interface
        .sampler
        .map_or(UniformLocation::NONE, |name| device.uniform_location(&handle, name));

    if position.is_none() {
        log::warn!(
            "program does not declare the `{}` attribute",
            interface.position.name
        );
    }

    Ok(ShaderProgram {
        handle,
        position,
        position_components: interface.position.components,
        payload,
        payload_components: interface.payload.components,
        model_view,
        projection,
        sampler,
    })
}

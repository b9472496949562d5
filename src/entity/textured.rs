use cgmath::{Matrix4, Vector3};

use crate::{
    device::{Device, TextureFilter, TextureOptions, VertexAttribute},
    entity::{Geometry, IndexBuffer, Motion, TexturedDescriptor},
    errors::Result,
    resources::{
        Fetcher,
        shader::{ProgramInterface, ShaderProgram, build_program},
        upload::{upload_floats, upload_indices, upload_texture},
    },
};

pub const POSITION_ATTRIBUTE: &str = "aEntityVertex";
pub const TEXTURE_COORDINATE_ATTRIBUTE: &str = "aTextureCoordinate";
pub const SAMPLER_UNIFORM: &str = "uSampler";

/// Texture unit the entity's texture is bound to while drawing.
pub const TEXTURE_UNIT: u32 = 0;

/// Blocky, bottom-up textures.
pub const TEXTURE_OPTIONS: TextureOptions = TextureOptions {
    filter: TextureFilter::Nearest,
    flip_y: true,
};

/// Shader text and the decoded texture image for a textured entity.
#[derive(Clone, Debug)]
pub struct TexturedSources {
    pub vertex_shader: String,
    pub fragment_shader: String,
    pub image: image::DynamicImage,
}

/// Fetch both shader stages and the texture image concurrently.
pub async fn fetch_sources<F: Fetcher>(
    fetcher: &F,
    descriptor: &TexturedDescriptor,
) -> Result<TexturedSources> {
    let (vertex_shader, fragment_shader, image) = futures::try_join!(
        fetcher.fetch_text(&descriptor.vertex_shader_path),
        fetcher.fetch_text(&descriptor.fragment_shader_path),
        fetcher.fetch_image(&descriptor.texture_image_path),
    )?;
    Ok(TexturedSources {
        vertex_shader,
        fragment_shader,
        image,
    })
}

/// Indexed geometry sampled from one texture.
pub struct TexturedEntity<D: Device> {
    pub(crate) program: ShaderProgram<D>,
    pub(crate) geometry: Geometry<D>,
    pub(crate) texture: D::Texture,
    pub(crate) motion: Motion,
}

impl<D: Device> TexturedEntity<D> {
    pub fn build(
        device: &mut D,
        descriptor: &TexturedDescriptor,
        sources: TexturedSources,
        position: Vector3<f32>,
    ) -> Result<Self> {
        let interface = ProgramInterface {
            position: VertexAttribute {
                name: POSITION_ATTRIBUTE,
                components: 3,
            },
            payload: VertexAttribute {
                name: TEXTURE_COORDINATE_ATTRIBUTE,
                components: 2,
            },
            sampler: Some(SAMPLER_UNIFORM),
        };
        let program = build_program(device, &sources.vertex_shader, &sources.fragment_shader, &interface)?;

        let vertices = upload_floats(device, &descriptor.vertices);
        let payload = upload_floats(device, &descriptor.texture_coords);
        let texture = upload_texture(device, &sources.image, TEXTURE_OPTIONS);
        let indices = IndexBuffer {
            buffer: upload_indices(device, &descriptor.elements),
            count: descriptor.elements.len() as u32,
        };
        log::debug!(
            "textured entity `{}` at {:?}: {} vertices, {} indices",
            descriptor.texture_image_path,
            position,
            descriptor.vertex_count(),
            descriptor.elements.len()
        );

        Ok(Self {
            program,
            geometry: Geometry {
                vertices,
                vertex_count: descriptor.vertex_count() as u32,
                payload,
                indices: Some(indices),
            },
            texture,
            motion: Motion::new(position),
        })
    }

    /// Binds program, `aEntityVertex` and `aTextureCoordinate` buffers, both
    /// matrices, the sampler uniform and the texture on unit 0, then draws.
    pub fn draw(&self, device: &mut D, view: &Matrix4<f32>, projection: &Matrix4<f32>) {
        let world = self.motion.world_matrix(view);
        self.geometry.bind(device, &self.program, &world, projection);
        device.set_uniform_sampler(self.program.sampler, TEXTURE_UNIT);
        device.bind_texture(TEXTURE_UNIT, &self.texture);
        self.geometry.submit(device);
    }

    pub fn dispose(self, device: &mut D) {
        self.program.dispose(device);
        self.geometry.dispose(device);
        device.delete_texture(self.texture);
    }
}

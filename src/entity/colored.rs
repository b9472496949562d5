use cgmath::{Matrix4, Vector3};

use crate::{
    device::{Device, VertexAttribute},
    entity::{ColoredDescriptor, Geometry, IndexBuffer, Motion},
    errors::Result,
    resources::{
        Fetcher,
        shader::{ProgramInterface, ShaderProgram, build_program},
        upload::{upload_floats, upload_indices},
    },
};

pub const POSITION_ATTRIBUTE: &str = "aVertex";
pub const COLOR_ATTRIBUTE: &str = "aColor";

/// Shader text for a colored entity.
#[derive(Clone, Debug)]
pub struct ColoredSources {
    pub vertex_shader: String,
    pub fragment_shader: String,
}

/// Fetch both shader stages concurrently.
pub async fn fetch_sources<F: Fetcher>(
    fetcher: &F,
    descriptor: &ColoredDescriptor,
) -> Result<ColoredSources> {
    let (vertex_shader, fragment_shader) = futures::try_join!(
        fetcher.fetch_text(&descriptor.vertex_shader_path),
        fetcher.fetch_text(&descriptor.fragment_shader_path),
    )?;
    Ok(ColoredSources {
        vertex_shader,
        fragment_shader,
    })
}

/// Geometry with one colour per vertex.
pub struct ColoredEntity<D: Device> {
    pub(crate) program: ShaderProgram<D>,
    pub(crate) geometry: Geometry<D>,
    pub(crate) motion: Motion,
}

impl<D: Device> ColoredEntity<D> {
    pub fn build(
        device: &mut D,
        descriptor: &ColoredDescriptor,
        sources: ColoredSources,
        position: Vector3<f32>,
    ) -> Result<Self> {
        let interface = ProgramInterface {
            position: VertexAttribute {
                name: POSITION_ATTRIBUTE,
                components: 3,
            },
            payload: VertexAttribute {
                name: COLOR_ATTRIBUTE,
                components: descriptor.color_components(),
            },
            sampler: None,
        };
        let program = build_program(device, &sources.vertex_shader, &sources.fragment_shader, &interface)?;

        let vertices = upload_floats(device, &descriptor.vertices);
        let payload = upload_floats(device, &descriptor.colors);
        // Only indexed when the descriptor brings its own elements.
        let indices = descriptor.elements.as_ref().map(|elements| IndexBuffer {
            buffer: upload_indices(device, elements),
            count: elements.len() as u32,
        });
        log::debug!(
            "colored entity at {:?}: {} vertices, {:?} indices",
            position,
            descriptor.vertex_count(),
            descriptor.elements.as_ref().map(Vec::len)
        );

        Ok(Self {
            program,
            geometry: Geometry {
                vertices,
                vertex_count: descriptor.vertex_count() as u32,
                payload,
                indices,
            },
            motion: Motion::new(position),
        })
    }

    /// Binds program, `aVertex` and `aColor` buffers and both matrices, then draws.
    pub fn draw(&self, device: &mut D, view: &Matrix4<f32>, projection: &Matrix4<f32>) {
        let world = self.motion.world_matrix(view);
        self.geometry.bind(device, &self.program, &world, projection);
        self.geometry.submit(device);
    }

    pub fn dispose(self, device: &mut D) {
        self.program.dispose(device);
        self.geometry.dispose(device);
    }
}

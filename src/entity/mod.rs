//! Drawable entities and their asynchronous construction.
//!
//! An [`Entity`] is either [`ColoredEntity`] or [`TexturedEntity`]. Both own
//! a linked program, their buffers (and texture), a constant position offset
//! and a rotation that advances every tick.
//!
//! # Lifecycle
//!
//! 1. [`Entity::load`] validates the descriptor, fetches its shader sources
//!    (and image) concurrently, then compiles and uploads everything. Any
//!    failure on the way yields no entity at all.
//! 2. [`Entity::tick`] advances the rotation; nothing else ever changes.
//! 3. [`Entity::draw`] binds every piece of state it needs and issues one
//!    draw call.
//! 4. [`Entity::dispose`] hands all device resources back.

use std::time::Duration;

use cgmath::{Deg, InnerSpace, Matrix4, Rad, Vector3};

use crate::{
    device::Device,
    errors::Result,
    resources::{Fetcher, shader::ShaderProgram},
};

pub mod colored;
pub mod descriptor;
pub mod textured;

pub use colored::ColoredEntity;
pub use descriptor::{ColoredDescriptor, EntityDescriptor, RawDescriptor, TexturedDescriptor};
pub use textured::TexturedEntity;

/// Rotation speed every entity starts with.
pub const DEFAULT_ANGULAR_VELOCITY: Deg<f32> = Deg(90.0);

/// Axis every entity spins around, before normalisation.
pub const DEFAULT_ROTATION_AXIS: [f32; 3] = [1.0, 0.5, 0.25];

/// Placement and spin of an entity.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Motion {
    pub position: Vector3<f32>,
    pub rotation: Rad<f32>,
    /// Radians per second.
    pub angular_velocity: Rad<f32>,
    /// Unit length.
    pub axis: Vector3<f32>,
}

impl Motion {
    pub fn new(position: Vector3<f32>) -> Self {
        Self {
            position,
            rotation: Rad(0.0),
            angular_velocity: DEFAULT_ANGULAR_VELOCITY.into(),
            axis: Vector3::from(DEFAULT_ROTATION_AXIS).normalize(),
        }
    }

    pub fn tick(&mut self, dt: Duration) {
        self.rotation += self.angular_velocity * dt.as_secs_f32();
    }

    /// `view`, then the position offset, then the current rotation.
    pub fn world_matrix(&self, view: &Matrix4<f32>) -> Matrix4<f32> {
        *view * Matrix4::from_translation(self.position) * Matrix4::from_axis_angle(self.axis, self.rotation)
    }
}

/// How an entity's geometry is submitted.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DrawMode {
    Arrays { vertex_count: u32 },
    Elements { index_count: u32 },
}

pub struct IndexBuffer<D: Device> {
    pub(crate) buffer: D::Buffer,
    pub(crate) count: u32,
}

/// Vertex positions, one per-vertex payload (colour or UV) and optional indices.
pub struct Geometry<D: Device> {
    pub(crate) vertices: D::Buffer,
    pub(crate) vertex_count: u32,
    pub(crate) payload: D::Buffer,
    pub(crate) indices: Option<IndexBuffer<D>>,
}

impl<D: Device> Geometry<D> {
    pub fn draw_mode(&self) -> DrawMode {
        match &self.indices {
            Some(indices) => DrawMode::Elements {
                index_count: indices.count,
            },
            None => DrawMode::Arrays {
                vertex_count: self.vertex_count,
            },
        }
    }

    /// Bind program, attributes and matrices for `world`.
    fn bind(
        &self,
        device: &mut D,
        program: &ShaderProgram<D>,
        world: &Matrix4<f32>,
        projection: &Matrix4<f32>,
    ) {
        device.use_program(program.handle());
        device.bind_attribute(program.position, &self.vertices, program.position_components);
        device.bind_attribute(program.payload, &self.payload, program.payload_components);
        device.set_uniform_matrix(program.model_view, world);
        device.set_uniform_matrix(program.projection, projection);
    }

    fn submit(&self, device: &mut D) {
        match &self.indices {
            Some(indices) => device.draw_elements(&indices.buffer, indices.count),
            None => device.draw_arrays(self.vertex_count),
        }
    }

    fn dispose(self, device: &mut D) {
        device.delete_buffer(self.vertices);
        device.delete_buffer(self.payload);
        if let Some(indices) = self.indices {
            device.delete_buffer(indices.buffer);
        }
    }
}

/// A render-ready entity.
pub enum Entity<D: Device> {
    Colored(ColoredEntity<D>),
    Textured(TexturedEntity<D>),
}

/// Everything an entity needs from the outside world, already fetched.
pub enum Sources {
    Colored(colored::ColoredSources),
    Textured(textured::TexturedSources),
}

impl Sources {
    /// Fetch every resource `descriptor` names, concurrently.
    ///
    /// The first failure wins; the other requests are dropped and whatever they
    /// would have produced is discarded.
    pub async fn fetch<F: Fetcher>(fetcher: &F, descriptor: &EntityDescriptor) -> Result<Self> {
        match descriptor {
            EntityDescriptor::Colored(d) => {
                Ok(Sources::Colored(colored::fetch_sources(fetcher, d).await?))
            }
            EntityDescriptor::Textured(d) => {
                Ok(Sources::Textured(textured::fetch_sources(fetcher, d).await?))
            }
        }
    }
}

impl<D: Device> Entity<D> {
    /// Load an entity and place it at `position`.
    pub async fn load<F: Fetcher>(
        device: &mut D,
        fetcher: &F,
        descriptor: &EntityDescriptor,
        position: Vector3<f32>,
    ) -> Result<Self> {
        descriptor.validate()?;
        let sources = Sources::fetch(fetcher, descriptor).await?;
        Self::build(device, descriptor, sources, position)
    }

    /// Compile and upload from already fetched sources. Never suspends.
    pub fn build(
        device: &mut D,
        descriptor: &EntityDescriptor,
        sources: Sources,
        position: Vector3<f32>,
    ) -> Result<Self> {
        match (descriptor, sources) {
            (EntityDescriptor::Colored(d), Sources::Colored(s)) => {
                Ok(Entity::Colored(ColoredEntity::build(device, d, s, position)?))
            }
            (EntityDescriptor::Textured(d), Sources::Textured(s)) => {
                Ok(Entity::Textured(TexturedEntity::build(device, d, s, position)?))
            }
            (descriptor, _) => Err(crate::errors::LoadError::InvalidDescriptor(format!(
                "fetched sources do not belong to a {} entity",
                descriptor.kind()
            ))),
        }
    }

    pub fn tick(&mut self, dt: Duration) {
        self.motion_mut().tick(dt);
    }

    /// Draw with the shared camera matrices.
    ///
    /// Leaves this entity's program, buffers and (for textured entities)
    /// texture bound on the device.
    pub fn draw(&self, device: &mut D, view: &Matrix4<f32>, projection: &Matrix4<f32>) {
        match self {
            Entity::Colored(entity) => entity.draw(device, view, projection),
            Entity::Textured(entity) => entity.draw(device, view, projection),
        }
    }

    pub fn dispose(self, device: &mut D) {
        match self {
            Entity::Colored(entity) => entity.dispose(device),
            Entity::Textured(entity) => entity.dispose(device),
        }
    }

    pub fn motion(&self) -> &Motion {
        match self {
            Entity::Colored(entity) => &entity.motion,
            Entity::Textured(entity) => &entity.motion,
        }
    }

    fn motion_mut(&mut self) -> &mut Motion {
        match self {
            Entity::Colored(entity) => &mut entity.motion,
            Entity::Textured(entity) => &mut entity.motion,
        }
    }

    pub fn draw_mode(&self) -> DrawMode {
        match self {
            Entity::Colored(entity) => entity.geometry.draw_mode(),
            Entity::Textured(entity) => entity.geometry.draw_mode(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Entity::Colored(_) => "colored",
            Entity::Textured(_) => "textured",
        }
    }
}

#[cfg(test)]
mod tests {
    use cgmath::{SquareMatrix, Vector4};

    use super::*;

    fn close(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-5
    }

    #[test]
    fn tick_is_additive() {
        let pairs = [
            (Duration::from_millis(250), Duration::from_millis(750)),
            (Duration::ZERO, Duration::from_millis(16)),
            (Duration::from_millis(16), Duration::ZERO),
            (Duration::ZERO, Duration::ZERO),
            (Duration::from_micros(250), Duration::from_nanos(1_500)),
            (Duration::from_millis(1_234), Duration::from_micros(16_667)),
            (Duration::from_secs(2), Duration::from_millis(500)),
        ];
        for (first, second) in pairs {
            let mut split = Motion::new(Vector3::new(0.0, 0.0, 0.0));
            split.tick(first);
            split.tick(second);

            let mut whole = Motion::new(Vector3::new(0.0, 0.0, 0.0));
            whole.tick(first + second);

            assert!(
                close(split.rotation.0, whole.rotation.0),
                "{:?} + {:?}: {} != {}",
                first,
                second,
                split.rotation.0,
                whole.rotation.0
            );
        }
    }

    #[test]
    fn one_second_is_a_quarter_turn() {
        let mut motion = Motion::new(Vector3::new(0.0, 0.0, 0.0));
        motion.tick(Duration::from_secs(1));
        assert!(close(motion.rotation.0, std::f32::consts::FRAC_PI_2));
    }

    #[test]
    fn zero_tick_keeps_rotation() {
        let mut motion = Motion::new(Vector3::new(1.0, 2.0, 3.0));
        motion.tick(Duration::ZERO);
        assert_eq!(motion.rotation, Rad(0.0));
    }

    #[test]
    fn unrotated_world_matrix_is_view_then_offset() {
        let motion = Motion::new(Vector3::new(-1.5, 0.0, 0.0));
        let view = Matrix4::from_translation(Vector3::new(3.0, 0.0, -7.0));
        let world = motion.world_matrix(&view);
        let origin = world * Vector4::new(0.0, 0.0, 0.0, 1.0);
        assert!(close(origin.x, 1.5));
        assert!(close(origin.y, 0.0));
        assert!(close(origin.z, -7.0));
    }

    #[test]
    fn rotation_keeps_points_on_the_axis() {
        let mut motion = Motion::new(Vector3::new(0.0, 0.0, 0.0));
        motion.tick(Duration::from_millis(333));
        let world = motion.world_matrix(&Matrix4::identity());
        let on_axis = motion.axis.extend(1.0);
        let moved = world * on_axis;
        assert!(close(moved.x, on_axis.x));
        assert!(close(moved.y, on_axis.y));
        assert!(close(moved.z, on_axis.z));
    }
}

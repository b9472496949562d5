//! The graphics device seam.
//!
//! Entities never talk to wgpu directly. They drive a [`Device`]: a small,
//! state-machine style interface in which a program, attribute buffers,
//! uniforms and a texture are bound and then a draw call consumes whatever is
//! currently bound. Bindings persist after a draw and are never restored, so
//! every draw has to bind everything it depends on.
//!
//! [`crate::context::Context`] implements both traits on top of wgpu; the tests
//! implement them with a recording fake.

use cgmath::Matrix4;

use crate::errors::ShaderStage;

/// Where a named vertex input lives inside a linked program.
///
/// Looking up a name the program does not declare yields [`AttributeLocation::NONE`];
/// binding a buffer to it does nothing.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct AttributeLocation(Option<u32>);

impl AttributeLocation {
    pub const NONE: Self = Self(None);

    pub fn new(index: u32) -> Self {
        Self(Some(index))
    }

    pub fn index(&self) -> Option<u32> {
        self.0
    }

    pub fn is_none(&self) -> bool {
        self.0.is_none()
    }
}

/// Where a named uniform (matrix or sampler) lives inside a linked program.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct UniformLocation(Option<u32>);

impl UniformLocation {
    pub const NONE: Self = Self(None);

    pub fn new(index: u32) -> Self {
        Self(Some(index))
    }

    pub fn index(&self) -> Option<u32> {
        self.0
    }

    pub fn is_none(&self) -> bool {
        self.0.is_none()
    }
}

/// A vertex input the caller is going to feed from its own buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VertexAttribute {
    pub name: &'static str,
    /// Number of `f32` components per vertex (1 to 4).
    pub components: u32,
}

/// What a device buffer is going to be bound as.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BufferTarget {
    /// Per-vertex `f32` data.
    Vertex,
    /// `u16` triangle indices.
    Index,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TextureFilter {
    Nearest,
    Linear,
}

/// How an image is turned into a device texture.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TextureOptions {
    pub filter: TextureFilter,
    /// Flip rows on upload so that v = 0 addresses the bottom of the image.
    pub flip_y: bool,
}

/// Resource creation and immediate-mode drawing on a single graphics context.
///
/// The context is single-owner: everything goes through `&mut self`, so
/// creation and draw calls can never interleave with another user.
pub trait Device {
    type Shader;
    type Program;
    type Buffer;
    type Texture;

    /// Compile one stage. The error is the compiler log.
    fn compile_shader(&mut self, stage: ShaderStage, source: &str) -> Result<Self::Shader, String>;

    /// Release a compiled stage that is not going to be linked.
    fn delete_shader(&mut self, shader: Self::Shader);

    /// Link two compiled stages, consuming them whether or not linking
    /// succeeds. `attributes` lists the vertex inputs the caller will bind, in
    /// binding order. The error is the linker log.
    fn link_program(
        &mut self,
        vertex: Self::Shader,
        fragment: Self::Shader,
        attributes: &[VertexAttribute],
    ) -> Result<Self::Program, String>;

    fn attribute_location(&self, program: &Self::Program, name: &str) -> AttributeLocation;

    fn uniform_location(&self, program: &Self::Program, name: &str) -> UniformLocation;

    fn create_buffer(&mut self, target: BufferTarget, contents: &[u8]) -> Self::Buffer;

    fn create_texture(&mut self, image: &image::RgbaImage, options: TextureOptions) -> Self::Texture;

    fn set_viewport(&mut self, width: u32, height: u32);

    /// Clear the colour and depth targets.
    fn clear(&mut self);

    fn use_program(&mut self, program: &Self::Program);

    /// Feed `location` from `buffer`, `components` floats per vertex.
    fn bind_attribute(&mut self, location: AttributeLocation, buffer: &Self::Buffer, components: u32);

    fn set_uniform_matrix(&mut self, location: UniformLocation, matrix: &Matrix4<f32>);

    /// Point a sampler uniform at a texture unit.
    fn set_uniform_sampler(&mut self, location: UniformLocation, unit: u32);

    fn bind_texture(&mut self, unit: u32, texture: &Self::Texture);

    /// Draw `vertex_count` vertices as a triangle list.
    fn draw_arrays(&mut self, vertex_count: u32);

    /// Draw `index_count` `u16` indices from `index_buffer` as a triangle list.
    fn draw_elements(&mut self, index_buffer: &Self::Buffer, index_count: u32);

    fn delete_program(&mut self, program: Self::Program);

    fn delete_buffer(&mut self, buffer: Self::Buffer);

    fn delete_texture(&mut self, texture: Self::Texture);
}

/// The surface a frame ends up on.
///
/// The visible size is what the window system shows; the backing size is what
/// the device renders into. They only differ until the next frame resizes the
/// backing store.
pub trait RenderSurface {
    fn visible_size(&self) -> (u32, u32);

    fn backing_size(&self) -> (u32, u32);

    fn resize_backing(&mut self, width: u32, height: u32);

    /// Hand the finished frame to the display.
    fn present(&mut self);
}

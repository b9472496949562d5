use std::{
    cell::RefCell,
    collections::{HashMap, HashSet},
};

use tumble::{
    Matrix4,
    device::{
        AttributeLocation, BufferTarget, Device, RenderSurface, TextureOptions, UniformLocation,
        VertexAttribute,
    },
    errors::{FetchError, ShaderStage},
    flow::CancelToken,
    resources::Fetcher,
};

/// A source containing this marker fails to compile.
pub const COMPILE_ERROR: &str = "#error";
/// A program whose stages contain this marker fails to link.
pub const LINK_ERROR: &str = "#link-error";

pub const COLORED_VS: &str = "attribute aVertex; attribute aColor; uniform uModelViewMatrix; uniform uPerspectiveMatrix;";
pub const COLORED_FS: &str = "varying vColor;";
pub const TEXTURED_VS: &str = "attribute aEntityVertex; attribute aTextureCoordinate; uniform uModelViewMatrix; uniform uPerspectiveMatrix;";
pub const TEXTURED_FS: &str = "uniform uSampler;";

#[derive(Clone, Debug, PartialEq)]
pub enum Call {
    CompileShader(ShaderStage),
    DeleteShader(u32),
    LinkProgram { vertex: u32, fragment: u32 },
    CreateBuffer { handle: u32, target: BufferTarget, len: usize },
    CreateTexture { handle: u32, options: TextureOptions, bottom_left: [u8; 4] },
    SetViewport(u32, u32),
    Clear,
    UseProgram(u32),
    BindAttribute { location: AttributeLocation, buffer: u32, components: u32 },
    SetUniformMatrix { location: UniformLocation, matrix: Matrix4<f32> },
    SetUniformSampler { location: UniformLocation, unit: u32 },
    BindTexture { unit: u32, texture: u32 },
    DrawArrays(u32),
    DrawElements { buffer: u32, count: u32 },
    DeleteProgram(u32),
    DeleteBuffer(u32),
    DeleteTexture(u32),
    ResizeBacking(u32, u32),
    Present,
}

/// A device that records every call and fakes compilation by looking at the
/// shader text.
///
/// Attribute and uniform names resolve when they occur in either stage of the
/// program; anything else resolves to the `NONE` sentinel.
#[derive(Debug)]
pub struct RecordingDevice {
    pub calls: Vec<Call>,
    next_handle: u32,
    shaders: HashMap<u32, String>,
    programs: HashMap<u32, (String, Vec<VertexAttribute>)>,
    pub visible: (u32, u32),
    pub backing: (u32, u32),
    /// Cancelled from inside `present`, to stop a loop mid-frame.
    pub cancel_on_present: Option<CancelToken>,
}

impl RecordingDevice {
    pub fn new() -> Self {
        Self {
            calls: Vec::new(),
            next_handle: 1,
            shaders: HashMap::new(),
            programs: HashMap::new(),
            visible: (800, 600),
            backing: (800, 600),
            cancel_on_present: None,
        }
    }

    fn handle(&mut self) -> u32 {
        let handle = self.next_handle;
        self.next_handle += 1;
        handle
    }

    pub fn count(&self, predicate: impl Fn(&Call) -> bool) -> usize {
        self.calls.iter().filter(|call| predicate(call)).count()
    }

    pub fn created_buffers(&self) -> Vec<u32> {
        self.calls
            .iter()
            .filter_map(|call| match call {
                Call::CreateBuffer { handle, .. } => Some(*handle),
                _ => None,
            })
            .collect()
    }

    pub fn deleted_buffers(&self) -> Vec<u32> {
        self.calls
            .iter()
            .filter_map(|call| match call {
                Call::DeleteBuffer(handle) => Some(*handle),
                _ => None,
            })
            .collect()
    }

    pub fn used_programs(&self) -> Vec<u32> {
        self.calls
            .iter()
            .filter_map(|call| match call {
                Call::UseProgram(handle) => Some(*handle),
                _ => None,
            })
            .collect()
    }
}

impl Default for RecordingDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl Device for RecordingDevice {
    type Shader = u32;
    type Program = u32;
    type Buffer = u32;
    type Texture = u32;

    fn compile_shader(&mut self, stage: ShaderStage, source: &str) -> Result<u32, String> {
        self.calls.push(Call::CompileShader(stage));
        if source.contains(COMPILE_ERROR) {
            return Err(format!("{} stage: syntax error", stage));
        }
        let handle = self.handle();
        self.shaders.insert(handle, source.to_string());
        Ok(handle)
    }

    fn delete_shader(&mut self, shader: u32) {
        self.calls.push(Call::DeleteShader(shader));
        self.shaders.remove(&shader);
    }

    fn link_program(
        &mut self,
        vertex: u32,
        fragment: u32,
        attributes: &[VertexAttribute],
    ) -> Result<u32, String> {
        self.calls.push(Call::LinkProgram { vertex, fragment });
        let source = format!(
            "{}\n{}",
            self.shaders.remove(&vertex).unwrap_or_default(),
            self.shaders.remove(&fragment).unwrap_or_default()
        );
        if source.contains(LINK_ERROR) {
            return Err("varyings do not match".to_string());
        }
        let handle = self.handle();
        self.programs.insert(handle, (source, attributes.to_vec()));
        Ok(handle)
    }

    fn attribute_location(&self, program: &u32, name: &str) -> AttributeLocation {
        let Some((source, attributes)) = self.programs.get(program) else {
            return AttributeLocation::NONE;
        };
        if !source.contains(name) {
            return AttributeLocation::NONE;
        }
        attributes
            .iter()
            .position(|attribute| attribute.name == name)
            .map_or(AttributeLocation::NONE, |index| AttributeLocation::new(index as u32))
    }

    fn uniform_location(&self, program: &u32, name: &str) -> UniformLocation {
        self.programs
            .get(program)
            .and_then(|(source, _)| source.find(name))
            .map_or(UniformLocation::NONE, |position| UniformLocation::new(position as u32))
    }

    fn create_buffer(&mut self, target: BufferTarget, contents: &[u8]) -> u32 {
        let handle = self.handle();
        self.calls.push(Call::CreateBuffer {
            handle,
            target,
            len: contents.len(),
        });
        handle
    }

    fn create_texture(&mut self, image: &image::RgbaImage, options: TextureOptions) -> u32 {
        let handle = self.handle();
        let bottom_left = image
            .get_pixel_checked(0, image.height().saturating_sub(1))
            .map_or([0; 4], |pixel| pixel.0);
        self.calls.push(Call::CreateTexture {
            handle,
            options,
            bottom_left,
        });
        handle
    }

    fn set_viewport(&mut self, width: u32, height: u32) {
        self.calls.push(Call::SetViewport(width, height));
    }

    fn clear(&mut self) {
        self.calls.push(Call::Clear);
    }

    fn use_program(&mut self, program: &u32) {
        self.calls.push(Call::UseProgram(*program));
    }

    fn bind_attribute(&mut self, location: AttributeLocation, buffer: &u32, components: u32) {
        self.calls.push(Call::BindAttribute {
            location,
            buffer: *buffer,
            components,
        });
    }

    fn set_uniform_matrix(&mut self, location: UniformLocation, matrix: &Matrix4<f32>) {
        self.calls.push(Call::SetUniformMatrix {
            location,
            matrix: *matrix,
        });
    }

    fn set_uniform_sampler(&mut self, location: UniformLocation, unit: u32) {
        self.calls.push(Call::SetUniformSampler { location, unit });
    }

    fn bind_texture(&mut self, unit: u32, texture: &u32) {
        self.calls.push(Call::BindTexture {
            unit,
            texture: *texture,
        });
    }

    fn draw_arrays(&mut self, vertex_count: u32) {
        self.calls.push(Call::DrawArrays(vertex_count));
    }

    fn draw_elements(&mut self, index_buffer: &u32, index_count: u32) {
        self.calls.push(Call::DrawElements {
            buffer: *index_buffer,
            count: index_count,
        });
    }

    fn delete_program(&mut self, program: u32) {
        self.calls.push(Call::DeleteProgram(program));
        self.programs.remove(&program);
    }

    fn delete_buffer(&mut self, buffer: u32) {
        self.calls.push(Call::DeleteBuffer(buffer));
    }

    fn delete_texture(&mut self, texture: u32) {
        self.calls.push(Call::DeleteTexture(texture));
    }
}

impl RenderSurface for RecordingDevice {
    fn visible_size(&self) -> (u32, u32) {
        self.visible
    }

    fn backing_size(&self) -> (u32, u32) {
        self.backing
    }

    fn resize_backing(&mut self, width: u32, height: u32) {
        self.calls.push(Call::ResizeBacking(width, height));
        self.backing = (width, height);
    }

    fn present(&mut self) {
        self.calls.push(Call::Present);
        if let Some(token) = &self.cancel_on_present {
            token.cancel();
        }
    }
}

/// Serves text and images from memory.
///
/// Unknown paths fail; paths marked with [`hang`](Self::hang) never resolve.
#[derive(Debug, Default)]
pub struct MemoryFetcher {
    texts: HashMap<String, String>,
    images: HashMap<String, image::DynamicImage>,
    hanging: HashSet<String>,
    pub requests: RefCell<Vec<String>>,
}

impl MemoryFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shader sources for both entity kinds under `colored.vert` etc.
    pub fn with_shaders() -> Self {
        Self::new()
            .text("colored.vert", COLORED_VS)
            .text("colored.frag", COLORED_FS)
            .text("textured.vert", TEXTURED_VS)
            .text("textured.frag", TEXTURED_FS)
    }

    pub fn text(mut self, path: &str, text: &str) -> Self {
        self.texts.insert(path.to_string(), text.to_string());
        self
    }

    pub fn image(mut self, path: &str, image: image::DynamicImage) -> Self {
        self.images.insert(path.to_string(), image);
        self
    }

    pub fn hang(mut self, path: &str) -> Self {
        self.hanging.insert(path.to_string());
        self
    }
}

impl Fetcher for MemoryFetcher {
    async fn fetch_text(&self, path: &str) -> Result<String, FetchError> {
        self.requests.borrow_mut().push(path.to_string());
        if self.hanging.contains(path) {
            futures::future::pending::<()>().await;
        }
        self.texts
            .get(path)
            .cloned()
            .ok_or_else(|| FetchError::new(path, "404 Not Found"))
    }

    async fn fetch_image(&self, path: &str) -> Result<image::DynamicImage, FetchError> {
        self.requests.borrow_mut().push(path.to_string());
        if self.hanging.contains(path) {
            futures::future::pending::<()>().await;
        }
        self.images
            .get(path)
            .cloned()
            .ok_or_else(|| FetchError::new(path, "404 Not Found"))
    }
}

/// A 2x2 image whose bottom-left pixel is red and every other pixel white.
pub fn marker_image() -> image::DynamicImage {
    let mut image = image::RgbaImage::from_pixel(2, 2, image::Rgba([255, 255, 255, 255]));
    image.put_pixel(0, 1, image::Rgba([255, 0, 0, 255]));
    image::DynamicImage::ImageRgba8(image)
}

//! The wgpu backed [`Device`] and [`RenderSurface`].
//!
//! wgpu has no immediate-mode draw calls, so [`Context`] records them: every
//! `draw_*` call snapshots the currently bound program, vertex buffers, uniform
//! values and texture into a [`RecordedDraw`], and [`RenderSurface::present`]
//! replays the recorded draws in a single render pass before presenting.
//!
//! Bound state persists across draws the same way it does on a GL context:
//! nothing is reset after a draw call, only replaced by the next binding.

use std::{collections::HashMap, iter, sync::Arc};

use cgmath::Matrix4;
use wgpu::util::DeviceExt;
use winit::window::Window;

use crate::{
    data_structures::texture::Texture,
    device::{
        AttributeLocation, BufferTarget, Device, RenderSurface, TextureOptions, UniformLocation,
        VertexAttribute,
    },
    errors::ShaderStage,
    pipelines::{
        program::{LinkedProgram, ProgramLayout, UniformSlot},
        reflect::{CompiledStage, compile_stage},
    },
    resources::shader::PROJECTION_UNIFORM,
};

/// Maps GL clip space depth (-1..1) onto wgpu's 0..1.
#[rustfmt::skip]
pub const OPENGL_TO_WGPU_MATRIX: Matrix4<f32> = Matrix4::new(
    1.0, 0.0, 0.0, 0.0,
    0.0, 1.0, 0.0, 0.0,
    0.0, 0.0, 0.5, 0.0,
    0.0, 0.0, 0.5, 1.0,
);

/// The value a matrix uniform holds on the device. Projections arrive in GL
/// depth convention and are remapped; every other matrix is stored as is.
fn device_matrix(name: &str, matrix: &Matrix4<f32>) -> Matrix4<f32> {
    if name == PROJECTION_UNIFORM {
        OPENGL_TO_WGPU_MATRIX * *matrix
    } else {
        *matrix
    }
}

/// A device buffer and what it was created for.
#[derive(Clone, Debug)]
pub struct GpuBuffer {
    pub buffer: wgpu::Buffer,
    pub target: BufferTarget,
}

/// Handle of a linked program.
pub type Program = Arc<LinkedProgram>;

/// Uniform values of one program. Like GL uniforms they belong to the program
/// and survive switching to another program and back.
#[derive(Debug)]
struct ProgramState {
    uniforms: Vec<u8>,
    /// Texture binding -> texture unit.
    sampler_units: HashMap<u32, u32>,
}

#[derive(Debug, Default)]
struct BoundState {
    program: Option<Program>,
    /// Indexed by attribute location.
    attributes: Vec<Option<wgpu::Buffer>>,
    /// Indexed by texture unit.
    textures: HashMap<u32, Texture>,
}

#[derive(Debug)]
enum Primitive {
    Arrays { vertex_count: u32 },
    Elements { buffer: wgpu::Buffer, index_count: u32 },
}

/// One draw call as it will be replayed at `present`.
#[derive(Debug)]
pub struct RecordedDraw {
    program: Program,
    vertex_buffers: Vec<wgpu::Buffer>,
    bind_group: wgpu::BindGroup,
    primitive: Primitive,
}

#[derive(Debug)]
pub struct Context {
    window: Arc<Window>,
    depth_texture: Texture,
    pub surface: wgpu::Surface<'static>,
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    pub config: wgpu::SurfaceConfiguration,
    pub clear_colour: wgpu::Color,
    viewport: (u32, u32),
    bound: BoundState,
    programs: HashMap<u64, ProgramState>,
    next_program_id: u64,
    clear_requested: bool,
    draws: Vec<RecordedDraw>,
}

impl Context {
    pub async fn new(window: Arc<Window>, clear_colour: wgpu::Color) -> anyhow::Result<Self> {
        let size = window.inner_size();

        log::info!("WGPU setup");
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            #[cfg(not(target_arch = "wasm32"))]
            backends: wgpu::Backends::PRIMARY,
            #[cfg(target_arch = "wasm32")]
            backends: wgpu::Backends::GL,
            ..wgpu::InstanceDescriptor::new_without_display_handle()
        });

        let surface = instance.create_surface(window.clone())?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::default(),
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await?;
        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: None,
                required_features: wgpu::Features::empty(),
                // WebGL doesn't support all of wgpu's features, so if
                // we're building for the web we'll have to disable some.
                required_limits: if cfg!(target_arch = "wasm32") {
                    wgpu::Limits::downlevel_webgl2_defaults()
                } else {
                    wgpu::Limits::default()
                },
                ..Default::default()
            })
            .await?;

        let surface_caps = surface.get_capabilities(&adapter);
        // Textures are uploaded as sRGB, so the surface has to be sRGB as well
        // or every colour comes out darker.
        let surface_format = surface_caps
            .formats
            .iter()
            .copied()
            .find(|f| f.is_srgb())
            .or_else(|| surface_caps.formats.first().copied())
            .ok_or_else(|| anyhow::anyhow!("the surface supports no texture format"))?;
        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: wgpu::PresentMode::AutoVsync,
            alpha_mode: surface_caps
                .alpha_modes
                .first()
                .copied()
                .unwrap_or(wgpu::CompositeAlphaMode::Auto),
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);

        let depth_texture =
            Texture::create_depth_texture(&device, [config.width, config.height], "depth_texture");

        Ok(Self {
            viewport: (config.width, config.height),
            window,
            depth_texture,
            surface,
            device,
            queue,
            config,
            clear_colour,
            bound: BoundState::default(),
            programs: HashMap::new(),
            next_program_id: 0,
            clear_requested: false,
            draws: Vec::new(),
        })
    }

    pub fn window(&self) -> &Arc<Window> {
        &self.window
    }

    fn reconfigure(&mut self) {
        self.surface.configure(&self.device, &self.config);
        self.depth_texture = Texture::create_depth_texture(
            &self.device,
            [self.config.width, self.config.height],
            "depth_texture",
        );
    }

    /// Snapshot the bound state as a draw call, or skip it with a warning when
    /// something the program needs is not bound.
    fn record(&mut self, primitive: Primitive) {
        let Some(program) = self.bound.program.clone() else {
            log::warn!("draw call without a program, skipped");
            return;
        };

        let mut vertex_buffers = Vec::with_capacity(program.layout.slots.len());
        for (location, slot) in program.layout.slots.iter().enumerate() {
            match self.bound.attributes.get(location).cloned().flatten() {
                Some(buffer) => vertex_buffers.push(buffer),
                None => {
                    log::warn!("attribute `{}` has no buffer bound, draw skipped", slot.name);
                    return;
                }
            }
        }

        let Some(bind_group) = self.bind_group(&program) else {
            return;
        };
        self.draws.push(RecordedDraw {
            program,
            vertex_buffers,
            bind_group,
            primitive,
        });
    }

    fn bind_group(&self, program: &LinkedProgram) -> Option<wgpu::BindGroup> {
        let state = self.programs.get(&program.id)?;
        let layout = &program.layout;

        let uniform_buffer = layout.uniform_block.map(|(binding, _)| {
            let buffer = self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Uniform Buffer"),
                contents: &state.uniforms,
                usage: wgpu::BufferUsages::UNIFORM,
            });
            (binding, buffer)
        });

        let texture = match layout.texture_binding {
            Some(binding) => {
                let unit = state.sampler_units.get(&binding).copied().unwrap_or(0);
                match self.bound.textures.get(&unit) {
                    Some(texture) => Some((binding, texture)),
                    None => {
                        log::warn!("no texture bound on unit {}, draw skipped", unit);
                        return None;
                    }
                }
            }
            None => None,
        };
        let sampler = texture.and_then(|(_, texture)| texture.sampler.as_ref());
        if !layout.sampler_bindings.is_empty() && sampler.is_none() {
            log::warn!("program samples a texture but none is bound, draw skipped");
            return None;
        }

        let mut entries = Vec::new();
        if let Some((binding, buffer)) = &uniform_buffer {
            entries.push(wgpu::BindGroupEntry {
                binding: *binding,
                resource: buffer.as_entire_binding(),
            });
        }
        if let Some((binding, texture)) = texture {
            entries.push(wgpu::BindGroupEntry {
                binding,
                resource: wgpu::BindingResource::TextureView(&texture.view),
            });
        }
        if let Some(sampler) = sampler {
            for &binding in &layout.sampler_bindings {
                entries.push(wgpu::BindGroupEntry {
                    binding,
                    resource: wgpu::BindingResource::Sampler(sampler),
                });
            }
        }

        Some(self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("program_bind_group"),
            layout: &program.bind_group_layout,
            entries: &entries,
        }))
    }

    fn bound_uniform(
        &mut self,
        location: UniformLocation,
    ) -> Option<(&mut ProgramState, &str, UniformSlot)> {
        let index = location.index()?;
        let Some(program) = &self.bound.program else {
            log::warn!("uniform set without a program in use");
            return None;
        };
        let (name, slot) = program.layout.uniforms.get(index as usize)?;
        let state = self.programs.get_mut(&program.id)?;
        Some((state, name.as_str(), *slot))
    }
}

impl Device for Context {
    type Shader = CompiledStage;
    type Program = Program;
    type Buffer = GpuBuffer;
    type Texture = Texture;

    fn compile_shader(&mut self, stage: ShaderStage, source: &str) -> Result<CompiledStage, String> {
        compile_stage(stage, source)
    }

    fn delete_shader(&mut self, _shader: CompiledStage) {}

    fn link_program(
        &mut self,
        vertex: CompiledStage,
        fragment: CompiledStage,
        attributes: &[VertexAttribute],
    ) -> Result<Program, String> {
        let layout = ProgramLayout::link(&vertex.interface, &fragment.interface, attributes)?;

        let id = self.next_program_id;
        self.next_program_id += 1;
        let uniform_size = layout.uniform_block.map_or(0, |(_, size)| size as usize);
        self.programs.insert(
            id,
            ProgramState {
                uniforms: vec![0; uniform_size],
                sampler_units: HashMap::new(),
            },
        );

        Ok(Arc::new(LinkedProgram::new(
            &self.device,
            id,
            layout,
            &vertex,
            &fragment,
            self.config.format,
        )))
    }

    fn attribute_location(&self, program: &Program, name: &str) -> AttributeLocation {
        program
            .layout
            .attribute_slot(name)
            .map_or(AttributeLocation::NONE, AttributeLocation::new)
    }

    fn uniform_location(&self, program: &Program, name: &str) -> UniformLocation {
        program
            .layout
            .uniform_slot(name)
            .map_or(UniformLocation::NONE, UniformLocation::new)
    }

    fn create_buffer(&mut self, target: BufferTarget, contents: &[u8]) -> GpuBuffer {
        let (label, usage) = match target {
            BufferTarget::Vertex => ("Vertex Buffer", wgpu::BufferUsages::VERTEX),
            BufferTarget::Index => ("Index Buffer", wgpu::BufferUsages::INDEX),
        };
        let buffer = self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(label),
            contents,
            usage,
        });
        GpuBuffer { buffer, target }
    }

    fn create_texture(&mut self, image: &image::RgbaImage, options: TextureOptions) -> Texture {
        Texture::from_rgba(&self.device, &self.queue, image, options, Some("entity_texture"))
    }

    fn set_viewport(&mut self, width: u32, height: u32) {
        self.viewport = (width, height);
    }

    fn clear(&mut self) {
        self.clear_requested = true;
        self.draws.clear();
    }

    fn use_program(&mut self, program: &Program) {
        self.bound.program = Some(program.clone());
    }

    fn bind_attribute(&mut self, location: AttributeLocation, buffer: &GpuBuffer, _components: u32) {
        let Some(index) = location.index() else {
            return;
        };
        let index = index as usize;
        if self.bound.attributes.len() <= index {
            self.bound.attributes.resize(index + 1, None);
        }
        self.bound.attributes[index] = Some(buffer.buffer.clone());
    }

    fn set_uniform_matrix(&mut self, location: UniformLocation, matrix: &Matrix4<f32>) {
        let Some((state, name, slot)) = self.bound_uniform(location) else {
            return;
        };
        let UniformSlot::Member { offset, span } = slot else {
            log::warn!("a texture uniform cannot hold a matrix");
            return;
        };
        let matrix = device_matrix(name, matrix);
        let columns: [[f32; 4]; 4] = matrix.into();
        let bytes: &[u8] = bytemuck::cast_slice(&columns);
        if (span as usize) < bytes.len() {
            log::warn!("uniform at offset {} is too small for a matrix", offset);
            return;
        }
        let offset = offset as usize;
        state.uniforms[offset..offset + bytes.len()].copy_from_slice(bytes);
    }

    fn set_uniform_sampler(&mut self, location: UniformLocation, unit: u32) {
        let Some((state, _, slot)) = self.bound_uniform(location) else {
            return;
        };
        match slot {
            UniformSlot::Texture { binding } => {
                state.sampler_units.insert(binding, unit);
            }
            UniformSlot::Member { .. } => log::warn!("a block member cannot select a texture unit"),
        }
    }

    fn bind_texture(&mut self, unit: u32, texture: &Texture) {
        self.bound.textures.insert(unit, texture.clone());
    }

    fn draw_arrays(&mut self, vertex_count: u32) {
        self.record(Primitive::Arrays { vertex_count });
    }

    fn draw_elements(&mut self, index_buffer: &GpuBuffer, index_count: u32) {
        if index_buffer.target != BufferTarget::Index {
            log::warn!("draw_elements with a vertex buffer, skipped");
            return;
        }
        self.record(Primitive::Elements {
            buffer: index_buffer.buffer.clone(),
            index_count,
        });
    }

    fn delete_program(&mut self, program: Program) {
        self.programs.remove(&program.id);
        if self
            .bound
            .program
            .as_ref()
            .is_some_and(|bound| bound.id == program.id)
        {
            self.bound.program = None;
        }
    }

    // wgpu frees a resource once its last handle is dropped. Draws recorded
    // earlier in the frame hold their own handles until `present`.
    fn delete_buffer(&mut self, _buffer: GpuBuffer) {}

    fn delete_texture(&mut self, _texture: Texture) {}
}

impl RenderSurface for Context {
    fn visible_size(&self) -> (u32, u32) {
        let size = self.window.inner_size();
        (size.width, size.height)
    }

    fn backing_size(&self) -> (u32, u32) {
        (self.config.width, self.config.height)
    }

    fn resize_backing(&mut self, width: u32, height: u32) {
        if width > 0 && height > 0 {
            self.config.width = width;
            self.config.height = height;
            self.reconfigure();
        }
    }

    fn present(&mut self) {
        let clear = std::mem::take(&mut self.clear_requested);
        let draws = std::mem::take(&mut self.draws);

        let output = match self.surface.get_current_texture() {
            wgpu::CurrentSurfaceTexture::Success(output)
            | wgpu::CurrentSurfaceTexture::Suboptimal(output) => output,
            // Reconfigure the surface if it's lost or outdated
            wgpu::CurrentSurfaceTexture::Lost | wgpu::CurrentSurfaceTexture::Outdated => {
                self.reconfigure();
                return;
            }
            e => {
                log::error!("Unable to render {:?}", e);
                return;
            }
        };
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let (colour_load, depth_load) = if clear {
            (wgpu::LoadOp::Clear(self.clear_colour), wgpu::LoadOp::Clear(1.0))
        } else {
            (wgpu::LoadOp::Load, wgpu::LoadOp::Load)
        };
        let width = self.viewport.0.clamp(1, self.config.width);
        let height = self.viewport.1.clamp(1, self.config.height);

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Render Encoder"),
            });
        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Render Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: colour_load,
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.depth_texture.view,
                    depth_ops: Some(wgpu::Operations {
                        load: depth_load,
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
                multiview_mask: None,
            });
            render_pass.set_viewport(0.0, 0.0, width as f32, height as f32, 0.0, 1.0);

            for draw in &draws {
                render_pass.set_pipeline(&draw.program.pipeline);
                render_pass.set_bind_group(0, &draw.bind_group, &[]);
                for (slot, buffer) in draw.vertex_buffers.iter().enumerate() {
                    render_pass.set_vertex_buffer(slot as u32, buffer.slice(..));
                }
                match &draw.primitive {
                    Primitive::Arrays { vertex_count } => render_pass.draw(0..*vertex_count, 0..1),
                    Primitive::Elements {
                        buffer,
                        index_count,
                    } => {
                        render_pass.set_index_buffer(buffer.slice(..), wgpu::IndexFormat::Uint16);
                        render_pass.draw_indexed(0..*index_count, 0, 0..1);
                    }
                }
            }
        }

        self.queue.submit(iter::once(encoder.finish()));
        output.present();
    }
}

//! Program linking: checking two reflected stages against each other and the
//! caller's attribute list, then building the wgpu pipeline for them.

use std::borrow::Cow;

use crate::{
    data_structures::texture::Texture,
    device::VertexAttribute,
    pipelines::reflect::{CompiledStage, StageInterface},
};

/// A vertex buffer slot. Slots are numbered in attribute order, skipping
/// attributes the vertex stage does not read.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AttributeSlot {
    pub name: String,
    pub shader_location: u32,
    pub components: u32,
}

/// What a uniform location refers to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UniformSlot {
    /// A member of the uniform block.
    Member { offset: u32, span: u32 },
    /// A texture binding; samplers are bound next to it.
    Texture { binding: u32 },
}

/// The GPU independent half of a linked program.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ProgramLayout {
    pub slots: Vec<AttributeSlot>,
    pub uniforms: Vec<(String, UniformSlot)>,
    /// `(binding, size)` of the uniform block, if any stage declares one.
    pub uniform_block: Option<(u32, u32)>,
    pub texture_binding: Option<u32>,
    pub sampler_bindings: Vec<u32>,
}

impl ProgramLayout {
    /// Match the stages against each other and against `attributes`.
    ///
    /// Fails with a log of every problem found when a vertex input has no
    /// attribute feeding it, a fragment input is not written by the vertex
    /// stage, the stages disagree on the uniform block, or a resource sits
    /// outside bind group 0.
    pub fn link(
        vertex: &StageInterface,
        fragment: &StageInterface,
        attributes: &[VertexAttribute],
    ) -> Result<Self, String> {
        let mut errors = Vec::new();

        let slots: Vec<_> = attributes
            .iter()
            .filter_map(|attribute| {
                let input = vertex.inputs.iter().find(|input| input.name == attribute.name)?;
                Some(AttributeSlot {
                    name: attribute.name.to_string(),
                    shader_location: input.location,
                    components: attribute.components,
                })
            })
            .collect();
        for slot in &slots {
            if !(1..=4).contains(&slot.components) {
                errors.push(format!(
                    "attribute `{}` has {} components, expected 1 to 4",
                    slot.name, slot.components
                ));
            }
        }
        for input in &vertex.inputs {
            if !attributes.iter().any(|attribute| attribute.name == input.name) {
                errors.push(format!(
                    "vertex input `{}` at location {} is not fed by any attribute",
                    input.name, input.location
                ));
            }
        }
        for input in &fragment.inputs {
            if !vertex.outputs.iter().any(|output| output.location == input.location) {
                errors.push(format!(
                    "fragment input `{}` at location {} is not written by the vertex stage",
                    input.name, input.location
                ));
            }
        }
        for (name, group) in vertex.foreign_groups.iter().chain(&fragment.foreign_groups) {
            errors.push(format!("`{}` is bound in group {}, only group 0 is available", name, group));
        }
        for name in vertex.unsupported.iter().chain(&fragment.unsupported) {
            errors.push(format!("`{}` is neither a uniform block, a texture nor a sampler", name));
        }

        let block = match (&vertex.uniform, &fragment.uniform) {
            (Some(v), Some(f)) if v != f => {
                errors.push("the stages declare different uniform blocks".to_string());
                None
            }
            (v, f) => v.as_ref().or(f.as_ref()),
        };

        let mut textures: Vec<_> = vertex.textures.iter().chain(&fragment.textures).collect();
        textures.sort_by_key(|texture| texture.binding);
        textures.dedup_by_key(|texture| texture.binding);
        if textures.len() > 1 {
            errors.push(format!("{} textures declared, at most one is supported", textures.len()));
        }
        let mut sampler_bindings: Vec<_> = vertex
            .samplers
            .iter()
            .chain(&fragment.samplers)
            .map(|sampler| sampler.binding)
            .collect();
        sampler_bindings.sort_unstable();
        sampler_bindings.dedup();

        let mut taken: Vec<_> = block
            .map(|block| block.binding)
            .into_iter()
            .chain(textures.iter().map(|texture| texture.binding))
            .chain(sampler_bindings.iter().copied())
            .collect();
        let declared = taken.len();
        taken.sort_unstable();
        taken.dedup();
        if taken.len() != declared {
            errors.push("two resources share a binding".to_string());
        }

        if !errors.is_empty() {
            return Err(errors.join("\n"));
        }

        let mut uniforms = Vec::new();
        if let Some(block) = block {
            uniforms.extend(block.members.iter().map(|member| {
                (
                    member.name.clone(),
                    UniformSlot::Member {
                        offset: member.offset,
                        span: member.span,
                    },
                )
            }));
        }
        uniforms.extend(textures.iter().map(|texture| {
            (
                texture.name.clone(),
                UniformSlot::Texture {
                    binding: texture.binding,
                },
            )
        }));

        Ok(Self {
            slots,
            uniforms,
            uniform_block: block.map(|block| (block.binding, block.size)),
            texture_binding: textures.first().map(|texture| texture.binding),
            sampler_bindings,
        })
    }

    pub fn attribute_slot(&self, name: &str) -> Option<u32> {
        self.slots
            .iter()
            .position(|slot| slot.name == name)
            .map(|slot| slot as u32)
    }

    pub fn uniform_slot(&self, name: &str) -> Option<u32> {
        self.uniforms
            .iter()
            .position(|(uniform, _)| uniform == name)
            .map(|slot| slot as u32)
    }
}

/// A linked program: its layout plus the pipeline drawing with it.
#[derive(Debug)]
pub struct LinkedProgram {
    pub id: u64,
    pub layout: ProgramLayout,
    pub bind_group_layout: wgpu::BindGroupLayout,
    pub pipeline: wgpu::RenderPipeline,
}

impl LinkedProgram {
    pub fn new(
        device: &wgpu::Device,
        id: u64,
        layout: ProgramLayout,
        vertex: &CompiledStage,
        fragment: &CompiledStage,
        color_format: wgpu::TextureFormat,
    ) -> Self {
        let bind_group_layout = mk_bind_group_layout(device, &layout);
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Program Pipeline Layout"),
            bind_group_layouts: &[Some(&bind_group_layout)],
            immediate_size: 0,
        });

        let attributes: Vec<_> = layout
            .slots
            .iter()
            .map(|slot| {
                [wgpu::VertexAttribute {
                    format: vertex_format(slot.components),
                    offset: 0,
                    shader_location: slot.shader_location,
                }]
            })
            .collect();
        let vertex_layouts: Vec<_> = layout
            .slots
            .iter()
            .zip(&attributes)
            .map(|(slot, attributes)| wgpu::VertexBufferLayout {
                array_stride: (slot.components as usize * std::mem::size_of::<f32>()) as wgpu::BufferAddress,
                step_mode: wgpu::VertexStepMode::Vertex,
                attributes,
            })
            .collect();

        let pipeline = mk_render_pipeline(
            device,
            &pipeline_layout,
            color_format,
            Some(wgpu::BlendState::REPLACE),
            Some(Texture::DEPTH_FORMAT),
            &vertex_layouts,
            vertex,
            fragment,
        );

        Self {
            id,
            layout,
            bind_group_layout,
            pipeline,
        }
    }
}

fn vertex_format(components: u32) -> wgpu::VertexFormat {
    match components {
        1 => wgpu::VertexFormat::Float32,
        2 => wgpu::VertexFormat::Float32x2,
        3 => wgpu::VertexFormat::Float32x3,
        _ => wgpu::VertexFormat::Float32x4,
    }
}

fn mk_bind_group_layout(device: &wgpu::Device, layout: &ProgramLayout) -> wgpu::BindGroupLayout {
    let mut entries = Vec::new();
    if let Some((binding, _)) = layout.uniform_block {
        entries.push(wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        });
    }
    if let Some(binding) = layout.texture_binding {
        entries.push(wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
            ty: wgpu::BindingType::Texture {
                multisampled: false,
                view_dimension: wgpu::TextureViewDimension::D2,
                sample_type: wgpu::TextureSampleType::Float { filterable: true },
            },
            count: None,
        });
    }
    for &binding in &layout.sampler_bindings {
        entries.push(wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
            ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
            count: None,
        });
    }
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("program_bind_group_layout"),
        entries: &entries,
    })
}

#[allow(clippy::too_many_arguments)]
pub fn mk_render_pipeline(
    device: &wgpu::Device,
    layout: &wgpu::PipelineLayout,
    color_format: wgpu::TextureFormat,
    blend: Option<wgpu::BlendState>,
    depth_format: Option<wgpu::TextureFormat>,
    vertex_layouts: &[wgpu::VertexBufferLayout],
    vertex: &CompiledStage,
    fragment: &CompiledStage,
) -> wgpu::RenderPipeline {
    let vertex_module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some("Vertex Shader"),
        source: wgpu::ShaderSource::Wgsl(Cow::Borrowed(&vertex.source)),
    });
    let fragment_module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some("Fragment Shader"),
        source: wgpu::ShaderSource::Wgsl(Cow::Borrowed(&fragment.source)),
    });

    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        cache: None,
        label: Some("Render Pipeline"),
        layout: Some(layout),
        vertex: wgpu::VertexState {
            module: &vertex_module,
            entry_point: Some(vertex.entry_point.as_str()),
            buffers: vertex_layouts,
            compilation_options: Default::default(),
        },
        fragment: Some(wgpu::FragmentState {
            module: &fragment_module,
            entry_point: Some(fragment.entry_point.as_str()),
            targets: &[Some(wgpu::ColorTargetState {
                format: color_format,
                blend,
                write_mask: wgpu::ColorWrites::ALL,
            })],
            compilation_options: Default::default(),
        }),
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            strip_index_format: None,
            front_face: wgpu::FrontFace::Ccw,
            // Entities spin, so both faces show up.
            cull_mode: None,
            polygon_mode: wgpu::PolygonMode::Fill,
            unclipped_depth: false,
            conservative: false,
        },
        depth_stencil: depth_format.map(|format| wgpu::DepthStencilState {
            format,
            depth_write_enabled: Some(true),
            depth_compare: Some(wgpu::CompareFunction::Less),
            stencil: wgpu::StencilState::default(),
            bias: wgpu::DepthBiasState::default(),
        }),
        multisample: wgpu::MultisampleState {
            count: 1,
            mask: !0,
            alpha_to_coverage_enabled: false,
        },
        multiview_mask: None,
    })
}

//! WGSL compilation and interface reflection.
//!
//! A stage "compiles" when naga parses and validates it and it has an entry
//! point for the requested stage. The reflected [`StageInterface`] is what
//! linking works with: vertex inputs by name, inter-stage locations, the
//! uniform block and the texture/sampler bindings.

use naga::{AddressSpace, Binding, Handle, Module, Type, TypeInner};

use crate::errors::ShaderStage;

/// A `@location` on an entry point's inputs or outputs.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Location {
    pub name: String,
    pub location: u32,
}

/// One member of the uniform block.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UniformMember {
    pub name: String,
    pub offset: u32,
    /// Bytes up to the next member (or the end of the block).
    pub span: u32,
}

/// The `var<uniform>` struct a program reads its matrices from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UniformBlock {
    pub binding: u32,
    pub size: u32,
    pub members: Vec<UniformMember>,
}

/// A texture or sampler global.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResourceBinding {
    pub name: String,
    pub binding: u32,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StageInterface {
    pub inputs: Vec<Location>,
    pub outputs: Vec<Location>,
    pub uniform: Option<UniformBlock>,
    pub textures: Vec<ResourceBinding>,
    pub samplers: Vec<ResourceBinding>,
    /// Bound globals outside group 0, as `(name, group)`.
    pub foreign_groups: Vec<(String, u32)>,
    /// Globals of a kind a program cannot bind (storage buffers and the like).
    pub unsupported: Vec<String>,
}

/// A successfully compiled stage.
#[derive(Clone, Debug)]
pub struct CompiledStage {
    pub stage: ShaderStage,
    pub source: String,
    pub entry_point: String,
    pub interface: StageInterface,
}

/// Parse, validate and reflect `source`. The error is a human readable log.
pub fn compile_stage(stage: ShaderStage, source: &str) -> Result<CompiledStage, String> {
    let module = naga::front::wgsl::parse_str(source).map_err(|e| e.emit_to_string(source))?;
    naga::valid::Validator::new(
        naga::valid::ValidationFlags::all(),
        naga::valid::Capabilities::all(),
    )
    .validate(&module)
    .map_err(|e| e.into_inner().to_string())?;

    let wanted = match stage {
        ShaderStage::Vertex => naga::ShaderStage::Vertex,
        ShaderStage::Fragment => naga::ShaderStage::Fragment,
    };
    let entry = module
        .entry_points
        .iter()
        .find(|entry| entry.stage == wanted)
        .ok_or_else(|| format!("no @{} entry point", stage))?;

    let mut interface = StageInterface::default();
    for argument in &entry.function.arguments {
        collect_locations(
            &module,
            argument.name.as_deref(),
            argument.ty,
            argument.binding.as_ref(),
            &mut interface.inputs,
        );
    }
    if let Some(result) = &entry.function.result {
        collect_locations(&module, None, result.ty, result.binding.as_ref(), &mut interface.outputs);
    }
    reflect_globals(&module, &mut interface);

    Ok(CompiledStage {
        stage,
        source: source.to_string(),
        entry_point: entry.name.clone(),
        interface,
    })
}

/// Locations are either on the value itself or on the members of a struct.
fn collect_locations(
    module: &Module,
    name: Option<&str>,
    ty: Handle<Type>,
    binding: Option<&Binding>,
    out: &mut Vec<Location>,
) {
    match binding {
        Some(Binding::Location { location, .. }) => out.push(Location {
            name: name.unwrap_or_default().to_string(),
            location: *location,
        }),
        Some(Binding::BuiltIn(_)) => {}
        None => {
            if let TypeInner::Struct { members, .. } = &module.types[ty].inner {
                for member in members {
                    collect_locations(module, member.name.as_deref(), member.ty, member.binding.as_ref(), out);
                }
            }
        }
    }
}

fn reflect_globals(module: &Module, interface: &mut StageInterface) {
    for (_, global) in module.global_variables.iter() {
        let Some(binding) = &global.binding else {
            continue;
        };
        let name = global.name.clone().unwrap_or_default();
        if binding.group != 0 {
            interface.foreign_groups.push((name, binding.group));
            continue;
        }
        match (&global.space, &module.types[global.ty].inner) {
            (AddressSpace::Uniform, TypeInner::Struct { members, span }) => {
                let members = members
                    .iter()
                    .enumerate()
                    .map(|(i, member)| {
                        let end = members.get(i + 1).map_or(*span, |next| next.offset);
                        UniformMember {
                            name: member.name.clone().unwrap_or_default(),
                            offset: member.offset,
                            span: end - member.offset,
                        }
                    })
                    .collect();
                interface.uniform = Some(UniformBlock {
                    binding: binding.binding,
                    size: *span,
                    members,
                });
            }
            (_, TypeInner::Image { .. }) => interface.textures.push(ResourceBinding {
                name,
                binding: binding.binding,
            }),
            (_, TypeInner::Sampler { .. }) => interface.samplers.push(ResourceBinding {
                name,
                binding: binding.binding,
            }),
            _ => interface.unsupported.push(name),
        }
    }
}

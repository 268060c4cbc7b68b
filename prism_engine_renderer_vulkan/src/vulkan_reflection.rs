/// SPIR-V reflection with spirq
///
/// Turns the resources a shader entry point declares into a [`ShaderReflection`]:
/// uniform blocks with their members, combined image samplers, push constant
/// blocks and the stage interface (location + format).

use prism_engine::graphics_device::{
    is_per_object_name, BindingKey, BufferFormat, ReflectedPushConstant, ReflectedSampler,
    ReflectedUniform, SamplerDimension, ShaderReflection, StageVariable, UniformMember,
};
use prism_engine::prism::{Error, Result};
use prism_engine::{engine_bail, engine_err, engine_warn};
use spirq::ty::{DescriptorType, ScalarType, Type};
use spirq::var::Variable;

/// Reflect the entry point named `entry_point` out of `words`
pub(crate) fn reflect_shader(shader_name: &str, words: &[u32], entry_point: &str) -> Result<ShaderReflection> {
    let entry_points = spirq::ReflectConfig::new()
        .spv(words)
        .ref_all_rscs(true)
        .reflect()
        .map_err(|e| engine_err!("prism::vulkan" => Error::InvalidResource,
            "SPIR-V reflection of '{}' failed: {:?}", shader_name, e))?;

    let Some(entry) = entry_points.iter().find(|ep| ep.name == entry_point) else {
        engine_bail!("prism::vulkan" => Error::InvalidResource,
            "Shader '{}' has no entry point named '{}'", shader_name, entry_point);
    };

    let mut reflection = ShaderReflection::default();

    for var in &entry.vars {
        match var {
            Variable::Descriptor { name, desc_bind, desc_ty, ty, nbind } => {
                let name = name.clone().unwrap_or_default();
                let key = BindingKey::new(desc_bind.set(), desc_bind.bind());
                match desc_ty {
                    DescriptorType::UniformBuffer() => {
                        let block_name = struct_name(ty).unwrap_or_default();
                        reflection.uniforms.push(ReflectedUniform {
                            per_object: is_per_object_name(&name) || is_per_object_name(&block_name),
                            name,
                            key,
                            size: ty.nbyte().unwrap_or(0) as u32,
                            count: (*nbind).max(1),
                            members: uniform_members(ty),
                        });
                    }
                    DescriptorType::CombinedImageSampler() => {
                        reflection.samplers.push(ReflectedSampler {
                            name,
                            key,
                            // spirq reports 0 bindings for a runtime-sized array
                            count: (*nbind != 0).then_some(*nbind),
                            dimension: sampler_dimension(ty),
                        });
                    }
                    other => {
                        engine_warn!("prism::vulkan",
                            "Shader '{}': ignoring unsupported descriptor '{}' {} of type {:?}",
                            shader_name, name, key, other);
                    }
                }
            }
            Variable::PushConstant { name, ty } => {
                let (offset, end) = push_constant_extent(ty);
                reflection.push_constants.push(ReflectedPushConstant {
                    name: name.clone().unwrap_or_default(),
                    offset,
                    size: end.saturating_sub(offset),
                });
            }
            Variable::Input { location, ty, .. } => {
                if let Some(format) = interface_format(ty) {
                    reflection.inputs.push(StageVariable { location: location.loc(), format });
                }
            }
            Variable::Output { location, ty, .. } => {
                if let Some(format) = interface_format(ty) {
                    reflection.outputs.push(StageVariable { location: location.loc(), format });
                }
            }
            _ => {}
        }
    }

    reflection.uniforms.sort_by_key(|u| u.key);
    reflection.samplers.sort_by_key(|s| s.key);
    reflection.inputs.sort_by_key(|v| v.location);
    reflection.outputs.sort_by_key(|v| v.location);

    Ok(reflection)
}

fn struct_name(ty: &Type) -> Option<String> {
    match ty {
        Type::Struct(st) => st.name.clone(),
        _ => None,
    }
}

fn uniform_members(ty: &Type) -> Vec<UniformMember> {
    let Type::Struct(st) = ty else {
        return Vec::new();
    };
    st.members
        .iter()
        .map(|m| UniformMember {
            name: m.name.clone().unwrap_or_default(),
            offset: m.offset.unwrap_or(0) as u32,
            size: m.ty.nbyte().unwrap_or(0) as u32,
        })
        .collect()
}

/// Byte range a push constant block covers: first member offset to the block end
///
/// A stage that only declares the tail of a shared block still reports the
/// absolute offsets, so ranges from different stages line up.
fn push_constant_extent(ty: &Type) -> (u32, u32) {
    let Type::Struct(st) = ty else {
        return (0, ty.nbyte().unwrap_or(0) as u32);
    };
    let offset = st
        .members
        .iter()
        .filter_map(|m| m.offset)
        .min()
        .unwrap_or(0) as u32;
    let end = st
        .members
        .iter()
        .map(|m| m.offset.unwrap_or(0) + m.ty.nbyte().unwrap_or(0))
        .max()
        .unwrap_or(0) as u32;
    (offset, end)
}

fn sampler_dimension(ty: &Type) -> SamplerDimension {
    match ty {
        Type::CombinedImageSampler(cis) if cis.sampled_image_ty.dim == spirq::spirv::Dim::DimCube => {
            SamplerDimension::Cube
        }
        _ => SamplerDimension::Texture2D,
    }
}

/// Vertex-attribute style format of an interface variable
pub(crate) fn interface_format(ty: &Type) -> Option<BufferFormat> {
    match ty {
        Type::Scalar(scalar) => scalar_format(scalar, 1),
        Type::Vector(vector) => scalar_format(&vector.scalar_ty, vector.nscalar),
        _ => None,
    }
}

fn scalar_format(scalar: &ScalarType, components: u32) -> Option<BufferFormat> {
    match scalar {
        ScalarType::Float { bits: 32 } => BufferFormat::float(components),
        ScalarType::Integer { bits: 32, is_signed: true } => match components {
            1 => Some(BufferFormat::R32_SINT),
            2 => Some(BufferFormat::R32G32_SINT),
            3 => Some(BufferFormat::R32G32B32_SINT),
            4 => Some(BufferFormat::R32G32B32A32_SINT),
            _ => None,
        },
        ScalarType::Integer { bits: 32, is_signed: false } => match components {
            1 => Some(BufferFormat::R32_UINT),
            2 => Some(BufferFormat::R32G32_UINT),
            3 => Some(BufferFormat::R32G32B32_UINT),
            4 => Some(BufferFormat::R32G32B32A32_UINT),
            _ => None,
        },
        _ => None,
    }
}

#[cfg(test)]
#[path = "vulkan_reflection_tests.rs"]
mod tests;

/// Pipeline - graphics pipeline plus the layout it was created with

use ash::vk;
use prism_engine::graphics_device::{PipelineDesc, PushConstantRange};
use prism_engine::prism::{Error, Result};
use prism_engine::{engine_bail, engine_err};
use std::ffi::CStr;

use crate::vulkan_format::{
    buffer_format_to_vk, compare_op_to_vk, cull_mode_to_vk, front_face_to_vk, polygon_mode_to_vk,
    stage_flags_to_vk, topology_to_vk,
};

/// Vulkan graphics pipeline
pub(crate) struct Pipeline {
    pub pipeline: vk::Pipeline,
    pub layout: vk::PipelineLayout,
    /// Push constant ranges of the layout, checked before recording push constants
    pub push_constant_ranges: Vec<PushConstantRange>,
    pub set_count: u32,
}

/// A shader stage resolved to its Vulkan module
pub(crate) struct StageModule<'a> {
    pub module: vk::ShaderModule,
    pub stage: vk::ShaderStageFlags,
    pub entry_point: &'a CStr,
}

impl Pipeline {
    /// Create layout and pipeline for `render_pass`, subpass 0
    ///
    /// Viewport and scissor are dynamic, so the pipeline survives swapchain resizes.
    pub fn new(
        device: &ash::Device,
        render_pass: vk::RenderPass,
        desc: &PipelineDesc,
        stages: &[StageModule],
        set_layouts: &[vk::DescriptorSetLayout],
    ) -> Result<Self> {
        if stages.is_empty() {
            engine_bail!("prism::vulkan" => Error::InvalidResource,
                "Pipeline '{}' has no shader stages", desc.name);
        }

        unsafe {
            let shader_stages: Vec<vk::PipelineShaderStageCreateInfo> = stages
                .iter()
                .map(|s| {
                    vk::PipelineShaderStageCreateInfo::default()
                        .stage(s.stage)
                        .module(s.module)
                        .name(s.entry_point)
                })
                .collect();

            // Vertex input state (single interleaved binding)
            let vertex_bindings = [vk::VertexInputBindingDescription {
                binding: 0,
                stride: desc.vertex_layout.stride,
                input_rate: vk::VertexInputRate::VERTEX,
            }];
            let vertex_attributes: Vec<vk::VertexInputAttributeDescription> = desc.vertex_layout.attributes
                .iter()
                .map(|attribute| vk::VertexInputAttributeDescription {
                    location: attribute.location,
                    binding: 0,
                    format: buffer_format_to_vk(attribute.format),
                    offset: attribute.offset,
                })
                .collect();

            let mut vertex_input_state = vk::PipelineVertexInputStateCreateInfo::default();
            if !vertex_attributes.is_empty() {
                vertex_input_state = vertex_input_state
                    .vertex_binding_descriptions(&vertex_bindings)
                    .vertex_attribute_descriptions(&vertex_attributes);
            }

            let input_assembly_state = vk::PipelineInputAssemblyStateCreateInfo::default()
                .topology(topology_to_vk(desc.topology))
                .primitive_restart_enable(false);

            // Viewport state (dynamic)
            let viewports = [vk::Viewport::default()];
            let scissors = [vk::Rect2D::default()];
            let viewport_state = vk::PipelineViewportStateCreateInfo::default()
                .viewports(&viewports)
                .scissors(&scissors);

            let rasterization_state = vk::PipelineRasterizationStateCreateInfo::default()
                .depth_clamp_enable(false)
                .rasterizer_discard_enable(false)
                .polygon_mode(polygon_mode_to_vk(desc.rasterization.polygon_mode))
                .line_width(1.0)
                .cull_mode(cull_mode_to_vk(desc.rasterization.cull_mode))
                .front_face(front_face_to_vk(desc.rasterization.front_face))
                .depth_bias_enable(false);

            let depth_stencil_state = vk::PipelineDepthStencilStateCreateInfo::default()
                .depth_test_enable(desc.depth.test_enable)
                .depth_write_enable(desc.depth.write_enable)
                .depth_compare_op(compare_op_to_vk(desc.depth.compare_op))
                .depth_bounds_test_enable(false)
                .stencil_test_enable(false);

            let multisample_state = vk::PipelineMultisampleStateCreateInfo::default()
                .sample_shading_enable(false)
                .rasterization_samples(vk::SampleCountFlags::TYPE_1);

            let mut color_blend_attachment = vk::PipelineColorBlendAttachmentState::default()
                .color_write_mask(vk::ColorComponentFlags::RGBA)
                .blend_enable(desc.color_blend.alpha_blend);
            if desc.color_blend.alpha_blend {
                color_blend_attachment = color_blend_attachment
                    .src_color_blend_factor(vk::BlendFactor::SRC_ALPHA)
                    .dst_color_blend_factor(vk::BlendFactor::ONE_MINUS_SRC_ALPHA)
                    .color_blend_op(vk::BlendOp::ADD)
                    .src_alpha_blend_factor(vk::BlendFactor::ONE)
                    .dst_alpha_blend_factor(vk::BlendFactor::ZERO)
                    .alpha_blend_op(vk::BlendOp::ADD);
            }
            let color_blend_state = vk::PipelineColorBlendStateCreateInfo::default()
                .logic_op_enable(false)
                .attachments(std::slice::from_ref(&color_blend_attachment));

            let dynamic_states = [vk::DynamicState::VIEWPORT, vk::DynamicState::SCISSOR];
            let dynamic_state = vk::PipelineDynamicStateCreateInfo::default()
                .dynamic_states(&dynamic_states);

            let push_constant_ranges: Vec<vk::PushConstantRange> = desc.push_constant_ranges
                .iter()
                .map(|range| vk::PushConstantRange {
                    stage_flags: stage_flags_to_vk(range.stages),
                    offset: range.offset,
                    size: range.size,
                })
                .collect();

            let layout_create_info = vk::PipelineLayoutCreateInfo::default()
                .set_layouts(set_layouts)
                .push_constant_ranges(&push_constant_ranges);

            let layout = device.create_pipeline_layout(&layout_create_info, None)
                .map_err(|e| engine_err!("prism::vulkan",
                    "Failed to create pipeline layout for '{}': {:?}", desc.name, e))?;

            let pipeline_create_info = vk::GraphicsPipelineCreateInfo::default()
                .stages(&shader_stages)
                .vertex_input_state(&vertex_input_state)
                .input_assembly_state(&input_assembly_state)
                .viewport_state(&viewport_state)
                .rasterization_state(&rasterization_state)
                .depth_stencil_state(&depth_stencil_state)
                .multisample_state(&multisample_state)
                .color_blend_state(&color_blend_state)
                .dynamic_state(&dynamic_state)
                .layout(layout)
                .render_pass(render_pass)
                .subpass(0);

            let pipeline = match device.create_graphics_pipelines(
                vk::PipelineCache::null(),
                &[pipeline_create_info],
                None,
            ) {
                Ok(pipelines) => pipelines[0],
                Err((_, e)) => {
                    device.destroy_pipeline_layout(layout, None);
                    engine_bail!("prism::vulkan", "Failed to create graphics pipeline '{}': {:?}", desc.name, e);
                }
            };

            Ok(Self {
                pipeline,
                layout,
                push_constant_ranges: desc.push_constant_ranges.clone(),
                set_count: set_layouts.len() as u32,
            })
        }
    }

    /// # Safety
    ///
    /// No pending command buffer may reference the pipeline.
    pub unsafe fn destroy(self, device: &ash::Device) {
        device.destroy_pipeline(self.pipeline, None);
        device.destroy_pipeline_layout(self.layout, None);
    }
}

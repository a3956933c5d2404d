// Graphics pipeline creation and management
//
// The graphics pipeline defines how vertices are processed and rasterized.
// It includes: vertex input, shaders, rasterization, depth/stencil, blending.
//
// Viewport and scissor are dynamic state, so a pipeline built against the
// first swapchain keeps working after every resize.

use anyhow::{Context, Result};
use ash::vk;
use std::ffi::CStr;
use std::path::Path;
use std::sync::Arc;

use super::{shader, VulkanDevice};
use crate::model::Vertex;

/// Fixed-function settings for a graphics pipeline
pub struct PipelineConfig {
    pub binding_descriptions: Vec<vk::VertexInputBindingDescription>,
    pub attribute_descriptions: Vec<vk::VertexInputAttributeDescription>,
    pub topology: vk::PrimitiveTopology,
    pub polygon_mode: vk::PolygonMode,
    pub cull_mode: vk::CullModeFlags,
    pub front_face: vk::FrontFace,
    pub depth_test: bool,
    pub depth_compare_op: vk::CompareOp,
    pub dynamic_states: Vec<vk::DynamicState>,
    pub render_pass: vk::RenderPass,
    pub pipeline_layout: vk::PipelineLayout,
    pub subpass: u32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            binding_descriptions: Vertex::binding_descriptions(),
            attribute_descriptions: Vertex::attribute_descriptions(),
            topology: vk::PrimitiveTopology::TRIANGLE_LIST,
            polygon_mode: vk::PolygonMode::FILL,
            cull_mode: vk::CullModeFlags::NONE,
            front_face: vk::FrontFace::CLOCKWISE,
            depth_test: true,
            depth_compare_op: vk::CompareOp::LESS, // Closer objects win
            dynamic_states: vec![vk::DynamicState::VIEWPORT, vk::DynamicState::SCISSOR],
            render_pass: vk::RenderPass::null(),
            pipeline_layout: vk::PipelineLayout::null(),
            subpass: 0,
        }
    }
}

pub struct Pipeline {
    pipeline: vk::Pipeline,
    device: Arc<VulkanDevice>,
}

impl Pipeline {
    pub fn new(
        device: Arc<VulkanDevice>,
        vert_path: &Path,
        frag_path: &Path,
        config: &PipelineConfig,
    ) -> Result<Self> {
        anyhow::ensure!(
            config.render_pass != vk::RenderPass::null(),
            "Cannot create graphics pipeline: no render pass in config"
        );
        anyhow::ensure!(
            config.pipeline_layout != vk::PipelineLayout::null(),
            "Cannot create graphics pipeline: no pipeline layout in config"
        );

        let vert_shader = shader::create_shader_module(&device, vert_path)?;
        let frag_shader = match shader::create_shader_module(&device, frag_path) {
            Ok(module) => module,
            Err(e) => {
                unsafe { device.device.destroy_shader_module(vert_shader, None) };
                return Err(e);
            }
        };

        let pipeline = create_graphics_pipeline(&device, vert_shader, frag_shader, config);

        // Modules are only needed while the pipeline is being built
        unsafe {
            device.device.destroy_shader_module(vert_shader, None);
            device.device.destroy_shader_module(frag_shader, None);
        }

        log::debug!("Created graphics pipeline from {:?} and {:?}", vert_path, frag_path);

        Ok(Self {
            pipeline: pipeline?,
            device,
        })
    }

    pub fn bind(&self, command_buffer: vk::CommandBuffer) {
        unsafe {
            self.device.device.cmd_bind_pipeline(
                command_buffer,
                vk::PipelineBindPoint::GRAPHICS,
                self.pipeline,
            );
        }
    }
}

impl Drop for Pipeline {
    fn drop(&mut self) {
        unsafe {
            self.device.device.destroy_pipeline(self.pipeline, None);
        }
    }
}

fn create_graphics_pipeline(
    device: &VulkanDevice,
    vert_shader: vk::ShaderModule,
    frag_shader: vk::ShaderModule,
    config: &PipelineConfig,
) -> Result<vk::Pipeline> {
    // Shader stages
    let entry_point = unsafe { CStr::from_bytes_with_nul_unchecked(b"main\0") };

    let vert_stage = vk::PipelineShaderStageCreateInfo::builder()
        .stage(vk::ShaderStageFlags::VERTEX)
        .module(vert_shader)
        .name(entry_point)
        .build();

    let frag_stage = vk::PipelineShaderStageCreateInfo::builder()
        .stage(vk::ShaderStageFlags::FRAGMENT)
        .module(frag_shader)
        .name(entry_point)
        .build();

    let shader_stages = &[vert_stage, frag_stage];

    // Vertex input
    let vertex_input_info = vk::PipelineVertexInputStateCreateInfo::builder()
        .vertex_binding_descriptions(&config.binding_descriptions)
        .vertex_attribute_descriptions(&config.attribute_descriptions);

    // Input assembly
    let input_assembly = vk::PipelineInputAssemblyStateCreateInfo::builder()
        .topology(config.topology)
        .primitive_restart_enable(false);

    // Viewport and scissor are set per frame; only the counts live here
    let viewport_state = vk::PipelineViewportStateCreateInfo::builder()
        .viewport_count(1)
        .scissor_count(1);

    // Rasterization
    let rasterizer = vk::PipelineRasterizationStateCreateInfo::builder()
        .depth_clamp_enable(false)
        .rasterizer_discard_enable(false)
        .polygon_mode(config.polygon_mode)
        .line_width(1.0)
        .cull_mode(config.cull_mode)
        .front_face(config.front_face)
        .depth_bias_enable(false);

    // Multisampling (disabled)
    let multisampling = vk::PipelineMultisampleStateCreateInfo::builder()
        .sample_shading_enable(false)
        .rasterization_samples(vk::SampleCountFlags::TYPE_1);

    let depth_stencil = vk::PipelineDepthStencilStateCreateInfo::builder()
        .depth_test_enable(config.depth_test)
        .depth_write_enable(config.depth_test)
        .depth_compare_op(config.depth_compare_op)
        .depth_bounds_test_enable(false)
        .stencil_test_enable(false);

    // Color blending (no blending, opaque)
    let color_blend_attachment = vk::PipelineColorBlendAttachmentState::builder()
        .color_write_mask(vk::ColorComponentFlags::RGBA)
        .blend_enable(false)
        .build();

    let color_blend_attachments = &[color_blend_attachment];
    let color_blending = vk::PipelineColorBlendStateCreateInfo::builder()
        .logic_op_enable(false)
        .attachments(color_blend_attachments);

    let dynamic_state = vk::PipelineDynamicStateCreateInfo::builder()
        .dynamic_states(&config.dynamic_states);

    let pipeline_info = vk::GraphicsPipelineCreateInfo::builder()
        .stages(shader_stages)
        .vertex_input_state(&vertex_input_info)
        .input_assembly_state(&input_assembly)
        .viewport_state(&viewport_state)
        .rasterization_state(&rasterizer)
        .multisample_state(&multisampling)
        .depth_stencil_state(&depth_stencil)
        .color_blend_state(&color_blending)
        .dynamic_state(&dynamic_state)
        .layout(config.pipeline_layout)
        .render_pass(config.render_pass)
        .subpass(config.subpass)
        .build();

    let pipelines = unsafe {
        device.device.create_graphics_pipelines(
            vk::PipelineCache::null(),
            &[pipeline_info],
            None,
        ).map_err(|(_, e)| e)
            .context("Failed to create graphics pipeline")?
    };

    Ok(pipelines[0])
}

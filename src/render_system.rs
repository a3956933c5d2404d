// Simple render system - one pipeline, one push constant block per object
//
// Only records draw commands into the command buffer it is handed.
// Acquire, submit and the render pass itself belong to the Renderer.

use anyhow::{Context, Result};
use ash::vk;
use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec4};
use std::mem::size_of;
use std::sync::Arc;

use crate::backend::{Pipeline, PipelineConfig, VulkanDevice};
use crate::camera::Camera;
use crate::config::ShaderConfig;
use crate::game_object::GameObjects;

/// Everything a render system needs for one frame
pub struct FrameInfo<'a> {
    pub frame_index: usize,
    pub frame_time: f32,
    pub command_buffer: vk::CommandBuffer,
    pub camera: &'a Camera,
}

/// Matches the `Push` block in simple_shader.vert/frag
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct SimplePushConstantData {
    pub transform: Mat4,
    pub color: Vec4,
}

const PUSH_STAGES: vk::ShaderStageFlags = vk::ShaderStageFlags::from_raw(
    vk::ShaderStageFlags::VERTEX.as_raw() | vk::ShaderStageFlags::FRAGMENT.as_raw(),
);

pub struct SimpleRenderSystem {
    pipeline: Pipeline,
    pipeline_layout: vk::PipelineLayout,
    device: Arc<VulkanDevice>,
}

impl SimpleRenderSystem {
    pub fn new(
        device: Arc<VulkanDevice>,
        render_pass: vk::RenderPass,
        shaders: &ShaderConfig,
    ) -> Result<Self> {
        let push_constant_ranges = [push_constant_range()];
        let layout_info = vk::PipelineLayoutCreateInfo::builder()
            .push_constant_ranges(&push_constant_ranges);

        let pipeline_layout = unsafe {
            device.device.create_pipeline_layout(&layout_info, None)
                .context("Failed to create pipeline layout")?
        };

        let config = PipelineConfig {
            render_pass,
            pipeline_layout,
            ..Default::default()
        };

        let pipeline = match Pipeline::new(device.clone(), &shaders.vertex, &shaders.fragment, &config) {
            Ok(pipeline) => pipeline,
            Err(e) => {
                unsafe { device.device.destroy_pipeline_layout(pipeline_layout, None) };
                return Err(e);
            }
        };

        Ok(Self {
            pipeline,
            pipeline_layout,
            device,
        })
    }

    pub fn render_game_objects(&self, frame_info: &FrameInfo, game_objects: &GameObjects) {
        let command_buffer = frame_info.command_buffer;
        self.pipeline.bind(command_buffer);

        let projection_view = frame_info.camera.projection_view();

        for obj in game_objects.iter() {
            let Some(model) = &obj.model else {
                continue;
            };

            let push = SimplePushConstantData {
                transform: projection_view * obj.transform.mat4(),
                color: obj.color.extend(1.0),
            };

            unsafe {
                self.device.device.cmd_push_constants(
                    command_buffer,
                    self.pipeline_layout,
                    PUSH_STAGES,
                    0,
                    bytemuck::bytes_of(&push),
                );
            }
            model.bind(command_buffer);
            model.draw(command_buffer);
        }
    }
}

impl Drop for SimpleRenderSystem {
    fn drop(&mut self) {
        unsafe {
            self.device.device.destroy_pipeline_layout(self.pipeline_layout, None);
        }
    }
}

fn push_constant_range() -> vk::PushConstantRange {
    vk::PushConstantRange::builder()
        .stage_flags(PUSH_STAGES)
        .offset(0)
        .size(size_of::<SimplePushConstantData>() as u32)
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    #[test]
    fn push_constants_fit_the_guaranteed_minimum() {
        // Every Vulkan implementation offers at least 128 bytes
        assert_eq!(size_of::<SimplePushConstantData>(), 80);
        let range = push_constant_range();
        assert_eq!(range.offset, 0);
        assert_eq!(range.size, 80);
    }

    #[test]
    fn push_constants_are_visible_to_both_stages() {
        let range = push_constant_range();
        assert!(range.stage_flags.contains(vk::ShaderStageFlags::VERTEX));
        assert!(range.stage_flags.contains(vk::ShaderStageFlags::FRAGMENT));
    }

    #[test]
    fn push_constant_layout_is_column_major_matrix_then_color() {
        let push = SimplePushConstantData {
            transform: Mat4::from_translation(Vec3::new(1.0, 2.0, 3.0)),
            color: Vec4::new(0.1, 0.2, 0.3, 1.0),
        };
        let floats: &[f32] = bytemuck::cast_slice(bytemuck::bytes_of(&push));
        assert_eq!(&floats[12..15], &[1.0, 2.0, 3.0]);
        assert_eq!(&floats[16..20], &[0.1, 0.2, 0.3, 1.0]);
    }
}

// Model - vertex and index buffers for one mesh
//
// Geometry is described on the CPU with a ModelBuilder and uploaded once
// into device-local memory. Drawing is indexed when the builder had indices.

use anyhow::Result;
use ash::vk;
use bytemuck::{Pod, Zeroable};
use glam::Vec3;
use std::mem::{offset_of, size_of};
use std::sync::Arc;

use crate::backend::{buffer, VulkanDevice};

/// Interleaved vertex: position (location 0) then color (location 1)
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    pub position: Vec3,
    pub color: Vec3,
}

impl Vertex {
    pub const fn new(position: Vec3, color: Vec3) -> Self {
        Self { position, color }
    }

    pub fn binding_descriptions() -> Vec<vk::VertexInputBindingDescription> {
        vec![vk::VertexInputBindingDescription::builder()
            .binding(0)
            .stride(size_of::<Vertex>() as u32)
            .input_rate(vk::VertexInputRate::VERTEX)
            .build()]
    }

    pub fn attribute_descriptions() -> Vec<vk::VertexInputAttributeDescription> {
        vec![
            vk::VertexInputAttributeDescription::builder()
                .binding(0)
                .location(0)
                .format(vk::Format::R32G32B32_SFLOAT)
                .offset(offset_of!(Vertex, position) as u32)
                .build(),
            vk::VertexInputAttributeDescription::builder()
                .binding(0)
                .location(1)
                .format(vk::Format::R32G32B32_SFLOAT)
                .offset(offset_of!(Vertex, color) as u32)
                .build(),
        ]
    }
}

/// CPU-side geometry; leave `indices` empty for non-indexed drawing
#[derive(Debug, Clone, Default)]
pub struct ModelBuilder {
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
}

impl ModelBuilder {
    /// Shift every vertex by `offset`
    pub fn translated(mut self, offset: Vec3) -> Self {
        for vertex in &mut self.vertices {
            vertex.position += offset;
        }
        self
    }

    fn validate(&self) -> Result<()> {
        anyhow::ensure!(
            self.vertices.len() >= 3,
            "Model needs at least 3 vertices, got {}",
            self.vertices.len()
        );
        if let Some(&bad) = self.indices.iter().find(|&&i| i as usize >= self.vertices.len()) {
            anyhow::bail!("Index {} out of range for {} vertices", bad, self.vertices.len());
        }
        Ok(())
    }
}

pub struct Model {
    vertex_buffer: vk::Buffer,
    vertex_memory: vk::DeviceMemory,
    vertex_count: u32,
    index_buffer: Option<(vk::Buffer, vk::DeviceMemory)>,
    index_count: u32,
    device: Arc<VulkanDevice>,
}

impl Model {
    pub fn new(device: Arc<VulkanDevice>, builder: &ModelBuilder) -> Result<Self> {
        builder.validate()?;

        let (vertex_buffer, vertex_memory) = buffer::create_device_local_buffer(
            &device,
            vk::BufferUsageFlags::VERTEX_BUFFER,
            &builder.vertices,
        )?;

        let mut model = Self {
            vertex_buffer,
            vertex_memory,
            vertex_count: builder.vertices.len() as u32,
            index_buffer: None,
            index_count: 0,
            device,
        };

        if !builder.indices.is_empty() {
            model.index_buffer = Some(buffer::create_device_local_buffer(
                &model.device,
                vk::BufferUsageFlags::INDEX_BUFFER,
                &builder.indices,
            )?);
            model.index_count = builder.indices.len() as u32;
        }

        log::debug!(
            "Uploaded model: {} vertices, {} indices",
            model.vertex_count,
            model.index_count
        );

        Ok(model)
    }

    pub fn bind(&self, command_buffer: vk::CommandBuffer) {
        unsafe {
            self.device.device.cmd_bind_vertex_buffers(
                command_buffer,
                0,
                &[self.vertex_buffer],
                &[0],
            );
            if let Some((index_buffer, _)) = self.index_buffer {
                self.device.device.cmd_bind_index_buffer(
                    command_buffer,
                    index_buffer,
                    0,
                    vk::IndexType::UINT32,
                );
            }
        }
    }

    pub fn draw(&self, command_buffer: vk::CommandBuffer) {
        unsafe {
            if self.index_buffer.is_some() {
                self.device.device.cmd_draw_indexed(command_buffer, self.index_count, 1, 0, 0, 0);
            } else {
                self.device.device.cmd_draw(command_buffer, self.vertex_count, 1, 0, 0);
            }
        }
    }
}

impl Drop for Model {
    fn drop(&mut self) {
        unsafe {
            self.device.device.destroy_buffer(self.vertex_buffer, None);
            self.device.device.free_memory(self.vertex_memory, None);
            if let Some((index_buffer, index_memory)) = self.index_buffer {
                self.device.device.destroy_buffer(index_buffer, None);
                self.device.device.free_memory(index_memory, None);
            }
        }
    }
}

/// 1x1x1 cube centered at `offset`, one color per face (y points down)
pub fn cube_builder(offset: Vec3) -> ModelBuilder {
    const FACES: [(Vec3, [[f32; 3]; 4]); 6] = [
        // left (white)
        (Vec3::new(0.9, 0.9, 0.9), [[-0.5, -0.5, -0.5], [-0.5, 0.5, 0.5], [-0.5, -0.5, 0.5], [-0.5, 0.5, -0.5]]),
        // right (yellow)
        (Vec3::new(0.8, 0.8, 0.1), [[0.5, -0.5, -0.5], [0.5, 0.5, 0.5], [0.5, -0.5, 0.5], [0.5, 0.5, -0.5]]),
        // top (orange)
        (Vec3::new(0.9, 0.6, 0.1), [[-0.5, -0.5, -0.5], [0.5, -0.5, 0.5], [-0.5, -0.5, 0.5], [0.5, -0.5, -0.5]]),
        // bottom (red)
        (Vec3::new(0.8, 0.1, 0.1), [[-0.5, 0.5, -0.5], [0.5, 0.5, 0.5], [-0.5, 0.5, 0.5], [0.5, 0.5, -0.5]]),
        // nose (blue)
        (Vec3::new(0.1, 0.1, 0.8), [[-0.5, -0.5, 0.5], [0.5, 0.5, 0.5], [-0.5, 0.5, 0.5], [0.5, -0.5, 0.5]]),
        // tail (green)
        (Vec3::new(0.1, 0.8, 0.1), [[-0.5, -0.5, -0.5], [0.5, 0.5, -0.5], [-0.5, 0.5, -0.5], [0.5, -0.5, -0.5]]),
    ];

    let mut builder = ModelBuilder::default();
    for (face, (color, corners)) in FACES.iter().enumerate() {
        for corner in corners {
            builder.vertices.push(Vertex::new(Vec3::from_array(*corner), *color));
        }
        // Two triangles per face: 0-1-2 and 0-3-1
        let base = (face * 4) as u32;
        builder.indices.extend([0, 1, 2, 0, 3, 1].map(|i| base + i));
    }

    builder.translated(offset)
}

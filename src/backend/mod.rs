// Backend module - Vulkan abstraction layer
//
// Design: Thin wrapper around ash with safety and ergonomics.
// Everything the frame controller needs goes through the traits in
// crate::renderer; the rest is used directly by render systems.

pub mod buffer;
pub mod device;
pub mod pipeline;
pub mod shader;
pub mod swapchain;
pub mod sync;

pub use device::VulkanDevice;
pub use pipeline::{Pipeline, PipelineConfig};
pub use swapchain::Swapchain;

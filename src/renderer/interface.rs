// Seams between the frame controller and the things it drives
//
// The controller only talks to the window, the device and the swap chain
// through these traits. The Vulkan backend implements them for real; the
// controller tests implement them with scripted fakes.

use anyhow::Result;
use ash::prelude::VkResult;
use ash::vk;

/// Window-side view the controller needs: size, resize flag, event waiting.
pub trait RenderSurface {
    /// Current drawable size in pixels. Either dimension may be zero while
    /// the window is minimized.
    fn extent(&self) -> vk::Extent2D;

    /// Whether the framebuffer was resized since the flag was last reset.
    fn was_resized(&self) -> bool;

    fn reset_resized_flag(&mut self);

    /// Block until at least one window event has been processed.
    fn wait_events(&mut self);

    fn should_close(&self) -> bool;
}

/// Image and depth formats of a presentation chain.
///
/// Pipelines are built against the first chain's render pass, so both formats
/// must survive every rebuild unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChainFormats {
    pub image: vk::Format,
    pub depth: vk::Format,
}

/// A set of presentable images plus everything needed to render into them.
pub trait PresentationChain {
    /// Wait for the current frame's fence, then acquire the next image.
    ///
    /// Returns `(image_index, suboptimal)`; `ERROR_OUT_OF_DATE_KHR` means the
    /// chain must be rebuilt before anything can be rendered.
    fn acquire_next_image(&mut self) -> VkResult<(u32, bool)>;

    /// Submit a finished command buffer for `image_index` and present it.
    ///
    /// `Ok(true)` reports a suboptimal chain.
    fn submit_command_buffer(
        &mut self,
        command_buffer: vk::CommandBuffer,
        image_index: u32,
    ) -> VkResult<bool>;

    fn image_count(&self) -> usize;

    fn render_pass(&self) -> vk::RenderPass;

    fn framebuffer(&self, image_index: usize) -> vk::Framebuffer;

    fn extent(&self) -> vk::Extent2D;

    fn formats(&self) -> ChainFormats;

    fn formats_match(&self, other: &ChainFormats) -> bool {
        self.formats() == *other
    }
}

/// Device operations used by the frame controller.
pub trait RenderDevice {
    type Chain: PresentationChain;

    fn wait_idle(&self) -> Result<()>;

    /// Build a chain for `extent`. A previous chain is consumed so the new
    /// one can hand its swapchain to the driver for reuse; it is destroyed
    /// once the replacement exists.
    fn create_chain(&self, extent: vk::Extent2D, previous: Option<Self::Chain>) -> Result<Self::Chain>;

    fn allocate_command_buffers(&self, count: u32) -> Result<Vec<vk::CommandBuffer>>;

    fn free_command_buffers(&self, command_buffers: &[vk::CommandBuffer]);

    fn begin_command_buffer(&self, command_buffer: vk::CommandBuffer) -> Result<()>;

    fn end_command_buffer(&self, command_buffer: vk::CommandBuffer) -> Result<()>;

    fn cmd_begin_render_pass(
        &self,
        command_buffer: vk::CommandBuffer,
        begin_info: &vk::RenderPassBeginInfo,
    );

    fn cmd_end_render_pass(&self, command_buffer: vk::CommandBuffer);

    fn cmd_set_viewport(&self, command_buffer: vk::CommandBuffer, viewport: &vk::Viewport);

    fn cmd_set_scissor(&self, command_buffer: vk::CommandBuffer, scissor: &vk::Rect2D);
}

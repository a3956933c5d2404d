// Frame controller
//
// Owns the swap chain and one command buffer per swap chain image, and walks
// every frame through acquire -> record -> submit/present. Stale or resized
// swap chains are rebuilt here and nowhere else; render systems only ever see
// an open command buffer.
//
//   Idle --begin_frame--> Recording --begin_swapchain_render_pass--> InRenderPass
//    ^                      |    ^                                       |
//    +------end_frame-------+    +-----end_swapchain_render_pass---------+

mod error;
mod interface;


pub use error::{FrameError, FrameResult};
pub use interface::{ChainFormats, PresentationChain, RenderDevice, RenderSurface};

use ash::vk;

use crate::config::Config;

/// Per-renderer settings taken from the config file
#[derive(Debug, Clone, Copy)]
pub struct FrameSettings {
    pub max_frames_in_flight: usize,
    pub clear_color: [f32; 4],
}

impl Default for FrameSettings {
    fn default() -> Self {
        Self {
            max_frames_in_flight: 2,
            clear_color: [0.01, 0.01, 0.01, 1.0],
        }
    }
}

impl FrameSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_frames_in_flight: config.frames_in_flight(),
            clear_color: config.graphics.clear_color,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FrameState {
    Idle,
    Recording,
    InRenderPass,
}

pub struct Renderer<D: RenderDevice> {
    device: D,
    swapchain: Option<D::Chain>,
    /// Indexed by swap chain image; always `image_count` long between frames
    command_buffers: Vec<vk::CommandBuffer>,

    state: FrameState,
    current_image_index: u32,
    current_frame_index: usize,
    settings: FrameSettings,
    swapchain_generation: u64,
}

impl<D: RenderDevice> Renderer<D> {
    /// Build the first swap chain and its command buffers.
    ///
    /// Blocks while the surface has a zero extent.
    pub fn new<S: RenderSurface>(device: D, surface: &mut S, settings: FrameSettings) -> FrameResult<Self> {
        let mut renderer = Self {
            device,
            swapchain: None,
            command_buffers: Vec::new(),
            state: FrameState::Idle,
            current_image_index: 0,
            current_frame_index: 0,
            settings: FrameSettings {
                max_frames_in_flight: settings.max_frames_in_flight.max(1),
                ..settings
            },
            swapchain_generation: 0,
        };
        renderer.recreate_swapchain(surface)?;
        Ok(renderer)
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    pub fn is_frame_in_progress(&self) -> bool {
        self.state != FrameState::Idle
    }

    pub fn current_command_buffer(&self) -> vk::CommandBuffer {
        assert!(
            self.is_frame_in_progress(),
            "cannot get command buffer when frame not in progress"
        );
        self.command_buffers[self.current_image_index as usize]
    }

    /// In-flight slot of the open frame, in `0..max_frames_in_flight`
    pub fn frame_index(&self) -> usize {
        assert!(
            self.is_frame_in_progress(),
            "cannot get frame index when frame not in progress"
        );
        self.current_frame_index
    }

    /// Render pass of the current swap chain. Stays compatible across
    /// rebuilds because formats are not allowed to change.
    pub fn swapchain_render_pass(&self) -> vk::RenderPass {
        self.swapchain().render_pass()
    }

    pub fn extent(&self) -> vk::Extent2D {
        self.swapchain().extent()
    }

    pub fn aspect_ratio(&self) -> f32 {
        let extent = self.extent();
        extent.width as f32 / extent.height as f32
    }

    pub fn image_count(&self) -> usize {
        self.swapchain().image_count()
    }

    pub fn command_buffer_count(&self) -> usize {
        self.command_buffers.len()
    }

    /// Bumped every time the swap chain is (re)built
    pub fn swapchain_generation(&self) -> u64 {
        self.swapchain_generation
    }

    /// Start a frame.
    ///
    /// Returns `Ok(None)` when the swap chain was out of date; it has been
    /// rebuilt and the caller should skip this iteration.
    pub fn begin_frame<S: RenderSurface>(&mut self, surface: &mut S) -> FrameResult<Option<vk::CommandBuffer>> {
        assert!(
            self.state == FrameState::Idle,
            "can't call begin_frame while already in progress"
        );

        let image_index = match self.swapchain_mut().acquire_next_image() {
            Ok((image_index, suboptimal)) => {
                if suboptimal {
                    log::debug!("Acquired image {} from a suboptimal swap chain", image_index);
                }
                image_index
            }
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => {
                log::debug!("Swap chain out of date on acquire, skipping frame");
                self.recreate_swapchain(surface)?;
                return Ok(None);
            }
            Err(e) => return Err(FrameError::Acquire(e)),
        };

        self.current_image_index = image_index;
        let command_buffer = self.command_buffers[image_index as usize];
        self.device.begin_command_buffer(command_buffer)?;
        self.state = FrameState::Recording;

        Ok(Some(command_buffer))
    }

    /// Finish recording, submit, present, and rebuild the swap chain if the
    /// presentation engine or the window asked for it.
    pub fn end_frame<S: RenderSurface>(&mut self, surface: &mut S) -> FrameResult<()> {
        match self.state {
            FrameState::Recording => {}
            FrameState::Idle => panic!("can't call end_frame while frame is not in progress"),
            FrameState::InRenderPass => panic!("can't call end_frame while a render pass is active"),
        }

        let command_buffer = self.current_command_buffer();
        self.device.end_command_buffer(command_buffer)?;

        let image_index = self.current_image_index;
        let result = self.swapchain_mut().submit_command_buffer(command_buffer, image_index);
        self.state = FrameState::Idle;

        let stale = match result {
            Ok(suboptimal) => suboptimal,
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => true,
            Err(e) => return Err(FrameError::Present(e)),
        };

        if stale || surface.was_resized() {
            surface.reset_resized_flag();
            self.recreate_swapchain(surface)?;
        }

        self.current_frame_index = (self.current_frame_index + 1) % self.settings.max_frames_in_flight;
        Ok(())
    }

    pub fn begin_swapchain_render_pass(&mut self, command_buffer: vk::CommandBuffer) {
        match self.state {
            FrameState::Recording => {}
            FrameState::Idle => {
                panic!("can't call begin_swapchain_render_pass if frame is not in progress")
            }
            FrameState::InRenderPass => {
                panic!("can't call begin_swapchain_render_pass while a render pass is already active")
            }
        }
        assert_eq!(
            command_buffer,
            self.current_command_buffer(),
            "can't begin render pass on command buffer from a different frame"
        );

        let swapchain = self.swapchain();
        let extent = swapchain.extent();
        let render_area = vk::Rect2D {
            offset: vk::Offset2D { x: 0, y: 0 },
            extent,
        };

        let clear_values = [
            vk::ClearValue {
                color: vk::ClearColorValue {
                    float32: self.settings.clear_color,
                },
            },
            vk::ClearValue {
                depth_stencil: vk::ClearDepthStencilValue {
                    depth: 1.0,
                    stencil: 0,
                },
            },
        ];

        let begin_info = vk::RenderPassBeginInfo::builder()
            .render_pass(swapchain.render_pass())
            .framebuffer(swapchain.framebuffer(self.current_image_index as usize))
            .render_area(render_area)
            .clear_values(&clear_values);

        self.device.cmd_begin_render_pass(command_buffer, &begin_info);

        // Viewport and scissor are dynamic state, so a resize never needs new pipelines
        let viewport = vk::Viewport {
            x: 0.0,
            y: 0.0,
            width: extent.width as f32,
            height: extent.height as f32,
            min_depth: 0.0,
            max_depth: 1.0,
        };
        self.device.cmd_set_viewport(command_buffer, &viewport);
        self.device.cmd_set_scissor(command_buffer, &render_area);

        self.state = FrameState::InRenderPass;
    }

    pub fn end_swapchain_render_pass(&mut self, command_buffer: vk::CommandBuffer) {
        assert!(
            self.state == FrameState::InRenderPass,
            "can't call end_swapchain_render_pass if no render pass is active"
        );
        assert_eq!(
            command_buffer,
            self.current_command_buffer(),
            "can't end render pass on command buffer from a different frame"
        );

        self.device.cmd_end_render_pass(command_buffer);
        self.state = FrameState::Recording;
    }

    // =========================================================================
    // SWAP CHAIN REBUILD
    // =========================================================================

    fn recreate_swapchain<S: RenderSurface>(&mut self, surface: &mut S) -> FrameResult<()> {
        assert!(
            self.state == FrameState::Idle,
            "swap chain can't be rebuilt while a frame is in progress"
        );

        // A minimized window has no drawable area; wait until it has one
        let mut extent = surface.extent();
        while extent.width == 0 || extent.height == 0 {
            if surface.should_close() {
                if self.swapchain.is_none() {
                    return Err(FrameError::SurfaceClosed);
                }
                log::info!("Window closed while minimized, keeping current swap chain");
                return Ok(());
            }
            surface.wait_events();
            extent = surface.extent();
        }

        self.device.wait_idle()?;

        let swapchain = match self.swapchain.take() {
            None => self.device.create_chain(extent, None)?,
            Some(previous) => {
                let previous_formats = previous.formats();
                let swapchain = self.device.create_chain(extent, Some(previous))?;
                if !swapchain.formats_match(&previous_formats) {
                    return Err(FrameError::FormatChanged {
                        previous: previous_formats,
                        current: swapchain.formats(),
                    });
                }
                swapchain
            }
        };

        let image_count = swapchain.image_count();
        self.swapchain = Some(swapchain);
        self.swapchain_generation += 1;
        log::info!(
            "Swap chain ready: {}x{}, {} images (generation {})",
            extent.width,
            extent.height,
            image_count,
            self.swapchain_generation
        );

        if image_count != self.command_buffers.len() {
            log::debug!(
                "Reallocating command buffers: {} -> {}",
                self.command_buffers.len(),
                image_count
            );
            self.free_command_buffers();
            self.command_buffers = self.device.allocate_command_buffers(image_count as u32)?;
        }

        Ok(())
    }

    fn free_command_buffers(&mut self) {
        if !self.command_buffers.is_empty() {
            self.device.free_command_buffers(&self.command_buffers);
            self.command_buffers.clear();
        }
    }

    fn swapchain(&self) -> &D::Chain {
        self.swapchain
            .as_ref()
            .expect("renderer used after a failed swap chain rebuild")
    }

    fn swapchain_mut(&mut self) -> &mut D::Chain {
        self.swapchain
            .as_mut()
            .expect("renderer used after a failed swap chain rebuild")
    }
}

impl<D: RenderDevice> Drop for Renderer<D> {
    fn drop(&mut self) {
        self.free_command_buffers();
    }
}

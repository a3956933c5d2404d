// Swapchain - Window presentation
//
// Manages the chain of images we render to and present to the screen,
// together with everything tied to their size and count: depth buffers,
// the render pass, framebuffers and the per-frame sync objects.
//
// A swapchain is never resized in place. The renderer builds a new one and
// hands the old one in, so the driver can recycle its images.

use anyhow::{Context, Result};
use ash::extensions::khr;
use ash::prelude::VkResult;
use ash::vk;
use std::sync::Arc;

use super::sync::FrameSync;
use super::{buffer, VulkanDevice};
use crate::renderer::{ChainFormats, PresentationChain};

pub struct Swapchain {
    pub swapchain: vk::SwapchainKHR,
    pub swapchain_loader: khr::Swapchain,
    pub images: Vec<vk::Image>,
    pub image_views: Vec<vk::ImageView>,
    pub format: vk::Format,
    pub depth_format: vk::Format,
    pub extent: vk::Extent2D,

    depth_images: Vec<(vk::Image, vk::DeviceMemory, vk::ImageView)>,
    render_pass: vk::RenderPass,
    framebuffers: Vec<vk::Framebuffer>,

    /// Sync objects for each frame in flight
    frame_sync: Vec<FrameSync>,
    /// Fence of the frame that last rendered to each image (null if none yet)
    images_in_flight: Vec<vk::Fence>,
    /// Which sync slot we're currently using (0 to MAX_FRAMES_IN_FLIGHT-1)
    current_frame: usize,

    device: Arc<VulkanDevice>,
}

impl Swapchain {
    /// Build a swapchain for `extent`, retiring `previous` once the new
    /// swapchain exists.
    pub fn new(
        device: Arc<VulkanDevice>,
        extent: vk::Extent2D,
        previous: Option<Swapchain>,
    ) -> Result<Self> {
        log::info!("Creating swapchain: {}x{}", extent.width, extent.height);

        let swapchain_loader = khr::Swapchain::new(&device.instance, &device.device);

        // Every handle starts null so Drop can clean up a half-built swapchain
        let mut swapchain = Self {
            swapchain: vk::SwapchainKHR::null(),
            swapchain_loader,
            images: Vec::new(),
            image_views: Vec::new(),
            format: vk::Format::UNDEFINED,
            depth_format: vk::Format::UNDEFINED,
            extent,
            depth_images: Vec::new(),
            render_pass: vk::RenderPass::null(),
            framebuffers: Vec::new(),
            frame_sync: Vec::new(),
            images_in_flight: Vec::new(),
            current_frame: 0,
            device,
        };

        let old_swapchain = previous
            .as_ref()
            .map_or(vk::SwapchainKHR::null(), |old| old.swapchain);
        swapchain.create_swapchain(extent, old_swapchain)?;
        // The old swapchain is retired now; its resources can go
        drop(previous);

        swapchain.create_image_views()?;
        swapchain.create_render_pass()?;
        swapchain.create_depth_resources()?;
        swapchain.create_framebuffers()?;
        swapchain.create_sync_objects()?;

        Ok(swapchain)
    }

    fn create_swapchain(&mut self, window_extent: vk::Extent2D, old_swapchain: vk::SwapchainKHR) -> Result<()> {
        let device = &self.device;
        let surface = device.surface;
        let surface_loader = &device.surface_loader;

        // Query surface capabilities
        let surface_caps = unsafe {
            surface_loader.get_physical_device_surface_capabilities(
                device.physical_device,
                surface,
            )
        }?;

        // Query supported formats
        let formats = unsafe {
            surface_loader.get_physical_device_surface_formats(
                device.physical_device,
                surface,
            )
        }?;

        // Query supported present modes
        let present_modes = unsafe {
            surface_loader.get_physical_device_surface_present_modes(
                device.physical_device,
                surface,
            )
        }?;

        let surface_format = choose_surface_format(&formats).context("No suitable surface format")?;
        let present_mode = choose_present_mode(&present_modes, device.preferred_present_mode);
        let extent = choose_extent(&surface_caps, window_extent);
        let image_count = choose_image_count(&surface_caps);

        log::info!("Present mode: {:?}, format: {:?}", present_mode, surface_format.format);

        let queue_family_indices = [device.graphics_queue_family, device.present_queue_family];
        let mut create_info = vk::SwapchainCreateInfoKHR::builder()
            .surface(surface)
            .min_image_count(image_count)
            .image_format(surface_format.format)
            .image_color_space(surface_format.color_space)
            .image_extent(extent)
            .image_array_layers(1)
            .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT)
            .pre_transform(surface_caps.current_transform)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(present_mode)
            .clipped(true)
            .old_swapchain(old_swapchain);

        create_info = if device.graphics_queue_family != device.present_queue_family {
            create_info
                .image_sharing_mode(vk::SharingMode::CONCURRENT)
                .queue_family_indices(&queue_family_indices)
        } else {
            create_info.image_sharing_mode(vk::SharingMode::EXCLUSIVE)
        };

        self.swapchain = unsafe {
            self.swapchain_loader.create_swapchain(&create_info, None)
        }
        .context("Failed to create swapchain")?;

        self.images = unsafe {
            self.swapchain_loader.get_swapchain_images(self.swapchain)
        }?;

        log::info!("Created swapchain with {} images", self.images.len());

        self.format = surface_format.format;
        self.extent = extent;
        Ok(())
    }

    fn create_image_views(&mut self) -> Result<()> {
        for &image in &self.images {
            let create_info = vk::ImageViewCreateInfo::builder()
                .image(image)
                .view_type(vk::ImageViewType::TYPE_2D)
                .format(self.format)
                .components(vk::ComponentMapping {
                    r: vk::ComponentSwizzle::IDENTITY,
                    g: vk::ComponentSwizzle::IDENTITY,
                    b: vk::ComponentSwizzle::IDENTITY,
                    a: vk::ComponentSwizzle::IDENTITY,
                })
                .subresource_range(vk::ImageSubresourceRange {
                    aspect_mask: vk::ImageAspectFlags::COLOR,
                    base_mip_level: 0,
                    level_count: 1,
                    base_array_layer: 0,
                    layer_count: 1,
                });

            let view = unsafe {
                self.device.device.create_image_view(&create_info, None)
                    .context("Failed to create image view")?
            };
            self.image_views.push(view);
        }
        Ok(())
    }

    /// Render pass with one color attachment (the swapchain image) and depth
    fn create_render_pass(&mut self) -> Result<()> {
        self.depth_format = self.device.find_depth_format()?;

        let color_attachment = vk::AttachmentDescription::builder()
            .format(self.format)
            .samples(vk::SampleCountFlags::TYPE_1)
            .load_op(vk::AttachmentLoadOp::CLEAR)
            .store_op(vk::AttachmentStoreOp::STORE)
            .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
            .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
            .initial_layout(vk::ImageLayout::UNDEFINED)
            .final_layout(vk::ImageLayout::PRESENT_SRC_KHR)
            .build();

        let depth_attachment = vk::AttachmentDescription::builder()
            .format(self.depth_format)
            .samples(vk::SampleCountFlags::TYPE_1)
            .load_op(vk::AttachmentLoadOp::CLEAR)
            .store_op(vk::AttachmentStoreOp::DONT_CARE) // Don't need to store depth
            .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
            .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
            .initial_layout(vk::ImageLayout::UNDEFINED)
            .final_layout(vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL)
            .build();

        let color_attachment_ref = vk::AttachmentReference::builder()
            .attachment(0)
            .layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL)
            .build();

        let depth_attachment_ref = vk::AttachmentReference::builder()
            .attachment(1)
            .layout(vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL)
            .build();

        let color_attachments = &[color_attachment_ref];
        let subpass = vk::SubpassDescription::builder()
            .pipeline_bind_point(vk::PipelineBindPoint::GRAPHICS)
            .color_attachments(color_attachments)
            .depth_stencil_attachment(&depth_attachment_ref)
            .build();

        let dependency = vk::SubpassDependency::builder()
            .src_subpass(vk::SUBPASS_EXTERNAL)
            .dst_subpass(0)
            .src_stage_mask(vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT | vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS)
            .src_access_mask(vk::AccessFlags::empty())
            .dst_stage_mask(vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT | vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS)
            .dst_access_mask(vk::AccessFlags::COLOR_ATTACHMENT_WRITE | vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE)
            .build();

        let attachments = &[color_attachment, depth_attachment];
        let subpasses = &[subpass];
        let dependencies = &[dependency];

        let render_pass_info = vk::RenderPassCreateInfo::builder()
            .attachments(attachments)
            .subpasses(subpasses)
            .dependencies(dependencies);

        self.render_pass = unsafe {
            self.device.device.create_render_pass(&render_pass_info, None)
                .context("Failed to create render pass")?
        };
        Ok(())
    }

    /// One depth image per swapchain image
    fn create_depth_resources(&mut self) -> Result<()> {
        for _ in 0..self.images.len() {
            let depth = buffer::create_depth_buffer(&self.device, self.extent, self.depth_format)?;
            self.depth_images.push(depth);
        }
        Ok(())
    }

    fn create_framebuffers(&mut self) -> Result<()> {
        for (&image_view, &(_, _, depth_view)) in self.image_views.iter().zip(&self.depth_images) {
            let attachments = &[image_view, depth_view];
            let framebuffer_info = vk::FramebufferCreateInfo::builder()
                .render_pass(self.render_pass)
                .attachments(attachments)
                .width(self.extent.width)
                .height(self.extent.height)
                .layers(1);

            let framebuffer = unsafe {
                self.device.device.create_framebuffer(&framebuffer_info, None)
                    .context("Failed to create framebuffer")?
            };
            self.framebuffers.push(framebuffer);
        }
        Ok(())
    }

    fn create_sync_objects(&mut self) -> Result<()> {
        for _ in 0..self.device.max_frames_in_flight {
            self.frame_sync.push(FrameSync::new(&self.device.device)?);
        }
        self.images_in_flight = vec![vk::Fence::null(); self.images.len()];
        Ok(())
    }
}

impl PresentationChain for Swapchain {
    /// Acquire next image for rendering
    ///
    /// Waits for the frame that last used this sync slot, then for the
    /// frame that last rendered into the acquired image, so its command
    /// buffer can be re-recorded.
    fn acquire_next_image(&mut self) -> VkResult<(u32, bool)> {
        let sync = &self.frame_sync[self.current_frame];

        unsafe {
            self.device.device.wait_for_fences(&[sync.in_flight_fence], true, u64::MAX)?;
        }

        let (image_index, suboptimal) = unsafe {
            self.swapchain_loader.acquire_next_image(
                self.swapchain,
                u64::MAX,
                sync.image_available,
                vk::Fence::null(),
            )
        }?;

        let image_fence = self.images_in_flight[image_index as usize];
        if image_fence != vk::Fence::null() {
            unsafe {
                self.device.device.wait_for_fences(&[image_fence], true, u64::MAX)?;
            }
        }

        Ok((image_index, suboptimal))
    }

    /// Submit the recorded commands and present the image
    fn submit_command_buffer(
        &mut self,
        command_buffer: vk::CommandBuffer,
        image_index: u32,
    ) -> VkResult<bool> {
        let sync = &self.frame_sync[self.current_frame];
        self.images_in_flight[image_index as usize] = sync.in_flight_fence;

        let wait_semaphores = [sync.image_available];
        let wait_stages = [vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT];
        let signal_semaphores = [sync.render_finished];
        let command_buffers = [command_buffer];

        let submit_info = vk::SubmitInfo::builder()
            .wait_semaphores(&wait_semaphores)      // Wait for image to be available
            .wait_dst_stage_mask(&wait_stages)      // Which stage waits
            .command_buffers(&command_buffers)      // Commands to execute
            .signal_semaphores(&signal_semaphores); // Signal when done

        unsafe {
            self.device.device.reset_fences(&[sync.in_flight_fence])?;
            self.device.device.queue_submit(
                self.device.graphics_queue,
                &[submit_info.build()],
                sync.in_flight_fence, // Signal this fence when GPU is done
            )?;
        }

        let swapchains = [self.swapchain];
        let image_indices = [image_index];
        let present_info = vk::PresentInfoKHR::builder()
            .wait_semaphores(&signal_semaphores)
            .swapchains(&swapchains)
            .image_indices(&image_indices);

        let result = unsafe {
            self.swapchain_loader.queue_present(self.device.present_queue, &present_info)
        };

        self.current_frame = (self.current_frame + 1) % self.frame_sync.len();
        result
    }

    fn image_count(&self) -> usize {
        self.images.len()
    }

    fn render_pass(&self) -> vk::RenderPass {
        self.render_pass
    }

    fn framebuffer(&self, image_index: usize) -> vk::Framebuffer {
        self.framebuffers[image_index]
    }

    fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    fn formats(&self) -> ChainFormats {
        ChainFormats {
            image: self.format,
            depth: self.depth_format,
        }
    }
}

impl Drop for Swapchain {
    fn drop(&mut self) {
        unsafe {
            let device = &self.device.device;

            for &view in &self.image_views {
                device.destroy_image_view(view, None);
            }
            self.swapchain_loader.destroy_swapchain(self.swapchain, None);

            for &(image, memory, view) in &self.depth_images {
                device.destroy_image_view(view, None);
                device.destroy_image(image, None);
                device.free_memory(memory, None);
            }

            for &framebuffer in &self.framebuffers {
                device.destroy_framebuffer(framebuffer, None);
            }
            device.destroy_render_pass(self.render_pass, None);
        }

        for sync in &self.frame_sync {
            sync.destroy(&self.device.device);
        }
    }
}

// =============================================================================
// SURFACE SELECTION
// =============================================================================

/// Prefer SRGB so shader output is gamma-corrected by the hardware
fn choose_surface_format(formats: &[vk::SurfaceFormatKHR]) -> Option<vk::SurfaceFormatKHR> {
    formats
        .iter()
        .find(|f| {
            f.format == vk::Format::B8G8R8A8_SRGB
                && f.color_space == vk::ColorSpaceKHR::SRGB_NONLINEAR
        })
        .or_else(|| formats.first())
        .copied()
}

/// Configured mode if the surface supports it; FIFO is always supported
fn choose_present_mode(
    available: &[vk::PresentModeKHR],
    preferred: vk::PresentModeKHR,
) -> vk::PresentModeKHR {
    if available.contains(&preferred) {
        preferred
    } else {
        log::warn!("Present mode {:?} not supported, using FIFO", preferred);
        vk::PresentModeKHR::FIFO
    }
}

fn choose_extent(caps: &vk::SurfaceCapabilitiesKHR, window_extent: vk::Extent2D) -> vk::Extent2D {
    if caps.current_extent.width != u32::MAX {
        caps.current_extent
    } else {
        vk::Extent2D {
            width: window_extent.width.clamp(
                caps.min_image_extent.width,
                caps.max_image_extent.width,
            ),
            height: window_extent.height.clamp(
                caps.min_image_extent.height,
                caps.max_image_extent.height,
            ),
        }
    }
}

/// One more than the minimum so we never wait on the driver to release an image
fn choose_image_count(caps: &vk::SurfaceCapabilitiesKHR) -> u32 {
    let image_count = caps.min_image_count + 1;
    if caps.max_image_count > 0 && image_count > caps.max_image_count {
        caps.max_image_count
    } else {
        image_count
    }
}

// Synchronization primitives
//
// Fences, semaphores for GPU-CPU and GPU-GPU sync
// One set per frame in flight, owned by the swapchain that uses them

use anyhow::Result;
use ash::vk;

/// Frame synchronization - one per frame in flight
pub struct FrameSync {
    pub image_available: vk::Semaphore,
    pub render_finished: vk::Semaphore,
    pub in_flight_fence: vk::Fence,
}

impl FrameSync {
    pub fn new(device: &ash::Device) -> Result<Self> {
        let semaphore_info = vk::SemaphoreCreateInfo::builder();
        let fence_info = vk::FenceCreateInfo::builder()
            .flags(vk::FenceCreateFlags::SIGNALED); // Start signaled so the first wait returns

        unsafe {
            Ok(Self {
                image_available: device.create_semaphore(&semaphore_info, None)?,
                render_finished: device.create_semaphore(&semaphore_info, None)?,
                in_flight_fence: device.create_fence(&fence_info, None)?,
            })
        }
    }

    pub fn destroy(&self, device: &ash::Device) {
        unsafe {
            device.destroy_semaphore(self.image_available, None);
            device.destroy_semaphore(self.render_finished, None);
            device.destroy_fence(self.in_flight_fence, None);
        }
    }
}

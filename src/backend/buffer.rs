// Buffer utilities for vertex/index buffers and depth images
//
// Provides helpers for creating GPU memory: host-visible staging buffers,
// device-local buffers filled through a staging copy, and depth images.

use anyhow::{Context, Result};
use ash::vk;
use super::VulkanDevice;

/// Helper to create a GPU buffer with specified usage and memory properties
pub fn create_buffer(
    device: &VulkanDevice,
    size: vk::DeviceSize,
    usage: vk::BufferUsageFlags,
    memory_properties: vk::MemoryPropertyFlags,
) -> Result<(vk::Buffer, vk::DeviceMemory)> {
    let buffer_info = vk::BufferCreateInfo::builder()
        .size(size)
        .usage(usage)
        .sharing_mode(vk::SharingMode::EXCLUSIVE);

    let buffer = unsafe {
        device.device.create_buffer(&buffer_info, None)
            .context("Failed to create buffer")?
    };
    let buffer_guard = ReleaseOnError::new(|| unsafe { device.device.destroy_buffer(buffer, None) });

    let mem_requirements = unsafe {
        device.device.get_buffer_memory_requirements(buffer)
    };

    let memory_type_index = find_memory_type(
        &device.memory_properties,
        mem_requirements.memory_type_bits,
        memory_properties,
    )?;

    let alloc_info = vk::MemoryAllocateInfo::builder()
        .allocation_size(mem_requirements.size)
        .memory_type_index(memory_type_index);

    let buffer_memory = unsafe {
        device.device.allocate_memory(&alloc_info, None)
            .context("Failed to allocate buffer memory")?
    };
    let memory_guard = ReleaseOnError::new(|| unsafe { device.device.free_memory(buffer_memory, None) });

    unsafe {
        device.device.bind_buffer_memory(buffer, buffer_memory, 0)
            .context("Failed to bind buffer memory")?;
    }

    memory_guard.disarm();
    buffer_guard.disarm();
    Ok((buffer, buffer_memory))
}

/// Create a device-local buffer and fill it with `data` through a staging copy
pub fn create_device_local_buffer<T: bytemuck::Pod>(
    device: &VulkanDevice,
    usage: vk::BufferUsageFlags,
    data: &[T],
) -> Result<(vk::Buffer, vk::DeviceMemory)> {
    let bytes: &[u8] = bytemuck::cast_slice(data);
    let size = bytes.len() as vk::DeviceSize;

    let (staging_buffer, staging_memory) = create_buffer(
        device,
        size,
        vk::BufferUsageFlags::TRANSFER_SRC,
        vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
    )?;

    let upload = upload_through_staging(device, staging_buffer, staging_memory, bytes, usage);

    unsafe {
        device.device.destroy_buffer(staging_buffer, None);
        device.device.free_memory(staging_memory, None);
    }

    upload
}

fn upload_through_staging(
    device: &VulkanDevice,
    staging_buffer: vk::Buffer,
    staging_memory: vk::DeviceMemory,
    bytes: &[u8],
    usage: vk::BufferUsageFlags,
) -> Result<(vk::Buffer, vk::DeviceMemory)> {
    let size = bytes.len() as vk::DeviceSize;

    unsafe {
        let ptr = device.device.map_memory(
            staging_memory,
            0,
            size,
            vk::MemoryMapFlags::empty(),
        )? as *mut u8;

        ptr.copy_from_nonoverlapping(bytes.as_ptr(), bytes.len());
        device.device.unmap_memory(staging_memory);
    }

    let (buffer, memory) = create_buffer(
        device,
        size,
        usage | vk::BufferUsageFlags::TRANSFER_DST,
        vk::MemoryPropertyFlags::DEVICE_LOCAL,
    )?;

    let copied = device.run_single_time_commands(|cmd| {
        let region = vk::BufferCopy {
            src_offset: 0,
            dst_offset: 0,
            size,
        };
        unsafe {
            device.device.cmd_copy_buffer(cmd, staging_buffer, buffer, &[region]);
        }
    });

    if let Err(e) = copied {
        unsafe {
            device.device.destroy_buffer(buffer, None);
            device.device.free_memory(memory, None);
        }
        return Err(e);
    }

    Ok((buffer, memory))
}

/// Find a suitable memory type index
pub fn find_memory_type(
    mem_properties: &vk::PhysicalDeviceMemoryProperties,
    type_filter: u32,
    properties: vk::MemoryPropertyFlags,
) -> Result<u32> {
    (0..mem_properties.memory_type_count)
        .find(|&i| {
            let has_type = (type_filter & (1 << i)) != 0;
            let has_properties = mem_properties.memory_types[i as usize]
                .property_flags
                .contains(properties);
            has_type && has_properties
        })
        .context("Failed to find suitable memory type")
}

/// Create a depth buffer image, memory, and view
pub fn create_depth_buffer(
    device: &VulkanDevice,
    extent: vk::Extent2D,
    format: vk::Format,
) -> Result<(vk::Image, vk::DeviceMemory, vk::ImageView)> {
    let image_info = vk::ImageCreateInfo::builder()
        .image_type(vk::ImageType::TYPE_2D)
        .extent(vk::Extent3D {
            width: extent.width,
            height: extent.height,
            depth: 1,
        })
        .mip_levels(1)
        .array_layers(1)
        .format(format)
        .tiling(vk::ImageTiling::OPTIMAL)
        .initial_layout(vk::ImageLayout::UNDEFINED)
        .usage(vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT)
        .samples(vk::SampleCountFlags::TYPE_1)
        .sharing_mode(vk::SharingMode::EXCLUSIVE);

    let image = unsafe {
        device.device.create_image(&image_info, None)
            .context("Failed to create depth image")?
    };
    let image_guard = ReleaseOnError::new(|| unsafe { device.device.destroy_image(image, None) });

    let mem_requirements = unsafe {
        device.device.get_image_memory_requirements(image)
    };

    let memory_type_index = find_memory_type(
        &device.memory_properties,
        mem_requirements.memory_type_bits,
        vk::MemoryPropertyFlags::DEVICE_LOCAL,
    )?;

    let alloc_info = vk::MemoryAllocateInfo::builder()
        .allocation_size(mem_requirements.size)
        .memory_type_index(memory_type_index);

    let memory = unsafe {
        device.device.allocate_memory(&alloc_info, None)
            .context("Failed to allocate depth image memory")?
    };
    let memory_guard = ReleaseOnError::new(|| unsafe { device.device.free_memory(memory, None) });

    unsafe {
        device.device.bind_image_memory(image, memory, 0)
            .context("Failed to bind depth image memory")?;
    }

    let view_info = vk::ImageViewCreateInfo::builder()
        .image(image)
        .view_type(vk::ImageViewType::TYPE_2D)
        .format(format)
        .subresource_range(vk::ImageSubresourceRange {
            aspect_mask: vk::ImageAspectFlags::DEPTH,
            base_mip_level: 0,
            level_count: 1,
            base_array_layer: 0,
            layer_count: 1,
        });

    let view = unsafe {
        device.device.create_image_view(&view_info, None)
            .context("Failed to create depth image view")?
    };

    memory_guard.disarm();
    image_guard.disarm();
    Ok((image, memory, view))
}

/// Runs a release step when dropped, unless disarmed first.
/// Guards are dropped in reverse order, so memory is freed before the
/// buffer or image it was bound to is destroyed.
struct ReleaseOnError<F: FnOnce()> {
    release: Option<F>,
}

impl<F: FnOnce()> ReleaseOnError<F> {
    fn new(release: F) -> Self {
        Self { release: Some(release) }
    }

    /// Keep the resource: the caller now owns it
    fn disarm(mut self) {
        self.release = None;
    }
}

impl<F: FnOnce()> Drop for ReleaseOnError<F> {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    fn memory_properties(flags: &[vk::MemoryPropertyFlags]) -> vk::PhysicalDeviceMemoryProperties {
        let mut props = vk::PhysicalDeviceMemoryProperties {
            memory_type_count: flags.len() as u32,
            ..Default::default()
        };
        for (i, &flag) in flags.iter().enumerate() {
            props.memory_types[i].property_flags = flag;
        }
        props
    }

    #[test]
    fn finds_first_type_allowed_by_filter_with_required_properties() {
        let props = memory_properties(&[
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
        ]);

        let index = find_memory_type(&props, 0b110, vk::MemoryPropertyFlags::DEVICE_LOCAL).unwrap();
        assert_eq!(index, 2);

        let index = find_memory_type(&props, 0b111, vk::MemoryPropertyFlags::HOST_VISIBLE).unwrap();
        assert_eq!(index, 1);
    }

    #[test]
    fn early_return_releases_guarded_resources_in_reverse_order() {
        let released = RefCell::new(Vec::new());

        let fail_after_allocation = || -> Result<()> {
            let _buffer = ReleaseOnError::new(|| released.borrow_mut().push("buffer"));
            let _memory = ReleaseOnError::new(|| released.borrow_mut().push("memory"));
            anyhow::bail!("Failed to bind buffer memory")
        };

        assert!(fail_after_allocation().is_err());
        assert_eq!(*released.borrow(), vec!["memory", "buffer"]);
    }

    #[test]
    fn missing_memory_type_releases_the_created_buffer() {
        let released = RefCell::new(Vec::new());
        let props = memory_properties(&[vk::MemoryPropertyFlags::DEVICE_LOCAL]);

        let create = || -> Result<u32> {
            let buffer = ReleaseOnError::new(|| released.borrow_mut().push("buffer"));
            let index = find_memory_type(&props, 0b1, vk::MemoryPropertyFlags::HOST_VISIBLE)?;
            buffer.disarm();
            Ok(index)
        };

        assert!(create().is_err());
        assert_eq!(*released.borrow(), vec!["buffer"]);
    }

    #[test]
    fn disarmed_guard_keeps_the_resource() {
        let released = RefCell::new(Vec::new());

        let buffer = ReleaseOnError::new(|| released.borrow_mut().push("buffer"));
        let memory = ReleaseOnError::new(|| released.borrow_mut().push("memory"));
        memory.disarm();
        buffer.disarm();

        assert!(released.borrow().is_empty());
    }

    #[test]
    fn missing_memory_type_is_an_error() {
        let props = memory_properties(&[vk::MemoryPropertyFlags::DEVICE_LOCAL]);
        assert!(find_memory_type(&props, 0b1, vk::MemoryPropertyFlags::HOST_VISIBLE).is_err());
    }
}

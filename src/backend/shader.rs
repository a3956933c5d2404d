// Shader module loading
//
// Vulkan uses SPIR-V bytecode for shaders. build.rs compiles the GLSL
// sources next to them; here we read the compiled words back at runtime.

use anyhow::{Context, Result};
use ash::vk;
use std::path::Path;
use super::VulkanDevice;

/// Read a compiled SPIR-V file into 4-byte words
pub fn read_spirv(path: &Path) -> Result<Vec<u32>> {
    let mut file = std::fs::File::open(path)
        .with_context(|| format!("Failed to open shader {:?}", path))?;

    // read_spv checks the length and fixes up alignment for us
    ash::util::read_spv(&mut file)
        .with_context(|| format!("Invalid SPIR-V in {:?}", path))
}

/// Load a SPIR-V file and create a shader module from it
pub fn create_shader_module(device: &VulkanDevice, path: &Path) -> Result<vk::ShaderModule> {
    let code = read_spirv(path)?;
    let create_info = vk::ShaderModuleCreateInfo::builder()
        .code(&code);

    unsafe {
        device.device.create_shader_module(&create_info, None)
            .with_context(|| format!("Failed to create shader module from {:?}", path))
    }
}

//! SPIR-V shader module loading
//!
//! Shaders are compiled ahead of time by the build script and loaded from
//! disk at startup. Modules are only needed while pipelines are being built,
//! so the backend keeps them around solely to rebuild pipelines on resize.

use ash::{vk, Device};
use std::ffi::CStr;
use std::fs::File;
use std::path::Path;

use crate::render::backends::vulkan::{VulkanError, VulkanResult};

/// Entry point shared by every stage
pub const SHADER_ENTRY_POINT: &CStr = unsafe { CStr::from_bytes_with_nul_unchecked(b"main\0") };

/// SPIR-V shader module wrapper with automatic resource management
pub struct ShaderModule {
    device: Device,
    module: vk::ShaderModule,
}

impl ShaderModule {
    /// Create shader module from SPIR-V bytecode
    ///
    /// Bytes need no particular alignment; they are copied into `u32` words.
    pub fn from_bytes(device: &Device, bytes: &[u8]) -> VulkanResult<Self> {
        let words = ash::util::read_spv(&mut std::io::Cursor::new(bytes))
            .map_err(|e| VulkanError::InitializationFailed(format!("Invalid SPIR-V: {e}")))?;

        let create_info = vk::ShaderModuleCreateInfo::builder().code(&words);
        let module = unsafe {
            device.create_shader_module(&create_info, None).map_err(|e| {
                log::error!("vkCreateShaderModule failed: {:?}", e);
                VulkanError::Api(e)
            })?
        };

        log::debug!("Created shader module ({} words)", words.len());
        Ok(Self {
            device: device.clone(),
            module,
        })
    }

    /// Load shader from SPIR-V file
    pub fn from_file<P: AsRef<Path>>(device: &Device, path: P) -> VulkanResult<Self> {
        let path = path.as_ref();
        let mut file = File::open(path).map_err(|e| {
            VulkanError::InitializationFailed(format!("Failed to open shader file {}: {}", path.display(), e))
        })?;

        let words = ash::util::read_spv(&mut file).map_err(|e| {
            VulkanError::InitializationFailed(format!("Failed to read shader file {}: {}", path.display(), e))
        })?;

        let create_info = vk::ShaderModuleCreateInfo::builder().code(&words);
        let module = unsafe {
            device
                .create_shader_module(&create_info, None)
                .map_err(VulkanError::Api)?
        };

        log::debug!("Loaded shader {}", path.display());
        Ok(Self {
            device: device.clone(),
            module,
        })
    }

    /// Get shader module handle
    pub const fn handle(&self) -> vk::ShaderModule {
        self.module
    }

    /// Create shader stage create info
    pub fn create_stage_info(&self, stage: vk::ShaderStageFlags) -> vk::PipelineShaderStageCreateInfo {
        vk::PipelineShaderStageCreateInfo::builder()
            .stage(stage)
            .module(self.module)
            .name(SHADER_ENTRY_POINT)
            .build()
    }
}

impl Drop for ShaderModule {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_shader_module(self.module, None);
        }
    }
}

/// The three modules the UI pipelines are built from
pub struct UiShaders {
    /// Shared vertex stage
    pub vertex: ShaderModule,
    /// Fragment stage for untextured draws
    pub color_fragment: ShaderModule,
    /// Fragment stage that samples set 1
    pub textured_fragment: ShaderModule,
}

impl UiShaders {
    /// Load all three from the given paths
    pub fn load(device: &Device, vertex: &str, color_fragment: &str, textured_fragment: &str) -> VulkanResult<Self> {
        Ok(Self {
            vertex: ShaderModule::from_file(device, vertex)?,
            color_fragment: ShaderModule::from_file(device, color_fragment)?,
            textured_fragment: ShaderModule::from_file(device, textured_fragment)?,
        })
    }
}

//! Vulkan resource management
//!
//! Buffers, textures and descriptors, plus the immediate-submit path used to
//! fill textures.

/// Host-visible `vk-mem` buffers
pub mod buffer;

/// Descriptor layouts, pool and bookkeeping
pub mod descriptor_set;

/// Sampled textures and the shared sampler
pub mod texture;

/// One-off transfer submissions
pub mod upload;

pub use buffer::{Buffer, POOL_BUFFER_USAGE};
pub use descriptor_set::{
    DescriptorManager, DescriptorPool, DescriptorSetLayout, DescriptorSetLayoutBuilder, DescriptorSetWriter,
    UiDescriptorLayouts, TEXTURE_BINDING, UNIFORM_BINDING,
};
pub use texture::{Sampler, Texture, TEXTURE_FORMAT};
pub use upload::UploadManager;

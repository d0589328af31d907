//! Vulkan backend implementation
//!
//! Organized into initialization, resources, rendering and state modules,
//! tied together by [`VulkanBackend`].

/// Vulkan initialization types (context, surface, window)
pub mod initialization;

/// Vulkan resource management (buffers, textures, descriptors)
pub mod resources;

/// Vulkan rendering operations (shaders, pipelines, render passes, commands)
pub mod rendering;

/// Vulkan state management (swapchain, synchronization, surface targets)
pub mod state;

/// [`GpuBackend`](crate::render::GpuBackend) implementation
pub mod backend;

pub use backend::VulkanBackend;

// Re-export core initialization types
pub use initialization::context::{PhysicalDeviceInfo, VulkanContext, VulkanError, VulkanResult};
pub use initialization::surface::{RawWindowSurface, Surface, SurfaceProvider};
pub use initialization::window::Window;

/// UI renderer driving a Vulkan device
pub type VulkanUiRenderer = crate::render::UiRenderer<VulkanBackend>;

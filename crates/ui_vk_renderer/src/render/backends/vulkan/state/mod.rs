// Vulkan state management

pub mod swapchain;
pub mod sync;
pub mod targets;

pub use swapchain::*;
pub use sync::*;
pub use targets::*;

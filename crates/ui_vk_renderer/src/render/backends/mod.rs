//! GPU backends for the UI renderer
//!
//! Only Vulkan is implemented; tests drive the renderer through
//! `render::testing::MockBackend` instead.

/// Vulkan rendering backend implementation
pub mod vulkan;

//! # Core
//!
//! Renderer-wide configuration shared by the backend-independent renderer,
//! the Vulkan backend and host applications.

pub mod config;

pub use config::{
    Config, ConfigError, ConfigFormat, DescriptorBudget, FrameConfig, MemoryConfig, PresentModePreference,
    RendererConfig, ShaderConfig,
};

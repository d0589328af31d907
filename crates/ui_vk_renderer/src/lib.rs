//! # UI Vulkan Renderer
//!
//! GPU backend for a retained-mode 2D user interface, written against Vulkan.
//!
//! ## Features
//!
//! - **Shared Geometry Pool**: one persistently mapped buffer, suballocated for
//!   vertices, indices and per-draw uniform blocks
//! - **Frame Pipelining**: a ring of frame slots with deferred destruction of
//!   anything a frame in flight might still read
//! - **Scissor Clipping**: hardware scissor for axis-aligned clips, stencil
//!   clipping under a transform
//! - **Resilient Presentation**: resize, minimize and out-of-date swapchains
//!   are absorbed without failing a frame
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use ui_vk_renderer::prelude::*;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = RendererConfig::new("My UI");
//!     let mut window = Window::new("My UI", 1280, 720)?;
//!     let backend = VulkanBackend::new(&window, &config)?;
//!     let (width, height) = window.get_framebuffer_size();
//!     let mut renderer = UiRenderer::new(backend, &config, width, height)?;
//!
//!     while !window.should_close() {
//!         window.poll_events();
//!         if renderer.begin_frame() {
//!             // Issue render_geometry / render_immediate calls here
//!             renderer.end_frame();
//!         }
//!     }
//!
//!     renderer.shutdown();
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions, clippy::similar_names, clippy::too_many_arguments)]

// Configuration
pub mod config;
pub mod core;

// Shared utilities
pub mod foundation;

// Renderer and backends
pub mod render;

/// Common imports for renderer users
pub mod prelude {
    pub use crate::{
        core::config::{PresentModePreference, RendererConfig, ShaderConfig},
        foundation::math::{Mat4, Vec2},
        render::{
            backends::vulkan::{VulkanBackend, VulkanUiRenderer, Window},
            GeometryHandle, RenderError, RenderInterface, RenderResult, ScissorRect, TextureHandle, UiRenderer,
            Vertex,
        },
    };
}

//! # Rendering System
//!
//! Backend-independent half of the UI renderer plus the Vulkan backend.
//!
//! ## Architecture
//!
//! - **Memory**: virtual suballocation of one persistently mapped GPU buffer
//! - **Frame**: slot ring, deferred deletion buckets and the frame state machine
//! - **Registry**: generation-checked geometry and texture handles
//! - **Renderer**: [`UiRenderer`], the facade the UI engine talks to
//! - **Backends**: [`GpuBackend`] implementations (Vulkan)
//!
//! Everything above the backend seam is plain Rust and is tested against a
//! mock backend, no GPU needed.

pub mod api;
pub mod backends;
pub mod frame;
pub mod memory;
pub mod registry;
pub mod renderer;

#[cfg(test)]
pub(crate) mod testing;
#[cfg(test)]
mod tests;

pub use api::{
    AcquireOutcome, DrawCommand, GpuBackend, PipelineKind, PresentOutcome, RenderInterface, ScissorRect,
    SurfaceStatus, UniformBlock, Vertex,
};
pub use memory::{MemoryPool, MemoryRegion};
pub use registry::{GeometryHandle, TextureHandle};
pub use renderer::UiRenderer;

use thiserror::Error;

/// Errors raised by the renderer
///
/// Resource exhaustion and stale handles only ever fail the one call that
/// hit them. Nothing here is meant to cross the [`RenderInterface`] boundary,
/// which logs and returns `false`/`None` instead.
#[derive(Error, Debug)]
pub enum RenderError {
    /// Renderer initialization failed during setup
    ///
    /// No suitable device or queue family, or the driver refused a core object.
    #[error("Renderer initialization failed: {0}")]
    InitializationFailed(String),

    /// The virtual memory pool has no free range large enough
    #[error("Memory pool exhausted: no free range for {requested} bytes")]
    PoolExhausted {
        /// Size of the failed request after alignment
        requested: u64,
    },

    /// A region was freed that the pool does not consider live
    #[error("Region at offset {offset} is not a live pool allocation")]
    UnknownRegion {
        /// Offset of the rejected region
        offset: u64,
    },

    /// The descriptor pool cannot hand out another set
    #[error("Descriptor pool exhausted")]
    DescriptorPoolExhausted,

    /// A geometry or texture handle was used after release
    #[error("Stale {0} handle")]
    StaleHandle(&'static str),

    /// Geometry input that cannot be drawn
    #[error("Invalid geometry: {0}")]
    InvalidGeometry(String),

    /// Pixel input that does not describe an RGBA8 image
    #[error("Invalid texture: {0}")]
    InvalidTexture(String),

    /// Decoding a texture file failed
    #[error("Failed to load texture: {0}")]
    TextureLoad(String),

    /// A draw or state call arrived outside `begin_frame`/`end_frame`
    #[error("No frame is being recorded")]
    NoActiveFrame,

    /// Backend-specific error occurred
    #[error("Backend error: {0}")]
    Backend(String),
}

impl RenderError {
    /// Exhaustion and contract violations, the errors strict mode asserts on
    pub const fn is_assertable(&self) -> bool {
        matches!(
            self,
            Self::PoolExhausted { .. }
                | Self::UnknownRegion { .. }
                | Self::DescriptorPoolExhausted
                | Self::StaleHandle(_)
                | Self::NoActiveFrame
        )
    }
}

/// Result type for rendering operations
pub type RenderResult<T> = Result<T, RenderError>;

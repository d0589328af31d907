//! Public rendering API
//!
//! The engine-facing [`RenderInterface`], the vertex and uniform layouts it
//! speaks in, and the [`GpuBackend`] seam the renderer drives.

pub mod backend;
pub mod render_interface;
pub mod types;

pub use backend::{AcquireOutcome, DrawCommand, GpuBackend, PipelineKind, PresentOutcome, SurfaceStatus};
pub use render_interface::RenderInterface;
pub use types::{ScissorRect, UniformBlock, Vertex};

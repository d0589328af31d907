//! Backend abstraction for the UI renderer
//!
//! [`UiRenderer`](crate::render::UiRenderer) owns every algorithm that does not
//! need the GPU: pool suballocation, the slot ring, deferred deletion and the
//! frame state machine. A backend only executes the GPU side of each step and
//! owns the objects that cannot exist without a device.

use crate::render::memory::MemoryRegion;
use crate::render::{RenderResult, ScissorRect};

/// Result of acquiring a presentable image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquireOutcome {
    /// Image acquired, swapchain matches the surface
    Ready,
    /// Image acquired, but the swapchain should be recreated after present
    Suboptimal,
    /// No image, the swapchain must be recreated first
    OutOfDate,
}

/// Result of queueing a present
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresentOutcome {
    /// Presented, nothing to do
    Presented,
    /// Presented, recreate before the next frame
    Suboptimal,
    /// Not presented, recreate before the next frame
    OutOfDate,
}

impl PresentOutcome {
    /// Whether the swapchain should be rebuilt
    pub const fn needs_recreate(self) -> bool {
        !matches!(self, Self::Presented)
    }
}

/// Result of building size-dependent resources
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceStatus {
    /// Swapchain and targets exist with this extent
    Ready {
        /// Extent chosen for the swapchain
        width: u32,
        /// Extent chosen for the swapchain
        height: u32,
    },
    /// The surface has zero area, nothing was created
    Degenerate,
}

/// Graphics pipeline variants
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PipelineKind {
    /// Vertex colour only
    Color,
    /// Vertex colour times texture
    Textured,
    /// Writes the clip shape into the stencil attachment, no colour output
    StencilWrite,
    /// [`PipelineKind::Color`] restricted to the stencil shape
    StencilColor,
    /// [`PipelineKind::Textured`] restricted to the stencil shape
    StencilTextured,
}

impl PipelineKind {
    /// Every variant, in creation order
    pub const ALL: [Self; 5] = [
        Self::Color,
        Self::Textured,
        Self::StencilWrite,
        Self::StencilColor,
        Self::StencilTextured,
    ];

    /// Pipeline for a regular draw
    pub const fn for_draw(textured: bool, stencil_clip: bool) -> Self {
        match (textured, stencil_clip) {
            (false, false) => Self::Color,
            (true, false) => Self::Textured,
            (false, true) => Self::StencilColor,
            (true, true) => Self::StencilTextured,
        }
    }

    /// Whether the pipeline samples a texture
    pub const fn is_textured(self) -> bool {
        matches!(self, Self::Textured | Self::StencilTextured)
    }
}

/// One indexed draw out of the shared pool buffer
#[derive(Debug)]
pub struct DrawCommand<'a, D> {
    /// Pipeline to bind
    pub pipeline: PipelineKind,
    /// Vertex data
    pub vertices: MemoryRegion,
    /// `u32` index data
    pub indices: MemoryRegion,
    /// Number of indices to draw
    pub index_count: u32,
    /// Uniform block, bound as the dynamic offset
    pub uniforms: MemoryRegion,
    /// Texture descriptor when the pipeline is textured
    pub texture: Option<&'a D>,
}

/// GPU side of the renderer
///
/// Every call comes from the render thread in the order the renderer's frame
/// state machine allows. Slot indices are always `< ring_depth`.
pub trait GpuBackend {
    /// Owned GPU texture (image, view and memory)
    type Texture;
    /// Descriptor binding a texture for sampling
    type Descriptor;

    /// Size of the shared geometry buffer in bytes
    fn pool_size(&self) -> u64;

    /// Alignment every pool region must honour for dynamic uniform offsets
    fn min_uniform_alignment(&self) -> u64;

    /// Copy `bytes` into the shared buffer at `region`
    fn write_pool(&mut self, region: MemoryRegion, bytes: &[u8]) -> RenderResult<()>;

    /// Block until the previous submission from `slot` has finished
    fn wait_for_slot(&mut self, slot: usize) -> RenderResult<()>;

    /// Acquire the next presentable image for `slot`
    fn acquire_image(&mut self, slot: usize) -> RenderResult<AcquireOutcome>;

    /// Reset the slot's command pool and open its render pass
    fn begin_recording(&mut self, slot: usize) -> RenderResult<()>;

    /// Close the render pass and the command buffer
    fn end_recording(&mut self, slot: usize) -> RenderResult<()>;

    /// Reset the slot's fence and submit its command buffer
    ///
    /// A failed submit must leave the slot's fence signalled so the next
    /// [`GpuBackend::wait_for_slot`] on it returns.
    fn submit(&mut self, slot: usize) -> RenderResult<()>;

    /// Queue the acquired image for presentation
    fn present(&mut self, slot: usize) -> RenderResult<PresentOutcome>;

    /// Block until the device has no pending work
    fn wait_idle(&mut self) -> RenderResult<()>;

    /// Destroy the swapchain and everything sized by it
    ///
    /// Must be a no-op when nothing exists.
    fn release_surface_resources(&mut self);

    /// Build the swapchain and everything sized by it for a requested extent
    fn create_surface_resources(&mut self, width: u32, height: u32) -> RenderResult<SurfaceStatus>;

    /// Set the hardware scissor
    fn set_scissor(&mut self, rect: ScissorRect);

    /// Clear the stencil attachment inside the current render pass
    fn clear_stencil(&mut self);

    /// Record an indexed draw
    fn draw(&mut self, command: &DrawCommand<'_, Self::Descriptor>);

    /// Upload RGBA8 pixels into a new sampled texture
    fn create_texture(&mut self, pixels: &[u8], width: u32, height: u32) -> RenderResult<Self::Texture>;

    /// Allocate and write a descriptor for sampling `texture`
    fn create_texture_descriptor(&mut self, texture: &Self::Texture) -> RenderResult<Self::Descriptor>;

    /// Destroy a texture and its descriptor, if any
    ///
    /// Only called once no frame in flight can still reference them.
    fn destroy_texture(&mut self, texture: Self::Texture, descriptor: Option<Self::Descriptor>);

    /// Descriptor sets currently handed out
    fn outstanding_descriptors(&self) -> usize;

    /// Release device-lifetime objects, after the device is idle
    fn shutdown(&mut self);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pipeline_selection() {
        assert_eq!(PipelineKind::for_draw(false, false), PipelineKind::Color);
        assert_eq!(PipelineKind::for_draw(true, false), PipelineKind::Textured);
        assert_eq!(PipelineKind::for_draw(false, true), PipelineKind::StencilColor);
        assert_eq!(PipelineKind::for_draw(true, true), PipelineKind::StencilTextured);
        assert!(!PipelineKind::StencilWrite.is_textured());
    }

    #[test]
    fn test_present_outcome_recreate() {
        assert!(!PresentOutcome::Presented.needs_recreate());
        assert!(PresentOutcome::Suboptimal.needs_recreate());
        assert!(PresentOutcome::OutOfDate.needs_recreate());
    }
}

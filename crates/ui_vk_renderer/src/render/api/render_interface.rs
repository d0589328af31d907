//! The renderer as seen by the UI engine
//!
//! No `Result` crosses this boundary. Failures are logged and reported as
//! `false`/`None`, and a failed draw is simply dropped.

use std::path::Path;

use crate::foundation::math::{Mat4, Vec2};
use crate::render::{GeometryHandle, ScissorRect, TextureHandle, Vertex};

/// Draw-instruction sink driven by the UI engine
pub trait RenderInterface {
    /// Open a frame. Returns `false` when nothing can be drawn this time
    /// (surface minimized or out of date, rendering disabled).
    fn begin_frame(&mut self) -> bool;

    /// Submit and present the open frame. A no-op without a successful
    /// [`RenderInterface::begin_frame`].
    fn end_frame(&mut self);

    /// Upload geometry for repeated drawing
    fn compile_geometry(
        &mut self,
        vertices: &[Vertex],
        indices: &[u32],
        texture: Option<TextureHandle>,
    ) -> Option<GeometryHandle>;

    /// Retire geometry. The handle is invalid from here on.
    fn release_geometry(&mut self, geometry: GeometryHandle);

    /// Draw compiled geometry at `translation`, optionally overriding its texture
    fn render_geometry(&mut self, geometry: GeometryHandle, translation: Vec2, texture: Option<TextureHandle>);

    /// Decode and upload an image file, returning its handle and size
    fn load_texture(&mut self, path: &Path) -> Option<(TextureHandle, (u32, u32))>;

    /// Upload tightly packed RGBA8 pixels
    fn generate_texture(&mut self, pixels: &[u8], dimensions: (u32, u32)) -> Option<TextureHandle>;

    /// Retire a texture. The handle is invalid from here on.
    fn release_texture(&mut self, texture: TextureHandle);

    /// Turn clipping on or off for the rest of the frame
    fn enable_scissor_region(&mut self, enable: bool);

    /// Clip subsequent draws to `rect`
    fn set_scissor_region(&mut self, rect: ScissorRect);

    /// Transform applied to subsequent draws, `None` for identity
    fn set_transform(&mut self, transform: Option<&Mat4>);

    /// The host window changed size
    fn set_viewport(&mut self, width: u32, height: u32);
}

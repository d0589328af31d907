//! Data layouts shared between the UI engine, the renderer and the shaders

use crate::foundation::math::{Mat4, Vec2};

/// One UI vertex
///
/// Matches the vertex input of `ui.vert`: location 0 position, location 1
/// colour as normalized bytes, location 2 texture coordinate.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Vertex {
    /// Position in pixels, origin top-left
    pub position: [f32; 2],

    /// RGBA colour, premultiplication is up to the caller
    pub colour: [u8; 4],

    /// Texture coordinate, ignored by untextured pipelines
    pub tex_coord: [f32; 2],
}

// Only f32 and u8 arrays, no padding at 20 bytes
unsafe impl bytemuck::Pod for Vertex {}
unsafe impl bytemuck::Zeroable for Vertex {}

impl Vertex {
    /// Create a vertex
    pub const fn new(position: [f32; 2], colour: [u8; 4], tex_coord: [f32; 2]) -> Self {
        Self {
            position,
            colour,
            tex_coord,
        }
    }
}

/// Per-draw uniform data read by `ui.vert`
///
/// std140 layout: a column-major mat4 followed by a vec2 padded to 16 bytes.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UniformBlock {
    /// Projection times the active transform, column major
    pub transform: [[f32; 4]; 4],

    /// Translation in pixels applied before the transform
    pub translate: [f32; 2],

    _padding: [f32; 2],
}

unsafe impl bytemuck::Pod for UniformBlock {}
unsafe impl bytemuck::Zeroable for UniformBlock {}

impl UniformBlock {
    /// Pack a draw's transform and translation
    pub fn new(transform: &Mat4, translation: Vec2) -> Self {
        Self {
            transform: (*transform).into(),
            translate: [translation.x, translation.y],
            _padding: [0.0; 2],
        }
    }

    /// Size in bytes before pool alignment
    pub const SIZE: u64 = std::mem::size_of::<Self>() as u64;
}

/// Clip rectangle in framebuffer pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ScissorRect {
    /// Left edge, may be negative
    pub x: i32,
    /// Top edge, may be negative
    pub y: i32,
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
}

impl ScissorRect {
    /// Create a rectangle
    pub const fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    /// Rectangle covering a whole `width` by `height` target
    pub const fn full(width: u32, height: u32) -> Self {
        Self::new(0, 0, width, height)
    }

    /// Offsets folded to non-negative values for a hardware scissor
    pub const fn to_hardware(self) -> Self {
        Self::new(self.x.saturating_abs(), self.y.saturating_abs(), self.width, self.height)
    }

    /// The rectangle as two triangles, for stencil clipping
    pub fn to_quad(self) -> ([Vertex; 4], [u32; 6]) {
        let (left, top) = (self.x as f32, self.y as f32);
        let (right, bottom) = (left + self.width as f32, top + self.height as f32);
        let white = [255; 4];

        (
            [
                Vertex::new([left, top], white, [0.0, 0.0]),
                Vertex::new([right, top], white, [1.0, 0.0]),
                Vertex::new([right, bottom], white, [1.0, 1.0]),
                Vertex::new([left, bottom], white, [0.0, 1.0]),
            ],
            [0, 2, 1, 0, 3, 2],
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_layout_sizes_match_shaders() {
        assert_eq!(std::mem::size_of::<Vertex>(), 20);
        assert_eq!(std::mem::size_of::<UniformBlock>(), 80);
        assert_eq!(UniformBlock::SIZE, 80);
    }

    #[test]
    fn test_uniform_block_is_column_major() {
        let mut transform = Mat4::identity();
        transform[(0, 3)] = 7.0;
        let block = UniformBlock::new(&transform, Vec2::new(3.0, -4.0));

        assert_relative_eq!(block.transform[3][0], 7.0);
        assert_relative_eq!(block.transform[0][3], 0.0);
        assert_eq!(block.translate, [3.0, -4.0]);
    }

    #[test]
    fn test_hardware_scissor_uses_absolute_offsets() {
        let rect = ScissorRect::new(-10, 20, 100, 50).to_hardware();
        assert_eq!(rect, ScissorRect::new(10, 20, 100, 50));
    }

    #[test]
    fn test_scissor_quad_covers_rect() {
        let (vertices, indices) = ScissorRect::new(5, 10, 20, 30).to_quad();
        assert_eq!(vertices[0].position, [5.0, 10.0]);
        assert_eq!(vertices[2].position, [25.0, 40.0]);
        assert!(indices.iter().all(|&i| (i as usize) < vertices.len()));
    }
}

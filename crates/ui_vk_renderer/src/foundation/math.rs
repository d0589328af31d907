//! Math types for 2D UI rendering

pub use nalgebra::{Matrix4, Vector2, Vector4};

/// 2D vector type
pub type Vec2 = Vector2<f32>;

/// 4x4 matrix type
pub type Mat4 = Matrix4<f32>;

/// Depth range of the UI projection, matches what UI engines emit for z
const UI_DEPTH_RANGE: f32 = 10000.0;

/// Converts OpenGL style clip space (y up, z in -1..1) to Vulkan's (y down, z in 0..1)
#[rustfmt::skip]
pub fn vulkan_clip_correction() -> Mat4 {
    Mat4::new(
        1.0, 0.0, 0.0, 0.0,
        0.0, -1.0, 0.0, 0.0,
        0.0, 0.0, 0.5, 0.5,
        0.0, 0.0, 0.0, 1.0,
    )
}

/// Pixel space projection for a `width` x `height` target
///
/// The origin is the top-left corner and y grows downwards, the way UI layout
/// coordinates are expressed.
pub fn ui_projection(width: u32, height: u32) -> Mat4 {
    // Guard against a zero-sized target producing NaNs
    let w = width.max(1) as f32;
    let h = height.max(1) as f32;
    let ortho = Mat4::new_orthographic(0.0, w, h, 0.0, -UI_DEPTH_RANGE, UI_DEPTH_RANGE);
    vulkan_clip_correction() * ortho
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn project(m: &Mat4, x: f32, y: f32) -> Vector4<f32> {
        m * Vector4::new(x, y, 0.0, 1.0)
    }

    #[test]
    fn test_projection_maps_corners_to_vulkan_clip_space() {
        let p = ui_projection(800, 600);

        let top_left = project(&p, 0.0, 0.0);
        assert_relative_eq!(top_left.x, -1.0, epsilon = 1e-6);
        assert_relative_eq!(top_left.y, -1.0, epsilon = 1e-6);

        let bottom_right = project(&p, 800.0, 600.0);
        assert_relative_eq!(bottom_right.x, 1.0, epsilon = 1e-6);
        assert_relative_eq!(bottom_right.y, 1.0, epsilon = 1e-6);

        let centre = project(&p, 400.0, 300.0);
        assert_relative_eq!(centre.x, 0.0, epsilon = 1e-6);
        assert_relative_eq!(centre.y, 0.0, epsilon = 1e-6);
        assert_relative_eq!(centre.z, 0.5, epsilon = 1e-6);
    }

    #[test]
    fn test_zero_extent_projection_is_finite() {
        let p = ui_projection(0, 0);
        assert!(p.iter().all(|v| v.is_finite()));
    }
}

//! Vulkan vertex input description for the UI [`Vertex`]
//!
//! The vertex type itself lives in the backend-independent API so geometry
//! can be built without touching Vulkan.

use ash::vk;
use std::mem::size_of;

use crate::render::api::Vertex;

/// Vulkan vertex layout implementation for the UI `Vertex` type
pub struct VulkanVertexLayout;

impl VulkanVertexLayout {
    /// One interleaved binding advancing per vertex
    pub fn get_binding_description() -> vk::VertexInputBindingDescription {
        vk::VertexInputBindingDescription {
            binding: 0,
            stride: size_of::<Vertex>() as u32,
            input_rate: vk::VertexInputRate::VERTEX,
        }
    }

    /// Position, colour and texture coordinate at locations 0, 1 and 2
    pub fn get_attribute_descriptions() -> [vk::VertexInputAttributeDescription; 3] {
        [
            vk::VertexInputAttributeDescription {
                binding: 0,
                location: 0,
                format: vk::Format::R32G32_SFLOAT,
                offset: 0,
            },
            // Normalised to [0, 1] in the shader
            vk::VertexInputAttributeDescription {
                binding: 0,
                location: 1,
                format: vk::Format::R8G8B8A8_UNORM,
                offset: size_of::<[f32; 2]>() as u32,
            },
            vk::VertexInputAttributeDescription {
                binding: 0,
                location: 2,
                format: vk::Format::R32G32_SFLOAT,
                offset: (size_of::<[f32; 2]>() + size_of::<[u8; 4]>()) as u32,
            },
        ]
    }

    /// Binding and attributes together for pipeline creation
    pub fn get_input_state() -> (vk::VertexInputBindingDescription, [vk::VertexInputAttributeDescription; 3]) {
        (Self::get_binding_description(), Self::get_attribute_descriptions())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attribute_offsets_match_vertex_layout() {
        let (binding, attributes) = VulkanVertexLayout::get_input_state();
        assert_eq!(binding.stride, 20);

        let vertex = Vertex::new([1.0, 2.0], [10, 20, 30, 40], [0.25, 0.75]);
        let bytes = bytemuck::bytes_of(&vertex);

        let colour_at = attributes[1].offset as usize;
        assert_eq!(&bytes[colour_at..colour_at + 4], &[10, 20, 30, 40]);

        let uv_at = attributes[2].offset as usize;
        let u: f32 = bytemuck::pod_read_unaligned(&bytes[uv_at..uv_at + 4]);
        assert_eq!(u, 0.25);
        assert!(attributes.iter().all(|a| a.offset + 4 <= binding.stride));
    }
}

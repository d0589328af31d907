//! Graphics pipelines for UI drawing
//!
//! Five variants share one pipeline layout and differ only in fragment
//! shader, stencil state and colour write mask. All of them alpha blend,
//! skip culling and depth testing, and take viewport and scissor as dynamic
//! state.

use ash::{vk, Device};

use super::shader::UiShaders;
use super::vertex_layout::VulkanVertexLayout;
use crate::render::api::PipelineKind;
use crate::render::backends::vulkan::{VulkanError, VulkanResult};

/// Stencil reference written by the clip mask and tested by clipped draws
pub const CLIP_STENCIL_REFERENCE: u32 = 1;

/// Pipeline layout wrapper with RAII cleanup
///
/// Set 0 holds the per-draw uniform block, set 1 the sampled texture.
pub struct PipelineLayout {
    device: Device,
    layout: vk::PipelineLayout,
}

impl PipelineLayout {
    /// Create a layout over the given set layouts
    pub fn new(device: Device, set_layouts: &[vk::DescriptorSetLayout]) -> VulkanResult<Self> {
        let create_info = vk::PipelineLayoutCreateInfo::builder().set_layouts(set_layouts);
        let layout = unsafe {
            device
                .create_pipeline_layout(&create_info, None)
                .map_err(VulkanError::Api)?
        };
        Ok(Self { device, layout })
    }

    /// Get layout handle
    pub const fn handle(&self) -> vk::PipelineLayout {
        self.layout
    }
}

impl Drop for PipelineLayout {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_pipeline_layout(self.layout, None);
        }
    }
}

fn stencil_op(compare_op: vk::CompareOp, pass_op: vk::StencilOp) -> vk::StencilOpState {
    vk::StencilOpState {
        fail_op: vk::StencilOp::KEEP,
        pass_op,
        depth_fail_op: vk::StencilOp::KEEP,
        compare_op,
        compare_mask: 1,
        write_mask: 1,
        reference: CLIP_STENCIL_REFERENCE,
    }
}

/// Stencil configuration for a pipeline variant
///
/// Returns `None` when the variant ignores the stencil attachment.
pub fn stencil_state(kind: PipelineKind) -> Option<vk::StencilOpState> {
    match kind {
        PipelineKind::Color | PipelineKind::Textured => None,
        PipelineKind::StencilWrite => Some(stencil_op(vk::CompareOp::ALWAYS, vk::StencilOp::REPLACE)),
        PipelineKind::StencilColor | PipelineKind::StencilTextured => {
            Some(stencil_op(vk::CompareOp::EQUAL, vk::StencilOp::KEEP))
        }
    }
}

/// Colour channels a pipeline variant writes
pub fn color_write_mask(kind: PipelineKind) -> vk::ColorComponentFlags {
    if kind == PipelineKind::StencilWrite {
        vk::ColorComponentFlags::empty()
    } else {
        vk::ColorComponentFlags::RGBA
    }
}

/// Graphics pipeline wrapper with RAII cleanup
pub struct GraphicsPipeline {
    device: Device,
    pipeline: vk::Pipeline,
    kind: PipelineKind,
}

impl GraphicsPipeline {
    /// Create one variant for `render_pass`
    pub fn new(
        device: &Device,
        render_pass: vk::RenderPass,
        layout: &PipelineLayout,
        shaders: &UiShaders,
        kind: PipelineKind,
    ) -> VulkanResult<Self> {
        let fragment = if kind.is_textured() {
            &shaders.textured_fragment
        } else {
            &shaders.color_fragment
        };
        let shader_stages = [
            shaders.vertex.create_stage_info(vk::ShaderStageFlags::VERTEX),
            fragment.create_stage_info(vk::ShaderStageFlags::FRAGMENT),
        ];

        let (binding, attributes) = VulkanVertexLayout::get_input_state();
        let bindings = [binding];
        let vertex_input = vk::PipelineVertexInputStateCreateInfo::builder()
            .vertex_binding_descriptions(&bindings)
            .vertex_attribute_descriptions(&attributes);

        let input_assembly = vk::PipelineInputAssemblyStateCreateInfo::builder()
            .topology(vk::PrimitiveTopology::TRIANGLE_LIST)
            .primitive_restart_enable(false);

        // Viewport and scissor are set per frame
        let viewport_state = vk::PipelineViewportStateCreateInfo::builder()
            .viewport_count(1)
            .scissor_count(1);
        let dynamic_states = [vk::DynamicState::VIEWPORT, vk::DynamicState::SCISSOR];
        let dynamic_state = vk::PipelineDynamicStateCreateInfo::builder().dynamic_states(&dynamic_states);

        let rasterizer = vk::PipelineRasterizationStateCreateInfo::builder()
            .depth_clamp_enable(false)
            .rasterizer_discard_enable(false)
            .polygon_mode(vk::PolygonMode::FILL)
            .line_width(1.0)
            .cull_mode(vk::CullModeFlags::NONE)
            .front_face(vk::FrontFace::CLOCKWISE)
            .depth_bias_enable(false);

        let multisampling = vk::PipelineMultisampleStateCreateInfo::builder()
            .sample_shading_enable(false)
            .rasterization_samples(vk::SampleCountFlags::TYPE_1);

        let stencil = stencil_state(kind);
        let stencil_face = stencil.unwrap_or_default();
        let depth_stencil = vk::PipelineDepthStencilStateCreateInfo::builder()
            .depth_test_enable(false)
            .depth_write_enable(false)
            .depth_compare_op(vk::CompareOp::ALWAYS)
            .depth_bounds_test_enable(false)
            .stencil_test_enable(stencil.is_some())
            .front(stencil_face)
            .back(stencil_face);

        let color_blend_attachments = [vk::PipelineColorBlendAttachmentState::builder()
            .color_write_mask(color_write_mask(kind))
            .blend_enable(true)
            .src_color_blend_factor(vk::BlendFactor::SRC_ALPHA)
            .dst_color_blend_factor(vk::BlendFactor::ONE_MINUS_SRC_ALPHA)
            .color_blend_op(vk::BlendOp::ADD)
            .src_alpha_blend_factor(vk::BlendFactor::ONE)
            .dst_alpha_blend_factor(vk::BlendFactor::ONE_MINUS_SRC_ALPHA)
            .alpha_blend_op(vk::BlendOp::ADD)
            .build()];
        let color_blending = vk::PipelineColorBlendStateCreateInfo::builder()
            .logic_op_enable(false)
            .attachments(&color_blend_attachments);

        let pipeline_info = vk::GraphicsPipelineCreateInfo::builder()
            .stages(&shader_stages)
            .vertex_input_state(&vertex_input)
            .input_assembly_state(&input_assembly)
            .viewport_state(&viewport_state)
            .rasterization_state(&rasterizer)
            .multisample_state(&multisampling)
            .depth_stencil_state(&depth_stencil)
            .color_blend_state(&color_blending)
            .dynamic_state(&dynamic_state)
            .layout(layout.handle())
            .render_pass(render_pass)
            .subpass(0);

        let pipelines = unsafe {
            device
                .create_graphics_pipelines(vk::PipelineCache::null(), &[pipeline_info.build()], None)
                .map_err(|(_, err)| VulkanError::Api(err))?
        };
        let pipeline = pipelines.into_iter().next().ok_or_else(|| VulkanError::InvalidOperation {
            reason: "driver returned no pipeline".to_string(),
        })?;

        Ok(Self {
            device: device.clone(),
            pipeline,
            kind,
        })
    }

    /// Get pipeline handle
    pub const fn handle(&self) -> vk::Pipeline {
        self.pipeline
    }

    /// Which variant this is
    pub const fn kind(&self) -> PipelineKind {
        self.kind
    }
}

impl Drop for GraphicsPipeline {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_pipeline(self.pipeline, None);
        }
    }
}

/// Every [`PipelineKind`] built against one render pass
pub struct UiPipelines {
    pipelines: Vec<GraphicsPipeline>,
}

impl UiPipelines {
    /// Build all variants
    pub fn new(
        device: &Device,
        render_pass: vk::RenderPass,
        layout: &PipelineLayout,
        shaders: &UiShaders,
    ) -> VulkanResult<Self> {
        let pipelines = PipelineKind::ALL
            .iter()
            .map(|&kind| GraphicsPipeline::new(device, render_pass, layout, shaders, kind))
            .collect::<VulkanResult<Vec<_>>>()?;

        log::debug!("Built {} UI pipelines", pipelines.len());
        Ok(Self { pipelines })
    }

    /// Handle for a variant
    pub fn get(&self, kind: PipelineKind) -> vk::Pipeline {
        self.pipelines
            .iter()
            .find(|p| p.kind() == kind)
            .map_or(vk::Pipeline::null(), GraphicsPipeline::handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_pipelines_ignore_stencil() {
        assert!(stencil_state(PipelineKind::Color).is_none());
        assert!(stencil_state(PipelineKind::Textured).is_none());
    }

    #[test]
    fn test_stencil_write_replaces_without_colour() {
        let state = stencil_state(PipelineKind::StencilWrite).expect("Should use stencil");
        assert_eq!(state.compare_op, vk::CompareOp::ALWAYS);
        assert_eq!(state.pass_op, vk::StencilOp::REPLACE);
        assert_eq!(state.reference, CLIP_STENCIL_REFERENCE);
        assert!(color_write_mask(PipelineKind::StencilWrite).is_empty());
    }

    #[test]
    fn test_clipped_pipelines_test_equal_and_keep() {
        for kind in [PipelineKind::StencilColor, PipelineKind::StencilTextured] {
            let state = stencil_state(kind).expect("Should use stencil");
            assert_eq!(state.compare_op, vk::CompareOp::EQUAL);
            assert_eq!(state.pass_op, vk::StencilOp::KEEP);
            assert_eq!((state.compare_mask, state.write_mask), (1, 1));
            assert_eq!(color_write_mask(kind), vk::ColorComponentFlags::RGBA);
        }
    }
}

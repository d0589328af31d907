//! Everything sized by the swapchain
//!
//! [`SurfaceTargets`] bundles the swapchain, the depth/stencil image, the
//! render pass, the pipelines built against it and one framebuffer per
//! swapchain image. The whole bundle is dropped and rebuilt on every resize,
//! so each of these objects is created and destroyed exactly once per
//! recreation.

use ash::{vk, Device};
use std::sync::Arc;
use vk_mem::Alloc;

use super::swapchain::{Swapchain, SwapchainRequest, SwapchainSupport};
use crate::render::backends::vulkan::rendering::{PipelineLayout, RenderPass, UiPipelines, UiShaders};
use crate::render::backends::vulkan::{VulkanContext, VulkanError, VulkanResult};

/// Depth/stencil attachment allocated through `vk-mem`
pub struct DepthStencilImage {
    device: Device,
    allocator: Arc<vk_mem::Allocator>,
    image: vk::Image,
    allocation: vk_mem::Allocation,
    view: vk::ImageView,
}

impl DepthStencilImage {
    /// Create an attachment of `format` covering `extent`
    pub fn new(
        device: Device,
        allocator: Arc<vk_mem::Allocator>,
        format: vk::Format,
        extent: vk::Extent2D,
    ) -> VulkanResult<Self> {
        let image_info = vk::ImageCreateInfo::builder()
            .image_type(vk::ImageType::TYPE_2D)
            .extent(vk::Extent3D {
                width: extent.width,
                height: extent.height,
                depth: 1,
            })
            .mip_levels(1)
            .array_layers(1)
            .format(format)
            .tiling(vk::ImageTiling::OPTIMAL)
            .initial_layout(vk::ImageLayout::UNDEFINED)
            .usage(vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT)
            .sharing_mode(vk::SharingMode::EXCLUSIVE)
            .samples(vk::SampleCountFlags::TYPE_1);

        let allocation_info = vk_mem::AllocationCreateInfo {
            usage: vk_mem::MemoryUsage::AutoPreferDevice,
            ..Default::default()
        };

        let (image, mut allocation) =
            unsafe { allocator.create_image(&image_info, &allocation_info) }.map_err(VulkanError::Api)?;

        let view_info = vk::ImageViewCreateInfo::builder()
            .image(image)
            .view_type(vk::ImageViewType::TYPE_2D)
            .format(format)
            .subresource_range(vk::ImageSubresourceRange {
                aspect_mask: vk::ImageAspectFlags::DEPTH | vk::ImageAspectFlags::STENCIL,
                base_mip_level: 0,
                level_count: 1,
                base_array_layer: 0,
                layer_count: 1,
            });

        let view = match unsafe { device.create_image_view(&view_info, None) } {
            Ok(view) => view,
            Err(e) => {
                unsafe { allocator.destroy_image(image, &mut allocation) };
                return Err(VulkanError::Api(e));
            }
        };

        Ok(Self {
            device,
            allocator,
            image,
            allocation,
            view,
        })
    }

    /// Get the image view
    pub const fn view(&self) -> vk::ImageView {
        self.view
    }
}

impl Drop for DepthStencilImage {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_image_view(self.view, None);
            self.allocator.destroy_image(self.image, &mut self.allocation);
        }
    }
}

/// Framebuffer wrapper with RAII cleanup
pub struct Framebuffer {
    device: Device,
    framebuffer: vk::Framebuffer,
}

impl Framebuffer {
    /// Create a framebuffer over `attachments`
    pub fn new(
        device: Device,
        render_pass: vk::RenderPass,
        attachments: &[vk::ImageView],
        extent: vk::Extent2D,
    ) -> VulkanResult<Self> {
        let create_info = vk::FramebufferCreateInfo::builder()
            .render_pass(render_pass)
            .attachments(attachments)
            .width(extent.width)
            .height(extent.height)
            .layers(1);

        let framebuffer = unsafe { device.create_framebuffer(&create_info, None) }.map_err(VulkanError::Api)?;
        Ok(Self { device, framebuffer })
    }

    /// Get the framebuffer handle
    pub const fn handle(&self) -> vk::Framebuffer {
        self.framebuffer
    }
}

impl Drop for Framebuffer {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_framebuffer(self.framebuffer, None);
        }
    }
}

/// Swapchain plus every object that depends on its size or format
///
/// Fields drop in declaration order, dependents first.
pub struct SurfaceTargets {
    framebuffers: Vec<Framebuffer>,
    pipelines: UiPipelines,
    // Referenced only through the framebuffers
    _depth_stencil: DepthStencilImage,
    render_pass: RenderPass,
    swapchain: Swapchain,
}

impl SurfaceTargets {
    /// Build the whole bundle
    ///
    /// Returns `Ok(None)` when the surface currently has zero area.
    pub fn new(
        context: &VulkanContext,
        allocator: &Arc<vk_mem::Allocator>,
        layout: &PipelineLayout,
        shaders: &UiShaders,
        request: &SwapchainRequest,
    ) -> VulkanResult<Option<Self>> {
        let physical_device = context.physical_device.device;
        let support = SwapchainSupport {
            capabilities: context.surface.capabilities(physical_device)?,
            formats: context.surface.formats(physical_device)?,
            present_modes: context.surface.present_modes(physical_device)?,
        };

        let extent = super::swapchain::choose_extent(&support.capabilities, request.extent);
        if extent.width == 0 || extent.height == 0 {
            log::debug!("Surface has zero area, skipping swapchain creation");
            return Ok(None);
        }

        let device = context.raw_device();
        let swapchain = Swapchain::new(
            device.clone(),
            context.swapchain_loader().clone(),
            context.surface.handle(),
            &support,
            request,
        )?;

        let depth_format = context.physical_device.depth_stencil_format;
        let render_pass = RenderPass::new_ui_pass(device.clone(), swapchain.format().format, depth_format)?;
        let depth_stencil = DepthStencilImage::new(device.clone(), allocator.clone(), depth_format, swapchain.extent())?;
        let pipelines = UiPipelines::new(device, render_pass.handle(), layout, shaders)?;

        let framebuffers = swapchain
            .image_views()
            .iter()
            .map(|&view| {
                Framebuffer::new(
                    device.clone(),
                    render_pass.handle(),
                    &[view, depth_stencil.view()],
                    swapchain.extent(),
                )
            })
            .collect::<VulkanResult<Vec<_>>>()?;

        Ok(Some(Self {
            framebuffers,
            pipelines,
            _depth_stencil: depth_stencil,
            render_pass,
            swapchain,
        }))
    }

    /// The swapchain
    pub const fn swapchain(&self) -> &Swapchain {
        &self.swapchain
    }

    /// The UI render pass
    pub const fn render_pass(&self) -> vk::RenderPass {
        self.render_pass.handle()
    }

    /// Framebuffer for a swapchain image index
    pub fn framebuffer(&self, image_index: u32) -> Option<vk::Framebuffer> {
        self.framebuffers.get(image_index as usize).map(Framebuffer::handle)
    }

    /// Pipelines built for this render pass
    pub const fn pipelines(&self) -> &UiPipelines {
        &self.pipelines
    }

    /// Current image extent
    pub const fn extent(&self) -> vk::Extent2D {
        self.swapchain.extent()
    }
}

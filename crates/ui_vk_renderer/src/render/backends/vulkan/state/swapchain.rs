//! Vulkan swapchain management
//!
//! Every creation choice is a pure function of the surface's reported
//! capabilities so it can be tested without a device. [`Swapchain::new`]
//! only strings them together and owns the resulting handles.

use ash::extensions::khr::Swapchain as SwapchainLoader;
use ash::{vk, Device};

use crate::core::PresentModePreference;
use crate::render::backends::vulkan::{VulkanError, VulkanResult};

/// Pick the colour format for presentable images
///
/// Prefers `B8G8R8A8_UNORM` in `SRGB_NONLINEAR`, otherwise takes whatever the
/// surface lists first. Returns `None` only for an empty list.
pub fn choose_surface_format(available: &[vk::SurfaceFormatKHR]) -> Option<vk::SurfaceFormatKHR> {
    available
        .iter()
        .find(|sf| sf.format == vk::Format::B8G8R8A8_UNORM && sf.color_space == vk::ColorSpaceKHR::SRGB_NONLINEAR)
        .or_else(|| available.first())
        .copied()
}

/// Pick the image extent
///
/// The surface dictates the size unless it reports the `u32::MAX` sentinel,
/// in which case the requested size is clamped to the allowed range.
pub fn choose_extent(caps: &vk::SurfaceCapabilitiesKHR, requested: (u32, u32)) -> vk::Extent2D {
    if caps.current_extent.width != u32::MAX {
        return caps.current_extent;
    }

    vk::Extent2D {
        width: requested.0.clamp(caps.min_image_extent.width, caps.max_image_extent.width),
        height: requested.1.clamp(caps.min_image_extent.height, caps.max_image_extent.height),
    }
}

/// Pick how many presentable images to request
///
/// `max_image_count == 0` means the surface has no upper limit.
pub fn choose_image_count(ring_depth: usize, caps: &vk::SurfaceCapabilitiesKHR) -> u32 {
    let wanted = u32::try_from(ring_depth).unwrap_or(u32::MAX).max(caps.min_image_count);
    if caps.max_image_count > 0 {
        wanted.min(caps.max_image_count)
    } else {
        wanted
    }
}

/// Identity when the surface allows it, otherwise whatever it currently uses
pub fn choose_pre_transform(caps: &vk::SurfaceCapabilitiesKHR) -> vk::SurfaceTransformFlagsKHR {
    if caps
        .supported_transforms
        .contains(vk::SurfaceTransformFlagsKHR::IDENTITY)
    {
        vk::SurfaceTransformFlagsKHR::IDENTITY
    } else {
        caps.current_transform
    }
}

/// First supported of opaque, pre-multiplied, post-multiplied, inherit
pub fn choose_composite_alpha(caps: &vk::SurfaceCapabilitiesKHR) -> vk::CompositeAlphaFlagsKHR {
    [
        vk::CompositeAlphaFlagsKHR::OPAQUE,
        vk::CompositeAlphaFlagsKHR::PRE_MULTIPLIED,
        vk::CompositeAlphaFlagsKHR::POST_MULTIPLIED,
        vk::CompositeAlphaFlagsKHR::INHERIT,
    ]
    .into_iter()
    .find(|&mode| caps.supported_composite_alpha.contains(mode))
    .unwrap_or(vk::CompositeAlphaFlagsKHR::OPAQUE)
}

/// The preferred mode when available, otherwise FIFO
pub fn choose_present_mode(preference: PresentModePreference, available: &[vk::PresentModeKHR]) -> vk::PresentModeKHR {
    let wanted = match preference {
        PresentModePreference::Fifo => vk::PresentModeKHR::FIFO,
        PresentModePreference::FifoRelaxed => vk::PresentModeKHR::FIFO_RELAXED,
        PresentModePreference::Mailbox => vk::PresentModeKHR::MAILBOX,
        PresentModePreference::Immediate => vk::PresentModeKHR::IMMEDIATE,
    };

    if available.contains(&wanted) {
        wanted
    } else {
        vk::PresentModeKHR::FIFO
    }
}

/// Surface state read fresh for every (re)creation
pub struct SwapchainSupport {
    /// Surface capabilities
    pub capabilities: vk::SurfaceCapabilitiesKHR,
    /// Supported colour formats
    pub formats: Vec<vk::SurfaceFormatKHR>,
    /// Supported present modes
    pub present_modes: Vec<vk::PresentModeKHR>,
}

/// Parameters that are not read from the surface
pub struct SwapchainRequest {
    /// Size the host asked for
    pub extent: (u32, u32),
    /// Frame ring depth
    pub ring_depth: usize,
    /// Configured present mode
    pub present_mode: PresentModePreference,
    /// Queue families that touch the images (graphics, present)
    pub queue_families: [u32; 2],
}

/// Swapchain management wrapper with RAII cleanup
pub struct Swapchain {
    device: Device,
    swapchain_loader: SwapchainLoader,
    swapchain: vk::SwapchainKHR,
    images: Vec<vk::Image>,
    image_views: Vec<vk::ImageView>,
    format: vk::SurfaceFormatKHR,
    extent: vk::Extent2D,
    present_mode: vk::PresentModeKHR,
}

impl Swapchain {
    /// Create a swapchain
    ///
    /// The caller must not pass a zero-area extent; check
    /// [`choose_extent`] first. Any previous swapchain for the surface must
    /// already be destroyed.
    pub fn new(
        device: Device,
        swapchain_loader: SwapchainLoader,
        surface: vk::SurfaceKHR,
        support: &SwapchainSupport,
        request: &SwapchainRequest,
    ) -> VulkanResult<Self> {
        let caps = &support.capabilities;
        let format = choose_surface_format(&support.formats).ok_or_else(|| VulkanError::InvalidOperation {
            reason: "surface reports no formats".to_string(),
        })?;
        let extent = choose_extent(caps, request.extent);
        let present_mode = choose_present_mode(request.present_mode, &support.present_modes);
        let image_count = choose_image_count(request.ring_depth, caps);

        let (sharing_mode, families): (vk::SharingMode, &[u32]) =
            if request.queue_families[0] == request.queue_families[1] {
                (vk::SharingMode::EXCLUSIVE, &[])
            } else {
                (vk::SharingMode::CONCURRENT, &request.queue_families)
            };

        let create_info = vk::SwapchainCreateInfoKHR::builder()
            .surface(surface)
            .min_image_count(image_count)
            .image_format(format.format)
            .image_color_space(format.color_space)
            .image_extent(extent)
            .image_array_layers(1)
            .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT)
            .image_sharing_mode(sharing_mode)
            .queue_family_indices(families)
            .pre_transform(choose_pre_transform(caps))
            .composite_alpha(choose_composite_alpha(caps))
            .present_mode(present_mode)
            .clipped(true);

        let swapchain = unsafe {
            swapchain_loader
                .create_swapchain(&create_info, None)
                .map_err(VulkanError::Api)?
        };

        let images = match unsafe { swapchain_loader.get_swapchain_images(swapchain) } {
            Ok(images) => images,
            Err(e) => {
                unsafe { swapchain_loader.destroy_swapchain(swapchain, None) };
                return Err(VulkanError::Api(e));
            }
        };

        // Build the wrapper first so a failed view creation still cleans up
        let mut this = Self {
            device,
            swapchain_loader,
            swapchain,
            images,
            image_views: Vec::new(),
            format,
            extent,
            present_mode,
        };

        for &image in &this.images {
            let create_info = vk::ImageViewCreateInfo::builder()
                .image(image)
                .view_type(vk::ImageViewType::TYPE_2D)
                .format(format.format)
                .components(vk::ComponentMapping {
                    r: vk::ComponentSwizzle::IDENTITY,
                    g: vk::ComponentSwizzle::IDENTITY,
                    b: vk::ComponentSwizzle::IDENTITY,
                    a: vk::ComponentSwizzle::IDENTITY,
                })
                .subresource_range(vk::ImageSubresourceRange {
                    aspect_mask: vk::ImageAspectFlags::COLOR,
                    base_mip_level: 0,
                    level_count: 1,
                    base_array_layer: 0,
                    layer_count: 1,
                });

            let view = unsafe {
                this.device
                    .create_image_view(&create_info, None)
                    .map_err(VulkanError::Api)?
            };
            this.image_views.push(view);
        }

        log::info!(
            "Created swapchain: {}x{}, {} images, {:?}, {:?}",
            extent.width,
            extent.height,
            this.images.len(),
            format.format,
            present_mode
        );

        Ok(this)
    }

    /// Acquire the next presentable image
    ///
    /// Returns the image index and whether the swapchain is suboptimal.
    pub fn acquire_next_image(&self, signal: vk::Semaphore) -> Result<(u32, bool), vk::Result> {
        unsafe {
            self.swapchain_loader
                .acquire_next_image(self.swapchain, u64::MAX, signal, vk::Fence::null())
        }
    }

    /// Queue `image_index` for presentation once `wait` is signalled
    ///
    /// Returns whether the swapchain is suboptimal.
    pub fn present(&self, queue: vk::Queue, image_index: u32, wait: vk::Semaphore) -> Result<bool, vk::Result> {
        let swapchains = [self.swapchain];
        let indices = [image_index];
        let waits = [wait];
        let present_info = vk::PresentInfoKHR::builder()
            .wait_semaphores(&waits)
            .swapchains(&swapchains)
            .image_indices(&indices);

        unsafe { self.swapchain_loader.queue_present(queue, &present_info) }
    }

    /// Get swapchain handle
    pub const fn handle(&self) -> vk::SwapchainKHR {
        self.swapchain
    }

    /// Get image views
    pub fn image_views(&self) -> &[vk::ImageView] {
        &self.image_views
    }

    /// Get swapchain format
    pub const fn format(&self) -> vk::SurfaceFormatKHR {
        self.format
    }

    /// Get swapchain extent
    pub const fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    /// Get the present mode actually in use
    pub const fn present_mode(&self) -> vk::PresentModeKHR {
        self.present_mode
    }

    /// Get image count
    pub fn image_count(&self) -> usize {
        self.images.len()
    }
}

impl Drop for Swapchain {
    fn drop(&mut self) {
        unsafe {
            for &view in &self.image_views {
                self.device.destroy_image_view(view, None);
            }
            self.swapchain_loader.destroy_swapchain(self.swapchain, None);
        }
        log::debug!("Destroyed swapchain ({} views)", self.image_views.len());
    }
}

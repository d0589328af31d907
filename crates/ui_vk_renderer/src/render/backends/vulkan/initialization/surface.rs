//! Vulkan surface management
//!
//! The host window is an outside collaborator. It only has to say which
//! instance extensions it needs, create a surface on request and report its
//! framebuffer size; [`SurfaceProvider`] is that contract.

use ash::{extensions::khr, vk, Entry, Instance};
use raw_window_handle::{HasRawDisplayHandle, HasRawWindowHandle};
use std::ffi::{CStr, CString};

use super::context::{VulkanError, VulkanResult};

/// Host window as seen by the Vulkan backend
pub trait SurfaceProvider {
    /// Instance extensions required to present to this window
    fn required_instance_extensions(&self) -> VulkanResult<Vec<CString>>;

    /// Create a presentation surface for this window
    fn create_surface(&self, entry: &Entry, instance: &Instance) -> VulkanResult<vk::SurfaceKHR>;

    /// Current framebuffer size in pixels, zero while minimized
    fn framebuffer_extent(&self) -> (u32, u32);
}

/// Any `raw-window-handle` window, surfaced through `ash-window`
pub struct RawWindowSurface<'a, W> {
    window: &'a W,
    extent: (u32, u32),
}

impl<'a, W: HasRawWindowHandle + HasRawDisplayHandle> RawWindowSurface<'a, W> {
    /// Wrap a window whose framebuffer is currently `extent`
    pub const fn new(window: &'a W, extent: (u32, u32)) -> Self {
        Self { window, extent }
    }
}

impl<W: HasRawWindowHandle + HasRawDisplayHandle> SurfaceProvider for RawWindowSurface<'_, W> {
    fn required_instance_extensions(&self) -> VulkanResult<Vec<CString>> {
        let names = ash_window::enumerate_required_extensions(self.window.raw_display_handle())
            .map_err(VulkanError::Api)?;
        Ok(names
            .iter()
            .map(|&name| unsafe { CStr::from_ptr(name) }.to_owned())
            .collect())
    }

    fn create_surface(&self, entry: &Entry, instance: &Instance) -> VulkanResult<vk::SurfaceKHR> {
        unsafe {
            ash_window::create_surface(
                entry,
                instance,
                self.window.raw_display_handle(),
                self.window.raw_window_handle(),
                None,
            )
        }
        .map_err(|e| VulkanError::InitializationFailed(format!("Failed to create surface: {e:?}")))
    }

    fn framebuffer_extent(&self) -> (u32, u32) {
        self.extent
    }
}

/// Vulkan surface wrapper for presentation
pub struct Surface {
    surface_loader: khr::Surface,
    surface: vk::SurfaceKHR,
}

impl Surface {
    /// Create the surface for a host window
    pub fn new<P: SurfaceProvider + ?Sized>(entry: &Entry, instance: &Instance, provider: &P) -> VulkanResult<Self> {
        let surface_loader = khr::Surface::new(entry, instance);
        let surface = provider.create_surface(entry, instance)?;

        Ok(Self {
            surface_loader,
            surface,
        })
    }

    /// Get the underlying surface handle
    pub const fn handle(&self) -> vk::SurfaceKHR {
        self.surface
    }

    /// Get surface capabilities for a physical device
    pub fn capabilities(&self, physical_device: vk::PhysicalDevice) -> VulkanResult<vk::SurfaceCapabilitiesKHR> {
        unsafe {
            self.surface_loader
                .get_physical_device_surface_capabilities(physical_device, self.surface)
                .map_err(VulkanError::Api)
        }
    }

    /// Get surface formats for a physical device
    pub fn formats(&self, physical_device: vk::PhysicalDevice) -> VulkanResult<Vec<vk::SurfaceFormatKHR>> {
        unsafe {
            self.surface_loader
                .get_physical_device_surface_formats(physical_device, self.surface)
                .map_err(VulkanError::Api)
        }
    }

    /// Get surface present modes for a physical device
    pub fn present_modes(&self, physical_device: vk::PhysicalDevice) -> VulkanResult<Vec<vk::PresentModeKHR>> {
        unsafe {
            self.surface_loader
                .get_physical_device_surface_present_modes(physical_device, self.surface)
                .map_err(VulkanError::Api)
        }
    }

    /// Check if a queue family supports presentation to this surface
    pub fn supports_present(&self, physical_device: vk::PhysicalDevice, queue_family_index: u32) -> VulkanResult<bool> {
        unsafe {
            self.surface_loader
                .get_physical_device_surface_support(physical_device, queue_family_index, self.surface)
                .map_err(VulkanError::Api)
        }
    }
}

impl Drop for Surface {
    fn drop(&mut self) {
        unsafe {
            self.surface_loader.destroy_surface(self.surface, None);
        }
    }
}

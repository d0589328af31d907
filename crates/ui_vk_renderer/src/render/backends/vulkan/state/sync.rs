//! Vulkan synchronization primitives for GPU/CPU coordination
//!
//! RAII wrappers for the semaphores and fences the frame loop and the upload
//! path need.
//!
//! # Frame protocol
//!
//! Each frame slot owns one [`FrameSync`]:
//!
//! ```text
//! acquire      -> signals image_available
//! submit       -> waits image_available, signals render_finished and in_flight
//! present      -> waits render_finished
//! begin_frame  -> waits in_flight before the slot is reused
//! ```
//!
//! The `in_flight` fence is created signalled so the first wait on a fresh
//! slot returns at once. It is reset only immediately before the submit that
//! will signal it again; resetting it any earlier would deadlock the next
//! wait if the frame is abandoned between acquire and submit.

use ash::vk;
use ash::Device;

use crate::render::backends::vulkan::{VulkanError, VulkanResult};

/// GPU-GPU synchronization primitive
///
/// Signalled by one queue operation and waited on by another without the
/// CPU getting involved.
pub struct Semaphore {
    device: Device,
    semaphore: vk::Semaphore,
}

impl Semaphore {
    /// Create a new semaphore
    pub fn new(device: Device) -> VulkanResult<Self> {
        let create_info = vk::SemaphoreCreateInfo::builder();

        let semaphore = unsafe {
            device
                .create_semaphore(&create_info, None)
                .map_err(VulkanError::Api)?
        };

        Ok(Self { device, semaphore })
    }

    /// Get the semaphore handle
    pub const fn handle(&self) -> vk::Semaphore {
        self.semaphore
    }
}

impl Drop for Semaphore {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_semaphore(self.semaphore, None);
        }
    }
}

/// Fence wrapper with RAII cleanup
pub struct Fence {
    device: Device,
    fence: vk::Fence,
}

impl Fence {
    /// Create a new fence
    pub fn new(device: Device, signaled: bool) -> VulkanResult<Self> {
        let flags = if signaled {
            vk::FenceCreateFlags::SIGNALED
        } else {
            vk::FenceCreateFlags::empty()
        };

        let create_info = vk::FenceCreateInfo::builder().flags(flags);

        let fence = unsafe {
            device
                .create_fence(&create_info, None)
                .map_err(VulkanError::Api)?
        };

        Ok(Self { device, fence })
    }

    /// Block until the fence is signalled
    ///
    /// `None` waits forever. A timeout surfaces as `Api(TIMEOUT)`.
    pub fn wait(&self, timeout_ns: Option<u64>) -> VulkanResult<()> {
        unsafe {
            self.device
                .wait_for_fences(&[self.fence], true, timeout_ns.unwrap_or(u64::MAX))
                .map_err(VulkanError::Api)
        }
    }

    /// Return the fence to the unsignalled state
    pub fn reset(&self) -> VulkanResult<()> {
        unsafe {
            self.device
                .reset_fences(&[self.fence])
                .map_err(VulkanError::Api)
        }
    }

    /// Get the fence handle
    pub const fn handle(&self) -> vk::Fence {
        self.fence
    }
}

impl Drop for Fence {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_fence(self.fence, None);
        }
    }
}

/// Synchronization objects owned by one frame slot
pub struct FrameSync {
    /// Signalled when the acquired swapchain image is ready to be drawn into
    pub image_available: Semaphore,
    /// Signalled when the slot's command buffer has finished executing
    pub render_finished: Semaphore,
    /// CPU-visible completion of the slot's last submit
    pub in_flight: Fence,
}

impl FrameSync {
    /// Create frame synchronization objects
    pub fn new(device: Device) -> VulkanResult<Self> {
        let image_available = Semaphore::new(device.clone())?;
        let render_finished = Semaphore::new(device.clone())?;
        let in_flight = Fence::new(device, true)?;

        Ok(Self {
            image_available,
            render_finished,
            in_flight,
        })
    }
}

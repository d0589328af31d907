//! Host-visible buffers allocated through `vk-mem`
//!
//! Every buffer the UI backend owns is written from the CPU: the shared
//! geometry pool and the one-shot staging buffers for texture uploads. Both
//! are mapped once at creation and stay mapped until drop.

use ash::vk;
use std::sync::Arc;
use vk_mem::Alloc;

use crate::render::backends::vulkan::{VulkanError, VulkanResult};
use crate::render::memory::MemoryRegion;

/// Buffer usage of the shared geometry pool
pub const POOL_BUFFER_USAGE: vk::BufferUsageFlags = vk::BufferUsageFlags::from_raw(
    vk::BufferUsageFlags::VERTEX_BUFFER.as_raw()
        | vk::BufferUsageFlags::INDEX_BUFFER.as_raw()
        | vk::BufferUsageFlags::UNIFORM_BUFFER.as_raw(),
);

/// Persistently mapped buffer with RAII cleanup
pub struct Buffer {
    allocator: Arc<vk_mem::Allocator>,
    buffer: vk::Buffer,
    allocation: vk_mem::Allocation,
    mapped: *mut u8,
    size: vk::DeviceSize,
}

impl Buffer {
    /// Create and map a host-visible buffer
    pub fn new_mapped(
        allocator: Arc<vk_mem::Allocator>,
        size: vk::DeviceSize,
        usage: vk::BufferUsageFlags,
    ) -> VulkanResult<Self> {
        if size == 0 {
            return Err(VulkanError::InvalidOperation {
                reason: "cannot create an empty buffer".to_string(),
            });
        }

        let buffer_info = vk::BufferCreateInfo::builder()
            .size(size)
            .usage(usage)
            .sharing_mode(vk::SharingMode::EXCLUSIVE);

        let allocation_info = vk_mem::AllocationCreateInfo {
            flags: vk_mem::AllocationCreateFlags::HOST_ACCESS_SEQUENTIAL_WRITE,
            usage: vk_mem::MemoryUsage::AutoPreferHost,
            required_flags: vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
            ..Default::default()
        };

        let (buffer, mut allocation) = unsafe {
            allocator
                .create_buffer(&buffer_info, &allocation_info)
                .map_err(|e| match e {
                    vk::Result::ERROR_OUT_OF_DEVICE_MEMORY | vk::Result::ERROR_OUT_OF_HOST_MEMORY => {
                        VulkanError::OutOfMemory { requested: size }
                    }
                    other => VulkanError::Api(other),
                })?
        };

        let mapped = match unsafe { allocator.map_memory(&mut allocation) } {
            Ok(ptr) => ptr,
            Err(e) => {
                unsafe { allocator.destroy_buffer(buffer, &mut allocation) };
                return Err(VulkanError::Api(e));
            }
        };

        log::debug!("Created mapped buffer: {} bytes, {:?}", size, usage);
        Ok(Self {
            allocator,
            buffer,
            allocation,
            mapped,
            size,
        })
    }

    /// Copy `bytes` to `offset`
    ///
    /// Fails without writing anything if the range does not fit.
    pub fn write(&mut self, offset: vk::DeviceSize, bytes: &[u8]) -> VulkanResult<()> {
        let end = offset.checked_add(bytes.len() as u64);
        if end.map_or(true, |end| end > self.size) {
            return Err(VulkanError::InvalidOperation {
                reason: format!("write of {} bytes at {} overruns a {} byte buffer", bytes.len(), offset, self.size),
            });
        }

        unsafe {
            std::ptr::copy_nonoverlapping(bytes.as_ptr(), self.mapped.add(offset as usize), bytes.len());
        }
        Ok(())
    }

    /// Copy `bytes` into a pool region
    ///
    /// The bytes must fit the region, not just the buffer.
    pub fn write_region(&mut self, region: MemoryRegion, bytes: &[u8]) -> VulkanResult<()> {
        if bytes.len() as u64 > region.size() {
            return Err(VulkanError::InvalidOperation {
                reason: format!("{} bytes do not fit a {} byte region", bytes.len(), region.size()),
            });
        }
        self.write(region.offset(), bytes)
    }

    /// Get buffer handle
    pub const fn handle(&self) -> vk::Buffer {
        self.buffer
    }

    /// Size in bytes
    pub const fn size(&self) -> vk::DeviceSize {
        self.size
    }
}

impl Drop for Buffer {
    fn drop(&mut self) {
        unsafe {
            self.allocator.unmap_memory(&mut self.allocation);
            self.allocator.destroy_buffer(self.buffer, &mut self.allocation);
        }
    }
}

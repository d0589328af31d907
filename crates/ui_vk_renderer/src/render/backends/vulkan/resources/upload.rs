//! Immediate transfer submissions
//!
//! Texture uploads happen outside the frame loop, at whatever point the UI
//! asks for a texture. They get their own command pool and fence so they
//! never touch a frame slot's pool or disturb its fence.

use ash::{vk, Device};

use crate::render::backends::vulkan::rendering::CommandPool;
use crate::render::backends::vulkan::state::Fence;
use crate::render::backends::vulkan::{VulkanError, VulkanResult};

/// Records, submits and waits for one-off command buffers
pub struct UploadManager {
    device: Device,
    queue: vk::Queue,
    command_buffer: vk::CommandBuffer,
    fence: Fence,
    // Frees command_buffer on drop
    _pool: CommandPool,
}

impl UploadManager {
    /// Create the pool, buffer and fence on the given queue
    pub fn new(device: Device, queue: vk::Queue, queue_family_index: u32) -> VulkanResult<Self> {
        let pool = CommandPool::new(
            device.clone(),
            queue_family_index,
            vk::CommandPoolCreateFlags::TRANSIENT | vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER,
        )?;
        let command_buffer = pool
            .allocate_command_buffers(1)?
            .into_iter()
            .next()
            .ok_or_else(|| VulkanError::InitializationFailed("no upload command buffer".to_string()))?;
        let fence = Fence::new(device.clone(), false)?;

        Ok(Self {
            device,
            queue,
            command_buffer,
            fence,
            _pool: pool,
        })
    }

    /// Record commands with `record`, submit them and block until done
    pub fn submit_immediate<F>(&self, record: F) -> VulkanResult<()>
    where
        F: FnOnce(&Device, vk::CommandBuffer),
    {
        let begin_info = vk::CommandBufferBeginInfo::builder().flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);

        unsafe {
            self.device
                .reset_command_buffer(self.command_buffer, vk::CommandBufferResetFlags::empty())
                .map_err(VulkanError::Api)?;
            self.device
                .begin_command_buffer(self.command_buffer, &begin_info)
                .map_err(VulkanError::Api)?;
        }

        record(&self.device, self.command_buffer);

        let command_buffers = [self.command_buffer];
        let submit_info = vk::SubmitInfo::builder().command_buffers(&command_buffers);

        unsafe {
            self.device
                .end_command_buffer(self.command_buffer)
                .map_err(VulkanError::Api)?;
            self.device
                .queue_submit(self.queue, &[submit_info.build()], self.fence.handle())
                .map_err(VulkanError::Api)?;
        }

        self.fence.wait(None)?;
        self.fence.reset()
    }
}

//! Command buffer management
//!
//! One transient command pool per frame slot. Resetting a whole pool at the
//! start of a slot's frame is cheaper than freeing buffers one by one, and the
//! fixed role set means no allocation happens in steady state.

use ash::{vk, Device};

use crate::render::backends::vulkan::{VulkanError, VulkanResult};

/// Command pool wrapper with RAII cleanup
pub struct CommandPool {
    device: Device,
    command_pool: vk::CommandPool,
}

impl CommandPool {
    /// Create a new command pool
    pub fn new(device: Device, queue_family_index: u32, flags: vk::CommandPoolCreateFlags) -> VulkanResult<Self> {
        let pool_create_info = vk::CommandPoolCreateInfo::builder()
            .flags(flags)
            .queue_family_index(queue_family_index);

        let command_pool = unsafe {
            device
                .create_command_pool(&pool_create_info, None)
                .map_err(VulkanError::Api)?
        };

        Ok(Self { device, command_pool })
    }

    /// Allocate primary command buffers
    pub fn allocate_command_buffers(&self, count: u32) -> VulkanResult<Vec<vk::CommandBuffer>> {
        let alloc_info = vk::CommandBufferAllocateInfo::builder()
            .command_pool(self.command_pool)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(count);

        unsafe {
            self.device
                .allocate_command_buffers(&alloc_info)
                .map_err(VulkanError::Api)
        }
    }

    /// Return every buffer allocated from this pool to the initial state
    ///
    /// None of them may still be executing.
    pub fn reset(&self) -> VulkanResult<()> {
        unsafe {
            self.device
                .reset_command_pool(self.command_pool, vk::CommandPoolResetFlags::empty())
                .map_err(VulkanError::Api)
        }
    }
}

impl Drop for CommandPool {
    fn drop(&mut self) {
        unsafe {
            // Frees every buffer allocated from the pool
            self.device.destroy_command_pool(self.command_pool, None);
        }
    }
}

/// What a command buffer in the ring is used for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(usize)]
pub enum CommandBufferRole {
    /// Render pass recording for the frame
    Main = 0,
}

impl CommandBufferRole {
    /// Number of roles, i.e. buffers per slot
    pub const COUNT: usize = 1;

    const fn index(self) -> usize {
        self as usize
    }
}

struct RingSlot {
    pool: CommandPool,
    buffers: Vec<vk::CommandBuffer>,
}

/// One command pool and one buffer per role for each frame slot
pub struct CommandBufferRing {
    device: Device,
    slots: Vec<RingSlot>,
    active: Option<usize>,
}

impl CommandBufferRing {
    /// Create `depth` slots on the given queue family
    pub fn new(device: Device, queue_family_index: u32, depth: usize) -> VulkanResult<Self> {
        let mut slots = Vec::with_capacity(depth);
        for _ in 0..depth {
            let pool = CommandPool::new(
                device.clone(),
                queue_family_index,
                vk::CommandPoolCreateFlags::TRANSIENT,
            )?;
            let buffers = pool.allocate_command_buffers(CommandBufferRole::COUNT as u32)?;
            slots.push(RingSlot { pool, buffers });
        }

        log::debug!("Created command buffer ring with {depth} slots");
        Ok(Self {
            device,
            slots,
            active: None,
        })
    }

    /// Make `slot` the active one and reset its pool
    ///
    /// The caller must have waited on the slot's fence first.
    pub fn begin_slot(&mut self, slot: usize) -> VulkanResult<()> {
        let ring_slot = self.slots.get(slot).ok_or(VulkanError::ResourceNotFound { id: slot as u64 })?;
        ring_slot.pool.reset()?;
        self.active = Some(slot);
        Ok(())
    }

    /// The buffer for `role` in the active slot
    pub fn active_buffer(&self, role: CommandBufferRole) -> VulkanResult<vk::CommandBuffer> {
        let slot = self.active.ok_or_else(|| VulkanError::InvalidOperation {
            reason: "no frame is active".to_string(),
        })?;
        Ok(self.slots[slot].buffers[role.index()])
    }

    /// Begin one-time-submit recording into the active slot's buffer
    pub fn begin(&self, role: CommandBufferRole) -> VulkanResult<vk::CommandBuffer> {
        let command_buffer = self.active_buffer(role)?;
        let begin_info = vk::CommandBufferBeginInfo::builder().flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);

        unsafe {
            self.device
                .begin_command_buffer(command_buffer, &begin_info)
                .map_err(VulkanError::Api)?;
        }
        Ok(command_buffer)
    }

    /// Finish recording and leave the slot inactive
    pub fn end(&mut self, role: CommandBufferRole) -> VulkanResult<vk::CommandBuffer> {
        let command_buffer = self.active_buffer(role)?;
        unsafe {
            self.device
                .end_command_buffer(command_buffer)
                .map_err(VulkanError::Api)?;
        }
        self.active = None;
        Ok(command_buffer)
    }

    /// Forget the active slot without ending it
    pub fn abandon(&mut self) {
        self.active = None;
    }
}

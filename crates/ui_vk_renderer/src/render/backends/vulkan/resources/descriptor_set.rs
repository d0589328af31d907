//! Descriptor set layouts, pool and allocation bookkeeping
//!
//! The UI pipelines use two sets: set 0 binds the shared pool buffer as a
//! dynamic uniform buffer (the per-draw offset selects the block), set 1
//! binds one texture. Set 0 is allocated once; set 1 is allocated per texture
//! the first time it is drawn.
//!
//! [`DescriptorManager`] counts every set it hands out so shutdown can check
//! that nothing leaked.

use ash::{vk, Device};

use crate::core::DescriptorBudget;
use crate::render::backends::vulkan::{VulkanError, VulkanResult};

/// Binding of the uniform block in set 0
pub const UNIFORM_BINDING: u32 = 1;

/// Binding of the sampled texture in set 1
pub const TEXTURE_BINDING: u32 = 2;

/// Descriptor set layout builder for creating reusable layouts
pub struct DescriptorSetLayoutBuilder {
    bindings: Vec<vk::DescriptorSetLayoutBinding>,
}

impl DescriptorSetLayoutBuilder {
    /// Create a new descriptor set layout builder
    pub fn new() -> Self {
        Self { bindings: Vec::new() }
    }

    fn add(mut self, binding: u32, ty: vk::DescriptorType, stage_flags: vk::ShaderStageFlags) -> Self {
        self.bindings.push(
            vk::DescriptorSetLayoutBinding::builder()
                .binding(binding)
                .descriptor_type(ty)
                .descriptor_count(1)
                .stage_flags(stage_flags)
                .build(),
        );
        self
    }

    /// Add a dynamic uniform buffer binding
    pub fn add_dynamic_uniform_buffer(self, binding: u32, stage_flags: vk::ShaderStageFlags) -> Self {
        self.add(binding, vk::DescriptorType::UNIFORM_BUFFER_DYNAMIC, stage_flags)
    }

    /// Add a combined image sampler binding
    pub fn add_combined_image_sampler(self, binding: u32, stage_flags: vk::ShaderStageFlags) -> Self {
        self.add(binding, vk::DescriptorType::COMBINED_IMAGE_SAMPLER, stage_flags)
    }

    /// Build the descriptor set layout
    pub fn build(self, device: &Device) -> VulkanResult<DescriptorSetLayout> {
        let layout_info = vk::DescriptorSetLayoutCreateInfo::builder().bindings(&self.bindings);

        let layout = unsafe { device.create_descriptor_set_layout(&layout_info, None) }.map_err(VulkanError::Api)?;

        Ok(DescriptorSetLayout {
            layout,
            device: device.clone(),
            bindings: self.bindings,
        })
    }
}

impl Default for DescriptorSetLayoutBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Descriptor set layout wrapper with automatic cleanup
pub struct DescriptorSetLayout {
    layout: vk::DescriptorSetLayout,
    device: Device,
    bindings: Vec<vk::DescriptorSetLayoutBinding>,
}

impl DescriptorSetLayout {
    /// Get the Vulkan descriptor set layout handle
    pub const fn handle(&self) -> vk::DescriptorSetLayout {
        self.layout
    }

    /// Get the bindings used in this layout
    pub fn bindings(&self) -> &[vk::DescriptorSetLayoutBinding] {
        &self.bindings
    }
}

impl Drop for DescriptorSetLayout {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_descriptor_set_layout(self.layout, None);
        }
    }
}

/// Per-type capacities for a descriptor pool
pub fn pool_sizes(budget: &DescriptorBudget) -> Vec<vk::DescriptorPoolSize> {
    [
        (vk::DescriptorType::UNIFORM_BUFFER, budget.uniform_buffers),
        (vk::DescriptorType::UNIFORM_BUFFER_DYNAMIC, budget.dynamic_uniform_buffers),
        (vk::DescriptorType::COMBINED_IMAGE_SAMPLER, budget.combined_image_samplers),
        (vk::DescriptorType::SAMPLED_IMAGE, budget.sampled_images),
        (vk::DescriptorType::SAMPLER, budget.samplers),
    ]
    .into_iter()
    .filter(|&(_, count)| count > 0)
    .map(|(ty, descriptor_count)| vk::DescriptorPoolSize { ty, descriptor_count })
    .collect()
}

/// Descriptor pool whose sets can be freed individually
pub struct DescriptorPool {
    pool: vk::DescriptorPool,
    device: Device,
}

impl DescriptorPool {
    /// Create a pool sized by the budget
    pub fn new(device: Device, budget: &DescriptorBudget) -> VulkanResult<Self> {
        let sizes = pool_sizes(budget);
        let pool_info = vk::DescriptorPoolCreateInfo::builder()
            .flags(vk::DescriptorPoolCreateFlags::FREE_DESCRIPTOR_SET)
            .max_sets(budget.max_sets)
            .pool_sizes(&sizes);

        let pool = unsafe { device.create_descriptor_pool(&pool_info, None) }.map_err(VulkanError::Api)?;

        Ok(Self { pool, device })
    }

    /// Get the pool handle
    pub const fn handle(&self) -> vk::DescriptorPool {
        self.pool
    }
}

impl Drop for DescriptorPool {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_descriptor_pool(self.pool, None);
        }
    }
}

/// Allocates and frees sets from one pool and counts what is outstanding
pub struct DescriptorManager {
    pool: DescriptorPool,
    outstanding: usize,
}

impl DescriptorManager {
    /// Create the pool for `budget`
    pub fn new(device: Device, budget: &DescriptorBudget) -> VulkanResult<Self> {
        Ok(Self {
            pool: DescriptorPool::new(device, budget)?,
            outstanding: 0,
        })
    }

    /// Allocate one set
    ///
    /// Pool exhaustion comes back as `Api(ERROR_OUT_OF_POOL_MEMORY)` (or
    /// `ERROR_FRAGMENTED_POOL`), which the renderer reports as
    /// [`RenderError::DescriptorPoolExhausted`](crate::render::RenderError::DescriptorPoolExhausted).
    pub fn allocate(&mut self, layout: &DescriptorSetLayout) -> VulkanResult<vk::DescriptorSet> {
        let layouts = [layout.handle()];
        let alloc_info = vk::DescriptorSetAllocateInfo::builder()
            .descriptor_pool(self.pool.handle())
            .set_layouts(&layouts);

        let sets = unsafe { self.pool.device.allocate_descriptor_sets(&alloc_info) }.map_err(VulkanError::Api)?;
        let set = sets.into_iter().next().ok_or(VulkanError::Api(vk::Result::ERROR_OUT_OF_POOL_MEMORY))?;

        self.outstanding += 1;
        Ok(set)
    }

    /// Return one set to the pool
    pub fn free(&mut self, set: vk::DescriptorSet) -> VulkanResult<()> {
        unsafe {
            self.pool
                .device
                .free_descriptor_sets(self.pool.handle(), &[set])
                .map_err(VulkanError::Api)?;
        }
        self.outstanding = self.outstanding.saturating_sub(1);
        Ok(())
    }

    /// Sets allocated and not yet freed
    pub const fn outstanding(&self) -> usize {
        self.outstanding
    }
}

enum PendingWrite {
    Buffer(vk::DescriptorBufferInfo),
    Image(vk::DescriptorImageInfo),
}

/// Batches descriptor writes into one update call
pub struct DescriptorSetWriter {
    writes: Vec<(vk::DescriptorSet, u32, vk::DescriptorType, PendingWrite)>,
}

impl DescriptorSetWriter {
    /// Create a new descriptor set writer
    pub fn new() -> Self {
        Self { writes: Vec::new() }
    }

    /// Point a dynamic uniform binding at `range` bytes of `buffer`
    pub fn write_dynamic_buffer(
        mut self,
        descriptor_set: vk::DescriptorSet,
        binding: u32,
        buffer: vk::Buffer,
        range: vk::DeviceSize,
    ) -> Self {
        let info = vk::DescriptorBufferInfo {
            buffer,
            offset: 0,
            range,
        };
        self.writes.push((
            descriptor_set,
            binding,
            vk::DescriptorType::UNIFORM_BUFFER_DYNAMIC,
            PendingWrite::Buffer(info),
        ));
        self
    }

    /// Write an image sampler to a descriptor set
    pub fn write_image(
        mut self,
        descriptor_set: vk::DescriptorSet,
        binding: u32,
        image_view: vk::ImageView,
        sampler: vk::Sampler,
    ) -> Self {
        let info = vk::DescriptorImageInfo {
            sampler,
            image_view,
            image_layout: vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
        };
        self.writes.push((
            descriptor_set,
            binding,
            vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
            PendingWrite::Image(info),
        ));
        self
    }

    /// Execute all write operations
    pub fn update(self, device: &Device) {
        // Infos are owned by self.writes, which outlives the update call
        let writes: Vec<vk::WriteDescriptorSet> = self
            .writes
            .iter()
            .map(|(set, binding, ty, pending)| {
                let builder = vk::WriteDescriptorSet::builder()
                    .dst_set(*set)
                    .dst_binding(*binding)
                    .dst_array_element(0)
                    .descriptor_type(*ty);
                match pending {
                    PendingWrite::Buffer(info) => builder.buffer_info(std::slice::from_ref(info)).build(),
                    PendingWrite::Image(info) => builder.image_info(std::slice::from_ref(info)).build(),
                }
            })
            .collect();

        unsafe {
            device.update_descriptor_sets(&writes, &[]);
        }
    }
}

impl Default for DescriptorSetWriter {
    fn default() -> Self {
        Self::new()
    }
}

/// The two set layouts every UI pipeline is built against
pub struct UiDescriptorLayouts {
    /// Set 0: dynamic uniform block, vertex stage
    pub uniforms: DescriptorSetLayout,
    /// Set 1: combined image sampler, fragment stage
    pub texture: DescriptorSetLayout,
}

impl UiDescriptorLayouts {
    /// Create both layouts
    pub fn new(device: &Device) -> VulkanResult<Self> {
        let uniforms = DescriptorSetLayoutBuilder::new()
            .add_dynamic_uniform_buffer(UNIFORM_BINDING, vk::ShaderStageFlags::VERTEX)
            .build(device)?;

        let texture = DescriptorSetLayoutBuilder::new()
            .add_combined_image_sampler(TEXTURE_BINDING, vk::ShaderStageFlags::FRAGMENT)
            .build(device)?;

        Ok(Self { uniforms, texture })
    }

    /// Layout handles in set order
    pub fn all_layouts(&self) -> [vk::DescriptorSetLayout; 2] {
        [self.uniforms.handle(), self.texture.handle()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_sizes_follow_budget() {
        let budget = DescriptorBudget {
            max_sets: 8,
            uniform_buffers: 0,
            dynamic_uniform_buffers: 2,
            combined_image_samplers: 6,
            sampled_images: 0,
            samplers: 0,
        };

        let sizes = pool_sizes(&budget);
        assert_eq!(sizes.len(), 2);
        assert_eq!(sizes[0].ty, vk::DescriptorType::UNIFORM_BUFFER_DYNAMIC);
        assert_eq!(sizes[0].descriptor_count, 2);
        assert_eq!(sizes[1].ty, vk::DescriptorType::COMBINED_IMAGE_SAMPLER);
        assert_eq!(sizes[1].descriptor_count, 6);
    }

    #[test]
    fn test_default_budget_covers_every_kind() {
        assert_eq!(pool_sizes(&DescriptorBudget::default()).len(), 5);
    }
}

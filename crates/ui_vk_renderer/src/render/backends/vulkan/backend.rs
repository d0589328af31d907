//! Vulkan implementation of [`GpuBackend`]
//!
//! Owns every device object and records what [`UiRenderer`](crate::render::UiRenderer)
//! asks for. Frame slot bookkeeping, deferred deletion and pool suballocation
//! all happen in the renderer; this type only turns each step into Vulkan
//! calls.
//!
//! # Descriptor sets
//!
//! One set 0 is allocated up front and points at the whole pool buffer as a
//! dynamic uniform buffer; each draw selects its block with a dynamic offset.
//! A texture's set 1 is allocated the first time it is drawn and freed with
//! the texture.

use ash::vk;
use std::sync::Arc;

use super::initialization::{SurfaceProvider, VulkanContext};
use super::rendering::{clear_values, CommandBufferRing, CommandBufferRole, PipelineLayout, UiShaders};
use super::resources::{
    Buffer, DescriptorManager, DescriptorSetWriter, Sampler, Texture, UiDescriptorLayouts, UploadManager,
    POOL_BUFFER_USAGE, TEXTURE_BINDING, UNIFORM_BINDING,
};
use super::state::{Fence, FrameSync, SurfaceTargets, SwapchainRequest};
use super::{VulkanError, VulkanResult};
use crate::core::{PresentModePreference, RendererConfig};
use crate::render::api::{AcquireOutcome, DrawCommand, GpuBackend, PresentOutcome, SurfaceStatus, UniformBlock};
use crate::render::memory::MemoryRegion;
use crate::render::{RenderError, RenderResult, ScissorRect};

/// Vulkan GPU backend for the UI renderer
///
/// Fields drop in declaration order: per-frame and size-dependent objects
/// first, then the allocator, then the device itself.
pub struct VulkanBackend {
    ring_depth: usize,
    fence_timeout_ns: Option<u64>,
    present_mode: PresentModePreference,
    clear_color: [f32; 4],
    /// Set by a successful acquire, consumed by present
    image_index: Option<u32>,
    /// Command buffer between `begin_recording` and `end_recording`
    recording: Option<vk::CommandBuffer>,
    /// Command buffer between `end_recording` and `submit`
    pending_submit: Option<vk::CommandBuffer>,
    global_set: Option<vk::DescriptorSet>,
    is_shut_down: bool,

    targets: Option<SurfaceTargets>,
    frames: Vec<FrameSync>,
    commands: CommandBufferRing,
    upload: UploadManager,
    pool_buffer: Buffer,
    sampler: Sampler,
    descriptors: DescriptorManager,
    pipeline_layout: PipelineLayout,
    layouts: UiDescriptorLayouts,
    shaders: UiShaders,
    allocator: Arc<vk_mem::Allocator>,
    context: VulkanContext,
}

impl VulkanBackend {
    /// Create the device, the pool buffer and every size-independent object
    ///
    /// The swapchain is not built here; the renderer does that through
    /// [`GpuBackend::create_surface_resources`].
    pub fn new<P: SurfaceProvider + ?Sized>(provider: &P, config: &RendererConfig) -> VulkanResult<Self> {
        let context = VulkanContext::new(provider, &config.application_name, config.validation_enabled())?;
        let device = context.raw_device().clone();

        let allocator = Arc::new(
            vk_mem::Allocator::new(vk_mem::AllocatorCreateInfo::new(
                context.instance(),
                &device,
                context.physical_device.device,
            ))
            .map_err(VulkanError::Api)?,
        );

        let pool_buffer = Buffer::new_mapped(allocator.clone(), config.memory.pool_size_bytes, POOL_BUFFER_USAGE)?;

        let layouts = UiDescriptorLayouts::new(&device)?;
        let pipeline_layout = PipelineLayout::new(device.clone(), &layouts.all_layouts())?;
        let [vertex, color_fragment, textured_fragment] = config.shaders.paths();
        let shaders = UiShaders::load(&device, vertex, color_fragment, textured_fragment)?;
        let sampler = Sampler::new_linear_clamp(device.clone())?;

        let mut descriptors = DescriptorManager::new(device.clone(), &config.descriptors)?;
        let global_set = descriptors.allocate(&layouts.uniforms)?;
        DescriptorSetWriter::new()
            .write_dynamic_buffer(global_set, UNIFORM_BINDING, pool_buffer.handle(), UniformBlock::SIZE)
            .update(&device);

        let upload = UploadManager::new(
            device.clone(),
            context.graphics_queue(),
            context.graphics_queue_family(),
        )?;

        let ring_depth = config.frames.ring_depth;
        let commands = CommandBufferRing::new(device.clone(), context.graphics_queue_family(), ring_depth)?;
        let frames = (0..ring_depth)
            .map(|_| FrameSync::new(device.clone()))
            .collect::<VulkanResult<Vec<_>>>()?;

        log::info!(
            "Vulkan backend ready on {} ({} byte pool, {} frame slots)",
            context.physical_device.name(),
            pool_buffer.size(),
            ring_depth
        );

        Ok(Self {
            ring_depth,
            fence_timeout_ns: config.frames.fence_timeout_ns,
            present_mode: config.present_mode,
            clear_color: config.clear_color,
            image_index: None,
            recording: None,
            pending_submit: None,
            global_set: Some(global_set),
            is_shut_down: false,
            targets: None,
            frames,
            commands,
            upload,
            pool_buffer,
            sampler,
            descriptors,
            pipeline_layout,
            layouts,
            shaders,
            allocator,
            context,
        })
    }

    /// Vulkan context (instance, device, surface)
    pub const fn context(&self) -> &VulkanContext {
        &self.context
    }

    fn device(&self) -> &ash::Device {
        self.context.raw_device()
    }

    fn frame(&self, slot: usize) -> VulkanResult<&FrameSync> {
        self.frames.get(slot).ok_or(VulkanError::ResourceNotFound { id: slot as u64 })
    }

    /// Swap a slot's fence for a signalled one so the next wait on it returns
    fn replace_in_flight_fence(&mut self, slot: usize) -> VulkanResult<()> {
        let fence = Fence::new(self.device().clone(), true)?;
        let frame = self.frames.get_mut(slot).ok_or(VulkanError::ResourceNotFound { id: slot as u64 })?;
        frame.in_flight = fence;
        Ok(())
    }

    fn targets(&self) -> VulkanResult<&SurfaceTargets> {
        self.targets.as_ref().ok_or_else(|| VulkanError::InvalidOperation {
            reason: "no swapchain".to_string(),
        })
    }

    fn full_rect(&self) -> vk::Rect2D {
        vk::Rect2D {
            offset: vk::Offset2D { x: 0, y: 0 },
            extent: self.targets.as_ref().map_or(vk::Extent2D::default(), SurfaceTargets::extent),
        }
    }
}

impl GpuBackend for VulkanBackend {
    type Texture = Texture;
    type Descriptor = vk::DescriptorSet;

    fn pool_size(&self) -> u64 {
        self.pool_buffer.size()
    }

    fn min_uniform_alignment(&self) -> u64 {
        self.context.physical_device.min_uniform_alignment()
    }

    fn write_pool(&mut self, region: MemoryRegion, bytes: &[u8]) -> RenderResult<()> {
        Ok(self.pool_buffer.write_region(region, bytes)?)
    }

    fn wait_for_slot(&mut self, slot: usize) -> RenderResult<()> {
        log::trace!("Waiting on frame slot {slot}");
        Ok(self.frame(slot)?.in_flight.wait(self.fence_timeout_ns)?)
    }

    fn acquire_image(&mut self, slot: usize) -> RenderResult<AcquireOutcome> {
        let Some(targets) = self.targets.as_ref() else {
            return Ok(AcquireOutcome::OutOfDate);
        };
        let signal = self.frame(slot)?.image_available.handle();

        match targets.swapchain().acquire_next_image(signal) {
            Ok((index, suboptimal)) => {
                self.image_index = Some(index);
                Ok(if suboptimal {
                    AcquireOutcome::Suboptimal
                } else {
                    AcquireOutcome::Ready
                })
            }
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(AcquireOutcome::OutOfDate),
            Err(e) => Err(VulkanError::Api(e).into()),
        }
    }

    fn begin_recording(&mut self, slot: usize) -> RenderResult<()> {
        let image_index = self.image_index.ok_or_else(|| VulkanError::InvalidOperation {
            reason: "no acquired image".to_string(),
        })?;
        let targets = self.targets()?;
        let framebuffer = targets
            .framebuffer(image_index)
            .ok_or(VulkanError::ResourceNotFound { id: u64::from(image_index) })?;
        let render_pass = targets.render_pass();
        let extent = targets.extent();

        self.commands.begin_slot(slot)?;
        let command_buffer = self.commands.begin(CommandBufferRole::Main)?;

        let clear = clear_values(self.clear_color);
        let render_area = self.full_rect();
        let begin_info = vk::RenderPassBeginInfo::builder()
            .render_pass(render_pass)
            .framebuffer(framebuffer)
            .render_area(render_area)
            .clear_values(&clear);

        let viewport = vk::Viewport {
            x: 0.0,
            y: 0.0,
            width: extent.width as f32,
            height: extent.height as f32,
            min_depth: 0.0,
            max_depth: 1.0,
        };

        let device = self.device();
        unsafe {
            device.cmd_begin_render_pass(command_buffer, &begin_info, vk::SubpassContents::INLINE);
            device.cmd_set_viewport(command_buffer, 0, &[viewport]);
            device.cmd_set_scissor(command_buffer, 0, &[render_area]);
        }

        self.recording = Some(command_buffer);
        Ok(())
    }

    fn end_recording(&mut self, _slot: usize) -> RenderResult<()> {
        let command_buffer = self.recording.take().ok_or(RenderError::NoActiveFrame)?;
        unsafe {
            self.device().cmd_end_render_pass(command_buffer);
        }
        self.pending_submit = Some(self.commands.end(CommandBufferRole::Main)?);
        Ok(())
    }

    fn submit(&mut self, slot: usize) -> RenderResult<()> {
        let command_buffer = self.pending_submit.take().ok_or(RenderError::NoActiveFrame)?;
        let frame = self.frame(slot)?;

        let wait_semaphores = [frame.image_available.handle()];
        let wait_stages = [vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT];
        let signal_semaphores = [frame.render_finished.handle()];
        let command_buffers = [command_buffer];
        let submit_info = vk::SubmitInfo::builder()
            .wait_semaphores(&wait_semaphores)
            .wait_dst_stage_mask(&wait_stages)
            .command_buffers(&command_buffers)
            .signal_semaphores(&signal_semaphores);

        frame.in_flight.reset()?;
        let submitted = unsafe {
            self.device()
                .queue_submit(self.context.graphics_queue(), &[submit_info.build()], frame.in_flight.handle())
        };

        if let Err(e) = submitted {
            // The reset fence will never be signalled by this submit
            log::warn!("Queue submit for frame slot {slot} failed: {e:?}");
            self.replace_in_flight_fence(slot)?;
            return Err(VulkanError::Api(e).into());
        }
        Ok(())
    }

    fn present(&mut self, slot: usize) -> RenderResult<PresentOutcome> {
        let image_index = self.image_index.take().ok_or_else(|| VulkanError::InvalidOperation {
            reason: "no acquired image".to_string(),
        })?;
        let wait = self.frame(slot)?.render_finished.handle();
        let targets = self.targets()?;

        match targets
            .swapchain()
            .present(self.context.present_queue(), image_index, wait)
        {
            Ok(false) => Ok(PresentOutcome::Presented),
            Ok(true) => Ok(PresentOutcome::Suboptimal),
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(PresentOutcome::OutOfDate),
            Err(e) => Err(VulkanError::Api(e).into()),
        }
    }

    fn wait_idle(&mut self) -> RenderResult<()> {
        Ok(self.context.wait_idle()?)
    }

    fn release_surface_resources(&mut self) {
        self.recording = None;
        self.pending_submit = None;
        self.image_index = None;
        self.commands.abandon();
        if self.targets.take().is_some() {
            log::debug!("Released swapchain and size-dependent resources");
        }
    }

    fn create_surface_resources(&mut self, width: u32, height: u32) -> RenderResult<SurfaceStatus> {
        let request = SwapchainRequest {
            extent: (width, height),
            ring_depth: self.ring_depth,
            present_mode: self.present_mode,
            queue_families: [self.context.device.graphics_family, self.context.device.present_family],
        };

        let targets = SurfaceTargets::new(
            &self.context,
            &self.allocator,
            &self.pipeline_layout,
            &self.shaders,
            &request,
        )?;

        Ok(match targets {
            Some(targets) => {
                let extent = targets.extent();
                self.targets = Some(targets);
                SurfaceStatus::Ready {
                    width: extent.width,
                    height: extent.height,
                }
            }
            None => SurfaceStatus::Degenerate,
        })
    }

    fn set_scissor(&mut self, rect: ScissorRect) {
        let Some(command_buffer) = self.recording else {
            return;
        };
        let scissor = vk::Rect2D {
            offset: vk::Offset2D {
                x: rect.x.max(0),
                y: rect.y.max(0),
            },
            extent: vk::Extent2D {
                width: rect.width,
                height: rect.height,
            },
        };
        unsafe {
            self.device().cmd_set_scissor(command_buffer, 0, &[scissor]);
        }
    }

    fn clear_stencil(&mut self) {
        let Some(command_buffer) = self.recording else {
            return;
        };
        let attachment = vk::ClearAttachment {
            aspect_mask: vk::ImageAspectFlags::STENCIL,
            color_attachment: 0,
            clear_value: vk::ClearValue {
                depth_stencil: vk::ClearDepthStencilValue { depth: 1.0, stencil: 0 },
            },
        };
        let rect = vk::ClearRect {
            rect: self.full_rect(),
            base_array_layer: 0,
            layer_count: 1,
        };
        unsafe {
            self.device().cmd_clear_attachments(command_buffer, &[attachment], &[rect]);
        }
    }

    fn draw(&mut self, command: &DrawCommand<'_, Self::Descriptor>) {
        let (Some(command_buffer), Some(targets), Some(global_set)) =
            (self.recording, self.targets.as_ref(), self.global_set)
        else {
            log::warn!("Draw recorded outside a frame ignored");
            return;
        };

        let Ok(uniform_offset) = u32::try_from(command.uniforms.offset()) else {
            log::warn!("Uniform offset {} exceeds the dynamic offset range, draw dropped", command.uniforms.offset());
            return;
        };

        let pipeline = targets.pipelines().get(command.pipeline);
        let layout = self.pipeline_layout.handle();
        let buffer = self.pool_buffer.handle();
        let device = self.device();

        unsafe {
            device.cmd_bind_pipeline(command_buffer, vk::PipelineBindPoint::GRAPHICS, pipeline);
            device.cmd_bind_vertex_buffers(command_buffer, 0, &[buffer], &[command.vertices.offset()]);
            device.cmd_bind_index_buffer(command_buffer, buffer, command.indices.offset(), vk::IndexType::UINT32);
            device.cmd_bind_descriptor_sets(
                command_buffer,
                vk::PipelineBindPoint::GRAPHICS,
                layout,
                0,
                &[global_set],
                &[uniform_offset],
            );
            if let Some(&texture_set) = command.texture {
                device.cmd_bind_descriptor_sets(
                    command_buffer,
                    vk::PipelineBindPoint::GRAPHICS,
                    layout,
                    1,
                    &[texture_set],
                    &[],
                );
            }
            device.cmd_draw_indexed(command_buffer, command.index_count, 1, 0, 0, 0);
        }
    }

    fn create_texture(&mut self, pixels: &[u8], width: u32, height: u32) -> RenderResult<Self::Texture> {
        let device = self.context.raw_device();
        Ok(Texture::from_rgba8(
            device,
            self.allocator.clone(),
            &self.upload,
            pixels,
            width,
            height,
        )?)
    }

    fn create_texture_descriptor(&mut self, texture: &Self::Texture) -> RenderResult<Self::Descriptor> {
        let set = self.descriptors.allocate(&self.layouts.texture)?;
        DescriptorSetWriter::new()
            .write_image(set, TEXTURE_BINDING, texture.image_view(), self.sampler.handle())
            .update(self.context.raw_device());
        log::debug!("Bound descriptor set for {}x{} texture", texture.extent().width, texture.extent().height);
        Ok(set)
    }

    fn destroy_texture(&mut self, texture: Self::Texture, descriptor: Option<Self::Descriptor>) {
        if let Some(set) = descriptor {
            if let Err(err) = self.descriptors.free(set) {
                log::error!("Failed to free texture descriptor set: {err}");
            }
        }
        drop(texture);
    }

    fn outstanding_descriptors(&self) -> usize {
        self.descriptors.outstanding()
    }

    fn shutdown(&mut self) {
        if self.is_shut_down {
            return;
        }
        self.is_shut_down = true;

        if let Some(set) = self.global_set.take() {
            if let Err(err) = self.descriptors.free(set) {
                log::error!("Failed to free global descriptor set: {err}");
            }
        }
        self.targets = None;
        log::info!("Vulkan backend shut down");
    }
}

impl Drop for VulkanBackend {
    fn drop(&mut self) {
        // Nothing below may be destroyed while the GPU can still read it
        if let Err(err) = self.context.wait_idle() {
            log::error!("Device wait failed while dropping the Vulkan backend: {err}");
        }
    }
}

//! Recording backend for renderer tests
//!
//! Every GPU-side call is logged as a [`MockEvent`]. Fences are modelled per
//! slot: `submit` makes a slot's fence pending and `wait_for_slot` signals
//! it, so tests can see which submission each wait had to block on.
//! Submits can be made to fail through `failing_submits`.

use std::collections::VecDeque;

use super::api::{AcquireOutcome, DrawCommand, GpuBackend, PipelineKind, PresentOutcome, ScissorRect, SurfaceStatus};
use super::memory::MemoryRegion;
use super::{RenderError, RenderResult};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockEvent {
    WaitForSlot { slot: usize, was_pending: bool },
    Acquire(usize),
    BeginRecording(usize),
    EndRecording(usize),
    Submit(usize),
    SubmitFailed(usize),
    Present(usize),
    WaitIdle,
    CreateTargets { width: u32, height: u32 },
    ReleaseTargets,
    SetScissor(ScissorRect),
    ClearStencil,
    Draw { pipeline: PipelineKind, uniforms: MemoryRegion, descriptor: Option<u32> },
    CreateTexture(u32),
    CreateDescriptor(u32),
    FreeDescriptor(u32),
    DestroyTexture(u32),
}

#[derive(Debug, PartialEq, Eq)]
pub struct MockTexture {
    pub id: u32,
}

#[derive(Debug, PartialEq, Eq)]
pub struct MockDescriptor {
    pub id: u32,
}

pub struct MockBackend {
    pub events: Vec<MockEvent>,
    pub memory: Vec<u8>,
    pub alignment: u64,
    pub fence_pending: Vec<bool>,
    pub acquire_results: VecDeque<AcquireOutcome>,
    pub present_results: VecDeque<PresentOutcome>,
    pub targets_live: bool,
    pub targets_created: usize,
    pub targets_destroyed: usize,
    pub outstanding_descriptors: usize,
    pub shut_down: bool,
    pub failing_submits: usize,
    next_id: u32,
}

impl MockBackend {
    pub fn new(pool_size: u64, alignment: u64, ring_depth: usize) -> Self {
        Self {
            events: Vec::new(),
            memory: vec![0; usize::try_from(pool_size).expect("Pool fits in memory")],
            alignment,
            fence_pending: vec![false; ring_depth],
            acquire_results: VecDeque::new(),
            present_results: VecDeque::new(),
            targets_live: false,
            targets_created: 0,
            targets_destroyed: 0,
            // the global uniform set
            outstanding_descriptors: 1,
            shut_down: false,
            failing_submits: 0,
            next_id: 1,
        }
    }

    pub fn position(&self, event: &MockEvent) -> Option<usize> {
        self.events.iter().position(|e| e == event)
    }

    pub fn positions(&self, event: &MockEvent) -> Vec<usize> {
        self.events
            .iter()
            .enumerate()
            .filter(|(_, e)| *e == event)
            .map(|(i, _)| i)
            .collect()
    }

    pub fn draws(&self) -> Vec<(PipelineKind, MemoryRegion, Option<u32>)> {
        self.events
            .iter()
            .filter_map(|e| match e {
                MockEvent::Draw { pipeline, uniforms, descriptor } => Some((*pipeline, *uniforms, *descriptor)),
                _ => None,
            })
            .collect()
    }

    pub fn count(&self, predicate: impl Fn(&MockEvent) -> bool) -> usize {
        self.events.iter().filter(|e| predicate(e)).count()
    }
}

impl GpuBackend for MockBackend {
    type Texture = MockTexture;
    type Descriptor = MockDescriptor;

    fn pool_size(&self) -> u64 {
        self.memory.len() as u64
    }

    fn min_uniform_alignment(&self) -> u64 {
        self.alignment
    }

    fn write_pool(&mut self, region: MemoryRegion, bytes: &[u8]) -> RenderResult<()> {
        let start = region.offset() as usize;
        if bytes.len() as u64 > region.size() || region.end() as usize > self.memory.len() {
            return Err(RenderError::Backend(format!("write of {} bytes outside {region:?}", bytes.len())));
        }
        self.memory[start..start + bytes.len()].copy_from_slice(bytes);
        Ok(())
    }

    fn wait_for_slot(&mut self, slot: usize) -> RenderResult<()> {
        let was_pending = std::mem::replace(&mut self.fence_pending[slot], false);
        self.events.push(MockEvent::WaitForSlot { slot, was_pending });
        Ok(())
    }

    fn acquire_image(&mut self, slot: usize) -> RenderResult<AcquireOutcome> {
        assert!(self.targets_live, "acquire without a swapchain");
        self.events.push(MockEvent::Acquire(slot));
        Ok(self.acquire_results.pop_front().unwrap_or(AcquireOutcome::Ready))
    }

    fn begin_recording(&mut self, slot: usize) -> RenderResult<()> {
        assert!(!self.fence_pending[slot], "slot {slot} recorded while its fence is pending");
        self.events.push(MockEvent::BeginRecording(slot));
        Ok(())
    }

    fn end_recording(&mut self, slot: usize) -> RenderResult<()> {
        self.events.push(MockEvent::EndRecording(slot));
        Ok(())
    }

    fn submit(&mut self, slot: usize) -> RenderResult<()> {
        if self.failing_submits > 0 {
            // Like the Vulkan backend, a failed submit leaves the fence signalled
            self.failing_submits -= 1;
            self.events.push(MockEvent::SubmitFailed(slot));
            return Err(RenderError::Backend(format!("submit for slot {slot} rejected")));
        }
        self.fence_pending[slot] = true;
        self.events.push(MockEvent::Submit(slot));
        Ok(())
    }

    fn present(&mut self, slot: usize) -> RenderResult<PresentOutcome> {
        self.events.push(MockEvent::Present(slot));
        Ok(self.present_results.pop_front().unwrap_or(PresentOutcome::Presented))
    }

    fn wait_idle(&mut self) -> RenderResult<()> {
        self.fence_pending.iter_mut().for_each(|pending| *pending = false);
        self.events.push(MockEvent::WaitIdle);
        Ok(())
    }

    fn release_surface_resources(&mut self) {
        if self.targets_live {
            self.targets_live = false;
            self.targets_destroyed += 1;
            self.events.push(MockEvent::ReleaseTargets);
        }
    }

    fn create_surface_resources(&mut self, width: u32, height: u32) -> RenderResult<SurfaceStatus> {
        if width == 0 || height == 0 {
            return Ok(SurfaceStatus::Degenerate);
        }
        assert!(!self.targets_live, "targets created twice");
        self.targets_live = true;
        self.targets_created += 1;
        self.events.push(MockEvent::CreateTargets { width, height });
        Ok(SurfaceStatus::Ready { width, height })
    }

    fn set_scissor(&mut self, rect: ScissorRect) {
        self.events.push(MockEvent::SetScissor(rect));
    }

    fn clear_stencil(&mut self) {
        self.events.push(MockEvent::ClearStencil);
    }

    fn draw(&mut self, command: &DrawCommand<'_, MockDescriptor>) {
        assert_eq!(command.pipeline.is_textured(), command.texture.is_some());
        self.events.push(MockEvent::Draw {
            pipeline: command.pipeline,
            uniforms: command.uniforms,
            descriptor: command.texture.map(|d| d.id),
        });
    }

    fn create_texture(&mut self, pixels: &[u8], width: u32, height: u32) -> RenderResult<MockTexture> {
        assert_eq!(pixels.len(), (width * height * 4) as usize);
        let id = self.next_id;
        self.next_id += 1;
        self.events.push(MockEvent::CreateTexture(id));
        Ok(MockTexture { id })
    }

    fn create_texture_descriptor(&mut self, texture: &MockTexture) -> RenderResult<MockDescriptor> {
        self.outstanding_descriptors += 1;
        self.events.push(MockEvent::CreateDescriptor(texture.id));
        Ok(MockDescriptor { id: texture.id })
    }

    fn destroy_texture(&mut self, texture: MockTexture, descriptor: Option<MockDescriptor>) {
        if let Some(descriptor) = descriptor {
            self.outstanding_descriptors -= 1;
            self.events.push(MockEvent::FreeDescriptor(descriptor.id));
        }
        self.events.push(MockEvent::DestroyTexture(texture.id));
    }

    fn outstanding_descriptors(&self) -> usize {
        self.outstanding_descriptors
    }

    fn shutdown(&mut self) {
        if !self.shut_down {
            self.shut_down = true;
            self.outstanding_descriptors -= 1;
        }
    }
}

//! # UI Renderer
//!
//! [`UiRenderer`] turns the UI engine's draw instructions into pipelined GPU
//! work. It owns the memory pool, the handle registry, the frame slot ring,
//! the deletion buckets and the frame state machine, and drives a
//! [`GpuBackend`] through them.
//!
//! ## Frame sequence
//!
//! `begin_frame`: wait on the fence of the slot about to be reused, destroy
//! what was retired under that slot, advance the ring, acquire an image and
//! open the command buffer. `end_frame`: close, submit and present, then
//! recreate the swapchain if presentation asked for it.
//!
//! ## Errors
//!
//! The inherent `try_*` methods return [`RenderResult`]. The
//! [`RenderInterface`] implementation logs failures and drops the call.

use std::path::Path;

use super::api::{
    AcquireOutcome, DrawCommand, GpuBackend, PipelineKind, RenderInterface, ScissorRect, SurfaceStatus,
    UniformBlock, Vertex,
};
use super::frame::{DeletionQueue, FrameEvent, FrameLifecycle, FrameRing, FrameState};
use super::memory::{MemoryPool, MemoryRegion};
use super::registry::{GeometryHandle, GeometryRecord, ResourceRegistry, TextureHandle, TextureRecord};
use super::{RenderError, RenderResult};
use crate::core::config::RendererConfig;
use crate::foundation::math::{ui_projection, Mat4, Vec2};

/// Something waiting in a deletion bucket
enum Retired<T, D> {
    Geometry(GeometryRecord),
    Uniforms(MemoryRegion),
    Texture(TextureRecord<T, D>),
}

/// How draws are currently clipped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Clip {
    None,
    Scissor,
    Stencil,
}

/// Frame-pipelined 2D renderer over a [`GpuBackend`]
pub struct UiRenderer<B: GpuBackend> {
    pool: MemoryPool,
    registry: ResourceRegistry<B::Texture, B::Descriptor>,
    deletion_queue: DeletionQueue<Retired<B::Texture, B::Descriptor>>,
    ring: FrameRing,
    lifecycle: FrameLifecycle,

    requested_extent: (u32, u32),
    extent: Option<(u32, u32)>,
    pending_resize: bool,
    recreate_requested: bool,

    projection: Mat4,
    transform: Option<Mat4>,
    scissor_enabled: bool,
    clip: Clip,

    render_enabled: bool,
    strict: bool,
    shut_down: bool,

    // Dropped last, everything above may hold its objects until shutdown
    backend: B,
}

impl<B: GpuBackend> UiRenderer<B> {
    /// Create the renderer and build the swapchain for a `width` x `height` window
    ///
    /// A zero-area window is fine, the renderer starts out invalid and
    /// retries from [`UiRenderer::poll_surface`] or the next frame.
    pub fn new(backend: B, config: &RendererConfig, width: u32, height: u32) -> RenderResult<Self> {
        config.validate().map_err(RenderError::InitializationFailed)?;

        let device_alignment = backend.min_uniform_alignment();
        let alignment = config
            .memory
            .min_alignment_override
            .map_or(device_alignment, |forced| forced.max(device_alignment));
        let pool = MemoryPool::new(backend.pool_size(), alignment)?;
        let depth = config.frames.ring_depth;

        let mut renderer = Self {
            pool,
            registry: ResourceRegistry::new(),
            deletion_queue: DeletionQueue::new(depth),
            ring: FrameRing::new(depth),
            lifecycle: FrameLifecycle::new(),
            requested_extent: (width, height),
            extent: None,
            pending_resize: false,
            recreate_requested: false,
            projection: ui_projection(width, height),
            transform: None,
            scissor_enabled: false,
            clip: Clip::None,
            render_enabled: true,
            strict: config.strict_validation,
            shut_down: false,
            backend,
        };

        renderer.recreate_surface()?;
        log::info!(
            "UI renderer ready: {} frame slots, {} byte pool aligned to {}",
            depth,
            renderer.pool.capacity(),
            alignment
        );
        Ok(renderer)
    }

    // ---- frame ----

    /// Open a frame, see [`RenderInterface::begin_frame`]
    pub fn try_begin_frame(&mut self) -> RenderResult<bool> {
        if self.shut_down || !self.render_enabled {
            return Ok(false);
        }
        if self.lifecycle.state().in_frame() {
            log::warn!("begin_frame called while a frame is still open");
            return Ok(false);
        }

        if self.recreate_requested || self.pending_resize || self.lifecycle.state() == FrameState::Invalid {
            self.recreate_surface()?;
            if self.lifecycle.state() == FrameState::Invalid {
                return Ok(false);
            }
        }

        let slot = self.ring.next();
        self.backend.wait_for_slot(slot)?;
        self.destroy_retired(slot);
        self.ring.advance();

        match self.backend.acquire_image(slot)? {
            AcquireOutcome::Ready => {}
            AcquireOutcome::Suboptimal => self.recreate_requested = true,
            AcquireOutcome::OutOfDate => {
                log::warn!("Swapchain out of date on acquire, recreating");
                self.recreate_surface()?;
                return Ok(false);
            }
        }

        if let Err(err) = self.backend.begin_recording(slot) {
            self.recreate_requested = true;
            self.lifecycle.apply(FrameEvent::SurfaceLost);
            return Err(err);
        }
        self.lifecycle.apply(FrameEvent::BeginRecording);
        self.scissor_enabled = false;
        self.clip = Clip::None;
        Ok(true)
    }

    /// Submit and present, see [`RenderInterface::end_frame`]
    pub fn try_end_frame(&mut self) -> RenderResult<()> {
        if !self.lifecycle.is_recording() {
            log::debug!("end_frame without an open frame ignored");
            return Ok(());
        }

        let slot = self.ring.current();
        if let Err(err) = self.finish_frame(slot) {
            self.recreate_requested = true;
            self.lifecycle.apply(FrameEvent::SurfaceLost);
            return Err(err);
        }

        if self.recreate_requested || self.pending_resize {
            self.recreate_surface()?;
        }
        Ok(())
    }

    fn finish_frame(&mut self, slot: usize) -> RenderResult<()> {
        self.backend.end_recording(slot)?;
        self.lifecycle.apply(FrameEvent::Submit);

        self.backend.submit(slot)?;
        self.lifecycle.apply(FrameEvent::Present);

        let outcome = self.backend.present(slot)?;
        self.lifecycle.apply(FrameEvent::PresentComplete);
        if outcome.needs_recreate() {
            log::warn!("Present reported {outcome:?}, recreating swapchain");
            self.recreate_requested = true;
        }
        Ok(())
    }

    /// Rebuild every size-dependent resource for the requested extent
    fn recreate_surface(&mut self) -> RenderResult<()> {
        let (width, height) = self.requested_extent;
        self.pending_resize = false;
        self.recreate_requested = false;

        self.backend.wait_idle()?;
        self.backend.release_surface_resources();

        match self.backend.create_surface_resources(width, height) {
            Ok(SurfaceStatus::Ready { width, height }) => {
                self.extent = Some((width, height));
                self.projection = ui_projection(width, height);
                self.lifecycle.apply(FrameEvent::SurfaceReady);
                log::info!("Surface ready at {width}x{height}");
                Ok(())
            }
            Ok(SurfaceStatus::Degenerate) => {
                if self.extent.take().is_some() || self.lifecycle.state() != FrameState::Invalid {
                    log::info!("Surface has zero area, rendering paused");
                }
                self.lifecycle.apply(FrameEvent::SurfaceLost);
                Ok(())
            }
            Err(err) => {
                self.extent = None;
                self.recreate_requested = true;
                self.lifecycle.apply(FrameEvent::SurfaceLost);
                Err(err)
            }
        }
    }

    /// Retry swapchain creation while the surface is invalid
    ///
    /// Meant for the host's idle callback while minimized. Returns whether
    /// the surface is usable. Never blocks beyond a device idle wait.
    pub fn poll_surface(&mut self) -> bool {
        let stale = self.lifecycle.state() == FrameState::Invalid || self.recreate_requested;
        if !self.shut_down && stale && !self.lifecycle.state().in_frame() {
            let result = self.recreate_surface();
            self.report("poll_surface", result);
        }
        self.lifecycle.state() != FrameState::Invalid
    }

    /// Resize notification, see [`RenderInterface::set_viewport`]
    ///
    /// Inside a frame the resize is deferred to the end of the frame.
    pub fn try_set_viewport(&mut self, width: u32, height: u32) -> RenderResult<()> {
        self.requested_extent = (width, height);
        if self.shut_down {
            return Ok(());
        }
        if self.lifecycle.state().in_frame() {
            self.pending_resize = true;
            return Ok(());
        }
        self.recreate_surface()
    }

    /// Pause or resume rendering, e.g. while the window is hidden
    pub fn set_render_enabled(&mut self, enabled: bool) {
        if self.render_enabled != enabled {
            log::debug!("Rendering {}", if enabled { "resumed" } else { "paused" });
        }
        self.render_enabled = enabled;
    }

    // ---- geometry ----

    /// Upload geometry, see [`RenderInterface::compile_geometry`]
    pub fn try_compile_geometry(
        &mut self,
        vertices: &[Vertex],
        indices: &[u32],
        texture: Option<TextureHandle>,
    ) -> RenderResult<GeometryHandle> {
        if vertices.is_empty() || indices.is_empty() {
            return Err(RenderError::InvalidGeometry(format!(
                "{} vertices, {} indices",
                vertices.len(),
                indices.len()
            )));
        }
        if let Some(index) = indices.iter().find(|&&index| index as usize >= vertices.len()) {
            return Err(RenderError::InvalidGeometry(format!(
                "index {index} out of range for {} vertices",
                vertices.len()
            )));
        }
        if texture.is_some_and(|handle| self.registry.texture(handle).is_none()) {
            return Err(RenderError::StaleHandle("texture"));
        }
        let index_count = u32::try_from(indices.len())
            .map_err(|_| RenderError::InvalidGeometry(format!("{} indices", indices.len())))?;

        let vertex_region = self.upload(bytemuck::cast_slice(vertices))?;
        let index_region = match self.upload(bytemuck::cast_slice(indices)) {
            Ok(region) => region,
            Err(err) => {
                self.free_region(vertex_region);
                return Err(err);
            }
        };

        let handle = self.registry.insert_geometry(GeometryRecord {
            vertices: vertex_region,
            indices: index_region,
            uniforms: None,
            index_count,
            texture,
        });
        log::debug!("Compiled geometry {handle:?}: {} vertices, {index_count} indices", vertices.len());
        Ok(handle)
    }

    /// Retire geometry, see [`RenderInterface::release_geometry`]
    pub fn try_release_geometry(&mut self, geometry: GeometryHandle) -> RenderResult<()> {
        let record = self
            .registry
            .remove_geometry(geometry)
            .ok_or(RenderError::StaleHandle("geometry"))?;
        self.retire(Retired::Geometry(record));
        Ok(())
    }

    /// Draw compiled geometry, see [`RenderInterface::render_geometry`]
    pub fn try_render_geometry(
        &mut self,
        geometry: GeometryHandle,
        translation: Vec2,
        texture: Option<TextureHandle>,
    ) -> RenderResult<()> {
        self.record_draw(geometry, translation, texture, None)
    }

    /// Compile, draw and release in one go, for geometry used once
    pub fn try_render_immediate(
        &mut self,
        vertices: &[Vertex],
        indices: &[u32],
        translation: Vec2,
        texture: Option<TextureHandle>,
    ) -> RenderResult<()> {
        self.draw_transient(vertices, indices, translation, texture, None)
    }

    fn draw_transient(
        &mut self,
        vertices: &[Vertex],
        indices: &[u32],
        translation: Vec2,
        texture: Option<TextureHandle>,
        pipeline: Option<PipelineKind>,
    ) -> RenderResult<()> {
        if !self.lifecycle.is_recording() {
            return Err(RenderError::NoActiveFrame);
        }

        let handle = self.try_compile_geometry(vertices, indices, None)?;
        let drawn = self.record_draw(handle, translation, texture, pipeline);
        self.try_release_geometry(handle)?;
        drawn
    }

    fn record_draw(
        &mut self,
        geometry: GeometryHandle,
        translation: Vec2,
        texture: Option<TextureHandle>,
        pipeline: Option<PipelineKind>,
    ) -> RenderResult<()> {
        if !self.lifecycle.is_recording() {
            return Err(RenderError::NoActiveFrame);
        }

        let record = self.registry.geometry(geometry).ok_or(RenderError::StaleHandle("geometry"))?;
        let (vertices, indices, index_count) = (record.vertices, record.indices, record.index_count);
        let texture = texture.or(record.texture);
        let pipeline =
            pipeline.unwrap_or_else(|| PipelineKind::for_draw(texture.is_some(), self.clip == Clip::Stencil));
        let texture = texture.filter(|_| pipeline.is_textured());

        if let Some(handle) = texture {
            self.ensure_descriptor(handle)?;
        }

        let transform = self.transform.map_or(self.projection, |transform| self.projection * transform);
        let block = UniformBlock::new(&transform, translation);
        let uniforms = self.upload(bytemuck::bytes_of(&block))?;

        let previous = self
            .registry
            .geometries
            .get_mut(geometry)
            .and_then(|record| record.uniforms.replace(uniforms));
        if let Some(previous) = previous {
            self.retire(Retired::Uniforms(previous));
        }

        let descriptor = texture
            .and_then(|handle| self.registry.textures.get(handle))
            .and_then(|record| record.descriptor.as_ref());
        self.backend.draw(&DrawCommand {
            pipeline,
            vertices,
            indices,
            index_count,
            uniforms,
            texture: descriptor,
        });
        Ok(())
    }

    fn ensure_descriptor(&mut self, texture: TextureHandle) -> RenderResult<()> {
        let record = self
            .registry
            .textures
            .get_mut(texture)
            .ok_or(RenderError::StaleHandle("texture"))?;

        if record.descriptor.is_none() {
            record.descriptor = Some(self.backend.create_texture_descriptor(&record.texture)?);
            log::debug!("Bound descriptor for texture {texture:?}");
        }
        Ok(())
    }

    // ---- textures ----

    /// Upload RGBA8 pixels, see [`RenderInterface::generate_texture`]
    pub fn try_generate_texture(&mut self, pixels: &[u8], dimensions: (u32, u32)) -> RenderResult<TextureHandle> {
        let (width, height) = dimensions;
        validate_pixels(pixels, width, height)?;

        let texture = self.backend.create_texture(pixels, width, height)?;
        let handle = self.registry.insert_texture(texture, width, height);
        log::debug!("Created texture {handle:?} ({width}x{height})");
        Ok(handle)
    }

    /// Decode and upload an image file, see [`RenderInterface::load_texture`]
    pub fn try_load_texture(&mut self, path: &Path) -> RenderResult<(TextureHandle, (u32, u32))> {
        let image = image::open(path)
            .map_err(|e| RenderError::TextureLoad(format!("{}: {e}", path.display())))?
            .into_rgba8();
        let dimensions = image.dimensions();

        let handle = self.try_generate_texture(image.as_raw(), dimensions)?;
        log::info!("Loaded texture {} ({}x{})", path.display(), dimensions.0, dimensions.1);
        Ok((handle, dimensions))
    }

    /// Retire a texture, see [`RenderInterface::release_texture`]
    pub fn try_release_texture(&mut self, texture: TextureHandle) -> RenderResult<()> {
        let record = self
            .registry
            .remove_texture(texture)
            .ok_or(RenderError::StaleHandle("texture"))?;
        self.retire(Retired::Texture(record));
        Ok(())
    }

    // ---- clipping and transform ----

    /// See [`RenderInterface::enable_scissor_region`]
    pub fn try_enable_scissor_region(&mut self, enable: bool) -> RenderResult<()> {
        if !self.lifecycle.is_recording() {
            return Err(RenderError::NoActiveFrame);
        }

        self.scissor_enabled = enable;
        if !enable {
            self.clip = Clip::None;
            self.reset_hardware_scissor();
        }
        Ok(())
    }

    /// See [`RenderInterface::set_scissor_region`]
    ///
    /// Without a transform this is a hardware scissor. With one, the
    /// rectangle is transformed like any geometry and drawn into the stencil
    /// buffer, and later draws are stencil tested against it.
    pub fn try_set_scissor_region(&mut self, rect: ScissorRect) -> RenderResult<()> {
        if !self.lifecycle.is_recording() {
            return Err(RenderError::NoActiveFrame);
        }
        if !self.scissor_enabled {
            log::trace!("Scissor region set while clipping is disabled, ignored");
            return Ok(());
        }

        if self.transform.is_some() {
            self.reset_hardware_scissor();
            self.backend.clear_stencil();
            let (vertices, indices) = rect.to_quad();
            self.draw_transient(&vertices, &indices, Vec2::zeros(), None, Some(PipelineKind::StencilWrite))?;
            self.clip = Clip::Stencil;
        } else {
            self.backend.set_scissor(rect.to_hardware());
            self.clip = Clip::Scissor;
        }
        Ok(())
    }

    fn reset_hardware_scissor(&mut self) {
        if let Some((width, height)) = self.extent {
            self.backend.set_scissor(ScissorRect::full(width, height));
        }
    }

    /// Transform applied to later draws, `None` for identity
    pub fn set_transform(&mut self, transform: Option<&Mat4>) {
        self.transform = transform.copied();
    }

    // ---- memory and deletion ----

    fn upload(&mut self, bytes: &[u8]) -> RenderResult<MemoryRegion> {
        let region = self.pool.allocate(bytes.len() as u64)?;
        if let Err(err) = self.backend.write_pool(region, bytes) {
            self.free_region(region);
            return Err(err);
        }
        Ok(region)
    }

    fn free_region(&mut self, region: MemoryRegion) {
        if let Err(err) = self.pool.free(region) {
            log::warn!("{err}");
            debug_assert!(!self.strict, "{err}");
        }
    }

    fn retire(&mut self, resource: Retired<B::Texture, B::Descriptor>) {
        self.deletion_queue.enqueue(self.ring.current(), resource);
    }

    fn destroy_retired(&mut self, slot: usize) {
        let retired: Vec<_> = self.deletion_queue.drain(slot).collect();
        if !retired.is_empty() {
            log::debug!("Destroying {} retired resources from slot {slot}", retired.len());
        }
        for resource in retired {
            self.destroy(resource);
        }
    }

    fn destroy(&mut self, resource: Retired<B::Texture, B::Descriptor>) {
        match resource {
            Retired::Geometry(record) => {
                for region in record.regions() {
                    self.free_region(region);
                }
            }
            Retired::Uniforms(region) => self.free_region(region),
            Retired::Texture(record) => self.backend.destroy_texture(record.texture, record.descriptor),
        }
    }

    // ---- shutdown ----

    /// Wait for the GPU and destroy everything
    ///
    /// Handles still registered are leaks on the caller's side; they are
    /// destroyed with a warning. Safe to call more than once.
    pub fn shutdown(&mut self) {
        if self.shut_down {
            return;
        }
        self.shut_down = true;
        log::info!("Shutting down UI renderer");

        if let Err(err) = self.backend.wait_idle() {
            log::error!("Device wait failed during shutdown: {err}");
        }

        for resource in self.deletion_queue.drain_all() {
            self.destroy(resource);
        }

        let (geometries, textures) = self.registry.drain();
        if !geometries.is_empty() || !textures.is_empty() {
            log::warn!(
                "{} geometries and {} textures were never released",
                geometries.len(),
                textures.len()
            );
        }
        for record in geometries {
            self.destroy(Retired::Geometry(record));
        }
        for record in textures {
            self.destroy(Retired::Texture(record));
        }

        self.backend.release_surface_resources();
        self.backend.shutdown();
        self.extent = None;
        self.lifecycle.apply(FrameEvent::Shutdown);

        let outstanding = self.backend.outstanding_descriptors();
        if outstanding != 0 {
            log::error!("{outstanding} descriptor sets leaked");
        }
        debug_assert!(!self.strict || outstanding == 0, "{outstanding} descriptor sets leaked");
        if self.pool.allocation_count() != 0 {
            log::error!("{} pool regions still allocated after shutdown", self.pool.allocation_count());
        }
    }

    // ---- introspection ----

    fn report<T>(&self, operation: &str, result: RenderResult<T>) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(err) if err.is_assertable() => {
                log::warn!("{operation}: {err}");
                debug_assert!(!self.strict, "{operation}: {err}");
                None
            }
            Err(err) => {
                log::error!("{operation} failed: {err}");
                None
            }
        }
    }

    /// The backend
    pub const fn backend(&self) -> &B {
        &self.backend
    }

    /// The backend, mutably
    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    /// Geometry/uniform memory pool
    pub const fn pool(&self) -> &MemoryPool {
        &self.pool
    }

    /// Current frame state
    pub const fn frame_state(&self) -> FrameState {
        self.lifecycle.state()
    }

    /// Slot of the most recent frame
    pub const fn current_slot(&self) -> usize {
        self.ring.current()
    }

    /// Swapchain extent, `None` while the surface is invalid
    pub const fn extent(&self) -> Option<(u32, u32)> {
        self.extent
    }

    /// Current projection for the swapchain extent
    pub const fn projection(&self) -> &Mat4 {
        &self.projection
    }

    /// Resources waiting in deletion buckets
    pub fn pending_deletions(&self) -> usize {
        self.deletion_queue.pending()
    }

    /// Live geometry and texture handles
    pub fn live_handles(&self) -> (usize, usize) {
        (self.registry.geometry_count(), self.registry.texture_count())
    }

    /// Whether rendering is enabled
    pub const fn is_render_enabled(&self) -> bool {
        self.render_enabled
    }
}

fn validate_pixels(pixels: &[u8], width: u32, height: u32) -> RenderResult<()> {
    if width == 0 || height == 0 {
        return Err(RenderError::InvalidTexture(format!("zero-sized texture {width}x{height}")));
    }

    let expected = (width as usize)
        .checked_mul(height as usize)
        .and_then(|texels| texels.checked_mul(4))
        .ok_or_else(|| RenderError::InvalidTexture(format!("{width}x{height} is too large")))?;
    if pixels.len() != expected {
        return Err(RenderError::InvalidTexture(format!(
            "{width}x{height} RGBA needs {expected} bytes, got {}",
            pixels.len()
        )));
    }
    Ok(())
}

impl<B: GpuBackend> Drop for UiRenderer<B> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl<B: GpuBackend> RenderInterface for UiRenderer<B> {
    fn begin_frame(&mut self) -> bool {
        let result = self.try_begin_frame();
        self.report("begin_frame", result).unwrap_or(false)
    }

    fn end_frame(&mut self) {
        let result = self.try_end_frame();
        self.report("end_frame", result);
    }

    fn compile_geometry(
        &mut self,
        vertices: &[Vertex],
        indices: &[u32],
        texture: Option<TextureHandle>,
    ) -> Option<GeometryHandle> {
        let result = self.try_compile_geometry(vertices, indices, texture);
        self.report("compile_geometry", result)
    }

    fn release_geometry(&mut self, geometry: GeometryHandle) {
        let result = self.try_release_geometry(geometry);
        self.report("release_geometry", result);
    }

    fn render_geometry(&mut self, geometry: GeometryHandle, translation: Vec2, texture: Option<TextureHandle>) {
        let result = self.try_render_geometry(geometry, translation, texture);
        self.report("render_geometry", result);
    }

    fn load_texture(&mut self, path: &Path) -> Option<(TextureHandle, (u32, u32))> {
        let result = self.try_load_texture(path);
        self.report("load_texture", result)
    }

    fn generate_texture(&mut self, pixels: &[u8], dimensions: (u32, u32)) -> Option<TextureHandle> {
        let result = self.try_generate_texture(pixels, dimensions);
        self.report("generate_texture", result)
    }

    fn release_texture(&mut self, texture: TextureHandle) {
        let result = self.try_release_texture(texture);
        self.report("release_texture", result);
    }

    fn enable_scissor_region(&mut self, enable: bool) {
        let result = self.try_enable_scissor_region(enable);
        self.report("enable_scissor_region", result);
    }

    fn set_scissor_region(&mut self, rect: ScissorRect) {
        let result = self.try_set_scissor_region(rect);
        self.report("set_scissor_region", result);
    }

    fn set_transform(&mut self, transform: Option<&Mat4>) {
        Self::set_transform(self, transform);
    }

    fn set_viewport(&mut self, width: u32, height: u32) {
        let result = self.try_set_viewport(width, height);
        self.report("set_viewport", result);
    }
}

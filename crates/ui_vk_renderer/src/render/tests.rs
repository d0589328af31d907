//! Renderer scenarios against the recording backend

use super::testing::{MockBackend, MockEvent};
use super::*;
use crate::core::config::RendererConfig;
use crate::foundation::math::{ui_projection, Mat4, Vec2};
use crate::render::frame::FrameState;
use approx::assert_relative_eq;

const DEPTH: usize = 3;
const WIDTH: u32 = 800;
const HEIGHT: u32 = 600;

fn renderer_with_pool(pool_size: u64) -> UiRenderer<MockBackend> {
    let config = RendererConfig::default()
        .with_ring_depth(DEPTH)
        .with_pool_size(pool_size)
        .with_strict_validation(false);
    let backend = MockBackend::new(pool_size, 256, DEPTH);
    UiRenderer::new(backend, &config, WIDTH, HEIGHT).expect("Should create renderer")
}

fn renderer() -> UiRenderer<MockBackend> {
    renderer_with_pool(64 * 1024)
}

fn quad() -> ([Vertex; 4], [u32; 6]) {
    ScissorRect::new(0, 0, 10, 10).to_quad()
}

fn run_frames(renderer: &mut UiRenderer<MockBackend>, count: usize) {
    for _ in 0..count {
        assert!(renderer.begin_frame(), "Frame should begin");
        renderer.end_frame();
    }
}

#[test]
fn test_reused_slot_waits_on_its_previous_fence() {
    let mut renderer = renderer();
    run_frames(&mut renderer, 6);

    let backend = renderer.backend();
    let recorded: Vec<usize> = backend
        .events
        .iter()
        .filter_map(|e| match e {
            MockEvent::BeginRecording(slot) => Some(*slot),
            _ => None,
        })
        .collect();
    assert_eq!(recorded, vec![0, 1, 2, 0, 1, 2]);

    // Frames 0..2 find idle slots, frames 3..5 block on frames 0..2
    for slot in 0..DEPTH {
        let idle = backend.positions(&MockEvent::WaitForSlot { slot, was_pending: false });
        let blocked = backend.positions(&MockEvent::WaitForSlot { slot, was_pending: true });
        assert_eq!(idle.len(), 1);
        assert_eq!(blocked.len(), 1);

        let submits = backend.positions(&MockEvent::Submit(slot));
        let records = backend.positions(&MockEvent::BeginRecording(slot));
        assert!(submits[0] < blocked[0], "Frame {slot} submits before frame {} waits", slot + DEPTH);
        assert!(blocked[0] < records[1], "Slot {slot} is reused only after its fence");
    }
}

#[test]
fn test_release_inside_frame_is_destroyed_ring_depth_frames_later() {
    let mut renderer = renderer();
    let (vertices, indices) = quad();
    let geometry = renderer.compile_geometry(&vertices, &indices, None).expect("Should compile");

    assert!(renderer.begin_frame());
    renderer.render_geometry(geometry, Vec2::new(1.0, 2.0), None);
    renderer.release_geometry(geometry);
    renderer.end_frame();
    assert_eq!(renderer.pool().allocation_count(), 3);

    run_frames(&mut renderer, DEPTH - 1);
    assert_eq!(renderer.pending_deletions(), 1);
    assert_eq!(renderer.pool().allocation_count(), 3);

    assert!(renderer.begin_frame());
    assert_eq!(renderer.pending_deletions(), 0);
    assert_eq!(renderer.pool().allocation_count(), 0);
    renderer.end_frame();
}

#[test]
fn test_compile_then_release_is_never_synchronous() {
    let mut renderer = renderer();
    let (vertices, indices) = quad();
    let geometry = renderer.compile_geometry(&vertices, &indices, None).expect("Should compile");
    let used = renderer.pool().used();

    renderer.release_geometry(geometry);
    assert_eq!(renderer.pool().used(), used);
    assert_eq!(renderer.live_handles(), (0, 0));

    // Released before any frame, so it waits in the last slot
    run_frames(&mut renderer, DEPTH - 1);
    assert_eq!(renderer.pool().used(), used);

    run_frames(&mut renderer, 1);
    assert_eq!(renderer.pool().used(), 0);
}

#[test]
fn test_end_frame_without_begin_is_a_no_op() {
    let mut renderer = renderer();
    renderer.end_frame();
    assert_eq!(renderer.frame_state(), FrameState::Acquiring);

    run_frames(&mut renderer, 1);
    renderer.end_frame();

    let backend = renderer.backend();
    assert_eq!(backend.count(|e| matches!(e, MockEvent::Submit(_))), 1);
    assert_eq!(backend.count(|e| matches!(e, MockEvent::Present(_))), 1);
}

#[test]
fn test_failed_submit_does_not_wedge_its_slot() {
    let mut renderer = renderer();
    assert!(renderer.begin_frame());
    renderer.backend_mut().failing_submits = 1;
    assert!(renderer.try_end_frame().is_err());
    assert_eq!(renderer.frame_state(), FrameState::Invalid);

    run_frames(&mut renderer, DEPTH + 1);

    let backend = renderer.backend();
    let failed = backend.position(&MockEvent::SubmitFailed(0)).expect("Should record the failure");
    let retried = backend.positions(&MockEvent::BeginRecording(0));
    assert!(retried.iter().any(|&at| at > failed), "Slot 0 should record again");
    assert!(backend.positions(&MockEvent::Present(0)).iter().any(|&at| at > failed));
}

#[test]
fn test_minimize_and_restore_rebuilds_targets_without_leaks() {
    let mut renderer = renderer();
    run_frames(&mut renderer, 2);

    renderer.set_viewport(0, 0);
    assert_eq!(renderer.frame_state(), FrameState::Invalid);
    assert_eq!(renderer.extent(), None);
    assert!(!renderer.begin_frame());
    assert!(!renderer.poll_surface());
    renderer.end_frame();

    renderer.set_viewport(1024, 768);
    assert_eq!(renderer.extent(), Some((1024, 768)));
    assert_eq!(renderer.frame_state(), FrameState::Acquiring);
    assert_relative_eq!(*renderer.projection(), ui_projection(1024, 768));
    run_frames(&mut renderer, 2);

    renderer.shutdown();
    let backend = renderer.backend();
    assert_eq!(backend.targets_created, 2);
    assert_eq!(backend.targets_destroyed, 2);
    assert!(!backend.targets_live);
}

#[test]
fn test_resize_inside_frame_waits_for_present() {
    let mut renderer = renderer();
    assert!(renderer.begin_frame());
    renderer.set_viewport(640, 480);
    assert_eq!(renderer.extent(), Some((WIDTH, HEIGHT)));

    renderer.end_frame();
    let backend = renderer.backend();
    let present = backend.position(&MockEvent::Present(0)).expect("Should present");
    let rebuilt = backend
        .position(&MockEvent::CreateTargets { width: 640, height: 480 })
        .expect("Should rebuild");
    assert!(present < rebuilt);
    assert_eq!(renderer.extent(), Some((640, 480)));
}

#[test]
fn test_out_of_date_acquire_skips_the_frame() {
    let mut renderer = renderer();
    renderer.backend_mut().acquire_results.push_back(AcquireOutcome::OutOfDate);

    assert!(!renderer.begin_frame());
    renderer.end_frame();
    assert_eq!(renderer.backend().targets_created, 2);
    assert_eq!(renderer.backend().count(|e| matches!(e, MockEvent::Submit(_))), 0);

    // The skipped slot's fence was never reset, later frames do not stall on it
    run_frames(&mut renderer, DEPTH + 1);
    assert!(renderer.begin_frame());
    renderer.end_frame();
}

#[test]
fn test_suboptimal_present_recreates_after_the_frame() {
    let mut renderer = renderer();
    renderer.backend_mut().present_results.push_back(PresentOutcome::Suboptimal);

    run_frames(&mut renderer, 1);
    assert_eq!(renderer.backend().targets_created, 2);
    assert_eq!(renderer.frame_state(), FrameState::Acquiring);
    run_frames(&mut renderer, 1);
}

#[test]
fn test_texture_descriptor_is_bound_once_and_freed_on_release() {
    let mut renderer = renderer();
    let texture = renderer.generate_texture(&[255; 2 * 2 * 4], (2, 2)).expect("Should create texture");
    let (vertices, indices) = quad();
    let geometry = renderer
        .compile_geometry(&vertices, &indices, Some(texture))
        .expect("Should compile");
    assert_eq!(renderer.backend().outstanding_descriptors, 1);

    assert!(renderer.begin_frame());
    renderer.render_geometry(geometry, Vec2::zeros(), None);
    renderer.render_geometry(geometry, Vec2::new(5.0, 5.0), Some(texture));
    renderer.end_frame();

    let backend = renderer.backend();
    assert_eq!(backend.count(|e| matches!(e, MockEvent::CreateDescriptor(_))), 1);
    assert_eq!(backend.outstanding_descriptors, 2);
    let draws = backend.draws();
    assert_eq!(draws.len(), 2);
    assert!(draws.iter().all(|(pipeline, _, descriptor)| *pipeline == PipelineKind::Textured && descriptor.is_some()));

    renderer.release_geometry(geometry);
    renderer.release_texture(texture);
    run_frames(&mut renderer, DEPTH);
    assert_eq!(renderer.backend().outstanding_descriptors, 1);
    assert_eq!(renderer.backend().count(|e| matches!(e, MockEvent::DestroyTexture(_))), 1);

    renderer.shutdown();
    assert_eq!(renderer.backend().outstanding_descriptors, 0);
    assert!(renderer.backend().shut_down);
}

#[test]
fn test_stale_handles_are_rejected_without_side_effects() {
    let mut renderer = renderer();
    let (vertices, indices) = quad();
    let geometry = renderer.compile_geometry(&vertices, &indices, None).expect("Should compile");
    let texture = renderer.generate_texture(&[0; 4], (1, 1)).expect("Should create texture");

    renderer.release_geometry(geometry);
    renderer.release_texture(texture);
    assert!(matches!(renderer.try_release_geometry(geometry), Err(RenderError::StaleHandle("geometry"))));
    assert!(matches!(renderer.try_release_texture(texture), Err(RenderError::StaleHandle("texture"))));
    assert!(matches!(
        renderer.try_compile_geometry(&vertices, &indices, Some(texture)),
        Err(RenderError::StaleHandle("texture"))
    ));
    assert_eq!(renderer.pending_deletions(), 2);

    assert!(renderer.begin_frame());
    assert!(matches!(
        renderer.try_render_geometry(geometry, Vec2::zeros(), None),
        Err(RenderError::StaleHandle("geometry"))
    ));
    renderer.render_geometry(geometry, Vec2::zeros(), None);
    renderer.end_frame();
    assert!(renderer.backend().draws().is_empty());
}

#[test]
fn test_replaced_uniforms_are_retired_not_freed() {
    let mut renderer = renderer();
    let (vertices, indices) = quad();
    let geometry = renderer.compile_geometry(&vertices, &indices, None).expect("Should compile");

    assert!(renderer.begin_frame());
    renderer.render_geometry(geometry, Vec2::new(3.0, 4.0), None);
    renderer.end_frame();
    assert!(renderer.begin_frame());
    renderer.render_geometry(geometry, Vec2::new(7.0, 8.0), None);
    renderer.end_frame();

    assert_eq!(renderer.pending_deletions(), 1);
    assert_eq!(renderer.pool().allocation_count(), 4);

    let draws = renderer.backend().draws();
    let (_, latest, _) = draws[1];
    let bytes = &renderer.backend().memory[latest.offset() as usize..][..UniformBlock::SIZE as usize];
    let block: UniformBlock = bytemuck::pod_read_unaligned(bytes);
    assert_eq!(block.translate, [7.0, 8.0]);
    assert!(!draws[0].1.overlaps(&latest));

    run_frames(&mut renderer, DEPTH - 1);
    assert_eq!(renderer.pending_deletions(), 1);
    run_frames(&mut renderer, 1);
    assert_eq!(renderer.pending_deletions(), 0);
    assert_eq!(renderer.pool().allocation_count(), 3);
}

#[test]
fn test_scissor_under_transform_uses_stencil_pipelines() {
    let mut renderer = renderer();
    let (vertices, indices) = quad();
    let geometry = renderer.compile_geometry(&vertices, &indices, None).expect("Should compile");
    let rotation = Mat4::new_rotation(nalgebra::Vector3::z() * 0.25);

    renderer.set_transform(Some(&rotation));
    assert!(renderer.begin_frame());
    renderer.enable_scissor_region(true);
    renderer.set_scissor_region(ScissorRect::new(10, 10, 100, 50));
    renderer.render_geometry(geometry, Vec2::zeros(), None);
    renderer.enable_scissor_region(false);
    renderer.render_geometry(geometry, Vec2::zeros(), None);
    renderer.end_frame();

    let backend = renderer.backend();
    let pipelines: Vec<PipelineKind> = backend.draws().into_iter().map(|(pipeline, _, _)| pipeline).collect();
    assert_eq!(
        pipelines,
        vec![PipelineKind::StencilWrite, PipelineKind::StencilColor, PipelineKind::Color]
    );

    let clear = backend.position(&MockEvent::ClearStencil).expect("Should clear stencil");
    let first_draw = backend
        .events
        .iter()
        .position(|e| matches!(e, MockEvent::Draw { .. }))
        .expect("Should draw");
    assert!(clear < first_draw);
    assert_eq!(
        backend.positions(&MockEvent::SetScissor(ScissorRect::full(WIDTH, HEIGHT))).len(),
        2
    );
}

#[test]
fn test_scissor_without_transform_is_hardware_clip() {
    let mut renderer = renderer();
    let (vertices, indices) = quad();
    let geometry = renderer.compile_geometry(&vertices, &indices, None).expect("Should compile");

    assert!(renderer.begin_frame());
    renderer.set_scissor_region(ScissorRect::new(1, 1, 2, 2));
    renderer.enable_scissor_region(true);
    renderer.set_scissor_region(ScissorRect::new(-5, 10, 50, 60));
    renderer.render_geometry(geometry, Vec2::zeros(), None);
    renderer.end_frame();

    let backend = renderer.backend();
    let scissors: Vec<&MockEvent> = backend.events.iter().filter(|e| matches!(e, MockEvent::SetScissor(_))).collect();
    assert_eq!(scissors, vec![&MockEvent::SetScissor(ScissorRect::new(5, 10, 50, 60))]);
    assert_eq!(backend.draws()[0].0, PipelineKind::Color);
    assert_eq!(backend.count(|e| *e == MockEvent::ClearStencil), 0);
}

#[test]
fn test_draw_calls_outside_a_frame_are_dropped() {
    let mut renderer = renderer();
    let (vertices, indices) = quad();
    let geometry = renderer.compile_geometry(&vertices, &indices, None).expect("Should compile");

    assert!(matches!(
        renderer.try_render_geometry(geometry, Vec2::zeros(), None),
        Err(RenderError::NoActiveFrame)
    ));
    assert!(matches!(
        renderer.try_enable_scissor_region(true),
        Err(RenderError::NoActiveFrame)
    ));
    renderer.render_immediate_checked(&vertices, &indices);
    assert!(renderer.backend().draws().is_empty());
    assert_eq!(renderer.pool().allocation_count(), 2);
}

#[test]
fn test_pool_exhaustion_drops_only_the_failing_call() {
    let mut renderer = renderer_with_pool(1024);
    let (vertices, indices) = quad();

    let first = renderer.compile_geometry(&vertices, &indices, None).expect("Should compile");
    let second = renderer.compile_geometry(&vertices, &indices, None).expect("Should compile");
    assert!(renderer.compile_geometry(&vertices, &indices, None).is_none());
    assert!(matches!(
        renderer.try_compile_geometry(&vertices, &indices, None),
        Err(RenderError::PoolExhausted { .. })
    ));
    assert_eq!(renderer.pool().used(), 1024);

    renderer.release_geometry(second);
    assert!(renderer.begin_frame());
    renderer.render_geometry(first, Vec2::zeros(), None);
    renderer.end_frame();
    assert!(renderer.backend().draws().is_empty());

    run_frames(&mut renderer, DEPTH);
    assert!(renderer.begin_frame());
    renderer.render_geometry(first, Vec2::zeros(), None);
    renderer.end_frame();
    assert_eq!(renderer.backend().draws().len(), 1);
}

#[test]
fn test_invalid_input_is_rejected_before_the_gpu() {
    let mut renderer = renderer();
    let (vertices, _) = quad();

    assert!(renderer.generate_texture(&[0; 3], (1, 1)).is_none());
    assert!(renderer.generate_texture(&[], (0, 4)).is_none());
    assert!(renderer.compile_geometry(&vertices, &[0, 1, 9], None).is_none());
    assert!(renderer.compile_geometry(&[], &[0], None).is_none());

    assert_eq!(renderer.backend().count(|e| matches!(e, MockEvent::CreateTexture(_))), 0);
    assert_eq!(renderer.pool().used(), 0);
}

#[test]
fn test_load_texture_decodes_png() {
    let mut renderer = renderer();
    let path = std::env::temp_dir().join(format!("ui_vk_renderer_test_{}.png", std::process::id()));
    image::RgbaImage::from_pixel(4, 2, image::Rgba([10, 20, 30, 255]))
        .save(&path)
        .expect("Should write png");

    let (texture, dimensions) = renderer.try_load_texture(&path).expect("Should load texture");
    assert_eq!(dimensions, (4, 2));
    renderer.release_texture(texture);
    std::fs::remove_file(&path).expect("Should remove png");

    assert!(matches!(
        renderer.try_load_texture(&path),
        Err(RenderError::TextureLoad(_))
    ));
}

#[test]
fn test_render_immediate_retires_its_geometry() {
    let mut renderer = renderer();
    let (vertices, indices) = quad();

    assert!(renderer.begin_frame());
    renderer
        .try_render_immediate(&vertices, &indices, Vec2::new(2.0, 2.0), None)
        .expect("Should draw");
    renderer.end_frame();

    assert_eq!(renderer.backend().draws().len(), 1);
    assert_eq!(renderer.live_handles(), (0, 0));
    assert_eq!(renderer.pending_deletions(), 1);
    run_frames(&mut renderer, DEPTH);
    assert_eq!(renderer.pool().used(), 0);
}

#[test]
fn test_disabled_rendering_skips_the_gpu() {
    let mut renderer = renderer();
    renderer.set_render_enabled(false);
    assert!(!renderer.begin_frame());
    assert_eq!(renderer.backend().count(|e| matches!(e, MockEvent::Acquire(_))), 0);

    renderer.set_render_enabled(true);
    run_frames(&mut renderer, 1);
}

#[test]
fn test_shutdown_reclaims_leaked_handles_once() {
    let mut renderer = renderer();
    let (vertices, indices) = quad();
    let texture = renderer.generate_texture(&[0; 16], (2, 2)).expect("Should create texture");
    let geometry = renderer
        .compile_geometry(&vertices, &indices, Some(texture))
        .expect("Should compile");
    assert!(renderer.begin_frame());
    renderer.render_geometry(geometry, Vec2::zeros(), None);
    renderer.end_frame();

    renderer.shutdown();
    renderer.shutdown();

    assert_eq!(renderer.pool().allocation_count(), 0);
    assert_eq!(renderer.frame_state(), FrameState::Invalid);
    assert!(!renderer.begin_frame());
    let backend = renderer.backend();
    assert_eq!(backend.outstanding_descriptors, 0);
    assert_eq!(backend.count(|e| matches!(e, MockEvent::DestroyTexture(_))), 1);
}

impl UiRenderer<MockBackend> {
    fn render_immediate_checked(&mut self, vertices: &[Vertex], indices: &[u32]) {
        assert!(matches!(
            self.try_render_immediate(vertices, indices, Vec2::zeros(), None),
            Err(RenderError::NoActiveFrame)
        ));
    }
}

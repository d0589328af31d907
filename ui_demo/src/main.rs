//! UI renderer demo application
//!
//! Draws a few panels, a generated checkerboard texture, a scissor-clipped
//! strip and a rotating, stencil-clipped card. Exercises resize and minimize
//! handling: shrink the window to nothing or iconify it and rendering pauses
//! until the surface is usable again.
//!
//! Usage: `ui_demo [config.toml|config.ron]`

use glfw::{Action, Key, WindowEvent};
use std::time::{Duration, Instant};
use thiserror::Error;
use ui_vk_renderer::config::Config;
use ui_vk_renderer::foundation::logging;
use ui_vk_renderer::prelude::*;
use ui_vk_renderer::render::backends::vulkan::initialization::WindowError;
use ui_vk_renderer::render::backends::vulkan::VulkanError;

const INITIAL_WIDTH: u32 = 1024;
const INITIAL_HEIGHT: u32 = 768;
const CHECKER_SIZE: u32 = 64;

#[derive(Error, Debug)]
enum DemoError {
    #[error("Configuration error: {0}")]
    Config(#[from] ui_vk_renderer::config::ConfigError),

    #[error("Window error: {0}")]
    Window(#[from] WindowError),

    #[error("Vulkan error: {0}")]
    Vulkan(#[from] VulkanError),

    #[error("Renderer error: {0}")]
    Render(#[from] RenderError),
}

fn main() {
    let config = match load_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(1);
        }
    };
    logging::init_with_level(&config.log_level);

    if let Err(e) = run(&config) {
        log::error!("Demo failed: {e}");
        std::process::exit(1);
    }
}

fn load_config() -> Result<RendererConfig, DemoError> {
    match std::env::args().nth(1) {
        Some(path) => Ok(RendererConfig::load_from_file(path)?),
        None => Ok(RendererConfig::new("UI Renderer Demo")),
    }
}

fn run(config: &RendererConfig) -> Result<(), DemoError> {
    let mut window = Window::new(&config.application_name, INITIAL_WIDTH, INITIAL_HEIGHT)?;
    let backend = VulkanBackend::new(&window, config)?;
    let (width, height) = window.get_framebuffer_size();
    let mut renderer = UiRenderer::new(backend, config, width, height)?;

    let scene = Scene::build(&mut renderer)?;
    let start = Instant::now();
    let mut minimized = false;

    while !window.should_close() {
        window.poll_events();

        let events: Vec<_> = window.flush_events().map(|(_, event)| event).collect();
        for event in events {
            match event {
                WindowEvent::Key(Key::Escape, _, Action::Press, _) | WindowEvent::Close => {
                    window.set_should_close(true);
                }
                WindowEvent::FramebufferSize(w, h) => {
                    log::debug!("Framebuffer resized to {w}x{h}");
                    renderer.set_viewport(w.max(0) as u32, h.max(0) as u32);
                }
                WindowEvent::Iconify(iconified) => {
                    minimized = iconified;
                    renderer.set_render_enabled(!iconified);
                }
                _ => {}
            }
        }

        if minimized || !renderer.poll_surface() {
            std::thread::sleep(Duration::from_millis(16));
            continue;
        }

        if renderer.begin_frame() {
            scene.draw(&mut renderer, start.elapsed().as_secs_f32());
            renderer.end_frame();
        }
    }

    scene.release(&mut renderer);
    renderer.shutdown();
    log::info!("Demo finished");
    Ok(())
}

struct Scene {
    panel: GeometryHandle,
    card: GeometryHandle,
    checker: TextureHandle,
}

impl Scene {
    fn build(renderer: &mut VulkanUiRenderer) -> Result<Self, DemoError> {
        let checker = renderer.try_generate_texture(&checkerboard(CHECKER_SIZE), (CHECKER_SIZE, CHECKER_SIZE))?;

        let (vertices, indices) = rect(0.0, 0.0, 240.0, 140.0, [40, 44, 52, 255]);
        let panel = renderer.try_compile_geometry(&vertices, &indices, None)?;

        let (vertices, indices) = rect(-80.0, -80.0, 160.0, 160.0, [255, 255, 255, 255]);
        let card = renderer.try_compile_geometry(&vertices, &indices, Some(checker))?;

        Ok(Self { panel, card, checker })
    }

    fn draw(&self, renderer: &mut VulkanUiRenderer, seconds: f32) {
        renderer.set_transform(None);
        renderer.enable_scissor_region(false);

        renderer.render_geometry(self.panel, Vec2::new(32.0, 32.0), None);
        renderer.render_geometry(self.panel, Vec2::new(304.0, 32.0), None);

        // Axis-aligned clip, served by the hardware scissor
        renderer.enable_scissor_region(true);
        renderer.set_scissor_region(ScissorRect::new(32, 200, 512, 60));
        let (vertices, indices) = rect(0.0, 0.0, 600.0, 120.0, [200, 90, 40, 255]);
        let sweep = (seconds * 120.0) % 600.0 - 300.0;
        if let Err(e) = renderer.try_render_immediate(&vertices, &indices, Vec2::new(sweep, 180.0), None) {
            log::warn!("Immediate draw failed: {e}");
        }
        renderer.enable_scissor_region(false);

        // Rotated clip, served by the stencil buffer
        let transform = rotation_about(seconds * 0.5, 700.0, 420.0);
        renderer.set_transform(Some(&transform));
        renderer.enable_scissor_region(true);
        renderer.set_scissor_region(ScissorRect::new(620, 340, 160, 160));
        renderer.render_geometry(self.card, Vec2::new(700.0, 420.0), None);
        renderer.enable_scissor_region(false);
        renderer.set_transform(None);
    }

    fn release(self, renderer: &mut VulkanUiRenderer) {
        renderer.release_geometry(self.card);
        renderer.release_geometry(self.panel);
        renderer.release_texture(self.checker);
    }
}

/// Two triangles covering `width` by `height` at (`x`, `y`)
fn rect(x: f32, y: f32, width: f32, height: f32, colour: [u8; 4]) -> ([Vertex; 4], [u32; 6]) {
    let vertices = [
        Vertex::new([x, y], colour, [0.0, 0.0]),
        Vertex::new([x + width, y], colour, [1.0, 0.0]),
        Vertex::new([x + width, y + height], colour, [1.0, 1.0]),
        Vertex::new([x, y + height], colour, [0.0, 1.0]),
    ];
    (vertices, [0, 1, 2, 2, 3, 0])
}

/// Rotation by `angle` radians around the pixel (`cx`, `cy`)
#[rustfmt::skip]
fn rotation_about(angle: f32, cx: f32, cy: f32) -> Mat4 {
    let (sin, cos) = angle.sin_cos();
    Mat4::new(
        cos, -sin, 0.0, cx - cos * cx + sin * cy,
        sin,  cos, 0.0, cy - sin * cx - cos * cy,
        0.0,  0.0, 1.0, 0.0,
        0.0,  0.0, 0.0, 1.0,
    )
}

fn checkerboard(size: u32) -> Vec<u8> {
    const CELL: u32 = 8;
    (0..size * size)
        .flat_map(|i| {
            let (x, y) = (i % size, i / size);
            if (x / CELL + y / CELL) % 2 == 0 {
                [230, 230, 230, 255]
            } else {
                [60, 120, 200, 255]
            }
        })
        .collect()
}

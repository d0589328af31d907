//! # Renderer Configuration
//!
//! All tunables of the UI renderer live here: frame pipelining depth, the
//! fixed memory and descriptor budgets, presentation preferences, shader
//! locations and debug switches.
//!
//! Every structure is serializable so a host can keep its settings in a
//! `.toml` or `.ron` file (see [`Config`]).

use serde::{Deserialize, Serialize};
use std::path::Path;

pub use crate::config::{Config, ConfigError, ConfigFormat};

/// Size of the shared vertex/index/uniform pool when nothing else is configured
pub const DEFAULT_POOL_SIZE_BYTES: u64 = 4 * 1024 * 1024;

/// Number of frame slots when nothing else is configured
pub const DEFAULT_RING_DEPTH: usize = 3;

/// # Shader Configuration
///
/// SPIR-V locations for the UI shaders. Paths are resolved against a few
/// common directories so the demo runs from the workspace root or a crate
/// directory alike.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShaderConfig {
    /// Vertex shader shared by every pipeline
    pub vertex_shader_path: String,
    /// Fragment shader for untextured geometry
    pub color_fragment_path: String,
    /// Fragment shader for textured geometry
    pub textured_fragment_path: String,
}

impl ShaderConfig {
    /// Create a shader configuration from explicit paths
    pub fn new(
        vertex_path: impl Into<String>,
        color_fragment_path: impl Into<String>,
        textured_fragment_path: impl Into<String>,
    ) -> Self {
        Self {
            vertex_shader_path: vertex_path.into(),
            color_fragment_path: color_fragment_path.into(),
            textured_fragment_path: textured_fragment_path.into(),
        }
    }

    /// Create shader config with automatic path resolution
    ///
    /// Each file name is looked up in the usual build output and source
    /// locations; the first hit wins. Misses fall back to `shaders/<name>`.
    pub fn with_path_resolution(vertex: &str, color_fragment: &str, textured_fragment: &str) -> Self {
        Self {
            vertex_shader_path: Self::resolve(vertex),
            color_fragment_path: Self::resolve(color_fragment),
            textured_fragment_path: Self::resolve(textured_fragment),
        }
    }

    fn resolve(file_name: &str) -> String {
        const SHADER_DIRS: [&str; 5] = [
            "target/shaders/",
            "shaders/",
            "resources/shaders/",
            "../target/shaders/",
            "./",
        ];

        SHADER_DIRS
            .iter()
            .map(|dir| format!("{dir}{file_name}"))
            .find(|candidate| Path::new(candidate).exists())
            .unwrap_or_else(|| format!("shaders/{file_name}"))
    }

    /// All configured paths, vertex first
    pub fn paths(&self) -> [&str; 3] {
        [
            &self.vertex_shader_path,
            &self.color_fragment_path,
            &self.textured_fragment_path,
        ]
    }

    /// Validate that shader files exist
    pub fn validate(&self) -> Result<(), String> {
        for path in self.paths() {
            if !Path::new(path).exists() {
                return Err(format!("Shader not found: {path}"));
            }
        }
        Ok(())
    }
}

impl Default for ShaderConfig {
    fn default() -> Self {
        Self::with_path_resolution("ui.vert.spv", "ui_color.frag.spv", "ui_textured.frag.spv")
    }
}

/// Presentation mode preference
///
/// The preference is honoured when the surface supports it; otherwise FIFO,
/// which every surface must support, is used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PresentModePreference {
    /// Vsync, never tears
    #[default]
    Fifo,
    /// Vsync that may tear when a frame is late
    FifoRelaxed,
    /// Triple buffering, lowest latency without tearing
    Mailbox,
    /// No vsync
    Immediate,
}

/// Frame pipelining settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameConfig {
    /// Number of frame slots (and requested swapchain images)
    pub ring_depth: usize,
    /// How long `begin_frame` may block on a slot fence, in nanoseconds (`None` waits forever)
    pub fence_timeout_ns: Option<u64>,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            ring_depth: DEFAULT_RING_DEPTH,
            fence_timeout_ns: None,
        }
    }
}

/// Memory pool settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryConfig {
    /// Size of the one host-visible buffer backing all geometry and uniforms
    pub pool_size_bytes: u64,
    /// Replaces the device's uniform offset alignment when set (must be a power of two)
    pub min_alignment_override: Option<u64>,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            pool_size_bytes: DEFAULT_POOL_SIZE_BYTES,
            min_alignment_override: None,
        }
    }
}

/// Fixed per-kind capacity of the descriptor pool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DescriptorBudget {
    /// Maximum number of live descriptor sets
    pub max_sets: u32,
    /// Plain uniform buffer descriptors
    pub uniform_buffers: u32,
    /// Dynamic uniform buffer descriptors
    pub dynamic_uniform_buffers: u32,
    /// Combined image sampler descriptors
    pub combined_image_samplers: u32,
    /// Sampled image descriptors
    pub sampled_images: u32,
    /// Sampler descriptors
    pub samplers: u32,
}

impl Default for DescriptorBudget {
    fn default() -> Self {
        Self {
            max_sets: 1000,
            uniform_buffers: 1000,
            dynamic_uniform_buffers: 1000,
            combined_image_samplers: 1000,
            sampled_images: 1000,
            samplers: 1000,
        }
    }
}

/// # UI Renderer Configuration
///
/// Top level settings consumed by [`crate::render::UiRenderer`] and the
/// Vulkan backend. Build it with the `with_*` methods or load it from a file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RendererConfig {
    /// Application name for Vulkan instance creation
    pub application_name: String,
    /// Whether to enable Vulkan validation layers (`None` = debug builds only)
    pub enable_validation: Option<bool>,
    /// Turn exhaustion and contract violations into debug assertions
    pub strict_validation: bool,
    /// Preferred presentation mode
    pub present_mode: PresentModePreference,
    /// Colour the back buffer is cleared to each frame
    pub clear_color: [f32; 4],
    /// Frame pipelining
    pub frames: FrameConfig,
    /// Geometry/uniform memory pool
    pub memory: MemoryConfig,
    /// Descriptor pool capacity
    pub descriptors: DescriptorBudget,
    /// Shader locations
    pub shaders: ShaderConfig,
    /// Default log filter used by [`crate::foundation::logging::init_with_level`]
    pub log_level: String,
}

impl RendererConfig {
    /// Create a new renderer configuration
    pub fn new(app_name: impl Into<String>) -> Self {
        Self {
            application_name: app_name.into(),
            enable_validation: None,
            strict_validation: cfg!(debug_assertions),
            present_mode: PresentModePreference::default(),
            clear_color: [0.0, 0.0, 0.0, 1.0],
            frames: FrameConfig::default(),
            memory: MemoryConfig::default(),
            descriptors: DescriptorBudget::default(),
            shaders: ShaderConfig::default(),
            log_level: "info".to_string(),
        }
    }

    /// Bound the per-frame fence wait
    pub fn with_fence_timeout(mut self, timeout_ns: u64) -> Self {
        self.frames.fence_timeout_ns = Some(timeout_ns);
        self
    }

    /// Set the number of frame slots
    pub fn with_ring_depth(mut self, depth: usize) -> Self {
        self.frames.ring_depth = depth;
        self
    }

    /// Set the memory pool size in bytes
    pub fn with_pool_size(mut self, bytes: u64) -> Self {
        self.memory.pool_size_bytes = bytes;
        self
    }

    /// Force a specific allocation alignment instead of the device limit
    pub fn with_min_alignment(mut self, alignment: u64) -> Self {
        self.memory.min_alignment_override = Some(alignment);
        self
    }

    /// Set descriptor pool capacity
    pub fn with_descriptor_budget(mut self, budget: DescriptorBudget) -> Self {
        self.descriptors = budget;
        self
    }

    /// Set preferred presentation mode
    pub fn with_present_mode(mut self, mode: PresentModePreference) -> Self {
        self.present_mode = mode;
        self
    }

    /// Set the clear colour
    pub fn with_clear_color(mut self, rgba: [f32; 4]) -> Self {
        self.clear_color = rgba;
        self
    }

    /// Set custom shader configuration
    pub fn with_shaders(mut self, shaders: ShaderConfig) -> Self {
        self.shaders = shaders;
        self
    }

    /// Enable or disable validation layers
    pub fn with_validation(mut self, enabled: bool) -> Self {
        self.enable_validation = Some(enabled);
        self
    }

    /// Enable or disable strict contract checking
    pub fn with_strict_validation(mut self, enabled: bool) -> Self {
        self.strict_validation = enabled;
        self
    }

    /// Whether validation layers should be requested
    pub fn validation_enabled(&self) -> bool {
        self.enable_validation.unwrap_or(cfg!(debug_assertions))
    }

    /// Validate the configuration values (shader files are checked by the backend)
    pub fn validate(&self) -> Result<(), String> {
        if self.application_name.is_empty() {
            return Err("Application name cannot be empty".to_string());
        }

        if self.frames.ring_depth == 0 {
            return Err("Ring depth must be at least 1".to_string());
        }

        if self.frames.ring_depth > 8 {
            return Err("Ring depth should not exceed 8".to_string());
        }

        if self.memory.pool_size_bytes == 0 {
            return Err("Memory pool size must be non-zero".to_string());
        }

        // Dynamic uniform offsets into the pool are 32-bit
        if self.memory.pool_size_bytes > u64::from(u32::MAX) {
            return Err(format!(
                "Memory pool size {} exceeds the {} byte dynamic offset range",
                self.memory.pool_size_bytes,
                u32::MAX
            ));
        }

        if let Some(alignment) = self.memory.min_alignment_override {
            if !alignment.is_power_of_two() {
                return Err(format!("Alignment override {alignment} is not a power of two"));
            }
        }

        if self.descriptors.max_sets == 0 {
            return Err("Descriptor pool needs at least one set".to_string());
        }

        Ok(())
    }
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self::new("UI Renderer")
    }
}

impl Config for RendererConfig {
    fn validate(&self) -> Result<(), String> {
        Self::validate(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!("ui_vk_renderer_{}_{name}", std::process::id()))
    }

    #[test]
    fn test_defaults_are_valid() {
        let config = RendererConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.frames.ring_depth, 3);
        assert_eq!(config.memory.pool_size_bytes, 4 * 1024 * 1024);
        assert_eq!(config.descriptors.max_sets, 1000);
    }

    #[test]
    fn test_builder_overrides() {
        let config = RendererConfig::new("demo")
            .with_ring_depth(2)
            .with_pool_size(1024)
            .with_min_alignment(64)
            .with_present_mode(PresentModePreference::Mailbox)
            .with_validation(false);

        assert_eq!(config.frames.ring_depth, 2);
        assert_eq!(config.memory.pool_size_bytes, 1024);
        assert_eq!(config.memory.min_alignment_override, Some(64));
        assert_eq!(config.present_mode, PresentModePreference::Mailbox);
        assert!(!config.validation_enabled());
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        assert!(RendererConfig::default().with_ring_depth(0).validate().is_err());
        assert!(RendererConfig::default().with_ring_depth(9).validate().is_err());
        assert!(RendererConfig::default().with_pool_size(0).validate().is_err());
        assert!(RendererConfig::default().with_min_alignment(48).validate().is_err());
        assert!(RendererConfig::new("").validate().is_err());
    }

    #[test]
    fn test_pool_size_is_limited_to_dynamic_offset_range() {
        let largest = u64::from(u32::MAX);
        assert!(RendererConfig::default().with_pool_size(largest).validate().is_ok());
        assert!(RendererConfig::default().with_pool_size(largest + 1).validate().is_err());
    }

    #[test]
    fn test_toml_file_round_trip() {
        let path = temp_path("renderer.toml");
        let config = RendererConfig::new("toml app")
            .with_ring_depth(2)
            .with_clear_color([0.1, 0.2, 0.3, 1.0]);

        config.save_to_file(&path).expect("Should save");
        let loaded = RendererConfig::load_from_file(&path).expect("Should load");
        let _ = std::fs::remove_file(&path);

        assert_eq!(loaded, config);
    }

    #[test]
    fn test_ron_file_round_trip() {
        let path = temp_path("renderer.ron");
        let config = RendererConfig::new("ron app").with_present_mode(PresentModePreference::Immediate);

        config.save_to_file(&path).expect("Should save");
        let loaded = RendererConfig::load_from_file(&path).expect("Should load");
        let _ = std::fs::remove_file(&path);

        assert_eq!(loaded, config);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config = RendererConfig::from_str_as("application_name = \"partial\"\n", ConfigFormat::Toml)
            .expect("Should parse");
        assert_eq!(config.application_name, "partial");
        assert_eq!(config.frames, FrameConfig::default());
    }

    #[test]
    fn test_load_rejects_invalid_values() {
        let result = RendererConfig::from_str_as(
            "application_name = \"bad\"\n[frames]\nring_depth = 0\nfence_timeout_ns = 10\n",
            ConfigFormat::Toml,
        );
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }
}

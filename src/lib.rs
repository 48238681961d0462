//! PBR deferred renderer with image-based lighting
//!
//! Renders a fixed demo scene through a render graph:
//! - IBL precomputation from an HDR panorama (environment cube, irradiance,
//!   prefiltered specular, BRDF lookup table), run once at startup
//! - Shadow map from one point light
//! - Deferred shading: six-slot G-buffer, fullscreen Cook-Torrance resolve
//! - Light markers and a skybox drawn over the lit image
//! - Debug views of every G-buffer slot

pub mod backend;
pub mod frame;
pub mod ibl;
pub mod input;
pub mod pipeline;
pub mod render_graph;
pub mod renderer;
pub mod resources;
pub mod scene;
pub mod window;

pub use backend::wgpu_backend::WgpuBackend;
pub use ibl::IblConfig;
pub use renderer::{Renderer, RendererError};
pub use window::Window;

use std::path::{Path, PathBuf};

/// Shadow light projection and depth map size
#[derive(Debug, Clone, PartialEq)]
pub struct ShadowConfig {
    /// Shadow map width and height in texels
    pub resolution: u32,
    /// Half extent of the orthographic light frustum
    pub extent: f32,
    pub near: f32,
    pub far: f32,
}

impl Default for ShadowConfig {
    fn default() -> Self {
        Self {
            resolution: 1024,
            extent: 10.0,
            near: 1.0,
            far: 7.5,
        }
    }
}

/// Configuration for the renderer and its window
#[derive(Debug, Clone)]
pub struct RendererConfig {
    /// Window title
    pub title: String,
    /// Initial window width
    pub width: u32,
    /// Initial window height
    pub height: u32,
    /// Enable vsync
    pub vsync: bool,
    /// Directory holding meshes, texture sets and the HDR panorama
    pub assets: PathBuf,
    /// Equirectangular HDR image, relative to `assets` unless absolute
    pub hdr: PathBuf,
    /// Six face images drawn as the skybox instead of the captured environment
    pub skybox_dir: Option<PathBuf>,
    /// Clear colour until the debug view selects another
    pub clear_color: [f32; 4],
    pub ibl: IblConfig,
    pub shadow: ShadowConfig,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            title: "PBR Deferred".to_string(),
            width: 1280,
            height: 720,
            vsync: true,
            assets: PathBuf::from("assets"),
            hdr: PathBuf::from("hdr/newport_loft.hdr"),
            skybox_dir: None,
            clear_color: frame::DEFAULT_CLEAR_COLOR,
            ibl: IblConfig::default(),
            shadow: ShadowConfig::default(),
        }
    }
}

impl RendererConfig {
    /// Resolve a path against the asset root
    pub fn asset_path(&self, path: impl AsRef<Path>) -> PathBuf {
        self.assets.join(path)
    }
}

//! Viewer for the deferred PBR renderer
//!
//! Run with:
//!   cargo run --example viewer -- --assets path/to/assets
//!
//! Controls:
//!   WASD / arrows  - Move camera
//!   Space          - Ascend (Shift + Space descends)
//!   Left mouse     - Look around while held
//!   1              - Cycle debug view (composite, position, normal, albedo, metallic, roughness, ao)
//!   2              - Hold for a white clear colour
//!   3              - Toggle wireframe
//!   4 / 5          - Untextured / textured materials
//!   Escape         - Exit

use clap::Parser;
use pbr_deferred::{window, RendererConfig};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser, Debug)]
#[command(about = "Deferred PBR renderer with image-based lighting")]
struct Args {
    /// Asset root holding meshes, texture sets and the HDR panorama
    #[arg(long, default_value = "assets")]
    assets: PathBuf,

    /// Equirectangular HDR image, relative to the asset root unless absolute
    #[arg(long, default_value = "hdr/newport_loft.hdr")]
    hdr: PathBuf,

    /// Directory with right/left/top/bottom/front/back.jpg drawn as the skybox
    #[arg(long)]
    skybox_dir: Option<PathBuf>,

    #[arg(long, default_value_t = 1280)]
    width: u32,

    #[arg(long, default_value_t = 720)]
    height: u32,

    /// Present without waiting for vertical sync
    #[arg(long)]
    no_vsync: bool,
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let config = RendererConfig {
        width: args.width,
        height: args.height,
        vsync: !args.no_vsync,
        assets: args.assets,
        hdr: args.hdr,
        skybox_dir: args.skybox_dir,
        ..RendererConfig::default()
    };

    match window::run(config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

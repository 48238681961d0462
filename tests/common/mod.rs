//! Shared fixtures for the integration tests.
//!
//! Asset files are written into a temporary directory with the `image`
//! encoders, so no checked-in binaries are needed.

#![allow(dead_code)]

use std::path::{Path, PathBuf};

use image::codecs::hdr::HdrEncoder;
use image::{Rgb, RgbImage, Rgba, RgbaImage};
use pbr_deferred::backend::DummyBackend;
use pbr_deferred::{IblConfig, Renderer, RendererConfig};

/// IBL sizes small enough for command-recording tests.
pub fn small_ibl_config() -> IblConfig {
    IblConfig {
        env_resolution: 16,
        irradiance_resolution: 4,
        prefilter_resolution: 8,
        prefilter_mip_levels: 2,
        prefilter_sample_count: 4,
        irradiance_sample_delta: 0.5,
        brdf_resolution: 4,
    }
}

/// Renderer over a recording backend with an empty asset root.
pub fn dummy_renderer(assets: &Path) -> Renderer<DummyBackend> {
    let config = RendererConfig {
        assets: assets.to_path_buf(),
        ibl: small_ibl_config(),
        ..RendererConfig::default()
    };
    Renderer::new(DummyBackend::new(320, 200), &config).unwrap()
}

pub fn write_text(dir: &Path, name: &str, contents: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, contents).unwrap();
    path
}

/// OBJ with `faces` independent triangles in `v/vt/vn` form.
pub fn triangle_soup(faces: usize) -> String {
    let mut source = String::from("vt 0 0\nvt 1 0\nvt 0 1\nvn 0 0 1\n");
    for face in 0..faces {
        let z = face as f32;
        source.push_str(&format!("v 0 0 {z}\nv 1 0 {z}\nv 0 1 {z}\n"));
    }
    for face in 0..faces {
        let base = face * 3;
        source.push_str(&format!(
            "f {}/1/1 {}/2/1 {}/3/1\n",
            base + 1,
            base + 2,
            base + 3
        ));
    }
    source
}

/// Radiance HDR image of a single colour.
pub fn write_hdr(dir: &Path, name: &str, width: u32, height: u32, color: [f32; 3]) -> PathBuf {
    let path = dir.join(name);
    let file = std::fs::File::create(&path).unwrap();
    let pixels = vec![Rgb(color); (width * height) as usize];
    HdrEncoder::new(file)
        .encode(&pixels, width as usize, height as usize)
        .unwrap();
    path
}

pub fn write_png(dir: &Path, name: &str, width: u32, height: u32) -> PathBuf {
    let path = dir.join(name);
    RgbaImage::from_pixel(width, height, Rgba([200, 100, 50, 255]))
        .save(&path)
        .unwrap();
    path
}

/// Write the named cube faces as `size` x `size` JPEGs.
pub fn write_faces(dir: &Path, files: &[&str], size: u32) {
    for file in files {
        RgbImage::from_pixel(size, size, Rgb([90, 120, 200]))
            .save(dir.join(file))
            .unwrap();
    }
}

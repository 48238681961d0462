//! Material definitions for PBR rendering

use crate::backend::traits::GraphicsBackend;
use crate::resources::texture::{self, GpuTexture};
use glam::Vec3;
use std::path::Path;

/// The five texture maps of a textured PBR material.
#[derive(Debug, Clone)]
pub struct PbrTextures {
    pub albedo: GpuTexture,
    pub normal: GpuTexture,
    pub metallic: GpuTexture,
    pub roughness: GpuTexture,
    pub ao: GpuTexture,
}

/// File names of a texture set, relative to its directory.
#[derive(Debug, Clone, Copy)]
pub struct TextureSetFiles<'a> {
    pub albedo: &'a str,
    pub normal: &'a str,
    pub metallic: &'a str,
    pub roughness: &'a str,
    pub ao: &'a str,
}

impl PbrTextures {
    /// Load a texture set. Missing or unreadable maps are replaced by
    /// neutral 1x1 placeholders so the material still renders.
    pub fn load<B: GraphicsBackend + ?Sized>(
        backend: &mut B,
        dir: &Path,
        files: TextureSetFiles<'_>,
    ) -> Result<Self, texture::TextureError> {
        let mut load = |file: &str, fallback: [u8; 4]| {
            texture::load_2d_or_placeholder(backend, dir.join(file), fallback)
        };
        Ok(Self {
            albedo: load(files.albedo, [255, 255, 255, 255])?,
            normal: load(files.normal, [128, 128, 255, 255])?,
            metallic: load(files.metallic, [0, 0, 0, 255])?,
            roughness: load(files.roughness, [128, 128, 128, 255])?,
            ao: load(files.ao, [255, 255, 255, 255])?,
        })
    }

    /// Flat set used when no texture maps are wanted.
    pub fn neutral<B: GraphicsBackend + ?Sized>(backend: &mut B) -> Result<Self, texture::TextureError> {
        Ok(Self {
            albedo: texture::placeholder(backend, [255, 255, 255, 255], "neutral albedo")?,
            normal: texture::placeholder(backend, [128, 128, 255, 255], "neutral normal")?,
            metallic: texture::placeholder(backend, [0, 0, 0, 255], "neutral metallic")?,
            roughness: texture::placeholder(backend, [128, 128, 128, 255], "neutral roughness")?,
            ao: texture::placeholder(backend, [255, 255, 255, 255], "neutral ao")?,
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = &GpuTexture> {
        [&self.albedo, &self.normal, &self.metallic, &self.roughness, &self.ao].into_iter()
    }

    pub fn destroy<B: GraphicsBackend + ?Sized>(self, backend: &mut B) {
        for tex in [self.albedo, self.normal, self.metallic, self.roughness, self.ao] {
            tex.destroy(backend);
        }
    }
}

/// Scalar PBR parameters, used when texture maps are switched off and
/// as per-object overrides for metallic and roughness.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Material {
    pub albedo: Vec3,
    pub metallic: f32,
    pub roughness: f32,
    pub ao: f32,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            albedo: Vec3::new(0.5, 0.0, 0.0),
            metallic: 0.0,
            roughness: 0.5,
            ao: 1.0,
        }
    }
}

impl Material {
    pub fn with_albedo(mut self, albedo: Vec3) -> Self {
        self.albedo = albedo;
        self
    }

    pub fn with_metallic(mut self, metallic: f32) -> Self {
        self.metallic = metallic;
        self
    }

    pub fn with_roughness(mut self, roughness: f32) -> Self {
        self.roughness = roughness;
        self
    }

    /// Sphere at `(row, col)` of an n x n calibration grid: metallic grows
    /// with the row, roughness with the column.
    pub fn grid_cell(row: u32, col: u32, n: u32) -> Self {
        Self::default()
            .with_metallic(row as f32 / n as f32)
            .with_roughness((col as f32 / n as f32).clamp(0.05, 1.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::DummyBackend;

    #[test]
    fn test_grid_cell_ranges() {
        let first = Material::grid_cell(0, 0, 7);
        assert_eq!(first.metallic, 0.0);
        assert_eq!(first.roughness, 0.05);

        let last = Material::grid_cell(6, 6, 7);
        assert!((last.metallic - 6.0 / 7.0).abs() < 1e-6);
        assert!((last.roughness - 6.0 / 7.0).abs() < 1e-6);
    }

    #[test]
    fn test_missing_texture_set_falls_back() {
        let mut backend = DummyBackend::new(64, 64);
        let dir = tempfile::tempdir().unwrap();
        let files = TextureSetFiles {
            albedo: "a.png",
            normal: "n.png",
            metallic: "m.png",
            roughness: "r.png",
            ao: "ao.png",
        };
        let set = PbrTextures::load(&mut backend, dir.path(), files).unwrap();
        assert!(set.iter().all(|t| t.width == 1 && t.height == 1));
        assert_eq!(backend.live_texture_count(), 5);
        set.destroy(&mut backend);
        assert_eq!(backend.live_texture_count(), 0);
    }
}

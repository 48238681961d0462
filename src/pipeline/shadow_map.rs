//! Depth-only shadow map rendered from the shadow-casting light

use crate::backend::traits::*;
use crate::backend::types::*;
use crate::resources::texture::{allocate_render_target, GpuTexture};

pub const SHADOW_FORMAT: TextureFormat = TextureFormat::Depth32Float;

/// Render graph name of the shadow map
pub const SHADOW_MAP: &str = "shadow_map";

#[derive(Debug)]
pub struct ShadowMap {
    pub texture: GpuTexture,
    pub resolution: u32,
    /// Lookups outside the map read as depth 1.0 in hardware
    pub border_clamped: bool,
}

impl ShadowMap {
    /// Square depth map at `resolution`, independent of the window size.
    pub fn new<B: GraphicsBackend + ?Sized>(backend: &mut B, resolution: u32) -> BackendResult<Self> {
        let border_clamped = backend.features().clamp_to_border;
        let mut sampler = SamplerDescriptor {
            label: Some("Shadow Sampler".into()),
            ..SamplerDescriptor::default().with_filter(FilterMode::Nearest)
        };
        if border_clamped {
            sampler = sampler.with_address_mode(AddressMode::ClampToBorder);
            sampler.border_color = Some(BorderColor::OpaqueWhite);
        } else {
            log::warn!("Clamp-to-border unsupported, shadow lookups outside the map are treated as lit in the shader");
        }

        let texture = allocate_render_target(
            backend,
            SHADOW_MAP,
            resolution,
            resolution,
            SHADOW_FORMAT,
            TextureUsage::empty(),
            &sampler,
        )
        .map_err(|e| {
            log::error!("Shadow map incomplete: {}", e);
            e
        })?;

        log::info!("Created shadow map {}x{}", resolution, resolution);
        Ok(Self {
            texture,
            resolution,
            border_clamped,
        })
    }

    pub fn destroy<B: GraphicsBackend + ?Sized>(self, backend: &mut B) {
        self.texture.destroy(backend);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::DummyBackend;

    #[test]
    fn test_border_clamped_when_supported() {
        let mut backend = DummyBackend::new(800, 600);
        let shadow = ShadowMap::new(&mut backend, 1024).unwrap();
        assert!(shadow.border_clamped);

        let texture = backend.texture(shadow.texture.handle).unwrap();
        assert_eq!((texture.desc.width, texture.desc.height), (1024, 1024));
        assert_eq!(texture.desc.format, SHADOW_FORMAT);

        let sampler = backend.sampler(shadow.texture.sampler).unwrap();
        assert_eq!(sampler.address_mode_u, AddressMode::ClampToBorder);
        assert_eq!(sampler.border_color, Some(BorderColor::OpaqueWhite));
        assert_eq!(sampler.min_filter, FilterMode::Nearest);
    }

    #[test]
    fn test_falls_back_to_edge_clamp() {
        let mut backend = DummyBackend::new(800, 600).with_features(BackendFeatures {
            clamp_to_border: false,
            polygon_mode_line: true,
        });
        let shadow = ShadowMap::new(&mut backend, 512).unwrap();
        assert!(!shadow.border_clamped);
        let sampler = backend.sampler(shadow.texture.sampler).unwrap();
        assert_eq!(sampler.address_mode_u, AddressMode::ClampToEdge);
        assert_eq!(sampler.border_color, None);
    }
}

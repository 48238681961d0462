//! Geometry buffer: six data attachments plus depth

use crate::backend::traits::*;
use crate::backend::types::*;
use crate::resources::texture::{allocate_render_target, GpuTexture};

/// Format of every G-buffer colour attachment
pub const GBUFFER_FORMAT: TextureFormat = TextureFormat::Rgba16Float;
pub const GBUFFER_DEPTH_FORMAT: TextureFormat = TextureFormat::Depth32Float;

/// Colour attachment slots, in attachment order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GBufferSlot {
    Position,
    Normal,
    Albedo,
    Metallic,
    Roughness,
    Ao,
}

impl GBufferSlot {
    pub const ALL: [GBufferSlot; 6] = [
        GBufferSlot::Position,
        GBufferSlot::Normal,
        GBufferSlot::Albedo,
        GBufferSlot::Metallic,
        GBufferSlot::Roughness,
        GBufferSlot::Ao,
    ];

    /// Attachment location written by the geometry shader
    pub fn index(self) -> usize {
        self as usize
    }

    /// Render graph resource name
    pub fn resource_name(self) -> &'static str {
        match self {
            GBufferSlot::Position => "gbuffer_position",
            GBufferSlot::Normal => "gbuffer_normal",
            GBufferSlot::Albedo => "gbuffer_albedo",
            GBufferSlot::Metallic => "gbuffer_metallic",
            GBufferSlot::Roughness => "gbuffer_roughness",
            GBufferSlot::Ao => "gbuffer_ao",
        }
    }
}

/// Render graph name of the G-buffer depth attachment
pub const GBUFFER_DEPTH: &str = "gbuffer_depth";

fn data_sampler() -> SamplerDescriptor {
    SamplerDescriptor {
        label: Some("G-Buffer Sampler".into()),
        ..SamplerDescriptor::default().with_filter(FilterMode::Nearest)
    }
}

/// G-buffer at a fixed size. Window resizes do not recreate it.
#[derive(Debug)]
pub struct GBuffer {
    slots: Vec<GpuTexture>,
    depth: GpuTexture,
    width: u32,
    height: u32,
}

impl GBuffer {
    pub fn new<B: GraphicsBackend + ?Sized>(backend: &mut B, width: u32, height: u32) -> BackendResult<Self> {
        let sampler = data_sampler();
        let mut slots: Vec<GpuTexture> = Vec::with_capacity(GBufferSlot::ALL.len());

        for slot in GBufferSlot::ALL {
            match allocate_render_target(
                backend,
                slot.resource_name(),
                width,
                height,
                GBUFFER_FORMAT,
                TextureUsage::empty(),
                &sampler,
            ) {
                Ok(texture) => slots.push(texture),
                Err(e) => {
                    log::error!("G-buffer incomplete: {} could not be created: {}", slot.resource_name(), e);
                    for texture in slots {
                        texture.destroy(backend);
                    }
                    return Err(e);
                }
            }
        }

        // copy source for the depth carry-over into the main target
        let depth = match allocate_render_target(
            backend,
            GBUFFER_DEPTH,
            width,
            height,
            GBUFFER_DEPTH_FORMAT,
            TextureUsage::COPY_SRC,
            &sampler,
        ) {
            Ok(depth) => depth,
            Err(e) => {
                log::error!("G-buffer incomplete: depth could not be created: {}", e);
                for texture in slots {
                    texture.destroy(backend);
                }
                return Err(e);
            }
        };

        log::info!("Created G-buffer {}x{} with {} attachments", width, height, slots.len());
        Ok(Self {
            slots,
            depth,
            width,
            height,
        })
    }

    pub fn attachment_count(&self) -> usize {
        self.slots.len()
    }

    /// Colour attachment views in slot order
    pub fn color_attachments(&self) -> Vec<TextureViewHandle> {
        self.slots.iter().map(|t| t.view).collect()
    }

    pub fn slot(&self, slot: GBufferSlot) -> &GpuTexture {
        &self.slots[slot.index()]
    }

    pub fn depth(&self) -> &GpuTexture {
        &self.depth
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn destroy<B: GraphicsBackend + ?Sized>(self, backend: &mut B) {
        for texture in self.slots {
            texture.destroy(backend);
        }
        self.depth.destroy(backend);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::DummyBackend;

    #[test]
    fn test_six_attachments_in_slot_order() {
        let mut backend = DummyBackend::new(320, 240);
        let gbuffer = GBuffer::new(&mut backend, 320, 240).unwrap();
        assert_eq!(gbuffer.attachment_count(), 6);

        let views = gbuffer.color_attachments();
        assert_eq!(views.len(), 6);
        for (slot, view) in GBufferSlot::ALL.iter().zip(&views) {
            assert_eq!(gbuffer.slot(*slot).view, *view);
            let texture = backend.texture(gbuffer.slot(*slot).handle).unwrap();
            assert_eq!(texture.desc.format, GBUFFER_FORMAT);
            assert_eq!(texture.desc.label.as_deref(), Some(slot.resource_name()));
        }
        // still six when asked again
        assert_eq!(gbuffer.attachment_count(), 6);

        let sampler = backend.sampler(gbuffer.slot(GBufferSlot::Albedo).sampler).unwrap();
        assert_eq!(sampler.mag_filter, FilterMode::Nearest);
        assert_eq!(sampler.min_filter, FilterMode::Nearest);

        let depth = backend.texture(gbuffer.depth().handle).unwrap();
        assert_eq!(depth.desc.format, GBUFFER_DEPTH_FORMAT);
        assert!(depth.desc.usage.contains(TextureUsage::COPY_SRC));
    }

    #[test]
    fn test_failed_allocation_releases_created_slots() {
        let mut backend = DummyBackend::new(1, 1);
        assert!(GBuffer::new(&mut backend, 0, 240).is_err());
        assert_eq!(backend.live_texture_count(), 0);
    }

    #[test]
    fn test_destroy_releases_everything() {
        let mut backend = DummyBackend::new(64, 64);
        let gbuffer = GBuffer::new(&mut backend, 64, 64).unwrap();
        assert_eq!(backend.live_texture_count(), 7);
        gbuffer.destroy(&mut backend);
        assert_eq!(backend.live_texture_count(), 0);
        assert_eq!(backend.live_texture_view_count(), 0);
    }
}

//! Texture loading and cube-map allocation

use crate::backend::traits::*;
use crate::backend::types::*;
use half::f16;
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, ImageFormat, RgbaImage};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Face file names in +X, -X, +Y, -Y, +Z, -Z order
pub const CUBEMAP_FACE_FILES: [&str; 6] = [
    "right.jpg",
    "left.jpg",
    "top.jpg",
    "bottom.jpg",
    "front.jpg",
    "back.jpg",
];

/// Texture loading error type
#[derive(Error, Debug)]
pub enum TextureError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to decode {path}: {source}")]
    Decode {
        path: PathBuf,
        source: image::ImageError,
    },
    #[error("{path} is not a Radiance HDR image (detected {found})")]
    NotHdr { path: PathBuf, found: String },
    #[error("Cube map face {face} missing at {path}")]
    MissingFace { face: &'static str, path: PathBuf },
    #[error("Cube map face {path} is {found:?}, expected {expected:?}")]
    FaceSizeMismatch {
        path: PathBuf,
        expected: (u32, u32),
        found: (u32, u32),
    },
    #[error(transparent)]
    Backend(#[from] BackendError),
}

/// Decoded pixels with a full or single-level mip chain
pub struct TextureData {
    pub width: u32,
    pub height: u32,
    pub format: TextureFormat,
    /// Tightly packed pixels per mip, largest first
    pub mips: Vec<Vec<u8>>,
    pub name: String,
}

impl TextureData {
    /// Decode an 8-bit image, flipped so row 0 is the bottom (UV origin of the meshes)
    pub fn decode_2d<P: AsRef<Path>>(path: P) -> Result<Self, TextureError> {
        let path = path.as_ref();
        let img = open_image(path)?.flipv();
        Ok(Self::from_rgba8(img.to_rgba8(), &display_name(path), true))
    }

    /// Decode a Radiance HDR panorama into half floats
    pub fn decode_hdr<P: AsRef<Path>>(path: P) -> Result<Self, TextureError> {
        let path = path.as_ref();
        let reader = image::io::Reader::open(path)
            .map_err(|source| TextureError::Io {
                path: path.to_path_buf(),
                source,
            })?
            .with_guessed_format()
            .map_err(|source| TextureError::Io {
                path: path.to_path_buf(),
                source,
            })?;

        if reader.format() != Some(ImageFormat::Hdr) {
            return Err(TextureError::NotHdr {
                path: path.to_path_buf(),
                found: reader
                    .format()
                    .map(|f| format!("{:?}", f))
                    .unwrap_or_else(|| "unknown".into()),
            });
        }

        let img = reader.decode().map_err(|source| TextureError::Decode {
            path: path.to_path_buf(),
            source,
        })?;
        let (width, height) = img.dimensions();
        let texels: Vec<f16> = img
            .into_rgba32f()
            .into_raw()
            .into_iter()
            .map(f16::from_f32)
            .collect();

        Ok(Self {
            width,
            height,
            format: TextureFormat::Rgba16Float,
            mips: vec![bytemuck::cast_slice(&texels).to_vec()],
            name: display_name(path),
        })
    }

    fn from_rgba8(img: RgbaImage, name: &str, generate_mips: bool) -> Self {
        let (width, height) = img.dimensions();
        let mut mips = Vec::new();
        let levels = if generate_mips { mip_count(width, height) } else { 1 };
        let mut level = img;
        for mip in 0..levels {
            if mip > 0 {
                let w = (width >> mip).max(1);
                let h = (height >> mip).max(1);
                level = image::imageops::resize(&level, w, h, FilterType::Triangle);
            }
            mips.push(level.as_raw().clone());
        }

        Self {
            width,
            height,
            format: TextureFormat::Rgba8Unorm,
            mips,
            name: name.to_string(),
        }
    }

    /// Create a solid color texture
    pub fn solid_color(color: [u8; 4], name: &str) -> Self {
        Self {
            width: 1,
            height: 1,
            format: TextureFormat::Rgba8Unorm,
            mips: vec![color.to_vec()],
            name: name.to_string(),
        }
    }

    pub fn mip_levels(&self) -> u32 {
        self.mips.len() as u32
    }
}

/// Number of levels in a full mip chain
pub fn mip_count(width: u32, height: u32) -> u32 {
    32 - width.max(height).max(1).leading_zeros()
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("unknown")
        .to_string()
}

fn open_image(path: &Path) -> Result<DynamicImage, TextureError> {
    if !path.exists() {
        return Err(TextureError::Io {
            path: path.to_path_buf(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "file not found"),
        });
    }
    image::open(path).map_err(|source| TextureError::Decode {
        path: path.to_path_buf(),
        source,
    })
}

/// GPU texture with its default view and sampler
#[derive(Debug, Clone)]
pub struct GpuTexture {
    pub handle: TextureHandle,
    /// 2D view for 2D textures, cube view for cube maps
    pub view: TextureViewHandle,
    pub sampler: SamplerHandle,
    pub kind: TextureKind,
    pub width: u32,
    pub height: u32,
    pub mip_levels: u32,
    pub format: TextureFormat,
    pub name: String,
}

impl GpuTexture {
    /// Create and upload a 2D texture
    pub fn create<B: GraphicsBackend + ?Sized>(
        backend: &mut B,
        data: &TextureData,
        sampler: &SamplerDescriptor,
    ) -> BackendResult<Self> {
        let handle = backend.create_texture(&TextureDescriptor {
            label: Some(data.name.clone()),
            width: data.width,
            height: data.height,
            kind: TextureKind::D2,
            mip_levels: data.mip_levels(),
            format: data.format,
            usage: TextureUsage::TEXTURE_BINDING | TextureUsage::COPY_DST,
        })?;

        let (view, sampler) = run_guarded(backend, handle, |backend| {
            create_view_and_sampler(backend, handle, &TextureViewDescriptor::d2(), sampler)
        })?;

        for (mip, pixels) in data.mips.iter().enumerate() {
            let mip = mip as u32;
            let width = (data.width >> mip).max(1);
            let height = (data.height >> mip).max(1);
            backend.write_texture(
                handle,
                &TextureRegion {
                    mip_level: mip,
                    array_layer: 0,
                    width,
                    height,
                    bytes_per_row: width * data.format.bytes_per_pixel(),
                },
                pixels,
            );
        }

        Ok(Self {
            handle,
            view,
            sampler,
            kind: TextureKind::D2,
            width: data.width,
            height: data.height,
            mip_levels: data.mip_levels(),
            format: data.format,
            name: data.name.clone(),
        })
    }

    /// Release the texture and its view
    pub fn destroy<B: GraphicsBackend + ?Sized>(self, backend: &mut B) {
        backend.destroy_texture_view(self.view);
        backend.destroy_texture(self.handle);
    }
}

/// Run `f` on a freshly created texture, destroying the texture if `f` fails
fn run_guarded<B, T>(
    backend: &mut B,
    handle: TextureHandle,
    f: impl FnOnce(&mut B) -> BackendResult<T>,
) -> BackendResult<T>
where
    B: GraphicsBackend + ?Sized,
{
    let result = f(backend);
    if result.is_err() {
        backend.destroy_texture(handle);
    }
    result
}

fn create_view_and_sampler<B: GraphicsBackend + ?Sized>(
    backend: &mut B,
    handle: TextureHandle,
    view: &TextureViewDescriptor,
    sampler: &SamplerDescriptor,
) -> BackendResult<(TextureViewHandle, SamplerHandle)> {
    let view = backend.create_texture_view(handle, view)?;
    match backend.create_sampler(sampler) {
        Ok(sampler) => Ok((view, sampler)),
        Err(e) => {
            backend.destroy_texture_view(view);
            Err(e)
        }
    }
}

/// Trilinear, repeating sampler used for material textures
pub fn material_sampler() -> SamplerDescriptor {
    SamplerDescriptor {
        label: Some("Material Sampler".into()),
        ..SamplerDescriptor::default()
            .with_address_mode(AddressMode::Repeat)
            .with_filter(FilterMode::Linear)
    }
}

/// Load an 8-bit image as a mipmapped 2D texture
pub fn load_2d<B, P>(backend: &mut B, path: P) -> Result<GpuTexture, TextureError>
where
    B: GraphicsBackend + ?Sized,
    P: AsRef<Path>,
{
    let data = TextureData::decode_2d(path.as_ref())?;
    let texture = GpuTexture::create(backend, &data, &material_sampler())?;
    log::info!(
        "Loaded texture {} ({}x{}, {} mips)",
        path.as_ref().display(),
        texture.width,
        texture.height,
        texture.mip_levels
    );
    Ok(texture)
}

/// Load a Radiance HDR panorama as a half-float texture without mips
pub fn load_hdr<B, P>(backend: &mut B, path: P) -> Result<GpuTexture, TextureError>
where
    B: GraphicsBackend + ?Sized,
    P: AsRef<Path>,
{
    let data = TextureData::decode_hdr(path.as_ref())?;
    let sampler = SamplerDescriptor {
        label: Some("HDR Sampler".into()),
        mipmap_filter: FilterMode::Nearest,
        ..SamplerDescriptor::default()
    };
    let texture = GpuTexture::create(backend, &data, &sampler)?;
    log::info!(
        "Loaded HDR {} ({}x{})",
        path.as_ref().display(),
        texture.width,
        texture.height
    );
    Ok(texture)
}

/// Load six face images from `dir` into a cube map
///
/// Every face is decoded before any GPU storage is created, so a missing or
/// unreadable face leaves nothing allocated.
pub fn load_cubemap<B, P>(backend: &mut B, dir: P) -> Result<GpuTexture, TextureError>
where
    B: GraphicsBackend + ?Sized,
    P: AsRef<Path>,
{
    let dir = dir.as_ref();
    let mut faces = Vec::with_capacity(6);
    for file in CUBEMAP_FACE_FILES {
        let path = dir.join(file);
        if !path.is_file() {
            return Err(TextureError::MissingFace { face: file, path });
        }
        let img = open_image(&path)?.to_rgba8();
        if let Some(first) = faces.first().map(|f: &RgbaImage| f.dimensions()) {
            if img.dimensions() != first {
                return Err(TextureError::FaceSizeMismatch {
                    path,
                    expected: first,
                    found: img.dimensions(),
                });
            }
        }
        faces.push(img);
    }

    let (width, height) = faces[0].dimensions();
    let format = TextureFormat::Rgba8UnormSrgb;
    let handle = backend.create_texture(&TextureDescriptor {
        label: Some(display_name(dir)),
        width,
        height,
        kind: TextureKind::Cube,
        mip_levels: 1,
        format,
        usage: TextureUsage::TEXTURE_BINDING | TextureUsage::COPY_DST,
    })?;

    let (view, sampler) = run_guarded(backend, handle, |backend| {
        create_view_and_sampler(backend, handle, &TextureViewDescriptor::cube(), &cube_sampler(1))
    })?;

    for (layer, face) in faces.iter().enumerate() {
        backend.write_texture(
            handle,
            &TextureRegion {
                array_layer: layer as u32,
                ..TextureRegion::full(width, height, format)
            },
            face.as_raw(),
        );
    }
    log::info!("Loaded cube map {} ({}x{})", dir.display(), width, height);

    Ok(GpuTexture {
        handle,
        view,
        sampler,
        kind: TextureKind::Cube,
        width,
        height,
        mip_levels: 1,
        format,
        name: display_name(dir),
    })
}

fn cube_sampler(mip_levels: u32) -> SamplerDescriptor {
    SamplerDescriptor {
        label: Some("Cube Sampler".into()),
        mipmap_filter: if mip_levels > 1 {
            FilterMode::Linear
        } else {
            FilterMode::Nearest
        },
        ..SamplerDescriptor::default()
    }
}

/// Reserve cube storage for render-to-texture population
pub fn allocate_empty_cubemap<B: GraphicsBackend + ?Sized>(
    backend: &mut B,
    label: &str,
    resolution: u32,
    mip_levels: u32,
    format: TextureFormat,
) -> BackendResult<GpuTexture> {
    let handle = backend.create_texture(&TextureDescriptor {
        label: Some(label.to_string()),
        width: resolution,
        height: resolution,
        kind: TextureKind::Cube,
        mip_levels,
        format,
        usage: TextureUsage::TEXTURE_BINDING | TextureUsage::RENDER_ATTACHMENT,
    })?;

    let (view, sampler) = run_guarded(backend, handle, |backend| {
        create_view_and_sampler(
            backend,
            handle,
            &TextureViewDescriptor::cube(),
            &cube_sampler(mip_levels),
        )
    })?;
    log::debug!(
        "Allocated cube map {} ({}x{}, {} mips, {:?})",
        label,
        resolution,
        resolution,
        mip_levels,
        format
    );

    Ok(GpuTexture {
        handle,
        view,
        sampler,
        kind: TextureKind::Cube,
        width: resolution,
        height: resolution,
        mip_levels,
        format,
        name: label.to_string(),
    })
}

/// Single-mip 2D texture that passes render into and later passes sample.
pub fn allocate_render_target<B: GraphicsBackend + ?Sized>(
    backend: &mut B,
    label: &str,
    width: u32,
    height: u32,
    format: TextureFormat,
    usage: TextureUsage,
    sampler: &SamplerDescriptor,
) -> BackendResult<GpuTexture> {
    let handle = backend.create_texture(&TextureDescriptor {
        label: Some(label.to_string()),
        width,
        height,
        kind: TextureKind::D2,
        mip_levels: 1,
        format,
        usage: usage | TextureUsage::RENDER_ATTACHMENT | TextureUsage::TEXTURE_BINDING,
    })?;

    let (view, sampler) = run_guarded(backend, handle, |backend| {
        create_view_and_sampler(backend, handle, &TextureViewDescriptor::d2(), sampler)
    })?;
    log::debug!("Allocated render target {} ({}x{}, {:?})", label, width, height, format);

    Ok(GpuTexture {
        handle,
        view,
        sampler,
        kind: TextureKind::D2,
        width,
        height,
        mip_levels: 1,
        format,
        name: label.to_string(),
    })
}

/// 1x1 texture standing in for an asset that failed to load
pub fn placeholder<B: GraphicsBackend + ?Sized>(
    backend: &mut B,
    color: [u8; 4],
    name: &str,
) -> BackendResult<GpuTexture> {
    GpuTexture::create(backend, &TextureData::solid_color(color, name), &material_sampler())
}

/// Load a 2D texture, logging failures and substituting a placeholder
pub fn load_2d_or_placeholder<B, P>(
    backend: &mut B,
    path: P,
    fallback: [u8; 4],
) -> BackendResult<GpuTexture>
where
    B: GraphicsBackend + ?Sized,
    P: AsRef<Path>,
{
    match load_2d(backend, path.as_ref()) {
        Ok(texture) => Ok(texture),
        Err(TextureError::Backend(e)) => Err(e),
        Err(e) => {
            log::error!("Texture could not be loaded: {}", e);
            placeholder(backend, fallback, &display_name(path.as_ref()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::DummyBackend;

    #[test]
    fn test_mip_count() {
        assert_eq!(mip_count(1, 1), 1);
        assert_eq!(mip_count(512, 512), 10);
        assert_eq!(mip_count(1024, 256), 11);
        assert_eq!(mip_count(3, 5), 3);
    }

    #[test]
    fn test_mip_chain_sizes() {
        let data = TextureData::from_rgba8(RgbaImage::new(8, 2), "chain", true);
        let sizes: Vec<usize> = data.mips.iter().map(|m| m.len()).collect();
        assert_eq!(sizes, vec![8 * 2 * 4, 4 * 4, 2 * 4, 4]);
    }

    #[test]
    fn test_empty_cubemap_storage() {
        let mut backend = DummyBackend::new(64, 64);
        let cube =
            allocate_empty_cubemap(&mut backend, "probe", 128, 5, TextureFormat::Rgba16Float)
                .unwrap();

        let desc = &backend.texture(cube.handle).unwrap().desc;
        assert_eq!(desc.kind, TextureKind::Cube);
        assert_eq!(desc.mip_levels, 5);
        assert!(desc.usage.contains(TextureUsage::RENDER_ATTACHMENT));
        let sampler = backend.sampler(cube.sampler).unwrap();
        assert_eq!(sampler.mipmap_filter, FilterMode::Linear);
    }

    #[test]
    fn test_placeholder_is_single_texel() {
        let mut backend = DummyBackend::new(64, 64);
        let tex = placeholder(&mut backend, [0, 0, 0, 255], "missing").unwrap();
        assert_eq!((tex.width, tex.height, tex.mip_levels), (1, 1, 1));
    }
}

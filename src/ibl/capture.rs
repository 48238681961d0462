//! Offscreen capture target for rendering into cube map faces

use crate::backend::traits::*;
use crate::backend::types::*;
use crate::resources::GpuTexture;
use glam::{Mat4, Vec3};

/// One face of a cube map, in layer order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CubeFace {
    PositiveX,
    NegativeX,
    PositiveY,
    NegativeY,
    PositiveZ,
    NegativeZ,
}

impl CubeFace {
    pub const ALL: [CubeFace; 6] = [
        CubeFace::PositiveX,
        CubeFace::NegativeX,
        CubeFace::PositiveY,
        CubeFace::NegativeY,
        CubeFace::PositiveZ,
        CubeFace::NegativeZ,
    ];

    /// Array layer of this face
    pub fn layer(self) -> u32 {
        self as u32
    }

    /// Axis the capture camera looks along
    pub fn direction(self) -> Vec3 {
        match self {
            CubeFace::PositiveX => Vec3::X,
            CubeFace::NegativeX => Vec3::NEG_X,
            CubeFace::PositiveY => Vec3::Y,
            CubeFace::NegativeY => Vec3::NEG_Y,
            CubeFace::PositiveZ => Vec3::Z,
            CubeFace::NegativeZ => Vec3::NEG_Z,
        }
    }

    /// Camera up vector; never parallel to `direction`
    pub fn up(self) -> Vec3 {
        match self {
            CubeFace::PositiveY => Vec3::Z,
            CubeFace::NegativeY => Vec3::NEG_Z,
            _ => Vec3::NEG_Y,
        }
    }

    /// View matrix from the cube center towards this face
    pub fn view(self) -> Mat4 {
        Mat4::look_at_rh(Vec3::ZERO, self.direction(), self.up())
    }

    pub fn label(self) -> &'static str {
        match self {
            CubeFace::PositiveX => "+X",
            CubeFace::NegativeX => "-X",
            CubeFace::PositiveY => "+Y",
            CubeFace::NegativeY => "-Y",
            CubeFace::PositiveZ => "+Z",
            CubeFace::NegativeZ => "-Z",
        }
    }
}

/// 90 degree capture projection shared by all faces.
///
/// Y is flipped so that row 0 of a rendered face is the top row in cube map
/// addressing.
pub fn capture_projection() -> Mat4 {
    Mat4::from_scale(Vec3::new(1.0, -1.0, 1.0))
        * Mat4::perspective_rh(90.0_f32.to_radians(), 1.0, 0.1, 10.0)
}

/// A depth attachment plus the currently bound cube face view.
///
/// Must be handed back with [`CaptureTarget::release`]; prefer
/// [`CaptureTarget::scoped`] which does it on every exit path.
#[derive(Debug)]
pub struct CaptureTarget {
    depth_texture: TextureHandle,
    depth_view: TextureViewHandle,
    depth_format: TextureFormat,
    color_view: Option<TextureViewHandle>,
    width: u32,
    height: u32,
    released: bool,
}

impl CaptureTarget {
    pub fn acquire<B: GraphicsBackend + ?Sized>(
        backend: &mut B,
        width: u32,
        height: u32,
        depth_format: TextureFormat,
    ) -> BackendResult<Self> {
        let (depth_texture, depth_view) = create_depth(backend, width, height, depth_format)?;
        log::debug!("Acquired capture target {}x{}", width, height);
        Ok(Self {
            depth_texture,
            depth_view,
            depth_format,
            color_view: None,
            width,
            height,
            released: false,
        })
    }

    /// Acquire a target, run `f`, and release the target whatever `f` returns.
    pub fn scoped<B, T, E>(
        backend: &mut B,
        width: u32,
        height: u32,
        depth_format: TextureFormat,
        f: impl FnOnce(&mut CaptureTarget, &mut B) -> Result<T, E>,
    ) -> Result<T, E>
    where
        B: GraphicsBackend + ?Sized,
        E: From<BackendError>,
    {
        let mut target = Self::acquire(backend, width, height, depth_format)?;
        let result = f(&mut target, backend);
        target.release(backend);
        result
    }

    /// Attach one face and mip of `cubemap` as the color target.
    ///
    /// The previous face view, if any, is destroyed.
    pub fn bind_face<B: GraphicsBackend + ?Sized>(
        &mut self,
        backend: &mut B,
        cubemap: &GpuTexture,
        face: CubeFace,
        mip_level: u32,
    ) -> BackendResult<TextureViewHandle> {
        let view = backend.create_texture_view(
            cubemap.handle,
            &TextureViewDescriptor::layer_mip(face.layer(), mip_level),
        )?;
        if let Some(old) = self.color_view.replace(view) {
            backend.destroy_texture_view(old);
        }
        Ok(view)
    }

    /// Attach a whole 2D texture (mip 0) as the color target.
    pub fn bind_texture<B: GraphicsBackend + ?Sized>(
        &mut self,
        backend: &mut B,
        texture: &GpuTexture,
    ) -> BackendResult<TextureViewHandle> {
        let view = backend.create_texture_view(texture.handle, &TextureViewDescriptor::layer_mip(0, 0))?;
        if let Some(old) = self.color_view.replace(view) {
            backend.destroy_texture_view(old);
        }
        Ok(view)
    }

    /// Recreate the depth attachment at a new size. Callers must set the
    /// viewport from [`CaptureTarget::viewport`] before drawing.
    pub fn resize<B: GraphicsBackend + ?Sized>(
        &mut self,
        backend: &mut B,
        width: u32,
        height: u32,
    ) -> BackendResult<()> {
        if (width, height) == (self.width, self.height) {
            return Ok(());
        }
        let (texture, view) = create_depth(backend, width, height, self.depth_format)?;
        backend.destroy_texture_view(self.depth_view);
        backend.destroy_texture(self.depth_texture);
        self.depth_texture = texture;
        self.depth_view = view;
        self.width = width;
        self.height = height;
        Ok(())
    }

    pub fn depth_view(&self) -> TextureViewHandle {
        self.depth_view
    }

    pub fn color_view(&self) -> Option<TextureViewHandle> {
        self.color_view
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Viewport `(x, y, width, height)` matching the depth attachment
    pub fn viewport(&self) -> (f32, f32, f32, f32) {
        (0.0, 0.0, self.width as f32, self.height as f32)
    }

    /// Render pass clearing `color` and the depth attachment.
    pub fn clear_pass(&self, label: &str, color: TextureViewHandle) -> RenderPassDescriptor {
        RenderPassDescriptor {
            label: Some(label.to_string()),
            color_attachments: vec![ColorAttachment {
                view: color,
                resolve_target: None,
                load_op: LoadOp::Clear([0.0, 0.0, 0.0, 1.0]),
                store_op: StoreOp::Store,
            }],
            depth_stencil_attachment: Some(DepthStencilAttachment {
                view: self.depth_view,
                depth_load_op: LoadOp::Clear([1.0, 0.0, 0.0, 0.0]),
                depth_store_op: StoreOp::Discard,
                depth_clear_value: 1.0,
            }),
        }
    }

    /// Destroy every GPU object owned by the target.
    pub fn release<B: GraphicsBackend + ?Sized>(mut self, backend: &mut B) {
        if let Some(view) = self.color_view.take() {
            backend.destroy_texture_view(view);
        }
        backend.destroy_texture_view(self.depth_view);
        backend.destroy_texture(self.depth_texture);
        self.released = true;
        log::debug!("Released capture target {}x{}", self.width, self.height);
    }
}

impl Drop for CaptureTarget {
    fn drop(&mut self) {
        if !self.released {
            log::warn!(
                "Capture target {}x{} dropped without release; GPU objects leak",
                self.width,
                self.height
            );
        }
    }
}

fn create_depth<B: GraphicsBackend + ?Sized>(
    backend: &mut B,
    width: u32,
    height: u32,
    format: TextureFormat,
) -> BackendResult<(TextureHandle, TextureViewHandle)> {
    let texture = backend.create_texture(&TextureDescriptor {
        label: Some("Capture Depth".into()),
        width,
        height,
        kind: TextureKind::D2,
        mip_levels: 1,
        format,
        usage: TextureUsage::RENDER_ATTACHMENT,
    })?;
    match backend.create_texture_view(texture, &TextureViewDescriptor::d2()) {
        Ok(view) => Ok((texture, view)),
        Err(e) => {
            backend.destroy_texture(texture);
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::DummyBackend;
    use crate::ibl::sampling::cubemap_direction;
    use crate::resources::allocate_empty_cubemap;

    #[test]
    fn test_face_bases_are_not_degenerate() {
        for face in CubeFace::ALL {
            let d = face.direction().dot(face.up());
            assert!(d.abs() < 1.0 - 1e-6, "{:?}", face);
        }
    }

    #[test]
    fn test_capture_matches_cube_addressing() {
        let proj = capture_projection();
        for face in CubeFace::ALL {
            let view_proj = proj * face.view();
            for (u, v) in [(0.5, 0.25), (-0.75, 0.5), (0.1, -0.9)] {
                let dir = cubemap_direction(face, u, v);
                let clip = view_proj * dir.extend(1.0);
                let ndc = clip.truncate() / clip.w;
                assert!((ndc.x - u).abs() < 1e-4, "{:?} x", face);
                assert!((ndc.y + v).abs() < 1e-4, "{:?} y", face);
            }
        }
    }

    #[test]
    fn test_scoped_releases_on_error() {
        let mut backend = DummyBackend::new(64, 64);
        let cube = allocate_empty_cubemap(&mut backend, "cube", 16, 1, TextureFormat::Rgba16Float).unwrap();
        let before = (backend.live_texture_count(), backend.live_texture_view_count());

        let result: Result<(), BackendError> =
            CaptureTarget::scoped(&mut backend, 16, 16, TextureFormat::Depth32Float, |target, backend| {
                target.bind_face(backend, &cube, CubeFace::NegativeZ, 0)?;
                Err(BackendError::OutOfMemory)
            });

        assert!(result.is_err());
        assert_eq!(
            (backend.live_texture_count(), backend.live_texture_view_count()),
            before
        );
    }

    #[test]
    fn test_resize_replaces_depth() {
        let mut backend = DummyBackend::new(64, 64);
        let mut target = CaptureTarget::acquire(&mut backend, 128, 128, TextureFormat::Depth32Float).unwrap();
        let old = target.depth_view();
        target.resize(&mut backend, 64, 64).unwrap();
        assert_ne!(target.depth_view(), old);
        assert_eq!(target.viewport(), (0.0, 0.0, 64.0, 64.0));
        assert_eq!(backend.live_texture_count(), 1);
        target.release(&mut backend);
        assert_eq!(backend.live_texture_count(), 0);
    }
}

//! GPU uniform buffer structures.
//!
//! One struct per shader interface. Layouts follow WGSL uniform rules
//! (16-byte alignment for vectors and matrices), so every struct is a
//! multiple of 16 bytes and contains no implicit padding.

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3, Vec4};

use crate::scene::MAX_LIGHTS;

/// Camera matrices for vertex shaders. Also used for the shadow light.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct CameraUniformData {
    pub view: Mat4,
    pub proj: Mat4,
    pub view_proj: Mat4,
    pub position: Vec4,
}

impl CameraUniformData {
    pub fn new(view: Mat4, proj: Mat4, position: Vec3) -> Self {
        Self {
            view,
            proj,
            view_proj: proj * view,
            position: position.extend(1.0),
        }
    }
}

/// Per-object transform and scalar material.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct ObjectUniform {
    pub model: Mat4,
    /// Inverse-transpose of `model`
    pub normal_matrix: Mat4,
    /// rgb = albedo used when textures are off
    pub albedo: Vec4,
    /// x = metallic, y = roughness, z = ao, w = 1.0 when sampling texture maps
    pub material: Vec4,
}

/// Inputs of the deferred resolve.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct LightingUniform {
    pub camera_position: Vec4,
    pub light_positions: [Vec4; MAX_LIGHTS],
    pub light_colors: [Vec4; MAX_LIGHTS],
    pub light_view_proj: Mat4,
    pub light_count: u32,
    /// Index of the light the shadow map is rendered from
    pub shadow_light: u32,
    /// Largest mip of the prefilter map
    pub max_reflection_lod: f32,
    pub _pad: u32,
}

/// Skybox view-projection with the camera translation removed.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct SkyboxUniform {
    pub view_proj: Mat4,
}

/// Per-face matrices for cube map capture.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct CaptureUniform {
    pub view: Mat4,
    pub proj: Mat4,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct PrefilterUniform {
    pub roughness: f32,
    /// Face size of the source environment map
    pub resolution: f32,
    pub sample_count: u32,
    pub _pad: u32,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct IrradianceUniform {
    /// Angular step of the hemisphere walk, radians
    pub sample_delta: f32,
    pub _pad: [f32; 3],
}

/// Flat-coloured light marker.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct MarkerUniform {
    pub model: Mat4,
    pub color: Vec4,
}

/// Present pass: which view to show.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct FrameUniform {
    /// 0 = composite, 1..=6 = G-buffer slot
    pub view: u32,
    /// Non-zero replicates the red channel to grey (scalar slots)
    pub grayscale: u32,
    pub _pad: [u32; 2],
}

/// Byte view of a uniform, for `write_buffer` and `create_buffer_init`.
pub fn bytes_of<T: Pod>(value: &T) -> &[u8] {
    bytemuck::bytes_of(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::mem::size_of;

    #[test]
    fn test_uniform_sizes_are_16_byte_multiples() {
        let sizes = [
            size_of::<CameraUniformData>(),
            size_of::<ObjectUniform>(),
            size_of::<LightingUniform>(),
            size_of::<SkyboxUniform>(),
            size_of::<CaptureUniform>(),
            size_of::<PrefilterUniform>(),
            size_of::<IrradianceUniform>(),
            size_of::<MarkerUniform>(),
            size_of::<FrameUniform>(),
        ];
        for size in sizes {
            assert_eq!(size % 16, 0, "{size}");
        }
    }

    #[test]
    fn test_lighting_uniform_layout() {
        // camera + 4 positions + 4 colours + light matrix + tail
        assert_eq!(size_of::<LightingUniform>(), 16 + 64 + 64 + 64 + 16);
    }

    #[test]
    fn test_camera_view_proj() {
        let view = Mat4::from_translation(Vec3::new(0.0, 0.0, -5.0));
        let proj = Mat4::perspective_rh(1.0, 1.0, 0.1, 100.0);
        let data = CameraUniformData::new(view, proj, Vec3::new(0.0, 0.0, 5.0));
        assert!(data.view_proj.abs_diff_eq(proj * view, 1e-6));
        assert_eq!(data.position.w, 1.0);
    }
}

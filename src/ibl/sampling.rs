//! CPU reference versions of the IBL sampling math.
//!
//! The WGSL shaders in [`super::shaders`] evaluate the same formulas on the
//! GPU; these functions define the expected results and are what the tests
//! check.

use super::capture::CubeFace;
use glam::{Vec2, Vec3};
use std::f32::consts::PI;

/// Roughness encoded by mip `mip` of a prefilter chain with `mip_count` levels.
///
/// Mip 0 is perfectly smooth, the last mip fully rough, linear in between.
pub fn prefilter_roughness(mip: u32, mip_count: u32) -> f32 {
    if mip_count <= 1 {
        return 0.0;
    }
    mip as f32 / (mip_count - 1) as f32
}

/// Edge length of mip `mip` for a `base`-sized level 0.
pub fn mip_size(base: u32, mip: u32) -> u32 {
    base.checked_shr(mip).unwrap_or(0).max(1)
}

/// Van der Corput radical inverse in base 2.
pub fn radical_inverse_vdc(mut bits: u32) -> f32 {
    bits = bits.rotate_right(16);
    bits = ((bits & 0x55555555) << 1) | ((bits & 0xAAAAAAAA) >> 1);
    bits = ((bits & 0x33333333) << 2) | ((bits & 0xCCCCCCCC) >> 2);
    bits = ((bits & 0x0F0F0F0F) << 4) | ((bits & 0xF0F0F0F0) >> 4);
    bits = ((bits & 0x00FF00FF) << 8) | ((bits & 0xFF00FF00) >> 8);
    bits as f32 * 2.328_306_4e-10
}

/// Point `i` of an `n`-point Hammersley set.
pub fn hammersley(i: u32, n: u32) -> Vec2 {
    Vec2::new(i as f32 / n as f32, radical_inverse_vdc(i))
}

/// GGX importance sample of the half vector around `n`.
pub fn importance_sample_ggx(xi: Vec2, n: Vec3, roughness: f32) -> Vec3 {
    let a = roughness * roughness;

    let phi = 2.0 * PI * xi.x;
    let cos_theta = ((1.0 - xi.y) / (1.0 + (a * a - 1.0) * xi.y)).sqrt();
    let sin_theta = (1.0 - cos_theta * cos_theta).sqrt();

    let h = Vec3::new(phi.cos() * sin_theta, phi.sin() * sin_theta, cos_theta);

    let up = if n.z.abs() < 0.999 { Vec3::Z } else { Vec3::X };
    let tangent = up.cross(n).normalize();
    let bitangent = n.cross(tangent);

    (tangent * h.x + bitangent * h.y + n * h.z).normalize()
}

/// Smith geometry term with the IBL remapping `k = a^2 / 2`.
pub fn geometry_smith_ibl(n_dot_v: f32, n_dot_l: f32, roughness: f32) -> f32 {
    let k = roughness * roughness / 2.0;
    let schlick = |n_dot_x: f32| n_dot_x / (n_dot_x * (1.0 - k) + k);
    schlick(n_dot_v) * schlick(n_dot_l)
}

/// Split-sum BRDF integral. Returns `(scale, bias)` applied to F0.
pub fn integrate_brdf(n_dot_v: f32, roughness: f32, sample_count: u32) -> Vec2 {
    let v = Vec3::new((1.0 - n_dot_v * n_dot_v).sqrt(), 0.0, n_dot_v);
    let n = Vec3::Z;

    let mut a = 0.0;
    let mut b = 0.0;

    for i in 0..sample_count {
        let xi = hammersley(i, sample_count);
        let h = importance_sample_ggx(xi, n, roughness);
        let l = (2.0 * v.dot(h) * h - v).normalize();

        let n_dot_l = l.z.max(0.0);
        let n_dot_h = h.z.max(0.0);
        let v_dot_h = v.dot(h).max(0.0);

        if n_dot_l > 0.0 {
            let g = geometry_smith_ibl(n_dot_v, n_dot_l, roughness);
            let g_vis = (g * v_dot_h) / (n_dot_h * n_dot_v);
            let fc = (1.0 - v_dot_h).powi(5);

            a += (1.0 - fc) * g_vis;
            b += fc * g_vis;
        }
    }

    Vec2::new(a, b) / sample_count as f32
}

/// Equirectangular texture coordinate of a unit direction.
pub fn direction_to_equirect_uv(dir: Vec3) -> Vec2 {
    let inv_atan = Vec2::new(0.5 / PI, 1.0 / PI);
    Vec2::new(dir.z.atan2(dir.x), dir.y.clamp(-1.0, 1.0).asin()) * inv_atan + 0.5
}

/// World direction through face coordinate `(u, v)` in `[-1, 1]`, with `u`
/// growing right and `v` growing down the face.
pub fn cubemap_direction(face: CubeFace, u: f32, v: f32) -> Vec3 {
    let dir = match face {
        CubeFace::PositiveX => Vec3::new(1.0, -v, -u),
        CubeFace::NegativeX => Vec3::new(-1.0, -v, u),
        CubeFace::PositiveY => Vec3::new(u, 1.0, v),
        CubeFace::NegativeY => Vec3::new(u, -1.0, -v),
        CubeFace::PositiveZ => Vec3::new(u, -v, 1.0),
        CubeFace::NegativeZ => Vec3::new(-u, -v, -1.0),
    };
    dir.normalize()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefilter_roughness_spans_unit_range() {
        let n = 5;
        assert_eq!(prefilter_roughness(0, n), 0.0);
        assert_eq!(prefilter_roughness(n - 1, n), 1.0);
        for m in 1..n {
            let step = prefilter_roughness(m, n) - prefilter_roughness(m - 1, n);
            assert!((step - 0.25).abs() < 1e-6);
        }
    }

    #[test]
    fn test_mip_size_halves_and_floors() {
        let sizes: Vec<u32> = (0..5).map(|m| mip_size(128, m)).collect();
        assert_eq!(sizes, vec![128, 64, 32, 16, 8]);
        assert_eq!(mip_size(5, 1), 2);
        assert_eq!(mip_size(128, 9), 1);
        assert_eq!(mip_size(128, 40), 1);
    }

    #[test]
    fn test_radical_inverse() {
        assert_eq!(radical_inverse_vdc(0), 0.0);
        assert!((radical_inverse_vdc(1) - 0.5).abs() < 1e-6);
        assert!((radical_inverse_vdc(2) - 0.25).abs() < 1e-6);
        assert!((radical_inverse_vdc(3) - 0.75).abs() < 1e-6);
    }

    #[test]
    fn test_smooth_ggx_sample_is_normal() {
        let n = Vec3::new(0.3, 0.8, -0.5).normalize();
        for i in 0..16 {
            let h = importance_sample_ggx(hammersley(i, 16), n, 0.0);
            assert!(h.dot(n) > 0.9999);
        }
    }

    #[test]
    fn test_brdf_lut_is_bounded() {
        for &(n_dot_v, roughness) in &[(0.1, 0.1), (0.5, 0.5), (0.99, 0.9), (0.9, 0.05)] {
            let ab = integrate_brdf(n_dot_v, roughness, 256);
            assert!(ab.x >= 0.0 && ab.y >= 0.0);
            assert!(ab.x + ab.y <= 1.0 + 1e-3, "{:?}", ab);
        }
        // smooth surface seen head-on reflects nearly everything through the scale term
        let head_on = integrate_brdf(0.999, 0.05, 256);
        assert!(head_on.x > 0.9);
    }

    #[test]
    fn test_equirect_uv_of_axes() {
        let up = direction_to_equirect_uv(Vec3::Y);
        assert!((up.y - 1.0).abs() < 1e-6);
        let forward = direction_to_equirect_uv(Vec3::X);
        assert!((forward - Vec2::new(0.5, 0.5)).length() < 1e-6);
    }

    #[test]
    fn test_face_center_is_face_direction() {
        for face in CubeFace::ALL {
            assert!((cubemap_direction(face, 0.0, 0.0) - face.direction()).length() < 1e-6);
        }
    }
}

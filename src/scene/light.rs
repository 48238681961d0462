//! Point lights and the shadow-casting light

use glam::{Mat4, Vec3};

use super::Projection;
use crate::pipeline::uniforms::{CameraUniformData, LightingUniform};

/// Number of lights the lighting shader has slots for
pub const MAX_LIGHTS: usize = 4;

/// Point light with an unnormalized radiance colour
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointLight {
    pub position: Vec3,
    pub color: Vec3,
}

impl PointLight {
    pub fn new(position: Vec3, color: Vec3) -> Self {
        Self { position, color }
    }
}

/// Orthographic light-space camera for the shadow map
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShadowCaster {
    pub target: Vec3,
    pub up: Vec3,
    pub projection: Projection,
}

impl ShadowCaster {
    pub fn view(&self, light_position: Vec3) -> Mat4 {
        Mat4::look_at_rh(light_position, self.target, self.up)
    }

    pub fn view_proj(&self, light_position: Vec3) -> Mat4 {
        self.projection.matrix() * self.view(light_position)
    }
}

/// Ordered lights; index `i` is uniform slot `i` in every pass.
#[derive(Debug, Clone, PartialEq)]
pub struct LightSet {
    lights: Vec<PointLight>,
    shadow_light: usize,
    pub shadow: ShadowCaster,
    /// Uniform scale of the marker spheres drawn at each light
    pub marker_scale: f32,
}

impl LightSet {
    /// Lights beyond [`MAX_LIGHTS`] are dropped with a warning.
    pub fn new(mut lights: Vec<PointLight>, shadow_light: usize, shadow: ShadowCaster) -> Self {
        if lights.len() > MAX_LIGHTS {
            log::warn!("{} lights given, keeping the first {}", lights.len(), MAX_LIGHTS);
            lights.truncate(MAX_LIGHTS);
        }
        let shadow_light = shadow_light.min(lights.len().saturating_sub(1));
        Self {
            lights,
            shadow_light,
            shadow,
            marker_scale: 0.5,
        }
    }

    /// The four lights of the demo scene; light 1 casts the shadow.
    pub fn demo(shadow_extent: f32, shadow_near: f32, shadow_far: f32) -> Self {
        let lights = vec![
            PointLight::new(Vec3::new(-9.0, 9.0, 9.0), Vec3::new(100.0, 300.0, 300.0)),
            PointLight::new(Vec3::new(9.0, 9.0, 9.0), Vec3::new(300.0, 147.0, 0.0)),
            PointLight::new(Vec3::new(-9.0, -9.0, 9.0), Vec3::new(300.0, 300.0, 300.0)),
            PointLight::new(Vec3::new(9.0, -9.0, 9.0), Vec3::new(300.0, 300.0, 300.0)),
        ];
        let shadow = ShadowCaster {
            target: Vec3::ZERO,
            up: Vec3::Y,
            projection: Projection::orthographic(shadow_extent, shadow_near, shadow_far),
        };
        Self::new(lights, 1, shadow)
    }

    pub fn lights(&self) -> &[PointLight] {
        &self.lights
    }

    pub fn len(&self) -> usize {
        self.lights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lights.is_empty()
    }

    pub fn shadow_light_index(&self) -> usize {
        self.shadow_light
    }

    /// Light-space view-projection of the shadow-casting light
    pub fn shadow_view_proj(&self) -> Mat4 {
        match self.lights.get(self.shadow_light) {
            Some(light) => self.shadow.view_proj(light.position),
            None => Mat4::IDENTITY,
        }
    }

    pub fn shadow_position(&self) -> Vec3 {
        self.lights
            .get(self.shadow_light)
            .map_or(Vec3::ZERO, |light| light.position)
    }

    /// Camera the shadow map is rendered from
    pub fn shadow_camera(&self) -> CameraUniformData {
        let position = self.shadow_position();
        CameraUniformData::new(self.shadow.view(position), self.shadow.projection.matrix(), position)
    }

    /// Fill the lighting uniform, slot order matching `lights()`.
    pub fn lighting_uniform(&self, camera_position: Vec3, max_reflection_lod: f32) -> LightingUniform {
        let mut uniform = LightingUniform {
            camera_position: camera_position.extend(1.0),
            light_positions: [glam::Vec4::ZERO; MAX_LIGHTS],
            light_colors: [glam::Vec4::ZERO; MAX_LIGHTS],
            light_view_proj: self.shadow_view_proj(),
            light_count: self.lights.len() as u32,
            shadow_light: self.shadow_light as u32,
            max_reflection_lod,
            _pad: 0,
        };
        for (i, light) in self.lights.iter().enumerate() {
            uniform.light_positions[i] = light.position.extend(1.0);
            uniform.light_colors[i] = light.color.extend(1.0);
        }
        uniform
    }

    /// Model matrix of the marker sphere for light `index`
    pub fn marker_model(&self, index: usize) -> Option<Mat4> {
        self.lights.get(index).map(|light| {
            Mat4::from_translation(light.position) * Mat4::from_scale(Vec3::splat(self.marker_scale))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uniform_slots_follow_light_order() {
        let set = LightSet::demo(10.0, 1.0, 7.5);
        let uniform = set.lighting_uniform(Vec3::new(0.0, 2.0, 15.0), 4.0);
        assert_eq!(uniform.light_count, 4);
        assert_eq!(uniform.shadow_light, 1);
        for (i, light) in set.lights().iter().enumerate() {
            assert_eq!(uniform.light_positions[i].truncate(), light.position);
            assert_eq!(uniform.light_colors[i].truncate(), light.color);
        }
        assert_eq!(uniform.light_view_proj, set.shadow_view_proj());
    }

    #[test]
    fn test_extra_lights_are_dropped() {
        let lights = vec![PointLight::new(Vec3::ZERO, Vec3::ONE); 6];
        let shadow = LightSet::demo(10.0, 1.0, 7.5).shadow;
        let set = LightSet::new(lights, 5, shadow);
        assert_eq!(set.len(), MAX_LIGHTS);
        assert_eq!(set.shadow_light_index(), MAX_LIGHTS - 1);
    }

    #[test]
    fn test_shadow_projection_maps_origin_inside() {
        let set = LightSet::demo(10.0, 1.0, 20.0);
        let clip = set.shadow_view_proj() * glam::Vec4::new(0.0, 0.0, 0.0, 1.0);
        let ndc = clip.truncate() / clip.w;
        assert!(ndc.x.abs() < 1e-5 && ndc.y.abs() < 1e-5);
        assert!(ndc.z > 0.0 && ndc.z < 1.0);
    }

    #[test]
    fn test_marker_model_scales_sphere() {
        let set = LightSet::demo(10.0, 1.0, 7.5);
        let model = set.marker_model(0).unwrap();
        let p = model.transform_point3(Vec3::X);
        assert!(p.abs_diff_eq(Vec3::new(-8.5, 9.0, 9.0), 1e-5));
        assert!(set.marker_model(4).is_none());
    }
}

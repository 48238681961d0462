//! Scene management
//!
//! The renderer draws a fixed list of objects; there is no hierarchy.

mod camera;
mod camera_controller;
mod light;
mod transform;

pub use camera::*;
pub use camera_controller::*;
pub use light::*;
pub use transform::*;

use crate::resources::{Material, TextureSetFiles};
use glam::{Quat, Vec3};
use std::path::PathBuf;

/// Where an object's geometry comes from
#[derive(Debug, Clone, PartialEq)]
pub enum MeshSource {
    /// OBJ file relative to the asset root
    Obj(PathBuf),
    /// Unit UV sphere
    Sphere,
    /// Ground plane: half extent, height, UV repeat
    Plane { half_extent: f32, y: f32, uv_scale: f32 },
}

/// Texture map sets shipped with the assets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureSet {
    Concrete,
    ScuffedAluminium,
    Cerberus,
}

impl TextureSet {
    pub const ALL: [TextureSet; 3] = [
        TextureSet::Concrete,
        TextureSet::ScuffedAluminium,
        TextureSet::Cerberus,
    ];

    /// Directory relative to the asset root
    pub fn directory(self) -> &'static str {
        match self {
            TextureSet::Concrete => "concrete",
            TextureSet::ScuffedAluminium => "scuffed_aluminum",
            TextureSet::Cerberus => "cerberus",
        }
    }

    pub fn files(self) -> TextureSetFiles<'static> {
        match self {
            TextureSet::Concrete => TextureSetFiles {
                albedo: "concrete_floor_02_diff_1k.jpg",
                normal: "concrete_floor_02_Nor_1k.jpg",
                metallic: "concrete_floor_02_spec_1k.jpg",
                roughness: "concrete_floor_02_rough_1k.jpg",
                ao: "concrete_floor_02_AO_1k.jpg",
            },
            // the set has no AO map; its metallic map stands in
            TextureSet::ScuffedAluminium => TextureSetFiles {
                albedo: "Aluminum-Scuffed_basecolor.png",
                normal: "Aluminum-Scuffed_normal.png",
                metallic: "Aluminum-Scuffed_metallic.png",
                roughness: "Aluminum-Scuffed_roughness.png",
                ao: "Aluminum-Scuffed_metallic.png",
            },
            TextureSet::Cerberus => TextureSetFiles {
                albedo: "Cerberus_A.tga",
                normal: "Cerberus_N.tga",
                metallic: "Cerberus_M.tga",
                roughness: "Cerberus_R.tga",
                ao: "Cerberus_AO.tga",
            },
        }
    }
}

/// One drawable object
#[derive(Debug, Clone, PartialEq)]
pub struct SceneObject {
    pub name: String,
    pub mesh: MeshSource,
    pub transform: Transform,
    /// Scalar material used in untextured mode
    pub material: Material,
    pub textures: TextureSet,
    pub casts_shadow: bool,
}

impl SceneObject {
    pub fn new(name: impl Into<String>, mesh: MeshSource, textures: TextureSet) -> Self {
        Self {
            name: name.into(),
            mesh,
            transform: Transform::default(),
            material: Material::default(),
            textures,
            casts_shadow: true,
        }
    }

    pub fn with_transform(mut self, transform: Transform) -> Self {
        self.transform = transform;
        self
    }

    pub fn with_material(mut self, material: Material) -> Self {
        self.material = material;
        self
    }
}

/// Edge length of the calibration sphere grid
pub const SPHERE_GRID: u32 = 7;
const SPHERE_SPACING: f32 = 2.5;

/// Objects and lights of a scene
#[derive(Debug, Clone, PartialEq)]
pub struct SceneDescription {
    pub objects: Vec<SceneObject>,
    pub lights: LightSet,
}

impl SceneDescription {
    /// The viewer scene: Cerberus, the bunny, a ground plane and a 7x7
    /// metallic/roughness sphere grid.
    pub fn demo(lights: LightSet) -> Self {
        let mut objects = vec![
            SceneObject::new("cerberus", MeshSource::Obj("cerberus/cerberus.obj".into()), TextureSet::Cerberus)
                .with_transform(
                    Transform::from_position(Vec3::new(0.0, 0.0, 10.0))
                        .with_scale(2.0)
                        .with_rotation(
                            Quat::from_rotation_y((-90.0f32).to_radians())
                                * Quat::from_rotation_x(45.0f32.to_radians()),
                        ),
                ),
            SceneObject::new("bunny", MeshSource::Obj("bunny.obj".into()), TextureSet::ScuffedAluminium)
                .with_transform(Transform::from_position(Vec3::new(1.0, 0.0, 8.6))),
            SceneObject::new(
                "ground",
                MeshSource::Plane {
                    half_extent: 10.0,
                    y: -0.5,
                    uv_scale: 10.0,
                },
                TextureSet::Concrete,
            ),
        ];

        let half = (SPHERE_GRID / 2) as f32;
        for row in 0..SPHERE_GRID {
            for col in 0..SPHERE_GRID {
                let position = Vec3::new(
                    (col as f32 - half) * SPHERE_SPACING,
                    (row as f32 - half) * SPHERE_SPACING,
                    0.0,
                );
                objects.push(
                    SceneObject::new(
                        format!("sphere {row}x{col}"),
                        MeshSource::Sphere,
                        TextureSet::ScuffedAluminium,
                    )
                    .with_transform(Transform::from_position(position))
                    .with_material(Material::grid_cell(row, col, SPHERE_GRID)),
                );
            }
        }

        Self { objects, lights }
    }

    pub fn texture_sets(&self) -> Vec<TextureSet> {
        let mut sets: Vec<TextureSet> = Vec::new();
        for object in &self.objects {
            if !sets.contains(&object.textures) {
                sets.push(object.textures);
            }
        }
        sets
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_demo_scene_contents() {
        let scene = SceneDescription::demo(LightSet::demo(10.0, 1.0, 7.5));
        assert_eq!(scene.objects.len(), 3 + 49);
        assert_eq!(scene.lights.len(), MAX_LIGHTS);
        assert_eq!(scene.texture_sets().len(), 3);

        let corner = scene
            .objects
            .iter()
            .find(|o| o.name == "sphere 6x0")
            .unwrap();
        assert_eq!(corner.transform.position, Vec3::new(-7.5, 7.5, 0.0));
        assert!((corner.material.metallic - 6.0 / 7.0).abs() < 1e-6);
        assert_eq!(corner.material.roughness, 0.05);
    }

    #[test]
    fn test_texture_set_directories() {
        for set in TextureSet::ALL {
            assert!(!set.directory().is_empty());
            let files = set.files();
            assert!(!files.albedo.is_empty() && !files.ao.is_empty());
        }
        assert_eq!(TextureSet::ScuffedAluminium.files().ao, TextureSet::ScuffedAluminium.files().metallic);
    }
}

//! Camera system

use glam::{Mat3, Mat4, Vec3};

use crate::pipeline::uniforms::{CameraUniformData, SkyboxUniform};

/// Camera projection type
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Projection {
    Perspective {
        fov_y: f32,
        aspect: f32,
        near: f32,
        far: f32,
    },
    Orthographic {
        left: f32,
        right: f32,
        bottom: f32,
        top: f32,
        near: f32,
        far: f32,
    },
}

impl Default for Projection {
    fn default() -> Self {
        Projection::Perspective {
            fov_y: std::f32::consts::FRAC_PI_4, // 45 degrees
            aspect: 16.0 / 9.0,
            near: 0.1,
            far: 100.0,
        }
    }
}

impl Projection {
    pub fn perspective(fov_y_degrees: f32, aspect: f32, near: f32, far: f32) -> Self {
        Projection::Perspective {
            fov_y: fov_y_degrees.to_radians(),
            aspect,
            near,
            far,
        }
    }

    /// Symmetric box of half-size `extent` around the view axis
    pub fn orthographic(extent: f32, near: f32, far: f32) -> Self {
        Projection::Orthographic {
            left: -extent,
            right: extent,
            bottom: -extent,
            top: extent,
            near,
            far,
        }
    }

    pub fn matrix(&self) -> Mat4 {
        match self {
            Projection::Perspective {
                fov_y,
                aspect,
                near,
                far,
            } => Mat4::perspective_rh(*fov_y, *aspect, *near, *far),
            Projection::Orthographic {
                left,
                right,
                bottom,
                top,
                near,
                far,
            } => Mat4::orthographic_rh(*left, *right, *bottom, *top, *near, *far),
        }
    }

    pub fn set_aspect(&mut self, aspect: f32) {
        if let Projection::Perspective { aspect: a, .. } = self {
            *a = aspect;
        }
    }
}

/// Camera for viewing the scene
#[derive(Debug, Clone, PartialEq)]
pub struct Camera {
    pub position: Vec3,
    pub target: Vec3,
    pub up: Vec3,
    pub projection: Projection,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            position: Vec3::new(0.0, 2.0, 15.0),
            target: Vec3::new(0.0, 2.0, 14.0),
            up: Vec3::Y,
            projection: Projection::default(),
        }
    }
}

impl Camera {
    pub fn new(position: Vec3, target: Vec3) -> Self {
        Self {
            position,
            target,
            up: Vec3::Y,
            projection: Projection::default(),
        }
    }

    /// The viewer's starting camera: (0, 2, 15) looking down -Z.
    pub fn viewer(aspect: f32) -> Self {
        let position = Vec3::new(0.0, 2.0, 15.0);
        Self {
            position,
            target: position + Vec3::NEG_Z,
            up: Vec3::Y,
            projection: Projection::perspective(45.0, aspect, 0.1, 100.0),
        }
    }

    /// Get the view matrix
    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.position, self.target, self.up)
    }

    /// Get the projection matrix
    pub fn projection_matrix(&self) -> Mat4 {
        self.projection.matrix()
    }

    /// Get the forward direction
    pub fn forward(&self) -> Vec3 {
        (self.target - self.position).normalize()
    }

    /// Get the right direction
    pub fn right(&self) -> Vec3 {
        self.forward().cross(self.up).normalize()
    }

    /// View matrix with the translation dropped, so the skybox stays at infinity
    pub fn skybox_view(&self) -> Mat4 {
        Mat4::from_mat3(Mat3::from_mat4(self.view_matrix()))
    }

    /// Build camera uniform data for shaders
    pub fn uniform_data(&self) -> CameraUniformData {
        CameraUniformData::new(self.view_matrix(), self.projection_matrix(), self.position)
    }

    pub fn skybox_uniform(&self) -> SkyboxUniform {
        SkyboxUniform {
            view_proj: self.projection_matrix() * self.skybox_view(),
        }
    }

    /// Update aspect ratio for perspective projection
    pub fn set_aspect(&mut self, width: f32, height: f32) {
        if height > 0.0 {
            self.projection.set_aspect(width / height);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec4;

    #[test]
    fn test_viewer_defaults() {
        let camera = Camera::viewer(1.5);
        assert_eq!(camera.position, Vec3::new(0.0, 2.0, 15.0));
        assert!(camera.forward().abs_diff_eq(Vec3::NEG_Z, 1e-6));
        assert_eq!(camera.projection, Projection::perspective(45.0, 1.5, 0.1, 100.0));
    }

    #[test]
    fn test_skybox_view_ignores_translation() {
        let mut near = Camera::viewer(1.0);
        let far = {
            let mut c = near.clone();
            c.position += Vec3::new(50.0, -3.0, 7.0);
            c.target += Vec3::new(50.0, -3.0, 7.0);
            c
        };
        assert!(near.skybox_view().abs_diff_eq(far.skybox_view(), 1e-5));
        assert_eq!(near.skybox_view().w_axis, Vec4::W);

        near.set_aspect(800.0, 0.0);
        assert_eq!(near.projection, Projection::perspective(45.0, 1.0, 0.1, 100.0));
    }
}

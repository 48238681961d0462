//! Camera controller system
//!
//! [`FreeFlyController`] flies the viewer camera:
//! - Left mouse drag: look around
//! - WASD / arrow keys: move along the view direction and its right vector
//! - Space: ascend, Shift + Space: descend

use glam::{Quat, Vec2, Vec3};

use super::Camera;

/// Input state for camera controllers
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CameraInput {
    pub forward: bool,
    pub backward: bool,
    pub left: bool,
    pub right: bool,
    pub up: bool,
    pub down: bool,

    /// Mouse delta since last frame (in pixels)
    pub mouse_delta: Vec2,

    /// Whether mouse look is active (left mouse button held)
    pub mouse_look_active: bool,
}

/// Abstract camera controller trait
pub trait CameraController {
    /// Update the camera from input; `dt_ms` is the frame time in milliseconds
    fn update(&mut self, camera: &mut Camera, input: &CameraInput, dt_ms: f32);

    /// Get the controller name for debugging
    fn name(&self) -> &'static str;
}

/// Free-fly camera controller
///
/// Rotation is applied incrementally to the view direction: a pitch about
/// `direction x up` combined with a yaw about `up`.
#[derive(Debug, Clone)]
pub struct FreeFlyController {
    /// Radians per pixel of mouse movement
    pub rotation_speed: f32,
    /// World units per millisecond
    pub move_speed: f32,
}

impl Default for FreeFlyController {
    fn default() -> Self {
        Self {
            rotation_speed: 0.002,
            move_speed: 0.01,
        }
    }
}

impl FreeFlyController {
    pub fn new() -> Self {
        Self::default()
    }

    fn rotate(&self, direction: Vec3, up: Vec3, delta: Vec2) -> Vec3 {
        let yaw = Quat::from_axis_angle(up, -delta.x * self.rotation_speed);
        let right = direction.cross(up).normalize_or_zero();
        let pitch = if right == Vec3::ZERO {
            Quat::IDENTITY
        } else {
            Quat::from_axis_angle(right, -delta.y * self.rotation_speed)
        };
        let rotated = (pitch * yaw).normalize() * direction;
        // refuse to look straight along `up`; the basis would degenerate
        if rotated.cross(up).length_squared() < 1e-6 {
            direction
        } else {
            rotated.normalize()
        }
    }
}

impl CameraController for FreeFlyController {
    fn update(&mut self, camera: &mut Camera, input: &CameraInput, dt_ms: f32) {
        let mut direction = camera.forward();

        if input.mouse_look_active && input.mouse_delta != Vec2::ZERO {
            direction = self.rotate(direction, camera.up, input.mouse_delta);
        }

        let right = direction.cross(camera.up).normalize_or_zero();
        let step = self.move_speed * dt_ms;
        let mut offset = Vec3::ZERO;

        if input.forward {
            offset += direction;
        }
        if input.backward {
            offset -= direction;
        }
        if input.right {
            offset += right;
        }
        if input.left {
            offset -= right;
        }
        if input.down {
            offset -= camera.up;
        } else if input.up {
            offset += camera.up;
        }

        camera.position += offset * step;
        camera.target = camera.position + direction;
    }

    fn name(&self) -> &'static str {
        "FreeFly"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_moves_along_view_direction() {
        let mut camera = Camera::viewer(1.0);
        let mut controller = FreeFlyController::new();
        let input = CameraInput {
            forward: true,
            ..Default::default()
        };
        controller.update(&mut camera, &input, 100.0);
        assert!(camera.position.abs_diff_eq(Vec3::new(0.0, 2.0, 14.0), 1e-5));
        assert!(camera.forward().abs_diff_eq(Vec3::NEG_Z, 1e-5));
    }

    #[test]
    fn test_descend_wins_over_ascend() {
        let mut camera = Camera::viewer(1.0);
        let mut controller = FreeFlyController::new();
        let input = CameraInput {
            up: true,
            down: true,
            ..Default::default()
        };
        controller.update(&mut camera, &input, 50.0);
        assert!((camera.position.y - 1.5).abs() < 1e-5);
    }

    #[test]
    fn test_mouse_look_needs_button() {
        let mut camera = Camera::viewer(1.0);
        let mut controller = FreeFlyController::new();
        let mut input = CameraInput {
            mouse_delta: Vec2::new(100.0, 0.0),
            ..Default::default()
        };
        controller.update(&mut camera, &input, 16.0);
        assert!(camera.forward().abs_diff_eq(Vec3::NEG_Z, 1e-6));

        input.mouse_look_active = true;
        controller.update(&mut camera, &input, 16.0);
        let forward = camera.forward();
        // dragging right turns right by 0.2 rad
        assert!(forward.x > 0.0);
        assert!((forward.angle_between(Vec3::NEG_Z) - 0.2).abs() < 1e-4);
        assert!(forward.y.abs() < 1e-6);
    }
}

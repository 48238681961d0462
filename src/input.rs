//! Input poller fed from winit window events
//!
//! Queries are pure: held state, the keys that went down this frame, mouse
//! buttons, cursor motion and scroll direction. [`InputState::end_frame`]
//! clears the per-frame edges.

use std::collections::HashSet;

use glam::Vec2;
use winit::event::{ElementState, MouseButton, MouseScrollDelta, WindowEvent};
use winit::keyboard::{KeyCode, PhysicalKey};

use crate::scene::CameraInput;

#[derive(Debug, Default)]
pub struct InputState {
    held: HashSet<KeyCode>,
    pressed: HashSet<KeyCode>,
    released: HashSet<KeyCode>,
    mouse_held: HashSet<MouseButton>,
    mouse_pressed: HashSet<MouseButton>,
    mouse_released: HashSet<MouseButton>,
    cursor: Option<Vec2>,
    mouse_delta: Vec2,
    scroll: i32,
}

impl InputState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one window event. Returns true when the event was input.
    pub fn handle_window_event(&mut self, event: &WindowEvent) -> bool {
        match event {
            WindowEvent::KeyboardInput { event, .. } => {
                let PhysicalKey::Code(code) = event.physical_key else {
                    return false;
                };
                match event.state {
                    ElementState::Pressed => self.key_down(code),
                    ElementState::Released => self.key_up(code),
                }
                true
            }
            WindowEvent::MouseInput { state, button, .. } => {
                match state {
                    ElementState::Pressed => {
                        if self.mouse_held.insert(*button) {
                            self.mouse_pressed.insert(*button);
                        }
                    }
                    ElementState::Released => {
                        self.mouse_held.remove(button);
                        self.mouse_released.insert(*button);
                    }
                }
                true
            }
            WindowEvent::CursorMoved { position, .. } => {
                let position = Vec2::new(position.x as f32, position.y as f32);
                self.cursor_moved(position);
                true
            }
            WindowEvent::MouseWheel { delta, .. } => {
                let y = match delta {
                    MouseScrollDelta::LineDelta(_, y) => *y,
                    MouseScrollDelta::PixelDelta(p) => p.y as f32,
                };
                self.scroll = if y > 0.0 {
                    1
                } else if y < 0.0 {
                    -1
                } else {
                    self.scroll
                };
                true
            }
            WindowEvent::Focused(false) => {
                // keys released while unfocused never arrive
                self.held.clear();
                self.mouse_held.clear();
                false
            }
            _ => false,
        }
    }

    /// Key went down. Auto-repeat of a held key is not a new press.
    pub fn key_down(&mut self, code: KeyCode) {
        if self.held.insert(code) {
            self.pressed.insert(code);
        }
    }

    pub fn key_up(&mut self, code: KeyCode) {
        if self.held.remove(&code) {
            self.released.insert(code);
        }
    }

    pub fn cursor_moved(&mut self, position: Vec2) {
        if let Some(last) = self.cursor {
            self.mouse_delta += position - last;
        }
        self.cursor = Some(position);
    }

    pub fn is_down(&self, code: KeyCode) -> bool {
        self.held.contains(&code)
    }

    /// Went down this frame
    pub fn is_pressed(&self, code: KeyCode) -> bool {
        self.pressed.contains(&code)
    }

    /// Went up this frame
    pub fn is_up(&self, code: KeyCode) -> bool {
        self.released.contains(&code)
    }

    pub fn is_mouse_down(&self, button: MouseButton) -> bool {
        self.mouse_held.contains(&button)
    }

    pub fn is_mouse_pressed(&self, button: MouseButton) -> bool {
        self.mouse_pressed.contains(&button)
    }

    pub fn is_mouse_up(&self, button: MouseButton) -> bool {
        self.mouse_released.contains(&button)
    }

    pub fn mouse_position(&self) -> Option<Vec2> {
        self.cursor
    }

    /// Cursor motion since the last `end_frame`, in pixels
    pub fn mouse_delta(&self) -> Vec2 {
        self.mouse_delta
    }

    /// +1 scrolling up, -1 scrolling down, 0 otherwise
    pub fn scroll(&self) -> i32 {
        self.scroll
    }

    /// Free-fly controls derived from the held keys
    pub fn camera_input(&self) -> CameraInput {
        let any = |keys: &[KeyCode]| keys.iter().any(|k| self.is_down(*k));
        let space = self.is_down(KeyCode::Space);
        let shift = any(&[KeyCode::ShiftLeft, KeyCode::ShiftRight]);
        CameraInput {
            forward: any(&[KeyCode::KeyW, KeyCode::ArrowUp]),
            backward: any(&[KeyCode::KeyS, KeyCode::ArrowDown]),
            left: any(&[KeyCode::KeyA, KeyCode::ArrowLeft]),
            right: any(&[KeyCode::KeyD, KeyCode::ArrowRight]),
            up: space && !shift,
            down: space && shift,
            mouse_delta: self.mouse_delta,
            mouse_look_active: self.is_mouse_down(MouseButton::Left),
        }
    }

    /// Reset the per-frame edges, motion and scroll
    pub fn end_frame(&mut self) {
        self.pressed.clear();
        self.released.clear();
        self.mouse_pressed.clear();
        self.mouse_released.clear();
        self.mouse_delta = Vec2::ZERO;
        self.scroll = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_press_edge_lasts_one_frame() {
        let mut input = InputState::new();
        input.key_down(KeyCode::Digit1);
        input.key_down(KeyCode::Digit1);
        assert!(input.is_pressed(KeyCode::Digit1));
        input.end_frame();
        assert!(input.is_down(KeyCode::Digit1));
        assert!(!input.is_pressed(KeyCode::Digit1));

        input.key_up(KeyCode::Digit1);
        assert!(input.is_up(KeyCode::Digit1));
        assert!(!input.is_down(KeyCode::Digit1));
    }

    #[test]
    fn test_mouse_delta_accumulates_and_resets() {
        let mut input = InputState::new();
        input.cursor_moved(Vec2::new(10.0, 10.0));
        assert_eq!(input.mouse_delta(), Vec2::ZERO);
        input.cursor_moved(Vec2::new(13.0, 8.0));
        input.cursor_moved(Vec2::new(15.0, 8.0));
        assert_eq!(input.mouse_delta(), Vec2::new(5.0, -2.0));
        input.end_frame();
        assert_eq!(input.mouse_delta(), Vec2::ZERO);
        assert_eq!(input.mouse_position(), Some(Vec2::new(15.0, 8.0)));
    }

    #[test]
    fn test_space_with_shift_descends() {
        let mut input = InputState::new();
        input.key_down(KeyCode::Space);
        assert!(input.camera_input().up);
        input.key_down(KeyCode::ShiftLeft);
        let camera = input.camera_input();
        assert!(camera.down && !camera.up);
    }
}

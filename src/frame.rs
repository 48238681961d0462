//! Per-frame viewer state driven by the keyboard
//!
//! Key bindings:
//! - `1`: next debug view (one step per press, wrapping)
//! - `2` (held): white clear colour; on release the colour follows the view
//! - `3`: toggle wireframe for the geometry pass
//! - `4` / `5`: untextured / textured materials

use winit::keyboard::KeyCode;

use crate::input::InputState;

/// Which image the present pass shows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DebugView {
    #[default]
    Composite,
    Position,
    Normal,
    Albedo,
    Metallic,
    Roughness,
    Ao,
}

impl DebugView {
    pub const ALL: [DebugView; 7] = [
        DebugView::Composite,
        DebugView::Position,
        DebugView::Normal,
        DebugView::Albedo,
        DebugView::Metallic,
        DebugView::Roughness,
        DebugView::Ao,
    ];

    pub const COUNT: usize = Self::ALL.len();

    pub fn index(self) -> usize {
        match self {
            DebugView::Composite => 0,
            DebugView::Position => 1,
            DebugView::Normal => 2,
            DebugView::Albedo => 3,
            DebugView::Metallic => 4,
            DebugView::Roughness => 5,
            DebugView::Ao => 6,
        }
    }

    pub fn from_index(index: usize) -> Self {
        Self::ALL[index % Self::COUNT]
    }

    pub fn next(self) -> Self {
        Self::from_index(self.index() + 1)
    }

    pub fn label(self) -> &'static str {
        match self {
            DebugView::Composite => "composite",
            DebugView::Position => "position",
            DebugView::Normal => "normal",
            DebugView::Albedo => "albedo",
            DebugView::Metallic => "metallic",
            DebugView::Roughness => "roughness",
            DebugView::Ao => "ambient occlusion",
        }
    }

    /// Single-channel G-buffer slots, shown as greyscale
    pub fn is_scalar(self) -> bool {
        matches!(self, DebugView::Metallic | DebugView::Roughness | DebugView::Ao)
    }
}

/// Material inputs of the geometry pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MaterialMode {
    /// Sample the object's texture maps
    #[default]
    Textured,
    /// Use the object's scalar material
    Untextured,
}

/// Clear colour selected by a view index: black, red, green, blue, else white.
pub fn view_clear_color(index: usize) -> [f32; 4] {
    match index {
        0 => [0.0, 0.0, 0.0, 1.0],
        1 => [1.0, 0.0, 0.0, 1.0],
        2 => [0.0, 1.0, 0.0, 1.0],
        3 => [0.0, 0.0, 1.0, 1.0],
        _ => [1.0, 1.0, 1.0, 1.0],
    }
}

const WHITE: [f32; 4] = [1.0, 1.0, 1.0, 1.0];

/// Clear colour before any key changes it
pub const DEFAULT_CLEAR_COLOR: [f32; 4] = [0.1, 0.1, 0.1, 1.0];

/// What the frame loop must react to after a key update
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FrameChanges {
    pub quit: bool,
    pub view_changed: bool,
    pub wireframe_changed: bool,
    pub material_mode_changed: bool,
}

/// Viewer toggles read by the frame passes
#[derive(Debug, Clone, PartialEq)]
pub struct FrameState {
    pub view: DebugView,
    pub wireframe: bool,
    pub material_mode: MaterialMode,
    pub clear_color: [f32; 4],
    holding_white: bool,
}

impl FrameState {
    pub fn new(clear_color: [f32; 4]) -> Self {
        Self {
            view: DebugView::Composite,
            wireframe: false,
            material_mode: MaterialMode::Textured,
            clear_color,
            holding_white: false,
        }
    }

    /// Advance the debug view by one step
    pub fn cycle_view(&mut self) {
        self.view = self.view.next();
        log::info!("Debug view: {}", self.view.label());
    }

    /// Apply this frame's key presses
    pub fn apply_input(&mut self, input: &InputState) -> FrameChanges {
        let mut changes = FrameChanges {
            quit: input.is_down(KeyCode::Escape),
            ..Default::default()
        };

        if input.is_pressed(KeyCode::Digit1) {
            self.cycle_view();
            changes.view_changed = true;
        }

        if input.is_down(KeyCode::Digit2) {
            self.clear_color = WHITE;
            self.holding_white = true;
        } else if self.holding_white {
            self.clear_color = view_clear_color(self.view.index());
        }

        if input.is_pressed(KeyCode::Digit3) {
            self.wireframe = !self.wireframe;
            changes.wireframe_changed = true;
            log::info!("Wireframe {}", if self.wireframe { "on" } else { "off" });
        }

        if input.is_pressed(KeyCode::Digit4) && self.material_mode != MaterialMode::Untextured {
            self.material_mode = MaterialMode::Untextured;
            changes.material_mode_changed = true;
        }
        if input.is_pressed(KeyCode::Digit5) && self.material_mode != MaterialMode::Textured {
            self.material_mode = MaterialMode::Textured;
            changes.material_mode_changed = true;
        }
        if changes.material_mode_changed {
            log::info!("Material mode: {:?}", self.material_mode);
        }

        changes
    }
}

impl Default for FrameState {
    fn default() -> Self {
        Self::new(DEFAULT_CLEAR_COLOR)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn press(input: &mut InputState, key: KeyCode) {
        input.key_down(key);
    }

    #[test]
    fn test_cycle_wraps() {
        let mut view = DebugView::Roughness;
        view = view.next();
        assert_eq!(view, DebugView::Ao);
        assert_eq!(view.next(), DebugView::Composite);
        assert_eq!(DebugView::from_index(9), DebugView::Normal);
    }

    #[test]
    fn test_held_key_cycles_once() {
        let mut state = FrameState::default();
        let mut input = InputState::new();
        press(&mut input, KeyCode::Digit1);
        assert!(state.apply_input(&input).view_changed);
        input.end_frame();
        // still held on the next frame
        assert!(!state.apply_input(&input).view_changed);
        assert_eq!(state.view, DebugView::Position);
    }

    #[test]
    fn test_white_clear_while_held_then_follow_view() {
        let initial = [0.1, 0.1, 0.1, 1.0];
        let mut state = FrameState::new(initial);
        let mut input = InputState::new();

        state.apply_input(&input);
        assert_eq!(state.clear_color, initial);

        press(&mut input, KeyCode::Digit2);
        state.apply_input(&input);
        assert_eq!(state.clear_color, WHITE);

        input.end_frame();
        input.key_up(KeyCode::Digit2);
        state.apply_input(&input);
        assert_eq!(state.clear_color, view_clear_color(0));

        state.cycle_view();
        state.apply_input(&input);
        assert_eq!(state.clear_color, [1.0, 0.0, 0.0, 1.0]);
    }

    #[test]
    fn test_toggles() {
        let mut state = FrameState::default();
        let mut input = InputState::new();
        press(&mut input, KeyCode::Digit3);
        press(&mut input, KeyCode::Digit4);
        let changes = state.apply_input(&input);
        assert!(changes.wireframe_changed && changes.material_mode_changed);
        assert!(state.wireframe);
        assert_eq!(state.material_mode, MaterialMode::Untextured);

        input.end_frame();
        input.key_up(KeyCode::Digit3);
        input.key_up(KeyCode::Digit4);
        press(&mut input, KeyCode::Digit5);
        press(&mut input, KeyCode::Escape);
        let changes = state.apply_input(&input);
        assert!(changes.quit);
        assert_eq!(state.material_mode, MaterialMode::Textured);
        assert!(state.wireframe);
    }
}

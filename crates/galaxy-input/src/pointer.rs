//! Frame-coherent pointer state for orbit-style camera controls.
//!
//! [`PointerState`] accumulates winit mouse events during a frame into the
//! three gestures an orbit camera consumes: rotate (left drag), pan (right or
//! middle drag) and zoom (wheel).

use glam::Vec2;
use winit::event::{ElementState, MouseButton, MouseScrollDelta};

/// Pixels of a pixel-precise scroll treated as one wheel line.
const PIXELS_PER_LINE: f64 = 40.0;

/// Gestures accumulated since the last [`PointerState::take_frame`].
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PointerFrame {
    /// Left-drag distance in physical pixels.
    pub rotate: Vec2,
    /// Right- or middle-drag distance in physical pixels.
    pub pan: Vec2,
    /// Wheel lines, positive when scrolling up (zoom in).
    pub zoom: f32,
}

impl PointerFrame {
    pub fn is_idle(&self) -> bool {
        self.rotate == Vec2::ZERO && self.pan == Vec2::ZERO && self.zoom == 0.0
    }
}

fn button_index(button: MouseButton) -> Option<usize> {
    match button {
        MouseButton::Left => Some(0),
        MouseButton::Right => Some(1),
        MouseButton::Middle => Some(2),
        _ => None,
    }
}

/// Pointer tracker feeding orbit controls.
///
/// # Usage
///
/// 1. Forward winit events via the `on_*` methods during event collection.
/// 2. Call [`take_frame`](Self::take_frame) once per frame to drain gestures.
#[derive(Debug, Clone, Default)]
pub struct PointerState {
    position: Option<Vec2>,
    buttons: [bool; 3],
    frame: PointerFrame,
}

impl PointerState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Process a `CursorMoved` event.
    pub fn on_cursor_moved(&mut self, x: f64, y: f64) {
        let new_pos = Vec2::new(x as f32, y as f32);
        if let Some(old) = self.position {
            let delta = new_pos - old;
            if self.buttons[0] {
                self.frame.rotate += delta;
            } else if self.buttons[1] || self.buttons[2] {
                self.frame.pan += delta;
            }
        }
        self.position = Some(new_pos);
    }

    /// Process a `MouseInput` event. Buttons other than left, right and
    /// middle are ignored.
    pub fn on_button(&mut self, button: MouseButton, state: ElementState) {
        if let Some(idx) = button_index(button) {
            self.buttons[idx] = state.is_pressed();
        }
    }

    /// Process a `MouseWheel` event.
    pub fn on_scroll(&mut self, delta: MouseScrollDelta) {
        self.frame.zoom += match delta {
            MouseScrollDelta::LineDelta(_x, y) => y,
            MouseScrollDelta::PixelDelta(pos) => (pos.y / PIXELS_PER_LINE) as f32,
        };
    }

    /// Process a `CursorLeft` event. The next move starts a fresh drag.
    pub fn on_cursor_left(&mut self) {
        self.position = None;
    }

    /// Release every button, e.g. when the window loses focus mid-drag.
    pub fn on_focus_lost(&mut self) {
        self.buttons = [false; 3];
    }

    /// Drain the gestures accumulated this frame.
    pub fn take_frame(&mut self) -> PointerFrame {
        std::mem::take(&mut self.frame)
    }

    #[must_use]
    pub fn position(&self) -> Option<Vec2> {
        self.position
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use winit::dpi::PhysicalPosition;

    #[test]
    fn test_move_without_button_is_idle() {
        let mut ps = PointerState::new();
        ps.on_cursor_moved(10.0, 10.0);
        ps.on_cursor_moved(50.0, 20.0);
        assert_eq!(ps.position(), Some(Vec2::new(50.0, 20.0)));
        assert!(ps.take_frame().is_idle());
    }

    #[test]
    fn test_left_drag_rotates() {
        let mut ps = PointerState::new();
        ps.on_cursor_moved(100.0, 100.0);
        ps.on_button(MouseButton::Left, ElementState::Pressed);
        ps.on_cursor_moved(110.0, 95.0);
        ps.on_cursor_moved(115.0, 95.0);
        let frame = ps.take_frame();
        assert_eq!(frame.rotate, Vec2::new(15.0, -5.0));
        assert_eq!(frame.pan, Vec2::ZERO);
    }

    #[test]
    fn test_right_and_middle_drag_pan() {
        let mut ps = PointerState::new();
        ps.on_cursor_moved(0.0, 0.0);
        ps.on_button(MouseButton::Right, ElementState::Pressed);
        ps.on_cursor_moved(4.0, 0.0);
        ps.on_button(MouseButton::Right, ElementState::Released);
        ps.on_button(MouseButton::Middle, ElementState::Pressed);
        ps.on_cursor_moved(4.0, 6.0);
        let frame = ps.take_frame();
        assert_eq!(frame.pan, Vec2::new(4.0, 6.0));
        assert_eq!(frame.rotate, Vec2::ZERO);
    }

    #[test]
    fn test_first_move_after_press_has_no_jump() {
        let mut ps = PointerState::new();
        ps.on_button(MouseButton::Left, ElementState::Pressed);
        ps.on_cursor_moved(500.0, 300.0);
        assert!(ps.take_frame().is_idle());
    }

    #[test]
    fn test_scroll_accumulates_and_drains() {
        let mut ps = PointerState::new();
        ps.on_scroll(MouseScrollDelta::LineDelta(0.0, 1.0));
        ps.on_scroll(MouseScrollDelta::PixelDelta(PhysicalPosition::new(0.0, 20.0)));
        let frame = ps.take_frame();
        assert!((frame.zoom - 1.5).abs() < f32::EPSILON);
        assert_eq!(ps.take_frame(), PointerFrame::default());
    }

    #[test]
    fn test_focus_lost_ends_drag() {
        let mut ps = PointerState::new();
        ps.on_cursor_moved(0.0, 0.0);
        ps.on_button(MouseButton::Left, ElementState::Pressed);
        ps.on_focus_lost();
        assert_eq!(ps.buttons, [false; 3]);
        ps.on_cursor_moved(30.0, 30.0);
        assert!(ps.take_frame().is_idle());
    }

    #[test]
    fn test_cursor_left_restarts_drag() {
        let mut ps = PointerState::new();
        ps.on_cursor_moved(5.0, 5.0);
        ps.on_button(MouseButton::Left, ElementState::Pressed);
        ps.on_cursor_left();
        assert_eq!(ps.position(), None);

        // Re-entering far away must not register the gap as a drag
        ps.on_cursor_moved(300.0, 200.0);
        assert!(ps.take_frame().is_idle());
        ps.on_cursor_moved(302.0, 200.0);
        assert_eq!(ps.take_frame().rotate, Vec2::new(2.0, 0.0));
    }

    #[test]
    fn test_unknown_buttons_ignored() {
        let mut ps = PointerState::new();
        ps.on_button(MouseButton::Back, ElementState::Pressed);
        assert_eq!(ps.buttons, [false; 3]);
    }
}

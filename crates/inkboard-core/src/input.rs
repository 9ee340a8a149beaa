//! Platform-neutral input events and state.

use kurbo::{Point, Vec2};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Pointer button identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PointerButton {
    #[default]
    Primary,
    Secondary,
    Middle,
}

/// Modifier keys state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Modifiers {
    pub shift: bool,
    pub ctrl: bool,
    pub alt: bool,
    pub meta: bool,
}

impl Modifiers {
    pub const NONE: Modifiers = Modifiers {
        shift: false,
        ctrl: false,
        alt: false,
        meta: false,
    };

    pub fn shift() -> Self {
        Self {
            shift: true,
            ..Self::NONE
        }
    }

    pub fn alt() -> Self {
        Self {
            alt: true,
            ..Self::NONE
        }
    }

    pub fn ctrl() -> Self {
        Self {
            ctrl: true,
            ..Self::NONE
        }
    }

    /// Ctrl on most platforms, Cmd on macOS.
    pub fn command(&self) -> bool {
        self.ctrl || self.meta
    }
}

/// A pointer event in screen coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PointerEvent {
    pub position: Point,
    #[serde(default)]
    pub button: PointerButton,
    #[serde(default)]
    pub modifiers: Modifiers,
    /// Milliseconds on a monotonic host clock.
    #[serde(default)]
    pub timestamp_ms: u64,
}

impl PointerEvent {
    pub fn new(position: Point) -> Self {
        Self {
            position,
            button: PointerButton::Primary,
            modifiers: Modifiers::NONE,
            timestamp_ms: 0,
        }
    }

    pub fn with_modifiers(mut self, modifiers: Modifiers) -> Self {
        self.modifiers = modifiers;
        self
    }

    pub fn with_button(mut self, button: PointerButton) -> Self {
        self.button = button;
        self
    }

    pub fn at(mut self, timestamp_ms: u64) -> Self {
        self.timestamp_ms = timestamp_ms;
        self
    }
}

/// Keys the engine reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Key {
    Escape,
    Enter,
    Delete,
    Backspace,
    ArrowUp,
    ArrowDown,
    ArrowLeft,
    ArrowRight,
    Space,
    Tab,
    Character(char),
}

impl Key {
    /// Nudge direction of an arrow key.
    pub fn arrow_direction(self) -> Option<Vec2> {
        match self {
            Key::ArrowUp => Some(Vec2::new(0.0, -1.0)),
            Key::ArrowDown => Some(Vec2::new(0.0, 1.0)),
            Key::ArrowLeft => Some(Vec2::new(-1.0, 0.0)),
            Key::ArrowRight => Some(Vec2::new(1.0, 0.0)),
            _ => None,
        }
    }
}

/// Detects double-clicks from event timestamps and positions.
#[derive(Debug, Clone, Copy)]
pub struct ClickTracker {
    max_interval_ms: u64,
    max_distance: f64,
    last: Option<(u64, Point)>,
}

impl ClickTracker {
    pub fn new(max_interval_ms: u64, max_distance: f64) -> Self {
        Self {
            max_interval_ms,
            max_distance,
            last: None,
        }
    }

    /// Register a primary press; returns whether it completes a
    /// double-click. A detected double-click resets the tracker so a third
    /// click starts over.
    pub fn register(&mut self, timestamp_ms: u64, position: Point) -> bool {
        let is_double = self.last.is_some_and(|(time, pos)| {
            timestamp_ms.saturating_sub(time) < self.max_interval_ms
                && (position - pos).hypot() < self.max_distance
        });
        self.last = if is_double {
            None
        } else {
            Some((timestamp_ms, position))
        };
        is_double
    }

    pub fn reset(&mut self) {
        self.last = None;
    }
}

/// Tracks pressed buttons, keys and the pointer across events.
#[derive(Debug, Clone, Default)]
pub struct InputState {
    /// Current pointer position in screen coordinates.
    pub pointer_position: Point,
    pub modifiers: Modifiers,
    pressed_buttons: HashSet<PointerButton>,
    pressed_keys: HashSet<Key>,
}

impl InputState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn press_button(&mut self, button: PointerButton, position: Point) {
        self.pointer_position = position;
        self.pressed_buttons.insert(button);
    }

    /// Returns whether the button was held.
    pub fn release_button(&mut self, button: PointerButton, position: Point) -> bool {
        self.pointer_position = position;
        self.pressed_buttons.remove(&button)
    }

    pub fn move_pointer(&mut self, position: Point) {
        self.pointer_position = position;
    }

    /// Returns whether the key was not already held.
    pub fn press_key(&mut self, key: Key) -> bool {
        self.pressed_keys.insert(key)
    }

    pub fn release_key(&mut self, key: Key) {
        self.pressed_keys.remove(&key);
    }

    pub fn is_button_pressed(&self, button: PointerButton) -> bool {
        self.pressed_buttons.contains(&button)
    }

    pub fn is_key_pressed(&self, key: Key) -> bool {
        self.pressed_keys.contains(&key)
    }

    /// Forget everything held, as after focus loss.
    pub fn clear(&mut self) {
        self.pressed_buttons.clear();
        self.pressed_keys.clear();
        self.modifiers = Modifiers::NONE;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_double_click_detection() {
        let mut clicks = ClickTracker::new(500, 5.0);
        assert!(!clicks.register(1000, Point::new(10.0, 10.0)));
        assert!(clicks.register(1200, Point::new(12.0, 11.0)));
        // Third click starts over.
        assert!(!clicks.register(1300, Point::new(12.0, 11.0)));
    }

    #[test]
    fn test_slow_or_distant_clicks_are_single() {
        let mut clicks = ClickTracker::new(500, 5.0);
        clicks.register(0, Point::ZERO);
        assert!(!clicks.register(600, Point::ZERO));
        assert!(!clicks.register(700, Point::new(50.0, 0.0)));
    }

    #[test]
    fn test_button_press_and_release() {
        let mut input = InputState::new();
        input.press_button(PointerButton::Primary, Point::new(100.0, 100.0));
        assert!(input.is_button_pressed(PointerButton::Primary));
        assert!(!input.is_button_pressed(PointerButton::Middle));
        assert!(input.release_button(PointerButton::Primary, Point::new(100.0, 100.0)));
        assert!(!input.release_button(PointerButton::Primary, Point::new(100.0, 100.0)));
    }

    #[test]
    fn test_clear_drops_held_keys() {
        let mut input = InputState::new();
        assert!(input.press_key(Key::Space));
        assert!(!input.press_key(Key::Space));
        input.modifiers = Modifiers::shift();
        input.clear();
        assert!(!input.is_key_pressed(Key::Space));
        assert_eq!(input.modifiers, Modifiers::NONE);
    }

    #[test]
    fn test_pointer_event_from_json_defaults() {
        let event: PointerEvent = serde_json::from_str(r#"{ "position": { "x": 1.0, "y": 2.0 } }"#).unwrap();
        assert_eq!(event.button, PointerButton::Primary);
        assert_eq!(event.timestamp_ms, 0);
    }
}

//! winit event adapter.
//!
//! Translates window events into engine calls. Cursor moves are queued and
//! applied once per redraw, so a burst of moves between frames costs one
//! update.

use crate::engine::Engine;
use crate::input::{Key, Modifiers, PointerButton, PointerEvent};
use kurbo::{Point, Size, Vec2};
use std::time::Instant;
use winit::event::{ElementState, MouseButton, MouseScrollDelta, WindowEvent};
use winit::keyboard::{Key as WinitKey, ModifiersState, NamedKey};

/// Pixels per wheel line.
const LINE_HEIGHT: f64 = 20.0;

pub fn map_button(button: MouseButton) -> Option<PointerButton> {
    match button {
        MouseButton::Left => Some(PointerButton::Primary),
        MouseButton::Right => Some(PointerButton::Secondary),
        MouseButton::Middle => Some(PointerButton::Middle),
        _ => None,
    }
}

pub fn map_modifiers(state: ModifiersState) -> Modifiers {
    Modifiers {
        shift: state.shift_key(),
        ctrl: state.control_key(),
        alt: state.alt_key(),
        meta: state.super_key(),
    }
}

pub fn map_key(key: &WinitKey) -> Option<Key> {
    match key {
        WinitKey::Named(named) => match named {
            NamedKey::Escape => Some(Key::Escape),
            NamedKey::Enter => Some(Key::Enter),
            NamedKey::Delete => Some(Key::Delete),
            NamedKey::Backspace => Some(Key::Backspace),
            NamedKey::ArrowUp => Some(Key::ArrowUp),
            NamedKey::ArrowDown => Some(Key::ArrowDown),
            NamedKey::ArrowLeft => Some(Key::ArrowLeft),
            NamedKey::ArrowRight => Some(Key::ArrowRight),
            NamedKey::Space => Some(Key::Space),
            NamedKey::Tab => Some(Key::Tab),
            _ => None,
        },
        WinitKey::Character(text) => {
            let mut chars = text.chars();
            match (chars.next(), chars.next()) {
                (Some(' '), None) => Some(Key::Space),
                (Some(c), None) => Some(Key::Character(c)),
                _ => None,
            }
        }
        _ => None,
    }
}

/// Wheel delta in screen pixels, positive y scrolling the content up.
pub fn wheel_delta(delta: MouseScrollDelta) -> Vec2 {
    match delta {
        MouseScrollDelta::LineDelta(x, y) => Vec2::new(-x as f64 * LINE_HEIGHT, -y as f64 * LINE_HEIGHT),
        MouseScrollDelta::PixelDelta(pos) => Vec2::new(-pos.x, -pos.y),
    }
}

/// Feeds winit window events to an [`Engine`].
#[derive(Debug)]
pub struct WinitAdapter {
    cursor: Point,
    modifiers: Modifiers,
    started: Instant,
}

impl Default for WinitAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl WinitAdapter {
    pub fn new() -> Self {
        Self {
            cursor: Point::ZERO,
            modifiers: Modifiers::NONE,
            started: Instant::now(),
        }
    }

    pub fn modifiers(&self) -> Modifiers {
        self.modifiers
    }

    fn pointer(&self, button: PointerButton) -> PointerEvent {
        PointerEvent::new(self.cursor)
            .with_button(button)
            .with_modifiers(self.modifiers)
            .at(self.started.elapsed().as_millis() as u64)
    }

    /// Handle one window event. Returns whether a redraw should be requested.
    pub fn handle(&mut self, engine: &mut Engine, event: &WindowEvent) -> bool {
        match event {
            WindowEvent::Resized(size) => {
                engine.set_viewport(Size::new(size.width as f64, size.height as f64));
                true
            }
            WindowEvent::ModifiersChanged(modifiers) => {
                self.modifiers = map_modifiers(modifiers.state());
                false
            }
            WindowEvent::CursorMoved { position, .. } => {
                self.cursor = Point::new(position.x, position.y);
                engine.queue_pointer_move(self.pointer(PointerButton::Primary));
                true
            }
            WindowEvent::MouseInput { state, button, .. } => {
                let Some(button) = map_button(*button) else {
                    return false;
                };
                let event = self.pointer(button);
                match state {
                    ElementState::Pressed => engine.on_pointer_down(event),
                    ElementState::Released => engine.on_pointer_up(event),
                }
                true
            }
            WindowEvent::MouseWheel { delta, .. } => {
                engine.on_wheel(wheel_delta(*delta), self.cursor, self.modifiers);
                true
            }
            WindowEvent::KeyboardInput { event, .. } => {
                let Some(key) = map_key(&event.logical_key) else {
                    log::trace!("Unmapped key {:?}", event.logical_key);
                    return false;
                };
                match event.state {
                    ElementState::Pressed => engine.on_key_down(key, self.modifiers),
                    ElementState::Released => engine.on_key_up(key, self.modifiers),
                }
                true
            }
            WindowEvent::Focused(false) | WindowEvent::CursorLeft { .. } => {
                engine.on_blur();
                true
            }
            WindowEvent::RedrawRequested => {
                engine.flush_frame();
                false
            }
            _ => false,
        }
    }
}

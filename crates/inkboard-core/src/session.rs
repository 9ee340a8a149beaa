//! Per-gesture state.
//!
//! A [`PointerSession`] lives from pointer-down to pointer-up (or forced
//! cleanup). It owns a [`GestureGuard`]; dropping the session releases the
//! gesture listeners no matter how the gesture ended.

use crate::element::{Element, ElementId};
use crate::handles::HandleKind;
use crate::input::Modifiers;
use kurbo::{Point, Rect, Vec2};
use std::cell::Cell;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

/// Counts gesture listeners currently held.
#[derive(Debug, Clone, Default)]
pub struct ListenerRegistry {
    active: Rc<Cell<usize>>,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register move/up listeners for one gesture.
    pub fn acquire(&self) -> GestureGuard {
        self.active.set(self.active.get() + 1);
        GestureGuard {
            active: Rc::clone(&self.active),
        }
    }

    /// Number of guards alive.
    pub fn active(&self) -> usize {
        self.active.get()
    }
}

/// Releases its gesture listeners on drop.
#[derive(Debug)]
pub struct GestureGuard {
    active: Rc<Cell<usize>>,
}

impl Drop for GestureGuard {
    fn drop(&mut self) {
        self.active.set(self.active.get().saturating_sub(1));
    }
}

/// What the current gesture does.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionMode {
    /// Rubber-band selection from an empty spot.
    BoxSelect {
        /// Selection before the gesture, kept when shift is held.
        base: HashSet<ElementId>,
    },
    /// Translate the selection.
    Drag {
        /// Alt held at pointer-down: duplicate on the first move.
        duplicate: bool,
        /// Selection had the hit element before this press.
        was_selected: bool,
    },
    Resize {
        handle: HandleKind,
        /// Common bounds at gesture start.
        bounds: Rect,
    },
    Rotate {
        /// Rotation pivot for multi-element selections.
        pivot: Point,
    },
    /// Move one point of a selected line or connector.
    PointEdit {
        element_id: ElementId,
        index: usize,
    },
    Crop {
        element_id: ElementId,
        handle: HandleKind,
    },
    /// Drag out a box shape, frame or embed.
    CreateBox { element_id: ElementId },
    /// Drag out a line or connector.
    CreateLinear { element_id: ElementId },
    CreateFreehand { element_id: ElementId },
    Erase,
    Laser,
    Pan { last_screen: Point },
    /// Handled entirely on pointer-down.
    Inert,
}

/// State of one pointer gesture.
#[derive(Debug)]
pub struct PointerSession {
    /// Scene-space origin.
    pub origin: Point,
    /// Origin snapped to the grid (equal to `origin` without grid snapping).
    pub origin_grid: Point,
    /// Last scene-space pointer position.
    pub last: Point,
    pub modifiers: Modifiers,
    /// Topmost element hit at pointer-down.
    pub hit: Option<ElementId>,
    /// Every element hit at pointer-down, topmost first.
    pub hits: Vec<ElementId>,
    /// Deep copies of every affected element at gesture start.
    pub snapshot: HashMap<ElementId, Element>,
    /// Ids in `snapshot`, back to front.
    pub order: Vec<ElementId>,
    pub handle: Option<HandleKind>,
    /// Pointer-down position minus the grabbed handle's position.
    pub handle_offset: Vec2,
    pub drag_occurred: bool,
    pub mode: SessionMode,
    _guard: GestureGuard,
}

impl PointerSession {
    pub fn new(origin: Point, origin_grid: Point, modifiers: Modifiers, mode: SessionMode, guard: GestureGuard) -> Self {
        Self {
            origin,
            origin_grid,
            last: origin,
            modifiers,
            hit: None,
            hits: Vec::new(),
            snapshot: HashMap::new(),
            order: Vec::new(),
            handle: None,
            handle_offset: Vec2::ZERO,
            drag_occurred: false,
            mode,
            _guard: guard,
        }
    }

    /// Record the starting state of the given elements.
    pub fn capture<'a>(&mut self, elements: impl IntoIterator<Item = &'a Element>) {
        for element in elements {
            if self.snapshot.insert(element.id, element.clone()).is_none() {
                self.order.push(element.id);
            }
        }
    }

    /// Snapshot elements back to front.
    pub fn originals(&self) -> Vec<&Element> {
        self.order.iter().filter_map(|id| self.snapshot.get(id)).collect()
    }

    pub fn original(&self, id: ElementId) -> Option<&Element> {
        self.snapshot.get(&id)
    }

    pub fn ids(&self) -> HashSet<ElementId> {
        self.order.iter().copied().collect()
    }

    /// Forget the captured elements.
    pub fn clear_capture(&mut self) {
        self.snapshot.clear();
        self.order.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guard_released_on_drop() {
        let registry = ListenerRegistry::new();
        {
            let _guard = registry.acquire();
            assert_eq!(registry.active(), 1);
        }
        assert_eq!(registry.active(), 0);
    }

    #[test]
    fn test_session_owns_guard() {
        let registry = ListenerRegistry::new();
        let session = PointerSession::new(Point::ZERO, Point::ZERO, Modifiers::NONE, SessionMode::Inert, registry.acquire());
        assert_eq!(registry.active(), 1);
        drop(session);
        assert_eq!(registry.active(), 0);
    }

    #[test]
    fn test_capture_keeps_first_snapshot() {
        let registry = ListenerRegistry::new();
        let mut session = PointerSession::new(Point::ZERO, Point::ZERO, Modifiers::NONE, SessionMode::Erase, registry.acquire());
        let mut rect = Element::rectangle(0.0, 0.0, 10.0, 10.0);
        session.capture([&rect]);
        rect.x = 50.0;
        session.capture([&rect]);
        assert_eq!(session.originals().len(), 1);
        assert!(session.original(rect.id).is_some_and(|e| e.x == 0.0));
    }
}

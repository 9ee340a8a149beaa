//! Reference undo/redo history driven by commit directives.
//!
//! The engine never owns history; it tags every batch with a
//! [`CommitDirective`]. This snapshot stack is a minimal consumer for
//! hosts and tests.

use crate::element::Element;
use crate::scene::{CommitDirective, SceneChange};

/// Maximum number of undo states to keep.
pub const MAX_UNDO_HISTORY: usize = 50;

#[derive(Debug, Clone)]
pub struct History {
    /// State after the last recorded entry.
    baseline: Vec<Element>,
    undo_stack: Vec<Vec<Element>>,
    redo_stack: Vec<Vec<Element>>,
    max_depth: usize,
}

impl Default for History {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl History {
    pub fn new(initial: Vec<Element>) -> Self {
        Self {
            baseline: initial,
            undo_stack: Vec::new(),
            redo_stack: Vec::new(),
            max_depth: MAX_UNDO_HISTORY,
        }
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth.max(1);
        self
    }

    /// Consume one change notification. `snapshot` is the scene state the
    /// change produced.
    pub fn record(&mut self, change: &SceneChange, snapshot: Vec<Element>) {
        match change.commit {
            CommitDirective::None => {}
            CommitDirective::UpdateSnapshot => self.baseline = snapshot,
            CommitDirective::CaptureIncrement => {
                if snapshot == self.baseline {
                    return;
                }
                let previous = std::mem::replace(&mut self.baseline, snapshot);
                self.undo_stack.push(previous);
                self.redo_stack.clear();
                if self.undo_stack.len() > self.max_depth {
                    self.undo_stack.remove(0);
                }
                log::trace!("History entry recorded ({} undoable)", self.undo_stack.len());
            }
        }
    }

    /// Step back. Returns the elements to restore.
    pub fn undo(&mut self) -> Option<Vec<Element>> {
        let previous = self.undo_stack.pop()?;
        let current = std::mem::replace(&mut self.baseline, previous.clone());
        self.redo_stack.push(current);
        Some(previous)
    }

    /// Step forward. Returns the elements to restore.
    pub fn redo(&mut self) -> Option<Vec<Element>> {
        let next = self.redo_stack.pop()?;
        let current = std::mem::replace(&mut self.baseline, next.clone());
        self.undo_stack.push(current);
        Some(next)
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn change(commit: CommitDirective) -> SceneChange {
        SceneChange {
            version: 1,
            changed: Vec::new(),
            commit,
        }
    }

    #[test]
    fn test_undo_add_element() {
        let mut history = History::default();
        let rect = Element::rectangle(0.0, 0.0, 100.0, 100.0);
        history.record(&change(CommitDirective::CaptureIncrement), vec![rect.clone()]);
        assert!(history.can_undo());

        let restored = history.undo().unwrap();
        assert!(restored.is_empty());
        assert!(history.can_redo());

        let redone = history.redo().unwrap();
        assert_eq!(redone, vec![rect]);
    }

    #[test]
    fn test_render_only_changes_are_ignored() {
        let mut history = History::default();
        let rect = Element::rectangle(0.0, 0.0, 100.0, 100.0);
        history.record(&change(CommitDirective::None), vec![rect]);
        assert!(!history.can_undo());
    }

    #[test]
    fn test_update_snapshot_moves_baseline_without_entry() {
        let mut history = History::default();
        let rect = Element::rectangle(0.0, 0.0, 100.0, 100.0);
        history.record(&change(CommitDirective::UpdateSnapshot), vec![rect.clone()]);
        assert!(!history.can_undo());
        history.record(&change(CommitDirective::CaptureIncrement), vec![rect]);
        assert!(!history.can_undo());
    }

    #[test]
    fn test_new_entry_clears_redo() {
        let mut history = History::default();
        let a = Element::rectangle(0.0, 0.0, 10.0, 10.0);
        let b = Element::rectangle(50.0, 50.0, 10.0, 10.0);
        history.record(&change(CommitDirective::CaptureIncrement), vec![a.clone()]);
        history.undo();
        assert!(history.can_redo());
        history.record(&change(CommitDirective::CaptureIncrement), vec![b]);
        assert!(!history.can_redo());
    }

    #[test]
    fn test_depth_is_bounded() {
        let mut history = History::default().with_max_depth(3);
        for i in 0..10 {
            let rect = Element::rectangle(i as f64, 0.0, 10.0, 10.0);
            history.record(&change(CommitDirective::CaptureIncrement), vec![rect]);
        }
        let mut undos = 0;
        while history.undo().is_some() {
            undos += 1;
        }
        assert_eq!(undos, 3);
    }
}

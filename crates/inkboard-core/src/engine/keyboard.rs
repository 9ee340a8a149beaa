//! Keyboard commands.

use super::{Engine, EngineEvent};
use crate::element::ElementId;
use crate::frame::update_frame_membership;
use crate::group::{element_ids_in_group, group_elements, ungroup};
use crate::input::{Key, Modifiers};
use crate::scene::CommitDirective;
use crate::selection::normalize_selection;
use crate::tools::ToolKind;
use kurbo::Vec2;
use std::collections::HashSet;

impl Engine {
    pub fn on_key_down(&mut self, key: Key, modifiers: Modifiers) {
        self.input.modifiers = modifiers;
        self.input.press_key(key);
        if self.editing_text.is_some() {
            // Keys belong to the host's text editor.
            return;
        }
        match key {
            Key::Escape => self.escape(),
            Key::Enter => self.enter(),
            Key::Delete | Key::Backspace => {
                if self.session.is_none() {
                    self.delete_selection();
                }
            }
            Key::ArrowUp | Key::ArrowDown | Key::ArrowLeft | Key::ArrowRight => {
                if let Some(direction) = key.arrow_direction() {
                    self.nudge(direction, modifiers);
                }
            }
            Key::Character(c) => self.character(c, modifiers),
            Key::Space | Key::Tab => {}
        }
    }

    pub fn on_key_up(&mut self, key: Key, modifiers: Modifiers) {
        self.input.modifiers = modifiers;
        self.input.release_key(key);
    }

    fn escape(&mut self) {
        if self.multi_point.is_some() {
            self.finalize_multi_point();
        } else if self.crop_target.take().is_some() {
            log::debug!("Left crop mode");
        } else if self.session.is_some() {
            // Mid-gesture escape waits for the pointer release.
        } else if let Some(group) = self.selection.editing_group_id() {
            self.selection.set_editing_group(None);
            self.selection.select_all_of(element_ids_in_group(&self.scene, group));
            normalize_selection(&self.scene, &mut self.selection);
        } else {
            self.selection.clear();
            self.tool.set(ToolKind::Select);
        }
    }

    fn enter(&mut self) {
        if self.multi_point.is_some() {
            self.finalize_multi_point();
            return;
        }
        if self.crop_target.take().is_some() {
            return;
        }
        let only = match self.scene.selected(&self.selection).collect::<Vec<_>>().as_slice() {
            [only] => Some((only.id, only.is_image(), only.is_text(), only.bound_text_id())),
            _ => None,
        };
        match only {
            Some((id, true, _, _)) => self.crop_target = Some(id),
            Some((id, _, true, _)) => self.request_text_edit(id),
            Some((_, _, _, Some(text))) => self.request_text_edit(text),
            _ => {}
        }
    }

    fn delete_selection(&mut self) {
        let ids = self.selection_closure();
        if ids.is_empty() {
            return;
        }
        for &id in &ids {
            self.scene.delete(id);
        }
        self.scene.prune_stale_references();
        self.selection.clear();
        normalize_selection(&self.scene, &mut self.selection);
        if self.crop_target.is_some_and(|id| !self.scene.is_live(id)) {
            self.crop_target = None;
        }
        self.commit(CommitDirective::CaptureIncrement);
        log::debug!("Deleted {} element(s)", ids.len());
    }

    /// Move the selection by one step: the grid size in grid mode,
    /// otherwise the configured amount (larger with shift).
    fn nudge(&mut self, direction: Vec2, modifiers: Modifiers) {
        if self.selection.is_empty() || self.session.is_some() {
            return;
        }
        let step = if self.config.snap_mode.snaps_to_grid() {
            self.config.grid_size
        } else if modifiers.shift {
            self.config.shift_translate_amount
        } else {
            self.config.translate_amount
        };
        let delta = direction * step;
        let moved: HashSet<ElementId> = self.selection_closure().into_iter().collect();
        for &id in &moved {
            self.scene.mutate(id, |e| e.translate(delta));
        }
        self.finish_transform(&moved);
    }

    fn character(&mut self, c: char, modifiers: Modifiers) {
        if modifiers.command() {
            match c.to_ascii_lowercase() {
                'a' => self.select_all(),
                'g' if modifiers.shift => self.ungroup_selection(),
                'g' => self.group_selection(),
                'd' => self.duplicate_selection(),
                ']' | '}' => self.reorder_selection(true, modifiers.shift),
                '[' | '{' => self.reorder_selection(false, modifiers.shift),
                _ => {}
            }
            return;
        }
        if self.session.is_some() {
            return;
        }
        match c {
            ']' => self.reorder_selection(true, false),
            '[' => self.reorder_selection(false, false),
            'q' | 'Q' => {
                self.tool.locked = !self.tool.locked;
                self.events.push(EngineEvent::Notice {
                    message: format!("Tool lock {}", if self.tool.locked { "on" } else { "off" }),
                });
            }
            _ => {
                if let Some(tool) = ToolKind::from_shortcut(c) {
                    self.set_tool(tool);
                }
            }
        }
    }

    /// Select every live, unlocked element inside the entered group, or
    /// the whole scene.
    pub fn select_all(&mut self) {
        let editing = self.selection.editing_group_id();
        let ids: Vec<ElementId> = self
            .scene
            .non_deleted()
            .filter(|e| !e.locked && e.container_id().is_none())
            .filter(|e| editing.is_none_or(|g| e.group_ids.contains(&g)))
            .map(|e| e.id)
            .collect();
        self.selection.select_all_of(ids);
        normalize_selection(&self.scene, &mut self.selection);
    }

    fn group_selection(&mut self) {
        let ids = self.selection.element_ids().clone();
        let editing = self.selection.editing_group_id();
        if group_elements(&mut self.scene, &ids, editing).is_some() {
            normalize_selection(&self.scene, &mut self.selection);
            self.commit(CommitDirective::CaptureIncrement);
        }
    }

    fn ungroup_selection(&mut self) {
        let groups = self.selection.group_ids().clone();
        if groups.is_empty() {
            return;
        }
        let released = ungroup(&mut self.scene, &groups);
        self.selection.select_all_of(released);
        normalize_selection(&self.scene, &mut self.selection);
        self.commit(CommitDirective::CaptureIncrement);
    }

    /// Step the selection forward or backward, or all the way with `all`.
    fn reorder_selection(&mut self, forward: bool, all: bool) {
        let ids: HashSet<ElementId> = self.selection_closure().into_iter().collect();
        if ids.is_empty() {
            return;
        }
        match (forward, all) {
            (true, true) => self.scene.bring_to_front(&ids),
            (true, false) => self.scene.bring_forward(&ids),
            (false, true) => self.scene.send_to_back(&ids),
            (false, false) => self.scene.send_backward(&ids),
        }
        update_frame_membership(&mut self.scene, &ids);
        self.commit(CommitDirective::CaptureIncrement);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::Element;
    use kurbo::Point;

    fn engine_with(elements: Vec<Element>) -> Engine {
        let mut engine = Engine::default();
        engine.replace_elements(elements);
        engine
    }

    #[test]
    fn test_arrow_keys_nudge() {
        let rect = Element::rectangle(0.0, 0.0, 10.0, 10.0);
        let id = rect.id;
        let mut engine = engine_with(vec![rect]);
        engine.set_selection([id]);
        engine.on_key_down(Key::ArrowRight, Modifiers::NONE);
        engine.on_key_down(Key::ArrowDown, Modifiers::shift());
        let moved = engine.scene().get(id).unwrap();
        assert_eq!((moved.x, moved.y), (1.0, 5.0));
    }

    #[test]
    fn test_delete_removes_selection() {
        let rect = Element::rectangle(0.0, 0.0, 10.0, 10.0);
        let id = rect.id;
        let mut engine = engine_with(vec![rect]);
        engine.set_selection([id]);
        engine.on_key_down(Key::Delete, Modifiers::NONE);
        assert!(!engine.scene().is_live(id));
        assert!(engine.selection().is_empty());
    }

    #[test]
    fn test_group_then_ungroup() {
        let a = Element::rectangle(0.0, 0.0, 10.0, 10.0);
        let b = Element::rectangle(20.0, 0.0, 10.0, 10.0);
        let (a_id, b_id) = (a.id, b.id);
        let mut engine = engine_with(vec![a, b]);
        engine.set_selection([a_id, b_id]);
        engine.on_key_down(Key::Character('g'), Modifiers::ctrl());
        assert_eq!(engine.selection().group_ids().len(), 1);
        assert_eq!(engine.scene().get(a_id).unwrap().group_ids.len(), 1);

        let ctrl_shift = Modifiers {
            shift: true,
            ..Modifiers::ctrl()
        };
        engine.on_key_down(Key::Character('G'), ctrl_shift);
        assert!(engine.scene().get(a_id).unwrap().group_ids.is_empty());
        assert!(engine.selection().contains(b_id));
    }

    #[test]
    fn test_bring_to_front() {
        let a = Element::rectangle(0.0, 0.0, 10.0, 10.0);
        let b = Element::rectangle(20.0, 0.0, 10.0, 10.0);
        let a_id = a.id;
        let mut engine = engine_with(vec![a, b]);
        engine.set_selection([a_id]);
        let ctrl_shift = Modifiers {
            shift: true,
            ..Modifiers::ctrl()
        };
        engine.on_key_down(Key::Character(']'), ctrl_shift);
        assert_eq!(engine.scene().z_index(a_id), Some(1));
    }

    #[test]
    fn test_duplicate_offsets_copy() {
        let rect = Element::rectangle(0.0, 0.0, 10.0, 10.0);
        let id = rect.id;
        let mut engine = engine_with(vec![rect]);
        engine.set_selection([id]);
        engine.on_key_down(Key::Character('d'), Modifiers::ctrl());
        assert_eq!(engine.scene().live_count(), 2);
        let copy = engine.scene().non_deleted().find(|e| e.id != id).unwrap();
        assert_eq!(copy.origin(), Point::new(10.0, 10.0));
        assert!(engine.selection().contains(copy.id));
    }

    #[test]
    fn test_shortcuts_switch_and_lock_tools() {
        let mut engine = Engine::default();
        engine.on_key_down(Key::Character('r'), Modifiers::NONE);
        assert_eq!(engine.tool(), ToolKind::Rectangle);
        engine.on_key_down(Key::Character('q'), Modifiers::NONE);
        assert!(engine.is_tool_locked());
        engine.on_key_down(Key::Escape, Modifiers::NONE);
        assert_eq!(engine.tool(), ToolKind::Select);
    }
}

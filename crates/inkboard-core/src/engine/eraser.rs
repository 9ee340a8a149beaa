//! Eraser and laser pointer.

use super::Engine;
use crate::element::ElementId;
use crate::group::group_closure;
use crate::input::Modifiers;
use crate::scene::CommitDirective;
use crate::selection::normalize_selection;
use crate::session::{PointerSession, SessionMode};
use kurbo::Point;
use std::collections::HashSet;

impl Engine {
    pub(super) fn eraser_down(&mut self, point: Point, modifiers: Modifiers) {
        self.overlays.pending_erasure.clear();
        self.begin_session(point, modifiers, SessionMode::Erase);
        self.erase_along(point, point, modifiers.alt && self.config.eraser_alt_restores);
    }

    pub(super) fn eraser_move(&mut self, session: &mut PointerSession, point: Point, modifiers: Modifiers) {
        session.drag_occurred = true;
        self.erase_along(session.last, point, modifiers.alt && self.config.eraser_alt_restores);
    }

    /// Sample the pointer path and mark (or with `restore`, unmark) every
    /// element it touches, together with its group and bound text.
    fn erase_along(&mut self, from: Point, to: Point, restore: bool) {
        let step = (self.config.hit_threshold / self.camera.zoom).max(f64::EPSILON);
        let samples = ((to - from).hypot() / step).ceil().max(1.0) as usize;
        let editing = self.selection.editing_group_id();
        let mut touched: HashSet<ElementId> = HashSet::new();
        {
            let opts = self.hit_options();
            for i in 0..=samples {
                let p = from.lerp(to, i as f64 / samples as f64);
                for element in self.hit_tester.hit_test_all(&self.scene, p, &opts) {
                    if touched.contains(&element.id) {
                        continue;
                    }
                    touched.extend(group_closure(&self.scene, element, editing));
                    touched.insert(element.id);
                    touched.extend(element.bound_text_id());
                    touched.extend(element.container_id());
                }
            }
        }
        if restore {
            self.overlays.pending_erasure.retain(|id| !touched.contains(id));
        } else {
            self.overlays.pending_erasure.extend(touched);
        }
    }

    pub(super) fn eraser_up(&mut self) {
        let doomed = std::mem::take(&mut self.overlays.pending_erasure);
        if doomed.is_empty() {
            return;
        }
        // Bound text of grouped members goes too.
        let texts: Vec<ElementId> = doomed
            .iter()
            .filter_map(|id| self.scene.get_live(*id))
            .filter_map(|e| e.bound_text_id())
            .collect();
        let mut count = 0;
        for id in doomed.iter().copied().chain(texts) {
            if self.scene.delete(id) {
                count += 1;
            }
        }
        self.scene.prune_stale_references();
        normalize_selection(&self.scene, &mut self.selection);
        if self.crop_target.is_some_and(|id| !self.scene.is_live(id)) {
            self.crop_target = None;
        }
        self.commit(CommitDirective::CaptureIncrement);
        log::debug!("Erased {} element(s)", count);
    }

    pub(super) fn laser_down(&mut self, point: Point, modifiers: Modifiers) {
        self.overlays.laser_trail.clear();
        self.overlays.laser_trail.push(point);
        self.begin_session(point, modifiers, SessionMode::Laser);
    }

    pub(super) fn laser_move(&mut self, point: Point) {
        let trail = &mut self.overlays.laser_trail;
        trail.push(point);
        let max = self.config.laser_trail_length.max(1);
        if trail.len() > max {
            let excess = trail.len() - max;
            trail.drain(..excess);
        }
    }
}

//! Selection tool gestures: click, rubber band, drag, handles, crop and
//! double-click.

use super::Engine;
use super::duplicate::copy_elements;
use crate::binding::{commit_bindings, connectors_bound_to, refresh_connector};
use crate::elbow::compute_elbow_path;
use crate::element::{Element, ElementId, Endpoint};
use crate::frame::{elements_adopted_by, frames_overlapping, refit_frames, update_frame_membership};
use crate::group::{group_closure, selectable_group};
use crate::handles::{
    Handle, HandleKind, element_handles, hit_test_handles, selection_bounds, selection_handles,
};
use crate::hit_test::{elements_within, hit_padded_bounds};
use crate::input::Modifiers;
use crate::scene::CommitDirective;
use crate::selection::normalize_selection;
use crate::session::{PointerSession, SessionMode};
use crate::snap::snap_line_endpoint;
use crate::transform::{
    ResizeModifiers, crop_image, move_linear_point, resize_element, resize_elements,
    rotate_element, rotate_elements,
};
use kurbo::{Point, Rect, Vec2};
use std::collections::HashSet;

impl Engine {
    pub(super) fn select_down(&mut self, point: Point, modifiers: Modifiers) {
        if self.crop_target.is_some() && self.crop_down(point, modifiers) {
            return;
        }
        if self.handle_down(point, modifiers) {
            return;
        }

        let (hit, hits) = {
            let opts = self.hit_options().with_selection(&self.selection);
            let hits: Vec<ElementId> = self
                .hit_tester
                .hit_test_all(&self.scene, point, &opts)
                .iter()
                .map(|e| e.id)
                .collect();
            let hit = self.hit_tester.hit_test(&self.scene, point, &opts).map(|e| e.id);
            (hit, hits)
        };

        match hit {
            Some(id) => self.select_hit(point, id, hits, modifiers),
            None => {
                let base = if modifiers.shift {
                    self.selection.element_ids().clone()
                } else {
                    self.selection.clear();
                    self.selection.set_editing_group(None);
                    HashSet::new()
                };
                self.begin_session(point, modifiers, SessionMode::BoxSelect { base });
            }
        }
    }

    fn select_hit(&mut self, point: Point, id: ElementId, hits: Vec<ElementId>, modifiers: Modifiers) {
        let Some(element) = self.scene.get_live(id).cloned() else {
            return;
        };
        let was_selected = self.selection.contains(id);
        if modifiers.shift {
            if was_selected {
                let closure = group_closure(&self.scene, &element, self.selection.editing_group_id());
                self.selection.remove_all(&closure);
            } else {
                // A member replaces its selected frame.
                if let Some(frame) = element.frame_id.filter(|f| self.selection.contains(*f)) {
                    self.selection.remove(frame);
                }
                self.selection.add(id);
            }
        } else if !was_selected {
            self.selection.select_only(id);
        }
        normalize_selection(&self.scene, &mut self.selection);

        if !self.selection.contains(id) {
            self.begin_session(point, modifiers, SessionMode::Inert);
            return;
        }

        let originals: Vec<Element> = self
            .selection_closure()
            .into_iter()
            .filter_map(|id| self.scene.get_live(id).cloned())
            .collect();
        let session = self.begin_session(
            point,
            modifiers,
            SessionMode::Drag {
                duplicate: modifiers.alt,
                was_selected,
            },
        );
        session.hit = Some(id);
        session.hits = hits;
        session.capture(&originals);
    }

    pub(super) fn box_select_move(&mut self, session: &mut PointerSession, base: &HashSet<ElementId>, point: Point) {
        session.drag_occurred = true;
        let area = Rect::from_points(session.origin, point);
        let editing = self.selection.editing_group_id();
        let inside: Vec<ElementId> = elements_within(&self.scene, area)
            .into_iter()
            .filter(|e| editing.is_none_or(|g| e.group_ids.contains(&g)))
            .map(|e| e.id)
            .collect();
        self.selection.select_all_of(base.iter().copied().chain(inside));
        normalize_selection(&self.scene, &mut self.selection);
        self.overlays.selection_box = Some(area);
    }

    pub(super) fn drag_move(&mut self, session: &mut PointerSession, duplicate: bool, point: Point, modifiers: Modifiers) {
        let mut delta = point - session.origin;
        if !session.drag_occurred {
            if delta == Vec2::ZERO {
                return;
            }
            session.drag_occurred = true;
            if duplicate && modifiers.alt {
                self.duplicate_for_drag(session);
            }
        }
        if modifiers.shift {
            if delta.x.abs() > delta.y.abs() {
                delta.y = 0.0;
            } else {
                delta.x = 0.0;
            }
        }

        let moving = session.ids();
        let originals = session.originals();
        if self.snapping(modifiers) && !modifiers.shift {
            let bounds = originals
                .iter()
                .filter(|e| e.container_id().is_none())
                .map(|e| e.bounds())
                .reduce(|acc, b| acc.union(b));
            if let Some(bounds) = bounds {
                let visible = self.visible_area();
                self.snap.prepare(&self.scene, &moving, visible);
                let outcome = self.snap.snap_bounds(bounds + delta, self.snap_query());
                delta += outcome.offset;
                self.overlays.snap_lines = outcome.lines;
            }
        }

        for original in &originals {
            let (x, y) = (original.x + delta.x, original.y + delta.y);
            self.scene.mutate(original.id, |e| {
                e.x = x;
                e.y = y;
            });
        }
        self.follow_bound_connectors(&moving);

        self.overlays.suggested_bindings = match moving.iter().next() {
            Some(&only) if moving.len() == 1 => {
                self.endpoint_suggestions(only, &[Endpoint::Start, Endpoint::End], &moving)
            }
            _ => Vec::new(),
        };
        let current: Vec<&Element> = moving.iter().filter_map(|id| self.scene.get_live(*id)).collect();
        self.overlays.frame_highlights = frames_overlapping(&self.scene, &current, &moving);
        self.commit(CommitDirective::None);
    }

    /// Alt-drag: the copies follow the pointer, the originals stay put.
    fn duplicate_for_drag(&mut self, session: &mut PointerSession) {
        let ids = session.ids();
        let mapping = copy_elements(&mut self.scene, &ids, Vec2::ZERO);
        let copies: Vec<Element> = session
            .order
            .iter()
            .filter_map(|id| mapping.get(id))
            .filter_map(|copy| self.scene.get_live(*copy).cloned())
            .collect();
        session.clear_capture();
        session.capture(&copies);
        session.hit = session.hit.and_then(|id| mapping.get(&id).copied());
        let selected: Vec<ElementId> = self
            .selection
            .element_ids()
            .iter()
            .filter_map(|id| mapping.get(id).copied())
            .collect();
        self.selection.select_all_of(selected);
        normalize_selection(&self.scene, &mut self.selection);
        self.snap.invalidate();
        log::debug!("Duplicated {} element(s) for drag", copies.len());
    }

    pub(super) fn drag_up(&mut self, session: &PointerSession, was_selected: bool, modifiers: Modifiers) {
        if !session.drag_occurred {
            // A plain click inside a multi-selection narrows it to the hit.
            if was_selected && !modifiers.shift && self.selection.len() > 1 {
                let closure = session
                    .hit
                    .and_then(|id| self.scene.get_live(id))
                    .map(|hit| group_closure(&self.scene, hit, self.selection.editing_group_id()));
                if let Some(closure) = closure {
                    self.selection.select_all_of(closure);
                }
            }
            return;
        }
        self.finish_transform(&session.ids());
    }

    /// Refresh connectors attached to `moving` that are not moving themselves.
    pub(super) fn follow_bound_connectors(&mut self, moving: &HashSet<ElementId>) {
        let followers: Vec<ElementId> = connectors_bound_to(&self.scene, moving)
            .into_iter()
            .filter(|c| !moving.contains(c))
            .collect();
        for id in followers {
            refresh_connector(&mut self.scene, id);
        }
    }

    /// Settle bindings and frame membership after elements moved, then
    /// record an undo step.
    pub(super) fn finish_transform(&mut self, moved: &HashSet<ElementId>) {
        if self.config.bindings_enabled {
            let connectors: Vec<ElementId> = moved
                .iter()
                .copied()
                .filter(|id| self.scene.get_live(*id).is_some_and(Element::is_connector))
                .collect();
            for id in connectors {
                commit_bindings(&mut self.scene, id, self.camera.zoom);
            }
        }
        self.follow_bound_connectors(moved);
        update_frame_membership(&mut self.scene, moved);
        let frames: HashSet<ElementId> = moved
            .iter()
            .copied()
            .filter(|id| self.scene.get_live(*id).is_some_and(Element::is_frame))
            .collect();
        refit_frames(&mut self.scene, &frames);
        self.commit(CommitDirective::CaptureIncrement);
    }

    fn handle_down(&mut self, point: Point, modifiers: Modifiers) -> bool {
        if self.selection.is_empty() {
            return false;
        }
        let handles = selection_handles(&self.scene, &self.selection, self.camera.zoom);
        let Some(kind) = hit_test_handles(&handles, point, self.handle_tolerance()) else {
            return false;
        };
        let Some(bounds) = selection_bounds(&self.scene, &self.selection) else {
            return false;
        };
        let selected: Vec<Element> = self.scene.selected(&self.selection).cloned().collect();
        let mode = match kind {
            HandleKind::Rotate => SessionMode::Rotate {
                pivot: bounds.center(),
            },
            HandleKind::Point(index) => match selected.as_slice() {
                [only] => SessionMode::PointEdit {
                    element_id: only.id,
                    index,
                },
                _ => return false,
            },
            _ => SessionMode::Resize { handle: kind, bounds },
        };
        let texts: Vec<Element> = selected
            .iter()
            .filter_map(|e| e.bound_text_id())
            .filter_map(|id| self.scene.get_live(id).cloned())
            .collect();
        let position = handle_position(&handles, kind, point);
        let session = self.begin_session(point, modifiers, mode);
        session.handle = Some(kind);
        session.handle_offset = point - position;
        session.capture(selected.iter().chain(texts.iter()));
        true
    }

    /// Snapshot elements that are not bound text of another captured element.
    fn primary_originals(session: &PointerSession) -> Vec<Element> {
        session
            .originals()
            .into_iter()
            .filter(|e| e.container_id().is_none_or(|c| session.original(c).is_none()))
            .cloned()
            .collect()
    }

    pub(super) fn resize_move(
        &mut self,
        session: &mut PointerSession,
        handle: HandleKind,
        bounds: Rect,
        point: Point,
        modifiers: Modifiers,
    ) {
        session.drag_occurred = true;
        let ids = session.ids();
        let pointer = self.placement_point(point - session.handle_offset, &ids, modifiers);
        let primaries = Self::primary_originals(session);
        let next: Vec<Element> = match primaries.as_slice() {
            [only] => {
                let mods = ResizeModifiers {
                    keep_aspect: modifiers.shift,
                    from_center: modifiers.alt,
                };
                resize_element(only, handle, pointer, mods).into_iter().collect()
            }
            many => resize_elements(many, bounds, handle, pointer, modifiers.alt),
        };
        self.write_transformed(next, &ids);
    }

    pub(super) fn rotate_move(&mut self, session: &mut PointerSession, pivot: Point, point: Point, modifiers: Modifiers) {
        session.drag_occurred = true;
        let pointer = point - session.handle_offset;
        let primaries = Self::primary_originals(session);
        let next = match primaries.as_slice() {
            [only] => vec![rotate_element(only, pointer, modifiers.shift)],
            many => rotate_elements(many, pivot, session.origin, point, modifiers.shift),
        };
        self.write_transformed(next, &session.ids());
    }

    fn write_transformed(&mut self, next: Vec<Element>, moving: &HashSet<ElementId>) {
        let containers: HashSet<ElementId> = next.iter().map(|e| e.id).collect();
        for element in next {
            let id = element.id;
            self.scene.mutate(id, move |e| *e = element);
        }
        self.sync_bound_text(&containers);
        self.follow_bound_connectors(moving);
        self.transform_overlays(moving);
        self.commit(CommitDirective::None);
    }

    /// Binding suggestions for transformed connectors, and frame highlights:
    /// frames receiving transformed elements, or what a transformed frame
    /// would adopt.
    fn transform_overlays(&mut self, moving: &HashSet<ElementId>) {
        let mut suggested: Vec<ElementId> = Vec::new();
        for &id in moving {
            for target in self.endpoint_suggestions(id, &[Endpoint::Start, Endpoint::End], moving) {
                if !suggested.contains(&target) {
                    suggested.push(target);
                }
            }
        }
        self.overlays.suggested_bindings = suggested;

        let current: Vec<&Element> = moving.iter().filter_map(|id| self.scene.get_live(*id)).collect();
        let mut highlights = frames_overlapping(&self.scene, &current, moving);
        for frame in current.iter().filter(|e| e.is_frame()) {
            for id in elements_adopted_by(&self.scene, frame.id, frame.bounds()) {
                if !moving.contains(&id) && !highlights.contains(&id) {
                    highlights.push(id);
                }
            }
        }
        self.overlays.frame_highlights = highlights;
    }

    pub(super) fn transform_up(&mut self, session: &PointerSession) {
        if session.drag_occurred {
            self.finish_transform(&session.ids());
        }
    }

    pub(super) fn point_edit_move(
        &mut self,
        session: &mut PointerSession,
        element_id: ElementId,
        index: usize,
        point: Point,
        modifiers: Modifiers,
    ) {
        let Some(original) = session.original(element_id).cloned() else {
            return;
        };
        session.drag_occurred = true;
        let points = original.world_points();
        let last = points.len().saturating_sub(1);
        let is_endpoint = index == 0 || index == last;
        let mut pointer = point - session.handle_offset;
        if modifiers.shift && is_endpoint && points.len() >= 2 && !original.is_elbow() {
            let anchor = if index == 0 { points[1] } else { points[last - 1] };
            pointer = snap_line_endpoint(anchor, pointer);
        } else {
            pointer = self.placement_point(pointer, &HashSet::from([element_id]), modifiers);
        }

        let next = if original.is_elbow() && points.len() >= 2 {
            let (start, end) = if index == 0 {
                (pointer, points[last])
            } else {
                (points[0], pointer)
            };
            let mut next = original.clone();
            next.set_world_points(&compute_elbow_path(start, end));
            Some(next)
        } else {
            move_linear_point(&original, index, pointer)
        };
        if let Some(next) = next {
            self.scene.mutate(element_id, move |e| *e = next);
        }
        if is_endpoint {
            let endpoint = if index == 0 { Endpoint::Start } else { Endpoint::End };
            self.overlays.suggested_bindings = self.endpoint_suggestions(element_id, &[endpoint], &HashSet::new());
        }
        self.commit(CommitDirective::None);
    }

    pub(super) fn point_edit_up(&mut self, session: &PointerSession, element_id: ElementId) {
        if session.drag_occurred {
            self.finish_transform(&HashSet::from([element_id]));
        }
    }

    /// Pointer-down while an image is in crop mode. Returns whether the
    /// press was consumed.
    fn crop_down(&mut self, point: Point, modifiers: Modifiers) -> bool {
        let Some(crop_id) = self.crop_target else {
            return false;
        };
        let Some(image) = self.scene.get_live(crop_id).cloned() else {
            self.crop_target = None;
            return false;
        };
        let handles: Vec<Handle> = element_handles(&image, self.camera.zoom)
            .into_iter()
            .filter(|h| h.kind.is_resize())
            .collect();
        if let Some(kind) = hit_test_handles(&handles, point, self.handle_tolerance()) {
            let position = handle_position(&handles, kind, point);
            let session = self.begin_session(
                point,
                modifiers,
                SessionMode::Crop {
                    element_id: crop_id,
                    handle: kind,
                },
            );
            session.handle = Some(kind);
            session.handle_offset = point - position;
            session.capture([&image]);
            return true;
        }
        if hit_padded_bounds(&image, point, 0.0) {
            self.begin_session(point, modifiers, SessionMode::Inert);
            return true;
        }
        log::debug!("Leaving crop mode for {}", crop_id);
        self.crop_target = None;
        false
    }

    pub(super) fn crop_move(&mut self, session: &mut PointerSession, element_id: ElementId, handle: HandleKind, point: Point) {
        session.drag_occurred = true;
        let Some(original) = session.original(element_id) else {
            return;
        };
        let pointer = point - session.handle_offset;
        if let Some(next) = crop_image(original, handle, pointer, self.config.min_element_size) {
            self.scene.mutate(element_id, move |e| *e = next);
        }
        self.commit(CommitDirective::None);
    }

    pub(super) fn on_double_click(&mut self, point: Point, modifiers: Modifiers) {
        let hit = {
            let opts = self.hit_options().with_bound_text(true);
            self.hit_tester.hit_test(&self.scene, point, &opts).cloned()
        };
        self.begin_session(point, modifiers, SessionMode::Inert);

        let Some(element) = hit else {
            self.create_text(point, None);
            return;
        };
        if element.container_id().is_none() {
            if let Some(group) = selectable_group(&element, self.selection.editing_group_id()) {
                log::debug!("Entering group {}", group);
                self.selection.set_editing_group(Some(group));
                self.selection.select_only(element.id);
                normalize_selection(&self.scene, &mut self.selection);
                return;
            }
        }
        if element.is_image() {
            log::debug!("Entering crop mode for {}", element.id);
            self.crop_target = Some(element.id);
            self.selection.select_only(element.id);
            normalize_selection(&self.scene, &mut self.selection);
        } else if element.is_text() {
            self.request_text_edit(element.id);
        } else if let Some(text) = element.bound_text_id() {
            self.request_text_edit(text);
        } else if element.is_generic_shape() {
            self.create_text(element.center(), Some(element.id));
        }
    }
}

fn handle_position(handles: &[Handle], kind: HandleKind, fallback: Point) -> Point {
    handles
        .iter()
        .find(|h| h.kind == kind)
        .map_or(fallback, |h| h.position)
}

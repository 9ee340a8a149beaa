//! Lines and connectors: drag creation and point-by-point placement.

use super::{Engine, MultiPoint};
use crate::binding::{commit_bindings, refresh_connector, suggest_binding};
use crate::config::ArrowType;
use crate::elbow::compute_elbow_path;
use crate::element::geometry::polyline_self_intersects;
use crate::element::{Element, ElementId, Endpoint};
use crate::frame::update_frame_membership;
use crate::input::Modifiers;
use crate::scene::CommitDirective;
use crate::selection::normalize_selection;
use crate::session::{PointerSession, SessionMode};
use crate::snap::snap_line_endpoint;
use crate::tools::ToolKind;
use kurbo::Point;
use std::collections::HashSet;

impl Engine {
    pub(super) fn linear_down(&mut self, point: Point, modifiers: Modifiers) {
        let origin = self.grid_point(point, modifiers);
        let mut element = if self.tool.kind == ToolKind::Arrow {
            Element::arrow(&[origin, origin])
        } else {
            Element::line(&[origin, origin])
        }
        .with_style(self.config.default_style.clone());
        if self.tool.kind == ToolKind::Arrow && self.config.arrow_type == ArrowType::Elbow {
            if let Some(data) = element.linear_mut() {
                data.elbowed = true;
            }
        }
        let id = element.id;
        if let Err(err) = self.scene.insert(element) {
            log::warn!("Could not start {}: {}", self.tool.kind.name(), err);
            return;
        }
        self.commit(CommitDirective::None);
        self.overlays.suggested_bindings = self.endpoint_suggestions(id, &[Endpoint::Start], &HashSet::new());
        self.begin_session(point, modifiers, SessionMode::CreateLinear { element_id: id });
    }

    pub(super) fn linear_move(
        &mut self,
        session: &mut PointerSession,
        element_id: ElementId,
        point: Point,
        modifiers: Modifiers,
    ) {
        if !session.drag_occurred {
            let threshold = self.config.drag_threshold / self.camera.zoom;
            if (point - session.origin).hypot() < threshold {
                return;
            }
            session.drag_occurred = true;
        }
        let Some(elbowed) = self.scene.get_live(element_id).map(Element::is_elbow) else {
            return;
        };
        let start = session.origin_grid;
        let end = if modifiers.shift && !elbowed {
            snap_line_endpoint(start, point)
        } else {
            let end = self.grid_point(point, modifiers);
            self.placement_point(end, &HashSet::from([element_id]), modifiers)
        };
        let points = if elbowed {
            compute_elbow_path(start, end)
        } else {
            vec![start, end]
        };
        self.scene.mutate(element_id, |e| e.set_world_points(&points));
        self.overlays.suggested_bindings =
            self.endpoint_suggestions(element_id, &[Endpoint::Start, Endpoint::End], &HashSet::new());
        self.commit(CommitDirective::None);
    }

    pub(super) fn linear_up(&mut self, session: &PointerSession, element_id: ElementId) {
        if session.drag_occurred {
            self.finalize_linear(element_id);
            return;
        }
        // A click without a drag starts point-by-point placement.
        let origin = session.origin_grid;
        self.scene.mutate(element_id, |e| {
            e.set_world_points(&[origin]);
            let first = e.relative_points().and_then(|p| p.first().copied());
            if let Some(data) = e.linear_mut() {
                data.last_committed_point = first;
            }
        });
        self.multi_point = Some(MultiPoint {
            element_id,
            committed: 1,
        });
        log::debug!("Multi-point editing {}", element_id);
        self.commit(CommitDirective::None);
    }

    /// Pointer moved with no button held during multi-point editing: keep a
    /// trailing preview point under the pointer.
    pub(super) fn multi_point_hover(&mut self, point: Point, modifiers: Modifiers) {
        let Some(editing) = self.multi_point else {
            return;
        };
        let Some(element) = self.scene.get_live(editing.element_id) else {
            self.multi_point = None;
            return;
        };
        let mut points = element.world_points();
        let Some(&last) = points.get(editing.committed.saturating_sub(1)) else {
            return;
        };
        let target = self.multi_point_target(last, point, editing.element_id, modifiers);
        let confirm = self.config.line_confirm_threshold / self.camera.zoom;
        points.truncate(editing.committed);
        if (target - last).hypot() > confirm {
            points.push(target);
        }
        self.scene.mutate(editing.element_id, |e| e.set_world_points(&points));
        self.overlays.suggested_bindings =
            self.endpoint_suggestions(editing.element_id, &[Endpoint::End], &HashSet::new());
        self.commit(CommitDirective::None);
    }

    /// Primary press during multi-point editing.
    pub(super) fn multi_point_click(&mut self, point: Point, modifiers: Modifiers) {
        let Some(editing) = self.multi_point else {
            return;
        };
        let Some(element) = self.scene.get_live(editing.element_id) else {
            self.multi_point = None;
            return;
        };
        let elbowed = element.is_elbow();
        let mut points = element.world_points();
        points.truncate(editing.committed);
        let (Some(&first), Some(&last)) = (points.first(), points.last()) else {
            return;
        };
        let target = self.multi_point_target(last, point, editing.element_id, modifiers);
        let confirm = self.config.line_confirm_threshold / self.camera.zoom;

        if (target - last).hypot() <= confirm {
            self.finalize_multi_point();
            return;
        }
        let closing = points.len() >= 3 && (target - first).hypot() <= confirm;
        points.push(if closing { first } else { target });
        let committed = points.len();
        self.scene.mutate(editing.element_id, |e| {
            e.set_world_points(&points);
            let last = e.relative_points().and_then(|p| p.last().copied());
            if let Some(data) = e.linear_mut() {
                data.last_committed_point = last;
            }
        });
        self.multi_point = Some(MultiPoint {
            element_id: editing.element_id,
            committed,
        });
        self.commit(CommitDirective::None);

        let crossing = !closing && polyline_self_intersects(&points);
        if closing || crossing || (elbowed && committed >= 2) {
            self.finalize_multi_point();
        }
    }

    fn multi_point_target(&mut self, last: Point, point: Point, element_id: ElementId, modifiers: Modifiers) -> Point {
        if modifiers.shift {
            snap_line_endpoint(last, point)
        } else {
            let point = self.grid_point(point, modifiers);
            self.placement_point(point, &HashSet::from([element_id]), modifiers)
        }
    }

    /// End multi-point editing, dropping the trailing preview point.
    pub(super) fn finalize_multi_point(&mut self) {
        let Some(editing) = self.multi_point.take() else {
            return;
        };
        self.scene.mutate(editing.element_id, |e| {
            let mut points = e.world_points();
            points.truncate(editing.committed);
            e.set_world_points(&points);
        });
        self.finalize_linear(editing.element_id);
    }

    /// Commit a finished line or connector, or discard it if it is too
    /// small to keep.
    fn finalize_linear(&mut self, element_id: ElementId) {
        self.scene.mutate(element_id, |e| {
            if let Some(data) = e.linear_mut() {
                data.last_committed_point = None;
            }
        });
        let Some(element) = self.scene.get_live(element_id) else {
            return;
        };
        let too_short = element.relative_points().is_none_or(|p| p.len() < 2)
            || element.is_degenerate(self.config.min_element_size);
        if too_short {
            log::debug!("Discarding degenerate {}", element.kind.name());
            self.scene.discard(element_id);
            self.scene.prune_stale_references();
            self.overlays.suggested_bindings.clear();
            self.commit(CommitDirective::None);
            return;
        }
        let (connector, elbowed) = (element.is_connector(), element.is_elbow());
        if connector && self.config.bindings_enabled {
            commit_bindings(&mut self.scene, element_id, self.camera.zoom);
        } else if elbowed {
            refresh_connector(&mut self.scene, element_id);
        }
        update_frame_membership(&mut self.scene, &HashSet::from([element_id]));
        self.selection.select_only(element_id);
        normalize_selection(&self.scene, &mut self.selection);
        self.overlays.suggested_bindings.clear();
        self.commit(CommitDirective::CaptureIncrement);
        self.tool.set(self.tool.after_creation());
    }

    /// Elements the given connector endpoints would bind to right now.
    pub(super) fn endpoint_suggestions(
        &self,
        connector_id: ElementId,
        endpoints: &[Endpoint],
        exclude: &HashSet<ElementId>,
    ) -> Vec<ElementId> {
        if !self.config.bindings_enabled {
            return Vec::new();
        }
        let Some(connector) = self.scene.get_live(connector_id).filter(|e| e.is_connector()) else {
            return Vec::new();
        };
        let points = connector.world_points();
        let (Some(&first), Some(&last)) = (points.first(), points.last()) else {
            return Vec::new();
        };
        let mut found = Vec::new();
        for &endpoint in endpoints {
            let at = match endpoint {
                Endpoint::Start => first,
                Endpoint::End => last,
            };
            let target = suggest_binding(&self.scene, connector, endpoint, at, self.camera.zoom, exclude);
            if let Some(target) = target.filter(|t| !found.contains(t)) {
                found.push(target);
            }
        }
        found
    }
}

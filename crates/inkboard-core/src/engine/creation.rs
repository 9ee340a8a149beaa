//! Creating boxes, freehand strokes, text and images.

use super::{Engine, EngineEvent, PendingImage};
use crate::element::{
    BoundElement, BoundKind, Element, ElementId, ElementKind, ImageCrop, ImageStatus,
    estimate_text_size,
};
use crate::frame::{adopt_overlapping, frames_overlapping, update_frame_membership};
use crate::input::Modifiers;
use crate::scene::CommitDirective;
use crate::selection::normalize_selection;
use crate::session::{PointerSession, SessionMode};
use crate::tools::ToolKind;
use kurbo::{Point, Rect, Size, Vec2};
use std::collections::HashSet;

/// Font size of newly created text.
const DEFAULT_FONT_SIZE: f64 = 20.0;

impl Engine {
    pub(super) fn create_box_down(&mut self, point: Point, modifiers: Modifiers) {
        let origin = self.grid_point(point, modifiers);
        let element = match self.tool.kind {
            ToolKind::Ellipse => Element::ellipse(origin.x, origin.y, 0.0, 0.0),
            ToolKind::Diamond => Element::diamond(origin.x, origin.y, 0.0, 0.0),
            ToolKind::Frame => Element::frame(origin.x, origin.y, 0.0, 0.0),
            ToolKind::Embed => Element::embed(origin.x, origin.y, 0.0, 0.0, ""),
            _ => Element::rectangle(origin.x, origin.y, 0.0, 0.0),
        }
        .with_style(self.config.default_style.clone());
        let id = element.id;
        if let Err(err) = self.scene.insert(element) {
            log::warn!("Could not start {}: {}", self.tool.kind.name(), err);
            return;
        }
        self.commit(CommitDirective::None);
        self.begin_session(point, modifiers, SessionMode::CreateBox { element_id: id });
    }

    pub(super) fn create_box_move(
        &mut self,
        session: &mut PointerSession,
        element_id: ElementId,
        point: Point,
        modifiers: Modifiers,
    ) {
        let corner = self.grid_point(point, modifiers);
        let corner = self.placement_point(corner, &HashSet::from([element_id]), modifiers);
        let origin = session.origin_grid;
        let mut d = corner - origin;
        if modifiers.shift {
            let side = d.x.abs().max(d.y.abs());
            d = Vec2::new(side.copysign(d.x), side.copysign(d.y));
        }
        let rect = if modifiers.alt {
            Rect::from_points(origin - d, origin + d)
        } else {
            Rect::from_points(origin, origin + d)
        };
        if d != Vec2::ZERO {
            session.drag_occurred = true;
        }
        self.scene.mutate(element_id, |e| {
            e.x = rect.x0;
            e.y = rect.y0;
            e.width = rect.width();
            e.height = rect.height();
        });
        self.overlays.frame_highlights = match self.scene.get_live(element_id) {
            Some(element) if !element.is_frame() => {
                frames_overlapping(&self.scene, &[element], &HashSet::from([element_id]))
            }
            _ => Vec::new(),
        };
        self.commit(CommitDirective::None);
    }

    pub(super) fn create_box_up(&mut self, session: &PointerSession, element_id: ElementId) {
        let Some(element) = self.scene.get_live(element_id) else {
            return;
        };
        if !session.drag_occurred || element.is_degenerate(self.config.min_element_size) {
            log::debug!("Discarding degenerate {}", element.kind.name());
            self.scene.discard(element_id);
            self.commit(CommitDirective::None);
            return;
        }
        if element.is_frame() {
            let adopted = adopt_overlapping(&mut self.scene, element_id);
            log::debug!("Frame {} adopted {} element(s)", element_id, adopted.len());
        } else {
            update_frame_membership(&mut self.scene, &HashSet::from([element_id]));
        }
        self.selection.select_only(element_id);
        normalize_selection(&self.scene, &mut self.selection);
        self.commit(CommitDirective::CaptureIncrement);
        self.tool.set(self.tool.after_creation());
    }

    pub(super) fn freehand_down(&mut self, point: Point, modifiers: Modifiers) {
        let element = Element::freehand(&[point]).with_style(self.config.default_style.clone());
        let id = element.id;
        if let Err(err) = self.scene.insert(element) {
            log::warn!("Could not start stroke: {}", err);
            return;
        }
        self.commit(CommitDirective::None);
        self.begin_session(point, modifiers, SessionMode::CreateFreehand { element_id: id });
    }

    pub(super) fn freehand_move(&mut self, session: &mut PointerSession, element_id: ElementId, point: Point) {
        if point == session.last {
            return;
        }
        session.drag_occurred = true;
        self.scene.mutate(element_id, |e| {
            let mut points = e.world_points();
            points.push(point);
            e.set_world_points(&points);
        });
        self.commit(CommitDirective::None);
    }

    pub(super) fn freehand_up(&mut self, element_id: ElementId) {
        let degenerate = self
            .scene
            .get_live(element_id)
            .is_none_or(|e| e.is_degenerate(self.config.min_element_size));
        if degenerate {
            self.scene.discard(element_id);
            self.commit(CommitDirective::None);
            return;
        }
        update_frame_membership(&mut self.scene, &HashSet::from([element_id]));
        self.commit(CommitDirective::CaptureIncrement);
    }

    pub(super) fn text_down(&mut self, point: Point, modifiers: Modifiers) {
        let container = {
            let opts = self.hit_options();
            self.hit_tester
                .hit_test(&self.scene, point, &opts)
                .filter(|e| e.is_generic_shape() && e.bound_text_id().is_none())
                .map(|e| e.id)
        };
        self.begin_session(point, modifiers, SessionMode::Inert);
        self.create_text(point, container);
        self.tool.set(self.tool.after_creation());
    }

    /// Insert an empty text element and ask the host to edit it. With a
    /// container, the text is bound to it and centered inside.
    pub(super) fn create_text(&mut self, point: Point, container: Option<ElementId>) -> Option<ElementId> {
        let mut text = Element::text(point.x, point.y, "", DEFAULT_FONT_SIZE)
            .with_style(self.config.default_style.clone());
        text.y -= text.height / 2.0;
        let id = text.id;
        if let Some(owner) = container.and_then(|c| self.scene.get_live(c)) {
            let center = owner.center();
            text.x = center.x - text.width / 2.0;
            text.y = center.y - text.height / 2.0;
            text.angle = owner.angle;
            text.frame_id = owner.frame_id;
            if let ElementKind::Text(data) = &mut text.kind {
                data.container_id = Some(owner.id);
            }
        }
        if let Err(err) = self.scene.insert(text) {
            log::warn!("Could not create text: {}", err);
            return None;
        }
        if let Some(owner) = container {
            self.scene.mutate(owner, |e| {
                e.bound_elements.push(BoundElement {
                    id,
                    kind: BoundKind::Text,
                });
            });
        }
        self.commit(CommitDirective::None);
        self.request_text_edit(id);
        Some(id)
    }

    pub(super) fn request_text_edit(&mut self, element_id: ElementId) {
        self.editing_text = Some(element_id);
        self.events.push(EngineEvent::TextEditRequested { element_id });
    }

    /// Finish editing a text element. Empty content removes it.
    pub fn submit_text(&mut self, element_id: ElementId, content: &str) {
        let Some(element) = self.scene.get_live(element_id) else {
            log::warn!("Text {} is gone; edit dropped", element_id);
            return;
        };
        let Some(data) = element.text_data() else {
            log::warn!("Element {} is not text", element_id);
            return;
        };
        if self.editing_text == Some(element_id) {
            self.editing_text = None;
        }
        let container = data.container_id;
        if content.trim().is_empty() {
            if data.content.is_empty() {
                self.scene.discard(element_id);
            } else {
                self.scene.delete(element_id);
            }
            self.scene.prune_stale_references();
            normalize_selection(&self.scene, &mut self.selection);
            self.commit(CommitDirective::CaptureIncrement);
            return;
        }

        let size = estimate_text_size(content, data.font_size);
        let center = element.center();
        self.scene.mutate(element_id, |e| {
            if let ElementKind::Text(data) = &mut e.kind {
                data.content = content.to_string();
            }
            e.width = size.x;
            e.height = size.y;
            if container.is_some() {
                e.x = center.x - size.x / 2.0;
                e.y = center.y - size.y / 2.0;
            }
        });
        match container {
            Some(owner) => self.sync_bound_text(&HashSet::from([owner])),
            None => {
                update_frame_membership(&mut self.scene, &HashSet::from([element_id]));
            }
        }
        self.commit(CommitDirective::CaptureIncrement);
    }

    /// Arm the image tool: the next click places `file_id` at its natural
    /// size.
    pub fn begin_image_placement(&mut self, file_id: impl Into<String>, natural: Size) {
        self.set_tool(ToolKind::Image);
        self.pending_image = Some(PendingImage {
            file_id: file_id.into(),
            natural,
        });
    }

    pub(super) fn image_down(&mut self, point: Point, modifiers: Modifiers) {
        self.begin_session(point, modifiers, SessionMode::Inert);
        let Some(pending) = self.pending_image.take() else {
            log::debug!("Image tool without a pending file");
            return;
        };
        let Size { width, height } = pending.natural;
        let mut image = Element::image(
            point.x - width / 2.0,
            point.y - height / 2.0,
            width,
            height,
            pending.file_id,
        )
        .with_style(self.config.default_style.clone());
        if let Some(data) = image.image_data_mut() {
            data.status = ImageStatus::Pending;
            data.crop = Some(ImageCrop::full(width, height));
        }
        let id = image.id;
        if let Err(err) = self.scene.insert(image) {
            log::warn!("Could not place image: {}", err);
            return;
        }
        update_frame_membership(&mut self.scene, &HashSet::from([id]));
        self.selection.select_only(id);
        normalize_selection(&self.scene, &mut self.selection);
        self.commit(CommitDirective::CaptureIncrement);
        self.tool.set(self.tool.after_creation());
    }

    /// Report the outcome of loading an image file.
    ///
    /// Success marks every image using the file ready; failure marks them
    /// failed and notifies the host. Neither is an undo step.
    pub fn resolve_image(&mut self, file_id: &str, result: Result<Size, String>) {
        let ids: Vec<ElementId> = self
            .scene
            .non_deleted()
            .filter(|e| e.image_data().is_some_and(|d| d.file_id == file_id))
            .map(|e| e.id)
            .collect();
        match result {
            Ok(natural) => {
                for id in ids {
                    self.scene.mutate(id, |e| {
                        let size = (e.width, e.height);
                        if let Some(data) = e.image_data_mut() {
                            data.status = ImageStatus::Ready;
                            if data.crop.is_none() {
                                data.crop = Some(ImageCrop::full(natural.width, natural.height));
                            }
                        }
                        if size == (0.0, 0.0) {
                            e.width = natural.width;
                            e.height = natural.height;
                        }
                    });
                }
            }
            Err(message) => {
                log::warn!("Image {} failed to load: {}", file_id, message);
                for id in ids {
                    self.scene.mutate(id, |e| {
                        if let Some(data) = e.image_data_mut() {
                            data.status = ImageStatus::Error;
                        }
                    });
                }
                self.events.push(EngineEvent::Notice {
                    message: format!("Could not load image {file_id}: {message}"),
                });
            }
        }
        self.commit(CommitDirective::UpdateSnapshot);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::PointerEvent;

    fn at(x: f64, y: f64) -> PointerEvent {
        PointerEvent::new(Point::new(x, y))
    }

    fn draw(engine: &mut Engine, tool: ToolKind, from: (f64, f64), to: (f64, f64), modifiers: Modifiers) {
        engine.set_tool(tool);
        engine.on_pointer_down(at(from.0, from.1).with_modifiers(modifiers));
        engine.on_pointer_move(at(to.0, to.1).with_modifiers(modifiers));
        engine.on_pointer_up(at(to.0, to.1).with_modifiers(modifiers));
    }

    #[test]
    fn test_drawn_rectangle_is_selected_and_tool_resets() {
        let mut engine = Engine::default();
        draw(&mut engine, ToolKind::Rectangle, (10.0, 20.0), (110.0, 70.0), Modifiers::NONE);
        let rect = engine.scene().non_deleted().next().unwrap();
        assert_eq!((rect.x, rect.y, rect.width, rect.height), (10.0, 20.0, 100.0, 50.0));
        assert!(engine.selection().contains(rect.id));
        assert_eq!(engine.tool(), ToolKind::Select);
    }

    #[test]
    fn test_shift_draws_square_and_alt_from_center() {
        let mut engine = Engine::default();
        draw(&mut engine, ToolKind::Ellipse, (0.0, 0.0), (40.0, 10.0), Modifiers::shift());
        let ellipse = engine.scene().non_deleted().next().unwrap();
        assert_eq!((ellipse.width, ellipse.height), (40.0, 40.0));

        let mut engine = Engine::default();
        draw(&mut engine, ToolKind::Diamond, (100.0, 100.0), (120.0, 130.0), Modifiers::alt());
        let diamond = engine.scene().non_deleted().next().unwrap();
        assert_eq!((diamond.x, diamond.y, diamond.width, diamond.height), (80.0, 70.0, 40.0, 60.0));
    }

    #[test]
    fn test_click_without_drag_creates_nothing() {
        let mut engine = Engine::default();
        engine.set_tool(ToolKind::Rectangle);
        engine.on_pointer_down(at(10.0, 10.0));
        engine.on_pointer_up(at(10.0, 10.0));
        assert!(engine.scene().is_empty());
        assert_eq!(engine.scene().elements().count(), 0);
    }

    #[test]
    fn test_locked_tool_stays_active() {
        let mut engine = Engine::default();
        engine.set_tool_locked(true);
        draw(&mut engine, ToolKind::Rectangle, (0.0, 0.0), (50.0, 50.0), Modifiers::NONE);
        assert_eq!(engine.tool(), ToolKind::Rectangle);
    }

    #[test]
    fn test_frame_adopts_enclosed_elements() {
        let rect = Element::rectangle(20.0, 20.0, 10.0, 10.0);
        let id = rect.id;
        let mut engine = Engine::default();
        engine.insert_element(rect).unwrap();
        draw(&mut engine, ToolKind::Frame, (0.0, 0.0), (100.0, 100.0), Modifiers::NONE);
        let frame_id = engine.scene().non_deleted().find(|e| e.is_frame()).unwrap().id;
        assert_eq!(engine.scene().get(id).unwrap().frame_id, Some(frame_id));
    }

    #[test]
    fn test_freehand_stroke_is_kept_unselected() {
        let mut engine = Engine::default();
        engine.set_tool(ToolKind::Freehand);
        engine.on_pointer_down(at(0.0, 0.0));
        engine.on_pointer_move(at(10.0, 5.0));
        engine.on_pointer_move(at(20.0, 0.0));
        engine.on_pointer_up(at(20.0, 0.0));
        let stroke = engine.scene().non_deleted().next().unwrap();
        assert_eq!(stroke.relative_points().unwrap().len(), 3);
        assert!(engine.selection().is_empty());
        assert_eq!(engine.tool(), ToolKind::Freehand);
    }

    #[test]
    fn test_text_in_container_is_bound() {
        let rect = Element::rectangle(0.0, 0.0, 100.0, 60.0);
        let rect_id = rect.id;
        let mut engine = Engine::default();
        engine.insert_element(rect).unwrap();
        engine.set_tool(ToolKind::Text);
        engine.on_pointer_down(at(1.0, 30.0));
        engine.on_pointer_up(at(1.0, 30.0));
        let text_id = engine.editing_text().unwrap();
        engine.submit_text(text_id, "hello");

        let text = engine.scene().get(text_id).unwrap();
        assert_eq!(text.container_id(), Some(rect_id));
        assert!((text.center().x - 50.0).abs() < 1e-9);
        assert_eq!(engine.scene().get(rect_id).unwrap().bound_text_id(), Some(text_id));
    }

    #[test]
    fn test_empty_text_is_removed() {
        let mut engine = Engine::default();
        engine.set_tool(ToolKind::Text);
        engine.on_pointer_down(at(10.0, 10.0));
        engine.on_pointer_up(at(10.0, 10.0));
        let text_id = engine.editing_text().unwrap();
        engine.submit_text(text_id, "   ");
        assert!(engine.scene().get(text_id).is_none());
        assert!(engine.editing_text().is_none());
    }

    #[test]
    fn test_image_placement_and_failure() {
        let mut engine = Engine::default();
        engine.begin_image_placement("photo", Size::new(40.0, 20.0));
        engine.on_pointer_down(at(100.0, 100.0));
        engine.on_pointer_up(at(100.0, 100.0));
        let image = engine.scene().non_deleted().next().unwrap().clone();
        assert_eq!((image.x, image.y), (80.0, 90.0));
        assert_eq!(image.image_data().unwrap().status, ImageStatus::Pending);
        engine.drain_events();

        engine.resolve_image("photo", Err("not found".into()));
        let failed = engine.scene().get(image.id).unwrap();
        assert_eq!(failed.image_data().unwrap().status, ImageStatus::Error);
        let events = engine.drain_events();
        assert!(events.iter().any(|e| matches!(e, EngineEvent::Notice { .. })));
        assert!(events.iter().any(|e| matches!(
            e,
            EngineEvent::SceneChanged(change) if change.commit == CommitDirective::UpdateSnapshot
        )));
    }
}

//! The editing engine.
//!
//! [`Engine`] owns the scene, the selection, the camera and the gesture in
//! progress. Hosts feed it pointer, key, wheel and focus events; it mutates
//! the scene and queues [`EngineEvent`]s for the host to drain.

mod creation;
mod duplicate;
mod eraser;
mod keyboard;
mod linear;
mod select_tool;

use crate::camera::Camera;
use crate::config::EngineConfig;
use crate::element::geometry::rects_overlap;
use crate::element::{Element, ElementId};
use crate::frame::update_frame_membership;
use crate::handles::{Handle, element_handles, selection_handles};
use crate::hit_test::{HitTestOptions, HitTester};
use crate::input::{ClickTracker, InputState, Key, Modifiers, PointerButton, PointerEvent};
use crate::scene::{CommitDirective, Scene, SceneChange, SceneResult};
use crate::selection::{Selection, normalize_selection};
use crate::session::{ListenerRegistry, PointerSession, SessionMode};
use crate::snap::{SnapEngine, SnapLine, SnapQuery, snap_to_grid};
use crate::tools::{ActiveTool, ToolKind};
use kurbo::{Point, Rect, Size, Vec2};
use serde::Serialize;
use std::collections::HashSet;

/// Zoom change per wheel pixel when zooming with the command modifier.
const WHEEL_ZOOM_SPEED: f64 = 0.0015;

/// Notifications for the host.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EngineEvent {
    /// One logical batch of scene mutations.
    SceneChanged(SceneChange),
    PointerDown { position: Point, tool: ToolKind },
    PointerUp { position: Point, tool: ToolKind },
    ScrollChanged { offset: Vec2, zoom: f64 },
    /// The host should open a text editor for this element.
    TextEditRequested { element_id: ElementId },
    /// Something the user should be told about.
    Notice { message: String },
}

/// Transient visuals that are not part of the scene.
#[derive(Debug, Default)]
struct Overlays {
    snap_lines: Vec<SnapLine>,
    suggested_bindings: Vec<ElementId>,
    frame_highlights: Vec<ElementId>,
    pending_erasure: HashSet<ElementId>,
    selection_box: Option<Rect>,
    laser_trail: Vec<Point>,
}

impl Overlays {
    fn clear_transient(&mut self) {
        self.snap_lines.clear();
        self.suggested_bindings.clear();
        self.frame_highlights.clear();
        self.selection_box = None;
    }
}

/// A line or connector being placed point by point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct MultiPoint {
    element_id: ElementId,
    /// Number of confirmed points; a trailing preview point may follow.
    committed: usize,
}

/// An image waiting to be placed with the next click.
#[derive(Debug, Clone, PartialEq)]
struct PendingImage {
    file_id: String,
    natural: Size,
}

/// Everything a renderer needs for one frame.
#[derive(Debug)]
pub struct RenderState<'a> {
    /// Live elements overlapping the viewport, back to front.
    pub elements: Vec<&'a Element>,
    pub selection: &'a Selection,
    pub handles: Vec<Handle>,
    pub snap_lines: &'a [SnapLine],
    pub suggested_bindings: &'a [ElementId],
    /// Frames about to receive moving elements, or elements a resized frame
    /// is about to adopt.
    pub frame_highlights: &'a [ElementId],
    pub pending_erasure: &'a HashSet<ElementId>,
    pub selection_box: Option<Rect>,
    pub laser_trail: &'a [Point],
    pub crop_target: Option<ElementId>,
    pub editing_linear: Option<ElementId>,
    pub camera: &'a Camera,
}

/// The pointer-driven scene editor.
#[derive(Debug)]
pub struct Engine {
    config: EngineConfig,
    scene: Scene,
    selection: Selection,
    camera: Camera,
    viewport: Size,
    tool: ActiveTool,
    input: InputState,
    clicks: ClickTracker,
    hit_tester: HitTester,
    snap: SnapEngine,
    listeners: ListenerRegistry,
    session: Option<PointerSession>,
    multi_point: Option<MultiPoint>,
    crop_target: Option<ElementId>,
    editing_text: Option<ElementId>,
    pending_image: Option<PendingImage>,
    pending_move: Option<PointerEvent>,
    overlays: Overlays,
    events: Vec<EngineEvent>,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl Engine {
    pub fn new(config: EngineConfig) -> Self {
        Self::with_scene(config, Scene::new())
    }

    /// Start editing an existing scene.
    pub fn with_scene(config: EngineConfig, scene: Scene) -> Self {
        let clicks = ClickTracker::new(config.double_click_ms, config.double_click_distance);
        Self {
            config,
            scene,
            selection: Selection::new(),
            camera: Camera::new(),
            viewport: Size::ZERO,
            tool: ActiveTool::default(),
            input: InputState::new(),
            clicks,
            hit_tester: HitTester::new(),
            snap: SnapEngine::new(),
            listeners: ListenerRegistry::new(),
            session: None,
            multi_point: None,
            crop_target: None,
            editing_text: None,
            pending_image: None,
            pending_move: None,
            overlays: Overlays::default(),
            events: Vec::new(),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    pub fn tool(&self) -> ToolKind {
        self.tool.kind
    }

    pub fn is_tool_locked(&self) -> bool {
        self.tool.locked
    }

    /// Whether a pointer gesture is in progress.
    pub fn has_session(&self) -> bool {
        self.session.is_some()
    }

    /// Number of gesture listener sets currently registered.
    pub fn active_listeners(&self) -> usize {
        self.listeners.active()
    }

    pub fn crop_target(&self) -> Option<ElementId> {
        self.crop_target
    }

    /// Line or connector in multi-point editing.
    pub fn editing_linear(&self) -> Option<ElementId> {
        self.multi_point.map(|m| m.element_id)
    }

    pub fn editing_text(&self) -> Option<ElementId> {
        self.editing_text
    }

    pub fn set_viewport(&mut self, size: Size) {
        self.viewport = size;
    }

    /// Drain queued notifications.
    pub fn drain_events(&mut self) -> Vec<EngineEvent> {
        std::mem::take(&mut self.events)
    }

    // ---- pointer input ----

    pub fn on_pointer_down(&mut self, event: PointerEvent) {
        self.flush_frame();
        if let Some(session) = self.session.take() {
            log::debug!("Pointer down with a gesture in progress; finishing it first");
            let at = session.last;
            let screen = self.camera.scene_to_screen(at);
            let modifiers = self.input.modifiers;
            self.finish(session, at, screen, modifiers);
        }
        self.input.press_button(event.button, event.position);
        self.input.modifiers = event.modifiers;
        let point = self.camera.screen_to_scene(event.position);
        self.events.push(EngineEvent::PointerDown {
            position: point,
            tool: self.tool.kind,
        });

        let panning = event.button == PointerButton::Middle
            || self.input.is_key_pressed(Key::Space)
            || self.tool.kind == ToolKind::Hand;
        if panning {
            self.begin_session(
                point,
                event.modifiers,
                SessionMode::Pan {
                    last_screen: event.position,
                },
            );
            return;
        }
        if event.button != PointerButton::Primary {
            return;
        }

        if self.multi_point.is_some() {
            self.multi_point_click(point, event.modifiers);
            self.begin_session(point, event.modifiers, SessionMode::Inert);
            return;
        }

        let double = self.clicks.register(event.timestamp_ms, event.position);
        if double && self.tool.kind == ToolKind::Select {
            self.on_double_click(point, event.modifiers);
            return;
        }

        match self.tool.kind {
            ToolKind::Select => self.select_down(point, event.modifiers),
            ToolKind::Rectangle
            | ToolKind::Ellipse
            | ToolKind::Diamond
            | ToolKind::Frame
            | ToolKind::Embed => self.create_box_down(point, event.modifiers),
            ToolKind::Line | ToolKind::Arrow => self.linear_down(point, event.modifiers),
            ToolKind::Freehand => self.freehand_down(point, event.modifiers),
            ToolKind::Text => self.text_down(point, event.modifiers),
            ToolKind::Image => self.image_down(point, event.modifiers),
            ToolKind::Eraser => self.eraser_down(point, event.modifiers),
            ToolKind::Laser => self.laser_down(point, event.modifiers),
            ToolKind::Hand => {}
        }
    }

    pub fn on_pointer_move(&mut self, event: PointerEvent) {
        self.input.move_pointer(event.position);
        self.input.modifiers = event.modifiers;
        let point = self.camera.screen_to_scene(event.position);
        match self.session.take() {
            Some(mut session) => {
                self.apply_move(&mut session, point, event.position, event.modifiers);
                session.last = point;
                self.session = Some(session);
            }
            None => {
                if self.multi_point.is_some() {
                    self.multi_point_hover(point, event.modifiers);
                }
            }
        }
    }

    pub fn on_pointer_up(&mut self, event: PointerEvent) {
        self.flush_frame();
        let was_pressed = self.input.release_button(event.button, event.position);
        self.input.modifiers = event.modifiers;
        let point = self.camera.screen_to_scene(event.position);
        if let Some(session) = self.session.take() {
            self.finish(session, point, event.position, event.modifiers);
        }
        if was_pressed {
            self.events.push(EngineEvent::PointerUp {
                position: point,
                tool: self.tool.kind,
            });
        }
    }

    /// Queue a move to be applied at the next frame. Only the latest queued
    /// move is kept.
    pub fn queue_pointer_move(&mut self, event: PointerEvent) {
        self.pending_move = Some(event);
    }

    /// Apply the queued move, if any.
    pub fn flush_frame(&mut self) {
        if let Some(event) = self.pending_move.take() {
            self.on_pointer_move(event);
        }
    }

    /// Focus left the canvas: end whatever is in progress.
    pub fn on_blur(&mut self) {
        self.flush_frame();
        if let Some(session) = self.session.take() {
            log::debug!("Focus lost mid-gesture; finishing it");
            let at = session.last;
            let screen = self.camera.scene_to_screen(at);
            self.finish(session, at, screen, Modifiers::NONE);
        }
        if self.multi_point.is_some() {
            self.finalize_multi_point();
        }
        self.input.clear();
        self.clicks.reset();
    }

    /// Scroll or zoom. `delta` is in screen pixels.
    pub fn on_wheel(&mut self, delta: Vec2, position: Point, modifiers: Modifiers) {
        let changed = if modifiers.command() {
            let factor = (-delta.y * WHEEL_ZOOM_SPEED).exp();
            self.camera.zoom_at(position, factor)
        } else {
            self.camera.pan(-delta);
            delta != Vec2::ZERO
        };
        if changed {
            self.snap.invalidate();
            self.push_scroll();
        }
    }

    fn push_scroll(&mut self) {
        self.events.push(EngineEvent::ScrollChanged {
            offset: self.camera.offset,
            zoom: self.camera.zoom,
        });
    }

    fn apply_move(&mut self, session: &mut PointerSession, point: Point, screen: Point, modifiers: Modifiers) {
        match session.mode.clone() {
            SessionMode::Pan { last_screen } => {
                let delta = screen - last_screen;
                if delta != Vec2::ZERO {
                    self.camera.pan(delta);
                    self.push_scroll();
                }
                session.mode = SessionMode::Pan { last_screen: screen };
            }
            SessionMode::BoxSelect { base } => self.box_select_move(session, &base, point),
            SessionMode::Drag { duplicate, .. } => self.drag_move(session, duplicate, point, modifiers),
            SessionMode::Resize { handle, bounds } => self.resize_move(session, handle, bounds, point, modifiers),
            SessionMode::Rotate { pivot } => self.rotate_move(session, pivot, point, modifiers),
            SessionMode::PointEdit { element_id, index } => {
                self.point_edit_move(session, element_id, index, point, modifiers);
            }
            SessionMode::Crop { element_id, handle } => self.crop_move(session, element_id, handle, point),
            SessionMode::CreateBox { element_id } => self.create_box_move(session, element_id, point, modifiers),
            SessionMode::CreateLinear { element_id } => {
                self.linear_move(session, element_id, point, modifiers);
            }
            SessionMode::CreateFreehand { element_id } => self.freehand_move(session, element_id, point),
            SessionMode::Erase => self.eraser_move(session, point, modifiers),
            SessionMode::Laser => self.laser_move(point),
            SessionMode::Inert => {}
        }
    }

    /// End a gesture. The session's listeners are released when it drops.
    fn finish(&mut self, mut session: PointerSession, point: Point, screen: Point, modifiers: Modifiers) {
        if point != session.last {
            self.apply_move(&mut session, point, screen, modifiers);
            session.last = point;
        }
        match session.mode.clone() {
            SessionMode::Pan { .. } | SessionMode::Inert | SessionMode::BoxSelect { .. } => {}
            SessionMode::Drag { was_selected, .. } => self.drag_up(&session, was_selected, modifiers),
            SessionMode::Resize { .. } | SessionMode::Rotate { .. } => self.transform_up(&session),
            SessionMode::PointEdit { element_id, .. } => self.point_edit_up(&session, element_id),
            SessionMode::Crop { .. } => {
                if session.drag_occurred {
                    self.commit(CommitDirective::CaptureIncrement);
                }
            }
            SessionMode::CreateBox { element_id } => self.create_box_up(&session, element_id),
            SessionMode::CreateLinear { element_id } => self.linear_up(&session, element_id),
            SessionMode::CreateFreehand { element_id } => self.freehand_up(element_id),
            SessionMode::Erase => self.eraser_up(),
            SessionMode::Laser => self.overlays.laser_trail.clear(),
        }
        self.overlays.clear_transient();
        self.snap.invalidate();
        normalize_selection(&self.scene, &mut self.selection);
        // Anything still unflushed belongs to the gesture preview.
        self.commit(CommitDirective::None);
        log::trace!("Gesture finished ({:?})", session.mode);
    }

    fn begin_session(&mut self, origin: Point, modifiers: Modifiers, mode: SessionMode) -> &mut PointerSession {
        let origin_grid = self.grid_point(origin, modifiers);
        let session = PointerSession::new(origin, origin_grid, modifiers, mode, self.listeners.acquire());
        self.session.insert(session)
    }

    // ---- host API ----

    /// Switch tools. Ignored while a gesture is in progress.
    pub fn set_tool(&mut self, kind: ToolKind) {
        if self.session.is_some() {
            log::debug!("Ignoring tool change to {} mid-gesture", kind.name());
            return;
        }
        if self.multi_point.is_some() {
            self.finalize_multi_point();
        }
        self.crop_target = None;
        if kind != ToolKind::Image {
            self.pending_image = None;
        }
        if kind != ToolKind::Select && kind != ToolKind::Hand {
            self.selection.clear();
            self.selection.set_editing_group(None);
        }
        self.tool.set(kind);
        log::debug!("Tool: {}", kind.name());
    }

    pub fn set_tool_locked(&mut self, locked: bool) {
        self.tool.locked = locked;
    }

    /// Replace the selection; invariants are enforced.
    pub fn set_selection(&mut self, ids: impl IntoIterator<Item = ElementId>) {
        self.selection.select_all_of(ids);
        normalize_selection(&self.scene, &mut self.selection);
    }

    /// Add an element created by the host.
    pub fn insert_element(&mut self, element: Element) -> SceneResult<ElementId> {
        let id = element.id;
        self.scene.insert(element)?;
        update_frame_membership(&mut self.scene, &HashSet::from([id]));
        self.commit(CommitDirective::CaptureIncrement);
        Ok(id)
    }

    /// Replace the whole scene, as after undo, redo or a remote update.
    ///
    /// Any gesture in progress is dropped without committing.
    pub fn replace_elements(&mut self, elements: Vec<Element>) {
        if self.session.take().is_some() {
            log::debug!("Scene replaced mid-gesture; gesture cancelled");
        }
        self.pending_move = None;
        self.multi_point = None;
        self.overlays = Overlays::default();
        self.scene.replace_all(elements);
        self.scene.prune_stale_references();
        normalize_selection(&self.scene, &mut self.selection);
        if self.crop_target.is_some_and(|id| !self.scene.is_live(id)) {
            self.crop_target = None;
        }
        if self.editing_text.is_some_and(|id| !self.scene.is_live(id)) {
            self.editing_text = None;
        }
        self.snap.invalidate();
        self.commit(CommitDirective::UpdateSnapshot);
        self.hit_tester.retain_live(&self.scene);
    }

    /// Snapshot everything a renderer needs.
    pub fn render_state(&self) -> RenderState<'_> {
        let visible = self.visible_area();
        let elements = self
            .scene
            .non_deleted()
            .filter(|e| visible.is_none_or(|v| rects_overlap(v, e.bounds())))
            .collect();
        let handles = if self.multi_point.is_some() {
            Vec::new()
        } else if let Some(image) = self.crop_target.and_then(|id| self.scene.get_live(id)) {
            element_handles(image, self.camera.zoom)
                .into_iter()
                .filter(|h| h.kind.is_resize())
                .collect()
        } else {
            selection_handles(&self.scene, &self.selection, self.camera.zoom)
        };
        RenderState {
            elements,
            selection: &self.selection,
            handles,
            snap_lines: &self.overlays.snap_lines,
            suggested_bindings: &self.overlays.suggested_bindings,
            frame_highlights: &self.overlays.frame_highlights,
            pending_erasure: &self.overlays.pending_erasure,
            selection_box: self.overlays.selection_box,
            laser_trail: &self.overlays.laser_trail,
            crop_target: self.crop_target,
            editing_linear: self.editing_linear(),
            camera: &self.camera,
        }
    }

    // ---- shared helpers ----

    /// Close the current batch and forward its notification.
    fn commit(&mut self, directive: CommitDirective) {
        if self.scene.flush(directive) {
            self.events
                .extend(self.scene.take_changes().into_iter().map(EngineEvent::SceneChanged));
        }
        if directive == CommitDirective::CaptureIncrement {
            self.hit_tester.retain_live(&self.scene);
        }
    }

    fn hit_options(&self) -> HitTestOptions<'_> {
        HitTestOptions::new(self.config.hit_threshold, self.camera.zoom)
            .with_frame_clipping(self.config.frame_clipping)
    }

    /// Handle grab tolerance in scene units.
    fn handle_tolerance(&self) -> f64 {
        self.config.handle_threshold / self.camera.zoom
    }

    fn snap_query(&self) -> SnapQuery {
        SnapQuery {
            mode: self.config.snap_mode,
            grid_size: self.config.grid_size,
            threshold: self.config.snap_distance / self.camera.zoom,
        }
    }

    /// Whether object snapping applies; ctrl suspends it.
    fn snapping(&self, modifiers: Modifiers) -> bool {
        self.config.snap_mode.is_enabled() && !modifiers.command()
    }

    fn visible_area(&self) -> Option<Rect> {
        (self.viewport.width > 0.0 && self.viewport.height > 0.0)
            .then(|| self.camera.visible_rect(self.viewport))
    }

    /// Snap a point for placement: grid first, then shapes.
    fn placement_point(&mut self, point: Point, exclude: &HashSet<ElementId>, modifiers: Modifiers) -> Point {
        if !self.snapping(modifiers) {
            return point;
        }
        let visible = self.visible_area();
        self.snap.prepare(&self.scene, exclude, visible);
        let outcome = self.snap.snap_point(point, self.snap_query());
        self.overlays.snap_lines = outcome.lines;
        point + outcome.offset
    }

    fn grid_point(&self, point: Point, modifiers: Modifiers) -> Point {
        if self.config.snap_mode.snaps_to_grid() && !modifiers.command() {
            snap_to_grid(point, self.config.grid_size)
        } else {
            point
        }
    }

    /// Selected elements plus their bound text and the members of selected
    /// frames, back to front.
    fn selection_closure(&self) -> Vec<ElementId> {
        let selected = self.selection.element_ids();
        let frames: HashSet<ElementId> = self
            .scene
            .selected(&self.selection)
            .filter(|e| e.is_frame())
            .map(|e| e.id)
            .collect();
        let owners: HashSet<ElementId> = self
            .scene
            .non_deleted()
            .filter(|e| selected.contains(&e.id) || e.frame_id.is_some_and(|f| frames.contains(&f)))
            .map(|e| e.id)
            .collect();
        self.scene
            .non_deleted()
            .filter(|e| {
                owners.contains(&e.id) || e.container_id().is_some_and(|c| owners.contains(&c))
            })
            .map(|e| e.id)
            .collect()
    }

    /// Center bound text on its container and match its angle.
    fn sync_bound_text(&mut self, containers: &HashSet<ElementId>) {
        let placements: Vec<(ElementId, Point, f64)> = containers
            .iter()
            .filter_map(|&id| self.scene.get_live(id))
            .filter_map(|c| c.bound_text_id().map(|t| (t, c.center(), c.angle)))
            .collect();
        for (text_id, center, angle) in placements {
            self.scene.mutate(text_id, |t| {
                t.x = center.x - t.width / 2.0;
                t.y = center.y - t.height / 2.0;
                t.angle = angle;
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::Element;

    fn press(x: f64, y: f64) -> PointerEvent {
        PointerEvent::new(Point::new(x, y))
    }

    #[test]
    fn test_pointer_up_without_session_is_noop() {
        let mut engine = Engine::default();
        engine.on_pointer_up(press(10.0, 10.0));
        assert!(engine.drain_events().is_empty());
    }

    #[test]
    fn test_blur_releases_listeners_once() {
        let mut engine = Engine::default();
        engine.on_pointer_down(press(10.0, 10.0));
        assert_eq!(engine.active_listeners(), 1);
        engine.on_blur();
        assert_eq!(engine.active_listeners(), 0);
        engine.on_blur();
        engine.on_pointer_up(press(10.0, 10.0));
        assert_eq!(engine.active_listeners(), 0);
        assert!(!engine.has_session());
    }

    #[test]
    fn test_queued_moves_coalesce() {
        let mut engine = Engine::default();
        engine.set_tool(ToolKind::Rectangle);
        engine.on_pointer_down(press(0.0, 0.0));
        engine.queue_pointer_move(press(30.0, 30.0));
        engine.queue_pointer_move(press(60.0, 40.0));
        engine.on_pointer_up(press(60.0, 40.0));
        let rect = engine.scene().non_deleted().next().unwrap();
        assert_eq!((rect.width, rect.height), (60.0, 40.0));
    }

    #[test]
    fn test_wheel_pans_and_zooms() {
        let mut engine = Engine::default();
        engine.on_wheel(Vec2::new(0.0, 20.0), Point::ZERO, Modifiers::NONE);
        assert_eq!(engine.camera().offset, Vec2::new(0.0, -20.0));
        engine.on_wheel(Vec2::new(0.0, -100.0), Point::new(50.0, 50.0), Modifiers::ctrl());
        assert!(engine.camera().zoom > 1.0);
        let scrolls = engine
            .drain_events()
            .into_iter()
            .filter(|e| matches!(e, EngineEvent::ScrollChanged { .. }))
            .count();
        assert_eq!(scrolls, 2);
    }

    #[test]
    fn test_replace_elements_prunes_selection() {
        let rect = Element::rectangle(0.0, 0.0, 10.0, 10.0);
        let id = rect.id;
        let mut engine = Engine::default();
        engine.insert_element(rect).unwrap();
        engine.set_selection([id]);
        assert!(engine.selection().contains(id));
        engine.replace_elements(Vec::new());
        assert!(engine.selection().is_empty());
        let last = engine.drain_events().pop();
        assert!(matches!(
            last,
            Some(EngineEvent::SceneChanged(SceneChange {
                commit: CommitDirective::UpdateSnapshot,
                ..
            }))
        ));
    }

    #[test]
    fn test_middle_button_pans() {
        let mut engine = Engine::default();
        engine.on_pointer_down(press(100.0, 100.0).with_button(PointerButton::Middle));
        engine.on_pointer_move(press(130.0, 90.0).with_button(PointerButton::Middle));
        engine.on_pointer_up(press(130.0, 90.0).with_button(PointerButton::Middle));
        assert_eq!(engine.camera().offset, Vec2::new(30.0, -10.0));
        assert!(engine.scene().is_empty());
    }
}

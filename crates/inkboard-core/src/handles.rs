//! Transform handles around the selection.

use crate::element::geometry::rotate_point;
use crate::element::Element;
use crate::scene::Scene;
use crate::selection::Selection;
use kurbo::{Point, Rect, Vec2};
use serde::{Deserialize, Serialize};

/// Handle size in screen pixels.
pub const HANDLE_SIZE: f64 = 8.0;
/// Distance from the top edge to the rotation handle in screen pixels.
pub const ROTATE_HANDLE_OFFSET: f64 = 25.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Corner {
    TopLeft,
    TopRight,
    BottomRight,
    BottomLeft,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Edge {
    Top,
    Right,
    Bottom,
    Left,
}

/// Type of selection handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HandleKind {
    Corner(Corner),
    Edge(Edge),
    Rotate,
    /// A point of a single selected line or connector.
    Point(usize),
}

impl HandleKind {
    /// Direction of the handle from the box center, each component in
    /// `{-1, 0, 1}`. Zero for handles that do not resize.
    pub fn direction(self) -> Vec2 {
        match self {
            HandleKind::Corner(Corner::TopLeft) => Vec2::new(-1.0, -1.0),
            HandleKind::Corner(Corner::TopRight) => Vec2::new(1.0, -1.0),
            HandleKind::Corner(Corner::BottomRight) => Vec2::new(1.0, 1.0),
            HandleKind::Corner(Corner::BottomLeft) => Vec2::new(-1.0, 1.0),
            HandleKind::Edge(Edge::Top) => Vec2::new(0.0, -1.0),
            HandleKind::Edge(Edge::Right) => Vec2::new(1.0, 0.0),
            HandleKind::Edge(Edge::Bottom) => Vec2::new(0.0, 1.0),
            HandleKind::Edge(Edge::Left) => Vec2::new(-1.0, 0.0),
            HandleKind::Rotate | HandleKind::Point(_) => Vec2::ZERO,
        }
    }

    pub fn is_resize(self) -> bool {
        matches!(self, HandleKind::Corner(_) | HandleKind::Edge(_))
    }

    pub fn is_corner(self) -> bool {
        matches!(self, HandleKind::Corner(_))
    }
}

/// A selection handle with its position in scene coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Handle {
    pub position: Point,
    pub kind: HandleKind,
}

impl Handle {
    pub fn new(position: Point, kind: HandleKind) -> Self {
        Self { position, kind }
    }

    /// Check if a scene point hits this handle. `tolerance` is in scene
    /// units.
    pub fn hit_test(&self, point: Point, tolerance: f64) -> bool {
        (point - self.position).hypot2() <= tolerance * tolerance
    }
}

/// Handles of a single element.
pub fn element_handles(element: &Element, zoom: f64) -> Vec<Handle> {
    if element.locked {
        return Vec::new();
    }
    if let Some(data) = element.linear() {
        if data.is_fully_connected_elbow() {
            return Vec::new();
        }
        let points = element.world_points();
        let last = points.len().saturating_sub(1);
        return points
            .into_iter()
            .enumerate()
            .filter(|(i, _)| !data.elbowed || *i == 0 || *i == last)
            .map(|(i, p)| Handle::new(p, HandleKind::Point(i)))
            .collect();
    }
    let with_edges = !element.is_text();
    let with_rotate = !element.is_frame();
    box_handles(
        element.local_rect(),
        element.angle,
        zoom,
        with_edges,
        with_rotate,
    )
}

/// Handles of the current selection: the element's own handles for a
/// single element, the common bounding box otherwise.
pub fn selection_handles(scene: &Scene, selection: &Selection, zoom: f64) -> Vec<Handle> {
    let selected: Vec<&Element> = scene.selected(selection).collect();
    match selected.as_slice() {
        [] => Vec::new(),
        [only] => element_handles(only, zoom),
        many => {
            let Some(bounds) = selection_bounds(scene, selection) else {
                return Vec::new();
            };
            let with_rotate = many.iter().all(|e| !e.is_frame());
            box_handles(bounds, 0.0, zoom, true, with_rotate)
        }
    }
}

/// The common axis-aligned bounds of the selected elements.
pub fn selection_bounds(scene: &Scene, selection: &Selection) -> Option<Rect> {
    scene
        .selected(selection)
        .map(Element::bounds)
        .reduce(|acc, b| acc.union(b))
}

/// Handle hit at `point`, or `None`. `tolerance` is in scene units.
pub fn hit_test_handles(handles: &[Handle], point: Point, tolerance: f64) -> Option<HandleKind> {
    handles
        .iter()
        .filter(|h| h.hit_test(point, tolerance))
        .min_by(|a, b| {
            (a.position - point)
                .hypot2()
                .partial_cmp(&(b.position - point).hypot2())
                .unwrap_or(std::cmp::Ordering::Equal)
        })
        .map(|h| h.kind)
}

fn box_handles(rect: Rect, angle: f64, zoom: f64, with_edges: bool, with_rotate: bool) -> Vec<Handle> {
    let center = rect.center();
    let rotate = |p: Point| rotate_point(p, center, angle);
    let mut handles = vec![
        Handle::new(rotate(Point::new(rect.x0, rect.y0)), HandleKind::Corner(Corner::TopLeft)),
        Handle::new(rotate(Point::new(rect.x1, rect.y0)), HandleKind::Corner(Corner::TopRight)),
        Handle::new(rotate(Point::new(rect.x1, rect.y1)), HandleKind::Corner(Corner::BottomRight)),
        Handle::new(rotate(Point::new(rect.x0, rect.y1)), HandleKind::Corner(Corner::BottomLeft)),
    ];
    if with_edges {
        handles.extend([
            Handle::new(rotate(Point::new(center.x, rect.y0)), HandleKind::Edge(Edge::Top)),
            Handle::new(rotate(Point::new(rect.x1, center.y)), HandleKind::Edge(Edge::Right)),
            Handle::new(rotate(Point::new(center.x, rect.y1)), HandleKind::Edge(Edge::Bottom)),
            Handle::new(rotate(Point::new(rect.x0, center.y)), HandleKind::Edge(Edge::Left)),
        ]);
    }
    if with_rotate {
        let offset = ROTATE_HANDLE_OFFSET / zoom.max(f64::EPSILON);
        handles.push(Handle::new(
            rotate(Point::new(center.x, rect.y0 - offset)),
            HandleKind::Rotate,
        ));
    }
    handles
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::PointBinding;
    use uuid::Uuid;

    #[test]
    fn test_rectangle_handles() {
        let rect = Element::rectangle(0.0, 0.0, 100.0, 50.0);
        let handles = element_handles(&rect, 1.0);
        // 4 corners + 4 edges + rotation
        assert_eq!(handles.len(), 9);
        assert_eq!(handles[0].kind, HandleKind::Corner(Corner::TopLeft));
        let rotate = handles.last().unwrap();
        assert_eq!(rotate.kind, HandleKind::Rotate);
        assert!((rotate.position.y + ROTATE_HANDLE_OFFSET).abs() < 1e-9);
    }

    #[test]
    fn test_frame_has_no_rotation_handle() {
        let frame = Element::frame(0.0, 0.0, 100.0, 100.0);
        let handles = element_handles(&frame, 1.0);
        assert!(handles.iter().all(|h| h.kind != HandleKind::Rotate));
    }

    #[test]
    fn test_line_handles() {
        let line = Element::line(&[Point::new(0.0, 0.0), Point::new(50.0, 0.0), Point::new(100.0, 100.0)]);
        let handles = element_handles(&line, 1.0);
        assert_eq!(handles.len(), 3);
        assert_eq!(handles[2].kind, HandleKind::Point(2));
        assert!((handles[2].position - Point::new(100.0, 100.0)).hypot() < 1e-9);
    }

    #[test]
    fn test_fully_bound_elbow_has_no_handles() {
        let mut arrow = Element::arrow(&[Point::new(0.0, 0.0), Point::new(100.0, 100.0)]);
        let binding = PointBinding {
            element_id: Uuid::new_v4(),
            focus: Point::new(0.5, 0.5),
            gap: 4.0,
        };
        if let Some(data) = arrow.linear_mut() {
            data.elbowed = true;
            data.start_binding = Some(binding);
            data.end_binding = Some(binding);
        }
        assert!(element_handles(&arrow, 1.0).is_empty());
    }

    #[test]
    fn test_handle_hit_test() {
        let handle = Handle::new(Point::new(50.0, 50.0), HandleKind::Point(0));
        assert!(handle.hit_test(Point::new(50.0, 50.0), 10.0));
        assert!(handle.hit_test(Point::new(55.0, 55.0), 10.0));
        assert!(!handle.hit_test(Point::new(70.0, 70.0), 10.0));
    }

    #[test]
    fn test_hit_test_picks_nearest() {
        let rect = Element::rectangle(0.0, 0.0, 10.0, 10.0);
        let handles = element_handles(&rect, 1.0);
        assert_eq!(
            hit_test_handles(&handles, Point::new(9.0, 9.0), 8.0),
            Some(HandleKind::Corner(Corner::BottomRight))
        );
    }

    #[test]
    fn test_multi_selection_uses_common_bounds() {
        let a = Element::rectangle(0.0, 0.0, 10.0, 10.0);
        let b = Element::rectangle(90.0, 40.0, 10.0, 10.0);
        let mut selection = Selection::new();
        selection.add(a.id);
        selection.add(b.id);
        let scene = Scene::from_elements(vec![a, b]).unwrap();
        let handles = selection_handles(&scene, &selection, 1.0);
        let br = handles
            .iter()
            .find(|h| h.kind == HandleKind::Corner(Corner::BottomRight))
            .unwrap();
        assert!((br.position - Point::new(100.0, 50.0)).hypot() < 1e-9);
    }
}

//! Connector-to-shape bindings.
//!
//! A binding stores a normalized focus inside the target's unrotated box.
//! The bound endpoint is placed where the segment from its neighbouring
//! point towards the focus anchor crosses the target outline, backed off by
//! the binding gap.

use crate::element::geometry::{point_to_polygon_outline_dist, polygon_contains, segment_polygon_intersection};
use crate::element::{BoundElement, BoundKind, Element, ElementId, Endpoint, PointBinding};
use crate::elbow::{self, Heading};
use crate::scene::Scene;
use kurbo::Point;
use std::collections::HashSet;

/// Clearance between a bound endpoint and the target outline.
pub const BINDING_GAP: f64 = 4.0;
/// Activation margin bounds in screen pixels.
const MIN_ACTIVATION_PX: f64 = 10.0;
const MAX_ACTIVATION_PX: f64 = 32.0;
/// Distance an elbow connector keeps from its targets before turning.
pub const ELBOW_PADDING: f64 = 20.0;

/// Whether connectors can attach to `element`.
pub fn is_bindable(element: &Element) -> bool {
    !element.is_deleted
        && (element.is_generic_shape()
            || element.is_image()
            || element.is_embed()
            || (element.is_text() && element.container_id().is_none()))
}

/// Margin around a target's outline in which an endpoint binds.
///
/// Never smaller than the binding gap, so a bound endpoint stays in range of
/// its own target at any zoom.
pub fn activation_margin(target: &Element, zoom: f64) -> f64 {
    let zoom = zoom.max(f64::EPSILON);
    let smaller = target.width.min(target.height);
    let margin = (smaller * 0.25).clamp(MIN_ACTIVATION_PX / zoom, MAX_ACTIVATION_PX / zoom);
    margin.max(BINDING_GAP + MIN_ACTIVATION_PX / zoom)
}

/// Whether `point` is inside the target or within its activation margin.
pub fn in_activation_region(target: &Element, point: Point, zoom: f64) -> bool {
    let outline = target.outline();
    polygon_contains(&outline, point)
        || point_to_polygon_outline_dist(point, &outline) <= activation_margin(target, zoom)
}

/// Topmost bindable element whose activation region contains `point`.
pub fn binding_target<'s>(
    scene: &'s Scene,
    point: Point,
    zoom: f64,
    exclude: &HashSet<ElementId>,
) -> Option<&'s Element> {
    let candidates: Vec<&Element> = scene
        .non_deleted()
        .filter(|e| is_bindable(e) && !exclude.contains(&e.id))
        .collect();
    candidates
        .into_iter()
        .rev()
        .find(|e| in_activation_region(e, point, zoom))
}

/// Suggested target for one connector endpoint at `point`.
///
/// A straight two-point connector is never suggested the element its other
/// endpoint is already bound to.
pub fn suggest_binding(
    scene: &Scene,
    connector: &Element,
    endpoint: Endpoint,
    point: Point,
    zoom: f64,
    exclude: &HashSet<ElementId>,
) -> Option<ElementId> {
    let data = connector.linear()?;
    if !connector.is_connector() {
        return None;
    }
    let mut exclude = exclude.clone();
    exclude.insert(connector.id);
    let target = binding_target(scene, point, zoom, &exclude)?;
    let other = data.binding(endpoint.other()).map(|b| b.element_id);
    if data.is_simple() && other == Some(target.id) {
        return None;
    }
    Some(target.id)
}

/// Normalized position of `point` inside the target's unrotated box.
pub fn focus_for(target: &Element, point: Point) -> Point {
    let local = target.to_local(point);
    let fraction = |v: f64, origin: f64, size: f64| {
        if size <= f64::EPSILON {
            0.5
        } else {
            ((v - origin) / size).clamp(0.0, 1.0)
        }
    };
    Point::new(
        fraction(local.x, target.x, target.width),
        fraction(local.y, target.y, target.height),
    )
}

/// Scene position of a focus.
pub fn anchor_point(target: &Element, focus: Point) -> Point {
    target.to_world(Point::new(
        target.x + focus.x * target.width,
        target.y + focus.y * target.height,
    ))
}

/// Where a bound endpoint sits given its neighbouring point.
pub fn endpoint_position(target: &Element, binding: &PointBinding, adjacent: Point) -> Point {
    let anchor = anchor_point(target, binding.focus);
    let outline = target.outline();
    match segment_polygon_intersection(adjacent, anchor, &outline) {
        Some(hit) => {
            let back = adjacent - hit;
            let len = back.hypot();
            if len <= binding.gap || len < f64::EPSILON {
                hit
            } else {
                hit + back * (binding.gap / len)
            }
        }
        None => anchor,
    }
}

fn endpoint_index(points: &[Point], endpoint: Endpoint) -> usize {
    match endpoint {
        Endpoint::Start => 0,
        Endpoint::End => points.len().saturating_sub(1),
    }
}

fn adjacent_index(points: &[Point], endpoint: Endpoint) -> usize {
    match endpoint {
        Endpoint::Start => 1.min(points.len().saturating_sub(1)),
        Endpoint::End => points.len().saturating_sub(2),
    }
}

/// Add the connector back-reference on a target.
fn link(scene: &mut Scene, target_id: ElementId, connector_id: ElementId) {
    scene.mutate(target_id, |t| {
        if !t.bound_elements.iter().any(|b| b.id == connector_id) {
            t.bound_elements.push(BoundElement {
                id: connector_id,
                kind: BoundKind::Connector,
            });
        }
    });
}

/// Remove the connector back-reference unless the other end still uses it.
fn unlink(scene: &mut Scene, target_id: ElementId, connector_id: ElementId) {
    let still_bound = scene
        .get_live(connector_id)
        .and_then(Element::linear)
        .is_some_and(|d| {
            [d.start_binding, d.end_binding]
                .iter()
                .flatten()
                .any(|b| b.element_id == target_id)
        });
    if !still_bound {
        scene.mutate(target_id, |t| t.bound_elements.retain(|b| b.id != connector_id));
    }
}

/// Finalize the bindings of a connector at gesture end.
///
/// Each endpoint keeps or gains a binding to the target its position is in
/// range of, or loses it. Endpoints are then snapped to their targets.
/// Returns whether any binding changed.
pub fn commit_bindings(scene: &mut Scene, connector_id: ElementId, zoom: f64) -> bool {
    let Some(connector) = scene.get_live(connector_id).cloned() else {
        return false;
    };
    let Some(data) = connector.linear() else {
        return false;
    };
    if !connector.is_connector() {
        return false;
    }
    let points = connector.world_points();
    if points.len() < 2 {
        return false;
    }
    let exclude = HashSet::from([connector_id]);
    let mut next = [data.start_binding, data.end_binding];
    for (slot, endpoint) in [Endpoint::Start, Endpoint::End].into_iter().enumerate() {
        let point = points[endpoint_index(&points, endpoint)];
        next[slot] = binding_target(scene, point, zoom, &exclude).map(|target| PointBinding {
            element_id: target.id,
            focus: focus_for(target, point),
            gap: BINDING_GAP,
        });
    }
    if data.is_simple() {
        if let [Some(start), Some(end)] = next {
            if start.element_id == end.element_id {
                // Both ends on one shape: keep the end the user just placed.
                next[0] = None;
            }
        }
    }

    let previous = [data.start_binding, data.end_binding];
    let changed = previous
        .iter()
        .zip(next.iter())
        .any(|(a, b)| a.map(|x| x.element_id) != b.map(|x| x.element_id));
    scene.mutate(connector_id, |e| {
        if let Some(d) = e.linear_mut() {
            d.start_binding = next[0];
            d.end_binding = next[1];
        }
    });
    for old in previous.iter().flatten() {
        unlink(scene, old.element_id, connector_id);
    }
    for new in next.iter().flatten() {
        link(scene, new.element_id, connector_id);
    }
    if changed {
        log::debug!(
            "Connector {} bound to {:?} / {:?}",
            connector_id,
            next[0].map(|b| b.element_id),
            next[1].map(|b| b.element_id)
        );
    }
    refresh_connector(scene, connector_id);
    changed
}

/// Drop both bindings of a connector and the matching back-references.
pub fn unbind_connector(scene: &mut Scene, connector_id: ElementId) {
    let Some(data) = scene.get_live(connector_id).and_then(Element::linear).cloned() else {
        return;
    };
    scene.mutate(connector_id, |e| {
        if let Some(d) = e.linear_mut() {
            d.start_binding = None;
            d.end_binding = None;
        }
    });
    for old in [data.start_binding, data.end_binding].iter().flatten() {
        unlink(scene, old.element_id, connector_id);
    }
}

/// Re-place the bound endpoints of a connector on their targets and
/// re-route elbow connectors. Bindings to elements that are gone are
/// dropped.
pub fn refresh_connector(scene: &mut Scene, connector_id: ElementId) {
    let Some(connector) = scene.get_live(connector_id).cloned() else {
        return;
    };
    let Some(data) = connector.linear() else {
        return;
    };
    let mut points = connector.world_points();
    if points.len() < 2 {
        return;
    }
    let original = points.clone();
    let mut headings: [Option<Heading>; 2] = [None, None];
    let mut stale = [false, false];

    for (slot, endpoint) in [Endpoint::Start, Endpoint::End].into_iter().enumerate() {
        let Some(binding) = data.binding(endpoint) else {
            continue;
        };
        let Some(target) = scene.get_live(binding.element_id) else {
            stale[slot] = true;
            continue;
        };
        let adjacent = if data.elbowed {
            let other = endpoint.other();
            data.binding(other)
                .and_then(|b| scene.get_live(b.element_id).map(|t| anchor_point(t, b.focus)))
                .unwrap_or(original[endpoint_index(&original, other)])
        } else {
            original[adjacent_index(&original, endpoint)]
        };
        let position = endpoint_position(target, binding, adjacent);
        points[endpoint_index(&original, endpoint)] = position;
        headings[slot] = Some(Heading::from_bounds(target.bounds(), position));
    }

    if data.elbowed {
        let start = points[0];
        let end = points[points.len() - 1];
        points = elbow::route(start, headings[0], end, headings[1], ELBOW_PADDING);
    }
    scene.mutate(connector_id, |e| {
        e.set_world_points(&points);
        if let Some(d) = e.linear_mut() {
            if stale[0] {
                d.start_binding = None;
            }
            if stale[1] {
                d.end_binding = None;
            }
        }
    });
}

/// Connectors bound to any of `ids`.
pub fn connectors_bound_to(scene: &Scene, ids: &HashSet<ElementId>) -> Vec<ElementId> {
    scene
        .non_deleted()
        .filter(|e| {
            e.linear().is_some_and(|d| {
                [d.start_binding, d.end_binding]
                    .iter()
                    .flatten()
                    .any(|b| ids.contains(&b.element_id))
            })
        })
        .map(|e| e.id)
        .collect()
}

/// Make connectors follow elements that moved, resized or rotated.
pub fn update_bound_connectors(scene: &mut Scene, moved: &HashSet<ElementId>) {
    for connector_id in connectors_bound_to(scene, moved) {
        refresh_connector(scene, connector_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kurbo::Vec2;

    fn two_boxes() -> (Scene, ElementId, ElementId) {
        let a = Element::rectangle(0.0, 0.0, 100.0, 100.0);
        let b = Element::rectangle(300.0, 0.0, 100.0, 100.0);
        let (a_id, b_id) = (a.id, b.id);
        (Scene::from_elements(vec![a, b]).unwrap(), a_id, b_id)
    }

    #[test]
    fn test_focus_and_anchor_agree() {
        let rect = Element::rectangle(10.0, 20.0, 100.0, 50.0).with_angle(0.4);
        let point = rect.to_world(Point::new(35.0, 30.0));
        let focus = focus_for(&rect, point);
        assert!((focus.x - 0.25).abs() < 1e-9);
        assert!((focus.y - 0.2).abs() < 1e-9);
        assert!((anchor_point(&rect, focus) - point).hypot() < 1e-9);
    }

    #[test]
    fn test_endpoint_sits_outside_outline_by_gap() {
        let rect = Element::rectangle(0.0, 0.0, 100.0, 100.0);
        let binding = PointBinding {
            element_id: rect.id,
            focus: Point::new(0.5, 0.5),
            gap: BINDING_GAP,
        };
        let p = endpoint_position(&rect, &binding, Point::new(300.0, 50.0));
        assert!((p - Point::new(100.0 + BINDING_GAP, 50.0)).hypot() < 1e-9);
    }

    #[test]
    fn test_commit_binds_both_ends() {
        let (mut scene, a_id, b_id) = two_boxes();
        let arrow = Element::arrow(&[Point::new(50.0, 50.0), Point::new(350.0, 50.0)]);
        let arrow_id = arrow.id;
        scene.insert(arrow).unwrap();

        assert!(commit_bindings(&mut scene, arrow_id, 1.0));
        let data = scene.get(arrow_id).and_then(Element::linear).unwrap();
        assert_eq!(data.start_binding.map(|b| b.element_id), Some(a_id));
        assert_eq!(data.end_binding.map(|b| b.element_id), Some(b_id));
        let a = scene.get(a_id).unwrap();
        assert!(a.bound_elements.iter().any(|b| b.id == arrow_id));

        let points = scene.get(arrow_id).unwrap().world_points();
        assert!((points[0].x - 104.0).abs() < 1e-6);
        assert!((points[1].x - 296.0).abs() < 1e-6);
    }

    #[test]
    fn test_connector_follows_moved_target() {
        let (mut scene, a_id, _) = two_boxes();
        let arrow = Element::arrow(&[Point::new(50.0, 50.0), Point::new(350.0, 50.0)]);
        let arrow_id = arrow.id;
        scene.insert(arrow).unwrap();
        commit_bindings(&mut scene, arrow_id, 1.0);

        scene.mutate(a_id, |e| e.translate(Vec2::new(20.0, 20.0)));
        update_bound_connectors(&mut scene, &HashSet::from([a_id]));

        let a = scene.get(a_id).unwrap().clone();
        let start = scene.get(arrow_id).unwrap().world_points()[0];
        assert!(in_activation_region(&a, start, 1.0));
    }

    #[test]
    fn test_bound_endpoint_stays_in_range_when_zoomed_in() {
        let (mut scene, a_id, b_id) = two_boxes();
        let arrow = Element::arrow(&[Point::new(50.0, 50.0), Point::new(350.0, 50.0)]);
        let arrow_id = arrow.id;
        scene.insert(arrow).unwrap();
        let zoom = 11.0;
        commit_bindings(&mut scene, arrow_id, zoom);

        let start = scene.get(arrow_id).unwrap().world_points()[0];
        assert!(activation_margin(scene.get(a_id).unwrap(), zoom) > BINDING_GAP);
        assert!(in_activation_region(scene.get(a_id).unwrap(), start, zoom));

        // Re-committing in place keeps both bindings.
        assert!(!commit_bindings(&mut scene, arrow_id, zoom));
        let data = scene.get(arrow_id).and_then(Element::linear).unwrap();
        assert_eq!(data.start_binding.map(|b| b.element_id), Some(a_id));
        assert_eq!(data.end_binding.map(|b| b.element_id), Some(b_id));
    }

    #[test]
    fn test_no_suggestion_for_same_target_on_simple_connector() {
        let (mut scene, a_id, _) = two_boxes();
        let mut arrow = Element::arrow(&[Point::new(50.0, 50.0), Point::new(60.0, 60.0)]);
        if let Some(d) = arrow.linear_mut() {
            d.start_binding = Some(PointBinding {
                element_id: a_id,
                focus: Point::new(0.5, 0.5),
                gap: BINDING_GAP,
            });
        }
        scene.insert(arrow.clone()).unwrap();
        let suggestion = suggest_binding(&scene, &arrow, Endpoint::End, Point::new(60.0, 60.0), 1.0, &HashSet::new());
        assert_eq!(suggestion, None);
        let elsewhere = suggest_binding(&scene, &arrow, Endpoint::End, Point::new(350.0, 50.0), 1.0, &HashSet::new());
        assert!(elsewhere.is_some());
    }

    #[test]
    fn test_commit_clears_out_of_range_binding() {
        let (mut scene, a_id, _) = two_boxes();
        let arrow = Element::arrow(&[Point::new(50.0, 50.0), Point::new(200.0, 250.0)]);
        let arrow_id = arrow.id;
        scene.insert(arrow).unwrap();
        commit_bindings(&mut scene, arrow_id, 1.0);
        assert!(scene.get(a_id).unwrap().bound_elements.iter().any(|b| b.id == arrow_id));

        // Drag the whole connector far away.
        scene.mutate(arrow_id, |e| e.translate(Vec2::new(0.0, 500.0)));
        commit_bindings(&mut scene, arrow_id, 1.0);
        let data = scene.get(arrow_id).and_then(Element::linear).unwrap();
        assert!(data.start_binding.is_none());
        assert!(scene.get(a_id).unwrap().bound_elements.is_empty());
    }

    #[test]
    fn test_elbow_connector_reroutes() {
        let (mut scene, a_id, _) = two_boxes();
        let mut arrow = Element::arrow(&[Point::new(50.0, 50.0), Point::new(350.0, 50.0)]);
        if let Some(d) = arrow.linear_mut() {
            d.elbowed = true;
        }
        let arrow_id = arrow.id;
        scene.insert(arrow).unwrap();
        commit_bindings(&mut scene, arrow_id, 1.0);

        scene.mutate(a_id, |e| e.translate(Vec2::new(0.0, 150.0)));
        update_bound_connectors(&mut scene, &HashSet::from([a_id]));
        let points = scene.get(arrow_id).unwrap().world_points();
        assert!(points.len() > 2);
        assert!(elbow::is_orthogonal(&points));
    }

    #[test]
    fn test_frames_are_not_bindable() {
        let frame = Element::frame(0.0, 0.0, 100.0, 100.0);
        assert!(!is_bindable(&frame));
        assert!(is_bindable(&Element::ellipse(0.0, 0.0, 10.0, 10.0)));
    }
}

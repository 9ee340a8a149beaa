//! Frame membership by spatial overlap.
//!
//! Frames contain elements without owning them. Membership is recomputed
//! from geometry at the end of gestures; frames never nest.

use crate::element::geometry::rects_overlap;
use crate::element::{Element, ElementId};
use crate::scene::Scene;
use kurbo::Rect;
use std::collections::HashSet;

/// Live members of a frame, back to front.
pub fn frame_members(scene: &Scene, frame_id: ElementId) -> Vec<ElementId> {
    scene
        .non_deleted()
        .filter(|e| e.frame_id == Some(frame_id))
        .map(|e| e.id)
        .collect()
}

/// Topmost live frame overlapping `bounds`, skipping `exclude`.
pub fn frame_at(scene: &Scene, bounds: Rect, exclude: &HashSet<ElementId>) -> Option<ElementId> {
    let frames: Vec<&Element> = scene
        .non_deleted()
        .filter(|e| e.is_frame() && !exclude.contains(&e.id))
        .collect();
    frames
        .into_iter()
        .rev()
        .find(|f| rects_overlap(f.bounds(), bounds))
        .map(|f| f.id)
}

/// Frames that would receive the moving elements, for highlighting.
pub fn frames_overlapping(scene: &Scene, moving: &[&Element], exclude: &HashSet<ElementId>) -> Vec<ElementId> {
    let mut found: Vec<ElementId> = Vec::new();
    for element in moving.iter().filter(|e| !e.is_frame()) {
        if let Some(frame) = frame_at(scene, element.bounds(), exclude) {
            if !found.contains(&frame) {
                found.push(frame);
            }
        }
    }
    found
}

/// Recompute `frame_id` for the given elements. Bound text follows its
/// container. Returns the ids whose membership changed.
pub fn update_frame_membership(scene: &mut Scene, ids: &HashSet<ElementId>) -> Vec<ElementId> {
    let mut assignments: Vec<(ElementId, Option<ElementId>)> = Vec::new();
    for &id in ids {
        let Some(element) = scene.get_live(id) else {
            continue;
        };
        let frame = if element.is_frame() {
            None
        } else {
            let owner = element
                .container_id()
                .and_then(|c| scene.get_live(c))
                .unwrap_or(element);
            frame_at(scene, owner.bounds(), &HashSet::from([id, owner.id]))
        };
        if element.frame_id != frame {
            assignments.push((id, frame));
        }
        if let Some(text) = element.bound_text_id().filter(|t| !ids.contains(t)) {
            if scene.get_live(text).is_some_and(|t| t.frame_id != frame) {
                assignments.push((text, frame));
            }
        }
    }
    let changed: Vec<ElementId> = assignments.iter().map(|(id, _)| *id).collect();
    for (id, frame) in assignments {
        scene.mutate(id, |e| e.frame_id = frame);
    }
    if !changed.is_empty() {
        log::debug!("Frame membership changed for {} element(s)", changed.len());
    }
    changed
}

/// Re-evaluate membership around frames whose bounds changed: current
/// members it no longer overlaps are released, elements it now overlaps are
/// adopted. Returns the ids whose membership changed.
pub fn refit_frames(scene: &mut Scene, frames: &HashSet<ElementId>) -> Vec<ElementId> {
    let mut candidates: HashSet<ElementId> = HashSet::new();
    for &frame_id in frames {
        let Some(area) = scene.get_live(frame_id).filter(|f| f.is_frame()).map(Element::bounds) else {
            continue;
        };
        candidates.extend(
            scene
                .non_deleted()
                .filter(|e| !e.is_frame())
                .filter(|e| e.frame_id == Some(frame_id) || rects_overlap(area, e.bounds()))
                .map(|e| e.id),
        );
    }
    if candidates.is_empty() {
        return Vec::new();
    }
    update_frame_membership(scene, &candidates)
}

/// Live non-frame elements a frame with `area` would adopt, for highlighting.
pub fn elements_adopted_by(scene: &Scene, frame_id: ElementId, area: Rect) -> Vec<ElementId> {
    scene
        .non_deleted()
        .filter(|e| !e.is_frame() && e.frame_id != Some(frame_id) && e.container_id().is_none())
        .filter(|e| rects_overlap(area, e.bounds()))
        .map(|e| e.id)
        .collect()
}

/// Assign every live non-frame element overlapping a new frame to it.
pub fn adopt_overlapping(scene: &mut Scene, frame_id: ElementId) -> Vec<ElementId> {
    let Some(frame) = scene.get_live(frame_id) else {
        return Vec::new();
    };
    let area = frame.bounds();
    let adopted: Vec<ElementId> = scene
        .non_deleted()
        .filter(|e| !e.is_frame() && e.frame_id.is_none() && rects_overlap(area, e.bounds()))
        .map(|e| e.id)
        .collect();
    for &id in &adopted {
        scene.mutate(id, |e| e.frame_id = Some(frame_id));
    }
    adopted
}

#[cfg(test)]
mod tests {
    use super::*;
    use kurbo::Vec2;

    #[test]
    fn test_membership_follows_overlap() {
        let frame = Element::frame(0.0, 0.0, 200.0, 200.0);
        let rect = Element::rectangle(50.0, 50.0, 20.0, 20.0);
        let (frame_id, rect_id) = (frame.id, rect.id);
        let mut scene = Scene::from_elements(vec![frame, rect]).unwrap();

        let changed = update_frame_membership(&mut scene, &HashSet::from([rect_id]));
        assert_eq!(changed, vec![rect_id]);
        assert_eq!(scene.get(rect_id).unwrap().frame_id, Some(frame_id));
        assert_eq!(frame_members(&scene, frame_id), vec![rect_id]);

        scene.mutate(rect_id, |e| e.translate(Vec2::new(500.0, 0.0)));
        update_frame_membership(&mut scene, &HashSet::from([rect_id]));
        assert_eq!(scene.get(rect_id).unwrap().frame_id, None);
    }

    #[test]
    fn test_frames_never_nest() {
        let outer = Element::frame(0.0, 0.0, 500.0, 500.0);
        let inner = Element::frame(10.0, 10.0, 50.0, 50.0);
        let inner_id = inner.id;
        let mut scene = Scene::from_elements(vec![outer, inner]).unwrap();
        update_frame_membership(&mut scene, &HashSet::from([inner_id]));
        assert_eq!(scene.get(inner_id).unwrap().frame_id, None);
    }

    #[test]
    fn test_refit_after_frame_shrinks_and_grows() {
        let frame = Element::frame(0.0, 0.0, 300.0, 300.0);
        let inside = Element::rectangle(20.0, 20.0, 30.0, 30.0);
        let corner = Element::rectangle(200.0, 200.0, 50.0, 50.0);
        let outside = Element::rectangle(400.0, 20.0, 30.0, 30.0);
        let (frame_id, inside_id, corner_id, outside_id) = (frame.id, inside.id, corner.id, outside.id);
        let mut scene = Scene::from_elements(vec![frame, inside, corner, outside]).unwrap();
        adopt_overlapping(&mut scene, frame_id);
        assert_eq!(frame_members(&scene, frame_id), vec![inside_id, corner_id]);

        scene.mutate(frame_id, |e| {
            e.width = 100.0;
            e.height = 100.0;
        });
        assert_eq!(refit_frames(&mut scene, &HashSet::from([frame_id])), vec![corner_id]);
        assert_eq!(scene.get(corner_id).unwrap().frame_id, None);
        assert_eq!(frame_members(&scene, frame_id), vec![inside_id]);

        scene.mutate(frame_id, |e| e.width = 500.0);
        assert_eq!(elements_adopted_by(&scene, frame_id, scene.get(frame_id).unwrap().bounds()), vec![outside_id]);
        refit_frames(&mut scene, &HashSet::from([frame_id]));
        assert_eq!(scene.get(outside_id).unwrap().frame_id, Some(frame_id));
    }

    #[test]
    fn test_adopt_overlapping() {
        let rect = Element::rectangle(50.0, 50.0, 20.0, 20.0);
        let far = Element::rectangle(500.0, 500.0, 20.0, 20.0);
        let frame = Element::frame(0.0, 0.0, 100.0, 100.0);
        let (rect_id, frame_id) = (rect.id, frame.id);
        let mut scene = Scene::from_elements(vec![rect, far, frame]).unwrap();
        assert_eq!(adopt_overlapping(&mut scene, frame_id), vec![rect_id]);
    }
}

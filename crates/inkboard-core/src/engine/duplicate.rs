//! Copying elements with fresh identities.

use super::Engine;
use crate::element::{BoundElement, Element, ElementId, ElementKind, GroupId, PointBinding, generate_seed};
use crate::frame::update_frame_membership;
use crate::group::element_ids_in_group;
use crate::scene::{CommitDirective, Scene};
use crate::selection::normalize_selection;
use kurbo::Vec2;
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

/// Offset of keyboard duplicates from their source.
const DUPLICATE_OFFSET: f64 = 10.0;

/// Copy `ids` with fresh ids, each copy placed directly above its source.
///
/// References among the copies are remapped. Groups copied whole get new
/// ids; groups copied in part are kept. Bindings and containers pointing
/// outside the copied set are dropped. Returns source id to copy id.
pub(crate) fn copy_elements(
    scene: &mut Scene,
    ids: &HashSet<ElementId>,
    offset: Vec2,
) -> HashMap<ElementId, ElementId> {
    let originals: Vec<Element> = scene
        .non_deleted()
        .filter(|e| ids.contains(&e.id))
        .cloned()
        .collect();
    let id_map: HashMap<ElementId, ElementId> =
        originals.iter().map(|e| (e.id, Uuid::new_v4())).collect();

    let touched_groups: HashSet<GroupId> = originals
        .iter()
        .flat_map(|e| e.group_ids.iter().copied())
        .collect();
    let group_map: HashMap<GroupId, GroupId> = touched_groups
        .into_iter()
        .filter(|g| element_ids_in_group(scene, *g).iter().all(|m| ids.contains(m)))
        .map(|g| (g, Uuid::new_v4()))
        .collect();

    for original in &originals {
        let Some(copy) = remap(original, &id_map, &group_map, offset) else {
            continue;
        };
        let index = scene.z_index(original.id).map_or(usize::MAX, |i| i + 1);
        if let Err(err) = scene.insert_at(index, copy) {
            log::warn!("Failed to insert copy of {}: {}", original.id, err);
        }
    }
    id_map
}

fn remap(
    original: &Element,
    id_map: &HashMap<ElementId, ElementId>,
    group_map: &HashMap<GroupId, GroupId>,
    offset: Vec2,
) -> Option<Element> {
    let mut copy = original.clone();
    copy.id = *id_map.get(&original.id)?;
    copy.version = 1;
    copy.version_nonce = generate_seed();
    copy.translate(offset);
    copy.group_ids = original
        .group_ids
        .iter()
        .map(|g| group_map.get(g).copied().unwrap_or(*g))
        .collect();
    copy.frame_id = original
        .frame_id
        .map(|f| id_map.get(&f).copied().unwrap_or(f));
    copy.bound_elements = original
        .bound_elements
        .iter()
        .filter_map(|b| {
            id_map.get(&b.id).map(|&id| BoundElement { id, kind: b.kind })
        })
        .collect();
    match &mut copy.kind {
        ElementKind::Text(text) => {
            text.container_id = text.container_id.and_then(|c| id_map.get(&c).copied());
        }
        ElementKind::Line(data) | ElementKind::Arrow(data) => {
            for binding in [&mut data.start_binding, &mut data.end_binding] {
                *binding = binding.and_then(|b| {
                    id_map.get(&b.element_id).map(|&element_id| PointBinding { element_id, ..b })
                });
            }
        }
        _ => {}
    }
    Some(copy)
}

impl Engine {
    /// Duplicate the selection with a small offset and select the copies.
    pub(super) fn duplicate_selection(&mut self) {
        let ids: HashSet<ElementId> = self.selection_closure().into_iter().collect();
        if ids.is_empty() {
            return;
        }
        let mapping = copy_elements(&mut self.scene, &ids, Vec2::new(DUPLICATE_OFFSET, DUPLICATE_OFFSET));
        let selected: Vec<ElementId> = self
            .selection
            .element_ids()
            .iter()
            .filter_map(|id| mapping.get(id).copied())
            .collect();
        let copies: HashSet<ElementId> = mapping.values().copied().collect();
        update_frame_membership(&mut self.scene, &copies);
        self.selection.select_all_of(selected);
        normalize_selection(&self.scene, &mut self.selection);
        self.commit(CommitDirective::CaptureIncrement);
        log::debug!("Duplicated {} element(s)", copies.len());
    }
}

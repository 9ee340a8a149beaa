//! Group membership helpers.
//!
//! Groups are not elements; membership is the ordered `group_ids` list on
//! each element, outermost first.

use crate::element::{Element, ElementId, GroupId};
use crate::scene::Scene;
use std::collections::HashSet;
use uuid::Uuid;

/// Live elements belonging to `group_id`, back to front.
pub fn elements_in_group(scene: &Scene, group_id: GroupId) -> impl Iterator<Item = &Element> {
    scene
        .non_deleted()
        .filter(move |e| e.group_ids.contains(&group_id))
}

pub fn element_ids_in_group(scene: &Scene, group_id: GroupId) -> Vec<ElementId> {
    elements_in_group(scene, group_id).map(|e| e.id).collect()
}

/// The group that is picked up when `element` is hit while
/// `editing_group` is entered: the group just inside the editing group, or
/// the outermost group when the element is outside it.
pub fn selectable_group(element: &Element, editing_group: Option<GroupId>) -> Option<GroupId> {
    let entered = editing_group.and_then(|g| element.group_ids.iter().position(|&x| x == g));
    match entered {
        Some(index) => element.group_ids.get(index + 1).copied(),
        None => element.group_ids.first().copied(),
    }
}

/// Every live element that moves together with `element`: its selectable
/// group's members, or just itself.
pub fn group_closure(scene: &Scene, element: &Element, editing_group: Option<GroupId>) -> Vec<ElementId> {
    match selectable_group(element, editing_group) {
        Some(group_id) => element_ids_in_group(scene, group_id),
        None => vec![element.id],
    }
}

/// Put `ids` into a new group nested directly inside `editing_group` (or
/// outermost). Returns the new group id, or `None` for fewer than two
/// elements.
pub fn group_elements(
    scene: &mut Scene,
    ids: &HashSet<ElementId>,
    editing_group: Option<GroupId>,
) -> Option<GroupId> {
    let members: Vec<ElementId> = scene
        .non_deleted()
        .filter(|e| ids.contains(&e.id))
        .map(|e| e.id)
        .collect();
    if members.len() < 2 {
        return None;
    }
    let group_id = Uuid::new_v4();
    for id in members {
        scene.mutate(id, |e| {
            let index = editing_group
                .and_then(|g| e.group_ids.iter().position(|&x| x == g))
                .map_or(0, |i| i + 1);
            e.group_ids.insert(index, group_id);
        });
    }
    log::debug!("Created group {}", group_id);
    Some(group_id)
}

/// Remove the given groups from every member. Returns the released ids.
pub fn ungroup(scene: &mut Scene, group_ids: &HashSet<GroupId>) -> Vec<ElementId> {
    let members: Vec<ElementId> = scene
        .non_deleted()
        .filter(|e| e.group_ids.iter().any(|g| group_ids.contains(g)))
        .map(|e| e.id)
        .collect();
    for &id in &members {
        scene.mutate(id, |e| e.group_ids.retain(|g| !group_ids.contains(g)));
    }
    members
}

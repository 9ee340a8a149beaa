//! Selection state and the single place its invariants are enforced.

use crate::element::{ElementId, GroupId};
use crate::group::{element_ids_in_group, selectable_group};
use crate::scene::Scene;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Selected elements and groups.
///
/// Not stored on elements. Call [`normalize_selection`] after every change.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Selection {
    element_ids: HashSet<ElementId>,
    group_ids: HashSet<GroupId>,
    /// Group entered for member-level selection.
    editing_group_id: Option<GroupId>,
}

impl Selection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, id: ElementId) -> bool {
        self.element_ids.contains(&id)
    }

    pub fn is_empty(&self) -> bool {
        self.element_ids.is_empty()
    }

    pub fn len(&self) -> usize {
        self.element_ids.len()
    }

    pub fn element_ids(&self) -> &HashSet<ElementId> {
        &self.element_ids
    }

    pub fn group_ids(&self) -> &HashSet<GroupId> {
        &self.group_ids
    }

    pub fn editing_group_id(&self) -> Option<GroupId> {
        self.editing_group_id
    }

    pub fn set_editing_group(&mut self, group: Option<GroupId>) {
        self.editing_group_id = group;
    }

    /// Replace the selection with a single element.
    pub fn select_only(&mut self, id: ElementId) {
        self.element_ids.clear();
        self.group_ids.clear();
        self.element_ids.insert(id);
    }

    /// Replace the selection with `ids`.
    pub fn select_all_of(&mut self, ids: impl IntoIterator<Item = ElementId>) {
        self.element_ids.clear();
        self.group_ids.clear();
        self.element_ids.extend(ids);
    }

    pub fn add(&mut self, id: ElementId) {
        self.element_ids.insert(id);
    }

    pub fn remove(&mut self, id: ElementId) {
        self.element_ids.remove(&id);
    }

    pub fn remove_all(&mut self, ids: &[ElementId]) {
        for id in ids {
            self.element_ids.remove(id);
        }
    }

    /// Clear selected elements and groups. The editing group is kept.
    pub fn clear(&mut self) {
        self.element_ids.clear();
        self.group_ids.clear();
    }
}

/// Enforce the selection invariants against the current scene.
///
/// - only live, unlocked elements stay selected;
/// - bound text is represented by its container;
/// - hitting a group member selects its whole selectable group;
/// - members of a selected frame are dropped, the frame represents them;
/// - the editing group is cleared once it has no live members.
pub fn normalize_selection(scene: &Scene, selection: &mut Selection) {
    if let Some(group) = selection.editing_group_id {
        if element_ids_in_group(scene, group).is_empty() {
            selection.editing_group_id = None;
        }
    }

    let mut ids: HashSet<ElementId> = HashSet::new();
    for &id in &selection.element_ids {
        let Some(element) = scene.get_live(id) else {
            continue;
        };
        if element.locked {
            continue;
        }
        match element.container_id().and_then(|c| scene.get_live(c)) {
            Some(container) if !container.locked => {
                ids.insert(container.id);
            }
            _ => {
                ids.insert(id);
            }
        }
    }

    let editing = selection.editing_group_id;
    let groups: HashSet<GroupId> = ids
        .iter()
        .filter_map(|&id| scene.get_live(id))
        .filter_map(|e| selectable_group(e, editing))
        .collect();
    for &group in &groups {
        ids.extend(
            element_ids_in_group(scene, group)
                .into_iter()
                .filter(|&id| scene.get_live(id).is_some_and(|e| !e.locked && e.container_id().is_none())),
        );
    }

    let frames: HashSet<ElementId> = ids
        .iter()
        .filter(|&&id| scene.get_live(id).is_some_and(|e| e.is_frame()))
        .copied()
        .collect();
    if !frames.is_empty() {
        ids.retain(|&id| {
            scene
                .get_live(id)
                .and_then(|e| e.frame_id)
                .is_none_or(|f| !frames.contains(&f))
        });
    }

    selection.element_ids = ids;
    selection.group_ids = groups;
}

//! Scene graph store: element ownership, identity, z-order and versioning.

use crate::element::{Element, ElementId, ElementKind};
use crate::selection::Selection;
use kurbo::Rect;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use thiserror::Error;

/// Errors raised by scene operations.
#[derive(Debug, Error)]
pub enum SceneError {
    #[error("Element already exists: {0}")]
    DuplicateId(ElementId),
    #[error("Element not found: {0}")]
    NotFound(ElementId),
}

/// Result type for scene operations.
pub type SceneResult<T> = Result<T, SceneError>;

/// How the history collaborator should treat a batch of changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommitDirective {
    /// Render only; not eligible for undo.
    #[default]
    None,
    /// Refresh the history baseline without creating an entry.
    UpdateSnapshot,
    /// Record an undoable entry.
    CaptureIncrement,
}

/// Notification queued once per logical batch of mutations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneChange {
    /// Scene version after the batch.
    pub version: u64,
    /// Elements touched by the batch, in first-touch order.
    pub changed: Vec<ElementId>,
    pub commit: CommitDirective,
}

/// The element collection.
///
/// Elements are keyed by id; `z_order` lists ids back to front. Deleted
/// elements stay as tombstones so external collaborators can merge.
#[derive(Debug, Clone, Default)]
pub struct Scene {
    elements: HashMap<ElementId, Element>,
    z_order: Vec<ElementId>,
    version: u64,
    dirty: Vec<ElementId>,
    dirty_set: HashSet<ElementId>,
    structure_changed: bool,
    changes: Vec<SceneChange>,
}

impl Scene {
    /// Create an empty scene.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a scene from elements in z-order.
    pub fn from_elements(elements: Vec<Element>) -> SceneResult<Self> {
        let mut scene = Self::new();
        for element in elements {
            scene.insert(element)?;
        }
        scene.dirty.clear();
        scene.dirty_set.clear();
        scene.structure_changed = false;
        Ok(scene)
    }

    /// Current scene version. Bumped by every mutation.
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Insert an element on top of the z-order.
    ///
    /// A tombstone with the same id is replaced; a live element is an error.
    pub fn insert(&mut self, element: Element) -> SceneResult<()> {
        let index = self.z_order.len();
        self.insert_at(index, element)
    }

    /// Insert an element at a z-order index (clamped).
    pub fn insert_at(&mut self, index: usize, element: Element) -> SceneResult<()> {
        let id = element.id;
        if let Some(existing) = self.elements.get(&id) {
            if !existing.is_deleted {
                return Err(SceneError::DuplicateId(id));
            }
            self.z_order.retain(|&other| other != id);
        }
        let index = index.min(self.z_order.len());
        self.z_order.insert(index, id);
        self.elements.insert(id, element);
        self.structure_changed = true;
        self.touch(id);
        Ok(())
    }

    /// Replace the whole collection in one step.
    ///
    /// Later duplicates of a live id are dropped.
    pub fn replace_all(&mut self, elements: Vec<Element>) {
        let mut next = HashMap::with_capacity(elements.len());
        let mut order = Vec::with_capacity(elements.len());
        for element in elements {
            let live_duplicate = next
                .get(&element.id)
                .is_some_and(|existing: &Element| !existing.is_deleted);
            if live_duplicate {
                log::warn!("Dropping duplicate element {} during replace", element.id);
                continue;
            }
            if next.contains_key(&element.id) {
                order.retain(|&other| other != element.id);
            }
            order.push(element.id);
            next.insert(element.id, element);
        }
        let touched: Vec<ElementId> = self
            .z_order
            .iter()
            .chain(order.iter())
            .copied()
            .collect();
        self.elements = next;
        self.z_order = order;
        self.structure_changed = true;
        for id in touched {
            self.touch(id);
        }
    }

    /// Get an element by id, including tombstones.
    pub fn get(&self, id: ElementId) -> Option<&Element> {
        self.elements.get(&id)
    }

    /// Get a non-deleted element by id.
    pub fn get_live(&self, id: ElementId) -> Option<&Element> {
        self.elements.get(&id).filter(|e| !e.is_deleted)
    }

    pub fn is_live(&self, id: ElementId) -> bool {
        self.get_live(id).is_some()
    }

    /// All elements back to front, tombstones included.
    pub fn elements(&self) -> impl Iterator<Item = &Element> {
        self.z_order.iter().filter_map(|id| self.elements.get(id))
    }

    /// Non-deleted elements back to front.
    pub fn non_deleted(&self) -> impl Iterator<Item = &Element> {
        self.elements().filter(|e| !e.is_deleted)
    }

    /// Selected non-deleted elements back to front.
    pub fn selected<'a>(&'a self, selection: &'a Selection) -> impl Iterator<Item = &'a Element> {
        self.non_deleted().filter(|e| selection.contains(e.id))
    }

    /// Id-to-element snapshot of the live scene.
    pub fn element_map(&self) -> HashMap<ElementId, Element> {
        self.non_deleted().map(|e| (e.id, e.clone())).collect()
    }

    /// Clone of the whole collection in z-order, tombstones included.
    pub fn snapshot(&self) -> Vec<Element> {
        self.elements().cloned().collect()
    }

    /// Number of non-deleted elements.
    pub fn live_count(&self) -> usize {
        self.non_deleted().count()
    }

    pub fn is_empty(&self) -> bool {
        self.live_count() == 0
    }

    /// Z-order index among all stored elements.
    pub fn z_index(&self, id: ElementId) -> Option<usize> {
        self.z_order.iter().position(|&other| other == id)
    }

    /// Update an element copy-on-write.
    ///
    /// The closure runs on a copy; the stored element, its version and the
    /// scene version change only if the copy differs. Returns `false` when
    /// the id is unknown.
    pub fn mutate(&mut self, id: ElementId, f: impl FnOnce(&mut Element)) -> bool {
        let Some(current) = self.elements.get(&id) else {
            return false;
        };
        let mut next = current.clone();
        f(&mut next);
        next.id = id;
        if next != *current {
            next.bump_version();
            self.elements.insert(id, next);
            self.touch(id);
        }
        true
    }

    /// Replace a stored element wholesale, keeping its z position.
    pub fn update(&mut self, element: Element) -> SceneResult<()> {
        let id = element.id;
        if !self.mutate(id, |e| *e = element) {
            return Err(SceneError::NotFound(id));
        }
        Ok(())
    }

    /// Logically delete an element (tombstone).
    pub fn delete(&mut self, id: ElementId) -> bool {
        self.mutate(id, |e| e.is_deleted = true)
    }

    /// Physically remove an element that was never committed.
    pub fn discard(&mut self, id: ElementId) -> Option<Element> {
        let removed = self.elements.remove(&id)?;
        self.z_order.retain(|&other| other != id);
        self.structure_changed = true;
        self.touch(id);
        Some(removed)
    }

    /// Move elements to the top, keeping their relative order.
    pub fn bring_to_front(&mut self, ids: &HashSet<ElementId>) {
        let (moved, rest): (Vec<_>, Vec<_>) = self.z_order.iter().copied().partition(|id| ids.contains(id));
        self.reorder(rest.into_iter().chain(moved).collect());
    }

    /// Move elements to the bottom, keeping their relative order.
    pub fn send_to_back(&mut self, ids: &HashSet<ElementId>) {
        let (moved, rest): (Vec<_>, Vec<_>) = self.z_order.iter().copied().partition(|id| ids.contains(id));
        self.reorder(moved.into_iter().chain(rest).collect());
    }

    /// Move one element to `index` in the z-order, clamped to the top.
    pub fn move_to_index(&mut self, id: ElementId, index: usize) -> SceneResult<()> {
        let from = self.z_index(id).ok_or(SceneError::NotFound(id))?;
        let mut order = self.z_order.clone();
        order.remove(from);
        order.insert(index.min(order.len()), id);
        self.reorder(order);
        Ok(())
    }

    /// Move each element one layer towards the front.
    pub fn bring_forward(&mut self, ids: &HashSet<ElementId>) {
        let mut order = self.z_order.clone();
        for i in (0..order.len().saturating_sub(1)).rev() {
            if ids.contains(&order[i]) && !ids.contains(&order[i + 1]) {
                order.swap(i, i + 1);
            }
        }
        self.reorder(order);
    }

    /// Move each element one layer towards the back.
    pub fn send_backward(&mut self, ids: &HashSet<ElementId>) {
        let mut order = self.z_order.clone();
        for i in 1..order.len() {
            if ids.contains(&order[i]) && !ids.contains(&order[i - 1]) {
                order.swap(i, i - 1);
            }
        }
        self.reorder(order);
    }

    fn reorder(&mut self, order: Vec<ElementId>) {
        if order != self.z_order {
            let moved: Vec<ElementId> = order
                .iter()
                .zip(self.z_order.iter())
                .filter(|(a, b)| a != b)
                .map(|(a, _)| *a)
                .collect();
            self.z_order = order;
            self.structure_changed = true;
            for id in moved {
                self.touch(id);
            }
        }
    }

    /// Bounding box of all live elements.
    pub fn bounds(&self) -> Option<Rect> {
        self.non_deleted()
            .map(Element::bounds)
            .reduce(|acc, b| acc.union(b))
    }

    fn touch(&mut self, id: ElementId) {
        self.version += 1;
        if self.dirty_set.insert(id) {
            self.dirty.push(id);
        }
    }

    /// Whether mutations happened since the last flush.
    pub fn has_pending_changes(&self) -> bool {
        !self.dirty.is_empty() || self.structure_changed
    }

    /// Close the current logical batch.
    ///
    /// Queues exactly one [`SceneChange`] if anything changed since the last
    /// flush. Returns whether a change was queued.
    pub fn flush(&mut self, commit: CommitDirective) -> bool {
        if !self.has_pending_changes() {
            return false;
        }
        self.dirty_set.clear();
        self.structure_changed = false;
        let change = SceneChange {
            version: self.version,
            changed: std::mem::take(&mut self.dirty),
            commit,
        };
        log::trace!(
            "Scene batch v{} ({} changed, {:?})",
            change.version,
            change.changed.len(),
            change.commit
        );
        self.changes.push(change);
        true
    }

    /// Drain queued change notifications.
    pub fn take_changes(&mut self) -> Vec<SceneChange> {
        std::mem::take(&mut self.changes)
    }

    /// Drop references to elements that are no longer live.
    ///
    /// Covers connector bindings, bound-element back-references, text
    /// containers and frame membership. Returns the number of elements fixed.
    pub fn prune_stale_references(&mut self) -> usize {
        let live: HashSet<ElementId> = self.non_deleted().map(|e| e.id).collect();
        let frames: HashSet<ElementId> = self
            .non_deleted()
            .filter(|e| e.is_frame())
            .map(|e| e.id)
            .collect();
        let ids: Vec<ElementId> = self.non_deleted().map(|e| e.id).collect();
        let mut fixed = 0;
        for id in ids {
            let before = self.version;
            self.mutate(id, |e| {
                e.bound_elements.retain(|b| live.contains(&b.id));
                if e.frame_id.is_some_and(|f| !frames.contains(&f)) {
                    e.frame_id = None;
                }
                if let Some(data) = e.linear_mut() {
                    if data.start_binding.is_some_and(|b| !live.contains(&b.element_id)) {
                        data.start_binding = None;
                    }
                    if data.end_binding.is_some_and(|b| !live.contains(&b.element_id)) {
                        data.end_binding = None;
                    }
                }
                if let ElementKind::Text(text) = &mut e.kind {
                    if text.container_id.is_some_and(|c| !live.contains(&c)) {
                        text.container_id = None;
                    }
                }
            });
            if self.version != before {
                fixed += 1;
            }
        }
        if fixed > 0 {
            log::warn!("Pruned stale references on {} element(s)", fixed);
        }
        fixed
    }
}

use slotmap::{SlotMap, new_key_type};
use thiserror::Error;
use uuid::Uuid;

use crate::core::entity::{Element, spatial_transform::SpatialTransform};

new_key_type! {
    /// Used to reference an `Element` in the outliner.
    pub struct ElementId;
}

/// The host document's element tree.
///
/// Elements live in an arena; the tree shape is kept through parent/children ids.
/// Root-level elements are kept in insertion order.
#[derive(Clone, Default)]
pub struct Outliner {
    elements: SlotMap<ElementId, Element>,
    roots: Vec<ElementId>,
    selected: Vec<ElementId>,
}

impl Outliner {
    /// Create an empty outliner.
    pub fn new() -> Self {
        Self {
            elements: SlotMap::with_key(),
            roots: Vec::new(),
            selected: Vec::new(),
        }
    }

    /// Add the given element under `parent` (or the root) and return its ID.
    pub fn add(
        &mut self,
        mut element: Element,
        parent: Option<ElementId>,
    ) -> Result<ElementId, OutlinerError> {
        if let Some(parent) = parent {
            let parent_element = self
                .elements
                .get(parent)
                .ok_or(OutlinerError::ElementNotFound(parent))?;
            if !parent_element.is_group() {
                return Err(OutlinerError::NotAGroup(parent));
            }
        }
        element.set_parent(parent);
        let id = self.elements.insert(element);
        match parent {
            Some(parent) => self.elements[parent].children_mut().push(id),
            None => self.roots.push(id),
        }
        Ok(id)
    }

    /// Remove the element and everything below it, returning the removed element.
    pub fn remove(&mut self, id: ElementId) -> Option<Element> {
        let parent = self.elements.get(id)?.parent();
        match parent.and_then(|p| self.elements.get_mut(p)) {
            Some(parent) => parent.children_mut().retain(|&c| c != id),
            None => self.roots.retain(|&r| r != id),
        }

        let mut pending = vec![id];
        let mut removed = None;
        while let Some(cur) = pending.pop() {
            if let Some(element) = self.elements.remove(cur) {
                pending.extend_from_slice(element.children());
                self.selected.retain(|&s| s != cur);
                if cur == id {
                    removed = Some(element);
                }
            }
        }
        removed
    }

    /// Get the given element.
    pub fn get(&self, id: ElementId) -> Option<&Element> {
        self.elements.get(id)
    }

    /// Get the given element mutably.
    pub fn get_mut(&mut self, id: ElementId) -> Option<&mut Element> {
        self.elements.get_mut(id)
    }

    pub fn contains(&self, id: ElementId) -> bool {
        self.elements.contains_key(id)
    }

    pub fn find_by_uuid(&self, uuid: Uuid) -> Option<ElementId> {
        self.elements
            .iter()
            .find(|(_, element)| element.uuid() == uuid)
            .map(|(id, _)| id)
    }

    /// The root-level elements in order.
    pub fn roots(&self) -> &[ElementId] {
        &self.roots
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// All element IDs in depth-first outliner order.
    pub fn walk(&self) -> Vec<ElementId> {
        let mut order = Vec::with_capacity(self.elements.len());
        let mut stack: Vec<ElementId> = self.roots.iter().rev().copied().collect();
        while let Some(id) = stack.pop() {
            order.push(id);
            if let Some(element) = self.elements.get(id) {
                stack.extend(element.children().iter().rev().copied());
            }
        }
        order
    }

    /// The nearest group above the element, if any.
    pub fn parent_group(&self, id: ElementId) -> Option<ElementId> {
        self.elements.get(id)?.parent()
    }

    /// Walks up the parents and combines their pivots into one world transform.
    pub fn world_transform(&self, id: ElementId) -> Option<SpatialTransform> {
        let element = self.elements.get(id)?;
        let mut transform = element.local_transform();
        let mut cur = element.parent();
        while let Some(parent_id) = cur {
            let parent = self.elements.get(parent_id)?;
            transform = parent.local_transform().combine(&transform);
            cur = parent.parent();
        }
        Some(transform)
    }

    /// Select the element. Unless `additive`, everything else gets unselected first.
    pub fn select(&mut self, id: ElementId, additive: bool) -> bool {
        if !self.elements.contains_key(id) {
            return false;
        }
        if !additive {
            self.selected.clear();
        }
        if !self.selected.contains(&id) {
            self.selected.push(id);
        }
        true
    }

    /// Unselect the element, returning `true` if it was selected.
    pub fn unselect(&mut self, id: ElementId) -> bool {
        let before = self.selected.len();
        self.selected.retain(|&s| s != id);
        before != self.selected.len()
    }

    pub fn unselect_all(&mut self) -> Vec<ElementId> {
        std::mem::take(&mut self.selected)
    }

    pub fn is_selected(&self, id: ElementId) -> bool {
        self.selected.contains(&id)
    }

    pub fn selected(&self) -> &[ElementId] {
        &self.selected
    }
}

#[derive(Debug, Error)]
pub enum OutlinerError {
    #[error("Couldn't find element of ID {0:?}")]
    ElementNotFound(ElementId),
    #[error("Element {0:?} is not a group and can't hold children")]
    NotAGroup(ElementId),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::entity::{CubeData, ElementKind, GroupData};

    fn group(name: &str, origin: [f32; 3]) -> Element {
        Element::new(
            name,
            ElementKind::Group(GroupData {
                origin,
                rotation: [0.0; 3],
            }),
        )
    }

    fn cube(name: &str) -> Element {
        Element::new(name, ElementKind::Cube(CubeData::default()))
    }

    #[test]
    fn walk_is_depth_first_in_insertion_order() {
        let mut outliner = Outliner::new();
        let g = outliner.add(group("g", [0.0; 3]), None).unwrap();
        let a = outliner.add(cube("a"), Some(g)).unwrap();
        let b = outliner.add(cube("b"), None).unwrap();
        let c = outliner.add(cube("c"), Some(g)).unwrap();
        assert_eq!(outliner.walk(), vec![g, a, c, b]);
    }

    #[test]
    fn cubes_cannot_hold_children() {
        let mut outliner = Outliner::new();
        let a = outliner.add(cube("a"), None).unwrap();
        assert!(matches!(
            outliner.add(cube("b"), Some(a)),
            Err(OutlinerError::NotAGroup(_))
        ));
    }

    #[test]
    fn removing_a_group_removes_its_subtree_and_selection() {
        let mut outliner = Outliner::new();
        let g = outliner.add(group("g", [0.0; 3]), None).unwrap();
        let a = outliner.add(cube("a"), Some(g)).unwrap();
        outliner.select(a, false);
        let removed = outliner.remove(g).unwrap();
        assert_eq!(removed.name, "g");
        assert!(outliner.is_empty());
        assert!(outliner.roots().is_empty());
        assert!(outliner.selected().is_empty());
    }

    #[test]
    fn select_replaces_unless_additive() {
        let mut outliner = Outliner::new();
        let a = outliner.add(cube("a"), None).unwrap();
        let b = outliner.add(cube("b"), None).unwrap();
        outliner.select(a, false);
        outliner.select(b, false);
        assert_eq!(outliner.selected(), &[b]);
        outliner.select(a, true);
        assert_eq!(outliner.selected(), &[b, a]);
        assert!(outliner.unselect(b));
        assert!(!outliner.unselect(b));
    }

    #[test]
    fn world_transform_goes_through_parent_pivots() {
        let mut outliner = Outliner::new();
        let g = outliner
            .add(
                Element::new(
                    "g",
                    ElementKind::Group(GroupData {
                        origin: [1.0, 0.0, 0.0],
                        rotation: [0.0, 180.0, 0.0],
                    }),
                ),
                None,
            )
            .unwrap();
        let a = outliner.add(cube("a"), Some(g)).unwrap();
        let world = outliner.world_transform(a).unwrap();
        let p = world.transform_point([2.0, 0.0, 0.0]);
        for axis in p {
            approx::assert_abs_diff_eq!(axis, 0.0, epsilon = 1e-4);
        }
    }
}

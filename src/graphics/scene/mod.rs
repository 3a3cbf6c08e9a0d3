pub mod node;

use slotmap::SecondaryMap;
use thiserror::Error;

use crate::{
    core::{entity::spatial_transform::SpatialTransform, outliner::ElementId},
    graphics::{mesh::DisplayMesh, scene::node::SceneNode},
};

/// The 3D preview of a project: one scene node per outliner element that has been set up.
#[derive(Clone, Default)]
pub struct Scene {
    nodes: SecondaryMap<ElementId, SceneNode>,
}

impl Scene {
    /// Construct an empty scene.
    pub fn new() -> Self {
        Self {
            nodes: SecondaryMap::new(),
        }
    }

    /// Create the scene node for an element. An existing node keeps its mesh.
    pub fn setup(&mut self, element: ElementId, transform: SpatialTransform) {
        match self.nodes.get_mut(element) {
            Some(node) => node.update_transform(|t| *t = transform),
            None => {
                self.nodes.insert(element, SceneNode::new(transform));
            }
        }
    }

    /// Remove the element's node from the scene.
    pub fn remove(&mut self, element: ElementId) -> Option<SceneNode> {
        self.nodes.remove(element)
    }

    /// Get the element's scene node.
    pub fn node(&self, element: ElementId) -> Option<&SceneNode> {
        self.nodes.get(element)
    }

    /// The mesh currently displayed for the element.
    pub fn mesh(&self, element: ElementId) -> Option<&DisplayMesh> {
        self.nodes.get(element)?.mesh()
    }

    pub fn mesh_mut(&mut self, element: ElementId) -> Option<&mut DisplayMesh> {
        self.nodes.get_mut(element)?.mesh_mut()
    }

    /// Replace the element's displayed mesh, returning the old one after it left the scene.
    pub fn replace_mesh(
        &mut self,
        element: ElementId,
        mesh: DisplayMesh,
    ) -> Result<Option<DisplayMesh>, SceneError> {
        let node = self
            .nodes
            .get_mut(element)
            .ok_or(SceneError::SceneNodeNotFound(element))?;
        Ok(node.replace_mesh(mesh))
    }

    /// Take the element's mesh out of the scene.
    pub fn clear_mesh(&mut self, element: ElementId) -> Option<DisplayMesh> {
        self.nodes.get_mut(element)?.take_mesh()
    }

    /// Update the node's world transform.
    pub fn update_transform(
        &mut self,
        element: ElementId,
        transform: SpatialTransform,
    ) -> Result<(), SceneError> {
        let node = self
            .nodes
            .get_mut(element)
            .ok_or(SceneError::SceneNodeNotFound(element))?;
        node.update_transform(|t| *t = transform);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

#[derive(Debug, Error)]
pub enum SceneError {
    #[error("Couldn't find scene node for element {0:?}")]
    SceneNodeNotFound(ElementId),
}

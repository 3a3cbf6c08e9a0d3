use crate::core::entity::spatial_transform::SpatialTransform;
use crate::graphics::mesh::DisplayMesh;

/// The scene-side counterpart of an outliner element.
///
/// Mostly just holds the element's world transform and whatever mesh currently displays it.
#[derive(Clone, Debug, Default)]
pub struct SceneNode {
    transform: SpatialTransform,
    mesh: Option<DisplayMesh>,
}

impl SceneNode {
    /// Create a new scene node without a mesh.
    pub(super) fn new(transform: SpatialTransform) -> Self {
        Self {
            transform,
            mesh: None,
        }
    }

    /// Get the world transform of this node.
    pub fn transform(&self) -> SpatialTransform {
        self.transform
    }

    /// Update the node's transform.
    pub fn update_transform<F>(&mut self, mut update: F)
    where
        F: FnMut(&mut SpatialTransform),
    {
        update(&mut self.transform);
    }

    /// Get the displayed mesh.
    pub fn mesh(&self) -> Option<&DisplayMesh> {
        self.mesh.as_ref()
    }

    /// Get the displayed mesh mutably.
    pub fn mesh_mut(&mut self) -> Option<&mut DisplayMesh> {
        self.mesh.as_mut()
    }

    /// Swap in a new mesh, handing back the one that was displayed before.
    pub(super) fn replace_mesh(&mut self, mesh: DisplayMesh) -> Option<DisplayMesh> {
        self.mesh.replace(mesh)
    }

    pub(super) fn take_mesh(&mut self) -> Option<DisplayMesh> {
        self.mesh.take()
    }
}

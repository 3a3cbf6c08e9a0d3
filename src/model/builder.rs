use std::path::Path;

use uuid::Uuid;

use crate::core::entity::spatial_transform::SpatialTransform;
use crate::graphics::{
    geometry::{GeometryBuffer, OutlineBuffer},
    mesh::{DisplayMesh, Material, MaterialTexture},
    texture::Texture,
};
use crate::model::document::ModelDocument;

/// Turns a parsed document into one merged display mesh.
///
/// Textures are resolved into a palette private to the build, so the host's texture
/// list never changes while building.
pub struct MeshBuilder<'a> {
    save_path: Option<&'a Path>,
}

impl<'a> MeshBuilder<'a> {
    /// `save_path` is the host project's file, used to resolve relative texture paths.
    pub fn new(save_path: Option<&'a Path>) -> Self {
        Self { save_path }
    }

    /// Build the mesh. Returns `None` if the document has no supported elements.
    pub fn build(&self, name: &str, document: &ModelDocument) -> Option<DisplayMesh> {
        let palette = self.resolve_palette(document);
        let default_texture = palette.iter().find(|t| t.is_resolved()).map(|t| t.uuid);
        let texture_for =
            |index: usize| palette.get(index).filter(|t| t.is_resolved()).map(|t| t.uuid);

        let mut geometries = Vec::new();
        let mut outlines = Vec::new();
        for cube in document.supported_cubes() {
            let data = cube.to_cube_data(texture_for, default_texture);
            let mut geometry = GeometryBuffer::cube(&data);
            geometry.apply_transform(&SpatialTransform::about_pivot(data.origin, data.rotation));
            outlines.push(OutlineBuffer::from_geometry(&geometry));
            geometries.push(geometry);
        }

        let geometry = GeometryBuffer::merge(&geometries)?;
        let outline = OutlineBuffer::merge(&outlines).unwrap_or_default();
        let material = Material {
            textures: palette
                .iter()
                .filter(|t| t.is_resolved())
                .map(MaterialTexture::from)
                .collect(),
        };
        log::debug!(
            "built '{name}': {} cubes, {} vertices",
            geometries.len(),
            geometry.vertex_count()
        );
        Some(DisplayMesh::new(name, geometry, outline, material))
    }

    fn resolve_palette(&self, document: &ModelDocument) -> Vec<Texture> {
        document
            .textures
            .iter()
            .map(|reference| {
                let uuid = reference.uuid.unwrap_or_else(Uuid::new_v4);
                Texture::resolve(reference, uuid, self.save_path, document.meta.backup)
            })
            .collect()
    }
}

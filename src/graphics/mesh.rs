use uuid::Uuid;

use crate::graphics::{
    geometry::{GeometryBuffer, OutlineBuffer},
    texture::{Texture, TextureSource},
};

/// A texture identity baked into a mesh's material.
#[derive(Clone, Debug, PartialEq)]
pub struct MaterialTexture {
    pub uuid: Uuid,
    pub name: String,
    pub source: TextureSource,
}

impl From<&Texture> for MaterialTexture {
    fn from(texture: &Texture) -> Self {
        Self {
            uuid: texture.uuid,
            name: texture.name.clone(),
            source: texture.source.clone(),
        }
    }
}

/// A material; the textures the mesh's face groups refer to.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Material {
    pub textures: Vec<MaterialTexture>,
}

/// A render-ready mesh: merged triangles, their outline and the material.
///
/// Cloning duplicates every buffer, so clones can be highlighted and moved independently.
#[derive(Clone, Debug, PartialEq)]
pub struct DisplayMesh {
    pub name: String,
    pub geometry: GeometryBuffer,
    pub outline: OutlineBuffer,
    pub outline_visible: bool,
    pub material: Material,
    /// Display-only meshes are never written by codecs.
    pub no_export: bool,
    revision: u64,
}

impl DisplayMesh {
    /// Create a mesh from its merged buffers.
    pub fn new(
        name: impl Into<String>,
        geometry: GeometryBuffer,
        outline: OutlineBuffer,
        material: Material,
    ) -> Self {
        Self {
            name: name.into(),
            geometry,
            outline,
            outline_visible: false,
            material,
            no_export: false,
            revision: 0,
        }
    }

    /// Set the highlight attribute of every vertex.
    ///
    /// The revision only moves (ie a re-upload is only needed) when the value changed.
    pub fn set_highlighted(&mut self, highlighted: bool) -> bool {
        let changed = self
            .geometry
            .fill_highlight(if highlighted { 1.0 } else { 0.0 });
        if changed {
            self.revision += 1;
        }
        changed
    }

    pub fn is_highlighted(&self) -> bool {
        self.geometry.highlight().first().is_some_and(|&h| h != 0.0)
    }

    /// How many times the buffers changed since the mesh was built.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Whether the two meshes point at the same buffer memory.
    pub fn shares_storage_with(&self, other: &DisplayMesh) -> bool {
        std::ptr::eq(
            self.geometry.vertices().as_ptr(),
            other.geometry.vertices().as_ptr(),
        ) || std::ptr::eq(
            self.geometry.highlight().as_ptr(),
            other.geometry.highlight().as_ptr(),
        ) || std::ptr::eq(
            self.outline.positions().as_ptr(),
            other.outline.positions().as_ptr(),
        )
    }
}

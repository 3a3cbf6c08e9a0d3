use std::path::{Path, PathBuf};

use image::GenericImageView;
use slotmap::{SlotMap, new_key_type};
use thiserror::Error;
use uuid::Uuid;

use crate::model::document::TextureRef;
use crate::resources::{self, DataUriError};

new_key_type! {
    /// For referencing textures in the registry.
    pub struct TextureId;
}

/// Where a texture's pixels come from once resolved.
#[derive(Clone, Debug, PartialEq)]
pub enum TextureSource {
    Path(PathBuf),
    DataUri(String),
    Unresolved,
}

/// A texture known to the editor.
#[derive(Clone, Debug, PartialEq)]
pub struct Texture {
    pub uuid: Uuid,
    pub name: String,
    pub source: TextureSource,
    pub relative_path: Option<String>,
    pub size: Option<(u32, u32)>,
}

impl Texture {
    /// Resolve a document's texture reference.
    ///
    /// Tries, in order: `relative_path` against the host save path, the absolute `path`
    /// (unless the document is a backup), then an inline `data:` source.
    pub fn resolve(
        reference: &TextureRef,
        uuid: Uuid,
        save_path: Option<&Path>,
        backup: bool,
    ) -> Self {
        let source = resolve_source(reference, save_path, backup);
        let size = match probe_size(&source) {
            Ok(size) => size,
            Err(e) => {
                log::warn!("Couldn't read texture '{}': {e}", reference.display_name());
                None
            }
        };
        Self {
            uuid,
            name: reference.display_name().to_string(),
            source,
            relative_path: reference.relative_path.clone(),
            size,
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.source != TextureSource::Unresolved
    }
}

fn resolve_source(reference: &TextureRef, save_path: Option<&Path>, backup: bool) -> TextureSource {
    if let (Some(relative), Some(save_path)) = (&reference.relative_path, save_path) {
        let resolved = resources::resolve_relative(save_path, relative);
        if resolved.exists() {
            return TextureSource::Path(resolved);
        }
    }
    if let Some(path) = &reference.path {
        let path = PathBuf::from(path);
        if !backup && path.exists() {
            return TextureSource::Path(path);
        }
    }
    match &reference.source {
        Some(source) if resources::is_data_uri(source) => TextureSource::DataUri(source.clone()),
        _ => TextureSource::Unresolved,
    }
}

/// Reads the dimensions of a resolved texture.
pub fn probe_size(source: &TextureSource) -> Result<Option<(u32, u32)>, TextureError> {
    match source {
        TextureSource::Path(path) => Ok(Some(image::image_dimensions(path)?)),
        TextureSource::DataUri(uri) => {
            let bytes = resources::decode_data_uri(uri)?;
            let img = image::load_from_memory(&bytes)?;
            Ok(Some(img.dimensions()))
        }
        TextureSource::Unresolved => Ok(None),
    }
}

/// The host document's texture list.
///
/// Textures are stored in an arena; `order` keeps the list order that face texture indices
/// refer to.
#[derive(Clone, Default)]
pub struct TextureRegistry {
    textures: SlotMap<TextureId, Texture>,
    order: Vec<TextureId>,
}

impl TextureRegistry {
    /// Initialize an empty registry.
    pub fn new() -> Self {
        Self {
            textures: SlotMap::with_key(),
            order: Vec::new(),
        }
    }

    /// Append a texture to the list.
    pub fn add(&mut self, texture: Texture) -> TextureId {
        let id = self.textures.insert(texture);
        self.order.push(id);
        id
    }

    /// Remove a texture from the list.
    pub fn remove(&mut self, id: TextureId) -> Option<Texture> {
        let texture = self.textures.remove(id)?;
        self.order.retain(|&o| o != id);
        Some(texture)
    }

    /// Get a texture.
    pub fn get(&self, id: TextureId) -> Option<&Texture> {
        self.textures.get(id)
    }

    /// Position of the texture in the list, as used by saved face texture indices.
    pub fn index_of(&self, uuid: Uuid) -> Option<usize> {
        self.order
            .iter()
            .position(|&id| self.textures[id].uuid == uuid)
    }

    /// The texture at a list position.
    pub fn at(&self, index: usize) -> Option<&Texture> {
        self.order.get(index).map(|&id| &self.textures[id])
    }

    /// The texture assigned to faces that don't name one.
    pub fn default_texture(&self) -> Option<&Texture> {
        self.at(0)
    }

    /// Iterate the textures in list order.
    pub fn iter(&self) -> impl Iterator<Item = &Texture> {
        self.order.iter().map(|&id| &self.textures[id])
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

#[derive(Debug, Error)]
pub enum TextureError {
    #[error("Couldn't decode image: {0}")]
    Image(#[from] image::ImageError),
    #[error("Couldn't decode data URI: {0}")]
    DataUri(#[from] DataUriError),
}

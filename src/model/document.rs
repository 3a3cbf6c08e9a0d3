//! The parsed form of an external project file.
//!
//! Only `textures`, `elements` and `meta` are interpreted; every other key is
//! kept untouched in `extra`. Elements are classified while parsing, so a
//! document with unsupported elements still parses.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use uuid::Uuid;

use crate::constants::{CUBE_ELEMENT_TYPE, INSTANCE_ELEMENT_TYPE};
use crate::core::entity::{CubeData, CubeFace, Face};

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentMeta {
    #[serde(default)]
    pub backup: bool,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A texture entry of a document.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TextureRef {
    #[serde(default)]
    pub uuid: Option<Uuid>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub relative_path: Option<String>,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl TextureRef {
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("texture")
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FaceSpec {
    #[serde(default)]
    pub uv: Option<[f32; 4]>,
    /// Index into the document's texture list. Anything else (null, false) means no texture.
    #[serde(default)]
    pub texture: Value,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl FaceSpec {
    pub fn texture_index(&self) -> Option<usize> {
        self.texture.as_u64().map(|i| i as usize)
    }
}

fn default_cube_name() -> String {
    "cube".to_string()
}

fn default_cube_to() -> [f32; 3] {
    [1.0; 3]
}

/// A cube element as written in a document.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CubeSpec {
    #[serde(default = "default_cube_name")]
    pub name: String,
    #[serde(default)]
    pub uuid: Option<Uuid>,
    #[serde(default)]
    pub from: [f32; 3],
    #[serde(default = "default_cube_to")]
    pub to: [f32; 3],
    #[serde(default, alias = "position")]
    pub origin: [f32; 3],
    #[serde(default)]
    pub rotation: [f32; 3],
    #[serde(default)]
    pub faces: Option<BTreeMap<String, FaceSpec>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl CubeSpec {
    /// Turn the parsed cube into outliner cube data.
    ///
    /// `texture_for` maps a document texture index to the uuid it resolved to. Faces the
    /// document doesn't describe keep their defaults; when the element has no `faces` at
    /// all, every face gets `fallback`.
    pub fn to_cube_data(
        &self,
        texture_for: impl Fn(usize) -> Option<Uuid>,
        fallback: Option<Uuid>,
    ) -> CubeData {
        let mut data = CubeData {
            from: self.from,
            to: self.to,
            origin: self.origin,
            rotation: self.rotation,
            ..CubeData::default()
        };
        match &self.faces {
            Some(faces) => {
                for (name, spec) in faces {
                    let Some(face) = Face::from_name(name) else {
                        log::debug!("ignoring unknown face '{name}' on '{}'", self.name);
                        continue;
                    };
                    data.faces.insert(
                        face,
                        CubeFace {
                            uv: spec.uv.unwrap_or(CubeFace::default().uv),
                            texture: spec.texture_index().and_then(&texture_for),
                        },
                    );
                }
            }
            None => {
                for face in data.faces.values_mut() {
                    face.texture = fallback;
                }
            }
        }
        data
    }
}

/// An entry of a document's `elements` list, classified by its `type`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(from = "Value", into = "Value")]
pub enum ElementSpec {
    Cube(CubeSpec),
    /// An instance element. Referenced documents may not contain these.
    RecursiveInstance(Value),
    Unsupported { kind: Option<String>, raw: Value },
}

impl From<Value> for ElementSpec {
    fn from(raw: Value) -> Self {
        let kind = raw.get("type").and_then(Value::as_str).map(str::to_string);
        match kind.as_deref() {
            Some(INSTANCE_ELEMENT_TYPE) => ElementSpec::RecursiveInstance(raw),
            Some(CUBE_ELEMENT_TYPE) => match serde_json::from_value::<CubeSpec>(raw.clone()) {
                Ok(cube) => ElementSpec::Cube(cube),
                Err(e) => {
                    log::debug!("malformed cube element: {e}");
                    ElementSpec::Unsupported { kind, raw }
                }
            },
            _ => ElementSpec::Unsupported { kind, raw },
        }
    }
}

impl From<ElementSpec> for Value {
    fn from(spec: ElementSpec) -> Self {
        match spec {
            ElementSpec::Cube(cube) => match serde_json::to_value(cube) {
                Ok(Value::Object(mut map)) => {
                    map.insert("type".to_string(), Value::from(CUBE_ELEMENT_TYPE));
                    Value::Object(map)
                }
                Ok(other) => other,
                Err(_) => Value::Null,
            },
            ElementSpec::RecursiveInstance(raw) => raw,
            ElementSpec::Unsupported { raw, .. } => raw,
        }
    }
}

/// A parsed external project file.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelDocument {
    #[serde(default)]
    pub meta: DocumentMeta,
    #[serde(default)]
    pub textures: Vec<TextureRef>,
    #[serde(default)]
    pub elements: Vec<ElementSpec>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ModelDocument {
    /// Parse a document from JSON text.
    pub fn from_json(text: &str) -> Result<Self, DocumentError> {
        Ok(serde_json::from_str(text)?)
    }

    /// The cubes that can be instanced, in document order.
    ///
    /// Every other element is skipped with a warning.
    pub fn supported_cubes(&self) -> Vec<&CubeSpec> {
        let mut cubes = Vec::with_capacity(self.elements.len());
        for element in &self.elements {
            match element {
                ElementSpec::Cube(cube) => cubes.push(cube),
                ElementSpec::RecursiveInstance(_) => {
                    log::warn!("Cannot have recursive project instances!")
                }
                ElementSpec::Unsupported { kind, .. } => log::warn!(
                    "Unsupported element type '{}'!",
                    kind.as_deref().unwrap_or("<untyped>")
                ),
            }
        }
        cubes
    }

    /// Number of elements that would be skipped by `supported_cubes`.
    pub fn skipped_count(&self) -> usize {
        self.elements
            .iter()
            .filter(|e| !matches!(e, ElementSpec::Cube(_)))
            .count()
    }
}

#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("Couldn't parse document: {0}")]
    Json(#[from] serde_json::Error),
}

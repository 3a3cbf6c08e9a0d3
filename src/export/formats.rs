//! The built-in formats: the raw project file and the plain model export.

use std::path::Path;

use rustc_hash::{FxHashMap, FxHashSet};
use serde_json::{Map, Value, json};
use thiserror::Error;
use uuid::Uuid;

use crate::constants::{
    CUBE_ELEMENT_TYPE, INSTANCE_ELEMENT_TYPE, MODEL_FORMAT, PROJECT_FORMAT, PROJECT_FORMAT_VERSION,
};
use crate::core::{
    entity::{CubeData, Element, ElementKind, GroupData, InstanceData},
    outliner::{ElementId, Outliner, OutlinerError},
    schema::{self, vector_to_value, value_to_vector},
};
use crate::editor::Project;
use crate::export::codec::{Codec, CodecError, CompileContext};
use crate::graphics::texture::{Texture, TextureRegistry, TextureSource};
use crate::instance::{InstanceId, InstanceProperties};
use crate::model::document::{DocumentError, ElementSpec, ModelDocument};
use crate::resources;

/// The project file itself, instances included.
pub struct ProjectCodec;

impl Codec for ProjectCodec {
    fn id(&self) -> &'static str {
        PROJECT_FORMAT
    }

    fn compile(&self, ctx: &CompileContext) -> Result<String, CodecError> {
        let value = write_project(ctx, true);
        Ok(serde_json::to_string_pretty(&value)?)
    }
}

/// Exportable content only: cubes, groups and textures.
///
/// The output is itself a valid project, so it can be instanced again.
pub struct ModelCodec;

impl Codec for ModelCodec {
    fn id(&self) -> &'static str {
        MODEL_FORMAT
    }

    fn compile(&self, ctx: &CompileContext) -> Result<String, CodecError> {
        let value = write_project(ctx, false);
        Ok(serde_json::to_string_pretty(&value)?)
    }
}

fn write_project(ctx: &CompileContext, include_instances: bool) -> Value {
    let project = &*ctx.project;
    let outliner = &project.outliner;

    let elements: Vec<Value> = outliner
        .walk()
        .into_iter()
        .filter_map(|id| {
            let element = outliner.get(id)?;
            if !include_instances && !element.exportable() {
                return None;
            }
            match &element.kind {
                ElementKind::Cube(cube) => Some(cube_to_value(element, cube, &project.textures)),
                ElementKind::Instance(data) => instance_to_value(element, data, ctx),
                ElementKind::Group(_) => None,
            }
        })
        .collect();

    let tree: Vec<Value> = outliner
        .roots()
        .iter()
        .filter_map(|&id| outliner_entry(outliner, id, include_instances))
        .collect();

    json!({
        "meta": {
            "format_version": PROJECT_FORMAT_VERSION,
            "model_format": "free",
            "box_uv": false,
        },
        "name": project.name,
        "textures": project.textures.iter().map(texture_to_value).collect::<Vec<_>>(),
        "elements": elements,
        "outliner": tree,
    })
}

fn texture_to_value(texture: &Texture) -> Value {
    let mut map = Map::new();
    map.insert("uuid".into(), Value::from(texture.uuid.to_string()));
    map.insert("name".into(), Value::from(texture.name.clone()));
    if let Some(relative) = &texture.relative_path {
        map.insert("relative_path".into(), Value::from(relative.clone()));
    }
    match &texture.source {
        TextureSource::Path(path) => {
            map.insert("path".into(), Value::from(path.to_string_lossy().into_owned()));
        }
        TextureSource::DataUri(uri) => {
            map.insert("source".into(), Value::from(uri.clone()));
        }
        TextureSource::Unresolved => {}
    }
    Value::Object(map)
}

fn cube_to_value(element: &Element, cube: &CubeData, textures: &TextureRegistry) -> Value {
    let faces: Map<String, Value> = cube
        .faces
        .iter()
        .map(|(face, data)| {
            let texture = data
                .texture
                .and_then(|uuid| textures.index_of(uuid))
                .map_or(Value::Null, Value::from);
            (
                face.name().to_string(),
                json!({ "uv": data.uv, "texture": texture }),
            )
        })
        .collect();
    json!({
        "name": element.name,
        "type": CUBE_ELEMENT_TYPE,
        "uuid": element.uuid().to_string(),
        "visibility": element.visibility,
        "from": vector_to_value(cube.from),
        "to": vector_to_value(cube.to),
        "origin": vector_to_value(cube.origin),
        "rotation": vector_to_value(cube.rotation),
        "faces": faces,
    })
}

fn instance_to_value(
    element: &Element,
    data: &InstanceData,
    ctx: &CompileContext,
) -> Option<Value> {
    let node = ctx.instances.get(data.instance)?;
    let properties = InstanceProperties::capture(element, &node.reference)?;
    let mut map = schema::save_copy(&properties);
    map.insert("type".into(), Value::from(INSTANCE_ELEMENT_TYPE));
    map.insert("uuid".into(), Value::from(element.uuid().to_string()));
    Some(Value::Object(map))
}

fn outliner_entry(outliner: &Outliner, id: ElementId, include_instances: bool) -> Option<Value> {
    let element = outliner.get(id)?;
    if !include_instances && !element.exportable() {
        return None;
    }
    match &element.kind {
        ElementKind::Group(group) => {
            let children: Vec<Value> = element
                .children()
                .iter()
                .filter_map(|&child| outliner_entry(outliner, child, include_instances))
                .collect();
            Some(json!({
                "name": element.name,
                "uuid": element.uuid().to_string(),
                "origin": vector_to_value(group.origin),
                "rotation": vector_to_value(group.rotation),
                "visibility": element.visibility,
                "children": children,
            }))
        }
        _ => Some(Value::from(element.uuid().to_string())),
    }
}

/// A project read back from its file. Instance elements still need their arena entries.
pub struct LoadedProject {
    pub project: Project,
    pub instances: Vec<(ElementId, InstanceProperties)>,
}

/// Read a project from its file.
pub fn load_project(path: &Path) -> Result<LoadedProject, ProjectError> {
    let text = resources::load_string(path).map_err(|source| ProjectError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let name = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let mut loaded = parse_project(&text, &name, Some(path))?;
    loaded.project.save_path = Some(path.to_path_buf());
    Ok(loaded)
}

/// Parse a project from JSON text. `fallback_name` is used when the file has no name.
pub fn parse_project(
    text: &str,
    fallback_name: &str,
    save_path: Option<&Path>,
) -> Result<LoadedProject, ProjectError> {
    let document = ModelDocument::from_json(text)?;
    let name = document
        .extra
        .get("name")
        .and_then(Value::as_str)
        .unwrap_or(fallback_name);
    let mut project = Project::new(name);

    for reference in &document.textures {
        let uuid = reference.uuid.unwrap_or_else(Uuid::new_v4);
        project.textures.add(Texture::resolve(
            reference,
            uuid,
            save_path,
            document.meta.backup,
        ));
    }

    let mut by_uuid: FxHashMap<Uuid, &ElementSpec> = FxHashMap::default();
    for spec in &document.elements {
        if let Some(uuid) = spec_uuid(spec) {
            by_uuid.insert(uuid, spec);
        }
    }

    let mut loader = Loader {
        project,
        instances: Vec::new(),
        placed: FxHashSet::default(),
        by_uuid: &by_uuid,
    };
    if let Some(Value::Array(tree)) = document.extra.get("outliner") {
        for entry in tree {
            loader.place(entry, None)?;
        }
    }
    for spec in &document.elements {
        let placed = spec_uuid(spec).is_some_and(|uuid| loader.placed.contains(&uuid));
        if !placed {
            loader.add_element(spec, None)?;
        }
    }

    Ok(LoadedProject {
        project: loader.project,
        instances: loader.instances,
    })
}

fn spec_uuid(spec: &ElementSpec) -> Option<Uuid> {
    match spec {
        ElementSpec::Cube(cube) => cube.uuid,
        ElementSpec::RecursiveInstance(raw) | ElementSpec::Unsupported { raw, .. } => raw
            .get("uuid")
            .and_then(Value::as_str)
            .and_then(|s| Uuid::parse_str(s).ok()),
    }
}

struct Loader<'a> {
    project: Project,
    instances: Vec<(ElementId, InstanceProperties)>,
    placed: FxHashSet<Uuid>,
    by_uuid: &'a FxHashMap<Uuid, &'a ElementSpec>,
}

impl Loader<'_> {
    fn place(&mut self, entry: &Value, parent: Option<ElementId>) -> Result<(), ProjectError> {
        match entry {
            Value::String(uuid) => {
                let Some(spec) = Uuid::parse_str(uuid)
                    .ok()
                    .and_then(|uuid| self.by_uuid.get(&uuid).copied())
                else {
                    log::warn!("outliner refers to unknown element {uuid}");
                    return Ok(());
                };
                self.add_element(spec, parent)
            }
            Value::Object(group) => {
                let uuid = group
                    .get("uuid")
                    .and_then(Value::as_str)
                    .and_then(|s| Uuid::parse_str(s).ok())
                    .unwrap_or_else(Uuid::new_v4);
                let name = group.get("name").and_then(Value::as_str).unwrap_or("group");
                let data = GroupData {
                    origin: group.get("origin").and_then(value_to_vector).unwrap_or_default(),
                    rotation: group.get("rotation").and_then(value_to_vector).unwrap_or_default(),
                };
                let mut element = Element::with_uuid(uuid, name, ElementKind::Group(data));
                element.visibility = visibility(group);
                let id = self.project.outliner.add(element, parent)?;
                if let Some(Value::Array(children)) = group.get("children") {
                    for child in children {
                        self.place(child, Some(id))?;
                    }
                }
                Ok(())
            }
            other => {
                log::warn!("ignoring outliner entry {other}");
                Ok(())
            }
        }
    }

    fn add_element(&mut self, spec: &ElementSpec, parent: Option<ElementId>) -> Result<(), ProjectError> {
        let uuid = spec_uuid(spec).unwrap_or_else(Uuid::new_v4);
        if !self.placed.insert(uuid) {
            return Ok(());
        }
        match spec {
            ElementSpec::Cube(cube) => {
                let textures = &self.project.textures;
                let data = cube.to_cube_data(
                    |index| textures.at(index).map(|t| t.uuid),
                    textures.default_texture().map(|t| t.uuid),
                );
                let mut element = Element::with_uuid(uuid, cube.name.clone(), ElementKind::Cube(data));
                if let Some(Value::Bool(visible)) = cube.extra.get("visibility") {
                    element.visibility = *visible;
                }
                self.project.outliner.add(element, parent)?;
            }
            ElementSpec::RecursiveInstance(raw) => {
                let mut properties = InstanceProperties::default();
                if let Value::Object(map) = raw {
                    schema::merge(&mut properties, map);
                }
                let mut element = Element::with_uuid(
                    uuid,
                    properties.name.clone(),
                    ElementKind::Instance(InstanceData {
                        instance: InstanceId::default(),
                        position: properties.position,
                        rotation: properties.rotation,
                    }),
                );
                element.visibility = properties.visibility;
                let id = self.project.outliner.add(element, parent)?;
                self.instances.push((id, properties));
            }
            ElementSpec::Unsupported { kind, .. } => {
                log::warn!(
                    "Unsupported element type '{}'!",
                    kind.as_deref().unwrap_or("<untyped>")
                );
            }
        }
        Ok(())
    }
}

fn visibility(map: &Map<String, Value>) -> bool {
    map.get("visibility").and_then(Value::as_bool).unwrap_or(true)
}

#[derive(Debug, Error)]
pub enum ProjectError {
    #[error("Couldn't read project {path:?}: {source}")]
    Io {
        path: std::path::PathBuf,
        source: std::io::Error,
    },
    #[error("Couldn't parse project: {0}")]
    Document(#[from] DocumentError),
    #[error("Broken outliner tree: {0}")]
    Outliner(#[from] OutlinerError),
}

#[cfg(test)]
mod tests {
    use slotmap::SlotMap;

    use super::*;

    const HOST: &str = r#"{
        "name": "host",
        "textures": [],
        "elements": [
            {"type": "cube", "uuid": "6b1e5a53-0b83-4b3e-a2a4-6a56a4b1f001", "name": "body", "from": [0,0,0], "to": [2,2,2]},
            {"type": "project_instancing:instance", "uuid": "6b1e5a53-0b83-4b3e-a2a4-6a56a4b1f002",
             "name": "tree", "position": [4,0,0], "project_path": "tree.bbmodel"}
        ],
        "outliner": [
            {"name": "root", "uuid": "6b1e5a53-0b83-4b3e-a2a4-6a56a4b1f003", "origin": [1,0,0],
             "children": ["6b1e5a53-0b83-4b3e-a2a4-6a56a4b1f001"]}
        ],
        "meta": {}
    }"#;

    #[test]
    fn parse_rebuilds_the_tree() {
        let loaded = parse_project(HOST, "fallback", None).unwrap();
        let outliner = &loaded.project.outliner;
        assert_eq!(loaded.project.name, "host");
        assert_eq!(outliner.len(), 3);
        assert_eq!(outliner.roots().len(), 2);
        let group = outliner.get(outliner.roots()[0]).unwrap();
        assert!(group.is_group());
        assert_eq!(group.children().len(), 1);

        assert_eq!(loaded.instances.len(), 1);
        let (id, props) = &loaded.instances[0];
        assert_eq!(props.position, [4.0, 0.0, 0.0]);
        assert_eq!(props.project_path, Path::new("tree.bbmodel"));
        assert!(outliner.get(*id).unwrap().instance().is_some());
    }

    #[test]
    fn model_codec_leaves_instances_out() {
        let mut loaded = parse_project(HOST, "fallback", None).unwrap();
        let instances = SlotMap::with_key();
        let ctx = CompileContext {
            project: &mut loaded.project,
            instances: &instances,
            live: &[],
        };
        let text = ModelCodec.compile(&ctx).unwrap();
        let doc = ModelDocument::from_json(&text).unwrap();
        assert_eq!(doc.elements.len(), 1);
        assert_eq!(doc.skipped_count(), 0);
        assert!(!text.contains(INSTANCE_ELEMENT_TYPE));
    }

    #[test]
    fn written_project_parses_back() {
        let mut loaded = parse_project(HOST, "fallback", None).unwrap();
        let instances = SlotMap::with_key();
        let ctx = CompileContext {
            project: &mut loaded.project,
            instances: &instances,
            live: &[],
        };
        let text = ProjectCodec.compile(&ctx).unwrap();
        let again = parse_project(&text, "fallback", None).unwrap();
        assert_eq!(again.project.outliner.len(), 2);
        assert!(
            again
                .project
                .outliner
                .find_by_uuid(Uuid::parse_str("6b1e5a53-0b83-4b3e-a2a4-6a56a4b1f001").unwrap())
                .is_some()
        );
    }
}

//! Instance nodes: outliner elements that display another project file.

pub mod reference;
pub mod schedule;
pub mod watch;

use std::path::PathBuf;

use serde_json::Value;
use slotmap::new_key_type;

use crate::constants::DEFAULT_INSTANCE_NAME;
use crate::core::{
    entity::Element,
    outliner::ElementId,
    schema::{
        PropertyDefault, PropertyDescriptor, PropertyKind, Schematic, apply_defaults,
        value_to_vector, vector_to_value,
    },
};
use crate::editor::ProjectId;
use crate::instance::reference::InstanceReference;

new_key_type! {
    /// For referencing instances in the editor.
    pub struct InstanceId;
}

/// An instance node: where it sits in which project, and what it references.
pub struct InstanceNode {
    pub element: ElementId,
    pub project: ProjectId,
    pub reference: InstanceReference,
}

impl InstanceNode {
    pub fn new(element: ElementId, project: ProjectId) -> Self {
        Self {
            element,
            project,
            reference: InstanceReference::new(),
        }
    }
}

const INSTANCE_SCHEMA: [PropertyDescriptor; 5] = [
    PropertyDescriptor {
        name: "name",
        kind: PropertyKind::String,
        default: PropertyDefault::String(DEFAULT_INSTANCE_NAME),
    },
    PropertyDescriptor {
        name: "position",
        kind: PropertyKind::Vector,
        default: PropertyDefault::Vector([0.0; 3]),
    },
    PropertyDescriptor {
        name: "rotation",
        kind: PropertyKind::Vector,
        default: PropertyDefault::Vector([0.0; 3]),
    },
    PropertyDescriptor {
        name: "visibility",
        kind: PropertyKind::Boolean,
        default: PropertyDefault::Boolean(true),
    },
    PropertyDescriptor {
        name: "project_path",
        kind: PropertyKind::String,
        default: PropertyDefault::String(""),
    },
];

/// The persisted fields of an instance, as saved into projects and undo copies.
///
/// Whether the instance needs an update is not part of it.
#[derive(Clone, Debug, PartialEq)]
pub struct InstanceProperties {
    pub name: String,
    pub position: [f32; 3],
    pub rotation: [f32; 3],
    pub visibility: bool,
    pub project_path: PathBuf,
}

/// The schema defaults.
impl Default for InstanceProperties {
    fn default() -> Self {
        let mut properties = Self {
            name: String::new(),
            position: [0.0; 3],
            rotation: [0.0; 3],
            visibility: false,
            project_path: PathBuf::new(),
        };
        apply_defaults(&mut properties);
        properties
    }
}

impl InstanceProperties {
    /// Read the properties off an instance's element and reference.
    ///
    /// Returns `None` if the element isn't an instance.
    pub fn capture(element: &Element, reference: &InstanceReference) -> Option<Self> {
        let data = element.instance()?;
        Some(Self {
            name: element.name.clone(),
            position: data.position,
            rotation: data.rotation,
            visibility: element.visibility,
            project_path: reference.path().to_path_buf(),
        })
    }

    /// Write everything but the path back onto the element. The path goes through
    /// [`InstanceReference::set_path`] so its watch follows.
    pub fn apply_to_element(&self, element: &mut Element) {
        element.name = self.name.clone();
        element.visibility = self.visibility;
        if let Some(data) = element.instance_mut() {
            data.position = self.position;
            data.rotation = self.rotation;
        }
    }
}

impl Schematic for InstanceProperties {
    fn schema() -> &'static [PropertyDescriptor] {
        &INSTANCE_SCHEMA
    }

    fn read_property(&self, name: &str) -> Option<Value> {
        match name {
            "name" => Some(Value::from(self.name.clone())),
            "position" => Some(vector_to_value(self.position)),
            "rotation" => Some(vector_to_value(self.rotation)),
            "visibility" => Some(Value::from(self.visibility)),
            "project_path" => Some(Value::from(self.project_path.to_string_lossy().into_owned())),
            _ => None,
        }
    }

    fn write_property(&mut self, name: &str, value: Value) {
        match name {
            "name" => {
                if let Some(s) = value.as_str() {
                    self.name = s.to_string();
                }
            }
            "position" => {
                if let Some(v) = value_to_vector(&value) {
                    self.position = v;
                }
            }
            "rotation" => {
                if let Some(v) = value_to_vector(&value) {
                    self.rotation = v;
                }
            }
            "visibility" => {
                if let Some(b) = value.as_bool() {
                    self.visibility = b;
                }
            }
            "project_path" => {
                if let Some(s) = value.as_str() {
                    self.project_path = PathBuf::from(s);
                }
            }
            _ => {}
        }
    }
}

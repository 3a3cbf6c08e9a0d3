//! Static property schemas.
//!
//! Every persisted entity type declares an ordered list of field descriptors.
//! Save, load and undo copies walk that list instead of reflecting over the type.

use serde_json::{Map, Value};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PropertyKind {
    String,
    Vector,
    Boolean,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum PropertyDefault {
    String(&'static str),
    Vector([f32; 3]),
    Boolean(bool),
}

impl PropertyDefault {
    pub fn to_value(&self) -> Value {
        match self {
            PropertyDefault::String(s) => Value::from(*s),
            PropertyDefault::Vector(v) => vector_to_value(*v),
            PropertyDefault::Boolean(b) => Value::from(*b),
        }
    }
}

/// Describes one persisted field of an entity.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PropertyDescriptor {
    pub name: &'static str,
    pub kind: PropertyKind,
    pub default: PropertyDefault,
}

impl PropertyDescriptor {
    /// Returns the value if it has the right shape for this property.
    pub fn accept(&self, value: &Value) -> Option<Value> {
        match self.kind {
            PropertyKind::String => value.as_str().map(Value::from),
            PropertyKind::Boolean => value.as_bool().map(Value::from),
            PropertyKind::Vector => value_to_vector(value).map(vector_to_value),
        }
    }
}

/// An entity whose persisted fields are described by a static schema.
pub trait Schematic {
    fn schema() -> &'static [PropertyDescriptor];

    /// Read the current value of a schema property.
    fn read_property(&self, name: &str) -> Option<Value>;

    /// Write an already validated value into a schema property.
    fn write_property(&mut self, name: &str, value: Value);
}

/// Copy every schema property of `target` into a JSON object, in schema order.
pub fn save_copy<T: Schematic>(target: &T) -> Map<String, Value> {
    let mut copy = Map::new();
    for property in T::schema() {
        let value = target
            .read_property(property.name)
            .unwrap_or_else(|| property.default.to_value());
        copy.insert(property.name.to_string(), value);
    }
    copy
}

/// Merge the schema properties present in `data` into `target`.
///
/// Missing keys are left alone. Values of the wrong shape are ignored with a warning.
pub fn merge<T: Schematic>(target: &mut T, data: &Map<String, Value>) {
    for property in T::schema() {
        let Some(raw) = data.get(property.name) else {
            continue;
        };
        match property.accept(raw) {
            Some(value) => target.write_property(property.name, value),
            None => log::warn!(
                "ignoring property '{}': expected {:?}, got {}",
                property.name,
                property.kind,
                raw
            ),
        }
    }
}

/// Reset every schema property of `target` to its default.
pub fn apply_defaults<T: Schematic>(target: &mut T) {
    for property in T::schema() {
        target.write_property(property.name, property.default.to_value());
    }
}

pub fn vector_to_value(v: [f32; 3]) -> Value {
    Value::Array(v.iter().map(|&c| Value::from(c as f64)).collect())
}

pub fn value_to_vector(value: &Value) -> Option<[f32; 3]> {
    let array = value.as_array()?;
    if array.len() != 3 {
        return None;
    }
    let mut out = [0.0; 3];
    for (slot, component) in out.iter_mut().zip(array) {
        *slot = component.as_f64()? as f32;
    }
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Default)]
    struct Sample {
        label: String,
        offset: [f32; 3],
        shown: bool,
    }

    const SAMPLE_SCHEMA: [PropertyDescriptor; 3] = [
        PropertyDescriptor {
            name: "label",
            kind: PropertyKind::String,
            default: PropertyDefault::String("sample"),
        },
        PropertyDescriptor {
            name: "offset",
            kind: PropertyKind::Vector,
            default: PropertyDefault::Vector([0.0; 3]),
        },
        PropertyDescriptor {
            name: "shown",
            kind: PropertyKind::Boolean,
            default: PropertyDefault::Boolean(true),
        },
    ];

    impl Schematic for Sample {
        fn schema() -> &'static [PropertyDescriptor] {
            &SAMPLE_SCHEMA
        }

        fn read_property(&self, name: &str) -> Option<Value> {
            match name {
                "label" => Some(Value::from(self.label.clone())),
                "offset" => Some(vector_to_value(self.offset)),
                "shown" => Some(Value::from(self.shown)),
                _ => None,
            }
        }

        fn write_property(&mut self, name: &str, value: Value) {
            match name {
                "label" => self.label = value.as_str().unwrap_or_default().to_string(),
                "offset" => self.offset = value_to_vector(&value).unwrap_or_default(),
                "shown" => self.shown = value.as_bool().unwrap_or_default(),
                _ => {}
            }
        }
    }

    #[test]
    fn defaults_then_merge_then_copy() {
        let mut sample = Sample::default();
        apply_defaults(&mut sample);
        assert_eq!(sample.label, "sample");
        assert!(sample.shown);

        merge(
            &mut sample,
            json!({ "offset": [1, 2, 3], "shown": "yes", "extra": 1 })
                .as_object()
                .unwrap(),
        );
        assert_eq!(sample.offset, [1.0, 2.0, 3.0]);
        // wrong shape is ignored
        assert!(sample.shown);

        let copy = save_copy(&sample);
        let keys: Vec<_> = copy.keys().cloned().collect();
        assert_eq!(keys, vec!["label", "offset", "shown"]);
        assert_eq!(copy["offset"], json!([1.0, 2.0, 3.0]));
    }
}

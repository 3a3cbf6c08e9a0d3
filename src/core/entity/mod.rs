use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::entity::spatial_transform::SpatialTransform;
use crate::core::outliner::ElementId;
use crate::instance::InstanceId;

pub mod spatial_transform;

/// One of the six faces of a cube.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Face {
    North,
    East,
    South,
    West,
    Up,
    Down,
}

impl Face {
    pub const ALL: [Face; 6] = [
        Face::North,
        Face::East,
        Face::South,
        Face::West,
        Face::Up,
        Face::Down,
    ];

    /// Parse a face from its saved name.
    pub fn from_name(name: &str) -> Option<Face> {
        match name {
            "north" => Some(Face::North),
            "east" => Some(Face::East),
            "south" => Some(Face::South),
            "west" => Some(Face::West),
            "up" => Some(Face::Up),
            "down" => Some(Face::Down),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Face::North => "north",
            Face::East => "east",
            Face::South => "south",
            Face::West => "west",
            Face::Up => "up",
            Face::Down => "down",
        }
    }
}

/// A cube face: its UV rectangle and the texture bound to it, if any.
#[derive(Clone, Debug, PartialEq)]
pub struct CubeFace {
    pub uv: [f32; 4],
    pub texture: Option<Uuid>,
}

impl Default for CubeFace {
    fn default() -> Self {
        Self {
            uv: [0.0, 0.0, 16.0, 16.0],
            texture: None,
        }
    }
}

/// A box primitive spanning `from`..`to`, rotated around `origin`.
#[derive(Clone, Debug, PartialEq)]
pub struct CubeData {
    pub from: [f32; 3],
    pub to: [f32; 3],
    pub origin: [f32; 3],
    pub rotation: [f32; 3],
    pub faces: BTreeMap<Face, CubeFace>,
}

impl Default for CubeData {
    fn default() -> Self {
        Self {
            from: [0.0; 3],
            to: [1.0; 3],
            origin: [0.0; 3],
            rotation: [0.0; 3],
            faces: Face::ALL.iter().map(|&f| (f, CubeFace::default())).collect(),
        }
    }
}

impl CubeData {
    /// Move the whole cube (bounds and pivot) by `offset`.
    pub fn translate(&mut self, offset: [f32; 3]) {
        for axis in 0..3 {
            self.from[axis] += offset[axis];
            self.to[axis] += offset[axis];
            self.origin[axis] += offset[axis];
        }
    }
}

/// A grouping node with its own pivot.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct GroupData {
    pub origin: [f32; 3],
    pub rotation: [f32; 3],
}

/// The outliner side of an instance node. The reference state lives in the instance arena.
#[derive(Clone, Debug, PartialEq)]
pub struct InstanceData {
    pub instance: InstanceId,
    pub position: [f32; 3],
    pub rotation: [f32; 3],
}

#[derive(Clone, Debug, PartialEq)]
pub enum ElementKind {
    Group(GroupData),
    Cube(CubeData),
    Instance(InstanceData),
}

/// An element of the outliner.
#[derive(Clone, Debug, PartialEq)]
pub struct Element {
    uuid: Uuid,
    pub name: String,
    parent: Option<ElementId>,
    children: Vec<ElementId>,
    pub visibility: bool,
    pub kind: ElementKind,
}

impl Element {
    /// Create a new element with a fresh uuid.
    pub fn new(name: impl Into<String>, kind: ElementKind) -> Self {
        Self::with_uuid(Uuid::new_v4(), name, kind)
    }

    /// Create a new element with a known uuid, ie when loading a saved project.
    pub fn with_uuid(uuid: Uuid, name: impl Into<String>, kind: ElementKind) -> Self {
        Self {
            uuid,
            name: name.into(),
            parent: None,
            children: Vec::new(),
            visibility: true,
            kind,
        }
    }

    pub fn uuid(&self) -> Uuid {
        self.uuid
    }

    /// Get the parent of the element.
    pub fn parent(&self) -> Option<ElementId> {
        self.parent
    }

    /// Get the children.
    pub fn children(&self) -> &[ElementId] {
        &self.children
    }

    /// Whether plain export formats include this element. Instances never export themselves.
    pub fn exportable(&self) -> bool {
        !matches!(self.kind, ElementKind::Instance(_))
    }

    /// The pivot of the element.
    pub fn origin(&self) -> [f32; 3] {
        match &self.kind {
            ElementKind::Group(group) => group.origin,
            ElementKind::Cube(cube) => cube.origin,
            ElementKind::Instance(instance) => instance.position,
        }
    }

    pub fn rotation(&self) -> [f32; 3] {
        match &self.kind {
            ElementKind::Group(group) => group.rotation,
            ElementKind::Cube(cube) => cube.rotation,
            ElementKind::Instance(instance) => instance.rotation,
        }
    }

    /// The transform this element applies to its own content.
    ///
    /// Groups and cubes rotate around their origin; instances are placed at their position.
    pub fn local_transform(&self) -> SpatialTransform {
        match &self.kind {
            ElementKind::Instance(instance) => {
                SpatialTransform::from_euler_degrees(instance.position, instance.rotation)
            }
            _ => SpatialTransform::about_pivot(self.origin(), self.rotation()),
        }
    }

    pub fn instance(&self) -> Option<&InstanceData> {
        match &self.kind {
            ElementKind::Instance(instance) => Some(instance),
            _ => None,
        }
    }

    pub fn instance_mut(&mut self) -> Option<&mut InstanceData> {
        match &mut self.kind {
            ElementKind::Instance(instance) => Some(instance),
            _ => None,
        }
    }

    pub fn is_group(&self) -> bool {
        matches!(self.kind, ElementKind::Group(_))
    }

    /// Set a new parent. Only for the outliner to use.
    pub(crate) fn set_parent(&mut self, parent: Option<ElementId>) {
        self.parent = parent;
    }

    pub(crate) fn children_mut(&mut self) -> &mut Vec<ElementId> {
        &mut self.children
    }
}

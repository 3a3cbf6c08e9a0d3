use rustc_hash::FxHashMap;
use uuid::Uuid;

use crate::constants::OUTLINE_THRESHOLD_DEGREES;
use crate::core::entity::{CubeData, Face, spatial_transform::SpatialTransform};

/// UV space of a face, in texels.
const UV_SIZE: f32 = 16.0;

/// The data provided for each vertex of a mesh.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct MeshVertex {
    pub position: [f32; 3],
    pub tex_coords: [f32; 2],
    pub normal: [f32; 3],
}

/// A range of indices drawn with one texture.
#[derive(Clone, Debug, PartialEq)]
pub struct FaceGroup {
    pub start: u32,
    pub count: u32,
    pub texture: Option<Uuid>,
}

/// A mergeable triangle buffer for one or more primitives.
///
/// `highlight` is a per-vertex attribute kept alongside the vertices so it can be
/// rewritten without touching positions.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct GeometryBuffer {
    vertices: Vec<MeshVertex>,
    indices: Vec<u32>,
    highlight: Vec<f32>,
    groups: Vec<FaceGroup>,
}

impl GeometryBuffer {
    /// Build the 24 vertices and 36 indices of a cube, in the cube's own (unrotated) placement.
    pub fn cube(cube: &CubeData) -> Self {
        let [x0, y0, z0] = cube.from;
        let [x1, y1, z1] = cube.to;
        let mut geometry = Self::default();

        for face in Face::ALL {
            // corners are top-left, top-right, bottom-right, bottom-left seen from outside
            let (corners, normal) = match face {
                Face::North => (
                    [[x1, y1, z0], [x0, y1, z0], [x0, y0, z0], [x1, y0, z0]],
                    [0.0, 0.0, -1.0],
                ),
                Face::South => (
                    [[x0, y1, z1], [x1, y1, z1], [x1, y0, z1], [x0, y0, z1]],
                    [0.0, 0.0, 1.0],
                ),
                Face::East => (
                    [[x1, y1, z1], [x1, y1, z0], [x1, y0, z0], [x1, y0, z1]],
                    [1.0, 0.0, 0.0],
                ),
                Face::West => (
                    [[x0, y1, z0], [x0, y1, z1], [x0, y0, z1], [x0, y0, z0]],
                    [-1.0, 0.0, 0.0],
                ),
                Face::Up => (
                    [[x0, y1, z0], [x1, y1, z0], [x1, y1, z1], [x0, y1, z1]],
                    [0.0, 1.0, 0.0],
                ),
                Face::Down => (
                    [[x0, y0, z1], [x1, y0, z1], [x1, y0, z0], [x0, y0, z0]],
                    [0.0, -1.0, 0.0],
                ),
            };
            let cube_face = cube.faces.get(&face).cloned().unwrap_or_default();
            let [u0, v0, u1, v1] = cube_face.uv.map(|c| c / UV_SIZE);
            let tex_coords = [[u0, v0], [u1, v0], [u1, v1], [u0, v1]];

            let base = geometry.vertices.len() as u32;
            for (position, tex_coords) in corners.into_iter().zip(tex_coords) {
                geometry.vertices.push(MeshVertex {
                    position,
                    tex_coords,
                    normal,
                });
                geometry.highlight.push(0.0);
            }
            let start = geometry.indices.len() as u32;
            geometry
                .indices
                .extend([0, 2, 1, 0, 3, 2].map(|i| base + i));
            geometry.groups.push(FaceGroup {
                start,
                count: 6,
                texture: cube_face.texture,
            });
        }

        geometry
    }

    /// Bake a transform into the vertex positions and normals.
    pub fn apply_transform(&mut self, transform: &SpatialTransform) {
        for vertex in &mut self.vertices {
            vertex.position = transform.transform_point(vertex.position);
            vertex.normal = transform.transform_direction(vertex.normal);
        }
    }

    /// Concatenate buffers into one, rebasing indices and groups.
    ///
    /// Returns `None` if there is nothing to merge.
    pub fn merge(buffers: &[GeometryBuffer]) -> Option<GeometryBuffer> {
        if buffers.is_empty() {
            return None;
        }
        let mut merged = GeometryBuffer {
            vertices: Vec::with_capacity(buffers.iter().map(|b| b.vertices.len()).sum()),
            indices: Vec::with_capacity(buffers.iter().map(|b| b.indices.len()).sum()),
            highlight: Vec::new(),
            groups: Vec::new(),
        };
        for buffer in buffers {
            let vertex_base = merged.vertices.len() as u32;
            let index_base = merged.indices.len() as u32;
            merged.vertices.extend_from_slice(&buffer.vertices);
            merged.highlight.extend_from_slice(&buffer.highlight);
            merged
                .indices
                .extend(buffer.indices.iter().map(|i| i + vertex_base));
            merged.groups.extend(buffer.groups.iter().map(|g| FaceGroup {
                start: g.start + index_base,
                ..g.clone()
            }));
        }
        Some(merged)
    }

    pub fn vertices(&self) -> &[MeshVertex] {
        &self.vertices
    }

    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    pub fn groups(&self) -> &[FaceGroup] {
        &self.groups
    }

    pub fn highlight(&self) -> &[f32] {
        &self.highlight
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Raw vertex bytes, ie for uploading.
    pub fn vertex_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.vertices)
    }

    /// Fill the highlight attribute with `value`.
    ///
    /// Returns `true` only if anything changed.
    pub fn fill_highlight(&mut self, value: f32) -> bool {
        if self.highlight.first().is_none_or(|&h| h == value) {
            return false;
        }
        self.highlight.fill(value);
        true
    }

    /// Iterate the triangles as position triples.
    pub fn triangles(&self) -> impl Iterator<Item = [[f32; 3]; 3]> + '_ {
        self.indices.chunks_exact(3).map(|tri| {
            [
                self.vertices[tri[0] as usize].position,
                self.vertices[tri[1] as usize].position,
                self.vertices[tri[2] as usize].position,
            ]
        })
    }
}

/// Line segments outlining a geometry buffer. Positions come in pairs.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct OutlineBuffer {
    positions: Vec<[f32; 3]>,
}

/// Per-edge bookkeeping while deriving an outline.
struct EdgeRecord {
    a: [f32; 3],
    b: [f32; 3],
    normal: [f32; 3],
    shared: bool,
    keep: bool,
}

impl OutlineBuffer {
    /// Derive the outline of a geometry buffer.
    ///
    /// Keeps edges used by a single triangle and edges between triangles whose normals
    /// differ by more than the outline threshold. Coplanar diagonals disappear.
    pub fn from_geometry(geometry: &GeometryBuffer) -> Self {
        let threshold = OUTLINE_THRESHOLD_DEGREES.to_radians().cos();
        let mut order: Vec<EdgeRecord> = Vec::new();
        let mut lookup: FxHashMap<([i64; 3], [i64; 3]), usize> = FxHashMap::default();

        for [p0, p1, p2] in geometry.triangles() {
            let normal = triangle_normal(p0, p1, p2);
            for (a, b) in [(p0, p1), (p1, p2), (p2, p0)] {
                let (ka, kb) = (quantize(a), quantize(b));
                let key = if ka <= kb { (ka, kb) } else { (kb, ka) };
                match lookup.get(&key) {
                    Some(&index) => {
                        let record = &mut order[index];
                        if !record.shared {
                            record.shared = true;
                            record.keep = dot(record.normal, normal) <= threshold;
                        }
                    }
                    None => {
                        lookup.insert(key, order.len());
                        order.push(EdgeRecord {
                            a,
                            b,
                            normal,
                            shared: false,
                            keep: false,
                        });
                    }
                }
            }
        }

        let positions = order
            .into_iter()
            .filter(|record| !record.shared || record.keep)
            .flat_map(|record| [record.a, record.b])
            .collect();
        Self { positions }
    }

    /// Concatenate outlines.
    pub fn merge(outlines: &[OutlineBuffer]) -> Option<OutlineBuffer> {
        if outlines.is_empty() {
            return None;
        }
        Some(Self {
            positions: outlines
                .iter()
                .flat_map(|o| o.positions.iter().copied())
                .collect(),
        })
    }

    pub fn positions(&self) -> &[[f32; 3]] {
        &self.positions
    }

    pub fn segment_count(&self) -> usize {
        self.positions.len() / 2
    }
}

fn quantize(p: [f32; 3]) -> [i64; 3] {
    p.map(|c| (c * 1e4).round() as i64)
}

fn dot(a: [f32; 3], b: [f32; 3]) -> f32 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

fn triangle_normal(p0: [f32; 3], p1: [f32; 3], p2: [f32; 3]) -> [f32; 3] {
    let u = [p1[0] - p0[0], p1[1] - p0[1], p1[2] - p0[2]];
    let v = [p2[0] - p0[0], p2[1] - p0[1], p2[2] - p0[2]];
    let n = [
        u[1] * v[2] - u[2] * v[1],
        u[2] * v[0] - u[0] * v[2],
        u[0] * v[1] - u[1] * v[0],
    ];
    let len = dot(n, n).sqrt();
    if len == 0.0 {
        return [0.0; 3];
    }
    n.map(|c| c / len)
}

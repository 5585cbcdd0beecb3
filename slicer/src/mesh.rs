use std::{collections::HashMap, sync::Arc};

use nalgebra::Vector3;

use crate::{
    error::{SliceError, SliceResult},
    Pos,
};

/// An immutable triangle mesh with one normal per facet. Cloning only bumps a
/// reference count, so a mesh can be shared with every slicing worker.
#[derive(Debug, Clone)]
pub struct Mesh {
    inner: Arc<MeshInner>,
}

#[derive(Debug)]
struct MeshInner {
    vertices: Box<[Pos]>,
    faces: Box<[[u32; 3]]>,
    normals: Box<[Pos]>,
    bounds: (Pos, Pos),
}

impl Mesh {
    /// Creates a new mesh from the given vertices and faces, computing the
    /// facet normals from the winding order.
    pub fn new(vertices: Vec<Pos>, faces: Vec<[u32; 3]>) -> SliceResult<Self> {
        validate(&vertices, &faces)?;
        let normals = faces
            .iter()
            .map(|face| face_normal(&vertices, face))
            .collect::<Vec<_>>();
        Ok(Self::from_parts(vertices, faces, normals))
    }

    /// Creates a new mesh using normals supplied by the caller, one per face.
    pub fn with_normals(
        vertices: Vec<Pos>,
        faces: Vec<[u32; 3]>,
        normals: Vec<Pos>,
    ) -> SliceResult<Self> {
        validate(&vertices, &faces)?;
        if normals.len() != faces.len() {
            return Err(SliceError::invalid(format!(
                "expected {} facet normals, got {}",
                faces.len(),
                normals.len()
            )));
        }

        Ok(Self::from_parts(vertices, faces, normals))
    }

    fn from_parts(vertices: Vec<Pos>, faces: Vec<[u32; 3]>, normals: Vec<Pos>) -> Self {
        let bounds = vertex_bounds(&vertices);
        Self {
            inner: Arc::new(MeshInner {
                vertices: vertices.into_boxed_slice(),
                faces: faces.into_boxed_slice(),
                normals: normals.into_boxed_slice(),
                bounds,
            }),
        }
    }

    pub fn vertices(&self) -> &[Pos] {
        self.inner.vertices.as_ref()
    }

    pub fn faces(&self) -> &[[u32; 3]] {
        self.inner.faces.as_ref()
    }

    pub fn normals(&self) -> &[Pos] {
        self.inner.normals.as_ref()
    }

    pub fn face(&self, index: usize) -> &[u32; 3] {
        &self.inner.faces[index]
    }

    pub fn normal(&self, index: usize) -> Pos {
        self.inner.normals[index]
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices().len()
    }

    pub fn face_count(&self) -> usize {
        self.faces().len()
    }

    pub fn is_empty(&self) -> bool {
        self.faces().is_empty()
    }

    /// Get the minimum and maximum of each component of every vertex in the
    /// model. These points define the bounding box of the model.
    pub fn bounds(&self) -> (Pos, Pos) {
        self.inner.bounds
    }

    /// The three vertex positions of a facet.
    pub fn facet_vertices(&self, index: usize) -> [Pos; 3] {
        let vertices = self.vertices();
        self.face(index).map(|x| vertices[x as usize])
    }

    /// Lowest and highest Z of a facet.
    pub fn facet_z_range(&self, index: usize) -> (f32, f32) {
        let [a, b, c] = self.facet_vertices(index);
        (a.z.min(b.z).min(c.z), a.z.max(b.z).max(c.z))
    }

    /// Signed volume enclosed by the mesh, positive when the facets wind
    /// counter-clockwise seen from outside.
    pub fn volume(&self) -> f64 {
        let vertices = self.vertices();
        self.faces()
            .iter()
            .map(|face| {
                let [a, b, c] = face.map(|x| vertices[x as usize].cast::<f64>());
                a.dot(&b.cross(&c))
            })
            .sum::<f64>()
            / 6.0
    }

    /// Checks that every edge is shared by exactly two faces.
    pub fn is_manifold(&self) -> bool {
        let mut edges = HashMap::<_, u8>::new();

        for [a, b, c] in self.faces() {
            for (a, b) in [(a, b), (b, c), (c, a)] {
                *edges.entry((a.min(b), a.max(b))).or_default() += 1;
            }
        }

        edges.values().all(|&count| count == 2)
    }
}

impl Default for Mesh {
    fn default() -> Self {
        Self::from_parts(Vec::new(), Vec::new(), Vec::new())
    }
}

fn validate(vertices: &[Pos], faces: &[[u32; 3]]) -> SliceResult<()> {
    if vertices.is_empty() && !faces.is_empty() {
        return Err(SliceError::invalid("mesh has faces but no vertices"));
    }

    if let Some(vertex) = vertices.iter().find(|x| !x.iter().all(|c| c.is_finite())) {
        return Err(SliceError::invalid(format!(
            "non-finite vertex {vertex:?}"
        )));
    }

    let count = vertices.len() as u32;
    if let Some((idx, face)) = faces
        .iter()
        .enumerate()
        .find(|(_, face)| face.iter().any(|&x| x >= count))
    {
        return Err(SliceError::invalid(format!(
            "face {idx} {face:?} references a vertex out of range (vertex count {count})"
        )));
    }

    Ok(())
}

fn face_normal(vertices: &[Pos], face: &[u32; 3]) -> Pos {
    let [a, b, c] = face.map(|x| vertices[x as usize]);
    (b - a)
        .cross(&(c - a))
        .try_normalize(0.0)
        .unwrap_or_else(Vector3::zeros)
}

/// Get the minimum and maximum of each component of every vertex.
fn vertex_bounds(vertices: &[Pos]) -> (Pos, Pos) {
    vertices.iter().fold(
        (Pos::repeat(f32::MAX), Pos::repeat(f32::MIN)),
        |(min, max), v| (min.inf(v), max.sup(v)),
    )
}

//! Splits a mesh into the parts above and below a horizontal plane,
//! optionally closing the cut with a flat cap.

use std::collections::HashMap;

use common::units::{round_half_up, unscale};
use geo::{Coord as GeoCoord, LineString, Polygon as GeoPolygon, TriangulateEarcut};
use tracing::trace;

use crate::{
    connectivity::EdgeIds,
    error::{SliceError, SliceResult},
    geometry::{cross2, ExPolygon, Point, Polygon},
    intersection::{
        slice_facet, FacetEdgeType, FacetVertices, IntersectionLine, IntersectionRef,
    },
    mesh::Mesh,
    slicer::chain::chain_lines_by_triangle_connectivity,
    Pos,
};

/// Which halves [`cut_mesh`] should produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CutSide {
    Upper,
    Lower,
    Both,
}

impl CutSide {
    pub fn upper(self) -> bool {
        matches!(self, CutSide::Upper | CutSide::Both)
    }

    pub fn lower(self) -> bool {
        matches!(self, CutSide::Lower | CutSide::Both)
    }
}

/// The result of [`cut_mesh`]. A half is `None` if it was not requested.
#[derive(Debug, Clone, Default)]
pub struct CutMesh {
    pub upper: Option<Mesh>,
    pub lower: Option<Mesh>,
}

/// One half of the mesh being assembled.
struct CutHalf {
    vertices: Vec<Pos>,
    faces: Vec<[u32; 3]>,
    /// Lines on the cut plane bounding this half.
    lines: Vec<IntersectionLine>,
    /// Vertex index of every point on the cut plane. Facets sharing an edge
    /// compute the same point for it, so this also merges their new vertices.
    cut_vertices: HashMap<Point, u32>,
    /// The cap faces up (+Z) when this half lies below the plane.
    below: bool,
}

impl CutHalf {
    fn new(mesh: &Mesh, below: bool) -> Self {
        Self {
            vertices: mesh.vertices().to_vec(),
            faces: Vec::with_capacity(mesh.face_count()),
            lines: Vec::new(),
            cut_vertices: HashMap::new(),
            below,
        }
    }

    /// Index of the vertex at an intersection point, adding a new vertex if
    /// the point is inside an edge.
    fn cut_vertex(&mut self, point: Point, reference: IntersectionRef, z: f32) -> u32 {
        if let IntersectionRef::Vertex(id) = reference {
            self.cut_vertices.entry(point).or_insert(id);
            return id;
        }

        let vertices = &mut self.vertices;
        *self.cut_vertices.entry(point).or_insert_with(|| {
            vertices.push(Pos::new(unscale(point.x) as f32, unscale(point.y) as f32, z));
            (vertices.len() - 1) as u32
        })
    }

    fn add_face(&mut self, face: [u32; 3]) {
        let [a, b, c] = face;
        if a != b && a != c && b != c {
            self.faces.push(face);
        }
    }

    fn add_line(&mut self, line: IntersectionLine, z: f32) {
        self.cut_vertex(line.a, line.a_ref, z);
        self.cut_vertex(line.b, line.b_ref, z);
        self.lines.push(line);
    }

    /// Closes the cut with triangles lying in the plane.
    fn triangulate_cap(&mut self, z: f32) {
        let expolygons = make_expolygons_simple(&self.lines);
        let before = self.faces.len();

        for expolygon in expolygons.iter() {
            let triangulation = expolygon_to_geo(expolygon).earcut_triangles_raw();
            let indices = triangulation
                .vertices
                .chunks_exact(2)
                .map(|xy| {
                    let point = Point::new(round_half_up(xy[0]), round_half_up(xy[1]));
                    (point, self.cap_vertex(point, z))
                })
                .collect::<Vec<_>>();

            for triangle in triangulation.triangle_indices.chunks_exact(3) {
                let [a, b, c] = [triangle[0], triangle[1], triangle[2]].map(|x| indices[x]);
                let area = cross2(b.0 - a.0, c.0 - a.0);
                if area == 0 {
                    continue;
                }

                if (area > 0) == self.below {
                    self.add_face([a.1, b.1, c.1]);
                } else {
                    self.add_face([a.1, c.1, b.1]);
                }
            }
        }

        trace!(
            "Capped cut with {} expolygons in {} triangles",
            expolygons.len(),
            self.faces.len() - before
        );
    }

    /// Vertex for a cap point. Points the triangulator did not get from the
    /// cut lines are rare and get a fresh vertex.
    fn cap_vertex(&mut self, point: Point, z: f32) -> u32 {
        match self.cut_vertices.get(&point) {
            Some(&idx) => idx,
            None => self.cut_vertex(point, IntersectionRef::Edge(u32::MAX), z),
        }
    }

    /// Drops vertices no face refers to and builds the mesh.
    fn build(self) -> SliceResult<Mesh> {
        let mut remap = vec![u32::MAX; self.vertices.len()];
        let mut vertices = Vec::new();

        let faces = self
            .faces
            .iter()
            .map(|face| {
                face.map(|x| {
                    let slot = &mut remap[x as usize];
                    if *slot == u32::MAX {
                        *slot = vertices.len() as u32;
                        vertices.push(self.vertices[x as usize]);
                    }
                    *slot
                })
            })
            .collect::<Vec<_>>();

        Mesh::new(vertices, faces)
    }
}

fn ring_to_geo(polygon: &Polygon) -> LineString<f64> {
    polygon
        .points()
        .iter()
        .map(|p| GeoCoord {
            x: p.x as f64,
            y: p.y as f64,
        })
        .collect()
}

fn expolygon_to_geo(expolygon: &ExPolygon) -> GeoPolygon<f64> {
    GeoPolygon::new(
        ring_to_geo(&expolygon.contour),
        expolygon.holes.iter().map(ring_to_geo).collect(),
    )
}

/// Chains the cut lines in a single pass and sorts the loops into contours
/// and holes. Each hole goes to the smallest contour containing it, holes
/// outside every contour are dropped.
fn make_expolygons_simple(lines: &[IntersectionLine]) -> Vec<ExPolygon> {
    let (mut loops, mut open) = (Vec::new(), Vec::new());
    chain_lines_by_triangle_connectivity(lines, &mut loops, &mut open);

    let (contours, holes): (Vec<_>, Vec<_>) =
        loops.into_iter().partition(|x| x.double_area() > 0);
    let mut expolygons = contours
        .into_iter()
        .map(|x| ExPolygon::new(x, Vec::new()))
        .collect::<Vec<_>>();

    for hole in holes {
        let Some(&first) = hole.points().first() else {
            continue;
        };

        let owner = expolygons
            .iter_mut()
            .filter(|x| x.contour.contains(first))
            .min_by_key(|x| x.contour.double_area());
        if let Some(owner) = owner {
            owner.holes.push(hole);
        }
    }

    expolygons
}

/// Cuts `mesh` with the plane at height `z`.
///
/// Facets crossing the plane are split, the part on the side of the lone
/// vertex becoming one triangle and the other part two. Facets lying in the
/// plane are dropped. With `triangulate_caps` each half gets its cut closed
/// by a flat cap facing away from the half.
pub fn cut_mesh(
    mesh: &Mesh,
    z: f32,
    side: CutSide,
    triangulate_caps: bool,
) -> SliceResult<CutMesh> {
    if !z.is_finite() {
        return Err(SliceError::invalid(format!("cut height {z} is not finite")));
    }

    trace!("Cutting {} facets at z = {z}", mesh.face_count());
    let edges = EdgeIds::build(mesh);
    let mut upper = side.upper().then(|| CutHalf::new(mesh, false));
    let mut lower = side.lower().then(|| CutHalf::new(mesh, true));

    for facet in 0..mesh.face_count() {
        let vertices = FacetVertices::new(mesh, facet, None);
        let (min_z, max_z) = (vertices.min_z, vertices.max_z);
        let indices = mesh.face(facet);

        let mut cut_line = None;
        if min_z <= z && z <= max_z && !vertices.is_degenerate() {
            let edge_ids = edges.facet(facet);
            let slice = slice_facet(
                z,
                &vertices.vertices,
                indices,
                &edge_ids,
                vertices.lowest,
                vertices.is_horizontal(),
            );

            if let Some(&line) = slice.line() {
                match line.edge_type {
                    FacetEdgeType::Top => lower.iter_mut().for_each(|x| x.add_line(line, z)),
                    FacetEdgeType::Bottom => upper.iter_mut().for_each(|x| x.add_line(line, z)),
                    FacetEdgeType::General => {
                        upper.iter_mut().chain(lower.iter_mut()).for_each(|x| x.add_line(line, z));
                        cut_line = Some(line);
                    }
                    FacetEdgeType::Horizontal => {}
                }
            }
        }

        if min_z > z || (min_z == z && max_z > z) {
            upper.iter_mut().for_each(|x| x.add_face(*indices));
        } else if max_z < z || (max_z == z && min_z < z) {
            lower.iter_mut().for_each(|x| x.add_face(*indices));
        } else if let Some(line) = cut_line {
            let [v0, v1, v2] = vertices.vertices;
            let iv = if (v0.z > z) == (v1.z > z) {
                2
            } else if (v1.z > z) == (v2.z > z) {
                0
            } else {
                1
            };
            let [iv0, iv1, iv2] = [iv, (iv + 1) % 3, (iv + 2) % 3].map(|x| indices[x]);
            let isolated_above = vertices.vertices[iv].z > z;

            // The crossing on the edge from the lone vertex is `v0v1`, the one
            // on the edge back to it is `v2v0`.
            let closing = IntersectionRef::Edge(edges.facet(facet)[(iv + 2) % 3]);
            let a_closes = line.a_ref == closing || line.a_ref == IntersectionRef::Vertex(iv2);
            let ((v0v1, v0v1_ref), (v2v0, v2v0_ref)) = if a_closes {
                ((line.b, line.b_ref), (line.a, line.a_ref))
            } else {
                ((line.a, line.a_ref), (line.b, line.b_ref))
            };

            for (half, half_above) in upper
                .iter_mut()
                .map(|x| (x, true))
                .chain(lower.iter_mut().map(|x| (x, false)))
            {
                let iv0v1 = half.cut_vertex(v0v1, v0v1_ref, z);
                let iv2v0 = half.cut_vertex(v2v0, v2v0_ref, z);

                if half_above == isolated_above {
                    half.add_face([iv0, iv0v1, iv2v0]);
                } else {
                    half.add_face([iv1, iv2, iv0v1]);
                    half.add_face([iv2, iv2v0, iv0v1]);
                }
            }
        }
    }

    let finish = |half: Option<CutHalf>| -> SliceResult<Option<Mesh>> {
        half.map(|mut half| {
            if triangulate_caps {
                half.triangulate_cap(z);
            }
            half.build()
        })
        .transpose()
    };

    let out = CutMesh {
        upper: finish(upper)?,
        lower: finish(lower)?,
    };
    trace!("Finished cutting mesh");
    Ok(out)
}

#[cfg(test)]
mod tests {
    use std::f32::consts::FRAC_1_SQRT_2;

    use nalgebra::Vector3;

    use super::{cut_mesh, CutSide};
    use crate::{builder::MeshBuilder, mesh::Mesh};

    #[test]
    fn cube_halves_add_up() -> anyhow::Result<()> {
        let mut builder = MeshBuilder::new();
        builder.add_box(Vector3::new(0.0, 0.0, 0.0), Vector3::new(2.0, 3.0, 4.0));
        let mesh = builder.build()?;

        let cut = cut_mesh(&mesh, 1.5, CutSide::Both, true)?;
        let (Some(upper), Some(lower)) = (cut.upper, cut.lower) else {
            panic!("both halves were requested");
        };

        assert!((upper.volume() - 15.0).abs() < 1e-3);
        assert!((lower.volume() - 9.0).abs() < 1e-3);
        assert!((upper.volume() + lower.volume() - mesh.volume()).abs() < 1e-3);

        let (min, max) = upper.bounds();
        assert!((min - Vector3::new(0.0, 0.0, 1.5)).norm() < 1e-5);
        assert!((max - Vector3::new(2.0, 3.0, 4.0)).norm() < 1e-5);

        let (min, max) = lower.bounds();
        assert!((min - Vector3::new(0.0, 0.0, 0.0)).norm() < 1e-5);
        assert!((max - Vector3::new(2.0, 3.0, 1.5)).norm() < 1e-5);

        // The caps face away from their half.
        for (mesh, up) in [(&upper, false), (&lower, true)] {
            let caps = mesh
                .normals()
                .iter()
                .enumerate()
                .filter(|(idx, _)| mesh.facet_z_range(*idx) == (1.5, 1.5))
                .map(|(_, normal)| *normal)
                .collect::<Vec<_>>();
            assert!(!caps.is_empty());
            assert!(caps.iter().all(|x| (x.z > 0.0) == up));
        }

        Ok(())
    }

    #[test]
    fn only_requested_half() -> anyhow::Result<()> {
        let mut builder = MeshBuilder::new();
        builder.add_box(Vector3::new(0.0, 0.0, 0.0), Vector3::new(1.0, 1.0, 1.0));
        let mesh = builder.build()?;

        let cut = cut_mesh(&mesh, 0.25, CutSide::Lower, false)?;
        assert!(cut.upper.is_none());
        let lower = cut.lower.expect("lower half was requested");

        // Without a cap the lower half is an open box.
        assert!(!lower.is_manifold());
        let (_, max) = lower.bounds();
        assert!((max.z - 0.25).abs() < 1e-6);
        Ok(())
    }

    #[test]
    fn cut_at_top_face() -> anyhow::Result<()> {
        // Cutting at the top face leaves nothing above it.
        let mut builder = MeshBuilder::new();
        builder.add_box(Vector3::new(0.0, 0.0, 0.0), Vector3::new(1.0, 1.0, 2.0));
        let mesh = builder.build()?;

        let cut = cut_mesh(&mesh, 2.0, CutSide::Both, true)?;
        let upper = cut.upper.expect("upper half was requested");
        let lower = cut.lower.expect("lower half was requested");
        assert!(upper.is_empty());
        assert!((lower.volume() - 2.0).abs() < 1e-6);
        Ok(())
    }

    #[test]
    fn sphere_cut_through_middle() -> anyhow::Result<()> {
        let mut builder = MeshBuilder::new();
        builder.add_uv_sphere(Vector3::zeros(), 5.0, (32, 16));
        let mesh = builder.build()?;

        let cut = cut_mesh(&mesh, 0.3, CutSide::Both, true)?;
        let upper = cut.upper.expect("upper half was requested");
        let lower = cut.lower.expect("lower half was requested");

        assert!((upper.volume() + lower.volume() - mesh.volume()).abs() < 1e-2);
        assert!(lower.volume() > upper.volume());
        Ok(())
    }

    #[test]
    fn rejects_nan_height() {
        let mesh = crate::mesh::Mesh::default();
        assert!(cut_mesh(&mesh, f32::NAN, CutSide::Both, true).is_err());
    }

    #[test]
    fn cut_through_mesh_vertices() -> anyhow::Result<()> {
        // Unit cube turned 45 degrees about X. Two of its edges sit exactly at
        // the cut height, and the diagonals of the X faces cross the plane at
        // those edges' vertices.
        let mut builder = MeshBuilder::new();
        builder.add_box(Vector3::zeros(), Vector3::new(1.0, 1.0, 1.0));
        let cube = builder.build()?;
        let vertices = cube
            .vertices()
            .iter()
            .map(|v| {
                let (y, z) = ((v.y - v.z) * FRAC_1_SQRT_2, (v.y + v.z) * FRAC_1_SQRT_2);
                Vector3::new(v.x, y, z)
            })
            .collect();
        let mesh = Mesh::new(vertices, cube.faces().to_vec())?;

        let cut = cut_mesh(&mesh, FRAC_1_SQRT_2, CutSide::Both, true)?;
        let upper = cut.upper.expect("upper half was requested");
        let lower = cut.lower.expect("lower half was requested");

        assert!((upper.volume() + lower.volume() - mesh.volume()).abs() < 1e-5);
        assert!((upper.volume() - lower.volume()).abs() < 1e-5);
        assert!(upper.is_manifold());
        assert!(lower.is_manifold());
        Ok(())
    }
}

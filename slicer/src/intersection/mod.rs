//! Intersection of a single facet with a horizontal plane.

use common::units::{round_half_up, scaled};
use nalgebra::{UnitQuaternion, Vector2, Vector3};

use crate::{geometry::Point, mesh::Mesh};

/// What an intersection point sits on. Two facets that share a vertex or an
/// edge produce the same reference for it, which is how intersection lines
/// are chained together without comparing coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum IntersectionRef {
    /// The point is a mesh vertex lying exactly on the plane.
    Vertex(u32),
    /// The point is inside the shared edge with this id.
    Edge(u32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FacetEdgeType {
    /// The plane crosses the facet through two different edges.
    General,
    /// Two vertices lie on the plane and the third one is below it.
    Top,
    /// Two vertices lie on the plane and the third one is above it.
    Bottom,
    /// All three vertices lie on the plane.
    Horizontal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntersectionPoint {
    pub point: Point,
    pub reference: IntersectionRef,
}

/// Directed segment where a facet meets a plane. The solid is on the left
/// of `a → b` for facets wound counter-clockwise seen from outside.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntersectionLine {
    pub a: Point,
    pub b: Point,
    pub a_ref: IntersectionRef,
    pub b_ref: IntersectionRef,
    pub edge_type: FacetEdgeType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FacetSlice {
    /// The facet misses the plane or only touches it at a single vertex.
    NoSlice,
    /// The line is only used to cap a cut mesh. Bottom edges belong to the
    /// facet below and horizontal facets contribute through their neighbours.
    Cutting(IntersectionLine),
    /// The line is part of the slice outline.
    Slicing(IntersectionLine),
}

impl FacetSlice {
    pub fn line(&self) -> Option<&IntersectionLine> {
        match self {
            FacetSlice::NoSlice => None,
            FacetSlice::Cutting(line) | FacetSlice::Slicing(line) => Some(line),
        }
    }
}

/// The vertices of one facet, optionally rotated, with the Z extents the
/// dispatcher needs to find the relevant planes.
#[derive(Debug, Clone, Copy)]
pub struct FacetVertices {
    pub vertices: [Vector3<f32>; 3],
    pub min_z: f32,
    pub max_z: f32,
    /// Index of the first vertex at `min_z`.
    pub lowest: usize,
}

impl FacetVertices {
    pub fn new(mesh: &Mesh, facet: usize, rotation: Option<&UnitQuaternion<f32>>) -> Self {
        let mut vertices = mesh.facet_vertices(facet);
        if let Some(rotation) = rotation {
            vertices = vertices.map(|x| rotation * x);
        }

        let [a, b, c] = vertices;
        let min_z = a.z.min(b.z).min(c.z);
        let max_z = a.z.max(b.z).max(c.z);
        let lowest = if b.z == min_z {
            1
        } else if c.z == min_z {
            2
        } else {
            0
        };

        Self {
            vertices,
            min_z,
            max_z,
            lowest,
        }
    }

    pub fn is_horizontal(&self) -> bool {
        self.min_z == self.max_z
    }

    /// Facets with collinear or coincident vertices have no area and never
    /// take part in a slice.
    pub fn is_degenerate(&self) -> bool {
        let [a, b, c] = self.vertices.map(|x| x.cast::<f64>());
        (b - a).cross(&(c - a)) == Vector3::zeros()
    }
}

/// Converts the XY of a vertex into scaled units without rounding.
#[inline]
fn scaled_xy(vertex: &Vector3<f32>) -> Vector2<f64> {
    Vector2::new(scaled(vertex.x as f64), scaled(vertex.y as f64))
}

/// Converts the XY of a vertex into a point on the scaled grid.
#[inline]
pub fn scale_xy(vertex: &Vector3<f32>) -> Point {
    scaled_xy(vertex).map(round_half_up)
}

/// At most three intersection points of one facet, with vertices that are
/// hit twice (once from each adjacent edge) recorded once.
struct FacetPoints {
    points: [IntersectionPoint; 3],
    len: usize,
    on_layer: Option<usize>,
}

impl FacetPoints {
    fn new() -> Self {
        let empty = IntersectionPoint {
            point: Point::zeros(),
            reference: IntersectionRef::Vertex(u32::MAX),
        };
        Self {
            points: [empty; 3],
            len: 0,
            on_layer: None,
        }
    }

    fn push(&mut self, point: IntersectionPoint) {
        if self.len < 3 {
            self.points[self.len] = point;
            self.len += 1;
        }
    }

    fn push_vertex(&mut self, vertex: &Vector3<f32>, id: u32) {
        let reference = IntersectionRef::Vertex(id);
        if self.len < 3 && self.on_layer.map_or(true, |x| self.points[x].reference != reference) {
            self.on_layer = Some(self.len);
            self.push(IntersectionPoint {
                point: scale_xy(vertex),
                reference,
            });
        }
    }
}

/// Intersects a facet with the plane at `slice_z`.
///
/// The edges are visited starting at the lowest vertex so that both ends of
/// the line come out in a consistent order. A crossing is always interpolated
/// from the edge's lower vertex id towards the higher one, so the two facets
/// sharing that edge compute bit-identical points.
pub fn slice_facet(
    slice_z: f32,
    vertices: &[Vector3<f32>; 3],
    indices: &[u32; 3],
    edge_ids: &[u32; 3],
    lowest: usize,
    horizontal: bool,
) -> FacetSlice {
    let mut points = FacetPoints::new();

    for j in 0..3 {
        let k = (lowest + j) % 3;
        let l = (k + 1) % 3;
        let edge_id = edge_ids[k];
        let (mut a, mut b) = (&vertices[k], &vertices[l]);
        let (mut a_id, mut b_id) = (indices[k], indices[l]);

        if a.z == slice_z && b.z == slice_z {
            let edge_type = if horizontal {
                let [v0, v1, v2] = vertices.map(|x| x.xy().cast::<f64>());
                let normal = (v1.x - v0.x) * (v2.y - v1.y) - (v1.y - v0.y) * (v2.x - v1.x);
                if normal < 0.0 {
                    (a, b, a_id, b_id) = (b, a, b_id, a_id);
                }
                FacetEdgeType::Horizontal
            } else if vertices.iter().any(|x| x.z < slice_z) {
                (a, b, a_id, b_id) = (b, a, b_id, a_id);
                FacetEdgeType::Top
            } else {
                FacetEdgeType::Bottom
            };

            let line = IntersectionLine {
                a: scale_xy(a),
                b: scale_xy(b),
                a_ref: IntersectionRef::Vertex(a_id),
                b_ref: IntersectionRef::Vertex(b_id),
                edge_type,
            };

            return match edge_type {
                FacetEdgeType::Top => FacetSlice::Slicing(line),
                _ => FacetSlice::Cutting(line),
            };
        }

        if a.z == slice_z {
            points.push_vertex(a, a_id);
        } else if b.z == slice_z {
            points.push_vertex(b, b_id);
        } else if (a.z < slice_z && b.z > slice_z) || (b.z < slice_z && a.z > slice_z) {
            if a_id > b_id {
                (a, b, a_id, b_id) = (b, a, b_id, a_id);
            }

            let t = (slice_z as f64 - b.z as f64) / (a.z as f64 - b.z as f64);
            if t <= 0.0 {
                points.push_vertex(a, a_id);
            } else if t >= 1.0 {
                points.push_vertex(b, b_id);
            } else {
                let (a, b) = (scaled_xy(a), scaled_xy(b));
                points.push(IntersectionPoint {
                    point: (b + (a - b) * t).map(round_half_up),
                    reference: IntersectionRef::Edge(edge_id),
                });
            }
        }
    }

    if points.len != 2 {
        return FacetSlice::NoSlice;
    }

    let [first, second, _] = points.points;
    FacetSlice::Slicing(IntersectionLine {
        a: second.point,
        b: first.point,
        a_ref: second.reference,
        b_ref: first.reference,
        edge_type: FacetEdgeType::General,
    })
}

#[cfg(test)]
mod tests {
    use nalgebra::{UnitQuaternion, Vector3};

    use super::{
        slice_facet, FacetEdgeType, FacetSlice, FacetVertices, IntersectionRef, Point,
    };
    use crate::mesh::Mesh;

    const INDICES: [u32; 3] = [0, 1, 2];
    const EDGES: [u32; 3] = [10, 11, 12];

    fn slice(vertices: [Vector3<f32>; 3], z: f32) -> FacetSlice {
        let mesh = Mesh::new(vertices.to_vec(), vec![INDICES]).unwrap();
        let facet = FacetVertices::new(&mesh, 0, None);
        slice_facet(
            z,
            &facet.vertices,
            &INDICES,
            &EDGES,
            facet.lowest,
            facet.is_horizontal(),
        )
    }

    fn vertical() -> [Vector3<f32>; 3] {
        [
            Vector3::new(0.0, 0.0, 0.0),
            Vector3::new(2.0, 0.0, 0.0),
            Vector3::new(0.0, 0.0, 2.0),
        ]
    }

    #[test]
    fn general_crossing() {
        let FacetSlice::Slicing(line) = slice(vertical(), 1.0) else {
            panic!("expected a slicing line");
        };

        assert_eq!(line.edge_type, FacetEdgeType::General);
        assert_eq!(line.a, Point::new(0, 0));
        assert_eq!(line.b, Point::new(1_000_000, 0));
        assert_eq!(line.a_ref, IntersectionRef::Edge(12));
        assert_eq!(line.b_ref, IntersectionRef::Edge(11));
    }

    #[test]
    fn single_vertex_touch() {
        assert_eq!(slice(vertical(), 2.0), FacetSlice::NoSlice);
        assert_eq!(slice(vertical(), 3.0), FacetSlice::NoSlice);
        assert_eq!(slice(vertical(), -1.0), FacetSlice::NoSlice);
    }

    #[test]
    fn vertex_and_edge() {
        let vertices = [
            Vector3::new(0.0, 0.0, 0.0),
            Vector3::new(2.0, 0.0, 2.0),
            Vector3::new(0.0, 0.0, 1.0),
        ];
        let FacetSlice::Slicing(line) = slice(vertices, 1.0) else {
            panic!("expected a slicing line");
        };

        let refs = [line.a_ref, line.b_ref];
        assert!(refs.contains(&IntersectionRef::Vertex(2)));
        assert!(refs.contains(&IntersectionRef::Edge(10)));
        assert!([line.a, line.b].contains(&Point::new(1_000_000, 0)));
    }

    #[test]
    fn top_and_bottom_edges() {
        // Edge 1-2 on the plane with vertex 0 below it.
        let top = [
            Vector3::new(0.0, 0.0, 0.0),
            Vector3::new(2.0, 0.0, 1.0),
            Vector3::new(0.0, 0.0, 1.0),
        ];
        let FacetSlice::Slicing(line) = slice(top, 1.0) else {
            panic!("expected a top edge to slice");
        };
        assert_eq!(line.edge_type, FacetEdgeType::Top);
        assert_eq!(line.a_ref, IntersectionRef::Vertex(2));
        assert_eq!(line.b_ref, IntersectionRef::Vertex(1));

        // Same edge on the plane with vertex 0 above it.
        let bottom = top.map(|x| Vector3::new(x.x, x.y, 2.0 - x.z));
        let FacetSlice::Cutting(line) = slice(bottom, 1.0) else {
            panic!("expected a bottom edge to only cut");
        };
        assert_eq!(line.edge_type, FacetEdgeType::Bottom);
        assert_eq!(line.a_ref, IntersectionRef::Vertex(1));
        assert_eq!(line.b_ref, IntersectionRef::Vertex(2));
    }

    #[test]
    fn horizontal_facet_only_cuts() {
        let vertices = [
            Vector3::new(0.0, 0.0, 1.0),
            Vector3::new(0.0, 1.0, 1.0),
            Vector3::new(1.0, 0.0, 1.0),
        ];
        let FacetSlice::Cutting(line) = slice(vertices, 1.0) else {
            panic!("expected a horizontal facet to only cut");
        };
        assert_eq!(line.edge_type, FacetEdgeType::Horizontal);
        // Clockwise seen from above, so the first edge visited (1-2) comes
        // out reversed.
        assert_eq!(line.a_ref, IntersectionRef::Vertex(2));
        assert_eq!(line.b_ref, IntersectionRef::Vertex(1));
    }

    #[test]
    fn shared_edge_points_agree() {
        let vertices = vec![
            Vector3::new(0.123_456_7, -3.3, -1.7),
            Vector3::new(7.654_321, 2.2, 4.9),
            Vector3::new(-5.0, 1.0, 0.3),
            Vector3::new(3.0, 9.0, 0.1),
        ];
        // Facets 0 and 1 share the edge 0-1, traversed in opposite directions.
        let faces = vec![[0, 1, 2], [1, 0, 3]];
        let mesh = Mesh::new(vertices, faces).unwrap();
        let edges = [[7, 8, 9], [7, 5, 6]];

        for z in [-1.2, -0.5, 0.0, 1.1, 2.0, 3.33] {
            let crossings = (0..2)
                .map(|facet| {
                    let vertices = FacetVertices::new(&mesh, facet, None);
                    let result = slice_facet(
                        z,
                        &vertices.vertices,
                        mesh.face(facet),
                        &edges[facet],
                        vertices.lowest,
                        false,
                    );
                    let line = result.line().copied().unwrap();
                    [(line.a_ref, line.a), (line.b_ref, line.b)]
                        .into_iter()
                        .find(|(reference, _)| *reference == IntersectionRef::Edge(7))
                        .unwrap()
                        .1
                })
                .collect::<Vec<_>>();
            assert_eq!(crossings[0], crossings[1], "z = {z}");
        }
    }

    #[test]
    fn rotation_is_applied() {
        let vertices = vertical().to_vec();
        let mesh = Mesh::new(vertices, vec![INDICES]).unwrap();
        let rotation = UnitQuaternion::from_axis_angle(&Vector3::x_axis(), std::f32::consts::PI);
        let facet = FacetVertices::new(&mesh, 0, Some(&rotation));

        assert_eq!(facet.max_z, 0.0);
        assert!((facet.min_z + 2.0).abs() < 1e-6);
        assert_eq!(facet.vertices[facet.lowest], facet.vertices[2]);
    }

    #[test]
    fn zero_area_facets_are_degenerate() {
        let needle = [
            Vector3::new(0.0, 0.0, -7.0),
            Vector3::new(0.0, 0.0, -6.0),
            Vector3::new(0.0, 0.0, 0.0),
        ];
        let collapsed = [Vector3::new(1.0, 2.0, 3.0); 3];

        for vertices in [needle, collapsed] {
            let mesh = Mesh::new(vertices.to_vec(), vec![INDICES]).unwrap();
            assert!(FacetVertices::new(&mesh, 0, None).is_degenerate());
        }

        let mesh = Mesh::new(vertical().to_vec(), vec![INDICES]).unwrap();
        assert!(!FacetVertices::new(&mesh, 0, None).is_degenerate());
    }
}

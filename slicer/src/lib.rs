//! Slices triangle meshes into closed polygon loops and ExPolygons at a list
//! of heights, and cuts meshes in two along a horizontal plane.

use nalgebra::Vector3;

pub mod builder;
pub mod clipper;
pub mod connectivity;
pub mod cut;
pub mod error;
pub mod geometry;
pub mod intersection;
pub mod mesh;
pub mod slicer;

pub use cut::{cut_mesh, CutMesh, CutSide};
pub use error::{SliceError, SliceResult};
pub use geometry::{ExPolygon, Point, Polygon};
pub use mesh::Mesh;
pub use slicer::{slice_mesh, slice_mesh_ex, MeshSlicer};

pub type Pos = Vector3<f32>;

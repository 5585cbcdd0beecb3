//! Slices a mesh at a list of heights, in parallel.

use std::time::Instant;

use common::{
    config::{MeshSlicingParams, SlicingMode},
    progress::Progress,
    units::scaled,
};
use parking_lot::Mutex;
use rayon::iter::{IndexedParallelIterator, IntoParallelIterator, ParallelIterator};
use tracing::debug;

use crate::{
    clipper::{keep_largest_contour_only, make_expolygons},
    connectivity::EdgeIds,
    error::{SliceError, SliceResult},
    geometry::{ExPolygon, Polygon},
    intersection::{slice_facet, FacetEdgeType, FacetSlice, FacetVertices, IntersectionLine},
    mesh::Mesh,
};

pub mod chain;
pub mod stitch;

/// The cancel callback is polled once per this many facets or heights.
const CANCEL_CHECK_INTERVAL: usize = 0x10000;

/// Slices one mesh. Connectivity is built once up front, so the same slicer
/// can be reused for any number of jobs.
///
/// A slicer runs one job at a time and its [`Progress`] describes the current
/// job. Use one slicer per thread to slice concurrently.
pub struct MeshSlicer {
    mesh: Mesh,
    edges: EdgeIds,
    progress: Progress,
}

impl MeshSlicer {
    pub fn new(mesh: &Mesh) -> Self {
        Self {
            mesh: mesh.clone(),
            edges: EdgeIds::build(mesh),
            progress: Progress::new(),
        }
    }

    pub fn mesh(&self) -> &Mesh {
        &self.mesh
    }

    /// Gets a handle to the progress of the current job. One unit of progress
    /// is one finished height.
    pub fn progress(&self) -> Progress {
        self.progress.clone()
    }

    /// Slices the mesh at each of the ascending heights `zs` (in mm), returning
    /// the closed loops of every height in the same order.
    ///
    /// Contours come out counter-clockwise and holes clockwise for a mesh with
    /// outward facing facets. `cancel` is polled periodically and aborts the
    /// whole job with [`SliceError::Cancelled`].
    pub fn slice(
        &mut self,
        zs: &[f32],
        params: &MeshSlicingParams,
        cancel: impl Fn() -> bool + Sync,
    ) -> SliceResult<Vec<Vec<Polygon>>> {
        self.slice_layers(zs, params, &cancel, |layer, lines| {
            let mut loops = chain::make_loops(&lines);
            apply_mode(&mut loops, params.mode(layer));
            loops
        })
    }

    /// Like [`MeshSlicer::slice`], but unions the loops of every height into
    /// ExPolygons, applying the closing radius and extra offset of `params`.
    pub fn slice_ex(
        &mut self,
        zs: &[f32],
        params: &MeshSlicingParams,
        cancel: impl Fn() -> bool + Sync,
    ) -> SliceResult<Vec<Vec<ExPolygon>>> {
        let resolution = scaled(params.resolution as f64);

        self.slice_layers(zs, params, &cancel, |layer, lines| {
            let mode = params.mode(layer);
            let mut loops = chain::make_loops(&lines);
            // The largest contour is picked after the union.
            apply_mode(&mut loops, match mode {
                SlicingMode::PositiveLargestContour => SlicingMode::Positive,
                mode => mode,
            });

            let mut expolygons =
                make_expolygons(&loops, params.closing_radius, params.extra_offset);
            if mode == SlicingMode::PositiveLargestContour {
                keep_largest_contour_only(&mut expolygons);
            }

            if resolution != 0.0 {
                expolygons = expolygons
                    .iter()
                    .filter_map(|x| x.simplify(resolution))
                    .collect();
            }

            expolygons
        })
    }

    fn slice_layers<T: Send>(
        &self,
        zs: &[f32],
        params: &MeshSlicingParams,
        cancel: &(impl Fn() -> bool + Sync),
        layer: impl Fn(usize, Vec<IntersectionLine>) -> T + Sync,
    ) -> SliceResult<Vec<T>> {
        validate_heights(zs)?;
        params.validate().map_err(SliceError::InvalidArgument)?;

        let start = Instant::now();
        self.progress.set_total(zs.len() as u64);
        if cancel() {
            return Err(SliceError::Cancelled);
        }

        let buckets = self.intersect(zs, params, cancel)?;
        let lines = buckets.iter().map(|x| x.len()).sum::<usize>();

        let layers = buckets
            .into_par_iter()
            .enumerate()
            .map(|(idx, lines)| {
                if idx % CANCEL_CHECK_INTERVAL == 0 && cancel() {
                    return Err(SliceError::Cancelled);
                }

                let out = layer(idx, lines);
                self.progress.add_complete(1);
                Ok(out)
            })
            .collect::<SliceResult<Vec<_>>>()?;

        self.progress.set_finished();
        debug!(
            "Sliced {} facets into {} layers ({lines} intersection lines) in {:?}",
            self.mesh.face_count(),
            zs.len(),
            start.elapsed()
        );

        Ok(layers)
    }

    /// Intersects every facet with the heights it spans, collecting the lines
    /// into one bucket per height.
    fn intersect(
        &self,
        zs: &[f32],
        params: &MeshSlicingParams,
        cancel: &(impl Fn() -> bool + Sync),
    ) -> SliceResult<Vec<Vec<IntersectionLine>>> {
        let rotation = params.up_rotation();
        let buckets = (0..zs.len())
            .map(|_| Mutex::new(Vec::new()))
            .collect::<Vec<_>>();

        (0..self.mesh.face_count())
            .into_par_iter()
            .try_for_each(|facet| {
                if facet % CANCEL_CHECK_INTERVAL == 0 && cancel() {
                    return Err(SliceError::Cancelled);
                }

                let vertices = FacetVertices::new(&self.mesh, facet, rotation.as_ref());
                let first = zs.partition_point(|&z| z < vertices.min_z);
                let last = zs.partition_point(|&z| z <= vertices.max_z);
                if first >= last || vertices.is_degenerate() {
                    return Ok(());
                }

                let indices = self.mesh.face(facet);
                let edge_ids = self.edges.facet(facet);
                let horizontal = vertices.is_horizontal();

                for (layer, &z) in zs.iter().enumerate().take(last).skip(first) {
                    let slice = slice_facet(
                        z,
                        &vertices.vertices,
                        indices,
                        &edge_ids,
                        vertices.lowest,
                        horizontal,
                    );

                    if let FacetSlice::Slicing(line) = slice {
                        if line.edge_type != FacetEdgeType::Horizontal {
                            buckets[layer].lock().push(line);
                        }
                    }
                }

                Ok(())
            })?;

        Ok(buckets.into_iter().map(|x| x.into_inner()).collect())
    }
}

/// Slices `mesh` at the ascending heights `zs`, see [`MeshSlicer::slice`].
pub fn slice_mesh(
    mesh: &Mesh,
    zs: &[f32],
    params: &MeshSlicingParams,
) -> SliceResult<Vec<Vec<Polygon>>> {
    MeshSlicer::new(mesh).slice(zs, params, || false)
}

/// Slices `mesh` at the ascending heights `zs`, see [`MeshSlicer::slice_ex`].
pub fn slice_mesh_ex(
    mesh: &Mesh,
    zs: &[f32],
    params: &MeshSlicingParams,
) -> SliceResult<Vec<Vec<ExPolygon>>> {
    MeshSlicer::new(mesh).slice_ex(zs, params, || false)
}

fn validate_heights(zs: &[f32]) -> SliceResult<()> {
    if let Some(z) = zs.iter().find(|x| !x.is_finite()) {
        return Err(SliceError::invalid(format!("slice height {z} is not finite")));
    }

    if let Some(idx) = zs.windows(2).position(|x| x[0] > x[1]) {
        return Err(SliceError::invalid(format!(
            "slice heights must be ascending, {} comes after {}",
            zs[idx + 1],
            zs[idx]
        )));
    }

    Ok(())
}

fn apply_mode(loops: &mut Vec<Polygon>, mode: SlicingMode) {
    match mode {
        SlicingMode::Regular => {}
        SlicingMode::Positive => loops.iter_mut().for_each(|x| {
            x.make_counter_clockwise();
        }),
        SlicingMode::PositiveLargestContour => {
            let largest = loops
                .iter()
                .enumerate()
                .max_by_key(|(_, x)| x.double_area().abs())
                .map(|(idx, _)| idx);

            if let Some(largest) = largest {
                let mut keep = loops.swap_remove(largest);
                keep.make_counter_clockwise();
                loops.clear();
                loops.push(keep);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use common::config::{MeshSlicingParams, SlicingMode};
    use nalgebra::Vector3;

    use super::{apply_mode, slice_mesh, validate_heights, MeshSlicer};
    use crate::{
        builder::MeshBuilder,
        error::SliceError,
        geometry::{Point, Polygon},
    };

    fn square(min: i64, max: i64) -> Polygon {
        Polygon::new(vec![
            Point::new(min, min),
            Point::new(max, min),
            Point::new(max, max),
            Point::new(min, max),
        ])
    }

    #[test]
    fn heights_must_be_ascending_and_finite() {
        assert!(validate_heights(&[0.0, 0.5, 0.5, 1.0]).is_ok());
        assert!(matches!(
            validate_heights(&[0.0, 1.0, 0.5]),
            Err(SliceError::InvalidArgument(_))
        ));
        assert!(validate_heights(&[0.0, f32::NAN]).is_err());
    }

    #[test]
    fn modes() {
        let mut hole = square(2, 8);
        hole.reverse();
        let loops = vec![square(0, 10), hole, square(20, 21)];

        let mut regular = loops.clone();
        apply_mode(&mut regular, SlicingMode::Regular);
        assert_eq!(regular, loops);

        let mut positive = loops.clone();
        apply_mode(&mut positive, SlicingMode::Positive);
        assert!(positive.iter().all(|x| x.is_counter_clockwise()));

        let mut largest = loops;
        apply_mode(&mut largest, SlicingMode::PositiveLargestContour);
        assert_eq!(largest, vec![square(0, 10)]);
    }

    #[test]
    fn hollow_box_has_hole() -> anyhow::Result<()> {
        // Outer box with an inverted inner box, as a hollowed model would be.
        let mut builder = MeshBuilder::new();
        builder.add_box(Vector3::new(0.0, 0.0, 0.0), Vector3::new(10.0, 10.0, 10.0));
        let mut inner = MeshBuilder::new();
        inner.add_box(Vector3::new(3.0, 3.0, 3.0), Vector3::new(7.0, 7.0, 7.0));
        let inner = inner.build()?;
        let vertices = inner
            .vertices()
            .iter()
            .map(|x| builder.add_vertex(*x))
            .collect::<Vec<_>>();
        for [a, b, c] in inner.faces() {
            builder.add_face([a, c, b].map(|x| vertices[*x as usize]));
        }
        let mesh = builder.build()?;

        let params = MeshSlicingParams::default();
        let mut slicer = MeshSlicer::new(&mesh);
        let layers = slicer.slice_ex(&[1.0, 5.0], &params, || false)?;

        assert_eq!(layers[0].len(), 1);
        assert!(layers[0][0].holes.is_empty());
        assert!((layers[0][0].area_mm() - 100.0).abs() < 1e-3);

        assert_eq!(layers[1].len(), 1);
        assert_eq!(layers[1][0].holes.len(), 1);
        assert!((layers[1][0].area_mm() - 84.0).abs() < 1e-3);

        let positive = MeshSlicingParams {
            mode: SlicingMode::Positive,
            ..Default::default()
        };
        let filled = slicer.slice_ex(&[5.0], &positive, || false)?;
        assert!(filled[0][0].holes.is_empty());

        assert!(slicer.progress().complete());
        Ok(())
    }

    #[test]
    fn heights_outside_mesh_are_empty() -> anyhow::Result<()> {
        let mut builder = MeshBuilder::new();
        builder.add_box(Vector3::new(0.0, 0.0, 0.0), Vector3::new(1.0, 1.0, 1.0));
        let mesh = builder.build()?;

        let layers = slice_mesh(&mesh, &[-1.0, 0.5, 2.0], &MeshSlicingParams::default())?;
        assert!(layers[0].is_empty());
        assert_eq!(layers[1].len(), 1);
        assert!(layers[2].is_empty());
        Ok(())
    }

    #[test]
    fn cancelled_before_start() -> anyhow::Result<()> {
        let mut builder = MeshBuilder::new();
        builder.add_box(Vector3::new(0.0, 0.0, 0.0), Vector3::new(1.0, 1.0, 1.0));
        let mut slicer = MeshSlicer::new(&builder.build()?);

        let result = slicer.slice(&[0.5], &MeshSlicingParams::default(), || true);
        assert_eq!(result, Err(SliceError::Cancelled));
        assert_eq!(slicer.progress().completed(), 0);
        Ok(())
    }

    #[test]
    fn progress_follows_each_job() -> anyhow::Result<()> {
        let mut builder = MeshBuilder::new();
        builder.add_box(Vector3::new(0.0, 0.0, 0.0), Vector3::new(1.0, 1.0, 1.0));
        let mut slicer = MeshSlicer::new(&builder.build()?);
        let progress = slicer.progress();
        let params = MeshSlicingParams::default();

        slicer.slice(&[0.2, 0.4, 0.6], &params, || false)?;
        assert_eq!(progress.completed(), 3);

        slicer.slice_ex(&[0.5], &params, || false)?;
        assert_eq!(progress.completed(), 1);
        assert!(progress.complete());
        Ok(())
    }
}

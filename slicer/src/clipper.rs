//! Turns the closed loops of a layer into ExPolygons with polygon boolean
//! operations from `geo-clipper`.
//!
//! Everything is handed to Clipper in scaled units with a factor of one, so
//! coordinates survive the round trip unchanged.

use common::units::{round_half_up, scaled};
use geo::{Coord as GeoCoord, LineString, MultiPolygon, Polygon as GeoPolygon};
use geo_clipper::{Clipper, EndType, JoinType};

use crate::geometry::{ExPolygon, Point, Polygon};

const MITER_LIMIT: f64 = 3.0;

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

fn loops_to_geo(loops: &[Polygon]) -> MultiPolygon<f64> {
    loops
        .iter()
        .filter(|x| x.len() >= 3)
        .map(|x| GeoPolygon::new(ring_to_geo(x), Vec::new()))
        .collect()
}

fn expolygons_to_geo(expolygons: &[ExPolygon]) -> MultiPolygon<f64> {
    expolygons
        .iter()
        .map(|x| {
            let holes = x.holes.iter().map(ring_to_geo).collect();
            GeoPolygon::new(ring_to_geo(&x.contour), holes)
        })
        .collect()
}

/// Converts a closed geo ring back, dropping the repeated closing point.
/// Returns `None` if less than a triangle is left.
fn ring_from_geo(ring: &LineString<f64>) -> Option<Polygon> {
    let points = ring
        .coords()
        .map(|c| Point::new(round_half_up(c.x), round_half_up(c.y)))
        .collect::<Vec<_>>();
    Polygon::closed(points)
}

/// Converts Clipper output into ExPolygons with counter-clockwise contours
/// and clockwise holes.
fn expolygons_from_geo(multi: &MultiPolygon<f64>) -> Vec<ExPolygon> {
    multi
        .iter()
        .filter_map(|polygon| {
            let mut contour = ring_from_geo(polygon.exterior())?;
            contour.make_counter_clockwise();

            let holes = polygon
                .interiors()
                .iter()
                .filter_map(ring_from_geo)
                .map(|mut hole| {
                    hole.make_clockwise();
                    hole
                })
                .collect();
            Some(ExPolygon::new(contour, holes))
        })
        .collect()
}

fn union_geo(loops: &[Polygon]) -> MultiPolygon<f64> {
    loops_to_geo(loops).union(&MultiPolygon::new(Vec::new()), 1.0)
}

fn offset_geo(geometry: &MultiPolygon<f64>, delta_mm: f32) -> MultiPolygon<f64> {
    geometry.offset(
        scaled(delta_mm as f64),
        JoinType::Miter(MITER_LIMIT),
        EndType::ClosedPolygon,
        1.0,
    )
}

/// Unions the loops with a non-zero fill rule. Clockwise loops inside
/// counter-clockwise ones cancel out into holes, while loops stacked with the
/// same orientation merge instead of cancelling as they would with even-odd.
pub fn union_loops(loops: &[Polygon]) -> Vec<ExPolygon> {
    expolygons_from_geo(&union_geo(loops))
}

/// Grows (positive) or shrinks (negative) the ExPolygons by `delta_mm`, with
/// mitered corners.
pub fn offset_expolygons(expolygons: &[ExPolygon], delta_mm: f32) -> Vec<ExPolygon> {
    expolygons_from_geo(&offset_geo(&expolygons_to_geo(expolygons), delta_mm))
}

/// Unions the loops of a layer and applies the closing offsets.
///
/// With `closing_radius >= extra_offset` the union is grown by the closing
/// radius, then shrunk back leaving `extra_offset` of growth, which merges
/// loops that almost touch. Otherwise it is only grown by `extra_offset`.
pub fn make_expolygons(
    loops: &[Polygon],
    closing_radius: f32,
    extra_offset: f32,
) -> Vec<ExPolygon> {
    let mut geometry = union_geo(loops);

    let (grow, shrink) = if closing_radius >= extra_offset {
        (closing_radius, closing_radius - extra_offset)
    } else {
        (extra_offset, 0.0)
    };

    if grow != 0.0 {
        geometry = offset_geo(&geometry, grow);
    }
    if shrink != 0.0 {
        geometry = offset_geo(&geometry, -shrink);
    }

    expolygons_from_geo(&geometry)
}

/// Keeps only the ExPolygon with the largest contour, holes included.
pub fn keep_largest_contour_only(expolygons: &mut Vec<ExPolygon>) {
    if expolygons.len() < 2 {
        return;
    }

    let largest = expolygons
        .iter()
        .enumerate()
        .max_by_key(|(_, x)| x.contour.double_area().abs())
        .map(|(idx, _)| idx);

    if let Some(largest) = largest {
        let keep = expolygons.swap_remove(largest);
        expolygons.clear();
        expolygons.push(keep);
    }
}

//! Joins the open polylines left over from chaining into closed loops.

use std::cmp::Reverse;

use common::units::{scale, Coord};
use itertools::Itertools;
use ordered_float::OrderedFloat;

use crate::{
    geometry::{closest_point::ClosestPointLookup, distance, distance_squared, Point, Polygon},
    intersection::IntersectionRef,
};

/// Largest gap in mm that [`chain_open_polylines_close_gaps`] bridges when
/// making loops.
pub const MAX_GAP: f64 = 2.0;

/// A loop closing segment is only accepted while it is shorter than this
/// fraction of the polyline length.
const CLOSING_LENGTH_RATIO: f64 = 0.3;

/// A chain of intersection lines that did not close on itself.
#[derive(Debug, Clone)]
pub struct OpenPolyline {
    pub points: Vec<Point>,
    pub start: IntersectionRef,
    pub end: IntersectionRef,
    pub consumed: bool,
    pub length: f64,
}

impl OpenPolyline {
    pub fn new(start: IntersectionRef, end: IntersectionRef, points: Vec<Point>) -> Self {
        let length = polyline_length(&points);
        Self {
            points,
            start,
            end,
            consumed: false,
            length,
        }
    }

    fn reference(&self, start: bool) -> IntersectionRef {
        if start {
            self.start
        } else {
            self.end
        }
    }

    fn reference_mut(&mut self, start: bool) -> &mut IntersectionRef {
        if start {
            &mut self.start
        } else {
            &mut self.end
        }
    }

    fn point(&self, start: bool) -> Option<Point> {
        if start {
            self.points.first().copied()
        } else {
            self.points.last().copied()
        }
    }

    fn consume(&mut self) -> Vec<Point> {
        self.consumed = true;
        self.length = 0.0;
        std::mem::take(&mut self.points)
    }
}

/// One end of an open polyline, by index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PolylineEnd {
    polyline: usize,
    start: bool,
}

impl PolylineEnd {
    fn other(self) -> Self {
        Self {
            polyline: self.polyline,
            start: !self.start,
        }
    }

    fn reference(self, polylines: &[OpenPolyline]) -> IntersectionRef {
        polylines[self.polyline].reference(self.start)
    }
}

/// Position of `end` in `by_id`, which is sorted by reference.
fn find_end(by_id: &[PolylineEnd], polylines: &[OpenPolyline], end: PolylineEnd) -> Option<usize> {
    let key = end.reference(polylines);
    let first = by_id.partition_point(|x| x.reference(polylines) < key);
    by_id[first..]
        .iter()
        .take_while(|x| x.reference(polylines) == key)
        .position(|&x| x == end)
        .map(|x| x + first)
}

fn polyline_length(points: &[Point]) -> f64 {
    points
        .iter()
        .tuple_windows()
        .map(|(&a, &b)| distance(a, b))
        .sum()
}

/// Indices of the polylines not consumed yet, longest first.
fn sorted_by_length(polylines: &mut [OpenPolyline], update_lengths: bool) -> Vec<usize> {
    if update_lengths {
        polylines
            .iter_mut()
            .filter(|x| !x.consumed)
            .for_each(|x| x.length = polyline_length(&x.points));
    }

    let mut out = (0..polylines.len())
        .filter(|&x| !polylines[x].consumed)
        .collect::<Vec<_>>();
    out.sort_by_key(|&x| Reverse(OrderedFloat(polylines[x].length)));
    out
}

/// Emits a closed loop if at least a triangle is left, making loops that
/// were glued from pieces of unknown orientation counter-clockwise.
fn emit_loop(points: Vec<Point>, reorient: bool, loops: &mut Vec<Polygon>) {
    let Some(mut polygon) = Polygon::closed(points) else {
        return;
    };

    if reorient {
        polygon.make_counter_clockwise();
    }
    loops.push(polygon);
}

/// Connects polylines whose ends share a vertex or edge reference.
///
/// Without `try_connect_reversed` only the end of one polyline is joined to
/// the start of another. With it a polyline may also be attached backwards,
/// and any loop closed that way is made counter-clockwise.
pub fn chain_open_polylines_exact(
    polylines: &mut [OpenPolyline],
    loops: &mut Vec<Polygon>,
    try_connect_reversed: bool,
) {
    // Ends sorted by their reference. When connecting reversed polylines the
    // references of two entries get swapped along with the entries, so the
    // order holds.
    let mut by_id = Vec::with_capacity(polylines.len() * 2);
    for (polyline, _) in polylines.iter().enumerate().filter(|(_, x)| !x.consumed) {
        by_id.push(PolylineEnd {
            polyline,
            start: true,
        });
        if try_connect_reversed {
            by_id.push(PolylineEnd {
                polyline,
                start: false,
            });
        }
    }
    by_id.sort_by_key(|end| (end.reference(polylines), end.polyline, !end.start));

    for opl in sorted_by_length(polylines, false) {
        if polylines[opl].consumed {
            continue;
        }
        polylines[opl].consumed = true;

        let end = PolylineEnd {
            polyline: opl,
            start: false,
        };
        loop {
            let key = end.reference(polylines);
            let first = by_id.partition_point(|x| x.reference(polylines) < key);
            let next = by_id[first..]
                .iter()
                .take_while(|x| x.reference(polylines) == key)
                .find(|x| !polylines[x.polyline].consumed)
                .copied();

            let Some(next) = next else {
                polylines[opl].consumed = false;
                break;
            };

            // The first point of the next polyline repeats our last one.
            let next_length = polylines[next.polyline].length;
            let next_points = polylines[next.polyline].consume();
            let this = &mut polylines[opl];
            if next.start {
                this.points.extend(next_points.into_iter().skip(1));
            } else {
                this.points.extend(next_points.into_iter().rev().skip(1));
            }
            this.length += next_length;

            // Our end takes over the far end of the attached polyline. When
            // mixing orientations the lookup entries trade places as well.
            let far = next.other();
            let far_ref = far.reference(polylines);
            if try_connect_reversed {
                let positions = (
                    find_end(&by_id, polylines, end),
                    find_end(&by_id, polylines, far),
                );
                if let (Some(end_idx), Some(far_idx)) = positions {
                    by_id.swap(end_idx, far_idx);
                }
                *polylines[far.polyline].reference_mut(far.start) = polylines[opl].end;
            }
            polylines[opl].end = far_ref;

            let this = &mut polylines[opl];
            if this.start == this.end {
                // The last point duplicates the first.
                this.points.pop();
                let points = this.consume();
                emit_loop(points, try_connect_reversed, loops);
                break;
            }
        }
    }
}

/// Connects polylines whose ends lie within [`MAX_GAP`] of each other,
/// nearest first.
///
/// A polyline is closed on itself once its ends are within the gap. If closing
/// is also nearer than any other polyline, the closing segment additionally
/// has to be short compared to the polyline itself.
pub fn chain_open_polylines_close_gaps(
    polylines: &mut [OpenPolyline],
    loops: &mut Vec<Polygon>,
    max_gap: f64,
    try_connect_reversed: bool,
) {
    let max_gap: Coord = scale(max_gap);
    let max_gap_squared = max_gap as f64 * max_gap as f64;
    let sorted = sorted_by_length(polylines, true);

    let mut lookup = ClosestPointLookup::new(max_gap);
    for &polyline in sorted.iter() {
        for start in [true, false] {
            if !start && !try_connect_reversed {
                continue;
            }

            let end = PolylineEnd { polyline, start };
            if let Some(point) = polylines[polyline].point(start) {
                lookup.insert(point, end);
            }
        }
    }

    for opl in sorted {
        if polylines[opl].consumed {
            continue;
        }

        let (Some(first), Some(last)) = (polylines[opl].point(true), polylines[opl].point(false))
        else {
            continue;
        };

        let end = PolylineEnd {
            polyline: opl,
            start: false,
        };
        if try_connect_reversed {
            // Our end point moves as polylines get attached.
            lookup.remove(last, &end);
        }
        polylines[opl].consumed = true;

        let mut joined = 1;
        loop {
            let this = &polylines[opl];
            let (Some(front), Some(back)) = (this.point(true), this.point(false)) else {
                break;
            };

            let next = lookup.find(back, |x| !polylines[x.polyline].consumed);
            let closing = distance_squared(back, front);
            let mut closed = closing < max_gap_squared;
            if let Some((_, next_distance)) = next {
                if closed && closing < next_distance {
                    closed = closing.sqrt() < CLOSING_LENGTH_RATIO * polyline_length(&this.points);
                }
            }

            if closed {
                lookup.remove(first, &PolylineEnd {
                    polyline: opl,
                    start: true,
                });

                let mut points = polylines[opl].consume();
                if closing == 0.0 {
                    points.pop();
                }
                emit_loop(points, try_connect_reversed && joined > 1, loops);
                break;
            }

            let Some((next, _)) = next else {
                polylines[opl].consumed = false;
                if try_connect_reversed {
                    lookup.insert(back, end);
                }
                break;
            };

            let other = &mut polylines[next.polyline];
            for start in [true, false] {
                if let Some(point) = other.point(start) {
                    lookup.remove(point, &PolylineEnd {
                        polyline: next.polyline,
                        start,
                    });
                }
            }
            let mut next_points = other.consume();
            if !next.start {
                next_points.reverse();
            }

            let this = &mut polylines[opl];
            let skip = (next_points.first() == this.points.last()) as usize;
            this.points.extend(next_points.into_iter().skip(skip));
            joined += 1;
        }
    }
}

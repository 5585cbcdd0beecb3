//! Turns the unordered intersection lines of one plane into closed loops.

use tracing::debug;

use super::stitch::{
    chain_open_polylines_close_gaps, chain_open_polylines_exact, OpenPolyline, MAX_GAP,
};
use crate::{
    geometry::Polygon,
    intersection::{IntersectionLine, IntersectionRef},
};

/// Follows the lines from one to the next through their shared vertex and
/// edge references. Closed chains go to `loops`, everything else ends up in
/// `open` for stitching.
pub fn chain_lines_by_triangle_connectivity(
    lines: &[IntersectionLine],
    loops: &mut Vec<Polygon>,
    open: &mut Vec<OpenPolyline>,
) {
    // Index of every line by the reference of its start point.
    let mut by_a = lines
        .iter()
        .enumerate()
        .map(|(idx, line)| (line.a_ref, idx))
        .collect::<Vec<_>>();
    by_a.sort_unstable();

    let mut skip = vec![false; lines.len()];
    let mut next_line = |skip: &[bool], reference: IntersectionRef| {
        let first = by_a.partition_point(|(x, _)| *x < reference);
        by_a[first..]
            .iter()
            .take_while(|(x, _)| *x == reference)
            .map(|(_, idx)| *idx)
            .find(|&idx| !skip[idx])
    };

    for seed in 0..lines.len() {
        if skip[seed] {
            continue;
        }
        skip[seed] = true;

        let first = &lines[seed];
        let mut last = first;
        let mut points = vec![first.a];

        while let Some(next) = next_line(&skip, last.b_ref) {
            skip[next] = true;
            last = &lines[next];
            points.push(last.a);
        }

        if first.a_ref == last.b_ref {
            loops.extend(Polygon::closed(points));
        } else {
            points.push(last.b);
            open.push(OpenPolyline::new(first.a_ref, last.b_ref, points));
        }
    }
}

/// Chains lines into loops, then stitches the open polylines: exactly by
/// reference first, then across gaps of up to [`MAX_GAP`]. Each of the two
/// stitching passes runs keeping the orientation first and allowing reversed
/// pieces second. Polylines that still do not close are dropped.
pub fn make_loops(lines: &[IntersectionLine]) -> Vec<Polygon> {
    let mut loops = Vec::new();
    let mut open = Vec::new();
    chain_lines_by_triangle_connectivity(lines, &mut loops, &mut open);

    if !open.is_empty() {
        chain_open_polylines_exact(&mut open, &mut loops, false);
        chain_open_polylines_exact(&mut open, &mut loops, true);
        chain_open_polylines_close_gaps(&mut open, &mut loops, MAX_GAP, false);
        chain_open_polylines_close_gaps(&mut open, &mut loops, MAX_GAP, true);

        let dropped = open.iter().filter(|x| !x.consumed).count();
        if dropped > 0 {
            debug!("Dropped {dropped} open polylines that could not be closed");
        }
    }

    loops
}

//! 2D geometry in the scaled integer coordinate space of [`common::units`].

use common::units::Coord;
use nalgebra::Vector2;

pub mod closest_point;
mod expolygon;
mod polygon;

pub use expolygon::ExPolygon;
pub use polygon::Polygon;

pub type Point = Vector2<Coord>;

/// Z component of the cross product of two vectors, exact for any pair of
/// scaled coordinates.
#[inline]
pub fn cross2(a: Point, b: Point) -> i128 {
    a.x as i128 * b.y as i128 - a.y as i128 * b.x as i128
}

#[inline]
pub fn distance_squared(a: Point, b: Point) -> f64 {
    (a - b).map(|x| x as f64).norm_squared()
}

#[inline]
pub fn distance(a: Point, b: Point) -> f64 {
    distance_squared(a, b).sqrt()
}

/// Squared distance from `point` to the segment `a b`.
pub fn segment_distance_squared(point: Point, a: Point, b: Point) -> f64 {
    let (point, a, b) = (point.map(|x| x as f64), a.map(|x| x as f64), b.map(|x| x as f64));
    let direction = b - a;
    let length = direction.norm_squared();
    if length == 0.0 {
        return (point - a).norm_squared();
    }

    let t = ((point - a).dot(&direction) / length).clamp(0.0, 1.0);
    (a + direction * t - point).norm_squared()
}

/// Douglas-Peucker simplification of an open path. The first and last points
/// are always kept.
pub fn douglas_peucker(points: &[Point], tolerance: f64) -> Vec<Point> {
    if points.len() <= 2 {
        return points.to_vec();
    }

    let tolerance = tolerance * tolerance;
    let mut keep = vec![false; points.len()];
    keep[0] = true;
    keep[points.len() - 1] = true;

    let mut stack = vec![(0, points.len() - 1)];
    while let Some((anchor, floater)) = stack.pop() {
        if anchor + 1 >= floater {
            continue;
        }

        let (furthest, max_distance) = (anchor + 1..floater)
            .map(|i| {
                let distance = segment_distance_squared(points[i], points[anchor], points[floater]);
                (i, distance)
            })
            .fold((anchor, 0.0), |max, x| if x.1 > max.1 { x } else { max });

        if max_distance > tolerance {
            keep[furthest] = true;
            stack.push((anchor, furthest));
            stack.push((furthest, floater));
        }
    }

    points
        .iter()
        .zip(keep)
        .filter_map(|(point, keep)| keep.then_some(*point))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::{cross2, douglas_peucker, segment_distance_squared, Point};

    #[test]
    fn cross_does_not_overflow() {
        let big = 4_000_000_000_000;
        let a = Point::new(big, 0);
        let b = Point::new(0, big);
        assert_eq!(cross2(a, b), big as i128 * big as i128);
        assert_eq!(cross2(b, a), -(big as i128 * big as i128));
    }

    #[test]
    fn segment_distance() {
        let (a, b) = (Point::new(0, 0), Point::new(10, 0));
        assert_eq!(segment_distance_squared(Point::new(5, 3), a, b), 9.0);
        assert_eq!(segment_distance_squared(Point::new(-4, 3), a, b), 25.0);
        assert_eq!(segment_distance_squared(Point::new(1, 1), a, a), 2.0);
    }

    #[test]
    fn simplify_drops_collinear() {
        let points = [
            Point::new(0, 0),
            Point::new(5, 1),
            Point::new(10, 0),
            Point::new(10, 50),
        ];
        let simplified = douglas_peucker(&points, 2.0);
        assert_eq!(
            simplified,
            vec![Point::new(0, 0), Point::new(10, 0), Point::new(10, 50)]
        );
    }
}

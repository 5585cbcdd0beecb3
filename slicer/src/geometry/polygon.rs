use common::units::SCALING_FACTOR;

use super::{cross2, distance, douglas_peucker, Point};

/// A closed loop of points. The last point connects back to the first one and
/// is not repeated.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Polygon {
    points: Vec<Point>,
}

impl Polygon {
    pub fn new(points: Vec<Point>) -> Self {
        Self { points }
    }

    /// Builds a loop from chained points, dropping repeated points. Returns
    /// `None` if what is left encloses no area.
    pub fn closed(points: Vec<Point>) -> Option<Self> {
        let mut polygon = Self::new(points);
        polygon.remove_duplicate_points();
        (polygon.len() >= 3 && polygon.double_area() != 0).then_some(polygon)
    }

    pub fn points(&self) -> &[Point] {
        &self.points
    }

    pub fn into_points(self) -> Vec<Point> {
        self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Iterates over every edge as `(start, end)`, including the closing one.
    pub fn edges(&self) -> impl Iterator<Item = (Point, Point)> + '_ {
        let next = self.points.iter().cycle().skip(1);
        self.points.iter().copied().zip(next.copied())
    }

    /// Twice the signed area, exact.
    pub fn double_area(&self) -> i128 {
        self.edges().map(|(a, b)| cross2(a, b)).sum()
    }

    /// Signed area in scaled units squared, positive for counter-clockwise
    /// loops.
    pub fn area(&self) -> f64 {
        self.double_area() as f64 * 0.5
    }

    /// Signed area in square millimetres.
    pub fn area_mm(&self) -> f64 {
        self.area() * SCALING_FACTOR * SCALING_FACTOR
    }

    pub fn is_counter_clockwise(&self) -> bool {
        self.double_area() > 0
    }

    pub fn reverse(&mut self) {
        self.points.reverse();
    }

    /// Returns true if the orientation was changed.
    pub fn make_counter_clockwise(&mut self) -> bool {
        let flip = self.double_area() < 0;
        flip.then(|| self.reverse());
        flip
    }

    /// Returns true if the orientation was changed.
    pub fn make_clockwise(&mut self) -> bool {
        let flip = self.double_area() > 0;
        flip.then(|| self.reverse());
        flip
    }

    /// Perimeter in scaled units.
    pub fn length(&self) -> f64 {
        self.edges().map(|(a, b)| distance(a, b)).sum()
    }

    /// Even-odd point containment. Points exactly on the boundary may land
    /// on either side.
    pub fn contains(&self, point: Point) -> bool {
        let mut inside = false;
        for (a, b) in self.edges() {
            if (a.y > point.y) != (b.y > point.y) {
                // Sign of the crossing x relative to point.x, without division.
                let side = cross2(b - a, point - a);
                if (side > 0) == (b.y > a.y) {
                    inside = !inside;
                }
            }
        }
        inside
    }

    /// Removes consecutive duplicate points, including a trailing copy of the
    /// first point.
    pub fn remove_duplicate_points(&mut self) {
        self.points.dedup();
        while self.points.len() > 1 && self.points.first() == self.points.last() {
            self.points.pop();
        }
    }

    /// Douglas-Peucker simplification in scaled units. Returns `None` if no
    /// area survives.
    pub fn simplify(&self, tolerance: f64) -> Option<Polygon> {
        let first = *self.points.first()?;
        let mut closed = self.points.clone();
        closed.push(first);

        let mut points = douglas_peucker(&closed, tolerance);
        points.pop();
        Polygon::closed(points)
    }
}

impl From<Vec<Point>> for Polygon {
    fn from(points: Vec<Point>) -> Self {
        Self::new(points)
    }
}

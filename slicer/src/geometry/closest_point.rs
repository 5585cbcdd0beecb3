use std::collections::HashMap;

use common::units::Coord;

use super::{distance_squared, Point};

/// Finds the closest stored point within a fixed search radius. Points are
/// bucketed into square cells one radius wide, so a query only has to look at
/// the 3×3 block of cells around it.
pub struct ClosestPointLookup<T> {
    radius: Coord,
    cells: HashMap<(Coord, Coord), Vec<(Point, T)>>,
}

impl<T: Copy> ClosestPointLookup<T> {
    pub fn new(radius: Coord) -> Self {
        Self {
            radius: radius.max(1),
            cells: HashMap::new(),
        }
    }

    fn cell(&self, point: Point) -> (Coord, Coord) {
        (point.x.div_euclid(self.radius), point.y.div_euclid(self.radius))
    }

    pub fn insert(&mut self, point: Point, value: T) {
        let cell = self.cell(point);
        self.cells.entry(cell).or_default().push((point, value));
    }

    /// Removes one entry equal to `value` stored at `point`.
    pub fn remove(&mut self, point: Point, value: &T) -> bool
    where
        T: PartialEq,
    {
        let cell = self.cell(point);
        let Some(entries) = self.cells.get_mut(&cell) else {
            return false;
        };

        match entries.iter().position(|(at, x)| *at == point && x == value) {
            Some(idx) => {
                entries.remove(idx);
                true
            }
            None => false,
        }
    }

    /// Returns the closest value accepted by `filter` that lies strictly
    /// inside the search radius, along with its squared distance. Ties go to
    /// the value inserted first within a cell.
    pub fn find(&self, point: Point, filter: impl Fn(&T) -> bool) -> Option<(T, f64)> {
        let (cx, cy) = self.cell(point);
        let limit = self.radius as f64 * self.radius as f64;

        let mut best: Option<(T, f64)> = None;
        for y in cy - 1..=cy + 1 {
            for x in cx - 1..=cx + 1 {
                let Some(cell) = self.cells.get(&(x, y)) else {
                    continue;
                };

                for (other, value) in cell.iter().filter(|(_, value)| filter(value)) {
                    let distance = distance_squared(point, *other);
                    if distance < limit && best.map_or(true, |(_, min)| distance < min) {
                        best = Some((*value, distance));
                    }
                }
            }
        }

        best
    }
}

use super::{Point, Polygon};

/// A counter-clockwise outer contour with any number of clockwise holes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExPolygon {
    pub contour: Polygon,
    pub holes: Vec<Polygon>,
}

impl ExPolygon {
    pub fn new(contour: Polygon, holes: Vec<Polygon>) -> Self {
        Self { contour, holes }
    }

    /// Contour area minus the area of the holes, in scaled units squared.
    pub fn area(&self) -> f64 {
        self.contour.area().abs() - self.holes.iter().map(|x| x.area().abs()).sum::<f64>()
    }

    pub fn area_mm(&self) -> f64 {
        self.contour.area_mm().abs() - self.holes.iter().map(|x| x.area_mm().abs()).sum::<f64>()
    }

    pub fn contains(&self, point: Point) -> bool {
        self.contour.contains(point) && !self.holes.iter().any(|x| x.contains(point))
    }

    /// Iterates over the contour followed by the holes.
    pub fn polygons(&self) -> impl Iterator<Item = &Polygon> {
        std::iter::once(&self.contour).chain(self.holes.iter())
    }

    pub fn point_count(&self) -> usize {
        self.polygons().map(|x| x.len()).sum()
    }

    /// Simplifies every loop, dropping holes that collapse. Returns `None` if
    /// the contour itself collapses.
    pub fn simplify(&self, tolerance: f64) -> Option<ExPolygon> {
        let contour = self.contour.simplify(tolerance)?;
        let holes = self
            .holes
            .iter()
            .filter_map(|x| x.simplify(tolerance))
            .collect();
        Some(ExPolygon::new(contour, holes))
    }
}

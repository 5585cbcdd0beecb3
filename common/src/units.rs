//! Conversions between millimetres and the scaled integer coordinate space
//! used for all 2D slice geometry.

/// Integer coordinate in scaled units.
pub type Coord = i64;

/// Millimetres per scaled unit, so one unit is a nanometre.
pub const SCALING_FACTOR: f64 = 0.000_001;

/// Converts millimetres into (unrounded) scaled units.
#[inline]
pub fn scaled(mm: f64) -> f64 {
    mm / SCALING_FACTOR
}

/// Converts millimetres into scaled units, rounding half up.
#[inline]
pub fn scale(mm: f64) -> Coord {
    round_half_up(scaled(mm))
}

/// Converts scaled units back into millimetres.
#[inline]
pub fn unscale(coord: Coord) -> f64 {
    coord as f64 * SCALING_FACTOR
}

/// Rounds an already scaled value onto the integer grid. Every point that
/// ends up in a slice goes through here, which is what keeps two facets
/// sharing an edge in agreement about where that edge crosses a plane.
#[inline]
pub fn round_half_up(value: f64) -> Coord {
    (value + 0.5).floor() as Coord
}

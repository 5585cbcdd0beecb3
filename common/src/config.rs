use std::f32::consts::PI;

use nalgebra::{UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};

/// How the chained loops of a layer are turned into filled regions.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SlicingMode {
    /// Loops keep the orientation they were chained with, clockwise loops
    /// become holes.
    #[default]
    Regular,
    /// Every loop is made counter-clockwise, closing all holes.
    Positive,
    /// Only the loop with the largest area survives, made counter-clockwise.
    PositiveLargestContour,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(default)]
pub struct MeshSlicingParams {
    pub mode: SlicingMode,
    /// Mode used for layers with an index below
    /// `slicing_mode_normal_below_layer`.
    pub mode_below: SlicingMode,
    pub slicing_mode_normal_below_layer: usize,

    /// Grow-then-shrink distance in mm, merges nearly touching loops.
    pub closing_radius: f32,
    /// Additional grow (or shrink if negative) distance in mm.
    pub extra_offset: f32,
    /// Simplification tolerance in mm, zero disables simplification.
    pub resolution: f32,

    /// Direction that should be treated as up while slicing.
    pub up: Option<Vector3<f32>>,
}

impl MeshSlicingParams {
    pub fn mode(&self, layer: usize) -> SlicingMode {
        if layer < self.slicing_mode_normal_below_layer {
            self.mode_below
        } else {
            self.mode
        }
    }

    /// Checks the parameters, returning a description of the first invalid
    /// value found.
    pub fn validate(&self) -> Result<(), String> {
        if !self.closing_radius.is_finite() || self.closing_radius < 0.0 {
            return Err(format!("invalid closing radius {}", self.closing_radius));
        }

        if !self.extra_offset.is_finite() {
            return Err(format!("invalid extra offset {}", self.extra_offset));
        }

        if !self.resolution.is_finite() || self.resolution < 0.0 {
            return Err(format!("invalid resolution {}", self.resolution));
        }

        if let Some(up) = self.up {
            let norm = up.norm();
            if !norm.is_finite() || norm == 0.0 {
                return Err(format!("invalid up direction {up:?}"));
            }
        }

        Ok(())
    }

    /// Rotation that takes the configured up direction onto +Z.
    pub fn up_rotation(&self) -> Option<UnitQuaternion<f32>> {
        self.up.map(|up| {
            UnitQuaternion::rotation_between(&up, &Vector3::z())
                .unwrap_or_else(|| UnitQuaternion::from_axis_angle(&Vector3::x_axis(), PI))
        })
    }
}

impl Default for MeshSlicingParams {
    fn default() -> Self {
        Self {
            mode: SlicingMode::Regular,
            mode_below: SlicingMode::Regular,
            slicing_mode_normal_below_layer: 0,

            closing_radius: 0.049,
            extra_offset: 0.0,
            resolution: 0.0,

            up: None,
        }
    }
}

//! Per-frame evaluation result: camera pose, parameter table and flags.

use serde::{Deserialize, Serialize};

use crate::interp::{lerp_array, lerp_f32, slerp_quat};
use crate::params::{OverrideFilter, ParameterTable};

pub const DEFAULT_FIELD_OF_VIEW: f32 = 90.0;

/// Camera transform plus lens data.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct CameraPose {
    pub position: [f32; 3],
    /// Quaternion (x, y, z, w)
    pub rotation: [f32; 4],
    /// Horizontal field of view in degrees.
    pub field_of_view: f32,
}

impl Default for CameraPose {
    fn default() -> Self {
        Self {
            position: [0.0; 3],
            rotation: [0.0, 0.0, 0.0, 1.0],
            field_of_view: DEFAULT_FIELD_OF_VIEW,
        }
    }
}

impl CameraPose {
    pub fn at(position: [f32; 3]) -> Self {
        Self {
            position,
            ..Self::default()
        }
    }

    /// Position and fov lerp, rotation slerp.
    pub fn lerp(&self, to: &CameraPose, t: f32) -> CameraPose {
        CameraPose {
            position: lerp_array(&self.position, &to.position, t),
            rotation: slerp_quat(self.rotation, to.rotation, t),
            field_of_view: lerp_f32(self.field_of_view, to.field_of_view, t),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EvalResult {
    pub pose: CameraPose,
    pub params: ParameterTable,
    /// The pose jumped this frame; consumers should not interpolate across it.
    pub is_cut: bool,
    pub is_valid: bool,
}

impl Default for EvalResult {
    fn default() -> Self {
        Self {
            pose: CameraPose::default(),
            params: ParameterTable::new(),
            is_cut: false,
            is_valid: false,
        }
    }
}

impl EvalResult {
    pub fn reset(&mut self) {
        self.pose = CameraPose::default();
        self.params.clear();
        self.is_cut = false;
        self.is_valid = false;
    }

    /// Overwrite this result with `other`.
    pub fn override_from(&mut self, other: &EvalResult) {
        self.pose = other.pose;
        self.params.override_all(&other.params, false);
        self.is_cut |= other.is_cut;
        self.is_valid |= other.is_valid;
    }

    /// Blend `other` over this result by `factor`.
    pub fn lerp_from(&mut self, other: &EvalResult, factor: f32) {
        if !self.is_valid {
            // Nothing underneath to blend from.
            self.override_from(other);
            return;
        }
        self.pose = self.pose.lerp(&other.pose, factor);
        self.params.lerp(&other.params, factor, OverrideFilter::None);
        self.is_cut |= other.is_cut;
        self.is_valid |= other.is_valid;
    }
}

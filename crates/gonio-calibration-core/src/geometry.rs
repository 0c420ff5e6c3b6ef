//! Single-frame detector geometry and the goniometer transformation.

use serde::{Deserialize, Serialize};

use crate::params::CalibrationParameters;
use crate::{Length, Real};

/// Detector geometry of a single frame, in the PONI convention.
///
/// `poni1` is along the slow (row) axis, `poni2` along the fast (column)
/// axis. Rotations are in radians.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PoniGeometry {
    pub dist: Length,
    pub poni1: Length,
    pub poni2: Length,
    pub rot1: Real,
    pub rot2: Real,
    pub rot3: Real,
}

impl PoniGeometry {
    /// Values as `[dist, poni1, poni2, rot1, rot2, rot3]`.
    pub fn to_array(&self) -> [Real; 6] {
        [
            self.dist, self.poni1, self.poni2, self.rot1, self.rot2, self.rot3,
        ]
    }
}

/// Maps goniometer parameters and a motor position to a frame geometry.
///
/// ```text
/// dist  = distance
/// poni1 = position * poni1_scale + poni1_offset
/// poni2 = position * poni2_scale + poni2_offset
/// rotN  = rotN
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GeometryTransformation;

impl GeometryTransformation {
    pub fn apply(&self, params: &CalibrationParameters, position: Real) -> PoniGeometry {
        Self::apply_values(&params.values(), position)
    }

    /// Same as [`apply`](Self::apply) on raw positional values.
    pub fn apply_values(values: &[Real; 8], position: Real) -> PoniGeometry {
        let [distance, poni1_offset, poni1_scale, poni2_offset, poni2_scale, rot1, rot2, rot3] =
            *values;
        PoniGeometry {
            dist: distance,
            poni1: position * poni1_scale + poni1_offset,
            poni2: position * poni2_scale + poni2_offset,
            rot1,
            rot2,
            rot3,
        }
    }
}

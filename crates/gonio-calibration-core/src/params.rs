//! Goniometer model parameters.
//!
//! The refinement engine consumes parameters positionally, so the order of
//! [`PARAM_NAMES`] is part of the contract.

use anyhow::{Result, ensure};
use serde::{Deserialize, Serialize};

use crate::Real;

/// Parameter names in the order the refinement engine expects them.
pub const PARAM_NAMES: [&str; 8] = [
    "distance",
    "poni1_offset",
    "poni1_scale",
    "poni2_offset",
    "poni2_scale",
    "rot1",
    "rot2",
    "rot3",
];

/// A single bounded parameter.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    pub value: Real,
    /// Inclusive `(min, max)` bounds.
    pub bounds: (Real, Real),
}

impl Parameter {
    pub fn new(value: Real, min: Real, max: Real) -> Self {
        Self {
            value,
            bounds: (min, max),
        }
    }

    /// A parameter with no effective bounds.
    pub fn free(value: Real) -> Self {
        Self::new(value, Real::NEG_INFINITY, Real::INFINITY)
    }

    /// A parameter pinned to its value.
    pub fn fixed(value: Real) -> Self {
        Self::new(value, value, value)
    }

    pub fn contains(&self, value: Real) -> bool {
        self.bounds.0 <= value && value <= self.bounds.1
    }
}

/// Initial guess and bounds of the goniometer geometry transformation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationParameters {
    pub distance: Parameter,
    pub poni1_offset: Parameter,
    pub poni1_scale: Parameter,
    pub poni2_offset: Parameter,
    pub poni2_scale: Parameter,
    pub rot1: Parameter,
    pub rot2: Parameter,
    pub rot3: Parameter,
}

impl CalibrationParameters {
    /// Parameter names, in engine order.
    pub fn names() -> [&'static str; 8] {
        PARAM_NAMES
    }

    /// Parameters in engine order.
    pub fn as_array(&self) -> [&Parameter; 8] {
        [
            &self.distance,
            &self.poni1_offset,
            &self.poni1_scale,
            &self.poni2_offset,
            &self.poni2_scale,
            &self.rot1,
            &self.rot2,
            &self.rot3,
        ]
    }

    /// `(name, parameter)` pairs in engine order.
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &Parameter)> {
        PARAM_NAMES.into_iter().zip(self.as_array())
    }

    pub fn values(&self) -> [Real; 8] {
        self.as_array().map(|p| p.value)
    }

    pub fn bounds(&self) -> [(Real, Real); 8] {
        self.as_array().map(|p| p.bounds)
    }

    /// Replace values positionally, keeping the bounds.
    pub fn with_values(&self, values: [Real; 8]) -> Self {
        let mut out = self.clone();
        let params = [
            &mut out.distance,
            &mut out.poni1_offset,
            &mut out.poni1_scale,
            &mut out.poni2_offset,
            &mut out.poni2_scale,
            &mut out.rot1,
            &mut out.rot2,
            &mut out.rot3,
        ];
        for (param, value) in params.into_iter().zip(values) {
            param.value = value;
        }
        out
    }

    /// Look a parameter up by name.
    pub fn get(&self, name: &str) -> Option<&Parameter> {
        self.iter().find(|(n, _)| *n == name).map(|(_, p)| p)
    }

    /// Check that every bound is ordered and every value lies within it.
    pub fn validate(&self) -> Result<()> {
        for (name, param) in self.iter() {
            let (min, max) = param.bounds;
            ensure!(
                !param.value.is_nan(),
                "parameter {name} has a NaN value"
            );
            ensure!(min <= max, "parameter {name} has inverted bounds [{min}, {max}]");
            ensure!(
                param.contains(param.value),
                "parameter {name} = {} lies outside [{min}, {max}]",
                param.value
            );
        }
        Ok(())
    }
}

impl Default for CalibrationParameters {
    fn default() -> Self {
        Self {
            distance: Parameter::new(0.1, 0.05, 0.5),
            poni1_offset: Parameter::new(0.0, -0.5, 0.5),
            poni1_scale: Parameter::new(0.0, -1.0, 1.0),
            poni2_offset: Parameter::new(0.0, -0.5, 0.5),
            poni2_scale: Parameter::new(0.0, -1.0, 1.0),
            rot1: Parameter::new(0.0, -0.1, 0.1),
            rot2: Parameter::new(0.0, -0.1, 0.1),
            rot3: Parameter::new(0.0, -0.1, 0.1),
        }
    }
}

//! [`ProblemType`] implementation for goniometer calibration.

use std::path::PathBuf;

use anyhow::{Context, Result, ensure};
use gonio_calibration_core::{Calibration, CalibrationParameters, Detector, Real};
use serde::{Deserialize, Serialize};

use crate::session::{InvalidationPolicy, ProblemType};

use super::state::GoniometerState;

/// Multi-frame goniometer calibration problem.
#[derive(Debug)]
pub struct GoniometerProblem;

/// The calibration job is the session input.
pub type GoniometerInput = Calibration;

/// Run options for goniometer calibration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GoniometerConfig {
    /// Control-point density for frames added by an extension pass, in
    /// points per degree of ring.
    pub pts_per_deg: Real,
    /// `.D` d-spacing files registered before the calibrant lookup.
    pub calibrant_files: Vec<PathBuf>,
    /// Detector definitions added to the built-in table.
    pub detectors: Vec<Detector>,
}

impl Default for GoniometerConfig {
    fn default() -> Self {
        Self {
            pts_per_deg: 1.0,
            calibrant_files: Vec::new(),
            detectors: Vec::new(),
        }
    }
}

/// Refined goniometer model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoniometerOutput {
    /// Refined values with the job's bounds.
    pub parameters: CalibrationParameters,
    /// Geometries the refinement ran over.
    pub num_geometries: usize,
    pub cost: Option<Real>,
}

pub type GoniometerExport = GoniometerOutput;

impl ProblemType for GoniometerProblem {
    type Config = GoniometerConfig;
    type Input = GoniometerInput;
    type State = GoniometerState;
    type Output = GoniometerOutput;
    type Export = GoniometerExport;

    fn name() -> &'static str {
        "goniometer_v1"
    }

    fn validate_input(input: &Self::Input) -> Result<()> {
        input.validate().context("invalid calibration job")
    }

    fn validate_config(config: &Self::Config) -> Result<()> {
        ensure!(
            config.pts_per_deg.is_finite() && config.pts_per_deg > 0.0,
            "pts_per_deg must be positive (got {})",
            config.pts_per_deg
        );
        Ok(())
    }

    fn on_input_change() -> InvalidationPolicy {
        InvalidationPolicy::CLEAR_COMPUTED
    }

    fn export(output: &Self::Output, _config: &Self::Config) -> Result<Self::Export> {
        Ok(output.clone())
    }
}

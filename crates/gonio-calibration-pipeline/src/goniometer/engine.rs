//! Interface to the goniometer refinement engine.
//!
//! The engine owns the single-frame geometries and the global least-squares
//! fit. The driver only decides which frames go in, in which order, and when
//! to refine or save.

use std::path::Path;

use anyhow::Result;
use gonio_calibration_core::{
    Calibrant, CalibrationFrame, CalibrationParameters, ControlPointSet, Detector,
    GeometryTransformation, PARAM_NAMES, PoniGeometry, Real, Wavelength,
};
use serde::{Deserialize, Serialize};

/// Everything the engine needs before the first geometry is registered.
///
/// Arrays are in [`PARAM_NAMES`] order.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineSetup {
    pub param_names: [&'static str; 8],
    /// Initial guess.
    pub parameters: [Real; 8],
    pub bounds: [(Real, Real); 8],
    pub detector: Detector,
    /// Wavelength in metres.
    pub wavelength: Wavelength,
}

impl EngineSetup {
    pub fn new(
        parameters: &CalibrationParameters,
        detector: Detector,
        wavelength: Wavelength,
    ) -> Self {
        Self {
            param_names: PARAM_NAMES,
            parameters: parameters.values(),
            bounds: parameters.bounds(),
            detector,
            wavelength,
        }
    }
}

/// Engine-issued identifier of a registered single-frame geometry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GeometryHandle(pub usize);

/// Result of one global refinement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefinementReport {
    /// Refined values in [`PARAM_NAMES`] order.
    pub values: [Real; 8],
    /// Final cost, if the engine reports one.
    pub cost: Option<Real>,
}

/// Goniometer refinement engine.
///
/// Implementations keep registered geometries in registration order; the
/// driver never registers the same label twice.
pub trait RefinementEngine {
    /// Reset the engine to the given initial model.
    fn configure(&mut self, setup: &EngineSetup) -> Result<()>;

    /// Add a single-frame geometry.
    ///
    /// `control_points` and `geometry` are the pre-fitted solution for seeded
    /// frames. Extended frames pass no control points and the current model
    /// prediction as `geometry`.
    fn register_geometry(
        &mut self,
        label: &str,
        frame: &CalibrationFrame,
        control_points: Option<&ControlPointSet>,
        calibrant: &Calibrant,
        geometry: Option<&PoniGeometry>,
    ) -> Result<GeometryHandle>;

    /// Pick control points on the rings of a registered frame.
    ///
    /// Returns the number of points extracted.
    fn extract_control_points(
        &mut self,
        handle: GeometryHandle,
        pts_per_deg: Real,
    ) -> Result<usize>;

    /// Refine the global model over every registered geometry.
    fn refine(&mut self) -> Result<RefinementReport>;

    /// Current model values in [`PARAM_NAMES`] order.
    fn parameters(&self) -> [Real; 8];

    /// Single-frame geometry the current model predicts at `position`.
    fn geometry_at(&self, position: Real) -> PoniGeometry {
        GeometryTransformation::apply_values(&self.parameters(), position)
    }

    /// Persist the model to `destination`, replacing any existing file.
    fn save(&self, destination: &Path) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use gonio_calibration_core::Parameter;

    #[test]
    fn setup_keeps_parameter_order() {
        let mut params = CalibrationParameters::default();
        params.poni2_scale = Parameter::new(0.002, -0.01, 0.01);
        let detector = Detector::new("Xpad S540 flat", 130e-6, (960, 560));

        let setup = EngineSetup::new(&params, detector, 0.6888e-10);
        assert_eq!(setup.param_names[4], "poni2_scale");
        assert_eq!(setup.parameters[4], 0.002);
        assert_eq!(setup.bounds[4], (-0.01, 0.01));
        assert_eq!(setup.parameters, params.values());
    }
}

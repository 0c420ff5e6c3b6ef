//! Multi-frame goniometer calibration.
//!
//! Seeds an external refinement engine with pre-fitted single-frame
//! geometries, refines the goniometer model, extends it with every remaining
//! frame of the scan and saves it.

mod engine;
mod problem;
mod state;
mod steps;

pub use engine::{EngineSetup, GeometryHandle, RefinementEngine, RefinementReport};
pub use problem::{
    GoniometerConfig, GoniometerExport, GoniometerInput, GoniometerOutput, GoniometerProblem,
};
pub use state::{
    DriverPhase, FramePrediction, GeometryOrigin, GeometryRegistry, GoniometerState,
    RegisteredGeometry,
};
pub use steps::{
    ExtendOptions, ExtendProgress, predicted_geometries, run_calibration, step_extend,
    step_extend_with_progress, step_refine, step_resume, step_save, step_seed, step_setup,
};

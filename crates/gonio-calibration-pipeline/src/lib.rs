//! Goniometer calibration pipeline.
//!
//! ## Session API
//!
//! A [`CalibrationSession`] holds the calibration job, configuration and
//! driver state; step functions advance it against a [`RefinementEngine`].
//!
//! ```no_run
//! use gonio_calibration_core::Calibration;
//! use gonio_calibration_pipeline::{
//!     CalibrationSession, GoniometerProblem, RefinementEngine, step_extend, step_refine,
//!     step_save, step_seed, step_setup,
//! };
//! # fn main() -> anyhow::Result<()> {
//! # let mut engine: Box<dyn RefinementEngine> = unimplemented!();
//!
//! let job = Calibration::from_json_file("job.json")?;
//! let mut session = CalibrationSession::<GoniometerProblem>::with_input(job)?;
//!
//! // Option 1: Step-by-step control
//! step_setup(&mut session, engine.as_mut())?;
//! step_seed(&mut session, engine.as_mut())?;
//! step_refine(&mut session, engine.as_mut())?;
//! step_extend(&mut session, engine.as_mut(), None)?;
//! step_save(&mut session, engine.as_mut(), "gonio.json".as_ref())?;
//!
//! // Option 2: Pipeline function
//! // run_calibration(&mut session, engine.as_mut(), "gonio.json".as_ref())?;
//!
//! let export = session.export()?;
//! # Ok(())
//! # }
//! ```

// Core session framework
pub mod session;

// Problem-specific modules
pub mod goniometer;

// ─────────────────────────────────────────────────────────────────────────────
// Session API Re-exports
// ─────────────────────────────────────────────────────────────────────────────

pub use crate::session::{
    CalibrationSession, ExportRecord, InvalidationPolicy, LogEntry, ProblemType, SessionMetadata,
};

pub use crate::goniometer::{
    DriverPhase, EngineSetup, ExtendOptions, ExtendProgress, GeometryHandle, GeometryRegistry,
    GoniometerConfig, GoniometerExport, GoniometerOutput, GoniometerProblem, GoniometerState,
    RefinementEngine, RefinementReport, run_calibration, step_extend, step_extend_with_progress,
    step_refine, step_resume, step_save, step_seed, step_setup,
};

//! Calibration session framework.
//!
//! A [`CalibrationSession`] is a mutable container parameterised by a
//! [`ProblemType`]: it stores the job input, configuration, intermediate state
//! and the final output, and step functions mutate it in place.
//!
//! ```no_run
//! use gonio_calibration_core::Calibration;
//! use gonio_calibration_pipeline::goniometer::{
//!     GoniometerProblem, RefinementEngine, step_extend, step_refine, step_save, step_seed,
//!     step_setup,
//! };
//! use gonio_calibration_pipeline::session::CalibrationSession;
//! # fn main() -> anyhow::Result<()> {
//! # let mut engine: Box<dyn RefinementEngine> = unimplemented!();
//!
//! let job = Calibration::from_json_file("job.json")?;
//! let mut session = CalibrationSession::<GoniometerProblem>::with_input(job)?;
//!
//! step_setup(&mut session, engine.as_mut())?;
//! step_seed(&mut session, engine.as_mut())?;
//! step_refine(&mut session, engine.as_mut())?;
//! step_extend(&mut session, engine.as_mut(), None)?;
//! step_save(&mut session, engine.as_mut(), "gonio.json".as_ref())?;
//! # Ok(())
//! # }
//! ```

pub mod calibsession;
pub mod problem_type;
pub mod types;

pub use calibsession::CalibrationSession;
pub use problem_type::{InvalidationPolicy, ProblemType};
pub use types::{ExportRecord, LogEntry, SessionMetadata, current_timestamp};

//! Problem type trait for calibration sessions.
//!
//! A problem type names the associated data a
//! [`CalibrationSession`](super::CalibrationSession) stores and the hooks the
//! session calls when that data changes.

use std::fmt::Debug;

use anyhow::Result;
use serde::{Serialize, de::DeserializeOwned};

/// What to clear when the session input or config is replaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidationPolicy {
    /// Reset the problem-specific state to its default.
    pub clear_state: bool,
    /// Drop the final output.
    pub clear_output: bool,
    /// Drop all export records.
    pub clear_exports: bool,
}

impl InvalidationPolicy {
    /// Clear nothing.
    pub const KEEP_ALL: Self = Self {
        clear_state: false,
        clear_output: false,
        clear_exports: false,
    };

    /// Clear state and output, keep exports.
    pub const CLEAR_COMPUTED: Self = Self {
        clear_state: true,
        clear_output: true,
        clear_exports: false,
    };

    /// Clear everything.
    pub const CLEAR_ALL: Self = Self {
        clear_state: true,
        clear_output: true,
        clear_exports: true,
    };
}

impl Default for InvalidationPolicy {
    fn default() -> Self {
        Self::KEEP_ALL
    }
}

/// Interface of a calibration problem.
///
/// Behaviour lives in step functions taking `&mut CalibrationSession<Self>`;
/// the trait only fixes the data layout and validation hooks.
///
/// # Associated Types
///
/// - **Config**: run options (point density, extra calibrant files).
/// - **Input**: the job description.
/// - **State**: driver phase, registered geometries, lookups.
/// - **Output**: the refined model.
/// - **Export**: user-facing form of the output.
///
/// # Example
///
/// ```ignore
/// pub struct MyProblem;
///
/// impl ProblemType for MyProblem {
///     type Config = MyConfig;
///     type Input = MyJob;
///     type State = MyState;
///     type Output = MyModel;
///     type Export = MyModel;
///
///     fn name() -> &'static str { "my_problem" }
///
///     fn export(output: &Self::Output, _config: &Self::Config) -> Result<Self::Export> {
///         Ok(output.clone())
///     }
/// }
/// ```
pub trait ProblemType: Sized + 'static {
    /// Run options. `Default` gives a usable configuration.
    type Config: Clone + Default + Serialize + DeserializeOwned + Debug;

    /// Input data embedded in the session.
    type Input: Clone + Serialize + DeserializeOwned + Debug;

    /// Intermediate results. Use `()` if none are needed.
    type State: Clone + Default + Serialize + DeserializeOwned + Debug;

    /// Final result.
    type Output: Clone + Serialize + DeserializeOwned + Debug;

    /// Export format for downstream consumers; may equal `Output`.
    type Export: Clone + Serialize + DeserializeOwned + Debug;

    // ─────────────────────────────────────────────────────────────────────────
    // Identity
    // ─────────────────────────────────────────────────────────────────────────

    /// Stable snake_case identifier, stored in session metadata.
    fn name() -> &'static str;

    /// Schema version of the serialized session.
    ///
    /// Sessions written with a newer version are rejected on load.
    fn schema_version() -> u32 {
        1
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Validation Hooks
    // ─────────────────────────────────────────────────────────────────────────

    /// Called by [`CalibrationSession::set_input`](super::CalibrationSession::set_input).
    fn validate_input(_input: &Self::Input) -> Result<()> {
        Ok(())
    }

    /// Called by [`CalibrationSession::set_config`](super::CalibrationSession::set_config).
    fn validate_config(_config: &Self::Config) -> Result<()> {
        Ok(())
    }

    /// Cross-check input and config, called by
    /// [`CalibrationSession::validate`](super::CalibrationSession::validate).
    fn validate_input_config(_input: &Self::Input, _config: &Self::Config) -> Result<()> {
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Invalidation
    // ─────────────────────────────────────────────────────────────────────────

    /// Default: clear state and output, keep exports.
    fn on_input_change() -> InvalidationPolicy {
        InvalidationPolicy::CLEAR_COMPUTED
    }

    /// Default: keep everything.
    fn on_config_change() -> InvalidationPolicy {
        InvalidationPolicy::KEEP_ALL
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Export
    // ─────────────────────────────────────────────────────────────────────────

    /// Convert the output to its export form.
    fn export(output: &Self::Output, config: &Self::Config) -> Result<Self::Export>;
}

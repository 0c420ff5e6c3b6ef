//! Calibration session container.
//!
//! A session owns the job input, the run configuration, the driver state and
//! the latest output. Step functions mutate it in place; between steps it can
//! be checkpointed to JSON.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow, bail};
use serde::{Deserialize, Serialize};

use super::problem_type::{InvalidationPolicy, ProblemType};
use super::types::{ExportRecord, LogEntry, SessionMetadata};

/// Calibration session with mutable state.
///
/// - Only one output is kept; each refinement replaces it.
/// - Input is embedded and validated on `set_input`.
/// - Config changes follow [`ProblemType::on_config_change`].
/// - Exports accumulate until cleared.
///
/// # Example
///
/// ```no_run
/// use gonio_calibration_core::Calibration;
/// use gonio_calibration_pipeline::goniometer::{GoniometerProblem, RefinementEngine, run_calibration};
/// use gonio_calibration_pipeline::session::CalibrationSession;
/// # fn main() -> anyhow::Result<()> {
/// # let mut engine: Box<dyn RefinementEngine> = unimplemented!();
///
/// let job = Calibration::from_json_file("job.json")?;
/// let mut session = CalibrationSession::<GoniometerProblem>::with_input(job)?;
/// run_calibration(&mut session, engine.as_mut(), "gonio.json".as_ref())?;
/// session.save_checkpoint("session.json")?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(bound = "P: ProblemType")]
pub struct CalibrationSession<P: ProblemType> {
    pub metadata: SessionMetadata,

    /// Always present; defaults until set.
    pub config: P::Config,

    input: Option<P::Input>,

    pub state: P::State,

    output: Option<P::Output>,

    pub exports: Vec<ExportRecord<P::Export>>,

    /// Audit trail of step successes and failures.
    pub log: Vec<LogEntry>,
}

impl<P: ProblemType> CalibrationSession<P> {
    // ─────────────────────────────────────────────────────────────────────────
    // Construction
    // ─────────────────────────────────────────────────────────────────────────

    pub fn new() -> Self {
        Self::from_metadata(SessionMetadata::new(P::name(), P::schema_version()))
    }

    /// New session holding `input`.
    ///
    /// # Errors
    ///
    /// Fails if [`ProblemType::validate_input`] rejects the input.
    pub fn with_input(input: P::Input) -> Result<Self> {
        let mut session = Self::new();
        session.set_input(input)?;
        Ok(session)
    }

    fn from_metadata(metadata: SessionMetadata) -> Self {
        Self {
            metadata,
            config: P::Config::default(),
            input: None,
            state: P::State::default(),
            output: None,
            exports: Vec::new(),
            log: Vec::new(),
        }
    }

    fn invalidate(&mut self, policy: InvalidationPolicy) {
        if policy.clear_state {
            self.state = P::State::default();
        }
        if policy.clear_output {
            self.output = None;
        }
        if policy.clear_exports {
            self.exports.clear();
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Input
    // ─────────────────────────────────────────────────────────────────────────

    /// Replace the input after validating it.
    pub fn set_input(&mut self, input: P::Input) -> Result<()> {
        P::validate_input(&input)?;
        self.invalidate(P::on_input_change());
        self.input = Some(input);
        self.metadata.touch();
        Ok(())
    }

    pub fn input(&self) -> Option<&P::Input> {
        self.input.as_ref()
    }

    /// The input, or an error if none is set.
    pub fn require_input(&self) -> Result<&P::Input> {
        self.input.as_ref().ok_or_else(|| anyhow!("input not set"))
    }

    pub fn has_input(&self) -> bool {
        self.input.is_some()
    }

    pub fn clear_input(&mut self) {
        self.invalidate(P::on_input_change());
        self.input = None;
        self.metadata.touch();
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Configuration
    // ─────────────────────────────────────────────────────────────────────────

    /// Replace the config after validating it.
    pub fn set_config(&mut self, config: P::Config) -> Result<()> {
        P::validate_config(&config)?;
        self.invalidate(P::on_config_change());
        self.config = config;
        self.metadata.touch();
        Ok(())
    }

    /// Edit a copy of the config and apply it through [`set_config`](Self::set_config).
    pub fn update_config<F>(&mut self, f: F) -> Result<()>
    where
        F: FnOnce(&mut P::Config),
    {
        let mut config = self.config.clone();
        f(&mut config);
        self.set_config(config)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Output
    // ─────────────────────────────────────────────────────────────────────────

    pub fn output(&self) -> Option<&P::Output> {
        self.output.as_ref()
    }

    /// The output, or an error if nothing has been computed.
    pub fn require_output(&self) -> Result<&P::Output> {
        self.output
            .as_ref()
            .ok_or_else(|| anyhow!("output not computed"))
    }

    pub fn set_output(&mut self, output: P::Output) {
        self.output = Some(output);
        self.metadata.touch();
    }

    pub fn has_output(&self) -> bool {
        self.output.is_some()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Export
    // ─────────────────────────────────────────────────────────────────────────

    /// Export the output and store an [`ExportRecord`].
    pub fn export(&mut self) -> Result<P::Export> {
        let export = self.export_peek()?;
        self.exports.push(ExportRecord::new(export.clone()));
        self.metadata.touch();
        Ok(export)
    }

    /// Export without storing a record.
    pub fn export_peek(&self) -> Result<P::Export> {
        P::export(self.require_output()?, &self.config)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Validation
    // ─────────────────────────────────────────────────────────────────────────

    /// Check that input is set and that input and config pass every hook.
    pub fn validate(&self) -> Result<()> {
        let input = self.require_input()?;
        P::validate_input(input)?;
        P::validate_config(&self.config)?;
        P::validate_input_config(input, &self.config)?;
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Logging
    // ─────────────────────────────────────────────────────────────────────────

    pub fn log_success(&mut self, operation: impl Into<String>) {
        self.log.push(LogEntry::success(operation));
        self.metadata.touch();
    }

    pub fn log_success_with_notes(
        &mut self,
        operation: impl Into<String>,
        notes: impl Into<String>,
    ) {
        self.log
            .push(LogEntry::success_with_notes(operation, notes));
        self.metadata.touch();
    }

    pub fn log_failure(&mut self, operation: impl Into<String>, error: impl Into<String>) {
        self.log.push(LogEntry::failure(operation, error));
        self.metadata.touch();
    }

    /// Pass `result` through, logging it as a failure of `operation` if it is one.
    pub fn record_failure<T>(&mut self, operation: &str, result: Result<T>) -> Result<T> {
        if let Err(err) = &result {
            log::warn!("{operation} failed: {err:#}");
            self.log_failure(operation, format!("{err:#}"));
        }
        result
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Reset
    // ─────────────────────────────────────────────────────────────────────────

    /// Reset state to default, keeping input, config and output.
    pub fn reset_state(&mut self) {
        self.state = P::State::default();
        self.metadata.touch();
    }

    /// Reset everything except config and metadata.
    pub fn reset(&mut self) {
        self.input = None;
        self.state = P::State::default();
        self.output = None;
        self.exports.clear();
        self.log.clear();
        self.metadata.touch();
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Serialization
    // ─────────────────────────────────────────────────────────────────────────

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(Into::into)
    }

    /// Deserialize a session.
    ///
    /// # Errors
    ///
    /// Fails on malformed JSON, on a session of another problem type, or on a
    /// schema version newer than this build supports.
    pub fn from_json(json: &str) -> Result<Self> {
        let session: Self = serde_json::from_str(json)?;

        if session.metadata.problem_type != P::name() {
            bail!(
                "session was written for problem type {:?}, expected {:?}",
                session.metadata.problem_type,
                P::name()
            );
        }
        if session.metadata.schema_version > P::schema_version() {
            bail!(
                "session schema version {} is newer than supported version {}",
                session.metadata.schema_version,
                P::schema_version()
            );
        }

        Ok(session)
    }

    /// Write the session as pretty JSON to `path`.
    pub fn save_checkpoint(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        fs::write(path, self.to_json()?)
            .with_context(|| format!("failed to write checkpoint {}", path.display()))?;
        log::debug!("checkpoint written to {}", path.display());
        Ok(())
    }

    pub fn load_checkpoint(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = fs::read_to_string(path)
            .with_context(|| format!("failed to read checkpoint {}", path.display()))?;
        Self::from_json(&json).with_context(|| format!("invalid checkpoint {}", path.display()))
    }
}

impl<P: ProblemType> Default for CalibrationSession<P> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};

    // ─────────────────────────────────────────────────────────────────────────
    // Toy problem: average a list of angles
    // ─────────────────────────────────────────────────────────────────────────

    #[derive(Clone, Debug, Default, Serialize, Deserialize)]
    struct ToyConfig {
        step: f64,
    }

    #[derive(Clone, Debug, Serialize, Deserialize)]
    struct ToyInput {
        angles: Vec<f64>,
    }

    #[derive(Clone, Debug, Default, Serialize, Deserialize)]
    struct ToyState {
        visited: usize,
    }

    #[derive(Clone, Debug, Serialize, Deserialize)]
    struct ToyOutput {
        mean: f64,
    }

    #[derive(Debug)]
    struct ToyProblem;

    impl ProblemType for ToyProblem {
        type Config = ToyConfig;
        type Input = ToyInput;
        type State = ToyState;
        type Output = ToyOutput;
        type Export = f64;

        fn name() -> &'static str {
            "toy"
        }

        fn validate_input(input: &Self::Input) -> Result<()> {
            anyhow::ensure!(!input.angles.is_empty(), "no angles");
            Ok(())
        }

        fn validate_config(config: &Self::Config) -> Result<()> {
            anyhow::ensure!(config.step >= 0.0, "step must not be negative");
            Ok(())
        }

        fn export(output: &Self::Output, _config: &Self::Config) -> Result<Self::Export> {
            Ok(output.mean)
        }
    }

    fn toy_session() -> CalibrationSession<ToyProblem> {
        CalibrationSession::with_input(ToyInput {
            angles: vec![1.0, 2.0, 3.0],
        })
        .unwrap()
    }

    #[test]
    fn new_session_is_empty() {
        let session = CalibrationSession::<ToyProblem>::new();
        assert_eq!(session.metadata.problem_type, "toy");
        assert!(!session.has_input());
        assert!(!session.has_output());
        assert!(session.log.is_empty());
        assert!(session.require_input().is_err());
        assert!(
            session
                .require_output()
                .unwrap_err()
                .to_string()
                .contains("output not computed")
        );
    }

    #[test]
    fn invalid_input_is_rejected() {
        let err = CalibrationSession::<ToyProblem>::with_input(ToyInput { angles: vec![] })
            .unwrap_err();
        assert!(err.to_string().contains("no angles"));
    }

    #[test]
    fn new_input_clears_computed_data() {
        let mut session = toy_session();
        session.state.visited = 3;
        session.set_output(ToyOutput { mean: 2.0 });

        session.set_input(ToyInput { angles: vec![4.0] }).unwrap();
        assert_eq!(session.state.visited, 0);
        assert!(!session.has_output());

        session.clear_input();
        assert!(!session.has_input());
    }

    #[test]
    fn config_updates_are_validated_and_keep_output() {
        let mut session = toy_session();
        session.set_output(ToyOutput { mean: 2.0 });

        session.update_config(|c| c.step = 0.5).unwrap();
        assert_eq!(session.config.step, 0.5);
        assert!(session.has_output());

        assert!(session.update_config(|c| c.step = -1.0).is_err());
        assert_eq!(session.config.step, 0.5);
    }

    #[test]
    fn exports_accumulate() {
        let mut session = toy_session();
        session.set_output(ToyOutput { mean: 2.0 });

        assert_eq!(session.export_peek().unwrap(), 2.0);
        assert!(session.exports.is_empty());

        session.export().unwrap();
        session.set_output(ToyOutput { mean: 3.0 });
        session.export().unwrap();
        assert_eq!(session.exports.len(), 2);
        assert_eq!(session.exports[1].export, 3.0);
    }

    #[test]
    fn failures_are_recorded_and_propagated() {
        let mut session = toy_session();
        let ok: Result<u32> = Ok(3);
        assert_eq!(session.record_failure("visit", ok).unwrap(), 3);
        assert!(session.log.is_empty());

        let failed: Result<u32> = Err(anyhow!("angle out of range"));
        let err = session.record_failure("visit", failed).unwrap_err();
        assert!(err.to_string().contains("angle out of range"));
        assert_eq!(session.log.len(), 1);
        assert!(!session.log[0].success);
        assert_eq!(session.log[0].operation, "visit");
    }

    #[test]
    fn reset_keeps_config() {
        let mut session = toy_session();
        session.config.step = 0.25;
        session.state.visited = 2;
        session.set_output(ToyOutput { mean: 2.0 });
        session.log_success("visit");

        session.reset_state();
        assert_eq!(session.state.visited, 0);
        assert!(session.has_output());

        session.reset();
        assert!(!session.has_input());
        assert!(!session.has_output());
        assert!(session.log.is_empty());
        assert_eq!(session.config.step, 0.25);
    }

    #[test]
    fn json_roundtrip_keeps_everything() {
        let mut session = toy_session();
        session.state.visited = 3;
        session.set_output(ToyOutput { mean: 2.0 });
        session.export().unwrap();
        session.log_success_with_notes("visit", "3 angles");

        let restored = CalibrationSession::<ToyProblem>::from_json(&session.to_json().unwrap())
            .unwrap();
        assert_eq!(restored.input().unwrap().angles, vec![1.0, 2.0, 3.0]);
        assert_eq!(restored.state.visited, 3);
        assert_eq!(restored.output().unwrap().mean, 2.0);
        assert_eq!(restored.exports.len(), 1);
        assert_eq!(restored.log[0].notes.as_deref(), Some("3 angles"));
    }

    #[test]
    fn newer_schema_is_rejected() {
        let json = CalibrationSession::<ToyProblem>::new()
            .to_json()
            .unwrap()
            .replace("\"schema_version\": 1", "\"schema_version\": 999");
        let err = CalibrationSession::<ToyProblem>::from_json(&json).unwrap_err();
        assert!(err.to_string().contains("schema version"));
    }

    #[test]
    fn other_problem_type_is_rejected() {
        let json = CalibrationSession::<ToyProblem>::new()
            .to_json()
            .unwrap()
            .replace("\"problem_type\": \"toy\"", "\"problem_type\": \"other\"");
        let err = CalibrationSession::<ToyProblem>::from_json(&json).unwrap_err();
        assert!(err.to_string().contains("problem type"));
    }

    #[test]
    fn checkpoint_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        let mut session = toy_session();
        session.state.visited = 1;
        session.save_checkpoint(&path).unwrap();

        let restored = CalibrationSession::<ToyProblem>::load_checkpoint(&path).unwrap();
        assert_eq!(restored.state.visited, 1);
        assert!(
            CalibrationSession::<ToyProblem>::load_checkpoint(dir.path().join("nope.json"))
                .is_err()
        );
    }
}

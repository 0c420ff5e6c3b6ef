//! Step functions for goniometer calibration.
//!
//! Each step checks the driver phase, does its work against the engine, and
//! records the outcome in the session log. Failures are logged and returned
//! unchanged, so typed core errors stay downcastable from the `anyhow::Error`.

use std::ops::ControlFlow;
use std::path::Path;

use anyhow::{Context, Result, anyhow, bail, ensure};
use gonio_calibration_core::{
    Calibrant, CalibrantRegistry, CalibrationFrame, Container, ControlPointSet, DetectorRegistry,
    FrameSource, PoniFile, Real,
};

use crate::session::CalibrationSession;

use super::engine::{EngineSetup, GeometryHandle, RefinementEngine};
use super::problem::{GoniometerInput, GoniometerOutput, GoniometerProblem};
use super::state::{
    DriverPhase, FramePrediction, GeometryOrigin, GeometryRegistry, RegisteredGeometry,
};

type Session = CalibrationSession<GoniometerProblem>;

// ─────────────────────────────────────────────────────────────────────────────
// Step Options
// ─────────────────────────────────────────────────────────────────────────────

/// Options for the extension step.
#[derive(Debug, Clone, Default)]
pub struct ExtendOptions {
    /// Override the configured control-point density.
    pub pts_per_deg: Option<Real>,
}

/// Passed to the extension progress callback before each new frame.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtendProgress<'a> {
    pub label: &'a str,
    pub idx: usize,
    /// Frames added so far in this pass.
    pub added: usize,
    /// Frames in the data container.
    pub total: usize,
}

// ─────────────────────────────────────────────────────────────────────────────
// Helper Functions
// ─────────────────────────────────────────────────────────────────────────────

fn open_container(path: &Path) -> Result<Container> {
    Container::open(path).with_context(|| format!("failed to open {}", path.display()))
}

/// Register a pre-fitted frame from its `.npt` and `.poni` artifacts.
///
/// Returns the handle and the number of control points read.
fn register_seeded(
    engine: &mut dyn RefinementEngine,
    job: &GoniometerInput,
    frame: &CalibrationFrame,
    label: &str,
    calibrant: &Calibrant,
) -> Result<(GeometryHandle, usize)> {
    let npt_path = job.control_points_path(frame.idx());
    let control_points =
        ControlPointSet::read(&npt_path).with_context(|| format!("control points for {label}"))?;
    let poni_path = job.poni_path(frame.idx());
    let poni = PoniFile::read(&poni_path).with_context(|| format!("geometry for {label}"))?;

    let handle = engine
        .register_geometry(
            label,
            frame,
            Some(&control_points),
            calibrant,
            Some(&poni.geometry),
        )
        .with_context(|| format!("failed to register {label}"))?;
    Ok((handle, control_points.num_points()))
}

/// Refine over every registered geometry and publish the result as output.
fn refine_registered(session: &mut Session, engine: &mut dyn RefinementEngine) -> Result<()> {
    let num_geometries = session.state.registry.len();
    ensure!(num_geometries > 0, "no geometries registered");

    let report = engine.refine().context("global refinement failed")?;
    let parameters = session
        .require_input()?
        .initial_parameters
        .with_values(report.values);

    session.state.refinements += 1;
    session.state.last_report = Some(report.clone());
    session.set_output(GoniometerOutput {
        parameters,
        num_geometries,
        cost: report.cost,
    });
    log::info!(
        "refinement #{} over {num_geometries} geometries, cost {:?}",
        session.state.refinements,
        report.cost
    );
    Ok(())
}

/// What the engine's current model predicts for every registered frame.
pub fn predicted_geometries(
    session: &Session,
    engine: &dyn RefinementEngine,
) -> Vec<FramePrediction> {
    session
        .state
        .registry
        .iter()
        .map(|entry| FramePrediction {
            label: entry.label.clone(),
            position: entry.position,
            geometry: engine.geometry_at(entry.position),
        })
        .collect()
}

// ─────────────────────────────────────────────────────────────────────────────
// Step Functions
// ─────────────────────────────────────────────────────────────────────────────

/// Resolve calibrant and detector and configure the engine.
///
/// Only allowed before seeding. Unknown identities fail with
/// [`RegistryError`](gonio_calibration_core::RegistryError).
pub fn step_setup(session: &mut Session, engine: &mut dyn RefinementEngine) -> Result<()> {
    let result = setup(session, engine);
    session.record_failure("setup", result)
}

fn setup(session: &mut Session, engine: &mut dyn RefinementEngine) -> Result<()> {
    session.validate()?;
    let phase = session.state.phase;
    ensure!(
        phase == DriverPhase::Empty,
        "engine can only be configured before seeding (phase {phase})"
    );

    let job = session.require_input()?;
    let mut calibrants = CalibrantRegistry::default();
    for file in &session.config.calibrant_files {
        calibrants.load_file(file)?;
    }
    let mut detectors = DetectorRegistry::default();
    for detector in &session.config.detectors {
        detectors.register(detector.clone());
    }
    let calibrant = calibrants.get(&job.calibrant, job.wavelength)?;
    let detector = detectors.get(&job.detector)?;

    let setup = EngineSetup::new(&job.initial_parameters, detector.clone(), job.wavelength);
    engine.configure(&setup).context("engine configuration failed")?;

    let notes = format!(
        "calibrant={} ({} rings), detector={}",
        calibrant.name,
        calibrant.d_spacings.len(),
        detector.name
    );
    log::debug!("setup: {notes}");
    session.state.calibrant = Some(calibrant);
    session.state.detector = Some(detector);
    session.log_success_with_notes("setup", notes);
    Ok(())
}

/// Register the job's pre-fitted frames: `Empty | Seeded → Seeded`.
///
/// For each index in `idxs`, reads `<stem>_<idx>.npt` and `<stem>_<idx>.poni`
/// and registers the frame as `<stem>_<idx>`. Labels already registered are
/// skipped, so re-running after a failure only adds the missing frames. A
/// missing or malformed artifact aborts the pass with an
/// [`ArtifactError`](gonio_calibration_core::ArtifactError).
pub fn step_seed(session: &mut Session, engine: &mut dyn RefinementEngine) -> Result<()> {
    let result = seed(session, engine);
    session.record_failure("seed", result)
}

fn seed(session: &mut Session, engine: &mut dyn RefinementEngine) -> Result<()> {
    session.validate()?;
    let phase = session.state.phase;
    ensure!(
        matches!(phase, DriverPhase::Empty | DriverPhase::Seeded),
        "cannot seed in phase {phase}"
    );
    let calibrant = session.state.require_calibrant()?.clone();
    let job = session.require_input()?.clone();

    let container = open_container(&job.filename)?;
    let source = FrameSource::resolve(&container, &job)?;

    let mut added = 0;
    for frame in source.indexed(&job.idxs)? {
        let label = job.frame_label(frame.idx());
        if session.state.registry.contains(&label) {
            log::debug!("{label} already registered, skipping");
            continue;
        }

        let (handle, control_points) =
            register_seeded(engine, &job, &frame, &label, &calibrant)?;
        session.state.registry.insert(RegisteredGeometry {
            label,
            idx: frame.idx(),
            position: frame.position(),
            handle,
            origin: GeometryOrigin::Seeded,
            control_points,
        });
        added += 1;
    }
    drop(container);

    session.state.phase = DriverPhase::Seeded;
    for prediction in predicted_geometries(session, engine) {
        log::debug!(
            "{} at {}: {:?}",
            prediction.label,
            prediction.position,
            prediction.geometry
        );
    }
    session.log_success_with_notes(
        "seed",
        format!("{added} added, {} registered", session.state.registry.len()),
    );
    Ok(())
}

/// Run one global refinement.
///
/// `Seeded | Refined → Refined`; in `Extended` the phase is kept.
pub fn step_refine(session: &mut Session, engine: &mut dyn RefinementEngine) -> Result<()> {
    let result = refine(session, engine);
    session.record_failure("refine", result)
}

fn refine(session: &mut Session, engine: &mut dyn RefinementEngine) -> Result<()> {
    let next = match session.state.phase {
        DriverPhase::Seeded | DriverPhase::Refined => DriverPhase::Refined,
        DriverPhase::Extended => DriverPhase::Extended,
        phase => bail!("cannot refine in phase {phase}"),
    };
    refine_registered(session, engine)?;
    session.state.phase = next;
    session.log_success_with_notes(
        "refine",
        format!("{} geometries", session.state.registry.len()),
    );
    Ok(())
}

/// Add every unregistered frame and refine again: any non-terminal phase
/// `→ Extended`.
///
/// A frame is recorded as registered as soon as the engine accepts it, so a
/// failed extraction or refinement never leads to registering it twice. The
/// phase only changes once the refinement succeeds.
pub fn step_extend(
    session: &mut Session,
    engine: &mut dyn RefinementEngine,
    opts: Option<ExtendOptions>,
) -> Result<()> {
    step_extend_with_progress(session, engine, opts, &mut |_| ControlFlow::Continue(()))
}

/// [`step_extend`] with a callback invoked before each new frame.
///
/// Returning [`ControlFlow::Break`] stops the pass before that frame. Frames
/// registered up to then stay registered and the refinement still runs.
pub fn step_extend_with_progress(
    session: &mut Session,
    engine: &mut dyn RefinementEngine,
    opts: Option<ExtendOptions>,
    progress: &mut dyn FnMut(&ExtendProgress<'_>) -> ControlFlow<()>,
) -> Result<()> {
    let result = extend(session, engine, opts.unwrap_or_default(), progress);
    session.record_failure("extend", result)
}

fn extend(
    session: &mut Session,
    engine: &mut dyn RefinementEngine,
    opts: ExtendOptions,
    progress: &mut dyn FnMut(&ExtendProgress<'_>) -> ControlFlow<()>,
) -> Result<()> {
    session.validate()?;
    let phase = session.state.phase;
    ensure!(!phase.is_terminal(), "cannot extend in phase {phase}");
    let pts_per_deg = opts.pts_per_deg.unwrap_or(session.config.pts_per_deg);
    ensure!(
        pts_per_deg.is_finite() && pts_per_deg > 0.0,
        "pts_per_deg must be positive (got {pts_per_deg})"
    );
    let calibrant = session.state.require_calibrant()?.clone();
    let job = session.require_input()?.clone();

    let mut added = 0;
    let mut extracted = 0;
    let mut stopped = false;
    let mut last_added = None;
    {
        let container = open_container(&job.filename)?;
        let source = FrameSource::resolve(&container, &job)?;
        let total = source.len();

        for frame in source.all() {
            let label = job.frame_label(frame.idx());
            if session.state.registry.contains(&label) {
                continue;
            }
            let info = ExtendProgress {
                label: &label,
                idx: frame.idx(),
                added,
                total,
            };
            if progress(&info).is_break() {
                log::info!("extension stopped before {label}");
                stopped = true;
                break;
            }

            let predicted = engine.geometry_at(frame.position());
            let handle = engine
                .register_geometry(&label, &frame, None, &calibrant, Some(&predicted))
                .with_context(|| format!("failed to register {label}"))?;
            // The engine holds the label from here on, even if extraction fails.
            session.state.registry.insert(RegisteredGeometry {
                label: label.clone(),
                idx: frame.idx(),
                position: frame.position(),
                handle,
                origin: GeometryOrigin::Extended,
                control_points: 0,
            });
            added += 1;
            last_added = Some((label.clone(), frame.position()));

            let points = engine
                .extract_control_points(handle, pts_per_deg)
                .with_context(|| format!("control-point extraction failed for {label}"))?;
            log::debug!("{label}: {points} control points");
            session.state.registry.set_control_points(&label, points);
            extracted += points;
        }
    }

    refine_registered(session, engine)?;
    session.state.phase = DriverPhase::Extended;

    if let Some((label, position)) = last_added {
        session.state.last_prediction = Some(FramePrediction {
            label,
            position,
            geometry: engine.geometry_at(position),
        });
    }

    let mut notes = format!(
        "{added} added ({extracted} control points), {} registered",
        session.state.registry.len()
    );
    if stopped {
        notes.push_str(", stopped early");
    }
    session.log_success_with_notes("extend", notes);
    Ok(())
}

/// Rebuild the engine state of a session restored from a checkpoint.
///
/// Configures `engine` from the last refined model (the initial guess if
/// nothing was refined yet) and registers every recorded geometry again in
/// registration order: seeded frames from their artifacts, extended frames
/// from the model prediction with freshly extracted control points. The
/// registry takes the new handles once every frame is back; the phase is
/// kept, so the session continues where it was checkpointed.
pub fn step_resume(session: &mut Session, engine: &mut dyn RefinementEngine) -> Result<()> {
    let result = resume(session, engine);
    session.record_failure("resume", result)
}

fn resume(session: &mut Session, engine: &mut dyn RefinementEngine) -> Result<()> {
    session.validate()?;
    let phase = session.state.phase;
    ensure!(phase != DriverPhase::Empty, "nothing to resume in phase {phase}");
    let calibrant = session.state.require_calibrant()?.clone();
    let detector = session
        .state
        .detector
        .clone()
        .ok_or_else(|| anyhow!("engine not configured; run step_setup first"))?;
    let job = session.require_input()?.clone();

    let model = match &session.state.last_report {
        Some(report) => job.initial_parameters.with_values(report.values),
        None => job.initial_parameters.clone(),
    };
    let setup = EngineSetup::new(&model, detector, job.wavelength);
    engine.configure(&setup).context("engine configuration failed")?;

    let container = open_container(&job.filename)?;
    let source = FrameSource::resolve(&container, &job)?;

    let mut replayed = GeometryRegistry::new();
    for entry in session.state.registry.iter() {
        let frame = source.frame(entry.idx)?;
        let (handle, control_points) = match entry.origin {
            GeometryOrigin::Seeded => {
                register_seeded(engine, &job, &frame, &entry.label, &calibrant)?
            }
            GeometryOrigin::Extended => {
                let predicted = engine.geometry_at(entry.position);
                let handle = engine
                    .register_geometry(&entry.label, &frame, None, &calibrant, Some(&predicted))
                    .with_context(|| format!("failed to register {}", entry.label))?;
                let points = engine
                    .extract_control_points(handle, session.config.pts_per_deg)
                    .with_context(|| {
                        format!("control-point extraction failed for {}", entry.label)
                    })?;
                (handle, points)
            }
        };
        replayed.insert(RegisteredGeometry {
            handle,
            control_points,
            ..entry.clone()
        });
    }
    drop(container);

    let num_geometries = replayed.len();
    session.state.registry = replayed;
    log::info!("resumed {num_geometries} geometries in phase {phase}");
    session.log_success_with_notes("resume", format!("{num_geometries} geometries replayed"));
    Ok(())
}

/// Persist the refined model: `Extended | Saved → Saved`.
///
/// Saving again overwrites `destination`.
pub fn step_save(
    session: &mut Session,
    engine: &mut dyn RefinementEngine,
    destination: &Path,
) -> Result<()> {
    let result = save(session, engine, destination);
    session.record_failure("save", result)
}

fn save(
    session: &mut Session,
    engine: &mut dyn RefinementEngine,
    destination: &Path,
) -> Result<()> {
    let phase = session.state.phase;
    ensure!(
        matches!(phase, DriverPhase::Extended | DriverPhase::Saved),
        "cannot save in phase {phase}"
    );
    engine
        .save(destination)
        .with_context(|| format!("failed to save model to {}", destination.display()))?;

    session.state.phase = DriverPhase::Saved;
    session.state.saved_to = Some(destination.to_path_buf());
    log::info!("model saved to {}", destination.display());
    session.log_success_with_notes("save", destination.display().to_string());
    Ok(())
}

/// Run the full pipeline: setup → seed → refine → extend → save.
pub fn run_calibration(
    session: &mut Session,
    engine: &mut dyn RefinementEngine,
    destination: &Path,
) -> Result<()> {
    step_setup(session, engine)?;
    step_seed(session, engine)?;
    step_refine(session, engine)?;
    step_extend(session, engine, None)?;
    step_save(session, engine, destination)?;
    Ok(())
}

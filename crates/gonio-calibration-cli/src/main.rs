//! goniocal: command-line tools around goniometer calibration jobs.

use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use gonio_calibration_core::{
    ArtifactError, Calibration, CalibrantRegistry, CalibrationParameters, Container,
    ControlPointSet, DetectorRegistry, FrameSource, GeometryTransformation, PoniFile, locate,
    write_edf,
};
use gonio_calibration_pipeline::CalibrationSession;
use gonio_calibration_pipeline::goniometer::GoniometerProblem;

#[derive(Parser)]
#[command(name = "goniocal")]
#[command(about = "Inspect goniometer calibration jobs and their per-frame files")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Summarise a job: located datasets, frames, calibrant and detector.
    Info(JobArgs),

    /// Check that every seed frame has readable `.poni` and `.npt` files.
    Check(JobArgs),

    /// Write frames of the scan as EDF images.
    ExportEdf {
        #[command(flatten)]
        job: JobArgs,

        /// Output directory; created if missing.
        #[arg(long)]
        out_dir: PathBuf,

        /// Frame indices to export (comma separated). All frames if omitted.
        #[arg(long, value_delimiter = ',')]
        idx: Vec<usize>,
    },

    /// Print or write the PONI geometry the model predicts for one frame.
    Poni {
        #[command(flatten)]
        job: JobArgs,

        /// Frame index.
        #[arg(long)]
        idx: usize,

        /// Session checkpoint with a refined model. The job's initial
        /// parameters are used if omitted.
        #[arg(long)]
        session: Option<PathBuf>,

        /// Path to write the `.poni` file. Printed to stdout if omitted.
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

#[derive(Debug, Clone, Args)]
struct JobArgs {
    /// Path to the calibration job (JSON).
    #[arg(long)]
    job: PathBuf,
}

impl JobArgs {
    fn load(&self) -> Result<Calibration> {
        let job = Calibration::from_json_file(&self.job)?;
        job.validate()
            .with_context(|| format!("invalid job {}", self.job.display()))?;
        Ok(job)
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Info(args) => {
            print!("{}", job_info(&args.load()?)?);
            Ok(())
        }
        Commands::Check(args) => run_check(&args.load()?),
        Commands::ExportEdf { job, out_dir, idx } => {
            let written = export_edf(&job.load()?, &out_dir, &idx)?;
            tracing::info!("wrote {} EDF files to {}", written.len(), out_dir.display());
            Ok(())
        }
        Commands::Poni {
            job,
            idx,
            session,
            out,
        } => {
            let poni = predict_poni(&job.load()?, idx, session.as_deref())?;
            match out {
                Some(path) => {
                    poni.write(&path)?;
                    tracing::info!("geometry for frame {idx} written to {}", path.display());
                }
                None => print!("{poni}"),
            }
            Ok(())
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Commands
// ─────────────────────────────────────────────────────────────────────────────

fn open_container(job: &Calibration) -> Result<Container> {
    Container::open(&job.filename)
        .with_context(|| format!("failed to open {}", job.filename.display()))
}

/// Human-readable summary of `job`.
///
/// Unresolvable datasets and unknown calibrant or detector names are reported
/// in the summary rather than as errors.
fn job_info(job: &Calibration) -> Result<String> {
    let container = open_container(job)?;
    let mut out = String::new();

    writeln!(out, "container:   {}", job.filename.display())?;
    for (name, rule) in [("images", &job.images_path), ("deltas", &job.deltas_path)] {
        match locate(&container, rule) {
            Some(found) => writeln!(out, "{name:<12} {} {:?}", found.path, found.shape())?,
            None => writeln!(out, "{name:<12} not found ({rule})")?,
        }
    }

    match FrameSource::resolve(&container, job) {
        Ok(source) => {
            writeln!(out, "frames:      {}", source.len())?;
            let deltas: Vec<_> = source.all().map(|f| f.delta()).collect();
            if let (Some(first), Some(last)) = (deltas.first(), deltas.last()) {
                writeln!(out, "delta:       {first} .. {last}")?;
            }
        }
        Err(err) => writeln!(out, "frames:      unavailable ({err})")?,
    }
    writeln!(out, "seed frames: {:?}", job.idxs)?;

    match CalibrantRegistry::default().get(&job.calibrant, job.wavelength) {
        Ok(calibrant) => {
            let observable = calibrant.two_theta_all().len();
            writeln!(
                out,
                "calibrant:   {} ({} rings, {observable} observable)",
                calibrant.name,
                calibrant.d_spacings.len()
            )?;
        }
        Err(err) => writeln!(out, "calibrant:   {err}")?,
    }
    match DetectorRegistry::default().get(&job.detector) {
        Ok(detector) => writeln!(
            out,
            "detector:    {} {}x{} px, pixel {:e} m",
            detector.name, detector.shape.0, detector.shape.1, detector.pixel1
        )?,
        Err(err) => writeln!(out, "detector:    {err}")?,
    }
    writeln!(out, "wavelength:  {:e} m", job.wavelength)?;
    Ok(out)
}

/// Artifact problems of one seed frame.
#[derive(Debug)]
struct FrameArtifacts {
    label: String,
    errors: Vec<ArtifactError>,
}

/// Read the `.poni` and `.npt` file of every seed frame.
fn check_artifacts(job: &Calibration) -> Vec<FrameArtifacts> {
    job.idxs
        .iter()
        .map(|&idx| {
            let mut errors = Vec::new();
            if let Err(err) = PoniFile::read(job.poni_path(idx)) {
                errors.push(err);
            }
            match ControlPointSet::read(job.control_points_path(idx)) {
                Ok(points) if points.is_empty() => {
                    tracing::warn!("{}: no control points", job.frame_label(idx));
                }
                Ok(_) => {}
                Err(err) => errors.push(err),
            }
            FrameArtifacts {
                label: job.frame_label(idx),
                errors,
            }
        })
        .collect()
}

fn run_check(job: &Calibration) -> Result<()> {
    let report = check_artifacts(job);
    let mut failed = 0;
    for frame in &report {
        if frame.errors.is_empty() {
            println!("{}: ok", frame.label);
            continue;
        }
        failed += 1;
        for err in &frame.errors {
            println!("{}: {err}", frame.label);
        }
    }
    if failed > 0 {
        bail!("{failed} of {} seed frames have unusable artifacts", report.len());
    }
    Ok(())
}

/// Write frames `idxs` (every frame if empty) to `out_dir/<stem>_<idx>.edf`.
fn export_edf(job: &Calibration, out_dir: &Path, idxs: &[usize]) -> Result<Vec<PathBuf>> {
    let container = open_container(job)?;
    let source = FrameSource::resolve(&container, job)?;
    fs::create_dir_all(out_dir)
        .with_context(|| format!("failed to create {}", out_dir.display()))?;

    let frames: Vec<_> = if idxs.is_empty() {
        source.all().collect()
    } else {
        source.indexed(idxs)?.collect()
    };

    let mut written = Vec::with_capacity(frames.len());
    for frame in frames {
        let path = out_dir.join(format!("{}.edf", job.frame_label(frame.idx())));
        write_edf(&path, frame.image())?;
        tracing::debug!("frame {} -> {}", frame.idx(), path.display());
        written.push(path);
    }
    Ok(written)
}

/// Refined parameters from a session checkpoint.
fn session_parameters(path: &Path) -> Result<CalibrationParameters> {
    let session = CalibrationSession::<GoniometerProblem>::load_checkpoint(path)?;
    let output = session
        .require_output()
        .with_context(|| format!("{} holds no refined model", path.display()))?;
    Ok(output.parameters.clone())
}

/// PONI geometry of frame `idx` under the session's model or the job's
/// initial guess.
fn predict_poni(job: &Calibration, idx: usize, session: Option<&Path>) -> Result<PoniFile> {
    let parameters = match session {
        Some(path) => session_parameters(path)?,
        None => job.initial_parameters.clone(),
    };
    let container = open_container(job)?;
    let frame = FrameSource::resolve(&container, job)?.frame(idx)?;

    let geometry = GeometryTransformation.apply(&parameters, frame.position());
    Ok(PoniFile {
        geometry,
        detector: Some(job.detector.clone()),
        wavelength: Some(job.wavelength),
    })
}

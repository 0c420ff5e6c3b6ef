//! Calibration job description.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, ensure};
use serde::{Deserialize, Serialize};

use crate::Wavelength;
use crate::locator::DatasetPath;
use crate::params::CalibrationParameters;

/// Everything needed to run one multi-frame calibration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Calibration {
    /// Data container holding the calibration frames.
    pub filename: PathBuf,
    /// Rule locating the `frames x rows x cols` image stack.
    pub images_path: DatasetPath,
    /// Rule locating the per-frame goniometer angle.
    pub deltas_path: DatasetPath,
    /// Frames with pre-fitted geometries, used to seed the refinement.
    pub idxs: Vec<usize>,
    /// Calibrant identity, e.g. `"LaB6"`.
    pub calibrant: String,
    /// Detector identity, e.g. `"Xpad S540 flat"`.
    pub detector: String,
    /// Wavelength in metres.
    pub wavelength: Wavelength,
    pub initial_parameters: CalibrationParameters,
    /// Directory holding `<stem>_<idx>.poni` / `.npt` files.
    ///
    /// Defaults to the directory of `filename`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact_dir: Option<PathBuf>,
}

impl Calibration {
    /// File stem of the data container, used to build frame labels.
    pub fn base_name(&self) -> String {
        self.filename
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// Label identifying frame `idx` in the refinement, `<stem>_<idx>`.
    pub fn frame_label(&self, idx: usize) -> String {
        format!("{}_{idx}", self.base_name())
    }

    pub fn artifact_dir(&self) -> PathBuf {
        match &self.artifact_dir {
            Some(dir) => dir.clone(),
            None => self
                .filename
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_default(),
        }
    }

    /// Path of a per-frame artifact, `<dir>/<stem>_<idx>.<extension>`.
    pub fn artifact_path(&self, idx: usize, extension: &str) -> PathBuf {
        self.artifact_dir()
            .join(format!("{}.{extension}", self.frame_label(idx)))
    }

    pub fn poni_path(&self, idx: usize) -> PathBuf {
        self.artifact_path(idx, "poni")
    }

    pub fn control_points_path(&self, idx: usize) -> PathBuf {
        self.artifact_path(idx, "npt")
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(
            !self.base_name().is_empty(),
            "calibration filename {} has no file stem",
            self.filename.display()
        );
        ensure!(
            self.wavelength.is_finite() && self.wavelength > 0.0,
            "wavelength must be positive (got {})",
            self.wavelength
        );
        ensure!(!self.calibrant.trim().is_empty(), "calibrant is not set");
        ensure!(!self.detector.trim().is_empty(), "detector is not set");
        self.initial_parameters
            .validate()
            .context("invalid initial parameters")?;
        Ok(())
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = fs::read_to_string(path)
            .with_context(|| format!("failed to read calibration job {}", path.display()))?;
        serde_json::from_str(&data)
            .with_context(|| format!("failed to parse calibration job {}", path.display()))
    }

    pub fn to_json_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)
            .with_context(|| format!("failed to write calibration job {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job() -> Calibration {
        Calibration {
            filename: PathBuf::from("/data/scan/calib_lab6.h5"),
            images_path: DatasetPath::contains("scan_data/data_"),
            deltas_path: DatasetPath::contains("scan_data/actuator_1_1"),
            idxs: vec![0, 3, 6],
            calibrant: "LaB6".into(),
            detector: "Xpad S540 flat".into(),
            wavelength: 0.6888e-10,
            initial_parameters: CalibrationParameters::default(),
            artifact_dir: None,
        }
    }

    #[test]
    fn labels_and_artifacts_follow_the_stem() {
        let job = job();
        assert_eq!(job.base_name(), "calib_lab6");
        assert_eq!(job.frame_label(3), "calib_lab6_3");
        assert_eq!(job.poni_path(3), PathBuf::from("/data/scan/calib_lab6_3.poni"));
        assert_eq!(
            job.control_points_path(6),
            PathBuf::from("/data/scan/calib_lab6_6.npt")
        );
    }

    #[test]
    fn artifact_dir_override() {
        let mut job = job();
        job.artifact_dir = Some(PathBuf::from("/work/poni"));
        assert_eq!(job.poni_path(0), PathBuf::from("/work/poni/calib_lab6_0.poni"));
    }

    #[test]
    fn validate_checks_wavelength_and_parameters() {
        let mut job = job();
        assert!(job.validate().is_ok());

        job.wavelength = 0.0;
        assert!(job.validate().unwrap_err().to_string().contains("wavelength"));

        let mut job = self::job();
        job.initial_parameters.distance.value = 10.0;
        assert!(job.validate().is_err());
    }

    #[test]
    fn json_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("job.json");
        let job = job();
        job.to_json_file(&path).unwrap();
        assert_eq!(Calibration::from_json_file(&path).unwrap(), job);
    }
}

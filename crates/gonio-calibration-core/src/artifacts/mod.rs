//! Per-frame files consumed and produced around a calibration run.
//!
//! - [`poni`]: single-frame geometry files (`<stem>_<idx>.poni`).
//! - [`npt`]: control-point files (`<stem>_<idx>.npt`).
//! - [`edf`]: frame export for single-frame calibration tools.

pub mod edf;
pub mod npt;
pub mod poni;

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

pub use edf::write_edf;
pub use npt::{ControlPointSet, PointGroup};
pub use poni::PoniFile;

#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("missing artifact {0}")]
    Missing(PathBuf),
    #[error("malformed artifact {path}, line {line}: {reason}")]
    Malformed {
        path: PathBuf,
        line: usize,
        reason: String,
    },
    #[error("i/o error on {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ArtifactError {
    /// Whether this is a missing or malformed artifact, as opposed to an i/o failure.
    pub fn is_missing_artifact(&self) -> bool {
        matches!(self, Self::Missing(_) | Self::Malformed { .. })
    }
}

/// Read a text artifact, mapping "not found" to [`ArtifactError::Missing`].
pub(crate) fn read_artifact(path: &Path) -> Result<String, ArtifactError> {
    fs::read_to_string(path).map_err(|source| {
        if source.kind() == std::io::ErrorKind::NotFound {
            ArtifactError::Missing(path.to_path_buf())
        } else {
            ArtifactError::Io {
                path: path.to_path_buf(),
                source,
            }
        }
    })
}

/// Error for `line` (1-based) of a text artifact.
pub(crate) fn malformed(path: &Path, line: usize, reason: impl Into<String>) -> ArtifactError {
    ArtifactError::Malformed {
        path: path.to_path_buf(),
        line,
        reason: reason.into(),
    }
}

/// Split `key: value`, trimming both sides.
pub(crate) fn split_key_value(line: &str) -> Option<(&str, &str)> {
    let (key, value) = line.split_once(':')?;
    Some((key.trim(), value.trim()))
}

//! Calibrant and detector lookup by identity string.

mod calibrant;
mod detector;

use std::path::PathBuf;

use thiserror::Error;

pub use calibrant::{Calibrant, CalibrantRegistry, Centering, CubicLattice};
pub use detector::{Detector, DetectorRegistry};

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("unknown calibrant {0:?}")]
    UnknownCalibrant(String),
    #[error("unknown detector {0:?}")]
    UnknownDetector(String),
    #[error("failed to read {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed calibrant file {path}: {reason}")]
    Malformed { path: PathBuf, reason: String },
}

/// Registry key: lower case, without spaces, underscores or dashes.
pub(crate) fn normalize_key(name: &str) -> String {
    name.chars()
        .filter(|c| !matches!(c, ' ' | '_' | '-'))
        .flat_map(char::to_lowercase)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::normalize_key;

    #[test]
    fn keys_ignore_case_and_separators() {
        assert_eq!(normalize_key("Xpad S540_flat"), "xpads540flat");
        assert_eq!(normalize_key("Pilatus-1M"), normalize_key("pilatus1m"));
    }
}

//! PONI single-geometry files.
//!
//! Plain `key: value` text. Keys are case-insensitive, `#` starts a comment
//! line, and unknown keys are ignored.

use std::fmt::{self, Write as _};
use std::fs;
use std::path::Path;

use super::{ArtifactError, malformed, read_artifact, split_key_value};
use crate::geometry::PoniGeometry;
use crate::{Real, Wavelength};

const PONI_VERSION: u32 = 2;

/// Contents of a `.poni` file.
#[derive(Debug, Clone, PartialEq)]
pub struct PoniFile {
    pub geometry: PoniGeometry,
    pub detector: Option<String>,
    pub wavelength: Option<Wavelength>,
}

impl PoniFile {
    pub fn new(geometry: PoniGeometry) -> Self {
        Self {
            geometry,
            detector: None,
            wavelength: None,
        }
    }

    pub fn read(path: impl AsRef<Path>) -> Result<Self, ArtifactError> {
        let path = path.as_ref();
        let text = read_artifact(path)?;
        Self::parse(&text, path)
    }

    /// Parse PONI text; `path` is only used in error messages.
    pub fn parse(text: &str, path: &Path) -> Result<Self, ArtifactError> {
        let mut fields: [Option<Real>; 6] = [None; 6];
        let mut detector = None;
        let mut wavelength = None;

        for (lineno, raw) in text.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let lineno = lineno + 1;
            let (key, value) = split_key_value(line)
                .ok_or_else(|| malformed(path, lineno, "expected `key: value`"))?;
            let number = || {
                value
                    .parse::<Real>()
                    .map_err(|_| malformed(path, lineno, format!("{key}: not a number: {value:?}")))
            };
            match key.to_ascii_lowercase().as_str() {
                "distance" => fields[0] = Some(number()?),
                "poni1" => fields[1] = Some(number()?),
                "poni2" => fields[2] = Some(number()?),
                "rot1" => fields[3] = Some(number()?),
                "rot2" => fields[4] = Some(number()?),
                "rot3" => fields[5] = Some(number()?),
                "wavelength" => wavelength = Some(number()?),
                "detector" => detector = Some(value.to_owned()),
                "poni_version" => {
                    let version = value
                        .parse::<Real>()
                        .map_err(|_| malformed(path, lineno, "poni_version is not a number"))?;
                    if version > PONI_VERSION as Real {
                        return Err(malformed(
                            path,
                            lineno,
                            format!("unsupported poni_version {version}"),
                        ));
                    }
                }
                _ => {}
            }
        }

        const KEYS: [&str; 6] = ["Distance", "Poni1", "Poni2", "Rot1", "Rot2", "Rot3"];
        let mut values = [0.0; 6];
        for ((slot, field), key) in values.iter_mut().zip(fields).zip(KEYS) {
            *slot = field.ok_or_else(|| malformed(path, 0, format!("missing key {key}")))?;
        }
        let [dist, poni1, poni2, rot1, rot2, rot3] = values;
        Ok(Self {
            geometry: PoniGeometry {
                dist,
                poni1,
                poni2,
                rot1,
                rot2,
                rot3,
            },
            detector,
            wavelength,
        })
    }

    pub fn write(&self, path: impl AsRef<Path>) -> Result<(), ArtifactError> {
        let path = path.as_ref();
        fs::write(path, self.to_string()).map_err(|source| ArtifactError::Io {
            path: path.to_path_buf(),
            source,
        })
    }
}

impl fmt::Display for PoniFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = String::new();
        writeln!(out, "# Nota: C-Order, 1 refers to the Y axis, 2 to the X axis")?;
        writeln!(out, "poni_version: {PONI_VERSION}")?;
        if let Some(detector) = &self.detector {
            writeln!(out, "Detector: {detector}")?;
        }
        let g = &self.geometry;
        writeln!(out, "Distance: {}", g.dist)?;
        writeln!(out, "Poni1: {}", g.poni1)?;
        writeln!(out, "Poni2: {}", g.poni2)?;
        writeln!(out, "Rot1: {}", g.rot1)?;
        writeln!(out, "Rot2: {}", g.rot2)?;
        writeln!(out, "Rot3: {}", g.rot3)?;
        if let Some(wavelength) = self.wavelength {
            writeln!(out, "Wavelength: {wavelength:e}")?;
        }
        f.write_str(&out)
    }
}

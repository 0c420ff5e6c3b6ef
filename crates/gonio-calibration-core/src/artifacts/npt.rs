//! Control-point files.
//!
//! ```text
//! # comment
//! calibrant: LaB6
//! wavelength: 6.88e-11
//! dspacing: 4.156 2.939 2.399
//! New group of points: 0
//! 2th: 0.0331
//! ring: 0
//! points: [(120.5, 310.0), (121.0, 330.2)]
//! ```
//!
//! Points are written as `(y, x)` pixel pairs; brackets and parentheses are
//! interchangeable.

use std::path::Path;

use serde::{Deserialize, Serialize};

use super::{ArtifactError, malformed, read_artifact, split_key_value};
use crate::{Pt2, Real, Wavelength};

const GROUP_PREFIX: &str = "new group of points";

/// Points picked on one diffraction ring.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PointGroup {
    /// Ring index in the calibrant's d-spacing list.
    pub ring: Option<usize>,
    /// Scattering angle 2θ in radians.
    pub two_theta: Option<Real>,
    pub points: Vec<Pt2>,
}

/// Contents of a `.npt` file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ControlPointSet {
    pub calibrant: Option<String>,
    pub wavelength: Option<Wavelength>,
    pub dspacing: Vec<Real>,
    pub groups: Vec<PointGroup>,
}

impl ControlPointSet {
    pub fn read(path: impl AsRef<Path>) -> Result<Self, ArtifactError> {
        let path = path.as_ref();
        let text = read_artifact(path)?;
        Self::parse(&text, path)
    }

    /// Parse control-point text; `path` is only used in error messages.
    pub fn parse(text: &str, path: &Path) -> Result<Self, ArtifactError> {
        let mut set = ControlPointSet::default();

        for (lineno, raw) in text.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let lineno = lineno + 1;
            let (key, value) = split_key_value(line)
                .ok_or_else(|| malformed(path, lineno, "expected `key: value`"))?;
            let key = key.to_ascii_lowercase();
            let number = |what: &str| {
                value
                    .parse::<Real>()
                    .map_err(|_| malformed(path, lineno, format!("{what}: not a number: {value:?}")))
            };

            if key == GROUP_PREFIX {
                set.groups.push(PointGroup::default());
                continue;
            }
            match (key.as_str(), set.groups.last_mut()) {
                ("calibrant", None) => set.calibrant = Some(value.to_owned()),
                ("wavelength", None) => set.wavelength = Some(number("wavelength")?),
                ("dspacing", None) => {
                    set.dspacing = value
                        .split_whitespace()
                        .map(|v| v.parse::<Real>())
                        .collect::<Result<_, _>>()
                        .map_err(|_| malformed(path, lineno, "dspacing: not a number list"))?;
                }
                ("2th", Some(group)) => group.two_theta = Some(number("2th")?),
                ("ring", Some(group)) => {
                    let ring = value
                        .parse::<usize>()
                        .map_err(|_| malformed(path, lineno, "ring: not an index"))?;
                    group.ring = Some(ring);
                }
                ("points", Some(group)) => {
                    group.points = parse_points(value)
                        .ok_or_else(|| malformed(path, lineno, "points: expected (y, x) pairs"))?;
                }
                ("2th" | "ring" | "points", None) => {
                    return Err(malformed(path, lineno, format!("{key} outside a point group")));
                }
                _ => log::debug!("{}:{lineno}: ignoring key {key:?}", path.display()),
            }
        }
        Ok(set)
    }

    /// Total number of control points across all groups.
    pub fn num_points(&self) -> usize {
        self.groups.iter().map(|g| g.points.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.num_points() == 0
    }
}

/// Parse `[(y, x), ...]` into points with `x` = column, `y` = row.
fn parse_points(value: &str) -> Option<Vec<Pt2>> {
    let cleaned: String = value
        .chars()
        .map(|c| if matches!(c, '(' | ')' | '[' | ']' | ',') { ' ' } else { c })
        .collect();
    let numbers = cleaned
        .split_whitespace()
        .map(|v| v.parse::<Real>().ok())
        .collect::<Option<Vec<_>>>()?;
    if numbers.len() % 2 != 0 {
        return None;
    }
    Some(
        numbers
            .chunks_exact(2)
            .map(|yx| Pt2::new(yx[1], yx[0]))
            .collect(),
    )
}

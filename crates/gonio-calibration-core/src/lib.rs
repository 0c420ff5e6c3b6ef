//! Core data model for goniometer detector calibration.
//!
//! This crate provides the building blocks the calibration driver works on:
//!
//! - numeric type aliases (`Real`, `Pt2`, `Image`),
//! - the eight-parameter goniometer model and its per-frame PONI geometry,
//! - a hierarchical data container with a rule-based dataset locator,
//! - frame iteration over the located image stack and motor positions,
//! - readers and writers for per-frame artifacts (`.poni`, `.npt`, `.edf`),
//! - calibrant and detector registries.
//!
//! # Modules
//!
//! - \[`container`\]: groups, datasets and attributes; depth-first traversal.
//! - \[`locator`\]: [`DatasetPath`] rules and [`locate`].
//! - \[`frames`\]: [`FrameSource`] and its frame iterators.
//! - \[`artifacts`\]: per-frame file formats.
//! - \[`registry`\]: calibrant and detector lookup.
//!
//! # Example
//!
//! ```no_run
//! use gonio_calibration_core::{Calibration, Container, FrameSource};
//!
//! # fn main() -> anyhow::Result<()> {
//! let job = Calibration::from_json_file("job.json")?;
//! let container = Container::open(&job.filename)?;
//! let source = FrameSource::resolve(&container, &job)?;
//! for frame in source.indexed(&job.idxs)? {
//!     println!("frame {} at delta {}", frame.idx(), frame.delta());
//! }
//! # Ok(())
//! # }
//! ```

/// Numeric type aliases and unit helpers.
mod math;

pub mod artifacts;
pub mod container;
pub mod frames;
mod geometry;
mod job;
pub mod locator;
mod params;
pub mod registry;
/// Synthetic containers and jobs for tests across the workspace.
///
/// Public so integration tests in other crates can use it; not intended for
/// production use.
pub mod test_utils;

pub use artifacts::{ArtifactError, ControlPointSet, PointGroup, PoniFile, write_edf};
pub use container::{AttrValue, Attributes, Container, ContainerError, Dataset, Group, Node};
pub use frames::{AllFrames, CalibrationFrame, FrameError, FrameSource, IndexedFrames};
pub use geometry::{GeometryTransformation, PoniGeometry};
pub use job::Calibration;
pub use locator::{DatasetPath, LocatedDataset, locate};
pub use math::*;
pub use params::{CalibrationParameters, PARAM_NAMES, Parameter};
pub use registry::{Calibrant, CalibrantRegistry, Detector, DetectorRegistry, RegistryError};

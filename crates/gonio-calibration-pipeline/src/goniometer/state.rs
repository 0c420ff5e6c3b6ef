//! Driver state for goniometer calibration.

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;

use anyhow::{Result, anyhow};
use gonio_calibration_core::{Calibrant, Detector, PoniGeometry, Real};
use serde::{Deserialize, Serialize};

use super::engine::{GeometryHandle, RefinementReport};

/// Phase of the calibration driver.
///
/// `Empty → Seeded → Refined → Extended → Saved`; `Saved` is terminal except
/// for re-saving.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DriverPhase {
    #[default]
    Empty,
    Seeded,
    Refined,
    Extended,
    Saved,
}

impl DriverPhase {
    pub fn is_terminal(self) -> bool {
        self == DriverPhase::Saved
    }
}

impl fmt::Display for DriverPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DriverPhase::Empty => "empty",
            DriverPhase::Seeded => "seeded",
            DriverPhase::Refined => "refined",
            DriverPhase::Extended => "extended",
            DriverPhase::Saved => "saved",
        };
        f.write_str(name)
    }
}

/// How a geometry entered the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GeometryOrigin {
    /// Registered from pre-fitted `.poni` / `.npt` artifacts.
    Seeded,
    /// Registered by an extension pass with extracted control points.
    Extended,
}

/// A frame registered with the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegisteredGeometry {
    pub label: String,
    pub idx: usize,
    /// Goniometer position of the frame.
    pub position: Real,
    pub handle: GeometryHandle,
    pub origin: GeometryOrigin,
    /// Control points read from the artifact or extracted by the engine.
    pub control_points: usize,
}

/// Registered geometries keyed by label, in registration order.
///
/// Inserting a label that is already present is a no-op.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<RegisteredGeometry>", into = "Vec<RegisteredGeometry>")]
pub struct GeometryRegistry {
    entries: Vec<RegisteredGeometry>,
    index: HashMap<String, usize>,
}

impl GeometryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `entry` unless its label is taken; returns whether it was inserted.
    pub fn insert(&mut self, entry: RegisteredGeometry) -> bool {
        if self.index.contains_key(&entry.label) {
            return false;
        }
        self.index.insert(entry.label.clone(), self.entries.len());
        self.entries.push(entry);
        true
    }

    pub fn contains(&self, label: &str) -> bool {
        self.index.contains_key(label)
    }

    pub fn get(&self, label: &str) -> Option<&RegisteredGeometry> {
        self.index.get(label).map(|&i| &self.entries[i])
    }

    /// Record the control-point count of `label`; returns whether it exists.
    pub fn set_control_points(&mut self, label: &str, count: usize) -> bool {
        match self.index.get(label) {
            Some(&i) => {
                self.entries[i].control_points = count;
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in registration order.
    pub fn iter(&self) -> impl ExactSizeIterator<Item = &RegisteredGeometry> {
        self.entries.iter()
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.label.as_str())
    }

    pub fn count(&self, origin: GeometryOrigin) -> usize {
        self.entries.iter().filter(|e| e.origin == origin).count()
    }
}

impl From<Vec<RegisteredGeometry>> for GeometryRegistry {
    fn from(entries: Vec<RegisteredGeometry>) -> Self {
        let mut registry = Self::new();
        for entry in entries {
            registry.insert(entry);
        }
        registry
    }
}

impl From<GeometryRegistry> for Vec<RegisteredGeometry> {
    fn from(registry: GeometryRegistry) -> Self {
        registry.entries
    }
}

/// Model prediction for one registered frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FramePrediction {
    pub label: String,
    pub position: Real,
    pub geometry: PoniGeometry,
}

/// Intermediate state of the goniometer calibration driver.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GoniometerState {
    pub phase: DriverPhase,

    /// Geometries handed to the engine.
    pub registry: GeometryRegistry,

    // ─────────────────────────────────────────────────────────────────────────
    // From setup
    // ─────────────────────────────────────────────────────────────────────────
    /// Calibrant resolved at the job wavelength.
    pub calibrant: Option<Calibrant>,

    pub detector: Option<Detector>,

    // ─────────────────────────────────────────────────────────────────────────
    // From refinement
    // ─────────────────────────────────────────────────────────────────────────
    /// Number of global refinements run so far.
    pub refinements: usize,

    pub last_report: Option<RefinementReport>,

    /// Prediction for the last frame added by an extension pass.
    pub last_prediction: Option<FramePrediction>,

    // ─────────────────────────────────────────────────────────────────────────
    // From save
    // ─────────────────────────────────────────────────────────────────────────
    pub saved_to: Option<PathBuf>,
}

impl GoniometerState {
    /// Whether `step_setup` has resolved the calibrant and detector.
    pub fn is_configured(&self) -> bool {
        self.calibrant.is_some() && self.detector.is_some()
    }

    pub fn require_calibrant(&self) -> Result<&Calibrant> {
        self.calibrant
            .as_ref()
            .ok_or_else(|| anyhow!("engine not configured; run step_setup first"))
    }
}

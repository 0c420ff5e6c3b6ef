use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::{RegistryError, normalize_key};
use crate::{Length, Real};

/// Flat pixel detector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detector {
    pub name: String,
    /// Pixel size along the slow axis, metres.
    pub pixel1: Length,
    /// Pixel size along the fast axis, metres.
    pub pixel2: Length,
    /// `(rows, cols)`.
    pub shape: (usize, usize),
}

impl Detector {
    pub fn new(name: impl Into<String>, pixel: Length, shape: (usize, usize)) -> Self {
        Self {
            name: name.into(),
            pixel1: pixel,
            pixel2: pixel,
            shape,
        }
    }

    /// Sensor extent `(height, width)` in metres.
    pub fn size(&self) -> (Real, Real) {
        (
            self.shape.0 as Real * self.pixel1,
            self.shape.1 as Real * self.pixel2,
        )
    }
}

#[derive(Debug, Clone)]
pub struct DetectorRegistry {
    entries: BTreeMap<String, Detector>,
}

impl Default for DetectorRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl DetectorRegistry {
    pub fn empty() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    pub fn with_builtins() -> Self {
        let builtins = [
            Detector::new("Pilatus100k", 172e-6, (195, 487)),
            Detector::new("Pilatus300k", 172e-6, (619, 487)),
            Detector::new("Pilatus1M", 172e-6, (1043, 981)),
            Detector::new("Pilatus2M", 172e-6, (1679, 1475)),
            Detector::new("Pilatus6M", 172e-6, (2527, 2463)),
            Detector::new("Eiger1M", 75e-6, (1065, 1030)),
            Detector::new("Eiger4M", 75e-6, (2167, 2070)),
            Detector::new("Eiger9M", 75e-6, (3269, 3110)),
            Detector::new("Eiger16M", 75e-6, (4371, 4150)),
            Detector::new("Xpad S540 flat", 130e-6, (960, 560)),
            Detector::new("Mar345", 100e-6, (3450, 3450)),
            Detector::new("Perkin", 200e-6, (2048, 2048)),
        ];
        let mut registry = Self::empty();
        for detector in builtins {
            registry.register(detector);
        }
        registry
    }

    /// Add or replace a detector, keyed by its normalised name.
    pub fn register(&mut self, detector: Detector) {
        self.entries.insert(normalize_key(&detector.name), detector);
    }

    pub fn get(&self, name: &str) -> Result<Detector, RegistryError> {
        self.entries
            .get(&normalize_key(name))
            .cloned()
            .ok_or_else(|| RegistryError::UnknownDetector(name.to_owned()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(&normalize_key(name))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.values().map(|d| d.name.as_str())
    }
}

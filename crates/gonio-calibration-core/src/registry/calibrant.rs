use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::{RegistryError, normalize_key};
use crate::{Real, Wavelength, metres_to_angstrom};

/// Smallest d-spacing generated for built-in calibrants, in angstrom.
const MIN_D_SPACING: Real = 0.5;

/// Calibrant model at a given wavelength.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Calibrant {
    pub name: String,
    /// Lattice plane spacings in angstrom, largest first.
    pub d_spacings: Vec<Real>,
    /// Wavelength in metres.
    pub wavelength: Wavelength,
}

impl Calibrant {
    /// Scattering angle 2θ (radians) of `ring`, if the ring is observable.
    pub fn two_theta(&self, ring: usize) -> Option<Real> {
        let d = *self.d_spacings.get(ring)?;
        let sin_theta = metres_to_angstrom(self.wavelength) / (2.0 * d);
        (sin_theta <= 1.0).then(|| 2.0 * sin_theta.asin())
    }

    /// 2θ of every observable ring, in ring order.
    pub fn two_theta_all(&self) -> Vec<Real> {
        (0..self.d_spacings.len())
            .map_while(|ring| self.two_theta(ring))
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Centering {
    Primitive,
    BodyCentered,
    FaceCentered,
    /// Face-centred with the diamond-glide extinctions.
    Diamond,
}

impl Centering {
    fn allows(self, h: i32, k: i32, l: i32) -> bool {
        match self {
            Centering::Primitive => true,
            Centering::BodyCentered => (h + k + l) % 2 == 0,
            Centering::FaceCentered => {
                let parity = [h, k, l].map(|i| i.rem_euclid(2));
                parity[0] == parity[1] && parity[1] == parity[2]
            }
            Centering::Diamond => {
                let all_even = [h, k, l].iter().all(|i| i % 2 == 0);
                Centering::FaceCentered.allows(h, k, l) && !(all_even && (h + k + l) % 4 == 2)
            }
        }
    }
}

/// Cubic crystal lattice.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CubicLattice {
    /// Lattice constant in angstrom.
    pub a: Real,
    pub centering: Centering,
}

impl CubicLattice {
    /// Distinct d-spacings down to `min_d`, largest first.
    pub fn d_spacings(&self, min_d: Real) -> Vec<Real> {
        let max_index = (self.a / min_d).ceil() as i32;
        let mut sums = Vec::new();
        for h in 0..=max_index {
            for k in 0..=h {
                for l in 0..=k {
                    let s = h * h + k * k + l * l;
                    if s == 0 || !self.centering.allows(h, k, l) {
                        continue;
                    }
                    if self.a / (s as Real).sqrt() >= min_d {
                        sums.push(s);
                    }
                }
            }
        }
        sums.sort_unstable();
        sums.dedup();
        sums.into_iter()
            .map(|s| self.a / (s as Real).sqrt())
            .collect()
    }
}

/// Calibrant lookup table.
#[derive(Debug, Clone)]
pub struct CalibrantRegistry {
    entries: BTreeMap<String, (String, Vec<Real>)>,
}

impl Default for CalibrantRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl CalibrantRegistry {
    pub fn empty() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    /// Registry holding the built-in cubic calibrants.
    pub fn with_builtins() -> Self {
        const BUILTINS: [(&str, Real, Centering); 6] = [
            ("LaB6", 4.156_916_2, Centering::Primitive),
            ("CeO2", 5.411_651, Centering::FaceCentered),
            ("Si", 5.431_179, Centering::Diamond),
            ("Au", 4.078_2, Centering::FaceCentered),
            ("NaCl", 5.640_2, Centering::FaceCentered),
            ("W", 3.164_75, Centering::BodyCentered),
        ];
        let mut registry = Self::empty();
        for (name, a, centering) in BUILTINS {
            let lattice = CubicLattice { a, centering };
            registry.register(name, lattice.d_spacings(MIN_D_SPACING));
        }
        registry
    }

    /// Add or replace a calibrant.
    pub fn register(&mut self, name: impl Into<String>, mut d_spacings: Vec<Real>) {
        let name = name.into();
        d_spacings.sort_by(|a, b| b.total_cmp(a));
        self.entries.insert(normalize_key(&name), (name, d_spacings));
    }

    /// Register a `.D` file: one d-spacing (angstrom) per line, `#` comments.
    ///
    /// The calibrant is named after the file stem.
    pub fn load_file(&mut self, path: impl AsRef<Path>) -> Result<String, RegistryError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| RegistryError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut d_spacings = Vec::new();
        for line in text.lines() {
            let content = line.split('#').next().unwrap_or_default().trim();
            let Some(token) = content.split_whitespace().next() else {
                continue;
            };
            let d = token.parse::<Real>().map_err(|_| RegistryError::Malformed {
                path: path.to_path_buf(),
                reason: format!("not a d-spacing: {token:?}"),
            })?;
            d_spacings.push(d);
        }
        if d_spacings.is_empty() {
            return Err(RegistryError::Malformed {
                path: path.to_path_buf(),
                reason: "no d-spacings".into(),
            });
        }
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        log::debug!("registered calibrant {name} with {} rings", d_spacings.len());
        self.register(name.clone(), d_spacings);
        Ok(name)
    }

    /// Calibrant `name` at `wavelength` (metres).
    pub fn get(&self, name: &str, wavelength: Wavelength) -> Result<Calibrant, RegistryError> {
        let (display, d_spacings) = self
            .entries
            .get(&normalize_key(name))
            .ok_or_else(|| RegistryError::UnknownCalibrant(name.to_owned()))?;
        Ok(Calibrant {
            name: display.clone(),
            d_spacings: d_spacings.clone(),
            wavelength,
        })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(&normalize_key(name))
    }

    /// Display names, sorted by key.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.values().map(|(name, _)| name.as_str())
    }
}

//! Synthetic containers and jobs for tests across the workspace.
//!
//! Public so that integration tests in other crates can use it; not meant for
//! production use.

use std::path::Path;

use crate::container::{Container, Dataset, Group};
use crate::job::Calibration;
use crate::locator::DatasetPath;
use crate::params::CalibrationParameters;
use crate::Image;

/// Angle step between consecutive synthetic frames, in degrees.
pub const DELTA_STEP: f64 = 0.5;

/// Pixel value of synthetic frame `idx` at `(row, col)`.
pub fn synthetic_pixel(idx: usize, row: usize, col: usize, cols: usize) -> f64 {
    (idx * 100 + row * cols + col) as f64
}

/// Container with a `frames x rows x cols` image stack and one angle per frame.
///
/// Layout:
///
/// ```text
/// entry                      (group, attrs: NX_class = "NXentry")
/// entry/instrument/name      (dataset)
/// entry/scan_data/images     (dataset, attrs: interpretation = "image")
/// entry/scan_data/delta      (dataset, attrs: long_name = "delta", units = "deg")
/// ```
///
/// Frame `idx` has angle `idx * DELTA_STEP`.
pub fn synthetic_container(frames: usize, rows: usize, cols: usize) -> Container {
    let images: Vec<Image> = (0..frames)
        .map(|idx| Image::from_fn(rows, cols, |r, c| synthetic_pixel(idx, r, c, cols)))
        .collect();
    let deltas: Vec<f64> = (0..frames).map(|idx| idx as f64 * DELTA_STEP).collect();

    let images = Dataset::from_images(&images)
        .expect("synthetic images share a shape")
        .with_attr("interpretation", "image");
    let deltas = Dataset::from_scalars(deltas)
        .with_attr("long_name", "delta")
        .with_attr("units", "deg");

    let instrument = Group::new()
        .with_dataset("name", Dataset::from_scalars(vec![0.0]))
        .expect("unique name");
    let scan_data = Group::new()
        .with_dataset("images", images)
        .expect("unique name")
        .with_dataset("delta", deltas)
        .expect("unique name");
    let entry = Group::new()
        .with_attr("NX_class", "NXentry")
        .with_group("instrument", instrument)
        .expect("unique name")
        .with_group("scan_data", scan_data)
        .expect("unique name");
    Container::new(Group::new().with_group("entry", entry).expect("unique name"))
}

/// Job matching [`synthetic_container`] stored at `filename`.
pub fn synthetic_job(filename: impl AsRef<Path>) -> Calibration {
    Calibration {
        filename: filename.as_ref().to_path_buf(),
        images_path: DatasetPath::contains("scan_data/images"),
        deltas_path: DatasetPath::with_attribute("long_name", "delta"),
        idxs: vec![0, 2],
        calibrant: "LaB6".into(),
        detector: "Xpad S540 flat".into(),
        wavelength: 0.6888e-10,
        initial_parameters: CalibrationParameters::default(),
        artifact_dir: None,
    }
}

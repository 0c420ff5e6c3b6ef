use nalgebra::{DMatrix, Point2};

pub type Real = f64;

/// Scalar angle in degrees, as stored in the goniometer angle dataset.
pub type Angle = Real;
/// Length in metres.
pub type Length = Real;
/// Radiation wavelength in metres.
pub type Wavelength = Real;

pub type Pt2 = Point2<Real>;

/// A single detector frame, `rows x cols`.
pub type Image = DMatrix<Real>;

/// Convert a wavelength in metres to angstrom.
pub fn metres_to_angstrom(wavelength: Wavelength) -> Real {
    wavelength * 1e10
}

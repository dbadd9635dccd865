//! Rotation matrices applied to homogeneous control points.

use std::f64::consts::{FRAC_PI_2, PI};

use iga_core::{IgaError, Result};

use crate::{Matrix2, Matrix3, Vector3};

/// Counter-clockwise rotation in the plane.
pub fn rotation_2d(angle: f64) -> Matrix2<f64> {
    let (s, c) = angle.sin_cos();
    Matrix2::new(c, -s, s, c)
}

/// Rotation by `angle` about `axis`, with the sine and cosine scaled by `r`.
///
/// With `r = 1` this is a proper rotation. Revolving uses `r = 1 / cos(angle)`
/// to place the middle control point of a circular arc.
/// Quarter and half turns are treated exactly so that no round-off leaks into
/// the zero entries.
pub fn rotation_3d(axis: &Vector3<f64>, angle: f64, r: f64) -> Result<Matrix3<f64>> {
    let l2 = axis.norm_squared();
    if l2 <= 0.0 {
        return Err(IgaError::InvalidOperation(
            "3D rotation axis is undefined".into(),
        ));
    }
    let l = l2.sqrt();

    let (s, c, c1) = if angle.abs() == FRAC_PI_2 {
        (r * angle.signum(), 0.0, -1.0)
    } else if angle.abs() == PI {
        (0.0, -r, -r - 1.0)
    } else {
        let c = r * angle.cos();
        (r * angle.sin(), c, c - 1.0)
    };

    let (n0, n1, n2) = (axis[0], axis[1], axis[2]);
    Ok(Matrix3::new(
        (n0 * n0 + (n1 * n1 + n2 * n2) * c) / l2,
        -(n0 * n1 * c1) / l2 - (n2 * s) / l,
        -(n0 * n2 * c1) / l2 + (n1 * s) / l,
        -(n0 * n1 * c1) / l2 + (n2 * s) / l,
        (n1 * n1 + (n0 * n0 + n2 * n2) * c) / l2,
        -(n1 * n2 * c1) / l2 - (n0 * s) / l,
        -(n0 * n2 * c1) / l2 - (n1 * s) / l,
        -(n1 * n2 * c1) / l2 + (n0 * s) / l,
        (n2 * n2 + (n0 * n0 + n1 * n1) * c) / l2,
    ))
}

//! Patches built from other patches: linear blends and revolutions.

use iga_core::{IgaError, Result};
use iga_math::{rotation_3d, Vector3};

use super::NurbsPatch;
use crate::knot::KnotVector;

/// Patch one parametric dimension higher that blends `p1` (at 0) into `p2`
/// (at 1) linearly.
///
/// Both inputs are first refined to common knot vectors, which is why they
/// are taken mutably.
pub fn interpolate(p1: &mut NurbsPatch, p2: &mut NurbsPatch) -> Result<NurbsPatch> {
    if p1.param_dim() != p2.param_dim() || p1.dim() != p2.dim() {
        return Err(IgaError::Patch(format!(
            "interpolate: patches differ in shape ({} directions, {} components) vs \
             ({} directions, {} components)",
            p1.param_dim(),
            p1.dim(),
            p2.param_dim(),
            p2.dim()
        )));
    }
    if p1.param_dim() >= 3 {
        return Err(IgaError::Patch(
            "interpolate: patches are already three-dimensional".into(),
        ));
    }
    for dir in 0..p1.param_dim() {
        if p1.kv[dir].order() < p2.kv[dir].order() {
            p1.knot_insert_kv(dir, &p2.kv[dir])?;
            p2.knot_insert_kv(dir, &p1.kv[dir])?;
        } else {
            p2.knot_insert_kv(dir, &p1.kv[dir])?;
            p1.knot_insert_kv(dir, &p2.kv[dir])?;
        }
    }
    let mut kv = p1.kv.clone();
    kv.push(KnotVector::new(1, vec![0.0, 0.0, 1.0, 1.0])?);
    let mut data = Vec::with_capacity(p1.data.len() * 2);
    data.extend_from_slice(&p1.data);
    data.extend_from_slice(&p2.data);
    NurbsPatch::from_data(kv, p1.dim, data)
}

/// Sweep a patch in space `times` times by `angle` about `axis`.
///
/// The new direction is quadratic with a double knot between consecutive
/// arcs, so every sweep is an exact circular arc.
pub fn revolve_3d(
    patch: &NurbsPatch,
    axis: &Vector3<f64>,
    angle: f64,
    times: usize,
) -> Result<NurbsPatch> {
    if patch.dim() != 4 {
        return Err(IgaError::Patch(format!(
            "revolve_3d: needs a patch in space, got spatial dimension {}",
            patch.spatial_dim()
        )));
    }
    if patch.param_dim() >= 3 {
        return Err(IgaError::Patch(
            "revolve_3d: patch is already three-dimensional".into(),
        ));
    }
    if times == 0 {
        return Err(IgaError::InvalidOperation(
            "revolve_3d: at least one sweep is needed".into(),
        ));
    }

    let mut knots = vec![0.0; 3];
    for i in 1..times {
        knots.extend([i as f64; 2]);
    }
    knots.extend([times as f64; 3]);
    let mut kv = patch.kv.clone();
    kv.push(KnotVector::new(2, knots)?);
    let mut out = NurbsPatch::new(kv, 4)?;

    let t = rotation_3d(axis, angle, 1.0)?;
    let c = (angle / 2.0).cos();
    let t2 = rotation_3d(axis, angle / 2.0, 1.0 / c)? * c;

    let size = patch.num_points();
    let block = 4 * size;
    for (i, op) in patch.data.chunks(4).enumerate() {
        let mut np = 4 * i;
        out.data[np..np + 4].copy_from_slice(op);
        for _ in 0..times {
            let u = Vector3::new(out.data[np], out.data[np + 1], out.data[np + 2]);
            let w = out.data[np + 3];
            let mid = t2 * u;
            let end = t * u;
            np += block;
            out.data[np..np + 3].copy_from_slice(mid.as_slice());
            out.data[np + 3] = c * w;
            np += block;
            out.data[np..np + 3].copy_from_slice(end.as_slice());
            out.data[np + 3] = w;
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f64::consts::FRAC_PI_2;

    fn segment(y: f64, order: usize) -> NurbsPatch {
        let mut knots = vec![0.0; order + 1];
        knots.extend(vec![1.0; order + 1]);
        let kv = KnotVector::new(order, knots).unwrap();
        let mut patch = NurbsPatch::new(vec![kv], 3).unwrap();
        for i in 0..=order {
            let x = i as f64 / order as f64;
            patch.set(&[i], 0, x).unwrap();
            patch.set(&[i], 1, y).unwrap();
            patch.set_weight(&[i], 1.0).unwrap();
        }
        patch
    }

    #[test]
    fn test_interpolate_blends_linearly() {
        let mut bottom = segment(0.0, 1);
        let mut top = segment(2.0, 2);
        top.knot_insert(0, &[0.5]).unwrap();
        let sheet = interpolate(&mut bottom, &mut top).unwrap();
        assert_eq!(sheet.param_dim(), 2);
        assert_eq!(bottom.knot_vector(0).unwrap(), top.knot_vector(0).unwrap());
        assert_eq!(sheet.knot_vector(0).unwrap(), top.knot_vector(0).unwrap());
        let x = sheet.evaluate(&[0.3, 0.25]).unwrap();
        assert_relative_eq!(x[0], 0.3, epsilon = 1e-12);
        assert_relative_eq!(x[1], 0.5, epsilon = 1e-12);
    }

    #[test]
    fn test_interpolate_shape_mismatch() {
        let mut a = segment(0.0, 1);
        let k = KnotVector::new(1, vec![0.0, 0.0, 1.0, 1.0]).unwrap();
        let mut b = NurbsPatch::new(vec![k.clone(), k], 3).unwrap();
        assert!(interpolate(&mut a, &mut b).is_err());
    }

    #[test]
    fn test_revolve_point_traces_circle() {
        let kv = KnotVector::new(1, vec![0.0, 0.0, 1.0, 1.0]).unwrap();
        let line = NurbsPatch::from_data(
            vec![kv],
            4,
            vec![1.0, 0.0, 0.0, 1.0, 1.0, 0.0, 1.0, 1.0],
        )
        .unwrap();
        let surface = revolve_3d(&line, &Vector3::z(), FRAC_PI_2, 4).unwrap();
        assert_eq!(surface.ncp(1).unwrap(), 9);
        assert_eq!(surface.knot_vector(1).unwrap().element_count(), 4);
        for i in 0..=40 {
            let v = i as f64 / 10.0;
            let x = surface.evaluate(&[0.5, v]).unwrap();
            assert_relative_eq!(x[0].hypot(x[1]), 1.0, epsilon = 1e-12);
            assert_relative_eq!(x[2], 0.5, epsilon = 1e-12);
        }
        let quarter = surface.evaluate(&[0.0, 1.0]).unwrap();
        assert_relative_eq!(quarter[0], 0.0, epsilon = 1e-12);
        assert_relative_eq!(quarter[1], 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_revolve_needs_space() {
        let planar = segment(0.0, 1);
        assert!(revolve_3d(&planar, &Vector3::z(), FRAC_PI_2, 1).is_err());
    }
}

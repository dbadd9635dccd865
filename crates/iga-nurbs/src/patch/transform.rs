//! Direction flips and swaps, rigid rotations.

use iga_core::{IgaError, Result};
use iga_math::{rotation_2d, rotation_3d, Vector2, Vector3};

use super::NurbsPatch;

impl NurbsPatch {
    /// Reverse direction `dir`: control points and knots run backwards and
    /// the parameter maps as `u -> a + b - u`.
    pub fn flip_direction(&mut self, dir: usize) -> Result<()> {
        let mut rows = self.slices(dir)?;
        rows.reverse();
        let mut kv = self.kv[dir].clone();
        kv.flip();
        let patch = self.rebuilt(dir, kv, &rows)?;
        *self = patch;
        Ok(())
    }

    /// Exchange the roles of two neighbouring directions.
    pub fn swap_directions(&mut self, dir1: usize, dir2: usize) -> Result<()> {
        self.check_dir(dir1, "swap_directions")?;
        self.check_dir(dir2, "swap_directions")?;
        if dir1.abs_diff(dir2) == 2 {
            return Err(IgaError::InvalidOperation(
                "swap_directions: directions 0 and 2 cannot be swapped".into(),
            ));
        }
        if dir1 == dir2 {
            return Ok(());
        }
        let mut kv = self.kv.clone();
        kv.swap(dir1, dir2);
        let mut patch = NurbsPatch::new(kv, self.dim)?;
        let from = self.loop_direction(dir1)?;
        let to = patch.loop_direction(dir2)?;
        for id in 0..from.nd {
            for i in 0..from.ls {
                patch.data[to.offset(id, i)] = self.data[from.offset(id, i)];
            }
        }
        *self = patch;
        Ok(())
    }

    /// Rotate in the plane for planar patches, otherwise about `axis`.
    pub fn rotate(&mut self, angle: f64, axis: Option<&Vector3<f64>>) -> Result<()> {
        if self.dim == 3 {
            return self.rotate_2d(angle);
        }
        let axis = axis.ok_or_else(|| {
            IgaError::InvalidOperation("rotate: a 3D rotation needs an axis".into())
        })?;
        self.rotate_3d(axis, angle)
    }

    pub fn rotate_2d(&mut self, angle: f64) -> Result<()> {
        if self.dim != 3 {
            return Err(IgaError::InvalidOperation(format!(
                "rotate_2d: patch has spatial dimension {}",
                self.spatial_dim()
            )));
        }
        let t = rotation_2d(angle);
        for pt in self.data.chunks_mut(3) {
            let y = t * Vector2::new(pt[0], pt[1]);
            pt[0] = y[0];
            pt[1] = y[1];
        }
        Ok(())
    }

    pub fn rotate_3d(&mut self, axis: &Vector3<f64>, angle: f64) -> Result<()> {
        if self.dim != 4 {
            return Err(IgaError::InvalidOperation(format!(
                "rotate_3d: patch has spatial dimension {}",
                self.spatial_dim()
            )));
        }
        let t = rotation_3d(axis, angle, 1.0)?;
        for pt in self.data.chunks_mut(4) {
            let y = t * Vector3::new(pt[0], pt[1], pt[2]);
            pt[..3].copy_from_slice(y.as_slice());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::KnotVector;
    use approx::assert_relative_eq;
    use std::f64::consts::FRAC_PI_2;

    fn sheet() -> NurbsPatch {
        let k0 = KnotVector::new(2, vec![0.0, 0.0, 0.0, 0.4, 1.0, 1.0, 1.0]).unwrap();
        let k1 = KnotVector::new(1, vec![0.0, 0.0, 1.0, 1.0]).unwrap();
        let mut patch = NurbsPatch::new(vec![k0, k1], 3).unwrap();
        for j in 0..2 {
            for i in 0..4 {
                let w = 1.0 + 0.25 * i as f64;
                patch.set(&[i, j], 0, w * i as f64).unwrap();
                patch.set(&[i, j], 1, w * (j as f64 + 0.1 * (i * i) as f64)).unwrap();
                patch.set_weight(&[i, j], w).unwrap();
            }
        }
        patch
    }

    #[test]
    fn test_flip_reparametrizes() {
        let original = sheet();
        let mut patch = original.clone();
        patch.flip_direction(0).unwrap();
        for (u, v) in [(0.1, 0.2), (0.4, 0.9), (0.75, 0.5)] {
            let a = original.evaluate(&[u, v]).unwrap();
            let b = patch.evaluate(&[1.0 - u, v]).unwrap();
            assert_relative_eq!(a[0], b[0], epsilon = 1e-12);
            assert_relative_eq!(a[1], b[1], epsilon = 1e-12);
        }
        patch.flip_direction(0).unwrap();
        assert_eq!(patch.knot_vector(0).unwrap(), original.knot_vector(0).unwrap());
    }

    #[test]
    fn test_swap_transposes() {
        let original = sheet();
        let mut patch = original.clone();
        patch.swap_directions(0, 1).unwrap();
        assert_eq!(patch.ncp(0).unwrap(), 2);
        assert_eq!(patch.ncp(1).unwrap(), 4);
        for (u, v) in [(0.1, 0.2), (0.4, 0.9), (0.75, 0.5)] {
            let a = original.evaluate(&[u, v]).unwrap();
            let b = patch.evaluate(&[v, u]).unwrap();
            assert_relative_eq!(a[0], b[0], epsilon = 1e-12);
            assert_relative_eq!(a[1], b[1], epsilon = 1e-12);
        }
    }

    #[test]
    fn test_swap_first_and_last_rejected() {
        let k = KnotVector::new(1, vec![0.0, 0.0, 1.0, 1.0]).unwrap();
        let mut patch = NurbsPatch::new(vec![k.clone(), k.clone(), k], 4).unwrap();
        assert!(patch.swap_directions(0, 2).is_err());
        assert!(patch.swap_directions(1, 2).is_ok());
    }

    #[test]
    fn test_rotate_quarter_turn() {
        let original = sheet();
        let mut patch = original.clone();
        patch.rotate(FRAC_PI_2, None).unwrap();
        let a = original.evaluate(&[0.3, 0.6]).unwrap();
        let b = patch.evaluate(&[0.3, 0.6]).unwrap();
        assert_relative_eq!(b[0], -a[1], epsilon = 1e-12);
        assert_relative_eq!(b[1], a[0], epsilon = 1e-12);
    }

    #[test]
    fn test_rotate_3d_needs_axis() {
        let k = KnotVector::new(1, vec![0.0, 0.0, 1.0, 1.0]).unwrap();
        let mut patch = NurbsPatch::from_data(vec![k], 4, vec![1.0, 0.0, 0.0, 1.0, 2.0, 0.0, 0.0, 1.0]).unwrap();
        assert!(patch.rotate(FRAC_PI_2, None).is_err());
        patch.rotate(FRAC_PI_2, Some(&Vector3::z())).unwrap();
        let x = patch.evaluate(&[1.0]).unwrap();
        assert_relative_eq!(x[0], 0.0, epsilon = 1e-12);
        assert_relative_eq!(x[1], 2.0, epsilon = 1e-12);
    }
}

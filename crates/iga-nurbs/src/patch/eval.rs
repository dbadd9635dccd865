use iga_core::{IgaError, Result};

use super::NurbsPatch;

impl NurbsPatch {
    /// Physical point at the parametric coordinates `u`.
    pub fn evaluate(&self, u: &[f64]) -> Result<Vec<f64>> {
        let w = self.evaluate_homogeneous(u)?;
        let weight = w[self.dim - 1];
        if weight == 0.0 {
            return Err(IgaError::Patch(format!(
                "Rational denominator vanishes at {u:?}"
            )));
        }
        Ok(w[..self.dim - 1].iter().map(|v| v / weight).collect())
    }

    /// Weighted coordinates and weight at `u`, before the projection.
    pub fn evaluate_homogeneous(&self, u: &[f64]) -> Result<Vec<f64>> {
        if u.len() != self.kv.len() {
            return Err(IgaError::Patch(format!(
                "evaluate: {} coordinates for a patch with {} directions",
                u.len(),
                self.kv.len()
            )));
        }
        let bases = self
            .kv
            .iter()
            .zip(u)
            .map(|(kv, &x)| kv.eval_basis(x))
            .collect::<Result<Vec<_>>>()?;
        let counts: Vec<usize> = bases.iter().map(|(_, b)| b.len()).collect();
        let total: usize = counts.iter().product();

        let mut acc = vec![0.0; self.dim];
        let mut ijk = vec![0; bases.len()];
        for flat in 0..total {
            let mut rem = flat;
            let mut n = 1.0;
            for (d, (first, shape)) in bases.iter().enumerate() {
                let l = rem % counts[d];
                rem /= counts[d];
                ijk[d] = first + l;
                n *= shape[l];
            }
            let p = self.point_index(&ijk)? * self.dim;
            for (a, v) in acc.iter_mut().zip(&self.data[p..p + self.dim]) {
                *a += n * v;
            }
        }
        Ok(acc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::KnotVector;
    use approx::assert_relative_eq;

    #[test]
    fn test_quarter_circle() {
        let kv = KnotVector::new(2, vec![0.0, 0.0, 0.0, 1.0, 1.0, 1.0]).unwrap();
        let s = 0.5f64.sqrt();
        let data = vec![1.0, 0.0, 1.0, s, s, s, 0.0, 1.0, 1.0];
        let patch = NurbsPatch::from_data(vec![kv], 3, data).unwrap();
        for i in 0..=10 {
            let x = patch.evaluate(&[i as f64 / 10.0]).unwrap();
            assert_relative_eq!(x[0].hypot(x[1]), 1.0, epsilon = 1e-12);
        }
        let end = patch.evaluate(&[1.0]).unwrap();
        assert_relative_eq!(end[1], 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_bilinear_square() {
        let kv = KnotVector::new(1, vec![0.0, 0.0, 1.0, 1.0]).unwrap();
        let data = vec![
            0.0, 0.0, 1.0, 2.0, 0.0, 1.0, //
            0.0, 3.0, 1.0, 2.0, 3.0, 1.0,
        ];
        let patch = NurbsPatch::from_data(vec![kv.clone(), kv], 3, data).unwrap();
        let x = patch.evaluate(&[0.25, 0.5]).unwrap();
        assert_relative_eq!(x[0], 0.5);
        assert_relative_eq!(x[1], 1.5);
        assert!(patch.evaluate(&[0.5]).is_err());
        assert!(patch.evaluate(&[0.5, 1.5]).is_err());
    }
}

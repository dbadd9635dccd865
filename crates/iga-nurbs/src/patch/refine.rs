//! Uniform refinement and its inverse.

use iga_core::{IgaError, Result};
use log::debug;

use super::NurbsPatch;
use crate::knot::KnotVector;

impl NurbsPatch {
    /// Split every element of direction `d` into `rf[d]` elements.
    ///
    /// Directions with a spacing rule place the new knots by the rule. On
    /// error the patch is left as it was.
    pub fn uniform_refinement(&mut self, rf: &[usize]) -> Result<()> {
        self.check_count(rf.len(), "uniform_refinement")?;
        if let Some(dir) = rf.iter().position(|&f| f == 0) {
            return Err(IgaError::InvalidOperation(format!(
                "uniform_refinement: factor 0 in direction {dir}"
            )));
        }
        self.transact(|patch| {
            for (dir, &f) in rf.iter().enumerate().filter(|&(_, &f)| f > 1) {
                let mut kv = patch.kv[dir].clone();
                let knots = kv.refinement(f)?;
                debug!(
                    "Refining direction {dir} by {f}: {} new knots",
                    knots.len()
                );
                // The rescaled spacing rule travels with the refined knot vector.
                patch.kv[dir].set_spacing(kv.spacing().cloned());
                patch.knot_insert(dir, &knots)?;
            }
            Ok(())
        })
    }

    pub fn uniform_refinement_all(&mut self, rf: usize) -> Result<()> {
        let factors = vec![rf; self.kv.len()];
        self.uniform_refinement(&factors)
    }

    /// Undo refinement by `cf[d]` in each direction not yet marked coarse.
    ///
    /// Each direction is marked coarse afterwards, so knot vectors shared
    /// between patches are coarsened only once. On error the patch is left
    /// as it was.
    pub fn coarsen(&mut self, cf: &[usize], tol: f64) -> Result<()> {
        self.check_count(cf.len(), "coarsen")?;
        self.transact(|patch| {
            for (dir, &f) in cf.iter().enumerate() {
                if patch.kv[dir].is_coarse() {
                    continue;
                }
                patch.coarsen_direction(dir, f, tol)?;
            }
            Ok(())
        })
    }

    fn coarsen_direction(&mut self, dir: usize, f: usize, tol: f64) -> Result<()> {
        let ne_fine = self.kv[dir].element_count();
        let fine = self.kv[dir].fine_knots(f)?;
        let outcome = self.knot_remove_list(dir, &fine, tol)?;
        if !outcome.is_complete() {
            return Err(IgaError::Tolerance(format!(
                "coarsen: removed {} of {} knots in direction {dir} within tolerance {tol:e}",
                outcome.removed, outcome.requested
            )));
        }

        let kv = &mut self.kv[dir];
        kv.set_coarse(true);
        kv.count_elements();
        let ne_coarse = kv.element_count();
        if ne_fine != f * ne_coarse {
            return Err(IgaError::Knot(format!(
                "coarsen: {ne_fine} fine elements in direction {dir} are not {f} times \
                 {ne_coarse} coarse elements"
            )));
        }
        if let Some(rule) = kv.spacing_mut() {
            rule.set_size(ne_coarse);
            rule.scale_parameters(f as f64);
        }
        debug!("Coarsened direction {dir} by {f}: {ne_fine} -> {ne_coarse} elements");
        Ok(())
    }

    pub fn coarsen_all(&mut self, cf: usize, tol: f64) -> Result<()> {
        let factors = vec![cf; self.kv.len()];
        self.coarsen(&factors, tol)
    }

    /// Per-direction factor by which the spacing rules allow coarsening.
    pub fn coarsening_factors(&self) -> Vec<usize> {
        self.kv.iter().map(KnotVector::coarsening_factor).collect()
    }

    pub fn set_knot_vectors_coarse(&mut self, coarse: bool) {
        for kv in &mut self.kv {
            kv.set_coarse(coarse);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SpacingRule;
    use approx::assert_relative_eq;

    fn square(order: usize) -> NurbsPatch {
        let kv = KnotVector::new(order, {
            let mut k = vec![0.0; order + 1];
            k.push(0.5);
            k.extend(vec![1.0; order + 1]);
            k
        })
        .unwrap();
        let mut patch = NurbsPatch::new(vec![kv.clone(), kv], 3).unwrap();
        let n = patch.ncp(0).unwrap();
        for j in 0..n {
            for i in 0..n {
                let w = 1.0 + 0.1 * ((i + j) % 3) as f64;
                patch.set(&[i, j], 0, w * i as f64).unwrap();
                patch.set(&[i, j], 1, w * (j * j) as f64).unwrap();
                patch.set_weight(&[i, j], w).unwrap();
            }
        }
        patch
    }

    #[test]
    fn test_refine_then_coarsen() {
        let original = square(2);
        let mut patch = original.clone();
        patch.uniform_refinement(&[2, 3]).unwrap();
        assert_eq!(patch.knot_vector(0).unwrap().element_count(), 4);
        assert_eq!(patch.knot_vector(1).unwrap().element_count(), 6);

        patch.coarsen(&[2, 3], 1e-10).unwrap();
        assert!(patch.knot_vector(0).unwrap().is_coarse());
        for dir in 0..2 {
            assert_eq!(
                patch.knot_vector(dir).unwrap().knots(),
                original.knot_vector(dir).unwrap().knots()
            );
        }
        for (a, b) in patch.data().iter().zip(original.data()) {
            assert_relative_eq!(a, b, epsilon = 1e-10);
        }
    }

    #[test]
    fn test_coarse_direction_is_skipped() {
        let mut patch = square(2);
        patch.uniform_refinement_all(2).unwrap();
        patch.set_knot_vectors_coarse(true);
        let before = patch.clone();
        patch.coarsen_all(2, 1e-10).unwrap();
        assert_eq!(patch, before);
    }

    #[test]
    fn test_coarsen_indivisible() {
        let mut patch = square(2);
        patch.uniform_refinement(&[3, 1]).unwrap();
        let refined = patch.clone();
        assert!(patch.coarsen(&[4, 1], 1e-10).is_err());
        assert_eq!(patch, refined);
    }

    #[test]
    fn test_failed_coarsening_keeps_earlier_directions() {
        let mut patch = square(2);
        patch.uniform_refinement(&[2, 3]).unwrap();
        let refined = patch.clone();

        // The first direction coarsens cleanly, 4 does not divide the 6
        // elements of the second.
        assert!(patch.coarsen(&[2, 4], 1e-10).is_err());
        assert_eq!(patch, refined);
        assert!(!patch.knot_vector(0).unwrap().is_coarse());
    }

    #[test]
    fn test_failed_refinement_keeps_spacing() {
        let kv = KnotVector::new(1, vec![0.0, 0.0, 1.0, 1.0]).unwrap();
        let mut patch = NurbsPatch::from_data(vec![kv.clone(), kv], 3, vec![0.0; 12]).unwrap();
        let rule = SpacingRule::Geometric {
            n: 1,
            reverse: false,
            scale: false,
            ratio: 2.0,
        };
        patch.knot_vector_mut(0).unwrap().set_spacing(Some(rule));
        let original = patch.clone();

        assert!(patch.uniform_refinement(&[3, 0]).is_err());
        assert_eq!(patch, original);
    }

    #[test]
    fn test_geometric_rule_refinement_and_coarsening() {
        let kv = KnotVector::new(1, vec![0.0, 0.0, 1.0, 1.0]).unwrap();
        let mut patch = NurbsPatch::from_data(vec![kv], 2, vec![0.0, 1.0, 3.0, 1.0]).unwrap();
        let rule = SpacingRule::Geometric {
            n: 1,
            reverse: false,
            scale: false,
            ratio: 2.0,
        };
        patch.knot_vector_mut(0).unwrap().set_spacing(Some(rule));
        assert_eq!(patch.coarsening_factors(), vec![1]);

        patch.uniform_refinement(&[3]).unwrap();
        let kv = patch.knot_vector(0).unwrap();
        assert_eq!(kv.element_count(), 3);
        // Element lengths 1/7, 2/7, 4/7.
        assert_relative_eq!(kv.knot(2).unwrap(), 1.0 / 7.0, epsilon = 1e-14);
        assert_relative_eq!(kv.knot(3).unwrap(), 3.0 / 7.0, epsilon = 1e-14);
        assert_eq!(kv.spacing().map(SpacingRule::size), Some(3));
        assert_eq!(patch.coarsening_factors(), vec![3]);

        patch.coarsen(&[3], 1e-10).unwrap();
        let kv = patch.knot_vector(0).unwrap();
        assert_eq!(kv.element_count(), 1);
        assert_eq!(kv.spacing().map(SpacingRule::size), Some(1));
    }
}

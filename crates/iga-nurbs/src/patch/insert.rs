//! Knot insertion (Boehm) along one direction of a patch.

use iga_core::{IgaError, Result};

use super::{combine, NurbsPatch};
use crate::knot::KnotVector;

impl NurbsPatch {
    /// Insert the ascending knots `knots` in direction `dir`.
    ///
    /// The curve or surface is unchanged; the patch gains one control point
    /// per inserted knot.
    pub fn knot_insert(&mut self, dir: usize, knots: &[f64]) -> Result<()> {
        self.check_dir(dir, "knot_insert")?;
        if knots.is_empty() {
            return Ok(());
        }
        if knots.windows(2).any(|w| w[1] < w[0]) {
            return Err(IgaError::Knot(format!(
                "knot_insert: knots must be ascending, got {knots:?}"
            )));
        }
        let okv = &self.kv[dir];
        let p = okv.order();
        if p == 0 {
            return Err(IgaError::Knot(
                "knot_insert: order 0 knot vectors cannot be refined".into(),
            ));
        }
        let u = okv.knots();
        let n_old = okv.ncp();
        let m = n_old + p;
        let rr = knots.len() - 1;
        let a = okv.find_knot_span(knots[0])? - 1;
        let b = okv.find_knot_span(knots[rr])? - 1;

        let old = self.slices(dir)?;
        let mut rows = vec![Vec::new(); n_old + rr + 1];
        let mut ubar = vec![0.0; u.len() + rr + 1];

        ubar[..=a].copy_from_slice(&u[..=a]);
        for j in b + p..=m {
            ubar[j + rr + 1] = u[j];
        }
        rows[..=a - p].clone_from_slice(&old[..=a - p]);
        for j in b - 1..n_old {
            rows[j + rr + 1] = old[j].clone();
        }

        let mut i = b + p - 1;
        let mut k = b + p + rr;
        for &x in knots.iter().rev() {
            while x <= u[i] && i > a {
                rows[k - p - 1] = old[i - p - 1].clone();
                ubar[k] = u[i];
                k -= 1;
                i -= 1;
            }
            rows[k - p - 1] = rows[k - p].clone();
            for l in 1..=p {
                let ind = k - p + l;
                let alfa = ubar[k + l] - x;
                if alfa == 0.0 {
                    rows[ind - 1] = rows[ind].clone();
                } else {
                    let alfa = alfa / (ubar[k + l] - u[i - p + l]);
                    rows[ind - 1] = combine(alfa, &rows[ind - 1], 1.0 - alfa, &rows[ind]);
                }
            }
            ubar[k] = x;
            k -= 1;
        }

        let mut nkv = KnotVector::new(p, ubar)?;
        nkv.set_spacing(okv.spacing().cloned());
        let patch = self.rebuilt(dir, nkv, &rows)?;
        *self = patch;
        Ok(())
    }

    /// Insert whatever `target` has that direction `dir` lacks, raising the
    /// order first when `target` is of higher order.
    ///
    /// On error the patch is left as it was.
    pub fn knot_insert_kv(&mut self, dir: usize, target: &KnotVector) -> Result<()> {
        self.check_dir(dir, "knot_insert_kv")?;
        let order = self.kv[dir].order();
        if target.order() < order {
            return Err(IgaError::Knot(format!(
                "knot_insert_kv: direction {dir} has order {order}, target has lower order {}",
                target.order()
            )));
        }
        self.transact(|patch| {
            if target.order() > order {
                patch.degree_elevate(dir, target.order() - order)?;
            }
            let current = &patch.kv[dir];
            if target.size() < current.size() {
                return Err(IgaError::Knot(format!(
                    "knot_insert_kv: direction {dir} already has {} knots, target has {}",
                    current.size(),
                    target.size()
                )));
            }
            let diff = current.difference(target)?;
            patch.knot_insert(dir, &diff)
        })
    }

    /// [`NurbsPatch::knot_insert_kv`] for every direction, all or nothing.
    pub fn knot_insert_all(&mut self, targets: &[KnotVector]) -> Result<()> {
        self.check_count(targets.len(), "knot_insert_all")?;
        self.transact(|patch| {
            for (dir, kv) in targets.iter().enumerate() {
                patch.knot_insert_kv(dir, kv)?;
            }
            Ok(())
        })
    }

    /// [`NurbsPatch::knot_insert`] with one knot list per direction, all or
    /// nothing.
    pub fn knot_insert_lists(&mut self, lists: &[Vec<f64>]) -> Result<()> {
        self.check_count(lists.len(), "knot_insert_lists")?;
        self.transact(|patch| {
            for (dir, knots) in lists.iter().enumerate() {
                patch.knot_insert(dir, knots)?;
            }
            Ok(())
        })
    }

    pub(crate) fn check_count(&self, n: usize, op: &str) -> Result<()> {
        if n != self.kv.len() {
            return Err(IgaError::Patch(format!(
                "{op}: got {n} entries for a patch with {} directions",
                self.kv.len()
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn cubic_curve() -> NurbsPatch {
        let kv = KnotVector::new(3, vec![0.0, 0.0, 0.0, 0.0, 0.4, 1.0, 1.0, 1.0, 1.0]).unwrap();
        let data = vec![
            0.0, 0.0, 1.0, //
            1.0, 2.0, 2.0, //
            3.0, 1.5, 1.5, //
            4.0, 4.0, 1.0, //
            5.0, 0.0, 1.0,
        ];
        NurbsPatch::from_data(vec![kv], 3, data).unwrap()
    }

    fn samples(patch: &NurbsPatch) -> Vec<Vec<f64>> {
        (0..=20)
            .map(|i| patch.evaluate(&[i as f64 / 20.0]).unwrap())
            .collect()
    }

    #[test]
    fn test_insert_preserves_curve() {
        let mut patch = cubic_curve();
        let before = samples(&patch);
        patch.knot_insert(0, &[0.2, 0.4, 0.7, 0.7]).unwrap();
        assert_eq!(patch.ncp(0).unwrap(), 9);
        assert_eq!(
            patch.knot_vector(0).unwrap().knots(),
            &[0.0, 0.0, 0.0, 0.0, 0.2, 0.4, 0.4, 0.7, 0.7, 1.0, 1.0, 1.0, 1.0]
        );
        for (a, b) in before.iter().zip(samples(&patch)) {
            assert_relative_eq!(a[0], b[0], epsilon = 1e-12);
            assert_relative_eq!(a[1], b[1], epsilon = 1e-12);
        }
    }

    #[test]
    fn test_insert_at_ends_of_range() {
        let mut patch = cubic_curve();
        let before = samples(&patch);
        patch.knot_insert(0, &[0.05, 0.95]).unwrap();
        for (a, b) in before.iter().zip(samples(&patch)) {
            assert_relative_eq!(a[0], b[0], epsilon = 1e-12);
            assert_relative_eq!(a[1], b[1], epsilon = 1e-12);
        }
    }

    #[test]
    fn test_insert_rejects_bad_input() {
        let mut patch = cubic_curve();
        assert!(patch.knot_insert(0, &[0.7, 0.2]).is_err());
        assert!(patch.knot_insert(0, &[1.5]).is_err());
        assert!(patch.knot_insert(1, &[0.5]).is_err());
        assert_eq!(patch, cubic_curve());
    }

    #[test]
    fn test_insert_kv_elevates_first() {
        let mut patch = cubic_curve();
        let before = samples(&patch);
        let target = KnotVector::new(
            4,
            vec![0.0, 0.0, 0.0, 0.0, 0.0, 0.4, 0.4, 0.5, 1.0, 1.0, 1.0, 1.0, 1.0],
        )
        .unwrap();
        patch.knot_insert_kv(0, &target).unwrap();
        assert_eq!(patch.knot_vector(0).unwrap().knots(), target.knots());
        for (a, b) in before.iter().zip(samples(&patch)) {
            assert_relative_eq!(a[0], b[0], epsilon = 1e-10);
            assert_relative_eq!(a[1], b[1], epsilon = 1e-10);
        }

        let lower = KnotVector::new(1, vec![0.0, 0.0, 1.0, 1.0]).unwrap();
        assert!(patch.knot_insert_kv(0, &lower).is_err());
    }

    #[test]
    fn test_insert_kv_failure_keeps_order() {
        // Elevating to the cubic target succeeds, but the target then has
        // fewer knots than the elevated direction.
        let kv = KnotVector::new(2, vec![0.0, 0.0, 0.0, 0.5, 1.0, 1.0, 1.0]).unwrap();
        let data = vec![0.0, 0.0, 1.0, 1.0, 2.0, 1.0, 3.0, 0.0, 1.0, 4.0, 1.0, 1.0];
        let mut patch = NurbsPatch::from_data(vec![kv], 3, data).unwrap();
        let original = patch.clone();
        let cubic = KnotVector::new(3, vec![0.0, 0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 1.0]).unwrap();

        assert!(patch.knot_insert_kv(0, &cubic).is_err());
        assert_eq!(patch, original);
        assert_eq!(patch.knot_vector(0).unwrap().order(), 2);
    }

    #[test]
    fn test_insert_lists_is_all_or_nothing() {
        let kv = KnotVector::new(2, vec![0.0, 0.0, 0.0, 0.5, 1.0, 1.0, 1.0]).unwrap();
        let mut patch = NurbsPatch::new(vec![kv.clone(), kv], 3).unwrap();
        let original = patch.clone();

        assert!(patch.knot_insert_lists(&[vec![0.25], vec![2.0]]).is_err());
        assert_eq!(patch, original);
        assert_eq!(patch.ncp(0).unwrap(), 4);

        let targets = [
            KnotVector::new(2, vec![0.0, 0.0, 0.0, 0.25, 0.5, 1.0, 1.0, 1.0]).unwrap(),
            KnotVector::new(1, vec![0.0, 0.0, 1.0, 1.0]).unwrap(),
        ];
        assert!(patch.knot_insert_all(&targets).is_err());
        assert_eq!(patch, original);
    }
}

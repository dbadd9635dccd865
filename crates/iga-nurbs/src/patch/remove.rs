//! Knot removal along one direction of a patch.

use iga_core::{IgaError, Result};
use log::warn;
use serde::{Deserialize, Serialize};

use super::{combine, distance, NurbsPatch};
use crate::knot::KnotVector;

fn gap(i: usize, j: usize) -> isize {
    j as isize - i as isize
}

/// How many of the requested removals of a knot went through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RemovalOutcome {
    pub requested: usize,
    pub removed: usize,
}

impl RemovalOutcome {
    pub fn is_complete(&self) -> bool {
        self.removed == self.requested
    }

    fn merge(self, other: RemovalOutcome) -> RemovalOutcome {
        RemovalOutcome {
            requested: self.requested + other.requested,
            removed: self.removed + other.removed,
        }
    }
}

impl NurbsPatch {
    /// Remove the interior knot `knot` up to `ntimes` times from direction
    /// `dir`, stopping at the first removal whose control point deviation
    /// reaches `tol`.
    ///
    /// Removals that went through are kept. Asking for more removals than
    /// the knot's multiplicity, or for a knot that is not interior, is an
    /// error.
    pub fn knot_remove(
        &mut self,
        dir: usize,
        knot: f64,
        ntimes: usize,
        tol: f64,
    ) -> Result<RemovalOutcome> {
        self.check_dir(dir, "knot_remove")?;
        let okv = &self.kv[dir];
        let u = okv.knots();
        let p = okv.order();

        let Some(r) = u.iter().rposition(|&k| k == knot) else {
            return Err(IgaError::Knot(format!(
                "knot_remove: knot {knot} not found in direction {dir}"
            )));
        };
        let s = u.iter().filter(|&&k| k == knot).count();
        if r == 0 || r + 1 >= u.len() || ntimes > s || r < p + s {
            return Err(IgaError::Knot(format!(
                "knot_remove: {knot} is not an interior knot of multiplicity at least {ntimes} \
                 in direction {dir} (multiplicity {s})"
            )));
        }
        if ntimes == 0 {
            return Ok(RemovalOutcome::default());
        }

        let n = okv.ncp() - 1;
        let ord = p + 1;
        let mut pw = self.slices(dir)?;
        let mut first = r - p;
        let mut last = r - s;
        let mut removed = 0;

        for t in 0..ntimes {
            let off = first - 1;
            let mut temp = vec![Vec::new(); last - off + 2];
            temp[0] = pw[off].clone();
            temp[last + 1 - off] = pw[last + 1].clone();

            let (mut i, mut j) = (first, last);
            let (mut ii, mut jj) = (1, last - off);
            while gap(i, j) > t as isize {
                let alfi = (knot - u[i]) / (u[i + ord + t] - u[i]);
                let alfj = (knot - u[j - t]) / (u[j + ord] - u[j - t]);
                temp[ii] = combine(1.0 / alfi, &pw[i], -(1.0 - alfi) / alfi, &temp[ii - 1]);
                temp[jj] = combine(
                    1.0 / (1.0 - alfj),
                    &pw[j],
                    -alfj / (1.0 - alfj),
                    &temp[jj + 1],
                );
                i += 1;
                ii += 1;
                j -= 1;
                jj -= 1;
            }

            let dist = if gap(i, j) < t as isize {
                distance(&temp[ii - 1], &temp[jj + 1])
            } else {
                let alfi = (knot - u[i]) / (u[i + ord + t] - u[i]);
                let blend = combine(alfi, &temp[ii + t + 1], 1.0 - alfi, &temp[ii - 1]);
                distance(&pw[i], &blend)
            };
            if dist >= tol {
                warn!(
                    "knot removal failed after {removed} successful removals \
                     (knot {knot}, direction {dir}, deviation {dist:e})"
                );
                break;
            }

            let (mut i, mut j) = (first, last);
            while gap(i, j) > t as isize {
                pw[i] = temp[i - off].clone();
                pw[j] = temp[j - off].clone();
                i += 1;
                j -= 1;
            }
            first -= 1;
            last += 1;
            removed += 1;
        }

        if removed == 0 {
            return Ok(RemovalOutcome {
                requested: ntimes,
                removed,
            });
        }

        // Close the gap left by the removed control points.
        let fout = (2 * r - s - p) / 2;
        let mut j = fout;
        let mut i = j;
        for k in 1..removed {
            if k % 2 == 1 {
                i += 1;
            } else {
                j -= 1;
            }
        }
        for k in i + 1..=n {
            pw[j] = pw[k].clone();
            j += 1;
        }
        pw.truncate(n + 1 - removed);

        let knots: Vec<f64> = u[..r + 1 - removed]
            .iter()
            .chain(&u[r + 1..])
            .copied()
            .collect();
        let mut nkv = KnotVector::new(p, knots)?;
        nkv.set_spacing(okv.spacing().cloned());
        nkv.set_coarse(okv.is_coarse());
        let patch = self.rebuilt(dir, nkv, &pw)?;
        *self = patch;

        let w = self.dim - 1;
        if self.data.chunks(self.dim).any(|pt| pt[w] <= 0.0) {
            warn!("non-positive weight after removing knot {knot} in direction {dir}");
        }
        Ok(RemovalOutcome {
            requested: ntimes,
            removed,
        })
    }

    /// Remove every knot of `knots` once from direction `dir`.
    ///
    /// Removals that fail the tolerance are reported in the outcome. An
    /// invalid knot is an error and leaves the patch as it was.
    pub fn knot_remove_list(&mut self, dir: usize, knots: &[f64], tol: f64) -> Result<RemovalOutcome> {
        self.transact(|patch| {
            let mut outcome = RemovalOutcome::default();
            for &k in knots {
                outcome = outcome.merge(patch.knot_remove(dir, k, 1, tol)?);
            }
            Ok(outcome)
        })
    }

    /// [`NurbsPatch::knot_remove_list`] with one list per direction.
    pub fn knot_remove_lists(&mut self, lists: &[Vec<f64>], tol: f64) -> Result<Vec<RemovalOutcome>> {
        self.check_count(lists.len(), "knot_remove_lists")?;
        self.transact(|patch| {
            lists
                .iter()
                .enumerate()
                .map(|(dir, knots)| patch.knot_remove_list(dir, knots, tol))
                .collect()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn quadratic_curve() -> NurbsPatch {
        let kv = KnotVector::new(2, vec![0.0, 0.0, 0.0, 0.5, 1.0, 1.0, 1.0]).unwrap();
        let data = vec![
            0.0, 0.0, 1.0, //
            1.0, 2.0, 1.0, //
            2.5, 0.5, 0.5, //
            4.0, 1.0, 1.0,
        ];
        NurbsPatch::from_data(vec![kv], 3, data).unwrap()
    }

    #[test]
    fn test_remove_inserted_knot() {
        let original = quadratic_curve();
        let mut patch = original.clone();
        patch.knot_insert(0, &[0.3]).unwrap();
        let outcome = patch.knot_remove(0, 0.3, 1, 1e-10).unwrap();
        assert!(outcome.is_complete());
        assert_eq!(patch.knot_vector(0).unwrap(), original.knot_vector(0).unwrap());
        for (a, b) in patch.data().iter().zip(original.data()) {
            assert_relative_eq!(a, b, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_remove_twice_inserted_knot() {
        let original = quadratic_curve();
        let mut patch = original.clone();
        patch.knot_insert(0, &[0.3, 0.3]).unwrap();
        let outcome = patch.knot_remove(0, 0.3, 2, 1e-10).unwrap();
        assert_eq!(outcome, RemovalOutcome { requested: 2, removed: 2 });
        for (a, b) in patch.data().iter().zip(original.data()) {
            assert_relative_eq!(a, b, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_essential_knot_stays() {
        let original = quadratic_curve();
        let mut patch = original.clone();
        let outcome = patch.knot_remove(0, 0.5, 1, 1e-10).unwrap();
        assert_eq!(outcome, RemovalOutcome { requested: 1, removed: 0 });
        assert!(!outcome.is_complete());
        assert_eq!(patch, original);
    }

    #[test]
    fn test_remove_requires_multiplicity() {
        let mut patch = quadratic_curve();
        assert!(patch.knot_remove(0, 0.5, 2, 1.0).is_err());
        assert!(patch.knot_remove(0, 0.0, 1, 1.0).is_err());
        assert!(patch.knot_remove(0, 0.25, 1, 1.0).is_err());
    }

    #[test]
    fn test_remove_list() {
        let original = quadratic_curve();
        let mut patch = original.clone();
        patch.knot_insert(0, &[0.25, 0.75]).unwrap();
        let outcome = patch.knot_remove_list(0, &[0.25, 0.75], 1e-10).unwrap();
        assert_eq!(outcome, RemovalOutcome { requested: 2, removed: 2 });
        assert_eq!(patch.ncp(0).unwrap(), 4);
    }

    #[test]
    fn test_remove_list_with_invalid_knot_changes_nothing() {
        let mut patch = quadratic_curve();
        patch.knot_insert(0, &[0.25]).unwrap();
        let before = patch.clone();
        assert!(patch.knot_remove_list(0, &[0.25, 0.8], 1e-10).is_err());
        assert_eq!(patch, before);
    }
}

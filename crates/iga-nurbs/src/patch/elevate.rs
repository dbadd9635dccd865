//! Degree elevation of a patch direction (Piegl and Tiller, A5.9).

use iga_core::{IgaError, Result};
use iga_math::BinomialTable;

use super::{combine, NurbsPatch};
use crate::knot::{KnotVector, MAX_ORDER};

impl NurbsPatch {
    /// Raise the order of direction `dir` by `t` without changing the
    /// geometry. Every element adds `t` control points.
    ///
    /// Interior knots of full multiplicity split the direction into
    /// independent pieces, each elevated on its own.
    pub fn degree_elevate(&mut self, dir: usize, t: usize) -> Result<()> {
        self.check_dir(dir, "degree_elevate")?;
        if t == 0 {
            return Ok(());
        }
        let okv = &self.kv[dir];
        let p = okv.order();
        let ph = p + t;
        if ph > MAX_ORDER {
            return Err(IgaError::Knot(format!(
                "degree_elevate: order {ph} in direction {dir} exceeds the maximum {MAX_ORDER}"
            )));
        }
        if p == 0 {
            return Err(IgaError::Knot(format!(
                "degree_elevate: direction {dir} has order 0"
            )));
        }
        let u = okv.knots();
        let ncp = okv.ncp();
        let old = self.slices(dir)?;

        let mut cuts: Vec<usize> = (1..ncp)
            .filter(|&r| u[r..=r + p].iter().all(|&k| k == u[r]))
            .collect();
        cuts.push(ncp);

        let mut uh: Vec<f64> = Vec::new();
        let mut qw: Vec<Vec<f64>> = Vec::new();
        let mut c0 = 0;
        for c1 in cuts {
            if c1 - c0 <= p {
                return Err(IgaError::Knot(format!(
                    "degree_elevate: direction {dir} has a piece of {} control points \
                     between full-multiplicity knots",
                    c1 - c0
                )));
            }
            let (knots, points) = elevate_segment(&u[c0..c1 + p + 1], p, t, &old[c0..c1], dir)?;
            let skip = if c0 == 0 { 0 } else { ph + 1 };
            uh.extend_from_slice(&knots[skip..]);
            qw.extend(points);
            c0 = c1;
        }

        let mut nkv = KnotVector::new(ph, uh)?;
        nkv.set_spacing(okv.spacing().cloned());
        let patch = self.rebuilt(dir, nkv, &qw)?;
        *self = patch;
        Ok(())
    }

    /// Raise the order of every direction by `t`. On error the patch is
    /// left as it was.
    pub fn degree_elevate_all(&mut self, t: usize) -> Result<()> {
        self.transact(|patch| {
            for dir in 0..patch.kv.len() {
                patch.degree_elevate(dir, t)?;
            }
            Ok(())
        })
    }

    /// Elevate every direction to `max(degree, highest order)` and return
    /// that order.
    pub fn make_uniform_degree(&mut self, degree: Option<usize>) -> Result<usize> {
        let highest = self.kv.iter().map(KnotVector::order).max().unwrap_or(0);
        let target = degree.map_or(highest, |d| d.max(highest));
        self.transact(|patch| {
            for dir in 0..patch.kv.len() {
                let order = patch.kv[dir].order();
                patch.degree_elevate(dir, target - order)?;
            }
            Ok(target)
        })
    }
}

/// Elevate one piece without interior knots of full multiplicity: knots `u`
/// of order `p`, slices `old`. Returns the new knots and slices.
fn elevate_segment(
    u: &[f64],
    p: usize,
    t: usize,
    old: &[Vec<f64>],
    dir: usize,
) -> Result<(Vec<f64>, Vec<Vec<f64>>)> {
    let ph = p + t;
    let ncp = old.len();
    let m = ncp + p;
    let elements = (p..ncp).filter(|&i| u[i] != u[i + 1]).count();
    let new_ncp = ncp + elements * t;
    let ls = old.first().map_or(0, Vec::len);
    let zero = vec![0.0; ls];

    let bezalfs = bezier_alphas(p, t);

    let mut qw: Vec<Vec<f64>> = Vec::with_capacity(new_ncp);
    let mut uh: Vec<f64> = Vec::with_capacity(new_ncp + ph + 1);
    let mut bpts: Vec<Vec<f64>> = old[..=p].to_vec();
    let mut ebpts = vec![zero.clone(); ph + 1];
    let mut nextbpts = vec![zero.clone(); p.max(1)];
    let mut alphas = vec![0.0; p.max(1)];

    let mut ua = u[0];
    uh.extend(std::iter::repeat(ua).take(ph + 1));
    qw.push(old[0].clone());

    let mut a = p;
    let mut b = p + 1;
    let mut r: isize = -1;
    while b < m {
        let i = b;
        while b < m && u[b] == u[b + 1] {
            b += 1;
        }
        let mul = b - i + 1;
        let ub = u[b];
        let oldr = r;
        r = p as isize - mul as isize;
        let lbz = if oldr > 0 { ((oldr + 2) / 2) as usize } else { 1 };
        let rbz = if r > 0 { ph - ((r + 1) / 2) as usize } else { ph };

        // Insert ub until it has multiplicity p.
        if r > 0 {
            let numer = ub - ua;
            for k in (mul + 1..=p).rev() {
                alphas[k - mul - 1] = numer / (u[a + k] - ua);
            }
            for j in 1..=r as usize {
                let save = r as usize - j;
                let s = mul + j;
                for k in (s..=p).rev() {
                    let alf = alphas[k - s];
                    bpts[k] = combine(alf, &bpts[k], 1.0 - alf, &bpts[k - 1]);
                }
                nextbpts[save] = bpts[p].clone();
            }
        }

        // Elevate the Bezier segment.
        for (i, e) in ebpts.iter_mut().enumerate().skip(lbz) {
            e.iter_mut().for_each(|v| *v = 0.0);
            for j in i.saturating_sub(t)..=p.min(i) {
                let c = bezalfs[i][j];
                for (ev, bv) in e.iter_mut().zip(&bpts[j]) {
                    *ev += c * bv;
                }
            }
        }

        // Remove ua oldr times.
        if oldr > 1 {
            let kind = uh.len();
            let mut first = kind as isize - 2;
            let mut last = kind as isize;
            let den = ub - ua;
            let bet = (ub - uh[kind - 1]) / den;
            for tr in 1..oldr {
                let mut i = first;
                let mut j = last;
                let mut kj = j - kind as isize + 1;
                while j - i > tr {
                    if (i as usize) < qw.len() {
                        let iu = i as usize;
                        let alf = (ub - uh[iu]) / (ua - uh[iu]);
                        qw[iu] = combine(alf, &qw[iu], 1.0 - alf, &qw[iu - 1]);
                    }
                    if j >= lbz as isize {
                        let k = kj as usize;
                        let g = if j - tr <= kind as isize - ph as isize + oldr {
                            (ub - uh[(j - tr) as usize]) / den
                        } else {
                            bet
                        };
                        ebpts[k] = combine(g, &ebpts[k], 1.0 - g, &ebpts[k + 1]);
                    }
                    i += 1;
                    j -= 1;
                    kj -= 1;
                }
                first -= 1;
                last += 1;
            }
        }

        if a != p {
            let times = (ph as isize - oldr) as usize;
            uh.extend(std::iter::repeat(ua).take(times));
        }
        qw.extend(ebpts[lbz..=rbz].iter().cloned());

        if b < m {
            let r0 = r.max(0) as usize;
            bpts[..r0].clone_from_slice(&nextbpts[..r0]);
            for j in r0..=p {
                bpts[j] = old[b - p + j].clone();
            }
            a = b;
            b += 1;
            ua = ub;
        } else {
            uh.extend(std::iter::repeat(ub).take(ph + 1));
        }
    }

    if qw.len() != new_ncp || uh.len() != new_ncp + ph + 1 {
        return Err(IgaError::Patch(format!(
            "degree_elevate: direction {dir} produced {} control points and {} knots, \
             expected {new_ncp} and {}",
            qw.len(),
            uh.len(),
            new_ncp + ph + 1
        )));
    }
    Ok((uh, qw))
}

/// Coefficients of the degree `p` to `p + t` Bezier elevation.
fn bezier_alphas(p: usize, t: usize) -> Vec<Vec<f64>> {
    let ph = p + t;
    let ph2 = ph / 2;
    let bin = BinomialTable::new(ph);
    let mut bezalfs = vec![vec![0.0; p + 1]; ph + 1];
    bezalfs[0][0] = 1.0;
    bezalfs[ph][p] = 1.0;
    for i in 1..=ph2 {
        let inv = 1.0 / bin.get(ph, i);
        for j in i.saturating_sub(t)..=p.min(i) {
            bezalfs[i][j] = inv * bin.get(p, j) * bin.get(t, i - j);
        }
    }
    for i in ph2 + 1..ph {
        for j in i.saturating_sub(t)..=p.min(i) {
            bezalfs[i][j] = bezalfs[ph - i][p - j];
        }
    }
    bezalfs
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn curve() -> NurbsPatch {
        let kv = KnotVector::new(2, vec![0.0, 0.0, 0.0, 0.3, 0.3, 0.6, 1.0, 1.0, 1.0]).unwrap();
        let data = vec![
            0.0, 0.0, 1.0, //
            1.0, 2.0, 1.0, //
            2.0, 2.0, 2.0, //
            1.5, 0.5, 0.5, //
            4.0, 1.0, 1.0, //
            5.0, 5.0, 1.0,
        ];
        NurbsPatch::from_data(vec![kv], 3, data).unwrap()
    }

    #[test]
    fn test_bezier_alphas_rows_sum_to_one() {
        let b = bezier_alphas(3, 2);
        for row in &b {
            assert_relative_eq!(row.iter().sum::<f64>(), 1.0, epsilon = 1e-14);
        }
        assert_relative_eq!(b[1][0], 0.4);
        assert_relative_eq!(b[1][1], 0.6);
    }

    #[test]
    fn test_elevation_keeps_curve() {
        for t in 1..=3 {
            let original = curve();
            let mut patch = original.clone();
            patch.degree_elevate(0, t).unwrap();
            let kv = patch.knot_vector(0).unwrap();
            assert_eq!(kv.order(), 2 + t);
            // Three elements, each gaining t control points.
            assert_eq!(kv.ncp(), 6 + 3 * t);
            for i in 0..=30 {
                let x = i as f64 / 30.0;
                let a = original.evaluate(&[x]).unwrap();
                let b = patch.evaluate(&[x]).unwrap();
                assert_relative_eq!(a[0], b[0], epsilon = 1e-10);
                assert_relative_eq!(a[1], b[1], epsilon = 1e-10);
            }
        }
    }

    #[test]
    fn test_elevated_knots_match_knot_vector_rule() {
        let mut patch = curve();
        patch.degree_elevate(0, 2).unwrap();
        let expected = curve().knot_vector(0).unwrap().degree_elevate(2).unwrap();
        assert_eq!(patch.knot_vector(0).unwrap().knots(), expected.knots());
    }

    #[test]
    fn test_make_uniform_degree() {
        let k1 = KnotVector::new(1, vec![0.0, 0.0, 1.0, 1.0]).unwrap();
        let k3 = KnotVector::new(3, vec![0.0, 0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 1.0]).unwrap();
        let mut patch = NurbsPatch::new(vec![k1, k3], 3).unwrap();
        patch.data_mut().chunks_mut(3).for_each(|pt| pt[2] = 1.0);
        assert_eq!(patch.make_uniform_degree(None).unwrap(), 3);
        assert_eq!(patch.knot_vector(0).unwrap().order(), 3);
        assert_eq!(patch.make_uniform_degree(Some(4)).unwrap(), 4);
        assert_eq!(patch.knot_vector(1).unwrap().order(), 4);
        assert_eq!(patch.ncp(0).unwrap(), 5);
    }

    #[test]
    fn test_elevation_across_discontinuity() {
        let kv = KnotVector::new(2, vec![0.0, 0.0, 0.0, 0.5, 0.5, 0.5, 1.0, 1.0, 1.0]).unwrap();
        let data = vec![
            0.0, 0.0, 1.0, //
            1.0, 2.0, 1.0, //
            2.0, 0.0, 1.0, //
            3.0, 1.0, 2.0, //
            4.0, 3.0, 1.0, //
            5.0, 0.0, 1.0,
        ];
        let original = NurbsPatch::from_data(vec![kv], 3, data).unwrap();
        let mut patch = original.clone();
        patch.degree_elevate(0, 1).unwrap();

        let kv = patch.knot_vector(0).unwrap();
        assert_eq!(kv.order(), 3);
        assert_eq!(kv.ncp(), 8);
        assert_eq!(
            kv.knots(),
            &[0.0, 0.0, 0.0, 0.0, 0.5, 0.5, 0.5, 0.5, 1.0, 1.0, 1.0, 1.0]
        );
        for i in 0..30 {
            let x = (i as f64 + 0.5) / 30.0;
            let a = original.evaluate(&[x]).unwrap();
            let b = patch.evaluate(&[x]).unwrap();
            assert_relative_eq!(a[0], b[0], epsilon = 1e-10);
            assert_relative_eq!(a[1], b[1], epsilon = 1e-10);
        }
    }

    #[test]
    fn test_failed_elevation_keeps_patch() {
        let k1 = KnotVector::new(1, vec![0.0, 0.0, 1.0, 1.0]).unwrap();
        let top = KnotVector::new(MAX_ORDER, {
            let mut k = vec![0.0; MAX_ORDER + 1];
            k.extend(vec![1.0; MAX_ORDER + 1]);
            k
        })
        .unwrap();
        let mut patch = NurbsPatch::new(vec![k1, top], 3).unwrap();
        let original = patch.clone();
        assert!(patch.degree_elevate_all(1).is_err());
        assert_eq!(patch, original);
    }
}

//! Banded LU factorization with partial pivoting.
//!
//! Storage follows the LAPACK `gbtrf` layout: entry `(i, j)` of the matrix
//! lives at row `kl + ku + i - j` of column `j`, with `kl` extra rows on top
//! to hold the fill-in produced by row interchanges.

use iga_core::{IgaError, Result};

use crate::DMatrix;

/// Square matrix with `kl` sub-diagonals and `ku` super-diagonals.
#[derive(Debug, Clone)]
pub struct BandedMatrix {
    n: usize,
    kl: usize,
    ku: usize,
    ldab: usize,
    data: Vec<f64>,
}

impl BandedMatrix {
    pub fn new(n: usize, kl: usize, ku: usize) -> Self {
        let ldab = 2 * kl + ku + 1;
        Self {
            n,
            kl,
            ku,
            ldab,
            data: vec![0.0; ldab * n],
        }
    }

    pub fn size(&self) -> usize {
        self.n
    }

    pub fn lower_bandwidth(&self) -> usize {
        self.kl
    }

    pub fn upper_bandwidth(&self) -> usize {
        self.ku
    }

    fn in_storage(&self, i: usize, j: usize) -> bool {
        i < self.n && j < self.n && i + self.kl + self.ku >= j && i <= j + self.kl
    }

    fn offset(&self, i: usize, j: usize) -> usize {
        (self.kl + self.ku + i - j) + j * self.ldab
    }

    /// Entry `(i, j)`; zero outside the band.
    pub fn get(&self, i: usize, j: usize) -> f64 {
        if self.in_storage(i, j) {
            self.data[self.offset(i, j)]
        } else {
            0.0
        }
    }

    /// Set entry `(i, j)`, which must lie inside the declared band.
    pub fn set(&mut self, i: usize, j: usize, value: f64) -> Result<()> {
        if i >= self.n || j >= self.n || i + self.ku < j || i > j + self.kl {
            return Err(IgaError::InvalidOperation(format!(
                "Entry ({i}, {j}) is outside the band (kl = {}, ku = {}, n = {})",
                self.kl, self.ku, self.n
            )));
        }
        let off = self.offset(i, j);
        self.data[off] = value;
        Ok(())
    }

    /// Dense copy, mostly for diagnostics.
    pub fn to_dense(&self) -> DMatrix<f64> {
        DMatrix::from_fn(self.n, self.n, |i, j| {
            if i + self.ku >= j && i <= j + self.kl {
                self.get(i, j)
            } else {
                0.0
            }
        })
    }

    /// Factorize in place, consuming the matrix.
    pub fn factorize(mut self) -> Result<BandedLu> {
        let n = self.n;
        let kl = self.kl;
        let reach = self.kl + self.ku;
        let mut pivots = Vec::with_capacity(n);

        for k in 0..n {
            let last_row = (k + kl).min(n - 1);
            let last_col = (k + reach).min(n - 1);

            let mut p = k;
            let mut best = self.get(k, k).abs();
            for i in (k + 1)..=last_row {
                let v = self.get(i, k).abs();
                if v > best {
                    best = v;
                    p = i;
                }
            }
            if best == 0.0 {
                return Err(IgaError::InvalidOperation(format!(
                    "Banded matrix is singular at column {k}"
                )));
            }
            pivots.push(p);

            if p != k {
                for j in k..=last_col {
                    let a = self.offset(k, j);
                    let b = self.offset(p, j);
                    self.data.swap(a, b);
                }
            }

            let pivot = self.get(k, k);
            for i in (k + 1)..=last_row {
                let off = self.offset(i, k);
                let l = self.data[off] / pivot;
                self.data[off] = l;
                if l == 0.0 {
                    continue;
                }
                for j in (k + 1)..=last_col {
                    let kj = self.get(k, j);
                    let ij = self.offset(i, j);
                    self.data[ij] -= l * kj;
                }
            }
        }

        Ok(BandedLu {
            factors: self,
            pivots,
        })
    }
}

/// LU factors of a [`BandedMatrix`], reusable for any number of right-hand sides.
#[derive(Debug, Clone)]
pub struct BandedLu {
    factors: BandedMatrix,
    pivots: Vec<usize>,
}

impl BandedLu {
    pub fn size(&self) -> usize {
        self.factors.n
    }

    /// Overwrite `b` with the solution of `A x = b`.
    pub fn solve_in_place(&self, b: &mut [f64]) -> Result<()> {
        let n = self.factors.n;
        if b.len() != n {
            return Err(IgaError::InvalidOperation(format!(
                "Right-hand side has length {}, expected {n}",
                b.len()
            )));
        }
        let kl = self.factors.kl;
        let reach = self.factors.kl + self.factors.ku;

        for k in 0..n {
            let p = self.pivots[k];
            if p != k {
                b.swap(k, p);
            }
            let bk = b[k];
            for i in (k + 1)..=(k + kl).min(n - 1) {
                b[i] -= self.factors.get(i, k) * bk;
            }
        }

        for k in (0..n).rev() {
            let mut sum = b[k];
            for j in (k + 1)..=(k + reach).min(n - 1) {
                sum -= self.factors.get(k, j) * b[j];
            }
            b[k] = sum / self.factors.get(k, k);
        }
        Ok(())
    }

    pub fn solve_many(&self, rhs: &mut [Vec<f64>]) -> Result<()> {
        for b in rhs.iter_mut() {
            self.solve_in_place(b)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn tridiagonal(n: usize) -> BandedMatrix {
        let mut m = BandedMatrix::new(n, 1, 1);
        for i in 0..n {
            m.set(i, i, 4.0).unwrap();
            if i > 0 {
                m.set(i, i - 1, 1.0).unwrap();
            }
            if i + 1 < n {
                m.set(i, i + 1, 2.0).unwrap();
            }
        }
        m
    }

    #[test]
    fn test_tridiagonal_matches_dense_lu() {
        let m = tridiagonal(6);
        let dense = m.to_dense();
        let rhs: Vec<f64> = (0..6).map(|i| i as f64 + 1.0).collect();

        let expected = dense
            .lu()
            .solve(&nalgebra::DVector::from_vec(rhs.clone()))
            .unwrap();

        let lu = m.factorize().unwrap();
        let mut x = rhs;
        lu.solve_in_place(&mut x).unwrap();
        for i in 0..6 {
            assert_relative_eq!(x[i], expected[i], epsilon = 1e-12);
        }
    }

    #[test]
    fn test_pivoting_required() {
        // Zero on the first diagonal entry forces a row interchange.
        let mut m = BandedMatrix::new(3, 1, 1);
        m.set(0, 0, 0.0).unwrap();
        m.set(0, 1, 1.0).unwrap();
        m.set(1, 0, 2.0).unwrap();
        m.set(1, 1, 1.0).unwrap();
        m.set(1, 2, 1.0).unwrap();
        m.set(2, 1, 1.0).unwrap();
        m.set(2, 2, 3.0).unwrap();
        let dense = m.to_dense();

        let lu = m.factorize().unwrap();
        let mut x = vec![1.0, 2.0, 3.0];
        lu.solve_in_place(&mut x).unwrap();

        let ax = &dense * nalgebra::DVector::from_vec(x);
        assert_relative_eq!(ax[0], 1.0, epsilon = 1e-12);
        assert_relative_eq!(ax[1], 2.0, epsilon = 1e-12);
        assert_relative_eq!(ax[2], 3.0, epsilon = 1e-12);
    }

    #[test]
    fn test_singular_is_reported() {
        let m = BandedMatrix::new(2, 0, 0);
        assert!(m.factorize().is_err());
    }

    #[test]
    fn test_set_outside_band() {
        let mut m = BandedMatrix::new(4, 1, 0);
        assert!(m.set(0, 2, 1.0).is_err());
        assert!(m.set(2, 1, 1.0).is_ok());
    }

    #[test]
    fn test_wrong_rhs_length() {
        let lu = tridiagonal(3).factorize().unwrap();
        let mut b = vec![1.0; 4];
        assert!(lu.solve_in_place(&mut b).is_err());
    }
}

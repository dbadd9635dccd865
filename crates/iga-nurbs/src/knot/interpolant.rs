//! Collocation at the maxima of the basis functions (A9.1 of "The NURBS
//! Book") with a banded solve.

use iga_core::{IgaError, Result};
use iga_math::BandedMatrix;

use super::KnotVector;

const MAX_BISECTIONS: usize = 200;

/// Where each basis function peaks.
#[derive(Debug, Clone, PartialEq)]
pub struct Maxima {
    /// Span holding the maximum of function `j`.
    pub spans: Vec<usize>,
    /// Local coordinate of the maximum inside that span.
    pub xi: Vec<f64>,
    /// Parameter value of the maximum.
    pub u: Vec<f64>,
}

impl KnotVector {
    /// Locate the maximum of every basis function by bisection inside each
    /// element of its support.
    pub fn find_maxima(&self) -> Result<Maxima> {
        let ncp = self.ncp;
        let mut maxima = vec![0.0; ncp];
        let mut out = Maxima {
            spans: vec![0; ncp],
            xi: vec![0.0; ncp],
            u: vec![0.0; ncp],
        };

        for j in 0..ncp {
            for d in 0..=self.order.min(j) {
                let i = j - d;
                if !self.is_element(i) {
                    continue;
                }
                let mut arg1 = f64::EPSILON / 2.0;
                let mut max1 = self.calc_shape(i, arg1)?[d];
                let mut arg2 = 1.0 - arg1;
                let mut max2 = self.calc_shape(i, arg2)?[d];
                let mut arg = (arg1 + arg2) / 2.0;
                let mut max = self.calc_shape(i, arg)?[d];

                let mut steps = 0;
                while (max > max1 || max > max2) && steps < MAX_BISECTIONS {
                    if max1 < max2 {
                        max1 = max;
                        arg1 = arg;
                    } else {
                        max2 = max;
                        arg2 = arg;
                    }
                    arg = (arg1 + arg2) / 2.0;
                    max = self.calc_shape(i, arg)?[d];
                    steps += 1;
                }

                if max > maxima[j] {
                    maxima[j] = max;
                    out.spans[j] = i;
                    out.xi[j] = arg;
                    out.u[j] = self.knot_location(arg, i + self.order);
                }
            }
        }
        Ok(out)
    }

    /// Replace each right-hand side by the control values of the spline
    /// that interpolates it at the basis maxima.
    ///
    /// With `reuse` set, a factorization cached by an earlier call is used
    /// and a fresh one is kept for later calls.
    pub fn find_interpolant(&mut self, rhs: &mut [Vec<f64>], reuse: bool) -> Result<()> {
        if let Some(b) = rhs.iter().find(|b| b.len() != self.ncp) {
            return Err(IgaError::Knot(format!(
                "Interpolation data has {} values, knot vector has {} control points",
                b.len(),
                self.ncp
            )));
        }

        let cached = if reuse { self.factorization.take() } else { None };
        let lu = match cached {
            Some(lu) => lu,
            None => {
                let maxima = self.find_maxima()?;
                let p = self.order;
                let (mut kl, mut ku) = (0, 0);
                for (i, &span) in maxima.spans.iter().enumerate() {
                    for col in span..=span + p {
                        if col < i {
                            kl = kl.max(i - col);
                        } else {
                            ku = ku.max(col - i);
                        }
                    }
                }
                let mut a = BandedMatrix::new(self.ncp, kl, ku);
                for i in 0..self.ncp {
                    let shape = self.calc_shape(maxima.spans[i], maxima.xi[i])?;
                    for (q, v) in shape.into_iter().enumerate() {
                        a.set(i, maxima.spans[i] + q, v)?;
                    }
                }
                log::debug!(
                    "collocation matrix of size {} with bandwidths ({kl}, {ku})",
                    self.ncp
                );
                a.factorize()?
            }
        };

        lu.solve_many(rhs)?;
        if reuse {
            self.factorization = Some(lu);
        }
        Ok(())
    }
}

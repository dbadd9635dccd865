//! B-spline basis evaluation on a single knot span.
//!
//! Algorithms A2.2 and A2.3 of Piegl and Tiller, "The NURBS Book", with the
//! local parameter `xi` in `[0, 1]` mapped onto the span.

use iga_core::{IgaError, Result};
use serde::{Deserialize, Serialize};

use super::KnotVector;

/// Direction in which a span is traversed by the local parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Orientation {
    #[default]
    Forward,
    /// The local parameter runs from the right end of the span to the left.
    Reversed,
}

impl Orientation {
    pub fn from_sign(sign: i32) -> Self {
        if sign < 0 {
            Orientation::Reversed
        } else {
            Orientation::Forward
        }
    }

    pub fn sign(self) -> f64 {
        match self {
            Orientation::Forward => 1.0,
            Orientation::Reversed => -1.0,
        }
    }
}

/// A knot span (counted from the first non-clamped span, so span `0`
/// starts at knot `order`) together with its traversal direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Span {
    pub index: usize,
    pub orientation: Orientation,
}

impl Span {
    pub fn forward(index: usize) -> Self {
        Self {
            index,
            orientation: Orientation::Forward,
        }
    }

    pub fn reversed(index: usize) -> Self {
        Self {
            index,
            orientation: Orientation::Reversed,
        }
    }
}

impl From<usize> for Span {
    fn from(index: usize) -> Self {
        Span::forward(index)
    }
}

impl KnotVector {
    /// Knot index at the left end of `span`, and the parameter value that
    /// `xi` maps to.
    fn locate(&self, span: Span, xi: f64) -> Result<(usize, f64)> {
        if span.index >= self.knot_span_count() {
            return Err(IgaError::Knot(format!(
                "Span {} out of range, knot vector has {} spans",
                span.index,
                self.knot_span_count()
            )));
        }
        let ip = span.index + self.order;
        let local = match span.orientation {
            Orientation::Forward => xi,
            Orientation::Reversed => 1.0 - xi,
        };
        Ok((ip, self.knot_location(local, ip)))
    }

    /// Values of the `order + 1` basis functions that are nonzero on `span`.
    pub fn calc_shape(&self, span: impl Into<Span>, xi: f64) -> Result<Vec<f64>> {
        let (ip, u) = self.locate(span.into(), xi)?;
        let p = self.order;
        let k = &self.knots;
        let mut shape = vec![0.0; p + 1];
        let mut left = vec![0.0; p + 1];
        let mut right = vec![0.0; p + 1];

        shape[0] = 1.0;
        for j in 1..=p {
            left[j] = u - k[ip + 1 - j];
            right[j] = k[ip + j] - u;
            let mut saved = 0.0;
            for r in 0..j {
                let tmp = shape[r] / (right[r + 1] + left[j - r]);
                shape[r] = saved + right[r + 1] * tmp;
                saved = left[j - r] * tmp;
            }
            shape[j] = saved;
        }
        Ok(shape)
    }

    /// First derivatives with respect to `xi`.
    pub fn calc_dshape(&self, span: impl Into<Span>, xi: f64) -> Result<Vec<f64>> {
        self.calc_dn_shape(1, span, xi)
    }

    /// Second derivatives with respect to `xi`.
    pub fn calc_d2shape(&self, span: impl Into<Span>, xi: f64) -> Result<Vec<f64>> {
        self.calc_dn_shape(2, span, xi)
    }

    /// `n`-th derivatives with respect to `xi`; `n = 0` gives the values.
    pub fn calc_dn_shape(&self, n: usize, span: impl Into<Span>, xi: f64) -> Result<Vec<f64>> {
        let span = span.into();
        let (ip, u) = self.locate(span, xi)?;
        let p = self.order;
        if n == 0 {
            return self.calc_shape(span, xi);
        }
        if n > p {
            return Ok(vec![0.0; p + 1]);
        }

        let k = &self.knots;
        let mut ndu = vec![vec![0.0; p + 1]; p + 1];
        let mut left = vec![0.0; p + 1];
        let mut right = vec![0.0; p + 1];
        ndu[0][0] = 1.0;
        for j in 1..=p {
            left[j] = u - k[ip + 1 - j];
            right[j] = k[ip + j] - u;
            let mut saved = 0.0;
            for r in 0..j {
                // Lower triangle holds the knot differences
                ndu[j][r] = right[r + 1] + left[j - r];
                let temp = ndu[r][j - 1] / ndu[j][r];
                ndu[r][j] = saved + right[r + 1] * temp;
                saved = left[j - r] * temp;
            }
            ndu[j][j] = saved;
        }

        let pi = p as isize;
        let mut ders = vec![0.0; p + 1];
        let mut a = vec![vec![0.0; p + 1]; 2];
        for r in 0..=p {
            let ri = r as isize;
            let (mut s1, mut s2) = (0usize, 1usize);
            a[0][0] = 1.0;
            for kk in 1..=n {
                let ki = kk as isize;
                let rk = ri - ki;
                let pk = pi - ki;
                let mut d = 0.0;
                if r >= kk {
                    a[s2][0] = a[s1][0] / ndu[(pk + 1) as usize][rk as usize];
                    d = a[s2][0] * ndu[rk as usize][pk as usize];
                }
                let j1 = if rk >= -1 { 1 } else { -rk };
                let j2 = if ri - 1 <= pk { ki - 1 } else { pi - ri };
                for j in j1..=j2 {
                    let j = j as usize;
                    let col = (rk + j as isize) as usize;
                    a[s2][j] = (a[s1][j] - a[s1][j - 1]) / ndu[(pk + 1) as usize][col];
                    d += a[s2][j] * ndu[col][pk as usize];
                }
                if ri <= pk {
                    a[s2][kk] = -a[s1][kk - 1] / ndu[(pk + 1) as usize][r];
                    d += a[s2][kk] * ndu[r][pk as usize];
                }
                if kk == n {
                    ders[r] = d;
                }
                std::mem::swap(&mut s1, &mut s2);
            }
        }

        // p (p-1) ... (p-n+1), times the span length per derivative
        let h = span.orientation.sign() * (k[ip + 1] - k[ip]);
        let mut factor = 1.0;
        for i in 0..n {
            factor *= (p - i) as f64 * h;
        }
        for v in &mut ders {
            *v *= factor;
        }
        Ok(ders)
    }

    /// Index `m` with `u` in `[knot[m-1], knot[m])`; the last knot belongs
    /// to the last span.
    pub fn find_knot_span(&self, u: f64) -> Result<usize> {
        let (lo, hi) = (self.knots[self.order], self.knots[self.ncp]);
        if !(lo..=hi).contains(&u) {
            return Err(IgaError::Knot(format!(
                "Parameter {u} outside the knot range [{lo}, {hi}]"
            )));
        }
        if u >= hi {
            return Ok(self.ncp);
        }
        // knot[low] <= u < knot[high]
        let mut low = self.order;
        let mut high = self.ncp;
        while high - low > 1 {
            let mid = (low + high) / 2;
            if u < self.knots[mid] {
                high = mid;
            } else {
                low = mid;
            }
        }
        Ok(low + 1)
    }

    /// Index of the first control point supported at `u`, and the values of
    /// the `order + 1` basis functions there.
    pub fn eval_basis(&self, u: f64) -> Result<(usize, Vec<f64>)> {
        let mut span = self.find_knot_span(u)? - 1;
        // A zero-length trailing span cannot be evaluated; step back.
        while span > self.order && self.knots[span] == self.knots[span + 1] {
            span -= 1;
        }
        let (a, b) = (self.knots[span], self.knots[span + 1]);
        let xi = if b > a { (u - a) / (b - a) } else { 0.0 };
        let shape = self.calc_shape(span - self.order, xi)?;
        Ok((span - self.order, shape))
    }
}

//! Knot vectors: the one-dimensional building block of every NURBS patch.

mod basis;
mod interpolant;
mod spacing;

use std::io::Write;

use iga_core::{IgaError, Result, TokenReader, Tolerance, Validate};
use iga_math::BandedLu;
use serde::{Deserialize, Serialize};

pub use basis::{Orientation, Span};
pub use interpolant::Maxima;
pub use spacing::SpacingRule;

/// Highest polynomial order supported by basis evaluation.
pub const MAX_ORDER: usize = 10;

/// Non-decreasing knot sequence with a polynomial order.
///
/// `knots.len() == ncp + order + 1`. Spans are counted from knot `order`, so
/// there are `ncp - order` of them; a span is an element when its two knots
/// differ.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnotVector {
    order: usize,
    ncp: usize,
    knots: Vec<f64>,
    num_elements: usize,
    spacing: Option<SpacingRule>,
    coarse: bool,
    #[serde(skip)]
    factorization: Option<BandedLu>,
}

impl PartialEq for KnotVector {
    fn eq(&self, other: &Self) -> bool {
        self.order == other.order
            && self.ncp == other.ncp
            && self.knots == other.knots
            && self.spacing == other.spacing
            && self.coarse == other.coarse
    }
}

impl KnotVector {
    /// Build from an explicit knot sequence and validate it.
    pub fn new(order: usize, knots: Vec<f64>) -> Result<Self> {
        if knots.len() < 2 * (order + 1) {
            return Err(IgaError::Knot(format!(
                "Order {order} needs at least {} knots, got {}",
                2 * (order + 1),
                knots.len()
            )));
        }
        let ncp = knots.len() - order - 1;
        let mut kv = Self {
            order,
            ncp,
            knots,
            num_elements: 0,
            spacing: None,
            coarse: false,
            factorization: None,
        };
        kv.count_elements();
        kv.validate()?;
        Ok(kv)
    }

    /// A knot vector of the right size whose knots are still to be filled.
    pub fn unfilled(order: usize, ncp: usize) -> Self {
        Self {
            order,
            ncp,
            knots: vec![0.0; ncp + order + 1],
            num_elements: 0,
            spacing: None,
            coarse: false,
            factorization: None,
        }
    }

    /// Open knot vector from interval lengths and the continuity at every
    /// breakpoint, ends included (`-1` at the ends gives multiplicity
    /// `order + 1`).
    pub fn from_intervals(order: usize, intervals: &[f64], continuity: &[i64]) -> Result<Self> {
        if continuity.len() != intervals.len() + 1 {
            return Err(IgaError::Knot(format!(
                "{} intervals need {} continuity values, got {}",
                intervals.len(),
                intervals.len() + 1,
                continuity.len()
            )));
        }
        let mut knots = Vec::new();
        let mut accum = 0.0;
        for (i, &c) in continuity.iter().enumerate() {
            let multiplicity = order as i64 - c;
            if multiplicity < 1 || multiplicity > order as i64 + 1 {
                return Err(IgaError::Knot(format!(
                    "Continuity {c} at breakpoint {i} is invalid for order {order}"
                )));
            }
            knots.extend(std::iter::repeat(accum).take(multiplicity as usize));
            if let Some(h) = intervals.get(i) {
                accum += h;
            }
        }
        Self::new(order, knots)
    }

    pub fn order(&self) -> usize {
        self.order
    }

    /// Number of control points (basis functions).
    pub fn ncp(&self) -> usize {
        self.ncp
    }

    /// Number of knots, `ncp + order + 1`.
    pub fn size(&self) -> usize {
        self.knots.len()
    }

    /// Number of spans, degenerate ones included.
    pub fn knot_span_count(&self) -> usize {
        self.ncp - self.order
    }

    pub fn element_count(&self) -> usize {
        self.num_elements
    }

    pub fn knots(&self) -> &[f64] {
        &self.knots
    }

    pub fn knot(&self, i: usize) -> Result<f64> {
        self.knots.get(i).copied().ok_or_else(|| self.knot_out_of_range(i))
    }

    pub fn min_knot(&self) -> f64 {
        self.knots[0]
    }

    pub fn max_knot(&self) -> f64 {
        self.knots[self.knots.len() - 1]
    }

    /// Overwrite knot `i`. Call [`KnotVector::count_elements`] when done.
    pub fn set_knot(&mut self, i: usize, value: f64) -> Result<()> {
        if i >= self.knots.len() {
            return Err(self.knot_out_of_range(i));
        }
        self.knots[i] = value;
        self.factorization = None;
        Ok(())
    }

    fn knot_out_of_range(&self, i: usize) -> IgaError {
        IgaError::Knot(format!(
            "Knot index {i} out of range, there are {} knots",
            self.knots.len()
        ))
    }

    /// Whether span `i` has nonzero length.
    pub fn is_element(&self, i: usize) -> bool {
        i < self.knot_span_count() && self.knots[self.order + i] != self.knots[self.order + i + 1]
    }

    /// Parameter value at local coordinate `xi` of the interval starting at
    /// knot `ni`.
    pub fn knot_location(&self, xi: f64, ni: usize) -> f64 {
        self.knots[ni] + xi * (self.knots[ni + 1] - self.knots[ni])
    }

    /// Recount the elements after the knots have changed.
    pub fn count_elements(&mut self) {
        self.num_elements = (self.order..self.ncp)
            .filter(|&i| self.knots[i] != self.knots[i + 1])
            .count();
        self.factorization = None;
    }

    pub fn spacing(&self) -> Option<&SpacingRule> {
        self.spacing.as_ref()
    }

    pub fn spacing_mut(&mut self) -> Option<&mut SpacingRule> {
        self.spacing.as_mut()
    }

    pub fn set_spacing(&mut self, spacing: Option<SpacingRule>) {
        self.spacing = spacing;
    }

    pub fn is_coarse(&self) -> bool {
        self.coarse
    }

    pub fn set_coarse(&mut self, coarse: bool) {
        self.coarse = coarse;
    }

    /// Same knots and order within `tol`.
    pub fn same_knots(&self, other: &KnotVector, tol: &Tolerance) -> bool {
        self.order == other.order
            && self.knots.len() == other.knots.len()
            && self
                .knots
                .iter()
                .zip(&other.knots)
                .all(|(a, b)| tol.linear_eq(*a, *b))
    }

    /// Distinct knot values with their multiplicities.
    pub fn breakpoints(&self) -> Vec<(f64, usize)> {
        let mut out: Vec<(f64, usize)> = Vec::new();
        for &k in &self.knots {
            match out.last_mut() {
                Some((v, m)) if *v == k => *m += 1,
                _ => out.push((k, 1)),
            }
        }
        out
    }

    /// Knot vector of order `order + t` describing the same spline space
    /// raised in degree: every interior breakpoint gains `t` in
    /// multiplicity and the ends become `order + t + 1` fold.
    pub fn degree_elevate(&self, t: usize) -> Result<KnotVector> {
        let order = self.order + t;
        if order > MAX_ORDER {
            return Err(IgaError::Knot(format!(
                "Degree elevation to order {order} exceeds the maximum {MAX_ORDER}"
            )));
        }
        let bps = self.breakpoints();
        let last = bps.len() - 1;
        let mut knots = Vec::with_capacity(self.knots.len() + (bps.len() + 1) * t);
        for (i, &(v, m)) in bps.iter().enumerate() {
            let mult = if i == 0 || i == last { order + 1 } else { m + t };
            knots.extend(std::iter::repeat(v).take(mult));
        }
        let mut kv = KnotVector::new(order, knots)?;
        kv.spacing = self.spacing.clone();
        kv.coarse = self.coarse;
        Ok(kv)
    }

    /// Knot vector of order `order + t` with the same interior knots, so
    /// the continuity at every interior breakpoint rises by `t`.
    pub fn order_elevated(&self, t: usize) -> Result<KnotVector> {
        let order = self.order + t;
        if order > MAX_ORDER {
            return Err(IgaError::Knot(format!(
                "Order {order} exceeds the maximum {MAX_ORDER}"
            )));
        }
        let mut knots = vec![self.min_knot(); order + 1];
        knots.extend_from_slice(&self.knots[self.order + 1..self.ncp]);
        knots.extend(std::iter::repeat(self.max_knot()).take(order + 1));
        let mut kv = KnotVector::new(order, knots)?;
        kv.spacing = self.spacing.clone();
        Ok(kv)
    }

    /// `rf - 1` equally spaced knots inside every element.
    pub fn uniform_refinement(&self, rf: usize) -> Result<Vec<f64>> {
        if rf < 2 {
            return Err(IgaError::Knot(format!(
                "Refinement factor must be at least 2, got {rf}"
            )));
        }
        let h = 1.0 / rf as f64;
        let mut out = Vec::with_capacity(self.num_elements * (rf - 1));
        for w in self.knots.windows(2) {
            if w[0] != w[1] {
                for m in 1..rf {
                    let s = m as f64 * h;
                    out.push((1.0 - s) * w[0] + s * w[1]);
                }
            }
        }
        Ok(out)
    }

    /// Knots to insert for refinement by `rf`, following the spacing rule
    /// when there is one. The rule is rescaled to the refined element count.
    pub fn refinement(&mut self, rf: usize) -> Result<Vec<f64>> {
        if rf < 2 {
            return Err(IgaError::Knot(format!(
                "Refinement factor must be at least 2, got {rf}"
            )));
        }
        let ne = self.num_elements;
        let Some(rule) = self.spacing.as_mut() else {
            return self.uniform_refinement(rf);
        };
        rule.scale_parameters(1.0 / rf as f64);
        rule.set_size(rf * ne);
        rule.validate()?;
        let s = rule.eval_all();

        let (k0, k1) = (self.min_knot(), self.max_knot());
        let mut out = Vec::with_capacity((rf - 1) * ne);
        // Coarse knots stay where they are; only the new ones follow the rule.
        let mut s0 = 0.0;
        for i in 0..ne {
            s0 += s[rf * i];
            for j in 0..rf - 1 {
                out.push((1.0 - s0) * k0 + s0 * k1);
                s0 += s[rf * i + j + 1];
            }
        }
        Ok(out)
    }

    /// 1 unless a non-nested spacing rule is attached, in which case the
    /// rule's size.
    pub fn coarsening_factor(&self) -> usize {
        match &self.spacing {
            Some(rule) if !rule.nested() => rule.size(),
            _ => 1,
        }
    }

    /// Knots that coarsening by `cf` removes: within each group of `cf`
    /// consecutive elements, the `cf - 1` breakpoints inside the group.
    pub fn fine_knots(&self, cf: usize) -> Result<Vec<f64>> {
        if cf < 2 {
            return Ok(Vec::new());
        }
        let cne = self.num_elements / cf;
        if cne == 0 || cne * cf != self.num_elements {
            return Err(IgaError::Knot(format!(
                "Coarsening factor {cf} does not divide {} elements",
                self.num_elements
            )));
        }
        let mut fine = Vec::with_capacity(cne * (cf - 1));
        let mut i = self.order;
        let mut prev = self.knots[self.order];
        for _ in 0..cne {
            let mut cnt = 0;
            while cnt < cf {
                i += 1;
                if self.knots[i] != prev {
                    prev = self.knots[i];
                    cnt += 1;
                    if cnt < cf {
                        fine.push(prev);
                    }
                }
            }
        }
        Ok(fine)
    }

    /// Reverse the knot vector under `u -> a + b - u`.
    pub fn flip(&mut self) {
        let apb = self.min_knot() + self.max_knot();
        let ns = (self.ncp - self.order) / 2;
        for i in 1..=ns {
            let tmp = apb - self.knots[self.order + i];
            self.knots[self.order + i] = apb - self.knots[self.ncp - i];
            self.knots[self.ncp - i] = tmp;
        }
        if let Some(rule) = self.spacing.as_mut() {
            rule.flip();
        }
        self.factorization = None;
    }

    /// Knots present in the longer of the two vectors but not in the
    /// shorter one, in ascending order.
    pub fn difference(&self, other: &KnotVector) -> Result<Vec<f64>> {
        if self.order != other.order {
            return Err(IgaError::Knot(format!(
                "Cannot compare knot vectors of orders {} and {}",
                self.order, other.order
            )));
        }
        let (small, large) = if other.size() >= self.size() {
            (self, other)
        } else {
            (other, self)
        };
        let mut diff = Vec::with_capacity(large.size() - small.size());
        let mut i = 0;
        for &k in &large.knots {
            if i < small.size() && (small.knots[i] - k).abs() < Tolerance::KNOT_EPSILON {
                i += 1;
            } else {
                diff.push(k);
            }
        }
        Ok(diff)
    }

    /// Write `order ncp knots...` on one line.
    pub fn print<W: Write>(&self, out: &mut W) -> Result<()> {
        write!(out, "{} {}", self.order, self.ncp)?;
        for k in &self.knots {
            write!(out, " {k}")?;
        }
        writeln!(out)?;
        Ok(())
    }

    /// Inverse of [`KnotVector::print`].
    pub fn read(reader: &mut TokenReader) -> Result<Self> {
        let order = reader.parse_usize()?;
        let ncp = reader.parse_usize()?;
        let knots = reader.parse_f64_vec(ncp + order + 1)?;
        Self::new(order, knots)
    }

    /// Tabulate every basis function with its first and second derivative
    /// at `samples` points per element. Columns: parameter, then values,
    /// first and second derivatives.
    pub fn print_functions<W: Write>(&self, out: &mut W, samples: usize) -> Result<()> {
        if samples < 2 {
            return Err(IgaError::InvalidOperation(format!(
                "Need at least 2 samples per element, got {samples}"
            )));
        }
        let dx = 1.0 / (samples - 1) as f64;
        let spans = (0..self.knot_span_count()).filter(|&i| self.is_element(i));
        for (e, span) in spans.enumerate() {
            for j in 0..samples {
                let x = j as f64 * dx;
                write!(out, "{}", x + e as f64)?;
                for row in [
                    self.calc_shape(span, x)?,
                    self.calc_dshape(span, x)?,
                    self.calc_d2shape(span, x)?,
                ] {
                    for v in row {
                        write!(out, "\t{v}")?;
                    }
                }
                writeln!(out)?;
            }
        }
        Ok(())
    }
}

impl Validate for KnotVector {
    fn validate(&self) -> Result<()> {
        if self.order > MAX_ORDER {
            return Err(IgaError::Knot(format!(
                "Order {} exceeds the maximum {MAX_ORDER}",
                self.order
            )));
        }
        if self.knots.len() != self.ncp + self.order + 1 {
            return Err(IgaError::Knot(format!(
                "Knot vector of order {} with {} control points has {} knots",
                self.order,
                self.ncp,
                self.knots.len()
            )));
        }
        if let Some(i) = self.knots.windows(2).position(|w| w[1] < w[0]) {
            return Err(IgaError::Knot(format!(
                "Knots decrease at index {}: {} > {}",
                i + 1,
                self.knots[i],
                self.knots[i + 1]
            )));
        }
        let bps = self.breakpoints();
        let open = bps.len() >= 2
            && bps[0].1 == self.order + 1
            && bps[bps.len() - 1].1 == self.order + 1;
        if !open {
            return Err(IgaError::Knot(
                "End knots must be repeated order + 1 times".into(),
            ));
        }
        if let Some(&(v, m)) = bps[1..bps.len() - 1].iter().find(|(_, m)| *m > self.order + 1) {
            return Err(IgaError::Knot(format!(
                "Interior knot {v} has multiplicity {m} above order + 1"
            )));
        }
        if self.num_elements == 0 {
            return Err(IgaError::Knot("Knot vector has no elements".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn kv(order: usize, knots: &[f64]) -> KnotVector {
        KnotVector::new(order, knots.to_vec()).unwrap()
    }

    #[test]
    fn test_counts() {
        let k = kv(2, &[0.0, 0.0, 0.0, 0.5, 0.5, 1.0, 1.0, 1.0]);
        assert_eq!(k.ncp(), 5);
        assert_eq!(k.knot_span_count(), 3);
        assert_eq!(k.element_count(), 2);
        assert!(k.is_element(0));
        assert!(!k.is_element(1));
        assert!(k.is_element(2));
        assert!(!k.is_element(3));
    }

    #[test]
    fn test_from_intervals() {
        let k = KnotVector::from_intervals(2, &[0.5, 0.25, 0.25], &[-1, 1, 0, -1]).unwrap();
        assert_eq!(k.knots(), &[0.0, 0.0, 0.0, 0.5, 0.75, 0.75, 1.0, 1.0, 1.0]);
        assert_eq!(k.element_count(), 3);
        assert!(KnotVector::from_intervals(2, &[1.0], &[-1]).is_err());
        assert!(KnotVector::from_intervals(2, &[1.0], &[-2, -1]).is_err());
    }

    #[test]
    fn test_rejects_bad_sequences() {
        assert!(KnotVector::new(1, vec![0.0, 0.0, 1.0, 0.5, 1.0, 1.0]).is_err());
        assert!(KnotVector::new(2, vec![0.0, 0.0, 1.0, 1.0, 1.0, 1.0]).is_err());
        assert!(KnotVector::new(MAX_ORDER + 1, vec![0.0; 24]).is_err());
    }

    #[test]
    fn test_degree_elevate_raises_every_multiplicity() {
        let k = kv(2, &[0.0, 0.0, 0.0, 0.5, 1.0, 1.0, 1.0]);
        let e = k.degree_elevate(1).unwrap();
        assert_eq!(e.order(), 3);
        assert_eq!(e.knots(), &[0.0, 0.0, 0.0, 0.0, 0.5, 0.5, 1.0, 1.0, 1.0, 1.0]);
        assert_eq!(e.ncp(), k.ncp() + k.element_count());
    }

    #[test]
    fn test_order_elevated_keeps_interior_knots() {
        let k = kv(1, &[0.0, 0.0, 0.5, 1.0, 1.0]);
        let e = k.order_elevated(1).unwrap();
        assert_eq!(e.knots(), &[0.0, 0.0, 0.0, 0.5, 1.0, 1.0, 1.0]);
        assert_eq!(e.ncp(), k.ncp() + 1);
    }

    #[test]
    fn test_uniform_refinement_knots() {
        let k = kv(2, &[0.0, 0.0, 0.0, 0.5, 1.0, 1.0, 1.0]);
        let new = k.uniform_refinement(2).unwrap();
        assert_eq!(new, vec![0.25, 0.75]);
        assert!(k.uniform_refinement(1).is_err());
    }

    #[test]
    fn test_spacing_refinement_keeps_coarse_knots() {
        let mut k = kv(1, &[0.0, 0.0, 0.5, 1.0, 1.0]);
        k.set_spacing(Some(SpacingRule::Uniform { n: 2 }));
        let new = k.refinement(2).unwrap();
        assert_eq!(new.len(), 2);
        assert_relative_eq!(new[0], 0.25);
        assert_relative_eq!(new[1], 0.75);
        assert_eq!(k.spacing().map(|s| s.size()), Some(4));
    }

    #[test]
    fn test_fine_knots() {
        let k = kv(1, &[0.0, 0.0, 0.25, 0.5, 0.75, 1.0, 1.0]);
        assert_eq!(k.fine_knots(2).unwrap(), vec![0.25, 0.75]);
        assert_eq!(k.fine_knots(4).unwrap(), vec![0.25, 0.5, 0.75]);
        assert!(k.fine_knots(3).is_err());
        assert!(k.fine_knots(1).unwrap().is_empty());
    }

    #[test]
    fn test_flip() {
        let mut k = kv(2, &[0.0, 0.0, 0.0, 0.2, 0.3, 1.0, 1.0, 1.0]);
        k.flip();
        assert_relative_eq!(k.knot(3).unwrap(), 0.7);
        assert_relative_eq!(k.knot(4).unwrap(), 0.8);
        k.flip();
        assert_relative_eq!(k.knot(3).unwrap(), 0.2);
        assert_relative_eq!(k.knot(4).unwrap(), 0.3);
    }

    #[test]
    fn test_knot_access_out_of_range() {
        let mut k = kv(1, &[0.0, 0.0, 1.0, 1.0]);
        assert!(matches!(k.knot(4), Err(IgaError::Knot(_))));
        assert!(k.set_knot(4, 0.5).is_err());
        k.set_knot(1, 0.0).unwrap();
        assert_eq!(k.knots(), &[0.0, 0.0, 1.0, 1.0]);
    }

    #[test]
    fn test_difference_is_symmetric() {
        let coarse = kv(2, &[0.0, 0.0, 0.0, 0.5, 1.0, 1.0, 1.0]);
        let fine = kv(2, &[0.0, 0.0, 0.0, 0.25, 0.5, 0.5, 0.75, 1.0, 1.0, 1.0]);
        let d1 = coarse.difference(&fine).unwrap();
        let d2 = fine.difference(&coarse).unwrap();
        assert_eq!(d1, vec![0.25, 0.5, 0.75]);
        assert_eq!(d1, d2);
        assert!(fine.difference(&fine).unwrap().is_empty());
        let linear = kv(1, &[0.0, 0.0, 1.0, 1.0]);
        assert!(linear.difference(&coarse).is_err());
    }

    #[test]
    fn test_text_round_trip() {
        let k = kv(2, &[0.0, 0.0, 0.0, 0.5, 1.0, 1.0, 1.0]);
        let mut buf = Vec::new();
        k.print(&mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert_eq!(text, "2 4 0 0 0 0.5 1 1 1\n");
        let back = KnotVector::read(&mut TokenReader::new(&text)).unwrap();
        assert_eq!(back, k);
    }

    #[test]
    fn test_print_functions_rows() {
        let k = kv(1, &[0.0, 0.0, 0.5, 1.0, 1.0]);
        let mut buf = Vec::new();
        k.print_functions(&mut buf, 3).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert_eq!(text.lines().count(), 6);
        let first: Vec<&str> = text.lines().next().unwrap().split('\t').collect();
        assert_eq!(first.len(), 1 + 3 * 2);
    }

    #[test]
    fn test_serde_skips_factorization() {
        let k = kv(2, &[0.0, 0.0, 0.0, 0.5, 1.0, 1.0, 1.0]);
        let json = serde_json::to_string(&k).unwrap();
        let back: KnotVector = serde_json::from_str(&json).unwrap();
        assert_eq!(back, k);
    }
}

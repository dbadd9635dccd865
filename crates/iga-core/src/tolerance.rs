/// Tolerance used when comparing knots and control points.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Tolerance {
    /// Linear tolerance for knot values and control-point distances
    pub linear: f64,
}

impl Tolerance {
    pub const DEFAULT_LINEAR: f64 = 1e-7;

    /// Bound below which two knots are considered the same value.
    pub const KNOT_EPSILON: f64 = 2.0 * f64::EPSILON;

    pub fn new(linear: f64) -> Self {
        Self { linear }
    }

    /// Check if two values are equal within linear tolerance
    pub fn linear_eq(self, a: f64, b: f64) -> bool {
        (a - b).abs() < self.linear
    }
}

impl Default for Tolerance {
    fn default() -> Self {
        Self::new(Self::DEFAULT_LINEAR)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_linear_eq() {
        let tol = Tolerance::default();
        assert!(tol.linear_eq(0.5, 0.5 + 1e-9));
        assert!(!tol.linear_eq(0.5, 0.5 + 1e-6));
        assert!(!Tolerance::new(0.0).linear_eq(0.5, 0.5));
    }
}

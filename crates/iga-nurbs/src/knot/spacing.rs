//! Spacing rules: relative element sizes along a knot vector, summing to one.

use std::io::Write;

use iga_core::{IgaError, Result, TokenReader, Validate};
use serde::{Deserialize, Serialize};

/// Relative sizes of `n` consecutive intervals.
///
/// With `scale` set, the shape parameter follows refinement and coarsening
/// so that the grading is preserved when the number of intervals changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SpacingRule {
    /// All intervals of size `1/n`.
    Uniform { n: usize },
    /// Sizes `s, s + d, s + 2d, ...`, with `d` fixed by the unit sum.
    Linear {
        n: usize,
        reverse: bool,
        scale: bool,
        first: f64,
    },
    /// Sizes `s, s r, s r^2, ...`, with `s` fixed by the unit sum.
    Geometric {
        n: usize,
        reverse: bool,
        scale: bool,
        ratio: f64,
    },
}

impl SpacingRule {
    pub const UNIFORM: i64 = 0;
    pub const LINEAR: i64 = 1;
    pub const GEOMETRIC: i64 = 2;

    /// Build a rule from its type code and parameter lists, as stored in
    /// the `spacing` section of a mesh file.
    pub fn from_parameters(code: i64, ints: &[i64], reals: &[f64]) -> Result<Self> {
        let int_at = |i: usize| {
            ints.get(i).copied().ok_or_else(|| {
                IgaError::Parse(format!(
                    "Spacing type {code} needs at least {} integer parameters",
                    i + 1
                ))
            })
        };
        let real_at = |i: usize| {
            reals.get(i).copied().ok_or_else(|| {
                IgaError::Parse(format!(
                    "Spacing type {code} needs at least {} real parameters",
                    i + 1
                ))
            })
        };
        let size = |v: i64| {
            usize::try_from(v)
                .ok()
                .filter(|&n| n > 0)
                .ok_or_else(|| IgaError::Parse(format!("Invalid spacing size {v}")))
        };

        let rule = match code {
            Self::UNIFORM => SpacingRule::Uniform { n: size(int_at(0)?)? },
            Self::LINEAR => SpacingRule::Linear {
                n: size(int_at(0)?)?,
                reverse: int_at(1)? != 0,
                scale: int_at(2)? != 0,
                first: real_at(0)?,
            },
            Self::GEOMETRIC => SpacingRule::Geometric {
                n: size(int_at(0)?)?,
                reverse: int_at(1)? != 0,
                scale: int_at(2)? != 0,
                ratio: real_at(0)?,
            },
            other => {
                return Err(IgaError::Parse(format!("Unknown spacing type {other}")));
            }
        };
        rule.validate()?;
        Ok(rule)
    }

    pub fn code(&self) -> i64 {
        match self {
            SpacingRule::Uniform { .. } => Self::UNIFORM,
            SpacingRule::Linear { .. } => Self::LINEAR,
            SpacingRule::Geometric { .. } => Self::GEOMETRIC,
        }
    }

    pub fn size(&self) -> usize {
        match *self {
            SpacingRule::Uniform { n }
            | SpacingRule::Linear { n, .. }
            | SpacingRule::Geometric { n, .. } => n,
        }
    }

    pub fn set_size(&mut self, size: usize) {
        match self {
            SpacingRule::Uniform { n }
            | SpacingRule::Linear { n, .. }
            | SpacingRule::Geometric { n, .. } => *n = size,
        }
    }

    /// Only uniform spacing nests: refining it keeps every coarse knot.
    pub fn nested(&self) -> bool {
        matches!(self, SpacingRule::Uniform { .. })
    }

    /// Adjust the shape parameter when every interval is split into `1/a`
    /// parts (or merged, for `a > 1`).
    pub fn scale_parameters(&mut self, a: f64) {
        match self {
            SpacingRule::Uniform { .. } => {}
            SpacingRule::Linear { scale, first, .. } => {
                if *scale {
                    *first *= a;
                }
            }
            SpacingRule::Geometric { scale, ratio, .. } => {
                if *scale {
                    *ratio = ratio.powf(a);
                }
            }
        }
    }

    /// Run the intervals in the opposite order.
    pub fn flip(&mut self) {
        match self {
            SpacingRule::Uniform { .. } => {}
            SpacingRule::Linear { reverse, .. } | SpacingRule::Geometric { reverse, .. } => {
                *reverse = !*reverse;
            }
        }
    }

    fn linear_step(n: usize, first: f64) -> f64 {
        if n < 2 {
            0.0
        } else {
            2.0 * (1.0 - n as f64 * first) / (n * (n - 1)) as f64
        }
    }

    fn geometric_first(n: usize, ratio: f64) -> f64 {
        if n == 1 {
            1.0
        } else if ratio == 1.0 {
            1.0 / n as f64
        } else {
            (1.0 - ratio) / (1.0 - ratio.powi(n as i32))
        }
    }

    /// Size of interval `p`.
    pub fn eval(&self, p: usize) -> f64 {
        match *self {
            SpacingRule::Uniform { n } => 1.0 / n as f64,
            SpacingRule::Linear {
                n, reverse, first, ..
            } => {
                let i = if reverse { n - 1 - p } else { p };
                first + i as f64 * Self::linear_step(n, first)
            }
            SpacingRule::Geometric {
                n, reverse, ratio, ..
            } => {
                let i = if reverse { n - 1 - p } else { p };
                Self::geometric_first(n, ratio) * ratio.powi(i as i32)
            }
        }
    }

    pub fn eval_all(&self) -> Vec<f64> {
        (0..self.size()).map(|p| self.eval(p)).collect()
    }

    fn int_parameters(&self) -> Vec<i64> {
        match *self {
            SpacingRule::Uniform { n } => vec![n as i64],
            SpacingRule::Linear {
                n, reverse, scale, ..
            }
            | SpacingRule::Geometric {
                n, reverse, scale, ..
            } => vec![n as i64, reverse as i64, scale as i64],
        }
    }

    fn real_parameters(&self) -> Vec<f64> {
        match *self {
            SpacingRule::Uniform { .. } => Vec::new(),
            SpacingRule::Linear { first, .. } => vec![first],
            SpacingRule::Geometric { ratio, .. } => vec![ratio],
        }
    }

    /// Write `<type> <#ints> <#reals> <ints...> <reals...>` on one line.
    pub fn print<W: Write>(&self, out: &mut W) -> Result<()> {
        let ints = self.int_parameters();
        let reals = self.real_parameters();
        write!(out, "{} {} {}", self.code(), ints.len(), reals.len())?;
        for v in &ints {
            write!(out, " {v}")?;
        }
        for v in &reals {
            write!(out, " {v}")?;
        }
        writeln!(out)?;
        Ok(())
    }

    /// Inverse of [`SpacingRule::print`].
    pub fn read(reader: &mut TokenReader) -> Result<Self> {
        let code = reader.parse_i64()?;
        let num_ints = reader.parse_usize()?;
        let num_reals = reader.parse_usize()?;
        let ints = (0..num_ints)
            .map(|_| reader.parse_i64())
            .collect::<Result<Vec<_>>>()?;
        let reals = reader.parse_f64_vec(num_reals)?;
        Self::from_parameters(code, &ints, &reals)
    }
}

impl Validate for SpacingRule {
    fn validate(&self) -> Result<()> {
        if self.size() == 0 {
            return Err(IgaError::Knot("Spacing rule with no intervals".into()));
        }
        match *self {
            SpacingRule::Uniform { .. } => Ok(()),
            SpacingRule::Linear { n, first, .. } => {
                let last = first + (n - 1) as f64 * Self::linear_step(n, first);
                if first <= 0.0 || last <= 0.0 {
                    return Err(IgaError::Knot(format!(
                        "Linear spacing with first interval {first} over {n} intervals \
                         produces non-positive sizes"
                    )));
                }
                Ok(())
            }
            SpacingRule::Geometric { ratio, .. } => {
                if ratio <= 0.0 {
                    return Err(IgaError::Knot(format!(
                        "Geometric spacing ratio must be positive, got {ratio}"
                    )));
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn total(rule: &SpacingRule) -> f64 {
        rule.eval_all().iter().sum()
    }

    #[test]
    fn test_sizes_sum_to_one() {
        let rules = [
            SpacingRule::Uniform { n: 7 },
            SpacingRule::Linear {
                n: 5,
                reverse: false,
                scale: true,
                first: 0.1,
            },
            SpacingRule::Geometric {
                n: 6,
                reverse: true,
                scale: false,
                ratio: 1.5,
            },
        ];
        for rule in &rules {
            rule.validate().unwrap();
            assert_relative_eq!(total(rule), 1.0, epsilon = 1e-14);
        }
    }

    #[test]
    fn test_linear_reverse_mirrors_sizes() {
        let mut rule = SpacingRule::Linear {
            n: 4,
            reverse: false,
            scale: false,
            first: 0.1,
        };
        let forward = rule.eval_all();
        rule.flip();
        let backward = rule.eval_all();
        for (a, b) in forward.iter().zip(backward.iter().rev()) {
            assert_relative_eq!(a, b);
        }
    }

    #[test]
    fn test_scaled_geometric_keeps_overall_grading() {
        let mut rule = SpacingRule::Geometric {
            n: 2,
            reverse: false,
            scale: true,
            ratio: 4.0,
        };
        let coarse = rule.eval_all();
        rule.scale_parameters(0.5);
        rule.set_size(4);
        let fine = rule.eval_all();
        assert_relative_eq!(fine[0] + fine[1], coarse[0], epsilon = 1e-14);
        assert_relative_eq!(fine[2] + fine[3], coarse[1], epsilon = 1e-14);
    }

    #[test]
    fn test_text_line() {
        let rule = SpacingRule::Linear {
            n: 3,
            reverse: true,
            scale: false,
            first: 0.25,
        };
        let mut buf = Vec::new();
        rule.print(&mut buf).unwrap();
        let line = String::from_utf8(buf).unwrap();
        assert_eq!(line, "1 3 1 3 1 0 0.25\n");
        let back = SpacingRule::read(&mut TokenReader::new(&line)).unwrap();
        assert_eq!(back, rule);
    }

    #[test]
    fn test_invalid_linear_parameters() {
        let rule = SpacingRule::Linear {
            n: 4,
            reverse: false,
            scale: false,
            first: 0.6,
        };
        assert!(rule.validate().is_err());
        assert!(SpacingRule::from_parameters(7, &[1], &[]).is_err());
    }
}

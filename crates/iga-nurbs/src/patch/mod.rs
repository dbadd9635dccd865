//! Tensor-product NURBS patches in homogeneous coordinates.
//!
//! Control points are stored point after point with the first parametric
//! direction running fastest; each point holds `dim` values, the weighted
//! coordinates followed by the weight.

mod construct;
mod elevate;
mod eval;
mod insert;
mod io;
mod refine;
mod remove;
mod transform;

use iga_core::{IgaError, Result, Validate};
use serde::{Deserialize, Serialize};

use crate::knot::KnotVector;

pub use construct::{interpolate, revolve_3d};
pub use remove::RemovalOutcome;

/// Strides for walking the control net along one parametric direction.
///
/// The net is seen as `nd` slices of `ls` values each, slice `i` holding
/// every control value whose index along the direction is `i`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopDirection {
    /// Distance between neighbours along the direction.
    pub sd: usize,
    /// Number of control points along the direction.
    pub nd: usize,
    /// Number of values in one slice.
    pub ls: usize,
}

impl LoopDirection {
    /// Position in the data buffer of value `j` of slice `i`.
    #[inline]
    pub fn offset(&self, i: usize, j: usize) -> usize {
        j % self.sd + self.sd * (i + (j / self.sd) * self.nd)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NurbsPatch {
    kv: Vec<KnotVector>,
    dim: usize,
    data: Vec<f64>,
}

impl NurbsPatch {
    /// Patch with zeroed control points.
    ///
    /// `dim` counts the homogeneous components, so a planar patch has
    /// `dim == 3`.
    pub fn new(kv: Vec<KnotVector>, dim: usize) -> Result<Self> {
        if kv.is_empty() || kv.len() > 3 {
            return Err(IgaError::Patch(format!(
                "A patch needs 1 to 3 knot vectors, got {}",
                kv.len()
            )));
        }
        if dim < 2 {
            return Err(IgaError::Patch(format!(
                "Control points need at least 2 homogeneous components, got {dim}"
            )));
        }
        let points: usize = kv.iter().map(KnotVector::ncp).product();
        Ok(Self {
            kv,
            dim,
            data: vec![0.0; points * dim],
        })
    }

    /// Patch with the given homogeneous control values.
    pub fn from_data(kv: Vec<KnotVector>, dim: usize, data: Vec<f64>) -> Result<Self> {
        let mut patch = Self::new(kv, dim)?;
        if data.len() != patch.data.len() {
            return Err(IgaError::Patch(format!(
                "Patch needs {} control values, got {}",
                patch.data.len(),
                data.len()
            )));
        }
        patch.data = data;
        Ok(patch)
    }

    pub fn from_knot_vectors(kv: &[KnotVector], dim: usize) -> Result<Self> {
        Self::new(kv.to_vec(), dim)
    }

    /// Number of parametric directions.
    pub fn param_dim(&self) -> usize {
        self.kv.len()
    }

    /// Components per control point, weight included.
    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn spatial_dim(&self) -> usize {
        self.dim - 1
    }

    pub fn num_points(&self) -> usize {
        self.data.len() / self.dim
    }

    pub(crate) fn check_dir(&self, dir: usize, op: &str) -> Result<()> {
        if dir >= self.kv.len() {
            return Err(IgaError::Patch(format!(
                "{op}: invalid direction {dir} for a patch with {} directions",
                self.kv.len()
            )));
        }
        Ok(())
    }

    pub fn ncp(&self, dir: usize) -> Result<usize> {
        self.check_dir(dir, "ncp")?;
        Ok(self.kv[dir].ncp())
    }

    pub fn knot_vector(&self, dir: usize) -> Result<&KnotVector> {
        self.check_dir(dir, "knot_vector")?;
        Ok(&self.kv[dir])
    }

    pub fn knot_vector_mut(&mut self, dir: usize) -> Result<&mut KnotVector> {
        self.check_dir(dir, "knot_vector_mut")?;
        Ok(&mut self.kv[dir])
    }

    pub fn knot_vectors(&self) -> &[KnotVector] {
        &self.kv
    }

    pub fn data(&self) -> &[f64] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [f64] {
        &mut self.data
    }

    /// Linear index of the control point with tensor index `ijk`.
    pub fn point_index(&self, ijk: &[usize]) -> Result<usize> {
        if ijk.len() != self.kv.len() {
            return Err(IgaError::Patch(format!(
                "Tensor index {ijk:?} does not match {} directions",
                self.kv.len()
            )));
        }
        let mut index = 0;
        for (d, &i) in ijk.iter().enumerate().rev() {
            let n = self.kv[d].ncp();
            if i >= n {
                return Err(IgaError::Patch(format!(
                    "Index {i} out of range in direction {d} with {n} control points"
                )));
            }
            index = index * n + i;
        }
        Ok(index)
    }

    pub fn get(&self, ijk: &[usize], l: usize) -> Result<f64> {
        let p = self.point_index(ijk)?;
        self.check_component(l)?;
        Ok(self.data[p * self.dim + l])
    }

    pub fn set(&mut self, ijk: &[usize], l: usize, value: f64) -> Result<()> {
        let p = self.point_index(ijk)?;
        self.check_component(l)?;
        self.data[p * self.dim + l] = value;
        Ok(())
    }

    pub fn weight(&self, ijk: &[usize]) -> Result<f64> {
        self.get(ijk, self.dim - 1)
    }

    pub fn set_weight(&mut self, ijk: &[usize], w: f64) -> Result<()> {
        self.set(ijk, self.dim - 1, w)
    }

    fn check_component(&self, l: usize) -> Result<()> {
        if l >= self.dim {
            return Err(IgaError::Patch(format!(
                "Component {l} out of range for {} components",
                self.dim
            )));
        }
        Ok(())
    }

    pub fn loop_direction(&self, dir: usize) -> Result<LoopDirection> {
        self.check_dir(dir, "loop_direction")?;
        let n: Vec<usize> = self.kv.iter().map(KnotVector::ncp).collect();
        let dim = self.dim;
        let ld = match (n.len(), dir) {
            (1, _) => LoopDirection {
                sd: dim,
                nd: n[0],
                ls: dim,
            },
            (2, 0) => LoopDirection {
                sd: dim,
                nd: n[0],
                ls: n[1] * dim,
            },
            (2, _) => LoopDirection {
                sd: n[0] * dim,
                nd: n[1],
                ls: n[0] * dim,
            },
            (_, 0) => LoopDirection {
                sd: dim,
                nd: n[0],
                ls: n[1] * n[2] * dim,
            },
            (_, 1) => LoopDirection {
                sd: n[0] * dim,
                nd: n[1],
                ls: n[0] * n[2] * dim,
            },
            _ => LoopDirection {
                sd: n[0] * n[1] * dim,
                nd: n[2],
                ls: n[0] * n[1] * dim,
            },
        };
        Ok(ld)
    }

    /// Copy out the slices along `dir`.
    pub(crate) fn slices(&self, dir: usize) -> Result<Vec<Vec<f64>>> {
        let ld = self.loop_direction(dir)?;
        Ok((0..ld.nd)
            .map(|i| (0..ld.ls).map(|j| self.data[ld.offset(i, j)]).collect())
            .collect())
    }

    /// Patch whose knot vector `dir` is `kv_dir` and whose slices along
    /// `dir` are `rows`; the other knot vectors are copied from `self`.
    pub(crate) fn rebuilt(&self, dir: usize, kv_dir: KnotVector, rows: &[Vec<f64>]) -> Result<Self> {
        let mut kv = self.kv.clone();
        kv[dir] = kv_dir;
        let mut patch = Self::new(kv, self.dim)?;
        let ld = patch.loop_direction(dir)?;
        if rows.len() != ld.nd || rows.iter().any(|r| r.len() != ld.ls) {
            return Err(IgaError::Patch(format!(
                "Rebuilding direction {dir}: expected {} slices of {} values",
                ld.nd, ld.ls
            )));
        }
        for (i, row) in rows.iter().enumerate() {
            for (j, &v) in row.iter().enumerate() {
                patch.data[ld.offset(i, j)] = v;
            }
        }
        Ok(patch)
    }

    /// Run `op` on a copy of the patch and keep the copy only when `op`
    /// succeeds, so a failed multi-step operation leaves `self` untouched.
    pub(crate) fn transact<T>(&mut self, op: impl FnOnce(&mut NurbsPatch) -> Result<T>) -> Result<T> {
        let mut work = self.clone();
        let out = op(&mut work)?;
        *self = work;
        Ok(out)
    }
}

/// `a x + b y`
pub(crate) fn combine(a: f64, x: &[f64], b: f64, y: &[f64]) -> Vec<f64> {
    x.iter().zip(y).map(|(xi, yi)| a * xi + b * yi).collect()
}

pub(crate) fn distance(x: &[f64], y: &[f64]) -> f64 {
    x.iter()
        .zip(y)
        .map(|(a, b)| (a - b) * (a - b))
        .sum::<f64>()
        .sqrt()
}

impl Validate for NurbsPatch {
    fn validate(&self) -> Result<()> {
        for kv in &self.kv {
            kv.validate()?;
        }
        let points: usize = self.kv.iter().map(KnotVector::ncp).product();
        if self.data.len() != points * self.dim {
            return Err(IgaError::Patch(format!(
                "Patch holds {} values, its knot vectors need {}",
                self.data.len(),
                points * self.dim
            )));
        }
        if let Some(p) = self
            .data
            .chunks(self.dim)
            .position(|pt| pt[self.dim - 1] == 0.0)
        {
            return Err(IgaError::Patch(format!("Control point {p} has zero weight")));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn linear(n: usize) -> KnotVector {
        let mut knots = vec![0.0, 0.0];
        for i in 1..n - 1 {
            knots.push(i as f64);
        }
        knots.extend([(n - 1) as f64; 2]);
        KnotVector::new(1, knots).unwrap()
    }

    fn numbered(kv: Vec<KnotVector>) -> NurbsPatch {
        let mut patch = NurbsPatch::new(kv, 2).unwrap();
        for (i, v) in patch.data_mut().iter_mut().enumerate() {
            *v = i as f64;
        }
        patch
    }

    #[test]
    fn test_point_index_first_direction_fastest() {
        let patch = numbered(vec![linear(3), linear(4), linear(2)]);
        assert_eq!(patch.point_index(&[1, 0, 0]).unwrap(), 1);
        assert_eq!(patch.point_index(&[0, 1, 0]).unwrap(), 3);
        assert_eq!(patch.point_index(&[0, 0, 1]).unwrap(), 12);
        assert!(patch.point_index(&[3, 0, 0]).is_err());
        assert!(patch.point_index(&[0, 0]).is_err());
    }

    #[test]
    fn test_slices_cover_the_net_once() {
        let patch = numbered(vec![linear(3), linear(4), linear(2)]);
        for dir in 0..3 {
            let rows = patch.slices(dir).unwrap();
            let mut seen: Vec<f64> = rows.into_iter().flatten().collect();
            seen.sort_by(|a, b| a.partial_cmp(b).unwrap());
            let expected: Vec<f64> = (0..patch.data().len()).map(|i| i as f64).collect();
            assert_eq!(seen, expected);
        }
    }

    #[test]
    fn test_slice_holds_points_with_same_index() {
        let patch = numbered(vec![linear(3), linear(4)]);
        let ld = patch.loop_direction(1).unwrap();
        assert_eq!(ld, LoopDirection { sd: 6, nd: 4, ls: 6 });
        let rows = patch.slices(1).unwrap();
        // Slice 2 along the second direction is the third row of points.
        let p = patch.point_index(&[0, 2]).unwrap();
        assert_eq!(rows[2][0], (p * 2) as f64);
    }

    #[test]
    fn test_rebuilt_is_inverse_of_slices() {
        let patch = numbered(vec![linear(3), linear(4), linear(2)]);
        for dir in 0..3 {
            let rows = patch.slices(dir).unwrap();
            let again = patch
                .rebuilt(dir, patch.knot_vector(dir).unwrap().clone(), &rows)
                .unwrap();
            assert_eq!(again, patch);
        }
    }

    #[test]
    fn test_invalid_direction() {
        let patch = numbered(vec![linear(3)]);
        assert!(patch.loop_direction(1).is_err());
        assert!(patch.ncp(2).is_err());
    }
}

use iga_core::{IgaError, Result};
use iga_nurbs::KnotVector;
use log::debug;

use super::tables::along_boundary;
use super::NurbsExtension;
use crate::patch_map::PatchMap;

/// Disjoint sets over global dofs; a union makes the second root the
/// representative.
struct DofForest {
    parent: Vec<usize>,
}

impl DofForest {
    fn new(n: usize) -> Self {
        Self {
            parent: (0..n).collect(),
        }
    }

    fn find(&mut self, mut d: usize) -> usize {
        while self.parent[d] != d {
            self.parent[d] = self.parent[self.parent[d]];
            d = self.parent[d];
        }
        d
    }

    fn union(&mut self, from: usize, into: usize) {
        let (a, b) = (self.find(from), self.find(into));
        if a != b {
            self.parent[a] = b;
        }
    }
}

fn check_compatible(
    master: i64,
    slave: i64,
    (kv0, kv1): (&[&KnotVector], &[&KnotVector]),
    (n0, n1): ([usize; 2], [usize; 2]),
) -> Result<()> {
    if n0 != n1 {
        return Err(IgaError::Consistency(format!(
            "Periodic boundaries {master} and {slave} have {n0:?} and {n1:?} control points"
        )));
    }
    for (d, (a, b)) in kv0.iter().zip(kv1).enumerate() {
        if a.order() != b.order() || a.knot_span_count() != b.knot_span_count() {
            return Err(IgaError::Consistency(format!(
                "Periodic boundaries {master} and {slave} differ in direction {d}: order {} vs {}, \
                 {} vs {} knot spans",
                a.order(),
                b.order(),
                a.knot_span_count(),
                b.knot_span_count()
            )));
        }
        if let Some(i) = (0..a.knot_span_count()).find(|&i| a.is_element(i) != b.is_element(i)) {
            return Err(IgaError::Consistency(format!(
                "Periodic boundaries {master} and {slave}: knot span {i} in direction {d} is an \
                 element on one side only"
            )));
        }
    }
    Ok(())
}

impl NurbsExtension {
    /// Last boundary patch carrying `attribute`.
    fn find_bdr_patch(&self, attribute: i64) -> Result<usize> {
        (0..self.num_bdr_patches())
            .rev()
            .find(|&b| self.topology.bdr_attribute(b) == attribute)
            .ok_or_else(|| {
                IgaError::NotFound(format!("No boundary patch with attribute {attribute}"))
            })
    }

    /// Pairs of dofs that coincide across the periodic boundaries.
    fn periodic_dof_pairs(&self, master: i64, slave: i64) -> Result<Vec<(usize, usize)>> {
        let dim = self.dim();
        let (b0, b1) = (self.find_bdr_patch(master)?, self.find_bdr_patch(slave)?);
        let mut map0 = PatchMap::new(self);
        let mut map1 = PatchMap::new(self);
        let (kv0, okv0) = map0.set_bdr_dof_map(b0)?;
        let (kv1, okv1) = map1.set_bdr_dof_map(b1)?;

        if dim == 1 {
            return Ok(vec![(map0.at(&[0])?, map1.at(&[0])?)]);
        }

        let extent = |map: &PatchMap<'_>| [map.nx(), if dim == 3 { map.ny() } else { 0 }];
        let n = extent(&map0);
        check_compatible(master, slave, (kv0.as_slice(), kv1.as_slice()), (n, extent(&map1)))?;

        let spans = |d: usize| -> Vec<usize> {
            kv0.get(d).map_or(vec![0], |kv| {
                (0..kv.knot_span_count()).filter(|&i| kv.is_element(i)).collect()
            })
        };
        let orders = [kv0[0].order(), kv0.get(1).map_or(0, |kv| kv.order())];
        let orient = |okv: &[i32], d: usize| okv.get(d).copied().unwrap_or(1);

        let mut pairs = Vec::new();
        for j in spans(1) {
            for jj in 0..=orders[1] {
                let j0 = along_boundary(orient(okv0.as_slice(), 1), j + jj, n[1]);
                let j1 = along_boundary(orient(okv1.as_slice(), 1), j + jj, n[1]);
                for i in spans(0) {
                    for ii in 0..=orders[0] {
                        let i0 = along_boundary(okv0[0], i + ii, n[0]);
                        let i1 = along_boundary(okv1[0], i + ii, n[0]);
                        let (ij0, ij1) = ([i0, j0], [i1, j1]);
                        pairs.push((map0.at(&ij0[..dim - 1])?, map1.at(&ij1[..dim - 1])?));
                    }
                }
            }
        }
        Ok(pairs)
    }

    /// Identify the dofs of every master boundary with those of its slave
    /// and regenerate the dof tables over the reduced numbering.
    ///
    /// Runs on tables generated without identification.
    pub(crate) fn connect_boundaries(&mut self) -> Result<()> {
        if self.master.len() != self.slave.len() {
            return Err(IgaError::Consistency(format!(
                "{} master boundaries for {} slave boundaries",
                self.master.len(),
                self.slave.len()
            )));
        }
        if self.master.is_empty() {
            return Ok(());
        }

        let total = self.num_dofs;
        let mut forest = DofForest::new(total);
        for (&m, &s) in self.master.iter().zip(&self.slave) {
            for (d0, d1) in self.periodic_dof_pairs(m, s)? {
                forest.union(d0, d1);
            }
        }

        let mut number = vec![0; total];
        let mut count = 0;
        for d in 0..total {
            if forest.find(d) == d {
                number[d] = count;
                count += 1;
            }
        }
        self.dof_map = (0..total).map(|d| number[forest.find(d)]).collect();
        self.num_dofs = count;
        debug!(
            "periodic identification of {} boundary pairs: {total} -> {count} dofs",
            self.master.len()
        );

        self.generate_element_dof_table()?;
        self.generate_bdr_element_dof_table()
    }

    /// Make boundary attribute `master[i]` periodic with `slave[i]`.
    ///
    /// Weights follow their dofs into the new numbering; when patches are
    /// held they are taken from the patches instead.
    pub fn set_periodic(&mut self, master: &[i64], slave: &[i64]) -> Result<()> {
        let raw = if self.dof_map.is_empty() {
            self.num_dofs
        } else {
            self.dof_map.len()
        };
        let before: Vec<Option<usize>> = (0..raw).map(|d| self.active_dofs[self.map_dof(d)]).collect();
        let old_weights = std::mem::take(&mut self.weights);

        self.master = master.to_vec();
        self.slave = slave.to_vec();
        self.generate_offsets();
        self.dof_map.clear();
        self.generate_element_dof_table()?;
        self.generate_bdr_element_dof_table()?;
        self.connect_boundaries()?;

        if self.has_patches() {
            return self.weights_from_patches();
        }
        let mut weights = vec![1.0; self.num_active_dofs];
        for (d, old) in before.into_iter().enumerate() {
            if let (Some(old), Some(new)) = (old, self.active_dofs[self.map_dof(d)]) {
                if let Some(&w) = old_weights.get(old) {
                    weights[new] = w;
                }
            }
        }
        self.weights = weights;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_union_keeps_second_root() {
        let mut forest = DofForest::new(4);
        forest.union(0, 3);
        forest.union(1, 0);
        assert_eq!(forest.find(0), 3);
        assert_eq!(forest.find(1), 3);
        assert_eq!(forest.find(2), 2);
    }
}

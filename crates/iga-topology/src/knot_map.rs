use iga_core::{IgaError, Result};
use serde::{Deserialize, Serialize};

use crate::topology::PatchTopology;

/// Unique knot vector carried by a topology edge.
///
/// `reversed` is set when the knot vector runs from the higher to the lower
/// global vertex of the edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeKnot {
    pub index: usize,
    pub reversed: bool,
}

impl EdgeKnot {
    /// Knot assignment for an edge listed as `ki v0 v1`.
    pub fn from_listing(index: usize, v0: usize, v1: usize) -> Self {
        Self {
            index,
            reversed: v0 > v1,
        }
    }

    /// Signed form used in the mesh files: `ki`, or `-1 - ki` when reversed.
    pub fn signed(self) -> i64 {
        if self.reversed {
            -1 - self.index as i64
        } else {
            self.index as i64
        }
    }
}

/// Result of grouping topology edges into parametric directions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KnotClasses {
    /// One entry per topology edge.
    pub edge_knots: Vec<EdgeKnot>,
    /// For each unique knot vector, a patch and a parametric direction of
    /// that patch which carries it.
    pub representatives: Vec<(usize, usize)>,
}

/// Local edges running along each parametric direction, with `+1` when the
/// local edge points the same way as the direction.
fn direction_groups(dim: usize) -> &'static [&'static [(usize, i32)]] {
    match dim {
        1 => &[&[(0, 1)]],
        2 => &[&[(0, 1), (2, -1)], &[(1, 1), (3, -1)]],
        _ => &[
            &[(0, 1), (2, 1), (4, 1), (6, 1)],
            &[(1, 1), (3, 1), (5, 1), (7, 1)],
            &[(8, 1), (9, 1), (10, 1), (11, 1)],
        ],
    }
}

/// The local edge whose knot vector defines parametric direction `d`.
pub fn reference_edge(dim: usize, d: usize) -> usize {
    match (dim, d) {
        (3, 1) => 3,
        (3, 2) => 8,
        (_, d) => d,
    }
}

/// Union-find with parity: `parity[e]` is the relative direction of edge
/// `e` with respect to its parent.
struct ParityForest {
    parent: Vec<usize>,
    parity: Vec<i32>,
}

impl ParityForest {
    fn new(n: usize) -> Self {
        Self {
            parent: (0..n).collect(),
            parity: vec![1; n],
        }
    }

    fn find(&mut self, e: usize) -> (usize, i32) {
        let mut path = Vec::new();
        let mut cur = e;
        while self.parent[cur] != cur {
            path.push(cur);
            cur = self.parent[cur];
        }
        let root = cur;
        // Compress from the node closest to the root outward.
        for &node in path.iter().rev() {
            let up = self.parent[node];
            if up != root {
                self.parity[node] *= self.parity[up];
            }
            self.parent[node] = root;
        }
        (root, self.parity[e])
    }

    /// Record that edge `b` points `rel` times the direction of edge `a`.
    fn union(&mut self, a: usize, b: usize, rel: i32) -> bool {
        let (ra, pa) = self.find(a);
        let (rb, pb) = self.find(b);
        if ra == rb {
            return pa * pb == rel;
        }
        self.parent[rb] = ra;
        self.parity[rb] = pa * pb * rel;
        true
    }
}

impl PatchTopology {
    /// Group edges that must share a knot vector because they are opposite
    /// sides of some patch, and orient each group consistently.
    pub fn edge_to_unique_knotvector(&self) -> Result<KnotClasses> {
        let dim = self.dim();
        let groups = direction_groups(dim);
        let mut forest = ParityForest::new(self.num_edges());

        for p in 0..self.num_elements() {
            let edges = self.element_edges(p);
            for group in groups {
                let (l0, s0) = group[0];
                let t0 = edges[l0].orientation * s0;
                for &(l, s) in &group[1..] {
                    let t = edges[l].orientation * s;
                    if !forest.union(edges[l0].index, edges[l].index, t0 * t) {
                        return Err(IgaError::Topology(format!(
                            "Patch {p} closes an edge cycle with inconsistent orientation"
                        )));
                    }
                }
            }
        }

        let mut class_of_root = vec![None; self.num_edges()];
        let mut representatives = Vec::new();
        // Knot direction of each class relative to the canonical direction of its root.
        let mut class_sign = Vec::new();
        for p in 0..self.num_elements() {
            let edges = self.element_edges(p);
            for (d, group) in groups.iter().enumerate() {
                let (l0, s0) = group[0];
                let (root, pi) = forest.find(edges[l0].index);
                if class_of_root[root].is_none() {
                    class_of_root[root] = Some(representatives.len());
                    representatives.push((p, d));
                    class_sign.push(edges[l0].orientation * s0 * pi);
                }
            }
        }

        let mut edge_knots = Vec::with_capacity(self.num_edges());
        for e in 0..self.num_edges() {
            let (root, pi) = forest.find(e);
            let index = class_of_root[root].ok_or_else(|| {
                IgaError::Topology(format!("Edge {e} does not belong to any patch"))
            })?;
            edge_knots.push(EdgeKnot {
                index,
                reversed: pi * class_sign[index] < 0,
            });
        }
        log::debug!(
            "grouped {} edges into {} unique knot vectors",
            edge_knots.len(),
            representatives.len()
        );
        Ok(KnotClasses {
            edge_knots,
            representatives,
        })
    }

    /// Knot vector index and direction flag for every local edge of patch
    /// `p`. The flag is true when the knot vector runs along the local edge.
    pub fn patch_edge_knots(&self, edge_knots: &[EdgeKnot], p: usize) -> Vec<(usize, bool)> {
        self.element_edges(p)
            .iter()
            .map(|oe| {
                let ek = edge_knots[oe.index];
                (ek.index, (oe.orientation > 0) != ek.reversed)
            })
            .collect()
    }

    /// Knot vector index of each parametric direction of patch `p`, and
    /// whether it runs forward in that direction.
    pub fn patch_knot_directions(&self, edge_knots: &[EdgeKnot], p: usize) -> Vec<(usize, bool)> {
        let local = self.patch_edge_knots(edge_knots, p);
        (0..self.dim())
            .map(|d| local[reference_edge(self.dim(), d)])
            .collect()
    }

    /// Opposite sides of every patch must carry the same knot vector in the
    /// same parametric direction.
    pub fn check_patches(&self, edge_knots: &[EdgeKnot]) -> Result<()> {
        if self.dim() == 1 {
            return Ok(());
        }
        for p in 0..self.num_elements() {
            let local = self.patch_edge_knots(edge_knots, p);
            for group in direction_groups(self.dim()) {
                let (l0, s0) = group[0];
                let first = (local[l0].0, local[l0].1 == (s0 > 0));
                for &(l, s) in &group[1..] {
                    if (local[l].0, local[l].1 == (s > 0)) != first {
                        return Err(IgaError::Topology(format!(
                            "Patch {p}: inconsistent edge-to-knotvector mapping"
                        )));
                    }
                }
            }
        }
        Ok(())
    }

    /// Boundary patches must have their leading edges aligned with the knot
    /// vectors.
    pub fn check_bdr_patches(&self, edge_knots: &[EdgeKnot]) -> Result<()> {
        let leading = match self.dim() {
            2 => 1,
            3 => 2,
            _ => 0,
        };
        for b in 0..self.num_boundary() {
            for oe in self.bdr_edges(b).iter().take(leading) {
                let ek = edge_knots[oe.index];
                if (oe.orientation > 0) == ek.reversed {
                    return Err(IgaError::Topology(format!(
                        "Boundary patch {b}: bad orientation"
                    )));
                }
            }
        }
        Ok(())
    }
}

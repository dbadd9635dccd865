use iga_core::{IgaError, Result, Tolerance};
use iga_nurbs::KnotVector;
use log::debug;

use super::NurbsExtension;

/// `kv` as seen from the unique direction.
fn unflipped(kv: &KnotVector, forward: bool) -> KnotVector {
    let mut kv = kv.clone();
    if !forward {
        kv.flip();
    }
    kv
}

fn same_knots(a: &KnotVector, b: &KnotVector) -> bool {
    a.same_knots(b, &Tolerance::default())
}

impl NurbsExtension {
    /// Unique knot vector index of each direction of patch `p` and whether
    /// it runs forward along that direction.
    pub(crate) fn patch_directions(&self, p: usize) -> Vec<(usize, bool)> {
        self.topology.patch_knot_directions(&self.edge_knots, p)
    }

    /// Per patch and direction, a copy of the unique knot vector oriented
    /// along the patch.
    pub(crate) fn create_comprehensive(&mut self) -> Result<()> {
        let mut comprehensive = Vec::with_capacity(self.num_patches() * self.dim());
        for p in 0..self.num_patches() {
            for (ki, forward) in self.patch_directions(p) {
                let kv = self.knot_vectors.get(ki).ok_or_else(|| {
                    IgaError::Consistency(format!(
                        "Patch {p} refers to knot vector {ki}, there are {}",
                        self.knot_vectors.len()
                    ))
                })?;
                comprehensive.push(unflipped(kv, forward));
            }
        }
        self.comprehensive = comprehensive;
        self.check_consistency()
    }

    /// Copy every comprehensive knot vector that differs from its unique
    /// knot vector back into the unique set, then check that all patches
    /// sharing a unique knot vector now agree.
    pub(crate) fn update_unique(&mut self) -> Result<()> {
        let dim = self.dim();
        for p in 0..self.num_patches() {
            for (d, (ki, forward)) in self.patch_directions(p).into_iter().enumerate() {
                let candidate = unflipped(&self.comprehensive[dim * p + d], forward);
                let unique = &self.knot_vectors[ki];
                if !same_knots(unique, &candidate) {
                    debug!("patch {p} direction {d} updates knot vector {ki}");
                    self.knot_vectors[ki] = candidate;
                }
            }
        }
        self.check_consistency()
    }

    /// Whether every comprehensive knot vector matches its unique knot
    /// vector in order and knots.
    pub fn consistent_kv_sets(&self) -> bool {
        self.check_consistency().is_ok()
    }

    /// [`NurbsExtension::consistent_kv_sets`] with the first mismatch as
    /// the error.
    pub fn check_consistency(&self) -> Result<()> {
        let dim = self.dim();
        for p in 0..self.num_patches() {
            for (d, (ki, forward)) in self.patch_directions(p).into_iter().enumerate() {
                let unique = &self.knot_vectors[ki];
                let compr = &self.comprehensive[dim * p + d];
                if unique.order() != compr.order() {
                    return Err(IgaError::Consistency(format!(
                        "Order {} of patch {p} direction {d} does not agree with order {} \
                         of knot vector {ki}",
                        compr.order(),
                        unique.order()
                    )));
                }
                if !same_knots(unique, &unflipped(compr, forward)) {
                    return Err(IgaError::Consistency(format!(
                        "Knots of patch {p} direction {d} do not agree with knot vector {ki}"
                    )));
                }
            }
        }
        Ok(())
    }
}

//! Refinement of the held patches, followed by reconciliation of the knot
//! vectors and regeneration of every table.
//!
//! Patches never share data, so the per-patch work runs on the rayon pool.
//! Reconciliation is sequential.

use iga_core::{IgaError, Result};
use iga_nurbs::{KnotVector, NurbsPatch, RemovalOutcome};
use log::{debug, warn};
use rayon::prelude::*;

use super::NurbsExtension;

impl NurbsExtension {
    pub(crate) fn require_patches(&self, op: &str) -> Result<()> {
        if self.patches.is_empty() {
            return Err(IgaError::InvalidOperation(format!(
                "{op}: no patches are held, convert the mesh to patches first"
            )));
        }
        Ok(())
    }

    fn check_per_direction(&self, n: usize, op: &str) -> Result<()> {
        if n != self.dim() {
            return Err(IgaError::InvalidOperation(format!(
                "{op}: {n} factors for {} parametric directions",
                self.dim()
            )));
        }
        Ok(())
    }

    fn check_per_knot_vector(&self, n: usize, op: &str) -> Result<()> {
        if n != self.num_knot_vectors() {
            return Err(IgaError::InvalidOperation(format!(
                "{op}: {n} entries for {} knot vectors",
                self.num_knot_vectors()
            )));
        }
        Ok(())
    }

    /// Per patch and direction, the knot list given for its unique knot
    /// vector, mirrored into the patch's direction when it runs backwards.
    fn patch_knot_lists(&self, lists: &[Vec<f64>]) -> Vec<Vec<Vec<f64>>> {
        (0..self.num_patches())
            .map(|p| {
                self.patch_directions(p)
                    .into_iter()
                    .enumerate()
                    .map(|(d, (ki, forward))| {
                        if forward {
                            return lists[ki].clone();
                        }
                        let kv = &self.patch_knot_vectors(p)[d];
                        let apb = kv.min_knot() + kv.max_knot();
                        lists[ki].iter().rev().map(|&x| apb - x).collect()
                    })
                    .collect()
            })
            .collect()
    }

    /// Copy the patches' knot vectors into the comprehensive set, refresh
    /// the unique set from it and regenerate all tables with every element
    /// active. Weights are taken from the patches.
    pub fn set_knots_from_patches(&mut self) -> Result<()> {
        self.require_patches("set_knots_from_patches")?;
        let dim = self.dim();
        for (p, patch) in self.patches.iter().enumerate() {
            for (d, kv) in patch.knot_vectors().iter().enumerate() {
                self.comprehensive[dim * p + d] = kv.clone();
            }
        }
        self.update_unique()?;
        self.set_orders_from_knot_vectors();
        self.rebuild(None)?;
        self.weights_from_patches()
    }

    /// Run `op` on a copy of every patch on the rayon pool, then commit the
    /// copies. Nothing changes when any patch fails.
    fn refine_patches<F>(&mut self, op: F) -> Result<()>
    where
        F: Fn(usize, &mut NurbsPatch) -> Result<()> + Sync,
    {
        let mut work = self.patches.clone();
        work.par_iter_mut()
            .enumerate()
            .try_for_each(|(p, patch)| op(p, patch))?;
        self.commit_patches(work)
    }

    /// Replace the patches and regenerate everything from them, keeping
    /// the extension as it was when the regeneration fails.
    fn commit_patches(&mut self, patches: Vec<NurbsPatch>) -> Result<()> {
        let held = std::mem::take(&mut self.patches);
        let mut next = self.clone();
        self.patches = held;
        next.patches = patches;
        next.set_knots_from_patches()?;
        *self = next;
        Ok(())
    }

    /// Split every element of local direction `d` of every patch into
    /// `rf[d]` elements.
    pub fn uniform_refinement(&mut self, rf: &[usize]) -> Result<()> {
        self.require_patches("uniform_refinement")?;
        self.check_per_direction(rf.len(), "uniform_refinement")?;
        self.refine_patches(|_, patch| patch.uniform_refinement(rf))?;
        debug!("uniformly refined {} patches by {rf:?}", self.patches.len());
        Ok(())
    }

    pub fn uniform_refinement_all(&mut self, rf: usize) -> Result<()> {
        let factors = vec![rf; self.dim()];
        self.uniform_refinement(&factors)
    }

    /// Undo uniform refinement by `cf[d]` along local direction `d`.
    ///
    /// Knot removal must succeed within `tol` everywhere.
    pub fn coarsen(&mut self, cf: &[usize], tol: f64) -> Result<()> {
        self.require_patches("coarsen")?;
        self.check_per_direction(cf.len(), "coarsen")?;
        self.refine_patches(|_, patch| {
            patch.set_knot_vectors_coarse(false);
            patch.coarsen(cf, tol)
        })?;
        debug!("coarsened {} patches by {cf:?}", self.patches.len());
        Ok(())
    }

    pub fn coarsen_all(&mut self, cf: usize, tol: f64) -> Result<()> {
        let factors = vec![cf; self.dim()];
        self.coarsen(&factors, tol)
    }

    /// Per-direction coarsening factor shared by all patches. A factor of 1
    /// on one patch defers to the others.
    pub fn coarsening_factors(&self) -> Result<Vec<usize>> {
        let mut factors: Vec<usize> = Vec::new();
        for (p, patch) in self.patches.iter().enumerate() {
            let pf = patch.coarsening_factors();
            if factors.is_empty() {
                factors = pf;
                continue;
            }
            for (d, (f, g)) in factors.iter_mut().zip(pf).enumerate() {
                if *f != g && *f != 1 && g != 1 {
                    return Err(IgaError::Consistency(format!(
                        "Patch {p} coarsens direction {d} by {g}, other patches by {f}"
                    )));
                }
                if *f == 1 {
                    *f = g;
                }
            }
        }
        Ok(factors)
    }

    /// Raise every direction of every patch by `rel_degree`, capped at
    /// `max_degree`.
    pub fn degree_elevate(&mut self, rel_degree: usize, max_degree: usize) -> Result<()> {
        self.require_patches("degree_elevate")?;
        self.refine_patches(|_, patch| {
            for dir in 0..patch.param_dim() {
                let old = patch.knot_vector(dir)?.order();
                let new = (old + rel_degree).min(max_degree);
                if new > old {
                    patch.degree_elevate(dir, new - old)?;
                }
            }
            Ok(())
        })
    }

    /// Insert knots so every patch direction matches the given knot vector,
    /// one per unique knot vector.
    pub fn knot_insert(&mut self, targets: &[KnotVector]) -> Result<()> {
        self.require_patches("knot_insert")?;
        self.check_per_knot_vector(targets.len(), "knot_insert")?;
        let per_patch: Vec<Vec<KnotVector>> = (0..self.num_patches())
            .map(|p| {
                self.patch_directions(p)
                    .into_iter()
                    .map(|(ki, forward)| {
                        let mut kv = targets[ki].clone();
                        if !forward {
                            kv.flip();
                        }
                        kv
                    })
                    .collect()
            })
            .collect();
        self.refine_patches(|p, patch| patch.knot_insert_all(&per_patch[p]))
    }

    /// Insert the knots of `lists[k]` along every patch direction carrying
    /// unique knot vector `k`.
    pub fn knot_insert_lists(&mut self, lists: &[Vec<f64>]) -> Result<()> {
        self.require_patches("knot_insert_lists")?;
        self.check_per_knot_vector(lists.len(), "knot_insert_lists")?;
        let per_patch = self.patch_knot_lists(lists);
        self.refine_patches(|p, patch| patch.knot_insert_lists(&per_patch[p]))
    }

    /// Remove the knots of `lists[k]` once each along every patch direction
    /// carrying unique knot vector `k`.
    ///
    /// A knot goes only if it can be removed within `tol` from every patch
    /// sharing its knot vector; otherwise it stays on all of them. Returns
    /// the outcome per patch and direction. An invalid knot is an error and
    /// changes nothing.
    pub fn knot_remove_lists(
        &mut self,
        lists: &[Vec<f64>],
        tol: f64,
    ) -> Result<Vec<Vec<RemovalOutcome>>> {
        self.require_patches("knot_remove_lists")?;
        self.check_per_knot_vector(lists.len(), "knot_remove_lists")?;
        let mut kept: Vec<Vec<f64>> = lists.to_vec();
        loop {
            let per_patch = self.patch_knot_lists(&kept);
            let mut work = self.patches.clone();
            let removed = work
                .par_iter_mut()
                .zip(per_patch)
                .map(|(patch, lists)| removable_knots(patch, &lists, tol))
                .collect::<Result<Vec<_>>>()?;

            let mut failed: Vec<Vec<bool>> = kept.iter().map(|l| vec![false; l.len()]).collect();
            for (p, per_dir) in removed.iter().enumerate() {
                for ((ki, forward), done) in self.patch_directions(p).into_iter().zip(per_dir) {
                    let n = done.len();
                    for (j, _) in done.iter().enumerate().filter(|&(_, &ok)| !ok) {
                        failed[ki][if forward { j } else { n - 1 - j }] = true;
                    }
                }
            }
            if failed.iter().flatten().all(|&f| !f) {
                self.commit_patches(work)?;
                break;
            }
            for (ki, (list, failed)) in kept.iter_mut().zip(&failed).enumerate() {
                for (x, _) in list.iter().zip(failed).filter(|&(_, &f)| f) {
                    warn!("knot {x} stays in knot vector {ki}, it cannot be removed from every patch");
                }
                *list = list
                    .iter()
                    .zip(failed)
                    .filter(|&(_, &f)| !f)
                    .map(|(&x, _)| x)
                    .collect();
            }
        }

        Ok((0..self.num_patches())
            .map(|p| {
                self.patch_directions(p)
                    .into_iter()
                    .map(|(ki, _)| RemovalOutcome {
                        requested: lists[ki].len(),
                        removed: kept[ki].len(),
                    })
                    .collect()
            })
            .collect())
    }
}

/// Remove `lists[d]` once each from direction `d` of `patch`, reporting per
/// knot whether the removal stayed within `tol`.
fn removable_knots(patch: &mut NurbsPatch, lists: &[Vec<f64>], tol: f64) -> Result<Vec<Vec<bool>>> {
    lists
        .iter()
        .enumerate()
        .map(|(dir, knots)| {
            knots
                .iter()
                .map(|&x| patch.knot_remove(dir, x, 1, tol).map(|o| o.is_complete()))
                .collect()
        })
        .collect()
}

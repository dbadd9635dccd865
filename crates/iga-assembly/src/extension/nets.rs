use iga_core::{IgaError, Result};
use iga_nurbs::{KnotVector, NurbsPatch};
use log::debug;

use super::tables::tensor_indices;
use super::NurbsExtension;
use crate::patch_map::PatchMap;

impl NurbsExtension {
    /// Visit every control point of every held patch with the active dof it
    /// lands on and its homogeneous values.
    fn visit_patch_points(&self, mut visit: impl FnMut(usize, &[f64])) -> Result<()> {
        let dim = self.dim();
        let mut map = PatchMap::new(self);
        for (p, patch) in self.patches.iter().enumerate() {
            let kv = map.set_patch_dof_map(p)?;
            for (d, kv) in kv.iter().enumerate() {
                if patch.ncp(d)? != kv.ncp() {
                    return Err(IgaError::Consistency(format!(
                        "Patch {p} has {} control points in direction {d}, its knot vector {}",
                        patch.ncp(d)?,
                        kv.ncp()
                    )));
                }
            }
            let counts: Vec<usize> = kv.iter().map(KnotVector::ncp).collect();
            for (point, ijk) in patch.data().chunks_exact(patch.dim()).zip(tensor_indices(&counts)) {
                visit(self.active_dof(map.at(&ijk[..dim])?)?, point);
            }
        }
        Ok(())
    }

    /// Take the weights from the held patches.
    pub(crate) fn weights_from_patches(&mut self) -> Result<()> {
        let mut weights = vec![0.0; self.num_active_dofs];
        self.visit_patch_points(|l, point| weights[l] = point[point.len() - 1])?;
        self.weights = weights;
        Ok(())
    }

    fn patch_net(&self, p: usize, coords: &[f64], vdim: usize) -> Result<NurbsPatch> {
        let dim = self.dim();
        let mut map = PatchMap::new(self);
        let kv = map.set_patch_dof_map(p)?;
        let counts: Vec<usize> = kv.iter().map(KnotVector::ncp).collect();
        let mut patch = NurbsPatch::new(kv.to_vec(), vdim + 1)?;
        for (point, ijk) in patch
            .data_mut()
            .chunks_exact_mut(vdim + 1)
            .zip(tensor_indices(&counts))
        {
            let l = self.active_dof(map.at(&ijk[..dim])?)?;
            let w = self.weights[l];
            for (value, x) in point.iter_mut().zip(&coords[l * vdim..(l + 1) * vdim]) {
                *value = x * w;
            }
            point[vdim] = w;
        }
        Ok(patch)
    }

    /// Build one patch per topology element from `coords` (`vdim` values
    /// per active dof) and the weights.
    pub fn get_patch_nets(&mut self, coords: &[f64], vdim: usize) -> Result<()> {
        if vdim == 0 || coords.len() != self.num_active_dofs * vdim {
            return Err(IgaError::InvalidOperation(format!(
                "get_patch_nets: {} coordinates for {} dofs of dimension {vdim}",
                coords.len(),
                self.num_active_dofs
            )));
        }
        if self.weights.len() != self.num_active_dofs {
            return Err(IgaError::Consistency(format!(
                "{} weights for {} active dofs",
                self.weights.len(),
                self.num_active_dofs
            )));
        }
        self.patches = (0..self.num_patches())
            .map(|p| self.patch_net(p, coords, vdim))
            .collect::<Result<Vec<_>>>()?;
        debug!("built {} patch nets of dimension {vdim}", self.patches.len());
        Ok(())
    }

    /// Cartesian coordinates (`vdim` per active dof) and weights of the
    /// held patches.
    pub fn solution_vector(&self, vdim: usize) -> Result<(Vec<f64>, Vec<f64>)> {
        self.require_patches("solution_vector")?;
        if let Some(p) = self.patches.iter().position(|patch| patch.spatial_dim() != vdim) {
            return Err(IgaError::Consistency(format!(
                "Patch {p} has spatial dimension {}, expected {vdim}",
                self.patches[p].spatial_dim()
            )));
        }
        let mut coords = vec![0.0; self.num_active_dofs * vdim];
        let mut weights = vec![0.0; self.num_active_dofs];
        self.visit_patch_points(|l, point| {
            let w = point[vdim];
            for (x, value) in coords[l * vdim..(l + 1) * vdim].iter_mut().zip(point) {
                *x = value / w;
            }
            weights[l] = w;
        })?;
        Ok((coords, weights))
    }

    /// Build patches from `nodes` unless patches are already held.
    pub fn convert_to_patches(&mut self, nodes: &[f64], vdim: usize) -> Result<()> {
        if self.has_patches() {
            return Ok(());
        }
        self.get_patch_nets(nodes, vdim)
    }

    /// Move the held patches back into coordinates and weights and drop
    /// them. Returns `None` when no patches are held.
    pub fn set_coords_from_patches(&mut self) -> Result<Option<Vec<f64>>> {
        let Some(vdim) = self.patches.first().map(NurbsPatch::spatial_dim) else {
            return Ok(None);
        };
        let (coords, weights) = self.solution_vector(vdim)?;
        self.weights = weights;
        self.patches.clear();
        Ok(Some(coords))
    }
}

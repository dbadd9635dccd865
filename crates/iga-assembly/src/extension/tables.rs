use iga_core::{IgaError, Result};
use iga_nurbs::KnotVector;
use iga_topology::{Geometry, TopoElement};
use log::debug;

use super::{Mode, NurbsExtension};
use crate::patch_map::PatchMap;

/// Split a boundary dof table entry into the dof and whether it enters
/// with a sign flip (stored as `-1 - dof`).
pub fn decode_signed_dof(entry: i64) -> (usize, bool) {
    if entry < 0 {
        ((-1 - entry) as usize, true)
    } else {
        (entry as usize, false)
    }
}

fn encode_signed_dof(dof: usize, flipped: bool) -> i64 {
    if flipped {
        -1 - dof as i64
    } else {
        dof as i64
    }
}

/// Spans of `kv` with nonzero length.
fn element_spans(kv: &KnotVector) -> Vec<usize> {
    (0..kv.knot_span_count()).filter(|&i| kv.is_element(i)).collect()
}

/// Corner offsets of a grid cell in reference vertex order.
fn cell_corners(dim: usize) -> &'static [[usize; 3]] {
    match dim {
        1 => &[[0, 0, 0], [1, 0, 0]],
        2 => &[[0, 0, 0], [1, 0, 0], [1, 1, 0], [0, 1, 0]],
        _ => &[
            [0, 0, 0],
            [1, 0, 0],
            [1, 1, 0],
            [0, 1, 0],
            [0, 0, 1],
            [1, 0, 1],
            [1, 1, 1],
            [0, 1, 1],
        ],
    }
}

/// Every tensor index of a net with `counts` points per direction, first
/// direction fastest. Missing directions count one point.
pub(crate) fn tensor_indices(counts: &[usize]) -> impl Iterator<Item = [usize; 3]> {
    let n0 = counts.first().copied().unwrap_or(1);
    let n1 = counts.get(1).copied().unwrap_or(1);
    let n2 = counts.get(2).copied().unwrap_or(1);
    (0..n0 * n1 * n2).map(move |idx| [idx % n0, (idx / n0) % n1, idx / (n0 * n1)])
}

/// Local index along a boundary direction for knot index `i`.
pub(crate) fn along_boundary(okv: i32, i: usize, n: usize) -> usize {
    if okv >= 0 {
        i
    } else {
        n - i
    }
}

fn signed_span(okv: i32, i: usize) -> i64 {
    if okv >= 0 {
        i as i64
    } else {
        -1 - i as i64
    }
}

/// Number the marked entries consecutively.
fn compact(marked: &[bool]) -> (Vec<Option<usize>>, usize) {
    let mut next = 0;
    let numbering = marked
        .iter()
        .map(|&m| {
            m.then(|| {
                next += 1;
                next - 1
            })
        })
        .collect();
    (numbering, next)
}

impl NurbsExtension {
    fn grid_counts(&self, map: &PatchMap<'_>) -> [usize; 3] {
        let dim = self.dim();
        [
            map.nx(),
            if dim >= 2 { map.ny() } else { 1 },
            if dim == 3 { map.nz() } else { 1 },
        ]
    }

    fn active_vertex(&self, v: usize) -> Result<usize> {
        self.active_vertices[v].ok_or_else(|| {
            IgaError::Consistency(format!("Vertex {v} is not a corner of an active element"))
        })
    }

    /// Number the corners of active elements.
    pub(crate) fn generate_active_vertices(&mut self) -> Result<()> {
        let dim = self.dim();
        let mut marked = vec![false; self.num_vertices];
        let mut map = PatchMap::new(self);
        let mut eg = 0;
        for p in 0..self.num_patches() {
            map.set_patch_vertex_map(p)?;
            for [i, j, k] in tensor_indices(&self.grid_counts(&map)) {
                if self.active_elements[eg] {
                    for c in cell_corners(dim) {
                        let ijk = [i + c[0], j + c[1], k + c[2]];
                        marked[map.at(&ijk[..dim])?] = true;
                    }
                }
                eg += 1;
            }
        }
        let (numbering, count) = compact(&marked);
        self.active_vertices = numbering;
        self.num_active_vertices = count;
        Ok(())
    }

    /// Dofs of every active element as the tensor product of `order + 1`
    /// consecutive control points per direction, renumbered over the dofs
    /// that active elements touch.
    ///
    /// The per-element order is the shape-function order and is never
    /// sorted.
    pub(crate) fn generate_element_dof_table(&mut self) -> Result<()> {
        let dim = self.dim();
        let mut touched = vec![false; self.num_dofs];
        let mut element_dofs = Vec::with_capacity(self.num_active_elements);
        let mut element_to_patch = Vec::with_capacity(self.num_active_elements);
        let mut element_to_ijk = Vec::with_capacity(self.num_active_elements);
        let mut patch_to_elements = vec![Vec::new(); self.num_patches()];

        let mut map = PatchMap::new(self);
        let mut eg = 0;
        for p in 0..self.num_patches() {
            let kv = map.set_patch_dof_map(p)?;
            let mut spans = [vec![0], vec![0], vec![0]];
            let mut orders = [0; 3];
            for (d, kv) in kv.iter().enumerate() {
                spans[d] = element_spans(kv);
                orders[d] = kv.order();
            }
            for &k in &spans[2] {
                for &j in &spans[1] {
                    for &i in &spans[0] {
                        if self.active_elements[eg] {
                            let local = [orders[0] + 1, orders[1] + 1, orders[2] + 1];
                            let dofs = tensor_indices(&local)
                                .map(|[ii, jj, kk]| {
                                    let ijk = [i + ii, j + jj, k + kk];
                                    map.at(&ijk[..dim]).map(|d| self.map_dof(d))
                                })
                                .collect::<Result<Vec<_>>>()?;
                            dofs.iter().for_each(|&d| touched[d] = true);
                            patch_to_elements[p].push(element_dofs.len());
                            element_dofs.push(dofs);
                            element_to_patch.push(p);
                            element_to_ijk.push([i, j, k]);
                        }
                        eg += 1;
                    }
                }
            }
        }

        let (active, count) = compact(&touched);
        for d in element_dofs.iter_mut().flatten() {
            if let Some(a) = active[*d] {
                *d = a;
            }
        }
        debug!(
            "element dof table: {} active elements, {count} active dofs of {}",
            element_dofs.len(),
            self.num_dofs
        );
        self.active_dofs = active;
        self.num_active_dofs = count;
        self.element_dofs = element_dofs;
        self.element_to_patch = element_to_patch;
        self.element_to_ijk = element_to_ijk;
        self.patch_to_elements = patch_to_elements;
        Ok(())
    }

    /// Boundary elements are all active when every element is, and all
    /// inactive otherwise.
    pub(crate) fn generate_active_bdr_elements(&mut self) {
        let all = self.num_active_elements == self.num_elements;
        self.active_bdr_elements = vec![all; self.num_bdr_elements];
        self.num_active_bdr_elements = if all { self.num_bdr_elements } else { 0 };
    }

    /// Whether boundary patch `b` lists its dofs, and whether they enter
    /// sign-flipped.
    fn bdr_dof_rule(&self, b: usize, kv: &[&KnotVector]) -> (bool, bool) {
        let local = self.topology.bdr_local_index(b);
        match (self.mode, self.dim()) {
            (Mode::Normal, _) | (_, 1) => (true, false),
            (Mode::HDiv, 2) => (kv[0].order() != self.max_order(), matches!(local, 0 | 2)),
            (Mode::HCurl, 2) => (kv[0].order() != self.max_order(), false),
            (Mode::HDiv, _) => (kv[0].order() == kv[1].order(), matches!(local, 0 | 1 | 4)),
            (Mode::HCurl, _) => (kv[0].order() != kv[1].order(), false),
        }
    }

    /// Dofs of every active boundary element, walked in the boundary
    /// element's own direction and renumbered like the element table.
    pub(crate) fn generate_bdr_element_dof_table(&mut self) -> Result<()> {
        let dim = self.dim();
        let mut bdr_dofs: Vec<Vec<i64>> = Vec::with_capacity(self.num_active_bdr_elements);
        let mut bdr_to_patch = Vec::with_capacity(self.num_active_bdr_elements);
        let mut bdr_to_ijk = Vec::with_capacity(self.num_active_bdr_elements);
        let mut patch_to_bdr = vec![Vec::new(); self.num_bdr_patches()];

        let mut map = PatchMap::new(self);
        let mut gbe = 0;
        for b in 0..self.num_bdr_patches() {
            let (kv, okv) = map.set_bdr_dof_map(b)?;
            if dim == 1 {
                if self.active_bdr_elements[gbe] {
                    patch_to_bdr[b].push(bdr_dofs.len());
                    bdr_dofs.push(vec![self.map_dof(map.at(&[0])?) as i64]);
                    bdr_to_patch.push(b);
                    bdr_to_ijk.push([0, 0]);
                }
                gbe += 1;
                continue;
            }

            let (add_dofs, flipped) = self.bdr_dof_rule(b, &kv);
            let n = [map.nx(), map.ny()];
            let mut spans = [vec![0], vec![0]];
            let mut orders = [0; 2];
            let mut orient = [1; 2];
            for (d, kv) in kv.iter().enumerate() {
                spans[d] = element_spans(kv);
                orders[d] = kv.order();
                orient[d] = okv[d];
            }
            for &j in &spans[1] {
                for &i in &spans[0] {
                    if self.active_bdr_elements[gbe] {
                        let mut dofs = Vec::new();
                        if add_dofs {
                            for jj in 0..=orders[1] {
                                let jj_ = along_boundary(orient[1], j + jj, n[1]);
                                for ii in 0..=orders[0] {
                                    let ii_ = along_boundary(orient[0], i + ii, n[0]);
                                    let ij = [ii_, jj_];
                                    let d = self.map_dof(map.at(&ij[..dim - 1])?);
                                    dofs.push(encode_signed_dof(d, flipped));
                                }
                            }
                        }
                        patch_to_bdr[b].push(bdr_dofs.len());
                        bdr_dofs.push(dofs);
                        bdr_to_patch.push(b);
                        bdr_to_ijk.push([signed_span(orient[0], i), signed_span(orient[1], j)]);
                    }
                    gbe += 1;
                }
            }
        }

        for entry in bdr_dofs.iter_mut().flatten() {
            let (d, flipped) = decode_signed_dof(*entry);
            let a = self.active_dofs[d].ok_or_else(|| {
                IgaError::Consistency(format!(
                    "Boundary dof {d} is not touched by any active element"
                ))
            })?;
            *entry = encode_signed_dof(a, flipped);
        }
        self.bdr_element_dofs = bdr_dofs;
        self.bdr_element_to_patch = bdr_to_patch;
        self.bdr_element_to_ijk = bdr_to_ijk;
        self.patch_to_bdr_elements = patch_to_bdr;
        Ok(())
    }

    /// Active elements as cells over the active vertex numbering, carrying
    /// the attribute of their patch.
    pub fn element_topology(&self) -> Result<Vec<TopoElement>> {
        let dim = self.dim();
        let geometry = match dim {
            1 => Geometry::Segment,
            2 => Geometry::Square,
            _ => Geometry::Cube,
        };
        let mut elements = Vec::with_capacity(self.num_active_elements);
        let mut map = PatchMap::new(self);
        let mut eg = 0;
        for p in 0..self.num_patches() {
            map.set_patch_vertex_map(p)?;
            let attribute = self.topology.element_attribute(p);
            for [i, j, k] in tensor_indices(&self.grid_counts(&map)) {
                if self.active_elements[eg] {
                    let vertices = cell_corners(dim)
                        .iter()
                        .map(|c| {
                            let ijk = [i + c[0], j + c[1], k + c[2]];
                            self.active_vertex(map.at(&ijk[..dim])?)
                        })
                        .collect::<Result<Vec<_>>>()?;
                    elements.push(TopoElement::new(attribute, geometry, vertices)?);
                }
                eg += 1;
            }
        }
        Ok(elements)
    }

    /// Active boundary elements over the active vertex numbering, walked in
    /// the knot direction of their boundary patch.
    pub fn bdr_element_topology(&self) -> Result<Vec<TopoElement>> {
        let dim = self.dim();
        let mut boundary = Vec::with_capacity(self.num_active_bdr_elements);
        let mut map = PatchMap::new(self);
        let mut gbe = 0;
        for b in 0..self.num_bdr_patches() {
            let (_, okv) = map.set_bdr_vertex_map(b)?;
            let attribute = self.topology.bdr_attribute(b);
            match dim {
                1 => {
                    if self.active_bdr_elements[gbe] {
                        let v = self.active_vertex(map.at(&[0])?)?;
                        boundary.push(TopoElement::new(attribute, Geometry::Point, vec![v])?);
                    }
                    gbe += 1;
                }
                2 => {
                    let nx = map.nx();
                    for i in 0..nx {
                        if self.active_bdr_elements[gbe] {
                            let i_ = if okv[0] >= 0 { i } else { nx - 1 - i };
                            let vertices = vec![
                                self.active_vertex(map.at(&[i_])?)?,
                                self.active_vertex(map.at(&[i_ + 1])?)?,
                            ];
                            boundary.push(TopoElement::new(attribute, Geometry::Segment, vertices)?);
                        }
                        gbe += 1;
                    }
                }
                _ => {
                    let (nx, ny) = (map.nx(), map.ny());
                    for j in 0..ny {
                        let j_ = if okv[1] >= 0 { j } else { ny - 1 - j };
                        for i in 0..nx {
                            if self.active_bdr_elements[gbe] {
                                let i_ = if okv[0] >= 0 { i } else { nx - 1 - i };
                                let vertices = cell_corners(2)
                                    .iter()
                                    .map(|c| self.active_vertex(map.at(&[i_ + c[0], j_ + c[1]])?))
                                    .collect::<Result<Vec<_>>>()?;
                                boundary.push(TopoElement::new(attribute, Geometry::Square, vertices)?);
                            }
                            gbe += 1;
                        }
                    }
                }
            }
        }
        Ok(boundary)
    }

    /// Global dofs of the whole control net of patch `p`, in tensor order
    /// with the first direction fastest.
    pub fn patch_dofs(&self, p: usize) -> Result<Vec<usize>> {
        let dim = self.dim();
        let mut map = PatchMap::new(self);
        let kv = map.set_patch_dof_map(p)?;
        let counts: Vec<usize> = kv.iter().map(KnotVector::ncp).collect();
        tensor_indices(&counts)
            .map(|ijk| map.at(&ijk[..dim]).map(|d| self.map_dof(d)))
            .collect()
    }

    /// Global vertex of every active vertex.
    pub fn vertex_local_to_global(&self) -> Vec<usize> {
        self.active_vertices
            .iter()
            .enumerate()
            .filter_map(|(g, a)| a.map(|_| g))
            .collect()
    }

    /// Global element of every active element.
    pub fn element_local_to_global(&self) -> Vec<usize> {
        self.active_elements
            .iter()
            .enumerate()
            .filter_map(|(g, &a)| a.then_some(g))
            .collect()
    }
}

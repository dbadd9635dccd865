//! The multi-patch NURBS extension of a coarse patch topology.

mod check;
mod io;
mod nets;
mod offsets;
mod periodic;
mod refine;
mod tables;

use iga_core::{IgaError, Result};
use iga_nurbs::{KnotVector, NurbsPatch};
use iga_topology::{EdgeKnot, PatchTopology};
use serde::{Deserialize, Serialize};

pub use offsets::EntityOffsets;
pub use tables::decode_signed_dof;

/// Discretization variant that decides which boundary dofs are listed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Mode {
    #[default]
    Normal,
    /// Normal-trace space: boundary dofs on the outward-negative faces are
    /// sign-flipped.
    HDiv,
    /// Tangential-trace space.
    HCurl,
}

/// NURBS patches assembled over a coarse [`PatchTopology`].
///
/// Every topology edge carries one of the *unique* knot vectors. Each patch
/// direction has a *comprehensive* copy of its unique knot vector, flipped
/// when the patch walks the edge against the knot direction. Global
/// vertices and dofs are numbered entity by entity: topology vertices
/// first, then edge interiors, face interiors and patch interiors.
///
/// Elements may be marked inactive; inactive elements still advance the
/// global element counter but contribute no vertices or dofs to the active
/// numbering.
#[derive(Debug, Clone)]
pub struct NurbsExtension {
    pub(crate) mode: Mode,
    pub(crate) topology: PatchTopology,
    pub(crate) edge_knots: Vec<EdgeKnot>,
    pub(crate) orders: Vec<usize>,
    pub(crate) knot_vectors: Vec<KnotVector>,
    pub(crate) comprehensive: Vec<KnotVector>,

    pub(crate) mesh_offsets: EntityOffsets,
    pub(crate) space_offsets: EntityOffsets,
    pub(crate) num_vertices: usize,
    pub(crate) num_dofs: usize,
    pub(crate) num_elements: usize,
    pub(crate) num_bdr_elements: usize,

    pub(crate) active_elements: Vec<bool>,
    pub(crate) active_bdr_elements: Vec<bool>,
    pub(crate) active_vertices: Vec<Option<usize>>,
    pub(crate) active_dofs: Vec<Option<usize>>,
    pub(crate) num_active_vertices: usize,
    pub(crate) num_active_elements: usize,
    pub(crate) num_active_bdr_elements: usize,
    pub(crate) num_active_dofs: usize,

    pub(crate) element_dofs: Vec<Vec<usize>>,
    pub(crate) bdr_element_dofs: Vec<Vec<i64>>,
    pub(crate) element_to_patch: Vec<usize>,
    pub(crate) element_to_ijk: Vec<[usize; 3]>,
    pub(crate) bdr_element_to_patch: Vec<usize>,
    pub(crate) bdr_element_to_ijk: Vec<[i64; 2]>,
    pub(crate) patch_to_elements: Vec<Vec<usize>>,
    pub(crate) patch_to_bdr_elements: Vec<Vec<usize>>,

    pub(crate) weights: Vec<f64>,
    pub(crate) master: Vec<i64>,
    pub(crate) slave: Vec<i64>,
    /// Periodic identification of global dofs; empty when none applies.
    pub(crate) dof_map: Vec<usize>,
    pub(crate) patches: Vec<NurbsPatch>,
}

impl NurbsExtension {
    /// Bare extension over `topology`; callers fill in the knot vectors
    /// and run the table generation.
    fn empty(topology: PatchTopology, edge_knots: Vec<EdgeKnot>, mode: Mode) -> Self {
        Self {
            mode,
            topology,
            edge_knots,
            orders: Vec::new(),
            knot_vectors: Vec::new(),
            comprehensive: Vec::new(),
            mesh_offsets: EntityOffsets::default(),
            space_offsets: EntityOffsets::default(),
            num_vertices: 0,
            num_dofs: 0,
            num_elements: 0,
            num_bdr_elements: 0,
            active_elements: Vec::new(),
            active_bdr_elements: Vec::new(),
            active_vertices: Vec::new(),
            active_dofs: Vec::new(),
            num_active_vertices: 0,
            num_active_elements: 0,
            num_active_bdr_elements: 0,
            num_active_dofs: 0,
            element_dofs: Vec::new(),
            bdr_element_dofs: Vec::new(),
            element_to_patch: Vec::new(),
            element_to_ijk: Vec::new(),
            bdr_element_to_patch: Vec::new(),
            bdr_element_to_ijk: Vec::new(),
            patch_to_elements: Vec::new(),
            patch_to_bdr_elements: Vec::new(),
            weights: Vec::new(),
            master: Vec::new(),
            slave: Vec::new(),
            dof_map: Vec::new(),
            patches: Vec::new(),
        }
    }

    /// Assemble patches over a topology built from them.
    ///
    /// Edges are grouped into unique knot vectors from the topology alone;
    /// each unique knot vector is copied from a patch that carries it.
    pub fn from_patches(topology: PatchTopology, patches: Vec<NurbsPatch>) -> Result<Self> {
        if patches.is_empty() {
            return Err(IgaError::InvalidOperation(
                "A NURBS extension needs at least one patch".into(),
            ));
        }
        if patches.len() != topology.num_elements() {
            return Err(IgaError::Consistency(format!(
                "{} patches for a topology with {} elements",
                patches.len(),
                topology.num_elements()
            )));
        }
        let dim = topology.dim();
        if let Some(p) = patches.iter().position(|patch| patch.param_dim() != dim) {
            return Err(IgaError::Consistency(format!(
                "Patch {p} has {} parametric directions, the topology is {dim}D",
                patches[p].param_dim()
            )));
        }

        let classes = topology.edge_to_unique_knotvector()?;
        topology.check_patches(&classes.edge_knots)?;

        let mut ext = Self::empty(topology, classes.edge_knots, Mode::Normal);
        ext.knot_vectors = classes
            .representatives
            .iter()
            .map(|&(p, d)| patches[p].knot_vector(d).cloned())
            .collect::<Result<Vec<_>>>()?;
        ext.patches = patches;
        ext.create_comprehensive()?;
        ext.set_orders_from_knot_vectors();
        ext.rebuild(None)?;
        ext.weights_from_patches()?;
        Ok(ext)
    }

    /// Extension over the same topology whose unique knot vector `i` has
    /// order `new_orders[i]`.
    ///
    /// Knot vectors are raised in order with their interior knots kept, so
    /// continuity rises with the order. Orders at or below the parent's keep
    /// the parent's knot vector. Element activity and periodic pairs are
    /// taken from the parent; all weights are one.
    pub fn from_parent(parent: &NurbsExtension, new_orders: &[usize], mode: Mode) -> Result<Self> {
        if new_orders.len() != parent.num_knot_vectors() {
            return Err(IgaError::InvalidOperation(format!(
                "{} new orders for {} knot vectors",
                new_orders.len(),
                parent.num_knot_vectors()
            )));
        }
        let mut ext = Self::empty(parent.topology.clone(), parent.edge_knots.clone(), mode);
        ext.knot_vectors = parent
            .knot_vectors
            .iter()
            .zip(new_orders)
            .map(|(kv, &order)| {
                if order > kv.order() {
                    kv.order_elevated(order - kv.order())
                } else {
                    Ok(kv.clone())
                }
            })
            .collect::<Result<Vec<_>>>()?;
        ext.create_comprehensive()?;
        ext.orders = new_orders.to_vec();

        ext.generate_offsets();
        ext.num_elements = parent.num_elements;
        ext.num_bdr_elements = parent.num_bdr_elements;
        ext.active_elements = parent.active_elements.clone();
        ext.num_active_elements = parent.num_active_elements;
        ext.active_bdr_elements = parent.active_bdr_elements.clone();
        ext.num_active_bdr_elements = parent.num_active_bdr_elements;
        ext.active_vertices = parent.active_vertices.clone();
        ext.num_active_vertices = parent.num_active_vertices;

        ext.generate_element_dof_table()?;
        ext.generate_bdr_element_dof_table()?;
        ext.master = parent.master.clone();
        ext.slave = parent.slave.clone();
        ext.connect_boundaries()?;
        ext.weights = vec![1.0; ext.num_active_dofs];
        Ok(ext)
    }

    /// [`NurbsExtension::from_parent`] with every knot vector raised to at
    /// least `order`.
    pub fn with_order(parent: &NurbsExtension, order: usize) -> Result<Self> {
        let orders: Vec<usize> = parent.orders.iter().map(|&o| o.max(order)).collect();
        Self::from_parent(parent, &orders, Mode::Normal)
    }

    /// Vector-component space of an H(div) discretization on a single
    /// patch: one order higher along `component`.
    pub fn div_extension(&self, component: usize) -> Result<Self> {
        let mut orders = self.component_orders(component, "div")?;
        orders[component] += 1;
        Self::from_parent(self, &orders, Mode::HDiv)
    }

    /// Vector-component space of an H(curl) discretization on a single
    /// patch: one order higher along every direction except `component`.
    pub fn curl_extension(&self, component: usize) -> Result<Self> {
        let mut orders = self.component_orders(component, "curl")?;
        for (c, o) in orders.iter_mut().enumerate() {
            if c != component {
                *o += 1;
            }
        }
        Self::from_parent(self, &orders, Mode::HCurl)
    }

    fn component_orders(&self, component: usize, what: &str) -> Result<Vec<usize>> {
        if self.num_patches() > 1 {
            return Err(IgaError::InvalidOperation(format!(
                "The {what} extension needs a single patch, there are {}",
                self.num_patches()
            )));
        }
        if component >= self.orders.len() {
            return Err(IgaError::InvalidOperation(format!(
                "Component {component} out of range for {} knot vectors",
                self.orders.len()
            )));
        }
        Ok(self.orders.clone())
    }

    /// Recount elements and regenerate every table from the current knot
    /// vectors. `active` marks the active elements; `None` activates all.
    pub(crate) fn rebuild(&mut self, active: Option<Vec<bool>>) -> Result<()> {
        self.generate_offsets();
        self.count_elements();
        self.count_bdr_elements();
        self.set_active_elements(active)?;
        self.generate_active_vertices()?;
        self.dof_map.clear();
        self.generate_element_dof_table()?;
        self.generate_active_bdr_elements();
        self.generate_bdr_element_dof_table()?;
        self.connect_boundaries()
    }

    fn set_active_elements(&mut self, active: Option<Vec<bool>>) -> Result<()> {
        match active {
            Some(mask) => {
                if mask.len() != self.num_elements {
                    return Err(IgaError::Consistency(format!(
                        "Active element mask has {} entries for {} elements",
                        mask.len(),
                        self.num_elements
                    )));
                }
                self.num_active_elements = mask.iter().filter(|&&a| a).count();
                self.active_elements = mask;
            }
            None => {
                self.num_active_elements = self.num_elements;
                self.active_elements = vec![true; self.num_elements];
            }
        }
        Ok(())
    }

    pub(crate) fn set_orders_from_knot_vectors(&mut self) {
        self.orders = self.knot_vectors.iter().map(KnotVector::order).collect();
    }

    /// Number of parametric directions of every patch.
    pub fn dim(&self) -> usize {
        self.topology.dim()
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn topology(&self) -> &PatchTopology {
        &self.topology
    }

    /// Unique knot vector assignment of every topology edge.
    pub fn edge_knots(&self) -> &[EdgeKnot] {
        &self.edge_knots
    }

    pub fn num_patches(&self) -> usize {
        self.topology.num_elements()
    }

    pub fn num_bdr_patches(&self) -> usize {
        self.topology.num_boundary()
    }

    pub fn num_knot_vectors(&self) -> usize {
        self.knot_vectors.len()
    }

    pub fn knot_vectors(&self) -> &[KnotVector] {
        &self.knot_vectors
    }

    pub fn knot_vector(&self, i: usize) -> Result<&KnotVector> {
        self.knot_vectors.get(i).ok_or_else(|| {
            IgaError::NotFound(format!(
                "Knot vector {i} out of range, there are {}",
                self.knot_vectors.len()
            ))
        })
    }

    /// Order of every unique knot vector.
    pub fn orders(&self) -> &[usize] {
        &self.orders
    }

    pub fn max_order(&self) -> usize {
        self.orders.iter().copied().max().unwrap_or(0)
    }

    /// Knot vectors of patch `p` in its own parametric directions.
    pub fn patch_knot_vectors(&self, p: usize) -> &[KnotVector] {
        let dim = self.dim();
        &self.comprehensive[dim * p..dim * (p + 1)]
    }

    /// Unique knot vector of `edge` and its orientation relative to a walk
    /// along the edge with orientation `oedge`.
    pub(crate) fn edge_knot_vector(&self, edge: usize, oedge: i32) -> (&KnotVector, i32) {
        let ek = self.edge_knots[edge];
        let okv = if ek.reversed { -oedge } else { oedge };
        (&self.knot_vectors[ek.index], okv)
    }

    /// Unique knot vectors along boundary patch `b` with their orientation
    /// relative to the boundary element.
    pub fn bdr_patch_knot_vectors(&self, b: usize) -> Result<Vec<(&KnotVector, i32)>> {
        if b >= self.num_bdr_patches() {
            return Err(IgaError::NotFound(format!(
                "Boundary patch {b} out of range, there are {}",
                self.num_bdr_patches()
            )));
        }
        let edges = self.topology.bdr_edges(b);
        let n = self.dim() - 1;
        if edges.len() < n {
            return Err(IgaError::Topology(format!(
                "Boundary patch {b} has {} edges, expected at least {n}",
                edges.len()
            )));
        }
        Ok(edges[..n]
            .iter()
            .map(|oe| self.edge_knot_vector(oe.index, oe.orientation))
            .collect())
    }

    /// Global vertex count, inactive vertices included.
    pub fn num_vertices(&self) -> usize {
        self.num_vertices
    }

    pub fn num_elements(&self) -> usize {
        self.num_elements
    }

    pub fn num_bdr_elements(&self) -> usize {
        self.num_bdr_elements
    }

    /// Global dof count after periodic identification, inactive dofs
    /// included.
    pub fn num_dofs(&self) -> usize {
        self.num_dofs
    }

    pub fn num_active_vertices(&self) -> usize {
        self.num_active_vertices
    }

    pub fn num_active_elements(&self) -> usize {
        self.num_active_elements
    }

    pub fn num_active_bdr_elements(&self) -> usize {
        self.num_active_bdr_elements
    }

    pub fn num_active_dofs(&self) -> usize {
        self.num_active_dofs
    }

    pub fn mesh_offsets(&self) -> &EntityOffsets {
        &self.mesh_offsets
    }

    pub fn space_offsets(&self) -> &EntityOffsets {
        &self.space_offsets
    }

    pub fn active_elements(&self) -> &[bool] {
        &self.active_elements
    }

    pub fn active_bdr_elements(&self) -> &[bool] {
        &self.active_bdr_elements
    }

    /// One weight per active dof.
    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    pub fn weights_mut(&mut self) -> &mut [f64] {
        &mut self.weights
    }

    /// Dofs of active element `e`, in tensor order with the first
    /// direction fastest.
    pub fn element_dofs(&self, e: usize) -> Result<&[usize]> {
        self.element_dofs
            .get(e)
            .map(Vec::as_slice)
            .ok_or_else(|| element_not_found("Element", e, self.element_dofs.len()))
    }

    pub fn element_dof_table(&self) -> &[Vec<usize>] {
        &self.element_dofs
    }

    /// Dofs of active boundary element `b`. Sign-flipped dofs are stored
    /// as `-1 - dof`; see [`decode_signed_dof`].
    pub fn bdr_element_dofs(&self, b: usize) -> Result<&[i64]> {
        self.bdr_element_dofs
            .get(b)
            .map(Vec::as_slice)
            .ok_or_else(|| element_not_found("Boundary element", b, self.bdr_element_dofs.len()))
    }

    pub fn bdr_element_dof_table(&self) -> &[Vec<i64>] {
        &self.bdr_element_dofs
    }

    pub fn element_patch(&self, e: usize) -> Result<usize> {
        self.element_to_patch
            .get(e)
            .copied()
            .ok_or_else(|| element_not_found("Element", e, self.element_to_patch.len()))
    }

    /// Knot span index of active element `e` along each patch direction.
    pub fn element_ijk(&self, e: usize) -> Result<&[usize]> {
        let dim = self.dim();
        self.element_to_ijk
            .get(e)
            .map(|ijk| &ijk[..dim])
            .ok_or_else(|| element_not_found("Element", e, self.element_to_ijk.len()))
    }

    pub fn bdr_element_patch(&self, b: usize) -> Result<usize> {
        self.bdr_element_to_patch
            .get(b)
            .copied()
            .ok_or_else(|| element_not_found("Boundary element", b, self.bdr_element_to_patch.len()))
    }

    /// Knot span index of active boundary element `b` along each boundary
    /// direction, `-1 - span` where the knot vector runs backwards.
    pub fn bdr_element_ijk(&self, b: usize) -> Result<&[i64]> {
        let n = self.dim().saturating_sub(1).max(1);
        self.bdr_element_to_ijk
            .get(b)
            .map(|ijk| &ijk[..n])
            .ok_or_else(|| element_not_found("Boundary element", b, self.bdr_element_to_ijk.len()))
    }

    /// Active elements of patch `p`.
    pub fn patch_elements(&self, p: usize) -> Result<&[usize]> {
        self.patch_to_elements
            .get(p)
            .map(Vec::as_slice)
            .ok_or_else(|| element_not_found("Patch", p, self.patch_to_elements.len()))
    }

    /// Active boundary elements of boundary patch `b`.
    pub fn patch_bdr_elements(&self, b: usize) -> Result<&[usize]> {
        self.patch_to_bdr_elements
            .get(b)
            .map(Vec::as_slice)
            .ok_or_else(|| element_not_found("Boundary patch", b, self.patch_to_bdr_elements.len()))
    }

    pub fn has_patches(&self) -> bool {
        !self.patches.is_empty()
    }

    pub fn patches(&self) -> &[NurbsPatch] {
        &self.patches
    }

    pub fn patch(&self, p: usize) -> Result<&NurbsPatch> {
        self.patches
            .get(p)
            .ok_or_else(|| element_not_found("Patch", p, self.patches.len()))
    }

    /// Boundary attribute pairs identified periodically.
    pub fn periodic_pairs(&self) -> (&[i64], &[i64]) {
        (&self.master, &self.slave)
    }

    /// Global dof after periodic identification.
    pub(crate) fn map_dof(&self, d: usize) -> usize {
        if self.dof_map.is_empty() {
            d
        } else {
            self.dof_map[d]
        }
    }

    /// Active number of the global dof `d`, before periodic identification.
    pub(crate) fn active_dof(&self, d: usize) -> Result<usize> {
        self.active_dofs[self.map_dof(d)].ok_or_else(|| {
            IgaError::InvalidOperation(format!("Dof {d} does not belong to an active element"))
        })
    }
}

fn element_not_found(what: &str, i: usize, len: usize) -> IgaError {
    IgaError::NotFound(format!("{what} {i} out of range, there are {len}"))
}

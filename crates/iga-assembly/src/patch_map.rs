use iga_core::{IgaError, Result};
use iga_nurbs::KnotVector;

use crate::extension::{EntityOffsets, NurbsExtension};

/// What a [`PatchMap`] numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Granularity {
    /// Element corners: an edge holds `elements - 1` interior vertices.
    Vertex,
    /// Control points: an edge holds `ncp - 2` interior dofs.
    Dof,
}

/// Translates patch-local tensor indices into global vertex or dof numbers.
///
/// The first and last index along a direction land on the bounding
/// vertices, edges and faces of the patch; interior indices land in the
/// patch's own range. Edge and face interiors are walked in their global
/// orientation, so neighbouring patches agree on every shared entity.
///
/// A map is bound to one patch (or boundary patch) at a time through one of
/// the `set_*` methods, which return the knot vectors that govern it.
pub struct PatchMap<'a> {
    ext: &'a NurbsExtension,
    verts: Vec<usize>,
    edges: Vec<usize>,
    oedge: Vec<i32>,
    faces: Vec<usize>,
    oface: Vec<i32>,
    opatch: i32,
    offset: usize,
    extent: [isize; 3],
}

/// 0 below the interior range, 1 inside, 2 above.
fn span_class(n: isize, len: isize) -> usize {
    if n < 0 {
        0
    } else if n >= len {
        2
    } else {
        1
    }
}

fn along_1d(n: isize, len: isize, orientation: i32) -> isize {
    if orientation > 0 {
        n
    } else {
        len - 1 - n
    }
}

/// Position of local `(n1, n2)` inside a face stored with quad orientation
/// code `orientation` relative to the local view.
fn along_2d(n1: isize, n2: isize, len1: isize, len2: isize, orientation: i32) -> isize {
    match orientation {
        0 => n1 + n2 * len1,
        1 => n2 + n1 * len2,
        2 => n2 + (len1 - 1 - n1) * len2,
        3 => (len1 - 1 - n1) + n2 * len1,
        4 => (len1 - 1 - n1) + (len2 - 1 - n2) * len1,
        5 => (len2 - 1 - n2) + (len1 - 1 - n1) * len2,
        6 => (len2 - 1 - n2) + n1 * len2,
        _ => n1 + (len2 - 1 - n2) * len1,
    }
}

fn shift(base: usize, local: isize) -> usize {
    (base as isize + local) as usize
}

fn interior_extent(kv: &KnotVector, granularity: Granularity) -> isize {
    match granularity {
        Granularity::Vertex => kv.element_count() as isize - 1,
        Granularity::Dof => kv.ncp() as isize - 2,
    }
}

impl<'a> PatchMap<'a> {
    pub fn new(ext: &'a NurbsExtension) -> Self {
        Self {
            ext,
            verts: Vec::new(),
            edges: Vec::new(),
            oedge: Vec::new(),
            faces: Vec::new(),
            oface: Vec::new(),
            opatch: 0,
            offset: 0,
            extent: [0; 3],
        }
    }

    fn offsets(&self, granularity: Granularity) -> &'a EntityOffsets {
        match granularity {
            Granularity::Vertex => &self.ext.mesh_offsets,
            Granularity::Dof => &self.ext.space_offsets,
        }
    }

    /// Bind the map to patch `p`.
    pub fn set_patch_map(&mut self, p: usize, granularity: Granularity) -> Result<&'a [KnotVector]> {
        let ext = self.ext;
        if p >= ext.num_patches() {
            return Err(IgaError::NotFound(format!(
                "Patch {p} out of range, there are {} patches",
                ext.num_patches()
            )));
        }
        let topo = &ext.topology;
        let off = self.offsets(granularity);
        let kv = ext.patch_knot_vectors(p);

        self.verts = topo
            .element_vertices(p)
            .iter()
            .map(|&v| off.vertex[v])
            .collect();
        self.edges.clear();
        self.oedge.clear();
        self.faces.clear();
        self.oface.clear();
        if ext.dim() >= 2 {
            for oe in topo.element_edges(p) {
                self.edges.push(off.edge[oe.index]);
                self.oedge.push(oe.orientation);
            }
        }
        if ext.dim() == 3 {
            for of in topo.element_faces(p) {
                self.faces.push(off.face[of.index]);
                self.oface.push(of.orientation);
            }
        }
        self.extent = [0; 3];
        for (d, kv) in kv.iter().enumerate() {
            self.extent[d] = interior_extent(kv, granularity);
        }
        // Patch interiors are numbered in the patch's own tensor order.
        self.opatch = if ext.dim() == 1 { 1 } else { 0 };
        self.offset = off.patch[p];
        Ok(kv)
    }

    pub fn set_patch_vertex_map(&mut self, p: usize) -> Result<&'a [KnotVector]> {
        self.set_patch_map(p, Granularity::Vertex)
    }

    pub fn set_patch_dof_map(&mut self, p: usize) -> Result<&'a [KnotVector]> {
        self.set_patch_map(p, Granularity::Dof)
    }

    /// Bind the map to boundary patch `b`.
    ///
    /// Returns the unique knot vectors along the boundary patch together
    /// with their orientation relative to it: negative when the knot vector
    /// runs against the boundary element's local direction.
    pub fn set_bdr_map(
        &mut self,
        b: usize,
        granularity: Granularity,
    ) -> Result<(Vec<&'a KnotVector>, Vec<i32>)> {
        let ext = self.ext;
        let topo = &ext.topology;
        let oriented = ext.bdr_patch_knot_vectors(b)?;
        let off = self.offsets(granularity);

        self.verts = topo.bdr_vertices(b).iter().map(|&v| off.vertex[v]).collect();
        self.edges.clear();
        self.oedge.clear();
        self.faces.clear();
        self.oface.clear();
        self.extent = [0; 3];
        for (d, (kv, _)) in oriented.iter().enumerate() {
            self.extent[d] = interior_extent(kv, granularity);
        }

        match ext.dim() {
            1 => {
                self.opatch = 1;
                self.offset = 0;
            }
            2 => {
                let oe = topo.bdr_edges(b)[0];
                self.opatch = oe.orientation;
                self.offset = off.edge[oe.index];
            }
            _ => {
                for oe in topo.bdr_edges(b) {
                    self.edges.push(off.edge[oe.index]);
                    self.oedge.push(oe.orientation);
                }
                let face = topo.bdr_face(b).ok_or_else(|| {
                    IgaError::Topology(format!("Boundary patch {b} has no face"))
                })?;
                self.opatch = face.orientation;
                self.offset = off.face[face.index];
            }
        }
        Ok(oriented.into_iter().unzip())
    }

    pub fn set_bdr_vertex_map(&mut self, b: usize) -> Result<(Vec<&'a KnotVector>, Vec<i32>)> {
        self.set_bdr_map(b, Granularity::Vertex)
    }

    pub fn set_bdr_dof_map(&mut self, b: usize) -> Result<(Vec<&'a KnotVector>, Vec<i32>)> {
        self.set_bdr_map(b, Granularity::Dof)
    }

    /// Largest local index along the first direction.
    pub fn nx(&self) -> usize {
        (self.extent[0] + 1) as usize
    }

    pub fn ny(&self) -> usize {
        (self.extent[1] + 1) as usize
    }

    pub fn nz(&self) -> usize {
        (self.extent[2] + 1) as usize
    }

    /// Global number of the local tensor index `ijk` (one to three
    /// components).
    pub fn at(&self, ijk: &[usize]) -> Result<usize> {
        let dim = match self.verts.len() {
            0 => {
                return Err(IgaError::InvalidOperation(
                    "PatchMap is not bound to a patch".into(),
                ))
            }
            1 | 2 => 1,
            4 => 2,
            _ => 3,
        };
        let in_range = ijk
            .iter()
            .zip(&self.extent)
            .all(|(&n, &e)| n as isize <= e + 1);
        if !in_range {
            return Err(IgaError::NotFound(format!(
                "Local index {ijk:?} outside the patch map, extents {:?}",
                &self.extent[..dim]
            )));
        }
        match (dim, ijk) {
            (1, &[i]) => Ok(self.map_1d(i)),
            (2, &[i, j]) => Ok(self.map_2d(i, j)),
            (3, &[i, j, k]) => Ok(self.map_3d(i, j, k)),
            _ => Err(IgaError::InvalidOperation(format!(
                "PatchMap bound to a {dim}D entity takes {dim} indices, got {}",
                ijk.len()
            ))),
        }
    }

    fn map_1d(&self, i: usize) -> usize {
        let i1 = i as isize - 1;
        let ni = self.extent[0];
        match span_class(i1, ni) {
            0 => self.verts[0],
            1 => shift(self.offset, along_1d(i1, ni, self.opatch)),
            _ => self.verts[1],
        }
    }

    fn map_2d(&self, i: usize, j: usize) -> usize {
        let (i1, j1) = (i as isize - 1, j as isize - 1);
        let [ni, nj, _] = self.extent;
        match 3 * span_class(j1, nj) + span_class(i1, ni) {
            0 => self.verts[0],
            1 => shift(self.edges[0], along_1d(i1, ni, self.oedge[0])),
            2 => self.verts[1],
            3 => shift(self.edges[3], along_1d(j1, nj, -self.oedge[3])),
            4 => shift(self.offset, along_2d(i1, j1, ni, nj, self.opatch)),
            5 => shift(self.edges[1], along_1d(j1, nj, self.oedge[1])),
            6 => self.verts[3],
            7 => shift(self.edges[2], along_1d(i1, ni, -self.oedge[2])),
            _ => self.verts[2],
        }
    }

    fn map_3d(&self, i: usize, j: usize, k: usize) -> usize {
        let (i1, j1, k1) = (i as isize - 1, j as isize - 1, k as isize - 1);
        let [ni, nj, nk] = self.extent;
        let edge = |e: usize, n: isize, len: isize| shift(self.edges[e], along_1d(n, len, self.oedge[e]));
        let face = |f: usize, n1: isize, n2: isize, len1: isize, len2: isize| {
            shift(self.faces[f], along_2d(n1, n2, len1, len2, self.oface[f]))
        };
        match 9 * span_class(k1, nk) + 3 * span_class(j1, nj) + span_class(i1, ni) {
            0 => self.verts[0],
            1 => edge(0, i1, ni),
            2 => self.verts[1],
            3 => edge(3, j1, nj),
            4 => face(0, i1, nj - 1 - j1, ni, nj),
            5 => edge(1, j1, nj),
            6 => self.verts[3],
            7 => edge(2, i1, ni),
            8 => self.verts[2],
            9 => edge(8, k1, nk),
            10 => face(1, i1, k1, ni, nk),
            11 => edge(9, k1, nk),
            12 => face(4, nj - 1 - j1, k1, nj, nk),
            13 => shift(self.offset, ni * (nj * k1 + j1) + i1),
            14 => face(2, j1, k1, nj, nk),
            15 => edge(11, k1, nk),
            16 => face(3, ni - 1 - i1, k1, ni, nk),
            17 => edge(10, k1, nk),
            18 => self.verts[4],
            19 => edge(4, i1, ni),
            20 => self.verts[5],
            21 => edge(7, j1, nj),
            22 => face(5, i1, j1, ni, nj),
            23 => edge(5, j1, nj),
            24 => self.verts[7],
            25 => edge(6, i1, ni),
            _ => self.verts[6],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_span_classes() {
        assert_eq!(span_class(-1, 3), 0);
        assert_eq!(span_class(0, 3), 1);
        assert_eq!(span_class(2, 3), 1);
        assert_eq!(span_class(3, 3), 2);
        // An edge without interior points: index 0 is already past the end.
        assert_eq!(span_class(0, 0), 2);
    }

    #[test]
    fn test_face_orientations_are_permutations() {
        let (n1, n2) = (3, 2);
        for code in 0..8 {
            let mut seen = vec![false; (n1 * n2) as usize];
            for b in 0..n2 {
                for a in 0..n1 {
                    let idx = along_2d(a, b, n1, n2, code);
                    assert!(idx >= 0 && idx < n1 * n2, "code {code} maps out of range");
                    assert!(!seen[idx as usize], "code {code} maps twice to {idx}");
                    seen[idx as usize] = true;
                }
            }
        }
    }

    #[test]
    fn test_reversed_edge_runs_backwards() {
        assert_eq!(along_1d(0, 4, 1), 0);
        assert_eq!(along_1d(0, 4, -1), 3);
        assert_eq!(along_1d(3, 4, -1), 0);
    }
}

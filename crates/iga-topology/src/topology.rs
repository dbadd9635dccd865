use std::collections::HashMap;

use iga_core::{IgaError, Result};
use crate::types::{quad_orientation, Geometry, Oriented, TopoElement, QUAD_EDGES};

/// Coarse mesh whose elements are patches and whose boundary elements are
/// boundary patches.
///
/// Edges are stored with ascending vertex pairs; faces keep the vertex order
/// of the first element that references them.
#[derive(Debug, Clone)]
pub struct PatchTopology {
    dim: usize,
    num_vertices: usize,
    elements: Vec<TopoElement>,
    boundary: Vec<TopoElement>,
    edges: Vec<[usize; 2]>,
    faces: Vec<[usize; 4]>,
    edge_lookup: HashMap<[usize; 2], usize>,
    elem_edges: Vec<Vec<Oriented>>,
    elem_faces: Vec<Vec<Oriented>>,
    bdr_edges: Vec<Vec<Oriented>>,
    bdr_faces: Vec<Option<Oriented>>,
    bdr_local_index: Vec<usize>,
    face_edges: Vec<Vec<Oriented>>,
}

fn sorted_pair(a: usize, b: usize) -> [usize; 2] {
    if a < b {
        [a, b]
    } else {
        [b, a]
    }
}

fn sorted_quad(q: &[usize; 4]) -> [usize; 4] {
    let mut s = *q;
    s.sort_unstable();
    s
}

impl PatchTopology {
    /// Build the topology and derive its edges and faces.
    pub fn new(
        dim: usize,
        num_vertices: usize,
        elements: Vec<TopoElement>,
        boundary: Vec<TopoElement>,
    ) -> Result<Self> {
        if !(1..=3).contains(&dim) {
            return Err(IgaError::Topology(format!(
                "Patch topology dimension must be 1, 2 or 3, got {dim}"
            )));
        }
        if elements.is_empty() {
            return Err(IgaError::Topology("Patch topology has no elements".into()));
        }
        for (e, el) in elements.iter().enumerate() {
            if el.geometry.dimension() != dim {
                return Err(IgaError::Topology(format!(
                    "Element {e} is a {:?} in a {dim}D topology",
                    el.geometry
                )));
            }
            if let Some(&v) = el.vertices.iter().find(|&&v| v >= num_vertices) {
                return Err(IgaError::Topology(format!(
                    "Element {e} references vertex {v}, but there are {num_vertices} vertices"
                )));
            }
        }
        for (b, be) in boundary.iter().enumerate() {
            if be.geometry.dimension() + 1 != dim {
                return Err(IgaError::Topology(format!(
                    "Boundary element {b} is a {:?} in a {dim}D topology",
                    be.geometry
                )));
            }
            if let Some(&v) = be.vertices.iter().find(|&&v| v >= num_vertices) {
                return Err(IgaError::Topology(format!(
                    "Boundary element {b} references vertex {v}, but there are {num_vertices} vertices"
                )));
            }
        }

        let mut topo = Self {
            dim,
            num_vertices,
            elements,
            boundary,
            edges: Vec::new(),
            faces: Vec::new(),
            edge_lookup: HashMap::new(),
            elem_edges: Vec::new(),
            elem_faces: Vec::new(),
            bdr_edges: Vec::new(),
            bdr_faces: Vec::new(),
            bdr_local_index: Vec::new(),
            face_edges: Vec::new(),
        };
        topo.build_edges()?;
        topo.build_faces()?;
        topo.build_boundary()?;
        Ok(topo)
    }

    fn build_edges(&mut self) -> Result<()> {
        let mut elem_edges = Vec::with_capacity(self.elements.len());
        for (e, el) in self.elements.iter().enumerate() {
            let mut local = Vec::with_capacity(el.geometry.edges().len());
            for &[a, b] in el.geometry.edges() {
                let (va, vb) = (el.vertices[a], el.vertices[b]);
                if va == vb {
                    return Err(IgaError::Topology(format!(
                        "Element {e} has a degenerate edge at vertex {va}"
                    )));
                }
                let key = sorted_pair(va, vb);
                let next = self.edges.len();
                let index = *self.edge_lookup.entry(key).or_insert(next);
                if index == next {
                    self.edges.push(key);
                }
                local.push(Oriented {
                    index,
                    orientation: if va < vb { 1 } else { -1 },
                });
            }
            elem_edges.push(local);
        }
        self.elem_edges = elem_edges;
        Ok(())
    }

    fn build_faces(&mut self) -> Result<()> {
        if self.dim != 3 {
            self.elem_faces = vec![Vec::new(); self.elements.len()];
            return Ok(());
        }
        let mut lookup: HashMap<[usize; 4], usize> = HashMap::new();
        let mut elem_faces = Vec::with_capacity(self.elements.len());
        for el in &self.elements {
            let mut local = Vec::with_capacity(6);
            for lf in el.geometry.faces() {
                let verts = [
                    el.vertices[lf[0]],
                    el.vertices[lf[1]],
                    el.vertices[lf[2]],
                    el.vertices[lf[3]],
                ];
                let next = self.faces.len();
                let index = *lookup.entry(sorted_quad(&verts)).or_insert(next);
                if index == next {
                    self.faces.push(verts);
                }
                let orientation = quad_orientation(&self.faces[index], &verts)?;
                local.push(Oriented { index, orientation });
            }
            elem_faces.push(local);
        }
        self.elem_faces = elem_faces;

        let mut face_edges = Vec::with_capacity(self.faces.len());
        for (f, face) in self.faces.iter().enumerate() {
            let mut local = Vec::with_capacity(4);
            for &[a, b] in QUAD_EDGES.iter() {
                local.push(self.oriented_edge(face[a], face[b]).ok_or_else(|| {
                    IgaError::Topology(format!("Face {f} has an edge missing from the edge list"))
                })?);
            }
            face_edges.push(local);
        }
        self.face_edges = face_edges;
        Ok(())
    }

    fn build_boundary(&mut self) -> Result<()> {
        let face_lookup: HashMap<[usize; 4], usize> = self
            .faces
            .iter()
            .enumerate()
            .map(|(f, q)| (sorted_quad(q), f))
            .collect();

        for (b, be) in self.boundary.iter().enumerate() {
            let mut local = Vec::new();
            match be.geometry {
                Geometry::Point => {}
                Geometry::Segment => {
                    let e = self
                        .oriented_edge(be.vertices[0], be.vertices[1])
                        .ok_or_else(|| {
                            IgaError::Topology(format!(
                                "Boundary element {b} is not an edge of any patch"
                            ))
                        })?;
                    local.push(e);
                }
                _ => {
                    for &[x, y] in QUAD_EDGES.iter() {
                        local.push(
                            self.oriented_edge(be.vertices[x], be.vertices[y])
                                .ok_or_else(|| {
                                    IgaError::Topology(format!(
                                        "Boundary element {b} has an edge missing from the edge list"
                                    ))
                                })?,
                        );
                    }
                }
            }
            self.bdr_edges.push(local);

            if be.geometry == Geometry::Square {
                let verts = [be.vertices[0], be.vertices[1], be.vertices[2], be.vertices[3]];
                let index = *face_lookup.get(&sorted_quad(&verts)).ok_or_else(|| {
                    IgaError::Topology(format!("Boundary element {b} is not a face of any patch"))
                })?;
                let orientation = quad_orientation(&self.faces[index], &verts)?;
                self.bdr_faces.push(Some(Oriented { index, orientation }));
            } else {
                self.bdr_faces.push(None);
            }

            let local_index = self.find_local_index(be).ok_or_else(|| {
                IgaError::Topology(format!("Boundary element {b} is not adjacent to any patch"))
            })?;
            self.bdr_local_index.push(local_index);
        }
        Ok(())
    }

    /// Local vertex, edge, or face number of a boundary piece inside the
    /// first element that contains it.
    fn find_local_index(&self, be: &TopoElement) -> Option<usize> {
        let mut key = be.vertices.clone();
        key.sort_unstable();
        self.elements.iter().find_map(|el| match be.geometry {
            Geometry::Point => el.vertices.iter().position(|&v| v == be.vertices[0]),
            Geometry::Segment => el.geometry.edges().iter().position(|&[a, b]| {
                sorted_pair(el.vertices[a], el.vertices[b]) == [key[0], key[1]]
            }),
            _ => el.geometry.faces().iter().position(|lf| {
                let q = [
                    el.vertices[lf[0]],
                    el.vertices[lf[1]],
                    el.vertices[lf[2]],
                    el.vertices[lf[3]],
                ];
                sorted_quad(&q)[..] == key[..]
            }),
        })
    }

    fn oriented_edge(&self, a: usize, b: usize) -> Option<Oriented> {
        self.edge_lookup.get(&sorted_pair(a, b)).map(|&index| Oriented {
            index,
            orientation: if a < b { 1 } else { -1 },
        })
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn num_vertices(&self) -> usize {
        self.num_vertices
    }

    pub fn num_elements(&self) -> usize {
        self.elements.len()
    }

    pub fn num_boundary(&self) -> usize {
        self.boundary.len()
    }

    pub fn num_edges(&self) -> usize {
        self.edges.len()
    }

    pub fn num_faces(&self) -> usize {
        self.faces.len()
    }

    pub fn elements(&self) -> &[TopoElement] {
        &self.elements
    }

    pub fn boundary(&self) -> &[TopoElement] {
        &self.boundary
    }

    pub fn element_vertices(&self, e: usize) -> &[usize] {
        &self.elements[e].vertices
    }

    pub fn element_attribute(&self, e: usize) -> i64 {
        self.elements[e].attribute
    }

    pub fn bdr_vertices(&self, b: usize) -> &[usize] {
        &self.boundary[b].vertices
    }

    pub fn bdr_attribute(&self, b: usize) -> i64 {
        self.boundary[b].attribute
    }

    /// Edges of element `e` in local edge order.
    pub fn element_edges(&self, e: usize) -> &[Oriented] {
        &self.elem_edges[e]
    }

    /// Faces of element `e` in local face order (3D only).
    pub fn element_faces(&self, e: usize) -> &[Oriented] {
        &self.elem_faces[e]
    }

    /// Edges of boundary element `b`: one in 2D, four in 3D, none in 1D.
    pub fn bdr_edges(&self, b: usize) -> &[Oriented] {
        &self.bdr_edges[b]
    }

    /// The face a 3D boundary element lies on.
    pub fn bdr_face(&self, b: usize) -> Option<Oriented> {
        self.bdr_faces[b]
    }

    /// Local index of boundary element `b` inside its adjacent patch.
    pub fn bdr_local_index(&self, b: usize) -> usize {
        self.bdr_local_index[b]
    }

    pub fn face_edges(&self, f: usize) -> &[Oriented] {
        &self.face_edges[f]
    }

    pub fn face_vertices(&self, f: usize) -> [usize; 4] {
        self.faces[f]
    }

    /// Endpoints of edge `e`, lower vertex first.
    pub fn edge_vertices(&self, e: usize) -> [usize; 2] {
        self.edges[e]
    }

    pub fn find_edge(&self, a: usize, b: usize) -> Option<usize> {
        self.edge_lookup.get(&sorted_pair(a, b)).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_squares() -> PatchTopology {
        // 3---4---5
        // |   |   |
        // 0---1---2
        let elements = vec![
            TopoElement::new(1, Geometry::Square, vec![0, 1, 4, 3]).unwrap(),
            TopoElement::new(1, Geometry::Square, vec![1, 2, 5, 4]).unwrap(),
        ];
        let boundary = vec![
            TopoElement::new(1, Geometry::Segment, vec![0, 1]).unwrap(),
            TopoElement::new(2, Geometry::Segment, vec![2, 5]).unwrap(),
            TopoElement::new(3, Geometry::Segment, vec![4, 3]).unwrap(),
        ];
        PatchTopology::new(2, 6, elements, boundary).unwrap()
    }

    #[test]
    fn test_shared_edge_is_counted_once() {
        let t = two_squares();
        assert_eq!(t.num_edges(), 7);
        let shared = t.find_edge(1, 4).unwrap();
        assert_eq!(t.element_edges(0)[1].index, shared);
        assert_eq!(t.element_edges(1)[3].index, shared);
        assert_eq!(t.element_edges(0)[1].orientation, 1);
        // Element 1 walks the shared edge from 4 down to 1.
        assert_eq!(t.element_edges(1)[3].orientation, -1);
    }

    #[test]
    fn test_edge_orientations() {
        let t = two_squares();
        // Local edge 2 of element 0 runs 4 -> 3.
        assert_eq!(t.element_edges(0)[2].orientation, -1);
        assert_eq!(t.edge_vertices(t.element_edges(0)[2].index), [3, 4]);
    }

    #[test]
    fn test_boundary_edges_and_local_index() {
        let t = two_squares();
        assert_eq!(t.bdr_edges(0)[0].orientation, 1);
        assert_eq!(t.bdr_edges(2)[0].orientation, -1);
        assert_eq!(t.bdr_local_index(0), 0);
        assert_eq!(t.bdr_local_index(1), 1);
        assert_eq!(t.bdr_local_index(2), 2);
    }

    #[test]
    fn test_unknown_boundary_edge_rejected() {
        let elements = vec![TopoElement::new(1, Geometry::Square, vec![0, 1, 2, 3]).unwrap()];
        let boundary = vec![TopoElement::new(1, Geometry::Segment, vec![0, 2]).unwrap()];
        assert!(PatchTopology::new(2, 4, elements, boundary).is_err());
    }

    #[test]
    fn test_hex_faces_shared() {
        let elements = vec![
            TopoElement::new(1, Geometry::Cube, vec![0, 1, 2, 3, 4, 5, 6, 7]).unwrap(),
            TopoElement::new(1, Geometry::Cube, vec![4, 5, 6, 7, 8, 9, 10, 11]).unwrap(),
        ];
        let t = PatchTopology::new(3, 12, elements, Vec::new()).unwrap();
        assert_eq!(t.num_faces(), 11);
        assert_eq!(t.num_edges(), 20);
        let top = t.element_faces(0)[5];
        let bottom = t.element_faces(1)[0];
        assert_eq!(top.index, bottom.index);
        assert_eq!(top.orientation, 0);
        // Face 0 of the upper hex lists (7, 6, 5, 4) against the stored (4, 5, 6, 7).
        assert_eq!(bottom.orientation, 7);
    }
}

use std::ops::Range;

use log::debug;
use serde::{Deserialize, Serialize};

use super::NurbsExtension;

/// First global index of every topology entity's interior.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityOffsets {
    pub vertex: Vec<usize>,
    pub edge: Vec<usize>,
    pub face: Vec<usize>,
    pub patch: Vec<usize>,
}

/// Interior size of an entity for both numberings.
#[derive(Debug, Clone, Copy)]
struct Interior {
    mesh: usize,
    space: usize,
}

impl Interior {
    fn product(sizes: impl IntoIterator<Item = Interior>) -> Self {
        sizes.into_iter().fold(Self { mesh: 1, space: 1 }, |acc, s| Self {
            mesh: acc.mesh * s.mesh,
            space: acc.space * s.space,
        })
    }
}

impl NurbsExtension {
    fn edge_interior(&self, edge: usize) -> Interior {
        let kv = &self.knot_vectors[self.edge_knots[edge].index];
        Interior {
            mesh: kv.element_count().saturating_sub(1),
            space: kv.ncp().saturating_sub(2),
        }
    }

    fn face_interior(&self, face: usize) -> Interior {
        let edges = self.topology.face_edges(face);
        Interior::product([self.edge_interior(edges[0].index), self.edge_interior(edges[1].index)])
    }

    fn patch_interior(&self, p: usize) -> Interior {
        match self.dim() {
            1 => {
                let kv = &self.patch_knot_vectors(p)[0];
                Interior {
                    mesh: kv.element_count().saturating_sub(1),
                    space: kv.ncp().saturating_sub(2),
                }
            }
            2 => {
                let edges = self.topology.element_edges(p);
                Interior::product([self.edge_interior(edges[0].index), self.edge_interior(edges[1].index)])
            }
            _ => {
                let edges = self.topology.element_edges(p);
                Interior::product([
                    self.edge_interior(edges[0].index),
                    self.edge_interior(edges[3].index),
                    self.edge_interior(edges[8].index),
                ])
            }
        }
    }

    /// Assign disjoint index ranges to vertices, then edge, face and patch
    /// interiors, for element corners and for control points.
    ///
    /// In 1D the patches are the edges, so edge interiors stay empty and
    /// every patch numbers its own interior.
    pub(crate) fn generate_offsets(&mut self) {
        let nv = self.topology.num_vertices();
        let mut mesh = EntityOffsets {
            vertex: (0..nv).collect(),
            ..EntityOffsets::default()
        };
        let mut space = mesh.clone();
        let (mut mesh_counter, mut space_counter) = (nv, nv);

        for e in 0..self.topology.num_edges() {
            mesh.edge.push(mesh_counter);
            space.edge.push(space_counter);
            if self.dim() > 1 {
                let s = self.edge_interior(e);
                mesh_counter += s.mesh;
                space_counter += s.space;
            }
        }
        for f in 0..self.topology.num_faces() {
            mesh.face.push(mesh_counter);
            space.face.push(space_counter);
            let s = self.face_interior(f);
            mesh_counter += s.mesh;
            space_counter += s.space;
        }
        for p in 0..self.num_patches() {
            mesh.patch.push(mesh_counter);
            space.patch.push(space_counter);
            let s = self.patch_interior(p);
            mesh_counter += s.mesh;
            space_counter += s.space;
        }

        self.mesh_offsets = mesh;
        self.space_offsets = space;
        self.num_vertices = mesh_counter;
        self.num_dofs = space_counter;
        debug!(
            "generated offsets: {} vertices, {} dofs",
            self.num_vertices, self.num_dofs
        );
    }

    pub(crate) fn count_elements(&mut self) {
        self.num_elements = (0..self.num_patches())
            .map(|p| {
                self.patch_knot_vectors(p)
                    .iter()
                    .map(|kv| kv.element_count())
                    .product::<usize>()
            })
            .sum();
    }

    pub(crate) fn count_bdr_elements(&mut self) {
        let dim = self.dim();
        self.num_bdr_elements = (0..self.num_bdr_patches())
            .map(|b| {
                self.topology.bdr_edges(b)[..dim - 1]
                    .iter()
                    .map(|oe| self.edge_knot_vector(oe.index, oe.orientation).0.element_count())
                    .product::<usize>()
            })
            .sum();
    }

    /// Global dof range of every entity interior, vertices first, each
    /// sized by the entity's interior control point count.
    ///
    /// The ranges tile `0..num_dofs()` before periodic identification.
    pub fn space_ranges(&self) -> Vec<Range<usize>> {
        let off = &self.space_offsets;
        let mut ranges: Vec<Range<usize>> = off.vertex.iter().map(|&v| v..v + 1).collect();
        if self.dim() > 1 {
            ranges.extend(off.edge.iter().enumerate().map(|(e, &start)| {
                start..start + self.edge_interior(e).space
            }));
        }
        ranges.extend(off.face.iter().enumerate().map(|(f, &start)| {
            start..start + self.face_interior(f).space
        }));
        ranges.extend(off.patch.iter().enumerate().map(|(p, &start)| {
            start..start + self.patch_interior(p).space
        }));
        ranges
    }
}

use iga_core::{IgaError, Result, Validate};

use crate::topology::PatchTopology;

impl Validate for PatchTopology {
    fn validate(&self) -> Result<()> {
        // 1. Every vertex belongs to some patch
        let mut used = vec![false; self.num_vertices()];
        for el in self.elements() {
            for &v in &el.vertices {
                used[v] = true;
            }
        }
        if let Some(v) = used.iter().position(|&u| !u) {
            return Err(IgaError::Topology(format!(
                "Vertex {v} is not referenced by any patch"
            )));
        }

        // 2. Patches are glued along whole sides, at most two per side
        let sides = if self.dim() == 3 {
            self.num_faces()
        } else {
            self.num_edges()
        };
        let mut count = vec![0usize; sides];
        for e in 0..self.num_elements() {
            let local = if self.dim() == 3 {
                self.element_faces(e)
            } else {
                self.element_edges(e)
            };
            for o in local {
                count[o.index] += 1;
            }
        }
        if self.dim() > 1 {
            if let Some(s) = count.iter().position(|&c| c > 2) {
                return Err(IgaError::Topology(format!(
                    "Side {s} is shared by {} patches",
                    count[s]
                )));
            }
        }

        // 3. Each patch has distinct corners
        for (e, el) in self.elements().iter().enumerate() {
            let mut verts = el.vertices.clone();
            verts.sort_unstable();
            verts.dedup();
            if verts.len() != el.vertices.len() {
                return Err(IgaError::Topology(format!(
                    "Patch {e} repeats a corner vertex"
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Geometry, TopoElement};

    #[test]
    fn test_valid_strip() {
        let elements = vec![
            TopoElement::new(1, Geometry::Square, vec![0, 1, 4, 3]).unwrap(),
            TopoElement::new(1, Geometry::Square, vec![1, 2, 5, 4]).unwrap(),
        ];
        let t = PatchTopology::new(2, 6, elements, Vec::new()).unwrap();
        assert!(t.validate().is_ok());
    }

    #[test]
    fn test_orphan_vertex() {
        let elements = vec![TopoElement::new(1, Geometry::Square, vec![0, 1, 2, 3]).unwrap()];
        let t = PatchTopology::new(2, 5, elements, Vec::new()).unwrap();
        assert!(t.validate().is_err());
    }

    #[test]
    fn test_three_patches_on_one_edge() {
        let elements = vec![
            TopoElement::new(1, Geometry::Square, vec![0, 1, 2, 3]).unwrap(),
            TopoElement::new(1, Geometry::Square, vec![1, 0, 4, 5]).unwrap(),
            TopoElement::new(1, Geometry::Square, vec![0, 1, 6, 7]).unwrap(),
        ];
        let t = PatchTopology::new(2, 8, elements, Vec::new()).unwrap();
        assert!(t.validate().is_err());
    }
}

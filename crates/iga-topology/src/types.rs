use iga_core::{IgaError, Result};
use serde::{Deserialize, Serialize};

/// Reference geometry of a coarse element, with its file code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Geometry {
    Point,
    Segment,
    Square,
    Cube,
}

impl Geometry {
    pub fn code(self) -> i64 {
        match self {
            Geometry::Point => 0,
            Geometry::Segment => 1,
            Geometry::Square => 3,
            Geometry::Cube => 5,
        }
    }

    pub fn from_code(code: i64) -> Result<Self> {
        match code {
            0 => Ok(Geometry::Point),
            1 => Ok(Geometry::Segment),
            3 => Ok(Geometry::Square),
            5 => Ok(Geometry::Cube),
            other => Err(IgaError::Parse(format!(
                "Unsupported geometry code {other}"
            ))),
        }
    }

    pub fn num_vertices(self) -> usize {
        match self {
            Geometry::Point => 1,
            Geometry::Segment => 2,
            Geometry::Square => 4,
            Geometry::Cube => 8,
        }
    }

    pub fn dimension(self) -> usize {
        match self {
            Geometry::Point => 0,
            Geometry::Segment => 1,
            Geometry::Square => 2,
            Geometry::Cube => 3,
        }
    }

    /// Local edges as pairs of local vertex indices.
    pub fn edges(self) -> &'static [[usize; 2]] {
        match self {
            Geometry::Point => &[],
            Geometry::Segment => &[[0, 1]],
            Geometry::Square => &QUAD_EDGES,
            Geometry::Cube => &HEX_EDGES,
        }
    }

    /// Local faces as quadruples of local vertex indices.
    pub fn faces(self) -> &'static [[usize; 4]] {
        match self {
            Geometry::Cube => &HEX_FACES,
            _ => &[],
        }
    }

    /// The geometry of this element's boundary pieces.
    pub fn boundary(self) -> Option<Geometry> {
        match self {
            Geometry::Point => None,
            Geometry::Segment => Some(Geometry::Point),
            Geometry::Square => Some(Geometry::Segment),
            Geometry::Cube => Some(Geometry::Square),
        }
    }
}

pub const QUAD_EDGES: [[usize; 2]; 4] = [[0, 1], [1, 2], [2, 3], [3, 0]];

pub const HEX_EDGES: [[usize; 2]; 12] = [
    [0, 1],
    [1, 2],
    [3, 2],
    [0, 3],
    [4, 5],
    [5, 6],
    [7, 6],
    [4, 7],
    [0, 4],
    [1, 5],
    [2, 6],
    [3, 7],
];

pub const HEX_FACES: [[usize; 4]; 6] = [
    [3, 2, 1, 0],
    [0, 1, 5, 4],
    [1, 2, 6, 5],
    [2, 3, 7, 6],
    [3, 0, 4, 7],
    [4, 5, 6, 7],
];

/// A coarse element or boundary element.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopoElement {
    pub attribute: i64,
    pub geometry: Geometry,
    pub vertices: Vec<usize>,
}

impl TopoElement {
    pub fn new(attribute: i64, geometry: Geometry, vertices: Vec<usize>) -> Result<Self> {
        if vertices.len() != geometry.num_vertices() {
            return Err(IgaError::Topology(format!(
                "{:?} needs {} vertices, got {}",
                geometry,
                geometry.num_vertices(),
                vertices.len()
            )));
        }
        Ok(Self {
            attribute,
            geometry,
            vertices,
        })
    }
}

/// Index of an edge or face together with its orientation.
///
/// Edges carry `+1` when the local direction runs from the lower to the
/// higher global vertex and `-1` otherwise. Faces carry a quad orientation
/// code in `0..8`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Oriented {
    pub index: usize,
    pub orientation: i32,
}

/// Orientation code of `test` relative to `base`, two vertex quadruples of
/// the same quadrilateral.
///
/// Returns `2i` when `test` is `base` rotated so that `test[i] == base[0]`,
/// and `2i + 1` when it is additionally mirrored.
pub fn quad_orientation(base: &[usize; 4], test: &[usize; 4]) -> Result<i32> {
    let i = test.iter().position(|&v| v == base[0]).ok_or_else(|| {
        IgaError::Topology(format!(
            "Quadrilaterals {base:?} and {test:?} do not share vertex {}",
            base[0]
        ))
    })?;
    if test[(i + 1) % 4] == base[1] {
        Ok(2 * i as i32)
    } else {
        Ok(2 * i as i32 + 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_geometry_codes_round_trip() {
        for g in [Geometry::Point, Geometry::Segment, Geometry::Square, Geometry::Cube] {
            assert_eq!(Geometry::from_code(g.code()).unwrap(), g);
        }
        assert!(Geometry::from_code(2).is_err());
    }

    #[test]
    fn test_quad_orientation_codes() {
        let base = [10, 11, 12, 13];
        assert_eq!(quad_orientation(&base, &[10, 11, 12, 13]).unwrap(), 0);
        assert_eq!(quad_orientation(&base, &[10, 13, 12, 11]).unwrap(), 1);
        assert_eq!(quad_orientation(&base, &[11, 10, 13, 12]).unwrap(), 3);
        assert_eq!(quad_orientation(&base, &[12, 13, 10, 11]).unwrap(), 4);
        assert_eq!(quad_orientation(&base, &[13, 10, 11, 12]).unwrap(), 2);
        assert_eq!(quad_orientation(&base, &[11, 12, 13, 10]).unwrap(), 6);
        assert!(quad_orientation(&base, &[1, 2, 3, 4]).is_err());
    }

    #[test]
    fn test_element_vertex_count_checked() {
        assert!(TopoElement::new(1, Geometry::Square, vec![0, 1, 2]).is_err());
    }
}

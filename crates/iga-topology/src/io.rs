//! Text form of the patch topology, as embedded in NURBS mesh files.
//!
//! ```text
//! dimension
//! 2
//! elements
//! 1
//! 1 3 0 1 2 3
//! boundary
//! 4
//! 1 1 0 1
//! ...
//! edges
//! 4
//! 0 0 1
//! ...
//! vertices
//! 4
//! ```

use std::io::Write;

use iga_core::{IgaError, Result, TokenReader};

use crate::knot_map::EdgeKnot;
use crate::topology::PatchTopology;
use crate::types::{Geometry, TopoElement};

fn read_elements(reader: &mut TokenReader, section: &str) -> Result<Vec<TopoElement>> {
    reader.expect_keyword(section)?;
    let count = reader.parse_usize()?;
    let mut elements = Vec::with_capacity(count);
    for _ in 0..count {
        let attribute = reader.parse_i64()?;
        let geometry = Geometry::from_code(reader.parse_i64()?)?;
        let vertices = (0..geometry.num_vertices())
            .map(|_| reader.parse_usize())
            .collect::<Result<Vec<_>>>()?;
        elements.push(TopoElement::new(attribute, geometry, vertices)?);
    }
    Ok(elements)
}

/// Read the topology sections and the edge-to-knot listing.
///
/// The returned knot assignments are indexed by topology edge, not by the
/// order of the `edges` section.
pub fn read_topology(reader: &mut TokenReader) -> Result<(PatchTopology, Vec<EdgeKnot>)> {
    reader.expect_keyword("dimension")?;
    let dim = reader.parse_usize()?;
    let elements = read_elements(reader, "elements")?;
    let boundary = read_elements(reader, "boundary")?;

    reader.expect_keyword("edges")?;
    let num_listed = reader.parse_usize()?;
    let mut listing = Vec::with_capacity(num_listed);
    for _ in 0..num_listed {
        let ki = reader.parse_usize()?;
        let v0 = reader.parse_usize()?;
        let v1 = reader.parse_usize()?;
        listing.push((ki, v0, v1));
    }

    reader.expect_keyword("vertices")?;
    let num_vertices = reader.parse_usize()?;

    let topology = PatchTopology::new(dim, num_vertices, elements, boundary)?;
    if num_listed != topology.num_edges() {
        return Err(IgaError::Parse(format!(
            "edges section lists {num_listed} edges, the elements define {}",
            topology.num_edges()
        )));
    }

    let mut edge_knots: Vec<Option<EdgeKnot>> = vec![None; topology.num_edges()];
    for (ki, v0, v1) in listing {
        let e = topology.find_edge(v0, v1).ok_or_else(|| {
            IgaError::Parse(format!("edge ({v0}, {v1}) is not an edge of any patch"))
        })?;
        if edge_knots[e].is_some() {
            return Err(IgaError::Parse(format!("edge ({v0}, {v1}) is listed twice")));
        }
        edge_knots[e] = Some(EdgeKnot::from_listing(ki, v0, v1));
    }
    let edge_knots = edge_knots
        .into_iter()
        .enumerate()
        .map(|(e, k)| k.ok_or_else(|| IgaError::Parse(format!("edge {e} has no knot vector"))))
        .collect::<Result<Vec<_>>>()?;

    log::debug!(
        "read patch topology: dim {dim}, {} patches, {} boundary patches, {} edges",
        topology.num_elements(),
        topology.num_boundary(),
        topology.num_edges()
    );
    Ok((topology, edge_knots))
}

fn write_elements<W: Write>(out: &mut W, section: &str, elements: &[TopoElement]) -> Result<()> {
    writeln!(out, "{section}")?;
    writeln!(out, "{}", elements.len())?;
    for el in elements {
        write!(out, "{} {}", el.attribute, el.geometry.code())?;
        for v in &el.vertices {
            write!(out, " {v}")?;
        }
        writeln!(out)?;
    }
    writeln!(out)?;
    Ok(())
}

/// Write the topology sections. A reversed edge is listed from its higher
/// vertex to its lower one.
pub fn write_topology<W: Write>(
    out: &mut W,
    topology: &PatchTopology,
    edge_knots: &[EdgeKnot],
) -> Result<()> {
    writeln!(out, "dimension")?;
    writeln!(out, "{}", topology.dim())?;
    writeln!(out)?;
    write_elements(out, "elements", topology.elements())?;
    write_elements(out, "boundary", topology.boundary())?;

    writeln!(out, "edges")?;
    writeln!(out, "{}", topology.num_edges())?;
    for (e, ek) in edge_knots.iter().enumerate() {
        let [a, b] = topology.edge_vertices(e);
        if ek.reversed {
            writeln!(out, "{} {b} {a}", ek.index)?;
        } else {
            writeln!(out, "{} {a} {b}", ek.index)?;
        }
    }
    writeln!(out)?;

    writeln!(out, "vertices")?;
    writeln!(out, "{}", topology.num_vertices())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SQUARE: &str = "\
dimension
2
elements
1
1 3 0 1 2 3
boundary
4
1 1 0 1
2 1 1 2
3 1 2 3
4 1 3 0
edges
4
0 0 1
0 3 2
1 1 2
1 0 3
vertices
4
";

    #[test]
    fn test_read_single_square() {
        let mut reader = TokenReader::new(SQUARE);
        let (topo, knots) = read_topology(&mut reader).unwrap();
        assert_eq!(topo.num_elements(), 1);
        assert_eq!(topo.num_boundary(), 4);
        assert_eq!(knots.len(), 4);
        let e23 = topo.find_edge(2, 3).unwrap();
        assert!(knots[e23].reversed);
        assert_eq!(knots[e23].index, 0);
        topo.check_patches(&knots).unwrap();
        assert!(reader.is_empty());
    }

    #[test]
    fn test_write_then_read_preserves_listing() {
        let mut reader = TokenReader::new(SQUARE);
        let (topo, knots) = read_topology(&mut reader).unwrap();
        let mut buf = Vec::new();
        write_topology(&mut buf, &topo, &knots).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(text.contains("0 3 2"));
        let (again, knots_again) = read_topology(&mut TokenReader::new(&text)).unwrap();
        assert_eq!(again.num_edges(), topo.num_edges());
        assert_eq!(knots_again, knots);
    }

    #[test]
    fn test_missing_edge_listing_is_an_error() {
        let text = SQUARE.replace("edges\n4\n0 0 1\n", "edges\n3\n");
        assert!(read_topology(&mut TokenReader::new(&text)).is_err());
    }
}

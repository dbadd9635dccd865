use std::io::Write;

use iga_core::{IgaError, Result, TokenReader};

use super::NurbsPatch;
use crate::knot::KnotVector;

impl NurbsPatch {
    /// Read a `knotvectors` / `dimension` / `controlpoints` block.
    ///
    /// `controlpoints` and `controlpoints_homogeneous` hold weighted
    /// coordinates; `controlpoints_cartesian` holds plain coordinates that
    /// are weighted on load.
    pub fn read(reader: &mut TokenReader) -> Result<Self> {
        reader.expect_keyword("knotvectors")?;
        let pdim = reader.parse_usize()?;
        let kv = (0..pdim)
            .map(|_| KnotVector::read(reader))
            .collect::<Result<Vec<_>>>()?;

        reader.expect_keyword("dimension")?;
        let sdim = reader.parse_usize()?;
        let mut patch = NurbsPatch::new(kv, sdim + 1)?;

        let cartesian = match reader.next_token()? {
            "controlpoints" | "controlpoints_homogeneous" => false,
            "controlpoints_cartesian" => true,
            other => {
                return Err(IgaError::Parse(format!(
                    "Expected a controlpoints section, got '{other}'"
                )))
            }
        };
        let values = reader.parse_f64_vec(patch.data.len())?;
        patch.data = values;
        if cartesian {
            for pt in patch.data.chunks_mut(sdim + 1) {
                let w = pt[sdim];
                pt[..sdim].iter_mut().for_each(|x| *x *= w);
            }
        }
        Ok(patch)
    }

    /// Write the patch in homogeneous form.
    pub fn print<W: Write>(&self, out: &mut W) -> Result<()> {
        writeln!(out, "knotvectors\n{}", self.kv.len())?;
        for kv in &self.kv {
            kv.print(out)?;
        }
        writeln!(out, "\ndimension\n{}\n\ncontrolpoints", self.dim - 1)?;
        for pt in self.data.chunks(self.dim) {
            let line: Vec<String> = pt.iter().map(f64::to_string).collect();
            writeln!(out, "{}", line.join(" "))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ARC: &str = "\
knotvectors
1
2 3 0 0 0 1 1 1

dimension
2

controlpoints_cartesian
1 0 1
1 1 0.5   # corner
0 1 1
";

    #[test]
    fn test_cartesian_points_are_weighted() {
        let patch = NurbsPatch::read(&mut TokenReader::new(ARC)).unwrap();
        assert_eq!(patch.dim(), 3);
        assert_eq!(patch.data()[3..6], [0.5, 0.5, 0.5]);
    }

    #[test]
    fn test_print_read_round_trip() {
        let patch = NurbsPatch::read(&mut TokenReader::new(ARC)).unwrap();
        let mut buf = Vec::new();
        patch.print(&mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(text.contains("\ncontrolpoints\n"));
        let again = NurbsPatch::read(&mut TokenReader::new(&text)).unwrap();
        assert_eq!(again, patch);
    }

    #[test]
    fn test_unknown_section() {
        let text = ARC.replace("controlpoints_cartesian", "points");
        assert!(NurbsPatch::read(&mut TokenReader::new(&text)).is_err());
    }
}

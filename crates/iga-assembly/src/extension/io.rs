//! The NURBS mesh file.
//!
//! ```text
//! NURBS mesh v1.0
//! <topology sections>
//! knotvectors            | patches
//! <n>                    | <one patch block per topology element>
//! <knot vector lines>    |
//! [spacing <n> <ki rule>...]      required in v1.1
//! [mesh_elements <n> <e>...]
//! [periodic <n> <attr>... <n> <attr>...]
//! weights <w>... | unitweights | autoweights
//! ```
//!
//! Weights are listed per active dof after periodic identification. Files
//! carrying patches take their weights from the patches.

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use iga_core::{IgaError, Result, TokenReader};
use iga_nurbs::{KnotVector, NurbsPatch, SpacingRule};
use iga_topology::io::{read_topology, write_topology};
use log::debug;

use super::{Mode, NurbsExtension};

const VERSION_PLAIN: &str = "v1.0";
const VERSION_SPACING: &str = "v1.1";

fn write_counted<W: Write>(out: &mut W, values: &[i64]) -> Result<()> {
    write!(out, "{}", values.len())?;
    for v in values {
        write!(out, " {v}")?;
    }
    writeln!(out)?;
    Ok(())
}

impl NurbsExtension {
    /// Read a whole mesh file.
    pub fn read(reader: &mut TokenReader) -> Result<Self> {
        reader.expect_keyword("NURBS")?;
        reader.expect_keyword("mesh")?;
        let spacing_required = match reader.next_token()? {
            VERSION_PLAIN => false,
            VERSION_SPACING => true,
            other => {
                return Err(IgaError::Parse(format!(
                    "Unsupported NURBS mesh version '{other}'"
                )))
            }
        };

        let (topology, edge_knots) = read_topology(reader)?;
        topology.check_patches(&edge_knots)?;
        let mut ext = Self::empty(topology, edge_knots, Mode::Normal);

        match reader.next_token()? {
            "knotvectors" => ext.read_knot_vectors(reader, spacing_required)?,
            "patches" => ext.read_patches(reader)?,
            other => {
                return Err(IgaError::Parse(format!(
                    "Expected 'knotvectors' or 'patches', got '{other}'"
                )))
            }
        }
        ext.create_comprehensive()?;
        ext.set_orders_from_knot_vectors();
        ext.count_elements();

        let active = if !ext.has_patches() && reader.accept_keyword("mesh_elements") {
            Some(ext.read_active_elements(reader)?)
        } else {
            None
        };
        ext.rebuild(active)?;

        if reader.accept_keyword("periodic") {
            ext.master = reader.parse_counted_i64()?;
            ext.slave = reader.parse_counted_i64()?;
            ext.connect_boundaries()?;
        }

        if ext.has_patches() {
            ext.weights_from_patches()?;
        } else if reader.accept_keyword("weights") {
            ext.weights = reader.parse_f64_vec(ext.num_active_dofs)?;
        } else {
            // `unitweights`, `autoweights` or nothing at all
            if !reader.accept_keyword("unitweights") {
                reader.accept_keyword("autoweights");
            }
            ext.weights = vec![1.0; ext.num_active_dofs];
        }

        debug!(
            "read NURBS mesh: {} patches, {} knot vectors, {} active elements, {} active dofs",
            ext.num_patches(),
            ext.num_knot_vectors(),
            ext.num_active_elements,
            ext.num_active_dofs
        );
        Ok(ext)
    }

    pub fn parse(text: &str) -> Result<Self> {
        Self::read(&mut TokenReader::new(text))
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        Self::read(&mut TokenReader::from_reader(BufReader::new(file))?)
    }

    fn read_knot_vectors(&mut self, reader: &mut TokenReader, spacing_required: bool) -> Result<()> {
        let count = reader.parse_usize()?;
        self.knot_vectors = (0..count)
            .map(|_| KnotVector::read(reader))
            .collect::<Result<Vec<_>>>()?;

        if !reader.accept_keyword("spacing") {
            if spacing_required {
                return Err(IgaError::Parse(format!(
                    "A {VERSION_SPACING} NURBS mesh needs a spacing section"
                )));
            }
            return Ok(());
        }
        let num_rules = reader.parse_usize()?;
        for _ in 0..num_rules {
            let ki = reader.parse_usize()?;
            if ki >= count {
                return Err(IgaError::Parse(format!(
                    "Spacing rule for knot vector {ki}, there are {count}"
                )));
            }
            let rule = SpacingRule::read(reader)?;
            self.knot_vectors[ki].set_spacing(Some(rule));
        }
        Ok(())
    }

    /// Read one patch per topology element and take each unique knot
    /// vector from the first patch direction that carries it.
    fn read_patches(&mut self, reader: &mut TokenReader) -> Result<()> {
        let patches = (0..self.num_patches())
            .map(|_| NurbsPatch::read(reader))
            .collect::<Result<Vec<_>>>()?;
        if let Some(p) = patches.iter().position(|patch| patch.param_dim() != self.dim()) {
            return Err(IgaError::Parse(format!(
                "Patch {p} has {} parametric directions in a {}D mesh",
                patches[p].param_dim(),
                self.dim()
            )));
        }

        let count = self.edge_knots.iter().map(|ek| ek.index + 1).max().unwrap_or(0);
        let mut unique: Vec<Option<KnotVector>> = vec![None; count];
        for (p, patch) in patches.iter().enumerate() {
            for (d, (ki, forward)) in self.patch_directions(p).into_iter().enumerate() {
                if unique[ki].is_none() {
                    let mut kv = patch.knot_vector(d)?.clone();
                    if !forward {
                        kv.flip();
                    }
                    unique[ki] = Some(kv);
                }
            }
        }
        self.knot_vectors = unique
            .into_iter()
            .enumerate()
            .map(|(ki, kv)| {
                kv.ok_or_else(|| IgaError::Parse(format!("Knot vector {ki} is carried by no patch")))
            })
            .collect::<Result<Vec<_>>>()?;
        self.patches = patches;
        Ok(())
    }

    fn read_active_elements(&self, reader: &mut TokenReader) -> Result<Vec<bool>> {
        let count = reader.parse_usize()?;
        let mut mask = vec![false; self.num_elements];
        for _ in 0..count {
            let e = reader.parse_usize()?;
            let slot = mask.get_mut(e).ok_or_else(|| {
                IgaError::Parse(format!(
                    "Active element {e} out of range, the mesh has {} elements",
                    self.num_elements
                ))
            })?;
            *slot = true;
        }
        Ok(mask)
    }

    /// Write the mesh file. Every line of `comments` is written as a
    /// comment below the header.
    pub fn print<W: Write>(&self, out: &mut W, comments: &str) -> Result<()> {
        let with_spacing: Vec<(usize, &SpacingRule)> = if self.has_patches() {
            Vec::new()
        } else {
            self.knot_vectors
                .iter()
                .enumerate()
                .filter_map(|(ki, kv)| kv.spacing().map(|rule| (ki, rule)))
                .collect()
        };
        let version = if with_spacing.is_empty() {
            VERSION_PLAIN
        } else {
            VERSION_SPACING
        };

        writeln!(out, "NURBS mesh {version}")?;
        for line in comments.lines() {
            if line.starts_with('#') {
                writeln!(out, "{line}")?;
            } else {
                writeln!(out, "# {line}")?;
            }
        }
        writeln!(out)?;
        write_topology(out, &self.topology, &self.edge_knots)?;

        if self.has_patches() {
            writeln!(out, "\npatches")?;
            for (p, patch) in self.patches.iter().enumerate() {
                writeln!(out, "\n# patch {p}\n")?;
                patch.print(out)?;
            }
            return self.print_periodic(out);
        }

        writeln!(out, "\nknotvectors\n{}", self.knot_vectors.len())?;
        for kv in &self.knot_vectors {
            kv.print(out)?;
        }
        if !with_spacing.is_empty() {
            writeln!(out, "\nspacing\n{}", with_spacing.len())?;
            for (ki, rule) in with_spacing {
                write!(out, "{ki} ")?;
                rule.print(out)?;
            }
        }
        if self.num_active_elements < self.num_elements {
            writeln!(out, "\nmesh_elements\n{}", self.num_active_elements)?;
            for e in self.element_local_to_global() {
                writeln!(out, "{e}")?;
            }
        }
        self.print_periodic(out)?;
        writeln!(out, "\nweights")?;
        for w in &self.weights {
            writeln!(out, "{w}")?;
        }
        Ok(())
    }

    fn print_periodic<W: Write>(&self, out: &mut W) -> Result<()> {
        if self.master.is_empty() {
            return Ok(());
        }
        writeln!(out, "\nperiodic")?;
        write_counted(out, &self.master)?;
        write_counted(out, &self.slave)
    }

    pub fn save(&self, path: &Path, comments: &str) -> Result<()> {
        let mut out = BufWriter::new(File::create(path)?);
        self.print(&mut out, comments)?;
        out.flush()?;
        Ok(())
    }

    /// Sizes of every numbered entity, then the unique knot vectors.
    pub fn print_characteristics<W: Write>(&self, out: &mut W) -> Result<()> {
        let mut orders = self.orders.clone();
        orders.sort_unstable();
        orders.dedup();
        let orders: Vec<String> = orders.iter().map(usize::to_string).collect();

        writeln!(out, "NURBS Mesh entity sizes:")?;
        writeln!(out, "Dimension           = {}", self.dim())?;
        writeln!(out, "Unique Orders       = {}", orders.join(" "))?;
        writeln!(out, "NumOfKnotVectors    = {}", self.num_knot_vectors())?;
        writeln!(out, "NumOfPatches        = {}", self.num_patches())?;
        writeln!(out, "NumOfBdrPatches     = {}", self.num_bdr_patches())?;
        writeln!(out, "NumOfVertices       = {}", self.num_vertices)?;
        writeln!(out, "NumOfElements       = {}", self.num_elements)?;
        writeln!(out, "NumOfBdrElements    = {}", self.num_bdr_elements)?;
        writeln!(out, "NumOfDofs           = {}", self.num_dofs)?;
        writeln!(out, "NumOfActiveVertices = {}", self.num_active_vertices)?;
        writeln!(out, "NumOfActiveElems    = {}", self.num_active_elements)?;
        writeln!(out, "NumOfActiveBdrElems = {}", self.num_active_bdr_elements)?;
        writeln!(out, "NumOfActiveDofs     = {}", self.num_active_dofs)?;
        for (i, kv) in self.knot_vectors.iter().enumerate() {
            write!(out, " {}) ", i + 1)?;
            kv.print(out)?;
        }
        writeln!(out)?;
        Ok(())
    }

    /// Tabulate the basis of every unique knot vector `i` into
    /// `dir/{basename}_{i}.dat`.
    pub fn print_functions(&self, dir: &Path, basename: &str, samples: usize) -> Result<()> {
        for (i, kv) in self.knot_vectors.iter().enumerate() {
            let mut out = BufWriter::new(File::create(dir.join(format!("{basename}_{i}.dat")))?);
            kv.print_functions(&mut out, samples)?;
            out.flush()?;
        }
        Ok(())
    }
}

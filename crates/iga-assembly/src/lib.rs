//! Multi-patch NURBS assembly.
//!
//! A [`NurbsExtension`] ties NURBS patches to a coarse [`PatchTopology`]:
//! it reconciles the knot vectors shared across patch edges, numbers the
//! vertices and degrees of freedom of the whole mesh, and builds the
//! element and boundary connectivity tables. [`PatchMap`] translates
//! patch-local tensor indices into that global numbering.
//!
//! [`PatchTopology`]: iga_topology::PatchTopology

pub mod extension;
pub mod patch_map;

pub use extension::{decode_signed_dof, EntityOffsets, Mode, NurbsExtension};
pub use patch_map::{Granularity, PatchMap};

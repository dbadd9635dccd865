//! Coarse patch topology: the mesh whose elements are NURBS patches.

pub mod io;
pub mod knot_map;
pub mod topology;
pub mod types;
pub mod validate;

pub use knot_map::{EdgeKnot, KnotClasses};
pub use topology::PatchTopology;
pub use types::{quad_orientation, Geometry, Oriented, TopoElement};

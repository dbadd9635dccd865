use crate::error::Result;

/// Validate structural integrity of a knot vector, patch, or topology.
pub trait Validate {
    fn validate(&self) -> Result<()>;
}

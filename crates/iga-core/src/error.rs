use thiserror::Error;

#[derive(Debug, Error)]
pub enum IgaError {
    #[error("Topology error: {0}")]
    Topology(String),

    #[error("Knot vector error: {0}")]
    Knot(String),

    #[error("Patch error: {0}")]
    Patch(String),

    #[error("Consistency error: {0}")]
    Consistency(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Tolerance violation: {0}")]
    Tolerance(String),

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    #[error("Not found: {0}")]
    NotFound(String),
}

pub type Result<T> = std::result::Result<T, IgaError>;

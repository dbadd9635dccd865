pub mod error;
pub mod text;
pub mod tolerance;
pub mod traits;

pub use error::{IgaError, Result};
pub use text::TokenReader;
pub use tolerance::Tolerance;
pub use traits::Validate;

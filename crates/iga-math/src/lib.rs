pub mod banded;
pub mod binomial;
pub mod rotation;

pub use nalgebra::{DMatrix, Matrix2, Matrix3, Vector2, Vector3};

pub use banded::{BandedLu, BandedMatrix};
pub use binomial::BinomialTable;
pub use rotation::{rotation_2d, rotation_3d};

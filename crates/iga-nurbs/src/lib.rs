//! Knot vectors, B-spline basis evaluation and tensor-product NURBS patches.

pub mod knot;
pub mod patch;

pub use knot::{KnotVector, Orientation, Span, SpacingRule, MAX_ORDER};
pub use patch::{interpolate, revolve_3d, LoopDirection, NurbsPatch, RemovalOutcome};

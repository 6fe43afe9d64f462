//! Arithmetic nodes
//!
//! Small integer-valued nodes for composing calculation pipelines.

mod product;
mod scale;
mod sum;

pub use product::ProductNode;
pub use scale::{ScaleConfig, ScaleNode};
pub use sum::SumNode;

//! Text nodes
//!
//! Nodes that produce or reshape text.

mod chunker;
mod template;

pub use chunker::{ChunkerConfig, ChunkerNode};
pub use template::TemplateNode;

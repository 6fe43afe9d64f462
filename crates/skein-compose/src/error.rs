//! Error types for the composition engine
//!
//! One error enum covers the whole crate. The compile-time classes (build,
//! type mismatch, cycle, unsatisfied input) are only ever returned from
//! `compile`; the run-time classes come out of `invoke`/`stream`.

use thiserror::Error;

/// Result type alias for engine operations
pub type Result<T> = std::result::Result<T, ComposeError>;

/// Errors produced while building, compiling, or running a workflow
#[derive(Debug, Clone, Error)]
pub enum ComposeError {
    /// Structural problem in the graph: duplicate or reserved ids, malformed
    /// edges, broken control connectivity
    #[error("Graph build error: {0}")]
    Build(String),

    /// A field mapping connects incompatible declared types
    #[error("Type mismatch for {mapping}: {detail}")]
    TypeMismatch { mapping: String, detail: String },

    /// The control-edge subgraph contains a cycle
    #[error("Control cycle: {}", path.join(" -> "))]
    Cycle { path: Vec<String> },

    /// A node's declared input cannot be assembled from its data edges
    #[error("Unsatisfied input for node '{node}': {reason}")]
    UnsatisfiedInput { node: String, reason: String },

    /// A node body returned an error during execution
    #[error("Node '{node}' failed: {message}")]
    NodeExecution { node: String, message: String },

    /// The external input does not match the graph's declared input type
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Stream chunks with no defined concatenation
    #[error("Cannot concatenate stream chunks: {0}")]
    ChunkConcat(String),

    /// The run was cancelled
    #[error("Run cancelled")]
    Cancelled,

    /// The run exceeded its deadline
    #[error("Run deadline exceeded")]
    DeadlineExceeded,
}

impl ComposeError {
    /// Shorthand for a build error
    pub fn build(msg: impl Into<String>) -> Self {
        Self::Build(msg.into())
    }

    /// Wrap a node failure with the failing node's identity
    pub fn node_failure(node: impl Into<String>, err: impl std::fmt::Display) -> Self {
        Self::NodeExecution {
            node: node.into(),
            message: err.to_string(),
        }
    }

    /// True for the classes that only `compile` returns
    pub fn is_compile_error(&self) -> bool {
        matches!(
            self,
            Self::Build(_)
                | Self::TypeMismatch { .. }
                | Self::Cycle { .. }
                | Self::UnsatisfiedInput { .. }
        )
    }
}

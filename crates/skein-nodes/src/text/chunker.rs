//! Chunker node
//!
//! Splits text into fixed-size chunks and emits them as a stream. Splits
//! land on character boundaries, so multi-byte text survives intact and
//! concatenating the chunks always reproduces the input.

use async_trait::async_trait;
use futures_util::stream;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use skein_compose::{
    concat_chunks, ChunkStream, ComposeError, FlowNode, NodeMode, Result, RunContext, ValueType,
};

/// Configuration for the chunker node
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkerConfig {
    /// Maximum characters per chunk; values below 1 are treated as 1
    pub chunk_size: usize,
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self { chunk_size: 64 }
    }
}

/// Chunker Node
///
/// Streams its text input back out in chunks of at most `chunk_size`
/// characters. Empty input still produces one (empty) chunk, so a
/// downstream consumer always sees at least one frame.
///
/// # Input
/// `text` - the text to split
///
/// # Output
/// `text` - one chunk per frame when streamed; the unchanged input when
/// invoked
#[derive(Debug, Clone, Default)]
pub struct ChunkerNode {
    config: ChunkerConfig,
}

impl ChunkerNode {
    /// Create a chunker with the default chunk size
    pub fn new() -> Self {
        Self {
            config: ChunkerConfig::default(),
        }
    }

    /// Create with configuration
    pub fn with_config(config: ChunkerConfig) -> Self {
        Self { config }
    }

    fn split(&self, text: &str) -> Vec<Value> {
        let size = self.config.chunk_size.max(1);
        let mut chunks = Vec::new();
        let mut current = String::new();
        let mut len = 0;
        for c in text.chars() {
            current.push(c);
            len += 1;
            if len == size {
                chunks.push(json!(current));
                current.clear();
                len = 0;
            }
        }
        if !current.is_empty() {
            chunks.push(json!(current));
        }
        if chunks.is_empty() {
            chunks.push(json!(""));
        }
        chunks
    }

    fn text_of(input: &Value) -> Result<&str> {
        input
            .as_str()
            .ok_or_else(|| ComposeError::InvalidInput("expected text".to_string()))
    }
}

#[async_trait]
impl FlowNode for ChunkerNode {
    fn input_type(&self) -> ValueType {
        ValueType::Text
    }

    fn output_type(&self) -> ValueType {
        ValueType::Text
    }

    fn mode(&self) -> NodeMode {
        NodeMode::Stream
    }

    async fn invoke(&self, _ctx: &RunContext, input: Value) -> Result<Value> {
        let text = Self::text_of(&input)?;
        concat_chunks(self.split(text))
    }

    async fn stream(&self, _ctx: &RunContext, input: Value) -> Result<ChunkStream> {
        let text = Self::text_of(&input)?;
        let chunks = self.split(text);
        log::debug!(
            "ChunkerNode: {} chars into {} chunks",
            text.chars().count(),
            chunks.len()
        );
        Ok(Box::pin(stream::iter(chunks.into_iter().map(Ok))))
    }
}

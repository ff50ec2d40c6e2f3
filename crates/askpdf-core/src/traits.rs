use std::path::Path;

use async_trait::async_trait;

use crate::error::{Error, Result};
use crate::types::{EmbeddedChunk, SearchResult};

/// Converts text into fixed-length vectors.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Stable identifier for the provider/model (e.g. `openai:text-embedding-ada-002:d1536`).
    fn embedder_id(&self) -> &str;
    /// Embedding dimensionality (D).
    fn dim(&self) -> usize;
    /// Embed a batch of texts; output is aligned by position with `texts`.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let batch = [text.to_string()];
        let mut vectors = self.embed_batch(&batch).await?;
        vectors
            .pop()
            .ok_or_else(|| Error::provider(self.embedder_id(), "no embedding returned for input"))
    }
}

/// Generates an answer to `question` from `context` only.
#[async_trait]
pub trait Completer: Send + Sync {
    fn completer_id(&self) -> &str;
    async fn complete(&self, context: &str, question: &str) -> Result<String>;
}

/// Persistent (text, vector) store tagged by source id.
#[async_trait]
pub trait VectorStore: Send + Sync {
    fn dim(&self) -> usize;
    async fn append(&self, source_id: &str, chunks: &[EmbeddedChunk]) -> Result<usize>;
    async fn search(&self, query: &[f32], source_id: Option<&str>, top_k: usize) -> Result<Vec<SearchResult>>;
    async fn remove_source(&self, source_id: &str) -> Result<usize>;
}

/// Best-effort text dump of a stored document.
pub trait TextExtractor: Send + Sync {
    fn extract_text(&self, path: &Path) -> Result<String>;
}

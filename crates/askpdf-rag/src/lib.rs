//! Ingest and question-answering over per-document chunk sets.
//!
//! `RagPipeline` wires the chunker, the embedding and completion providers and
//! the vector store together. Retries, if any, belong to the providers.
use std::path::Path;
use std::sync::Arc;

use tracing::{debug, info, instrument};

use askpdf_core::config::{resolve_with_base, Settings};
use askpdf_core::traits::{Completer, Embedder, VectorStore};
use askpdf_core::types::{Answer, EmbeddedChunk};
use askpdf_core::{Error, Result};
use askpdf_provider::{build_completer, build_embedder};
use askpdf_text::{Chunker, TextTokenizer};
use askpdf_vector::{IndexOptions, VectorIndex};

/// Separator between retrieved chunks in the completion context.
pub const CONTEXT_SEPARATOR: &str = "\n\n";

pub struct RagPipeline {
    chunker: Chunker,
    embedder: Arc<dyn Embedder>,
    completer: Arc<dyn Completer>,
    store: Arc<dyn VectorStore>,
    default_top_k: usize,
}

/// Open the configured vector index. Relative index paths resolve against
/// `base_dir`.
pub async fn open_index(settings: &Settings, base_dir: &Path) -> Result<Arc<VectorIndex>> {
    let path = resolve_with_base(base_dir, &settings.index.path);
    let index = VectorIndex::open(&path, IndexOptions::from_settings(settings)).await?;
    Ok(Arc::new(index))
}

impl RagPipeline {
    pub fn new(
        chunker: Chunker,
        embedder: Arc<dyn Embedder>,
        completer: Arc<dyn Completer>,
        store: Arc<dyn VectorStore>,
        default_top_k: usize,
    ) -> Result<Self> {
        if embedder.dim() != store.dim() {
            return Err(Error::DimensionMismatch { expected: store.dim(), actual: embedder.dim() });
        }
        if default_top_k == 0 {
            return Err(Error::InvalidConfig("query.top_k must be > 0".to_string()));
        }
        Ok(Self { chunker, embedder, completer, store, default_top_k })
    }

    /// Build every component from `settings`. The chunker and the embedder
    /// share one tokenizer instance.
    pub fn from_settings(settings: &Settings, store: Arc<dyn VectorStore>) -> Result<Self> {
        settings.validate()?;
        let tokenizer = Arc::new(TextTokenizer::from_id(settings.tokenizer_id())?);
        let chunker = Chunker::from_settings(Arc::clone(&tokenizer), &settings.chunking)?;
        let embedder = build_embedder(&settings.embedding, tokenizer)?;
        let completer = build_completer(&settings.completion)?;
        Self::new(chunker, embedder, completer, store, settings.query.top_k)
    }

    /// Chunk, embed and store `raw_text` under `source_id`. All chunks are
    /// embedded before the single append, so a failed or dropped ingest
    /// writes nothing.
    #[instrument(skip(self, raw_text), fields(bytes = raw_text.len()))]
    pub async fn ingest(&self, source_id: &str, raw_text: &str) -> Result<usize> {
        if source_id.trim().is_empty() {
            return Err(Error::InvalidInput("source_id must not be blank".to_string()));
        }
        if raw_text.trim().is_empty() {
            return Err(Error::EmptyDocument(source_id.to_string()));
        }
        let chunks: Vec<String> = self
            .chunker
            .chunk(raw_text)?
            .into_iter()
            .filter(|c| !c.trim().is_empty())
            .collect();
        if chunks.is_empty() {
            return Err(Error::EmptyDocument(source_id.to_string()));
        }
        debug!(
            chunks = chunks.len(),
            max_tokens = self.chunker.max_tokens(),
            overlap_tokens = self.chunker.overlap_tokens(),
            "chunked document"
        );

        let vectors = self.embedder.embed_batch(&chunks).await?;
        if vectors.len() != chunks.len() {
            return Err(Error::provider(
                self.embedder.embedder_id(),
                format!("expected {} embeddings, got {}", chunks.len(), vectors.len()),
            ));
        }
        let embedded: Vec<EmbeddedChunk> = chunks
            .into_iter()
            .zip(vectors)
            .map(|(text, vector)| EmbeddedChunk { text, vector })
            .collect();

        let written = self.store.append(source_id, &embedded).await?;
        info!(source_id, chunks = written, embedder = self.embedder.embedder_id(), "ingested document");
        Ok(written)
    }

    /// Answer `question` from the chunks stored under `source_id`.
    /// `top_k` defaults to the configured `query.top_k`.
    #[instrument(skip(self))]
    pub async fn query(&self, source_id: &str, question: &str, top_k: Option<usize>) -> Result<Answer> {
        if source_id.trim().is_empty() {
            return Err(Error::InvalidInput("source_id must not be blank".to_string()));
        }
        if question.trim().is_empty() {
            return Err(Error::InvalidInput("question must not be blank".to_string()));
        }
        let top_k = top_k.unwrap_or(self.default_top_k);
        if top_k == 0 {
            return Err(Error::InvalidInput("top_k must be > 0".to_string()));
        }

        let query_vector = self.embedder.embed(question).await?;
        let context = self.store.search(&query_vector, Some(source_id), top_k).await?;
        if context.is_empty() {
            return Err(Error::NoContent(source_id.to_string()));
        }
        let context_text = context
            .iter()
            .map(|r| r.text.as_str())
            .collect::<Vec<_>>()
            .join(CONTEXT_SEPARATOR);

        let answer = self.completer.complete(&context_text, question).await?;
        info!(
            source_id,
            hits = context.len(),
            best = context[0].score,
            completer = self.completer.completer_id(),
            "answered question"
        );
        Ok(Answer { answer, context })
    }

    /// Drop every chunk of `source_id`.
    #[instrument(skip(self))]
    pub async fn remove(&self, source_id: &str) -> Result<usize> {
        let removed = self.store.remove_source(source_id).await?;
        info!(source_id, removed, "removed document");
        Ok(removed)
    }
}

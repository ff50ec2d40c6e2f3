//! Embedding and completion adapters.
//!
//! The OpenAI-compatible clients talk to a remote provider over HTTP with a
//! per-request timeout; `HashEmbedder` and `ExtractiveCompleter` are offline
//! stand-ins selected by configuration (`provider = "hash"` / `"extractive"`).

pub mod completion;
pub mod embedding;
pub mod extractive;
pub mod hash;
mod http;

use std::sync::Arc;

use tracing::info;

use askpdf_core::config::{CompletionProviderKind, CompletionSettings, EmbeddingProviderKind, EmbeddingSettings};
use askpdf_core::traits::{Completer, Embedder};
use askpdf_core::Result;
use askpdf_text::TextTokenizer;

pub use completion::OpenAiCompleter;
pub use embedding::OpenAiEmbedder;
pub use extractive::ExtractiveCompleter;
pub use hash::HashEmbedder;

/// Build the configured embedder. `tokenizer` must be the same instance the
/// chunker uses.
pub fn build_embedder(settings: &EmbeddingSettings, tokenizer: Arc<TextTokenizer>) -> Result<Arc<dyn Embedder>> {
    let embedder: Arc<dyn Embedder> = match settings.provider {
        EmbeddingProviderKind::OpenAi => Arc::new(OpenAiEmbedder::new(settings, tokenizer)?),
        EmbeddingProviderKind::Hash => Arc::new(HashEmbedder::new(settings.dim)),
    };
    info!(embedder = embedder.embedder_id(), dim = embedder.dim(), "embedding provider ready");
    Ok(embedder)
}

pub fn build_completer(settings: &CompletionSettings) -> Result<Arc<dyn Completer>> {
    let completer: Arc<dyn Completer> = match settings.provider {
        CompletionProviderKind::OpenAi => Arc::new(OpenAiCompleter::new(settings)?),
        CompletionProviderKind::Extractive => Arc::new(ExtractiveCompleter),
    };
    info!(completer = completer.completer_id(), "completion provider ready");
    Ok(completer)
}

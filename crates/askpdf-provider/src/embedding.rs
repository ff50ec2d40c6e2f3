use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use askpdf_core::config::EmbeddingSettings;
use askpdf_core::traits::Embedder;
use askpdf_core::{Error, Result};
use askpdf_text::TextTokenizer;

use crate::http::HttpEndpoint;

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingRow>,
}

#[derive(Deserialize)]
struct EmbeddingRow {
    index: usize,
    embedding: Vec<f32>,
}

/// Client for an OpenAI-compatible `/embeddings` endpoint.
///
/// Inputs longer than `max_input_tokens` (counted with the shared tokenizer)
/// are truncated before sending; batches are capped at `batch_size`.
pub struct OpenAiEmbedder {
    endpoint: HttpEndpoint,
    model: String,
    dim: usize,
    batch_size: usize,
    max_input_tokens: usize,
    tokenizer: Arc<TextTokenizer>,
    id: String,
}

impl OpenAiEmbedder {
    pub fn new(settings: &EmbeddingSettings, tokenizer: Arc<TextTokenizer>) -> Result<Self> {
        let api_key = settings.resolve_api_key();
        if api_key.is_none() && settings.base_url.contains("api.openai.com") {
            return Err(Error::InvalidConfig(format!(
                "{} environment variable is not set",
                settings.api_key_env
            )));
        }
        let endpoint = HttpEndpoint::new("openai-embeddings", &settings.base_url, api_key, settings.timeout_secs)?;
        let id = format!("openai:{}:d{}", settings.model, settings.dim);
        Ok(Self {
            endpoint,
            model: settings.model.clone(),
            dim: settings.dim,
            batch_size: settings.batch_size.max(1),
            max_input_tokens: settings.max_input_tokens,
            tokenizer,
            id,
        })
    }

    fn prepare(&self, text: &str) -> Result<String> {
        if self.max_input_tokens == 0 {
            return Ok(text.to_string());
        }
        let tokens = self.tokenizer.count(text)?;
        if tokens <= self.max_input_tokens {
            return Ok(text.to_string());
        }
        warn!(
            tokens,
            limit = self.max_input_tokens,
            tokenizer = self.tokenizer.id(),
            "embedding input exceeds model limit, truncating"
        );
        self.tokenizer.truncate(text, self.max_input_tokens)
    }

    async fn request(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>> {
        let body = EmbeddingRequest { model: &self.model, input: inputs };
        let response: EmbeddingResponse = self.endpoint.post_json("embeddings", &body).await?;
        align_rows(self.endpoint.provider(), response.data, inputs.len(), self.dim)
    }
}

/// Order rows by their `index` and check count and dimensionality.
fn align_rows(provider: &str, mut rows: Vec<EmbeddingRow>, expected: usize, dim: usize) -> Result<Vec<Vec<f32>>> {
    if rows.len() != expected {
        return Err(Error::provider(
            provider,
            format!("expected {expected} embeddings, received {}", rows.len()),
        ));
    }
    rows.sort_by_key(|r| r.index);
    if rows.iter().enumerate().any(|(i, r)| r.index != i) {
        return Err(Error::provider(provider, "embedding indices do not match inputs"));
    }
    let mut out = Vec::with_capacity(rows.len());
    for row in rows {
        if row.embedding.len() != dim {
            return Err(Error::DimensionMismatch { expected: dim, actual: row.embedding.len() });
        }
        out.push(row.embedding);
    }
    Ok(out)
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    fn embedder_id(&self) -> &str {
        &self.id
    }

    fn dim(&self) -> usize {
        self.dim
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut vectors = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.batch_size) {
            let inputs = batch.iter().map(|t| self.prepare(t)).collect::<Result<Vec<_>>>()?;
            let embedded = self.request(&inputs).await?;
            debug!(embedder = %self.id, batch = inputs.len(), "embedded batch");
            vectors.extend(embedded);
        }
        Ok(vectors)
    }
}

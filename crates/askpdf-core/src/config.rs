//! Configuration loader, typed settings and path helpers.
//!
//! Uses Figment to merge `config.toml` + `config.<env>.toml` + `APP_*` env vars
//! (`__` separates nested keys, e.g. `APP_INDEX__PATH`). Every setting has a
//! default, so an empty configuration is valid.

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Identifier of the built-in byte-level tokenizer.
pub const BYTE_LEVEL_TOKENIZER: &str = "byte-level";
/// Identifier of the built-in `cl100k_base` BPE used by OpenAI embedding models.
pub const CL100K_TOKENIZER: &str = "cl100k_base";
/// Smallest window that always fits one UTF-8 character (at most 4 bytes,
/// so at most 4 byte-level or BPE tokens).
pub const MIN_WINDOW_TOKENS: usize = 4;

pub struct Config {
    figment: Figment,
}

impl Config {
    pub fn load() -> Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());

        let mut figment = Figment::new().merge(Toml::file("config.toml"));
        match env_name.as_str() {
            "dev" | "development" => figment = figment.merge(Toml::file("config.dev.toml")),
            "prod" | "production" => figment = figment.merge(Toml::file("config.prod.toml")),
            "test" | "testing" => figment = figment.merge(Toml::file("config.test.toml")),
            _ => {}
        }
        figment = figment.merge(Env::prefixed("APP_").split("__"));

        Ok(Self { figment })
    }

    pub fn from_figment(figment: Figment) -> Self {
        Self { figment }
    }

    pub fn get<T>(&self, key: &str) -> Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        self.figment
            .extract_inner(key)
            .map_err(|e| Error::InvalidConfig(format!("Failed to get '{key}': {e}")))
    }

    /// Extract and validate the full typed settings tree.
    pub fn settings(&self) -> Result<Settings> {
        let settings: Settings = self
            .figment
            .extract()
            .map_err(|e| Error::InvalidConfig(e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Tokenizer shared by the chunker and the embedding client:
    /// `cl100k_base`, `byte-level` or a path to a Hugging Face
    /// `tokenizer.json`. Unset means the embedding provider's own tokenizer.
    pub tokenizer_id: Option<String>,
    pub chunking: ChunkingSettings,
    pub embedding: EmbeddingSettings,
    pub completion: CompletionSettings,
    pub index: IndexSettings,
    pub query: QuerySettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            tokenizer_id: None,
            chunking: ChunkingSettings::default(),
            embedding: EmbeddingSettings::default(),
            completion: CompletionSettings::default(),
            index: IndexSettings::default(),
            query: QuerySettings::default(),
        }
    }
}

impl Settings {
    /// The configured tokenizer, or the one matching the embedding provider:
    /// `cl100k_base` for OpenAI models, `byte-level` for the hash embedder.
    pub fn tokenizer_id(&self) -> &str {
        match (&self.tokenizer_id, self.embedding.provider) {
            (Some(id), _) => id.as_str(),
            (None, EmbeddingProviderKind::OpenAi) => CL100K_TOKENIZER,
            (None, EmbeddingProviderKind::Hash) => BYTE_LEVEL_TOKENIZER,
        }
    }

    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| Err(Error::InvalidConfig(msg));
        if self.tokenizer_id().trim().is_empty() {
            return invalid("tokenizer_id must not be empty".into());
        }
        if self.chunking.max_tokens < MIN_WINDOW_TOKENS {
            return invalid(format!("chunking.max_tokens must be at least {MIN_WINDOW_TOKENS}"));
        }
        if self.chunking.overlap_tokens >= self.chunking.max_tokens {
            return invalid(format!(
                "chunking.overlap_tokens ({}) must be smaller than chunking.max_tokens ({})",
                self.chunking.overlap_tokens, self.chunking.max_tokens
            ));
        }
        if self.embedding.dim == 0 {
            return invalid("embedding.dim must be > 0".into());
        }
        if self.embedding.batch_size == 0 {
            return invalid("embedding.batch_size must be > 0".into());
        }
        if self.embedding.timeout_secs == 0 || self.completion.timeout_secs == 0 {
            return invalid("provider timeouts must be > 0 seconds".into());
        }
        if self.query.top_k == 0 {
            return invalid("query.top_k must be > 0".into());
        }
        if self.index.table.trim().is_empty() {
            return invalid("index.table must not be empty".into());
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingSettings {
    pub max_tokens: usize,
    pub overlap_tokens: usize,
}

impl Default for ChunkingSettings {
    fn default() -> Self {
        Self { max_tokens: 500, overlap_tokens: 50 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProviderKind {
    #[serde(rename = "openai")]
    OpenAi,
    Hash,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingSettings {
    pub provider: EmbeddingProviderKind,
    pub model: String,
    pub base_url: String,
    pub api_key: Option<String>,
    pub api_key_env: String,
    /// Vector dimensionality D; fixed per index.
    pub dim: usize,
    pub batch_size: usize,
    pub max_input_tokens: usize,
    pub timeout_secs: u64,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            provider: EmbeddingProviderKind::OpenAi,
            model: "text-embedding-ada-002".to_string(),
            base_url: "https://api.openai.com/v1".to_string(),
            api_key: None,
            api_key_env: "OPENAI_API_KEY".to_string(),
            dim: 1536,
            batch_size: 64,
            max_input_tokens: 8191,
            timeout_secs: 30,
        }
    }
}

impl EmbeddingSettings {
    pub fn resolve_api_key(&self) -> Option<String> {
        lookup_api_key(self.api_key.as_deref(), &self.api_key_env)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompletionProviderKind {
    #[serde(rename = "openai")]
    OpenAi,
    Extractive,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CompletionSettings {
    pub provider: CompletionProviderKind,
    pub model: String,
    pub base_url: String,
    pub api_key: Option<String>,
    pub api_key_env: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub system_prompt: String,
    pub timeout_secs: u64,
}

pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful assistant answering questions about a document. \
Answer only from the provided document context. If the context does not contain the answer, say that you don't know.";

impl Default for CompletionSettings {
    fn default() -> Self {
        Self {
            provider: CompletionProviderKind::OpenAi,
            model: "gpt-3.5-turbo".to_string(),
            base_url: "https://api.openai.com/v1".to_string(),
            api_key: None,
            api_key_env: "OPENAI_API_KEY".to_string(),
            temperature: 0.7,
            max_tokens: 500,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            timeout_secs: 60,
        }
    }
}

impl CompletionSettings {
    pub fn resolve_api_key(&self) -> Option<String> {
        lookup_api_key(self.api_key.as_deref(), &self.api_key_env)
    }
}

/// Distance metric used for both ANN index build and queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DistanceMetric {
    #[default]
    Cosine,
    L2,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexSettings {
    pub path: String,
    pub table: String,
    pub metric: DistanceMetric,
}

impl Default for IndexSettings {
    fn default() -> Self {
        Self {
            path: "data/lancedb".to_string(),
            table: "document_embeddings".to_string(),
            metric: DistanceMetric::Cosine,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QuerySettings {
    pub top_k: usize,
}

impl Default for QuerySettings {
    fn default() -> Self {
        Self { top_k: 5 }
    }
}

fn lookup_api_key(explicit: Option<&str>, env_name: &str) -> Option<String> {
    explicit
        .map(str::to_string)
        .or_else(|| env::var(env_name).ok())
        .filter(|k| !k.trim().is_empty())
}

/// Expand a user-provided path string:
/// - Expands leading '~' to the user's home directory
/// - Expands ${VAR} and $VAR environment variables
/// - Returns a PathBuf without attempting to canonicalize
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let s = input.as_ref();
    let expanded_env = shellexpand::env(s).unwrap_or(std::borrow::Cow::Borrowed(s));
    let expanded = shellexpand::tilde(&expanded_env);
    PathBuf::from(expanded.as_ref())
}

/// Resolve a possibly relative path against a given base directory after expansion.
/// If `p` is absolute, it's returned as-is; otherwise `base.join(p)` is returned.
pub fn resolve_with_base<S: AsRef<str>>(base: &Path, p: S) -> PathBuf {
    let p = expand_path(p);
    if p.is_absolute() { p } else { base.join(p) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let settings = Settings::default();
        settings.validate().expect("defaults validate");
        assert_eq!(settings.chunking.max_tokens, 500);
        assert_eq!(settings.chunking.overlap_tokens, 50);
        assert_eq!(settings.query.top_k, 5);
        assert_eq!(settings.index.metric, DistanceMetric::Cosine);
    }

    #[test]
    fn tokenizer_follows_the_embedding_provider() {
        let mut settings = Settings::default();
        assert_eq!(settings.tokenizer_id(), CL100K_TOKENIZER);
        settings.embedding.provider = EmbeddingProviderKind::Hash;
        assert_eq!(settings.tokenizer_id(), BYTE_LEVEL_TOKENIZER);
        settings.tokenizer_id = Some("models/bge/tokenizer.json".to_string());
        assert_eq!(settings.tokenizer_id(), "models/bge/tokenizer.json");
    }

    #[test]
    fn tiny_windows_are_rejected() {
        let mut settings = Settings::default();
        settings.chunking.max_tokens = 3;
        settings.chunking.overlap_tokens = 0;
        assert!(matches!(settings.validate(), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn overlap_must_be_smaller_than_window() {
        let mut settings = Settings::default();
        settings.chunking.overlap_tokens = settings.chunking.max_tokens;
        assert!(matches!(settings.validate(), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn resolve_with_base_keeps_absolute_paths() {
        let base = Path::new("/srv/askpdf");
        assert_eq!(resolve_with_base(base, "/var/lib/db"), PathBuf::from("/var/lib/db"));
        assert_eq!(resolve_with_base(base, "data/lancedb"), PathBuf::from("/srv/askpdf/data/lancedb"));
    }

    #[test]
    fn explicit_api_key_wins_over_env() {
        let key = lookup_api_key(Some("sk-explicit"), "ASKPDF_TEST_UNSET_KEY_VAR");
        assert_eq!(key.as_deref(), Some("sk-explicit"));
        assert_eq!(lookup_api_key(Some("  "), "ASKPDF_TEST_UNSET_KEY_VAR"), None);
    }
}

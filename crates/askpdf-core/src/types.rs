//! Domain types shared by the chunking, index and retrieval crates.

use serde::{Deserialize, Serialize};

/// A chunk of document text paired with its embedding, ready to be appended.
///
/// The index stores it as `(source_id, text, vector)`; `vector` must have the
/// index's fixed dimensionality.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddedChunk {
    pub text: String,
    pub vector: Vec<f32>,
}

/// One hit from a similarity search. `score` is `1 - distance`, clamped to [0, 1].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub text: String,
    pub score: f32,
}

/// Result of a retrieval-augmented query: the generated answer and the
/// evidence chunks it was generated from, best match first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Answer {
    pub answer: String,
    pub context: Vec<SearchResult>,
}

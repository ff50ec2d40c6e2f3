//! Text handling for ingestion: the shared tokenizer, the token-window
//! chunker and plain-text extraction.

pub mod chunker;
pub mod extract;
pub mod tokenize;

pub use chunker::Chunker;
pub use extract::PlainTextExtractor;
pub use tokenize::TextTokenizer;

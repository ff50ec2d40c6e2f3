//! Tokenizer shared by the chunker and the embedding clients.
//!
//! Chunk boundaries are only meaningful if they match what the embedding model
//! sees, so both sides are built from the same `tokenizer_id`.

use std::str::FromStr;

use serde_json::{json, Map, Value};
use tiktoken_rs::CoreBPE;
use tokenizers::Tokenizer;

use askpdf_core::config::{expand_path, BYTE_LEVEL_TOKENIZER, CL100K_TOKENIZER};
use askpdf_core::{Error, Result};

enum Backend {
    /// Built-in byte-level BPE: token id == byte value.
    ByteLevel(Tokenizer),
    /// OpenAI `cl100k_base` ranks.
    Tiktoken(CoreBPE),
    HuggingFace(Tokenizer),
}

pub struct TextTokenizer {
    id: String,
    backend: Backend,
}

impl std::fmt::Debug for TextTokenizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TextTokenizer").field("id", &self.id).finish()
    }
}

impl TextTokenizer {
    /// `byte-level` and `cl100k_base` select built-in tokenizers; anything
    /// else is a path to a Hugging Face `tokenizer.json` (`~` and `$VAR` are
    /// expanded).
    pub fn from_id(id: &str) -> Result<Self> {
        let backend = match id {
            BYTE_LEVEL_TOKENIZER => Backend::ByteLevel(
                Tokenizer::from_str(&byte_level_spec().to_string())
                    .map_err(|e| Error::Tokenizer(format!("Failed to build byte-level tokenizer: {e}")))?,
            ),
            CL100K_TOKENIZER => Backend::Tiktoken(
                tiktoken_rs::cl100k_base()
                    .map_err(|e| Error::Tokenizer(format!("Failed to load cl100k_base ranks: {e}")))?,
            ),
            _ => {
                let path = expand_path(id);
                Backend::HuggingFace(
                    Tokenizer::from_file(&path)
                        .map_err(|e| Error::Tokenizer(format!("Failed to load tokenizer from {}: {}", path.display(), e)))?,
                )
            }
        };
        Ok(Self { id: id.to_string(), backend })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Token ids for `text`, without special tokens.
    pub fn encode(&self, text: &str) -> Result<Vec<u32>> {
        if text.is_empty() {
            return Ok(Vec::new());
        }
        match &self.backend {
            Backend::ByteLevel(inner) | Backend::HuggingFace(inner) => {
                let enc = inner
                    .encode(text, false)
                    .map_err(|e| Error::Tokenizer(format!("Tokenization failed: {e}")))?;
                Ok(enc.get_ids().to_vec())
            }
            Backend::Tiktoken(bpe) => Ok(bpe.encode_ordinary(text).into_iter().map(|t| t as u32).collect()),
        }
    }

    /// Decode `ids`. Partial characters at either edge are dropped.
    pub fn decode(&self, ids: &[u32]) -> Result<String> {
        // a character spans at most 4 tokens, so at most 3 dangle at an edge
        let len = ids.len();
        for skip_front in 0..=len.min(3) {
            for skip_back in 0..=(len - skip_front).min(3) {
                if let Some(text) = self.decode_exact(&ids[skip_front..len - skip_back])? {
                    return Ok(text);
                }
            }
        }
        Err(Error::Tokenizer(format!("{} tokens do not decode to UTF-8 text", ids.len())))
    }

    /// Decode `ids` only if they cover whole characters; `None` when the
    /// sequence starts or ends inside a multi-byte character.
    pub fn decode_exact(&self, ids: &[u32]) -> Result<Option<String>> {
        match &self.backend {
            Backend::ByteLevel(_) => {
                let bytes = ids
                    .iter()
                    .map(|&id| u8::try_from(id).map_err(|_| Error::Tokenizer(format!("byte-level id {id} out of range"))))
                    .collect::<Result<Vec<u8>>>()?;
                Ok(String::from_utf8(bytes).ok())
            }
            Backend::Tiktoken(bpe) => Ok(bpe.decode(ids.iter().map(|&id| id as _).collect()).ok()),
            Backend::HuggingFace(inner) => inner
                .decode(ids, false)
                .map(Some)
                .map_err(|e| Error::Tokenizer(format!("Decoding failed: {e}"))),
        }
    }

    pub fn count(&self, text: &str) -> Result<usize> {
        Ok(self.encode(text)?.len())
    }

    /// Cut `text` down to at most `max_tokens` tokens, never inside a
    /// character. Returns the input unchanged when it already fits.
    pub fn truncate(&self, text: &str, max_tokens: usize) -> Result<String> {
        let ids = self.encode(text)?;
        if ids.len() <= max_tokens {
            return Ok(text.to_string());
        }
        let mut end = max_tokens;
        while end > 0 {
            if let Some(prefix) = self.decode_exact(&ids[..end])? {
                return Ok(prefix);
            }
            end -= 1;
        }
        Ok(String::new())
    }
}

/// GPT-2 byte-to-unicode alphabet: printable bytes map to themselves, the rest
/// are shifted above U+00FF so every byte has a visible, distinct symbol.
fn byte_alphabet() -> Vec<char> {
    let printable: Vec<u32> = (u32::from(b'!')..=u32::from(b'~'))
        .chain(0xA1..=0xAC)
        .chain(0xAE..=0xFF)
        .collect();
    let mut shifted = 0u32;
    (0u32..256)
        .map(|b| {
            let code = if printable.contains(&b) {
                b
            } else {
                shifted += 1;
                255 + shifted
            };
            char::from_u32(code).unwrap_or(char::REPLACEMENT_CHARACTER)
        })
        .collect()
}

/// Serialized `tokenizer.json` for a byte-level BPE without merges: one token
/// per UTF-8 byte, lossless on full sequences.
pub(crate) fn byte_level_spec() -> Value {
    let vocab: Map<String, Value> = byte_alphabet()
        .into_iter()
        .enumerate()
        .map(|(byte, symbol)| (symbol.to_string(), json!(byte)))
        .collect();
    let byte_level = json!({
        "type": "ByteLevel",
        "add_prefix_space": false,
        "trim_offsets": false,
        "use_regex": true
    });
    json!({
        "version": "1.0",
        "truncation": null,
        "padding": null,
        "added_tokens": [],
        "normalizer": null,
        "pre_tokenizer": byte_level.clone(),
        "post_processor": null,
        "decoder": byte_level,
        "model": {
            "type": "BPE",
            "dropout": null,
            "unk_token": null,
            "continuing_subword_prefix": null,
            "end_of_word_suffix": null,
            "fuse_unk": false,
            "byte_fallback": false,
            "vocab": vocab,
            "merges": []
        }
    })
}

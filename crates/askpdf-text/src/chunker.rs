use std::ops::Range;
use std::sync::Arc;

use tracing::debug;

use askpdf_core::config::{ChunkingSettings, MIN_WINDOW_TOKENS};
use askpdf_core::{Error, Result};

use crate::tokenize::TextTokenizer;

/// Splits document text into overlapping, token-bounded windows.
///
/// A window holds at most `max_tokens` tokens and re-reads up to
/// `overlap_tokens` tokens of its predecessor. Window edges are moved to the
/// nearest character boundary, so a multi-byte character is never split
/// between two chunks; near such a character the overlap can be a few tokens
/// shorter.
#[derive(Debug, Clone)]
pub struct Chunker {
    tokenizer: Arc<TextTokenizer>,
    max_tokens: usize,
    overlap_tokens: usize,
}

impl Chunker {
    pub fn new(tokenizer: Arc<TextTokenizer>, max_tokens: usize, overlap_tokens: usize) -> Result<Self> {
        if max_tokens < MIN_WINDOW_TOKENS {
            return Err(Error::InvalidInput(format!(
                "max_tokens must be at least {MIN_WINDOW_TOKENS}, got {max_tokens}"
            )));
        }
        if overlap_tokens >= max_tokens {
            return Err(Error::InvalidInput(format!(
                "overlap_tokens ({overlap_tokens}) must be smaller than max_tokens ({max_tokens})"
            )));
        }
        Ok(Self { tokenizer, max_tokens, overlap_tokens })
    }

    pub fn from_settings(tokenizer: Arc<TextTokenizer>, settings: &ChunkingSettings) -> Result<Self> {
        Self::new(tokenizer, settings.max_tokens, settings.overlap_tokens)
    }

    pub fn max_tokens(&self) -> usize {
        self.max_tokens
    }

    pub fn overlap_tokens(&self) -> usize {
        self.overlap_tokens
    }

    /// Ordered chunks of `text`. Text that fits in one window comes back
    /// verbatim as a single chunk; empty text yields no chunks.
    pub fn chunk(&self, text: &str) -> Result<Vec<String>> {
        if text.is_empty() {
            return Ok(Vec::new());
        }
        let ids = self.tokenizer.encode(text)?;
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        if ids.len() <= self.max_tokens {
            return Ok(vec![text.to_string()]);
        }
        let chunks: Vec<String> = self
            .cut_windows(&ids)?
            .into_iter()
            .map(|(_, piece)| piece)
            .filter(|piece| !piece.is_empty())
            .collect();
        debug!(tokens = ids.len(), chunks = chunks.len(), tokenizer = self.tokenizer.id(), "chunked text");
        Ok(chunks)
    }

    /// Token ranges `chunk` would decode, in order.
    pub fn token_windows(&self, text: &str) -> Result<Vec<Range<usize>>> {
        let ids = self.tokenizer.encode(text)?;
        Ok(self.cut_windows(&ids)?.into_iter().map(|(range, _)| range).collect())
    }

    /// Windows over `ids` with their decoded text. Each window starts and ends
    /// on a character boundary, starts after its predecessor's start and no
    /// later than its end, and the last one ends at `ids.len()`.
    fn cut_windows(&self, ids: &[u32]) -> Result<Vec<(Range<usize>, String)>> {
        let len = ids.len();
        let mut windows = Vec::new();
        let mut start = 0;
        while start < len {
            let limit = (start + self.max_tokens).min(len);
            let (end, piece) = match self.last_boundary(ids, start, limit)? {
                Some(found) => found,
                // BPE tokens can straddle characters for a whole run; only then
                // does a window grow past `max_tokens`, up to the next boundary.
                None => self.next_boundary(ids, start, limit)?,
            };
            windows.push((start..end, piece));
            if end == len {
                break;
            }
            let mut next = end.saturating_sub(self.overlap_tokens).max(start + 1);
            while next < end && self.tokenizer.decode_exact(&ids[next..end])?.is_none() {
                next += 1;
            }
            start = next;
        }
        Ok(windows)
    }

    fn last_boundary(&self, ids: &[u32], start: usize, limit: usize) -> Result<Option<(usize, String)>> {
        for end in (start + 1..=limit).rev() {
            if let Some(piece) = self.tokenizer.decode_exact(&ids[start..end])? {
                return Ok(Some((end, piece)));
            }
        }
        Ok(None)
    }

    fn next_boundary(&self, ids: &[u32], start: usize, limit: usize) -> Result<(usize, String)> {
        for end in limit + 1..=ids.len() {
            if let Some(piece) = self.tokenizer.decode_exact(&ids[start..end])? {
                return Ok((end, piece));
            }
        }
        Err(Error::Tokenizer(format!("tokens from {start} do not decode to UTF-8 text")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use askpdf_core::config::BYTE_LEVEL_TOKENIZER;

    fn byte_chunker(max: usize, overlap: usize) -> Chunker {
        let tok = Arc::new(TextTokenizer::from_id(BYTE_LEVEL_TOKENIZER).expect("tokenizer"));
        Chunker::new(tok, max, overlap).expect("chunker")
    }

    #[test]
    fn ascii_windows_advance_by_the_stride() {
        let chunker = byte_chunker(4, 1);
        assert_eq!(chunker.token_windows("abcdefghij").expect("windows"), vec![0..4, 3..7, 6..10]);
        assert_eq!(chunker.token_windows("abcdefghijk").expect("windows"), vec![0..4, 3..7, 6..10, 9..11]);
        assert_eq!(chunker.token_windows("abcd").expect("windows"), vec![0..4]);
        assert!(chunker.token_windows("").expect("windows").is_empty());
    }

    #[test]
    fn new_tokens_reconstruct_the_sequence() {
        let texts = ["plain ascii text for windows", "Grüße aus München, schöne Größe über Äpfel.", "日本語のテキスト🚀とemoji🎉"];
        for text in texts {
            for max in 4..12 {
                for overlap in 0..max {
                    let chunker = byte_chunker(max, overlap);
                    let ids = chunker.tokenizer.encode(text).expect("encode");
                    let windows = chunker.token_windows(text).expect("windows");
                    let mut rebuilt: Vec<u32> = Vec::new();
                    let mut covered = 0;
                    for w in &windows {
                        assert!(!w.is_empty() && w.len() <= max, "{w:?} max={max}");
                        assert!(w.start <= covered, "gap before {w:?}");
                        rebuilt.extend_from_slice(&ids[covered.max(w.start)..w.end]);
                        covered = w.end;
                    }
                    assert_eq!(rebuilt, ids, "text={text:?} max={max} overlap={overlap}");
                }
            }
        }
    }

    #[test]
    fn rejects_non_advancing_windows() {
        let tok = Arc::new(TextTokenizer::from_id(BYTE_LEVEL_TOKENIZER).expect("tokenizer"));
        assert!(matches!(Chunker::new(tok.clone(), 10, 10), Err(Error::InvalidInput(_))));
        assert!(matches!(Chunker::new(tok.clone(), 10, 11), Err(Error::InvalidInput(_))));
        assert!(matches!(Chunker::new(tok.clone(), 3, 0), Err(Error::InvalidInput(_))));
        assert!(matches!(Chunker::new(tok, 0, 0), Err(Error::InvalidInput(_))));
    }

    #[test]
    fn empty_text_has_no_chunks() {
        assert!(byte_chunker(8, 2).chunk("").expect("chunk").is_empty());
    }

    #[test]
    fn short_text_is_a_single_identical_chunk() {
        let chunker = byte_chunker(500, 50);
        let text = "The cat sat on the mat.";
        assert_eq!(chunker.chunk(text).expect("chunk"), vec![text.to_string()]);
    }

    #[test]
    fn long_text_is_split_into_overlapping_chunks() {
        let chunker = byte_chunker(10, 4);
        let text = "abcdefghijklmnopqrstuvwxyz";
        let chunks = chunker.chunk(text).expect("chunk");
        assert_eq!(chunks, vec!["abcdefghij", "ghijklmnop", "mnopqrstuv", "stuvwxyz"]);
    }

    #[test]
    fn multibyte_characters_are_never_split() {
        // 'ü' and 'ß' are two bytes each; windows snap to their edges
        let chunker = byte_chunker(4, 2);
        let chunks = chunker.chunk("Grüße").expect("chunk");
        assert!(chunks.iter().all(|c| !c.contains('\u{FFFD}')), "{chunks:?}");
        assert_eq!(chunks, vec!["Grü", "üß", "ße"]);
    }
}

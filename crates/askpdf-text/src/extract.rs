use std::fs;
use std::path::Path;

use askpdf_core::traits::TextExtractor;
use askpdf_core::Result;

/// Reads text that was already extracted from a PDF (or any plain-text file).
/// Invalid UTF-8 is replaced rather than rejected.
#[derive(Debug, Default, Clone, Copy)]
pub struct PlainTextExtractor;

impl TextExtractor for PlainTextExtractor {
    fn extract_text(&self, path: &Path) -> Result<String> {
        match fs::read_to_string(path) {
            Ok(content) => Ok(content),
            Err(e) if e.kind() == std::io::ErrorKind::InvalidData => {
                Ok(String::from_utf8_lossy(&fs::read(path)?).to_string())
            }
            Err(e) => Err(e.into()),
        }
    }
}

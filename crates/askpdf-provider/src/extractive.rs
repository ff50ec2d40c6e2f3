use std::collections::HashSet;

use async_trait::async_trait;

use askpdf_core::traits::Completer;
use askpdf_core::Result;

pub const NOT_FOUND_ANSWER: &str = "I don't know based on the provided document.";

/// Offline completer: answers with the context sentence that shares the most
/// words (longer than two characters) with the question.
#[derive(Debug, Default, Clone, Copy)]
pub struct ExtractiveCompleter;

impl ExtractiveCompleter {
    pub fn best_sentence<'a>(&self, context: &'a str, question: &str) -> Option<&'a str> {
        let wanted = keywords(question);
        let mut best: Option<(&str, usize)> = None;
        for sentence in sentences(context) {
            let overlap = keywords(sentence).intersection(&wanted).count();
            if overlap > 0 && best.map_or(true, |(_, score)| overlap > score) {
                best = Some((sentence, overlap));
            }
        }
        best.map(|(s, _)| s)
    }
}

fn keywords(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.chars().count() > 2)
        .map(str::to_lowercase)
        .collect()
}

fn sentences(text: &str) -> impl Iterator<Item = &str> {
    text.split_inclusive(['.', '!', '?', '\n'])
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

#[async_trait]
impl Completer for ExtractiveCompleter {
    fn completer_id(&self) -> &str {
        "extractive"
    }

    async fn complete(&self, context: &str, question: &str) -> Result<String> {
        Ok(self
            .best_sentence(context, question)
            .unwrap_or(NOT_FOUND_ANSWER)
            .to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn picks_the_sentence_sharing_most_words() {
        let context = "The cat sat on the mat. The treasure is buried under the old oak tree.";
        let best = ExtractiveCompleter.best_sentence(context, "Where is the treasure buried?");
        assert_eq!(best, Some("The treasure is buried under the old oak tree."));
    }

    #[test]
    fn unrelated_question_gets_the_fallback() {
        let context = "The cat sat on the mat.";
        assert_eq!(ExtractiveCompleter.best_sentence(context, "Who wrote it?"), None);
    }
}

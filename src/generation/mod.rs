pub mod command;

use crate::lesson::{Level, LevelId};
use itertools::Itertools;
use std::collections::BTreeSet;
use thiserror::Error;

pub use command::CommandGenerator;

/// Substituted when sanitizing a generated text leaves nothing to type.
/// Only uses home-row keys, so it is valid for every built-in level.
pub const FALLBACK_PHRASE: &str = "a sad lad falls";

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("no text generator configured")]
    MissingConfiguration,
    #[error("invalid generation request: {0}")]
    InvalidRequest(String),
    #[error("invalid response from generator: {0}")]
    InvalidResponse(String),
    #[error("generator failed with code {code}")]
    Remote { code: i32 },
    #[error("failed to parse generator output: {0}")]
    ParseFailure(String),
    #[error("generator transport failed: {0}")]
    Transport(#[from] std::io::Error),
    #[error("generator did not finish within {0:?}")]
    TimedOut(std::time::Duration),
}

/// What an external generator is asked for.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub allowed: BTreeSet<char>,
    pub level_id: LevelId,
    pub level_name: String,
    pub description: String,
    pub examples: Vec<String>,
}

impl GenerationRequest {
    pub fn for_level(level: &Level) -> Self {
        Self {
            allowed: level.allowed_keys().clone(),
            level_id: level.id(),
            level_name: level.name().to_string(),
            description: level.description().to_string(),
            examples: level.examples().iter().take(2).cloned().collect(),
        }
    }

    /// Natural-language instruction handed to the generator.
    pub fn prompt(&self) -> String {
        let allowed: String = self.allowed.iter().collect();
        let examples = self
            .examples
            .iter()
            .map(|example| format!("- \"{example}\""))
            .join("\n");

        format!(
            "Generate a short typing exercise (8-15 words) using ONLY these characters: {allowed}\n\
             \n\
             Rules:\n\
             - Use ONLY lowercase letters from the allowed set\n\
             - Spaces are allowed\n\
             - Prefer real, meaningful English words and phrases\n\
             - No punctuation unless it is in the allowed characters\n\
             - This is for Level {}: {} ({})\n\
             \n\
             Examples of good exercises for this level:\n\
             {examples}\n\
             \n\
             Return ONLY the exercise text. No quotes, no explanation.",
            self.level_id, self.level_name, self.description
        )
    }
}

/// External text-generation collaborator: text in, text or failure out.
pub trait TextGenerator: Send + Sync {
    fn generate(&self, request: &GenerationRequest) -> Result<String, GenerationError>;
}

impl<F> TextGenerator for F
where
    F: Fn(&GenerationRequest) -> Result<String, GenerationError> + Send + Sync,
{
    fn generate(&self, request: &GenerationRequest) -> Result<String, GenerationError> {
        self(request)
    }
}

/// Forces `text` into the allowed character set.
///
/// The text is lower-cased, every character outside `allowed` and space is dropped,
/// whitespace runs collapse to a single space and the ends are trimmed. An empty result
/// becomes [`FALLBACK_PHRASE`].
pub fn sanitize(text: &str, allowed: &BTreeSet<char>) -> String {
    let filtered: String = text
        .chars()
        .flat_map(char::to_lowercase)
        .map(|c| if c.is_whitespace() { ' ' } else { c })
        .filter(|c| *c == ' ' || allowed.contains(c))
        .collect();

    let cleaned = filtered.split_whitespace().join(" ");

    if cleaned.is_empty() {
        FALLBACK_PHRASE.to_string()
    } else {
        cleaned
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lesson::catalog;

    fn allowed(keys: &str) -> BTreeSet<char> {
        keys.chars().collect()
    }

    #[test]
    fn test_sanitize_drops_disallowed_characters() {
        assert_eq!(sanitize("Ask! 123", &allowed("asdf jkl;")), "ask");
    }

    #[test]
    fn test_sanitize_collapses_whitespace() {
        assert_eq!(
            sanitize("  sad\t\tlad \n falls  ", &allowed("asdf jkl;")),
            "sad lad falls"
        );
    }

    #[test]
    fn test_sanitize_collapses_gaps_left_by_dropped_words() {
        assert_eq!(
            sanitize("dad owns a flask", &allowed("asdf jkl;")),
            "dad s a flask"
        );
    }

    #[test]
    fn test_sanitize_lowercases() {
        assert_eq!(sanitize("DAD", &allowed("asdf jkl;")), "dad");
    }

    #[test]
    fn test_sanitize_empty_result_uses_fallback() {
        assert_eq!(sanitize("123 !!! ???", &allowed("asdf jkl;")), FALLBACK_PHRASE);
        assert_eq!(sanitize("", &allowed("asdf jkl;")), FALLBACK_PHRASE);
        assert_eq!(sanitize("   ", &allowed("asdf jkl;")), FALLBACK_PHRASE);
    }

    #[test]
    fn test_sanitize_keeps_space_even_when_not_allowed() {
        assert_eq!(sanitize("ab ba", &allowed("ab")), "ab ba");
    }

    #[test]
    fn test_sanitized_output_only_uses_allowed_characters() {
        let inputs = [
            "The Quick Brown Fox; jumps!",
            "Über naïve café 42",
            "path/to/file.txt = [0]",
            "\u{1F600} emoji \u{1F600}",
        ];
        for level in catalog().levels() {
            for input in inputs {
                let out = sanitize(input, level.allowed_keys());
                assert!(
                    out == FALLBACK_PHRASE
                        || out.chars().all(|c| c == ' ' || level.allows(c)),
                    "level {} produced {:?}",
                    level.id(),
                    out
                );
                assert!(!out.starts_with(' ') && !out.ends_with(' '));
                assert!(!out.contains("  "));
            }
        }
    }

    #[test]
    fn test_fallback_phrase_valid_for_every_level() {
        for level in catalog().levels() {
            assert!(FALLBACK_PHRASE.chars().all(|c| level.allows(c)));
        }
    }

    #[test]
    fn test_request_for_level() {
        let level = catalog().level(1);
        let request = GenerationRequest::for_level(level);

        assert_eq!(request.level_id, 1);
        assert_eq!(request.level_name, "Home Row");
        assert_eq!(request.allowed, *level.allowed_keys());
        assert_eq!(request.examples.len(), 2);
    }

    #[test]
    fn test_prompt_mentions_constraint_and_level() {
        let request = GenerationRequest::for_level(catalog().level(1));
        let prompt = request.prompt();

        assert!(prompt.contains(" ;adfjkls"));
        assert!(prompt.contains("Level 1: Home Row"));
        assert!(prompt.contains("- \"a sad lad falls\""));
    }

    #[test]
    fn test_error_messages() {
        assert_eq!(
            GenerationError::Remote { code: 2 }.to_string(),
            "generator failed with code 2"
        );
        assert_eq!(
            GenerationError::MissingConfiguration.to_string(),
            "no text generator configured"
        );
    }
}

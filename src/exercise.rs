use crate::config::Config;
use crate::generation::{
    sanitize, CommandGenerator, GenerationError, GenerationRequest, TextGenerator,
};
use crate::lesson::{Catalog, LevelId};

/// Produces the next target text for a level.
pub struct ExerciseProvider {
    catalog: &'static Catalog,
    generator: Option<Box<dyn TextGenerator>>,
    practice_words: Option<usize>,
}

impl std::fmt::Debug for ExerciseProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExerciseProvider")
            .field("levels", &self.catalog.level_count())
            .field("has_generator", &self.generator.is_some())
            .field("practice_words", &self.practice_words)
            .finish()
    }
}

impl ExerciseProvider {
    pub fn new(catalog: &'static Catalog) -> Self {
        Self {
            catalog,
            generator: None,
            practice_words: None,
        }
    }

    pub fn from_config(catalog: &'static Catalog, config: &Config) -> Self {
        let provider = Self::new(catalog).with_practice_words(config.practice_words);

        match config.generator_command.as_deref() {
            None => provider,
            Some(parts) => match CommandGenerator::from_command_line(parts) {
                Ok(generator) => provider.with_generator(generator),
                Err(e) => {
                    tracing::warn!(error = %e, "ignoring generator command");
                    provider
                }
            },
        }
    }

    pub fn with_generator(mut self, generator: impl TextGenerator + 'static) -> Self {
        self.generator = Some(Box::new(generator));
        self
    }

    /// When set, built-in exercises are shuffled words from the level's pool instead of
    /// whole example texts.
    pub fn with_practice_words(mut self, practice_words: Option<usize>) -> Self {
        self.practice_words = practice_words.filter(|n| *n > 0);
        self
    }

    pub fn has_generator(&self) -> bool {
        self.generator.is_some()
    }

    pub fn catalog(&self) -> &'static Catalog {
        self.catalog
    }

    /// Never fails: any generation problem falls back to built-in content.
    pub fn next_exercise(&self, level: LevelId, ai_assisted: bool) -> String {
        if !ai_assisted {
            return self.built_in(level);
        }

        match self.generated(level) {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(
                    level = level,
                    error = %e,
                    "exercise generation failed, using built-in text"
                );
                self.built_in(level)
            }
        }
    }

    pub fn built_in(&self, level: LevelId) -> String {
        match self.practice_words {
            Some(words) => self.catalog.practice_text(level, words),
            None => self.catalog.random_example(level).to_string(),
        }
    }

    /// Asks the generator for text and forces it into the level's allowed set.
    pub fn generated(&self, level: LevelId) -> Result<String, GenerationError> {
        let generator = self
            .generator
            .as_ref()
            .ok_or(GenerationError::MissingConfiguration)?;

        let level = self.catalog.level(level);
        let request = GenerationRequest::for_level(level);
        let raw = generator.generate(&request)?;
        let text = sanitize(&raw, level.allowed_keys());

        tracing::debug!(
            level = level.id(),
            raw_len = raw.chars().count(),
            sanitized_len = text.chars().count(),
            "generated exercise"
        );
        Ok(text)
    }
}

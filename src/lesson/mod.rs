use include_dir::{include_dir, Dir};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::Deserialize;
use std::collections::BTreeSet;
use std::sync::OnceLock;
use thiserror::Error;

static LESSON_DIR: Dir = include_dir!("src/lesson/data");
static CATALOG: OnceLock<Catalog> = OnceLock::new();

/// Level identifiers are dense and start at 1.
pub type LevelId = u32;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("unable to deserialize lesson json: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("catalog defines no levels")]
    Empty,
    #[error("level at position {position} has id {found}, expected {expected}")]
    NonDenseId {
        position: usize,
        expected: LevelId,
        found: LevelId,
    },
    #[error("level {0} has an empty allowed-character set")]
    EmptyAllowedSet(LevelId),
    #[error("level {0} has no example texts")]
    NoExamples(LevelId),
    #[error("level {0} has multi-word examples but does not allow space")]
    MissingSpace(LevelId),
    #[error("level {level} example {example:?} uses disallowed character {character:?}")]
    DisallowedCharacter {
        level: LevelId,
        example: String,
        character: char,
    },
}

#[derive(Deserialize)]
struct LessonFile {
    levels: Vec<LevelRecord>,
}

#[derive(Deserialize)]
struct LevelRecord {
    id: LevelId,
    name: String,
    description: String,
    allowed: String,
    examples: Vec<String>,
}

/// A difficulty tier: the keys a learner may use and texts that only use those keys.
#[derive(Debug, Clone, PartialEq)]
pub struct Level {
    id: LevelId,
    name: String,
    description: String,
    allowed: BTreeSet<char>,
    examples: Vec<String>,
}

impl Level {
    pub fn id(&self) -> LevelId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    /// Allowed characters, stored lower-cased.
    pub fn allowed_keys(&self) -> &BTreeSet<char> {
        &self.allowed
    }

    pub fn examples(&self) -> &[String] {
        &self.examples
    }

    /// Case-insensitive membership test against the allowed set.
    pub fn allows(&self, c: char) -> bool {
        c.to_lowercase().all(|lower| self.allowed.contains(&lower))
    }

    fn from_record(record: LevelRecord) -> Result<Self, CatalogError> {
        let allowed: BTreeSet<char> = record.allowed.chars().flat_map(char::to_lowercase).collect();
        let level = Self {
            id: record.id,
            name: record.name,
            description: record.description,
            allowed,
            examples: record.examples,
        };
        level.validate()?;
        Ok(level)
    }

    fn validate(&self) -> Result<(), CatalogError> {
        if self.allowed.is_empty() {
            return Err(CatalogError::EmptyAllowedSet(self.id));
        }
        if self.examples.is_empty() {
            return Err(CatalogError::NoExamples(self.id));
        }
        for example in &self.examples {
            if example.contains(' ') && !self.allowed.contains(&' ') {
                return Err(CatalogError::MissingSpace(self.id));
            }
            if let Some(character) = example.chars().find(|c| !self.allows(*c)) {
                return Err(CatalogError::DisallowedCharacter {
                    level: self.id,
                    example: example.clone(),
                    character,
                });
            }
        }
        Ok(())
    }
}

/// Ordered, immutable collection of levels.
#[derive(Debug, Clone)]
pub struct Catalog {
    levels: Vec<Level>,
}

impl Catalog {
    pub fn from_json(json: &str) -> Result<Self, CatalogError> {
        let file: LessonFile = serde_json::from_str(json)?;
        if file.levels.is_empty() {
            return Err(CatalogError::Empty);
        }

        let mut levels = Vec::with_capacity(file.levels.len());
        for (position, record) in file.levels.into_iter().enumerate() {
            let expected = position as LevelId + 1;
            if record.id != expected {
                return Err(CatalogError::NonDenseId {
                    position,
                    expected,
                    found: record.id,
                });
            }
            levels.push(Level::from_record(record)?);
        }

        Ok(Self { levels })
    }

    pub fn level_count(&self) -> usize {
        self.levels.len()
    }

    pub fn max_level(&self) -> LevelId {
        self.levels.len() as LevelId
    }

    pub fn levels(&self) -> &[Level] {
        &self.levels
    }

    pub fn contains(&self, id: LevelId) -> bool {
        id >= 1 && id <= self.max_level()
    }

    /// Looks up a level; ids outside `1..=max_level` resolve to the first level.
    pub fn level(&self, id: LevelId) -> &Level {
        if self.contains(id) {
            &self.levels[id as usize - 1]
        } else {
            &self.levels[0]
        }
    }

    pub fn random_example(&self, id: LevelId) -> &str {
        self.random_example_with(id, &mut rand::thread_rng())
    }

    pub fn random_example_with<R: Rng + ?Sized>(&self, id: LevelId, rng: &mut R) -> &str {
        let level = self.level(id);
        level
            .examples
            .choose(rng)
            .map(String::as_str)
            .unwrap_or_default()
    }

    /// Builds a text of `word_count` words drawn at random from the level's example pool.
    pub fn practice_text(&self, id: LevelId, word_count: usize) -> String {
        self.practice_text_with(id, word_count, &mut rand::thread_rng())
    }

    pub fn practice_text_with<R: Rng + ?Sized>(
        &self,
        id: LevelId,
        word_count: usize,
        rng: &mut R,
    ) -> String {
        let level = self.level(id);
        let words: Vec<&str> = level
            .examples
            .iter()
            .flat_map(|example| example.split_whitespace())
            .collect();

        let mut picked = Vec::with_capacity(word_count);
        for _ in 0..word_count {
            if let Some(word) = words.choose(rng) {
                picked.push(*word);
            }
        }

        // a level without space can only ever produce a single word
        if level.allows(' ') {
            picked.join(" ")
        } else {
            picked.first().map(|w| w.to_string()).unwrap_or_default()
        }
    }
}

/// The built-in catalog, parsed once on first use and never mutated afterwards.
pub fn catalog() -> &'static Catalog {
    CATALOG.get_or_init(|| {
        let file = LESSON_DIR
            .get_file("lessons.json")
            .expect("Lesson file not found");

        let file_as_str = file
            .contents_utf8()
            .expect("Unable to interpret lesson file as a string");

        Catalog::from_json(file_as_str).expect("Built-in lesson catalog is invalid")
    })
}

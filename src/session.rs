use crate::lesson::LevelId;
use crate::util::format_elapsed;
use std::time::{Duration, SystemTime};

/// Standard word length used for speed calculations.
pub const CHARS_PER_WORD: f64 = 5.0;

#[derive(Clone, Debug, Copy, PartialEq, Eq)]
pub enum Outcome {
    Correct,
    Incorrect,
}

/// One consumed keystroke.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CharacterOutcome {
    pub char: char,
    pub outcome: Outcome,
    pub timestamp: SystemTime,
}

impl CharacterOutcome {
    pub fn is_correct(&self) -> bool {
        self.outcome == Outcome::Correct
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    NotStarted,
    InProgress,
    Complete,
}

/// Classification of a target character for display.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CharState {
    Pending,
    Current,
    Correct,
    Incorrect,
}

/// Read-only view of a session for rendering layers.
#[derive(Clone, Debug, PartialEq)]
pub struct SessionSnapshot {
    pub level: LevelId,
    pub state: SessionState,
    pub progress: f64,
    pub accuracy: f64,
    pub wpm: f64,
    pub elapsed: Duration,
    pub correct: usize,
    pub incorrect: usize,
    pub chars: Vec<(char, CharState)>,
}

impl SessionSnapshot {
    pub fn is_complete(&self) -> bool {
        self.state == SessionState::Complete
    }
}

/// One exercise: the target text and everything typed against it.
///
/// Incorrect keystrokes are recorded as mismatches but still advance the position, so
/// the typed text and outcome log always have the same length and never exceed the
/// target.
#[derive(Debug, Clone)]
pub struct TypingSession {
    target: Vec<char>,
    typed: String,
    outcomes: Vec<CharacterOutcome>,
    started_at: Option<SystemTime>,
    finished_at: Option<SystemTime>,
    complete: bool,
    level: LevelId,
    revision: u64,
}

impl TypingSession {
    pub fn new(target: impl Into<String>, level: LevelId) -> Self {
        Self {
            target: target.into().chars().collect(),
            typed: String::new(),
            outcomes: Vec::new(),
            started_at: None,
            finished_at: None,
            complete: false,
            level,
            revision: 0,
        }
    }

    pub fn level(&self) -> LevelId {
        self.level
    }

    pub fn target_text(&self) -> String {
        self.target.iter().collect()
    }

    pub fn target_chars(&self) -> &[char] {
        &self.target
    }

    pub fn typed_text(&self) -> &str {
        &self.typed
    }

    pub fn outcomes(&self) -> &[CharacterOutcome] {
        &self.outcomes
    }

    pub fn started_at(&self) -> Option<SystemTime> {
        self.started_at
    }

    pub fn finished_at(&self) -> Option<SystemTime> {
        self.finished_at
    }

    /// Bumped on every mutation so a renderer can poll for changes.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn state(&self) -> SessionState {
        if self.complete {
            SessionState::Complete
        } else if self.started_at.is_some() {
            SessionState::InProgress
        } else {
            SessionState::NotStarted
        }
    }

    pub fn has_started(&self) -> bool {
        self.started_at.is_some()
    }

    pub fn is_complete(&self) -> bool {
        self.complete
    }

    pub fn current_index(&self) -> usize {
        self.outcomes.len()
    }

    /// The next expected character, if any.
    pub fn current_char(&self) -> Option<char> {
        self.target.get(self.current_index()).copied()
    }

    pub fn process_key_press(&mut self, c: char) -> Option<Outcome> {
        self.process_key_press_at(c, SystemTime::now())
    }

    /// Records `c` against the expected character. Returns `None` when the keystroke
    /// was not consumed.
    pub fn process_key_press_at(&mut self, c: char, now: SystemTime) -> Option<Outcome> {
        if self.complete {
            return None;
        }

        if self.started_at.is_none() {
            self.started_at = Some(now);
            self.revision += 1;
        }

        let expected = self.current_char()?;
        let outcome = if c == expected {
            Outcome::Correct
        } else {
            Outcome::Incorrect
        };

        self.outcomes.push(CharacterOutcome {
            char: c,
            outcome,
            timestamp: now,
        });
        self.typed.push(c);

        if self.outcomes.len() == self.target.len() {
            self.complete = true;
            self.finished_at = Some(now);
            tracing::debug!(
                level = self.level,
                accuracy = self.accuracy(),
                wpm = self.wpm_at(now),
                "exercise complete"
            );
        }

        self.revision += 1;
        Some(outcome)
    }

    /// Undoes the last keystroke. Returns whether anything was removed.
    pub fn process_backspace(&mut self) -> bool {
        if self.complete || self.typed.is_empty() {
            return false;
        }

        self.typed.pop();
        self.outcomes.pop();
        self.revision += 1;
        true
    }

    /// Clears progress; target text and level stay.
    pub fn reset(&mut self) {
        self.typed.clear();
        self.outcomes.clear();
        self.started_at = None;
        self.finished_at = None;
        self.complete = false;
        self.revision += 1;
    }

    pub fn new_exercise(&mut self, text: impl Into<String>) {
        self.target = text.into().chars().collect();
        self.reset();
    }

    pub fn progress(&self) -> f64 {
        if self.target.is_empty() {
            return 0.0;
        }
        self.current_index() as f64 / self.target.len() as f64
    }

    pub fn correct_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_correct()).count()
    }

    pub fn incorrect_count(&self) -> usize {
        self.outcomes.len() - self.correct_count()
    }

    /// Percentage of consumed keystrokes that matched.
    pub fn accuracy(&self) -> f64 {
        if self.outcomes.is_empty() {
            return 0.0;
        }
        self.correct_count() as f64 / self.outcomes.len() as f64 * 100.0
    }

    pub fn elapsed(&self) -> Duration {
        self.elapsed_at(SystemTime::now())
    }

    /// Time from the first keystroke until completion, or until `now` while typing.
    pub fn elapsed_at(&self, now: SystemTime) -> Duration {
        match self.started_at {
            None => Duration::ZERO,
            Some(start) => self
                .finished_at
                .unwrap_or(now)
                .duration_since(start)
                .unwrap_or_default(),
        }
    }

    pub fn wpm(&self) -> f64 {
        self.wpm_at(SystemTime::now())
    }

    /// Words per minute from correct characters only.
    pub fn wpm_at(&self, now: SystemTime) -> f64 {
        let secs = self.elapsed_at(now).as_secs_f64();
        if secs == 0.0 {
            return 0.0;
        }
        (self.correct_count() as f64 / CHARS_PER_WORD) / (secs / 60.0)
    }

    pub fn formatted_time(&self) -> String {
        format_elapsed(self.elapsed())
    }

    pub fn char_states(&self) -> Vec<(char, CharState)> {
        let current = self.current_index();
        self.target
            .iter()
            .enumerate()
            .map(|(idx, &c)| {
                let state = match self.outcomes.get(idx) {
                    Some(o) if o.is_correct() => CharState::Correct,
                    Some(_) => CharState::Incorrect,
                    None if idx == current => CharState::Current,
                    None => CharState::Pending,
                };
                (c, state)
            })
            .collect()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.snapshot_at(SystemTime::now())
    }

    pub fn snapshot_at(&self, now: SystemTime) -> SessionSnapshot {
        SessionSnapshot {
            level: self.level,
            state: self.state(),
            progress: self.progress(),
            accuracy: self.accuracy(),
            wpm: self.wpm_at(now),
            elapsed: self.elapsed_at(now),
            correct: self.correct_count(),
            incorrect: self.incorrect_count(),
            chars: self.char_states(),
        }
    }
}

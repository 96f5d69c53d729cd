use crate::exercise::ExerciseProvider;
use crate::keyboard::{finger_for, guidance_text, Finger};
use crate::lesson::{Catalog, Level, LevelId};
use crate::session::{Outcome, SessionSnapshot, TypingSession};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

const DELETE: char = '\u{7f}';
const BACKSPACE: char = '\u{8}';

/// A discrete key event from the input source.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KeyInput {
    Char(char),
    Backspace,
}

impl KeyInput {
    pub fn from_char(c: char) -> Self {
        match c {
            DELETE | BACKSPACE => KeyInput::Backspace,
            c => KeyInput::Char(c),
        }
    }

    /// Interprets the characters of a raw key event; only the first one counts.
    pub fn from_raw(raw: &str) -> Option<Self> {
        raw.chars().next().map(Self::from_char)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InputResult {
    /// Not passed to the session, or the session did not consume it.
    Ignored,
    Recorded(Outcome),
    Erased,
    /// The keystroke finished the exercise.
    LevelComplete,
}

/// Identifies the exercise a generation request was issued for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Epoch(u64);

impl Epoch {
    fn next(self) -> Self {
        Epoch(self.0 + 1)
    }
}

/// Result of a generation request, delivered from a worker thread.
#[derive(Debug, Clone, PartialEq)]
pub struct ExerciseReady {
    pub epoch: Epoch,
    pub level: LevelId,
    pub text: String,
}

/// Owns the current level and session and decides when exercises are replaced.
///
/// Generated exercises arrive asynchronously. Every navigation moves to a new
/// [`Epoch`] and installs a built-in exercise right away; a generated text is only
/// applied if it was requested in the current epoch and typing has not begun.
#[derive(Debug)]
pub struct SessionController {
    provider: Arc<ExerciseProvider>,
    level: LevelId,
    session: TypingSession,
    ai_assisted: bool,
    epoch: Epoch,
    pending: Option<Epoch>,
    level_complete: bool,
    tx: Sender<ExerciseReady>,
    rx: Receiver<ExerciseReady>,
}

impl SessionController {
    /// Starts at `start_level`, or the first level if it is out of range.
    pub fn new(provider: ExerciseProvider, start_level: LevelId, ai_assisted: bool) -> Self {
        let level = provider.catalog().level(start_level).id();
        let session = TypingSession::new(provider.built_in(level), level);
        let (tx, rx) = mpsc::channel();

        let mut controller = Self {
            provider: Arc::new(provider),
            level,
            session,
            ai_assisted,
            epoch: Epoch::default(),
            pending: None,
            level_complete: false,
            tx,
            rx,
        };
        if ai_assisted {
            controller.request_generated();
        }
        controller
    }

    pub fn catalog(&self) -> &'static Catalog {
        self.provider.catalog()
    }

    pub fn level(&self) -> LevelId {
        self.level
    }

    pub fn current_level(&self) -> &'static Level {
        self.catalog().level(self.level)
    }

    pub fn session(&self) -> &TypingSession {
        &self.session
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.session.snapshot()
    }

    pub fn epoch(&self) -> Epoch {
        self.epoch
    }

    pub fn ai_assisted(&self) -> bool {
        self.ai_assisted
    }

    /// Takes effect from the next exercise.
    pub fn set_ai_assisted(&mut self, ai_assisted: bool) {
        self.ai_assisted = ai_assisted;
    }

    /// Whether a generated exercise is still expected for the current epoch.
    pub fn is_loading(&self) -> bool {
        self.pending.is_some()
    }

    /// Set once the current exercise is finished; the level never advances on its own.
    pub fn level_complete(&self) -> bool {
        self.level_complete
    }

    pub fn can_advance(&self) -> bool {
        self.level < self.catalog().max_level()
    }

    pub fn can_go_back(&self) -> bool {
        self.level > 1
    }

    pub fn finger_hint(&self) -> String {
        match self.session.current_char() {
            Some(c) => guidance_text(c),
            None => "Exercise complete!".to_string(),
        }
    }

    pub fn current_finger(&self) -> Option<Finger> {
        self.session.current_char().map(finger_for)
    }

    pub fn handle_raw(&mut self, raw: &str) -> InputResult {
        match KeyInput::from_raw(raw) {
            Some(input) => self.handle_input(input),
            None => InputResult::Ignored,
        }
    }

    /// Routes one key event to the session. Characters outside the level's allowed set
    /// are dropped without being recorded as errors.
    pub fn handle_input(&mut self, input: KeyInput) -> InputResult {
        match input {
            KeyInput::Backspace => {
                if self.session.process_backspace() {
                    InputResult::Erased
                } else {
                    InputResult::Ignored
                }
            }
            KeyInput::Char(c) => {
                if !self.current_level().allows(c) {
                    return InputResult::Ignored;
                }
                let lower = c.to_lowercase().next().unwrap_or(c);
                match self.session.process_key_press(lower) {
                    None => InputResult::Ignored,
                    Some(_) if self.session.is_complete() => {
                        self.level_complete = true;
                        tracing::info!(
                            level = self.level,
                            accuracy = self.session.accuracy(),
                            wpm = self.session.wpm(),
                            "level complete"
                        );
                        InputResult::LevelComplete
                    }
                    Some(outcome) => InputResult::Recorded(outcome),
                }
            }
        }
    }

    /// Retypes the current text. Stays in the current epoch, so a generated exercise
    /// still pending for it can replace the text until typing starts again.
    pub fn restart(&mut self) {
        self.level_complete = false;
        self.session.reset();
    }

    pub fn next_exercise(&mut self) {
        self.load_exercise();
    }

    pub fn next_level(&mut self) -> bool {
        if !self.can_advance() {
            return false;
        }
        self.change_level(self.level + 1);
        true
    }

    pub fn previous_level(&mut self) -> bool {
        if !self.can_go_back() {
            return false;
        }
        self.change_level(self.level - 1);
        true
    }

    /// Ignored entirely when `id` is not a catalog level.
    pub fn select_level(&mut self, id: LevelId) -> bool {
        if !self.catalog().contains(id) {
            return false;
        }
        self.change_level(id);
        true
    }

    /// Applies any generation results that have arrived. Returns whether the session
    /// was replaced.
    pub fn poll_exercises(&mut self) -> bool {
        let mut applied = false;
        while let Ok(ready) = self.rx.try_recv() {
            applied |= self.apply_exercise(ready);
        }
        applied
    }

    /// Blocks until the pending request for the current epoch resolves or `timeout`
    /// passes. Returns whether the session was replaced.
    pub fn wait_for_exercise(&mut self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while self.pending.is_some() {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.rx.recv_timeout(remaining) {
                Ok(ready) => {
                    if self.apply_exercise(ready) {
                        return true;
                    }
                }
                Err(_) => return false,
            }
        }
        false
    }

    /// Installs a generated exercise unless it is stale.
    pub fn apply_exercise(&mut self, ready: ExerciseReady) -> bool {
        if ready.epoch != self.epoch || self.pending != Some(ready.epoch) {
            tracing::debug!(
                epoch = ready.epoch.0,
                current = self.epoch.0,
                "discarding stale exercise"
            );
            return false;
        }
        self.pending = None;

        if self.session.has_started() {
            tracing::debug!(
                level = self.level,
                "typing already started, keeping built-in exercise"
            );
            return false;
        }

        self.install(ready.text);
        true
    }

    fn change_level(&mut self, id: LevelId) {
        self.level = id;
        tracing::info!(
            level = id,
            name = %self.current_level().name(),
            "level selected"
        );
        self.load_exercise();
    }

    fn advance_epoch(&mut self) {
        self.epoch = self.epoch.next();
        self.pending = None;
        self.level_complete = false;
    }

    fn load_exercise(&mut self) {
        self.advance_epoch();
        let text = self.provider.built_in(self.level);
        self.install(text);
        if self.ai_assisted {
            self.request_generated();
        }
    }

    fn install(&mut self, text: String) {
        if self.session.level() == self.level {
            self.session.new_exercise(text);
        } else {
            self.session = TypingSession::new(text, self.level);
        }
    }

    fn request_generated(&mut self) {
        let epoch = self.epoch;
        let level = self.level;
        let provider = Arc::clone(&self.provider);
        let tx = self.tx.clone();
        self.pending = Some(epoch);

        thread::spawn(move || {
            let text = provider.next_exercise(level, true);
            // the controller may be gone already
            let _ = tx.send(ExerciseReady { epoch, level, text });
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generation::{GenerationError, GenerationRequest};
    use crate::lesson::catalog;
    use crate::session::SessionState;

    const WAIT: Duration = Duration::from_secs(5);

    fn controller() -> SessionController {
        SessionController::new(ExerciseProvider::new(catalog()), 1, false)
    }

    fn fixed(text: &'static str) -> SessionController {
        let mut controller = controller();
        controller.session = TypingSession::new(text, controller.level);
        controller
    }

    fn generated_controller(level: LevelId) -> SessionController {
        let provider = ExerciseProvider::new(catalog()).with_generator(
            |request: &GenerationRequest| -> Result<String, GenerationError> {
                Ok(match request.level_id {
                    1 => "Lad, Lass!".to_string(),
                    _ => "wolf".to_string(),
                })
            },
        );
        SessionController::new(provider, level, true)
    }

    #[test]
    fn test_starts_at_requested_level() {
        let controller = SessionController::new(ExerciseProvider::new(catalog()), 3, false);

        assert_eq!(controller.level(), 3);
        assert_eq!(controller.session().level(), 3);
        assert!(!controller.is_loading());
    }

    #[test]
    fn test_out_of_range_start_level_uses_first() {
        let controller = SessionController::new(ExerciseProvider::new(catalog()), 42, false);
        assert_eq!(controller.level(), 1);
    }

    #[test]
    fn test_routes_allowed_characters() {
        let mut controller = fixed("ask");

        assert_eq!(
            controller.handle_input(KeyInput::Char('a')),
            InputResult::Recorded(Outcome::Correct)
        );
        assert_eq!(
            controller.handle_input(KeyInput::Char('d')),
            InputResult::Recorded(Outcome::Incorrect)
        );
        assert_eq!(controller.session().typed_text(), "ad");
    }

    #[test]
    fn test_ignores_characters_outside_level() {
        let mut controller = fixed("ask");

        assert_eq!(controller.handle_input(KeyInput::Char('q')), InputResult::Ignored);
        assert_eq!(controller.handle_input(KeyInput::Char('1')), InputResult::Ignored);
        assert_eq!(controller.handle_input(KeyInput::Char('\n')), InputResult::Ignored);
        assert_eq!(controller.session().typed_text(), "");
        assert_eq!(controller.session().state(), SessionState::NotStarted);
    }

    #[test]
    fn test_uppercase_is_lowered_before_forwarding() {
        let mut controller = fixed("ask");

        controller.handle_input(KeyInput::Char('A'));
        assert_eq!(controller.session().typed_text(), "a");
        assert_eq!(controller.session().correct_count(), 1);
    }

    #[test]
    fn test_backspace_control_codes() {
        let mut controller = fixed("ask");
        controller.handle_raw("a");
        controller.handle_raw("s");

        assert_eq!(controller.handle_raw("\u{7f}"), InputResult::Erased);
        assert_eq!(controller.handle_raw("\u{8}"), InputResult::Erased);
        assert_eq!(controller.handle_raw("\u{8}"), InputResult::Ignored);
        assert_eq!(controller.handle_raw(""), InputResult::Ignored);
    }

    #[test]
    fn test_completion_signals_level_complete_without_advancing() {
        let mut controller = fixed("as");

        controller.handle_input(KeyInput::Char('a'));
        assert!(!controller.level_complete());
        assert_eq!(
            controller.handle_input(KeyInput::Char('s')),
            InputResult::LevelComplete
        );
        assert!(controller.level_complete());
        assert_eq!(controller.level(), 1);

        assert_eq!(controller.handle_input(KeyInput::Char('a')), InputResult::Ignored);
    }

    #[test]
    fn test_restart() {
        let mut controller = fixed("as");
        controller.handle_raw("a");
        controller.handle_raw("s");

        controller.restart();

        assert!(!controller.level_complete());
        assert_eq!(controller.session().target_text(), "as");
        assert_eq!(controller.session().typed_text(), "");
    }

    #[test]
    fn test_next_exercise_replaces_text_for_same_level() {
        let mut controller = controller();
        controller.handle_raw("a");
        let epoch = controller.epoch();

        controller.next_exercise();

        assert!(controller.epoch() > epoch);
        assert_eq!(controller.level(), 1);
        assert_eq!(controller.session().typed_text(), "");
        assert!(catalog()
            .level(1)
            .examples()
            .contains(&controller.session().target_text()));
    }

    #[test]
    fn test_level_navigation_is_clamped() {
        let mut controller = controller();
        let max = catalog().max_level();

        assert!(!controller.previous_level());
        assert_eq!(controller.level(), 1);

        for expected in 2..=max {
            assert!(controller.next_level());
            assert_eq!(controller.level(), expected);
            assert_eq!(controller.session().level(), expected);
        }
        assert!(!controller.next_level());
        assert_eq!(controller.level(), max);

        assert!(controller.previous_level());
        assert_eq!(controller.level(), max - 1);
    }

    #[test]
    fn test_select_level_ignores_out_of_range() {
        let mut controller = controller();
        controller.handle_raw("a");
        let epoch = controller.epoch();

        assert!(!controller.select_level(0));
        assert!(!controller.select_level(999));
        assert_eq!(controller.level(), 1);
        assert_eq!(controller.epoch(), epoch);
        assert_eq!(controller.session().typed_text(), "a");

        assert!(controller.select_level(5));
        assert_eq!(controller.level(), 5);
        assert_eq!(controller.current_level().name(), "Letters + Numbers");
    }

    #[test]
    fn test_finger_hint() {
        let mut controller = fixed("a s");
        assert_eq!(controller.finger_hint(), "Press 'A' with LEFT PINKY finger");
        assert_eq!(controller.current_finger(), Some(Finger::LeftPinky));

        controller.handle_raw("a");
        assert_eq!(controller.finger_hint(), "Press 'SPACE' with THUMBS finger");

        controller.handle_raw(" ");
        controller.handle_raw("s");
        assert_eq!(controller.finger_hint(), "Exercise complete!");
        assert_eq!(controller.current_finger(), None);
    }

    #[test]
    fn test_generated_exercise_is_applied() {
        let mut controller = generated_controller(1);
        assert!(controller.is_loading());

        assert!(controller.wait_for_exercise(WAIT));

        assert!(!controller.is_loading());
        assert_eq!(controller.session().target_text(), "lad lass");
    }

    #[test]
    fn test_result_from_previous_level_is_discarded() {
        let mut controller = generated_controller(1);
        controller.next_level();

        assert!(controller.wait_for_exercise(WAIT));

        assert_eq!(controller.level(), 2);
        assert_eq!(controller.session().target_text(), "wolf");
    }

    #[test]
    fn test_stale_epoch_is_discarded() {
        let mut controller = generated_controller(1);
        let stale = ExerciseReady {
            epoch: controller.epoch(),
            level: 1,
            text: "stale".to_string(),
        };
        controller.next_exercise();
        let before = controller.session().target_text();

        assert!(!controller.apply_exercise(stale));
        assert_eq!(controller.session().target_text(), before);
    }

    #[test]
    fn test_restart_keeps_pending_generation() {
        let mut controller = generated_controller(1);
        let epoch = controller.epoch();
        let ready = ExerciseReady {
            epoch,
            level: 1,
            text: "sad".to_string(),
        };
        controller.restart();

        assert_eq!(controller.epoch(), epoch);
        assert!(controller.is_loading());
        assert!(controller.apply_exercise(ready));
        assert_eq!(controller.session().target_text(), "sad");
    }

    #[test]
    fn test_restart_after_typing_reopens_pending_generation() {
        let mut controller = generated_controller(1);
        let first = controller.session().target_chars()[0].to_string();
        controller.handle_raw(&first);
        controller.restart();

        let ready = ExerciseReady {
            epoch: controller.epoch(),
            level: 1,
            text: "lad".to_string(),
        };
        assert!(controller.apply_exercise(ready));
        assert_eq!(controller.session().target_text(), "lad");
    }

    #[test]
    fn test_result_not_applied_once_typing_started() {
        let mut controller = generated_controller(1);
        let before = controller.session().target_text();
        let first = before.chars().next().unwrap().to_string();
        controller.handle_raw(&first);

        let ready = ExerciseReady {
            epoch: controller.epoch(),
            level: 1,
            text: "sad".to_string(),
        };
        assert!(!controller.apply_exercise(ready));
        assert_eq!(controller.session().target_text(), before);
        assert!(!controller.is_loading());
    }

    #[test]
    fn test_toggle_ai_applies_to_next_exercise() {
        let mut controller = generated_controller(2);
        controller.wait_for_exercise(WAIT);

        controller.set_ai_assisted(false);
        controller.next_exercise();

        assert!(!controller.is_loading());
        assert!(catalog()
            .level(2)
            .examples()
            .contains(&controller.session().target_text()));
    }

    #[cfg(unix)]
    #[test]
    fn test_hung_generator_times_out_and_stops_loading() {
        let generator = crate::generation::CommandGenerator::new(
            "sh",
            vec!["-c".to_string(), "cat >/dev/null; sleep 30".to_string()],
        )
        .with_timeout(Duration::from_millis(200));
        let provider = ExerciseProvider::new(catalog()).with_generator(generator);
        let mut controller = SessionController::new(provider, 1, true);

        controller.wait_for_exercise(WAIT);

        assert!(!controller.is_loading());
        assert!(catalog()
            .level(1)
            .examples()
            .contains(&controller.session().target_text()));
    }

    #[test]
    fn test_failed_generation_still_yields_valid_exercise() {
        let provider = ExerciseProvider::new(catalog()).with_generator(
            |_: &GenerationRequest| -> Result<String, GenerationError> {
                Err(GenerationError::Remote { code: 503 })
            },
        );
        let mut controller = SessionController::new(provider, 1, true);

        controller.wait_for_exercise(WAIT);

        assert!(!controller.is_loading());
        assert!(catalog()
            .level(1)
            .examples()
            .contains(&controller.session().target_text()));
    }
}

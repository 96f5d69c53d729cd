use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use crate::controller::{InputResult, KeyInput, SessionController};
use crate::lesson::LevelId;

/// What the event loop should do after an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Continue,
    Quit,
}

/// Front-end state: the controller plus a one-line notice for the legend.
#[derive(Debug)]
pub struct App {
    controller: SessionController,
    notice: Option<String>,
}

impl App {
    pub fn new(controller: SessionController) -> Self {
        Self {
            controller,
            notice: None,
        }
    }

    pub fn controller(&self) -> &SessionController {
        &self.controller
    }

    pub fn controller_mut(&mut self) -> &mut SessionController {
        &mut self.controller
    }

    pub fn notice(&self) -> Option<&str> {
        self.notice.as_deref()
    }

    /// Picks up generated exercises. Returns whether the screen needs a redraw.
    pub fn on_tick(&mut self) -> bool {
        let replaced = self.controller.poll_exercises();
        let session = self.controller.session();
        let running = session.has_started() && !session.is_complete();

        replaced || running || self.controller.is_loading()
    }

    pub fn on_key(&mut self, key: KeyEvent) -> Action {
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);

        match key.code {
            KeyCode::Esc => return Action::Quit,
            KeyCode::Char('c') if ctrl => return Action::Quit,
            _ => {}
        }

        self.notice = None;

        match key.code {
            KeyCode::Char('r') if ctrl => self.controller.restart(),
            KeyCode::Char('n') if ctrl => self.controller.next_exercise(),
            KeyCode::Char('a') if ctrl => self.toggle_ai(),
            KeyCode::Left => {
                if !self.controller.previous_level() {
                    self.notice = Some("Already at the first level".to_string());
                }
            }
            KeyCode::Right => self.advance_level(),
            KeyCode::F(n) if (1..=9).contains(&n) => self.jump_to(LevelId::from(n)),
            _ if self.controller.level_complete() => self.on_complete_key(key),
            KeyCode::Backspace => {
                self.controller.handle_input(KeyInput::Backspace);
            }
            KeyCode::Char(c) if !ctrl && !key.modifiers.contains(KeyModifiers::ALT) => {
                if self.controller.handle_input(KeyInput::Char(c)) == InputResult::LevelComplete {
                    self.notice = Some(self.completion_notice());
                }
            }
            _ => {}
        }

        Action::Continue
    }

    fn on_complete_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Char('r') => self.controller.restart(),
            KeyCode::Char('n') => self.controller.next_exercise(),
            KeyCode::Char('l') => self.advance_level(),
            _ => {}
        }
    }

    fn advance_level(&mut self) {
        if !self.controller.next_level() {
            self.notice = Some("Already at the last level".to_string());
        }
    }

    fn jump_to(&mut self, id: LevelId) {
        if !self.controller.select_level(id) {
            self.notice = Some(format!("There is no level {id}"));
        }
    }

    fn toggle_ai(&mut self) {
        let enabled = !self.controller.ai_assisted();
        self.controller.set_ai_assisted(enabled);
        self.notice = Some(if enabled {
            "AI exercises on from the next exercise".to_string()
        } else {
            "AI exercises off from the next exercise".to_string()
        });
    }

    fn completion_notice(&self) -> String {
        if self.controller.can_advance() {
            "Level complete! Press l for the next level".to_string()
        } else {
            "Final level complete!".to_string()
        }
    }
}

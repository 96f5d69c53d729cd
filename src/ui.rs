use ratatui::{
    buffer::Buffer,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Paragraph, Widget, Wrap},
};
use unicode_width::UnicodeWidthStr;

use crate::app::App;
use crate::keyboard::{finger_for, is_home_key, Finger, ROWS};
use crate::lesson::Level;
use crate::session::CharState;
use crate::util::{format_elapsed, percent};

const HORIZONTAL_MARGIN: u16 = 5;
const VERTICAL_MARGIN: u16 = 1;
const KEY_WIDTH: u16 = 4;
/// Stagger of each keyboard row, in columns.
const ROW_OFFSETS: [u16; 4] = [0, 2, 3, 4];
const KEYBOARD_WIDTH: u16 = 13 * KEY_WIDTH + 4;
const KEYBOARD_HEIGHT: u16 = 5;
const SPACE_BAR: &str = "[          SPACE          ]";

pub fn finger_color(finger: Finger) -> Color {
    match finger {
        Finger::LeftPinky => Color::Magenta,
        Finger::LeftRing => Color::Blue,
        Finger::LeftMiddle => Color::Cyan,
        Finger::LeftIndex => Color::Green,
        Finger::RightIndex => Color::Yellow,
        Finger::RightMiddle => Color::LightRed,
        Finger::RightRing => Color::LightBlue,
        Finger::RightPinky => Color::LightMagenta,
        Finger::Thumbs => Color::Gray,
    }
}

/// Style of a key on the on-screen keyboard.
///
/// The next expected key is filled with its finger colour, other keys of the level are
/// drawn in their finger colour and everything else is dimmed.
pub fn key_style(key: char, level: &Level, next: Option<char>) -> Style {
    let color = finger_color(finger_for(key));
    let mut style = if next.is_some_and(|c| c.to_lowercase().eq(key.to_lowercase())) {
        Style::new()
            .fg(Color::Black)
            .bg(color)
            .add_modifier(Modifier::BOLD)
    } else if level.allows(key) {
        Style::new().fg(color)
    } else {
        Style::new().fg(Color::DarkGray).add_modifier(Modifier::DIM)
    };

    if is_home_key(key) {
        style = style.add_modifier(Modifier::UNDERLINED);
    }
    style
}

impl Widget for &App {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let controller = self.controller();
        let session = controller.session();
        let level = controller.current_level();
        let snapshot = controller.snapshot();

        let bold_style = Style::new().add_modifier(Modifier::BOLD);
        let dim_style = Style::new().add_modifier(Modifier::DIM);
        let italic_style = Style::new().add_modifier(Modifier::ITALIC);

        let max_chars_per_line = area.width.saturating_sub(HORIZONTAL_MARGIN * 2).max(1);
        let target = session.target_text();
        let prompt_width = target.width() as u16;
        let prompt_lines = prompt_width.div_ceil(max_chars_per_line).max(1);

        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .horizontal_margin(HORIZONTAL_MARGIN)
            .vertical_margin(VERTICAL_MARGIN)
            .constraints([
                Constraint::Length(2), // header
                Constraint::Length(1),
                Constraint::Length(prompt_lines),
                Constraint::Length(1),
                Constraint::Length(1), // hint
                Constraint::Length(1),
                Constraint::Length(KEYBOARD_HEIGHT),
                Constraint::Length(1),
                Constraint::Length(1), // stats
                Constraint::Min(0),
                Constraint::Length(1), // legend
            ])
            .split(area);

        let mut title = vec![Span::styled(
            format!(
                "Level {}/{}: {}",
                level.id(),
                controller.catalog().max_level(),
                level.name()
            ),
            bold_style,
        )];
        if controller.ai_assisted() {
            title.push(Span::styled("  [AI]", Style::new().fg(Color::Cyan)));
        }
        Paragraph::new(vec![
            Line::from(title),
            Line::from(Span::styled(
                level.description().to_string(),
                dim_style.patch(italic_style),
            )),
        ])
        .alignment(Alignment::Center)
        .render(chunks[0], buf);

        let spans = session
            .char_states()
            .into_iter()
            .map(|(c, state)| prompt_span(c, state))
            .collect::<Vec<Span>>();
        Paragraph::new(Line::from(spans))
            .alignment(if prompt_lines == 1 {
                Alignment::Center
            } else {
                Alignment::Left
            })
            .wrap(Wrap { trim: false })
            .render(chunks[2], buf);

        let hint = if controller.is_loading() && !session.has_started() {
            Span::styled(
                "Generating exercise... (start typing to keep this one)",
                Style::new().fg(Color::Yellow).patch(italic_style),
            )
        } else {
            let color = controller
                .current_finger()
                .map(finger_color)
                .unwrap_or(Color::Green);
            Span::styled(controller.finger_hint(), bold_style.fg(color))
        };
        Paragraph::new(hint)
            .alignment(Alignment::Center)
            .render(chunks[4], buf);

        if controller.level_complete() {
            render_complete_panel(self, chunks[6], buf);
        } else {
            render_keyboard(level, session.current_char(), chunks[6], buf);
        }

        Paragraph::new(Span::styled(
            format!(
                "Accuracy {}   WPM {:.0}   Time {}   Progress {}",
                percent(snapshot.accuracy),
                snapshot.wpm,
                format_elapsed(snapshot.elapsed),
                percent(snapshot.progress * 100.0),
            ),
            bold_style,
        ))
        .alignment(Alignment::Center)
        .render(chunks[8], buf);

        let legend = match self.notice() {
            Some(notice) => Span::styled(notice.to_string(), Style::new().fg(Color::Cyan)),
            None => Span::styled(
                format!(
                    "(esc) quit / (ctrl-r) restart / (ctrl-n) new / (\u{2190}/\u{2192}) level / (F1-F{}) jump / (ctrl-a) AI",
                    controller.catalog().max_level().min(9)
                ),
                italic_style,
            ),
        };
        Paragraph::new(legend)
            .alignment(Alignment::Center)
            .render(chunks[10], buf);
    }
}

fn prompt_span(c: char, state: CharState) -> Span<'static> {
    let bold_style = Style::new().add_modifier(Modifier::BOLD);

    match state {
        CharState::Correct => Span::styled(c.to_string(), bold_style.fg(Color::Green)),
        CharState::Incorrect => Span::styled(
            match c {
                ' ' => "·".to_owned(),
                c => c.to_string(),
            },
            bold_style.fg(Color::Red),
        ),
        CharState::Current => Span::styled(
            c.to_string(),
            bold_style.add_modifier(Modifier::UNDERLINED | Modifier::DIM),
        ),
        CharState::Pending => {
            Span::styled(c.to_string(), bold_style.add_modifier(Modifier::DIM))
        }
    }
}

fn render_keyboard(level: &Level, next: Option<char>, area: Rect, buf: &mut Buffer) {
    let mut lines: Vec<Line> = ROWS
        .iter()
        .zip(ROW_OFFSETS)
        .map(|(row, offset)| {
            let mut spans = vec![Span::raw(" ".repeat(offset as usize))];
            spans.extend(row.iter().map(|&key| {
                let label = format!("[{}]", key.to_uppercase());
                Span::styled(
                    format!("{label:<width$}", width = KEY_WIDTH as usize),
                    key_style(key, level, next),
                )
            }));
            Line::from(spans)
        })
        .collect();

    let space_indent = (KEYBOARD_WIDTH.saturating_sub(SPACE_BAR.width() as u16)) / 2;
    lines.push(Line::from(vec![
        Span::raw(" ".repeat(space_indent as usize)),
        Span::styled(SPACE_BAR, key_style(' ', level, next)),
    ]));

    Paragraph::new(lines).render(centered(area, KEYBOARD_WIDTH), buf);
}

fn render_complete_panel(app: &App, area: Rect, buf: &mut Buffer) {
    let controller = app.controller();
    let snapshot = controller.snapshot();
    let bold_style = Style::new().add_modifier(Modifier::BOLD);

    let actions = if controller.can_advance() {
        "(r)etry / (n)ew exercise / (l) next level"
    } else {
        "(r)etry / (n)ew exercise"
    };

    let lines = vec![
        Line::from(Span::styled(
            format!(
                "{} wpm   {} acc   {}",
                snapshot.wpm.round(),
                percent(snapshot.accuracy),
                format_elapsed(snapshot.elapsed)
            ),
            bold_style,
        )),
        Line::from(format!(
            "{} correct   {} incorrect",
            snapshot.correct, snapshot.incorrect
        )),
        Line::from(Span::styled(
            actions,
            Style::new().add_modifier(Modifier::ITALIC),
        )),
    ];

    Paragraph::new(lines)
        .alignment(Alignment::Center)
        .block(
            Block::bordered()
                .title(" Level complete ")
                .title_alignment(Alignment::Center)
                .border_style(Style::new().fg(Color::Green)),
        )
        .render(centered(area, KEYBOARD_WIDTH), buf);
}

/// Horizontally centred slice of `area`, at most `width` wide.
fn centered(area: Rect, width: u16) -> Rect {
    let width = width.min(area.width);
    Rect {
        x: area.x + (area.width - width) / 2,
        width,
        ..area
    }
}

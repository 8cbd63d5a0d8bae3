use crate::ui::conversation::commands::{SlashCommand, parse_slash_command};
use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Widget},
};
use strum::IntoEnumIterator;
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

/// Result returned when the user interacts with the composer
#[derive(Debug, PartialEq)]
pub enum ComposerResult {
    /// A prompt to send. The text stays in the composer until the reply arrives.
    Submitted(String),
    Command(SlashCommand),
    None,
}

/// Text and cursor of the single-line input. `cursor` is a byte offset on a
/// char boundary.
#[derive(Debug, Clone, Default)]
pub struct TextAreaState {
    pub content: String,
    pub cursor: usize,
}

/// Prompt input with a slash-command palette
pub struct ConversationComposer {
    state: TextAreaState,
    placeholder: String,
    disabled: bool,
    palette: Vec<SlashCommand>,
    selected_command: Option<usize>,
    /// Set once the user has picked an entry with Up/Down
    selection_moved: bool,
}

impl ConversationComposer {
    pub fn new(placeholder: impl Into<String>) -> Self {
        Self {
            state: TextAreaState::default(),
            placeholder: placeholder.into(),
            disabled: false,
            palette: Vec::new(),
            selected_command: None,
            selection_moved: false,
        }
    }

    /// Handle key input
    pub fn handle_key(&mut self, key: KeyEvent) -> ComposerResult {
        if key.kind != KeyEventKind::Press || self.disabled {
            return ComposerResult::None;
        }

        match key.code {
            KeyCode::Enter => return self.submit(),
            KeyCode::Up if self.palette_open() => self.move_command_selection(-1),
            KeyCode::Down if self.palette_open() => self.move_command_selection(1),
            KeyCode::Tab => {
                self.apply_selected_command();
            }
            KeyCode::Esc => {
                if self.palette_open() {
                    self.close_command_palette();
                } else {
                    self.clear();
                }
            }
            KeyCode::Char('u') if key.modifiers.contains(KeyModifiers::CONTROL) => self.clear(),
            KeyCode::Char(_) if key.modifiers.contains(KeyModifiers::CONTROL) => {}
            KeyCode::Char(c) => {
                self.insert_char(c);
                self.refresh_command_palette();
            }
            KeyCode::Backspace => {
                if self.backspace() {
                    self.refresh_command_palette();
                }
            }
            KeyCode::Delete => {
                if self.delete() {
                    self.refresh_command_palette();
                }
            }
            KeyCode::Left => {
                if let Some(prev) = self.prev_boundary() {
                    self.state.cursor = prev;
                }
            }
            KeyCode::Right => {
                if let Some(next) = self.next_boundary() {
                    self.state.cursor = next;
                }
            }
            KeyCode::Home => self.state.cursor = 0,
            KeyCode::End => self.state.cursor = self.state.content.len(),
            _ => {}
        }

        ComposerResult::None
    }

    /// Insert pasted text at the cursor. Line breaks become spaces.
    pub fn handle_paste(&mut self, text: &str) {
        if self.disabled {
            return;
        }
        for c in text.chars() {
            self.insert_char(if c == '\n' || c == '\r' { ' ' } else { c });
        }
        self.refresh_command_palette();
    }

    fn submit(&mut self) -> ComposerResult {
        if self.palette_open() {
            // An ambiguous partial command waits for a choice.
            if !self.selection_moved && self.palette.len() > 1 {
                return ComposerResult::None;
            }
            self.apply_selected_command();
        }

        if let Some(command) = parse_slash_command(&self.state.content) {
            self.clear();
            return ComposerResult::Command(command);
        }

        if self.state.content.trim().is_empty() {
            return ComposerResult::None;
        }
        ComposerResult::Submitted(self.state.content.clone())
    }

    fn insert_char(&mut self, c: char) {
        self.state.content.insert(self.state.cursor, c);
        self.state.cursor += c.len_utf8();
    }

    fn backspace(&mut self) -> bool {
        match self.prev_boundary() {
            Some(prev) => {
                self.state.content.remove(prev);
                self.state.cursor = prev;
                true
            }
            None => false,
        }
    }

    fn delete(&mut self) -> bool {
        if self.state.cursor < self.state.content.len() {
            self.state.content.remove(self.state.cursor);
            true
        } else {
            false
        }
    }

    fn prev_boundary(&self) -> Option<usize> {
        self.state.content[..self.state.cursor]
            .chars()
            .next_back()
            .map(|c| self.state.cursor - c.len_utf8())
    }

    fn next_boundary(&self) -> Option<usize> {
        self.state.content[self.state.cursor..]
            .chars()
            .next()
            .map(|c| self.state.cursor + c.len_utf8())
    }

    fn palette_open(&self) -> bool {
        !self.palette.is_empty()
    }

    fn close_command_palette(&mut self) {
        self.palette.clear();
        self.selected_command = None;
        self.selection_moved = false;
    }

    fn refresh_command_palette(&mut self) {
        let content = self.state.content.as_str();
        let Some(query) = content.strip_prefix('/') else {
            self.close_command_palette();
            return;
        };
        if query.contains(char::is_whitespace) {
            self.close_command_palette();
            return;
        }

        let query = query.to_lowercase();
        self.selection_moved = false;
        self.palette = SlashCommand::iter()
            .filter(|command| command.command().starts_with(&query))
            .collect();

        self.selected_command = if self.palette.is_empty() {
            None
        } else {
            Some(self.selected_command.unwrap_or(0).min(self.palette.len() - 1))
        };
    }

    fn move_command_selection(&mut self, delta: isize) {
        if self.palette.is_empty() {
            self.selected_command = None;
            return;
        }

        let len = self.palette.len() as isize;
        let current = self.selected_command.unwrap_or(0) as isize;
        self.selected_command = Some((current + delta).rem_euclid(len) as usize);
        self.selection_moved = true;
    }

    fn apply_selected_command(&mut self) -> bool {
        let Some(command) = self.selected_command.and_then(|index| self.palette.get(index).copied())
        else {
            return false;
        };

        self.state.content = format!("/{}", command.command());
        self.state.cursor = self.state.content.len();
        self.close_command_palette();
        true
    }

    /// Block editing while a reply is pending
    pub fn set_disabled(&mut self, disabled: bool) {
        self.disabled = disabled;
        if disabled {
            self.close_command_palette();
        }
    }

    pub fn is_disabled(&self) -> bool {
        self.disabled
    }

    pub fn content(&self) -> &str {
        &self.state.content
    }

    pub fn clear(&mut self) {
        self.state = TextAreaState::default();
        self.close_command_palette();
    }
}

impl Widget for &ConversationComposer {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let (title, border_style) = if self.disabled {
            (" Thinking… ", Style::default().fg(Color::DarkGray))
        } else {
            (" Send (Enter) ", Style::default().fg(Color::Green))
        };

        let block = Block::default()
            .borders(Borders::ALL)
            .title(title)
            .border_style(border_style);

        let inner_area = block.inner(area);
        block.render(area, buf);

        if inner_area.width == 0 || inner_area.height == 0 {
            return;
        }

        if self.state.content.is_empty() {
            let placeholder_line = Line::from(Span::styled(
                self.placeholder.as_str(),
                Style::default().fg(Color::DarkGray),
            ));
            buf.set_line(inner_area.x, inner_area.y, &placeholder_line, inner_area.width);
        } else {
            let text_style = if self.disabled {
                Style::default().fg(Color::DarkGray)
            } else {
                Style::default()
            };
            let mut content = self.state.content.clone();
            if !self.disabled {
                content.insert(self.state.cursor, '▌');
            }

            let visible = visible_tail(&content, inner_area.width as usize);

            let line = Line::from(Span::styled(visible, text_style));
            buf.set_line(inner_area.x, inner_area.y, &line, inner_area.width);
        }

        if self.palette_open() {
            let palette_height = (self.palette.len().min(5) + 2) as u16;
            let palette_area = Rect {
                x: area.x,
                y: area.y.saturating_sub(palette_height),
                width: area.width,
                height: palette_height.min(area.y),
            };
            if palette_area.height < 3 {
                return;
            }

            Clear.render(palette_area, buf);
            let block = Block::default()
                .borders(Borders::ALL)
                .title("Commands")
                .style(Style::default().fg(Color::Blue));
            let inner = block.inner(palette_area);
            block.render(palette_area, buf);

            for (index, command) in self.palette.iter().enumerate() {
                if index >= inner.height as usize {
                    break;
                }

                let style = if self.selected_command == Some(index) {
                    Style::default()
                        .fg(Color::Black)
                        .bg(Color::Cyan)
                        .add_modifier(Modifier::BOLD)
                } else {
                    Style::default().fg(Color::White)
                };

                let line = Line::from(vec![
                    Span::styled(format!("/{}", command.command()), style),
                    Span::styled(" — ", Style::default().fg(Color::DarkGray)),
                    Span::styled(command.description(), Style::default().fg(Color::Gray)),
                ]);

                buf.set_line(inner.x, inner.y + index as u16, &line, inner.width);
            }
        }
    }
}

/// Longest suffix of `content` that fits in `width` columns, so the end of
/// long input stays visible.
fn visible_tail(content: &str, width: usize) -> &str {
    if content.width() <= width {
        return content;
    }
    let mut used = 0;
    let mut start = content.len();
    for (index, c) in content.char_indices().rev() {
        let char_width = c.width().unwrap_or(0);
        if used + char_width > width {
            break;
        }
        used += char_width;
        start = index;
    }
    &content[start..]
}

//! Conversation history display component

use crate::events::{Role, Turn};
use chrono::{DateTime, Local, Utc};
use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Scrollbar, ScrollbarOrientation, ScrollbarState, StatefulWidget, Widget},
};
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

/// Scrollable, oldest-first view of the conversation
pub struct ConversationHistory {
    assistant_name: String,
    /// Lines scrolled up from the newest line; 0 follows the conversation
    scroll_from_bottom: usize,
    notice: Option<String>,
}

impl ConversationHistory {
    pub fn new(assistant_name: impl Into<String>) -> Self {
        Self {
            assistant_name: assistant_name.into(),
            scroll_from_bottom: 0,
            notice: None,
        }
    }

    pub fn scroll_up(&mut self, lines: usize) {
        self.scroll_from_bottom = self.scroll_from_bottom.saturating_add(lines);
    }

    pub fn scroll_down(&mut self, lines: usize) {
        self.scroll_from_bottom = self.scroll_from_bottom.saturating_sub(lines);
    }

    pub fn scroll_to_bottom(&mut self) {
        self.scroll_from_bottom = 0;
    }

    pub fn is_following(&self) -> bool {
        self.scroll_from_bottom == 0
    }

    /// Local text shown below the turns; never sent to the model
    pub fn set_notice(&mut self, notice: impl Into<String>) {
        self.notice = Some(notice.into());
        self.scroll_to_bottom();
    }

    pub fn clear_notice(&mut self) {
        self.notice = None;
    }

    pub fn notice(&self) -> Option<&str> {
        self.notice.as_deref()
    }

    pub fn render(&self, area: Rect, buf: &mut Buffer, turns: &[Turn], started_at: DateTime<Utc>) {
        let started = started_at.with_timezone(&Local).format("%d %b %Y %H:%M");
        let block = Block::default()
            .borders(Borders::ALL)
            .title(format!(" 💬 Conversation · {started} "));

        let inner_area = block.inner(area);
        block.render(area, buf);

        if inner_area.width == 0 || inner_area.height == 0 {
            return;
        }

        let all_lines = self.build_lines(turns, inner_area.width.saturating_sub(1));
        let height = inner_area.height as usize;
        let total = all_lines.len();
        let max_offset = total.saturating_sub(height);
        let offset = self.scroll_from_bottom.min(max_offset);
        let start = max_offset - offset;

        for (i, line) in all_lines.iter().skip(start).take(height).enumerate() {
            buf.set_line(inner_area.x, inner_area.y + i as u16, line, inner_area.width);
        }

        if max_offset > 0 {
            let mut scroll_state = ScrollbarState::new(max_offset).position(start);
            Scrollbar::default()
                .orientation(ScrollbarOrientation::VerticalRight)
                .begin_symbol(Some("↑"))
                .end_symbol(Some("↓"))
                .render(inner_area, buf, &mut scroll_state);
        }
    }

    fn build_lines(&self, turns: &[Turn], width: u16) -> Vec<Line<'static>> {
        let mut lines = Vec::new();

        if turns.is_empty() {
            lines.extend([
                Line::from(Span::styled(
                    "🔓 Messages are not end-to-end encrypted.",
                    Style::default().fg(Color::Gray),
                )),
                Line::from(""),
                Line::from(Span::styled(
                    "Type a message below and press Enter. /help lists commands.",
                    Style::default().fg(Color::DarkGray),
                )),
            ]);
        }

        for turn in turns {
            lines.extend(self.render_turn(turn, width));
            lines.push(Line::from(""));
        }

        if let Some(notice) = &self.notice {
            for text in wrap_text(notice, width as usize) {
                lines.push(Line::from(Span::styled(text, Style::default().fg(Color::Yellow))));
            }
        }

        lines
    }

    /// Render a single turn into lines
    fn render_turn(&self, turn: &Turn, width: u16) -> Vec<Line<'static>> {
        let (label, color) = match turn.role() {
            Role::User => ("You".to_string(), Color::Blue),
            Role::Assistant => (self.assistant_name.clone(), Color::Green),
            Role::System => ("System".to_string(), Color::Yellow),
        };

        let mut lines = vec![Line::from(Span::styled(
            label,
            Style::default().fg(color).add_modifier(Modifier::BOLD),
        ))];

        for text in wrap_text(turn.content(), width.saturating_sub(2) as usize) {
            lines.push(Line::from(vec![
                Span::raw("  "),
                Span::styled(text, Style::default().fg(color)),
            ]));
        }

        lines
    }
}

/// Word-wrap `text` to `width` terminal columns, keeping explicit line breaks
/// and splitting words longer than a line. Wide characters count as two.
pub fn wrap_text(text: &str, width: usize) -> Vec<String> {
    if width == 0 {
        return vec![text.to_string()];
    }

    let mut lines = Vec::new();
    for paragraph in text.lines() {
        let mut current_line = String::new();
        let mut current_width = 0;

        for word in paragraph.split_whitespace() {
            let mut word = word.to_string();

            while word.width() > width {
                if !current_line.is_empty() {
                    lines.push(std::mem::take(&mut current_line));
                    current_width = 0;
                }
                let split = split_at_width(&word, width);
                let rest = word.split_off(split);
                lines.push(word);
                word = rest;
            }

            let word_width = word.width();
            let needed = if current_line.is_empty() { word_width } else { word_width + 1 };
            if current_width + needed > width {
                lines.push(std::mem::take(&mut current_line));
                current_width = 0;
            }
            if !current_line.is_empty() {
                current_line.push(' ');
                current_width += 1;
            }
            current_width += word_width;
            current_line.push_str(&word);
        }

        lines.push(current_line);
    }

    if lines.is_empty() {
        lines.push(String::new());
    }

    lines
}

/// Byte index where `word` stops fitting in `width` columns. Always at least
/// one character, so a glyph wider than the line still makes progress.
fn split_at_width(word: &str, width: usize) -> usize {
    let mut used = 0;
    for (index, c) in word.char_indices() {
        let char_width = c.width().unwrap_or(0);
        if used + char_width > width && index > 0 {
            return index;
        }
        used += char_width;
    }
    word.len()
}

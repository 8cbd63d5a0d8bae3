use crate::controller::RequestState;
use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
};

/// One-line indicator under the history: "thinking" while busy, otherwise
/// the last error, otherwise nothing.
pub struct StatusLine {
    assistant_name: String,
    frame: u8,
}

impl StatusLine {
    pub fn new(assistant_name: impl Into<String>) -> Self {
        Self {
            assistant_name: assistant_name.into(),
            frame: 0,
        }
    }

    /// Advance the ellipsis animation
    pub fn tick(&mut self) {
        self.frame = (self.frame + 1) % 4;
    }

    pub fn line(&self, request: &RequestState) -> Option<Line<'static>> {
        if request.is_busy() {
            let dots = match self.frame {
                0 => ".",
                1 => "..",
                2 => "...",
                _ => "",
            };
            return Some(Line::from(vec![
                Span::styled("🤖 ", Style::default().fg(Color::Green)),
                Span::styled(
                    format!("{} is thinking", self.assistant_name),
                    Style::default().fg(Color::Green),
                ),
                Span::styled(dots, Style::default().fg(Color::Yellow)),
            ]));
        }

        request.last_error().map(|error| {
            Line::from(vec![
                Span::styled(
                    "⚠ ",
                    Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
                ),
                Span::styled(error.to_string(), Style::default().fg(Color::Red)),
            ])
        })
    }

    pub fn render(&self, area: Rect, buf: &mut Buffer, request: &RequestState) {
        if let Some(line) = self.line(request) {
            buf.set_line(area.x, area.y, &line, area.width);
        }
    }
}

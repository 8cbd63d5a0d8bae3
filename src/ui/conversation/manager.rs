use crate::config::Config;
use crate::controller::{CompletionOutcome, InteractionController, Resolution, SubmitRejected};
use crate::events::AppEvent;
use crate::llm::CompletionBackend;
use crate::ui::conversation::composer::ComposerResult;
use crate::ui::conversation::{
    ConversationComposer, ConversationHistory, SlashCommand, StatusLine, get_help_text,
};
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ratatui::{
    buffer::Buffer,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tracing::{debug, warn};

/// Actions that can be requested by the conversation manager
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversationAction {
    None,
    Exit,
}

/// Manages the conversation flow and UI components
pub struct ConversationManager {
    controller: InteractionController<dyn CompletionBackend>,
    history: ConversationHistory,
    composer: ConversationComposer,
    status: StatusLine,
    model: String,
    scroll_step: usize,
    outcomes: mpsc::UnboundedSender<AppEvent>,
    changes: watch::Receiver<u64>,
}

impl ConversationManager {
    pub fn new(
        backend: Arc<dyn CompletionBackend>,
        config: &Config,
        outcomes: mpsc::UnboundedSender<AppEvent>,
    ) -> Self {
        let controller = InteractionController::new(backend);
        let changes = controller.session().conversation().subscribe();

        Self {
            controller,
            history: ConversationHistory::new(config.assistant_name.clone()),
            composer: ConversationComposer::new("Text Message"),
            status: StatusLine::new(config.assistant_name.clone()),
            model: config.model.clone(),
            scroll_step: config.ui.scroll_step.max(1) as usize,
            outcomes,
            changes,
        }
    }

    pub fn controller(&self) -> &InteractionController<dyn CompletionBackend> {
        &self.controller
    }

    pub fn composer(&self) -> &ConversationComposer {
        &self.composer
    }

    pub fn history(&self) -> &ConversationHistory {
        &self.history
    }

    /// Handle key input
    pub fn handle_key(&mut self, key: KeyEvent) -> ConversationAction {
        if key.modifiers.contains(KeyModifiers::CONTROL) {
            match key.code {
                KeyCode::Char('c') | KeyCode::Char('d') => return ConversationAction::Exit,
                KeyCode::Char('l') => {
                    self.reset();
                    return ConversationAction::None;
                }
                _ => {}
            }
        }

        match key.code {
            KeyCode::PageUp => {
                self.history.scroll_up(self.scroll_step);
                return ConversationAction::None;
            }
            KeyCode::PageDown => {
                self.history.scroll_down(self.scroll_step);
                return ConversationAction::None;
            }
            _ => {}
        }

        match self.composer.handle_key(key) {
            ComposerResult::Submitted(prompt) => {
                self.history.clear_notice();
                self.handle_input(&prompt);
                ConversationAction::None
            }
            ComposerResult::Command(command) => self.handle_slash_command(command),
            ComposerResult::None => ConversationAction::None,
        }
    }

    pub fn handle_paste(&mut self, text: &str) {
        self.composer.handle_paste(text);
    }

    /// Start a completion for `prompt` in the background
    pub fn handle_input(&mut self, prompt: &str) {
        let pending = match self.controller.begin(prompt) {
            Ok(pending) => pending,
            Err(SubmitRejected::EmptyPrompt | SubmitRejected::Busy) => return,
        };

        self.composer.set_disabled(true);
        self.history.scroll_to_bottom();

        let backend = self.controller.backend();
        let outcomes = self.outcomes.clone();
        tokio::spawn(async move {
            let outcome = pending.run(&*backend).await;
            if outcomes.send(AppEvent::Completion(outcome)).is_err() {
                debug!("event loop gone before completion finished");
            }
        });
    }

    /// Apply a finished completion
    pub fn handle_outcome(&mut self, outcome: CompletionOutcome) {
        match self.controller.resolve(outcome) {
            Resolution::Replied => {
                self.composer.set_disabled(false);
                self.composer.clear();
            }
            Resolution::Failed(message) => {
                debug!(%message, "keeping prompt for another attempt");
                self.composer.set_disabled(false);
            }
            Resolution::Stale => {}
        }
    }

    pub fn on_tick(&mut self) {
        self.status.tick();
    }

    /// Follow the conversation when the store signals a change
    pub fn sync_scroll(&mut self) {
        match self.changes.has_changed() {
            Ok(true) => {
                self.changes.borrow_and_update();
                self.history.scroll_to_bottom();
            }
            Ok(false) => {}
            Err(_) => {
                // The session was replaced; follow the new conversation.
                self.changes = self.controller.session().conversation().subscribe();
                self.history.scroll_to_bottom();
            }
        }
    }

    fn reset(&mut self) {
        if self.controller.is_busy() {
            warn!("discarding reply still in flight");
        }
        self.controller.reset();
        self.changes = self.controller.session().conversation().subscribe();
        self.composer.set_disabled(false);
        self.composer.clear();
        self.history.clear_notice();
        self.history.scroll_to_bottom();
    }

    /// Handle slash commands
    fn handle_slash_command(&mut self, command: SlashCommand) -> ConversationAction {
        match command {
            SlashCommand::Clear => {
                self.reset();
                ConversationAction::None
            }
            SlashCommand::Help => {
                self.history.set_notice(get_help_text());
                ConversationAction::None
            }
            SlashCommand::Quit => ConversationAction::Exit,
        }
    }

    /// Render the conversation UI components
    pub fn render_conversation_ui(&self, area: Rect, buf: &mut Buffer) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(2), // Header
                Constraint::Min(5),    // History
                Constraint::Length(1), // Status
                Constraint::Length(3), // Composer
            ])
            .split(area);

        let header = Line::from(vec![
            Span::styled(
                "ChaatGPT 🇮🇳",
                Style::default().fg(Color::White).add_modifier(Modifier::BOLD),
            ),
            Span::styled(format!("  {}", self.model), Style::default().fg(Color::DarkGray)),
        ]);
        let notice = Line::from(Span::styled(
            "🔓 Messages are not end-to-end encrypted",
            Style::default().fg(Color::Gray),
        ));
        buf.set_line(chunks[0].x, chunks[0].y, &header, chunks[0].width);
        if chunks[0].height > 1 {
            buf.set_line(chunks[0].x, chunks[0].y + 1, &notice, chunks[0].width);
        }

        let session = self.controller.session();
        self.history.render(
            chunks[1],
            buf,
            session.conversation().snapshot(),
            session.started_at(),
        );
        self.status.render(chunks[2], buf, session.request());
        ratatui::widgets::Widget::render(&self.composer, chunks[3], buf);
    }
}

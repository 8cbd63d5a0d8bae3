use crate::config::Config;
use crate::events::{AppEvent, TuiEvent};
use crate::llm::CompletionBackend;
use crate::tui::{EventHandler, Tui};
use crate::ui::conversation::{ConversationAction, ConversationManager};
use anyhow::Result;
use std::sync::Arc;
use tracing::{debug, info};

/// Top-level application: owns the conversation UI and drives the event loop
pub struct App {
    manager: ConversationManager,
    running: bool,
}

impl App {
    pub fn new(
        backend: Arc<dyn CompletionBackend>,
        config: &Config,
        events: &EventHandler,
    ) -> Self {
        Self {
            manager: ConversationManager::new(backend, config, events.sender()),
            running: true,
        }
    }

    pub fn manager(&self) -> &ConversationManager {
        &self.manager
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub async fn run(&mut self, terminal: &mut Tui, events: &mut EventHandler) -> Result<()> {
        info!("chat session started");

        while self.running {
            self.manager.sync_scroll();
            terminal.draw(|frame| {
                let area = frame.size();
                self.manager.render_conversation_ui(area, frame.buffer_mut());
            })?;

            let Some(event) = events.next().await else {
                debug!("event channel closed");
                break;
            };
            self.handle_event(event);
        }

        info!("chat session ended");
        Ok(())
    }

    pub fn handle_event(&mut self, event: AppEvent) {
        match event {
            AppEvent::Terminal(TuiEvent::Key(key)) => {
                if self.manager.handle_key(key) == ConversationAction::Exit {
                    self.running = false;
                }
            }
            AppEvent::Terminal(TuiEvent::Paste(text)) => self.manager.handle_paste(&text),
            // Redrawn on the next pass
            AppEvent::Terminal(TuiEvent::Resize(..)) => {}
            AppEvent::Tick => self.manager.on_tick(),
            AppEvent::Completion(outcome) => self.manager.handle_outcome(outcome),
        }
    }
}

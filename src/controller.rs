//! Interaction controller: single-flight submit/reply state machine

use crate::conversation::Conversation;
use crate::events::Turn;
use crate::llm::{CompletionBackend, CompletionError};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Lifecycle of the outstanding request
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestState {
    busy: bool,
    last_error: Option<String>,
}

impl RequestState {
    pub fn is_busy(&self) -> bool {
        self.busy
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }
}

/// Everything the display layer needs to draw a session
#[derive(Debug)]
pub struct SessionState {
    id: Uuid,
    started_at: DateTime<Utc>,
    conversation: Conversation,
    request: RequestState,
}

impl SessionState {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            started_at: Utc::now(),
            conversation: Conversation::new(),
            request: RequestState::default(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    pub fn request(&self) -> &RequestState {
        &self.request
    }
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Awaiting { ticket: u64 },
}

/// Why a submission was refused. Neither case touches the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SubmitRejected {
    #[error("prompt is empty")]
    EmptyPrompt,
    #[error("still waiting for the previous reply")]
    Busy,
}

/// A dispatched completion that has not run yet
#[derive(Debug, Clone)]
pub struct PendingCompletion {
    ticket: u64,
    prior: Vec<Turn>,
    prompt: String,
}

impl PendingCompletion {
    pub fn ticket(&self) -> u64 {
        self.ticket
    }

    /// Turns that preceded the prompt
    pub fn prior(&self) -> &[Turn] {
        &self.prior
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    /// Perform the network call. This is the only suspension point of a submit.
    pub async fn run<B>(self, backend: &B) -> CompletionOutcome
    where
        B: CompletionBackend + ?Sized,
    {
        let result = backend.complete(&self.prior, &self.prompt).await;
        CompletionOutcome {
            ticket: self.ticket,
            result,
        }
    }
}

#[derive(Debug)]
pub struct CompletionOutcome {
    pub ticket: u64,
    pub result: Result<String, CompletionError>,
}

/// What resolving an outcome did to the session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Reply appended; the input field should be cleared
    Replied,
    /// Error recorded; the input field keeps its text
    Failed(String),
    /// Outcome belonged to a session that was reset meanwhile
    Stale,
}

/// Owns the session and moves it between `Idle` and `Awaiting`
pub struct InteractionController<B: ?Sized> {
    backend: Arc<B>,
    session: SessionState,
    phase: Phase,
    next_ticket: u64,
}

impl<B> InteractionController<B>
where
    B: CompletionBackend + ?Sized,
{
    pub fn new(backend: Arc<B>) -> Self {
        Self {
            backend,
            session: SessionState::new(),
            phase: Phase::Idle,
            next_ticket: 0,
        }
    }

    pub fn backend(&self) -> Arc<B> {
        Arc::clone(&self.backend)
    }

    pub fn session(&self) -> &SessionState {
        &self.session
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn is_busy(&self) -> bool {
        matches!(self.phase, Phase::Awaiting { .. })
    }

    /// `Idle -> Awaiting`: record the user's turn and hand out the call to make.
    pub fn begin(&mut self, prompt: &str) -> Result<PendingCompletion, SubmitRejected> {
        if prompt.trim().is_empty() {
            debug!("ignoring blank prompt");
            return Err(SubmitRejected::EmptyPrompt);
        }
        if self.is_busy() {
            debug!("ignoring submit while a reply is pending");
            return Err(SubmitRejected::Busy);
        }

        let prior = self.session.conversation.snapshot().to_vec();
        self.session.conversation.append(Turn::user(prompt));
        self.session.request.last_error = None;
        self.session.request.busy = true;

        let ticket = self.next_ticket;
        self.next_ticket += 1;
        self.phase = Phase::Awaiting { ticket };

        info!(
            session = %self.session.id,
            ticket,
            history = prior.len(),
            "dispatching completion"
        );

        Ok(PendingCompletion {
            ticket,
            prior,
            prompt: prompt.to_string(),
        })
    }

    /// `Awaiting -> Idle` on success or failure of the matching call.
    pub fn resolve(&mut self, outcome: CompletionOutcome) -> Resolution {
        match self.phase {
            Phase::Awaiting { ticket } if ticket == outcome.ticket => {}
            _ => {
                debug!(ticket = outcome.ticket, "dropping stale completion");
                return Resolution::Stale;
            }
        }

        self.phase = Phase::Idle;
        self.session.request.busy = false;

        match outcome.result {
            Ok(text) => {
                info!(session = %self.session.id, ticket = outcome.ticket, "reply received");
                self.session.conversation.append(Turn::assistant(text));
                self.session.request.last_error = None;
                Resolution::Replied
            }
            Err(err) => {
                warn!(session = %self.session.id, ticket = outcome.ticket, error = ?err, "completion failed");
                let message = err.human_readable();
                self.session.request.last_error = Some(message.clone());
                Resolution::Failed(message)
            }
        }
    }

    /// Begin, await the backend, resolve.
    pub async fn submit(&mut self, prompt: &str) -> Result<Resolution, SubmitRejected> {
        let pending = self.begin(prompt)?;
        let backend = self.backend();
        let outcome = pending.run(&*backend).await;
        Ok(self.resolve(outcome))
    }

    /// Throw the session away and start a new one. Replies still in flight
    /// for the old session will come back as [`Resolution::Stale`].
    pub fn reset(&mut self) {
        info!(session = %self.session.id, turns = self.session.conversation.len(), "resetting session");
        self.session = SessionState::new();
        self.phase = Phase::Idle;
    }
}

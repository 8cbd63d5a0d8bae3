//! Append-only conversation store

use crate::events::Turn;
use tokio::sync::watch;

/// Ordered turns of the active session, oldest first.
///
/// Turns can only be appended. Every append bumps a revision counter that
/// observers can follow through [`Conversation::subscribe`]; the signal is
/// one-way and nobody acknowledges it.
#[derive(Debug)]
pub struct Conversation {
    turns: Vec<Turn>,
    revision: watch::Sender<u64>,
}

impl Conversation {
    pub fn new() -> Self {
        let (revision, _) = watch::channel(0);
        Self {
            turns: Vec::new(),
            revision,
        }
    }

    /// Add a turn to the end of the conversation
    pub fn append(&mut self, turn: Turn) {
        self.turns.push(turn);
        self.revision.send_modify(|revision| *revision += 1);
    }

    /// All turns in insertion order, for replay as request context
    pub fn snapshot(&self) -> &[Turn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn last(&self) -> Option<&Turn> {
        self.turns.last()
    }

    /// Number of appends so far
    pub fn revision(&self) -> u64 {
        *self.revision.borrow()
    }

    /// Receive a change signal after every append
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.revision.subscribe()
    }
}

impl Default for Conversation {
    fn default() -> Self {
        Self::new()
    }
}

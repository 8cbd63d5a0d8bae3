//! Terminal chat client that forwards prompts, together with the
//! conversation so far, to an OpenAI-compatible chat completion API.

pub mod app;
pub mod config;
pub mod controller;
pub mod conversation;
pub mod events;
pub mod llm;
pub mod logging;
pub mod prompts;
pub mod tui;
pub mod ui;

pub use config::Config;
pub use controller::{
    CompletionOutcome, InteractionController, PendingCompletion, Resolution, SubmitRejected,
};
pub use conversation::Conversation;
pub use events::{Role, Turn};
pub use llm::{CompletionBackend, CompletionError, CompletionSettings, LlmClient};

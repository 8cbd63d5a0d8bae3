use anyhow::{Context, Result};
use chaat::app::App;
use chaat::config::Config;
use chaat::llm::{CompletionBackend, LlmClient};
use chaat::{logging, tui};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "chaat")]
#[command(version = "0.1.0")]
#[command(about = "Chat with an OpenAI-compatible model from the terminal", long_about = None)]
struct Cli {
    /// Config file (defaults to ~/.chaat/config.toml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Model to request completions from
    #[arg(short, long)]
    model: Option<String>,

    /// Upper bound on generated tokens per reply
    #[arg(long)]
    max_tokens: Option<u32>,

    /// Instruction sent ahead of the conversation
    #[arg(long, conflicts_with = "no_system_prompt")]
    system_prompt: Option<String>,

    /// Send no system instruction
    #[arg(long)]
    no_system_prompt: bool,

    /// Base URL of the completion API
    #[arg(long)]
    base_url: Option<String>,

    /// Debug-level logging
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn apply(&self, config: &mut Config) {
        if let Some(model) = &self.model {
            config.model = model.clone();
        }
        if let Some(max_tokens) = self.max_tokens {
            config.max_tokens = max_tokens;
        }
        if let Some(base_url) = &self.base_url {
            config.base_url = base_url.clone();
        }
        if self.no_system_prompt {
            config.system_prompt = None;
        } else if let Some(prompt) = &self.system_prompt {
            config.system_prompt = Some(prompt.clone());
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = Config::load(cli.config.as_deref())?;
    cli.apply(&mut config);

    logging::init(&Config::log_path()?, cli.verbose)?;
    info!(model = %config.model, base_url = %config.base_url, "starting chaat");

    let api_key = config.resolve_api_key().context(
        "No API key configured. Set OPENAI_API_KEY or add api_key to ~/.chaat/config.toml",
    )?;
    let backend: Arc<dyn CompletionBackend> =
        Arc::new(LlmClient::new(config.completion_settings(), api_key));

    tui::install_panic_hook();
    let mut terminal = tui::init()?;
    let mut events = tui::EventHandler::new(Duration::from_millis(config.ui.tick_rate_ms.max(16)));

    let mut app = App::new(backend, &config, &events);
    let result = app.run(&mut terminal, &mut events).await;

    tui::restore()?;
    if let Err(err) = &result {
        error!(error = %err, "chat loop failed");
    }
    result
}

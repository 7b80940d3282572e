//! Subcommand implementations and the wiring they share.

pub mod history;
pub mod onboard;
pub mod run;
pub mod serve;
pub mod status;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chatrelay_agent::{Backoff, CommandRouter, RelaySettings, UpdateLoop};
use chatrelay_channels::TelegramChannel;
use chatrelay_config::AppConfig;
use chatrelay_memory::{FileConversationStore, FileCursorStore};
use chatrelay_providers::OpenAiCompatClient;
use tracing::{info, warn};

pub fn default_config_path() -> PathBuf {
    AppConfig::config_dir().join("config.toml")
}

pub fn load_config(path: &Path) -> Result<AppConfig, Box<dyn std::error::Error>> {
    Ok(AppConfig::load_with_env(path).map_err(|e| format!("Failed to load config: {e}"))?)
}

/// Wire channel, completion client and stores into an update loop.
pub fn build_relay(config: &AppConfig) -> Result<UpdateLoop, Box<dyn std::error::Error>> {
    config.require_bot_token()?;
    let api_key = config.require_api_key()?;

    let channel = TelegramChannel::from_config(&config.telegram)?;
    let client = OpenAiCompatClient::from_config(&config.completion, api_key)?;
    let conversations = FileConversationStore::open(&config.memory.history_dir)?;
    let cursor = FileCursorStore::new(&config.memory.cursor_file);

    info!(
        model = %config.completion.model,
        history_dir = %config.memory.history_dir.display(),
        "Relay configured"
    );

    Ok(UpdateLoop::new(
        Arc::new(channel),
        CommandRouter::new(Arc::new(client), RelaySettings::from_config(config)),
        Arc::new(conversations),
        Arc::new(cursor),
    )
    .with_backoff(Backoff::from_config(&config.poll))
    .with_poll_timeout(Duration::from_secs(config.telegram.poll_timeout_secs)))
}

/// Resolves on Ctrl-C.
pub async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Cannot listen for Ctrl-C, running until killed");
        std::future::pending::<()>().await;
    }
    info!("Shutdown requested");
}

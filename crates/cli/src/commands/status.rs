//! `chatrelay status`: Show relay status.

use std::path::Path;

use chatrelay_channels::TelegramChannel;
use chatrelay_config::AppConfig;
use chatrelay_core::channel::Channel;
use chatrelay_core::completion::CompletionClient;
use chatrelay_core::memory::{ConversationStore, CursorStore};
use chatrelay_memory::{FileConversationStore, FileCursorStore};
use chatrelay_providers::OpenAiCompatClient;

fn presence(value: &Option<String>) -> &'static str {
    match value.as_deref() {
        Some(v) if !v.is_empty() => "set",
        _ => "missing",
    }
}

fn verdict<E: std::fmt::Display>(result: Result<bool, E>) -> String {
    match result {
        Ok(true) => "✅ reachable".into(),
        Ok(false) => "❌ rejected".into(),
        Err(e) => format!("❌ {e}"),
    }
}

/// Probe the Bot API (`getMe`) and the completion service (`/models`).
async fn check_services(config: &AppConfig) {
    println!();
    match TelegramChannel::from_config(&config.telegram) {
        Ok(channel) => println!("  Telegram:      {}", verdict(channel.health_check().await)),
        Err(e) => println!("  Telegram:      skipped ({e})"),
    }

    match config.require_api_key() {
        Ok(key) => match OpenAiCompatClient::from_config(&config.completion, key) {
            Ok(client) => println!("  Completion:    {}", verdict(client.health_check().await)),
            Err(e) => println!("  Completion:    skipped ({e})"),
        },
        Err(e) => println!("  Completion:    skipped ({e})"),
    }
}

pub async fn run(
    config: &AppConfig,
    config_path: &Path,
    check: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    println!("📨 ChatRelay Status");
    println!("===================");
    println!("  Config file:   {}", config_path.display());
    println!("  Bot token:     {}", presence(&config.telegram.bot_token));
    println!("  API key:       {}", presence(&config.completion.api_key));
    println!("  API URL:       {}", config.completion.api_url);
    println!("  Model:         {}", config.completion.model);
    println!("  Temperature:   {}", config.completion.temperature);
    println!("  Max tokens:    {}", config.completion.max_tokens);
    println!(
        "  Memory:        {} turns / {} chars",
        config.memory.max_turns, config.memory.max_history_chars
    );
    println!("  History dir:   {}", config.memory.history_dir.display());
    println!(
        "  Gateway:       {}:{}{}",
        config.gateway.host, config.gateway.port, config.gateway.path
    );

    let cursor = FileCursorStore::new(&config.memory.cursor_file);
    match cursor.load().await {
        Ok(value) => println!("  Cursor:        {value}"),
        Err(e) => println!("  Cursor:        unreadable ({e})"),
    }

    let store = FileConversationStore::new(&config.memory.history_dir);
    let conversations = store.list().await?;
    println!("  Conversations: {}", conversations.len());

    if check {
        check_services(config).await;
    }

    if config_path.exists() {
        println!("\n  ✅ Config file found");
    } else {
        println!("\n  ⚠️  No config file — run `chatrelay onboard` first");
    }

    Ok(())
}

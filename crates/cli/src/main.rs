//! ChatRelay CLI: the main entry point.
//!
//! Commands:
//! - `run`     : Relay in pull mode (long polling)
//! - `serve`   : Relay in push mode (webhook gateway)
//! - `onboard` : Write a default config file
//! - `status`  : Show configuration, cursor and stored conversations
//! - `history` : Inspect or clear one conversation's memory

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;
mod logging;

#[derive(Parser)]
#[command(
    name = "chatrelay",
    about = "ChatRelay — Telegram to LLM message relay",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to config.toml (default: ~/.chatrelay/config.toml)
    #[arg(short, long, global = true, env = "CHATRELAY_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Relay messages using long polling
    Run,

    /// Relay messages pushed to the webhook gateway
    Serve {
        /// Override the port
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Write a default configuration file
    Onboard,

    /// Show relay status
    Status {
        /// Also contact the Bot API and the completion service
        #[arg(long)]
        check: bool,
    },

    /// Inspect stored conversation memory
    History {
        #[command(subcommand)]
        action: HistoryAction,
    },
}

#[derive(Subcommand)]
enum HistoryAction {
    /// Print the stored turns of a chat
    Show { chat_id: String },

    /// Forget everything stored for a chat
    Clear { chat_id: String },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config_path = cli.config.unwrap_or_else(commands::default_config_path);

    if let Commands::Onboard = cli.command {
        let _guard = logging::init(cli.verbose, None)?;
        return commands::onboard::run(&config_path).await;
    }

    let config = commands::load_config(&config_path)?;
    let _guard = logging::init(
        cli.verbose || config.logging.debug,
        config.logging.file.as_deref(),
    )?;

    match cli.command {
        Commands::Run => commands::run::run(config).await?,
        Commands::Serve { port } => commands::serve::run(config, port).await?,
        Commands::Status { check } => commands::status::run(&config, &config_path, check).await?,
        Commands::History { action } => match action {
            HistoryAction::Show { chat_id } => commands::history::show(&config, &chat_id).await?,
            HistoryAction::Clear { chat_id } => commands::history::clear(&config, &chat_id).await?,
        },
        Commands::Onboard => {}
    }

    Ok(())
}

//! `chatrelay run`: Relay in pull mode.

use chatrelay_config::AppConfig;

pub async fn run(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let relay = super::build_relay(&config)?;

    println!("📨 ChatRelay (long polling)");
    println!("   Model:   {}", config.completion.model);
    println!("   Cursor:  {}", config.memory.cursor_file.display());
    println!("   Press Ctrl-C to stop.\n");

    let state = relay.run_until(super::shutdown_signal()).await;
    println!("Stopped at update {}.", state.cursor);

    Ok(())
}

//! `chatrelay serve`: Relay in push mode behind the webhook gateway.

use std::sync::Arc;

use chatrelay_config::AppConfig;
use chatrelay_gateway::GatewayOptions;

pub async fn run(
    mut config: AppConfig,
    port_override: Option<u16>,
) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(port) = port_override {
        config.gateway.port = port;
    }

    let relay = Arc::new(super::build_relay(&config)?);
    let options = GatewayOptions::from_config(&config);

    println!("📨 ChatRelay Gateway");
    println!("   Listening: {}:{}", options.host, options.port);
    println!("   Webhook:   POST {}", options.path);
    println!(
        "   Secret:    {}",
        if options.secret.is_some() { "required" } else { "not set" }
    );

    chatrelay_gateway::start(relay, options, super::shutdown_signal()).await?;

    Ok(())
}

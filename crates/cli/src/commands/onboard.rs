//! `chatrelay onboard`: First-time setup.

use std::path::Path;

use chatrelay_config::AppConfig;

pub async fn run(config_path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    println!("📨 ChatRelay — First-Time Setup");
    println!("===============================\n");

    if let Some(dir) = config_path.parent() {
        if !dir.as_os_str().is_empty() && !dir.exists() {
            std::fs::create_dir_all(dir)?;
            println!("✅ Created config directory: {}", dir.display());
        }
    }

    let defaults = AppConfig::default();
    if !defaults.memory.history_dir.exists() {
        std::fs::create_dir_all(&defaults.memory.history_dir)?;
        println!(
            "✅ Created history directory: {}",
            defaults.memory.history_dir.display()
        );
    }

    if config_path.exists() {
        println!("\n⚠️  Config already exists at: {}", config_path.display());
        println!("   Edit it manually or delete and re-run onboard.\n");
        return Ok(());
    }

    std::fs::write(config_path, AppConfig::default_toml())?;
    println!("✅ Created config.toml at: {}", config_path.display());
    println!("\n📝 Next steps:");
    println!("   1. Set TELEGRAM_BOT_TOKEN and OPENROUTER_API_KEY (or edit the file)");
    println!("   2. Run: chatrelay run");
    println!("   3. Message your bot!\n");

    Ok(())
}

//! `chatrelay history`: Inspect or clear one conversation.

use chatrelay_config::AppConfig;
use chatrelay_core::memory::ConversationStore;
use chatrelay_core::message::ConversationId;
use chatrelay_memory::FileConversationStore;

pub async fn show(config: &AppConfig, chat_id: &str) -> Result<(), Box<dyn std::error::Error>> {
    let store = FileConversationStore::new(&config.memory.history_dir);
    let turns = store.load(&ConversationId::new(chat_id)).await?;

    if turns.is_empty() {
        println!("No stored turns for chat {chat_id}.");
        return Ok(());
    }

    println!("{}", serde_json::to_string_pretty(&turns)?);
    Ok(())
}

pub async fn clear(config: &AppConfig, chat_id: &str) -> Result<(), Box<dyn std::error::Error>> {
    let store = FileConversationStore::new(&config.memory.history_dir);
    let id = ConversationId::new(chat_id);
    let count = store.load(&id).await?.len();
    store.save(&id, &[]).await?;

    println!("🧹 Cleared {count} turns for chat {chat_id}.");
    Ok(())
}

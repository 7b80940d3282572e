//! In-memory conversation store: useful for testing and ephemeral sessions.

use async_trait::async_trait;
use chatrelay_core::error::MemoryError;
use chatrelay_core::memory::ConversationStore;
use chatrelay_core::message::{ConversationId, Turn};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Stores each conversation's turns in a map.
/// Useful for testing and sessions where persistence isn't needed.
#[derive(Clone, Default)]
pub struct InMemoryConversationStore {
    conversations: Arc<RwLock<HashMap<ConversationId, Vec<Turn>>>>,
}

impl InMemoryConversationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a conversation directly.
    pub async fn insert(&self, id: ConversationId, turns: Vec<Turn>) {
        self.conversations.write().await.insert(id, turns);
    }

    /// Whether a record exists at all (an emptied record still exists).
    pub async fn contains(&self, id: &ConversationId) -> bool {
        self.conversations.read().await.contains_key(id)
    }
}

#[async_trait]
impl ConversationStore for InMemoryConversationStore {
    fn name(&self) -> &str {
        "in_memory"
    }

    async fn load(&self, id: &ConversationId) -> Result<Vec<Turn>, MemoryError> {
        Ok(self
            .conversations
            .read()
            .await
            .get(id)
            .cloned()
            .unwrap_or_default())
    }

    async fn save(&self, id: &ConversationId, turns: &[Turn]) -> Result<(), MemoryError> {
        self.conversations
            .write()
            .await
            .insert(id.clone(), turns.to_vec());
        Ok(())
    }

    async fn list(&self) -> Result<Vec<ConversationId>, MemoryError> {
        let mut ids: Vec<ConversationId> = self.conversations.read().await.keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn conversations_are_partitioned_by_id() {
        let store = InMemoryConversationStore::new();
        store.save(&"a".into(), &[Turn::user("for a")]).await.unwrap();
        store.save(&"b".into(), &[Turn::user("for b")]).await.unwrap();

        assert_eq!(store.load(&"a".into()).await.unwrap(), vec![Turn::user("for a")]);
        assert_eq!(store.load(&"b".into()).await.unwrap(), vec![Turn::user("for b")]);
        assert!(store.load(&"c".into()).await.unwrap().is_empty());
        assert_eq!(store.list().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn emptied_record_still_exists() {
        let store = InMemoryConversationStore::new();
        store.save(&"a".into(), &[]).await.unwrap();
        assert!(store.contains(&"a".into()).await);
    }
}

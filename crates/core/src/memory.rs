//! Persistence traits: conversation memory and the update cursor.
//!
//! Both are pure data access: no network, no trimming policy. Callers
//! decide what to store; stores decide how to make it durable.

use async_trait::async_trait;
use crate::error::MemoryError;
use crate::message::{ConversationId, Turn};

/// Loads and saves the ordered turn list of each conversation.
#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// Human-readable backend name (e.g., "file", "in_memory").
    fn name(&self) -> &str;

    /// Load the turns of a conversation. A conversation never seen before
    /// loads as an empty list.
    async fn load(&self, id: &ConversationId) -> Result<Vec<Turn>, MemoryError>;

    /// Replace the stored turns of a conversation as a whole.
    async fn save(&self, id: &ConversationId, turns: &[Turn]) -> Result<(), MemoryError>;

    /// List every conversation that has a stored record.
    async fn list(&self) -> Result<Vec<ConversationId>, MemoryError> {
        Ok(Vec::new())
    }
}

/// Loads and saves the last accepted update id.
#[async_trait]
pub trait CursorStore: Send + Sync {
    /// The persisted cursor, or 0 when nothing has been stored yet.
    async fn load(&self) -> Result<i64, MemoryError>;

    /// Persist a new cursor value.
    async fn save(&self, cursor: i64) -> Result<(), MemoryError>;
}

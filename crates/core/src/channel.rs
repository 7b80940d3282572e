//! Channel trait: the abstraction over the messaging platform.
//!
//! A Channel fetches batches of inbound updates (long polling) and sends
//! reply text back to a conversation. Push delivery (webhooks) produces the
//! same `Update` values through the gateway.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use crate::error::ChannelError;
use crate::message::ConversationId;

/// One inbound update from the platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Update {
    /// Platform-assigned, monotonically increasing identifier
    pub update_id: i64,

    /// The message carried by this update, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<InboundMessage>,
}

/// The parts of an inbound message the relay cares about.
///
/// Both fields are optional: updates without a destination or text body
/// are dropped silently during dispatch.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct InboundMessage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<ConversationId>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

impl Update {
    /// Build a text update (mostly for tests and stubs).
    pub fn text(update_id: i64, conversation_id: impl Into<ConversationId>, text: &str) -> Self {
        Self {
            update_id,
            message: Some(InboundMessage {
                conversation_id: Some(conversation_id.into()),
                text: Some(text.to_string()),
            }),
        }
    }

    /// Conversation id, if the update carries a message with a chat.
    pub fn conversation_id(&self) -> Option<&ConversationId> {
        self.message.as_ref()?.conversation_id.as_ref()
    }

    /// Destination and text body, or `None` for updates that must be dropped.
    pub fn extract(&self) -> Option<(&ConversationId, &str)> {
        let message = self.message.as_ref()?;
        Some((message.conversation_id.as_ref()?, message.text.as_deref()?))
    }
}

/// The core Channel trait.
///
/// Implementations handle platform-specific request formatting, timeouts,
/// and outbound length limits.
#[async_trait]
pub trait Channel: Send + Sync {
    /// Human-readable channel name (e.g., "telegram").
    fn name(&self) -> &str;

    /// Long-poll for updates with `update_id >= offset`.
    ///
    /// A poll that times out without updates returns an empty batch, not an
    /// error. Errors mean the transport failed and the caller should back off.
    async fn fetch_updates(
        &self,
        offset: i64,
        timeout: Duration,
    ) -> std::result::Result<Vec<Update>, ChannelError>;

    /// Send a reply to a conversation.
    async fn send(
        &self,
        conversation_id: &ConversationId,
        text: &str,
    ) -> std::result::Result<(), ChannelError>;

    /// Health check: are the credentials accepted?
    async fn health_check(&self) -> std::result::Result<bool, ChannelError> {
        Ok(true)
    }
}

//! Messaging platform channels for ChatRelay.
//!
//! Each channel connects to a chat platform, hands inbound updates to the
//! update loop, and relays reply text back to a conversation.
//!
//! Available channels:
//! - **Telegram**: Telegram Bot API (`getUpdates` long polling, `sendMessage`)

pub mod telegram;

pub use telegram::{TRUNCATION_MARKER, TelegramChannel, parse_update, truncate_for_display};

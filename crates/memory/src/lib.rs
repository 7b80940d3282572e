//! Persistence implementations for ChatRelay.
//!
//! - **File**: one JSON record per conversation plus a cursor file
//! - **In-memory**: for tests and ephemeral runs

pub mod cursor;
pub mod file_backend;
pub mod in_memory;

pub use cursor::{FileCursorStore, InMemoryCursorStore};
pub use file_backend::FileConversationStore;
pub use in_memory::InMemoryConversationStore;

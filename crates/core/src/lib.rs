//! # ChatRelay Core
//!
//! Domain types, traits, and error definitions for the ChatRelay message relay.
//! This crate has **zero framework dependencies**: it defines the domain model
//! that all other crates implement against.
//!
//! ## Design Philosophy
//!
//! Every external collaborator is a trait here: the messaging platform
//! (`Channel`), the language model (`CompletionClient`), and persistence
//! (`ConversationStore`, `CursorStore`). Implementations live in their
//! respective crates, so the relay logic can be driven by stubs in tests.

pub mod error;
pub mod message;
pub mod completion;
pub mod channel;
pub mod memory;

// Re-export key types at crate root for ergonomics
pub use error::{ChannelError, CompletionError, Error, MemoryError, Result};
pub use message::{ChatMessage, ConversationId, Role, Turn, TurnRole};
pub use completion::{CompletionClient, CompletionRequest, CompletionResponse, GenerationParams, Usage};
pub use channel::{Channel, InboundMessage, Update};
pub use memory::{ConversationStore, CursorStore};

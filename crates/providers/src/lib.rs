//! Completion service clients for ChatRelay.
//!
//! All clients implement the `chatrelay_core::CompletionClient` trait.

pub mod openai_compat;

pub use openai_compat::OpenAiCompatClient;

//! Error types for the ChatRelay domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error variant.

use thiserror::Error;

/// The top-level error type for all ChatRelay operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Completion service errors ---
    #[error("Completion error: {0}")]
    Completion(#[from] CompletionError),

    // --- Channel errors ---
    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),

    // --- Memory errors ---
    #[error("Memory error: {0}")]
    Memory(#[from] MemoryError),

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

/// Classified failure of a completion-service call.
///
/// The `Display` text is shown to end users inside the failure notice,
/// so it stays short and free of secrets.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompletionError {
    /// Network-level failure: connect error, timeout, reset.
    #[error("network error: {0}")]
    Transport(String),

    /// The service answered with a non-success status.
    #[error("HTTP {status}: {body}")]
    Service { status: u16, body: String },

    /// Success status, but no usable text in the response.
    #[error("No response from model")]
    EmptyResponse,
}

impl CompletionError {
    /// Whether this failure happened before the service produced an answer.
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_))
    }
}

#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("Channel not configured: {0}")]
    NotConfigured(String),

    #[error("Message delivery failed to {chat_id}: {reason}")]
    DeliveryFailed { chat_id: String, reason: String },

    #[error("Channel connection lost: {0}")]
    ConnectionLost(String),

    #[error("Invalid update payload: {0}")]
    InvalidPayload(String),
}

#[derive(Debug, Error)]
pub enum MemoryError {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Corrupted record at {location}: {reason}")]
    Corrupted { location: String, reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn service_error_displays_status_and_body() {
        let err = Error::Completion(CompletionError::Service {
            status: 500,
            body: "upstream exploded".into(),
        });
        assert!(err.to_string().contains("500"));
        assert!(err.to_string().contains("upstream exploded"));
    }

    #[test]
    fn empty_response_is_not_transport() {
        assert!(!CompletionError::EmptyResponse.is_transport());
        assert!(CompletionError::Transport("reset".into()).is_transport());
    }

    #[test]
    fn channel_error_converts_into_top_level() {
        let err: Error = ChannelError::ConnectionLost("timeout".into()).into();
        assert!(matches!(err, Error::Channel(_)));
        assert!(err.to_string().contains("timeout"));
    }
}

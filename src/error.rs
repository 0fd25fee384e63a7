use std::time::Duration;
use thiserror::Error;

/// Every failure a chat session can run into.
///
/// Only `Validation` is meant to be recovered from by re-prompting the user.
/// The rest are surfaced with their raw text; nothing is retried.
#[derive(Debug, Error)]
pub enum ChatError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("{0}")]
    Validation(String),

    #[error("Document store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Transcript changed underneath this session (expected {expected} entries, found {found})")]
    WriteConflict {
        expected: usize,
        found: usize,
    },

    #[error("Response generation failed: {0}")]
    ExternalService(String),

    #[error("Response generation timed out after {0:?}")]
    Timeout(Duration),
}

impl ChatError {
    /// Stable identifier sent to clients alongside the message.
    pub fn kind(&self) -> &'static str {
        match self {
            ChatError::Configuration(_) => "configuration",
            ChatError::Validation(_) => "validation",
            ChatError::StoreUnavailable(_) => "store_unavailable",
            ChatError::WriteConflict { .. } => "write_conflict",
            ChatError::ExternalService(_) => "external_service",
            ChatError::Timeout(_) => "timeout",
        }
    }

    pub fn is_recoverable(&self) -> bool {
        matches!(self, ChatError::Validation(_))
    }
}

impl From<redis::RedisError> for ChatError {
    fn from(err: redis::RedisError) -> Self {
        ChatError::StoreUnavailable(err.to_string())
    }
}

impl From<reqwest::Error> for ChatError {
    fn from(err: reqwest::Error) -> Self {
        ChatError::ExternalService(err.to_string())
    }
}

pub type ChatResult<T> = Result<T, ChatError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_validation_is_recoverable() {
        assert!(ChatError::Validation("empty".into()).is_recoverable());
        assert!(!ChatError::StoreUnavailable("down".into()).is_recoverable());
        assert!(!ChatError::Timeout(Duration::from_secs(5)).is_recoverable());
    }

    #[test]
    fn conflict_message_names_both_lengths() {
        let err = ChatError::WriteConflict { expected: 2, found: 4 };
        assert_eq!(err.kind(), "write_conflict");
        assert!(err.to_string().contains("expected 2"));
        assert!(err.to_string().contains("found 4"));
    }
}

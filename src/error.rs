//! Error types for the chat gateway.
//!
//! This module defines a single error type covering every failure the gateway
//! can report, from malformed caller input to backend runs that never finish.

use crate::models::ProviderTag;
use std::time::Duration;
use thiserror::Error;

/// Comprehensive error type for gateway operations.
///
/// Adapters never swallow backend failures: they attach the provider and the
/// stage that failed and propagate. Nothing in this crate retries.
#[derive(Debug, Error)]
pub enum ChatGateError {
    /// Malformed or missing caller input
    #[error("Validation error: {0}")]
    Validation(String),

    /// Missing credential or endpoint
    #[error("Configuration error: {0}")]
    Config(String),

    /// Backend rejected the request or returned an unusable shape
    #[error("Provider error ({provider}, {stage}): {message}")]
    Provider {
        /// Which provider failed
        provider: ProviderTag,
        /// Which step of the turn failed (e.g. "create run")
        stage: &'static str,
        /// Diagnostic message, preserved from the backend where possible
        message: String,
    },

    /// A stateful run did not reach a terminal state within its budget
    #[error("Run {run_id} timed out after {waited:?}")]
    RunTimeout {
        /// The run that was being polled
        run_id: String,
        /// How long the poller waited before giving up
        waited: Duration,
    },

    /// The backend asked for a capability this gateway does not implement
    #[error("Run {run_id} requires action - function calls are not supported")]
    UnsupportedAction {
        /// The run that requested action
        run_id: String,
    },

    /// The session store could not be read or written
    #[error("Session store error: {0}")]
    Store(String),

    /// Error from the reqwest HTTP client
    #[error("Reqwest error: {0}")]
    Reqwest(#[from] reqwest::Error),

    /// JSON serialization or deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error from standard library
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ChatGateError {
    /// Shorthand for building a [`ChatGateError::Provider`].
    pub fn provider(provider: ProviderTag, stage: &'static str, message: impl Into<String>) -> Self {
        Self::Provider {
            provider,
            stage,
            message: message.into(),
        }
    }

    /// Returns true when the caller, not the gateway or a backend, is at fault.
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_error_names_provider_and_stage() {
        let err = ChatGateError::provider(ProviderTag::OpenAIAssistant, "create run", "boom");
        assert_eq!(
            err.to_string(),
            "Provider error (openai-assistant, create run): boom"
        );
        assert!(!err.is_client_error());
    }

    #[test]
    fn only_validation_is_client_fault() {
        assert!(ChatGateError::Validation("Message is required".into()).is_client_error());
        assert!(!ChatGateError::Config("OpenAI API key not configured".into()).is_client_error());
        assert!(!ChatGateError::RunTimeout {
            run_id: "run_1".into(),
            waited: Duration::from_secs(30),
        }
        .is_client_error());
    }
}

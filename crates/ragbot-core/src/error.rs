//! RagBot error taxonomy.
//!
//! Startup errors (corpus, model, config) keep the process from reaching a
//! ready state. Per-query errors (embedding, completion, deadline) are turned
//! into a reply by the bot front end.

use std::fmt;

pub type Result<T> = std::result::Result<T, RagBotError>;

/// Why a call to a remote provider failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureReason {
    /// Connection refused, DNS, TLS, reset, timeout inside the HTTP client.
    Network,
    /// 401 / 403 from the provider.
    Unauthorized,
    /// 429 from the provider.
    RateLimited,
    /// Any other non-success status.
    Api(u16),
    /// The provider answered but the payload was unusable.
    Malformed,
}

impl FailureReason {
    /// Classify a non-success HTTP status.
    pub fn from_status(status: u16) -> Self {
        match status {
            401 | 403 => FailureReason::Unauthorized,
            429 => FailureReason::RateLimited,
            other => FailureReason::Api(other),
        }
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::Network => write!(f, "network failure"),
            FailureReason::Unauthorized => write!(f, "authentication failed"),
            FailureReason::RateLimited => write!(f, "rate limited"),
            FailureReason::Api(status) => write!(f, "API error {status}"),
            FailureReason::Malformed => write!(f, "malformed response"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RagBotError {
    #[error("Corpus load error: {0}")]
    CorpusLoad(String),

    #[error("Corpus integrity error: {0}")]
    CorpusIntegrity(String),

    #[error("Embedding error ({reason}): {detail}")]
    Embedding { reason: FailureReason, detail: String },

    #[error("Unknown model: no tokenizer mapping for '{0}'")]
    UnknownModel(String),

    #[error("Completion error ({reason}): {detail}")]
    Completion { reason: FailureReason, detail: String },

    #[error("Deadline of {0:?} exceeded")]
    DeadlineExceeded(std::time::Duration),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("API key missing for provider: {0}")]
    ApiKeyMissing(String),

    #[error("Provider not found: {0}")]
    ProviderNotFound(String),

    #[error("Channel error: {0}")]
    Channel(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

impl RagBotError {
    pub fn embedding(reason: FailureReason, detail: impl Into<String>) -> Self {
        RagBotError::Embedding {
            reason,
            detail: detail.into(),
        }
    }

    pub fn completion(reason: FailureReason, detail: impl Into<String>) -> Self {
        RagBotError::Completion {
            reason,
            detail: detail.into(),
        }
    }

    /// Stable short label, suitable for logs and user-facing replies.
    pub fn kind(&self) -> &'static str {
        match self {
            RagBotError::CorpusLoad(_) => "corpus_load",
            RagBotError::CorpusIntegrity(_) => "corpus_integrity",
            RagBotError::Embedding { .. } => "embedding",
            RagBotError::UnknownModel(_) => "unknown_model",
            RagBotError::Completion { .. } => "completion",
            RagBotError::DeadlineExceeded(_) => "deadline",
            RagBotError::Config(_) => "config",
            RagBotError::ApiKeyMissing(_) => "api_key_missing",
            RagBotError::ProviderNotFound(_) => "provider_not_found",
            RagBotError::Channel(_) => "channel",
            RagBotError::Io(_) => "io",
            RagBotError::Other(_) => "other",
        }
    }

    /// Provider failure reason, if this error came from a remote call.
    pub fn reason(&self) -> Option<FailureReason> {
        match self {
            RagBotError::Embedding { reason, .. } | RagBotError::Completion { reason, .. } => {
                Some(*reason)
            }
            _ => None,
        }
    }

    /// True for errors scoped to a single query; the serving loop survives these.
    pub fn is_query_failure(&self) -> bool {
        matches!(
            self,
            RagBotError::Embedding { .. }
                | RagBotError::Completion { .. }
                | RagBotError::DeadlineExceeded(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reason_from_status() {
        assert_eq!(FailureReason::from_status(401), FailureReason::Unauthorized);
        assert_eq!(FailureReason::from_status(403), FailureReason::Unauthorized);
        assert_eq!(FailureReason::from_status(429), FailureReason::RateLimited);
        assert_eq!(FailureReason::from_status(500), FailureReason::Api(500));
    }

    #[test]
    fn test_error_carries_kind_and_cause() {
        let err = RagBotError::completion(FailureReason::RateLimited, "openai: slow down");
        assert_eq!(err.kind(), "completion");
        assert_eq!(err.reason(), Some(FailureReason::RateLimited));
        assert!(err.is_query_failure());
        assert!(err.to_string().contains("rate limited"));
        assert!(err.to_string().contains("slow down"));
    }

    #[test]
    fn test_startup_errors_are_not_query_failures() {
        assert!(!RagBotError::UnknownModel("gpt-x".into()).is_query_failure());
        assert!(!RagBotError::CorpusLoad("missing".into()).is_query_failure());
        assert!(RagBotError::DeadlineExceeded(std::time::Duration::from_secs(1)).is_query_failure());
    }
}

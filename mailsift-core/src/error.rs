//! Error types for mailsift-core

use thiserror::Error;

/// Failure category for a single provider request.
///
/// Rate-limited and service-unavailable failures are transient and retried;
/// everything else fails the provider immediately (fallback to the next
/// configured provider still applies).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderErrorKind {
    /// HTTP 429 without quota markers
    RateLimited,
    /// HTTP 429 with quota/billing markers; aborts a running batch
    QuotaExhausted,
    /// 5xx or a transport-level failure
    ServiceUnavailable,
    /// The provider refused the content
    SafetyBlocked,
    /// Authentication, malformed request/response, anything else
    Other,
}

impl ProviderErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderErrorKind::RateLimited => "rate-limited",
            ProviderErrorKind::QuotaExhausted => "quota-exhausted",
            ProviderErrorKind::ServiceUnavailable => "service-unavailable",
            ProviderErrorKind::SafetyBlocked => "safety-blocked",
            ProviderErrorKind::Other => "other",
        }
    }

    /// Whether a failure of this kind is worth retrying against the same provider.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ProviderErrorKind::RateLimited | ProviderErrorKind::ServiceUnavailable
        )
    }
}

impl std::fmt::Display for ProviderErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Main error type for the mailsift-core library
#[derive(Error, Debug)]
pub enum Error {
    /// Storage layer error
    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration error (including: no viable classification provider)
    #[error("configuration error: {0}")]
    Config(String),

    /// Transport-level HTTP failure (connect, timeout); the gateway maps
    /// this onto the provider being called
    #[error("HTTP transport error: {0}")]
    Http(String),

    /// A single provider's request failed
    #[error("provider {provider} request failed ({kind}): {message}")]
    Provider {
        provider: String,
        kind: ProviderErrorKind,
        message: String,
    },

    /// Every viable provider was tried and failed
    #[error("all {attempted} viable provider(s) failed; last error: {last}")]
    AllProvidersFailed { attempted: usize, last: Box<Error> },
}

impl Error {
    /// Whether retrying the same provider could help.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Provider { kind, .. } if kind.is_retryable())
    }

    /// Whether this error (or the last error behind a provider-fallback
    /// failure) signals an exhausted quota. A running batch stops early on it.
    pub fn is_quota_exhausted(&self) -> bool {
        match self {
            Error::Provider {
                kind: ProviderErrorKind::QuotaExhausted,
                ..
            } => true,
            Error::AllProvidersFailed { last, .. } => last.is_quota_exhausted(),
            _ => false,
        }
    }
}

/// Result type alias for mailsift-core
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_kinds() {
        assert!(ProviderErrorKind::RateLimited.is_retryable());
        assert!(ProviderErrorKind::ServiceUnavailable.is_retryable());
        assert!(!ProviderErrorKind::QuotaExhausted.is_retryable());
        assert!(!ProviderErrorKind::SafetyBlocked.is_retryable());
        assert!(!ProviderErrorKind::Other.is_retryable());
    }

    #[test]
    fn test_quota_detection_through_fallback() {
        let inner = Error::Provider {
            provider: "gemini".to_string(),
            kind: ProviderErrorKind::QuotaExhausted,
            message: "RESOURCE_EXHAUSTED".to_string(),
        };
        let outer = Error::AllProvidersFailed {
            attempted: 2,
            last: Box::new(inner),
        };
        assert!(outer.is_quota_exhausted());

        let unrelated = Error::Config("no provider".to_string());
        assert!(!unrelated.is_quota_exhausted());
    }
}

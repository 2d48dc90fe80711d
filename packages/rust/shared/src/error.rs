//! Error types for webharvest.
//!
//! Library crates use [`HarvestError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

/// Top-level error type for all webharvest operations.
#[derive(Debug, thiserror::Error)]
pub enum HarvestError {
    /// Configuration parsing or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// URL refused by the SSRF guard or blocked by robots.txt.
    /// Surfaced on records with status_code 0.
    #[error("policy refused: {reason}")]
    Policy { reason: String },

    /// Network/transport error: connect, DNS, timeout, body read.
    #[error("network error: {0}")]
    Network(String),

    /// Non-2xx HTTP response.
    #[error("HTTP {status} from {url}")]
    Http { status: u16, url: String },

    /// Response exceeded the configured size cap.
    #[error("response too large: exceeds {limit} bytes")]
    TooLarge { limit: usize },

    /// Malformed input that the parser cannot tolerate (XML for feeds
    /// and sitemaps; HTML is parsed leniently and never fails).
    #[error("parse error: {message}")]
    Parse { message: String },

    /// Missing or invalid request field.
    #[error("validation error: {message}")]
    Validation { message: String },

    /// Workflow invoked before Initialize.
    #[error("engine not initialized")]
    NotInitialized,

    /// Attestation sink call failed or sink not configured.
    #[error("sink error: {0}")]
    Sink(String),

    /// Job queue call failed or queue not configured.
    #[error("queue error: {0}")]
    Queue(String),
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, HarvestError>;

impl HarvestError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a policy-refused error from any displayable message.
    pub fn policy(msg: impl Into<String>) -> Self {
        Self::Policy {
            reason: msg.into(),
        }
    }

    /// Create a parse error from any displayable message.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// The HTTP status to record on a failed fetch: the numeric status
    /// for non-2xx responses, 0 for everything else (policy refusals,
    /// transport failures, oversized bodies).
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Http { status, .. } => *status,
            _ => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_formatting() {
        let err = HarvestError::policy("cloud metadata endpoint");
        assert_eq!(err.to_string(), "policy refused: cloud metadata endpoint");

        let err = HarvestError::Http {
            status: 404,
            url: "http://example.com/missing".into(),
        };
        assert!(err.to_string().contains("404"));
    }

    #[test]
    fn status_code_mapping() {
        let err = HarvestError::Http {
            status: 503,
            url: "http://example.com/".into(),
        };
        assert_eq!(err.status_code(), 503);

        assert_eq!(HarvestError::policy("blocked").status_code(), 0);
        assert_eq!(HarvestError::TooLarge { limit: 100 }.status_code(), 0);
    }
}

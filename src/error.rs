use std::time::Duration;
use thiserror::Error;

/// Per-URL failure taxonomy. Every variant is caught at the batch boundary
/// and turned into an `AuditResult` with `status: error`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuditError {
    #[error("invalid URL {input:?}: {reason}")]
    InvalidUrl { input: String, reason: String },

    #[error("no GTM container found on {url}")]
    NoContainerFound { url: String },

    #[error("measurement failed for {url}: {message}")]
    Measurement { url: String, message: String },

    #[error("timed out after {}s while {stage} for {url}", .after.as_secs())]
    Timeout {
        url: String,
        stage: String,
        after: Duration,
    },
}

impl AuditError {
    pub fn measurement(url: &str, err: &anyhow::Error) -> Self {
        AuditError::Measurement {
            url: url.to_string(),
            message: format!("{err:#}"),
        }
    }

    /// Recovers a domain error raised inside an `anyhow` chain, otherwise
    /// wraps the whole chain as a measurement failure.
    pub fn from_anyhow(url: &str, err: anyhow::Error) -> Self {
        match err.downcast::<AuditError>() {
            Ok(domain) => domain,
            Err(other) => AuditError::measurement(url, &other),
        }
    }

    pub fn http_status(&self) -> u16 {
        match self {
            AuditError::InvalidUrl { .. } => 400,
            _ => 500,
        }
    }
}

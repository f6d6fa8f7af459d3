pub mod adapter;
pub mod mock;
pub mod ollama;
pub mod openai;
pub mod parser;
pub mod prompt;
pub mod repair;
pub mod rules;
pub mod sanitize;
pub mod types;
pub mod usage;

pub use adapter::*;
pub use mock::*;
pub use ollama::*;
pub use openai::*;
pub use parser::*;
pub use prompt::*;
pub use repair::*;
pub use rules::*;
pub use sanitize::*;
pub use types::*;
pub use usage::*;

use thiserror::Error;

/// Failures at the extraction boundary.
///
/// None of these are retried inside the adapter; `is_transient` tells the
/// caller whether a retry could succeed.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExtractionError {
    #[error("Service returned no structured object")]
    NoStructuredOutput { raw: String },

    #[error("Service output is not a valid record after repair: {reason}")]
    MalformedOutput { reason: String, raw: String },

    #[error("Extraction service unavailable: {reason}")]
    ServiceUnavailable { reason: String, transient: bool },

    #[error("Token budget exhausted ({used} of {limit} tokens used)")]
    BudgetExhausted { used: u64, limit: u64 },
}

impl ExtractionError {
    /// Whether the same call might succeed later.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::ServiceUnavailable { transient: true, .. })
    }

    /// Raw service text carried for diagnostics, when there is one.
    pub fn raw_output(&self) -> Option<&str> {
        match self {
            Self::NoStructuredOutput { raw } | Self::MalformedOutput { raw, .. } => Some(raw),
            _ => None,
        }
    }

    pub(crate) fn unavailable(reason: impl Into<String>, transient: bool) -> Self {
        Self::ServiceUnavailable {
            reason: reason.into(),
            transient,
        }
    }

    /// Map a non-success HTTP status to an error.
    ///
    /// 408, 429 and 5xx are transient; authentication and other client
    /// errors are permanent.
    pub(crate) fn from_status(status: u16, body: &str) -> Self {
        let snippet: String = body.chars().take(200).collect();
        match status {
            401 | 403 => Self::unavailable(
                format!("credential rejected (HTTP {status})"),
                false,
            ),
            408 | 429 | 500..=599 => {
                Self::unavailable(format!("HTTP {status}: {snippet}"), true)
            }
            _ => Self::unavailable(format!("HTTP {status}: {snippet}"), false),
        }
    }

    /// Map a transport-level reqwest failure to an error.
    pub(crate) fn from_transport(e: &reqwest::Error, endpoint: &str, timeout_secs: u64) -> Self {
        if e.is_timeout() {
            Self::unavailable(format!("request timed out after {timeout_secs}s"), true)
        } else if e.is_connect() {
            Self::unavailable(format!("cannot connect to {endpoint}"), true)
        } else if e.is_decode() {
            Self::unavailable(format!("undecodable response body: {e}"), false)
        } else {
            Self::unavailable(e.to_string(), true)
        }
    }
}

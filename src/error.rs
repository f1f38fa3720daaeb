//! Error taxonomy for a check run.
//!
//! A run is all-or-nothing: any of these aborts it before a report exists.
//! "No hits" is never an error.

use thiserror::Error;

/// Errors that abort a check run.
#[derive(Error, Debug)]
pub enum CheckError {
    #[error("{0}")]
    Usage(String),

    #[error("invalid selector `{selector}`: {reason}")]
    InvalidSelector { selector: String, reason: String },

    #[error("failed to load {url}: {reason}")]
    Navigation { url: String, reason: String },

    #[error("scope not found: no element matches `{0}`")]
    ScopeNotFound(String),

    #[error("browser error: {0}")]
    Browser(String),

    #[error("DevTools protocol error: {0}")]
    Protocol(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CheckError {
    pub(crate) fn navigation(url: &str, reason: impl Into<String>) -> Self {
        Self::Navigation {
            url: url.to_string(),
            reason: reason.into(),
        }
    }

    /// Wraps a transport-level failure (`anyhow` chain) as a browser error.
    pub(crate) fn browser(err: &anyhow::Error) -> Self {
        Self::Browser(format!("{err:#}"))
    }
}

pub type Result<T> = std::result::Result<T, CheckError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scope_not_found_names_the_selector() {
        let err = CheckError::ScopeNotFound("#content".into());
        assert_eq!(err.to_string(), "scope not found: no element matches `#content`");
    }

    #[test]
    fn navigation_message_is_verbatim() {
        let err = CheckError::navigation("https://example.com", "net::ERR_NAME_NOT_RESOLVED");
        assert_eq!(
            err.to_string(),
            "failed to load https://example.com: net::ERR_NAME_NOT_RESOLVED"
        );
    }

    #[test]
    fn browser_error_keeps_context_chain() {
        let inner = anyhow::anyhow!("connection refused").context("CDP connect failed");
        let err = CheckError::browser(&inner);
        assert_eq!(err.to_string(), "browser error: CDP connect failed: connection refused");
    }
}

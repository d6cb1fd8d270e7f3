//! External catalog integration for TMDB.
//!
//! The harvester only needs one operation from the metadata service: fetch a
//! single series' detail record by identifier. Failures are per item and are
//! classified so callers can tell "not found" apart from transient trouble.

mod tmdb;
mod types;

pub use tmdb::{TmdbClient, TmdbConfig};
pub use types::*;

use async_trait::async_trait;
use thiserror::Error;

/// Errors that can occur when interacting with external catalogs.
#[derive(Debug, Error)]
pub enum ExternalCatalogError {
    /// HTTP request failed (connect, timeout, body read).
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    /// Rate limit exceeded.
    #[error("Rate limit exceeded, please wait before retrying")]
    RateLimitExceeded,

    /// Resource not found (404).
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// API returned an error.
    #[error("API error: {status} - {message}")]
    ApiError { status: u16, message: String },

    /// Failed to parse response.
    #[error("Failed to parse response: {0}")]
    ParseError(String),

    /// Client not configured (missing API key, etc.).
    #[error("Client not configured: {0}")]
    NotConfigured(String),
}

impl ExternalCatalogError {
    /// The item does not exist upstream and can be dropped silently.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Anything other than not-found. Treated the same for the current run
    /// (the item is absent) but logged louder.
    pub fn is_transient(&self) -> bool {
        !self.is_not_found()
    }

    /// Short label for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::HttpError(_) => "http",
            Self::RateLimitExceeded => "rate_limited",
            Self::NotFound(_) => "not_found",
            Self::ApiError { .. } => "api",
            Self::ParseError(_) => "parse",
            Self::NotConfigured(_) => "not_configured",
        }
    }
}

/// Source of series detail records.
#[async_trait]
pub trait SeriesCatalog: Send + Sync {
    /// Fetch one series' detail record.
    async fn fetch_detail(&self, id: u32) -> Result<CatalogItem, ExternalCatalogError>;

    /// Name used in logs and metrics.
    fn name(&self) -> &'static str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_is_not_transient() {
        let err = ExternalCatalogError::NotFound("TV series ID 1".to_string());
        assert!(err.is_not_found());
        assert!(!err.is_transient());
        assert_eq!(err.kind(), "not_found");
    }

    #[test]
    fn test_other_errors_are_transient() {
        let errors = vec![
            ExternalCatalogError::RateLimitExceeded,
            ExternalCatalogError::ApiError {
                status: 503,
                message: "unavailable".to_string(),
            },
            ExternalCatalogError::ParseError("bad json".to_string()),
            ExternalCatalogError::NotConfigured("Invalid TMDB API key".to_string()),
        ];

        for err in errors {
            assert!(err.is_transient(), "{} should be transient", err);
        }
    }

    #[test]
    fn test_error_display() {
        let err = ExternalCatalogError::ApiError {
            status: 500,
            message: "boom".to_string(),
        };
        assert_eq!(err.to_string(), "API error: 500 - boom");
    }
}

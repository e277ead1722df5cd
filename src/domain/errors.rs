//! Domain errors. Used by ports and use cases.
//!
//! Adapters map infrastructure errors into these.

use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DomainError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("Telegram gateway error: {0}")]
    TgGateway(String),

    /// FloodWait error: caller should reschedule job after `seconds` seconds.
    #[error("FloodWait: retry after {seconds} seconds")]
    FloodWait { seconds: u64 },

    #[error("permanent upstream error: {0}")]
    Permanent(String),

    #[error("Repository error: {0}")]
    Repo(String),

    #[error("cache error: {0}")]
    Cache(String),

    #[error("data validation error: {0}")]
    Validation(String),

    #[error("AI analysis failed: {0}")]
    Ai(String),

    #[error("rate limited; retry after {remaining:?}")]
    RateLimited { remaining: Duration },

    #[error("operation cancelled")]
    Cancelled,

    #[error("internal invariant violated: {0}")]
    Internal(String),
}

impl DomainError {
    /// True for errors that are worth retrying with backoff; false for
    /// permanent failures (auth, invalid request, not found) that must
    /// surface immediately.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            DomainError::TgGateway(_) | DomainError::FloodWait { .. } | DomainError::Cache(_)
        )
    }
}

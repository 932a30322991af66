//! Typed errors for the mining pipeline.
//!
//! The resolver distinguishes three fatal causes — rate-limit exhaustion,
//! a memory ceiling breach, and a missing root ticket — so callers can react
//! to each. Everything else (transport, malformed responses, bad patterns,
//! bad configuration) is carried alongside them in [`MinerError`].
//!
//! Skippable conditions (a malformed URL in ticket text, an unknown ticket
//! referenced only textually) never become a `MinerError`; they are warned
//! on stderr and the resolution continues.

use thiserror::Error;

/// Errors surfaced by the classifier, resolver, governors, and platform
/// clients.
#[derive(Debug, Error)]
pub enum MinerError {
    /// The upstream service signalled "too many requests". Retryable by the
    /// rate governor; fatal once retries are exhausted, at which point this
    /// exact value propagates unchanged.
    #[error("rate limited (HTTP {status}): {message}")]
    RateLimited {
        /// HTTP status that carried the signal (usually 429).
        status: u16,
        /// Server-suggested wait in seconds, when a `Retry-After` header was present.
        retry_after: Option<f64>,
        message: String,
    },

    /// Resident memory exceeded the configured hard ceiling even after a
    /// cleanup pass. Fatal for the in-flight resolution.
    #[error("memory usage {usage_percent:.1}% exceeds maximum {limit_percent:.1}%")]
    MemoryLimitExceeded {
        usage_percent: f64,
        limit_percent: f64,
    },

    /// The requested ticket or page does not exist. Fatal when `id` is the
    /// root of a resolution; skippable for tickets referenced only in text.
    #[error("not found: {id}")]
    NotFound { id: String },

    /// Configuration invariant violation, reported at load time.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// A platform pattern file carried a regex that does not compile.
    #[error("invalid pattern '{pattern}': {reason}")]
    Pattern { pattern: String, reason: String },

    /// A platform response was missing a field the pipeline requires.
    #[error("unexpected response shape: {0}")]
    Malformed(String),

    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("malformed response: {0}")]
    Json(#[from] serde_json::Error),
}

impl MinerError {
    /// Whether this error is the retryable rate-limit signal.
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, MinerError::RateLimited { .. })
    }
}

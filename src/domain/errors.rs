//! Domain-wide error kinds (§7): closed, typed failure modes rather than
//! strings, so callers can match on what actually went wrong.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("vendor rate limit hit")]
    RateLimit,

    #[error("vendor call timed out")]
    Timeout,

    #[error("transient network error: {0}")]
    TransientNetwork(String),

    #[error("insufficient data for {interval}: got {got}, need {need} ({context})")]
    InsufficientData {
        interval: String,
        got: usize,
        need: usize,
        context: String,
    },

    #[error("lookahead violation: a candle beyond the aligned end time was returned")]
    LookaheadViolation,

    #[error("stale data warning: {age_minutes:.1} minutes old")]
    StaleData { age_minutes: f64 },

    #[error("vendor API error {code}: {message}")]
    VendorApi { code: String, message: String },

    #[error("validation failed: {violations:?}")]
    Validation { violations: Vec<String> },

    #[error("version conflict: expected {expected}, got {actual}")]
    VersionConflict { expected: u32, actual: u32 },

    #[error("storage error: {0}")]
    Storage(String),

    #[error("config missing at {path}, falling back to {fallback}")]
    ConfigMissing { path: String, fallback: String },
}

use thiserror::Error;

/// Error taxonomy for the shield pipeline.
///
/// Most of these are degraded-path markers rather than request failures:
/// classification falls back to defaults on `ConfigurationUnavailable`,
/// analytics writes are logged and dropped on `AnalyticsWriteFailed`, and
/// malformed rules are skipped during evaluation. The only variant that may
/// surface to a client is `Origin`, as a gateway error on an allow decision.
#[derive(Debug, Error)]
pub enum ShieldError {
    #[error("configuration unavailable: {0}")]
    ConfigurationUnavailable(String),

    #[error("analytics write failed: {0}")]
    AnalyticsWriteFailed(String),

    #[error("malformed rule '{id}': {reason}")]
    MalformedRule { id: String, reason: String },

    #[error("store error: {0}")]
    Store(String),

    #[error("origin unreachable: {0}")]
    Origin(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

pub type ShieldResult<T> = Result<T, ShieldError>;

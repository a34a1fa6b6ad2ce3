use thiserror::Error;

/// Failure modes of the state extension.
#[derive(Debug, Error)]
pub enum StateError {
    /// Invalid trigger configuration (blank context, empty state payload,
    /// mutually exclusive keys). Rejects the triggering event; the store is
    /// left unchanged.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Invalid query discovered at read time. Never propagated as a hard
    /// failure; rendered inline as `[ERROR: <message>]` instead.
    #[error("{0}")]
    Query(String),
}

pub type Result<T> = std::result::Result<T, StateError>;

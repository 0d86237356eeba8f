use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SentinelError {
    #[error("not initialized: run 'sentinel init'")]
    NotInitialized,

    /// A directory, store, or setting the invoking stage depends on is missing or unusable.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A single content artifact is malformed or incomplete. Callers skip the item.
    #[error("invalid artifact {}: {reason}", path.display())]
    Validation { path: PathBuf, reason: String },

    /// Delivery was rejected or a companion artifact is missing.
    #[error("integration error: {0}")]
    Integration(String),

    #[error("scheduling store error: {0}")]
    Store(String),

    #[error("invalid status transition for post {post_id}: {from} -> {to}")]
    InvalidTransition {
        post_id: String,
        from: String,
        to: String,
    },

    #[error("unknown language '{0}'")]
    UnknownLanguage(String),

    #[error("unknown stage '{0}'")]
    UnknownStage(String),

    #[error("invalid {kind} '{value}'")]
    InvalidValue { kind: &'static str, value: String },

    #[error("token error: {0}")]
    Token(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, SentinelError>;

use sentinel_core::SentinelError;
use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// A pipeline stage that exited unsuccessfully or could not be launched.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StageFailure {
    pub stage: String,
    /// `None` when the stage never started or was ended by a signal.
    pub exit_code: Option<i32>,
    pub detail: String,
}

impl fmt::Display for StageFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.exit_code {
            Some(code) => write!(f, "stage '{}' exited with code {code}: {}", self.stage, self.detail),
            None => write!(f, "stage '{}' failed: {}", self.stage, self.detail),
        }
    }
}

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("unknown stage '{0}'")]
    UnknownStage(String),

    #[error("failed to launch stage '{stage}': {reason}")]
    Launch { stage: String, reason: String },

    #[error("pipeline already running for language '{0}'")]
    PipelineAlreadyRunning(String),

    #[error("{0}")]
    StageFailed(StageFailure),

    #[error(transparent)]
    Core(#[from] SentinelError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, OrchestratorError>;

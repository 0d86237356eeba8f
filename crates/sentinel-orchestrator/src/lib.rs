//! Launching stage programs and sequencing per-language pipelines.

pub mod error;
pub mod orchestrator;
pub mod process;
pub mod registry;
pub mod stage;
pub mod store_lock;

pub use error::{OrchestratorError, Result, StageFailure};
pub use orchestrator::{
    KilledPipeline, Orchestrator, PipelineReport, PipelineStatus, Snapshot, StageOutcome,
    StageStatus, StageSummary,
};
pub use registry::{PipelineRun, ProcessHandle, Registry};
pub use stage::StageParams;

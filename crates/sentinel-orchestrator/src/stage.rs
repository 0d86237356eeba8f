//! Turning a configured stage into a concrete command line.

use sentinel_core::config::{StageConfig, SELF_EXE_TOKEN};
use sentinel_core::types::Sentiment;
use std::path::{Path, PathBuf};

use crate::error::{OrchestratorError, Result};

/// Per-invocation arguments forwarded to a stage.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StageParams {
    pub language: Option<String>,
    pub sentiment: Option<Sentiment>,
}

impl StageParams {
    pub fn for_language(language: impl Into<String>) -> Self {
        Self {
            language: Some(language.into()),
            sentiment: None,
        }
    }

    pub fn with_sentiment(mut self, sentiment: Option<Sentiment>) -> Self {
        self.sentiment = sentiment;
        self
    }
}

/// Build argv for `stage`.
///
/// `{self}` is replaced with `self_exe`. The language is appended as a
/// positional argument when the stage takes one, then `--sentiment` (falling
/// back to `default_sentiment`) when the stage takes that.
pub fn build_argv(
    stage: &StageConfig,
    params: &StageParams,
    self_exe: &Path,
    default_sentiment: Sentiment,
) -> Vec<String> {
    let self_exe = self_exe.display().to_string();
    let mut argv: Vec<String> = stage
        .command
        .iter()
        .map(|arg| arg.replace(SELF_EXE_TOKEN, &self_exe))
        .collect();

    if stage.language_arg {
        if let Some(language) = &params.language {
            argv.push(language.clone());
        }
    }
    if stage.sentiment_arg {
        argv.push("--sentiment".into());
        argv.push(params.sentiment.unwrap_or(default_sentiment).to_string());
    }
    argv
}

/// Resolve the program of an argv against the project root and `PATH`.
///
/// Programs containing a path separator are taken relative to `root`; bare
/// names are looked up on `PATH`. A missing program is a launch error.
pub fn resolve_program(stage: &str, program: &str, root: &Path) -> Result<PathBuf> {
    let launch_err = |reason: String| OrchestratorError::Launch {
        stage: stage.to_string(),
        reason,
    };
    if program.is_empty() {
        return Err(launch_err("empty command".into()));
    }
    if program.contains(std::path::MAIN_SEPARATOR) || program.contains('/') {
        let path = root.join(program);
        if path.is_file() {
            Ok(path)
        } else {
            Err(launch_err(format!("executable not found: {}", path.display())))
        }
    } else {
        which::which(program).map_err(|e| launch_err(format!("'{program}': {e}")))
    }
}

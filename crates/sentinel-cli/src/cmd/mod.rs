pub mod console;
pub mod init;
pub mod insights;
pub mod kill;
pub mod list;
pub mod logs;
pub mod pipeline;
pub mod posts;
pub mod publish;
pub mod purge;
pub mod schedule;
pub mod stage;

use anyhow::Context;
use sentinel_core::config::Config;
use sentinel_core::types::{LanguageSelector, Sentiment};
use sentinel_orchestrator::Orchestrator;
use std::path::Path;

use crate::cli::Commands;

// ---------------------------------------------------------------------------
// Shared helpers
// ---------------------------------------------------------------------------

pub fn load_config(root: &Path) -> anyhow::Result<Config> {
    Config::load(root).context("failed to load .sentinel/config.yaml")
}

/// An orchestrator for `root` whose `{self}` stages re-invoke this binary.
pub fn orchestrator(root: &Path) -> anyhow::Result<Orchestrator> {
    let config = load_config(root)?;
    let self_exe = std::env::current_exe().context("cannot locate the sentinel binary")?;
    Ok(Orchestrator::new(root, config, self_exe))
}

pub fn parse_sentiment(config: &Config, value: Option<&str>) -> anyhow::Result<Option<Sentiment>> {
    value.map(|v| config.sentiment(v)).transpose().map_err(Into::into)
}

pub fn parse_languages(config: &Config, value: &str) -> anyhow::Result<LanguageSelector> {
    Ok(LanguageSelector::parse(value, &config.languages)?)
}

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

/// Commands that act through a live orchestrator.
pub async fn execute_orchestrated(
    orch: &Orchestrator,
    command: Commands,
    json: bool,
) -> anyhow::Result<()> {
    match command {
        Commands::Run {
            stage,
            language,
            sentiment,
        } => stage::run(orch, &stage, language.as_deref(), sentiment.as_deref(), json).await,
        Commands::Restart {
            stage,
            language,
            sentiment,
        } => stage::restart(orch, &stage, language.as_deref(), sentiment.as_deref(), json).await,
        Commands::RunPipeline {
            language,
            sentiment,
        } => pipeline::run(orch, &language, sentiment.as_deref(), json).await,
        Commands::RestartPipeline {
            language,
            sentiment,
        } => pipeline::restart(orch, &language, sentiment.as_deref(), json).await,
        Commands::Kill { stage } => kill::stage(orch, &stage, json).await,
        Commands::KillPipeline { language } => kill::pipeline(orch, &language, json).await,
        Commands::List => list::run(orch, json),
        other => anyhow::bail!("{other:?} does not run through the orchestrator"),
    }
}

/// Commands that only touch files and the scheduling store.
pub fn execute_local(root: &Path, command: Commands, json: bool) -> anyhow::Result<()> {
    match command {
        Commands::Init => init::run(root),
        Commands::Logs { stage } => logs::run(root, stage.as_deref()),
        Commands::Schedule { language } => schedule::run(root, &language, json),
        Commands::Publish {
            language,
            preview,
            max_attempts,
            poll_interval_secs,
            multilingual_preview,
            content_id,
        } => {
            if multilingual_preview {
                let content_id = content_id.context("--multilingual-preview needs --content-id")?;
                publish::multilingual(root, &content_id, json)
            } else {
                let language = language.context("publish needs a language or 'all'")?;
                let overrides = publish::Overrides {
                    preview,
                    max_attempts,
                    poll_interval_secs,
                };
                publish::run(root, &language, overrides, json)
            }
        }
        Commands::Posts { language } => posts::run(root, language.as_deref(), json),
        Commands::Alerts => insights::alerts(root, json),
        Commands::Analytics => insights::analytics(root, json),
        Commands::Suggestions => insights::suggestions(root, json),
        Commands::Purge => purge::run(root),
        other => anyhow::bail!("{other:?} needs an orchestrator"),
    }
}

use sentinel_core::types::{LanguageSelector, Sentiment};
use sentinel_core::{io, paths, SentinelError};
use sentinel_orchestrator::{Orchestrator, PipelineReport, PipelineStatus};
use serde::Serialize;
use std::path::Path;

use crate::cmd::{parse_languages, parse_sentiment};
use crate::output::{print_json, print_table};

#[derive(Serialize)]
struct PipelineResult {
    language: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    report: Option<PipelineReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

async fn run_selected(
    orch: &Orchestrator,
    selector: &LanguageSelector,
    sentiment: Option<Sentiment>,
) -> Vec<(String, sentinel_orchestrator::Result<PipelineReport>)> {
    match selector {
        LanguageSelector::All => orch.run_pipeline_all(sentiment).await,
        LanguageSelector::One(language) => {
            vec![(language.clone(), orch.run_pipeline(language, sentiment).await)]
        }
    }
}

/// Refuse to launch without a content store; create the scheduler database
/// directory if it is missing.
pub fn validate_environment(root: &Path) -> anyhow::Result<()> {
    let content = paths::content_ready_dir(root);
    if !content.is_dir() {
        return Err(SentinelError::Configuration(format!(
            "content directory not found: {}",
            content.display()
        ))
        .into());
    }
    let db_dir = root.join(paths::SCHEDULER_DB_DIR);
    if !db_dir.is_dir() {
        tracing::warn!(path = %db_dir.display(), "scheduler database directory missing, creating it");
        io::ensure_dir(&db_dir)?;
    }
    Ok(())
}

/// Run the pipeline(s); Ctrl-C kills the pipelines this invocation started
/// and still waits for their reports. Pipelines of other invocations are
/// left running.
async fn drive(
    orch: &Orchestrator,
    selector: &LanguageSelector,
    sentiment: Option<Sentiment>,
    restart: bool,
) -> anyhow::Result<Vec<(String, sentinel_orchestrator::Result<PipelineReport>)>> {
    if restart {
        for language in selector.expand(&orch.config().languages) {
            orch.kill_pipeline(&language).await?;
        }
    }

    let work = run_selected(orch, selector, sentiment);
    tokio::pin!(work);
    let results = tokio::select! {
        results = &mut work => results,
        _ = tokio::signal::ctrl_c() => {
            tracing::warn!("interrupted, killing pipelines");
            orch.kill_local_pipelines().await;
            work.await
        }
    };
    Ok(results)
}

fn report(
    results: Vec<(String, sentinel_orchestrator::Result<PipelineReport>)>,
    json: bool,
) -> anyhow::Result<()> {
    let mut failed = Vec::new();
    let mut rows = Vec::new();
    let mut out = Vec::new();

    for (language, result) in results {
        match result {
            Ok(report) => {
                let (status, detail) = match &report.status {
                    PipelineStatus::Completed => ("completed", String::new()),
                    PipelineStatus::Failed(failure) => ("failed", failure.to_string()),
                    PipelineStatus::Killed { stage } => ("killed", format!("during {stage}")),
                };
                if !report.is_success() {
                    failed.push(format!("{language}: {status} {detail}"));
                }
                rows.push(vec![
                    language.clone(),
                    status.to_string(),
                    report.stages.len().to_string(),
                    detail,
                ]);
                out.push(PipelineResult {
                    language,
                    report: Some(report),
                    error: None,
                });
            }
            Err(e) => {
                failed.push(format!("{language}: {e}"));
                rows.push(vec![language.clone(), "error".into(), "0".into(), e.to_string()]);
                out.push(PipelineResult {
                    language,
                    report: None,
                    error: Some(e.to_string()),
                });
            }
        }
    }

    if json {
        print_json(&out)?;
    } else {
        print_table(&["LANGUAGE", "STATUS", "STAGES", "DETAIL"], rows);
    }

    if failed.is_empty() {
        Ok(())
    } else {
        anyhow::bail!("pipeline did not complete ({})", failed.join("; "))
    }
}

pub async fn run(
    orch: &Orchestrator,
    language: &str,
    sentiment: Option<&str>,
    json: bool,
) -> anyhow::Result<()> {
    let selector = parse_languages(orch.config(), language)?;
    let sentiment = parse_sentiment(orch.config(), sentiment)?;
    validate_environment(orch.root())?;
    let results = drive(orch, &selector, sentiment, false).await?;
    report(results, json)
}

/// Kill the language's pipeline if one is active, then run it from the first stage.
pub async fn restart(
    orch: &Orchestrator,
    language: &str,
    sentiment: Option<&str>,
    json: bool,
) -> anyhow::Result<()> {
    let selector = parse_languages(orch.config(), language)?;
    let sentiment = parse_sentiment(orch.config(), sentiment)?;
    validate_environment(orch.root())?;
    let results = drive(orch, &selector, sentiment, true).await?;
    report(results, json)
}

/// Spawn a pipeline on the current runtime; used by the console.
pub fn spawn(
    orch: &Orchestrator,
    language: &str,
    sentiment: Option<&str>,
    restart: bool,
) -> anyhow::Result<()> {
    let selector = parse_languages(orch.config(), language)?;
    let sentiment = parse_sentiment(orch.config(), sentiment)?;
    validate_environment(orch.root())?;
    let orch = orch.clone();
    tokio::spawn(async move {
        match drive_background(&orch, &selector, sentiment, restart).await {
            Ok(results) => {
                for (language, result) in results {
                    match result {
                        Ok(r) if r.is_success() => {
                            println!("\n[pipeline {language}] completed ({} stages)", r.stages.len())
                        }
                        Ok(r) => match r.status {
                            PipelineStatus::Failed(f) => println!("\n[pipeline {language}] failed: {f}"),
                            PipelineStatus::Killed { stage } => {
                                println!("\n[pipeline {language}] killed during {stage}")
                            }
                            PipelineStatus::Completed => {}
                        },
                        Err(e) => println!("\n[pipeline {language}] error: {e}"),
                    }
                }
            }
            Err(e) => println!("\n[pipeline] error: {e:#}"),
        }
    });
    Ok(())
}

async fn drive_background(
    orch: &Orchestrator,
    selector: &LanguageSelector,
    sentiment: Option<Sentiment>,
    restart: bool,
) -> anyhow::Result<Vec<(String, sentinel_orchestrator::Result<PipelineReport>)>> {
    if restart {
        for language in selector.expand(&orch.config().languages) {
            orch.kill_pipeline(&language).await?;
        }
    }
    Ok(run_selected(orch, selector, sentiment).await)
}

use anyhow::Context;
use sentinel_orchestrator::Orchestrator;
use serde_json::json;

use crate::output::print_json;

pub async fn stage(orch: &Orchestrator, stage: &str, json: bool) -> anyhow::Result<()> {
    let pids = orch
        .kill_stage(stage)
        .await
        .with_context(|| format!("failed to kill stage '{stage}'"))?;
    if json {
        return print_json(&json!({ "stage": stage, "pids": pids }));
    }
    if pids.is_empty() {
        println!("{stage} is not running");
    } else {
        let list: Vec<String> = pids.iter().map(|p| p.to_string()).collect();
        println!("Stopped {stage} (pid {})", list.join(", "));
    }
    Ok(())
}

pub async fn pipeline(orch: &Orchestrator, language: &str, json: bool) -> anyhow::Result<()> {
    let killed = orch
        .kill_pipeline(language)
        .await
        .with_context(|| format!("failed to kill pipeline '{language}'"))?;
    if json {
        return print_json(&json!({ "language": language, "killed": killed }));
    }
    match killed {
        Some(k) => {
            let current = k.run.stages.last().map(String::as_str).unwrap_or("-");
            println!(
                "Killed pipeline {language} (run {}, at stage {current}, {} process(es) stopped)",
                k.run.run_id,
                k.pids.len()
            );
        }
        None => println!("No active pipeline for {language}"),
    }
    Ok(())
}

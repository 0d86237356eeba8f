use sentinel_orchestrator::Orchestrator;

use crate::output::{print_json, print_table};

pub fn run(orch: &Orchestrator, json: bool) -> anyhow::Result<()> {
    let snapshot = orch.snapshot();
    if json {
        return print_json(&snapshot);
    }

    let rows: Vec<Vec<String>> = snapshot
        .stages
        .iter()
        .map(|s| {
            let pids: Vec<String> = s
                .instances
                .iter()
                .map(|p| match &p.language {
                    Some(l) => format!("{}({l})", p.pid),
                    None => p.pid.to_string(),
                })
                .collect();
            vec![
                s.id.clone(),
                s.name.clone(),
                if s.running { "running" } else { "idle" }.to_string(),
                pids.join(" "),
            ]
        })
        .collect();
    print_table(&["STAGE", "NAME", "STATUS", "PIDS"], rows);

    println!();
    if snapshot.pipelines.is_empty() {
        println!("No active pipelines.");
    } else {
        let rows: Vec<Vec<String>> = snapshot
            .pipelines
            .iter()
            .map(|p| {
                vec![
                    p.language.clone(),
                    p.stages.last().cloned().unwrap_or_default(),
                    p.stages.len().to_string(),
                    p.owner_pid.to_string(),
                    p.started_at.format("%Y-%m-%d %H:%M:%S").to_string(),
                ]
            })
            .collect();
        print_table(&["PIPELINE", "CURRENT", "STARTED", "OWNER", "SINCE"], rows);
    }
    Ok(())
}

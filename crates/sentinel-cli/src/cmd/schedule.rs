use anyhow::Context;
use sentinel_core::paths;
use sentinel_core::scheduler::Scheduler;
use sentinel_core::store::ScheduleStore;
use std::path::Path;

use crate::cmd::{load_config, parse_languages};
use crate::output::{print_json, print_table};

pub fn run(root: &Path, language: &str, json: bool) -> anyhow::Result<()> {
    let config = load_config(root)?;
    let languages = parse_languages(&config, language)?.expand(&config.languages);

    let store = ScheduleStore::open(&paths::scheduler_db_path(root))
        .context("failed to open the scheduling store")?;
    let report = Scheduler::new(&store, &config)
        .run(&paths::content_ready_dir(root), &languages)
        .context("scheduling failed")?;
    tracing::info!(language, total = report.total(), "scheduling complete");

    if json {
        return print_json(&report);
    }
    let rows: Vec<Vec<String>> = report
        .entries
        .iter()
        .map(|e| {
            vec![
                e.language.clone(),
                e.content_type.to_string(),
                e.platform.clone(),
                e.scheduled.to_string(),
            ]
        })
        .collect();
    print_table(&["LANGUAGE", "TYPE", "PLATFORM", "SCHEDULED"], rows);
    println!("\n{} post(s) scheduled.", report.total());
    Ok(())
}

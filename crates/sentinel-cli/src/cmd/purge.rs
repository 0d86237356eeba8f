use anyhow::Context;
use sentinel_core::paths;
use sentinel_orchestrator::Registry;
use std::path::Path;

use crate::cmd::load_config;

/// Everything purge deletes, relative to the project root.
pub const PURGE_TARGETS: [&str; 4] = [
    paths::CONTENT_READY_DIR,
    paths::LOGS_DIR,
    paths::SCHEDULER_DB_DIR,
    paths::DELIVERY_DIR,
];

pub fn run(root: &Path) -> anyhow::Result<()> {
    load_config(root)?;

    let live = Registry::new(paths::run_dir(root)).pipelines();
    if !live.is_empty() {
        let languages: Vec<&str> = live.iter().map(|p| p.language.as_str()).collect();
        anyhow::bail!(
            "pipelines still running for {}; kill them first",
            languages.join(", ")
        );
    }

    for target in PURGE_TARGETS {
        let path = root.join(target);
        if path.exists() {
            std::fs::remove_dir_all(&path)
                .with_context(|| format!("failed to remove {}", path.display()))?;
            println!("  removed: {target}");
        } else {
            println!("  absent:  {target}");
        }
    }
    tracing::warn!("project data purged");
    println!("\nPurge complete.");
    Ok(())
}

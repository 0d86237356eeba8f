use anyhow::Context;
use sentinel_core::paths;
use sentinel_core::store::{ScheduleStore, ScheduledPost};
use std::path::Path;

use crate::cmd::{load_config, parse_languages};
use crate::output::{print_json, print_table, truncate};

pub fn run(root: &Path, language: Option<&str>, json: bool) -> anyhow::Result<()> {
    let config = load_config(root)?;
    let selector = language
        .map(|l| parse_languages(&config, l))
        .transpose()?;

    let db = paths::scheduler_db_path(root);
    let posts: Vec<ScheduledPost> = if db.is_file() {
        let store = ScheduleStore::open(&db).context("failed to open the scheduling store")?;
        store.list(selector.as_ref().and_then(|s| s.as_filter()))?
    } else {
        Vec::new()
    };

    if json {
        return print_json(&posts);
    }
    if posts.is_empty() {
        println!("No scheduled posts.");
        return Ok(());
    }
    let rows: Vec<Vec<String>> = posts
        .iter()
        .map(|p| {
            vec![
                p.post_id.clone(),
                p.content_id.clone(),
                p.platform.clone(),
                p.content_type.to_string(),
                p.language.clone(),
                p.status.to_string(),
                p.scheduled_time.format("%Y-%m-%d %H:%M").to_string(),
                truncate(&p.content, 40),
            ]
        })
        .collect();
    print_table(
        &["POST", "CONTENT", "PLATFORM", "TYPE", "LANG", "STATUS", "SCHEDULED", "TEXT"],
        rows,
    );
    Ok(())
}

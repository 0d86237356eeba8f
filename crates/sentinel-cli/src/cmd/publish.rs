use anyhow::Context;
use sentinel_core::paths;
use sentinel_core::publisher::{
    multilingual_previews, token, PublishOptions, Publisher, SimulatedTransport,
};
use sentinel_core::store::ScheduleStore;
use sentinel_core::types::PostStatus;
use std::path::Path;
use std::time::Duration;

use crate::cmd::{load_config, parse_languages};
use crate::output::{print_json, print_table};

/// Command-line overrides of the configured publisher options.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub preview: bool,
    pub max_attempts: Option<u32>,
    pub poll_interval_secs: Option<u64>,
}

impl Overrides {
    fn apply(&self, mut options: PublishOptions) -> PublishOptions {
        options.preview = self.preview;
        if let Some(n) = self.max_attempts {
            options.max_attempts = n;
        }
        if let Some(secs) = self.poll_interval_secs {
            options.poll_interval = Duration::from_secs(secs);
        }
        options
    }
}

pub fn run(root: &Path, language: &str, overrides: Overrides, json: bool) -> anyhow::Result<()> {
    let config = load_config(root)?;
    let selector = parse_languages(&config, language)?;
    let options = overrides.apply(PublishOptions::from_config(&config.publisher));

    let store = ScheduleStore::open(&paths::scheduler_db_path(root))
        .context("failed to open the scheduling store")?;
    let transport = SimulatedTransport::new(config.publisher.accepted_platforms.clone());
    let secret = token::secret_from_env(&config.publisher.secret_env);
    let publisher = Publisher::new(
        &store,
        paths::content_ready_dir(root),
        paths::delivery_dir(root),
        transport,
        secret,
        options,
    );
    let report = publisher.run(&selector).context("publishing failed")?;

    if json {
        return print_json(&report);
    }
    if report.is_empty() {
        println!("No posts processed after {} attempt(s).", report.attempts);
        return Ok(());
    }
    let rows: Vec<Vec<String>> = report
        .outcomes
        .iter()
        .map(|o| {
            vec![
                o.content_id.clone(),
                o.platform.clone(),
                o.content_type.to_string(),
                o.language.clone(),
                o.status.to_string(),
                o.detail.clone().unwrap_or_default(),
            ]
        })
        .collect();
    print_table(
        &["CONTENT", "PLATFORM", "TYPE", "LANGUAGE", "STATUS", "DETAIL"],
        rows,
    );
    println!(
        "\n{} published, {} failed, {} preview.",
        report.count(PostStatus::Published),
        report.count(PostStatus::Failed),
        report.count(PostStatus::Preview),
    );
    Ok(())
}

/// Render preview records for every translation of `content_id`.
pub fn multilingual(root: &Path, content_id: &str, json: bool) -> anyhow::Result<()> {
    if content_id.is_empty() || content_id.contains(['/', '\\']) || content_id.starts_with('.') {
        anyhow::bail!("invalid content id '{content_id}'");
    }
    let records = multilingual_previews(
        &paths::translation_previews_dir(root),
        &paths::delivery_dir(root),
        content_id,
    )
    .context("failed to render multilingual previews")?;

    if json {
        return print_json(&records);
    }
    if records.is_empty() {
        println!("No translation previews found for {content_id}.");
        return Ok(());
    }
    let rows: Vec<Vec<String>> = records
        .iter()
        .map(|r| {
            vec![
                r.language.clone(),
                r.platform.clone(),
                r.payload.format.clone(),
                r.file_name(),
            ]
        })
        .collect();
    print_table(&["LANGUAGE", "PLATFORM", "FORMAT", "RECORD"], rows);
    Ok(())
}

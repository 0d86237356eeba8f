//! Scheduler: turns content artifacts into pending [`ScheduledPost`] records.

use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::{Config, RouteConfig};
use crate::content::{self, ContentArtifact};
use crate::error::{Result, SentinelError};
use crate::store::{ScheduleStore, ScheduledPost};
use crate::types::{ContentType, PostStatus};

/// Records created for one `(language, content_type, platform)` scan.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScheduleEntry {
    pub language: String,
    pub content_type: ContentType,
    pub platform: String,
    pub scheduled: usize,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ScheduleReport {
    pub entries: Vec<ScheduleEntry>,
}

impl ScheduleReport {
    pub fn total(&self) -> usize {
        self.entries.iter().map(|e| e.scheduled).sum()
    }
}

pub struct Scheduler<'a> {
    store: &'a ScheduleStore,
    routing: &'a [RouteConfig],
    backdate: chrono::Duration,
}

impl<'a> Scheduler<'a> {
    pub fn new(store: &'a ScheduleStore, config: &'a Config) -> Self {
        Self {
            store,
            routing: &config.routing,
            backdate: config.scheduler.backdate(),
        }
    }

    /// Rebuild the store from the content partitions of `languages`.
    ///
    /// The store is reset first, so records from a previous run never survive.
    pub fn run(&self, content_root: &Path, languages: &[String]) -> Result<ScheduleReport> {
        if !content_root.is_dir() {
            return Err(SentinelError::Configuration(format!(
                "content directory not found: {}",
                content_root.display()
            )));
        }

        self.store.reset()?;
        info!("scheduling store reset");

        let mut report = ScheduleReport::default();
        for language in languages {
            let dir = content_root.join(language);
            if !dir.is_dir() {
                warn!(language = %language, dir = %dir.display(), "language directory not found, skipping");
                continue;
            }
            for route in self.routing {
                let artifacts = content::list_artifacts(&dir, route.content_type)?;
                for platform in &route.platforms {
                    let scheduled =
                        self.schedule_content(&artifacts, platform, route.content_type, language)?;
                    report.entries.push(ScheduleEntry {
                        language: language.clone(),
                        content_type: route.content_type,
                        platform: platform.clone(),
                        scheduled,
                    });
                }
            }
        }

        info!(total = report.total(), "scheduling complete");
        Ok(report)
    }

    /// Insert one pending record per artifact that declares `platform` and
    /// carries text for `content_type`. Anything else is skipped and logged.
    ///
    /// Only store failures are returned as errors.
    pub fn schedule_content(
        &self,
        artifacts: &[PathBuf],
        platform: &str,
        content_type: ContentType,
        language: &str,
    ) -> Result<usize> {
        let mut scheduled = 0;
        for path in artifacts {
            let artifact = match ContentArtifact::load(path) {
                Ok(a) => a,
                Err(e) => {
                    warn!(error = %e, "skipping unreadable artifact");
                    continue;
                }
            };
            let (Some(content_id), Some(declared)) = (&artifact.id, &artifact.platform) else {
                warn!(file = %path.display(), "artifact missing id or platform, skipping");
                continue;
            };
            if declared != platform {
                debug!(
                    file = %path.display(),
                    content_id = %content_id,
                    declared = %declared,
                    expected = platform,
                    "platform mismatch, skipping"
                );
                continue;
            }
            let Some(text) = artifact.text_for(content_type) else {
                warn!(
                    file = %path.display(),
                    field = content_type.text_field(),
                    "artifact has no text, skipping"
                );
                continue;
            };

            let post = ScheduledPost {
                content_id: content_id.clone(),
                platform: platform.to_string(),
                content_type,
                content: text.to_string(),
                scheduled_time: Utc::now() - self.backdate,
                status: PostStatus::Pending,
                post_id: Uuid::new_v4().to_string(),
                language: language.to_string(),
            };
            self.store.insert(&post)?;
            info!(
                content_id = %post.content_id,
                platform = %post.platform,
                language = %language,
                post_id = %post.post_id,
                "scheduled {content_type}"
            );
            scheduled += 1;
        }
        Ok(scheduled)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

//! Publisher: drives pending scheduled posts to a terminal status.
//!
//! A run clears the delivery directory, mints one token, then performs up to
//! `max_attempts` polling rounds. The first non-empty round is processed in
//! full and ends the run. Every post in that round ends `published`,
//! `failed`, or `preview`; none is attempted twice.

pub mod payload;
pub mod preview;
pub mod record;
pub mod token;
pub mod transport;

use std::path::PathBuf;
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use tracing::{error, info, warn};

use crate::config::PublisherConfig;
use crate::content::{self, ContentArtifact};
use crate::error::{Result, SentinelError};
use crate::io;
use crate::store::{ScheduleStore, ScheduledPost};
use crate::types::{ContentType, LanguageSelector, Platform, PostStatus};

pub use payload::{format_payload, Payload};
pub use preview::{multilingual_previews, PREVIEW_TARGETS};
pub use record::DeliveryRecord;
pub use transport::{DeliveryRequest, DeliveryTransport, SimulatedTransport, TransportResponse};

// ---------------------------------------------------------------------------
// Options and report
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct PublishOptions {
    /// Render records without calling the transport.
    pub preview: bool,
    pub max_attempts: u32,
    pub poll_interval: Duration,
}

impl PublishOptions {
    pub fn from_config(config: &PublisherConfig) -> Self {
        Self {
            preview: false,
            max_attempts: config.max_attempts,
            poll_interval: config.poll_interval(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PostOutcome {
    pub post_id: String,
    pub content_id: String,
    pub platform: String,
    pub content_type: ContentType,
    pub language: String,
    pub status: PostStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    /// Delivery record, if the post reached the delivery attempt.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub record: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct PublishReport {
    /// Polling rounds performed.
    pub attempts: u32,
    pub outcomes: Vec<PostOutcome>,
}

impl PublishReport {
    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    pub fn count(&self, status: PostStatus) -> usize {
        self.outcomes.iter().filter(|o| o.status == status).count()
    }
}

// ---------------------------------------------------------------------------
// Publisher
// ---------------------------------------------------------------------------

pub struct Publisher<'a, T: DeliveryTransport> {
    store: &'a ScheduleStore,
    content_root: PathBuf,
    delivery_dir: PathBuf,
    transport: T,
    secret: Vec<u8>,
    options: PublishOptions,
}

impl<'a, T: DeliveryTransport> Publisher<'a, T> {
    pub fn new(
        store: &'a ScheduleStore,
        content_root: impl Into<PathBuf>,
        delivery_dir: impl Into<PathBuf>,
        transport: T,
        secret: impl Into<Vec<u8>>,
        options: PublishOptions,
    ) -> Self {
        Self {
            store,
            content_root: content_root.into(),
            delivery_dir: delivery_dir.into(),
            transport,
            secret: secret.into(),
            options,
        }
    }

    pub fn run(&self, languages: &LanguageSelector) -> Result<PublishReport> {
        info!(language = %languages, preview = self.options.preview, "publisher starting");
        io::reset_dir(&self.delivery_dir)?;
        let token = token::mint(&self.secret, Utc::now())?;

        let mut report = PublishReport::default();
        let max_attempts = self.options.max_attempts.max(1);
        for attempt in 1..=max_attempts {
            report.attempts = attempt;
            let due = self.store.fetch_due(languages.as_filter(), Utc::now())?;
            if due.is_empty() {
                info!(attempt, max_attempts, language = %languages, "no posts due");
                if attempt < max_attempts {
                    std::thread::sleep(self.options.poll_interval);
                }
                continue;
            }

            for post in &due {
                report.outcomes.push(self.process(post, &token)?);
            }
            info!(
                attempt,
                processed = due.len(),
                published = report.count(PostStatus::Published),
                failed = report.count(PostStatus::Failed),
                preview = report.count(PostStatus::Preview),
                "batch processed"
            );
            break;
        }

        if report.is_empty() {
            warn!(attempts = report.attempts, language = %languages, "no posts processed");
        }
        Ok(report)
    }

    /// Drive one post to a terminal status. Only store failures escape.
    fn process(&self, post: &ScheduledPost, token: &str) -> Result<PostOutcome> {
        let dir = self.content_root.join(&post.language);

        let Some(path) =
            content::locate_content(&dir, post.content_type, &post.content_id, &post.platform)
        else {
            return self.fail_early(
                post,
                SentinelError::Integration(format!("content artifact not found in {}", dir.display())),
            );
        };
        let artifact = match ContentArtifact::load(&path) {
            Ok(a) => a,
            Err(e) => return self.fail_early(post, e),
        };

        let audio = if post.content_type == ContentType::Voice {
            content::locate_audio(&dir, &post.content_id, &post.platform)
        } else {
            None
        };
        let needs_audio = post.content_type == ContentType::Voice
            && Platform::from_name(&post.platform).is_some_and(Platform::requires_audio);
        if needs_audio && audio.is_none() {
            return self.fail_early(
                post,
                SentinelError::Integration("audio artifact not found".into()),
            );
        }

        let text = artifact
            .text_for(post.content_type)
            .unwrap_or(post.content.as_str());
        let payload = format_payload(
            &post.platform,
            post.content_type,
            &post.content_id,
            text,
            audio.as_deref(),
        );

        let (mut status, mut detail) = if self.options.preview {
            (PostStatus::Preview, None)
        } else {
            self.deliver(post, token, &payload)
        };

        let record = DeliveryRecord {
            post_id: post.post_id.clone(),
            content_id: post.content_id.clone(),
            platform: post.platform.clone(),
            language: post.language.clone(),
            sentiment: artifact.sentiment.clone().unwrap_or_else(|| "neutral".into()),
            voice_tag: artifact.voice_tag.clone().unwrap_or_default(),
            publish_time: Utc::now(),
            status,
            payload,
        };
        let record_path = match record.write(&self.delivery_dir) {
            Ok(p) => {
                info!(content_id = %post.content_id, platform = %post.platform, path = %p.display(), "delivery record written");
                Some(p)
            }
            Err(e) => {
                error!(post_id = %post.post_id, error = %e, "failed to write delivery record");
                status = PostStatus::Failed;
                detail = Some(format!("delivery record not written: {e}"));
                None
            }
        };

        self.store.set_status(&post.post_id, status)?;
        Ok(self.outcome(post, status, detail, record_path))
    }

    fn deliver(&self, post: &ScheduledPost, token: &str, payload: &Payload) -> (PostStatus, Option<String>) {
        let request = DeliveryRequest {
            platform: &post.platform,
            content_id: &post.content_id,
            token,
            payload,
        };
        match self.transport.deliver(&request) {
            Ok(resp) if resp.is_success() => {
                let text = payload.text();
                let preview: String = text.chars().take(50).collect();
                info!(content_id = %post.content_id, platform = %post.platform, "delivered: {preview}");
                (PostStatus::Published, None)
            }
            Ok(resp) => {
                error!(
                    content_id = %post.content_id,
                    platform = %post.platform,
                    status_code = resp.status_code,
                    "delivery rejected: {}", resp.body
                );
                (
                    PostStatus::Failed,
                    Some(format!("rejected with {}: {}", resp.status_code, resp.body)),
                )
            }
            Err(e) => {
                error!(content_id = %post.content_id, platform = %post.platform, error = %e, "delivery failed");
                (PostStatus::Failed, Some(e.to_string()))
            }
        }
    }

    fn fail_early(&self, post: &ScheduledPost, reason: SentinelError) -> Result<PostOutcome> {
        error!(
            content_id = %post.content_id,
            platform = %post.platform,
            language = %post.language,
            error = %reason,
            "post failed before delivery"
        );
        self.store.set_status(&post.post_id, PostStatus::Failed)?;
        Ok(self.outcome(post, PostStatus::Failed, Some(reason.to_string()), None))
    }

    fn outcome(
        &self,
        post: &ScheduledPost,
        status: PostStatus,
        detail: Option<String>,
        record: Option<PathBuf>,
    ) -> PostOutcome {
        PostOutcome {
            post_id: post.post_id.clone(),
            content_id: post.content_id.clone(),
            platform: post.platform.clone(),
            content_type: post.content_type,
            language: post.language.clone(),
            status,
            detail,
            record,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

//! Multilingual preview records rendered from translation previews.
//!
//! Reads `preview_{content_id}_{lang}.json` files and writes one `preview`
//! delivery record per fixed (language, platform) target. The Scheduling
//! Store is not involved.

use chrono::Utc;
use serde::Deserialize;
use std::path::Path;
use tracing::{info, warn};
use uuid::Uuid;

use super::payload::format_payload;
use super::record::DeliveryRecord;
use crate::error::Result;
use crate::types::{ContentType, PostStatus};

/// (language, platform) pairs a multilingual preview is rendered for.
pub const PREVIEW_TARGETS: [(&str, &str); 5] = [
    ("en", "instagram"),
    ("hi", "twitter"),
    ("mr", "linkedin"),
    ("ta", "sanatan"),
    ("te", "instagram"),
];

#[derive(Debug, Default, Deserialize)]
struct TranslationPreview {
    #[serde(default)]
    translated_text: String,
    #[serde(default)]
    sentiment: Option<String>,
    #[serde(default)]
    voice_tag: Option<String>,
}

/// Render preview records for `content_id` into `delivery_dir`.
/// Targets without a translation preview are skipped.
pub fn multilingual_previews(
    previews_dir: &Path,
    delivery_dir: &Path,
    content_id: &str,
) -> Result<Vec<DeliveryRecord>> {
    let mut records = Vec::new();
    for (language, platform) in PREVIEW_TARGETS {
        let path = previews_dir.join(format!("preview_{content_id}_{language}.json"));
        if !path.is_file() {
            warn!(path = %path.display(), "translation preview not found");
            continue;
        }
        let data = std::fs::read_to_string(&path)?;
        let preview: TranslationPreview = serde_json::from_str(&data)?;

        let record = DeliveryRecord {
            post_id: Uuid::new_v4().to_string(),
            content_id: content_id.to_string(),
            platform: platform.to_string(),
            language: language.to_string(),
            sentiment: preview.sentiment.unwrap_or_else(|| "neutral".into()),
            voice_tag: preview.voice_tag.unwrap_or_default(),
            publish_time: Utc::now(),
            status: PostStatus::Preview,
            payload: format_payload(
                platform,
                ContentType::Post,
                content_id,
                &preview.translated_text,
                None,
            ),
        };
        record.write(delivery_dir)?;
        info!(language, platform, content_id, "preview rendered");
        records.push(record);
    }
    info!(count = records.len(), content_id, "multilingual previews generated");
    Ok(records)
}

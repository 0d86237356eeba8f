use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::payload::Payload;
use crate::error::Result;
use crate::io;
use crate::types::PostStatus;

/// Immutable outcome of one delivery attempt, written once under the
/// delivery directory as `post_{content_id}_{platform}_{post_id}.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliveryRecord {
    pub post_id: String,
    pub content_id: String,
    pub platform: String,
    pub language: String,
    pub sentiment: String,
    pub voice_tag: String,
    pub publish_time: DateTime<Utc>,
    pub status: PostStatus,
    #[serde(flatten)]
    pub payload: Payload,
}

impl DeliveryRecord {
    pub fn file_name(&self) -> String {
        format!(
            "post_{}_{}_{}.json",
            self.content_id, self.platform, self.post_id
        )
    }

    /// Write the record into `dir`. An existing record is never replaced.
    pub fn write(&self, dir: &Path) -> Result<PathBuf> {
        let path = dir.join(self.file_name());
        let data = serde_json::to_string_pretty(self)?;
        io::write_new(&path, data.as_bytes())?;
        Ok(path)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&data)?)
    }
}

//! Content Store access: discovering and reading content artifacts.
//!
//! Artifacts live under `content/content_ready/{language}/` and are named
//! `{content_type}_{content_id}_{platform}_{suffix}.json`. Voice content may
//! have a companion `voice_{content_id}_{platform}_{suffix}.mp3`.

use crate::error::{Result, SentinelError};
use crate::types::ContentType;
use regex::Regex;
use serde::{Deserialize, Deserializer};
use std::path::{Path, PathBuf};

/// A generated content unit as written by the upstream stages.
///
/// Every field is optional at parse time so a partially written artifact can
/// be reported precisely instead of failing as a whole.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ContentArtifact {
    #[serde(default, deserialize_with = "string_or_number")]
    pub id: Option<String>,
    #[serde(default)]
    pub platform: Option<String>,
    #[serde(default)]
    pub tweet: Option<String>,
    #[serde(default)]
    pub post: Option<String>,
    #[serde(default)]
    pub voice_script: Option<String>,
    #[serde(default)]
    pub tone: Option<String>,
    #[serde(default)]
    pub sentiment: Option<String>,
    #[serde(default)]
    pub version: Option<serde_json::Value>,
    #[serde(default)]
    pub voice_tag: Option<String>,
}

impl ContentArtifact {
    /// Read and parse an artifact. Unreadable or malformed files are `Validation` errors.
    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path).map_err(|e| SentinelError::Validation {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        serde_json::from_str(&data).map_err(|e| SentinelError::Validation {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    /// The non-blank text for `content_type`, if present.
    pub fn text_for(&self, content_type: ContentType) -> Option<&str> {
        let field = match content_type {
            ContentType::Tweet => &self.tweet,
            ContentType::Post => &self.post,
            ContentType::Voice => &self.voice_script,
        };
        field.as_deref().filter(|t| !t.trim().is_empty())
    }
}

fn string_or_number<'de, D>(d: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value: Option<serde_json::Value> = Option::deserialize(d)?;
    Ok(match value {
        Some(serde_json::Value::String(s)) if !s.is_empty() => Some(s),
        Some(serde_json::Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

// ---------------------------------------------------------------------------
// Discovery
// ---------------------------------------------------------------------------

/// All `{content_type}_*.json` files in a language partition, sorted by name.
pub fn list_artifacts(dir: &Path, content_type: ContentType) -> Result<Vec<PathBuf>> {
    let prefix = format!("{}_", content_type.as_str());
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            continue;
        };
        if name.starts_with(&prefix) && name.ends_with(".json") && entry.path().is_file() {
            files.push(entry.path());
        }
    }
    files.sort();
    Ok(files)
}

fn find_matching(dir: &Path, pattern: &Regex) -> Option<PathBuf> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            tracing::warn!(dir = %dir.display(), error = %e, "content directory not readable");
            return None;
        }
    };
    let mut matches: Vec<PathBuf> = entries
        .filter_map(|e| e.ok())
        .filter(|e| e.file_name().to_str().is_some_and(|n| pattern.is_match(n)))
        .map(|e| e.path())
        .collect();
    matches.sort();
    matches.into_iter().next()
}

/// Locate the artifact for one `(content_type, content_id, platform)` by its
/// exact naming pattern. Ids are matched literally, so `4` never matches `42`.
pub fn locate_content(
    dir: &Path,
    content_type: ContentType,
    content_id: &str,
    platform: &str,
) -> Option<PathBuf> {
    let pattern = Regex::new(&format!(
        r"^{}_{}_{}_[A-Za-z0-9\-]+\.json$",
        content_type.as_str(),
        regex::escape(content_id),
        regex::escape(platform)
    ))
    .ok()?;
    find_matching(dir, &pattern)
}

/// Locate the companion audio file for voice content.
pub fn locate_audio(dir: &Path, content_id: &str, platform: &str) -> Option<PathBuf> {
    let pattern = Regex::new(&format!(
        r"^voice_{}_{}_[A-Za-z0-9\-]+\.mp3$",
        regex::escape(content_id),
        regex::escape(platform)
    ))
    .ok()?;
    find_matching(dir, &pattern)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn touch(dir: &Path, name: &str, body: &str) {
        std::fs::write(dir.join(name), body).unwrap();
    }

    #[test]
    fn load_accepts_numeric_id() {
        let dir = TempDir::new().unwrap();
        touch(
            dir.path(),
            "tweet_42_twitter_abc.json",
            r#"{"id": 42, "platform": "twitter", "tweet": "hello", "tone": "calm",
                "sentiment": "uplifting", "version": 1}"#,
        );
        let artifact = ContentArtifact::load(&dir.path().join("tweet_42_twitter_abc.json")).unwrap();
        assert_eq!(artifact.id.as_deref(), Some("42"));
        assert_eq!(artifact.text_for(ContentType::Tweet), Some("hello"));
        assert_eq!(artifact.text_for(ContentType::Post), None);
    }

    #[test]
    fn blank_text_is_absent() {
        let artifact = ContentArtifact {
            voice_script: Some("   ".into()),
            ..Default::default()
        };
        assert_eq!(artifact.text_for(ContentType::Voice), None);
    }

    #[test]
    fn malformed_json_is_validation_error() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "post_1_instagram_ff.json", "{not json");
        let err = ContentArtifact::load(&dir.path().join("post_1_instagram_ff.json")).unwrap_err();
        assert!(matches!(err, SentinelError::Validation { .. }), "{err:?}");
    }

    #[test]
    fn list_artifacts_filters_by_type_and_extension() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "tweet_1_twitter_a1.json", "{}");
        touch(dir.path(), "tweet_2_twitter_b2.json", "{}");
        touch(dir.path(), "post_1_instagram_c3.json", "{}");
        touch(dir.path(), "voice_1_sanatan_d4.mp3", "");
        touch(dir.path(), "tweet_notes.txt", "");

        let tweets = list_artifacts(dir.path(), ContentType::Tweet).unwrap();
        let names: Vec<_> = tweets
            .iter()
            .map(|p| p.file_name().unwrap().to_str().unwrap().to_string())
            .collect();
        assert_eq!(names, vec!["tweet_1_twitter_a1.json", "tweet_2_twitter_b2.json"]);
        assert!(list_artifacts(dir.path(), ContentType::Voice).unwrap().is_empty());
    }

    #[test]
    fn locate_content_matches_exact_id_and_platform() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "post_42_instagram_abc.json", "{}");
        touch(dir.path(), "post_4_linkedin_abc.json", "{}");

        let found = locate_content(dir.path(), ContentType::Post, "42", "instagram").unwrap();
        assert!(found.ends_with("post_42_instagram_abc.json"));
        assert!(locate_content(dir.path(), ContentType::Post, "4", "instagram").is_none());
        assert!(locate_content(dir.path(), ContentType::Post, "42", "linkedin").is_none());
        assert!(locate_content(dir.path(), ContentType::Tweet, "42", "instagram").is_none());
    }

    #[test]
    fn locate_audio_requires_mp3() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "voice_7_sanatan_ab12.json", "{}");
        assert!(locate_audio(dir.path(), "7", "sanatan").is_none());
        touch(dir.path(), "voice_7_sanatan_ab12.mp3", "");
        assert!(locate_audio(dir.path(), "7", "sanatan").is_some());
    }

    #[test]
    fn locate_in_missing_dir_is_none() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("nope");
        assert!(locate_content(&missing, ContentType::Tweet, "1", "twitter").is_none());
    }
}

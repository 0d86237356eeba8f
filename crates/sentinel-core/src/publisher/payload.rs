//! Platform-shaped delivery payloads.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::path::Path;

use crate::types::{ContentType, Platform};

/// Character budget for short-text platforms.
pub const TWEET_MAX_CHARS: usize = 280;

const INSTAGRAM_TAGS: &str = "\n#Inspiration #Multilingual";

/// The platform-specific part of a delivery record.
///
/// `content` is a string for most platforms and an object for `linkedin`.
/// Exactly one media key is set per known platform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payload {
    pub content: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio_thumbnail: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio_snippet: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio: Option<String>,
    pub format: String,
}

impl Payload {
    /// Plain-text rendering, used for logging and transport bodies.
    pub fn text(&self) -> String {
        match &self.content {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }
}

/// Shape `text` for `platform`. Unknown platforms get the raw text.
pub fn format_payload(
    platform: &str,
    content_type: ContentType,
    content_id: &str,
    text: &str,
    audio: Option<&Path>,
) -> Payload {
    let media = || Some(audio.map(|p| p.display().to_string()).unwrap_or_default());
    let mut payload = Payload {
        content: Value::String(text.to_string()),
        audio_thumbnail: None,
        audio_snippet: None,
        audio: None,
        format: "plain text".to_string(),
    };

    match Platform::from_name(platform) {
        Some(Platform::Twitter) => {
            if content_type == ContentType::Tweet {
                payload.content = Value::String(text.chars().take(TWEET_MAX_CHARS).collect());
            }
            payload.audio_snippet = media();
            payload.format = "multilingual short text + TTS snippet".into();
        }
        Some(Platform::Instagram) => {
            payload.content = Value::String(format!("{text}{INSTAGRAM_TAGS}"));
            payload.audio_thumbnail = media();
            payload.format = "multilingual text + audio thumbnail".into();
        }
        Some(Platform::Linkedin) => {
            payload.content = json!({
                "title": format!("Multilingual Insight {content_id}"),
                "summary": text,
            });
            payload.audio = media();
            payload.format = "multilingual title + summary + TTS".into();
        }
        Some(Platform::Sanatan) => {
            payload.audio = media();
            payload.format = "multilingual voice script + audio".into();
        }
        None => {}
    }
    payload
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn twitter_truncates_tweets_by_chars() {
        let long: String = "ॐ".repeat(300);
        let p = format_payload("twitter", ContentType::Tweet, "1", &long, None);
        assert_eq!(p.text().chars().count(), TWEET_MAX_CHARS);
        assert_eq!(p.audio_snippet.as_deref(), Some(""));
    }

    #[test]
    fn twitter_keeps_voice_scripts_whole() {
        let long = "a".repeat(300);
        let audio = Path::new("/c/voice_1_twitter_ab.mp3");
        let p = format_payload("twitter", ContentType::Voice, "1", &long, Some(audio));
        assert_eq!(p.text().len(), 300);
        assert_eq!(p.audio_snippet.as_deref(), Some("/c/voice_1_twitter_ab.mp3"));
    }

    #[test]
    fn instagram_appends_tags() {
        let p = format_payload("instagram", ContentType::Post, "1", "Peace", None);
        assert_eq!(p.text(), "Peace\n#Inspiration #Multilingual");
        assert!(p.audio_thumbnail.is_some());
        assert!(p.audio.is_none());
    }

    #[test]
    fn linkedin_uses_title_and_summary() {
        let p = format_payload("linkedin", ContentType::Post, "9", "Insight body", None);
        assert_eq!(p.content["title"], "Multilingual Insight 9");
        assert_eq!(p.content["summary"], "Insight body");
    }

    #[test]
    fn unknown_platform_is_plain_text() {
        let p = format_payload("mastodon", ContentType::Post, "1", "hello", None);
        assert_eq!(p.text(), "hello");
        assert_eq!(p.format, "plain text");
        let json = serde_json::to_value(&p).unwrap();
        assert!(json.get("audio").is_none());
    }
}

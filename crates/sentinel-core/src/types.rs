use crate::error::SentinelError;
use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// ContentType
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentType {
    Tweet,
    Post,
    Voice,
}

impl ContentType {
    pub fn all() -> &'static [ContentType] {
        &[ContentType::Tweet, ContentType::Post, ContentType::Voice]
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ContentType::Tweet => "tweet",
            ContentType::Post => "post",
            ContentType::Voice => "voice",
        }
    }

    /// JSON field of a content artifact that carries the text for this type.
    pub fn text_field(self) -> &'static str {
        match self {
            ContentType::Tweet => "tweet",
            ContentType::Post => "post",
            ContentType::Voice => "voice_script",
        }
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ContentType {
    type Err = SentinelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "tweet" => Ok(ContentType::Tweet),
            "post" => Ok(ContentType::Post),
            "voice" => Ok(ContentType::Voice),
            _ => Err(SentinelError::InvalidValue {
                kind: "content type",
                value: s.to_string(),
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// PostStatus
// ---------------------------------------------------------------------------

/// Delivery state of a scheduled post.
///
/// Transitions: `Pending → Published | Failed | Preview`. Every state other
/// than `Pending` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PostStatus {
    Pending,
    Published,
    Failed,
    Preview,
}

impl PostStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            PostStatus::Pending => "pending",
            PostStatus::Published => "published",
            PostStatus::Failed => "failed",
            PostStatus::Preview => "preview",
        }
    }

    pub fn is_terminal(self) -> bool {
        !matches!(self, PostStatus::Pending)
    }
}

impl fmt::Display for PostStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for PostStatus {
    type Err = SentinelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(PostStatus::Pending),
            "published" => Ok(PostStatus::Published),
            "failed" => Ok(PostStatus::Failed),
            "preview" => Ok(PostStatus::Preview),
            _ => Err(SentinelError::InvalidValue {
                kind: "post status",
                value: s.to_string(),
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// Platform
// ---------------------------------------------------------------------------

/// Delivery targets with a dedicated payload shape. Platform names outside
/// this set are still schedulable; they get a plain payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Platform {
    Twitter,
    Instagram,
    Linkedin,
    Sanatan,
}

impl Platform {
    pub fn from_name(name: &str) -> Option<Platform> {
        match name {
            "twitter" => Some(Platform::Twitter),
            "instagram" => Some(Platform::Instagram),
            "linkedin" => Some(Platform::Linkedin),
            "sanatan" => Some(Platform::Sanatan),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Platform::Twitter => "twitter",
            Platform::Instagram => "instagram",
            Platform::Linkedin => "linkedin",
            Platform::Sanatan => "sanatan",
        }
    }

    /// Voice content for this platform cannot be delivered without its audio file.
    pub fn requires_audio(self) -> bool {
        matches!(self, Platform::Sanatan)
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Sentiment
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sentiment {
    Uplifting,
    Neutral,
    Devotional,
}

impl Sentiment {
    pub fn all() -> &'static [Sentiment] {
        &[Sentiment::Uplifting, Sentiment::Neutral, Sentiment::Devotional]
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Sentiment::Uplifting => "uplifting",
            Sentiment::Neutral => "neutral",
            Sentiment::Devotional => "devotional",
        }
    }
}

impl fmt::Display for Sentiment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Sentiment {
    type Err = SentinelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "uplifting" => Ok(Sentiment::Uplifting),
            "neutral" => Ok(Sentiment::Neutral),
            "devotional" => Ok(Sentiment::Devotional),
            _ => Err(SentinelError::InvalidValue {
                kind: "sentiment",
                value: s.to_string(),
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// LanguageSelector
// ---------------------------------------------------------------------------

pub const ALL_LANGUAGES: &str = "all";

/// A language argument: one configured language or the `all` wildcard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LanguageSelector {
    All,
    One(String),
}

impl LanguageSelector {
    /// Parse `value` against the configured language set.
    pub fn parse(value: &str, languages: &[String]) -> Result<Self, SentinelError> {
        if value == ALL_LANGUAGES {
            return Ok(LanguageSelector::All);
        }
        if languages.iter().any(|l| l == value) {
            Ok(LanguageSelector::One(value.to_string()))
        } else {
            Err(SentinelError::UnknownLanguage(value.to_string()))
        }
    }

    /// The concrete languages this selector stands for.
    pub fn expand(&self, languages: &[String]) -> Vec<String> {
        match self {
            LanguageSelector::All => languages.to_vec(),
            LanguageSelector::One(l) => vec![l.clone()],
        }
    }

    /// Store filter: `None` means every language.
    pub fn as_filter(&self) -> Option<&str> {
        match self {
            LanguageSelector::All => None,
            LanguageSelector::One(l) => Some(l.as_str()),
        }
    }
}

impl fmt::Display for LanguageSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LanguageSelector::All => f.write_str(ALL_LANGUAGES),
            LanguageSelector::One(l) => f.write_str(l),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

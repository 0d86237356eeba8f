use crate::error::{Result, SentinelError};
use crate::paths;
use crate::types::{ContentType, Sentiment, ALL_LANGUAGES};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

/// Placeholder in a stage command that resolves to the running `sentinel` binary.
pub const SELF_EXE_TOKEN: &str = "{self}";

// ---------------------------------------------------------------------------
// ConfigWarning / WarnLevel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigWarning {
    pub level: WarnLevel,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarnLevel {
    Warning,
    Error,
}

// ---------------------------------------------------------------------------
// StageConfig
// ---------------------------------------------------------------------------

/// One independently launched stage program.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageConfig {
    pub id: String,
    #[serde(default)]
    pub name: String,
    /// argv; the first element is the program. `{self}` is replaced by the
    /// path of the running sentinel binary.
    pub command: Vec<String>,
    /// Forward the pipeline language as a trailing positional argument.
    #[serde(default)]
    pub language_arg: bool,
    /// Forward `--sentiment <value>`.
    #[serde(default)]
    pub sentiment_arg: bool,
    /// The stage reads or rebuilds the shared Scheduling Store.
    #[serde(default)]
    pub store_access: bool,
}

impl StageConfig {
    pub fn display_name(&self) -> &str {
        if self.name.is_empty() {
            &self.id
        } else {
            &self.name
        }
    }
}

fn external_stage(id: &str, name: &str, language_arg: bool, sentiment_arg: bool) -> StageConfig {
    StageConfig {
        id: id.to_string(),
        name: name.to_string(),
        command: vec![format!("agents/{id}")],
        language_arg,
        sentiment_arg,
        store_access: false,
    }
}

fn builtin_stage(id: &str, name: &str, subcommand: &str) -> StageConfig {
    StageConfig {
        id: id.to_string(),
        name: name.to_string(),
        command: vec![SELF_EXE_TOKEN.to_string(), subcommand.to_string()],
        language_arg: true,
        sentiment_arg: false,
        store_access: true,
    }
}

fn default_stages() -> Vec<StageConfig> {
    vec![
        external_stage("miner_sanitizer", "Knowledge Miner & Sanitizer", false, false),
        external_stage("multilingual_pipeline", "Multilingual Router", true, false),
        external_stage("sentiment_tuner", "Sentiment Tuner", true, true),
        external_stage("ai_writer_voicegen", "AI Writer & Voice Generator", true, true),
        external_stage("security_guard", "Security & Compliance", true, false),
        external_stage("adaptive_targeter", "Context-Aware Platform Targeter", true, false),
        builtin_stage("scheduler", "Scheduler", "schedule"),
        builtin_stage("publisher_sim", "Publisher Simulator", "publish"),
        external_stage("analytics_collector", "Analytics Collector", false, false),
        external_stage("strategy_recommender", "Strategy Recommender", false, false),
    ]
}

// ---------------------------------------------------------------------------
// RouteConfig
// ---------------------------------------------------------------------------

/// Which platforms a content type is scheduled for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteConfig {
    pub content_type: ContentType,
    pub platforms: Vec<String>,
}

fn default_routing() -> Vec<RouteConfig> {
    vec![
        RouteConfig {
            content_type: ContentType::Tweet,
            platforms: vec!["twitter".into()],
        },
        RouteConfig {
            content_type: ContentType::Post,
            platforms: vec!["instagram".into(), "linkedin".into()],
        },
        RouteConfig {
            content_type: ContentType::Voice,
            platforms: vec!["sanatan".into()],
        },
    ]
}

// ---------------------------------------------------------------------------
// SchedulerConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// New records are stamped `now - backdate_minutes`, so a batch run
    /// publishes them immediately.
    #[serde(default = "default_backdate_minutes")]
    pub backdate_minutes: i64,
}

fn default_backdate_minutes() -> i64 {
    60
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            backdate_minutes: default_backdate_minutes(),
        }
    }
}

impl SchedulerConfig {
    pub fn backdate(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.backdate_minutes)
    }
}

// ---------------------------------------------------------------------------
// PublisherConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublisherConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    /// Platforms the simulated transport accepts; anything else is rejected.
    #[serde(default = "default_accepted_platforms")]
    pub accepted_platforms: Vec<String>,
    /// Environment variable holding the token signing secret.
    #[serde(default = "default_secret_env")]
    pub secret_env: String,
}

fn default_max_attempts() -> u32 {
    3
}

fn default_poll_interval_secs() -> u64 {
    5
}

fn default_accepted_platforms() -> Vec<String> {
    ["twitter", "instagram", "linkedin", "sanatan"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_secret_env() -> String {
    "SENTINEL_SECRET_KEY".to_string()
}

impl Default for PublisherConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            poll_interval_secs: default_poll_interval_secs(),
            accepted_platforms: default_accepted_platforms(),
            secret_env: default_secret_env(),
        }
    }
}

impl PublisherConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}

// ---------------------------------------------------------------------------
// OrchestratorConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Seconds between SIGTERM and SIGKILL when stopping a stage.
    #[serde(default = "default_kill_grace_secs")]
    pub kill_grace_secs: u64,
}

fn default_kill_grace_secs() -> u64 {
    5
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            kill_grace_secs: default_kill_grace_secs(),
        }
    }
}

impl OrchestratorConfig {
    pub fn kill_grace(&self) -> Duration {
        Duration::from_secs(self.kill_grace_secs)
    }
}

// ---------------------------------------------------------------------------
// Config (top-level)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default = "default_languages")]
    pub languages: Vec<String>,
    #[serde(default = "default_sentiments")]
    pub sentiments: Vec<Sentiment>,
    #[serde(default = "default_sentiment")]
    pub default_sentiment: Sentiment,
    #[serde(default = "default_stages")]
    pub stages: Vec<StageConfig>,
    #[serde(default = "default_routing")]
    pub routing: Vec<RouteConfig>,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub publisher: PublisherConfig,
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,
}

fn default_version() -> u32 {
    1
}

fn default_languages() -> Vec<String> {
    vec!["en".into(), "hi".into(), "sa".into()]
}

fn default_sentiments() -> Vec<Sentiment> {
    Sentiment::all().to_vec()
}

fn default_sentiment() -> Sentiment {
    Sentiment::Uplifting
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: default_version(),
            languages: default_languages(),
            sentiments: default_sentiments(),
            default_sentiment: default_sentiment(),
            stages: default_stages(),
            routing: default_routing(),
            scheduler: SchedulerConfig::default(),
            publisher: PublisherConfig::default(),
            orchestrator: OrchestratorConfig::default(),
        }
    }
}

impl Config {
    pub fn load(root: &Path) -> Result<Self> {
        let path = paths::config_path(root);
        if !path.exists() {
            return Err(SentinelError::NotInitialized);
        }
        let data = std::fs::read_to_string(&path)?;
        let cfg: Config = serde_yaml::from_str(&data)?;
        Ok(cfg)
    }

    pub fn save(&self, root: &Path) -> Result<()> {
        let path = paths::config_path(root);
        let data = serde_yaml::to_string(self)?;
        crate::io::atomic_write(&path, data.as_bytes())
    }

    pub fn stage(&self, id: &str) -> Result<&StageConfig> {
        self.stages
            .iter()
            .find(|s| s.id == id)
            .ok_or_else(|| SentinelError::UnknownStage(id.to_string()))
    }

    /// Validate a sentiment argument against the configured set.
    pub fn sentiment(&self, value: &str) -> Result<Sentiment> {
        let sentiment: Sentiment = value.parse()?;
        if !self.sentiments.contains(&sentiment) {
            return Err(SentinelError::InvalidValue {
                kind: "sentiment",
                value: value.to_string(),
            });
        }
        Ok(sentiment)
    }

    // -----------------------------------------------------------------------
    // Validation
    // -----------------------------------------------------------------------

    pub fn validate(&self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();
        let error = |message: String| ConfigWarning {
            level: WarnLevel::Error,
            message,
        };
        let warning = |message: String| ConfigWarning {
            level: WarnLevel::Warning,
            message,
        };

        if self.languages.is_empty() {
            warnings.push(error("no languages configured".into()));
        }
        for lang in &self.languages {
            if lang == ALL_LANGUAGES {
                warnings.push(error(format!(
                    "'{ALL_LANGUAGES}' is a wildcard and cannot be a configured language"
                )));
            } else if paths::validate_ident("language", lang).is_err() {
                warnings.push(error(format!("invalid language code '{lang}'")));
            }
        }

        let mut seen = HashSet::new();
        for stage in &self.stages {
            if !seen.insert(stage.id.as_str()) {
                warnings.push(error(format!("duplicate stage id '{}'", stage.id)));
            }
            if paths::validate_ident("stage", &stage.id).is_err() {
                warnings.push(error(format!("invalid stage id '{}'", stage.id)));
            }
            if stage.command.first().map_or(true, |p| p.trim().is_empty()) {
                warnings.push(error(format!("stage '{}' has an empty command", stage.id)));
            }
        }

        if !self.sentiments.contains(&self.default_sentiment) {
            warnings.push(error(format!(
                "default_sentiment '{}' is not in sentiments",
                self.default_sentiment
            )));
        }

        if self.publisher.max_attempts == 0 {
            warnings.push(error("publisher.max_attempts must be at least 1".into()));
        }

        for route in &self.routing {
            for platform in &route.platforms {
                if !self.publisher.accepted_platforms.contains(platform) {
                    warnings.push(warning(format!(
                        "platform '{platform}' is routed for {} but not accepted by the publisher; \
                         its posts will always fail",
                        route.content_type
                    )));
                }
            }
        }

        if self.scheduler.backdate_minutes < 0 {
            warnings.push(warning(
                "scheduler.backdate_minutes is negative; posts will not be due immediately".into(),
            ));
        }

        warnings
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn default_config_roundtrip() {
        let cfg = Config::default();
        let yaml = serde_yaml::to_string(&cfg).unwrap();
        let parsed: Config = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(parsed.languages, vec!["en", "hi", "sa"]);
        assert_eq!(parsed.stages, cfg.stages);
        assert_eq!(parsed.publisher.max_attempts, 3);
    }

    #[test]
    fn default_pipeline_order() {
        let cfg = Config::default();
        let ids: Vec<&str> = cfg.stages.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(
            ids,
            vec![
                "miner_sanitizer",
                "multilingual_pipeline",
                "sentiment_tuner",
                "ai_writer_voicegen",
                "security_guard",
                "adaptive_targeter",
                "scheduler",
                "publisher_sim",
                "analytics_collector",
                "strategy_recommender",
            ]
        );
        let store_stages: Vec<&str> = cfg
            .stages
            .iter()
            .filter(|s| s.store_access)
            .map(|s| s.id.as_str())
            .collect();
        assert_eq!(store_stages, vec!["scheduler", "publisher_sim"]);
    }

    #[test]
    fn partial_yaml_fills_defaults() {
        let yaml = "languages: [en]\npublisher:\n  max_attempts: 5\n";
        let cfg: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(cfg.languages, vec!["en"]);
        assert_eq!(cfg.publisher.max_attempts, 5);
        assert_eq!(cfg.publisher.poll_interval_secs, 5);
        assert_eq!(cfg.stages.len(), 10);
        assert_eq!(cfg.routing.len(), 3);
    }

    #[test]
    fn load_missing_is_not_initialized() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            Config::load(dir.path()),
            Err(SentinelError::NotInitialized)
        ));
    }

    #[test]
    fn save_then_load() {
        let dir = TempDir::new().unwrap();
        let mut cfg = Config::default();
        cfg.orchestrator.kill_grace_secs = 1;
        cfg.save(dir.path()).unwrap();
        let loaded = Config::load(dir.path()).unwrap();
        assert_eq!(loaded.orchestrator.kill_grace_secs, 1);
    }

    #[test]
    fn stage_lookup() {
        let cfg = Config::default();
        assert_eq!(cfg.stage("scheduler").unwrap().command[1], "schedule");
        assert!(matches!(
            cfg.stage("nope"),
            Err(SentinelError::UnknownStage(s)) if s == "nope"
        ));
    }

    #[test]
    fn sentiment_must_be_configured() {
        let mut cfg = Config::default();
        cfg.sentiments = vec![Sentiment::Neutral];
        assert_eq!(cfg.sentiment("neutral").unwrap(), Sentiment::Neutral);
        assert!(cfg.sentiment("devotional").is_err());
        assert!(cfg.sentiment("angry").is_err());
    }

    #[test]
    fn default_config_validates_clean() {
        assert!(Config::default().validate().is_empty());
    }

    #[test]
    fn validate_flags_problems() {
        let mut cfg = Config::default();
        cfg.languages.push("all".into());
        cfg.stages.push(cfg.stages[0].clone());
        cfg.publisher.max_attempts = 0;
        cfg.routing[0].platforms.push("mastodon".into());

        let warnings = cfg.validate();
        let errors: Vec<_> = warnings
            .iter()
            .filter(|w| w.level == WarnLevel::Error)
            .collect();
        assert_eq!(errors.len(), 3, "{warnings:?}");
        assert!(warnings
            .iter()
            .any(|w| w.level == WarnLevel::Warning && w.message.contains("mastodon")));
    }
}

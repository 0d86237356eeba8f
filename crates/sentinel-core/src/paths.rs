use crate::error::{Result, SentinelError};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

// ---------------------------------------------------------------------------
// Directory constants
// ---------------------------------------------------------------------------

pub const SENTINEL_DIR: &str = ".sentinel";
pub const CONFIG_FILE: &str = ".sentinel/config.yaml";
pub const RUN_DIR: &str = ".sentinel/run";

pub const CONTENT_READY_DIR: &str = "content/content_ready";
pub const TRANSLATION_PREVIEWS_DIR: &str = "content/translation_previews";

pub const SCHEDULER_DB_DIR: &str = "scheduler_db";
pub const SCHEDULER_DB_FILE: &str = "scheduler_db/scheduled_posts.db";

pub const DELIVERY_DIR: &str = "scheduled_posts";
pub const LOGS_DIR: &str = "logs";
pub const ALERT_DASHBOARD_FILE: &str = "logs/alert_dashboard.json";

pub const ANALYTICS_DIR: &str = "analytics_db";
pub const POST_METRICS_FILE: &str = "analytics_db/post_metrics.json";
pub const STRATEGY_SUGGESTIONS_FILE: &str = "analytics_db/strategy_suggestions.json";

// ---------------------------------------------------------------------------
// Path helpers
// ---------------------------------------------------------------------------

pub fn sentinel_dir(root: &Path) -> PathBuf {
    root.join(SENTINEL_DIR)
}

pub fn config_path(root: &Path) -> PathBuf {
    root.join(CONFIG_FILE)
}

pub fn run_dir(root: &Path) -> PathBuf {
    root.join(RUN_DIR)
}

pub fn content_ready_dir(root: &Path) -> PathBuf {
    root.join(CONTENT_READY_DIR)
}

/// The Content Store partition for one language.
pub fn content_dir(root: &Path, language: &str) -> PathBuf {
    content_ready_dir(root).join(language)
}

pub fn translation_previews_dir(root: &Path) -> PathBuf {
    root.join(TRANSLATION_PREVIEWS_DIR)
}

pub fn scheduler_db_path(root: &Path) -> PathBuf {
    root.join(SCHEDULER_DB_FILE)
}

pub fn delivery_dir(root: &Path) -> PathBuf {
    root.join(DELIVERY_DIR)
}

pub fn logs_dir(root: &Path) -> PathBuf {
    root.join(LOGS_DIR)
}

/// Security alerts raised by external monitoring stages.
pub fn alert_dashboard_path(root: &Path) -> PathBuf {
    root.join(ALERT_DASHBOARD_FILE)
}

pub fn post_metrics_path(root: &Path) -> PathBuf {
    root.join(POST_METRICS_FILE)
}

pub fn strategy_suggestions_path(root: &Path) -> PathBuf {
    root.join(STRATEGY_SUGGESTIONS_FILE)
}

/// Captured stdout/stderr of a stage, appended by the orchestrator.
pub fn stage_log_path(root: &Path, stage: &str) -> PathBuf {
    logs_dir(root).join(format!("{stage}.log"))
}

/// Structured (JSON lines) log written by a sentinel component.
pub fn component_log_path(root: &Path, component: &str) -> PathBuf {
    logs_dir(root).join(format!("{component}.jsonl"))
}

// ---------------------------------------------------------------------------
// Identifier validation
// ---------------------------------------------------------------------------

static IDENT_RE: OnceLock<Regex> = OnceLock::new();

fn ident_re() -> &'static Regex {
    IDENT_RE.get_or_init(|| Regex::new(r"^[a-z0-9][a-z0-9_\-]*$").unwrap())
}

/// Stage ids and language codes become file names, so they are restricted to
/// lowercase alphanumerics, `_` and `-`.
pub fn validate_ident(kind: &'static str, value: &str) -> Result<()> {
    if value.is_empty() || value.len() > 64 || !ident_re().is_match(value) {
        return Err(SentinelError::InvalidValue {
            kind,
            value: value.to_string(),
        });
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_idents() {
        for id in ["en", "publisher_sim", "ai-writer", "x1"] {
            validate_ident("stage", id).unwrap_or_else(|_| panic!("expected valid: {id}"));
        }
    }

    #[test]
    fn invalid_idents() {
        for id in ["", "_lead", "has space", "UPPER", "../etc", "a/b"] {
            assert!(validate_ident("stage", id).is_err(), "expected invalid: {id}");
        }
    }

    #[test]
    fn path_helpers() {
        let root = Path::new("/tmp/proj");
        assert_eq!(
            config_path(root),
            PathBuf::from("/tmp/proj/.sentinel/config.yaml")
        );
        assert_eq!(
            content_dir(root, "hi"),
            PathBuf::from("/tmp/proj/content/content_ready/hi")
        );
        assert_eq!(
            stage_log_path(root, "scheduler"),
            PathBuf::from("/tmp/proj/logs/scheduler.log")
        );
        assert_eq!(
            scheduler_db_path(root),
            PathBuf::from("/tmp/proj/scheduler_db/scheduled_posts.db")
        );
    }
}

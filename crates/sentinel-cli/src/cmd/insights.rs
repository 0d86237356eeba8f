//! Read-only viewers for files written by the monitoring and analytics stages.

use anyhow::Context;
use sentinel_core::paths;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;

use crate::output::{print_json, print_table, truncate};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    #[serde(default)]
    pub content_id: String,
    #[serde(default)]
    pub platform: String,
    #[serde(default, alias = "lang")]
    pub language: String,
    #[serde(default)]
    pub reason: String,
    #[serde(default)]
    pub snippet: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flagged_term: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostMetrics {
    #[serde(default)]
    pub content_id: String,
    #[serde(default)]
    pub platform: String,
    #[serde(default, alias = "lang")]
    pub language: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sentiment: Option<String>,
    #[serde(default)]
    pub stats: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub performance: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Suggestion {
    #[serde(default)]
    pub platform: String,
    #[serde(default, alias = "lang")]
    pub language: String,
    #[serde(default, alias = "message")]
    pub suggestion: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub basis: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
}

/// Records from a JSON array file; a missing file holds none.
fn read_records<T: DeserializeOwned>(path: &Path) -> anyhow::Result<Vec<T>> {
    if !path.is_file() {
        return Ok(Vec::new());
    }
    let data = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&data).with_context(|| format!("malformed records in {}", path.display()))
}

/// `key=value` pairs of a JSON object, or the value as written.
fn flatten(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Object(map) => map
            .iter()
            .map(|(k, v)| match v {
                Value::String(s) => format!("{k}={s}"),
                other => format!("{k}={other}"),
            })
            .collect::<Vec<_>>()
            .join(" "),
        other => other.to_string(),
    }
}

pub fn alerts(root: &Path, json: bool) -> anyhow::Result<()> {
    let alerts: Vec<Alert> = read_records(&paths::alert_dashboard_path(root))?;
    if json {
        return print_json(&alerts);
    }
    if alerts.is_empty() {
        println!("No alerts found.");
        return Ok(());
    }
    let rows = alerts
        .iter()
        .map(|a| {
            vec![
                a.content_id.clone(),
                a.platform.clone(),
                a.language.clone(),
                a.reason.clone(),
                truncate(&a.snippet, 50),
            ]
        })
        .collect();
    print_table(&["CONTENT", "PLATFORM", "LANG", "REASON", "SNIPPET"], rows);
    Ok(())
}

pub fn analytics(root: &Path, json: bool) -> anyhow::Result<()> {
    let metrics: Vec<PostMetrics> = read_records(&paths::post_metrics_path(root))?;
    if json {
        return print_json(&metrics);
    }
    if metrics.is_empty() {
        println!("No metrics found.");
        return Ok(());
    }
    let rows = metrics
        .iter()
        .map(|m| {
            vec![
                m.content_id.clone(),
                m.platform.clone(),
                m.language.clone(),
                m.sentiment.clone().unwrap_or_default(),
                flatten(&m.stats),
                m.performance.as_ref().map(flatten).unwrap_or_default(),
            ]
        })
        .collect();
    print_table(
        &["CONTENT", "PLATFORM", "LANG", "SENTIMENT", "STATS", "PERFORMANCE"],
        rows,
    );
    Ok(())
}

pub fn suggestions(root: &Path, json: bool) -> anyhow::Result<()> {
    let suggestions: Vec<Suggestion> = read_records(&paths::strategy_suggestions_path(root))?;
    if json {
        return print_json(&suggestions);
    }
    if suggestions.is_empty() {
        println!("No suggestions found.");
        return Ok(());
    }
    let rows = suggestions
        .iter()
        .map(|s| {
            let basis = match (&s.basis, s.score) {
                (Some(basis), _) => basis.clone(),
                (None, Some(score)) => format!("score {score:.2}"),
                (None, None) => String::new(),
            };
            vec![
                s.platform.clone(),
                s.language.clone(),
                truncate(&s.suggestion, 60),
                basis,
            ]
        })
        .collect();
    print_table(&["PLATFORM", "LANG", "SUGGESTION", "BASIS"], rows);
    Ok(())
}

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::Level;

use crate::cmd;

#[derive(Parser)]
#[command(
    name = "sentinel",
    about = "Run, schedule, and publish the multilingual content pipeline",
    version,
    propagate_version = true
)]
pub struct Cli {
    /// Project root (default: auto-detect from .sentinel/)
    #[arg(long, global = true, env = "SENTINEL_ROOT")]
    pub root: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Commands {
    /// Create the project layout and a default config
    Init,

    /// Run one stage to completion
    Run {
        /// Stage id from the config
        stage: String,
        /// Language to forward (a configured language or "all")
        #[arg(long)]
        language: Option<String>,
        /// Sentiment to forward to stages that take one
        #[arg(long)]
        sentiment: Option<String>,
    },

    /// Run every stage in order for a language, stopping at the first failure
    RunPipeline {
        /// A configured language or "all"
        language: String,
        #[arg(long)]
        sentiment: Option<String>,
    },

    /// Show captured stage output and component logs
    Logs {
        /// Stage id (omit to show every log)
        stage: Option<String>,
    },

    /// Stop every running instance of a stage
    Kill { stage: String },

    /// Stop the active pipeline for a language
    KillPipeline { language: String },

    /// Stop a stage if running, then run it again
    Restart {
        stage: String,
        #[arg(long)]
        language: Option<String>,
        #[arg(long)]
        sentiment: Option<String>,
    },

    /// Stop a language's pipeline if running, then run it again
    RestartPipeline {
        language: String,
        #[arg(long)]
        sentiment: Option<String>,
    },

    /// Show stages and active pipelines
    List,

    /// Rebuild the scheduling store from ready content
    Schedule {
        /// A configured language or "all"
        language: String,
    },

    /// Deliver due posts through the simulated transport
    Publish {
        /// A configured language or "all"
        #[arg(required_unless_present = "multilingual_preview")]
        language: Option<String>,
        /// Render delivery records without delivering
        #[arg(long)]
        preview: bool,
        /// Polling rounds before giving up (default: from config)
        #[arg(long)]
        max_attempts: Option<u32>,
        /// Seconds between empty polling rounds (default: from config)
        #[arg(long)]
        poll_interval_secs: Option<u64>,
        /// Render translation previews for one content id
        #[arg(long, requires = "content_id", conflicts_with = "language")]
        multilingual_preview: bool,
        /// Content id for --multilingual-preview
        #[arg(long)]
        content_id: Option<String>,
    },

    /// List scheduling store records
    Posts {
        #[arg(long)]
        language: Option<String>,
    },

    /// Show security alerts flagged by the monitoring stage
    Alerts,

    /// Show per-post engagement metrics
    Analytics,

    /// Show strategy suggestions derived from the metrics
    Suggestions,

    /// Interactive session that keeps pipelines running in the background
    Console,

    /// Delete generated content, logs, the scheduling store, and delivery records
    Purge,
}

impl Commands {
    /// Name of the structured log this command appends to.
    pub fn component(&self) -> &'static str {
        match self {
            Commands::Schedule { .. } => "scheduler",
            Commands::Publish { .. } => "publisher",
            _ => "orchestrator",
        }
    }

    pub fn default_level(&self) -> Level {
        match self {
            Commands::Run { .. }
            | Commands::RunPipeline { .. }
            | Commands::Restart { .. }
            | Commands::RestartPipeline { .. }
            | Commands::Schedule { .. }
            | Commands::Publish { .. }
            | Commands::Console => Level::INFO,
            _ => Level::WARN,
        }
    }

    /// Commands that drive an `Orchestrator`.
    pub fn needs_orchestrator(&self) -> bool {
        matches!(
            self,
            Commands::Run { .. }
                | Commands::RunPipeline { .. }
                | Commands::Kill { .. }
                | Commands::KillPipeline { .. }
                | Commands::Restart { .. }
                | Commands::RestartPipeline { .. }
                | Commands::List
        )
    }
}

/// Run a command to completion in this process.
pub fn execute(root: &Path, command: Commands, json: bool) -> anyhow::Result<()> {
    match command {
        Commands::Console => cmd::console::run(root, json),
        c if c.needs_orchestrator() => {
            let orch = cmd::orchestrator(root)?;
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(cmd::execute_orchestrated(&orch, c, json))
        }
        c => cmd::execute_local(root, c, json),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Cli, clap::Error> {
        Cli::try_parse_from(std::iter::once("sentinel").chain(args.iter().copied()))
    }

    #[test]
    fn publish_requires_language_or_preview_target() {
        assert!(parse(&["publish"]).is_err());
        assert!(parse(&["publish", "en", "--preview"]).is_ok());
        assert!(parse(&["publish", "--multilingual-preview"]).is_err());

        let cli = parse(&["publish", "--multilingual-preview", "--content-id", "42"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Publish { multilingual_preview: true, content_id: Some(ref id), .. } if id == "42"
        ));
    }

    #[test]
    fn globals_after_subcommand() {
        let cli = parse(&["list", "--json"]).unwrap();
        assert!(cli.json);
        assert_eq!(cli.command, Commands::List);
    }

    #[test]
    fn components_and_levels() {
        let schedule = Commands::Schedule {
            language: "en".into(),
        };
        assert_eq!(schedule.component(), "scheduler");
        assert_eq!(schedule.default_level(), Level::INFO);
        assert_eq!(Commands::List.component(), "orchestrator");
        assert_eq!(Commands::List.default_level(), Level::WARN);
        assert!(Commands::List.needs_orchestrator());
        assert!(!schedule.needs_orchestrator());
    }

    #[test]
    fn viewers_are_quiet_local_commands() {
        for command in [Commands::Alerts, Commands::Analytics, Commands::Suggestions] {
            assert!(!command.needs_orchestrator());
            assert_eq!(command.default_level(), Level::WARN);
        }
        assert_eq!(parse(&["suggestions", "-j"]).unwrap().command, Commands::Suggestions);
    }
}

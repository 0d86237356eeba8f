//! Interactive session over one long-lived orchestrator.
//!
//! Each input line is parsed as a `sentinel` command. Pipelines started here
//! run in the background, so `list`, `kill-pipeline` and `restart-pipeline`
//! act on them while they are still going. Leaving the console kills the
//! pipelines it owns.

use clap::Parser;
use sentinel_orchestrator::Orchestrator;
use std::io::Write;
use std::path::Path;
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::cli::Commands;
use crate::cmd::{self, pipeline};

const PROMPT: &str = "sentinel> ";

#[derive(Parser, Debug)]
#[command(name = "sentinel", no_binary_name = true, disable_version_flag = true)]
struct ConsoleLine {
    #[command(subcommand)]
    command: Commands,
}

enum Input {
    Empty,
    Exit,
    Command(Commands),
}

fn parse_line(line: &str) -> Result<Input, clap::Error> {
    let words: Vec<&str> = line.split_whitespace().collect();
    match words.as_slice() {
        [] => Ok(Input::Empty),
        ["exit"] | ["quit"] => Ok(Input::Exit),
        _ => ConsoleLine::try_parse_from(words).map(|l| Input::Command(l.command)),
    }
}

fn prompt() {
    print!("{PROMPT}");
    let _ = std::io::stdout().flush();
}

pub fn run(root: &Path, json: bool) -> anyhow::Result<()> {
    let orch = cmd::orchestrator(root)?;
    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(session(&orch, json))
}

async fn session(orch: &Orchestrator, json: bool) -> anyhow::Result<()> {
    println!("sentinel console for {} (type 'help', 'exit' to leave)", orch.root().display());
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        prompt();
        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => None,
        };
        let Some(line) = line else {
            break;
        };

        let command = match parse_line(&line) {
            Ok(Input::Empty) => continue,
            Ok(Input::Exit) => break,
            Ok(Input::Command(c)) => c,
            Err(e) => {
                let _ = e.print();
                continue;
            }
        };
        if let Err(e) = dispatch(orch, command, json).await {
            eprintln!("error: {e:#}");
        }
    }

    shutdown(orch).await;
    Ok(())
}

async fn dispatch(orch: &Orchestrator, command: Commands, json: bool) -> anyhow::Result<()> {
    match command {
        Commands::Console => anyhow::bail!("already in the console"),
        Commands::RunPipeline {
            language,
            sentiment,
        } => {
            pipeline::spawn(orch, &language, sentiment.as_deref(), false)?;
            println!("pipeline {language} started in the background");
            Ok(())
        }
        Commands::RestartPipeline {
            language,
            sentiment,
        } => {
            pipeline::spawn(orch, &language, sentiment.as_deref(), true)?;
            println!("pipeline {language} restarting in the background");
            Ok(())
        }
        c if c.needs_orchestrator() => cmd::execute_orchestrated(orch, c, json).await,
        c => {
            let root = orch.root().to_path_buf();
            tokio::task::spawn_blocking(move || cmd::execute_local(&root, c, json)).await?
        }
    }
}

/// Kill the pipelines this console started.
async fn shutdown(orch: &Orchestrator) {
    for killed in orch.kill_local_pipelines().await {
        println!("stopping pipeline {}", killed.run.language);
    }
}

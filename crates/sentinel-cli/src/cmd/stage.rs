use anyhow::Context;
use sentinel_orchestrator::{Orchestrator, StageOutcome, StageParams};

use crate::cmd::{parse_languages, parse_sentiment};
use crate::output::print_json;

/// One `StageParams` per language the `--language` argument stands for.
fn expand_params(
    orch: &Orchestrator,
    language: Option<&str>,
    sentiment: Option<&str>,
) -> anyhow::Result<Vec<StageParams>> {
    let config = orch.config();
    let sentiment = parse_sentiment(config, sentiment)?;
    let Some(language) = language else {
        return Ok(vec![StageParams::default().with_sentiment(sentiment)]);
    };
    let languages = parse_languages(config, language)?.expand(&config.languages);
    Ok(languages
        .into_iter()
        .map(|l| StageParams::for_language(l).with_sentiment(sentiment))
        .collect())
}

fn report(outcome: &StageOutcome, json: bool) -> anyhow::Result<()> {
    if json {
        return print_json(outcome);
    }
    print!("{}", outcome.stdout);
    eprint!("{}", outcome.stderr);
    let language = outcome.language.as_deref().unwrap_or("-");
    match (outcome.exit_code, outcome.signal) {
        (Some(code), _) => println!(
            "{} [{language}] pid {} exited {code} in {} ms",
            outcome.stage, outcome.pid, outcome.duration_ms
        ),
        (None, Some(sig)) => println!(
            "{} [{language}] pid {} killed by signal {sig} after {} ms",
            outcome.stage, outcome.pid, outcome.duration_ms
        ),
        (None, None) => println!("{} [{language}] pid {} ended", outcome.stage, outcome.pid),
    }
    Ok(())
}

async fn launch_each(
    orch: &Orchestrator,
    stage: &str,
    params: Vec<StageParams>,
    json: bool,
    restart: bool,
) -> anyhow::Result<()> {
    let mut failures = Vec::new();
    for (i, p) in params.iter().enumerate() {
        let result = if restart && i == 0 {
            orch.restart_stage(stage, p).await
        } else {
            orch.run_stage(stage, p).await
        };
        let outcome = result.with_context(|| format!("failed to run stage '{stage}'"))?;
        report(&outcome, json)?;
        if !outcome.success() {
            failures.push(outcome.failure());
        }
    }
    match failures.as_slice() {
        [] => Ok(()),
        [one] => anyhow::bail!("{one}"),
        many => anyhow::bail!(
            "{} runs failed: {}",
            many.len(),
            many.iter().map(|f| f.to_string()).collect::<Vec<_>>().join("; ")
        ),
    }
}

pub async fn run(
    orch: &Orchestrator,
    stage: &str,
    language: Option<&str>,
    sentiment: Option<&str>,
    json: bool,
) -> anyhow::Result<()> {
    let params = expand_params(orch, language, sentiment)?;
    launch_each(orch, stage, params, json, false).await
}

/// Kill every live instance of `stage`, then run it again.
pub async fn restart(
    orch: &Orchestrator,
    stage: &str,
    language: Option<&str>,
    sentiment: Option<&str>,
    json: bool,
) -> anyhow::Result<()> {
    let params = expand_params(orch, language, sentiment)?;
    launch_each(orch, stage, params, json, true).await
}

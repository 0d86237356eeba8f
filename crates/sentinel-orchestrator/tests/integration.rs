use sentinel_core::config::{Config, StageConfig};
use sentinel_core::types::Sentiment;
use sentinel_orchestrator::{
    Orchestrator, OrchestratorError, PipelineStatus, StageFailure, StageParams,
};
use std::time::Duration;
use tempfile::TempDir;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// A stage running `script` under `sh -c`. With `language_arg` set the
/// pipeline language arrives as `$0`.
fn sh_stage(id: &str, script: &str) -> StageConfig {
    StageConfig {
        id: id.to_string(),
        name: String::new(),
        command: vec!["sh".into(), "-c".into(), script.into()],
        language_arg: true,
        sentiment_arg: false,
        store_access: false,
    }
}

fn project(stages: Vec<StageConfig>) -> (TempDir, Orchestrator) {
    let dir = TempDir::new().unwrap();
    let mut config = Config {
        languages: vec!["en".into(), "hi".into()],
        stages,
        ..Config::default()
    };
    config.orchestrator.kill_grace_secs = 1;
    let orch = Orchestrator::new(dir.path(), config, "/bin/true");
    (dir, orch)
}

async fn wait_until(what: &str, mut check: impl FnMut() -> bool) {
    for _ in 0..200 {
        if check() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
    panic!("timed out waiting for {what}");
}

fn read(dir: &TempDir, name: &str) -> String {
    std::fs::read_to_string(dir.path().join(name)).unwrap_or_default()
}

// ---------------------------------------------------------------------------
// Single stages
// ---------------------------------------------------------------------------

#[tokio::test]
async fn run_stage_captures_output_and_logs() {
    let (dir, orch) = project(vec![sh_stage("greet", "echo hello $0; echo warn >&2")]);

    let outcome = orch
        .run_stage("greet", &StageParams::for_language("en"))
        .await
        .unwrap();
    assert!(outcome.success());
    assert_eq!(outcome.stdout, "hello en\n");
    assert_eq!(outcome.stderr, "warn\n");

    let log = read(&dir, "logs/greet.log");
    assert!(log.contains("stage=greet"), "{log}");
    assert!(log.contains("language=en"));
    assert!(log.contains("exit=0"));
    assert!(log.contains("hello en"));

    assert!(!orch.snapshot().stages[0].running);
}

#[tokio::test]
async fn failing_stage_is_reported_not_raised() {
    let (_dir, orch) = project(vec![sh_stage("bad", "echo broken >&2; exit 4")]);
    let outcome = orch
        .run_stage("bad", &StageParams::default())
        .await
        .unwrap();
    assert!(!outcome.success());
    assert_eq!(outcome.exit_code, Some(4));

    match outcome.into_result() {
        Err(OrchestratorError::StageFailed(StageFailure {
            stage,
            exit_code,
            detail,
        })) => {
            assert_eq!(stage, "bad");
            assert_eq!(exit_code, Some(4));
            assert_eq!(detail, "broken");
        }
        other => panic!("expected StageFailed, got {other:?}"),
    }
}

#[tokio::test]
async fn missing_executable_is_a_launch_error() {
    let mut stage = sh_stage("ghost", "");
    stage.command = vec!["agents/ghost".into()];
    let (_dir, orch) = project(vec![stage]);

    let err = orch
        .run_stage("ghost", &StageParams::default())
        .await
        .unwrap_err();
    assert!(matches!(err, OrchestratorError::Launch { ref stage, .. } if stage == "ghost"), "{err}");
    assert!(orch.snapshot().stages[0].instances.is_empty());
}

#[tokio::test]
async fn unknown_stage_and_language_are_rejected() {
    let (_dir, orch) = project(vec![sh_stage("a", "true")]);
    assert!(matches!(
        orch.run_stage("nope", &StageParams::default()).await,
        Err(OrchestratorError::UnknownStage(_))
    ));
    assert!(matches!(
        orch.run_stage("a", &StageParams::for_language("fr")).await,
        Err(OrchestratorError::Core(_))
    ));
    assert!(matches!(
        orch.run_pipeline("fr", None).await,
        Err(OrchestratorError::Core(_))
    ));
}

#[tokio::test]
async fn sentiment_is_forwarded() {
    let mut stage = sh_stage("tune", r#"echo "$0 $1" > sentiment.txt"#);
    stage.language_arg = false;
    stage.sentiment_arg = true;
    let (dir, orch) = project(vec![stage]);

    let params = StageParams::default().with_sentiment(Some(Sentiment::Devotional));
    orch.run_stage("tune", &params).await.unwrap();
    assert_eq!(read(&dir, "sentiment.txt"), "--sentiment devotional\n");

    // falls back to the configured default
    orch.run_stage("tune", &StageParams::default()).await.unwrap();
    assert_eq!(read(&dir, "sentiment.txt"), "--sentiment uplifting\n");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn kill_stage_terminates_running_instance() {
    let (_dir, orch) = project(vec![sh_stage("slow", "sleep 30")]);

    let runner = orch.clone();
    let task = tokio::spawn(async move {
        runner
            .run_stage("slow", &StageParams::for_language("en"))
            .await
    });
    wait_until("stage to start", || orch.snapshot().stages[0].running).await;

    let pids = orch.kill_stage("slow").await.unwrap();
    assert_eq!(pids.len(), 1);

    let outcome = task.await.unwrap().unwrap();
    assert!(!outcome.success());
    assert_eq!(outcome.signal, Some(15));
    assert!(!orch.snapshot().stages[0].running);
}

#[tokio::test]
async fn restart_of_idle_stage_just_runs_it() {
    let (dir, orch) = project(vec![sh_stage("count", "echo x >> count.txt")]);
    orch.restart_stage("count", &StageParams::default())
        .await
        .unwrap();
    orch.restart_stage("count", &StageParams::default())
        .await
        .unwrap();
    assert_eq!(read(&dir, "count.txt"), "x\nx\n");
}

// ---------------------------------------------------------------------------
// Pipelines
// ---------------------------------------------------------------------------

#[tokio::test]
async fn pipeline_runs_stages_in_order() {
    let (dir, orch) = project(vec![
        sh_stage("first", "echo first >> order-$0"),
        sh_stage("second", "echo second >> order-$0"),
    ]);

    let report = orch.run_pipeline("en", None).await.unwrap();
    assert_eq!(report.status, PipelineStatus::Completed);
    assert!(report.is_success());
    let ran: Vec<&str> = report.stages.iter().map(|s| s.stage.as_str()).collect();
    assert_eq!(ran, vec!["first", "second"]);
    assert_eq!(read(&dir, "order-en"), "first\nsecond\n");

    // bookkeeping is gone once the run ends
    assert!(orch.snapshot().pipelines.is_empty());
    assert!(!dir.path().join(".sentinel/run/pipeline-en.yaml").exists());
}

#[tokio::test]
async fn pipeline_fails_fast_and_names_the_stage() {
    let (dir, orch) = project(vec![
        sh_stage("one", "touch one-$0"),
        sh_stage("two", "echo boom >&2; exit 3"),
        sh_stage("three", "touch three-$0"),
    ]);

    let report = orch.run_pipeline("en", None).await.unwrap();
    assert_eq!(
        report.status,
        PipelineStatus::Failed(StageFailure {
            stage: "two".into(),
            exit_code: Some(3),
            detail: "boom".into(),
        })
    );
    assert_eq!(report.stages.len(), 1);
    assert!(dir.path().join("one-en").exists());
    assert!(!dir.path().join("three-en").exists());
    assert!(orch.snapshot().pipelines.is_empty());

    let json = serde_json::to_value(&report.status).unwrap();
    assert_eq!(json["status"], "failed");
    assert_eq!(json["stage"], "two");
}

#[tokio::test]
async fn launch_failure_fails_the_pipeline() {
    let mut missing = sh_stage("missing", "");
    missing.command = vec!["agents/missing".into()];
    let (dir, orch) = project(vec![missing, sh_stage("after", "touch after-$0")]);

    let report = orch.run_pipeline("hi", None).await.unwrap();
    match report.status {
        PipelineStatus::Failed(f) => {
            assert_eq!(f.stage, "missing");
            assert_eq!(f.exit_code, None);
            assert!(f.detail.contains("not found"), "{}", f.detail);
        }
        other => panic!("expected failure, got {other:?}"),
    }
    assert!(!dir.path().join("after-hi").exists());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn second_pipeline_for_same_language_is_rejected() {
    let (_dir, orch) = project(vec![sh_stage("wait", "sleep 1")]);

    let runner = orch.clone();
    let en = tokio::spawn(async move { runner.run_pipeline("en", None).await });
    wait_until("en pipeline to register", || {
        orch.snapshot().pipelines.iter().any(|p| p.language == "en")
    })
    .await;

    assert!(matches!(
        orch.run_pipeline("en", None).await,
        Err(OrchestratorError::PipelineAlreadyRunning(l)) if l == "en"
    ));
    let hi = orch.run_pipeline("hi", None).await.unwrap();
    assert!(hi.is_success());
    assert!(en.await.unwrap().unwrap().is_success());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn kill_pipeline_stops_members_and_skips_rest() {
    let (dir, orch) = project(vec![
        sh_stage("slow", "sleep 30"),
        sh_stage("after", "touch after-$0"),
    ]);

    let runner = orch.clone();
    let task = tokio::spawn(async move { runner.run_pipeline("en", None).await });
    wait_until("slow stage to start", || orch.snapshot().stages[0].running).await;

    let killed = orch.kill_pipeline("en").await.unwrap().unwrap();
    assert_eq!(killed.run.language, "en");
    assert_eq!(killed.pids.len(), 1);

    let report = task.await.unwrap().unwrap();
    assert_eq!(
        report.status,
        PipelineStatus::Killed {
            stage: "slow".into()
        }
    );
    assert!(!dir.path().join("after-en").exists());

    let snap = orch.snapshot();
    assert!(snap.pipelines.is_empty());
    assert!(snap.stages.iter().all(|s| !s.running));

    // nothing left to kill
    assert!(orch.kill_pipeline("en").await.unwrap().is_none());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn kill_from_another_orchestrator_on_same_root() {
    let (dir, orch) = project(vec![
        sh_stage("slow", "sleep 30"),
        sh_stage("after", "touch after-$0"),
    ]);
    let other = Orchestrator::new(dir.path(), orch.config().clone(), "/bin/true");

    let runner = orch.clone();
    let task = tokio::spawn(async move { runner.run_pipeline("hi", None).await });
    wait_until("slow stage to start", || other.snapshot().stages[0].running).await;
    assert_eq!(other.snapshot().pipelines[0].language, "hi");

    assert!(other.kill_pipeline("hi").await.unwrap().is_some());
    let report = task.await.unwrap().unwrap();
    assert!(matches!(report.status, PipelineStatus::Killed { .. }));
    assert!(!dir.path().join("after-hi").exists());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn rejected_invocation_cannot_kill_the_owner_on_interrupt() {
    let (dir, orch) = project(vec![
        sh_stage("wait", "sleep 1"),
        sh_stage("after", "touch after-$0"),
    ]);
    let second = Orchestrator::new(dir.path(), orch.config().clone(), "/bin/true");

    let runner = orch.clone();
    let task = tokio::spawn(async move { runner.run_pipeline("en", None).await });
    wait_until("wait stage to start", || second.snapshot().stages[0].running).await;

    assert!(matches!(
        second.run_pipeline("en", None).await,
        Err(OrchestratorError::PipelineAlreadyRunning(l)) if l == "en"
    ));
    // the second invocation is interrupted: it owns nothing
    assert!(second.kill_local_pipelines().await.is_empty());
    assert_eq!(orch.snapshot().pipelines.len(), 1);
    assert!(orch.snapshot().stages[0].running);

    let report = task.await.unwrap().unwrap();
    assert!(report.is_success(), "{:?}", report.status);
    assert!(dir.path().join("after-en").exists());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn kill_local_pipelines_stops_own_runs() {
    let (dir, orch) = project(vec![
        sh_stage("slow", "sleep 30"),
        sh_stage("after", "touch after-$0"),
    ]);

    let runner = orch.clone();
    let task = tokio::spawn(async move { runner.run_pipeline_all(None).await });
    wait_until("both pipelines to start", || {
        orch.snapshot().stages[0].instances.len() == 2
    })
    .await;

    let killed = orch.kill_local_pipelines().await;
    let mut languages: Vec<&str> = killed.iter().map(|k| k.run.language.as_str()).collect();
    languages.sort();
    assert_eq!(languages, vec!["en", "hi"]);

    for (_, result) in task.await.unwrap() {
        assert!(matches!(result.unwrap().status, PipelineStatus::Killed { .. }));
    }
    assert!(!dir.path().join("after-en").exists());
    assert!(orch.snapshot().pipelines.is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn store_stages_of_concurrent_pipelines_do_not_interleave() {
    let mut schedule = sh_stage("schedule", "echo start $0 >> trace; sleep 0.3; echo mid $0 >> trace");
    schedule.store_access = true;
    let mut publish = sh_stage("publish", "echo end $0 >> trace");
    publish.store_access = true;
    let (dir, orch) = project(vec![sh_stage("prep", "true"), schedule, publish]);

    let results = orch.run_pipeline_all(None).await;
    assert_eq!(results.len(), 2);
    assert_eq!(results[0].0, "en");
    assert_eq!(results[1].0, "hi");
    for (_, r) in &results {
        assert!(r.as_ref().unwrap().is_success());
    }

    let trace = read(&dir, "trace");
    let lines: Vec<&str> = trace.lines().collect();
    assert_eq!(lines.len(), 6, "{trace}");
    for block in lines.chunks(3) {
        let lang = block[0].split_whitespace().nth(1).unwrap();
        assert_eq!(
            block,
            [
                format!("start {lang}").as_str(),
                format!("mid {lang}").as_str(),
                format!("end {lang}").as_str()
            ],
            "{trace}"
        );
    }
}

#[tokio::test]
async fn snapshot_lists_every_configured_stage() {
    let (_dir, orch) = project(vec![sh_stage("a", "true"), sh_stage("b", "true")]);
    let snap = orch.snapshot();
    let ids: Vec<&str> = snap.stages.iter().map(|s| s.id.as_str()).collect();
    assert_eq!(ids, vec!["a", "b"]);
    assert!(snap.stages.iter().all(|s| !s.running));
    assert!(snap.pipelines.is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn store_stages_of_separate_orchestrators_do_not_interleave() {
    let mut schedule = sh_stage("schedule", "echo start $0 >> trace; sleep 0.3; echo mid $0 >> trace");
    schedule.store_access = true;
    let mut publish = sh_stage("publish", "echo end $0 >> trace");
    publish.store_access = true;
    let (dir, orch) = project(vec![schedule, publish]);
    let other = Orchestrator::new(dir.path(), orch.config().clone(), "/bin/true");

    let runner = orch.clone();
    let en = tokio::spawn(async move { runner.run_pipeline("en", None).await });
    let hi = other.run_pipeline("hi", None).await.unwrap();
    assert!(hi.is_success());
    assert!(en.await.unwrap().unwrap().is_success());

    let trace = read(&dir, "trace");
    let lines: Vec<&str> = trace.lines().collect();
    assert_eq!(lines.len(), 6, "{trace}");
    for block in lines.chunks(3) {
        let lang = block[0].split_whitespace().nth(1).unwrap();
        assert_eq!(block[1], format!("mid {lang}"), "{trace}");
        assert_eq!(block[2], format!("end {lang}"), "{trace}");
    }
    assert!(!dir.path().join(".sentinel/run/store.lock").exists());
}

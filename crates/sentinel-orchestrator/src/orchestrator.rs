//! Sequencing stage programs per language.
//!
//! A pipeline runs the configured stages strictly in order and stops at the
//! first failure. Pipelines for different languages run concurrently. The
//! stages that touch the shared Scheduling Store are serialized across
//! pipelines by the store gate: a pipeline takes it before its first such
//! stage and releases it after its last. The gate is an in-process mutex
//! backed by a lock file under `.sentinel/run`, so pipelines of separate
//! invocations are serialized too.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::process::Command;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use sentinel_core::config::{Config, StageConfig};
use sentinel_core::types::Sentiment;
use sentinel_core::{io, paths, SentinelError};

use crate::error::{OrchestratorError, Result, StageFailure};
use crate::process::{self, Signal};
use crate::registry::{PipelineRun, ProcessHandle, Registry};
use crate::stage::{build_argv, resolve_program, StageParams};
use crate::store_lock::StoreLock;

/// How long to wait for output readers once a stage has exited. Helpers the
/// stage left behind may keep its pipes open.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

/// Poll interval while another process holds the store lock.
const STORE_LOCK_POLL: Duration = Duration::from_millis(100);

// ---------------------------------------------------------------------------
// Outcomes and reports
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct StageOutcome {
    pub stage: String,
    pub pid: u32,
    pub language: Option<String>,
    pub exit_code: Option<i32>,
    /// Terminating signal, if the stage was killed.
    pub signal: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub duration_ms: u64,
}

impl StageOutcome {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    pub fn failure(&self) -> StageFailure {
        let detail = match (self.exit_code, self.signal) {
            (_, Some(sig)) => format!("terminated by signal {sig}"),
            _ => self
                .stderr
                .lines()
                .rev()
                .find(|l| !l.trim().is_empty())
                .unwrap_or("no error output")
                .to_string(),
        };
        StageFailure {
            stage: self.stage.clone(),
            exit_code: self.exit_code,
            detail,
        }
    }

    /// `Err(StageFailed)` unless the stage exited with code 0.
    pub fn into_result(self) -> Result<StageOutcome> {
        if self.success() {
            Ok(self)
        } else {
            Err(OrchestratorError::StageFailed(self.failure()))
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StageSummary {
    pub stage: String,
    pub pid: u32,
    pub exit_code: Option<i32>,
    pub duration_ms: u64,
}

impl From<&StageOutcome> for StageSummary {
    fn from(o: &StageOutcome) -> Self {
        Self {
            stage: o.stage.clone(),
            pid: o.pid,
            exit_code: o.exit_code,
            duration_ms: o.duration_ms,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PipelineStatus {
    Completed,
    Failed(StageFailure),
    /// Stopped by `kill_pipeline` while `stage` was current.
    Killed { stage: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct PipelineReport {
    pub language: String,
    pub run_id: String,
    /// Stages that completed successfully, in order.
    pub stages: Vec<StageSummary>,
    pub status: PipelineStatus,
}

impl PipelineReport {
    pub fn is_success(&self) -> bool {
        self.status == PipelineStatus::Completed
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct KilledPipeline {
    pub run: PipelineRun,
    pub pids: Vec<u32>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StageStatus {
    pub id: String,
    pub name: String,
    pub running: bool,
    pub instances: Vec<ProcessHandle>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Snapshot {
    pub stages: Vec<StageStatus>,
    pub pipelines: Vec<PipelineRun>,
}

// ---------------------------------------------------------------------------
// Guards
// ---------------------------------------------------------------------------

struct ProcessGuard<'a> {
    registry: &'a Registry,
    stage: &'a str,
    pid: u32,
}

impl Drop for ProcessGuard<'_> {
    fn drop(&mut self) {
        self.registry.deregister_process(self.stage, self.pid);
    }
}

struct PipelineGuard<'a> {
    registry: &'a Registry,
    run: &'a PipelineRun,
}

impl Drop for PipelineGuard<'_> {
    fn drop(&mut self) {
        self.registry
            .end_pipeline(&self.run.language, &self.run.run_id);
    }
}

async fn drain(task: JoinHandle<String>) -> String {
    match tokio::time::timeout(DRAIN_TIMEOUT, task).await {
        Ok(Ok(out)) => out,
        _ => String::new(),
    }
}

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

/// Launches stages and pipelines for one project root. Cheap to clone; clones
/// share the registry and the store gate.
#[derive(Clone)]
pub struct Orchestrator {
    root: PathBuf,
    config: Arc<Config>,
    self_exe: PathBuf,
    registry: Arc<Registry>,
    store_gate: Arc<tokio::sync::Mutex<()>>,
}

impl Orchestrator {
    /// `self_exe` replaces `{self}` in stage commands.
    pub fn new(root: impl Into<PathBuf>, config: Config, self_exe: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let registry = Registry::new(paths::run_dir(&root));
        Self {
            root,
            config: Arc::new(config),
            self_exe: self_exe.into(),
            registry: Arc::new(registry),
            store_gate: Arc::new(tokio::sync::Mutex::new(())),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    fn stage(&self, id: &str) -> Result<&StageConfig> {
        self.config
            .stage(id)
            .map_err(|_| OrchestratorError::UnknownStage(id.to_string()))
    }

    fn check_language(&self, language: &str) -> Result<()> {
        if self.config.languages.iter().any(|l| l == language) {
            Ok(())
        } else {
            Err(SentinelError::UnknownLanguage(language.to_string()).into())
        }
    }

    // -----------------------------------------------------------------------
    // Stages
    // -----------------------------------------------------------------------

    /// Run one stage to completion. A non-zero exit is reported in the
    /// outcome, not as an error.
    pub async fn run_stage(&self, stage_id: &str, params: &StageParams) -> Result<StageOutcome> {
        let stage = self.stage(stage_id)?;
        if let Some(language) = &params.language {
            self.check_language(language)?;
        }
        self.launch(stage, params, None).await
    }

    async fn launch(
        &self,
        stage: &StageConfig,
        params: &StageParams,
        run: Option<&PipelineRun>,
    ) -> Result<StageOutcome> {
        let argv = build_argv(stage, params, &self.self_exe, self.config.default_sentiment);
        let Some((program, args)) = argv.split_first() else {
            return Err(OrchestratorError::Launch {
                stage: stage.id.clone(),
                reason: "empty command".into(),
            });
        };
        let program = resolve_program(&stage.id, program, &self.root)?;

        let mut cmd = Command::new(&program);
        cmd.args(args)
            .current_dir(&self.root)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        #[cfg(unix)]
        cmd.process_group(0);

        let started = Instant::now();
        let started_at = Utc::now();
        let mut child = cmd.spawn().map_err(|e| OrchestratorError::Launch {
            stage: stage.id.clone(),
            reason: format!("{}: {e}", program.display()),
        })?;
        let Some(pid) = child.id() else {
            return Err(OrchestratorError::Launch {
                stage: stage.id.clone(),
                reason: "process exited before it could be tracked".into(),
            });
        };

        self.registry.register_process(ProcessHandle {
            stage: stage.id.clone(),
            pid,
            language: params.language.clone(),
            run_id: run.map(|r| r.run_id.clone()),
            started_at,
        });
        let _tracked = ProcessGuard {
            registry: &self.registry,
            stage: &stage.id,
            pid,
        };
        info!(stage = %stage.id, pid, language = ?params.language, "stage started");

        if let Some(run) = run {
            if !self.registry.is_active(&run.language, &run.run_id) {
                warn!(stage = %stage.id, pid, language = %run.language, "pipeline killed during launch");
                if let Err(e) = process::send_signal(pid, Signal::Kill) {
                    warn!(pid, error = %e, "failed to stop stage");
                }
            }
        }

        let stdout = process::capture(child.stdout.take());
        let stderr = process::capture(child.stderr.take());
        let status = child.wait().await?;

        #[cfg(unix)]
        let signal = std::os::unix::process::ExitStatusExt::signal(&status);
        #[cfg(not(unix))]
        let signal = None;

        let outcome = StageOutcome {
            stage: stage.id.clone(),
            pid,
            language: params.language.clone(),
            exit_code: status.code(),
            signal,
            stdout: drain(stdout).await,
            stderr: drain(stderr).await,
            duration_ms: started.elapsed().as_millis() as u64,
        };

        if outcome.success() {
            info!(stage = %stage.id, pid, duration_ms = outcome.duration_ms, "stage finished");
        } else {
            error!(
                stage = %stage.id,
                pid,
                exit_code = ?outcome.exit_code,
                signal = ?outcome.signal,
                "stage failed"
            );
        }
        self.append_log(&outcome, started_at);
        Ok(outcome)
    }

    fn append_log(&self, outcome: &StageOutcome, started_at: DateTime<Utc>) {
        let exit = match (outcome.exit_code, outcome.signal) {
            (Some(code), _) => code.to_string(),
            (None, Some(sig)) => format!("signal {sig}"),
            (None, None) => "unknown".into(),
        };
        let mut text = format!(
            "[{}] stage={} pid={} language={} exit={} duration_ms={}\n",
            started_at.to_rfc3339(),
            outcome.stage,
            outcome.pid,
            outcome.language.as_deref().unwrap_or("-"),
            exit,
            outcome.duration_ms,
        );
        for (label, body) in [("stdout", &outcome.stdout), ("stderr", &outcome.stderr)] {
            if !body.is_empty() {
                text.push_str(&format!("--- {label} ---\n{body}"));
            }
        }
        let path = paths::stage_log_path(&self.root, &outcome.stage);
        if let Err(e) = io::append_text(&path, &text) {
            warn!(path = %path.display(), error = %e, "failed to append stage log");
        }
    }

    // -----------------------------------------------------------------------
    // Pipelines
    // -----------------------------------------------------------------------

    /// Run every configured stage for `language`, stopping at the first failure.
    ///
    /// Returns `PipelineAlreadyRunning` if the language is already claimed.
    /// Stage failures and kills are reported in the returned status.
    pub async fn run_pipeline(
        &self,
        language: &str,
        sentiment: Option<Sentiment>,
    ) -> Result<PipelineReport> {
        self.check_language(language)?;
        let run = self.registry.begin_pipeline(language)?;
        let _guard = PipelineGuard {
            registry: &self.registry,
            run: &run,
        };
        info!(language, run_id = %run.run_id, "pipeline started");

        let stages = &self.config.stages;
        let first_store = stages.iter().position(|s| s.store_access);
        let last_store = stages.iter().rposition(|s| s.store_access);
        let params = StageParams::for_language(language).with_sentiment(sentiment);

        let mut gate = None;
        let mut completed = Vec::new();
        let mut status = PipelineStatus::Completed;

        for (i, stage) in stages.iter().enumerate() {
            if !self.registry.record_stage(language, &run.run_id, &stage.id) {
                status = PipelineStatus::Killed {
                    stage: stage.id.clone(),
                };
                break;
            }
            if Some(i) == first_store {
                let local = self.store_gate.lock().await;
                match self.lock_store(&run).await {
                    Ok(Some(lock)) => gate = Some((lock, local)),
                    Ok(None) => {
                        status = PipelineStatus::Killed {
                            stage: stage.id.clone(),
                        };
                        break;
                    }
                    Err(e) => {
                        status = PipelineStatus::Failed(StageFailure {
                            stage: stage.id.clone(),
                            exit_code: None,
                            detail: e.to_string(),
                        });
                        break;
                    }
                }
            }

            let result = self.launch(stage, &params, Some(&run)).await;
            let killed = !self.registry.is_active(language, &run.run_id);
            match result {
                Ok(outcome) if outcome.success() => completed.push(StageSummary::from(&outcome)),
                _ if killed => {
                    status = PipelineStatus::Killed {
                        stage: stage.id.clone(),
                    };
                    break;
                }
                Ok(outcome) => {
                    status = PipelineStatus::Failed(outcome.failure());
                    break;
                }
                Err(e) => {
                    status = PipelineStatus::Failed(StageFailure {
                        stage: stage.id.clone(),
                        exit_code: None,
                        detail: e.to_string(),
                    });
                    break;
                }
            }

            if Some(i) == last_store {
                gate = None;
            }
        }
        drop(gate);

        match &status {
            PipelineStatus::Completed => info!(language, stages = completed.len(), "pipeline completed"),
            PipelineStatus::Failed(failure) => error!(language, stage = %failure.stage, "pipeline failed: {failure}"),
            PipelineStatus::Killed { stage } => warn!(language, stage = %stage, "pipeline killed"),
        }

        Ok(PipelineReport {
            language: language.to_string(),
            run_id: run.run_id.clone(),
            stages: completed,
            status,
        })
    }

    /// Wait for the cross-process store lock. `Ok(None)` if the pipeline was
    /// killed while waiting.
    async fn lock_store(&self, run: &PipelineRun) -> Result<Option<StoreLock>> {
        let run_dir = paths::run_dir(&self.root);
        let mut waiting = false;
        loop {
            if let Some(lock) = StoreLock::try_acquire(&run_dir, run)? {
                return Ok(Some(lock));
            }
            if !self.registry.is_active(&run.language, &run.run_id) {
                return Ok(None);
            }
            if !waiting {
                debug!(language = %run.language, "store locked by another process, waiting");
                waiting = true;
            }
            tokio::time::sleep(STORE_LOCK_POLL).await;
        }
    }

    /// One concurrent pipeline per configured language, reported in config order.
    pub async fn run_pipeline_all(
        &self,
        sentiment: Option<Sentiment>,
    ) -> Vec<(String, Result<PipelineReport>)> {
        let handles: Vec<(String, JoinHandle<Result<PipelineReport>>)> = self
            .config
            .languages
            .iter()
            .map(|language| {
                let this = self.clone();
                let lang = language.clone();
                let handle = tokio::spawn(async move { this.run_pipeline(&lang, sentiment).await });
                (language.clone(), handle)
            })
            .collect();

        let mut results = Vec::with_capacity(handles.len());
        for (language, handle) in handles {
            let result = match handle.await {
                Ok(r) => r,
                Err(e) => Err(OrchestratorError::Io(std::io::Error::other(e))),
            };
            results.push((language, result));
        }
        results
    }

    // -----------------------------------------------------------------------
    // Control
    // -----------------------------------------------------------------------

    async fn terminate_all(&self, handles: Vec<ProcessHandle>) -> Vec<u32> {
        let grace = self.config.orchestrator.kill_grace();
        let tasks: Vec<(ProcessHandle, JoinHandle<bool>)> = handles
            .into_iter()
            .map(|h| {
                let pid = h.pid;
                (h, tokio::spawn(process::terminate(pid, grace)))
            })
            .collect();

        let mut pids = Vec::new();
        for (handle, task) in tasks {
            let graceful = task.await.unwrap_or(false);
            info!(stage = %handle.stage, pid = handle.pid, graceful, "stage terminated");
            self.registry.deregister_process(&handle.stage, handle.pid);
            pids.push(handle.pid);
        }
        pids
    }

    /// Terminate every live instance of a stage. Returns the pids signalled.
    pub async fn kill_stage(&self, stage_id: &str) -> Result<Vec<u32>> {
        self.stage(stage_id)?;
        let handles = self.registry.processes_for_stage(stage_id);
        if handles.is_empty() {
            info!(stage = stage_id, "stage not running");
        }
        Ok(self.terminate_all(handles).await)
    }

    /// Remove the active pipeline for `language` and terminate its stages.
    /// Returns `None` if no pipeline was active.
    pub async fn kill_pipeline(&self, language: &str) -> Result<Option<KilledPipeline>> {
        self.check_language(language)?;
        let Some(run) = self.registry.take_pipeline(language) else {
            info!(language, "no active pipeline");
            return Ok(None);
        };
        Ok(Some(self.stop_run(run).await))
    }

    /// Kill the pipelines this orchestrator started. Pipelines owned by other
    /// invocations on the same root are left running.
    pub async fn kill_local_pipelines(&self) -> Vec<KilledPipeline> {
        let mut killed = Vec::new();
        for run in self.registry.local_pipelines() {
            if let Some(run) = self.registry.take_run(&run.language, &run.run_id) {
                killed.push(self.stop_run(run).await);
            }
        }
        killed
    }

    async fn stop_run(&self, run: PipelineRun) -> KilledPipeline {
        let handles = self.registry.processes_for_run(&run.run_id);
        let pids = self.terminate_all(handles).await;
        warn!(language = %run.language, run_id = %run.run_id, killed = pids.len(), "pipeline killed");
        KilledPipeline { run, pids }
    }

    pub async fn restart_stage(&self, stage_id: &str, params: &StageParams) -> Result<StageOutcome> {
        self.kill_stage(stage_id).await?;
        self.run_stage(stage_id, params).await
    }

    pub async fn restart_pipeline(
        &self,
        language: &str,
        sentiment: Option<Sentiment>,
    ) -> Result<PipelineReport> {
        self.kill_pipeline(language).await?;
        self.run_pipeline(language, sentiment).await
    }

    /// Every configured stage with its live instances, and every active pipeline.
    pub fn snapshot(&self) -> Snapshot {
        let processes = self.registry.processes();
        let stages = self
            .config
            .stages
            .iter()
            .map(|s| {
                let instances: Vec<ProcessHandle> = processes
                    .iter()
                    .filter(|p| p.stage == s.id)
                    .cloned()
                    .collect();
                StageStatus {
                    id: s.id.clone(),
                    name: s.display_name().to_string(),
                    running: !instances.is_empty(),
                    instances,
                }
            })
            .collect();
        Snapshot {
            stages,
            pipelines: self.registry.pipelines(),
        }
    }
}

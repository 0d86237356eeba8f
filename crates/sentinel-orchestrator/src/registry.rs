//! Bookkeeping for running stage processes and active pipelines.
//!
//! The [`Registry`] is owned by one `Orchestrator` and guarded by a mutex.
//! When it has a run directory, every mutation is mirrored to a YAML record
//! there so other `sentinel` invocations can list and stop live work:
//!
//! ```text
//! .sentinel/run/stage-{stage}-{pid}.yaml
//! .sentinel/run/pipeline-{language}.yaml
//! ```
//!
//! Records whose process is gone are pruned when read.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::warn;
use uuid::Uuid;

use crate::error::{OrchestratorError, Result};
use crate::process;
use sentinel_core::io::{atomic_write, write_new};
use sentinel_core::SentinelError;

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// A live stage process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessHandle {
    pub stage: String,
    pub pid: u32,
    /// Language of the owning pipeline, or of a standalone run.
    pub language: Option<String>,
    /// Owning pipeline run, if any.
    #[serde(default)]
    pub run_id: Option<String>,
    pub started_at: DateTime<Utc>,
}

/// An active per-language pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineRun {
    pub language: String,
    pub run_id: String,
    /// Stages started so far, in order.
    pub stages: Vec<String>,
    /// The sentinel process driving the pipeline.
    pub owner_pid: u32,
    pub started_at: DateTime<Utc>,
}

fn process_file(dir: &Path, stage: &str, pid: u32) -> PathBuf {
    dir.join(format!("stage-{stage}-{pid}.yaml"))
}

fn pipeline_file(dir: &Path, language: &str) -> PathBuf {
    dir.join(format!("pipeline-{language}.yaml"))
}

pub(crate) fn read_record<T: DeserializeOwned>(path: &Path) -> Option<T> {
    let data = std::fs::read_to_string(path).ok()?;
    serde_yaml::from_str(&data).ok()
}

pub(crate) fn remove_file(path: &Path) {
    if let Err(e) = std::fs::remove_file(path) {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!(path = %path.display(), error = %e, "failed to remove registry record");
        }
    }
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

#[derive(Default)]
struct Inner {
    processes: HashMap<String, Vec<ProcessHandle>>,
    pipelines: HashMap<String, PipelineRun>,
}

pub struct Registry {
    run_dir: Option<PathBuf>,
    inner: Mutex<Inner>,
}

impl Registry {
    /// A registry mirrored to `run_dir`.
    pub fn new(run_dir: impl Into<PathBuf>) -> Self {
        Self {
            run_dir: Some(run_dir.into()),
            inner: Mutex::new(Inner::default()),
        }
    }

    /// A registry visible only to this process.
    pub fn in_memory() -> Self {
        Self {
            run_dir: None,
            inner: Mutex::new(Inner::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish<T: Serialize>(&self, path: &Path, record: &T) {
        let written = serde_yaml::to_string(record)
            .map_err(SentinelError::from)
            .and_then(|data| atomic_write(path, data.as_bytes()));
        if let Err(e) = written {
            warn!(path = %path.display(), error = %e, "failed to publish registry record");
        }
    }

    /// Every `{prefix}*.yaml` record in the run directory.
    fn disk_records<T: DeserializeOwned>(&self, prefix: &str) -> Vec<(PathBuf, Option<T>)> {
        let Some(dir) = &self.run_dir else {
            return Vec::new();
        };
        let Ok(entries) = std::fs::read_dir(dir) else {
            return Vec::new();
        };
        entries
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| {
                p.extension().and_then(|e| e.to_str()) == Some("yaml")
                    && p.file_name()
                        .and_then(|n| n.to_str())
                        .is_some_and(|n| n.starts_with(prefix))
            })
            .map(|p| {
                let record = read_record(&p);
                (p, record)
            })
            .collect()
    }

    // -----------------------------------------------------------------------
    // Processes
    // -----------------------------------------------------------------------

    pub fn register_process(&self, handle: ProcessHandle) {
        let mut inner = self.lock();
        if let Some(dir) = &self.run_dir {
            self.publish(&process_file(dir, &handle.stage, handle.pid), &handle);
        }
        inner
            .processes
            .entry(handle.stage.clone())
            .or_default()
            .push(handle);
    }

    pub fn deregister_process(&self, stage: &str, pid: u32) {
        let mut inner = self.lock();
        if let Some(list) = inner.processes.get_mut(stage) {
            list.retain(|h| h.pid != pid);
            if list.is_empty() {
                inner.processes.remove(stage);
            }
        }
        if let Some(dir) = &self.run_dir {
            remove_file(&process_file(dir, stage, pid));
        }
    }

    /// Live stage processes, including those started by other invocations.
    pub fn processes(&self) -> Vec<ProcessHandle> {
        let inner = self.lock();
        let mut out: Vec<ProcessHandle> = inner.processes.values().flatten().cloned().collect();
        for (path, record) in self.disk_records::<ProcessHandle>("stage-") {
            match record {
                Some(h) if out.iter().any(|o| o.pid == h.pid) => {}
                Some(h) if process::is_alive(h.pid) => out.push(h),
                _ => remove_file(&path),
            }
        }
        out.sort_by(|a, b| a.started_at.cmp(&b.started_at));
        out
    }

    pub fn processes_for_stage(&self, stage: &str) -> Vec<ProcessHandle> {
        self.processes()
            .into_iter()
            .filter(|h| h.stage == stage)
            .collect()
    }

    /// Processes started by one pipeline run.
    pub fn processes_for_run(&self, run_id: &str) -> Vec<ProcessHandle> {
        self.processes()
            .into_iter()
            .filter(|h| h.run_id.as_deref() == Some(run_id))
            .collect()
    }

    // -----------------------------------------------------------------------
    // Pipelines
    // -----------------------------------------------------------------------

    /// Claim `language`. Fails with `PipelineAlreadyRunning` if any live
    /// pipeline, in this process or another, holds it.
    pub fn begin_pipeline(&self, language: &str) -> Result<PipelineRun> {
        let mut inner = self.lock();
        if inner.pipelines.contains_key(language) {
            return Err(OrchestratorError::PipelineAlreadyRunning(language.to_string()));
        }

        let run = PipelineRun {
            language: language.to_string(),
            run_id: Uuid::new_v4().to_string(),
            stages: Vec::new(),
            owner_pid: std::process::id(),
            started_at: Utc::now(),
        };

        if let Some(dir) = &self.run_dir {
            let path = pipeline_file(dir, language);
            if path.exists() {
                match read_record::<PipelineRun>(&path) {
                    Some(existing) if process::is_alive(existing.owner_pid) => {
                        return Err(OrchestratorError::PipelineAlreadyRunning(
                            language.to_string(),
                        ));
                    }
                    _ => remove_file(&path),
                }
            }
            let data = serde_yaml::to_string(&run).map_err(SentinelError::from)?;
            match write_new(&path, data.as_bytes()) {
                Ok(()) => {}
                Err(SentinelError::Io(e)) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                    return Err(OrchestratorError::PipelineAlreadyRunning(
                        language.to_string(),
                    ));
                }
                Err(e) => return Err(e.into()),
            }
        }

        inner.pipelines.insert(language.to_string(), run.clone());
        Ok(run)
    }

    /// Whether the pipeline run is still registered. False once it was
    /// killed, here or from another invocation.
    pub fn is_active(&self, language: &str, run_id: &str) -> bool {
        let inner = self.lock();
        self.is_active_locked(&inner, language, run_id)
    }

    fn is_active_locked(&self, inner: &Inner, language: &str, run_id: &str) -> bool {
        let in_memory = inner
            .pipelines
            .get(language)
            .is_some_and(|r| r.run_id == run_id);
        if !in_memory {
            return false;
        }
        match &self.run_dir {
            None => true,
            Some(dir) => read_record::<PipelineRun>(&pipeline_file(dir, language))
                .is_some_and(|r| r.run_id == run_id),
        }
    }

    /// Append `stage` to an active run. Returns false if the run is gone.
    pub fn record_stage(&self, language: &str, run_id: &str, stage: &str) -> bool {
        let mut inner = self.lock();
        if !self.is_active_locked(&inner, language, run_id) {
            return false;
        }
        let Some(run) = inner.pipelines.get_mut(language) else {
            return false;
        };
        run.stages.push(stage.to_string());
        if let Some(dir) = &self.run_dir {
            self.publish(&pipeline_file(dir, language), run);
        }
        true
    }

    /// Remove the entry for `run_id`. A newer run for the same language is left alone.
    pub fn end_pipeline(&self, language: &str, run_id: &str) {
        self.take_run(language, run_id);
    }

    /// Remove and return this registry's run `run_id` of `language`. Runs
    /// owned by other invocations, or newer runs, are left alone.
    pub fn take_run(&self, language: &str, run_id: &str) -> Option<PipelineRun> {
        let mut inner = self.lock();
        let owned = inner
            .pipelines
            .get(language)
            .is_some_and(|r| r.run_id == run_id);
        if !owned {
            return None;
        }
        let run = inner.pipelines.remove(language)?;
        if let Some(dir) = &self.run_dir {
            let path = pipeline_file(dir, language);
            if read_record::<PipelineRun>(&path).is_some_and(|r| r.run_id == run_id) {
                remove_file(&path);
            }
        }
        Some(run)
    }

    /// Pipelines started through this registry.
    pub fn local_pipelines(&self) -> Vec<PipelineRun> {
        let inner = self.lock();
        let mut out: Vec<PipelineRun> = inner.pipelines.values().cloned().collect();
        out.sort_by(|a, b| a.language.cmp(&b.language));
        out
    }

    /// Remove the active pipeline for `language`, wherever it runs.
    pub fn take_pipeline(&self, language: &str) -> Option<PipelineRun> {
        let mut inner = self.lock();
        let local = inner.pipelines.remove(language);
        let remote = self.run_dir.as_ref().and_then(|dir| {
            let path = pipeline_file(dir, language);
            let record = read_record::<PipelineRun>(&path);
            remove_file(&path);
            record.filter(|r| process::is_alive(r.owner_pid))
        });
        local.or(remote)
    }

    /// Active pipelines, including those driven by other invocations.
    pub fn pipelines(&self) -> Vec<PipelineRun> {
        let inner = self.lock();
        let mut out: Vec<PipelineRun> = inner.pipelines.values().cloned().collect();
        for (path, record) in self.disk_records::<PipelineRun>("pipeline-") {
            match record {
                Some(r) if out.iter().any(|o| o.language == r.language) => {}
                Some(r) if process::is_alive(r.owner_pid) => out.push(r),
                _ => remove_file(&path),
            }
        }
        out.sort_by(|a, b| a.language.cmp(&b.language));
        out
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

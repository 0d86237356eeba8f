//! Cross-process lock on the shared Scheduling Store.
//!
//! A pipeline holds `.sentinel/run/store.lock` while its store stages run, so
//! Scheduler and Publisher pairs of different `sentinel` invocations never
//! interleave. The file is created with create-new semantics; a lock whose
//! owner process is gone is reclaimed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::error::Result;
use crate::process;
use crate::registry::{read_record, remove_file, PipelineRun};
use sentinel_core::io::write_new;
use sentinel_core::SentinelError;

pub const STORE_LOCK_FILE: &str = "store.lock";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct LockHolder {
    owner_pid: u32,
    run_id: String,
    language: String,
    acquired_at: DateTime<Utc>,
}

/// Held store lock; released on drop.
#[derive(Debug)]
pub struct StoreLock {
    path: PathBuf,
    run_id: String,
}

impl StoreLock {
    /// Take the lock for `run` if it is free. `Ok(None)` means another live
    /// process holds it; a stale lock is removed so the next attempt can win.
    pub fn try_acquire(run_dir: &Path, run: &PipelineRun) -> Result<Option<StoreLock>> {
        let path = run_dir.join(STORE_LOCK_FILE);
        let holder = LockHolder {
            owner_pid: std::process::id(),
            run_id: run.run_id.clone(),
            language: run.language.clone(),
            acquired_at: Utc::now(),
        };
        let data = serde_yaml::to_string(&holder).map_err(SentinelError::from)?;
        match write_new(&path, data.as_bytes()) {
            Ok(()) => Ok(Some(StoreLock {
                path,
                run_id: holder.run_id,
            })),
            Err(SentinelError::Io(e)) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                match read_record::<LockHolder>(&path) {
                    Some(current) if process::is_alive(current.owner_pid) => Ok(None),
                    stale => {
                        warn!(holder = ?stale, "removing stale store lock");
                        remove_file(&path);
                        Ok(None)
                    }
                }
            }
            Err(e) => Err(e.into()),
        }
    }
}

impl Drop for StoreLock {
    fn drop(&mut self) {
        if read_record::<LockHolder>(&self.path).is_some_and(|h| h.run_id == self.run_id) {
            remove_file(&self.path);
        }
    }
}

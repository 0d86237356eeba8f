//! Signals and liveness checks for stage processes.
//!
//! Every stage is spawned as the leader of its own process group, so its pid
//! doubles as the group id and signals reach any helpers it started.

use std::time::{Duration, Instant};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::task::JoinHandle;

const POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    Term,
    Kill,
}

impl Signal {
    fn as_str(self) -> &'static str {
        match self {
            Signal::Term => "TERM",
            Signal::Kill => "KILL",
        }
    }
}

/// Returns true if the process is still alive (`kill -0 {pid}`).
pub fn is_alive(pid: u32) -> bool {
    if pid <= 1 {
        return false;
    }
    #[cfg(unix)]
    {
        std::process::Command::new("kill")
            .args(["-0", &pid.to_string()])
            .stderr(std::process::Stdio::null())
            .status()
            .map(|s| s.success())
            .unwrap_or(false)
    }
    #[cfg(not(unix))]
    {
        false
    }
}

/// Send `signal` to the process group led by `pid`, falling back to the
/// single process if the group is gone.
pub fn send_signal(pid: u32, signal: Signal) -> std::io::Result<()> {
    if pid <= 1 {
        return Err(std::io::Error::other(format!("refusing to signal pid {pid}")));
    }
    #[cfg(unix)]
    {
        let group = std::process::Command::new("kill")
            .args(["-s", signal.as_str(), "--", &format!("-{pid}")])
            .stderr(std::process::Stdio::null())
            .status()?;
        if group.success() {
            return Ok(());
        }
        let single = std::process::Command::new("kill")
            .args(["-s", signal.as_str(), &pid.to_string()])
            .stderr(std::process::Stdio::null())
            .status()?;
        if !single.success() {
            return Err(std::io::Error::other(format!(
                "kill -{} {pid} failed with exit code {:?}",
                signal.as_str(),
                single.code()
            )));
        }
        Ok(())
    }
    #[cfg(not(unix))]
    {
        Err(std::io::Error::other(format!(
            "cannot send {} on this platform",
            signal.as_str()
        )))
    }
}

/// SIGTERM, wait up to `grace` for exit, then SIGKILL.
///
/// Returns `true` if the process exited within the grace period.
pub async fn terminate(pid: u32, grace: Duration) -> bool {
    if !is_alive(pid) {
        return true;
    }
    if let Err(e) = send_signal(pid, Signal::Term) {
        tracing::warn!(pid, error = %e, "SIGTERM failed");
    }
    let deadline = Instant::now() + grace;
    while Instant::now() < deadline {
        if !is_alive(pid) {
            return true;
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }
    if !is_alive(pid) {
        return true;
    }
    tracing::warn!(pid, grace_secs = grace.as_secs(), "stage ignored SIGTERM, sending SIGKILL");
    if let Err(e) = send_signal(pid, Signal::Kill) {
        tracing::warn!(pid, error = %e, "SIGKILL failed");
    }
    false
}

/// Read a child stream to the end on a background task.
pub(crate) fn capture<R>(stream: Option<R>) -> JoinHandle<String>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut out = String::new();
        let Some(stream) = stream else {
            return out;
        };
        let mut lines = BufReader::new(stream).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            out.push_str(&line);
            out.push('\n');
        }
        out
    })
}

//! Subscriber setup: human-readable lines on stderr plus, inside an
//! initialized project, JSON lines appended to `logs/{component}.jsonl`.

use sentinel_core::{io, paths};
use std::fs::{File, OpenOptions};
use std::path::Path;
use std::sync::Mutex;
use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

pub fn init(root: &Path, component: &str, default_level: Level) {
    let filter = EnvFilter::from_default_env().add_directive(default_level.into());
    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false);
    let file_layer = open_component_log(root, component).map(|file| {
        fmt::layer()
            .json()
            .with_current_span(false)
            .with_ansi(false)
            .with_writer(Mutex::new(file))
    });

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer)
        .try_init();
}

fn open_component_log(root: &Path, component: &str) -> Option<File> {
    if !paths::sentinel_dir(root).is_dir() {
        return None;
    }
    let path = paths::component_log_path(root, component);
    let dir = path.parent()?;
    if let Err(e) = io::ensure_dir(dir) {
        eprintln!("warning: cannot create {}: {e}", dir.display());
        return None;
    }
    match OpenOptions::new().create(true).append(true).open(&path) {
        Ok(file) => Some(file),
        Err(e) => {
            eprintln!("warning: cannot open {}: {e}", path.display());
            None
        }
    }
}

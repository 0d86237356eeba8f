use anyhow::Context;
use sentinel_core::paths;
use std::path::{Path, PathBuf};

use crate::cmd::load_config;

pub fn run(root: &Path, stage: Option<&str>) -> anyhow::Result<()> {
    let config = load_config(root)?;
    match stage {
        Some(id) => {
            config.stage(id)?;
            let path = paths::stage_log_path(root, id);
            if path.is_file() {
                print_file(&path)
            } else {
                println!("No logs for {id} yet.");
                Ok(())
            }
        }
        None => {
            let files = log_files(&paths::logs_dir(root))?;
            if files.is_empty() {
                println!("No logs yet.");
            }
            for path in files {
                let name = path.file_name().map(|n| n.to_string_lossy().into_owned());
                println!("==> {} <==", name.unwrap_or_default());
                print_file(&path)?;
                println!();
            }
            Ok(())
        }
    }
}

fn print_file(path: &Path) -> anyhow::Result<()> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    print!("{text}");
    Ok(())
}

/// Stage logs and component logs in `dir`, sorted by name.
fn log_files(dir: &Path) -> anyhow::Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)
        .with_context(|| format!("failed to read {}", dir.display()))?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| {
            p.is_file()
                && matches!(
                    p.extension().and_then(|e| e.to_str()),
                    Some("log") | Some("jsonl")
                )
        })
        .collect();
    files.sort();
    Ok(files)
}

use anyhow::Context;
use sentinel_core::{config::Config, io, paths};
use std::path::Path;

pub fn run(root: &Path) -> anyhow::Result<()> {
    println!("Initializing sentinel in: {}", root.display());

    // 1. Config first, so language partitions follow the configured set
    let config_path = paths::config_path(root);
    let config = if config_path.exists() {
        println!("  exists:  {}", paths::CONFIG_FILE);
        Config::load(root).context("failed to load existing config.yaml")?
    } else {
        let cfg = Config::default();
        cfg.save(root).context("failed to write config.yaml")?;
        println!("  created: {}", paths::CONFIG_FILE);
        cfg
    };

    // 2. Directory layout
    let dirs = [
        paths::RUN_DIR,
        paths::CONTENT_READY_DIR,
        paths::TRANSLATION_PREVIEWS_DIR,
        paths::SCHEDULER_DB_DIR,
        paths::DELIVERY_DIR,
        paths::LOGS_DIR,
    ];
    for dir in dirs {
        let p = root.join(dir);
        io::ensure_dir(&p).with_context(|| format!("failed to create {}", p.display()))?;
    }
    for language in &config.languages {
        let p = paths::content_dir(root, language);
        io::ensure_dir(&p).with_context(|| format!("failed to create {}", p.display()))?;
    }

    for warning in config.validate() {
        println!("  {:?}: {}", warning.level, warning.message);
    }

    println!("\nsentinel initialized.");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn init_is_idempotent_and_keeps_config() {
        let dir = TempDir::new().unwrap();
        run(dir.path()).unwrap();
        assert!(dir.path().join(".sentinel/config.yaml").is_file());
        assert!(dir.path().join("content/content_ready/hi").is_dir());
        assert!(dir.path().join("scheduler_db").is_dir());

        let mut cfg = Config::load(dir.path()).unwrap();
        cfg.languages = vec!["en".into(), "ta".into()];
        cfg.save(dir.path()).unwrap();

        run(dir.path()).unwrap();
        let reloaded = Config::load(dir.path()).unwrap();
        assert_eq!(reloaded.languages, vec!["en", "ta"]);
        assert!(dir.path().join("content/content_ready/ta").is_dir());
    }
}

//! Data directory and config file resolution.

use std::path::{Path, PathBuf};

use anyhow::Context;
use zeny_crawler::CrawlConfig;

/// Overrides the default data directory.
pub const HOME_ENV: &str = "ZENY_CRAWLER_HOME";

const DEFAULT_DIR_NAME: &str = ".zeny-crawler";
const CONFIG_FILE: &str = "config.json";
const STORE_FILE: &str = "storage.json";

/// Resolve the data directory: explicit flag, then `ZENY_CRAWLER_HOME`, then `~/.zeny-crawler`.
pub fn resolve_data_dir(explicit: Option<&str>) -> PathBuf {
    let home = std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .ok();
    data_dir_from(explicit, std::env::var(HOME_ENV).ok(), home)
}

fn data_dir_from(explicit: Option<&str>, env_dir: Option<String>, home: Option<String>) -> PathBuf {
    if let Some(dir) = explicit {
        return PathBuf::from(dir);
    }
    if let Some(dir) = env_dir.filter(|d| !d.is_empty()) {
        return PathBuf::from(dir);
    }
    PathBuf::from(home.unwrap_or_else(|| ".".to_string())).join(DEFAULT_DIR_NAME)
}

/// The config file in effect, if any.
///
/// An explicit path must exist; the default `<data-dir>/config.json` is optional.
pub fn resolve_config_path(explicit: Option<&str>, data_dir: &Path) -> anyhow::Result<Option<PathBuf>> {
    if let Some(path) = explicit {
        let path = PathBuf::from(path);
        anyhow::ensure!(path.exists(), "config file {} does not exist", path.display());
        return Ok(Some(path));
    }
    let default = data_dir.join(CONFIG_FILE);
    Ok(default.exists().then_some(default))
}

/// Load the crawl config, falling back to defaults when no file is present.
pub fn load_config(explicit: Option<&str>, data_dir: &Path) -> anyhow::Result<CrawlConfig> {
    match resolve_config_path(explicit, data_dir)? {
        Some(path) => CrawlConfig::load(&path)
            .with_context(|| format!("failed to load config from {}", path.display())),
        None => {
            tracing::debug!("no config file, using defaults");
            Ok(CrawlConfig::default())
        }
    }
}

/// Where crawl state is persisted.
pub fn store_path(data_dir: &Path) -> PathBuf {
    data_dir.join(STORE_FILE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_explicit_data_dir_wins() {
        let dir = data_dir_from(Some("/tmp/a"), Some("/tmp/b".into()), Some("/home/u".into()));
        assert_eq!(dir, PathBuf::from("/tmp/a"));
    }

    #[test]
    fn test_env_data_dir_before_home() {
        let dir = data_dir_from(None, Some("/tmp/b".into()), Some("/home/u".into()));
        assert_eq!(dir, PathBuf::from("/tmp/b"));

        let dir = data_dir_from(None, Some(String::new()), Some("/home/u".into()));
        assert_eq!(dir, PathBuf::from("/home/u/.zeny-crawler"));
    }

    #[test]
    fn test_missing_default_config_uses_defaults() {
        let dir = TempDir::new().unwrap();
        assert!(resolve_config_path(None, dir.path()).unwrap().is_none());
        let config = load_config(None, dir.path()).unwrap();
        assert_eq!(config.cooldown_ms, 300_000);
    }

    #[test]
    fn test_default_config_file_is_picked_up() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("config.json"), r#"{"cooldown_ms": 60000}"#).unwrap();
        let config = load_config(None, dir.path()).unwrap();
        assert_eq!(config.cooldown_ms, 60_000);
        assert_eq!(config.courtesy_delay_ms, 1_500);
    }

    #[test]
    fn test_missing_explicit_config_is_an_error() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("nope.json");
        assert!(load_config(missing.to_str(), dir.path()).is_err());
    }
}

//! Configuration file handling
//!
//! Settings live in `<config dir>/tubewatch/config.toml`. A missing default
//! file means "all defaults"; a missing file named explicitly is an error.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use uploader::youtube::{DEFAULT_API_BASE, DEFAULT_UPLOAD_BASE};
use uploader::{DriverSettings, Privacy};
use watcher::IgnoreConfig;

use crate::daemon::PipelineSettings;

const APP_DIR: &str = "tubewatch";
const CONFIG_FILE: &str = "config.toml";
const TOKEN_FILE: &str = "token.json";

pub const MAX_CONCURRENT_JOBS: usize = 16;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub watch: WatchConfig,
    pub pipeline: PipelineConfig,
    pub remote: RemoteConfig,
    pub log: LogConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchConfig {
    /// Directory tree to watch
    #[serde(skip_serializing_if = "Option::is_none")]
    pub root: Option<PathBuf>,
    /// Release watches when a watched directory is removed
    pub release_on_remove: bool,
    #[serde(flatten)]
    pub ignore: IgnoreConfig,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            root: None,
            release_on_remove: true,
            ignore: IgnoreConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Video title is the file name up to the first occurrence of this
    pub title_delimiter: String,
    /// 1 = strictly sequential, in arrival order
    pub max_concurrent_jobs: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            title_delimiter: ".".to_string(),
            max_concurrent_jobs: 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    /// Use an in-memory host instead of YouTube
    pub dry_run: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_file: Option<PathBuf>,
    pub api_base: String,
    pub upload_base: String,
    pub call_timeout_secs: u64,
    pub upload_timeout_secs: u64,
    pub playlist_privacy: Privacy,
    pub video_description: String,
    pub video_tags: Vec<String>,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            dry_run: false,
            token_file: default_token_file(),
            api_base: DEFAULT_API_BASE.to_string(),
            upload_base: DEFAULT_UPLOAD_BASE.to_string(),
            call_timeout_secs: 60,
            upload_timeout_secs: 3600,
            playlist_privacy: Privacy::Public,
            video_description: String::new(),
            video_tags: vec![],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Write daily-rotated logs here instead of stderr
    #[serde(skip_serializing_if = "Option::is_none")]
    pub directory: Option<PathBuf>,
    /// Filter directives, overridden by RUST_LOG
    pub filter: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            directory: None,
            filter: "info".to_string(),
        }
    }
}

impl Config {
    /// Validate ranges
    pub fn validate(&self) -> Result<()> {
        let jobs = self.pipeline.max_concurrent_jobs;
        if !(1..=MAX_CONCURRENT_JOBS).contains(&jobs) {
            anyhow::bail!(
                "pipeline.max_concurrent_jobs must be between 1 and {} (got {})",
                MAX_CONCURRENT_JOBS,
                jobs
            );
        }
        if !(1..=86_400).contains(&self.remote.call_timeout_secs) {
            anyhow::bail!(
                "remote.call_timeout_secs must be between 1 and 86400 (got {})",
                self.remote.call_timeout_secs
            );
        }
        if !(1..=7 * 86_400).contains(&self.remote.upload_timeout_secs) {
            anyhow::bail!(
                "remote.upload_timeout_secs must be between 1 and 604800 (got {})",
                self.remote.upload_timeout_secs
            );
        }
        if !self.remote.dry_run {
            for (key, url) in [
                ("remote.api_base", &self.remote.api_base),
                ("remote.upload_base", &self.remote.upload_base),
            ] {
                if !(url.starts_with("https://") || url.starts_with("http://")) {
                    anyhow::bail!("{} must be an http(s) URL (got '{}')", key, url);
                }
            }
        }
        Ok(())
    }

    /// Absolute watch root, created if it does not exist yet
    pub fn watch_root(&self) -> Result<PathBuf> {
        let root = self
            .watch
            .root
            .as_deref()
            .context("No watch root: pass one to `tubewatch run` or set watch.root")?;

        std::fs::create_dir_all(root)
            .with_context(|| format!("Failed to create watch root {}", root.display()))?;
        root.canonicalize()
            .with_context(|| format!("Failed to resolve watch root {}", root.display()))
    }

    pub fn driver_settings(&self) -> DriverSettings {
        DriverSettings {
            call_timeout: Duration::from_secs(self.remote.call_timeout_secs),
            upload_timeout: Duration::from_secs(self.remote.upload_timeout_secs),
            playlist_privacy: self.remote.playlist_privacy,
            video_description: self.remote.video_description.clone(),
            video_tags: self.remote.video_tags.clone(),
        }
    }

    pub fn pipeline_settings(&self) -> PipelineSettings {
        PipelineSettings {
            title_delimiter: self.pipeline.title_delimiter.clone(),
            max_concurrent_jobs: self.pipeline.max_concurrent_jobs,
            release_on_remove: self.watch.release_on_remove,
        }
    }
}

/// Default location of the config file
pub fn config_file_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(APP_DIR).join(CONFIG_FILE))
}

fn default_token_file() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(APP_DIR).join(TOKEN_FILE))
}

/// Load configuration from `path`, or from the default location
pub fn load(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => load_file(path),
        None => match config_file_path() {
            Some(path) if path.exists() => load_file(&path),
            _ => Ok(Config::default()),
        },
    }
}

fn load_file(path: &Path) -> Result<Config> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;
    toml::from_str(&raw).with_context(|| format!("Failed to parse config file {}", path.display()))
}

/// Write configuration to `path`, creating parent directories
pub fn save(config: &Config, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    let serialized = toml::to_string_pretty(config).context("Failed to serialize config")?;
    std::fs::write(path, serialized)
        .with_context(|| format!("Failed to write config file {}", path.display()))
}

/// Annotated example configuration
pub fn example_config() -> &'static str {
    r#"# tubewatch configuration

[watch]
# Directory tree to watch (overridden by `tubewatch run <ROOT>`)
root = "/home/me/Videos/upload"
# Drop watches when a watched directory is deleted
release_on_remove = true
# Read gitignore-style patterns from <root>/.tubewatchignore
use_ignore_file = true
# Extra gitignore-style patterns
additional_patterns = ["*.srt", "drafts/"]

[pipeline]
# Title is the file name up to the first occurrence of this delimiter
title_delimiter = "."
# 1 processes events strictly one at a time, in arrival order
max_concurrent_jobs = 1

[remote]
# Log what would happen instead of calling YouTube
dry_run = false
# OAuth2 token JSON written by the consent flow (TUBEWATCH_ACCESS_TOKEN wins)
token_file = "/home/me/.config/tubewatch/token.json"
call_timeout_secs = 60
upload_timeout_secs = 3600
# public | unlisted | private (videos are always unlisted)
playlist_privacy = "public"
video_description = ""
video_tags = []

[log]
# directory = "/var/log/tubewatch"
filter = "info"
"#
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::default();
        config.validate().unwrap();
        assert_eq!(config.pipeline.title_delimiter, ".");
        assert_eq!(config.pipeline.max_concurrent_jobs, 1);
        assert!(config.watch.release_on_remove);
        assert_eq!(config.remote.playlist_privacy, Privacy::Public);
    }

    #[test]
    fn test_example_config_parses() {
        let config: Config = toml::from_str(example_config()).unwrap();
        config.validate().unwrap();
        assert_eq!(config.watch.ignore.additional_patterns, vec!["*.srt", "drafts/"]);
        assert_eq!(
            config.watch.root.as_deref(),
            Some(Path::new("/home/me/Videos/upload"))
        );
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config: Config = toml::from_str(
            "[pipeline]\nmax_concurrent_jobs = 4\n\n[remote]\nplaylist_privacy = \"unlisted\"\n",
        )
        .unwrap();
        assert_eq!(config.pipeline.max_concurrent_jobs, 4);
        assert_eq!(config.pipeline.title_delimiter, ".");
        assert_eq!(config.remote.playlist_privacy, Privacy::Unlisted);
        assert_eq!(config.remote.call_timeout_secs, 60);
        assert!(config.watch.ignore.use_ignore_file);
    }

    #[test]
    fn test_validate_rejects_out_of_range() {
        let mut config = Config::default();
        config.pipeline.max_concurrent_jobs = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.remote.call_timeout_secs = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.remote.api_base = "ftp://example.com".to_string();
        assert!(config.validate().is_err());
        config.remote.dry_run = true;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_save_and_load_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested/config.toml");
        let mut config = Config::default();
        config.watch.root = Some(temp_dir.path().join("videos"));
        config.remote.video_tags = vec!["family".to_string()];

        save(&config, &path).unwrap();
        let loaded = load(Some(&path)).unwrap();

        assert_eq!(loaded, config);
    }

    #[test]
    fn test_explicit_missing_file_is_an_error() {
        let temp_dir = TempDir::new().unwrap();
        assert!(load(Some(&temp_dir.path().join("absent.toml"))).is_err());
    }

    #[test]
    fn test_watch_root_is_created_and_absolute() {
        let temp_dir = TempDir::new().unwrap();
        let mut config = Config::default();
        config.watch.root = Some(temp_dir.path().join("chokidar"));

        let root = config.watch_root().unwrap();

        assert!(root.is_absolute());
        assert!(root.is_dir());

        config.watch.root = None;
        assert!(config.watch_root().is_err());
    }
}

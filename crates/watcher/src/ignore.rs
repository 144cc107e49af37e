//! Ignore pattern management for tubewatch
//!
//! Supports multiple sources of ignore patterns:
//! 1. Built-in patterns (temporary and OS metadata files - always active)
//! 2. .tubewatchignore patterns at the watch root (optional, enabled by default)
//! 3. Config-based patterns (additional gitignore-style lines)

use crate::Result;
use ignore::gitignore::{Gitignore, GitignoreBuilder};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Name of the per-root ignore file
pub const IGNORE_FILE_NAME: &str = ".tubewatchignore";

/// Ignore rule manager
///
/// Combines the ignore sources with proper precedence:
/// 1. Built-in patterns (highest priority - always enforced)
/// 2. .tubewatchignore patterns
/// 3. Additional config patterns
#[derive(Debug)]
pub struct IgnoreRules {
    /// Watch root directory
    root: PathBuf,

    /// Patterns from .tubewatchignore (optional)
    ignore_file: Option<Gitignore>,

    /// Patterns from configuration (optional)
    additional: Option<Gitignore>,

    /// Configuration
    config: IgnoreConfig,
}

impl IgnoreRules {
    /// Load ignore rules for a watch root
    pub fn load(root: &Path, config: IgnoreConfig) -> Result<Self> {
        let mut rules = Self {
            root: root.to_path_buf(),
            ignore_file: None,
            additional: None,
            config,
        };

        rules.reload()?;
        Ok(rules)
    }

    /// Rules with only the built-in patterns active
    pub fn builtin(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
            ignore_file: None,
            additional: None,
            config: IgnoreConfig {
                use_ignore_file: false,
                additional_patterns: vec![],
            },
        }
    }

    /// Reload the ignore file and config patterns
    pub fn reload(&mut self) -> Result<()> {
        self.ignore_file = None;
        if self.config.use_ignore_file {
            let ignore_path = self.root.join(IGNORE_FILE_NAME);
            if ignore_path.exists() {
                let mut builder = GitignoreBuilder::new(&self.root);
                if let Some(err) = builder.add(&ignore_path) {
                    return Err(err.into());
                }
                self.ignore_file = Some(builder.build()?);
            }
        }

        self.additional = None;
        if !self.config.additional_patterns.is_empty() {
            let mut builder = GitignoreBuilder::new(&self.root);
            for pattern in &self.config.additional_patterns {
                builder.add_line(None, pattern)?;
            }
            self.additional = Some(builder.build()?);
        }

        Ok(())
    }

    /// Check if path should be ignored
    ///
    /// `is_dir` is passed in rather than looked up, since the path may
    /// already be gone by the time the event is handled.
    pub fn should_ignore(&self, path: &Path, is_dir: bool) -> bool {
        if is_builtin_ignored(path) {
            return true;
        }

        // Gitignore matchers only understand paths under their root
        let relative = if path.is_relative() {
            path
        } else {
            match path.strip_prefix(&self.root) {
                Ok(rel) => rel,
                Err(_) => return false,
            }
        };
        if relative.as_os_str().is_empty() {
            return false;
        }

        for matcher in [&self.ignore_file, &self.additional].into_iter().flatten() {
            if matcher
                .matched_path_or_any_parents(relative, is_dir)
                .is_ignore()
            {
                return true;
            }
        }

        false
    }

    /// Get number of active ignore sources
    pub fn active_sources(&self) -> usize {
        let mut count = 1; // Built-in always active
        if self.ignore_file.is_some() {
            count += 1;
        }
        if self.additional.is_some() {
            count += 1;
        }
        count
    }

    /// Get watch root
    pub fn root(&self) -> &Path {
        &self.root
    }
}

/// Check the final path component against the temporary/system file patterns
///
/// Covers editor swap and backup files, OS metadata files and partial downloads
fn is_builtin_ignored(path: &Path) -> bool {
    let filename = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("");

    // Vim swap files
    if [".swp", ".swo", ".swn", ".swm"]
        .iter()
        .any(|ext| filename.ends_with(ext))
    {
        return true;
    }

    // Backup files and Emacs auto-save/lock files
    if filename.ends_with('~')
        || (filename.starts_with('#') && filename.ends_with('#'))
        || filename.starts_with(".#")
    {
        return true;
    }

    // MacOS and Windows system files
    if filename == ".DS_Store"
        || filename.starts_with("._")
        || filename == "Thumbs.db"
        || filename == "desktop.ini"
    {
        return true;
    }

    // Partial downloads and temp files still being written
    [".part", ".crdownload", ".download", ".tmp"]
        .iter()
        .any(|ext| filename.ends_with(ext))
}

/// Ignore configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IgnoreConfig {
    /// Use .tubewatchignore at the watch root (default: true)
    #[serde(default = "default_true")]
    pub use_ignore_file: bool,

    /// Additional gitignore-style patterns from config
    #[serde(default)]
    pub additional_patterns: Vec<String>,
}

impl Default for IgnoreConfig {
    fn default() -> Self {
        Self {
            use_ignore_file: true,
            additional_patterns: vec![],
        }
    }
}

fn default_true() -> bool {
    true
}

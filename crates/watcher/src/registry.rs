//! The watch set
//!
//! Tracks every directory currently subscribed with the backend. Only the
//! event loop mutates it, so no locking is involved.
//!
//! Coverage is extended one directory at a time, which leaves a window: a
//! file written into a brand-new subdirectory before that directory's create
//! event is handled is never reported. Watches are dropped only through
//! [`WatchRegistry::release`]; if removals are not wired to it, the set grows
//! with directory churn.
//!
//! A create event can arrive while the file is still being copied in. The
//! upload then carries only the bytes present when the file was opened.

use crate::ignore::IgnoreRules;
use crate::{Result, WatchBackend};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, info};
use walkdir::WalkDir;

/// Registry of watched directories
#[derive(Debug)]
pub struct WatchRegistry<B> {
    backend: B,
    ignore: Arc<IgnoreRules>,
    watched: BTreeSet<PathBuf>,
}

impl<B: WatchBackend> WatchRegistry<B> {
    pub fn new(backend: B, ignore: IgnoreRules) -> Self {
        Self {
            backend,
            ignore: Arc::new(ignore),
            watched: BTreeSet::new(),
        }
    }

    /// Register `root` and every directory below it (depth-first)
    ///
    /// Stops at the first traversal or registration error. Directories
    /// registered before the failure stay registered.
    pub fn register_tree(&mut self, root: &Path) -> Result<usize> {
        let before = self.watched.len();
        let ignore = Arc::clone(&self.ignore);

        let walker = WalkDir::new(root)
            .follow_links(false)
            .into_iter()
            .filter_entry(move |e| {
                e.depth() == 0 || !(e.file_type().is_dir() && ignore.should_ignore(e.path(), true))
            });

        for entry in walker {
            let entry = entry.map_err(|e| {
                error!(
                    "Walk of {} failed after {} directories: {}",
                    root.display(),
                    self.watched.len() - before,
                    e
                );
                e
            })?;

            if !entry.file_type().is_dir() {
                continue;
            }

            if let Err(e) = self.register_one(entry.path()) {
                error!(
                    "Registration under {} stopped after {} directories: {}",
                    root.display(),
                    self.watched.len() - before,
                    e
                );
                return Err(e);
            }
        }

        let added = self.watched.len() - before;
        debug!("Registered {} directories under {}", added, root.display());
        Ok(added)
    }

    /// Register a single directory without scanning below it
    ///
    /// Already-watched paths are left alone.
    pub fn register_one(&mut self, path: &Path) -> Result<()> {
        if self.watched.contains(path) {
            return Ok(());
        }

        self.backend.add(path)?;
        self.watched.insert(path.to_path_buf());
        info!("Watching directory: {}", path.display());
        Ok(())
    }

    /// Drop `path` and every watched directory below it
    ///
    /// Backend failures are expected here (the OS usually drops the watch of
    /// a deleted directory on its own) and do not keep the entry alive.
    pub fn release(&mut self, path: &Path) -> usize {
        let doomed: Vec<PathBuf> = self
            .watched
            .range(path.to_path_buf()..)
            .take_while(|p| p.starts_with(path))
            .cloned()
            .collect();

        for dir in &doomed {
            if let Err(e) = self.backend.remove(dir) {
                debug!("Unwatch of {} ignored: {}", dir.display(), e);
            }
            self.watched.remove(dir);
        }

        if !doomed.is_empty() {
            info!("Released {} watches under {}", doomed.len(), path.display());
        }
        doomed.len()
    }

    pub fn is_watched(&self, path: &Path) -> bool {
        self.watched.contains(path)
    }

    /// Whether events for `path` should be skipped entirely
    pub fn is_ignored(&self, path: &Path, is_dir: bool) -> bool {
        self.ignore.should_ignore(path, is_dir)
    }

    pub fn watched(&self) -> impl Iterator<Item = &Path> {
        self.watched.iter().map(PathBuf::as_path)
    }

    pub fn len(&self) -> usize {
        self.watched.len()
    }

    pub fn is_empty(&self) -> bool {
        self.watched.is_empty()
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }
}

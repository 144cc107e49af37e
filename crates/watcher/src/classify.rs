//! Path classification

use std::path::Path;
use tracing::debug;

/// What a path points at, as far as the pipeline cares
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathKind {
    Directory,
    File,
    /// Vanished, unreadable, or neither a directory nor a regular file
    Unknown,
}

/// Classify a path by querying its metadata.
///
/// Never fails: a path that disappeared between the notification and this
/// call (or one we cannot stat) is reported as [`PathKind::Unknown`], which
/// callers treat as "do not watch, do not upload".
pub fn classify(path: &Path) -> PathKind {
    match std::fs::metadata(path) {
        Ok(meta) if meta.is_dir() => PathKind::Directory,
        Ok(meta) if meta.is_file() => PathKind::File,
        Ok(_) => PathKind::Unknown,
        Err(e) => {
            debug!("Cannot stat {}: {}", path.display(), e);
            PathKind::Unknown
        }
    }
}

//! File system watching for Tubewatch
//!
//! This crate provides the local half of the ingestion pipeline:
//! - Path classification that tolerates disappearance races
//! - Playlist name and video title extraction from paths
//! - Ignore rules for temporary and system files
//! - A notification backend built on `notify`
//! - The watch registry (the set of directories currently subscribed)

pub mod backend;
pub mod classify;
pub mod ignore;
pub mod names;
pub mod registry;

use std::path::PathBuf;

pub use backend::{EventStream, NotifyBackend, WatchBackend};
pub use classify::{classify, PathKind};
pub use crate::ignore::{IgnoreConfig, IgnoreRules};
pub use names::{folder_name, playlist_name, title};
pub use registry::WatchRegistry;

/// File system event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FsEvent {
    /// Path that changed
    pub path: PathBuf,
    /// Type of change
    pub op: Op,
}

impl FsEvent {
    pub fn new(path: impl Into<PathBuf>, op: Op) -> Self {
        Self {
            path: path.into(),
            op,
        }
    }

    /// Shorthand for a create event
    pub fn create(path: impl Into<PathBuf>) -> Self {
        Self::new(path, Op::Create)
    }
}

/// Type of file system event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    /// Entry created (or moved into a watched directory)
    Create,
    /// Entry content or metadata changed
    Write,
    /// Entry deleted (or moved out of a watched directory)
    Remove,
    /// Anything the pipeline has no use for (access, unknown)
    Other,
}

/// Errors raised by the watching layer
#[derive(Debug, thiserror::Error)]
pub enum WatchError {
    #[error("failed to watch {path}: {source}")]
    Watch {
        path: PathBuf,
        #[source]
        source: notify::Error,
    },

    #[error("failed to unwatch {path}: {source}")]
    Unwatch {
        path: PathBuf,
        #[source]
        source: notify::Error,
    },

    #[error("failed to walk directory tree: {0}")]
    Walk(#[from] walkdir::Error),

    #[error("notification backend error: {0}")]
    Backend(#[from] notify::Error),

    #[error("invalid ignore rules: {0}")]
    Ignore(#[from] ::ignore::Error),
}

pub type Result<T> = std::result::Result<T, WatchError>;

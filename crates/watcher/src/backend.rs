//! Notification backend
//!
//! Directories are registered one at a time in non-recursive mode: recursive
//! native watches are not available everywhere, so coverage of new
//! subdirectories is extended explicitly by the registry.

use crate::{FsEvent, Op, Result, WatchError};
use notify::event::{ModifyKind, RenameMode};
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::Path;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::trace;

/// Something that can subscribe directories to change notifications
pub trait WatchBackend: Send {
    /// Subscribe a single directory (non-recursive)
    fn add(&mut self, path: &Path) -> Result<()>;

    /// Unsubscribe a single directory
    fn remove(&mut self, path: &Path) -> Result<()>;
}

/// Receiving half of a backend: events and errors arrive on separate channels
#[derive(Debug)]
pub struct EventStream {
    pub events: UnboundedReceiver<FsEvent>,
    pub errors: UnboundedReceiver<WatchError>,
}

impl EventStream {
    /// Create a stream together with its sending halves
    pub fn channel() -> (UnboundedSender<FsEvent>, UnboundedSender<WatchError>, Self) {
        let (event_tx, events) = mpsc::unbounded_channel();
        let (error_tx, errors) = mpsc::unbounded_channel();
        (event_tx, error_tx, Self { events, errors })
    }
}

/// [`WatchBackend`] on top of the platform's recommended `notify` watcher
pub struct NotifyBackend {
    watcher: RecommendedWatcher,
}

impl NotifyBackend {
    /// Create the backend and the stream its notifications are delivered on
    ///
    /// Both channels close when the backend is dropped.
    pub fn new() -> Result<(Self, EventStream)> {
        let (event_tx, error_tx, stream) = EventStream::channel();

        let handler = move |res: notify::Result<Event>| match res {
            Ok(event) => {
                for fs_event in translate(event) {
                    // Receiver gone means the loop has stopped
                    let _ = event_tx.send(fs_event);
                }
            }
            Err(e) => {
                let _ = error_tx.send(WatchError::Backend(e));
            }
        };

        let watcher = RecommendedWatcher::new(handler, Config::default())?;
        Ok((Self { watcher }, stream))
    }
}

impl WatchBackend for NotifyBackend {
    fn add(&mut self, path: &Path) -> Result<()> {
        self.watcher
            .watch(path, RecursiveMode::NonRecursive)
            .map_err(|source| WatchError::Watch {
                path: path.to_path_buf(),
                source,
            })
    }

    fn remove(&mut self, path: &Path) -> Result<()> {
        self.watcher
            .unwatch(path)
            .map_err(|source| WatchError::Unwatch {
                path: path.to_path_buf(),
                source,
            })
    }
}

impl std::fmt::Debug for NotifyBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotifyBackend").finish_non_exhaustive()
    }
}

/// Flatten a raw `notify` event into one [`FsEvent`] per affected path
///
/// Renames are split: the destination is reported as a create (so files moved
/// into the tree are picked up) and the source as a remove. Backends that
/// emit a paired `Both` event also emit its `From` and `To` halves, so the
/// pair itself yields nothing.
pub fn translate(event: Event) -> Vec<FsEvent> {
    trace!("raw event: {:?}", event);

    match event.kind {
        EventKind::Modify(ModifyKind::Name(mode)) => translate_rename(mode, event.paths),
        kind => {
            let op = match kind {
                EventKind::Create(_) => Op::Create,
                EventKind::Modify(_) => Op::Write,
                EventKind::Remove(_) => Op::Remove,
                _ => Op::Other,
            };
            event
                .paths
                .into_iter()
                .map(|path| FsEvent::new(path, op))
                .collect()
        }
    }
}

fn translate_rename(mode: RenameMode, paths: Vec<std::path::PathBuf>) -> Vec<FsEvent> {
    match mode {
        RenameMode::To => paths.into_iter().map(FsEvent::create).collect(),
        RenameMode::From => paths
            .into_iter()
            .map(|p| FsEvent::new(p, Op::Remove))
            .collect(),
        // Paired summary of a From/To sequence already reported
        RenameMode::Both => Vec::new(),
        // The platform could not tell which side of the rename this is
        _ => paths
            .into_iter()
            .map(|p| {
                let op = if p.exists() { Op::Create } else { Op::Remove };
                FsEvent::new(p, op)
            })
            .collect(),
    }
}

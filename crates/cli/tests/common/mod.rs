//! Common utilities for integration tests

#![allow(dead_code)]

use cli_lib::daemon::{EventLoop, LoopSummary, PipelineSettings};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use uploader::{DriverSettings, HostCall, InMemoryHost, WorkflowDriver};
use watcher::{EventStream, FsEvent, IgnoreRules, WatchBackend, WatchRegistry};

/// Backend that only remembers what it was asked to do
#[derive(Debug, Default)]
pub struct RecordingBackend {
    pub added: Vec<PathBuf>,
    pub removed: Vec<PathBuf>,
}

impl WatchBackend for RecordingBackend {
    fn add(&mut self, path: &Path) -> watcher::Result<()> {
        self.added.push(path.to_path_buf());
        Ok(())
    }

    fn remove(&mut self, path: &Path) -> watcher::Result<()> {
        self.removed.push(path.to_path_buf());
        Ok(())
    }
}

/// A watch root in a temp dir plus an in-memory host
pub struct TestPipeline {
    _temp_dir: TempDir,
    pub root: PathBuf,
    pub host: Arc<InMemoryHost>,
    pub cancel: CancellationToken,
}

impl TestPipeline {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().canonicalize().unwrap().join("videos");
        fs::create_dir_all(&root).unwrap();

        Self {
            _temp_dir: temp_dir,
            root,
            host: Arc::new(InMemoryHost::new()),
            cancel: CancellationToken::new(),
        }
    }

    pub fn path(&self, relative: &str) -> PathBuf {
        self.root.join(relative)
    }

    pub fn mkdir(&self, relative: &str) -> PathBuf {
        let path = self.path(relative);
        fs::create_dir_all(&path).unwrap();
        path
    }

    pub fn write(&self, relative: &str, contents: &[u8]) -> PathBuf {
        let path = self.path(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&path, contents).unwrap();
        path
    }

    pub fn driver(&self) -> Arc<WorkflowDriver> {
        Arc::new(WorkflowDriver::new(
            self.host.clone(),
            DriverSettings::default(),
            self.cancel.clone(),
        ))
    }

    /// Event loop over this root, with the initial scan already done
    pub fn event_loop(&self, settings: PipelineSettings) -> EventLoop<RecordingBackend> {
        self.event_loop_with(RecordingBackend::default(), settings)
    }

    pub fn event_loop_with<B: WatchBackend>(
        &self,
        backend: B,
        settings: PipelineSettings,
    ) -> EventLoop<B> {
        let mut registry = WatchRegistry::new(backend, IgnoreRules::builtin(&self.root));
        registry.register_tree(&self.root).unwrap();

        EventLoop::new(registry, self.driver(), settings, self.cancel.clone())
    }
}

/// Feed `events` through the loop and run it until the stream is drained
pub async fn run_events(
    event_loop: &mut EventLoop<RecordingBackend>,
    events: Vec<FsEvent>,
) -> LoopSummary {
    let (event_tx, error_tx, stream) = EventStream::channel();
    for event in events {
        event_tx.send(event).unwrap();
    }
    drop(event_tx);

    let summary = event_loop.run(stream).await;
    drop(error_tx);
    summary
}

/// Host calls in a compact form ("list", "playlist:Show", "video:ep1", "item")
pub fn call_log(calls: &[HostCall]) -> Vec<String> {
    calls
        .iter()
        .map(|call| match call {
            HostCall::ListPlaylists => "list".to_string(),
            HostCall::InsertPlaylist { title } => format!("playlist:{}", title),
            HostCall::InsertVideo { title } => format!("video:{}", title),
            HostCall::InsertPlaylistItem { .. } => "item".to_string(),
        })
        .collect()
}

pub fn concurrent(jobs: usize) -> PipelineSettings {
    PipelineSettings {
        max_concurrent_jobs: jobs,
        ..PipelineSettings::default()
    }
}

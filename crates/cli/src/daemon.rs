//! The watch daemon
//!
//! [`EventLoop`] is the only consumer of file system notifications. It
//! classifies each create event, extends watch coverage for new directories
//! and hands remote work to the [`WorkflowDriver`]. [`run`] wires the real
//! backend, host and registry together from a [`Config`].

use crate::config::Config;
use anyhow::{Context, Result};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::{JoinError, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};
use uploader::{
    InMemoryHost, JobOutcome, Session, UploadJob, VideoHost, WorkflowDriver, YouTubeClient,
};
use watcher::{
    classify, folder_name, playlist_name, title, EventStream, FsEvent, IgnoreRules, NotifyBackend,
    Op, PathKind, WatchBackend, WatchRegistry,
};

/// Event loop knobs taken from the `[pipeline]` and `[watch]` sections
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub title_delimiter: String,
    /// 1 = handle events one at a time, in arrival order
    pub max_concurrent_jobs: usize,
    /// Release watches when a remove event arrives
    pub release_on_remove: bool,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            title_delimiter: ".".to_string(),
            max_concurrent_jobs: 1,
            release_on_remove: true,
        }
    }
}

/// Why the loop stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    EventsClosed,
    ErrorsClosed,
    Cancelled,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            StopReason::EventsClosed => "event stream closed",
            StopReason::ErrorsClosed => "error stream closed",
            StopReason::Cancelled => "cancelled",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Running,
    Stopped(StopReason),
}

/// Counters kept while the loop runs
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoopStats {
    pub events: u64,
    /// Directory-creation events handled
    pub directories: u64,
    pub linked: u64,
    pub unlinked: u64,
    /// Failed upload jobs and playlist resolutions
    pub failed: u64,
    /// Ignored, unclassifiable or unnameable paths
    pub skipped: u64,
    pub watch_errors: u64,
}

impl LoopStats {
    pub fn record(&mut self, outcome: &JobOutcome) {
        match outcome {
            JobOutcome::Linked { .. } => self.linked += 1,
            JobOutcome::Unlinked { .. } => self.unlinked += 1,
            JobOutcome::Failed { .. } => self.failed += 1,
        }
    }
}

impl fmt::Display for LoopStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} events, {} directories, {} linked, {} unlinked, {} failed, {} skipped, {} watch errors",
            self.events,
            self.directories,
            self.linked,
            self.unlinked,
            self.failed,
            self.skipped,
            self.watch_errors
        )
    }
}

/// What [`EventLoop::run`] returns
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopSummary {
    pub reason: StopReason,
    pub stats: LoopStats,
}

/// Result of a spawned job (concurrent mode only)
enum JobReport {
    Playlist { ok: bool },
    Upload(JobOutcome),
}

/// Consumes notifications and dispatches them
pub struct EventLoop<B: WatchBackend> {
    registry: WatchRegistry<B>,
    driver: Arc<WorkflowDriver>,
    settings: PipelineSettings,
    cancel: CancellationToken,
    state: LoopState,
    jobs: JoinSet<JobReport>,
    permits: Arc<Semaphore>,
    stats: LoopStats,
}

impl<B: WatchBackend> EventLoop<B> {
    pub fn new(
        registry: WatchRegistry<B>,
        driver: Arc<WorkflowDriver>,
        settings: PipelineSettings,
        cancel: CancellationToken,
    ) -> Self {
        let permits = Arc::new(Semaphore::new(settings.max_concurrent_jobs.max(1)));
        Self {
            registry,
            driver,
            settings,
            cancel,
            state: LoopState::Running,
            jobs: JoinSet::new(),
            permits,
            stats: LoopStats::default(),
        }
    }

    pub fn registry(&self) -> &WatchRegistry<B> {
        &self.registry
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn stats(&self) -> LoopStats {
        self.stats
    }

    fn sequential(&self) -> bool {
        self.settings.max_concurrent_jobs <= 1
    }

    /// Run until either channel closes or the token is cancelled
    ///
    /// Spawned jobs are joined before returning.
    pub async fn run(&mut self, mut stream: EventStream) -> LoopSummary {
        info!(
            "Event loop running ({} directories watched, {} job(s) at a time)",
            self.registry.len(),
            self.settings.max_concurrent_jobs.max(1)
        );

        let reason = loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break StopReason::Cancelled,
                Some(joined) = self.jobs.join_next(), if !self.jobs.is_empty() => {
                    self.collect(joined);
                }
                event = stream.events.recv() => match event {
                    Some(event) => self.handle_event(event).await,
                    None => break StopReason::EventsClosed,
                },
                err = stream.errors.recv() => match err {
                    Some(e) => {
                        self.stats.watch_errors += 1;
                        error!("Watch error: {}", e);
                    }
                    None => break StopReason::ErrorsClosed,
                },
            }
        };

        if !self.jobs.is_empty() {
            debug!("Waiting for {} in-flight jobs", self.jobs.len());
        }
        while let Some(joined) = self.jobs.join_next().await {
            self.collect(joined);
        }

        self.state = LoopState::Stopped(reason);
        info!("Event loop stopped ({}): {}", reason, self.stats);
        LoopSummary {
            reason,
            stats: self.stats,
        }
    }

    async fn handle_event(&mut self, event: FsEvent) {
        self.stats.events += 1;
        let FsEvent { path, op } = event;

        match op {
            Op::Create => {}
            Op::Remove => {
                if self.settings.release_on_remove {
                    self.registry.release(&path);
                }
                return;
            }
            Op::Write | Op::Other => {
                trace!("Ignoring {:?} on {}", op, path.display());
                return;
            }
        }

        match classify(&path) {
            PathKind::Directory => {
                if self.registry.is_ignored(&path, true) {
                    debug!("Ignored directory: {}", path.display());
                    self.stats.skipped += 1;
                    return;
                }
                self.on_directory(path).await;
            }
            PathKind::File => {
                if self.registry.is_ignored(&path, false) {
                    debug!("Ignored file: {}", path.display());
                    self.stats.skipped += 1;
                    return;
                }
                self.on_file(path).await;
            }
            PathKind::Unknown => {
                warn!(
                    "Skipping {}: not a regular file or directory (or already gone)",
                    path.display()
                );
                self.stats.skipped += 1;
            }
        }
    }

    async fn on_directory(&mut self, path: PathBuf) {
        self.stats.directories += 1;

        let Some(name) = folder_name(&path) else {
            warn!("No playlist name for directory {}", path.display());
            self.stats.skipped += 1;
            self.extend_coverage(&path);
            return;
        };

        if self.sequential() {
            let ok = match self.driver.ensure_playlist(&name).await {
                Ok(_) => true,
                Err(e) => {
                    error!("Playlist '{}' for {} not ensured: {}", name, path.display(), e);
                    false
                }
            };
            self.collect_report(JobReport::Playlist { ok });
            self.extend_coverage(&path);
        } else {
            // Registered before spawning so files created inside are not missed
            // while the playlist job waits for a permit
            self.extend_coverage(&path);
            let driver = Arc::clone(&self.driver);
            let Some(permit) = self.acquire_permit().await else {
                return;
            };
            self.jobs.spawn(async move {
                let _permit = permit;
                let ok = match driver.ensure_playlist(&name).await {
                    Ok(_) => true,
                    Err(e) => {
                        error!("Playlist '{}' for {} not ensured: {}", name, path.display(), e);
                        false
                    }
                };
                JobReport::Playlist { ok }
            });
        }
    }

    async fn on_file(&mut self, path: PathBuf) {
        let Some(playlist) = playlist_name(&path) else {
            warn!("No playlist name for file {}", path.display());
            self.stats.skipped += 1;
            return;
        };
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let video_title = match title(&file_name, &self.settings.title_delimiter) {
            "" => file_name.clone(),
            t => t.to_string(),
        };

        let job = UploadJob {
            source: path,
            title: video_title,
            playlist,
        };
        debug!(
            "Upload job: {} as '{}' into '{}'",
            job.source.display(),
            job.title,
            job.playlist
        );

        if self.sequential() {
            let outcome = self.driver.run_upload_job(&job).await;
            self.stats.record(&outcome);
        } else {
            let driver = Arc::clone(&self.driver);
            let Some(permit) = self.acquire_permit().await else {
                return;
            };
            self.jobs.spawn(async move {
                let _permit = permit;
                JobReport::Upload(driver.run_upload_job(&job).await)
            });
        }
    }

    /// Register a new directory and everything already below it
    fn extend_coverage(&mut self, path: &std::path::Path) {
        if let Err(e) = self.registry.register_tree(path) {
            error!("Failed to watch new directory {}: {}", path.display(), e);
            self.stats.watch_errors += 1;
        }
    }

    async fn acquire_permit(&self) -> Option<tokio::sync::OwnedSemaphorePermit> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => None,
            permit = Arc::clone(&self.permits).acquire_owned() => permit.ok(),
        }
    }

    fn collect(&mut self, joined: std::result::Result<JobReport, JoinError>) {
        match joined {
            Ok(report) => self.collect_report(report),
            Err(e) => {
                error!("Job aborted: {}", e);
                self.stats.failed += 1;
            }
        }
    }

    fn collect_report(&mut self, report: JobReport) {
        match report {
            JobReport::Playlist { ok: true } => {}
            JobReport::Playlist { ok: false } => self.stats.failed += 1,
            JobReport::Upload(outcome) => self.stats.record(&outcome),
        }
    }
}

impl<B: WatchBackend> fmt::Debug for EventLoop<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventLoop")
            .field("state", &self.state)
            .field("watched", &self.registry.len())
            .field("in_flight", &self.jobs.len())
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}

/// Remote handle for this run: in-memory for dry runs, YouTube otherwise
pub fn connect(config: &Config) -> Result<Arc<dyn VideoHost>> {
    if config.remote.dry_run {
        info!("Dry run: remote calls go to an in-memory host");
        return Ok(Arc::new(InMemoryHost::new()));
    }

    let session = Session::load(config.remote.token_file.as_deref())
        .context("Failed to load YouTube access token")?;
    let client = YouTubeClient::with_endpoints(
        session,
        &config.remote.api_base,
        &config.remote.upload_base,
    )
    .context("Failed to build YouTube client")?;
    Ok(Arc::new(client))
}

/// Ignore sources beyond the always-on built-in rules
fn extra_ignore_sources(rules: &IgnoreRules) -> usize {
    rules.active_sources().saturating_sub(1)
}

/// Bootstrap and run the daemon until `cancel` fires or the watcher dies
///
/// Fails only if the remote handle cannot be built or the initial scan of
/// the watch root fails.
pub async fn run(config: Config, cancel: CancellationToken) -> Result<LoopSummary> {
    let root = config.watch_root()?;
    let host = connect(&config)?;
    let driver = Arc::new(WorkflowDriver::new(
        host,
        config.driver_settings(),
        cancel.clone(),
    ));

    let ignore = IgnoreRules::load(&root, config.watch.ignore.clone())
        .context("Failed to load ignore rules")?;
    let extra = extra_ignore_sources(&ignore);
    if extra > 0 {
        debug!("{} extra ignore sources active", extra);
    }

    let (backend, stream) = NotifyBackend::new().context("Failed to start file watcher")?;
    let mut registry = WatchRegistry::new(backend, ignore);
    let count = registry
        .register_tree(&root)
        .with_context(|| format!("Initial scan of {} failed", root.display()))?;
    info!("Watching {} directories under {}", count, root.display());

    let mut event_loop = EventLoop::new(registry, driver, config.pipeline_settings(), cancel);
    Ok(event_loop.run(stream).await)
}

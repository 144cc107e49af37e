//! Remote workflow driver
//!
//! Runs the per-event remote sequence on top of a [`VideoHost`]:
//! resolve-or-create playlist → upload video → attach video to playlist.
//! Each step gates the next. Nothing is retried and nothing is rolled back:
//! a video whose attach failed stays uploaded but unlinked.
//!
//! Every remote call runs under a deadline and the driver's cancellation
//! token. Calls resolving the same playlist name are serialized in-process,
//! so one process never creates two playlists with the same title. Separate
//! processes can still race.

use crate::{MediaFile, Privacy, RemoteError, VideoHost, VideoMetadata};
use dashmap::DashMap;
use std::fmt;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Visibility of every uploaded video
pub const VIDEO_PRIVACY: Privacy = Privacy::Unlisted;

#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    #[error("{op} failed: {source}")]
    Remote {
        op: &'static str,
        #[source]
        source: RemoteError,
    },

    #[error("{op} timed out after {after:?}")]
    Timeout { op: &'static str, after: Duration },

    #[error("{op} cancelled")]
    Cancelled { op: &'static str },

    #[error("cannot open {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Knobs for the driver
#[derive(Debug, Clone)]
pub struct DriverSettings {
    /// Deadline for list/insert calls
    pub call_timeout: Duration,
    /// Deadline for a whole media upload
    pub upload_timeout: Duration,
    pub playlist_privacy: Privacy,
    pub video_description: String,
    pub video_tags: Vec<String>,
}

impl Default for DriverSettings {
    fn default() -> Self {
        Self {
            call_timeout: Duration::from_secs(60),
            upload_timeout: Duration::from_secs(3600),
            playlist_privacy: Privacy::Public,
            video_description: String::new(),
            video_tags: vec![],
        }
    }
}

/// A playlist as resolved for one job
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaylistRef {
    pub name: String,
    pub id: String,
    /// Whether this call created it
    pub created: bool,
}

/// One file-creation event's worth of work
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadJob {
    pub source: PathBuf,
    pub title: String,
    /// Name of the target playlist; its id is resolved as the first step
    pub playlist: String,
}

/// Step of the upload sequence that can fail a job outright
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    ResolvePlaylist,
    Upload,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Stage::ResolvePlaylist => "playlist resolution",
            Stage::Upload => "upload",
        })
    }
}

/// How an [`UploadJob`] ended
#[derive(Debug)]
pub enum JobOutcome {
    /// Uploaded and attached
    Linked { playlist: PlaylistRef, video_id: String },
    /// Uploaded, but attaching to the playlist failed
    Unlinked {
        playlist: PlaylistRef,
        video_id: String,
        error: WorkflowError,
    },
    /// Stopped at `stage`; later steps were not attempted
    Failed { stage: Stage, error: WorkflowError },
}

/// Orchestrates remote calls for the pipeline
pub struct WorkflowDriver {
    host: Arc<dyn VideoHost>,
    settings: DriverSettings,
    cancel: CancellationToken,
    /// Playlist name → lock held while that name is being resolved
    name_locks: DashMap<String, Arc<Mutex<()>>>,
}

impl WorkflowDriver {
    pub fn new(host: Arc<dyn VideoHost>, settings: DriverSettings, cancel: CancellationToken) -> Self {
        Self {
            host,
            settings,
            cancel,
            name_locks: DashMap::new(),
        }
    }

    pub fn settings(&self) -> &DriverSettings {
        &self.settings
    }

    /// Find the account's playlist titled exactly `name`, creating it on a miss
    pub async fn resolve_or_create_playlist(
        &self,
        name: &str,
        description: &str,
    ) -> Result<PlaylistRef, WorkflowError> {
        let lock = self.name_lock(name);
        let result = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(WorkflowError::Cancelled { op: "playlist lock" }),
            _guard = lock.lock() => self.resolve_or_create_locked(name, description).await,
        };

        drop(lock);
        self.name_locks
            .remove_if(name, |_, l| Arc::strong_count(l) == 1);
        result
    }

    async fn resolve_or_create_locked(
        &self,
        name: &str,
        description: &str,
    ) -> Result<PlaylistRef, WorkflowError> {
        let timeout = self.settings.call_timeout;
        let playlists = self
            .call("list playlists", timeout, self.host.list_my_playlists())
            .await?;

        if let Some(existing) = playlists.into_iter().find(|p| p.title == name) {
            info!("Playlist already exists: '{}' ({})", name, existing.id);
            return Ok(PlaylistRef {
                name: name.to_string(),
                id: existing.id,
                created: false,
            });
        }

        let id = self
            .call(
                "create playlist",
                timeout,
                self.host
                    .insert_playlist(name, description, self.settings.playlist_privacy),
            )
            .await?;

        info!("Playlist created: '{}' ({})", name, id);
        Ok(PlaylistRef {
            name: name.to_string(),
            id,
            created: true,
        })
    }

    /// Upload a local file as an unlisted video, returning the remote id
    pub async fn upload_video(
        &self,
        path: &Path,
        title: &str,
        description: &str,
        tags: &[String],
    ) -> Result<String, WorkflowError> {
        let open_err = |source| WorkflowError::Open {
            path: path.to_path_buf(),
            source,
        };
        let file = tokio::fs::File::open(path).await.map_err(open_err)?;
        let len = file.metadata().await.map_err(open_err)?.len();

        let metadata = VideoMetadata {
            title: title.to_string(),
            description: description.to_string(),
            tags: tags.to_vec(),
            privacy: VIDEO_PRIVACY,
        };
        let media = MediaFile {
            path: path.to_path_buf(),
            file,
            len,
        };

        let id = self
            .call(
                "upload video",
                self.settings.upload_timeout,
                self.host.insert_video(&metadata, media),
            )
            .await?;

        info!("Video uploaded: '{}' from {} ({})", title, path.display(), id);
        Ok(id)
    }

    /// Append an uploaded video to a playlist
    pub async fn attach_video_to_playlist(
        &self,
        playlist_id: &str,
        video_id: &str,
    ) -> Result<(), WorkflowError> {
        let item = self
            .call(
                "attach video",
                self.settings.call_timeout,
                self.host.insert_playlist_item(playlist_id, video_id),
            )
            .await?;

        info!(
            "Video {} added to playlist {} (item {})",
            video_id, playlist_id, item
        );
        Ok(())
    }

    /// Directory-creation work: make sure the playlist exists
    pub async fn ensure_playlist(&self, name: &str) -> Result<PlaylistRef, WorkflowError> {
        self.resolve_or_create_playlist(name, name).await
    }

    /// File-creation work: resolve → upload → attach, each step gating the next
    pub async fn run_upload_job(&self, job: &UploadJob) -> JobOutcome {
        let outcome = self.run_stages(job).await;
        log_outcome(job, &outcome);
        outcome
    }

    async fn run_stages(&self, job: &UploadJob) -> JobOutcome {
        let playlist = match self.resolve_or_create_playlist(&job.playlist, &job.playlist).await {
            Ok(playlist) => playlist,
            Err(error) => {
                return JobOutcome::Failed {
                    stage: Stage::ResolvePlaylist,
                    error,
                }
            }
        };

        let video_id = match self
            .upload_video(
                &job.source,
                &job.title,
                &self.settings.video_description,
                &self.settings.video_tags,
            )
            .await
        {
            Ok(id) => id,
            Err(error) => {
                return JobOutcome::Failed {
                    stage: Stage::Upload,
                    error,
                }
            }
        };

        match self.attach_video_to_playlist(&playlist.id, &video_id).await {
            Ok(()) => JobOutcome::Linked { playlist, video_id },
            Err(error) => JobOutcome::Unlinked {
                playlist,
                video_id,
                error,
            },
        }
    }

    fn name_lock(&self, name: &str) -> Arc<Mutex<()>> {
        self.name_locks
            .entry(name.to_string())
            .or_default()
            .value()
            .clone()
    }

    /// Run one remote call under a deadline and the cancellation token
    async fn call<T, F>(&self, op: &'static str, limit: Duration, fut: F) -> Result<T, WorkflowError>
    where
        F: Future<Output = Result<T, RemoteError>>,
    {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(WorkflowError::Cancelled { op }),
            res = tokio::time::timeout(limit, fut) => match res {
                Ok(Ok(value)) => Ok(value),
                Ok(Err(source)) => Err(WorkflowError::Remote { op, source }),
                Err(_) => Err(WorkflowError::Timeout { op, after: limit }),
            },
        }
    }
}

impl fmt::Debug for WorkflowDriver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkflowDriver")
            .field("settings", &self.settings)
            .field("names_in_flight", &self.name_locks.len())
            .finish_non_exhaustive()
    }
}

fn log_outcome(job: &UploadJob, outcome: &JobOutcome) {
    match outcome {
        JobOutcome::Linked { playlist, video_id } => info!(
            "Done: {} → video {} in playlist '{}' ({})",
            job.source.display(),
            video_id,
            playlist.name,
            playlist.id
        ),
        JobOutcome::Unlinked {
            playlist,
            video_id,
            error,
        } => warn!(
            "Video {} from {} is uploaded but not in playlist '{}' ({}): {}",
            video_id,
            job.source.display(),
            playlist.name,
            playlist.id,
            error
        ),
        JobOutcome::Failed { stage, error } => error!(
            "Dropped {} (playlist '{}'): {} failed: {}",
            job.source.display(),
            job.playlist,
            stage,
            error
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{HostCall, HostOp, InMemoryHost};
    use std::fs;
    use tempfile::TempDir;

    fn driver(host: &Arc<InMemoryHost>) -> WorkflowDriver {
        WorkflowDriver::new(
            host.clone() as Arc<dyn VideoHost>,
            DriverSettings::default(),
            CancellationToken::new(),
        )
    }

    fn clip(dir: &TempDir, name: &str) -> PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, b"not really a video").unwrap();
        path
    }

    #[tokio::test]
    async fn test_resolve_or_create_is_idempotent() {
        let host = Arc::new(InMemoryHost::new());
        let driver = driver(&host);

        let first = driver.resolve_or_create_playlist("X", "d").await.unwrap();
        let second = driver.resolve_or_create_playlist("X", "d").await.unwrap();

        assert_eq!(first.id, second.id);
        assert!(first.created);
        assert!(!second.created);
        assert_eq!(host.playlists().len(), 1);
    }

    #[tokio::test]
    async fn test_resolve_reuses_existing_playlist_by_exact_title() {
        let host = Arc::new(InMemoryHost::new());
        host.seed_playlist("trip");
        let existing = host.seed_playlist("Trip");
        let driver = driver(&host);

        let playlist = driver.resolve_or_create_playlist("Trip", "Trip").await.unwrap();

        assert_eq!(playlist.id, existing);
        assert!(!playlist.created);
        assert!(!host
            .calls()
            .iter()
            .any(|c| matches!(c, HostCall::InsertPlaylist { .. })));
    }

    #[tokio::test]
    async fn test_concurrent_resolves_create_one_playlist() {
        let host = Arc::new(InMemoryHost::new());
        host.set_latency(HostOp::ListPlaylists, Duration::from_millis(20));
        let driver = Arc::new(driver(&host));

        let mut handles = Vec::new();
        for _ in 0..4 {
            let driver = driver.clone();
            handles.push(tokio::spawn(async move {
                driver.resolve_or_create_playlist("Show", "Show").await
            }));
        }
        let mut ids = Vec::new();
        for handle in handles {
            ids.push(handle.await.unwrap().unwrap().id);
        }

        ids.dedup();
        assert_eq!(ids.len(), 1);
        assert_eq!(host.playlists().len(), 1);
        assert!(driver.name_locks.is_empty());
    }

    #[tokio::test]
    async fn test_upload_job_links_video() {
        let dir = TempDir::new().unwrap();
        let host = Arc::new(InMemoryHost::new());
        let driver = driver(&host);
        let job = UploadJob {
            source: clip(&dir, "clip1.mov"),
            title: "clip1".to_string(),
            playlist: "Trip".to_string(),
        };

        let outcome = driver.run_upload_job(&job).await;

        let JobOutcome::Linked { playlist, video_id } = outcome else {
            panic!("expected linked outcome, got {:?}", outcome);
        };
        let videos = host.videos();
        assert_eq!(videos.len(), 1);
        assert_eq!(videos[0].id, video_id);
        assert_eq!(videos[0].metadata.title, "clip1");
        assert_eq!(videos[0].metadata.privacy, Privacy::Unlisted);
        assert_eq!(videos[0].bytes, 18);
        assert_eq!(host.playlists()[0].id, playlist.id);
        assert_eq!(host.playlists()[0].items, vec![video_id]);
    }

    #[tokio::test]
    async fn test_playlist_failure_skips_upload() {
        let dir = TempDir::new().unwrap();
        let host = Arc::new(InMemoryHost::new());
        host.fail_next(HostOp::ListPlaylists, 1);
        let driver = driver(&host);
        let job = UploadJob {
            source: clip(&dir, "clip1.mov"),
            title: "clip1".to_string(),
            playlist: "Trip".to_string(),
        };

        let outcome = driver.run_upload_job(&job).await;

        assert!(matches!(
            outcome,
            JobOutcome::Failed {
                stage: Stage::ResolvePlaylist,
                ..
            }
        ));
        assert_eq!(host.calls(), vec![HostCall::ListPlaylists]);
    }

    #[tokio::test]
    async fn test_missing_file_fails_before_remote_upload() {
        let dir = TempDir::new().unwrap();
        let host = Arc::new(InMemoryHost::new());
        let driver = driver(&host);
        let job = UploadJob {
            source: dir.path().join("vanished.mov"),
            title: "vanished".to_string(),
            playlist: "Trip".to_string(),
        };

        let outcome = driver.run_upload_job(&job).await;

        assert!(matches!(
            outcome,
            JobOutcome::Failed {
                stage: Stage::Upload,
                error: WorkflowError::Open { .. }
            }
        ));
        assert!(host.videos().is_empty());
        assert!(!host
            .calls()
            .iter()
            .any(|c| matches!(c, HostCall::InsertVideo { .. } | HostCall::InsertPlaylistItem { .. })));
    }

    #[tokio::test]
    async fn test_attach_failure_leaves_video_unlinked() {
        let dir = TempDir::new().unwrap();
        let host = Arc::new(InMemoryHost::new());
        host.fail_next(HostOp::InsertPlaylistItem, 1);
        let driver = driver(&host);
        let job = UploadJob {
            source: clip(&dir, "clip1.mov"),
            title: "clip1".to_string(),
            playlist: "Trip".to_string(),
        };

        let outcome = driver.run_upload_job(&job).await;

        assert!(matches!(outcome, JobOutcome::Unlinked { .. }));
        assert_eq!(host.videos().len(), 1);
        assert!(host.playlists()[0].items.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_hung_call_times_out() {
        let host = Arc::new(InMemoryHost::new());
        host.set_latency(HostOp::ListPlaylists, Duration::from_secs(600));
        let settings = DriverSettings {
            call_timeout: Duration::from_secs(5),
            ..Default::default()
        };
        let driver = WorkflowDriver::new(host.clone(), settings, CancellationToken::new());

        let err = driver.ensure_playlist("Trip").await.unwrap_err();

        assert!(matches!(err, WorkflowError::Timeout { op: "list playlists", .. }));
        assert!(host.playlists().is_empty());
    }

    #[tokio::test]
    async fn test_cancelled_driver_refuses_work() {
        let host = Arc::new(InMemoryHost::new());
        let cancel = CancellationToken::new();
        let driver = WorkflowDriver::new(host.clone(), DriverSettings::default(), cancel.clone());
        cancel.cancel();

        let err = driver.ensure_playlist("Trip").await.unwrap_err();

        assert!(matches!(err, WorkflowError::Cancelled { .. }));
    }
}

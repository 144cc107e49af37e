//! In-memory video host
//!
//! Backs `--dry-run` and the test suites. Keeps playlists and videos in
//! process memory, records every call in order, and can be told to fail or
//! stall specific operations.

use crate::{MediaFile, PlaylistSummary, Privacy, RemoteError, VideoHost, VideoMetadata};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

/// The four remote operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HostOp {
    ListPlaylists,
    InsertPlaylist,
    InsertVideo,
    InsertPlaylistItem,
}

/// A call as observed by the host, in arrival order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostCall {
    ListPlaylists,
    InsertPlaylist { title: String },
    InsertVideo { title: String },
    InsertPlaylistItem { playlist_id: String, video_id: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredPlaylist {
    pub id: String,
    pub title: String,
    pub description: String,
    pub privacy: Privacy,
    /// Video ids, in insertion order
    pub items: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredVideo {
    pub id: String,
    pub source: PathBuf,
    pub bytes: u64,
    pub metadata: VideoMetadata,
}

#[derive(Debug, Default)]
struct State {
    playlists: Vec<StoredPlaylist>,
    videos: Vec<StoredVideo>,
    calls: Vec<HostCall>,
    /// Number of upcoming calls to fail, per operation
    failures: HashMap<HostOp, usize>,
    latency: HashMap<HostOp, Duration>,
    next_id: u64,
}

impl State {
    fn allocate_id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{}{:04}", prefix, self.next_id)
    }

    /// Record the call and decide whether it should fail
    fn begin(&mut self, op: HostOp, call: HostCall) -> (Option<Duration>, Result<(), RemoteError>) {
        self.calls.push(call);
        let delay = self.latency.get(&op).copied();
        let outcome = match self.failures.get_mut(&op) {
            Some(n) if *n > 0 => {
                *n -= 1;
                Err(RemoteError::Api {
                    status: 500,
                    message: format!("injected {:?} failure", op),
                })
            }
            _ => Ok(()),
        };
        (delay, outcome)
    }
}

/// [`VideoHost`] that keeps everything in memory
#[derive(Debug, Default)]
pub struct InMemoryHost {
    state: Mutex<State>,
}

impl InMemoryHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `count` calls of `op` fail
    pub fn fail_next(&self, op: HostOp, count: usize) {
        *self.state.lock().failures.entry(op).or_default() += count;
    }

    /// Delay every call of `op` by `delay`
    pub fn set_latency(&self, op: HostOp, delay: Duration) {
        self.state.lock().latency.insert(op, delay);
    }

    /// Seed a playlist as if it already existed remotely
    pub fn seed_playlist(&self, title: &str) -> String {
        let mut state = self.state.lock();
        let id = state.allocate_id("PL");
        state.playlists.push(StoredPlaylist {
            id: id.clone(),
            title: title.to_string(),
            description: String::new(),
            privacy: Privacy::Public,
            items: vec![],
        });
        id
    }

    pub fn playlists(&self) -> Vec<StoredPlaylist> {
        self.state.lock().playlists.clone()
    }

    pub fn videos(&self) -> Vec<StoredVideo> {
        self.state.lock().videos.clone()
    }

    pub fn calls(&self) -> Vec<HostCall> {
        self.state.lock().calls.clone()
    }

    async fn enter(&self, op: HostOp, call: HostCall) -> Result<(), RemoteError> {
        let (delay, outcome) = self.state.lock().begin(op, call);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        outcome
    }
}

#[async_trait]
impl VideoHost for InMemoryHost {
    async fn list_my_playlists(&self) -> Result<Vec<PlaylistSummary>, RemoteError> {
        self.enter(HostOp::ListPlaylists, HostCall::ListPlaylists)
            .await?;

        Ok(self
            .state
            .lock()
            .playlists
            .iter()
            .map(|p| PlaylistSummary {
                id: p.id.clone(),
                title: p.title.clone(),
            })
            .collect())
    }

    async fn insert_playlist(
        &self,
        title: &str,
        description: &str,
        privacy: Privacy,
    ) -> Result<String, RemoteError> {
        let call = HostCall::InsertPlaylist {
            title: title.to_string(),
        };
        self.enter(HostOp::InsertPlaylist, call).await?;

        let mut state = self.state.lock();
        let id = state.allocate_id("PL");
        state.playlists.push(StoredPlaylist {
            id: id.clone(),
            title: title.to_string(),
            description: description.to_string(),
            privacy,
            items: vec![],
        });
        info!("[dry-run] created {} playlist '{}' ({})", privacy, title, id);
        Ok(id)
    }

    async fn insert_video(
        &self,
        metadata: &VideoMetadata,
        media: MediaFile,
    ) -> Result<String, RemoteError> {
        let call = HostCall::InsertVideo {
            title: metadata.title.clone(),
        };
        self.enter(HostOp::InsertVideo, call).await?;

        let source = media.path.clone();
        let expected = media.len;
        let mut reader = media.into_reader();
        let bytes = tokio::io::copy(&mut reader, &mut tokio::io::sink()).await?;
        if bytes != expected {
            return Err(RemoteError::Protocol(format!(
                "expected {} bytes from {}, read {}",
                expected,
                source.display(),
                bytes
            )));
        }

        let mut state = self.state.lock();
        let id = state.allocate_id("VID");
        state.videos.push(StoredVideo {
            id: id.clone(),
            source,
            bytes,
            metadata: metadata.clone(),
        });
        info!(
            "[dry-run] uploaded '{}' ({} bytes, {}) as {}",
            metadata.title, bytes, metadata.privacy, id
        );
        Ok(id)
    }

    async fn insert_playlist_item(
        &self,
        playlist_id: &str,
        video_id: &str,
    ) -> Result<String, RemoteError> {
        let call = HostCall::InsertPlaylistItem {
            playlist_id: playlist_id.to_string(),
            video_id: video_id.to_string(),
        };
        self.enter(HostOp::InsertPlaylistItem, call).await?;

        let mut state = self.state.lock();
        if !state.videos.iter().any(|v| v.id == video_id) {
            return Err(RemoteError::Api {
                status: 404,
                message: format!("video {} not found", video_id),
            });
        }
        let item_id = state.allocate_id("PLI");
        let playlist = state
            .playlists
            .iter_mut()
            .find(|p| p.id == playlist_id)
            .ok_or_else(|| RemoteError::Api {
                status: 404,
                message: format!("playlist {} not found", playlist_id),
            })?;
        playlist.items.push(video_id.to_string());
        info!("[dry-run] added {} to playlist {}", video_id, playlist_id);
        Ok(item_id)
    }
}

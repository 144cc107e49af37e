//! Remote side of the Tubewatch pipeline
//!
//! This crate provides:
//! - The [`VideoHost`] seam (the four remote operations the pipeline needs)
//! - A YouTube Data API v3 implementation of it
//! - An in-memory implementation for dry runs and tests
//! - Session (access token) loading
//! - The workflow driver: resolve-or-create playlist → upload → attach

pub mod memory;
pub mod session;
pub mod workflow;
pub mod youtube;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use tokio::io::AsyncReadExt;

pub use memory::{HostCall, HostOp, InMemoryHost};
pub use session::{Session, SessionError};
pub use workflow::{
    DriverSettings, JobOutcome, PlaylistRef, Stage, UploadJob, WorkflowDriver, WorkflowError,
};
pub use youtube::YouTubeClient;

/// Visibility of a remote playlist or video
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Privacy {
    #[default]
    Public,
    Unlisted,
    Private,
}

impl Privacy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Privacy::Public => "public",
            Privacy::Unlisted => "unlisted",
            Privacy::Private => "private",
        }
    }
}

impl fmt::Display for Privacy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A playlist owned by the authenticated account
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaylistSummary {
    pub id: String,
    pub title: String,
}

/// Snippet and status sent along with an upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoMetadata {
    pub title: String,
    pub description: String,
    pub tags: Vec<String>,
    pub privacy: Privacy,
}

/// An opened local file ready to be streamed
#[derive(Debug)]
pub struct MediaFile {
    pub path: PathBuf,
    pub file: tokio::fs::File,
    /// Size at open time; the declared upload length
    pub len: u64,
}

impl MediaFile {
    /// Reader that stops at [`MediaFile::len`]
    ///
    /// A file still being written keeps growing after it is opened; bytes
    /// past the declared length are not sent.
    pub fn into_reader(self) -> tokio::io::Take<tokio::fs::File> {
        self.file.take(self.len)
    }
}

/// Errors returned by a [`VideoHost`]
#[derive(Debug, thiserror::Error)]
pub enum RemoteError {
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    #[error("unexpected response: {0}")]
    Protocol(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// The remote video-hosting service, reduced to what the pipeline calls
///
/// Each operation is assumed to be atomic from the caller's point of view.
#[async_trait]
pub trait VideoHost: Send + Sync {
    /// Every playlist owned by the authenticated account
    async fn list_my_playlists(&self) -> Result<Vec<PlaylistSummary>, RemoteError>;

    /// Create a playlist, returning its id
    async fn insert_playlist(
        &self,
        title: &str,
        description: &str,
        privacy: Privacy,
    ) -> Result<String, RemoteError>;

    /// Upload a video, returning its id
    async fn insert_video(
        &self,
        metadata: &VideoMetadata,
        media: MediaFile,
    ) -> Result<String, RemoteError>;

    /// Append a video to a playlist, returning the playlist item id
    async fn insert_playlist_item(
        &self,
        playlist_id: &str,
        video_id: &str,
    ) -> Result<String, RemoteError>;
}

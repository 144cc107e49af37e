//! YouTube Data API v3 client
//!
//! Uploads use the resumable protocol: a metadata POST returns a session URI
//! in `Location`, and the media is then streamed to that URI in one PUT.

use crate::{MediaFile, PlaylistSummary, Privacy, RemoteError, Session, VideoHost, VideoMetadata};
use async_trait::async_trait;
use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE, LOCATION};
use reqwest::{Body, Client, RequestBuilder, Response};
use serde::Deserialize;
use serde_json::json;
use tokio_util::io::ReaderStream;
use tracing::debug;

pub const DEFAULT_API_BASE: &str = "https://www.googleapis.com/youtube/v3";
pub const DEFAULT_UPLOAD_BASE: &str = "https://www.googleapis.com/upload/youtube/v3";

/// Largest page the playlists endpoint serves
const PAGE_SIZE: u32 = 50;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlaylistListResponse {
    #[serde(default)]
    items: Vec<PlaylistResource>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PlaylistResource {
    id: String,
    snippet: Option<PlaylistSnippet>,
}

#[derive(Debug, Deserialize)]
struct PlaylistSnippet {
    title: String,
}

/// Any resource where only the id matters (playlist, video, playlist item)
#[derive(Debug, Deserialize)]
struct Created {
    id: String,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

/// [`VideoHost`] backed by the YouTube Data API
#[derive(Debug, Clone)]
pub struct YouTubeClient {
    http: Client,
    session: Session,
    api_base: String,
    upload_base: String,
}

impl YouTubeClient {
    pub fn new(session: Session) -> Result<Self, RemoteError> {
        Self::with_endpoints(session, DEFAULT_API_BASE, DEFAULT_UPLOAD_BASE)
    }

    pub fn with_endpoints(
        session: Session,
        api_base: &str,
        upload_base: &str,
    ) -> Result<Self, RemoteError> {
        let http = Client::builder()
            .user_agent(concat!("tubewatch/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            session,
            api_base: api_base.trim_end_matches('/').to_string(),
            upload_base: upload_base.trim_end_matches('/').to_string(),
        })
    }

    fn authed(&self, request: RequestBuilder) -> RequestBuilder {
        request.bearer_auth(self.session.access_token())
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, RemoteError> {
        let response = self.authed(request).send().await?;
        check_status(response).await
    }
}

/// Turn non-2xx responses into [`RemoteError::Api`], keeping Google's message
async fn check_status(response: Response) -> Result<Response, RemoteError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(RemoteError::Api {
        status: status.as_u16(),
        message: api_error_message(&body),
    })
}

fn api_error_message(body: &str) -> String {
    match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(envelope) => envelope.error.message,
        Err(_) if body.trim().is_empty() => "empty response body".to_string(),
        Err(_) => body.trim().to_string(),
    }
}

fn video_resource(metadata: &VideoMetadata) -> serde_json::Value {
    json!({
        "snippet": {
            "title": metadata.title,
            "description": metadata.description,
            "tags": metadata.tags,
        },
        "status": {
            "privacyStatus": metadata.privacy.as_str(),
            "selfDeclaredMadeForKids": false,
        },
    })
}

#[async_trait]
impl VideoHost for YouTubeClient {
    async fn list_my_playlists(&self) -> Result<Vec<PlaylistSummary>, RemoteError> {
        let url = format!("{}/playlists", self.api_base);
        let mut playlists = Vec::new();
        let mut page_token: Option<String> = None;
        let page_size = PAGE_SIZE.to_string();

        loop {
            let mut request = self.http.get(&url).query(&[
                ("part", "snippet"),
                ("mine", "true"),
                ("maxResults", page_size.as_str()),
            ]);
            if let Some(token) = &page_token {
                request = request.query(&[("pageToken", token)]);
            }

            let page: PlaylistListResponse = self.send(request).await?.json().await?;
            playlists.extend(page.items.into_iter().filter_map(|item| {
                item.snippet.map(|s| PlaylistSummary {
                    id: item.id,
                    title: s.title,
                })
            }));

            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }

        debug!("Account owns {} playlists", playlists.len());
        Ok(playlists)
    }

    async fn insert_playlist(
        &self,
        title: &str,
        description: &str,
        privacy: Privacy,
    ) -> Result<String, RemoteError> {
        let body = json!({
            "snippet": { "title": title, "description": description },
            "status": { "privacyStatus": privacy.as_str() },
        });
        let request = self
            .http
            .post(format!("{}/playlists", self.api_base))
            .query(&[("part", "snippet,status")])
            .json(&body);

        let created: Created = self.send(request).await?.json().await?;
        Ok(created.id)
    }

    async fn insert_video(
        &self,
        metadata: &VideoMetadata,
        media: MediaFile,
    ) -> Result<String, RemoteError> {
        let start = self
            .http
            .post(format!("{}/videos", self.upload_base))
            .query(&[("uploadType", "resumable"), ("part", "snippet,status")])
            .header("X-Upload-Content-Length", media.len)
            .header("X-Upload-Content-Type", "video/*")
            .json(&video_resource(metadata));

        let response = self.send(start).await?;
        let session_uri = response
            .headers()
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| RemoteError::Protocol("resumable upload without Location header".into()))?
            .to_string();

        debug!(
            "Streaming {} ({} bytes) to upload session",
            media.path.display(),
            media.len
        );
        let upload = self
            .http
            .put(&session_uri)
            .header(CONTENT_TYPE, "video/*")
            .header(CONTENT_LENGTH, media.len)
            .body(Body::wrap_stream(ReaderStream::new(media.into_reader())));

        let created: Created = self.send(upload).await?.json().await?;
        Ok(created.id)
    }

    async fn insert_playlist_item(
        &self,
        playlist_id: &str,
        video_id: &str,
    ) -> Result<String, RemoteError> {
        let body = json!({
            "snippet": {
                "playlistId": playlist_id,
                "resourceId": { "kind": "youtube#video", "videoId": video_id },
            },
        });
        let request = self
            .http
            .post(format!("{}/playlistItems", self.api_base))
            .query(&[("part", "snippet")])
            .json(&body);

        let created: Created = self.send(request).await?.json().await?;
        Ok(created.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_playlist_page_parsing() {
        let body = r#"{
            "kind": "youtube#playlistListResponse",
            "nextPageToken": "CAUQAA",
            "items": [
                {"id": "PL1", "snippet": {"title": "Trip", "description": "Trip"}},
                {"id": "PL2"}
            ]
        }"#;
        let page: PlaylistListResponse = serde_json::from_str(body).unwrap();
        assert_eq!(page.items.len(), 2);
        assert_eq!(page.items[0].snippet.as_ref().unwrap().title, "Trip");
        assert!(page.items[1].snippet.is_none());
        assert_eq!(page.next_page_token.as_deref(), Some("CAUQAA"));

        let last: PlaylistListResponse = serde_json::from_str(r#"{"items": []}"#).unwrap();
        assert!(last.next_page_token.is_none());
    }

    #[test]
    fn test_api_error_message() {
        let body = r#"{"error": {"code": 403, "message": "quotaExceeded", "errors": []}}"#;
        assert_eq!(api_error_message(body), "quotaExceeded");
        assert_eq!(api_error_message("Bad Gateway"), "Bad Gateway");
        assert_eq!(api_error_message(""), "empty response body");
    }

    #[test]
    fn test_video_resource_is_unlisted_and_not_for_kids() {
        let metadata = VideoMetadata {
            title: "clip1".to_string(),
            description: String::new(),
            tags: vec!["trip".to_string()],
            privacy: Privacy::Unlisted,
        };
        let resource = video_resource(&metadata);
        assert_eq!(resource["snippet"]["title"], "clip1");
        assert_eq!(resource["status"]["privacyStatus"], "unlisted");
        assert_eq!(resource["status"]["selfDeclaredMadeForKids"], false);
        assert_eq!(resource["snippet"]["tags"][0], "trip");
    }

    #[test]
    fn test_endpoints_are_normalized() {
        let client = YouTubeClient::with_endpoints(
            Session::from_token("t"),
            "http://localhost:8080/youtube/v3/",
            "http://localhost:8080/upload/",
        )
        .unwrap();
        assert_eq!(client.api_base, "http://localhost:8080/youtube/v3");
        assert_eq!(client.upload_base, "http://localhost:8080/upload");
    }
}

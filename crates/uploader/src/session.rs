//! Access token loading
//!
//! Acquiring and refreshing tokens is someone else's job (the OAuth consent
//! flow writes the token file). This module only picks up a ready token.

use chrono::{DateTime, Datelike, Utc};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Environment variable that overrides the token file
pub const TOKEN_ENV: &str = "TUBEWATCH_ACCESS_TOKEN";

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("no access token: set TUBEWATCH_ACCESS_TOKEN or configure remote.token_file")]
    Missing,

    #[error("failed to read token file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed token file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("token file {0} holds an empty access token")]
    Empty(PathBuf),
}

/// OAuth2 token as cached on disk
#[derive(Debug, Deserialize)]
struct TokenFile {
    access_token: String,
    #[serde(default)]
    token_type: Option<String>,
    #[serde(default)]
    expiry: Option<DateTime<Utc>>,
}

/// A ready-to-use bearer token
#[derive(Clone)]
pub struct Session {
    access_token: String,
    expiry: Option<DateTime<Utc>>,
}

impl Session {
    pub fn from_token(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            expiry: None,
        }
    }

    /// Load from [`TOKEN_ENV`] if set, otherwise from `token_file`
    pub fn load(token_file: Option<&Path>) -> Result<Self, SessionError> {
        if let Ok(token) = std::env::var(TOKEN_ENV) {
            if !token.trim().is_empty() {
                debug!("Using access token from {}", TOKEN_ENV);
                return Ok(Self::from_token(token.trim()));
            }
        }

        let path = token_file.ok_or(SessionError::Missing)?;
        Self::from_file(path)
    }

    pub fn from_file(path: &Path) -> Result<Self, SessionError> {
        let raw = std::fs::read_to_string(path).map_err(|source| SessionError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let token: TokenFile = serde_json::from_str(&raw).map_err(|source| SessionError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

        if token.access_token.trim().is_empty() {
            return Err(SessionError::Empty(path.to_path_buf()));
        }
        if let Some(kind) = token.token_type.as_deref() {
            if !kind.eq_ignore_ascii_case("bearer") {
                warn!("Token type '{}' in {} is not bearer", kind, path.display());
            }
        }

        // Zero time means "no expiry" in the cached format
        let expiry = token.expiry.filter(|t| t.year() > 1);
        let session = Self {
            access_token: token.access_token,
            expiry,
        };
        if session.is_expired(Utc::now()) {
            warn!(
                "Access token in {} expired at {}; remote calls will be rejected until it is refreshed",
                path.display(),
                expiry.map(|t| t.to_rfc3339()).unwrap_or_default()
            );
        }
        Ok(session)
    }

    pub fn access_token(&self) -> &str {
        &self.access_token
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expiry.is_some_and(|t| t <= now)
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("access_token", &"<redacted>")
            .field("expiry", &self.expiry)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_from_file_reads_cached_token() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("token.json");
        fs::write(
            &path,
            r#"{"access_token":"ya29.abc","token_type":"Bearer","refresh_token":"1//r","expiry":"2999-01-01T00:00:00.000000+02:00"}"#,
        )
        .unwrap();

        let session = Session::from_file(&path).unwrap();
        assert_eq!(session.access_token(), "ya29.abc");
        assert!(!session.is_expired(Utc::now()));
    }

    #[test]
    fn test_zero_expiry_means_no_expiry() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("token.json");
        fs::write(
            &path,
            r#"{"access_token":"ya29.abc","expiry":"0001-01-01T00:00:00Z"}"#,
        )
        .unwrap();

        let session = Session::from_file(&path).unwrap();
        assert!(!session.is_expired(Utc::now()));
    }

    #[test]
    fn test_bad_token_files_are_rejected() {
        let temp_dir = TempDir::new().unwrap();

        let missing = temp_dir.path().join("missing.json");
        assert!(matches!(Session::from_file(&missing), Err(SessionError::Read { .. })));

        let garbage = temp_dir.path().join("garbage.json");
        fs::write(&garbage, "not json").unwrap();
        assert!(matches!(Session::from_file(&garbage), Err(SessionError::Parse { .. })));

        let empty = temp_dir.path().join("empty.json");
        fs::write(&empty, r#"{"access_token":"  "}"#).unwrap();
        assert!(matches!(Session::from_file(&empty), Err(SessionError::Empty(_))));
    }

    #[test]
    fn test_debug_redacts_token() {
        let session = Session::from_token("secret-token");
        assert!(!format!("{:?}", session).contains("secret-token"));
    }
}

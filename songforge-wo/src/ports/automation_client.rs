//! Browser-automation sidecar client
//!
//! The sidecar drives the third-party music site. This client speaks its
//! small JSON/HTTP contract and implements three ports:
//! - GenerationPort: `POST /generate`
//! - DownloadPort: `POST /download` (audio bytes, `x-song-id` and
//!   `x-file-extension` response headers)
//! - RemoteSongPort: `DELETE /songs/{songId}`

use async_trait::async_trait;
use chrono::Utc;
use reqwest::header::{HeaderMap, CONTENT_TYPE};
use reqwest::Url;
use serde::{Deserialize, Serialize};
use songforge_common::events::CandidatePosition;
use std::path::Path;
use std::time::Duration;
use uuid::Uuid;

use super::{DownloadPort, DownloadedAudio, GenerationHandle, GenerationPort, PortError, RemoteSongPort};
use crate::models::WorkflowRequest;

const USER_AGENT: &str = concat!("songforge-wo/", env!("CARGO_PKG_VERSION"));
const SONG_ID_HEADER: &str = "x-song-id";
const FILE_EXTENSION_HEADER: &str = "x-file-extension";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateBody<'a> {
    book: &'a str,
    chapter: u32,
    verse_range: &'a str,
    style: &'a str,
    title: &'a str,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    job_id: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DownloadBody<'a> {
    job_id: Option<&'a str>,
    title: &'a str,
    position: CandidatePosition,
}

/// Automation sidecar HTTP client
pub struct AutomationClient {
    http_client: reqwest::Client,
    base_url: Url,
    default_extension: String,
}

impl AutomationClient {
    pub fn new(
        base_url: &str,
        timeout: Duration,
        default_extension: &str,
    ) -> Result<Self, PortError> {
        let base_url = Url::parse(base_url)
            .map_err(|e| PortError::Configuration(format!("invalid automation URL {}: {}", base_url, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(PortError::Configuration(format!(
                "automation URL cannot be a base: {}",
                base_url
            )));
        }

        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| PortError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            base_url,
            default_extension: sanitize_extension(default_extension)
                .unwrap_or_else(|| "mp3".to_string()),
        })
    }

    /// Base URL joined with path segments (each segment percent-encoded)
    fn endpoint(&self, segments: &[&str]) -> Result<Url, PortError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| PortError::Configuration(format!("bad base URL {}", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Extension from the sidecar header, then Content-Type, then the default
    fn extension_for(&self, headers: &HeaderMap) -> String {
        headers
            .get(FILE_EXTENSION_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(sanitize_extension)
            .or_else(|| {
                headers
                    .get(CONTENT_TYPE)
                    .and_then(|v| v.to_str().ok())
                    .and_then(extension_for_content_type)
                    .map(str::to_string)
            })
            .unwrap_or_else(|| self.default_extension.clone())
    }
}

/// Reject anything that is not a short alphanumeric extension
pub(crate) fn sanitize_extension(raw: &str) -> Option<String> {
    let ext = raw.trim().trim_start_matches('.').to_ascii_lowercase();
    if ext.is_empty() || ext.len() > 5 || !ext.chars().all(|c| c.is_ascii_alphanumeric()) {
        None
    } else {
        Some(ext)
    }
}

fn extension_for_content_type(content_type: &str) -> Option<&'static str> {
    let mime = content_type.split(';').next().unwrap_or("").trim();
    match mime {
        "audio/mpeg" | "audio/mp3" => Some("mp3"),
        "audio/wav" | "audio/x-wav" | "audio/wave" => Some("wav"),
        "audio/mp4" | "audio/x-m4a" | "audio/m4a" => Some("m4a"),
        "audio/ogg" => Some("ogg"),
        "audio/flac" | "audio/x-flac" => Some("flac"),
        _ => None,
    }
}

async fn remote_error(response: reqwest::Response) -> PortError {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    PortError::Remote(status, body)
}

#[async_trait]
impl GenerationPort for AutomationClient {
    async fn generate(&self, request: &WorkflowRequest) -> Result<GenerationHandle, PortError> {
        let body = GenerateBody {
            book: &request.book,
            chapter: request.chapter,
            verse_range: &request.verse_range,
            style: &request.style,
            title: &request.title,
        };

        tracing::debug!(title = %request.title, "Requesting generation from automation sidecar");

        let response = self
            .http_client
            .post(self.endpoint(&["generate"])?)
            .json(&body)
            .send()
            .await
            .map_err(|e| PortError::Network(e.to_string()))?;

        if !response.status().is_success() {
            return Err(remote_error(response).await);
        }

        // Job id is optional; an empty body is a valid acknowledgement
        let bytes = response
            .bytes()
            .await
            .map_err(|e| PortError::Network(e.to_string()))?;
        let parsed: GenerateResponse = if bytes.iter().all(u8::is_ascii_whitespace) {
            GenerateResponse::default()
        } else {
            serde_json::from_slice(&bytes).map_err(|e| PortError::InvalidResponse(e.to_string()))?
        };

        Ok(GenerationHandle {
            title: request.title.clone(),
            job_id: parsed.job_id,
            submitted_at: Utc::now(),
        })
    }
}

#[async_trait]
impl DownloadPort for AutomationClient {
    async fn download(
        &self,
        handle: &GenerationHandle,
        position: CandidatePosition,
        dest_dir: &Path,
    ) -> Result<DownloadedAudio, PortError> {
        let body = DownloadBody {
            job_id: handle.job_id.as_deref(),
            title: &handle.title,
            position,
        };

        let response = self
            .http_client
            .post(self.endpoint(&["download"])?)
            .json(&body)
            .send()
            .await
            .map_err(|e| PortError::Network(e.to_string()))?;

        if !response.status().is_success() {
            return Err(remote_error(response).await);
        }

        let song_id = response
            .headers()
            .get(SONG_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty());
        let extension = self.extension_for(response.headers());

        let audio = response
            .bytes()
            .await
            .map_err(|e| PortError::Network(e.to_string()))?;
        if audio.is_empty() {
            return Err(PortError::InvalidResponse("empty audio body".to_string()));
        }

        tokio::fs::create_dir_all(dest_dir).await?;
        let path = dest_dir.join(format!("download-{}.{}", Uuid::new_v4().simple(), extension));
        tokio::fs::write(&path, &audio).await?;

        tracing::debug!(
            position = %position,
            song_id = ?song_id,
            bytes = audio.len(),
            path = %path.display(),
            "Candidate downloaded"
        );

        Ok(DownloadedAudio { path, song_id })
    }
}

#[async_trait]
impl RemoteSongPort for AutomationClient {
    async fn delete_song(&self, song_id: &str) -> Result<(), PortError> {
        let response = self
            .http_client
            .delete(self.endpoint(&["songs", song_id])?)
            .send()
            .await
            .map_err(|e| PortError::Network(e.to_string()))?;

        if !response.status().is_success() {
            return Err(remote_error(response).await);
        }
        Ok(())
    }
}

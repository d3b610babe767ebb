//! Debug pass-through endpoints
//!
//! Call a single port without running a workflow. Used to check the
//! automation sidecar and the reviewer in isolation.

use axum::{extract::State, routing::post, Json, Router};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use songforge_common::events::{CandidatePosition, Verdict};
use tracing::info;

use crate::api::songs::resolve_in_root;
use crate::ports::{DownloadPort, GenerationHandle, ReviewPort};
use crate::{ApiError, ApiResult, AppState};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DebugDownloadRequest {
    pub title: String,
    /// 1 or 2
    pub position: u8,
    #[serde(default)]
    pub job_id: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DebugDownloadResponse {
    /// Relative to the songs directory
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub song_id: Option<String>,
}

/// POST /debug/download
pub async fn debug_download(
    State(state): State<AppState>,
    Json(request): Json<DebugDownloadRequest>,
) -> ApiResult<Json<DebugDownloadResponse>> {
    let position = CandidatePosition::try_from(request.position).map_err(ApiError::BadRequest)?;
    if request.title.trim().is_empty() {
        return Err(ApiError::BadRequest("title must not be blank".to_string()));
    }

    let handle = GenerationHandle {
        title: request.title,
        job_id: request.job_id,
        submitted_at: Utc::now(),
    };

    let audio = state
        .ports
        .download
        .download(&handle, position, state.artifact_store.pending_dir())
        .await?;

    info!(%position, path = %audio.path.display(), song_id = ?audio.song_id, "Debug download complete");

    let path = state
        .artifact_store
        .relative_path(&audio.path)
        .unwrap_or_else(|| audio.path.display().to_string());

    Ok(Json(DebugDownloadResponse {
        path,
        song_id: audio.song_id,
    }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DebugReviewRequest {
    /// Relative to the songs directory
    pub path: String,
    #[serde(default)]
    pub planning_structure_id: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DebugReviewResponse {
    pub verdict: Verdict,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// POST /debug/review
///
/// Reviewer failures come back as verdict `error` with the failure message,
/// the same way the workflow treats them.
pub async fn debug_review(
    State(state): State<AppState>,
    Json(request): Json<DebugReviewRequest>,
) -> ApiResult<Json<DebugReviewResponse>> {
    let path = resolve_in_root(state.artifact_store.songs_dir(), &request.path).await?;

    let response = match state
        .ports
        .review
        .review(&path, request.planning_structure_id.as_deref())
        .await
    {
        Ok(verdict) => DebugReviewResponse {
            verdict,
            error: None,
        },
        Err(e) => DebugReviewResponse {
            verdict: Verdict::Error,
            error: Some(e.to_string()),
        },
    };

    info!(path = %path.display(), verdict = %response.verdict, "Debug review complete");
    Ok(Json(response))
}

/// Build debug routes
pub fn debug_routes() -> Router<AppState> {
    Router::new()
        .route("/debug/download", post(debug_download))
        .route("/debug/review", post(debug_review))
}

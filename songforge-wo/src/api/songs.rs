//! Artifact file serving and listing
//!
//! - GET /songs/*path: stream a file from the songs directory
//! - GET /artifacts?title=...: final artifacts for a title, newest first

use axum::{
    body::Body,
    extract::{Path as UrlPath, Query, State},
    http::header,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use songforge_common::slugify;
use std::path::{Component, Path, PathBuf};
use tokio_util::io::ReaderStream;

use crate::services::ArtifactEntry;
use crate::{ApiError, ApiResult, AppState};

/// Resolve a client-supplied relative path inside `root`
///
/// Rejects absolute paths, `..` components and symlinks leading out of
/// `root` with 400; missing files with 404.
pub async fn resolve_in_root(root: &Path, relative: &str) -> ApiResult<PathBuf> {
    let relative_path = Path::new(relative);
    if relative.trim().is_empty()
        || relative_path
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir))
    {
        return Err(ApiError::BadRequest(format!(
            "Path must be relative to the artifact root: {}",
            relative
        )));
    }

    let candidate = root.join(relative_path);
    let resolved = match tokio::fs::canonicalize(&candidate).await {
        Ok(resolved) => resolved,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(ApiError::NotFound(relative.to_string()))
        }
        Err(e) => return Err(e.into()),
    };
    let root = tokio::fs::canonicalize(root).await?;

    if !resolved.starts_with(&root) {
        return Err(ApiError::BadRequest(format!(
            "Path escapes the artifact root: {}",
            relative
        )));
    }
    Ok(resolved)
}

fn content_type_for(path: &Path) -> &'static str {
    let extension = path
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();
    match extension.as_str() {
        "mp3" => "audio/mpeg",
        "wav" => "audio/wav",
        "m4a" | "mp4" => "audio/mp4",
        "ogg" => "audio/ogg",
        "flac" => "audio/flac",
        "webm" => "audio/webm",
        _ => "application/octet-stream",
    }
}

/// GET /songs/*path
pub async fn serve_song(
    State(state): State<AppState>,
    UrlPath(relative): UrlPath<String>,
) -> ApiResult<Response> {
    let path = resolve_in_root(state.artifact_store.songs_dir(), &relative).await?;

    let metadata = tokio::fs::metadata(&path).await?;
    if !metadata.is_file() {
        return Err(ApiError::NotFound(relative));
    }

    let file = tokio::fs::File::open(&path).await?;
    let body = Body::from_stream(ReaderStream::new(file));

    Ok((
        [
            (header::CONTENT_TYPE, content_type_for(&path).to_string()),
            (header::CONTENT_LENGTH, metadata.len().to_string()),
        ],
        body,
    )
        .into_response())
}

#[derive(Debug, Deserialize)]
pub struct ArtifactQuery {
    pub title: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactListResponse {
    pub title: String,
    pub slug: String,
    pub artifacts: Vec<ArtifactEntry>,
}

/// GET /artifacts?title=...
pub async fn list_artifacts(
    State(state): State<AppState>,
    Query(query): Query<ArtifactQuery>,
) -> ApiResult<Json<ArtifactListResponse>> {
    let slug = slugify(&query.title);
    if slug.is_empty() {
        return Err(ApiError::BadRequest(
            "title must contain at least one ASCII letter or digit".to_string(),
        ));
    }

    let artifacts = state.artifact_store.list_final(&slug).await?;

    Ok(Json(ArtifactListResponse {
        title: query.title,
        slug,
        artifacts,
    }))
}

/// Build song file routes
pub fn song_routes() -> Router<AppState> {
    Router::new()
        .route("/songs/*path", get(serve_song))
        .route("/artifacts", get(list_artifacts))
}

//! Workflow API
//!
//! POST /workflow runs one workflow to completion and returns its result.
//! Once a request is accepted the response is always 200; workflow
//! failure is reported in the body.

use axum::{
    extract::{rejection::JsonRejection, State},
    routing::post,
    Json, Router,
};
use serde::Serialize;
use uuid::Uuid;

use crate::models::{Attempt, WorkflowErrorKind, WorkflowRequest, WorkflowResult};
use crate::services::ArtifactStore;
use crate::{ApiError, ApiResult, AppState};

/// Response body of POST /workflow
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowResponse {
    pub workflow_id: Uuid,
    pub success: bool,
    pub message: String,
    pub total_attempts: u32,
    pub final_artifact_count: usize,
    pub kept_count: usize,
    pub re_rolled_count: usize,
    pub preserved_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<WorkflowErrorKind>,
    /// Paths relative to the songs directory, e.g. `final/...`
    pub final_artifacts: Vec<String>,
    pub attempts: Vec<Attempt>,
}

impl WorkflowResponse {
    pub fn from_result(result: WorkflowResult, store: &ArtifactStore) -> Self {
        let final_artifacts = result
            .final_artifacts
            .iter()
            .map(|path| {
                store
                    .relative_path(path)
                    .unwrap_or_else(|| path.display().to_string())
            })
            .collect();

        Self {
            workflow_id: result.workflow_id,
            success: result.success,
            final_artifact_count: result.final_artifact_count(),
            total_attempts: result.total_attempts,
            kept_count: result.kept_count,
            re_rolled_count: result.re_rolled_count,
            preserved_count: result.preserved_count,
            error_kind: result.error_kind(),
            error: result.error.as_ref().map(|e| e.message.clone()),
            message: result.message,
            final_artifacts,
            attempts: result.attempts,
        }
    }
}

/// POST /workflow
pub async fn run_workflow(
    State(state): State<AppState>,
    payload: Result<Json<WorkflowRequest>, JsonRejection>,
) -> ApiResult<Json<WorkflowResponse>> {
    let Json(request) = payload.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    request.validate()?;

    let cancel = state.shutdown.child_token();
    let result = state.orchestrator.run(&request, &cancel).await;

    if let Some(error) = &result.error {
        *state.last_error.write().await = Some(error.to_string());
    }

    Ok(Json(WorkflowResponse::from_result(
        result,
        &state.artifact_store,
    )))
}

/// Build workflow routes
pub fn workflow_routes() -> Router<AppState> {
    Router::new().route("/workflow", post(run_workflow))
}

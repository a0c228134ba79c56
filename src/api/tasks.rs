//! Task submission and status endpoints

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use crate::store::LinkStatus;
use axum::{
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Batch check request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckRequest {
    pub links: Vec<String>,
}

/// Acknowledgement for a submitted batch, every link `processing`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckResponse {
    pub links: HashMap<String, String>,
    pub task_id: u64,
}

/// Accept a batch of links and start checking them in the background.
///
/// Returns immediately; probe results land in the store as they arrive and
/// are visible through the status endpoint.
pub async fn check_links_handler(
    State(state): State<AppState>,
    Json(request): Json<CheckRequest>,
) -> ApiResult<Json<CheckResponse>> {
    if request.links.is_empty() {
        return Err(ApiError::BadRequest(
            "links list cannot be empty".to_string(),
        ));
    }

    let task = state.store.create_task(&request.links).await;

    let checker = state.checker.clone();
    let check_task = task.clone();
    tokio::spawn(async move {
        checker.check_links(&check_task).await;
    });

    let links = request
        .links
        .iter()
        .map(|link| {
            (
                link.clone(),
                LinkStatus::Processing.display_label().to_string(),
            )
        })
        .collect();

    Ok(Json(CheckResponse {
        links,
        task_id: task.id,
    }))
}

/// Current status of every link in one task.
pub async fn get_status_handler(
    State(state): State<AppState>,
    Path(task_id): Path<u64>,
) -> ApiResult<Json<CheckResponse>> {
    let task = state
        .store
        .get_task(task_id)
        .await
        .ok_or(ApiError::TaskNotFound(task_id))?;

    let links = task
        .links
        .iter()
        .map(|(link, status)| (link.clone(), status.display_label().to_string()))
        .collect();

    Ok(Json(CheckResponse {
        links,
        task_id: task.id,
    }))
}

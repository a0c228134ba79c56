//! Report endpoint

use crate::error::{ApiError, ApiResult};
use crate::report::render_report;
use crate::state::AppState;
use axum::{
    extract::State,
    http::header,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

/// Report request over a set of task ids
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportRequest {
    pub task_ids: Vec<u64>,
}

/// Render a downloadable text report covering the found tasks.
///
/// Ids that do not exist are skipped; it is only an error when none match.
pub async fn report_handler(
    State(state): State<AppState>,
    Json(request): Json<ReportRequest>,
) -> ApiResult<Response> {
    if request.task_ids.is_empty() {
        return Err(ApiError::BadRequest(
            "task id list cannot be empty".to_string(),
        ));
    }

    let tasks = state.store.get_tasks_for_report(&request.task_ids).await;
    if tasks.is_empty() {
        return Err(ApiError::NoReportData);
    }

    let body = render_report(&tasks);
    Ok((
        [
            (header::CONTENT_TYPE, "text/plain; charset=utf-8"),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"report.txt\"",
            ),
        ],
        body,
    )
        .into_response())
}

//! Handlers for the `/analysis` resource.
//!
//! Every job operation goes through the [`JobRegistry`](datagen_pipeline::JobRegistry)
//! held in [`AppState`]; these handlers only translate HTTP in and out.

use axum::extract::multipart::Field;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Multipart, Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use datagen_core::error::CoreError;
use datagen_core::job::{FileRef, Job, JobListQuery, JobStatus, JobUpdate, NewJob};
use datagen_core::types::{JobId, JsonObject};
use datagen_core::validation;
use datagen_pipeline::CancelOutcome;
use serde::Serialize;

use crate::error::{AppError, AppResult};
use crate::response::{ActionResponse, DataResponse};
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Parse a job id from the path. Anything that is not a UUID cannot name a
/// job, so it is reported as not found rather than as a malformed request.
pub(crate) fn parse_job_id(raw: &str) -> AppResult<JobId> {
    raw.parse::<JobId>()
        .map_err(|_| AppError::Core(CoreError::job_not_found(raw)))
}

/// Read a multipart file part to the end, returning its size in bytes.
///
/// Contents are not kept; only the reference is recorded on the job.
async fn drain_field(mut field: Field<'_>) -> AppResult<u64> {
    let mut size = 0u64;
    while let Some(chunk) = field
        .chunk()
        .await
        .map_err(|e| AppError::BadRequest(e.to_string()))?
    {
        size += chunk.len() as u64;
    }
    Ok(size)
}

// ---------------------------------------------------------------------------
// Submit
// ---------------------------------------------------------------------------

/// POST /api/v1/analysis
///
/// Accepts a multipart form with a required `instructions` text field, one or
/// more `files` parts and an optional `additional_params` JSON object. Returns
/// 201 with the created job; the analysis runs in the background.
pub async fn submit_analysis(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> AppResult<impl IntoResponse> {
    let mut instructions: Option<String> = None;
    let mut files: Vec<FileRef> = Vec::new();
    let mut parameters = JsonObject::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(e.to_string()))?
    {
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "instructions" => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| AppError::BadRequest(e.to_string()))?;
                instructions = Some(text);
            }
            "files" => {
                let file_name = field.file_name().unwrap_or("").to_string();
                let content_type = field.content_type().map(str::to_owned);
                let size_bytes = drain_field(field).await?;
                files.push(FileRef {
                    name: file_name,
                    size_bytes,
                    content_type,
                });
            }
            "additional_params" => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| AppError::BadRequest(e.to_string()))?;
                parameters = validation::parse_parameter_bag(&text)?;
            }
            _ => {} // ignore unknown fields
        }
    }

    let instructions = instructions
        .ok_or_else(|| AppError::BadRequest("Missing required 'instructions' field".into()))?;

    let job = state
        .registry
        .create(NewJob {
            instructions,
            files,
            parameters,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(DataResponse::new(job))))
}

// ---------------------------------------------------------------------------
// Read
// ---------------------------------------------------------------------------

/// GET /api/v1/analysis
///
/// List jobs, newest first. Supports `status`, `limit` and `offset`.
pub async fn list_analyses(
    State(state): State<AppState>,
    query: Result<Query<JobListQuery>, QueryRejection>,
) -> AppResult<Json<DataResponse<Vec<Job>>>> {
    let Query(query) = query.map_err(|e| AppError::BadRequest(e.body_text()))?;
    let jobs = state.registry.list(&query).await;
    Ok(Json(DataResponse::new(jobs)))
}

/// GET /api/v1/analysis/{id}
pub async fn get_analysis(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<DataResponse<Job>>> {
    let job = state.registry.get(parse_job_id(&id)?).await?;
    Ok(Json(DataResponse::new(job)))
}

/// Compact progress view for polling clients.
#[derive(Debug, Serialize)]
pub struct StatusView {
    pub status: JobStatus,
    pub progress: u8,
    /// Non-human message contents, in order.
    pub logs: Vec<String>,
    pub job: Job,
}

/// GET /api/v1/analysis/{id}/status
pub async fn get_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<DataResponse<StatusView>>> {
    let job = state.registry.get(parse_job_id(&id)?).await?;
    Ok(Json(DataResponse::new(StatusView {
        status: job.status(),
        progress: job.progress(),
        logs: job.logs(),
        job,
    })))
}

// ---------------------------------------------------------------------------
// Update
// ---------------------------------------------------------------------------

/// PATCH /api/v1/analysis/{id}
///
/// Merge a partial update into the job. Lets an out-of-process engine report
/// progress; state fields of a terminal job are left untouched.
pub async fn update_analysis(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Result<Json<JobUpdate>, JsonRejection>,
) -> AppResult<Json<DataResponse<Job>>> {
    let job_id = parse_job_id(&id)?;
    let Json(update) = body.map_err(|e| AppError::BadRequest(e.body_text()))?;

    let job = state.registry.update(job_id, update).await?;
    Ok(Json(DataResponse::new(job)))
}

// ---------------------------------------------------------------------------
// Actions
// ---------------------------------------------------------------------------

/// POST /api/v1/analysis/{id}/cancel
///
/// Only a running job is cancelled. For any other status the call still
/// succeeds and the job is returned unchanged.
pub async fn cancel_analysis(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<ActionResponse<Job>>> {
    let outcome = state.registry.cancel(parse_job_id(&id)?).await?;

    let message = match &outcome {
        CancelOutcome::Cancelled(_) => "Job cancelled successfully".to_string(),
        CancelOutcome::NotRunning(job) => {
            format!("Job is {}; nothing to cancel", job.status())
        }
    };
    Ok(Json(ActionResponse::new(message, outcome.into_job())))
}

/// POST /api/v1/analysis/{id}/restart
///
/// Only completed, failed or cancelled jobs can be restarted (409 otherwise).
pub async fn restart_analysis(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<ActionResponse<Job>>> {
    let job = state.registry.restart(parse_job_id(&id)?).await?;
    Ok(Json(ActionResponse::new("Job restarted successfully", job)))
}

/// DELETE /api/v1/analysis/{id}
///
/// Cancels the job if it is running, notifies and disconnects its
/// subscribers, and removes it. Returns the final snapshot.
pub async fn delete_analysis(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<ActionResponse<Job>>> {
    let job = state.registry.delete(parse_job_id(&id)?).await?;
    Ok(Json(ActionResponse::new("Job deleted successfully", job)))
}

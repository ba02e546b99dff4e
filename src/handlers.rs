use crate::config::Config;
use crate::discovery::discover_contact_candidates;
use crate::errors::AppError;
use crate::models::{DuplicateSearch, ResolutionReport, ScoreResult};
use crate::resolution::resolve_contact_workflow;
use crate::scoring::score_by_module;
use crate::zoho_client::ZohoClient;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use moka::future::Cache;
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use utoipa::ToSchema;

/// Shared application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration.
    pub config: Config,
    /// CRM record store client.
    pub zoho: ZohoClient,
    /// In-flight guard: a subject id being resolved right now. The engine
    /// assumes it is the sole mutator of a record for the duration of one
    /// run, so a second request for the same id is rejected, not queued.
    pub processing_cache: Cache<String, i64>,
}

/// Health check endpoint.
pub async fn health() -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::OK,
        Json(json!({
            "status": "healthy",
            "service": "crm-dedup-api",
            "version": "0.1.0"
        })),
    )
}

/// POST /api/v1/dedup/contacts/{id}
///
/// Runs a full duplicate-resolution for one Contact and returns the report.
#[utoipa::path(
    post,
    path = "/api/v1/dedup/contacts/{id}",
    params(("id" = String, Path, description = "Subject contact id")),
    responses(
        (status = 200, description = "Resolution report", body = ResolutionReport),
        (status = 400, description = "Run already in progress or bad id"),
        (status = 404, description = "Subject contact not found"),
        (status = 502, description = "Record store failure")
    )
)]
pub async fn resolve_contact(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<ResolutionReport>, AppError> {
    if id.trim().is_empty() {
        return Err(AppError::BadRequest("contact id required".to_string()));
    }

    if state.processing_cache.get(&id).await.is_some() {
        tracing::warn!("Resolution already in progress for contact {}", id);
        return Err(AppError::BadRequest(format!(
            "resolution already in progress for contact {}",
            id
        )));
    }
    state.processing_cache.insert(id.clone(), 1).await;

    let result = resolve_contact_workflow(&state.zoho, &id).await;

    state.processing_cache.invalidate(&id).await;
    result.map(Json)
}

/// Preview of Candidate Discovery for one Contact.
#[derive(Debug, Serialize, ToSchema)]
pub struct CandidatePreview {
    pub contact_id: String,
    /// De-duplicated candidate ids, subject excluded.
    pub candidates: Vec<String>,
    /// True when discovery executed and found nothing.
    pub none_found: bool,
}

/// GET /api/v1/dedup/contacts/{id}/candidates
///
/// Runs Candidate Discovery only, without mutating anything.
#[utoipa::path(
    get,
    path = "/api/v1/dedup/contacts/{id}/candidates",
    params(("id" = String, Path, description = "Subject contact id")),
    responses(
        (status = 200, description = "Candidate preview", body = CandidatePreview),
        (status = 404, description = "Subject contact not found")
    )
)]
pub async fn preview_candidates(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<CandidatePreview>, AppError> {
    let contact = state.zoho.get_contact(&id).await?;

    let preview = match discover_contact_candidates(&state.zoho, &contact).await {
        DuplicateSearch::Candidates(candidates) => CandidatePreview {
            contact_id: id,
            candidates,
            none_found: false,
        },
        DuplicateSearch::NoneFound => CandidatePreview {
            contact_id: id,
            candidates: Vec::new(),
            none_found: true,
        },
    };

    Ok(Json(preview))
}

/// GET /api/v1/score/{module}/{id}
///
/// Completeness score of one Contact or Account, recomputed on demand.
#[utoipa::path(
    get,
    path = "/api/v1/score/{module}/{id}",
    params(
        ("module" = String, Path, description = "Contacts or Accounts"),
        ("id" = String, Path, description = "Record id")
    ),
    responses(
        (status = 200, description = "Score detail", body = ScoreResult),
        (status = 400, description = "Unsupported module"),
        (status = 404, description = "Record not found")
    )
)]
pub async fn get_score(
    State(state): State<Arc<AppState>>,
    Path((module, id)): Path<(String, String)>,
) -> Result<Json<ScoreResult>, AppError> {
    let score = score_by_module(&state.zoho, &module, &id).await?;
    Ok(Json(score))
}

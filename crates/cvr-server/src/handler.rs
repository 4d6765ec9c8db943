use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};
use cvr_core::{AnnotatedRecord, DeploymentRequest, DeploymentService};
use cvr_ledger::{Paginated, RepositorySummary, SortOrder};
use cvr_types::{DeploymentRecord, RecordId, Version, VersionStats};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::ApiError;

/// Shared application state.
pub struct AppState {
    pub service: DeploymentService,
}

impl AppState {
    pub fn new(service: DeploymentService) -> Arc<Self> {
        Arc::new(Self { service })
    }
}

type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

impl Default for HealthResponse {
    fn default() -> Self {
        Self {
            status: "ok".into(),
            version: env!("CARGO_PKG_VERSION").into(),
        }
    }
}

/// Health check handler.
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::default())
}

/// Info handler.
pub async fn info_handler(State(state): State<Arc<AppState>>) -> Json<Value> {
    let config = state.service.config();
    Json(json!({
        "name": "cvr-server",
        "version": env!("CARGO_PKG_VERSION"),
        "payload_strategy": state.service.strategy().kind(),
        "default_bump": config.default_bump,
        "max_page_limit": config.max_page_limit,
    }))
}

/// Body of `POST /v1/deployments`. Missing fields are left for validation
/// so they are reported per field.
#[derive(Debug, Deserialize)]
pub struct CreateDeploymentBody {
    #[serde(default)]
    pub owner: String,
    #[serde(default)]
    pub repository_name: String,
    #[serde(default)]
    pub payload: Value,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateDeploymentResponse {
    pub id: RecordId,
    pub version: Version,
    pub deployed_at: DateTime<Utc>,
    pub changed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_hash: Option<String>,
}

pub async fn create_deployment_handler(
    State(state): State<Arc<AppState>>,
    body: Result<Json<CreateDeploymentBody>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<CreateDeploymentResponse>)> {
    let Json(body) = body.map_err(|e| ApiError::bad_request(e.body_text()))?;
    let outcome = state
        .service
        .deploy(DeploymentRequest {
            owner: body.owner,
            repository_name: body.repository_name,
            payload: body.payload,
        })
        .await?;

    let content_hash = outcome.content_hash().map(|h| h.to_hex());
    Ok((
        StatusCode::CREATED,
        Json(CreateDeploymentResponse {
            id: outcome.record.id,
            version: outcome.record.version,
            deployed_at: outcome.record.deployed_at,
            changed: outcome.changed,
            content_hash,
        }),
    ))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Pagination {
    pub total: usize,
    pub limit: usize,
    pub offset: usize,
    pub has_more: bool,
}

impl<T> From<&Paginated<T>> for Pagination {
    fn from(page: &Paginated<T>) -> Self {
        Self {
            total: page.total,
            limit: page.limit,
            offset: page.offset,
            has_more: page.has_more(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct OwnerDeploymentsParams {
    pub limit: Option<usize>,
    pub offset: Option<usize>,
    pub order: Option<SortOrder>,
    pub annotate: Option<bool>,
}

#[derive(Debug, Serialize)]
pub struct OwnerDeploymentsResponse {
    pub records: Vec<AnnotatedRecord>,
    pub pagination: Pagination,
    pub repositories: Vec<RepositorySummary>,
}

pub async fn owner_deployments_handler(
    State(state): State<Arc<AppState>>,
    Path(owner): Path<String>,
    Query(params): Query<OwnerDeploymentsParams>,
) -> ApiResult<Json<OwnerDeploymentsResponse>> {
    let page = state.service.config().page(params.limit, params.offset);
    let listing = state
        .service
        .list_by_owner(
            &owner,
            page,
            params.order.unwrap_or_default(),
            params.annotate.unwrap_or(false),
        )
        .await?;
    Ok(Json(OwnerDeploymentsResponse {
        pagination: Pagination::from(&listing.records),
        records: listing.records.items,
        repositories: listing.repositories,
    }))
}

#[derive(Debug, Default, Deserialize)]
pub struct HistoryParams {
    pub limit: Option<usize>,
    pub offset: Option<usize>,
    pub include_payload: Option<bool>,
}

#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub records: Vec<AnnotatedRecord>,
    pub pagination: Pagination,
}

pub async fn repository_deployments_handler(
    State(state): State<Arc<AppState>>,
    Path((owner, repository)): Path<(String, String)>,
    Query(params): Query<HistoryParams>,
) -> ApiResult<Json<HistoryResponse>> {
    let page = state.service.config().page(params.limit, params.offset);
    let history = state
        .service
        .list_by_repository(
            &owner,
            &repository,
            page,
            params.include_payload.unwrap_or(false),
        )
        .await?;
    Ok(Json(HistoryResponse {
        pagination: Pagination::from(&history),
        records: history.items,
    }))
}

#[derive(Debug, Serialize)]
pub struct RepositoriesResponse {
    pub owner: String,
    pub repositories: Vec<RepositorySummary>,
}

pub async fn repositories_handler(
    State(state): State<Arc<AppState>>,
    Path(owner): Path<String>,
) -> ApiResult<Json<RepositoriesResponse>> {
    let repositories = state.service.repository_summaries(&owner).await?;
    Ok(Json(RepositoriesResponse {
        owner: owner.trim().to_ascii_lowercase(),
        repositories,
    }))
}

#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub repository_name: String,
    #[serde(flatten)]
    pub stats: VersionStats,
}

pub async fn repository_stats_handler(
    State(state): State<Arc<AppState>>,
    Path((owner, repository)): Path<(String, String)>,
) -> ApiResult<Json<StatsResponse>> {
    let stats = state.service.repository_stats(&owner, &repository).await?;
    Ok(Json(StatsResponse {
        repository_name: repository.trim().to_string(),
        stats,
    }))
}

pub async fn deployment_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<DeploymentRecord>> {
    Ok(Json(state.service.get_record(&id).await?))
}

#[derive(Debug, Serialize)]
pub struct PayloadResponse {
    pub content_hash: String,
    pub payload: Value,
}

pub async fn payload_handler(
    State(state): State<Arc<AppState>>,
    Path(hash): Path<String>,
) -> ApiResult<Json<PayloadResponse>> {
    let (hash, payload) = state.service.fetch_payload(&hash).await?;
    Ok(Json(PayloadResponse {
        content_hash: hash.to_hex(),
        payload,
    }))
}

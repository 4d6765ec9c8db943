use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use cvr_core::DeployError;
use cvr_types::FieldError;
use serde::Serialize;
use thiserror::Error;
use tracing::{error, warn};

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("payload store error: {0}")]
    PayloadStore(#[from] cvr_store::PayloadStoreError),

    #[error("record store error: {0}")]
    RecordStore(#[from] cvr_ledger::RecordStoreError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type ServerResult<T> = Result<T, ServerError>;

/// Error body returned by every endpoint.
#[derive(Debug, Serialize)]
pub struct ApiError {
    #[serde(skip)]
    pub status: StatusCode,
    pub error: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<FieldError>,
}

impl ApiError {
    pub fn new(status: StatusCode, error: impl Into<String>) -> Self {
        Self {
            status,
            error: error.into(),
            fields: Vec::new(),
        }
    }

    pub fn bad_request(error: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, error)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self)).into_response()
    }
}

/// Status mapping for service errors. Storage details are logged here and
/// replaced by a generic message.
impl From<DeployError> for ApiError {
    fn from(err: DeployError) -> Self {
        match err {
            DeployError::Validation(fields) => Self {
                status: StatusCode::BAD_REQUEST,
                error: "validation failed".into(),
                fields,
            },
            DeployError::NoOp => Self::new(StatusCode::UNPROCESSABLE_ENTITY, err.to_string()),
            DeployError::NotFound(_) => Self::new(StatusCode::NOT_FOUND, err.to_string()),
            DeployError::VersionConflict(reason) => {
                warn!(%reason, "version conflict");
                Self::new(
                    StatusCode::CONFLICT,
                    "another deployment was recorded concurrently, retry the request",
                )
            }
            DeployError::StorageUnavailable(reason) => {
                error!(%reason, "storage unavailable");
                Self::new(
                    StatusCode::SERVICE_UNAVAILABLE,
                    "storage is temporarily unavailable",
                )
            }
            DeployError::Persistence(reason) => {
                error!(%reason, "failed to persist deployment");
                Self::new(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "failed to record the deployment",
                )
            }
        }
    }
}

use cvr_ledger::RecordStoreError;
use cvr_store::PayloadStoreError;
use cvr_types::FieldError;

/// Errors returned by [`DeploymentService`](crate::DeploymentService).
#[derive(Debug, thiserror::Error)]
pub enum DeployError {
    /// One or more request fields failed validation. Nothing was written.
    #[error("validation failed: {}", join_fields(.0))]
    Validation(Vec<FieldError>),

    /// The payload matches the latest deployment of the identity.
    #[error("nothing to commit, everything is up to date")]
    NoOp,

    /// A store did not answer in time or reported itself unavailable.
    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),

    /// The record could not be written.
    #[error("persistence error: {0}")]
    Persistence(String),

    /// Another writer appended to the identity concurrently.
    #[error("version conflict: {0}")]
    VersionConflict(String),

    #[error("not found: {0}")]
    NotFound(String),
}

impl DeployError {
    /// Single-field validation failure.
    pub fn invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation(vec![FieldError::new(field, message)])
    }

    /// Whether repeating the same request may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::StorageUnavailable(_) | Self::VersionConflict(_))
    }

    /// Classify a failed append: guard rejections are conflicts, anything
    /// else means the write did not happen.
    pub fn from_append(err: RecordStoreError) -> Self {
        if err.is_conflict() {
            Self::VersionConflict(err.to_string())
        } else if let RecordStoreError::Unavailable(reason) = err {
            Self::StorageUnavailable(reason)
        } else {
            Self::Persistence(err.to_string())
        }
    }
}

fn join_fields(fields: &[FieldError]) -> String {
    fields
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Mapping for reads. Appends go through [`DeployError::from_append`].
impl From<RecordStoreError> for DeployError {
    fn from(err: RecordStoreError) -> Self {
        match err {
            e if e.is_conflict() => Self::VersionConflict(e.to_string()),
            e @ (RecordStoreError::Unavailable(_) | RecordStoreError::Io(_)) => {
                Self::StorageUnavailable(e.to_string())
            }
            e => Self::Persistence(e.to_string()),
        }
    }
}

impl From<PayloadStoreError> for DeployError {
    fn from(err: PayloadStoreError) -> Self {
        match err {
            PayloadStoreError::NotFound(hash) => Self::NotFound(format!("payload {hash}")),
            e if e.is_unavailable() => Self::StorageUnavailable(e.to_string()),
            // Stored bytes are damaged; repeating the read cannot help.
            e => Self::Persistence(e.to_string()),
        }
    }
}

/// Result alias for service operations.
pub type DeployResult<T> = Result<T, DeployError>;

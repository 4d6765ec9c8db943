use cvr_types::{RecordId, Version};

/// Errors produced by record store operations.
#[derive(Debug, thiserror::Error)]
pub enum RecordStoreError {
    /// A record with this version already exists for the identity.
    #[error("version {version} already exists for {identity}")]
    UniqueViolation { identity: String, version: Version },

    /// The identity's head moved since the caller read it.
    #[error("head of {identity} is {actual:?}, expected {expected:?}")]
    HeadMismatch {
        identity: String,
        expected: Option<RecordId>,
        actual: Option<RecordId>,
    },

    /// The record would break an ordering invariant of the log.
    #[error("integrity violation at seq {seq}: {reason}")]
    IntegrityViolation { seq: u64, reason: String },

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Backend cannot serve requests right now.
    #[error("record store unavailable: {0}")]
    Unavailable(String),
}

impl RecordStoreError {
    /// Whether the error is a lost race against another writer.
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::UniqueViolation { .. } | Self::HeadMismatch { .. })
    }
}

/// Result alias for record store operations.
pub type RecordResult<T> = Result<T, RecordStoreError>;

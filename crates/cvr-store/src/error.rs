use cvr_types::ContentHash;

/// Errors from payload store operations.
#[derive(Debug, thiserror::Error)]
pub enum PayloadStoreError {
    /// The requested payload was not found.
    #[error("payload not found: {0}")]
    NotFound(ContentHash),

    /// Stored bytes no longer hash to their key (data corruption).
    #[error("hash mismatch for {expected}: computed {computed}")]
    HashMismatch {
        expected: ContentHash,
        computed: ContentHash,
    },

    /// The stored bytes are not valid JSON.
    #[error("corrupt payload {hash}: {reason}")]
    Corrupt { hash: ContentHash, reason: String },

    /// I/O error from the underlying storage backend.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Backend cannot serve requests right now.
    #[error("payload store unavailable: {0}")]
    Unavailable(String),
}

impl PayloadStoreError {
    /// Whether the failure is transient infrastructure trouble rather than a
    /// statement about the requested content.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::Io(_) | Self::Unavailable(_))
    }
}

/// Result alias for payload store operations.
pub type PayloadResult<T> = Result<T, PayloadStoreError>;

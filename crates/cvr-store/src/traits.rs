use async_trait::async_trait;
use cvr_types::ContentHash;
use serde_json::Value;

use crate::error::PayloadResult;

/// Content-addressed payload store.
///
/// All implementations must satisfy these invariants:
/// - The hash returned by `store` is the [`ContentHasher::PAYLOAD`] hash of
///   the payload's canonical JSON, so equal payloads always share a hash.
/// - Storing existing content is idempotent.
/// - `fetch` returns exactly what was stored, or an error; never other data.
///
/// [`ContentHasher::PAYLOAD`]: crate::ContentHasher::PAYLOAD
#[async_trait]
pub trait PayloadStore: Send + Sync {
    /// Store a payload and return its content hash.
    async fn store(&self, payload: &Value) -> PayloadResult<ContentHash>;

    /// Fetch a payload by hash. Missing content is `PayloadStoreError::NotFound`.
    async fn fetch(&self, hash: &ContentHash) -> PayloadResult<Value>;

    /// Pin a payload so it is retained. Returns `false` when the hash is
    /// unknown to the store.
    async fn pin(&self, hash: &ContentHash) -> PayloadResult<bool>;

    /// Check whether a payload exists.
    async fn exists(&self, hash: &ContentHash) -> PayloadResult<bool>;
}

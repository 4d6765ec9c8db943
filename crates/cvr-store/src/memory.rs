use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

use async_trait::async_trait;
use cvr_types::ContentHash;
use serde_json::Value;

use crate::error::{PayloadResult, PayloadStoreError};
use crate::hasher::ContentHasher;
use crate::traits::PayloadStore;

/// In-memory, HashMap-based payload store.
///
/// Intended for tests and embedding. Payloads are held as canonical JSON
/// bytes behind a `RwLock`.
pub struct InMemoryPayloadStore {
    objects: RwLock<HashMap<ContentHash, Vec<u8>>>,
    pinned: RwLock<HashSet<ContentHash>>,
}

impl InMemoryPayloadStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self {
            objects: RwLock::new(HashMap::new()),
            pinned: RwLock::new(HashSet::new()),
        }
    }

    /// Number of payloads currently stored.
    pub fn len(&self) -> usize {
        self.objects.read().map(|m| m.len()).unwrap_or(0)
    }

    /// Returns `true` if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether a payload has been pinned.
    pub fn is_pinned(&self, hash: &ContentHash) -> bool {
        self.pinned
            .read()
            .map(|p| p.contains(hash))
            .unwrap_or(false)
    }
}

impl Default for InMemoryPayloadStore {
    fn default() -> Self {
        Self::new()
    }
}

fn poisoned<T>(_: T) -> PayloadStoreError {
    PayloadStoreError::Unavailable("payload store lock poisoned".into())
}

#[async_trait]
impl PayloadStore for InMemoryPayloadStore {
    async fn store(&self, payload: &Value) -> PayloadResult<ContentHash> {
        let bytes = cvr_types::canonical_json(payload).into_bytes();
        let hash = ContentHasher::PAYLOAD.hash(&bytes);
        let mut map = self.objects.write().map_err(poisoned)?;
        map.entry(hash).or_insert(bytes);
        Ok(hash)
    }

    async fn fetch(&self, hash: &ContentHash) -> PayloadResult<Value> {
        let map = self.objects.read().map_err(poisoned)?;
        let bytes = map.get(hash).ok_or(PayloadStoreError::NotFound(*hash))?;
        serde_json::from_slice(bytes).map_err(|e| PayloadStoreError::Corrupt {
            hash: *hash,
            reason: e.to_string(),
        })
    }

    async fn pin(&self, hash: &ContentHash) -> PayloadResult<bool> {
        if !self.objects.read().map_err(poisoned)?.contains_key(hash) {
            return Ok(false);
        }
        self.pinned.write().map_err(poisoned)?.insert(*hash);
        Ok(true)
    }

    async fn exists(&self, hash: &ContentHash) -> PayloadResult<bool> {
        Ok(self.objects.read().map_err(poisoned)?.contains_key(hash))
    }
}

impl std::fmt::Debug for InMemoryPayloadStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryPayloadStore")
            .field("payload_count", &self.len())
            .finish()
    }
}

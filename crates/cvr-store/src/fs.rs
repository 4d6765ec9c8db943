use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use cvr_types::ContentHash;
use serde_json::Value;
use tokio::fs;
use tracing::debug;

use crate::error::{PayloadResult, PayloadStoreError};
use crate::hasher::ContentHasher;
use crate::traits::PayloadStore;

/// Payload store backed by a local directory.
///
/// Layout mirrors git's loose objects:
///
/// ```text
/// <root>/objects/<first 2 hex>/<remaining 62 hex>   canonical JSON bytes
/// <root>/pins/<64 hex>                               empty pin marker
/// ```
pub struct FsPayloadStore {
    root: PathBuf,
    tmp_counter: AtomicU64,
}

impl FsPayloadStore {
    /// Open (or create) a store rooted at `root`.
    pub async fn open(root: impl AsRef<Path>) -> PayloadResult<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(root.join("objects")).await?;
        fs::create_dir_all(root.join("pins")).await?;
        Ok(Self {
            root,
            tmp_counter: AtomicU64::new(0),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn object_path(&self, hash: &ContentHash) -> PathBuf {
        let hex = hash.to_hex();
        self.root.join("objects").join(&hex[..2]).join(&hex[2..])
    }

    fn pin_path(&self, hash: &ContentHash) -> PathBuf {
        self.root.join("pins").join(hash.to_hex())
    }

    /// Whether a pin marker exists for `hash`.
    pub async fn is_pinned(&self, hash: &ContentHash) -> PayloadResult<bool> {
        Ok(fs::try_exists(self.pin_path(hash)).await?)
    }
}

#[async_trait]
impl PayloadStore for FsPayloadStore {
    async fn store(&self, payload: &Value) -> PayloadResult<ContentHash> {
        let bytes = cvr_types::canonical_json(payload).into_bytes();
        let hash = ContentHasher::PAYLOAD.hash(&bytes);
        let path = self.object_path(&hash);

        if fs::try_exists(&path).await? {
            debug!(hash = %hash.short_hex(), "payload already stored");
            return Ok(hash);
        }

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        let tmp = path.with_extension(format!(
            "tmp{}-{}",
            std::process::id(),
            self.tmp_counter.fetch_add(1, Ordering::Relaxed)
        ));
        fs::write(&tmp, &bytes).await?;
        fs::rename(&tmp, &path).await?;

        debug!(hash = %hash.short_hex(), bytes = bytes.len(), "payload stored");
        Ok(hash)
    }

    async fn fetch(&self, hash: &ContentHash) -> PayloadResult<Value> {
        let bytes = match fs::read(self.object_path(hash)).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(PayloadStoreError::NotFound(*hash))
            }
            Err(e) => return Err(e.into()),
        };

        if !ContentHasher::PAYLOAD.verify(&bytes, hash) {
            return Err(PayloadStoreError::HashMismatch {
                expected: *hash,
                computed: ContentHasher::PAYLOAD.hash(&bytes),
            });
        }

        serde_json::from_slice(&bytes).map_err(|e| PayloadStoreError::Corrupt {
            hash: *hash,
            reason: e.to_string(),
        })
    }

    async fn pin(&self, hash: &ContentHash) -> PayloadResult<bool> {
        if !self.exists(hash).await? {
            return Ok(false);
        }
        fs::write(self.pin_path(hash), b"").await?;
        Ok(true)
    }

    async fn exists(&self, hash: &ContentHash) -> PayloadResult<bool> {
        Ok(fs::try_exists(self.object_path(hash)).await?)
    }
}

impl std::fmt::Debug for FsPayloadStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FsPayloadStore")
            .field("root", &self.root)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    async fn open_temp() -> (tempfile::TempDir, FsPayloadStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = FsPayloadStore::open(dir.path()).await.unwrap();
        (dir, store)
    }

    #[tokio::test]
    async fn store_and_fetch() {
        let (_dir, store) = open_temp().await;
        let payload = json!({"bytecode": "0x6080", "abi": [{"type": "constructor"}]});
        let hash = store.store(&payload).await.unwrap();
        assert_eq!(store.fetch(&hash).await.unwrap(), payload);
        assert!(store.exists(&hash).await.unwrap());
    }

    #[tokio::test]
    async fn objects_use_fan_out_layout() {
        let (dir, store) = open_temp().await;
        let hash = store.store(&json!("x")).await.unwrap();
        let hex = hash.to_hex();
        let path = dir.path().join("objects").join(&hex[..2]).join(&hex[2..]);
        assert!(path.exists());
    }

    #[tokio::test]
    async fn store_is_idempotent() {
        let (_dir, store) = open_temp().await;
        let h1 = store.store(&json!({"a": 1, "b": 2})).await.unwrap();
        let h2 = store.store(&json!({"b": 2, "a": 1})).await.unwrap();
        assert_eq!(h1, h2);
    }

    #[tokio::test]
    async fn fetch_missing_is_not_found() {
        let (_dir, store) = open_temp().await;
        let err = store
            .fetch(&ContentHash::from_hash([3; 32]))
            .await
            .unwrap_err();
        assert!(matches!(err, PayloadStoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn fetch_detects_tampering() {
        let (_dir, store) = open_temp().await;
        let hash = store.store(&json!({"v": 1})).await.unwrap();
        std::fs::write(store.object_path(&hash), br#"{"v":2}"#).unwrap();
        let err = store.fetch(&hash).await.unwrap_err();
        assert!(matches!(err, PayloadStoreError::HashMismatch { .. }));
    }

    #[tokio::test]
    async fn pin_writes_marker() {
        let (_dir, store) = open_temp().await;
        let hash = store.store(&json!([1, 2])).await.unwrap();
        assert!(!store.is_pinned(&hash).await.unwrap());
        assert!(store.pin(&hash).await.unwrap());
        assert!(store.is_pinned(&hash).await.unwrap());
        assert!(!store.pin(&ContentHash::from_hash([4; 32])).await.unwrap());
    }

    #[tokio::test]
    async fn reopen_sees_existing_payloads() {
        let dir = tempfile::tempdir().unwrap();
        let hash = {
            let store = FsPayloadStore::open(dir.path()).await.unwrap();
            store.store(&json!("persisted")).await.unwrap()
        };
        let reopened = FsPayloadStore::open(dir.path()).await.unwrap();
        assert_eq!(reopened.fetch(&hash).await.unwrap(), json!("persisted"));
    }
}

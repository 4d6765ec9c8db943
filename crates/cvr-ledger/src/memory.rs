use std::sync::RwLock;

use async_trait::async_trait;
use cvr_types::{DeploymentRecord, Identity, NewDeploymentRecord, Owner, RecordId};

use crate::error::{RecordResult, RecordStoreError};
use crate::query::{Page, Paginated, RepositorySummary, SortOrder};
use crate::state::LedgerState;
use crate::traits::DeploymentRecordStore;

/// In-memory record store for tests, local demos, and embedding.
pub struct InMemoryRecordStore {
    inner: RwLock<LedgerState>,
}

impl InMemoryRecordStore {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(LedgerState::default()),
        }
    }

    fn read_state(&self) -> RecordResult<std::sync::RwLockReadGuard<'_, LedgerState>> {
        self.inner
            .read()
            .map_err(|_| RecordStoreError::Unavailable("record store read lock poisoned".into()))
    }
}

impl Default for InMemoryRecordStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DeploymentRecordStore for InMemoryRecordStore {
    async fn find_latest(&self, identity: &Identity) -> RecordResult<Option<DeploymentRecord>> {
        Ok(self.read_state()?.latest(identity).cloned())
    }

    async fn find_all(
        &self,
        identity: &Identity,
        order: SortOrder,
    ) -> RecordResult<Vec<DeploymentRecord>> {
        Ok(self.read_state()?.all(identity, order))
    }

    async fn find_by_owner(
        &self,
        owner: &Owner,
        page: Page,
        order: SortOrder,
    ) -> RecordResult<Paginated<DeploymentRecord>> {
        Ok(self.read_state()?.by_owner(owner, page, order))
    }

    async fn append(
        &self,
        record: NewDeploymentRecord,
        expected_previous: Option<RecordId>,
    ) -> RecordResult<DeploymentRecord> {
        let mut state = self.inner.write().map_err(|_| {
            RecordStoreError::Unavailable("record store write lock poisoned".into())
        })?;
        let record = state.prepare(record, expected_previous)?;
        state.insert(record.clone())?;
        Ok(record)
    }

    async fn aggregate_by_owner(&self, owner: &Owner) -> RecordResult<Vec<RepositorySummary>> {
        Ok(self.read_state()?.summaries(owner))
    }

    async fn get(&self, id: &RecordId) -> RecordResult<Option<DeploymentRecord>> {
        Ok(self.read_state()?.get(id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use cvr_types::{Fingerprint, RepositoryName, Version};
    use serde_json::json;
    use std::sync::Arc;

    fn owner(seed: char) -> Owner {
        Owner::parse(&format!("0x{}", seed.to_string().repeat(40))).unwrap()
    }

    fn identity(seed: char, repo: &str) -> Identity {
        Identity::new(owner(seed), RepositoryName::parse(repo).unwrap())
    }

    fn new_record(identity: &Identity, version: Version) -> NewDeploymentRecord {
        NewDeploymentRecord {
            identity: identity.clone(),
            version,
            fingerprint: Fingerprint::Embedded(json!({"version": version.to_string()})),
            deployed_at: Utc::now(),
        }
    }

    async fn append_next(
        store: &InMemoryRecordStore,
        identity: &Identity,
        version: Version,
    ) -> DeploymentRecord {
        let head = store.find_latest(identity).await.unwrap().map(|r| r.id);
        store
            .append(new_record(identity, version), head)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn latest_of_empty_identity_is_none() {
        let store = InMemoryRecordStore::new();
        assert!(store
            .find_latest(&identity('a', "vault"))
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn append_then_latest_and_get() {
        let store = InMemoryRecordStore::new();
        let id = identity('a', "vault");
        let first = append_next(&store, &id, Version::BASELINE).await;
        let second = append_next(&store, &id, Version::new(0, 1, 1)).await;

        let latest = store.find_latest(&id).await.unwrap().unwrap();
        assert_eq!(latest.id, second.id);
        assert_eq!(store.get(&first.id).await.unwrap().unwrap(), first);
        assert!(store.get(&RecordId::new()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn find_all_orders() {
        let store = InMemoryRecordStore::new();
        let id = identity('a', "vault");
        for patch in 0..3 {
            append_next(&store, &id, Version::new(0, 1, patch)).await;
        }
        let asc = store.find_all(&id, SortOrder::Ascending).await.unwrap();
        let desc = store.find_all(&id, SortOrder::Descending).await.unwrap();
        assert_eq!(
            asc.iter().map(|r| r.seq).collect::<Vec<_>>(),
            vec![1, 2, 3]
        );
        assert_eq!(
            desc.iter().map(|r| r.seq).collect::<Vec<_>>(),
            vec![3, 2, 1]
        );
    }

    #[tokio::test]
    async fn duplicate_version_is_unique_violation() {
        let store = InMemoryRecordStore::new();
        let id = identity('a', "vault");
        let head = append_next(&store, &id, Version::BASELINE).await;
        let err = store
            .append(new_record(&id, Version::BASELINE), Some(head.id))
            .await
            .unwrap_err();
        assert!(matches!(err, RecordStoreError::UniqueViolation { .. }));
        assert!(err.is_conflict());
    }

    #[tokio::test]
    async fn stale_head_is_rejected() {
        let store = InMemoryRecordStore::new();
        let id = identity('a', "vault");
        append_next(&store, &id, Version::BASELINE).await;

        // A writer that still believes the identity is empty.
        let err = store
            .append(new_record(&id, Version::new(0, 1, 1)), None)
            .await
            .unwrap_err();
        assert!(matches!(err, RecordStoreError::HeadMismatch { expected: None, .. }));
        assert_eq!(
            store.find_all(&id, SortOrder::Ascending).await.unwrap().len(),
            1
        );
    }

    #[tokio::test]
    async fn concurrent_first_appends_admit_exactly_one() {
        let store = Arc::new(InMemoryRecordStore::new());
        let id = identity('b', "race");

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = Arc::clone(&store);
                let id = id.clone();
                tokio::spawn(async move {
                    store.append(new_record(&id, Version::BASELINE), None).await
                })
            })
            .collect();

        let mut successes = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => successes += 1,
                Err(e) => assert!(e.is_conflict()),
            }
        }
        assert_eq!(successes, 1);
    }

    #[tokio::test]
    async fn find_by_owner_spans_repositories_and_paginates() {
        let store = InMemoryRecordStore::new();
        let vault = identity('c', "vault");
        let token = identity('c', "token");
        let other = identity('d', "vault");

        append_next(&store, &vault, Version::BASELINE).await;
        append_next(&store, &token, Version::BASELINE).await;
        append_next(&store, &vault, Version::new(0, 1, 1)).await;
        append_next(&store, &other, Version::BASELINE).await;

        let page = store
            .find_by_owner(&vault.owner, Page::new(2, 0), SortOrder::Descending)
            .await
            .unwrap();
        assert_eq!(page.total, 3);
        assert_eq!(page.items.len(), 2);
        assert!(page.has_more());
        assert_eq!(page.items[0].version, Version::new(0, 1, 1));
        assert!(page.items.iter().all(|r| r.identity.owner == vault.owner));

        let rest = store
            .find_by_owner(&vault.owner, Page::new(2, 2), SortOrder::Descending)
            .await
            .unwrap();
        assert_eq!(rest.items.len(), 1);
        assert!(!rest.has_more());
    }

    #[tokio::test]
    async fn aggregate_by_owner() {
        let store = InMemoryRecordStore::new();
        let vault = identity('e', "vault");
        append_next(&store, &vault, Version::BASELINE).await;
        append_next(&store, &vault, Version::new(0, 1, 1)).await;
        append_next(&store, &identity('e', "token"), Version::BASELINE).await;

        let summaries = store.aggregate_by_owner(&vault.owner).await.unwrap();
        assert_eq!(summaries.len(), 2);
        assert_eq!(summaries[1].repository_name.as_str(), "vault");
        assert_eq!(summaries[1].count, 2);
        assert_eq!(summaries[1].latest_version, Version::new(0, 1, 1));

        assert!(store
            .aggregate_by_owner(&owner('f'))
            .await
            .unwrap()
            .is_empty());
    }
}

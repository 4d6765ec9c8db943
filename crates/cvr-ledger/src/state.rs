use std::collections::{BTreeMap, HashMap};

use cvr_store::ContentHasher;
use cvr_types::{
    ContentHash, DeploymentRecord, Identity, NewDeploymentRecord, Owner, RecordId,
};

use crate::error::{RecordResult, RecordStoreError};
use crate::query::{Page, Paginated, RepositorySummary, SortOrder};

/// Indexed record streams shared by the in-memory and file-backed stores.
#[derive(Default)]
pub(crate) struct LedgerState {
    streams: HashMap<Identity, Vec<DeploymentRecord>>,
    id_index: HashMap<RecordId, (Identity, usize)>,
    /// Record ids per owner, in insertion order.
    owner_index: HashMap<Owner, Vec<RecordId>>,
}

impl LedgerState {
    pub(crate) fn latest(&self, identity: &Identity) -> Option<&DeploymentRecord> {
        self.streams.get(identity).and_then(|s| s.last())
    }

    pub(crate) fn all(&self, identity: &Identity, order: SortOrder) -> Vec<DeploymentRecord> {
        let mut records = self.streams.get(identity).cloned().unwrap_or_default();
        if order == SortOrder::Descending {
            records.reverse();
        }
        records
    }

    pub(crate) fn get(&self, id: &RecordId) -> Option<&DeploymentRecord> {
        let (identity, index) = self.id_index.get(id)?;
        self.streams.get(identity).and_then(|s| s.get(*index))
    }

    pub(crate) fn by_owner(
        &self,
        owner: &Owner,
        page: Page,
        order: SortOrder,
    ) -> Paginated<DeploymentRecord> {
        let mut records: Vec<DeploymentRecord> = self
            .owner_index
            .get(owner)
            .map(|ids| ids.iter().filter_map(|id| self.get(id)).cloned().collect())
            .unwrap_or_default();
        // Stable sort: equal timestamps keep insertion order.
        records.sort_by_key(|r| r.deployed_at);
        if order == SortOrder::Descending {
            records.reverse();
        }
        page.apply(records)
    }

    pub(crate) fn summaries(&self, owner: &Owner) -> Vec<RepositorySummary> {
        let mut by_repo: BTreeMap<String, RepositorySummary> = BTreeMap::new();
        for (identity, stream) in &self.streams {
            if &identity.owner != owner {
                continue;
            }
            let (Some(first), Some(last)) = (stream.first(), stream.last()) else {
                continue;
            };
            by_repo.insert(
                identity.repository_name.as_str().to_string(),
                RepositorySummary {
                    repository_name: identity.repository_name.clone(),
                    count: stream.len() as u64,
                    latest_version: last.version,
                    first_deployed_at: first.deployed_at,
                    last_deployed_at: last.deployed_at,
                },
            );
        }
        by_repo.into_values().collect()
    }

    /// Build the record that `append` would store, enforcing the
    /// compare-and-append and uniqueness guards. Does not mutate.
    pub(crate) fn prepare(
        &self,
        new: NewDeploymentRecord,
        expected_previous: Option<RecordId>,
    ) -> RecordResult<DeploymentRecord> {
        let stream = self.streams.get(&new.identity).map(Vec::as_slice).unwrap_or(&[]);
        let head = stream.last();

        let actual = head.map(|r| r.id);
        if actual != expected_previous {
            return Err(RecordStoreError::HeadMismatch {
                identity: new.identity.to_string(),
                expected: expected_previous,
                actual,
            });
        }

        if stream.iter().any(|r| r.version == new.version) {
            return Err(RecordStoreError::UniqueViolation {
                identity: new.identity.to_string(),
                version: new.version,
            });
        }

        let seq = stream.len() as u64 + 1;
        if let Some(head) = head {
            if new.version <= head.version {
                return Err(RecordStoreError::IntegrityViolation {
                    seq,
                    reason: format!(
                        "version {} does not advance past {}",
                        new.version, head.version
                    ),
                });
            }
        }

        let deployed_at = match head {
            Some(head) if head.deployed_at > new.deployed_at => head.deployed_at,
            _ => new.deployed_at,
        };

        let mut record = DeploymentRecord {
            id: RecordId::new(),
            identity: new.identity,
            seq,
            version: new.version,
            fingerprint: new.fingerprint,
            deployed_at,
            record_hash: ContentHash::from_hash([0; 32]),
        };
        record.record_hash = record_hash(&record);
        Ok(record)
    }

    /// Insert a fully formed record at the end of its stream.
    pub(crate) fn insert(&mut self, record: DeploymentRecord) -> RecordResult<()> {
        if self.id_index.contains_key(&record.id) {
            return Err(RecordStoreError::IntegrityViolation {
                seq: record.seq,
                reason: format!("duplicate record id {}", record.id),
            });
        }

        let stream = self.streams.entry(record.identity.clone()).or_default();
        let expected_seq = stream.len() as u64 + 1;
        if record.seq != expected_seq {
            return Err(RecordStoreError::IntegrityViolation {
                seq: record.seq,
                reason: format!("expected seq {expected_seq}"),
            });
        }
        if let Some(head) = stream.last() {
            if record.version <= head.version || record.deployed_at < head.deployed_at {
                return Err(RecordStoreError::IntegrityViolation {
                    seq: record.seq,
                    reason: "record does not advance the stream".into(),
                });
            }
        }

        self.owner_index
            .entry(record.identity.owner.clone())
            .or_default()
            .push(record.id);
        self.id_index
            .insert(record.id, (record.identity.clone(), stream.len()));
        stream.push(record);
        Ok(())
    }
}

/// Integrity hash of a record's canonical content.
pub(crate) fn record_hash(record: &DeploymentRecord) -> ContentHash {
    ContentHasher::RECORD.hash(record.canonical_content().as_bytes())
}

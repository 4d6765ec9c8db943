use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use async_trait::async_trait;
use cvr_types::{DeploymentRecord, Identity, NewDeploymentRecord, Owner, RecordId};
use tokio::fs::{self, File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::error::{RecordResult, RecordStoreError};
use crate::query::{Page, Paginated, RepositorySummary, SortOrder};
use crate::state::{record_hash, LedgerState};
use crate::traits::DeploymentRecordStore;

/// Record store persisted as a JSON-lines append log.
///
/// One serialized [`DeploymentRecord`] per line. On open the log is
/// replayed into memory; lines that fail to parse or whose `record_hash`
/// does not match their content are logged and skipped (they represent
/// torn writes from a crash). Appends are serialized through a single log
/// handle and synced before the record becomes visible to readers. A line
/// whose write or sync fails is truncated away before the error is returned.
pub struct FileRecordStore {
    path: PathBuf,
    state: RwLock<LedgerState>,
    log: Mutex<LogWriter>,
}

/// Append handle for the record log.
struct LogWriter {
    file: File,
    /// Length of the log through the last committed line.
    committed: u64,
    /// Set when a failed append could not be truncated away.
    broken: bool,
    #[cfg(test)]
    fault: Option<WriteFault>,
}

/// Failure to raise on the next write.
#[cfg(test)]
#[derive(Clone, Copy, Debug)]
enum WriteFault {
    /// Write the first half of the line, then fail.
    Torn,
    /// Write the whole line, then fail before the sync completes.
    Sync,
}

impl LogWriter {
    /// Write and sync `line`, or leave the log exactly as it was.
    async fn append_line(&mut self, line: &[u8]) -> RecordResult<()> {
        if self.broken {
            return Err(RecordStoreError::Unavailable(
                "record log holds an uncommitted tail; reopen required".into(),
            ));
        }
        match self.write_synced(line).await {
            Ok(()) => {
                self.committed += line.len() as u64;
                Ok(())
            }
            Err(e) => {
                match self.file.set_len(self.committed).await {
                    Ok(()) => {
                        warn!(error = %e, len = self.committed, "append failed; log truncated to last commit");
                    }
                    Err(rollback) => {
                        self.broken = true;
                        error!(error = %e, rollback = %rollback, "append failed and log truncation failed");
                    }
                }
                Err(e.into())
            }
        }
    }

    async fn write_synced(&mut self, line: &[u8]) -> std::io::Result<()> {
        #[cfg(test)]
        {
            if let Some(fault) = self.fault.take() {
                let cut = match fault {
                    WriteFault::Torn => line.len() / 2,
                    WriteFault::Sync => line.len(),
                };
                self.file.write_all(&line[..cut]).await?;
                self.file.flush().await?;
                return Err(std::io::Error::other("simulated disk failure"));
            }
        }
        self.file.write_all(line).await?;
        self.file.flush().await?;
        self.file.sync_data().await
    }
}

impl FileRecordStore {
    /// Open (or create) the log at `path` and replay it.
    pub async fn open(path: impl AsRef<Path>) -> RecordResult<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }

        let content = match fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => String::new(),
            Err(e) => return Err(e.into()),
        };

        let mut state = LedgerState::default();
        let mut replayed = 0usize;
        for (index, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let line_no = index + 1;
            let record: DeploymentRecord = match serde_json::from_str(line) {
                Ok(record) => record,
                Err(e) => {
                    warn!(line = line_no, error = %e, "malformed record line; skipping");
                    continue;
                }
            };
            if record.record_hash != record_hash(&record) {
                warn!(line = line_no, id = %record.id, "record hash mismatch; skipping");
                continue;
            }
            if let Err(e) = state.insert(record) {
                warn!(line = line_no, error = %e, "record rejected during replay; skipping");
                continue;
            }
            replayed += 1;
        }

        let mut log = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;
        // Terminate a torn trailing line so the next append starts clean.
        if !content.is_empty() && !content.ends_with('\n') {
            log.write_all(b"\n").await?;
            log.flush().await?;
        }
        let committed = log.metadata().await?.len();

        info!(path = %path.display(), records = replayed, "record log opened");
        Ok(Self {
            path,
            state: RwLock::new(state),
            log: Mutex::new(LogWriter {
                file: log,
                committed,
                broken: false,
                #[cfg(test)]
                fault: None,
            }),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_state(&self) -> RecordResult<std::sync::RwLockReadGuard<'_, LedgerState>> {
        self.state
            .read()
            .map_err(|_| RecordStoreError::Unavailable("record store read lock poisoned".into()))
    }
}

#[async_trait]
impl DeploymentRecordStore for FileRecordStore {
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
        let mut log = self.log.lock().await;

        // The log mutex serializes appends, so the head cannot move between
        // prepare and insert.
        let record = {
            let state = self.read_state()?;
            state.prepare(record, expected_previous)?
        };

        let mut line = serde_json::to_string(&record)
            .map_err(|e| RecordStoreError::Serialization(e.to_string()))?;
        line.push('\n');
        log.append_line(line.as_bytes()).await?;

        self.state
            .write()
            .map_err(|_| RecordStoreError::Unavailable("record store write lock poisoned".into()))?
            .insert(record.clone())?;

        debug!(id = %record.id, seq = record.seq, "record appended to log");
        Ok(record)
    }

    async fn aggregate_by_owner(&self, owner: &Owner) -> RecordResult<Vec<RepositorySummary>> {
        Ok(self.read_state()?.summaries(owner))
    }

    async fn get(&self, id: &RecordId) -> RecordResult<Option<DeploymentRecord>> {
        Ok(self.read_state()?.get(id).cloned())
    }
}

impl std::fmt::Debug for FileRecordStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileRecordStore")
            .field("path", &self.path)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use cvr_types::{ContentHash, Fingerprint, RepositoryName, Version};

    fn identity(repo: &str) -> Identity {
        Identity::new(
            Owner::parse(&format!("0x{}", "9".repeat(40))).unwrap(),
            RepositoryName::parse(repo).unwrap(),
        )
    }

    fn new_record(identity: &Identity, version: Version, byte: u8) -> NewDeploymentRecord {
        NewDeploymentRecord {
            identity: identity.clone(),
            version,
            fingerprint: Fingerprint::ContentAddressed(ContentHash::from_hash([byte; 32])),
            deployed_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn records_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("records.jsonl");
        let id = identity("vault");

        let (first, second) = {
            let store = FileRecordStore::open(&path).await.unwrap();
            let first = store
                .append(new_record(&id, Version::BASELINE, 1), None)
                .await
                .unwrap();
            let second = store
                .append(new_record(&id, Version::new(0, 1, 1), 2), Some(first.id))
                .await
                .unwrap();
            (first, second)
        };

        let reopened = FileRecordStore::open(&path).await.unwrap();
        let history = reopened.find_all(&id, SortOrder::Ascending).await.unwrap();
        assert_eq!(history, vec![first.clone(), second.clone()]);
        assert_eq!(
            reopened.find_latest(&id).await.unwrap().unwrap().id,
            second.id
        );
        assert_eq!(reopened.get(&first.id).await.unwrap().unwrap(), first);
    }

    #[tokio::test]
    async fn guards_apply_to_file_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileRecordStore::open(dir.path().join("r.jsonl")).await.unwrap();
        let id = identity("vault");
        let head = store
            .append(new_record(&id, Version::BASELINE, 1), None)
            .await
            .unwrap();

        let stale = store
            .append(new_record(&id, Version::new(0, 1, 1), 2), None)
            .await
            .unwrap_err();
        assert!(matches!(stale, RecordStoreError::HeadMismatch { .. }));

        let duplicate = store
            .append(new_record(&id, Version::BASELINE, 3), Some(head.id))
            .await
            .unwrap_err();
        assert!(matches!(duplicate, RecordStoreError::UniqueViolation { .. }));
    }

    #[tokio::test]
    async fn replay_skips_torn_and_tampered_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("records.jsonl");
        let id = identity("vault");

        let first = {
            let store = FileRecordStore::open(&path).await.unwrap();
            store
                .append(new_record(&id, Version::BASELINE, 1), None)
                .await
                .unwrap()
        };

        // A tampered copy of a valid line followed by a torn write.
        let mut tampered = first.clone();
        tampered.seq = 2;
        tampered.version = Version::new(9, 9, 9);
        let mut content = std::fs::read_to_string(&path).unwrap();
        content.push_str(&serde_json::to_string(&tampered).unwrap());
        content.push('\n');
        content.push_str("{\"id\":\"trunc");
        std::fs::write(&path, content).unwrap();

        let store = FileRecordStore::open(&path).await.unwrap();
        let history = store.find_all(&id, SortOrder::Ascending).await.unwrap();
        assert_eq!(history, vec![first.clone()]);

        // Appending after a torn line still produces a readable log.
        let second = store
            .append(new_record(&id, Version::new(0, 1, 1), 2), Some(first.id))
            .await
            .unwrap();
        drop(store);
        let reopened = FileRecordStore::open(&path).await.unwrap();
        assert_eq!(
            reopened.find_latest(&id).await.unwrap().unwrap().id,
            second.id
        );
    }

    async fn fail_next_write(store: &FileRecordStore, fault: WriteFault) {
        store.log.lock().await.fault = Some(fault);
    }

    async fn failed_append_leaves_no_trace(fault: WriteFault) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("records.jsonl");
        let id = identity("vault");

        let (first, acked) = {
            let store = FileRecordStore::open(&path).await.unwrap();
            let first = store
                .append(new_record(&id, Version::BASELINE, 1), None)
                .await
                .unwrap();
            let len = std::fs::metadata(&path).unwrap().len();

            fail_next_write(&store, fault).await;
            let err = store
                .append(new_record(&id, Version::new(0, 1, 1), 2), Some(first.id))
                .await
                .unwrap_err();
            assert!(matches!(err, RecordStoreError::Io(_)));
            assert_eq!(std::fs::metadata(&path).unwrap().len(), len);
            assert_eq!(store.find_latest(&id).await.unwrap().unwrap().id, first.id);

            let acked = store
                .append(new_record(&id, Version::new(0, 1, 1), 3), Some(first.id))
                .await
                .unwrap();
            (first, acked)
        };

        let reopened = FileRecordStore::open(&path).await.unwrap();
        let history = reopened.find_all(&id, SortOrder::Ascending).await.unwrap();
        assert_eq!(history, vec![first, acked.clone()]);
        assert_eq!(reopened.find_latest(&id).await.unwrap().unwrap(), acked);
        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), 2);
    }

    #[tokio::test]
    async fn failed_sync_does_not_shadow_the_next_append() {
        failed_append_leaves_no_trace(WriteFault::Sync).await;
    }

    #[tokio::test]
    async fn torn_write_does_not_corrupt_the_next_append() {
        failed_append_leaves_no_trace(WriteFault::Torn).await;
    }

    #[tokio::test]
    async fn unrecoverable_log_refuses_appends() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileRecordStore::open(dir.path().join("r.jsonl")).await.unwrap();
        store.log.lock().await.broken = true;

        let err = store
            .append(new_record(&identity("vault"), Version::BASELINE, 1), None)
            .await
            .unwrap_err();
        assert!(matches!(err, RecordStoreError::Unavailable(_)));
        assert!(store.find_all(&identity("vault"), SortOrder::Ascending).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn open_creates_missing_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/deeper/records.jsonl");
        let store = FileRecordStore::open(&path).await.unwrap();
        assert_eq!(store.path(), path.as_path());
        assert!(path.exists());
    }
}

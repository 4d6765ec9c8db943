use async_trait::async_trait;
use cvr_types::{DeploymentRecord, Identity, NewDeploymentRecord, Owner, RecordId};

use crate::error::RecordResult;
use crate::query::{Page, Paginated, RepositorySummary, SortOrder};

/// Append-only store of deployment records keyed by [`Identity`].
///
/// Records for one identity are totally ordered by `(deployed_at, seq)`;
/// `seq` is assigned at append time in insertion order, so timestamp ties
/// resolve to insertion order.
#[async_trait]
pub trait DeploymentRecordStore: Send + Sync {
    /// Most recent record for `identity`, if any.
    async fn find_latest(&self, identity: &Identity) -> RecordResult<Option<DeploymentRecord>>;

    /// Full history for `identity` in the requested order.
    async fn find_all(
        &self,
        identity: &Identity,
        order: SortOrder,
    ) -> RecordResult<Vec<DeploymentRecord>>;

    /// Records across all of `owner`'s repositories.
    async fn find_by_owner(
        &self,
        owner: &Owner,
        page: Page,
        order: SortOrder,
    ) -> RecordResult<Paginated<DeploymentRecord>>;

    /// Append a record.
    ///
    /// `expected_previous` is the id of the head the caller based its
    /// decision on (`None` for a first deployment). The append fails with
    /// `HeadMismatch` if the head has moved, and with `UniqueViolation` if
    /// the version already exists for the identity. `deployed_at` is
    /// raised to the previous record's timestamp when the clock went
    /// backwards.
    async fn append(
        &self,
        record: NewDeploymentRecord,
        expected_previous: Option<RecordId>,
    ) -> RecordResult<DeploymentRecord>;

    /// Per-repository summaries for `owner`, sorted by repository name.
    async fn aggregate_by_owner(&self, owner: &Owner) -> RecordResult<Vec<RepositorySummary>>;

    /// Resolve a record by storage id.
    async fn get(&self, id: &RecordId) -> RecordResult<Option<DeploymentRecord>>;
}

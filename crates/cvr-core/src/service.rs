use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use chrono::Utc;
use cvr_ledger::{DeploymentRecordStore, Page, Paginated, RepositorySummary, SortOrder};
use cvr_types::{
    ContentHash, DeploymentRecord, FieldError, Fingerprint, Identity, NewDeploymentRecord, Owner,
    RecordId, Version, VersionStats,
};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::change::{AnnotatedRecord, ChangeDetector};
use crate::config::ServiceConfig;
use crate::error::{DeployError, DeployResult};
use crate::strategy::PayloadStrategy;

/// A submission as received from a client. Fields are unvalidated.
#[derive(Clone, Debug)]
pub struct DeploymentRequest {
    pub owner: String,
    pub repository_name: String,
    pub payload: Value,
}

/// Result of an accepted deployment.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DeploymentOutcome {
    pub record: DeploymentRecord,
    /// Always `true`: unchanged submissions are rejected with
    /// [`DeployError::NoOp`].
    pub changed: bool,
}

impl DeploymentOutcome {
    pub fn content_hash(&self) -> Option<ContentHash> {
        self.record.fingerprint.content_hash()
    }
}

/// Owner-wide listing: one page of records plus a summary per repository.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct OwnerListing {
    pub records: Paginated<AnnotatedRecord>,
    pub repositories: Vec<RepositorySummary>,
}

/// Assigns versions to deployments and answers history queries.
///
/// The service holds no state of its own; concurrent deployments to the
/// same identity are arbitrated by the record store's append guards, and a
/// lost race is re-run from the latest-record read.
pub struct DeploymentService {
    records: Arc<dyn DeploymentRecordStore>,
    strategy: PayloadStrategy,
    config: ServiceConfig,
}

impl DeploymentService {
    pub fn new(
        records: Arc<dyn DeploymentRecordStore>,
        strategy: PayloadStrategy,
        config: ServiceConfig,
    ) -> Self {
        Self {
            records,
            strategy,
            config,
        }
    }

    pub fn strategy(&self) -> &PayloadStrategy {
        &self.strategy
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    /// Record a deployment if its payload differs from the identity's
    /// latest one.
    ///
    /// Returns [`DeployError::NoOp`] when nothing changed. In
    /// content-addressed mode the payload is stored before the comparison
    /// and stays stored even if the deployment is then rejected.
    pub async fn deploy(&self, request: DeploymentRequest) -> DeployResult<DeploymentOutcome> {
        let identity = validate_request(&request)?;
        let mut candidate: Option<Fingerprint> = None;
        let mut attempt: u32 = 0;

        loop {
            match self
                .try_deploy(&identity, &request.payload, &mut candidate)
                .await
            {
                Err(DeployError::VersionConflict(reason))
                    if attempt < self.config.conflict_retries =>
                {
                    attempt += 1;
                    warn!(
                        owner = %identity.owner,
                        repository = %identity.repository_name,
                        attempt,
                        reason = %reason,
                        "deployment lost a race; retrying"
                    );
                }
                result => return result,
            }
        }
    }

    async fn try_deploy(
        &self,
        identity: &Identity,
        payload: &Value,
        candidate: &mut Option<Fingerprint>,
    ) -> DeployResult<DeploymentOutcome> {
        let previous = self.bounded(self.records.find_latest(identity)).await?;

        let fingerprint = match candidate {
            Some(fingerprint) => fingerprint.clone(),
            None => {
                let fingerprint = self.fingerprint(payload).await?;
                *candidate = Some(fingerprint.clone());
                fingerprint
            }
        };

        let previous_fingerprint = previous.as_ref().map(|r| &r.fingerprint);
        if !ChangeDetector::changed(previous_fingerprint, Some(&fingerprint)) {
            info!(
                owner = %identity.owner,
                repository = %identity.repository_name,
                "payload unchanged; deployment rejected"
            );
            return Err(DeployError::NoOp);
        }

        let version = Version::next(
            previous.as_ref().map(|r| &r.version),
            self.config.default_bump,
        )
        .map_err(|e| DeployError::Persistence(e.to_string()))?;

        let new = NewDeploymentRecord {
            identity: identity.clone(),
            version,
            fingerprint,
            deployed_at: Utc::now(),
        };
        let expected_previous = previous.as_ref().map(|r| r.id);

        let record = match tokio::time::timeout(
            self.config.io_timeout,
            self.records.append(new, expected_previous),
        )
        .await
        {
            Ok(result) => result.map_err(DeployError::from_append)?,
            Err(_) => return Err(self.timed_out()),
        };

        info!(
            owner = %identity.owner,
            repository = %identity.repository_name,
            version = %record.version,
            id = %record.id,
            content_hash = ?record.fingerprint.content_hash().map(|h| h.to_hex()),
            "deployment recorded"
        );
        Ok(DeploymentOutcome {
            record,
            changed: true,
        })
    }

    /// Fingerprint a payload per the configured strategy. Content-addressed
    /// payloads are stored (and pinned, when enabled) here.
    async fn fingerprint(&self, payload: &Value) -> DeployResult<Fingerprint> {
        let Some(store) = self.strategy.payload_store() else {
            return Ok(Fingerprint::Embedded(payload.clone()));
        };

        let hash = self.bounded(store.store(payload)).await?;
        debug!(content_hash = %hash, "payload stored");

        if self.config.pin_payloads {
            match tokio::time::timeout(self.config.io_timeout, store.pin(&hash)).await {
                Ok(Ok(true)) => debug!(content_hash = %hash, "payload pinned"),
                Ok(Ok(false)) => warn!(content_hash = %hash, "pin target unknown to payload store"),
                Ok(Err(e)) => warn!(content_hash = %hash, error = %e, "failed to pin payload"),
                Err(_) => warn!(content_hash = %hash, "pinning payload timed out"),
            }
        }
        Ok(Fingerprint::ContentAddressed(hash))
    }

    /// Records of every repository of `owner`, paginated in chronological
    /// order. With `annotate`, each record carries its pairwise change flag
    /// relative to its predecessor in the same repository.
    pub async fn list_by_owner(
        &self,
        owner: &str,
        page: Page,
        order: SortOrder,
        annotate: bool,
    ) -> DeployResult<OwnerListing> {
        let owner = parse_owner(owner)?;
        let records = self
            .bounded(self.records.find_by_owner(&owner, page, order))
            .await?;

        let flags = if annotate {
            self.change_flags(&records.items).await?
        } else {
            HashMap::new()
        };
        let records = records.map(|record| AnnotatedRecord {
            changed: flags.get(&record.id).copied(),
            payload: None,
            record,
        });

        let repositories = self
            .bounded(self.records.aggregate_by_owner(&owner))
            .await?;
        Ok(OwnerListing {
            records,
            repositories,
        })
    }

    async fn change_flags(
        &self,
        records: &[DeploymentRecord],
    ) -> DeployResult<HashMap<RecordId, bool>> {
        let mut identities: Vec<&Identity> = Vec::new();
        for record in records {
            if !identities.contains(&&record.identity) {
                identities.push(&record.identity);
            }
        }

        let mut flags = HashMap::with_capacity(records.len());
        for identity in identities {
            let history = self
                .bounded(self.records.find_all(identity, SortOrder::Ascending))
                .await?;
            flags.extend(ChangeDetector::annotate_by_id(&history));
        }
        Ok(flags)
    }

    /// History of one repository, newest first, each record annotated.
    ///
    /// An identity with no records is [`DeployError::NotFound`]. With
    /// `include_payload`, content-addressed payloads are fetched from the
    /// payload store; a payload the store no longer has is left out.
    pub async fn list_by_repository(
        &self,
        owner: &str,
        repository_name: &str,
        page: Page,
        include_payload: bool,
    ) -> DeployResult<Paginated<AnnotatedRecord>> {
        let identity = Identity::validate(owner, repository_name).map_err(DeployError::Validation)?;
        let history = self
            .bounded(self.records.find_all(&identity, SortOrder::Ascending))
            .await?;
        if history.is_empty() {
            return Err(DeployError::NotFound(format!("no deployments for {identity}")));
        }

        let flags = ChangeDetector::annotate(&history);
        let mut entries: Vec<AnnotatedRecord> = history
            .into_iter()
            .zip(flags)
            .map(|(record, changed)| AnnotatedRecord {
                record,
                changed: Some(changed),
                payload: None,
            })
            .collect();
        entries.reverse();

        let mut page = page.apply(entries);
        if include_payload {
            for entry in &mut page.items {
                entry.payload = self.resolve_payload(&entry.record.fingerprint).await?;
            }
        }
        Ok(page)
    }

    async fn resolve_payload(&self, fingerprint: &Fingerprint) -> DeployResult<Option<Value>> {
        match fingerprint {
            Fingerprint::Embedded(value) => Ok(Some(value.clone())),
            Fingerprint::ContentAddressed(hash) => {
                let Some(store) = self.strategy.payload_store() else {
                    return Ok(None);
                };
                match self.bounded(store.fetch(hash)).await {
                    Ok(value) => Ok(Some(value)),
                    Err(DeployError::NotFound(_)) => {
                        warn!(content_hash = %hash, "payload referenced by record is missing");
                        Ok(None)
                    }
                    Err(e) => Err(e),
                }
            }
        }
    }

    /// Per-repository summaries for `owner`, sorted by repository name.
    pub async fn repository_summaries(&self, owner: &str) -> DeployResult<Vec<RepositorySummary>> {
        let owner = parse_owner(owner)?;
        self.bounded(self.records.aggregate_by_owner(&owner)).await
    }

    /// Version statistics over one repository's history. An unknown
    /// repository yields zero-valued statistics.
    pub async fn repository_stats(
        &self,
        owner: &str,
        repository_name: &str,
    ) -> DeployResult<VersionStats> {
        let identity = Identity::validate(owner, repository_name).map_err(DeployError::Validation)?;
        let history = self
            .bounded(self.records.find_all(&identity, SortOrder::Ascending))
            .await?;
        Ok(VersionStats::from_versions(history.into_iter().map(|r| r.version)))
    }

    /// Resolve a record by its storage identifier.
    pub async fn get_record(&self, id: &str) -> DeployResult<DeploymentRecord> {
        let id = RecordId::parse(id).map_err(|e| DeployError::invalid("id", e.to_string()))?;
        self.bounded(self.records.get(&id))
            .await?
            .ok_or_else(|| DeployError::NotFound(format!("deployment {id}")))
    }

    /// Fetch a payload from the content-addressed store.
    pub async fn fetch_payload(&self, hash: &str) -> DeployResult<(ContentHash, Value)> {
        let Some(store) = self.strategy.payload_store() else {
            return Err(DeployError::NotFound(
                "payloads are embedded in deployment records".into(),
            ));
        };
        let hash =
            ContentHash::from_hex(hash).map_err(|e| DeployError::invalid("hash", e.to_string()))?;
        let payload = self.bounded(store.fetch(&hash)).await?;
        Ok((hash, payload))
    }

    /// Run a store call under the I/O timeout.
    async fn bounded<T, E>(&self, call: impl Future<Output = Result<T, E>>) -> DeployResult<T>
    where
        DeployError: From<E>,
    {
        match tokio::time::timeout(self.config.io_timeout, call).await {
            Ok(result) => result.map_err(DeployError::from),
            Err(_) => Err(self.timed_out()),
        }
    }

    fn timed_out(&self) -> DeployError {
        DeployError::StorageUnavailable(format!(
            "store did not respond within {:?}",
            self.config.io_timeout
        ))
    }
}

fn parse_owner(owner: &str) -> DeployResult<Owner> {
    Owner::parse(owner).map_err(|e| DeployError::invalid("owner", e.to_string()))
}

fn validate_request(request: &DeploymentRequest) -> DeployResult<Identity> {
    let identity = Identity::validate(&request.owner, &request.repository_name);
    let payload_error = request
        .payload
        .is_null()
        .then(|| FieldError::new("payload", "must be present"));

    match (identity, payload_error) {
        (Ok(identity), None) => Ok(identity),
        (Ok(_), Some(payload)) => Err(DeployError::Validation(vec![payload])),
        (Err(mut fields), payload) => {
            fields.extend(payload);
            Err(DeployError::Validation(fields))
        }
    }
}

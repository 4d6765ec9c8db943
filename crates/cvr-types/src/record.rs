use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::TypeError;
use crate::fingerprint::{canonical_json, ContentHash, Fingerprint};
use crate::identity::Identity;
use crate::version::Version;

/// Storage identifier of a deployment record (UUID v7, time-ordered).
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(Uuid);

impl RecordId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }

    pub fn parse(s: &str) -> Result<Self, TypeError> {
        Uuid::parse_str(s.trim())
            .map(Self)
            .map_err(|e| TypeError::InvalidRecordId(e.to_string()))
    }
}

impl Default for RecordId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RecordId({})", self.0)
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for RecordId {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// A record the service has decided to append. The store assigns the id,
/// sequence number and integrity hash.
#[derive(Clone, Debug, PartialEq)]
pub struct NewDeploymentRecord {
    pub identity: Identity,
    pub version: Version,
    pub fingerprint: Fingerprint,
    pub deployed_at: DateTime<Utc>,
}

/// One immutable entry in a repository's deployment history.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DeploymentRecord {
    pub id: RecordId,
    pub identity: Identity,
    /// 1-based position within the identity's history; breaks
    /// `deployed_at` ties.
    pub seq: u64,
    pub version: Version,
    pub fingerprint: Fingerprint,
    pub deployed_at: DateTime<Utc>,
    /// Hash over every other field, see [`DeploymentRecord::canonical_content`].
    pub record_hash: ContentHash,
}

impl DeploymentRecord {
    /// Canonical JSON of all fields except `record_hash`.
    pub fn canonical_content(&self) -> String {
        let content = serde_json::json!({
            "id": self.id,
            "identity": self.identity,
            "seq": self.seq,
            "version": self.version,
            "fingerprint": self.fingerprint,
            "deployed_at": self.deployed_at.to_rfc3339_opts(chrono::SecondsFormat::Nanos, true),
        });
        canonical_json(&content)
    }
}

use std::collections::HashMap;

use cvr_types::{DeploymentRecord, Fingerprint, RecordId};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Decides whether a submission differs from the identity's latest record.
pub struct ChangeDetector;

impl ChangeDetector {
    /// `true` when `candidate` is a different payload than `previous`.
    ///
    /// | previous | candidate | changed |
    /// |----------|-----------|---------|
    /// | absent   | present   | true    |
    /// | present  | absent    | true    |
    /// | absent   | absent    | false   |
    /// | present  | present   | `!previous.matches(candidate)` |
    ///
    /// Embedded payloads are compared over canonical JSON, so key order is
    /// irrelevant. Fingerprints of different strategies always differ.
    pub fn changed(previous: Option<&Fingerprint>, candidate: Option<&Fingerprint>) -> bool {
        match (previous, candidate) {
            (None, None) => false,
            (Some(previous), Some(candidate)) => !previous.matches(candidate),
            _ => true,
        }
    }

    /// Pairwise flags for a single identity's history in ascending order:
    /// each record against its immediate predecessor.
    pub fn annotate(history: &[DeploymentRecord]) -> Vec<bool> {
        let mut previous: Option<&Fingerprint> = None;
        history
            .iter()
            .map(|record| {
                let changed = Self::changed(previous, Some(&record.fingerprint));
                previous = Some(&record.fingerprint);
                changed
            })
            .collect()
    }

    /// [`ChangeDetector::annotate`] keyed by record id.
    pub fn annotate_by_id(history: &[DeploymentRecord]) -> HashMap<RecordId, bool> {
        history
            .iter()
            .map(|r| r.id)
            .zip(Self::annotate(history))
            .collect()
    }
}

/// A record as returned by listings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AnnotatedRecord {
    #[serde(flatten)]
    pub record: DeploymentRecord,
    /// Pairwise change flag, present when annotation was requested.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub changed: Option<bool>,
    /// The deployed payload, present when requested and retrievable.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
}

impl AnnotatedRecord {
    pub fn plain(record: DeploymentRecord) -> Self {
        Self {
            record,
            changed: None,
            payload: None,
        }
    }
}

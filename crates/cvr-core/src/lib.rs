//! Deployment versioning for the Contract Version Registry.
//!
//! [`DeploymentService`] is the only path by which a deployment record is
//! created. It validates the identity, compares the submitted payload with
//! the identity's latest record through [`ChangeDetector`], assigns the next
//! semantic version and appends the record to a
//! [`DeploymentRecordStore`](cvr_ledger::DeploymentRecordStore). Payloads
//! are either embedded in the record or kept in a content-addressed
//! [`PayloadStore`](cvr_store::PayloadStore), per [`PayloadStrategy`].

pub mod change;
pub mod config;
pub mod error;
pub mod service;
pub mod strategy;

pub use change::{AnnotatedRecord, ChangeDetector};
pub use config::ServiceConfig;
pub use error::{DeployError, DeployResult};
pub use service::{DeploymentOutcome, DeploymentRequest, DeploymentService, OwnerListing};
pub use strategy::{PayloadStrategy, StrategyKind};

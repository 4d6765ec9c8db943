//! Foundation types for the Contract Version Registry (CVR).
//!
//! This crate provides the identity, version, and record types used
//! throughout CVR. Every other CVR crate depends on `cvr-types`.
//!
//! # Key Types
//!
//! - [`Identity`]: `(owner, repository)` key that scopes deployment history
//! - [`Version`]: `MAJOR.MINOR.PATCH` with numeric ordering and bump rules
//! - [`VersionStats`]: aggregate view over a set of version strings
//! - [`Fingerprint`]: embedded payload or content hash used for change detection
//! - [`ContentHash`]: BLAKE3 hash of a canonicalised payload
//! - [`DeploymentRecord`]: one immutable entry of a repository's history

pub mod error;
pub mod fingerprint;
pub mod identity;
pub mod record;
pub mod version;

pub use error::{FieldError, TypeError};
pub use fingerprint::{canonical_json, ContentHash, Fingerprint};
pub use identity::{Identity, Owner, RepositoryName};
pub use record::{DeploymentRecord, NewDeploymentRecord, RecordId};
pub use version::{Bump, Version, VersionStats};

//! Append-only deployment record log for the Contract Version Registry.
//!
//! This crate provides:
//! - The [`DeploymentRecordStore`] trait boundary consumed by the service
//! - Query types: [`SortOrder`], [`Page`], [`Paginated`], [`RepositorySummary`]
//! - [`InMemoryRecordStore`] for tests and embedding
//! - [`FileRecordStore`], a JSON-lines log replayed into memory on open
//!
//! Every backend enforces the two write guards that keep per-identity
//! version order strict under concurrent writers: a uniqueness constraint on
//! `(identity, version)` and compare-and-append against the expected head.

pub mod error;
pub mod file;
pub mod memory;
pub mod query;
mod state;
pub mod traits;

pub use error::{RecordResult, RecordStoreError};
pub use file::FileRecordStore;
pub use memory::InMemoryRecordStore;
pub use query::{Page, Paginated, RepositorySummary, SortOrder};
pub use traits::DeploymentRecordStore;

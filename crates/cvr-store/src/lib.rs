//! Content-addressed payload storage for the Contract Version Registry.
//!
//! Contract payloads are stored as immutable objects keyed by the BLAKE3
//! hash of their canonical JSON form (domain-separated, see
//! [`ContentHasher`]). Two payloads that differ only in object key order
//! hash to the same [`ContentHash`](cvr_types::ContentHash).
//!
//! # Storage Backends
//!
//! All backends implement the [`PayloadStore`] trait:
//!
//! - [`InMemoryPayloadStore`] -- `HashMap`-based store for tests and embedding
//! - [`FsPayloadStore`] -- fan-out directory of objects on local disk
//!
//! # Design Rules
//!
//! 1. Objects are immutable once written; writing existing content is a no-op.
//! 2. Write-then-link: bytes land in a temp file and are renamed into place.
//! 3. Reads verify the hash of what they return.
//! 4. Pinning is advisory and never required for a read to succeed.

pub mod error;
pub mod fs;
pub mod hasher;
pub mod memory;
pub mod traits;

pub use error::{PayloadResult, PayloadStoreError};
pub use fs::FsPayloadStore;
pub use hasher::ContentHasher;
pub use memory::InMemoryPayloadStore;
pub use traits::PayloadStore;

//! Storage backends for Bookshelf.
//!
//! Each actor in the system owns exactly one backend: a record store actor
//! owns a [`RecordBackend`] for its owner, and the catalog index actor owns
//! the single [`IndexBackend`]. Because the owning actor serializes every
//! call, backends are plain `&mut self` state machines with no locking.
//!
//! # Backends
//!
//! - [`InMemoryRecordBackend`] / [`InMemoryIndexBackend`] -- ephemeral, for
//!   tests and throwaway deployments
//! - [`FileRecordBackend`] / [`FileIndexBackend`] -- JSON snapshots under a
//!   data directory
//!
//! A [`BackendFactory`] decides which kind the actor registry opens.

pub mod error;
pub mod file;
pub mod memory;
pub mod traits;

pub use error::{StoreError, StoreResult};
pub use file::{FileBackendFactory, FileIndexBackend, FileRecordBackend};
pub use memory::{InMemoryIndexBackend, InMemoryRecordBackend, MemoryBackendFactory};
pub use traits::{BackendFactory, IndexBackend, RecordBackend};

//! Actors for Bookshelf.
//!
//! Two kinds of actor cooperate to serve the catalog:
//!
//! - a **record store** per owner, the system of record for that owner's
//!   books and the sole authority over its id sequence;
//! - a single **catalog index** holding a denormalized copy of every book
//!   for cross-owner listing.
//!
//! Each actor is a Tokio task draining a bounded mailbox. Requests carry a
//! `oneshot` reply channel, so every operation is a request/response pair
//! addressed by an [`InstanceId`](bookshelf_types::InstanceId).
//!
//! The record store writes locally first and then updates the index. Index
//! failures are logged and swallowed: the index may lag behind the record
//! stores, but it never holds a book that no record store wrote.

pub mod error;
pub mod index;
pub mod record;
pub mod system;

pub use error::{ActorError, ActorResult, ErrorKind};
pub use index::{CatalogIndexHandle, IndexCommand, IndexSink};
pub use record::{RecordCommand, RecordStoreHandle, ResetSummary};
pub use system::{ActorConfig, ActorSystem};

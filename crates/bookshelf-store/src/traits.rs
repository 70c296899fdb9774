//! Backend traits for the two kinds of storage the actors own.
//!
//! A [`RecordBackend`] holds one owner's books and sequence counter. An
//! [`IndexBackend`] holds the denormalized copy of every book. Both are
//! driven by a single actor task, so implementations need not coordinate
//! concurrent writers themselves; they only need to be `Send`.

use bookshelf_types::{Book, BookId, InstanceId, OwnerId};

use crate::error::StoreResult;

/// Storage for a single owner's books plus its id sequence.
///
/// Invariants every implementation must uphold:
/// - `books()` returns entries sorted ascending by `book_id`.
/// - `append` and `reset` are all-or-nothing. When they return an error the
///   visible state (sequence and books) is exactly what it was before.
pub trait RecordBackend: Send {
    /// The last assigned book id, or 0 if none has been assigned.
    fn sequence(&self) -> StoreResult<BookId>;

    /// All books, sorted ascending by id.
    fn books(&self) -> StoreResult<Vec<Book>>;

    /// Store `book` and advance the sequence to its id in one write.
    fn append(&mut self, book: &Book) -> StoreResult<()>;

    /// Delete every book and set the sequence back to 0 in one write.
    /// Returns how many books were removed.
    fn reset(&mut self) -> StoreResult<usize>;

    /// Whether the data outlives this backend value. Idle actors may only
    /// drop a backend that is durable or empty.
    fn is_durable(&self) -> bool {
        false
    }
}

/// Storage for the global catalog index.
///
/// Entries are keyed by `(owner_id, book_id)`. Re-inserting an existing key
/// replaces the stored book but keeps its original insertion position.
/// Mutations are all-or-nothing like those of [`RecordBackend`].
pub trait IndexBackend: Send {
    /// Insert or overwrite the entry for `(book.owner_id, book.book_id)`.
    fn upsert(&mut self, book: &Book) -> StoreResult<()>;

    /// Every indexed book in first-insertion order.
    fn entries(&self) -> StoreResult<Vec<Book>>;

    /// Remove every entry owned by `owner`. Returns how many were removed.
    fn remove_owner(&mut self, owner: &str) -> StoreResult<usize>;
}

/// Opens backends for actor instances.
///
/// The actor registry calls this once per instance when it is first
/// spawned; the returned backend is then owned by that actor.
pub trait BackendFactory: Send + Sync {
    /// Open (or create) the record backend for one owner.
    fn open_records(
        &self,
        instance: &InstanceId,
        owner: &OwnerId,
    ) -> StoreResult<Box<dyn RecordBackend>>;

    /// Open (or create) the catalog index backend.
    fn open_index(&self) -> StoreResult<Box<dyn IndexBackend>>;

    /// Whether `instance` has persisted records that a fresh record backend
    /// would load. Backends without persistence always answer `false`.
    fn has_records(&self, instance: &InstanceId) -> StoreResult<bool>;
}

//! In-memory backends for tests and ephemeral deployments.
//!
//! Data lives as long as the owning actor. Nothing is written to disk.

use std::collections::{BTreeMap, HashMap};

use bookshelf_types::{Book, BookId, InstanceId, OwnerId};

use crate::error::StoreResult;
use crate::traits::{BackendFactory, IndexBackend, RecordBackend};

/// `BTreeMap`-backed record store for one owner.
#[derive(Debug, Default, Clone)]
pub struct InMemoryRecordBackend {
    sequence: BookId,
    books: BTreeMap<BookId, Book>,
}

impl InMemoryRecordBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a store from a persisted sequence and book list.
    pub(crate) fn from_parts(sequence: BookId, books: Vec<Book>) -> Self {
        Self {
            sequence,
            books: books.into_iter().map(|b| (b.book_id, b)).collect(),
        }
    }

    /// Number of books currently stored.
    pub fn len(&self) -> usize {
        self.books.len()
    }

    /// Returns `true` if no books are stored.
    pub fn is_empty(&self) -> bool {
        self.books.is_empty()
    }
}

impl RecordBackend for InMemoryRecordBackend {
    fn sequence(&self) -> StoreResult<BookId> {
        Ok(self.sequence)
    }

    fn books(&self) -> StoreResult<Vec<Book>> {
        Ok(self.books.values().cloned().collect())
    }

    fn append(&mut self, book: &Book) -> StoreResult<()> {
        self.sequence = book.book_id;
        self.books.insert(book.book_id, book.clone());
        Ok(())
    }

    fn reset(&mut self) -> StoreResult<usize> {
        let removed = self.books.len();
        self.books.clear();
        self.sequence = 0;
        Ok(removed)
    }
}

/// In-memory catalog index that remembers first-insertion order.
#[derive(Debug, Default, Clone)]
pub struct InMemoryIndexBackend {
    next_slot: u64,
    slots: HashMap<(String, BookId), u64>,
    entries: BTreeMap<u64, Book>,
}

impl InMemoryIndexBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an index with books in the given order.
    pub(crate) fn from_books(books: Vec<Book>) -> Self {
        let mut index = Self::new();
        for book in &books {
            index.insert(book);
        }
        index
    }

    /// Number of indexed books.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the index is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn insert(&mut self, book: &Book) {
        let key = (book.owner_id.as_str().to_owned(), book.book_id);
        let slot = match self.slots.get(&key) {
            Some(slot) => *slot,
            None => {
                let slot = self.next_slot;
                self.next_slot += 1;
                self.slots.insert(key, slot);
                slot
            }
        };
        self.entries.insert(slot, book.clone());
    }
}

impl IndexBackend for InMemoryIndexBackend {
    fn upsert(&mut self, book: &Book) -> StoreResult<()> {
        self.insert(book);
        Ok(())
    }

    fn entries(&self) -> StoreResult<Vec<Book>> {
        Ok(self.entries.values().cloned().collect())
    }

    fn remove_owner(&mut self, owner: &str) -> StoreResult<usize> {
        let before = self.entries.len();
        self.slots.retain(|(o, _), _| o != owner);
        self.entries.retain(|_, book| book.owner_id.as_str() != owner);
        Ok(before - self.entries.len())
    }
}

/// Hands out fresh in-memory backends.
#[derive(Debug, Default, Clone, Copy)]
pub struct MemoryBackendFactory;

impl BackendFactory for MemoryBackendFactory {
    fn open_records(
        &self,
        _instance: &InstanceId,
        _owner: &OwnerId,
    ) -> StoreResult<Box<dyn RecordBackend>> {
        Ok(Box::new(InMemoryRecordBackend::new()))
    }

    fn open_index(&self) -> StoreResult<Box<dyn IndexBackend>> {
        Ok(Box::new(InMemoryIndexBackend::new()))
    }

    fn has_records(&self, _instance: &InstanceId) -> StoreResult<bool> {
        Ok(false)
    }
}

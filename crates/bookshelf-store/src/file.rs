//! JSON snapshot backends rooted in a data directory.
//!
//! Layout:
//!
//! ```text
//! <root>/records/<instance-hex>.json   one file per owner
//! <root>/index.json                    the catalog index
//! ```
//!
//! Each mutation is applied to a copy of the in-memory state, written as a
//! whole snapshot through a `.tmp` sibling that is fsynced and renamed over
//! the live file, and only then swapped in. A failed write leaves both the
//! file and the in-memory state as they were.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use bookshelf_types::{Book, BookId, InstanceId, OwnerId};

use crate::error::{StoreError, StoreResult};
use crate::memory::{InMemoryIndexBackend, InMemoryRecordBackend};
use crate::traits::{BackendFactory, IndexBackend, RecordBackend};

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RecordSnapshot {
    owner_id: OwnerId,
    sequence: BookId,
    books: Vec<Book>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct IndexSnapshot {
    books: Vec<Book>,
}

/// Record backend that mirrors an in-memory store to a JSON file.
#[derive(Debug)]
pub struct FileRecordBackend {
    path: PathBuf,
    owner: OwnerId,
    inner: InMemoryRecordBackend,
}

impl FileRecordBackend {
    /// Open the snapshot at `path`, starting empty if it does not exist.
    pub fn open(path: impl Into<PathBuf>, owner: OwnerId) -> StoreResult<Self> {
        let path = path.into();
        let inner = match read_snapshot::<RecordSnapshot>(&path)? {
            Some(snapshot) => {
                if snapshot.owner_id != owner {
                    return Err(StoreError::Corrupt {
                        path,
                        reason: format!(
                            "snapshot belongs to {}, expected {}",
                            snapshot.owner_id, owner
                        ),
                    });
                }
                debug!(path = %path.display(), books = snapshot.books.len(), "loaded record snapshot");
                InMemoryRecordBackend::from_parts(snapshot.sequence, snapshot.books)
            }
            None => InMemoryRecordBackend::new(),
        };
        Ok(Self { path, owner, inner })
    }

    /// Write `staged` to disk and adopt it. `self.inner` is untouched on error.
    fn commit(&mut self, staged: InMemoryRecordBackend) -> StoreResult<()> {
        let snapshot = RecordSnapshot {
            owner_id: self.owner.clone(),
            sequence: staged.sequence()?,
            books: staged.books()?,
        };
        write_snapshot(&self.path, &snapshot)?;
        self.inner = staged;
        Ok(())
    }
}

impl RecordBackend for FileRecordBackend {
    fn sequence(&self) -> StoreResult<BookId> {
        self.inner.sequence()
    }

    fn books(&self) -> StoreResult<Vec<Book>> {
        self.inner.books()
    }

    fn append(&mut self, book: &Book) -> StoreResult<()> {
        let mut staged = self.inner.clone();
        staged.append(book)?;
        self.commit(staged)
    }

    fn reset(&mut self) -> StoreResult<usize> {
        let mut staged = self.inner.clone();
        let removed = staged.reset()?;
        self.commit(staged)?;
        Ok(removed)
    }

    fn is_durable(&self) -> bool {
        true
    }
}

/// Catalog index backend that mirrors an in-memory index to a JSON file.
#[derive(Debug)]
pub struct FileIndexBackend {
    path: PathBuf,
    inner: InMemoryIndexBackend,
}

impl FileIndexBackend {
    /// Open the snapshot at `path`, starting empty if it does not exist.
    pub fn open(path: impl Into<PathBuf>) -> StoreResult<Self> {
        let path = path.into();
        let snapshot = read_snapshot::<IndexSnapshot>(&path)?.unwrap_or_default();
        debug!(path = %path.display(), books = snapshot.books.len(), "loaded index snapshot");
        Ok(Self {
            path,
            inner: InMemoryIndexBackend::from_books(snapshot.books),
        })
    }

    fn commit(&mut self, staged: InMemoryIndexBackend) -> StoreResult<()> {
        let snapshot = IndexSnapshot {
            books: staged.entries()?,
        };
        write_snapshot(&self.path, &snapshot)?;
        self.inner = staged;
        Ok(())
    }
}

impl IndexBackend for FileIndexBackend {
    fn upsert(&mut self, book: &Book) -> StoreResult<()> {
        let mut staged = self.inner.clone();
        staged.upsert(book)?;
        self.commit(staged)
    }

    fn entries(&self) -> StoreResult<Vec<Book>> {
        self.inner.entries()
    }

    fn remove_owner(&mut self, owner: &str) -> StoreResult<usize> {
        let mut staged = self.inner.clone();
        let removed = staged.remove_owner(owner)?;
        if removed > 0 {
            self.commit(staged)?;
        }
        Ok(removed)
    }
}

/// Opens file-backed stores under a root directory.
#[derive(Debug, Clone)]
pub struct FileBackendFactory {
    root: PathBuf,
}

impl FileBackendFactory {
    /// Create the factory, making sure the directory layout exists.
    pub fn new(root: impl Into<PathBuf>) -> StoreResult<Self> {
        let root = root.into();
        fs::create_dir_all(root.join("records"))?;
        Ok(Self { root })
    }

    /// Snapshot path for a record store instance.
    pub fn records_path(&self, instance: &InstanceId) -> PathBuf {
        self.root
            .join("records")
            .join(format!("{}.json", instance.to_hex()))
    }

    /// Snapshot path for the catalog index.
    pub fn index_path(&self) -> PathBuf {
        self.root.join("index.json")
    }
}

impl BackendFactory for FileBackendFactory {
    fn open_records(
        &self,
        instance: &InstanceId,
        owner: &OwnerId,
    ) -> StoreResult<Box<dyn RecordBackend>> {
        let backend = FileRecordBackend::open(self.records_path(instance), owner.clone())?;
        Ok(Box::new(backend))
    }

    fn open_index(&self) -> StoreResult<Box<dyn IndexBackend>> {
        Ok(Box::new(FileIndexBackend::open(self.index_path())?))
    }

    fn has_records(&self, instance: &InstanceId) -> StoreResult<bool> {
        Ok(self.records_path(instance).try_exists()?)
    }
}

fn read_snapshot<T: for<'de> Deserialize<'de>>(path: &Path) -> StoreResult<Option<T>> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    serde_json::from_slice(&bytes)
        .map(Some)
        .map_err(|e| StoreError::Corrupt {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
}

fn write_snapshot<T: Serialize>(path: &Path, value: &T) -> StoreResult<()> {
    let payload = serde_json::to_vec_pretty(value)?;
    let tmp_path = path.with_extension("json.tmp");
    let mut file = fs::File::create(&tmp_path)?;
    file.write_all(&payload)?;
    file.sync_all()?;
    fs::rename(&tmp_path, path)?;
    Ok(())
}

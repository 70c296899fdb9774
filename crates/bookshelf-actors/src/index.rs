//! The catalog index actor.
//!
//! A single instance holds a denormalized copy of every book across owners.
//! It is a cache for the "all books" listing and never the system of record:
//! record stores push books into it after their own write commits.

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info};

use bookshelf_store::IndexBackend;
use bookshelf_types::{Book, InstanceId};

use crate::error::{ActorError, ActorResult};

const ACTOR: &str = "catalog index";

/// Where a record store sends its index updates.
///
/// [`CatalogIndexHandle`] is the in-process implementation; any transport
/// that honours the same request/response contract can stand in.
#[async_trait]
pub trait IndexSink: Send + Sync {
    /// Insert or overwrite the entry for `(book.owner_id, book.book_id)`.
    async fn add(&self, book: Book) -> ActorResult<()>;

    /// Remove every entry for `owner`. Returns how many were removed.
    async fn purge_owner(&self, owner: &str) -> ActorResult<usize>;
}

/// Messages accepted by the catalog index mailbox.
#[derive(Debug)]
pub enum IndexCommand {
    Add {
        book: Book,
        reply: oneshot::Sender<ActorResult<()>>,
    },
    List {
        reply: oneshot::Sender<ActorResult<Vec<Book>>>,
    },
    PurgeOwner {
        owner: String,
        reply: oneshot::Sender<ActorResult<usize>>,
    },
}

/// Actor state: the index backend.
struct CatalogIndex {
    backend: Box<dyn IndexBackend>,
}

impl CatalogIndex {
    fn add(&mut self, book: &Book) -> ActorResult<()> {
        if book.owner_id.as_str().is_empty() {
            return Err(ActorError::InvalidArgument("book has no owner".into()));
        }
        if book.book_id == 0 {
            return Err(ActorError::InvalidArgument("book has no id".into()));
        }
        self.backend.upsert(book)?;
        Ok(())
    }

    fn list(&self) -> ActorResult<Vec<Book>> {
        let mut books = self.backend.entries()?;
        // stable: equal ids keep first-insertion order
        books.sort_by_key(|b| b.book_id);
        Ok(books)
    }

    fn purge_owner(&mut self, owner: &str) -> ActorResult<usize> {
        if owner.is_empty() {
            return Err(ActorError::InvalidArgument("missing owner".into()));
        }
        Ok(self.backend.remove_owner(owner)?)
    }

    async fn run(mut self, mut rx: mpsc::Receiver<IndexCommand>) {
        while let Some(command) = rx.recv().await {
            match command {
                IndexCommand::Add { book, reply } => {
                    debug!(owner = %book.owner_id, book_id = book.book_id, "index add");
                    let _ = reply.send(self.add(&book));
                }
                IndexCommand::List { reply } => {
                    let _ = reply.send(self.list());
                }
                IndexCommand::PurgeOwner { owner, reply } => {
                    let result = self.purge_owner(&owner);
                    if let Ok(removed) = &result {
                        debug!(owner = %owner, removed, "index purge");
                    }
                    let _ = reply.send(result);
                }
            }
        }
        debug!("catalog index mailbox closed");
    }
}

/// Cloneable address of the running catalog index.
#[derive(Clone, Debug)]
pub struct CatalogIndexHandle {
    instance: InstanceId,
    tx: mpsc::Sender<IndexCommand>,
}

impl CatalogIndexHandle {
    /// Spawn the catalog index actor on the current Tokio runtime.
    pub fn spawn(backend: Box<dyn IndexBackend>, mailbox_capacity: usize) -> Self {
        let (tx, rx) = mpsc::channel(mailbox_capacity.max(1));
        let instance = InstanceId::catalog_index();
        tokio::spawn(CatalogIndex { backend }.run(rx));
        info!(instance = %instance.short_id(), "spawned catalog index");
        Self { instance, tx }
    }

    pub fn instance(&self) -> InstanceId {
        self.instance
    }

    /// Every indexed book, sorted by id with insertion-order tie-break.
    pub async fn list(&self) -> ActorResult<Vec<Book>> {
        self.request(|reply| IndexCommand::List { reply }).await
    }

    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<ActorResult<T>>) -> IndexCommand,
    ) -> ActorResult<T> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(make(reply))
            .await
            .map_err(|_| ActorError::MailboxClosed(ACTOR))?;
        rx.await.map_err(|_| ActorError::ReplyDropped(ACTOR))?
    }
}

#[async_trait]
impl IndexSink for CatalogIndexHandle {
    async fn add(&self, book: Book) -> ActorResult<()> {
        self.request(|reply| IndexCommand::Add { book, reply }).await
    }

    async fn purge_owner(&self, owner: &str) -> ActorResult<usize> {
        let owner = owner.to_owned();
        self.request(|reply| IndexCommand::PurgeOwner { owner, reply })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bookshelf_store::InMemoryIndexBackend;
    use bookshelf_types::{NewBook, OwnerId};

    fn book(owner: &str, id: u64, name: &str) -> Book {
        Book::new(
            id,
            NewBook::new(name, "Anon").unwrap(),
            OwnerId::parse(owner).unwrap(),
        )
    }

    fn spawn_index() -> CatalogIndexHandle {
        CatalogIndexHandle::spawn(Box::new(InMemoryIndexBackend::new()), 8)
    }

    #[tokio::test]
    async fn list_sorts_by_id_with_insertion_tie_break() {
        let index = spawn_index();
        index.add(book("jane@y", 2, "jane-2")).await.unwrap();
        index.add(book("pete@x", 1, "pete-1")).await.unwrap();
        index.add(book("jane@y", 1, "jane-1")).await.unwrap();

        let names: Vec<_> = index.list().await.unwrap().into_iter().map(|b| b.name).collect();
        assert_eq!(names, vec!["pete-1", "jane-1", "jane-2"]);
    }

    #[tokio::test]
    async fn add_is_idempotent_per_owner_and_id() {
        let index = spawn_index();
        index.add(book("pete@x", 1, "a")).await.unwrap();
        index.add(book("pete@x", 1, "a")).await.unwrap();
        assert_eq!(index.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn add_rejects_zero_id() {
        let index = spawn_index();
        let err = index.add(book("pete@x", 0, "a")).await.unwrap_err();
        assert!(matches!(err, ActorError::InvalidArgument(_)));
        assert!(index.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn purge_owner_removes_only_that_owner() {
        let index = spawn_index();
        index.add(book("pete@x", 1, "p")).await.unwrap();
        index.add(book("jane@y", 1, "j")).await.unwrap();

        assert_eq!(index.purge_owner("pete@x").await.unwrap(), 1);
        assert_eq!(index.purge_owner("pete@x").await.unwrap(), 0);

        let books = index.list().await.unwrap();
        assert_eq!(books.len(), 1);
        assert_eq!(books[0].owner_id.as_str(), "jane@y");
    }

    #[tokio::test]
    async fn purge_requires_owner() {
        let index = spawn_index();
        let err = index.purge_owner("").await.unwrap_err();
        assert!(matches!(err, ActorError::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn handle_reports_well_known_instance() {
        let index = spawn_index();
        assert_eq!(index.instance(), InstanceId::catalog_index());
    }
}

//! The per-owner record store actor.
//!
//! One instance exists per owner. Its mailbox is the serialization boundary
//! for that owner: commands are handled strictly one at a time, so the
//! read-increment-write of the id sequence can never interleave with another
//! add or a reset for the same owner. Different owners run in parallel.
//!
//! With an idle timeout configured, a store whose data would survive being
//! dropped (durable backend, or nothing stored yet) stops after that long
//! without commands. Its handle then reports [`RecordStoreHandle::is_closed`]
//! and the registry opens a fresh one on the next request.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use bookshelf_store::RecordBackend;
use bookshelf_types::{Book, InstanceId, NewBook, OwnerId};

use crate::error::{ActorError, ActorResult};
use crate::index::IndexSink;

const ACTOR: &str = "record store";

/// Outcome of a reset.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResetSummary {
    /// Number of books removed from the owner's record store.
    pub deleted: usize,
}

/// Messages accepted by a record store mailbox.
#[derive(Debug)]
pub enum RecordCommand {
    List {
        reply: oneshot::Sender<ActorResult<Vec<Book>>>,
    },
    Add {
        payload: Value,
        reply: oneshot::Sender<ActorResult<Book>>,
    },
    Reset {
        reply: oneshot::Sender<ActorResult<ResetSummary>>,
    },
}

struct RecordStore {
    owner: OwnerId,
    backend: Box<dyn RecordBackend>,
    index: Arc<dyn IndexSink>,
    idle_timeout: Option<Duration>,
}

impl RecordStore {
    fn list(&self) -> ActorResult<Vec<Book>> {
        Ok(self.backend.books()?)
    }

    async fn add(&mut self, payload: &Value) -> ActorResult<Book> {
        let details = NewBook::from_json(payload)?;

        let next = self.backend.sequence()? + 1;
        let book = Book::new(next, details, self.owner.clone());
        // one write: a failure leaves the sequence where it was
        self.backend.append(&book)?;

        // The local write is committed; index failures only cost visibility
        // in the global listing.
        if let Err(e) = self.index.add(book.clone()).await {
            warn!(owner = %self.owner, book_id = next, error = %e, "catalog index add failed");
        }
        Ok(book)
    }

    async fn reset(&mut self) -> ActorResult<ResetSummary> {
        // the index is only purged once the local reset is durable
        let deleted = self.backend.reset()?;

        if let Err(e) = self.index.purge_owner(self.owner.as_str()).await {
            warn!(owner = %self.owner, error = %e, "catalog index purge failed");
        }
        Ok(ResetSummary { deleted })
    }

    /// Dropping this store loses nothing.
    fn can_stop(&self) -> bool {
        self.backend.is_durable() || matches!(self.backend.sequence(), Ok(0))
    }

    async fn handle(&mut self, command: RecordCommand) {
        match command {
            RecordCommand::List { reply } => {
                let _ = reply.send(self.list());
            }
            RecordCommand::Add { payload, reply } => {
                let result = self.add(&payload).await;
                if let Ok(book) = &result {
                    debug!(owner = %self.owner, book_id = book.book_id, "book added");
                }
                let _ = reply.send(result);
            }
            RecordCommand::Reset { reply } => {
                let result = self.reset().await;
                if let Ok(summary) = &result {
                    debug!(owner = %self.owner, deleted = summary.deleted, "records reset");
                }
                let _ = reply.send(result);
            }
        }
    }

    async fn run(mut self, mut rx: mpsc::Receiver<RecordCommand>) {
        loop {
            let next = match self.idle_timeout {
                Some(idle) => match tokio::time::timeout(idle, rx.recv()).await {
                    Ok(next) => next,
                    Err(_) if self.can_stop() => {
                        debug!(owner = %self.owner, "record store idle, stopping");
                        break;
                    }
                    Err(_) => continue,
                },
                None => rx.recv().await,
            };
            match next {
                Some(command) => self.handle(command).await,
                None => break,
            }
        }
        // serve whatever was queued before the close; later sends fail fast
        rx.close();
        while let Ok(command) = rx.try_recv() {
            self.handle(command).await;
        }
        debug!(owner = %self.owner, "record store mailbox closed");
    }
}

/// Cloneable address of one owner's record store.
#[derive(Clone, Debug)]
pub struct RecordStoreHandle {
    owner: OwnerId,
    instance: InstanceId,
    tx: mpsc::Sender<RecordCommand>,
}

impl RecordStoreHandle {
    /// Spawn a record store actor for `owner` on the current Tokio runtime.
    pub fn spawn(
        owner: OwnerId,
        backend: Box<dyn RecordBackend>,
        index: Arc<dyn IndexSink>,
        mailbox_capacity: usize,
        idle_timeout: Option<Duration>,
    ) -> Self {
        let (tx, rx) = mpsc::channel(mailbox_capacity.max(1));
        let instance = InstanceId::for_owner(&owner);
        let store = RecordStore {
            owner: owner.clone(),
            backend,
            index,
            idle_timeout,
        };
        tokio::spawn(store.run(rx));
        info!(owner = %owner, instance = %instance.short_id(), "spawned record store");
        Self { owner, instance, tx }
    }

    pub fn owner(&self) -> &OwnerId {
        &self.owner
    }

    pub fn instance(&self) -> InstanceId {
        self.instance
    }

    /// Whether the actor has stopped and will accept no more commands.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    /// The owner's books, sorted ascending by id.
    pub async fn list(&self) -> ActorResult<Vec<Book>> {
        self.request(|reply| RecordCommand::List { reply }).await
    }

    /// Add a book from a JSON payload carrying `name` and `author`.
    ///
    /// Fails with [`ActorError::InvalidArgument`] when either field is
    /// missing or empty; nothing is persisted in that case.
    pub async fn add(&self, payload: Value) -> ActorResult<Book> {
        self.request(|reply| RecordCommand::Add { payload, reply })
            .await
    }

    /// Delete every book and restart the id sequence.
    pub async fn reset(&self) -> ActorResult<ResetSummary> {
        self.request(|reply| RecordCommand::Reset { reply }).await
    }

    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<ActorResult<T>>) -> RecordCommand,
    ) -> ActorResult<T> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(make(reply))
            .await
            .map_err(|_| ActorError::MailboxClosed(ACTOR))?;
        rx.await.map_err(|_| ActorError::ReplyDropped(ACTOR))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    use async_trait::async_trait;
    use bookshelf_store::{InMemoryIndexBackend, InMemoryRecordBackend, StoreError, StoreResult};
    use serde_json::json;

    use crate::index::CatalogIndexHandle;

    struct FailingIndex;

    #[async_trait]
    impl IndexSink for FailingIndex {
        async fn add(&self, _book: Book) -> ActorResult<()> {
            Err(ActorError::MailboxClosed("catalog index"))
        }

        async fn purge_owner(&self, _owner: &str) -> ActorResult<usize> {
            Err(ActorError::MailboxClosed("catalog index"))
        }
    }

    /// In-memory backend whose writes fail while `broken` is set.
    struct FlakyBackend {
        inner: InMemoryRecordBackend,
        broken: Arc<AtomicBool>,
    }

    impl FlakyBackend {
        fn check(&self) -> StoreResult<()> {
            if self.broken.load(Ordering::SeqCst) {
                return Err(StoreError::Io(std::io::Error::other("disk full")));
            }
            Ok(())
        }
    }

    impl RecordBackend for FlakyBackend {
        fn sequence(&self) -> StoreResult<u64> {
            self.inner.sequence()
        }

        fn books(&self) -> StoreResult<Vec<Book>> {
            self.inner.books()
        }

        fn append(&mut self, book: &Book) -> StoreResult<()> {
            self.check()?;
            self.inner.append(book)
        }

        fn reset(&mut self) -> StoreResult<usize> {
            self.check()?;
            self.inner.reset()
        }

        fn is_durable(&self) -> bool {
            true
        }
    }

    fn owner(raw: &str) -> OwnerId {
        OwnerId::parse(raw).unwrap()
    }

    fn spawn_pair(raw: &str) -> (RecordStoreHandle, CatalogIndexHandle) {
        let index = CatalogIndexHandle::spawn(Box::new(InMemoryIndexBackend::new()), 8);
        let store = RecordStoreHandle::spawn(
            owner(raw),
            Box::new(InMemoryRecordBackend::new()),
            Arc::new(index.clone()),
            8,
            None,
        );
        (store, index)
    }

    #[tokio::test]
    async fn add_assigns_first_id_and_owner() {
        let (store, _index) = spawn_pair("pete@x");
        let book = store
            .add(json!({"name": "Wind in the Willows", "author": "K. Graeme"}))
            .await
            .unwrap();
        assert_eq!(book.book_id, 1);
        assert_eq!(book.name, "Wind in the Willows");
        assert_eq!(book.author, "K. Graeme");
        assert_eq!(book.owner_id.as_str(), "pete@x");
    }

    #[tokio::test]
    async fn ids_increase_without_gaps() {
        let (store, _index) = spawn_pair("pete@x");
        for expected in 1..=5u64 {
            let book = store
                .add(json!({"name": format!("b{expected}"), "author": "a"}))
                .await
                .unwrap();
            assert_eq!(book.book_id, expected);
        }
        let ids: Vec<_> = store.list().await.unwrap().iter().map(|b| b.book_id).collect();
        assert_eq!(ids, vec![1, 2, 3, 4, 5]);
    }

    #[tokio::test]
    async fn concurrent_adds_never_share_an_id() {
        let (store, _index) = spawn_pair("pete@x");
        let mut tasks = Vec::new();
        for i in 0..50 {
            let store = store.clone();
            tasks.push(tokio::spawn(async move {
                store
                    .add(json!({"name": format!("book {i}"), "author": "a"}))
                    .await
                    .unwrap()
                    .book_id
            }));
        }
        let mut ids = Vec::new();
        for task in tasks {
            ids.push(task.await.unwrap());
        }
        ids.sort_unstable();
        assert_eq!(ids, (1..=50).collect::<Vec<u64>>());
        assert_eq!(store.list().await.unwrap().len(), 50);
    }

    #[tokio::test]
    async fn invalid_payload_persists_nothing() {
        let (store, index) = spawn_pair("pete@x");
        let err = store.add(json!({"name": "No author"})).await.unwrap_err();
        assert!(matches!(err, ActorError::InvalidArgument(_)));
        let err = store.add(Value::Null).await.unwrap_err();
        assert!(matches!(err, ActorError::InvalidArgument(_)));

        assert!(store.list().await.unwrap().is_empty());
        assert!(index.list().await.unwrap().is_empty());

        // the failed attempts did not consume ids
        let book = store.add(json!({"name": "n", "author": "a"})).await.unwrap();
        assert_eq!(book.book_id, 1);
    }

    #[tokio::test]
    async fn add_pushes_copy_to_index() {
        let (store, index) = spawn_pair("pete@x");
        let book = store.add(json!({"name": "n", "author": "a"})).await.unwrap();
        assert_eq!(index.list().await.unwrap(), vec![book]);
    }

    #[tokio::test]
    async fn reset_clears_store_index_and_sequence() {
        let (store, index) = spawn_pair("pete@x");
        store.add(json!({"name": "a", "author": "a"})).await.unwrap();
        store.add(json!({"name": "b", "author": "b"})).await.unwrap();

        let summary = store.reset().await.unwrap();
        assert_eq!(summary, ResetSummary { deleted: 2 });
        assert!(store.list().await.unwrap().is_empty());
        assert!(index.list().await.unwrap().is_empty());

        let book = store.add(json!({"name": "c", "author": "c"})).await.unwrap();
        assert_eq!(book.book_id, 1);
    }

    #[tokio::test]
    async fn reset_of_empty_store_reports_zero() {
        let (store, _index) = spawn_pair("pete@x");
        assert_eq!(store.reset().await.unwrap().deleted, 0);
    }

    #[tokio::test]
    async fn index_failure_does_not_fail_add_or_reset() {
        let store = RecordStoreHandle::spawn(
            owner("pete@x"),
            Box::new(InMemoryRecordBackend::new()),
            Arc::new(FailingIndex),
            8,
            None,
        );
        let book = store.add(json!({"name": "n", "author": "a"})).await.unwrap();
        assert_eq!(book.book_id, 1);
        assert_eq!(store.list().await.unwrap(), vec![book]);

        let summary = store.reset().await.unwrap();
        assert_eq!(summary.deleted, 1);
        assert!(store.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn failed_writes_leave_store_and_index_untouched() {
        let broken = Arc::new(AtomicBool::new(false));
        let index = CatalogIndexHandle::spawn(Box::new(InMemoryIndexBackend::new()), 8);
        let store = RecordStoreHandle::spawn(
            owner("pete@x"),
            Box::new(FlakyBackend {
                inner: InMemoryRecordBackend::new(),
                broken: broken.clone(),
            }),
            Arc::new(index.clone()),
            8,
            None,
        );
        let first = store.add(json!({"name": "a", "author": "a"})).await.unwrap();

        broken.store(true, Ordering::SeqCst);
        let err = store.add(json!({"name": "b", "author": "b"})).await.unwrap_err();
        assert!(matches!(err, ActorError::Store(_)));
        assert!(store.reset().await.is_err());
        assert_eq!(store.list().await.unwrap(), vec![first.clone()]);
        assert_eq!(index.list().await.unwrap(), vec![first]);

        broken.store(false, Ordering::SeqCst);
        let second = store.add(json!({"name": "b", "author": "b"})).await.unwrap();
        assert_eq!(second.book_id, 2);
    }

    #[tokio::test]
    async fn idle_store_stops_only_when_nothing_is_lost() {
        let index: Arc<dyn IndexSink> = Arc::new(CatalogIndexHandle::spawn(
            Box::new(InMemoryIndexBackend::new()),
            8,
        ));
        let idle = Some(Duration::from_millis(20));
        let empty = RecordStoreHandle::spawn(
            owner("empty@x"),
            Box::new(InMemoryRecordBackend::new()),
            index.clone(),
            8,
            idle,
        );
        let holding = RecordStoreHandle::spawn(
            owner("holding@x"),
            Box::new(InMemoryRecordBackend::new()),
            index,
            8,
            idle,
        );
        holding.add(json!({"name": "n", "author": "a"})).await.unwrap();

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(empty.is_closed());
        assert!(matches!(
            empty.list().await,
            Err(ActorError::MailboxClosed(_))
        ));
        assert!(!holding.is_closed());
        assert_eq!(holding.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn handle_exposes_owner_and_instance() {
        let (store, _index) = spawn_pair("pete@x");
        assert_eq!(store.owner().as_str(), "pete@x");
        assert_eq!(store.instance(), InstanceId::from_name("pete@x"));
    }
}

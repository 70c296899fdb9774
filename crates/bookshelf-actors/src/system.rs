//! The actor registry.
//!
//! Record stores are opened on demand and addressed by [`InstanceId`]. Reads
//! and resets for an owner with no live store and no persisted records are
//! answered without opening one, so looking up arbitrary owners does not grow
//! the registry. Stores that went idle are replaced on their next use.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use serde_json::Value;
use tracing::{debug, warn};

use bookshelf_store::{BackendFactory, MemoryBackendFactory};
use bookshelf_types::{Book, InstanceId, OwnerId};

use crate::error::{ActorError, ActorResult};
use crate::index::{CatalogIndexHandle, IndexSink};
use crate::record::{RecordStoreHandle, ResetSummary};

/// Tuning for spawned actors.
#[derive(Clone, Debug)]
pub struct ActorConfig {
    /// Capacity of every actor mailbox.
    pub mailbox_capacity: usize,
    /// How long a record store may sit without commands before it stops.
    /// `None` keeps stores alive for the life of the system.
    pub idle_timeout: Option<Duration>,
}

impl Default for ActorConfig {
    fn default() -> Self {
        Self {
            mailbox_capacity: 64,
            idle_timeout: Some(Duration::from_secs(300)),
        }
    }
}

/// Registry of live actors.
///
/// Owns the catalog index and lazily spawns one record store per owner,
/// keyed by [`InstanceId`]. While a store is running, resolving the same
/// owner twice yields a handle to the same actor.
///
/// Must be created from within a Tokio runtime because it spawns tasks.
pub struct ActorSystem {
    factory: Arc<dyn BackendFactory>,
    config: ActorConfig,
    index: CatalogIndexHandle,
    stores: RwLock<HashMap<InstanceId, RecordStoreHandle>>,
}

impl std::fmt::Debug for ActorSystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActorSystem")
            .field("config", &self.config)
            .field("index", &self.index.instance())
            .field("stores", &self.live_stores())
            .finish()
    }
}

impl ActorSystem {
    /// Open the catalog index through `factory` and start it.
    pub fn new(factory: Arc<dyn BackendFactory>, config: ActorConfig) -> ActorResult<Self> {
        let index = CatalogIndexHandle::spawn(factory.open_index()?, config.mailbox_capacity);
        Ok(Self {
            factory,
            config,
            index,
            stores: RwLock::new(HashMap::new()),
        })
    }

    /// A system whose actors keep everything in memory.
    pub fn in_memory() -> ActorResult<Self> {
        Self::new(Arc::new(MemoryBackendFactory), ActorConfig::default())
    }

    pub fn config(&self) -> &ActorConfig {
        &self.config
    }

    /// The singleton catalog index.
    pub fn catalog_index(&self) -> &CatalogIndexHandle {
        &self.index
    }

    /// Resolve the record store for `owner`, spawning it if none is running.
    pub fn record_store(&self, owner: &OwnerId) -> ActorResult<RecordStoreHandle> {
        let instance = InstanceId::for_owner(owner);
        if let Some(handle) = self.running(&instance)? {
            return Ok(handle);
        }

        let mut stores = self.stores.write().map_err(|_| ActorError::LockPoisoned)?;
        // another request may have spawned it between the two locks
        if let Some(handle) = stores.get(&instance).filter(|h| !h.is_closed()) {
            return Ok(handle.clone());
        }
        stores.retain(|_, handle| !handle.is_closed());

        debug!(owner = %owner, instance = %instance.short_id(), "opening record backend");
        let backend = self.factory.open_records(&instance, owner)?;
        let handle = RecordStoreHandle::spawn(
            owner.clone(),
            backend,
            Arc::new(self.index.clone()),
            self.config.mailbox_capacity,
            self.config.idle_timeout,
        );
        stores.insert(instance, handle.clone());
        Ok(handle)
    }

    /// The owner's books. Owners with nothing stored get an empty list
    /// without a store being opened.
    pub async fn list_books(&self, owner: &OwnerId) -> ActorResult<Vec<Book>> {
        if !self.has_data(owner)? {
            return Ok(Vec::new());
        }
        self.with_store(owner, |store| async move { store.list().await })
            .await
    }

    /// Add a book for `owner` from a JSON payload.
    pub async fn add_book(&self, owner: &OwnerId, payload: Value) -> ActorResult<Book> {
        self.with_store(owner, |store| {
            let payload = payload.clone();
            async move { store.add(payload).await }
        })
        .await
    }

    /// Reset `owner`'s records. Owners with nothing stored only get their
    /// index entries purged.
    pub async fn reset_owner(&self, owner: &OwnerId) -> ActorResult<ResetSummary> {
        if !self.has_data(owner)? {
            if let Err(e) = self.index.purge_owner(owner.as_str()).await {
                warn!(owner = %owner, error = %e, "catalog index purge failed");
            }
            return Ok(ResetSummary { deleted: 0 });
        }
        self.with_store(owner, |store| async move { store.reset().await })
            .await
    }

    /// Number of record stores currently running.
    pub fn live_stores(&self) -> usize {
        self.stores
            .read()
            .map(|s| s.values().filter(|h| !h.is_closed()).count())
            .unwrap_or(0)
    }

    fn running(&self, instance: &InstanceId) -> ActorResult<Option<RecordStoreHandle>> {
        let stores = self.stores.read().map_err(|_| ActorError::LockPoisoned)?;
        Ok(stores.get(instance).filter(|h| !h.is_closed()).cloned())
    }

    fn has_data(&self, owner: &OwnerId) -> ActorResult<bool> {
        let instance = InstanceId::for_owner(owner);
        Ok(self.running(&instance)?.is_some() || self.factory.has_records(&instance)?)
    }

    /// Run `op` against the owner's store, reopening it once if it stopped
    /// between lookup and send.
    async fn with_store<T, F, Fut>(&self, owner: &OwnerId, op: F) -> ActorResult<T>
    where
        F: Fn(RecordStoreHandle) -> Fut,
        Fut: Future<Output = ActorResult<T>>,
    {
        match op(self.record_store(owner)?).await {
            Err(ActorError::MailboxClosed(_)) => {
                debug!(owner = %owner, "record store stopped, reopening");
                op(self.record_store(owner)?).await
            }
            result => result,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bookshelf_store::FileBackendFactory;
    use serde_json::json;

    fn owner(raw: &str) -> OwnerId {
        OwnerId::parse(raw).unwrap()
    }

    fn file_system(dir: &std::path::Path, idle_timeout: Option<Duration>) -> ActorSystem {
        let factory = Arc::new(FileBackendFactory::new(dir).unwrap());
        let config = ActorConfig {
            idle_timeout,
            ..ActorConfig::default()
        };
        ActorSystem::new(factory, config).unwrap()
    }

    #[tokio::test]
    async fn same_owner_resolves_to_same_instance() {
        let system = ActorSystem::in_memory().unwrap();
        let a = system.record_store(&owner("pete@x")).unwrap();
        a.add(json!({"name": "n", "author": "a"})).await.unwrap();

        let b = system.record_store(&owner("pete@x")).unwrap();
        assert_eq!(a.instance(), b.instance());
        assert_eq!(b.list().await.unwrap().len(), 1);
        assert_eq!(system.live_stores(), 1);
    }

    #[tokio::test]
    async fn owners_are_isolated() {
        let system = ActorSystem::in_memory().unwrap();
        let pete = system.record_store(&owner("pete@x")).unwrap();
        let jane = system.record_store(&owner("jane@y")).unwrap();

        let p = pete.add(json!({"name": "I, Robot", "author": "Isaac Asimov"})).await.unwrap();
        let j = jane.add(json!({"name": "The Hobbit", "author": "Jrr Tolkein"})).await.unwrap();
        assert_eq!(p.book_id, 1);
        assert_eq!(j.book_id, 1);
        assert_eq!(pete.list().await.unwrap(), vec![p.clone()]);
        assert_eq!(jane.list().await.unwrap(), vec![j.clone()]);

        // tie on id 1: pete was indexed first
        assert_eq!(system.catalog_index().list().await.unwrap(), vec![p, j]);
        assert_eq!(system.live_stores(), 2);
    }

    #[tokio::test]
    async fn reset_only_purges_that_owner_from_index() {
        let system = ActorSystem::in_memory().unwrap();
        system
            .add_book(&owner("pete@x"), json!({"name": "Moby Dick", "author": "Herman Melville"}))
            .await
            .unwrap();
        let j = system
            .add_book(&owner("jane@y"), json!({"name": "The Hobbit", "author": "Jrr Tolkein"}))
            .await
            .unwrap();

        assert_eq!(system.reset_owner(&owner("pete@x")).await.unwrap().deleted, 1);
        assert!(system.list_books(&owner("pete@x")).await.unwrap().is_empty());
        assert_eq!(system.catalog_index().list().await.unwrap(), vec![j]);
    }

    #[tokio::test]
    async fn reads_of_unknown_owners_open_nothing() {
        let system = ActorSystem::in_memory().unwrap();
        for i in 0..100 {
            let stranger = owner(&format!("stranger{i}@x"));
            assert!(system.list_books(&stranger).await.unwrap().is_empty());
            assert_eq!(system.reset_owner(&stranger).await.unwrap().deleted, 0);
        }
        assert_eq!(system.live_stores(), 0);
    }

    #[tokio::test]
    async fn idle_stores_are_dropped_and_reopened() {
        let dir = tempfile::tempdir().unwrap();
        let system = file_system(dir.path(), Some(Duration::from_millis(20)));
        let pete = owner("pete@x");
        system.add_book(&pete, json!({"name": "a", "author": "a"})).await.unwrap();
        assert_eq!(system.live_stores(), 1);

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(system.live_stores(), 0);

        // the stopped store is reopened from disk
        assert_eq!(system.list_books(&pete).await.unwrap().len(), 1);
        let next = system.add_book(&pete, json!({"name": "b", "author": "b"})).await.unwrap();
        assert_eq!(next.book_id, 2);
        assert_eq!(system.live_stores(), 1);
    }

    #[tokio::test]
    async fn stale_handle_is_replaced() {
        let dir = tempfile::tempdir().unwrap();
        let system = file_system(dir.path(), Some(Duration::from_millis(20)));
        let stale = system.record_store(&owner("pete@x")).unwrap();
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(stale.is_closed());

        let fresh = system.record_store(&owner("pete@x")).unwrap();
        assert!(!fresh.is_closed());
        assert_eq!(fresh.instance(), stale.instance());
    }

    #[tokio::test]
    async fn file_backed_system_survives_restart() {
        let dir = tempfile::tempdir().unwrap();
        {
            let system = file_system(dir.path(), None);
            let pete = system.record_store(&owner("pete@x")).unwrap();
            pete.add(json!({"name": "a", "author": "a"})).await.unwrap();
            pete.add(json!({"name": "b", "author": "b"})).await.unwrap();
        }

        let system = file_system(dir.path(), None);
        assert_eq!(system.list_books(&owner("pete@x")).await.unwrap().len(), 2);
        assert_eq!(system.catalog_index().list().await.unwrap().len(), 2);

        let next = system
            .add_book(&owner("pete@x"), json!({"name": "c", "author": "c"}))
            .await
            .unwrap();
        assert_eq!(next.book_id, 3);
    }
}

//! Remote document store
//!
//! Published stories live on a shared server, one collection per entity
//! type, keyed by entity id. `RemoteStore` picks the backend;
//! `RemoteAdapter<D>` does CRUD for one entity type on top of it.
//!
//! Every call is async. Writes propagate failures as `Transport` errors.
//! `retrieve` logs read failures and returns nothing so offline browsing
//! keeps working; `try_retrieve` reports them.

pub mod document;
pub mod http;
pub mod memory;

use std::marker::PhantomData;
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::Config;
use crate::criteria::{Match, SearchCriteria};
use crate::models::{Chapter, Choice, Media, Story};
use crate::storage::{StoreError, StoreResult};

pub use document::Document;
pub use http::HttpDocumentStore;
pub use memory::MemoryDocumentStore;

/// The configured remote backend
#[derive(Debug)]
pub enum RemoteStore {
    Http(HttpDocumentStore),
    Memory(MemoryDocumentStore),
    /// No server configured; every call fails
    Disabled,
}

impl RemoteStore {
    /// Backend for a configuration: HTTP when a server is set, else disabled
    pub fn from_config(config: &Config) -> StoreResult<Self> {
        match config.server_url {
            Some(ref url) => Ok(Self::Http(HttpDocumentStore::new(
                url,
                &config.server_index,
                config.request_timeout(),
            )?)),
            None => Ok(Self::Disabled),
        }
    }

    pub fn memory() -> Self {
        Self::Memory(MemoryDocumentStore::new())
    }

    pub fn is_enabled(&self) -> bool {
        !matches!(self, Self::Disabled)
    }

    /// The in-process backend, if that is what this is
    pub fn as_memory(&self) -> Option<&MemoryDocumentStore> {
        match self {
            Self::Memory(store) => Some(store),
            _ => None,
        }
    }

    fn disabled() -> StoreError {
        StoreError::Transport("no publishing server configured".to_string())
    }

    pub async fn put(&self, collection: &str, id: Uuid, document: &Value) -> StoreResult<()> {
        match self {
            Self::Http(store) => store.put(collection, id, document).await,
            Self::Memory(store) => store.put(collection, id, document).await,
            Self::Disabled => Err(Self::disabled()),
        }
    }

    pub async fn get(&self, collection: &str, id: Uuid) -> StoreResult<Option<Value>> {
        match self {
            Self::Http(store) => store.get(collection, id).await,
            Self::Memory(store) => store.get(collection, id).await,
            Self::Disabled => Err(Self::disabled()),
        }
    }

    pub async fn delete(&self, collection: &str, id: Uuid) -> StoreResult<bool> {
        match self {
            Self::Http(store) => store.delete(collection, id).await,
            Self::Memory(store) => store.delete(collection, id).await,
            Self::Disabled => Err(Self::disabled()),
        }
    }

    pub async fn search(
        &self,
        collection: &str,
        criteria: &SearchCriteria,
    ) -> StoreResult<Vec<Value>> {
        match self {
            Self::Http(store) => store.search(collection, criteria).await,
            Self::Memory(store) => store.search(collection, criteria).await,
            Self::Disabled => Err(Self::disabled()),
        }
    }
}

/// CRUD for one entity type against its remote collection
pub struct RemoteAdapter<D> {
    store: Arc<RemoteStore>,
    _document: PhantomData<fn() -> D>,
}

impl<D> Clone for RemoteAdapter<D> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            _document: PhantomData,
        }
    }
}

impl<D: Document> RemoteAdapter<D> {
    pub fn new(store: Arc<RemoteStore>) -> Self {
        Self {
            store,
            _document: PhantomData,
        }
    }

    pub async fn get(&self, id: Uuid) -> StoreResult<Option<D>> {
        self.store
            .get(D::COLLECTION, id)
            .await?
            .map(D::from_document)
            .transpose()
    }

    /// Fails with `DuplicateKey` if the id is already published
    pub async fn insert(&self, entity: &D) -> StoreResult<()> {
        let document = entity.to_document()?;
        if self.store.get(D::COLLECTION, entity.id()).await?.is_some() {
            return Err(StoreError::DuplicateKey {
                kind: D::KIND,
                id: entity.id(),
            });
        }
        self.store.put(D::COLLECTION, entity.id(), &document).await
    }

    /// Fails with `NotFound` if the id is not published
    pub async fn update(&self, entity: &D) -> StoreResult<()> {
        let document = entity.to_document()?;
        if self.store.get(D::COLLECTION, entity.id()).await?.is_none() {
            return Err(StoreError::NotFound {
                kind: D::KIND,
                id: entity.id(),
            });
        }
        self.store.put(D::COLLECTION, entity.id(), &document).await
    }

    pub async fn upsert(&self, entity: &D) -> StoreResult<()> {
        let document = entity.to_document()?;
        self.store.put(D::COLLECTION, entity.id(), &document).await?;
        debug!("Published {} {}", D::KIND, entity.id());
        Ok(())
    }

    /// Fails with `NotFound` if the id is not published
    pub async fn remove(&self, id: Uuid) -> StoreResult<()> {
        if !self.store.delete(D::COLLECTION, id).await? {
            return Err(StoreError::NotFound { kind: D::KIND, id });
        }
        debug!("Unpublished {} {}", D::KIND, id);
        Ok(())
    }

    /// Matches, or nothing if the server cannot be reached
    pub async fn retrieve(&self, criteria: &SearchCriteria) -> Vec<D> {
        match self.try_retrieve(criteria).await {
            Ok(found) => found,
            Err(e) => {
                warn!("Remote {} search failed: {}", D::KIND, e);
                Vec::new()
            }
        }
    }

    /// Matches, reporting transport failures
    ///
    /// A lone id term is answered with a point lookup.
    pub async fn try_retrieve(&self, criteria: &SearchCriteria) -> StoreResult<Vec<D>> {
        if let Some(id) = lone_id(criteria, D::ID_FIELD) {
            return Ok(self.get(id).await?.into_iter().collect());
        }

        self.store
            .search(D::COLLECTION, criteria)
            .await?
            .into_iter()
            .map(D::from_document)
            .collect()
    }
}

/// Remote adapters for every collection, sharing one store
#[derive(Clone)]
pub struct RemoteTables {
    pub stories: RemoteAdapter<Story>,
    pub chapters: RemoteAdapter<Chapter>,
    pub choices: RemoteAdapter<Choice>,
    pub media: RemoteAdapter<Media>,
    store: Arc<RemoteStore>,
}

impl RemoteTables {
    pub fn new(store: Arc<RemoteStore>) -> Self {
        Self {
            stories: RemoteAdapter::new(Arc::clone(&store)),
            chapters: RemoteAdapter::new(Arc::clone(&store)),
            choices: RemoteAdapter::new(Arc::clone(&store)),
            media: RemoteAdapter::new(Arc::clone(&store)),
            store,
        }
    }

    pub fn store(&self) -> &RemoteStore {
        &self.store
    }
}

fn lone_id(criteria: &SearchCriteria, id_field: &str) -> Option<Uuid> {
    match criteria.terms() {
        [term] if term.field == id_field && term.matching == Match::Exact => {
            Uuid::parse_str(&term.value).ok()
        }
        _ => None,
    }
}

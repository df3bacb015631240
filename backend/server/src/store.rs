//! # Store
//!
//! Document storage shared by every resource.
//!
//! ## Layout
//!
//! - Every record is a JSON document addressed by `(scope, collection, id)`
//! - The scope is the tenant id, so two tenants never share a key
//! - `global` is reserved for cross-tenant indexes such as the login email index
//! - Backends only move strings around, typing happens in [`Repo`]
//!
//! ## Backends
//!
//! - [`crate::database::RedisStore`]: one Redis hash per scope and collection
//! - [`MemoryStore`]: process-local maps, used for development and tests
use std::{
    collections::{BTreeMap, HashMap},
    marker::PhantomData,
};

use async_trait::async_trait;
use serde::{Serialize, de::DeserializeOwned};
use thiserror::Error;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::AppError;

pub const GLOBAL_SCOPE: &str = "global";

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Store backend error: {0}")]
    Backend(String),

    #[error("Corrupt record in {collection}: {source}")]
    Corrupt {
        collection: &'static str,
        source: serde_json::Error,
    },

    #[error("Failed to encode record for {collection}: {source}")]
    Encode {
        collection: &'static str,
        source: serde_json::Error,
    },
}

#[async_trait]
pub trait Store: Send + Sync {
    async fn get(&self, scope: &str, collection: &str, id: &str)
    -> Result<Option<String>, StoreError>;

    async fn list(&self, scope: &str, collection: &str) -> Result<Vec<String>, StoreError>;

    async fn put(
        &self,
        scope: &str,
        collection: &str,
        id: &str,
        value: String,
    ) -> Result<(), StoreError>;

    async fn delete(&self, scope: &str, collection: &str, id: &str) -> Result<bool, StoreError>;
}

/// A document type stored in one collection.
pub trait Record: Serialize + DeserializeOwned + Send + Sync {
    const COLLECTION: &'static str;

    fn id(&self) -> Uuid;
}

/// Typed view over one collection of one scope.
pub struct Repo<'a, T> {
    store: &'a dyn Store,
    scope: String,
    _record: PhantomData<T>,
}

impl<'a, T: Record> Repo<'a, T> {
    pub fn new(store: &'a dyn Store, scope: impl Into<String>) -> Self {
        Self {
            store,
            scope: scope.into(),
            _record: PhantomData,
        }
    }

    pub async fn get(&self, id: Uuid) -> Result<Option<T>, StoreError> {
        self.store
            .get(&self.scope, T::COLLECTION, &id.to_string())
            .await?
            .map(|raw| decode::<T>(&raw))
            .transpose()
    }

    /// Like [`Repo::get`] but a missing record is a 404.
    pub async fn find(&self, id: Uuid) -> Result<T, AppError> {
        self.get(id).await?.ok_or(AppError::NotFound)
    }

    pub async fn list(&self) -> Result<Vec<T>, StoreError> {
        self.store
            .list(&self.scope, T::COLLECTION)
            .await?
            .iter()
            .map(|raw| decode::<T>(raw))
            .collect()
    }

    pub async fn put(&self, record: &T) -> Result<(), StoreError> {
        let raw = serde_json::to_string(record).map_err(|source| StoreError::Encode {
            collection: T::COLLECTION,
            source,
        })?;

        self.store
            .put(&self.scope, T::COLLECTION, &record.id().to_string(), raw)
            .await
    }

    pub async fn delete(&self, id: Uuid) -> Result<bool, StoreError> {
        self.store
            .delete(&self.scope, T::COLLECTION, &id.to_string())
            .await
    }
}

fn decode<T: Record>(raw: &str) -> Result<T, StoreError> {
    serde_json::from_str(raw).map_err(|source| StoreError::Corrupt {
        collection: T::COLLECTION,
        source,
    })
}

type Collection = BTreeMap<String, String>;

#[derive(Default)]
pub struct MemoryStore {
    collections: RwLock<HashMap<(String, String), Collection>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn key(scope: &str, collection: &str) -> (String, String) {
    (scope.to_string(), collection.to_string())
}

#[async_trait]
impl Store for MemoryStore {
    async fn get(
        &self,
        scope: &str,
        collection: &str,
        id: &str,
    ) -> Result<Option<String>, StoreError> {
        let collections = self.collections.read().await;

        Ok(collections
            .get(&key(scope, collection))
            .and_then(|records| records.get(id))
            .cloned())
    }

    async fn list(&self, scope: &str, collection: &str) -> Result<Vec<String>, StoreError> {
        let collections = self.collections.read().await;

        Ok(collections
            .get(&key(scope, collection))
            .map(|records| records.values().cloned().collect())
            .unwrap_or_default())
    }

    async fn put(
        &self,
        scope: &str,
        collection: &str,
        id: &str,
        value: String,
    ) -> Result<(), StoreError> {
        self.collections
            .write()
            .await
            .entry(key(scope, collection))
            .or_default()
            .insert(id.to_string(), value);

        Ok(())
    }

    async fn delete(&self, scope: &str, collection: &str, id: &str) -> Result<bool, StoreError> {
        Ok(self
            .collections
            .write()
            .await
            .get_mut(&key(scope, collection))
            .map(|records| records.remove(id).is_some())
            .unwrap_or(false))
    }
}

use std::sync::Arc;

use tracing::info;

use super::{
    auth::{AuthUser, TokenKeys},
    config::{Config, StoreBackend},
    database::{RedisStore, init_redis},
    store::{GLOBAL_SCOPE, MemoryStore, Record, Repo, Store},
};

pub struct AppState {
    pub config: Config,
    pub store: Arc<dyn Store>,
    pub tokens: TokenKeys,
}

impl AppState {
    pub async fn new(config: Config) -> anyhow::Result<Arc<Self>> {
        let store: Arc<dyn Store> = match config.store_backend {
            StoreBackend::Redis => {
                info!("Connecting to Redis...");
                Arc::new(RedisStore::new(init_redis(&config.redis_url).await?))
            }
            StoreBackend::Memory => {
                info!("Using in-memory store, data is lost on restart");
                Arc::new(MemoryStore::new())
            }
        };

        Ok(Self::with_store(config, store))
    }

    pub fn with_store(config: Config, store: Arc<dyn Store>) -> Arc<Self> {
        let tokens = TokenKeys::new(config.token_secret.as_bytes(), config.token_ttl_hours);

        Arc::new(Self {
            config,
            store,
            tokens,
        })
    }

    /// Repository scoped to the caller's tenant.
    pub fn repo<T: Record>(&self, auth: &AuthUser) -> Repo<'_, T> {
        Repo::new(self.store.as_ref(), auth.scope())
    }

    pub fn tenant_repo<T: Record>(&self, tenant_id: uuid::Uuid) -> Repo<'_, T> {
        Repo::new(self.store.as_ref(), tenant_id.to_string())
    }

    pub fn global_repo<T: Record>(&self) -> Repo<'_, T> {
        Repo::new(self.store.as_ref(), GLOBAL_SCOPE)
    }
}

//! # Redis
//!
//! Persistent backend for [`crate::store::Store`].
//!
//! ## Implementation
//!
//! - One Redis hash per tenant and collection: `gestor:{tenant}:{collection}`
//! - Hash field is the record id, value is the JSON document
//! - O(1) lookups and upserts by id, `HVALS` for listings
//! - Aggregations (dashboard, goals sync) run in the server over the listed records
//! - Tenants are small businesses, a few thousand records per collection at most
use std::time::Duration;

use async_trait::async_trait;
use redis::{
    AsyncCommands, Client, RedisError,
    aio::{ConnectionManager, ConnectionManagerConfig},
};

use crate::store::{Store, StoreError};

const KEY_PREFIX: &str = "gestor";

pub async fn init_redis(redis_url: &str) -> Result<ConnectionManager, RedisError> {
    let config = ConnectionManagerConfig::new()
        .set_number_of_retries(1)
        .set_connection_timeout(Duration::from_millis(500));

    let client = Client::open(redis_url)?;

    client.get_connection_manager_with_config(config).await
}

pub struct RedisStore {
    connection: ConnectionManager,
}

impl RedisStore {
    pub fn new(connection: ConnectionManager) -> Self {
        Self { connection }
    }
}

pub fn hash_key(scope: &str, collection: &str) -> String {
    format!("{KEY_PREFIX}:{scope}:{collection}")
}

impl From<RedisError> for StoreError {
    fn from(error: RedisError) -> Self {
        StoreError::Backend(error.to_string())
    }
}

#[async_trait]
impl Store for RedisStore {
    async fn get(
        &self,
        scope: &str,
        collection: &str,
        id: &str,
    ) -> Result<Option<String>, StoreError> {
        let mut connection = self.connection.clone();

        Ok(connection.hget(hash_key(scope, collection), id).await?)
    }

    async fn list(&self, scope: &str, collection: &str) -> Result<Vec<String>, StoreError> {
        let mut connection = self.connection.clone();

        Ok(connection.hvals(hash_key(scope, collection)).await?)
    }

    async fn put(
        &self,
        scope: &str,
        collection: &str,
        id: &str,
        value: String,
    ) -> Result<(), StoreError> {
        let mut connection = self.connection.clone();

        let _: i64 = connection
            .hset(hash_key(scope, collection), id, value)
            .await?;

        Ok(())
    }

    async fn delete(&self, scope: &str, collection: &str, id: &str) -> Result<bool, StoreError> {
        let mut connection = self.connection.clone();

        let removed: i64 = connection.hdel(hash_key(scope, collection), id).await?;

        Ok(removed > 0)
    }
}

//! Redis hash lock store.

use fred::prelude::*;
use parallel_lock_core::error::{LockError, LockResult};
use parallel_lock_core::traits::LockStore;
use tracing::instrument;

use crate::builder::RedisLockStoreBuilder;

/// Lock store backed by Redis hashes.
///
/// The namespace is the hash key and each subkey is a field whose value is
/// the acquisition timestamp:
///
/// * `set_if_absent` - `HSETNX namespace subkey value`
/// * `delete` - `HDEL namespace subkey`
/// * `exists` - `HEXISTS namespace subkey`
#[derive(Clone)]
pub struct RedisLockStore {
    client: RedisClient,
}

impl RedisLockStore {
    /// Returns a new builder for configuring the store.
    pub fn builder() -> RedisLockStoreBuilder {
        RedisLockStoreBuilder::new()
    }

    /// Connects to the Redis server at `url`.
    pub async fn new(url: impl Into<String>) -> LockResult<Self> {
        Self::builder().url(url).build().await
    }

    /// Uses an existing, already connected client.
    pub fn from_client(client: RedisClient) -> Self {
        Self { client }
    }

    /// Returns the underlying client.
    pub fn client(&self) -> &RedisClient {
        &self.client
    }
}

fn command_error(command: &str, e: RedisError) -> LockError {
    LockError::backend(std::io::Error::other(format!(
        "Redis {} failed: {}",
        command, e
    )))
}

impl LockStore for RedisLockStore {
    #[instrument(skip(self), fields(backend = "redis"))]
    async fn set_if_absent(&self, namespace: &str, subkey: &str, value: u64) -> LockResult<bool> {
        // HSETNX returns 1 if the field was created, 0 if it already existed
        let created: i64 = self
            .client
            .hsetnx(namespace, subkey, value as i64)
            .await
            .map_err(|e| command_error("HSETNX", e))?;
        Ok(created == 1)
    }

    #[instrument(skip(self), fields(backend = "redis"))]
    async fn delete(&self, namespace: &str, subkey: &str) -> LockResult<()> {
        let _: i64 = self
            .client
            .hdel(namespace, subkey)
            .await
            .map_err(|e| command_error("HDEL", e))?;
        Ok(())
    }

    #[instrument(skip(self), fields(backend = "redis"))]
    async fn exists(&self, namespace: &str, subkey: &str) -> LockResult<bool> {
        let present: i64 = self
            .client
            .hexists(namespace, subkey)
            .await
            .map_err(|e| command_error("HEXISTS", e))?;
        Ok(present == 1)
    }
}

//! Redis lock store configuration.

use fred::prelude::*;
use parallel_lock_core::error::{LockError, LockResult};

use crate::store::RedisLockStore;

/// Builder for [`RedisLockStore`].
#[derive(Default)]
pub struct RedisLockStoreBuilder {
    url: Option<String>,
    client: Option<RedisClient>,
}

impl RedisLockStoreBuilder {
    /// Creates a new builder with no connection configured.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the Redis server URL, e.g. `redis://localhost:6379`.
    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// Uses an existing, already connected Redis client.
    ///
    /// Takes precedence over [`url`](Self::url).
    pub fn client(mut self, client: RedisClient) -> Self {
        self.client = Some(client);
        self
    }

    /// Builds the store, connecting to the server if a URL was given.
    pub async fn build(self) -> LockResult<RedisLockStore> {
        if let Some(client) = self.client {
            return Ok(RedisLockStore::from_client(client));
        }

        let Some(url) = self.url else {
            return Err(LockError::connection(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "no Redis client or URL provided",
            )));
        };

        let config = RedisConfig::from_url(&url).map_err(|e| {
            LockError::connection(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("invalid Redis URL: {}", e),
            ))
        })?;

        let client = RedisClient::new(config, None, None, None);
        client.connect();
        client.wait_for_connect().await.map_err(|e| {
            LockError::connection(std::io::Error::other(format!(
                "failed to connect to Redis: {}",
                e
            )))
        })?;

        Ok(RedisLockStore::from_client(client))
    }
}

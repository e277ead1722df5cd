//! Redis-backed result cache. Every failure here is swallowed and logged —
//! the cache is an optimization, never a dependency of the read path.

use std::time::Duration;

use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use tracing::{debug, warn};

use crate::domain::DomainError;
use crate::ports::outbound::CachePort;

pub struct RedisCache {
    manager: ConnectionManager,
}

impl RedisCache {
    pub async fn connect(redis_url: &str) -> Result<Self, DomainError> {
        let client = redis::Client::open(redis_url)
            .map_err(|e| DomainError::Configuration(format!("invalid redis url: {e}")))?;
        let manager = client
            .get_connection_manager()
            .await
            .map_err(|e| DomainError::Cache(e.to_string()))?;
        Ok(Self { manager })
    }
}

#[async_trait::async_trait]
impl CachePort for RedisCache {
    async fn get(&self, key: &str) -> Option<Vec<u8>> {
        let mut conn = self.manager.clone();
        match conn.get::<_, Option<Vec<u8>>>(key).await {
            Ok(value) => value,
            Err(e) => {
                debug!(error = %e, key, "cache read failed, treating as miss");
                None
            }
        }
    }

    async fn set(&self, key: &str, value: &[u8], ttl: Duration) {
        let mut conn = self.manager.clone();
        let seconds = ttl.as_secs().max(1);
        if let Err(e) = conn
            .set_ex::<_, _, ()>(key, value, seconds)
            .await
        {
            warn!(error = %e, key, "cache write failed, ignoring");
        }
    }
}

use async_trait::async_trait;
use deadpool::managed::QueueMode;
use deadpool_redis::{Config as DeadpoolConfig, Pool, PoolConfig, Runtime, Timeouts};
use redis::AsyncCommands;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;

use crate::config::Config;
use crate::error::{MosesError, Result};

/// Keys the flow persists. Values are always strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageKey {
    LastRecommendation,
    CurrentSessionStart,
    UserProfile,
}

impl StorageKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LastRecommendation => "lastRecommendation",
            Self::CurrentSessionStart => "current_session_start",
            Self::UserProfile => "user_profile",
        }
    }
}

impl fmt::Display for StorageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Asynchronous string key-value store. Each key is independent; there are
/// no multi-key transactions.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;
    async fn set(&self, key: &str, value: &str) -> Result<()>;
    async fn remove(&self, key: &str) -> Result<()>;
}

/// Redis-backed store
#[derive(Clone)]
pub struct RedisStore {
    pool: Arc<Pool>,
    namespace: String,
    ttl_seconds: Option<u64>,
}

impl RedisStore {
    /// Create a new Redis store with configuration
    pub async fn new_with_config(config: &Config) -> Result<Self> {
        let redis_url = config.get_redis_url();

        tracing::info!(
            "Connecting to Redis at {}:{} (db: {})",
            config.redis.host,
            config.redis.port,
            config.redis.database
        );

        let mut cfg = DeadpoolConfig::from_url(&redis_url);
        cfg.pool = Some(PoolConfig {
            max_size: config.redis.pool.max_size,
            timeouts: Timeouts {
                wait: Some(config.get_pool_timeout()),
                create: Some(config.get_pool_create_timeout()),
                recycle: Some(config.get_pool_recycle_timeout()),
            },
            queue_mode: QueueMode::Fifo,
        });

        let pool = cfg
            .create_pool(Some(Runtime::Tokio1))
            .map_err(|e| MosesError::PoolCreation(e.to_string()))?;

        // Test the connection
        let mut conn = pool.get().await?;
        let _: String = redis::cmd("PING").query_async(&mut *conn).await?;
        tracing::info!("Redis connection established");

        Ok(Self {
            pool: Arc::new(pool),
            namespace: config.storage.namespace.clone(),
            ttl_seconds: config
                .storage
                .default_ttl_seconds
                .filter(|ttl| *ttl > 0)
                .map(|ttl| ttl as u64),
        })
    }

    /// Get a connection from the pool
    pub async fn get_connection(&self) -> Result<deadpool_redis::Connection> {
        Ok(self.pool.get().await?)
    }

    fn scoped(&self, key: &str) -> String {
        scoped_key(&self.namespace, key)
    }
}

fn scoped_key(namespace: &str, key: &str) -> String {
    if namespace.is_empty() {
        key.to_string()
    } else {
        format!("{namespace}:{key}")
    }
}

#[async_trait]
impl KeyValueStore for RedisStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut conn = self.get_connection().await?;
        Ok(conn.get(self.scoped(key)).await?)
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut conn = self.get_connection().await?;
        let key = self.scoped(key);
        match self.ttl_seconds {
            Some(ttl) => conn.set_ex::<_, _, ()>(&key, value, ttl).await?,
            None => conn.set::<_, _, ()>(&key, value).await?,
        }
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        let mut conn = self.get_connection().await?;
        conn.del::<_, ()>(self.scoped(key)).await?;
        Ok(())
    }
}

/// Process-local store. Also used by tests, which can make it fail on demand.
#[derive(Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, String>>,
    failing: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent operation fail with a storage error.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn check(&self, op: &str, key: &str) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(MosesError::Storage(format!("{op} '{key}' failed")));
        }
        Ok(())
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        self.check("get", key)?;
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        self.check("set", key)?;
        self.entries
            .write()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.check("remove", key)?;
        self.entries.write().await.remove(key);
        Ok(())
    }
}

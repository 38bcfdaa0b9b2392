//! Storage for one-time code hashes and failed attempt counters
//!
//! Entries expire server side: Redis via `SET EX`/`EXPIRE`, the memory store
//! by checking the deadline on access.

use crate::config::RedisConfig;
use crate::errors::{AppError, Result};
use async_trait::async_trait;
use redis::{aio::MultiplexedConnection, Client, Script};
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::debug;

/// Deletes the code (and its attempt counter) only if it holds the expected hash
const TAKE_IF_MATCHES: &str = r"
if redis.call('GET', KEYS[1]) == ARGV[1] then
    redis.call('DEL', KEYS[2])
    return redis.call('DEL', KEYS[1])
end
return 0
";

/// Code storage with per-entry expiry
#[async_trait]
pub trait OtpStore: Send + Sync {
    /// Store a code hash, resetting the failed attempt counter
    async fn put(&self, key: &str, value: &str, ttl: Duration) -> Result<()>;

    /// Atomically consume the code if it equals `expected`
    async fn take_if_matches(&self, key: &str, expected: &str) -> Result<bool>;

    /// Count one failed attempt, returning the running total
    async fn record_miss(&self, key: &str, ttl: Duration) -> Result<u64>;

    /// Drop the code and its counter, returning whether a code was present
    async fn remove(&self, key: &str) -> Result<bool>;

    /// Check the backing storage is reachable
    async fn ping(&self) -> Result<()>;
}

/// Redis-backed code storage
pub struct RedisOtpStore {
    connection: RwLock<MultiplexedConnection>,
    key_prefix: String,
    take_script: Script,
}

impl RedisOtpStore {
    /// Connect to Redis
    pub async fn new(config: &RedisConfig) -> Result<Self> {
        let client = Client::open(config.url.as_str()).map_err(|e| AppError::CacheError {
            message: format!("Failed to create Redis client: {}", e),
        })?;

        let connection = client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| AppError::CacheError {
                message: format!("Failed to connect to Redis: {}", e),
            })?;

        Ok(Self {
            connection: RwLock::new(connection),
            key_prefix: config.key_prefix.clone(),
            take_script: Script::new(TAKE_IF_MATCHES),
        })
    }

    /// Build a prefixed key
    fn key(&self, key: &str) -> String {
        format!("{}:otp:{}", self.key_prefix, key)
    }

    fn attempts_key(&self, key: &str) -> String {
        format!("{}:otp_attempts:{}", self.key_prefix, key)
    }
}

fn cache_error(action: &str, key: &str, e: redis::RedisError) -> AppError {
    AppError::CacheError {
        message: format!("Failed to {} key '{}': {}", action, key, e),
    }
}

#[async_trait]
impl OtpStore for RedisOtpStore {
    async fn put(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
        let full_key = self.key(key);
        let ttl_secs = ttl.as_secs().max(1);
        let mut conn = self.connection.write().await;

        redis::pipe()
            .atomic()
            .set_ex(&full_key, value, ttl_secs)
            .ignore()
            .del(self.attempts_key(key))
            .ignore()
            .query_async::<()>(&mut *conn)
            .await
            .map_err(|e| cache_error("set", &full_key, e))?;

        debug!(key = %full_key, ttl_secs, "Code stored");
        Ok(())
    }

    async fn take_if_matches(&self, key: &str, expected: &str) -> Result<bool> {
        let full_key = self.key(key);
        let mut conn = self.connection.write().await;

        let deleted: i32 = self
            .take_script
            .key(&full_key)
            .key(self.attempts_key(key))
            .arg(expected)
            .invoke_async(&mut *conn)
            .await
            .map_err(|e| cache_error("consume", &full_key, e))?;

        debug!(key = %full_key, matched = deleted > 0, "Code checked");
        Ok(deleted > 0)
    }

    async fn record_miss(&self, key: &str, ttl: Duration) -> Result<u64> {
        let attempts_key = self.attempts_key(key);
        let ttl_secs = ttl.as_secs().max(1) as i64;
        let mut conn = self.connection.write().await;

        let (misses,): (u64,) = redis::pipe()
            .atomic()
            .incr(&attempts_key, 1)
            .expire(&attempts_key, ttl_secs)
            .ignore()
            .query_async(&mut *conn)
            .await
            .map_err(|e| cache_error("increment", &attempts_key, e))?;

        Ok(misses)
    }

    async fn remove(&self, key: &str) -> Result<bool> {
        let full_key = self.key(key);
        let mut conn = self.connection.write().await;

        let (deleted,): (i32,) = redis::pipe()
            .atomic()
            .del(&full_key)
            .del(self.attempts_key(key))
            .ignore()
            .query_async(&mut *conn)
            .await
            .map_err(|e| cache_error("delete", &full_key, e))?;

        Ok(deleted > 0)
    }

    async fn ping(&self) -> Result<()> {
        let mut conn = self.connection.write().await;
        redis::cmd("PING")
            .query_async::<String>(&mut *conn)
            .await
            .map_err(|e| AppError::CacheError {
                message: format!("Redis ping failed: {}", e),
            })?;
        Ok(())
    }
}

#[derive(Default)]
struct Slots {
    codes: HashMap<String, (String, Instant)>,
    misses: HashMap<String, (u64, Instant)>,
}

impl Slots {
    fn purge_expired(&mut self, key: &str) {
        let now = Instant::now();
        if matches!(self.codes.get(key), Some((_, deadline)) if *deadline <= now) {
            self.codes.remove(key);
        }
        if matches!(self.misses.get(key), Some((_, deadline)) if *deadline <= now) {
            self.misses.remove(key);
        }
    }
}

/// In-process code storage for tests and local runs
#[derive(Default)]
pub struct MemoryOtpStore {
    slots: RwLock<Slots>,
}

impl MemoryOtpStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl OtpStore for MemoryOtpStore {
    async fn put(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
        let mut slots = self.slots.write().await;
        slots
            .codes
            .insert(key.to_string(), (value.to_string(), Instant::now() + ttl));
        slots.misses.remove(key);
        Ok(())
    }

    async fn take_if_matches(&self, key: &str, expected: &str) -> Result<bool> {
        let mut slots = self.slots.write().await;
        slots.purge_expired(key);
        let matched = matches!(slots.codes.get(key), Some((value, _)) if value == expected);
        if matched {
            slots.codes.remove(key);
            slots.misses.remove(key);
        }
        Ok(matched)
    }

    async fn record_miss(&self, key: &str, ttl: Duration) -> Result<u64> {
        let mut slots = self.slots.write().await;
        slots.purge_expired(key);
        let entry = slots
            .misses
            .entry(key.to_string())
            .or_insert((0, Instant::now() + ttl));
        entry.0 += 1;
        Ok(entry.0)
    }

    async fn remove(&self, key: &str) -> Result<bool> {
        let mut slots = self.slots.write().await;
        slots.purge_expired(key);
        slots.misses.remove(key);
        Ok(slots.codes.remove(key).is_some())
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_store_expiry() {
        let store = MemoryOtpStore::new();
        store.put("k", "v", Duration::from_millis(30)).await.unwrap();

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert!(!store.take_if_matches("k", "v").await.unwrap());
        assert!(!store.remove("k").await.unwrap());
    }

    #[tokio::test]
    async fn test_take_only_on_match() {
        let store = MemoryOtpStore::new();
        store.put("k", "first", Duration::from_secs(60)).await.unwrap();
        store.put("k", "second", Duration::from_secs(60)).await.unwrap();

        assert!(!store.take_if_matches("k", "first").await.unwrap());
        assert!(store.take_if_matches("k", "second").await.unwrap());
        assert!(!store.take_if_matches("k", "second").await.unwrap());
    }

    #[tokio::test]
    async fn test_concurrent_take_consumes_once() {
        let store = std::sync::Arc::new(MemoryOtpStore::new());
        store.put("k", "v", Duration::from_secs(60)).await.unwrap();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = store.clone();
                tokio::spawn(async move { store.take_if_matches("k", "v").await.unwrap() })
            })
            .collect();

        let mut taken = 0;
        for handle in handles {
            if handle.await.unwrap() {
                taken += 1;
            }
        }
        assert_eq!(taken, 1);
    }

    #[tokio::test]
    async fn test_misses_reset_on_put() {
        let store = MemoryOtpStore::new();
        let ttl = Duration::from_secs(60);
        assert_eq!(store.record_miss("k", ttl).await.unwrap(), 1);
        assert_eq!(store.record_miss("k", ttl).await.unwrap(), 2);

        store.put("k", "v", ttl).await.unwrap();
        assert_eq!(store.record_miss("k", ttl).await.unwrap(), 1);

        assert!(store.remove("k").await.unwrap());
        assert_eq!(store.record_miss("k", ttl).await.unwrap(), 1);
    }
}

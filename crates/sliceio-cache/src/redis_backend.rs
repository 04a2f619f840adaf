//! Redis cache backend.
//!
//! The connection is acquired lazily and re-acquired after any transport
//! failure; acquisition retries a small fixed number of times with backoff
//! before surfacing `CacheUnavailable`. A write failure never corrupts the
//! durable tiers — the entry simply stays absent until the next write-back.

use crate::backend::{ArtifactCache, decode_or_miss};
use crate::keys::CacheKey;
use crate::payload::CachePayload;
use async_trait::async_trait;
use redis::AsyncCommands;
use redis::aio::MultiplexedConnection;
use sliceio_common::config::CacheConfig;
use sliceio_common::{Error, Result};
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{info, warn};

/// Redis-backed [`ArtifactCache`].
pub struct RedisCache {
    client: redis::Client,
    conn: Mutex<Option<MultiplexedConnection>>,
    ttl_secs: u64,
    connect_attempts: u32,
    connect_backoff: Duration,
}

impl RedisCache {
    /// Build a client for the configured URL. No connection is made yet;
    /// the first operation connects.
    pub fn new(config: &CacheConfig) -> Result<Self> {
        let client = redis::Client::open(config.url.as_str())
            .map_err(Error::cache_unavailable)?;
        Ok(Self {
            client,
            conn: Mutex::new(None),
            ttl_secs: config.ttl_secs,
            connect_attempts: config.connect_attempts.max(1),
            connect_backoff: Duration::from_millis(config.connect_backoff_ms),
        })
    }

    /// Get the live connection, establishing one if needed.
    async fn connection(&self) -> Result<MultiplexedConnection> {
        let mut guard = self.conn.lock().await;
        if let Some(conn) = guard.as_ref() {
            return Ok(conn.clone());
        }

        let mut last_err = None;
        for attempt in 1..=self.connect_attempts {
            match self.client.get_multiplexed_tokio_connection().await {
                Ok(conn) => {
                    info!("connected to cache");
                    *guard = Some(conn.clone());
                    return Ok(conn);
                }
                Err(e) => {
                    warn!(
                        attempt,
                        attempts = self.connect_attempts,
                        error = %e,
                        "cache connection failed"
                    );
                    last_err = Some(e);
                    if attempt < self.connect_attempts {
                        tokio::time::sleep(self.connect_backoff).await;
                    }
                }
            }
        }

        Err(Error::CacheUnavailable(match last_err {
            Some(e) => e.to_string(),
            None => "no connection attempts made".to_string(),
        }))
    }

    /// Drop the cached connection so the next operation reconnects.
    async fn reset(&self) {
        *self.conn.lock().await = None;
    }

    async fn fail(&self, e: redis::RedisError) -> Error {
        self.reset().await;
        Error::cache_unavailable(e)
    }
}

#[async_trait]
impl ArtifactCache for RedisCache {
    async fn get(&self, key: CacheKey) -> Result<Option<CachePayload>> {
        let mut conn = self.connection().await?;
        let data: Option<Vec<u8>> = match conn.get(key.to_string()).await {
            Ok(data) => data,
            Err(e) => return Err(self.fail(e).await),
        };
        Ok(data.and_then(|bytes| decode_or_miss(key, &bytes)))
    }

    async fn put(&self, key: CacheKey, payload: &CachePayload) -> Result<()> {
        let mut conn = self.connection().await?;
        let result: redis::RedisResult<()> = conn
            .set_ex(key.to_string(), payload.encode(), self.ttl_secs)
            .await;
        match result {
            Ok(()) => Ok(()),
            Err(e) => Err(self.fail(e).await),
        }
    }

    async fn put_many(&self, entries: &[(CacheKey, CachePayload)]) -> Result<()> {
        if entries.is_empty() {
            return Ok(());
        }
        let mut conn = self.connection().await?;
        let mut pipe = redis::pipe();
        for (key, payload) in entries {
            pipe.set_ex(key.to_string(), payload.encode(), self.ttl_secs)
                .ignore();
        }
        match pipe.query_async::<()>(&mut conn).await {
            Ok(()) => Ok(()),
            Err(e) => Err(self.fail(e).await),
        }
    }
}

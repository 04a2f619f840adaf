//! Durable object store seam.

use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;
use sliceio_common::config::ObjectStoreConfig;
use sliceio_common::{Error, Result};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::{debug, warn};

/// Content-addressed bucket storage for raw uploads, processed volumes,
/// and rendered artifacts.
///
/// `get_object` returning `Ok(None)` means the object does not exist;
/// `Err` is reserved for transport failures (`Error::StoreUnavailable`).
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn put_object(&self, bucket: &str, key: &str, data: Bytes) -> Result<()>;

    async fn get_object(&self, bucket: &str, key: &str) -> Result<Option<Bytes>>;

    async fn delete_object(&self, bucket: &str, key: &str) -> Result<()>;
}

/// HTTP object-store client with path-style addressing
/// (`{endpoint}/{bucket}/{key}`).
///
/// Requests carry a bounded timeout and a small fixed retry budget for
/// connect-level failures; an exhausted budget surfaces
/// `StoreUnavailable` rather than hanging.
pub struct HttpObjectStore {
    client: reqwest::Client,
    endpoint: String,
    retries: u32,
    retry_backoff: Duration,
}

impl HttpObjectStore {
    pub fn new(config: &ObjectStoreConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(Error::store_unavailable)?;
        Ok(Self {
            client,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            retries: config.retries,
            retry_backoff: Duration::from_millis(250),
        })
    }

    fn url(&self, bucket: &str, key: &str) -> String {
        format!("{}/{bucket}/{key}", self.endpoint)
    }

    /// Send a request, retrying connect-level failures.
    async fn send(&self, build: impl Fn() -> reqwest::RequestBuilder) -> Result<reqwest::Response> {
        let mut last_err = None;
        for attempt in 0..=self.retries {
            match build().send().await {
                Ok(resp) => return Ok(resp),
                Err(e) if e.is_connect() || e.is_timeout() => {
                    warn!(attempt, error = %e, "object store request failed");
                    last_err = Some(e);
                    if attempt < self.retries {
                        tokio::time::sleep(self.retry_backoff).await;
                    }
                }
                Err(e) => return Err(Error::store_unavailable(e)),
            }
        }
        Err(Error::StoreUnavailable(match last_err {
            Some(e) => e.to_string(),
            None => "request not attempted".to_string(),
        }))
    }
}

#[async_trait]
impl ObjectStore for HttpObjectStore {
    async fn put_object(&self, bucket: &str, key: &str, data: Bytes) -> Result<()> {
        let url = self.url(bucket, key);
        let resp = self
            .send(|| self.client.put(&url).body(data.clone()))
            .await?;
        if resp.status().is_success() {
            debug!(bucket, key, bytes = data.len(), "object stored");
            Ok(())
        } else {
            Err(Error::StoreUnavailable(format!(
                "put {bucket}/{key}: status {}",
                resp.status()
            )))
        }
    }

    async fn get_object(&self, bucket: &str, key: &str) -> Result<Option<Bytes>> {
        let url = self.url(bucket, key);
        let resp = self.send(|| self.client.get(&url)).await?;
        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !resp.status().is_success() {
            return Err(Error::StoreUnavailable(format!(
                "get {bucket}/{key}: status {}",
                resp.status()
            )));
        }
        let data = resp.bytes().await.map_err(Error::store_unavailable)?;
        Ok(Some(data))
    }

    async fn delete_object(&self, bucket: &str, key: &str) -> Result<()> {
        let url = self.url(bucket, key);
        let resp = self.send(|| self.client.delete(&url)).await?;
        if resp.status().is_success() || resp.status() == reqwest::StatusCode::NOT_FOUND {
            Ok(())
        } else {
            Err(Error::StoreUnavailable(format!(
                "delete {bucket}/{key}: status {}",
                resp.status()
            )))
        }
    }
}

/// In-memory object store for development and tests.
///
/// Counts operations so tests can assert which tier served a read.
#[derive(Default)]
pub struct MemoryObjectStore {
    objects: DashMap<(String, String), Bytes>,
    gets: AtomicU64,
    puts: AtomicU64,
    deletes: AtomicU64,
}

impl MemoryObjectStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `get_object` calls made so far.
    #[must_use]
    pub fn get_count(&self) -> u64 {
        self.gets.load(Ordering::Relaxed)
    }

    /// Number of `put_object` calls made so far.
    #[must_use]
    pub fn put_count(&self) -> u64 {
        self.puts.load(Ordering::Relaxed)
    }

    /// Number of `delete_object` calls made so far.
    #[must_use]
    pub fn delete_count(&self) -> u64 {
        self.deletes.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn contains(&self, bucket: &str, key: &str) -> bool {
        self.objects
            .contains_key(&(bucket.to_string(), key.to_string()))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn put_object(&self, bucket: &str, key: &str, data: Bytes) -> Result<()> {
        self.puts.fetch_add(1, Ordering::Relaxed);
        self.objects
            .insert((bucket.to_string(), key.to_string()), data);
        Ok(())
    }

    async fn get_object(&self, bucket: &str, key: &str) -> Result<Option<Bytes>> {
        self.gets.fetch_add(1, Ordering::Relaxed);
        Ok(self
            .objects
            .get(&(bucket.to_string(), key.to_string()))
            .map(|entry| entry.value().clone()))
    }

    async fn delete_object(&self, bucket: &str, key: &str) -> Result<()> {
        self.deletes.fetch_add(1, Ordering::Relaxed);
        self.objects.remove(&(bucket.to_string(), key.to_string()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_store_roundtrip() {
        let store = MemoryObjectStore::new();
        store
            .put_object("bucket", "files/a.nii", Bytes::from_static(b"data"))
            .await
            .unwrap();

        let got = store.get_object("bucket", "files/a.nii").await.unwrap();
        assert_eq!(got.unwrap().as_ref(), b"data");
        assert_eq!(store.get_count(), 1);
        assert_eq!(store.put_count(), 1);
    }

    #[tokio::test]
    async fn test_memory_store_missing_is_none() {
        let store = MemoryObjectStore::new();
        assert!(store.get_object("bucket", "nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_memory_store_delete() {
        let store = MemoryObjectStore::new();
        store
            .put_object("bucket", "key", Bytes::from_static(b"x"))
            .await
            .unwrap();
        store.delete_object("bucket", "key").await.unwrap();
        assert!(!store.contains("bucket", "key"));
        // Deleting a missing object is not an error.
        store.delete_object("bucket", "key").await.unwrap();
    }

    #[tokio::test]
    async fn test_http_store_unreachable_surfaces_unavailable() {
        let config = ObjectStoreConfig {
            endpoint: "http://127.0.0.1:1".to_string(),
            timeout_ms: 200,
            retries: 0,
            ..Default::default()
        };
        let store = HttpObjectStore::new(&config).unwrap();
        let err = store.get_object("bucket", "key").await.unwrap_err();
        assert!(err.is_unavailable());
    }
}

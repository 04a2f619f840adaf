//! Cache backend trait and the in-memory backend.

use crate::keys::CacheKey;
use crate::payload::CachePayload;
use async_trait::async_trait;
use parking_lot::Mutex;
use sliceio_common::Result;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tracing::warn;

/// The volatile cache seam.
///
/// `get` returning `Ok(None)` means absent — never-written and expired are
/// indistinguishable. `Err` is reserved for transport failures
/// (`Error::CacheUnavailable`); callers on the read path propagate it
/// rather than treating it as a miss.
#[async_trait]
pub trait ArtifactCache: Send + Sync {
    async fn get(&self, key: CacheKey) -> Result<Option<CachePayload>>;

    async fn put(&self, key: CacheKey, payload: &CachePayload) -> Result<()>;

    /// Write several entries as one batch, so a reader never observes one
    /// of them without the others. Backed by a single pipelined write, not
    /// a transaction: a torn batch degrades to a full miss.
    async fn put_many(&self, entries: &[(CacheKey, CachePayload)]) -> Result<()>;
}

/// Decode a stored entry, treating a corrupt payload as a miss.
///
/// Entries are derived data, so the safe response to an undecodable value
/// is to rebuild it; transport errors are handled separately.
pub(crate) fn decode_or_miss(key: CacheKey, bytes: &[u8]) -> Option<CachePayload> {
    match CachePayload::decode(bytes) {
        Ok(payload) => Some(payload),
        Err(e) => {
            warn!(key = %key, error = %e, "discarding undecodable cache entry");
            None
        }
    }
}

/// In-memory TTL cache backend for development and tests.
///
/// Stores the same tagged wire form as the Redis backend so both tiers
/// share encode/decode behavior.
pub struct MemoryCache {
    ttl: Duration,
    entries: Mutex<HashMap<String, (Vec<u8>, Instant)>>,
}

impl MemoryCache {
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Number of live (unexpired) entries.
    #[must_use]
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.entries.lock().values().filter(|(_, exp)| *exp > now).count()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl ArtifactCache for MemoryCache {
    async fn get(&self, key: CacheKey) -> Result<Option<CachePayload>> {
        let name = key.to_string();
        let mut entries = self.entries.lock();
        match entries.get(&name) {
            Some((bytes, expires)) if *expires > Instant::now() => {
                Ok(decode_or_miss(key, bytes))
            }
            Some(_) => {
                entries.remove(&name);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn put(&self, key: CacheKey, payload: &CachePayload) -> Result<()> {
        let expires = Instant::now() + self.ttl;
        self.entries
            .lock()
            .insert(key.to_string(), (payload.encode(), expires));
        Ok(())
    }

    async fn put_many(&self, entries: &[(CacheKey, CachePayload)]) -> Result<()> {
        let expires = Instant::now() + self.ttl;
        let mut guard = self.entries.lock();
        for (key, payload) in entries {
            guard.insert(key.to_string(), (payload.encode(), expires));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use sliceio_common::{VolumeId, VolumeMeta};

    fn meta_payload() -> CachePayload {
        CachePayload::Meta(VolumeMeta {
            slice_count: 4,
            owner: None,
            is_public: true,
        })
    }

    #[tokio::test]
    async fn test_put_get_roundtrip() {
        let cache = MemoryCache::new(Duration::from_secs(60));
        let key = CacheKey::VolumeMeta(VolumeId::new());
        cache.put(key, &meta_payload()).await.unwrap();
        assert_eq!(cache.get(key).await.unwrap(), Some(meta_payload()));
    }

    #[tokio::test]
    async fn test_expired_entry_reads_as_absent() {
        let cache = MemoryCache::new(Duration::from_millis(10));
        let key = CacheKey::VolumeMeta(VolumeId::new());
        cache.put(key, &meta_payload()).await.unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(cache.get(key).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_put_many_writes_all_entries() {
        let cache = MemoryCache::new(Duration::from_secs(60));
        let id = VolumeId::new();
        let entries = vec![
            (CacheKey::VolumeMeta(id), meta_payload()),
            (
                CacheKey::Overlay(id, 3),
                CachePayload::Overlay(Bytes::from_static(b"png")),
            ),
        ];
        cache.put_many(&entries).await.unwrap();
        assert_eq!(cache.len(), 2);
        assert!(cache.get(CacheKey::Overlay(id, 3)).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_overwrite_last_writer_wins() {
        let cache = MemoryCache::new(Duration::from_secs(60));
        let key = CacheKey::Overlay(VolumeId::new(), 0);
        cache
            .put(key, &CachePayload::Overlay(Bytes::from_static(b"first")))
            .await
            .unwrap();
        cache
            .put(key, &CachePayload::Overlay(Bytes::from_static(b"second")))
            .await
            .unwrap();
        let got = cache.get(key).await.unwrap().unwrap().into_png().unwrap();
        assert_eq!(got.as_ref(), b"second");
    }
}

//! Configuration types for SliceIO
//!
//! This module defines configuration structures used across components.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;

/// Root configuration for SliceIO
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Volatile cache configuration
    pub cache: CacheConfig,
    /// Durable object store configuration
    pub object_store: ObjectStoreConfig,
    /// Metadata store configuration
    pub metadata: MetadataConfig,
    /// Background materializer configuration
    pub materializer: MaterializerConfig,
    /// Gateway configuration
    pub gateway: GatewayConfig,
}

/// Volatile cache (Redis) configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Connection URL
    pub url: String,
    /// Entry time-to-live in seconds
    pub ttl_secs: u64,
    /// Connection attempts before surfacing a hard failure
    pub connect_attempts: u32,
    /// Backoff between connection attempts (milliseconds)
    pub connect_backoff_ms: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            url: "redis://127.0.0.1:6379".to_string(),
            ttl_secs: 30 * 60,
            connect_attempts: 3,
            connect_backoff_ms: 2000,
        }
    }
}

/// Durable object store configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ObjectStoreConfig {
    /// Endpoint URL for path-style object addressing
    pub endpoint: String,
    /// Bucket for raw and processed volumes (never served directly)
    pub private_bucket: String,
    /// Bucket for rendered artifacts (served to clients by URL)
    pub public_bucket: String,
    /// Per-request timeout (milliseconds)
    pub timeout_ms: u64,
    /// Retry budget for transient failures
    pub retries: u32,
}

impl Default for ObjectStoreConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://127.0.0.1:9000".to_string(),
            private_bucket: "sliceio-volumes".to_string(),
            public_bucket: "sliceio-artifacts".to_string(),
            timeout_ms: 30_000,
            retries: 2,
        }
    }
}

/// Metadata store configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MetadataConfig {
    /// Data directory for the embedded store
    pub data_dir: PathBuf,
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("/var/lib/sliceio"),
        }
    }
}

/// Background materializer configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MaterializerConfig {
    /// Number of worker tasks draining the job queue
    pub workers: usize,
}

impl Default for MaterializerConfig {
    fn default() -> Self {
        Self { workers: 4 }
    }
}

/// Gateway configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Listen address for the HTTP API
    pub listen: SocketAddr,
    /// Maximum accepted upload size in bytes
    pub max_upload_bytes: usize,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            listen: "0.0.0.0:8000".parse().unwrap(),
            max_upload_bytes: 256 * 1024 * 1024,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.cache.ttl_secs, 1800);
        assert_eq!(config.cache.connect_attempts, 3);
        assert_eq!(config.gateway.listen.port(), 8000);
        assert_ne!(
            config.object_store.private_bucket,
            config.object_store.public_bucket
        );
    }
}

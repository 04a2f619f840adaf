//! SliceIO Cache - the volatile tier
//!
//! A lookaside cache in front of durable storage and a memoization layer
//! for rendered artifacts. Entries are derived data: any entry may expire
//! or vanish and is transparently rebuilt from the durable tiers, so the
//! cache owns no long-term truth.
//!
//! Backends implement [`ArtifactCache`]. The Redis backend is the
//! production tier; the in-memory backend serves development and tests.

mod backend;
mod keys;
mod payload;
mod redis_backend;

pub use backend::{ArtifactCache, MemoryCache};
pub use keys::CacheKey;
pub use payload::{CachePayload, PayloadError};
pub use redis_backend::RedisCache;

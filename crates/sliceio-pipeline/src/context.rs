//! Explicit dependency wiring for the pipeline.
//!
//! Every collaborator — cache, object store, metadata store, model — is
//! constructed at startup and passed in. Lifecycle is tied to process
//! start/stop, and tests swap in whichever implementations they need.

use crate::materializer::MaterializerHandle;
use sliceio_cache::ArtifactCache;
use sliceio_engine::SegmentationEngine;
use sliceio_store::{MetadataStore, ObjectStore};
use std::sync::Arc;

/// The two durable buckets.
#[derive(Clone, Debug)]
pub struct Buckets {
    /// Raw and processed volumes; never served directly
    pub private: String,
    /// Rendered artifacts; served to clients by URL
    pub public: String,
}

/// Shared collaborators used by both the request path and the
/// materializer workers.
pub struct CoreDeps {
    pub cache: Arc<dyn ArtifactCache>,
    pub objects: Arc<dyn ObjectStore>,
    pub meta: Arc<dyn MetadataStore>,
    pub engine: Arc<dyn SegmentationEngine>,
    pub buckets: Buckets,
}

/// Everything a request handler needs.
#[derive(Clone)]
pub struct ServiceContext {
    pub deps: Arc<CoreDeps>,
    pub materializer: MaterializerHandle,
}

impl ServiceContext {
    #[must_use]
    pub const fn new(deps: Arc<CoreDeps>, materializer: MaterializerHandle) -> Self {
        Self { deps, materializer }
    }
}

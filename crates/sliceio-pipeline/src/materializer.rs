//! Background materializer: a job queue drained by a worker pool.
//!
//! Every durable side effect of a successful request — object uploads,
//! cache warm-ups, derived renders — is a [`Job`] carrying an immutable
//! snapshot of its inputs, pushed onto the queue after the response is
//! determined. Worker lifetime is tied to the process, not to any request.
//!
//! A job failure is logged with enough context (object key, owning id,
//! correlation id) for manual replay and never surfaces to a client.
//! Delivery is at-most-once: a crash between schedule and execute drops
//! the job, and the artifact is rebuilt lazily on the next read.

use crate::artifact::resolve_volume;
use crate::context::CoreDeps;
use bytes::Bytes;
use sliceio_cache::{CacheKey, CachePayload};
use sliceio_common::{Error, Identity, RequestId, Result, VolumeId, VolumeMeta};
use sliceio_engine::trace_contours;
use sliceio_store::{ContourRecord, PhotoRecord};
use sliceio_volume::Volume;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::{Mutex, mpsc};
use tracing::{debug, error, warn};

/// One unit of background work. Inputs are snapshotted at schedule time.
#[derive(Clone, Debug)]
pub enum Job {
    /// Write bytes to the durable object store.
    StoreObject {
        bucket: String,
        key: String,
        data: Bytes,
        request: RequestId,
    },
    /// Warm the volatile tier with a volume and its metadata snapshot,
    /// written together as one batch.
    WarmVolume {
        id: VolumeId,
        volume: Volume,
        meta: VolumeMeta,
        request: RequestId,
    },
    /// Populate one result-level cache entry.
    CacheArtifact {
        key: CacheKey,
        payload: CachePayload,
        request: RequestId,
    },
    /// Render a saved photo and upload it to the public bucket.
    RenderPhoto {
        photo: PhotoRecord,
        request: RequestId,
    },
    /// Render a saved contour annotation and upload it under its
    /// versioned key.
    RenderContourPhoto {
        contours: ContourRecord,
        request: RequestId,
    },
    /// Remove an object from the durable store.
    DeleteObject {
        bucket: String,
        key: String,
        request: RequestId,
    },
}

/// Handle for scheduling jobs. Cheap to clone; scheduling never fails the
/// caller's primary operation.
#[derive(Clone)]
pub struct MaterializerHandle {
    tx: mpsc::UnboundedSender<Job>,
    pending: Arc<AtomicUsize>,
}

impl MaterializerHandle {
    /// Enqueue a job. Once scheduled, a job is not cancellable.
    pub fn schedule(&self, job: Job) {
        self.pending.fetch_add(1, Ordering::SeqCst);
        if self.tx.send(job).is_err() {
            self.pending.fetch_sub(1, Ordering::SeqCst);
            warn!("materializer queue closed, dropping job");
        }
    }

    /// Number of jobs scheduled but not yet finished.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::SeqCst)
    }

    /// Wait until the queue has drained. Test and shutdown helper.
    pub async fn wait_idle(&self) {
        while self.pending() > 0 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }
}

/// Spawn the worker pool and return the scheduling handle.
#[must_use]
pub fn spawn_materializer(deps: Arc<CoreDeps>, workers: usize) -> MaterializerHandle {
    let (tx, rx) = mpsc::unbounded_channel();
    let rx = Arc::new(Mutex::new(rx));
    let pending = Arc::new(AtomicUsize::new(0));

    for worker in 0..workers.max(1) {
        let rx = Arc::clone(&rx);
        let deps = Arc::clone(&deps);
        let pending = Arc::clone(&pending);
        tokio::spawn(async move {
            loop {
                let job = rx.lock().await.recv().await;
                let Some(job) = job else {
                    debug!(worker, "materializer worker stopping");
                    break;
                };
                if let Err(e) = execute(&deps, &job).await {
                    log_failure(&job, &e);
                }
                pending.fetch_sub(1, Ordering::SeqCst);
            }
        });
    }

    MaterializerHandle { tx, pending }
}

async fn execute(deps: &CoreDeps, job: &Job) -> Result<()> {
    match job {
        Job::StoreObject {
            bucket, key, data, ..
        } => {
            deps.objects.put_object(bucket, key, data.clone()).await?;
            debug!(bucket, key, bytes = data.len(), "object materialized");
            Ok(())
        }
        Job::WarmVolume {
            id, volume, meta, ..
        } => {
            deps.cache
                .put_many(&[
                    (CacheKey::Volume(*id), CachePayload::Volume(volume.clone())),
                    (CacheKey::VolumeMeta(*id), CachePayload::Meta(*meta)),
                ])
                .await
        }
        Job::CacheArtifact { key, payload, .. } => deps.cache.put(*key, payload).await,
        Job::RenderPhoto { photo, request } => render_photo(deps, photo, *request).await,
        Job::RenderContourPhoto { contours, request } => {
            render_contour_photo(deps, contours, *request).await
        }
        Job::DeleteObject { bucket, key, .. } => deps.objects.delete_object(bucket, key).await,
    }
}

async fn render_photo(deps: &CoreDeps, photo: &PhotoRecord, request: RequestId) -> Result<()> {
    let identity = Identity::User(photo.author);
    let (volume, _meta) = resolve_volume(deps, None, photo.volume, photo.slice, identity, request)
        .await?;
    let slice = volume
        .slice(photo.slice)
        .ok_or_else(|| Error::internal("slice index beyond stored volume"))?;

    // Reuse model contours if a request already traced this slice.
    let cached = match deps.cache.get(CacheKey::Contours(photo.volume, photo.slice)).await {
        Ok(payload) => payload.and_then(CachePayload::into_contours),
        Err(_) => None,
    };
    let contours = match cached {
        Some(contours) => contours,
        None => {
            let mask = deps
                .engine
                .segment(&slice)
                .map_err(|e| Error::Compute(e.to_string()))?;
            trace_contours(&mask)
        }
    };

    let png = sliceio_engine::render_overlay(&slice, &contours).map_err(Error::internal)?;
    deps.objects
        .put_object(&deps.buckets.public, &photo.url, Bytes::from(png))
        .await
}

async fn render_contour_photo(
    deps: &CoreDeps,
    record: &ContourRecord,
    request: RequestId,
) -> Result<()> {
    let identity = Identity::User(record.author);
    let (volume, _meta) =
        resolve_volume(deps, None, record.volume, record.slice, identity, request).await?;
    let slice = volume
        .slice(record.slice)
        .ok_or_else(|| Error::internal("slice index beyond stored volume"))?;

    let png = sliceio_engine::render_overlay(&slice, &record.points).map_err(Error::internal)?;
    deps.objects
        .put_object(&deps.buckets.public, &record.url, Bytes::from(png))
        .await
}

fn log_failure(job: &Job, e: &Error) {
    match job {
        Job::StoreObject {
            bucket,
            key,
            request,
            ..
        }
        | Job::DeleteObject {
            bucket,
            key,
            request,
        } => {
            error!(bucket, key, request = %request, error = %e, "materializer job failed");
        }
        Job::WarmVolume { id, request, .. } => {
            error!(volume = %id, request = %request, error = %e, "cache warm failed");
        }
        Job::CacheArtifact { key, request, .. } => {
            error!(key = %key, request = %request, error = %e, "cache population failed");
        }
        Job::RenderPhoto { photo, request } => {
            error!(
                photo = %photo.id,
                volume = %photo.volume,
                key = %photo.url,
                request = %request,
                error = %e,
                "photo render failed"
            );
        }
        Job::RenderContourPhoto { contours, request } => {
            error!(
                contour = %contours.id,
                volume = %contours.volume,
                key = %contours.url,
                request = %request,
                error = %e,
                "contour render failed"
            );
        }
    }
}

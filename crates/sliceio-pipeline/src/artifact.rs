//! The artifact read path.
//!
//! Tier order for a read: metadata snapshot in the volatile cache, then
//! the authoritative metadata store; volume bytes from the volatile cache,
//! then the durable object store; then the result-level caches; then
//! inference. Whatever was missing gets scheduled for background
//! population, so the next request takes the fast path.
//!
//! Concurrent requests for the same uncached `(volume, slice)` may both
//! recompute — no lock is taken. Results are deterministic for the same
//! inputs and the last writer into the cache wins, so the race costs only
//! wasted work.

use crate::context::{CoreDeps, ServiceContext};
use crate::materializer::{Job, MaterializerHandle};
use bytes::Bytes;
use sliceio_cache::{CacheKey, CachePayload};
use sliceio_common::{Error, Identity, RequestId, Result, SliceIndex, VolumeId, VolumeMeta};
use sliceio_engine::{ContourSet, trace_contours};
use sliceio_store::keys;
use sliceio_volume::{Slice, Volume, decode_volume};
use tracing::{debug, info};

/// Look up the authorization snapshot, falling back to the metadata store,
/// and enforce authorization and slice bounds.
///
/// The snapshot path and the authoritative path apply the same rules; a
/// caller that fails authorization gets Forbidden even when the record
/// exists, never NotFound.
pub(crate) async fn check_access(
    deps: &CoreDeps,
    id: VolumeId,
    slice: SliceIndex,
    identity: Identity,
) -> Result<VolumeMeta> {
    let snapshot = deps
        .cache
        .get(CacheKey::VolumeMeta(id))
        .await?
        .and_then(|payload| payload.as_meta().copied());

    let meta = match snapshot {
        Some(meta) => meta,
        None => {
            let record = deps
                .meta
                .get_volume(id)
                .await?
                .ok_or(Error::VolumeNotFound(id))?;
            record.meta()
        }
    };

    if !meta.accessible_by(identity) {
        return Err(Error::Forbidden(id));
    }
    if !meta.slice_in_bounds(slice) {
        return Err(Error::SliceOutOfBounds {
            slice,
            slice_count: meta.slice_count,
        });
    }
    Ok(meta)
}

/// Resolve the full volume tensor after access checks: volatile cache
/// first, then the processed object in the durable store.
///
/// On a cache miss the volume and its snapshot are written back through
/// the materializer (or inline, best-effort, when already running on a
/// materializer worker) so subsequent requests hit the fast path.
pub(crate) async fn resolve_volume(
    deps: &CoreDeps,
    materializer: Option<&MaterializerHandle>,
    id: VolumeId,
    slice: SliceIndex,
    identity: Identity,
    request: RequestId,
) -> Result<(Volume, VolumeMeta)> {
    let meta = check_access(deps, id, slice, identity).await?;

    if let Some(volume) = deps
        .cache
        .get(CacheKey::Volume(id))
        .await?
        .and_then(CachePayload::into_volume)
    {
        return Ok((volume, meta));
    }

    info!(volume = %id, request = %request, "cache miss, loading volume from object store");
    let bytes = deps
        .objects
        .get_object(&deps.buckets.private, &keys::processed_volume(id))
        .await?
        .ok_or(Error::VolumeNotFound(id))?;
    let volume = decode_volume(&bytes).map_err(Error::internal)?;

    match materializer {
        Some(handle) => handle.schedule(Job::WarmVolume {
            id,
            volume: volume.clone(),
            meta,
            request,
        }),
        None => {
            // Already on a materializer worker; warm inline, best-effort.
            let entries = [
                (CacheKey::Volume(id), CachePayload::Volume(volume.clone())),
                (CacheKey::VolumeMeta(id), CachePayload::Meta(meta)),
            ];
            if let Err(e) = deps.cache.put_many(&entries).await {
                debug!(volume = %id, error = %e, "inline cache warm failed");
            }
        }
    }

    Ok((volume, meta))
}

fn extract_slice(volume: &Volume, index: SliceIndex) -> Result<Slice> {
    // Bounds were already checked against the metadata snapshot; the
    // stored volume disagreeing with its own record is an internal fault.
    volume
        .slice(index)
        .ok_or_else(|| Error::internal("slice index beyond stored volume"))
}

/// Contours for `(id, slice)`: the cached set if present, traced from a
/// fresh segmentation otherwise. The flag reports whether the cache
/// already held them.
async fn contours_for(
    deps: &CoreDeps,
    id: VolumeId,
    index: SliceIndex,
    slice: &Slice,
) -> Result<(ContourSet, bool)> {
    if let Some(contours) = deps
        .cache
        .get(CacheKey::Contours(id, index))
        .await?
        .and_then(CachePayload::into_contours)
    {
        return Ok((contours, true));
    }
    let mask = deps
        .engine
        .segment(slice)
        .map_err(|e| Error::Compute(e.to_string()))?;
    Ok((trace_contours(&mask), false))
}

/// Produce the contour-overlay composite PNG for one slice.
pub async fn render_overlay(
    ctx: &ServiceContext,
    id: VolumeId,
    slice: SliceIndex,
    identity: Identity,
    request: RequestId,
) -> Result<Bytes> {
    let deps = &ctx.deps;
    let (volume, _meta) =
        resolve_volume(deps, Some(&ctx.materializer), id, slice, identity, request).await?;

    if let Some(png) = deps
        .cache
        .get(CacheKey::Overlay(id, slice))
        .await?
        .and_then(CachePayload::into_png)
    {
        debug!(volume = %id, slice, request = %request, "overlay served from cache");
        return Ok(png);
    }

    let slice_data = extract_slice(&volume, slice)?;
    let (contours, contours_cached) = contours_for(deps, id, slice, &slice_data).await?;

    let png = Bytes::from(
        sliceio_engine::render_overlay(&slice_data, &contours).map_err(Error::internal)?,
    );

    // Populate whichever levels were missing: contours first, then image.
    if !contours_cached {
        ctx.materializer.schedule(Job::CacheArtifact {
            key: CacheKey::Contours(id, slice),
            payload: CachePayload::Contours(contours),
            request,
        });
    }
    ctx.materializer.schedule(Job::CacheArtifact {
        key: CacheKey::Overlay(id, slice),
        payload: CachePayload::Overlay(png.clone()),
        request,
    });

    info!(volume = %id, slice, request = %request, "overlay rendered");
    Ok(png)
}

/// Produce the contour polygon list for one slice.
pub async fn slice_contours(
    ctx: &ServiceContext,
    id: VolumeId,
    slice: SliceIndex,
    identity: Identity,
    request: RequestId,
) -> Result<ContourSet> {
    let deps = &ctx.deps;
    let (volume, _meta) =
        resolve_volume(deps, Some(&ctx.materializer), id, slice, identity, request).await?;

    let slice_data = extract_slice(&volume, slice)?;
    let (contours, contours_cached) = contours_for(deps, id, slice, &slice_data).await?;

    if !contours_cached {
        ctx.materializer.schedule(Job::CacheArtifact {
            key: CacheKey::Contours(id, slice),
            payload: CachePayload::Contours(contours.clone()),
            request,
        });
    }
    Ok(contours)
}

/// Produce the base slice PNG, without the overlay.
pub async fn slice_image(
    ctx: &ServiceContext,
    id: VolumeId,
    slice: SliceIndex,
    identity: Identity,
    request: RequestId,
) -> Result<Bytes> {
    let deps = &ctx.deps;
    let (volume, _meta) =
        resolve_volume(deps, Some(&ctx.materializer), id, slice, identity, request).await?;

    if let Some(png) = deps
        .cache
        .get(CacheKey::SliceImage(id, slice))
        .await?
        .and_then(CachePayload::into_png)
    {
        debug!(volume = %id, slice, request = %request, "slice image served from cache");
        return Ok(png);
    }

    let slice_data = extract_slice(&volume, slice)?;
    let png =
        Bytes::from(sliceio_engine::render_slice(&slice_data).map_err(Error::internal)?);

    ctx.materializer.schedule(Job::CacheArtifact {
        key: CacheKey::SliceImage(id, slice),
        payload: CachePayload::SliceImage(png.clone()),
        request,
    });
    Ok(png)
}

//! The upload path.
//!
//! A corrupt or unsupported payload is rejected before any storage write.
//! The metadata record and the cache warm happen on the request path; the
//! two durable objects (raw and processed) are materialized in the
//! background under deterministic keys.

use crate::context::ServiceContext;
use crate::materializer::Job;
use bytes::Bytes;
use sliceio_cache::{CacheKey, CachePayload};
use sliceio_common::{Error, Identity, RequestId, Result, VolumeId};
use sliceio_store::{VolumeRecord, keys};
use sliceio_volume::{encode_volume, nifti};
use tracing::info;

/// Ingest an uploaded `.nii` payload and return its metadata record.
///
/// An anonymous upload has no owner and is forced public.
pub async fn upload_volume(
    ctx: &ServiceContext,
    filename: &str,
    data: Bytes,
    identity: Identity,
    is_public: bool,
    request: RequestId,
) -> Result<VolumeRecord> {
    if !filename.ends_with(".nii") {
        return Err(Error::validation("only .nii files are supported"));
    }

    let volume = nifti::parse(&data)
        .map_err(|e| Error::Validation(format!("invalid .nii file: {e}")))?
        .normalized();

    let owner = identity.user_id();
    let record = VolumeRecord {
        id: VolumeId::new(),
        filename: filename.to_string(),
        size_bytes: data.len() as u64,
        slice_count: volume.slice_count(),
        owner,
        is_public: is_public || owner.is_none(),
    };
    ctx.deps.meta.insert_volume(record.clone()).await?;

    // Volume and snapshot land together; a reader never sees one without
    // the other.
    let meta = record.meta();
    ctx.deps
        .cache
        .put_many(&[
            (
                CacheKey::Volume(record.id),
                CachePayload::Volume(volume.clone()),
            ),
            (CacheKey::VolumeMeta(record.id), CachePayload::Meta(meta)),
        ])
        .await?;

    ctx.materializer.schedule(Job::StoreObject {
        bucket: ctx.deps.buckets.private.clone(),
        key: keys::raw_volume(record.id),
        data,
        request,
    });
    ctx.materializer.schedule(Job::StoreObject {
        bucket: ctx.deps.buckets.private.clone(),
        key: keys::processed_volume(record.id),
        data: encode_volume(&volume),
        request,
    });

    info!(
        volume = %record.id,
        filename,
        slices = record.slice_count,
        request = %request,
        "volume uploaded"
    );
    Ok(record)
}

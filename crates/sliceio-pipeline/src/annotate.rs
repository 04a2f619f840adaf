//! Saved photos and contour annotations.
//!
//! Saving validates against the metadata snapshot (or the authoritative
//! record on a snapshot miss), inserts the record, and schedules the
//! derived render + public-bucket upload in the background. The response
//! never waits for the render.

use crate::artifact::check_access;
use crate::context::ServiceContext;
use crate::materializer::Job;
use sliceio_common::{Error, Identity, PhotoId, RequestId, Result, SliceIndex, UserId, VolumeId};
use sliceio_engine::ContourSet;
use sliceio_store::{ContourRecord, NewContours, NewPhoto, PhotoRecord};
use tracing::info;

fn require_user(identity: Identity, volume: VolumeId) -> Result<UserId> {
    identity.user_id().ok_or(Error::Forbidden(volume))
}

/// Save a rendered snapshot of one slice for the calling user.
///
/// `(author, volume, slice)` is unique; saving the same slice twice is a
/// Conflict.
pub async fn save_photo(
    ctx: &ServiceContext,
    volume: VolumeId,
    slice: SliceIndex,
    identity: Identity,
    request: RequestId,
) -> Result<PhotoRecord> {
    let author = require_user(identity, volume)?;
    check_access(&ctx.deps, volume, slice, identity).await?;

    let record = ctx
        .deps
        .meta
        .insert_photo(NewPhoto {
            volume,
            slice,
            author,
            name: format!("{slice}.png"),
        })
        .await?;

    ctx.materializer.schedule(Job::RenderPhoto {
        photo: record.clone(),
        request,
    });

    info!(photo = %record.id, volume = %volume, slice, request = %request, "photo saved");
    Ok(record)
}

/// Save a new version of the user's contour annotation for one slice.
///
/// The store allocates the version atomically; concurrent savers get
/// distinct, consecutive versions.
pub async fn save_contours(
    ctx: &ServiceContext,
    volume: VolumeId,
    slice: SliceIndex,
    points: ContourSet,
    identity: Identity,
    request: RequestId,
) -> Result<ContourRecord> {
    let author = require_user(identity, volume)?;
    check_access(&ctx.deps, volume, slice, identity).await?;

    let record = ctx
        .deps
        .meta
        .insert_contours(NewContours {
            volume,
            slice,
            author,
            points,
        })
        .await?;

    ctx.materializer.schedule(Job::RenderContourPhoto {
        contours: record.clone(),
        request,
    });

    info!(
        contour = %record.id,
        volume = %volume,
        slice,
        version = record.version,
        request = %request,
        "contours saved"
    );
    Ok(record)
}

/// Delete the calling user's saved photo and its rendered object.
pub async fn delete_photo(
    ctx: &ServiceContext,
    photo: PhotoId,
    identity: Identity,
    request: RequestId,
) -> Result<PhotoRecord> {
    let Some(author) = identity.user_id() else {
        return Err(Error::PhotoNotFound(photo));
    };

    let record = ctx
        .deps
        .meta
        .delete_photo(photo, author)
        .await?
        .ok_or(Error::PhotoNotFound(photo))?;

    ctx.materializer.schedule(Job::DeleteObject {
        bucket: ctx.deps.buckets.public.clone(),
        key: record.url.clone(),
        request,
    });

    info!(photo = %record.id, request = %request, "photo deleted");
    Ok(record)
}

/// All photos saved by the calling user.
pub async fn photos_for_user(ctx: &ServiceContext, identity: Identity) -> Result<Vec<PhotoRecord>> {
    match identity.user_id() {
        Some(user) => ctx.deps.meta.photos_for_user(user).await,
        None => Ok(Vec::new()),
    }
}

/// The latest saved contour version for `(user, volume, slice)`, if any.
pub async fn latest_saved_contours(
    ctx: &ServiceContext,
    volume: VolumeId,
    slice: SliceIndex,
    identity: Identity,
) -> Result<Option<ContourRecord>> {
    match identity.user_id() {
        Some(user) => ctx.deps.meta.latest_contours(volume, slice, user).await,
        None => Ok(None),
    }
}

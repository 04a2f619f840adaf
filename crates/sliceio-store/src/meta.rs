//! Metadata store seam and the in-memory implementation.
//!
//! The relational store itself is an external collaborator; the pipeline
//! consumes it through [`MetadataStore`]. Photo uniqueness and contour
//! version allocation are the store's responsibility so that concurrent
//! writers cannot race past them.

use crate::keys;
use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use sliceio_common::{
    ContourId, Error, PhotoId, Result, SliceIndex, UserId, VolumeId, VolumeMeta,
};
use sliceio_engine::ContourSet;

/// Authoritative record for an uploaded volume.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeRecord {
    pub id: VolumeId,
    pub filename: String,
    pub size_bytes: u64,
    pub slice_count: u32,
    pub owner: Option<UserId>,
    pub is_public: bool,
}

impl VolumeRecord {
    /// The authorization-relevant projection cached in the volatile tier.
    #[must_use]
    pub const fn meta(&self) -> VolumeMeta {
        VolumeMeta {
            slice_count: self.slice_count,
            owner: self.owner,
            is_public: self.is_public,
        }
    }
}

/// A user-saved rendered snapshot of one slice.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhotoRecord {
    pub id: PhotoId,
    pub volume: VolumeId,
    pub slice: SliceIndex,
    pub author: UserId,
    pub name: String,
    /// Object key in the public bucket
    pub url: String,
}

/// Input for saving a photo; the store assigns the id and object key.
#[derive(Clone, Debug)]
pub struct NewPhoto {
    pub volume: VolumeId,
    pub slice: SliceIndex,
    pub author: UserId,
    pub name: String,
}

/// A versioned, author-editable contour annotation for one slice.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ContourRecord {
    pub id: ContourId,
    pub volume: VolumeId,
    pub slice: SliceIndex,
    pub author: UserId,
    pub points: ContourSet,
    pub version: u32,
    /// Object key in the public bucket
    pub url: String,
}

/// Input for saving contours; the store allocates the next version.
#[derive(Clone, Debug)]
pub struct NewContours {
    pub volume: VolumeId,
    pub slice: SliceIndex,
    pub author: UserId,
    pub points: ContourSet,
}

/// Relational metadata tier.
///
/// `(author, volume, slice)` identifies at most one photo — a second
/// insert is a Conflict. The same scope admits many contour versions;
/// `insert_contours` allocates the next version atomically.
#[async_trait]
pub trait MetadataStore: Send + Sync {
    async fn insert_volume(&self, record: VolumeRecord) -> Result<()>;

    async fn get_volume(&self, id: VolumeId) -> Result<Option<VolumeRecord>>;

    async fn insert_photo(&self, photo: NewPhoto) -> Result<PhotoRecord>;

    async fn get_photo(&self, id: PhotoId) -> Result<Option<PhotoRecord>>;

    /// Remove the author's photo; `None` when it does not exist or belongs
    /// to someone else.
    async fn delete_photo(&self, id: PhotoId, author: UserId) -> Result<Option<PhotoRecord>>;

    async fn photos_for_user(&self, user: UserId) -> Result<Vec<PhotoRecord>>;

    async fn insert_contours(&self, contours: NewContours) -> Result<ContourRecord>;

    async fn latest_contours(
        &self,
        volume: VolumeId,
        slice: SliceIndex,
        author: UserId,
    ) -> Result<Option<ContourRecord>>;
}

type Scope = (UserId, VolumeId, SliceIndex);

/// In-memory metadata store for development and tests.
#[derive(Default)]
pub struct MemoryMetaStore {
    volumes: DashMap<VolumeId, VolumeRecord>,
    photos: DashMap<PhotoId, PhotoRecord>,
    photo_index: DashMap<Scope, PhotoId>,
    contours: DashMap<ContourId, ContourRecord>,
    contour_versions: DashMap<Scope, u32>,
    contour_latest: DashMap<Scope, ContourId>,
}

impl MemoryMetaStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MetadataStore for MemoryMetaStore {
    async fn insert_volume(&self, record: VolumeRecord) -> Result<()> {
        self.volumes.insert(record.id, record);
        Ok(())
    }

    async fn get_volume(&self, id: VolumeId) -> Result<Option<VolumeRecord>> {
        Ok(self.volumes.get(&id).map(|r| r.value().clone()))
    }

    async fn insert_photo(&self, photo: NewPhoto) -> Result<PhotoRecord> {
        let scope = (photo.author, photo.volume, photo.slice);
        let id = PhotoId::new();
        match self.photo_index.entry(scope) {
            dashmap::mapref::entry::Entry::Occupied(_) => {
                return Err(Error::conflict("photo already saved for this slice"));
            }
            dashmap::mapref::entry::Entry::Vacant(vacant) => {
                vacant.insert(id);
            }
        }
        let record = PhotoRecord {
            id,
            volume: photo.volume,
            slice: photo.slice,
            author: photo.author,
            name: photo.name,
            url: keys::photo(photo.author, id),
        };
        self.photos.insert(id, record.clone());
        Ok(record)
    }

    async fn get_photo(&self, id: PhotoId) -> Result<Option<PhotoRecord>> {
        Ok(self.photos.get(&id).map(|r| r.value().clone()))
    }

    async fn delete_photo(&self, id: PhotoId, author: UserId) -> Result<Option<PhotoRecord>> {
        let Some(record) = self.photos.get(&id).map(|r| r.value().clone()) else {
            return Ok(None);
        };
        if record.author != author {
            return Ok(None);
        }
        self.photos.remove(&id);
        self.photo_index
            .remove(&(record.author, record.volume, record.slice));
        Ok(Some(record))
    }

    async fn photos_for_user(&self, user: UserId) -> Result<Vec<PhotoRecord>> {
        let mut photos: Vec<PhotoRecord> = self
            .photos
            .iter()
            .filter(|entry| entry.value().author == user)
            .map(|entry| entry.value().clone())
            .collect();
        photos.sort_by_key(|p| p.id);
        Ok(photos)
    }

    async fn insert_contours(&self, contours: NewContours) -> Result<ContourRecord> {
        let scope = (contours.author, contours.volume, contours.slice);
        let id = ContourId::new();

        // The version entry lock serializes concurrent savers in one scope.
        let mut entry = self.contour_versions.entry(scope).or_insert(0);
        *entry += 1;
        let record = ContourRecord {
            id,
            volume: contours.volume,
            slice: contours.slice,
            author: contours.author,
            points: contours.points,
            version: *entry,
            url: keys::contour_photo(contours.author, id, *entry),
        };
        self.contours.insert(id, record.clone());
        self.contour_latest.insert(scope, id);
        drop(entry);

        Ok(record)
    }

    async fn latest_contours(
        &self,
        volume: VolumeId,
        slice: SliceIndex,
        author: UserId,
    ) -> Result<Option<ContourRecord>> {
        let scope = (author, volume, slice);
        let Some(id) = self.contour_latest.get(&scope).map(|e| *e.value()) else {
            return Ok(None);
        };
        Ok(self.contours.get(&id).map(|r| r.value().clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn volume_record(owner: Option<UserId>, is_public: bool) -> VolumeRecord {
        VolumeRecord {
            id: VolumeId::new(),
            filename: "scan.nii".to_string(),
            size_bytes: 1024,
            slice_count: 10,
            owner,
            is_public,
        }
    }

    #[tokio::test]
    async fn test_volume_roundtrip() {
        let store = MemoryMetaStore::new();
        let record = volume_record(None, true);
        store.insert_volume(record.clone()).await.unwrap();
        assert_eq!(store.get_volume(record.id).await.unwrap(), Some(record));
    }

    #[tokio::test]
    async fn test_duplicate_photo_is_conflict() {
        let store = MemoryMetaStore::new();
        let author = UserId::new();
        let volume = VolumeId::new();
        let new = NewPhoto {
            volume,
            slice: 3,
            author,
            name: "3.png".to_string(),
        };
        store.insert_photo(new.clone()).await.unwrap();
        let err = store.insert_photo(new).await.unwrap_err();
        assert!(matches!(err, Error::Conflict(_)));
    }

    #[tokio::test]
    async fn test_contour_versions_are_monotonic_per_scope() {
        let store = MemoryMetaStore::new();
        let author = UserId::new();
        let volume = VolumeId::new();
        let new = || NewContours {
            volume,
            slice: 1,
            author,
            points: ContourSet::default(),
        };
        let first = store.insert_contours(new()).await.unwrap();
        let second = store.insert_contours(new()).await.unwrap();
        assert_eq!(first.version, 1);
        assert_eq!(second.version, 2);
        assert!(second.url.ends_with("_version_2.png"));

        let latest = store
            .latest_contours(volume, 1, author)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(latest.id, second.id);
    }

    #[tokio::test]
    async fn test_delete_photo_requires_author() {
        let store = MemoryMetaStore::new();
        let author = UserId::new();
        let photo = store
            .insert_photo(NewPhoto {
                volume: VolumeId::new(),
                slice: 0,
                author,
                name: "0.png".to_string(),
            })
            .await
            .unwrap();

        assert!(
            store
                .delete_photo(photo.id, UserId::new())
                .await
                .unwrap()
                .is_none()
        );
        assert!(
            store
                .delete_photo(photo.id, author)
                .await
                .unwrap()
                .is_some()
        );
        // Scope freed: the same slice can be saved again.
        store
            .insert_photo(NewPhoto {
                volume: photo.volume,
                slice: 0,
                author,
                name: "0.png".to_string(),
            })
            .await
            .unwrap();
    }
}

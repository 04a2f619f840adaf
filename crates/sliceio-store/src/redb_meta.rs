//! Embedded metadata store backed by redb.
//!
//! Values are bincode-encoded records keyed by canonical UUID strings.
//! Photo uniqueness and contour version allocation each happen inside a
//! single write transaction, so concurrent writers serialize on commit
//! rather than racing a read-then-write.

use crate::meta::{ContourRecord, MetadataStore, NewContours, NewPhoto, PhotoRecord, VolumeRecord};
use crate::keys;
use async_trait::async_trait;
use redb::{Database, ReadableTable, TableDefinition};
use sliceio_common::{ContourId, Error, PhotoId, Result, SliceIndex, UserId, VolumeId};
use std::path::Path;

const VOLUMES: TableDefinition<&str, &[u8]> = TableDefinition::new("volumes");
const PHOTOS: TableDefinition<&str, &[u8]> = TableDefinition::new("photos");
// Key: "author/volume/slice", Value: photo uuid
const PHOTO_INDEX: TableDefinition<&str, &str> = TableDefinition::new("photo_index");
const CONTOURS: TableDefinition<&str, &[u8]> = TableDefinition::new("contours");
// Key: "author/volume/slice", Value: bincode (latest version, contour uuid)
const CONTOUR_LATEST: TableDefinition<&str, &[u8]> = TableDefinition::new("contour_latest");

fn scope_key(author: UserId, volume: VolumeId, slice: SliceIndex) -> String {
    format!("{author}/{volume}/{slice}")
}

fn store_err(e: impl ToString) -> Error {
    Error::store_unavailable(e)
}

/// Persistent metadata store backed by redb.
pub struct RedbMetaStore {
    db: Database,
}

impl RedbMetaStore {
    /// Open (or create) the redb database at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(store_err)?;
        }
        let db = Database::create(path).map_err(store_err)?;

        // Create all tables eagerly so later read txns don't fail
        let write_txn = db.begin_write().map_err(store_err)?;
        {
            let _t = write_txn.open_table(VOLUMES).map_err(store_err)?;
            let _t = write_txn.open_table(PHOTOS).map_err(store_err)?;
            let _t = write_txn.open_table(PHOTO_INDEX).map_err(store_err)?;
            let _t = write_txn.open_table(CONTOURS).map_err(store_err)?;
            let _t = write_txn.open_table(CONTOUR_LATEST).map_err(store_err)?;
        }
        write_txn.commit().map_err(store_err)?;

        Ok(Self { db })
    }

    fn read_record<T: serde::de::DeserializeOwned>(
        &self,
        table: TableDefinition<&str, &[u8]>,
        key: &str,
    ) -> Result<Option<T>> {
        let read_txn = self.db.begin_read().map_err(store_err)?;
        let table = read_txn.open_table(table).map_err(store_err)?;
        match table.get(key).map_err(store_err)? {
            Some(guard) => Ok(Some(bincode::deserialize(guard.value()).map_err(store_err)?)),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl MetadataStore for RedbMetaStore {
    async fn insert_volume(&self, record: VolumeRecord) -> Result<()> {
        let bytes = bincode::serialize(&record).map_err(store_err)?;
        let write_txn = self.db.begin_write().map_err(store_err)?;
        {
            let mut table = write_txn.open_table(VOLUMES).map_err(store_err)?;
            table
                .insert(record.id.to_string().as_str(), bytes.as_slice())
                .map_err(store_err)?;
        }
        write_txn.commit().map_err(store_err)?;
        Ok(())
    }

    async fn get_volume(&self, id: VolumeId) -> Result<Option<VolumeRecord>> {
        self.read_record(VOLUMES, &id.to_string())
    }

    async fn insert_photo(&self, photo: NewPhoto) -> Result<PhotoRecord> {
        let id = PhotoId::new();
        let record = PhotoRecord {
            id,
            volume: photo.volume,
            slice: photo.slice,
            author: photo.author,
            name: photo.name,
            url: keys::photo(photo.author, id),
        };
        let bytes = bincode::serialize(&record).map_err(store_err)?;
        let scope = scope_key(photo.author, photo.volume, photo.slice);

        let write_txn = self.db.begin_write().map_err(store_err)?;
        {
            let mut index = write_txn.open_table(PHOTO_INDEX).map_err(store_err)?;
            if index.get(scope.as_str()).map_err(store_err)?.is_some() {
                return Err(Error::conflict("photo already saved for this slice"));
            }
            index
                .insert(scope.as_str(), id.to_string().as_str())
                .map_err(store_err)?;

            let mut photos = write_txn.open_table(PHOTOS).map_err(store_err)?;
            photos
                .insert(id.to_string().as_str(), bytes.as_slice())
                .map_err(store_err)?;
        }
        write_txn.commit().map_err(store_err)?;
        Ok(record)
    }

    async fn get_photo(&self, id: PhotoId) -> Result<Option<PhotoRecord>> {
        self.read_record(PHOTOS, &id.to_string())
    }

    async fn delete_photo(&self, id: PhotoId, author: UserId) -> Result<Option<PhotoRecord>> {
        let Some(record) = self.get_photo(id).await? else {
            return Ok(None);
        };
        if record.author != author {
            return Ok(None);
        }

        let scope = scope_key(record.author, record.volume, record.slice);
        let write_txn = self.db.begin_write().map_err(store_err)?;
        {
            let mut photos = write_txn.open_table(PHOTOS).map_err(store_err)?;
            photos.remove(id.to_string().as_str()).map_err(store_err)?;
            let mut index = write_txn.open_table(PHOTO_INDEX).map_err(store_err)?;
            index.remove(scope.as_str()).map_err(store_err)?;
        }
        write_txn.commit().map_err(store_err)?;
        Ok(Some(record))
    }

    async fn photos_for_user(&self, user: UserId) -> Result<Vec<PhotoRecord>> {
        let read_txn = self.db.begin_read().map_err(store_err)?;
        let table = read_txn.open_table(PHOTOS).map_err(store_err)?;
        let mut photos = Vec::new();
        for entry in table.iter().map_err(store_err)? {
            let entry = entry.map_err(store_err)?;
            let record: PhotoRecord =
                bincode::deserialize(entry.1.value()).map_err(store_err)?;
            if record.author == user {
                photos.push(record);
            }
        }
        photos.sort_by_key(|p| p.id);
        Ok(photos)
    }

    async fn insert_contours(&self, contours: NewContours) -> Result<ContourRecord> {
        let id = ContourId::new();
        let scope = scope_key(contours.author, contours.volume, contours.slice);

        let write_txn = self.db.begin_write().map_err(store_err)?;
        let record;
        {
            let mut latest = write_txn.open_table(CONTOUR_LATEST).map_err(store_err)?;
            let version = match latest.get(scope.as_str()).map_err(store_err)? {
                Some(guard) => {
                    let (version, _): (u32, String) =
                        bincode::deserialize(guard.value()).map_err(store_err)?;
                    version + 1
                }
                None => 1,
            };

            record = ContourRecord {
                id,
                volume: contours.volume,
                slice: contours.slice,
                author: contours.author,
                points: contours.points,
                version,
                url: keys::contour_photo(contours.author, id, version),
            };

            let latest_bytes =
                bincode::serialize(&(version, id.to_string())).map_err(store_err)?;
            latest
                .insert(scope.as_str(), latest_bytes.as_slice())
                .map_err(store_err)?;

            let bytes = bincode::serialize(&record).map_err(store_err)?;
            let mut table = write_txn.open_table(CONTOURS).map_err(store_err)?;
            table
                .insert(id.to_string().as_str(), bytes.as_slice())
                .map_err(store_err)?;
        }
        write_txn.commit().map_err(store_err)?;
        Ok(record)
    }

    async fn latest_contours(
        &self,
        volume: VolumeId,
        slice: SliceIndex,
        author: UserId,
    ) -> Result<Option<ContourRecord>> {
        let scope = scope_key(author, volume, slice);
        let latest: Option<(u32, String)> = self.read_record(CONTOUR_LATEST, &scope)?;
        let Some((_, id)) = latest else {
            return Ok(None);
        };
        self.read_record(CONTOURS, &id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sliceio_engine::ContourSet;

    fn open_store() -> (tempfile::TempDir, RedbMetaStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = RedbMetaStore::open(dir.path().join("meta.redb")).unwrap();
        (dir, store)
    }

    #[tokio::test]
    async fn test_volume_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("meta.redb");
        let record = VolumeRecord {
            id: VolumeId::new(),
            filename: "scan.nii".to_string(),
            size_bytes: 2048,
            slice_count: 7,
            owner: Some(UserId::new()),
            is_public: false,
        };

        {
            let store = RedbMetaStore::open(&path).unwrap();
            store.insert_volume(record.clone()).await.unwrap();
        }

        let store = RedbMetaStore::open(&path).unwrap();
        assert_eq!(store.get_volume(record.id).await.unwrap(), Some(record));
    }

    #[tokio::test]
    async fn test_photo_uniqueness_in_one_txn() {
        let (_dir, store) = open_store();
        let new = NewPhoto {
            volume: VolumeId::new(),
            slice: 2,
            author: UserId::new(),
            name: "2.png".to_string(),
        };
        store.insert_photo(new.clone()).await.unwrap();
        assert!(matches!(
            store.insert_photo(new).await.unwrap_err(),
            Error::Conflict(_)
        ));
    }

    #[tokio::test]
    async fn test_contour_version_allocation() {
        let (_dir, store) = open_store();
        let author = UserId::new();
        let volume = VolumeId::new();
        let new = || NewContours {
            volume,
            slice: 4,
            author,
            points: ContourSet {
                points: vec![vec![[0.0, 0.0], [1.0, 1.0]]],
            },
        };

        let first = store.insert_contours(new()).await.unwrap();
        let second = store.insert_contours(new()).await.unwrap();
        assert_eq!((first.version, second.version), (1, 2));

        let latest = store
            .latest_contours(volume, 4, author)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(latest.id, second.id);
        assert_eq!(latest.points, second.points);
    }
}

//! Object-store key layout.
//!
//! Shared interop surface — existing objects were written under these keys,
//! so the layout must be reproduced bit-for-bit. Pinned by the tests below.

use sliceio_common::{ContourId, PhotoId, UserId, VolumeId};

/// Raw uploaded volume: `files/{volume_id}.nii` (private bucket).
#[must_use]
pub fn raw_volume(id: VolumeId) -> String {
    format!("files/{id}.nii")
}

/// Pre-parsed processed volume: `files/{volume_id}.nii.processed`
/// (private bucket).
#[must_use]
pub fn processed_volume(id: VolumeId) -> String {
    format!("files/{id}.nii.processed")
}

/// Rendered saved photo: `{owner}/{photo_id}.png` (public bucket).
#[must_use]
pub fn photo(owner: UserId, id: PhotoId) -> String {
    format!("{owner}/{id}.png")
}

/// Rendered contour annotation:
/// `contour/{owner}/{contour_id}_version_{version}.png` (public bucket).
#[must_use]
pub fn contour_photo(owner: UserId, id: ContourId, version: u32) -> String {
    format!("contour/{owner}/{id}_version_{version}.png")
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    const VOLUME: &str = "6f1c7f3a-2b9e-4c4d-8a5e-1d2f3a4b5c6d";
    const OWNER: &str = "0a1b2c3d-4e5f-6071-8293-a4b5c6d7e8f9";

    #[test]
    fn test_volume_key_layout() {
        let id = VolumeId::from_uuid(Uuid::parse_str(VOLUME).unwrap());
        assert_eq!(
            raw_volume(id),
            "files/6f1c7f3a-2b9e-4c4d-8a5e-1d2f3a4b5c6d.nii"
        );
        assert_eq!(
            processed_volume(id),
            "files/6f1c7f3a-2b9e-4c4d-8a5e-1d2f3a4b5c6d.nii.processed"
        );
    }

    #[test]
    fn test_artifact_key_layout() {
        let owner = UserId::from_uuid(Uuid::parse_str(OWNER).unwrap());
        let photo_id = PhotoId::from_uuid(Uuid::parse_str(VOLUME).unwrap());
        let contour_id = ContourId::from_uuid(Uuid::parse_str(VOLUME).unwrap());
        assert_eq!(
            photo(owner, photo_id),
            "0a1b2c3d-4e5f-6071-8293-a4b5c6d7e8f9/6f1c7f3a-2b9e-4c4d-8a5e-1d2f3a4b5c6d.png"
        );
        assert_eq!(
            contour_photo(owner, contour_id, 3),
            "contour/0a1b2c3d-4e5f-6071-8293-a4b5c6d7e8f9/6f1c7f3a-2b9e-4c4d-8a5e-1d2f3a4b5c6d_version_3.png"
        );
    }
}

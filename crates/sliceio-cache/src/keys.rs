//! Cache key namespaces.
//!
//! The string layout is an interop surface shared with other consumers of
//! the same cache and must be reproduced bit-for-bit; the tests below pin
//! it with literals.

use sliceio_common::{SliceIndex, VolumeId};
use std::fmt;

/// A namespaced cache key.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CacheKey {
    /// Full volume tensor: `file:{volume_id}`
    Volume(VolumeId),
    /// Authorization snapshot: `file_metadata:{volume_id}`
    VolumeMeta(VolumeId),
    /// Rendered overlay composite: `result:{volume_id}:{slice}`
    Overlay(VolumeId, SliceIndex),
    /// Rendered base slice: `img:{volume_id}:{slice}`
    SliceImage(VolumeId, SliceIndex),
    /// Traced contour polygons: `contours:{volume_id}:{slice}`
    Contours(VolumeId, SliceIndex),
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Volume(id) => write!(f, "file:{id}"),
            Self::VolumeMeta(id) => write!(f, "file_metadata:{id}"),
            Self::Overlay(id, slice) => write!(f, "result:{id}:{slice}"),
            Self::SliceImage(id, slice) => write!(f, "img:{id}:{slice}"),
            Self::Contours(id, slice) => write!(f, "contours:{id}:{slice}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn fixed_id() -> VolumeId {
        VolumeId::from_uuid(Uuid::parse_str("6f1c7f3a-2b9e-4c4d-8a5e-1d2f3a4b5c6d").unwrap())
    }

    #[test]
    fn test_key_layout_is_pinned() {
        let id = fixed_id();
        assert_eq!(
            CacheKey::Volume(id).to_string(),
            "file:6f1c7f3a-2b9e-4c4d-8a5e-1d2f3a4b5c6d"
        );
        assert_eq!(
            CacheKey::VolumeMeta(id).to_string(),
            "file_metadata:6f1c7f3a-2b9e-4c4d-8a5e-1d2f3a4b5c6d"
        );
        assert_eq!(
            CacheKey::Overlay(id, 5).to_string(),
            "result:6f1c7f3a-2b9e-4c4d-8a5e-1d2f3a4b5c6d:5"
        );
        assert_eq!(
            CacheKey::SliceImage(id, 5).to_string(),
            "img:6f1c7f3a-2b9e-4c4d-8a5e-1d2f3a4b5c6d:5"
        );
        assert_eq!(
            CacheKey::Contours(id, 5).to_string(),
            "contours:6f1c7f3a-2b9e-4c4d-8a5e-1d2f3a4b5c6d:5"
        );
    }

    #[test]
    fn test_namespaces_do_not_collide() {
        let id = fixed_id();
        let keys = [
            CacheKey::Volume(id).to_string(),
            CacheKey::VolumeMeta(id).to_string(),
            CacheKey::Overlay(id, 0).to_string(),
            CacheKey::SliceImage(id, 0).to_string(),
            CacheKey::Contours(id, 0).to_string(),
        ];
        for (i, a) in keys.iter().enumerate() {
            for b in keys.iter().skip(i + 1) {
                assert_ne!(a, b);
            }
        }
    }
}

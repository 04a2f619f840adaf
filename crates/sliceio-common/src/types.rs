//! Core type definitions for SliceIO
//!
//! Identifiers for volumes, users, and derived artifacts, plus the
//! authorization-relevant metadata snapshot shared between tiers.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Index of a single 2-D slice along a volume's last axis.
pub type SliceIndex = u32;

macro_rules! uuid_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(Uuid);

        impl $name {
            /// Generate a new random identifier
            #[must_use]
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Create from an existing UUID
            #[must_use]
            pub const fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Get the underlying UUID
            #[must_use]
            pub const fn as_uuid(&self) -> Uuid {
                self.0
            }

            /// Parse from the canonical hyphenated form
            pub fn parse(s: &str) -> Result<Self, uuid::Error> {
                Uuid::parse_str(s).map(Self)
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl From<Uuid> for $name {
            fn from(uuid: Uuid) -> Self {
                Self(uuid)
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!(stringify!($name), "({})"), self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

uuid_id! {
    /// Unique identifier for an uploaded volume
    VolumeId
}

uuid_id! {
    /// Unique identifier for a user
    UserId
}

uuid_id! {
    /// Unique identifier for a saved photo
    PhotoId
}

uuid_id! {
    /// Unique identifier for a saved contour annotation
    ContourId
}

uuid_id! {
    /// Per-request correlation identifier, attached to every log line and
    /// terminal error produced while handling that request
    RequestId
}

/// The identity a request is executed under.
///
/// Authentication happens upstream; by the time the pipeline runs, the
/// caller is either anonymous or an already-resolved user.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Identity {
    Anonymous,
    User(UserId),
}

impl Identity {
    /// The user id, if this identity is authenticated.
    #[must_use]
    pub const fn user_id(&self) -> Option<UserId> {
        match self {
            Self::Anonymous => None,
            Self::User(id) => Some(*id),
        }
    }
}

/// Cached projection of a volume's authorization-relevant fields.
///
/// Lives in the volatile cache under `file_metadata:{id}` so reads avoid a
/// metadata-store round-trip. Staleness is bounded by the cache TTL.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeMeta {
    /// Number of slices along the volume's last axis
    pub slice_count: u32,
    /// Owning user, if the upload was authenticated
    pub owner: Option<UserId>,
    /// Whether any identity may read this volume
    pub is_public: bool,
}

impl VolumeMeta {
    /// Whether the given identity may read the volume.
    #[must_use]
    pub fn accessible_by(&self, identity: Identity) -> bool {
        self.is_public || (self.owner.is_some() && self.owner == identity.user_id())
    }

    /// Whether `slice` is within bounds (zero-indexed, exclusive upper bound).
    #[must_use]
    pub const fn slice_in_bounds(&self, slice: SliceIndex) -> bool {
        slice < self.slice_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_display_roundtrip() {
        let id = VolumeId::new();
        let parsed = VolumeId::parse(&id.to_string()).unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn test_public_volume_accessible_by_anyone() {
        let meta = VolumeMeta {
            slice_count: 10,
            owner: Some(UserId::new()),
            is_public: true,
        };
        assert!(meta.accessible_by(Identity::Anonymous));
        assert!(meta.accessible_by(Identity::User(UserId::new())));
    }

    #[test]
    fn test_private_volume_owner_only() {
        let owner = UserId::new();
        let meta = VolumeMeta {
            slice_count: 10,
            owner: Some(owner),
            is_public: false,
        };
        assert!(meta.accessible_by(Identity::User(owner)));
        assert!(!meta.accessible_by(Identity::User(UserId::new())));
        assert!(!meta.accessible_by(Identity::Anonymous));
    }

    #[test]
    fn test_slice_bounds_are_zero_indexed() {
        let meta = VolumeMeta {
            slice_count: 10,
            owner: None,
            is_public: true,
        };
        assert!(meta.slice_in_bounds(0));
        assert!(meta.slice_in_bounds(9));
        assert!(!meta.slice_in_bounds(10));
    }
}

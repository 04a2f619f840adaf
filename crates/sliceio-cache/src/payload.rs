//! Tagged cache payloads.
//!
//! Every namespace holds one payload kind, and every serialized entry
//! leads with a one-byte kind tag, so a value can never be misread under
//! the wrong namespace. Binary payloads (rendered PNGs) are stored raw
//! after the tag; structured payloads go through bincode.

use bytes::Bytes;
use sliceio_common::VolumeMeta;
use sliceio_engine::ContourSet;
use sliceio_volume::Volume;
use thiserror::Error;

const TAG_VOLUME: u8 = 1;
const TAG_META: u8 = 2;
const TAG_OVERLAY: u8 = 3;
const TAG_SLICE_IMAGE: u8 = 4;
const TAG_CONTOURS: u8 = 5;

/// Error type for payload decoding
#[derive(Debug, Error)]
pub enum PayloadError {
    #[error("empty payload")]
    Empty,

    #[error("unknown payload tag: {0}")]
    UnknownTag(u8),

    #[error("payload body decode failed: {0}")]
    Decode(#[from] bincode::Error),
}

/// A value held by the volatile cache.
#[derive(Clone, Debug, PartialEq)]
pub enum CachePayload {
    /// Parsed, normalized volume tensor
    Volume(Volume),
    /// Authorization metadata snapshot
    Meta(VolumeMeta),
    /// Rendered overlay composite PNG
    Overlay(Bytes),
    /// Rendered base slice PNG
    SliceImage(Bytes),
    /// Traced contour polygons
    Contours(ContourSet),
}

impl CachePayload {
    /// Serialize to the tagged wire form.
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        match self {
            Self::Volume(volume) => tagged(
                TAG_VOLUME,
                &bincode::serialize(volume).expect("serialize volume"),
            ),
            Self::Meta(meta) => {
                tagged(TAG_META, &bincode::serialize(meta).expect("serialize meta"))
            }
            Self::Overlay(png) => tagged(TAG_OVERLAY, png),
            Self::SliceImage(png) => tagged(TAG_SLICE_IMAGE, png),
            Self::Contours(contours) => tagged(
                TAG_CONTOURS,
                &bincode::serialize(contours).expect("serialize contours"),
            ),
        }
    }

    /// Deserialize from the tagged wire form.
    pub fn decode(bytes: &[u8]) -> Result<Self, PayloadError> {
        let (&tag, body) = bytes.split_first().ok_or(PayloadError::Empty)?;
        match tag {
            TAG_VOLUME => Ok(Self::Volume(bincode::deserialize(body)?)),
            TAG_META => Ok(Self::Meta(bincode::deserialize(body)?)),
            TAG_OVERLAY => Ok(Self::Overlay(Bytes::copy_from_slice(body))),
            TAG_SLICE_IMAGE => Ok(Self::SliceImage(Bytes::copy_from_slice(body))),
            TAG_CONTOURS => Ok(Self::Contours(bincode::deserialize(body)?)),
            other => Err(PayloadError::UnknownTag(other)),
        }
    }

    #[must_use]
    pub fn into_volume(self) -> Option<Volume> {
        match self {
            Self::Volume(v) => Some(v),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_meta(&self) -> Option<&VolumeMeta> {
        match self {
            Self::Meta(m) => Some(m),
            _ => None,
        }
    }

    #[must_use]
    pub fn into_png(self) -> Option<Bytes> {
        match self {
            Self::Overlay(b) | Self::SliceImage(b) => Some(b),
            _ => None,
        }
    }

    #[must_use]
    pub fn into_contours(self) -> Option<ContourSet> {
        match self {
            Self::Contours(c) => Some(c),
            _ => None,
        }
    }
}

fn tagged(tag: u8, body: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(1 + body.len());
    out.push(tag);
    out.extend_from_slice(body);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use sliceio_common::{Identity, UserId};

    #[test]
    fn test_meta_roundtrip() {
        let meta = VolumeMeta {
            slice_count: 12,
            owner: Some(UserId::new()),
            is_public: false,
        };
        let decoded = CachePayload::decode(&CachePayload::Meta(meta).encode()).unwrap();
        assert_eq!(decoded.as_meta(), Some(&meta));
        assert!(!decoded.as_meta().unwrap().accessible_by(Identity::Anonymous));
    }

    #[test]
    fn test_png_payload_stored_raw_after_tag() {
        let png = Bytes::from_static(b"\x89PNG\r\n\x1a\nrest");
        let encoded = CachePayload::Overlay(png.clone()).encode();
        assert_eq!(encoded[0], TAG_OVERLAY);
        assert_eq!(&encoded[1..], png.as_ref());
    }

    #[test]
    fn test_kind_tag_prevents_cross_namespace_decode() {
        let contours = ContourSet {
            points: vec![vec![[1.0, 2.0], [3.0, 4.0]]],
        };
        let decoded = CachePayload::decode(&CachePayload::Contours(contours).encode()).unwrap();
        assert!(decoded.clone().into_volume().is_none());
        assert!(decoded.into_contours().is_some());
    }

    #[test]
    fn test_unknown_tag_is_rejected() {
        assert!(matches!(
            CachePayload::decode(&[99, 1, 2, 3]),
            Err(PayloadError::UnknownTag(99))
        ));
        assert!(matches!(
            CachePayload::decode(&[]),
            Err(PayloadError::Empty)
        ));
    }
}

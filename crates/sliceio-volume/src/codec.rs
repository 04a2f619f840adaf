//! Framed binary codec for the processed volume form.
//!
//! The durable object `files/{id}.nii.processed` carries an already-parsed,
//! normalized volume so cold reads skip NIfTI parsing. The frame is
//! magic + version + crc32c + bincode payload; decoding verifies the
//! checksum before touching the payload.
//!
//! # Frame layout
//! ```text
//! [0..4)   magic    "SLVC"
//! [4]      version  1
//! [5..9)   crc32c   checksum of payload (little-endian)
//! [9..]    payload  bincode-encoded Volume
//! ```

use crate::volume::Volume;
use bytes::Bytes;
use thiserror::Error;

const MAGIC: &[u8; 4] = b"SLVC";
const VERSION: u8 = 1;
const PAYLOAD_START: usize = 9;

/// Error type for processed-volume decoding
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("frame too short: {0} bytes")]
    TooShort(usize),

    #[error("bad frame magic")]
    BadMagic,

    #[error("unsupported frame version: {0}")]
    UnsupportedVersion(u8),

    #[error("frame checksum mismatch: expected {expected:#010x}, got {actual:#010x}")]
    ChecksumMismatch { expected: u32, actual: u32 },

    #[error("payload decode failed: {0}")]
    Decode(#[from] bincode::Error),
}

/// Encode a volume into the framed processed form.
#[must_use]
pub fn encode_volume(volume: &Volume) -> Bytes {
    let payload = bincode::serialize(volume).expect("serialize volume");
    let mut out = Vec::with_capacity(PAYLOAD_START + payload.len());
    out.extend_from_slice(MAGIC);
    out.push(VERSION);
    out.extend_from_slice(&crc32c::crc32c(&payload).to_le_bytes());
    out.extend_from_slice(&payload);
    Bytes::from(out)
}

/// Decode a framed processed volume, verifying the checksum.
pub fn decode_volume(bytes: &[u8]) -> Result<Volume, CodecError> {
    if bytes.len() < PAYLOAD_START {
        return Err(CodecError::TooShort(bytes.len()));
    }
    if &bytes[0..4] != MAGIC {
        return Err(CodecError::BadMagic);
    }
    if bytes[4] != VERSION {
        return Err(CodecError::UnsupportedVersion(bytes[4]));
    }

    let expected = u32::from_le_bytes([bytes[5], bytes[6], bytes[7], bytes[8]]);
    let payload = &bytes[PAYLOAD_START..];
    let actual = crc32c::crc32c(payload);
    if actual != expected {
        return Err(CodecError::ChecksumMismatch { expected, actual });
    }

    Ok(bincode::deserialize(payload)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_volume() -> Volume {
        let data: Vec<f32> = (0..3 * 3 * 2).map(|i| i as f32 * 0.25).collect();
        Volume::new(3, 3, 2, data).unwrap()
    }

    #[test]
    fn test_roundtrip_is_exact() {
        let volume = sample_volume();
        let decoded = decode_volume(&encode_volume(&volume)).unwrap();
        assert_eq!(decoded, volume);
        assert_eq!(decoded.data(), volume.data());
    }

    #[test]
    fn test_detects_payload_corruption() {
        let mut bytes = encode_volume(&sample_volume()).to_vec();
        let last = bytes.len() - 1;
        bytes[last] ^= 0xFF;
        assert!(matches!(
            decode_volume(&bytes),
            Err(CodecError::ChecksumMismatch { .. })
        ));
    }

    #[test]
    fn test_rejects_bad_magic() {
        let mut bytes = encode_volume(&sample_volume()).to_vec();
        bytes[0] = b'X';
        assert!(matches!(decode_volume(&bytes), Err(CodecError::BadMagic)));
    }

    #[test]
    fn test_rejects_unknown_version() {
        let mut bytes = encode_volume(&sample_volume()).to_vec();
        bytes[4] = 9;
        assert!(matches!(
            decode_volume(&bytes),
            Err(CodecError::UnsupportedVersion(9))
        ));
    }

    #[test]
    fn test_rejects_short_frame() {
        assert!(matches!(
            decode_volume(b"SLVC"),
            Err(CodecError::TooShort(4))
        ));
    }
}

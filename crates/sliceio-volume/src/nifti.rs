//! Minimal NIfTI-1 reader and writer.
//!
//! Parses the 348-byte NIfTI-1 header plus voxel data from an uploaded
//! `.nii` payload, handling both byte orders and the common scalar
//! datatypes. Only the fields the pipeline needs are interpreted; the rest
//! of the header is ignored. The writer emits a canonical little-endian
//! float32 file and exists for fixtures and round-trip tests.

use crate::volume::Volume;
use thiserror::Error;

const HEADER_LEN: usize = 348;
/// Voxel data in a single-file `.nii` starts after the header + 4-byte
/// extension flag.
const DATA_OFFSET: usize = 352;

const DT_UINT8: i16 = 2;
const DT_INT16: i16 = 4;
const DT_INT32: i16 = 8;
const DT_FLOAT32: i16 = 16;
const DT_FLOAT64: i16 = 64;
const DT_UINT16: i16 = 512;

/// Error type for NIfTI parsing
#[derive(Debug, Error)]
pub enum NiftiError {
    #[error("payload too short for a NIfTI-1 header: {0} bytes")]
    TooShort(usize),

    #[error("not a NIfTI-1 payload (bad header size or magic)")]
    BadMagic,

    #[error("unsupported dimensionality: {0}")]
    UnsupportedDim(i16),

    #[error("unsupported datatype code: {0}")]
    UnsupportedDataType(i16),

    #[error("voxel data truncated: expected {expected} bytes, have {actual}")]
    Truncated { expected: usize, actual: usize },

    #[error("invalid dimensions: {0}x{1}x{2}")]
    InvalidShape(i16, i16, i16),
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Endian {
    Little,
    Big,
}

impl Endian {
    fn i16(self, b: &[u8]) -> i16 {
        let arr = [b[0], b[1]];
        match self {
            Self::Little => i16::from_le_bytes(arr),
            Self::Big => i16::from_be_bytes(arr),
        }
    }

    fn i32(self, b: &[u8]) -> i32 {
        let arr = [b[0], b[1], b[2], b[3]];
        match self {
            Self::Little => i32::from_le_bytes(arr),
            Self::Big => i32::from_be_bytes(arr),
        }
    }

    fn f32(self, b: &[u8]) -> f32 {
        let arr = [b[0], b[1], b[2], b[3]];
        match self {
            Self::Little => f32::from_le_bytes(arr),
            Self::Big => f32::from_be_bytes(arr),
        }
    }

    fn f64(self, b: &[u8]) -> f64 {
        let arr = [b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]];
        match self {
            Self::Little => f64::from_le_bytes(arr),
            Self::Big => f64::from_be_bytes(arr),
        }
    }

    fn u16(self, b: &[u8]) -> u16 {
        let arr = [b[0], b[1]];
        match self {
            Self::Little => u16::from_le_bytes(arr),
            Self::Big => u16::from_be_bytes(arr),
        }
    }
}

/// Parse an uploaded `.nii` payload into a raw (un-normalized) [`Volume`].
pub fn parse(bytes: &[u8]) -> Result<Volume, NiftiError> {
    if bytes.len() < HEADER_LEN {
        return Err(NiftiError::TooShort(bytes.len()));
    }

    let endian = match i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) {
        348 => Endian::Little,
        _ if i32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) == 348 => Endian::Big,
        _ => return Err(NiftiError::BadMagic),
    };

    // magic: "n+1\0" (single file) or "ni1\0" (hdr/img pair)
    let magic = &bytes[344..348];
    if magic != b"n+1\0" && magic != b"ni1\0" {
        return Err(NiftiError::BadMagic);
    }

    let ndim = endian.i16(&bytes[40..42]);
    if !(3..=7).contains(&ndim) {
        return Err(NiftiError::UnsupportedDim(ndim));
    }
    // Trailing dims beyond the third must be degenerate.
    for d in 4..=ndim as usize {
        let extent = endian.i16(&bytes[40 + 2 * d..42 + 2 * d]);
        if extent > 1 {
            return Err(NiftiError::UnsupportedDim(ndim));
        }
    }

    let (nx, ny, nz) = (
        endian.i16(&bytes[42..44]),
        endian.i16(&bytes[44..46]),
        endian.i16(&bytes[46..48]),
    );
    if nx <= 0 || ny <= 0 || nz <= 0 {
        return Err(NiftiError::InvalidShape(nx, ny, nz));
    }
    let (width, height, slices) = (nx as u32, ny as u32, nz as u32);
    let count = width as usize * height as usize * slices as usize;

    let datatype = endian.i16(&bytes[70..72]);
    let voxel_size = match datatype {
        DT_UINT8 => 1,
        DT_INT16 | DT_UINT16 => 2,
        DT_INT32 | DT_FLOAT32 => 4,
        DT_FLOAT64 => 8,
        other => return Err(NiftiError::UnsupportedDataType(other)),
    };

    let vox_offset = endian.f32(&bytes[108..112]);
    let offset = if vox_offset as usize >= HEADER_LEN {
        vox_offset as usize
    } else {
        DATA_OFFSET
    };

    let expected = offset + count * voxel_size;
    if bytes.len() < expected {
        return Err(NiftiError::Truncated {
            expected,
            actual: bytes.len(),
        });
    }

    let raw = &bytes[offset..expected];
    let mut data = Vec::with_capacity(count);
    match datatype {
        DT_UINT8 => data.extend(raw.iter().map(|&b| f32::from(b))),
        DT_INT16 => data.extend(raw.chunks_exact(2).map(|c| f32::from(endian.i16(c)))),
        DT_UINT16 => data.extend(raw.chunks_exact(2).map(|c| f32::from(endian.u16(c)))),
        DT_INT32 => data.extend(raw.chunks_exact(4).map(|c| endian.i32(c) as f32)),
        DT_FLOAT32 => data.extend(raw.chunks_exact(4).map(|c| endian.f32(c))),
        DT_FLOAT64 => data.extend(raw.chunks_exact(8).map(|c| endian.f64(c) as f32)),
        _ => unreachable!(),
    }

    Volume::new(width, height, slices, data)
        .ok_or(NiftiError::InvalidShape(nx, ny, nz))
}

/// Encode a [`Volume`] as a canonical little-endian float32 `.nii` payload.
#[must_use]
pub fn encode(volume: &Volume) -> Vec<u8> {
    let count = volume.data().len();
    let mut out = vec![0u8; DATA_OFFSET + count * 4];

    out[0..4].copy_from_slice(&348i32.to_le_bytes());
    // dim[0] = 3, dim[1..3] = extents, the rest stay 1
    out[40..42].copy_from_slice(&3i16.to_le_bytes());
    out[42..44].copy_from_slice(&(volume.width() as i16).to_le_bytes());
    out[44..46].copy_from_slice(&(volume.height() as i16).to_le_bytes());
    out[46..48].copy_from_slice(&(volume.slice_count() as i16).to_le_bytes());
    for d in 4..8 {
        out[40 + 2 * d..42 + 2 * d].copy_from_slice(&1i16.to_le_bytes());
    }
    out[70..72].copy_from_slice(&DT_FLOAT32.to_le_bytes());
    out[72..74].copy_from_slice(&32i16.to_le_bytes());
    out[108..112].copy_from_slice(&(DATA_OFFSET as f32).to_le_bytes());
    out[344..348].copy_from_slice(b"n+1\0");

    for (i, v) in volume.data().iter().enumerate() {
        out[DATA_OFFSET + i * 4..DATA_OFFSET + i * 4 + 4].copy_from_slice(&v.to_le_bytes());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_volume() -> Volume {
        let data: Vec<f32> = (0..2 * 3 * 4).map(|i| i as f32).collect();
        Volume::new(2, 3, 4, data).unwrap()
    }

    #[test]
    fn test_roundtrip_float32() {
        let volume = sample_volume();
        let parsed = parse(&encode(&volume)).unwrap();
        assert_eq!(parsed, volume);
    }

    #[test]
    fn test_rejects_short_payload() {
        assert!(matches!(parse(&[0u8; 64]), Err(NiftiError::TooShort(64))));
    }

    #[test]
    fn test_rejects_bad_magic() {
        let mut bytes = encode(&sample_volume());
        bytes[344] = b'x';
        assert!(matches!(parse(&bytes), Err(NiftiError::BadMagic)));
    }

    #[test]
    fn test_rejects_garbage_header() {
        assert!(parse(&[0xFFu8; 512]).is_err());
    }

    #[test]
    fn test_rejects_truncated_data() {
        let mut bytes = encode(&sample_volume());
        bytes.truncate(bytes.len() - 8);
        assert!(matches!(parse(&bytes), Err(NiftiError::Truncated { .. })));
    }

    #[test]
    fn test_rejects_unsupported_datatype() {
        let mut bytes = encode(&sample_volume());
        // datatype 32 = complex64, not supported
        bytes[70..72].copy_from_slice(&32i16.to_le_bytes());
        assert!(matches!(
            parse(&bytes),
            Err(NiftiError::UnsupportedDataType(32))
        ));
    }

    #[test]
    fn test_big_endian_header() {
        let volume = sample_volume();
        let le = encode(&volume);
        // Rewrite header and data big-endian.
        let mut be = le.clone();
        be[0..4].copy_from_slice(&348i32.to_be_bytes());
        for d in 0..8 {
            let v = i16::from_le_bytes([le[40 + 2 * d], le[41 + 2 * d]]);
            be[40 + 2 * d..42 + 2 * d].copy_from_slice(&v.to_be_bytes());
        }
        be[70..72].copy_from_slice(&DT_FLOAT32.to_be_bytes());
        be[108..112].copy_from_slice(&(DATA_OFFSET as f32).to_be_bytes());
        for i in 0..volume.data().len() {
            let v = f32::from_le_bytes(le[352 + i * 4..356 + i * 4].try_into().unwrap());
            be[352 + i * 4..356 + i * 4].copy_from_slice(&v.to_be_bytes());
        }
        assert_eq!(parse(&be).unwrap(), volume);
    }
}

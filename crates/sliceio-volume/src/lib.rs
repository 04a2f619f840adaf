//! SliceIO Volume - 3-D scan representation and codecs
//!
//! An uploaded scan is parsed into a [`Volume`], normalized once at ingest,
//! and thereafter treated as immutable. The processed form written to
//! durable storage uses the framed binary codec in [`codec`], which
//! round-trips shape and values exactly.

pub mod codec;
pub mod nifti;
mod volume;

pub use codec::{CodecError, decode_volume, encode_volume};
pub use nifti::NiftiError;
pub use volume::{Slice, Volume};

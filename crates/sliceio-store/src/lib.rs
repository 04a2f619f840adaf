//! SliceIO Store - the durable tiers
//!
//! The object store is the system of record for bytes; the metadata store
//! is the system of record for structured attributes and authorization.
//! Both are seams: the HTTP object-store client and the embedded redb
//! metadata store are the shipped implementations, and the in-memory
//! variants back development and tests.

pub mod keys;
mod meta;
mod object;
mod redb_meta;

pub use meta::{
    ContourRecord, MemoryMetaStore, MetadataStore, NewContours, NewPhoto, PhotoRecord,
    VolumeRecord,
};
pub use object::{HttpObjectStore, MemoryObjectStore, ObjectStore};
pub use redb_meta::RedbMetaStore;

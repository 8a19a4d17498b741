//! Persisted state blobs.

pub mod local;

pub use local::{BlobStorage, BlobWriter, FileStorage, MemoryStorage, StagedBlob, load_or_default};

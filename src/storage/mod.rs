pub mod local;
pub mod memory;
pub mod s3;
pub mod sigv4;

use crate::error::StorageError;
use async_trait::async_trait;
use std::path::Path;

pub use local::LocalStore;
pub use memory::MemoryStore;
pub use s3::S3Store;

/// Whole-object storage primitives. Objects are addressed by bucket and key
/// and always transferred through a local file.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// `Ok(false)` only when the backend reports the object as absent.
    async fn exists(&self, bucket: &str, key: &str) -> Result<bool, StorageError>;

    async fn download(&self, bucket: &str, key: &str, local_path: &Path)
        -> Result<(), StorageError>;

    /// Replaces any existing object.
    async fn upload(&self, local_path: &Path, bucket: &str, key: &str)
        -> Result<(), StorageError>;

    /// Deleting an absent object succeeds.
    async fn delete(&self, bucket: &str, key: &str) -> Result<(), StorageError>;
}

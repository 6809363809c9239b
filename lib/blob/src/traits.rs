use crate::error::BlobError;

/// BlobStore provides storage for uploaded evidence files (bill scans).
///
/// Keys are path-like strings: `bills/42_1716900000_ab12cd34.pdf`.
/// The default implementation (`FileStore`) maps keys to local filesystem
/// paths. Can be swapped for S3/OSS backends by implementing this trait.
///
/// `delete` is idempotent: deleting a missing key is not an error, only
/// reported via the returned flag. Compensating cleanup after a failed
/// registration depends on that.
pub trait BlobStore: Send + Sync {
    /// Store a blob. Overwrites if the key already exists.
    fn put(&self, key: &str, data: &[u8]) -> Result<(), BlobError>;

    /// Retrieve a blob. Returns None if the key does not exist.
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, BlobError>;

    /// Delete a blob. Returns true if a file was actually removed.
    fn delete(&self, key: &str) -> Result<bool, BlobError>;

    /// Check whether a blob exists.
    fn exists(&self, key: &str) -> Result<bool, BlobError>;
}

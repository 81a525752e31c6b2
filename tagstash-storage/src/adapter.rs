//! Storage adapter trait for pluggable byte stores.
//!
//! The pool is generic over this trait. Paths are relative strings under the
//! adapter's root namespace; the pool never hands an adapter an absolute
//! path. All operations are synchronous - the cache has no async surface.

use tagstash_core::StorageError;

/// Byte-level storage over a rooted path namespace.
///
/// # Contract
///
/// - `read` fails with [`StorageError::NotFound`] for a missing file, and
///   with [`StorageError::Io`] for any other I/O failure.
/// - `write` creates parent directories as needed and must never expose a
///   partially written file as a valid record.
/// - `delete` is a no-op for an absent file.
/// - `delete_directory` removes a directory tree recursively and is a no-op
///   when the directory is absent.
pub trait StorageAdapter: Send + Sync + 'static {
    /// Read the full contents of a file.
    fn read(&self, path: &str) -> Result<Vec<u8>, StorageError>;

    /// Write a file, replacing any previous contents.
    fn write(&self, path: &str, bytes: &[u8]) -> Result<(), StorageError>;

    /// Delete a file if it exists.
    fn delete(&self, path: &str) -> Result<(), StorageError>;

    /// Check whether a file exists.
    fn file_exists(&self, path: &str) -> Result<bool, StorageError>;

    /// Create a directory (and parents) if it does not exist.
    fn create_directory(&self, path: &str) -> Result<(), StorageError>;

    /// Recursively delete a directory tree if it exists.
    fn delete_directory(&self, path: &str) -> Result<(), StorageError>;

    /// Check whether a directory exists.
    fn directory_exists(&self, path: &str) -> Result<bool, StorageError>;
}

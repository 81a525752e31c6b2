//! Filesystem implementation of the storage adapter.
//!
//! Writes go through a temporary sibling file followed by a rename, so a
//! reader never observes a partially written record as valid. There is no
//! cross-process locking: concurrent pools sharing one root are
//! last-writer-wins, as documented on the pool.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tagstash_core::StorageError;

use crate::adapter::StorageAdapter;

/// Storage adapter backed by a directory on the local filesystem.
pub struct FilesystemAdapter {
    root: PathBuf,
}

impl FilesystemAdapter {
    /// Create an adapter rooted at `root`, creating the directory if needed.
    pub fn new<P: AsRef<Path>>(root: P) -> Result<Self, StorageError> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root).map_err(|e| StorageError::Directory {
            path: root.display().to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self { root })
    }

    /// The root directory this adapter operates under.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &str) -> PathBuf {
        self.root.join(path)
    }

    fn io_error(path: &Path, e: std::io::Error) -> StorageError {
        if e.kind() == ErrorKind::NotFound {
            StorageError::NotFound {
                path: path.display().to_string(),
            }
        } else {
            StorageError::Io {
                path: path.display().to_string(),
                reason: e.to_string(),
            }
        }
    }
}

impl StorageAdapter for FilesystemAdapter {
    fn read(&self, path: &str) -> Result<Vec<u8>, StorageError> {
        let full = self.resolve(path);
        fs::read(&full).map_err(|e| Self::io_error(&full, e))
    }

    fn write(&self, path: &str, bytes: &[u8]) -> Result<(), StorageError> {
        let full = self.resolve(path);
        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent).map_err(|e| StorageError::Directory {
                path: parent.display().to_string(),
                reason: e.to_string(),
            })?;
        }

        // Temp-file + rename keeps half-written records invisible.
        let mut tmp = full.clone();
        let file_name = full
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        tmp.set_file_name(format!(".{file_name}.tmp"));

        fs::write(&tmp, bytes).map_err(|e| Self::io_error(&tmp, e))?;
        fs::rename(&tmp, &full).map_err(|e| Self::io_error(&full, e))
    }

    fn delete(&self, path: &str) -> Result<(), StorageError> {
        let full = self.resolve(path);
        match fs::remove_file(&full) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Self::io_error(&full, e)),
        }
    }

    fn file_exists(&self, path: &str) -> Result<bool, StorageError> {
        Ok(self.resolve(path).is_file())
    }

    fn create_directory(&self, path: &str) -> Result<(), StorageError> {
        let full = self.resolve(path);
        fs::create_dir_all(&full).map_err(|e| StorageError::Directory {
            path: full.display().to_string(),
            reason: e.to_string(),
        })
    }

    fn delete_directory(&self, path: &str) -> Result<(), StorageError> {
        let full = self.resolve(path);
        match fs::remove_dir_all(&full) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::Directory {
                path: full.display().to_string(),
                reason: e.to_string(),
            }),
        }
    }

    fn directory_exists(&self, path: &str) -> Result<bool, StorageError> {
        Ok(self.resolve(path).is_dir())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_adapter() -> (FilesystemAdapter, TempDir) {
        let temp_dir = TempDir::new().expect("TempDir creation should succeed");
        let adapter =
            FilesystemAdapter::new(temp_dir.path()).expect("adapter creation should succeed");
        (adapter, temp_dir)
    }

    #[test]
    fn test_write_and_read() {
        let (adapter, _temp_dir) = create_adapter();
        adapter
            .write("cache/a", b"payload")
            .expect("write should succeed");
        assert_eq!(
            adapter.read("cache/a").expect("read should succeed"),
            b"payload"
        );
    }

    #[test]
    fn test_read_missing_is_not_found() {
        let (adapter, _temp_dir) = create_adapter();
        let err = adapter.read("cache/absent").expect_err("read should fail");
        assert!(err.is_not_found());
    }

    #[test]
    fn test_write_creates_parents() {
        let (adapter, _temp_dir) = create_adapter();
        adapter
            .write("a/b/c/file", b"x")
            .expect("write should succeed");
        assert!(adapter
            .file_exists("a/b/c/file")
            .expect("file_exists should succeed"));
    }

    #[test]
    fn test_overwrite_replaces_contents() {
        let (adapter, _temp_dir) = create_adapter();
        adapter.write("k", b"one").expect("write should succeed");
        adapter.write("k", b"two").expect("write should succeed");
        assert_eq!(adapter.read("k").expect("read should succeed"), b"two");
    }

    #[test]
    fn test_delete_absent_is_noop() {
        let (adapter, _temp_dir) = create_adapter();
        adapter.delete("nothing").expect("delete should succeed");
    }

    #[test]
    fn test_delete_removes_file() {
        let (adapter, _temp_dir) = create_adapter();
        adapter.write("k", b"x").expect("write should succeed");
        adapter.delete("k").expect("delete should succeed");
        assert!(!adapter.file_exists("k").expect("file_exists should succeed"));
    }

    #[test]
    fn test_directory_lifecycle() {
        let (adapter, _temp_dir) = create_adapter();
        assert!(!adapter
            .directory_exists("cache")
            .expect("directory_exists should succeed"));
        adapter
            .create_directory("cache")
            .expect("create_directory should succeed");
        assert!(adapter
            .directory_exists("cache")
            .expect("directory_exists should succeed"));

        adapter
            .write("cache/inner", b"x")
            .expect("write should succeed");
        adapter
            .delete_directory("cache")
            .expect("delete_directory should succeed");
        assert!(!adapter
            .directory_exists("cache")
            .expect("directory_exists should succeed"));
        // Recursive delete of an absent tree is a no-op.
        adapter
            .delete_directory("cache")
            .expect("delete_directory should succeed");
    }

    #[test]
    fn test_no_tmp_residue_after_write() {
        let (adapter, temp_dir) = create_adapter();
        adapter.write("k", b"x").expect("write should succeed");
        let residue: Vec<_> = std::fs::read_dir(temp_dir.path())
            .expect("read_dir should succeed")
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(residue.is_empty());
    }
}

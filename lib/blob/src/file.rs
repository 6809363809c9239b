use std::fs;
use std::path::{Component, Path, PathBuf};

use crate::error::BlobError;
use crate::traits::BlobStore;

/// FileStore is a BlobStore implementation backed by the local filesystem.
///
/// Keys are mapped to paths under `base_dir`:
///   key "bills/42_1716900000_ab12cd34.pdf" → `{base_dir}/bills/42_...pdf`
///
/// Parent directories are created automatically on `put`.
pub struct FileStore {
    base_dir: PathBuf,
}

impl FileStore {
    /// Create a new FileStore rooted at `base_dir`.
    /// The directory is created if it doesn't exist.
    pub fn open(base_dir: &Path) -> Result<Self, BlobError> {
        fs::create_dir_all(base_dir).map_err(|e| BlobError::Io(e.to_string()))?;
        Ok(Self {
            base_dir: base_dir.to_path_buf(),
        })
    }

    /// Resolve a key to a filesystem path. Rejects keys that escape base_dir.
    fn resolve(&self, key: &str) -> Result<PathBuf, BlobError> {
        if key.is_empty() || key.starts_with('/') || key.starts_with('\\') {
            return Err(BlobError::InvalidKey(key.to_string()));
        }

        let rel = Path::new(key);
        let escapes = rel.components().any(|c| {
            matches!(c, Component::ParentDir | Component::RootDir | Component::Prefix(_))
        });
        if escapes {
            return Err(BlobError::InvalidKey(key.to_string()));
        }

        Ok(self.base_dir.join(rel))
    }
}

impl BlobStore for FileStore {
    fn put(&self, key: &str, data: &[u8]) -> Result<(), BlobError> {
        let path = self.resolve(key)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| BlobError::Io(e.to_string()))?;
        }
        fs::write(&path, data).map_err(|e| BlobError::Io(e.to_string()))?;
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, BlobError> {
        let path = self.resolve(key)?;
        if !path.is_file() {
            return Ok(None);
        }
        let data = fs::read(&path).map_err(|e| BlobError::Io(e.to_string()))?;
        Ok(Some(data))
    }

    fn delete(&self, key: &str) -> Result<bool, BlobError> {
        let path = self.resolve(key)?;
        if !path.is_file() {
            tracing::debug!(key, "delete of missing blob ignored");
            return Ok(false);
        }
        fs::remove_file(&path).map_err(|e| BlobError::Io(e.to_string()))?;
        Ok(true)
    }

    fn exists(&self, key: &str) -> Result<bool, BlobError> {
        let path = self.resolve(key)?;
        Ok(path.is_file())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> (tempfile::TempDir, FileStore) {
        let dir = tempfile::tempdir().unwrap();
        let fs = FileStore::open(dir.path()).unwrap();
        (dir, fs)
    }

    #[test]
    fn put_get_delete() {
        let (_dir, fs) = store();
        fs.put("bills/a.pdf", b"hello").unwrap();
        assert!(fs.exists("bills/a.pdf").unwrap());
        assert_eq!(fs.get("bills/a.pdf").unwrap().unwrap(), b"hello");

        assert!(fs.delete("bills/a.pdf").unwrap());
        assert!(!fs.exists("bills/a.pdf").unwrap());
        assert!(fs.get("bills/a.pdf").unwrap().is_none());
    }

    #[test]
    fn delete_missing_is_idempotent() {
        let (_dir, fs) = store();
        assert!(!fs.delete("bills/never-existed.pdf").unwrap());
    }

    #[test]
    fn rejects_traversal_keys() {
        let (_dir, fs) = store();
        assert!(fs.put("../escape.pdf", b"x").is_err());
        assert!(fs.put("/abs.pdf", b"x").is_err());
        assert!(fs.put("", b"x").is_err());
        assert!(fs.put("bills/../../escape.pdf", b"x").is_err());
    }

    #[test]
    fn overwrite_replaces_content() {
        let (_dir, fs) = store();
        fs.put("b.bin", b"one").unwrap();
        fs.put("b.bin", b"two").unwrap();
        assert_eq!(fs.get("b.bin").unwrap().unwrap(), b"two");
    }
}

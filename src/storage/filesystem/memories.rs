//! Memory file access.

use super::{FilesystemStorage, MAX_FILE_SIZE, write_file};
use crate::models::MemoryIdentity;
use crate::storage::traits::MemoryStorage;
use crate::storage::{StorageError, StorageResult};
use std::fs;
use std::io;

impl MemoryStorage for FilesystemStorage {
    fn read(&self, identity: &MemoryIdentity) -> StorageResult<Option<String>> {
        let path = self.memory_path(identity)?;

        // Validate file size before reading to avoid loading huge files
        let metadata = match fs::metadata(&path) {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(StorageError::read(path.display(), e)),
        };
        if !metadata.is_file() {
            return Ok(None);
        }
        if metadata.len() > MAX_FILE_SIZE {
            return Err(StorageError::read(
                path.display(),
                format!("file exceeds maximum size of {MAX_FILE_SIZE} bytes"),
            ));
        }

        fs::read_to_string(&path)
            .map(Some)
            .map_err(|e| StorageError::read(path.display(), e))
    }

    fn write(&self, identity: &MemoryIdentity, contents: &str) -> StorageResult<()> {
        let path = self
            .memory_path(identity)
            .map_err(|e| StorageError::write(identity, e))?;
        write_file(&path, contents)?;
        tracing::debug!(path = %identity, bytes = contents.len(), "Wrote memory file");
        Ok(())
    }

    fn remove(&self, identity: &MemoryIdentity) -> StorageResult<()> {
        let path = self
            .memory_path(identity)
            .map_err(|e| StorageError::write(identity, e))?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::write(path.display(), e)),
        }
    }

    fn move_memory(&self, from: &MemoryIdentity, to: &MemoryIdentity) -> StorageResult<()> {
        let source = self
            .memory_path(from)
            .map_err(|e| StorageError::write(from, e))?;
        let destination = self
            .memory_path(to)
            .map_err(|e| StorageError::write(to, e))?;

        if destination.exists() {
            return Err(StorageError::write(
                destination.display(),
                "destination already exists",
            ));
        }
        if let Some(parent) = destination.parent() {
            fs::create_dir_all(parent).map_err(|e| StorageError::write(parent.display(), e))?;
        }
        fs::rename(&source, &destination)
            .map_err(|e| StorageError::write(destination.display(), e))?;

        tracing::debug!(from = %from, to = %to, "Moved memory file");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::models::validate_memory_slug_path;
    use crate::storage::filesystem::{FilesystemStorage, FilesystemStorageConfig};
    use crate::storage::traits::MemoryStorage;
    use tempfile::TempDir;

    fn storage(dir: &TempDir) -> FilesystemStorage {
        FilesystemStorage::new(
            FilesystemStorageConfig::new(dir.path()),
            dir.path().join("registry.yml"),
        )
    }

    #[test]
    fn test_write_read_remove() {
        let dir = TempDir::new().unwrap();
        let storage = storage(&dir);
        let id = validate_memory_slug_path("a/b/note").unwrap();

        assert!(storage.read(&id).unwrap().is_none());
        storage.write(&id, "hello").unwrap();
        assert!(dir.path().join("a").join("b").join("note.md").is_file());
        assert_eq!(storage.read(&id).unwrap().as_deref(), Some("hello"));

        storage.remove(&id).unwrap();
        assert!(storage.read(&id).unwrap().is_none());
        storage.remove(&id).unwrap();
    }

    #[test]
    fn test_move_creates_destination_directory() {
        let dir = TempDir::new().unwrap();
        let storage = storage(&dir);
        let from = validate_memory_slug_path("a/note").unwrap();
        let to = validate_memory_slug_path("x/y/renamed").unwrap();

        storage.write(&from, "body").unwrap();
        storage.move_memory(&from, &to).unwrap();

        assert!(storage.read(&from).unwrap().is_none());
        assert_eq!(storage.read(&to).unwrap().as_deref(), Some("body"));
    }

    #[test]
    fn test_move_refuses_to_overwrite() {
        let dir = TempDir::new().unwrap();
        let storage = storage(&dir);
        let from = validate_memory_slug_path("a/one").unwrap();
        let to = validate_memory_slug_path("a/two").unwrap();

        storage.write(&from, "1").unwrap();
        storage.write(&to, "2").unwrap();

        let err = storage.move_memory(&from, &to).unwrap_err();
        assert_eq!(err.code(), "WRITE_FAILED");
        assert_eq!(storage.read(&from).unwrap().as_deref(), Some("1"));
        assert_eq!(storage.read(&to).unwrap().as_deref(), Some("2"));
    }

    #[test]
    fn test_oversized_file_rejected() {
        let dir = TempDir::new().unwrap();
        let storage = storage(&dir);
        let id = validate_memory_slug_path("a/big").unwrap();
        storage.write(&id, &"x".repeat(1024 * 1024 + 1)).unwrap();

        assert_eq!(storage.read(&id).unwrap_err().code(), "READ_FAILED");
    }
}

// ! Filesystem abstraction
// !
// ! Module defines the narrow filesystem interface the host consumes, so
// ! tests can substitute an in-memory implementation and the compiler cache
// ! and tool broker stay decoupled from the real disk.

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::core::error::{HostError, HostResult};

/// Narrow filesystem interface consumed by the host
#[async_trait]
pub trait FileSystem: Send + Sync {
    /// Create a directory, optionally with all missing parents
    async fn create_directory(&self, path: &Path, recursive: bool) -> HostResult<()>;

    /// Check whether a path exists
    async fn exists(&self, path: &Path) -> bool;

    /// Read the full contents of a file
    async fn read(&self, path: &Path) -> HostResult<Vec<u8>>;

    /// Write the full contents of a file, replacing any existing contents
    async fn write(&self, path: &Path, contents: &[u8]) -> HostResult<()>;
}

/// Filesystem implementation backed by `tokio::fs`
#[derive(Debug, Default, Clone)]
pub struct LocalFileSystem;

#[async_trait]
impl FileSystem for LocalFileSystem {
    async fn create_directory(&self, path: &Path, recursive: bool) -> HostResult<()> {
        let result = if recursive {
            tokio::fs::create_dir_all(path).await
        } else {
            tokio::fs::create_dir(path).await
        };
        result.map_err(|e| HostError::CouldNotCreateOutputDirectory {
            path: path.to_path_buf(),
            underlying: e.to_string(),
        })
    }

    async fn exists(&self, path: &Path) -> bool {
        tokio::fs::try_exists(path).await.unwrap_or(false)
    }

    async fn read(&self, path: &Path) -> HostResult<Vec<u8>> {
        tokio::fs::read(path)
            .await
            .map_err(|e| HostError::running(format!("failed to read {}: {e}", path.display())))
    }

    async fn write(&self, path: &Path, contents: &[u8]) -> HostResult<()> {
        tokio::fs::write(path, contents)
            .await
            .map_err(|e| HostError::running(format!("failed to write {}: {e}", path.display())))
    }
}

/// In-memory filesystem for tests
///
/// Directories are implicit: a file's parents exist once the file does or
/// once `create_directory` has recorded them.
#[derive(Debug, Default)]
pub struct InMemoryFileSystem {
    files: Mutex<HashMap<PathBuf, Vec<u8>>>,
    directories: Mutex<Vec<PathBuf>>,
}

impl InMemoryFileSystem {
    /// Create an empty in-memory filesystem
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a file without going through the async interface
    pub fn seed<P: Into<PathBuf>>(&self, path: P, contents: &[u8]) {
        self.files
            .lock()
            .expect("filesystem lock poisoned")
            .insert(path.into(), contents.to_vec());
    }
}

#[async_trait]
impl FileSystem for InMemoryFileSystem {
    async fn create_directory(&self, path: &Path, _recursive: bool) -> HostResult<()> {
        self.directories
            .lock()
            .expect("filesystem lock poisoned")
            .push(path.to_path_buf());
        Ok(())
    }

    async fn exists(&self, path: &Path) -> bool {
        let files = self.files.lock().expect("filesystem lock poisoned");
        if files.contains_key(path) {
            return true;
        }
        let directories = self.directories.lock().expect("filesystem lock poisoned");
        directories.iter().any(|d| d == path)
            || files.keys().any(|f| f.starts_with(path))
    }

    async fn read(&self, path: &Path) -> HostResult<Vec<u8>> {
        self.files
            .lock()
            .expect("filesystem lock poisoned")
            .get(path)
            .cloned()
            .ok_or_else(|| HostError::running(format!("no such file: {}", path.display())))
    }

    async fn write(&self, path: &Path, contents: &[u8]) -> HostResult<()> {
        self.files
            .lock()
            .expect("filesystem lock poisoned")
            .insert(path.to_path_buf(), contents.to_vec());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_in_memory_read_write() {
        let fs = InMemoryFileSystem::new();
        fs.write(Path::new("/a/b.txt"), b"hello").await.unwrap();
        assert!(fs.exists(Path::new("/a/b.txt")).await);
        assert!(fs.exists(Path::new("/a")).await);
        assert_eq!(fs.read(Path::new("/a/b.txt")).await.unwrap(), b"hello");
    }

    #[tokio::test]
    async fn test_in_memory_missing_file() {
        let fs = InMemoryFileSystem::new();
        assert!(!fs.exists(Path::new("/nope")).await);
        assert!(fs.read(Path::new("/nope")).await.is_err());
    }

    #[tokio::test]
    async fn test_local_create_directory_maps_error() {
        let fs = LocalFileSystem;
        // Non-recursive create under a missing parent must fail with the
        // directory-creation error variant.
        let result = fs
            .create_directory(Path::new("/definitely/not/a/real/parent/dir"), false)
            .await;
        match result {
            Err(HostError::CouldNotCreateOutputDirectory { path, .. }) => {
                assert!(path.ends_with("dir"));
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }
}

//! Directory-backed remote store.
//!
//! Treats a directory (a network share, a removable drive, a second save
//! folder) as the remote side of a sync. Accessed through `tokio::fs`.

use crate::backend::RemoteEntryStream;
use crate::error::{ErrorKind, Result};
use crate::walk::{map_io_error, walk};
use crate::{RemoteBackend, RemoteEntry, validate_path};
use async_stream::stream;
use async_trait::async_trait;
use futures::StreamExt;
use std::fs::create_dir_all as sync_create_dir;
use std::path::{Path, PathBuf};
use tokio::fs;

/// Remote store rooted at a directory on a locally-mounted filesystem.
///
/// # Examples
///
/// ```no_run
/// use ogsync_storage::backend::DirectoryBackend;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let backend = DirectoryBackend::new("usb", "/media/usb/saves")?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct DirectoryBackend {
    name: String,
    root: PathBuf,
}
impl DirectoryBackend {
    /// Create a new directory backend.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidPath`](ErrorKind::InvalidPath) if `root` is not
    /// absolute or exists but is not a directory. A missing `root` is
    /// created.
    pub fn new(name: impl Into<String>, root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        if !root.is_absolute() {
            exn::bail!(ErrorKind::InvalidPath(root));
        }
        if root.exists() {
            if !root.is_dir() {
                exn::bail!(ErrorKind::InvalidPath(root));
            }
        } else {
            // Use non-async here; it only happens once on construction and
            // it's not worth making the constructor async.
            sync_create_dir(&root).map_err(|e| map_io_error(e, &root))?;
        }
        Ok(Self { name: name.into(), root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn absolute_path(&self, path: impl AsRef<Path>) -> Result<PathBuf> {
        let validated = validate_path(path.as_ref())?;
        Ok(self.root.join(validated))
    }

    async fn entry(&self, relative: PathBuf) -> Result<RemoteEntry> {
        let absolute = self.root.join(&relative);
        let metadata = fs::metadata(&absolute).await.map_err(|e| map_io_error(e, &relative))?;
        let modified = metadata.modified().map_err(ErrorKind::Io)?;
        Ok(RemoteEntry::new(relative, metadata.len(), modified))
    }
}

#[async_trait]
impl RemoteBackend for DirectoryBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn list_stream(&self) -> RemoteEntryStream<'_> {
        Box::pin(stream! {
            let mut paths = walk(&self.root);
            while let Some(path) = paths.next().await {
                match path {
                    Ok(relative) => yield self.entry(relative).await,
                    Err(e) => yield Err(e),
                }
            }
        })
    }

    async fn fetch(&self, path: &Path) -> Result<Vec<u8>> {
        let abs_path = self.absolute_path(path)?;
        Ok(fs::read(&abs_path).await.map_err(|e| map_io_error(e, path))?)
    }

    async fn store(&self, path: &Path, data: &[u8]) -> Result<()> {
        let abs_path = self.absolute_path(path)?;
        if let Some(parent) = abs_path.parent() {
            fs::create_dir_all(parent).await.map_err(|e| map_io_error(e, path))?;
        }
        Ok(fs::write(&abs_path, data).await.map_err(|e| map_io_error(e, path))?)
    }

    async fn clear(&self) -> Result<()> {
        let mut entries = match fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(e) => exn::bail!(map_io_error(e, &self.root)),
        };
        let mut removed = 0usize;
        while let Some(entry) = entries.next_entry().await.map_err(|e| map_io_error(e, &self.root))? {
            let path = entry.path();
            let file_type = entry.file_type().await.map_err(|e| map_io_error(e, &path))?;
            // The root itself stays; only its contents go.
            let outcome = match file_type.is_dir() {
                true => fs::remove_dir_all(&path).await,
                false => fs::remove_file(&path).await,
            };
            outcome.map_err(|e| map_io_error(e, &path))?;
            removed += 1;
        }
        tracing::debug!(backend = %self.name, root = %self.root.display(), removed, "Cleared remote directory");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_requires_absolute_path() {
        let temp_dir = tempfile::tempdir().unwrap();
        assert!(DirectoryBackend::new("name", temp_dir.path()).is_ok());
        assert!(DirectoryBackend::new("name", "relative/path").is_err());
        assert!(DirectoryBackend::new("name", "./relative").is_err());
    }

    #[test]
    fn test_new_rejects_file_root() {
        let temp_dir = tempfile::tempdir().unwrap();
        let file = temp_dir.path().join("file.txt");
        std::fs::write(&file, b"x").unwrap();
        let err = DirectoryBackend::new("name", &file).err().unwrap();
        assert!(matches!(&*err, ErrorKind::InvalidPath(_)));
    }

    #[test]
    fn test_new_creates_missing_root() {
        let temp_dir = tempfile::tempdir().unwrap();
        let root = temp_dir.path().join("a/b");
        DirectoryBackend::new("name", &root).unwrap();
        assert!(root.is_dir());
    }

    #[tokio::test]
    async fn test_store_and_fetch() {
        let temp_dir = tempfile::tempdir().unwrap();
        let backend = DirectoryBackend::new("name", temp_dir.path()).unwrap();
        backend.store(Path::new("slot1/save.dat"), b"level 3").await.unwrap();
        assert_eq!(backend.fetch(Path::new("slot1/save.dat")).await.unwrap(), b"level 3");
        assert!(temp_dir.path().join("slot1/save.dat").is_file());
    }

    #[tokio::test]
    async fn test_fetch_not_found() {
        let temp_dir = tempfile::tempdir().unwrap();
        let backend = DirectoryBackend::new("name", temp_dir.path()).unwrap();
        let err = backend.fetch(Path::new("missing.dat")).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::NotFound(_)));
    }

    #[tokio::test]
    async fn test_list() {
        let temp_dir = tempfile::tempdir().unwrap();
        let backend = DirectoryBackend::new("name", temp_dir.path()).unwrap();
        backend.store(Path::new("a.dat"), b"1").await.unwrap();
        backend.store(Path::new("nested/b.dat"), b"22").await.unwrap();
        let mut entries = backend.list().await.unwrap();
        entries.sort_by(|a, b| a.path.cmp(&b.path));
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].path, PathBuf::from("a.dat"));
        assert_eq!(entries[0].size, 1);
        assert_eq!(entries[1].path, PathBuf::from("nested/b.dat"));
        assert_eq!(entries[1].size, 2);
    }

    #[tokio::test]
    async fn test_clear_keeps_root() {
        let temp_dir = tempfile::tempdir().unwrap();
        let backend = DirectoryBackend::new("name", temp_dir.path()).unwrap();
        backend.store(Path::new("a.dat"), b"1").await.unwrap();
        backend.store(Path::new("nested/deeper/b.dat"), b"2").await.unwrap();
        backend.clear().await.unwrap();
        assert!(backend.list().await.unwrap().is_empty());
        assert!(temp_dir.path().is_dir());
        // Clearing twice is fine.
        backend.clear().await.unwrap();
    }

    #[tokio::test]
    async fn test_path_security() {
        let temp_dir = tempfile::tempdir().unwrap();
        let backend = DirectoryBackend::new("name", temp_dir.path()).unwrap();
        assert!(backend.fetch(Path::new("../etc/passwd")).await.is_err());
        assert!(backend.store(Path::new("a/../../escape"), b"data").await.is_err());
    }
}

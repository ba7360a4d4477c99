//! The file entity.
//!
//! A [`File`] is one file addressed by a path relative to a local root. It
//! owns a transient content buffer and knows how to fill that buffer from,
//! and write it back to, the local filesystem. Filling it from somewhere
//! else (and writing it somewhere else) is what [`SyncFile`] adds, which is
//! what lets the engine compose "load from A, save to B" without knowing
//! what A and B are.

use crate::error::{ErrorKind, Result};
use async_trait::async_trait;
use exn::ResultExt;
use std::fs::Metadata;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::instrument;
use zeroize::Zeroize;

/// One file below a local root.
///
/// `root` and `relative_path` are fixed at construction. `content` is either
/// absent or exactly the bytes most recently loaded or assigned.
#[derive(Debug)]
pub struct File {
    root: PathBuf,
    relative_path: PathBuf,
    content: Option<Vec<u8>>,
}

impl File {
    pub fn new(root: impl Into<PathBuf>, relative_path: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            relative_path: relative_path.into(),
            content: None,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn relative_path(&self) -> &Path {
        &self.relative_path
    }

    /// `root` joined with `relative_path`.
    pub fn local_path(&self) -> PathBuf {
        self.root.join(&self.relative_path)
    }

    pub fn content(&self) -> Option<&[u8]> {
        self.content.as_deref()
    }

    pub fn has_content(&self) -> bool {
        self.content.is_some()
    }

    /// Replace the content buffer. The previous buffer, if any, is zeroed
    /// first.
    pub fn set_content(&mut self, content: Vec<u8>) {
        self.unload();
        self.content = Some(content);
    }

    /// Metadata of the regular file at [`local_path()`](Self::local_path),
    /// or `None` when there is no regular file there. Queried every call.
    pub async fn metadata(&self) -> Option<Metadata> {
        fs::metadata(self.local_path()).await.ok().filter(Metadata::is_file)
    }

    /// Whether a regular file exists at [`local_path()`](Self::local_path)
    /// right now. Directories don't count; errors read as "no".
    pub async fn exists(&self) -> bool {
        self.metadata().await.is_some()
    }

    /// Zero and release the content buffer. Safe to call when nothing is
    /// loaded.
    pub fn unload(&mut self) {
        if let Some(mut content) = self.content.take() {
            content.zeroize();
        }
    }

    /// Read the whole local file into the content buffer.
    ///
    /// The buffer is only replaced once the read has completed, so a failed
    /// load leaves the previous content (if any) in place.
    ///
    /// # Errors
    /// [`LocalIo`](ErrorKind::LocalIo) when the path is missing, is a
    /// directory, or can't be read.
    #[instrument(level = "trace", skip(self), fields(path = %self.relative_path.display()))]
    pub async fn load_local(&mut self) -> Result<()> {
        let path = self.local_path();
        let bytes = fs::read(&path).await.or_raise(|| ErrorKind::LocalIo(path.clone()))?;
        tracing::trace!(bytes = bytes.len(), "Loaded local file");
        self.set_content(bytes);
        Ok(())
    }

    /// Write the content buffer to the local file, creating or truncating it.
    ///
    /// Parent directories are not created.
    ///
    /// # Errors
    /// - [`Precondition`](ErrorKind::Precondition) when nothing has been
    ///   loaded.
    /// - [`LocalIo`](ErrorKind::LocalIo) when the write fails.
    #[instrument(level = "trace", skip(self), fields(path = %self.relative_path.display()))]
    pub async fn save_local(&self) -> Result<()> {
        let Some(content) = self.content.as_deref() else {
            exn::bail!(ErrorKind::Precondition(format!(
                "save_local called on {} with no content loaded",
                self.relative_path.display()
            )));
        };
        let path = self.local_path();
        fs::write(&path, content).await.or_raise(|| ErrorKind::LocalIo(path.clone()))?;
        tracing::trace!(bytes = content.len(), "Saved local file");
        Ok(())
    }
}

/// A [`File`] that also knows a remote side.
///
/// Local loading and saving come from the wrapped [`File`]; implementors
/// supply the remote half. The engine only ever talks to this trait.
#[async_trait]
pub trait SyncFile: Send + Sync {
    fn file(&self) -> &File;

    fn file_mut(&mut self) -> &mut File;

    /// Fill the content buffer from the remote store.
    async fn load_remote(&mut self) -> Result<()>;

    /// Write the content buffer to the remote store.
    async fn save_remote(&self) -> Result<()>;
}

/// A plain [`File`] has no remote side: both remote operations fail with
/// [`NotImplemented`](ErrorKind::NotImplemented).
#[async_trait]
impl SyncFile for File {
    fn file(&self) -> &File {
        self
    }

    fn file_mut(&mut self) -> &mut File {
        self
    }

    async fn load_remote(&mut self) -> Result<()> {
        exn::bail!(ErrorKind::NotImplemented("load_remote on a file without a remote backend"))
    }

    async fn save_remote(&self) -> Result<()> {
        exn::bail!(ErrorKind::NotImplemented("save_remote on a file without a remote backend"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture(contents: &[u8]) -> (tempfile::TempDir, File) {
        let temp_dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(temp_dir.path().join("slot1")).unwrap();
        std::fs::write(temp_dir.path().join("slot1/save.dat"), contents).unwrap();
        let file = File::new(temp_dir.path(), "slot1/save.dat");
        (temp_dir, file)
    }

    #[test]
    fn test_local_path() {
        let file = File::new("/saves", "slot1/save.dat");
        assert_eq!(file.local_path(), PathBuf::from("/saves/slot1/save.dat"));
        assert_eq!(file.root(), Path::new("/saves"));
        assert_eq!(file.relative_path(), Path::new("slot1/save.dat"));
        assert!(!file.has_content());
    }

    #[tokio::test]
    async fn test_exists() {
        let (temp_dir, file) = fixture(b"data");
        assert!(file.exists().await);
        assert_eq!(file.metadata().await.map(|m| m.len()), Some(4));
        // Directories are not files.
        assert!(!File::new(temp_dir.path(), "slot1").exists().await);
        assert!(!File::new(temp_dir.path(), "missing.dat").exists().await);
        // Not cached: removing the file is seen immediately.
        std::fs::remove_file(file.local_path()).unwrap();
        assert!(!file.exists().await);
    }

    #[tokio::test]
    async fn test_load_then_save_round_trip() {
        let original: Vec<u8> = (0..=255u8).cycle().take(4096).collect();
        let (_temp_dir, mut file) = fixture(&original);
        file.load_local().await.unwrap();
        assert_eq!(file.content(), Some(original.as_slice()));
        file.save_local().await.unwrap();
        assert_eq!(std::fs::read(file.local_path()).unwrap(), original);
    }

    #[test]
    fn test_unload_is_idempotent() {
        let mut file = File::new("/saves", "a.dat");
        file.set_content(b"secret".to_vec());
        file.unload();
        assert_eq!(file.content(), None);
        file.unload();
        assert_eq!(file.content(), None);
    }

    #[tokio::test]
    async fn test_save_without_content() {
        let (_temp_dir, file) = fixture(b"untouched");
        let err = file.save_local().await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::Precondition(_)));
        assert_eq!(std::fs::read(file.local_path()).unwrap(), b"untouched");
    }

    #[tokio::test]
    async fn test_load_failures() {
        let (temp_dir, _) = fixture(b"data");
        let mut missing = File::new(temp_dir.path(), "missing.dat");
        let err = missing.load_local().await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::LocalIo(_)));

        let mut directory = File::new(temp_dir.path(), "slot1");
        let err = directory.load_local().await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::LocalIo(_)));
    }

    #[tokio::test]
    async fn test_failed_load_keeps_previous_content() {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut file = File::new(temp_dir.path(), "missing.dat");
        file.set_content(b"previous".to_vec());
        assert!(file.load_local().await.is_err());
        assert_eq!(file.content(), Some(b"previous".as_slice()));
    }

    #[tokio::test]
    async fn test_save_into_missing_directory() {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut file = File::new(temp_dir.path(), "no/such/dir/a.dat");
        file.set_content(b"data".to_vec());
        let err = file.save_local().await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::LocalIo(_)));
    }

    #[tokio::test]
    async fn test_plain_file_has_no_remote() {
        let mut file = File::new("/saves", "a.dat");
        let err = file.load_remote().await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::NotImplemented(_)));
        let err = file.save_remote().await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::NotImplemented(_)));
    }
}

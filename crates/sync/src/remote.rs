use crate::engine::FileFactory;
use crate::error::{ErrorKind, Result};
use crate::file::{File, SyncFile};
use async_trait::async_trait;
use exn::ResultExt;
use ogsync_storage::BackendHandle;
use std::ops::{Deref, DerefMut};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// A [`File`] whose remote side is an entry of the same relative path in a
/// [`RemoteBackend`](ogsync_storage::RemoteBackend).
pub struct RemoteFile {
    file: File,
    backend: BackendHandle,
}

impl RemoteFile {
    pub fn new(root: impl Into<PathBuf>, relative_path: impl Into<PathBuf>, backend: BackendHandle) -> Self {
        Self {
            file: File::new(root, relative_path),
            backend,
        }
    }

    /// Factory producing [`RemoteFile`]s bound to `backend`, for
    /// [`SyncEngine::new`](crate::SyncEngine::new).
    pub fn factory(backend: BackendHandle) -> FileFactory<Self> {
        Arc::new(move |root: &Path, relative_path: &Path| Self::new(root, relative_path, Arc::clone(&backend)))
    }

    pub fn backend(&self) -> &BackendHandle {
        &self.backend
    }
}

impl Deref for RemoteFile {
    type Target = File;
    fn deref(&self) -> &File {
        &self.file
    }
}
impl DerefMut for RemoteFile {
    fn deref_mut(&mut self) -> &mut File {
        &mut self.file
    }
}

#[async_trait]
impl SyncFile for RemoteFile {
    fn file(&self) -> &File {
        &self.file
    }

    fn file_mut(&mut self) -> &mut File {
        &mut self.file
    }

    async fn load_remote(&mut self) -> Result<()> {
        let bytes = self.backend.fetch(self.file.relative_path()).await.or_raise(|| ErrorKind::Remote)?;
        tracing::trace!(backend = self.backend.name(), path = %self.file.relative_path().display(), bytes = bytes.len(), "Fetched remote file");
        self.file.set_content(bytes);
        Ok(())
    }

    async fn save_remote(&self) -> Result<()> {
        let Some(content) = self.file.content() else {
            exn::bail!(ErrorKind::Precondition(format!(
                "save_remote called on {} with no content loaded",
                self.file.relative_path().display()
            )));
        };
        self.backend.store(self.file.relative_path(), content).await.or_raise(|| ErrorKind::Remote)?;
        tracing::trace!(backend = self.backend.name(), path = %self.file.relative_path().display(), bytes = content.len(), "Stored remote file");
        Ok(())
    }
}

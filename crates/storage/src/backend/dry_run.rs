//! Dry-run remote store.
//!
//! Wraps another backend and prevents destructive operations from executing,
//! while still indicating success on return.

use async_trait::async_trait;
use std::path::Path;

use crate::backend::RemoteEntryStream;
use crate::{BackendHandle, RemoteBackend, error::Result};

/// Dry-run remote backend.
///
/// Listing and fetching go to the wrapped backend. Stores and clears are
/// dropped, logging an [`info event`](tracing::Event) instead.
#[derive(Clone)]
pub struct DryRunBackend {
    inner: BackendHandle,
}
impl DryRunBackend {
    pub fn new(inner: BackendHandle) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl RemoteBackend for DryRunBackend {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn list_stream(&self) -> RemoteEntryStream<'_> {
        self.inner.list_stream()
    }

    async fn fetch(&self, path: &Path) -> Result<Vec<u8>> {
        self.inner.fetch(path).await
    }

    async fn store(&self, path: &Path, data: &[u8]) -> Result<()> {
        tracing::info!(backend = self.inner.name(), path = %path.display(), bytes = data.len(), "Skipping store during dry run");
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        tracing::info!(backend = self.inner.name(), "Skipping clear during dry run");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::DirectoryBackend;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_dry_run_leaves_store_untouched() {
        let temp_dir = tempfile::tempdir().unwrap();
        let inner = DirectoryBackend::new("disk", temp_dir.path()).unwrap();
        inner.store(Path::new("keep.dat"), b"original").await.unwrap();
        let backend = DryRunBackend::new(Arc::new(inner));

        backend.store(Path::new("keep.dat"), b"overwritten").await.unwrap();
        backend.store(Path::new("new.dat"), b"new").await.unwrap();
        backend.clear().await.unwrap();

        assert_eq!(backend.name(), "disk");
        assert_eq!(backend.fetch(Path::new("keep.dat")).await.unwrap(), b"original");
        let entries = backend.list().await.unwrap();
        assert_eq!(entries.len(), 1);
    }
}

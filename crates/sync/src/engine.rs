//! The sync engine.
//!
//! Owns two independent snapshots, the local set and the remote set, and
//! moves content between them in either direction. Snapshots are only ever
//! rebuilt by [`fetch_local`](SyncEngine::fetch_local) and
//! [`fetch_remote`](SyncEngine::fetch_remote); a directional sync works on
//! whatever was fetched last, however old that is.
//!
//! Every operation takes `&mut self`, so fetching and syncing can never
//! overlap on one engine. Separate engines share nothing.

use crate::error::{ErrorKind, Result};
use crate::file::{File, SyncFile};
use crate::remote::RemoteFile;
use crate::transfer::{Direction, SyncOptions, SyncReport, run_all};
use exn::ResultExt;
use ogsync_config::Config;
use ogsync_storage::{BackendHandle, validate_path};
use ogsync_storage::walk::walk_sorted;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio_util::sync::CancellationToken;
use tracing::instrument;

/// Builds a file handle from the sync root and a path relative to it.
pub type FileFactory<F> = Arc<dyn Fn(&Path, &Path) -> F + Send + Sync>;

/// Synchronises a local directory with a remote store.
///
/// # Examples
///
/// ```no_run
/// use ogsync::SyncEngine;
/// use ogsync_storage::BackendHandle;
/// use ogsync_storage::backend::DirectoryBackend;
/// use std::sync::Arc;
///
/// # async fn example() {
/// let backend: BackendHandle = Arc::new(DirectoryBackend::new("usb", "/media/usb/saves").unwrap());
/// let mut engine = SyncEngine::remote("/home/me/saves", backend).unwrap();
///
/// // Push: snapshot the local tree, then replace the remote store with it.
/// engine.fetch_local().await.unwrap();
/// let report = engine.sync_to_remote().await.unwrap();
/// println!("uploaded {} files ({} bytes)", report.files, report.bytes);
/// # }
/// ```
pub struct SyncEngine<F: SyncFile> {
    root: PathBuf,
    factory: FileFactory<F>,
    backend: Option<BackendHandle>,
    options: SyncOptions,
    cancel: Option<CancellationToken>,
    local_files: Vec<F>,
    remote_files: Vec<F>,
}

impl<F: SyncFile> SyncEngine<F> {
    /// Create an engine over `root` (absolute) that builds its files with
    /// `factory`.
    ///
    /// Without a [backend](Self::with_backend), remote listing and
    /// [`sync_to_remote`](Self::sync_to_remote) fail with
    /// [`NotImplemented`](ErrorKind::NotImplemented).
    pub fn new(
        root: impl Into<PathBuf>,
        factory: impl Fn(&Path, &Path) -> F + Send + Sync + 'static,
    ) -> Result<Self> {
        Self::from_factory(root, Arc::new(factory))
    }

    /// Like [`new`](Self::new), for a factory that is already shared.
    pub fn from_factory(root: impl Into<PathBuf>, factory: FileFactory<F>) -> Result<Self> {
        let root = root.into();
        if !root.is_absolute() {
            exn::bail!(ErrorKind::InvalidRoot(root));
        }
        Ok(Self {
            root,
            factory,
            backend: None,
            options: SyncOptions::default(),
            cancel: None,
            local_files: Vec::new(),
            remote_files: Vec::new(),
        })
    }

    pub fn with_backend(mut self, backend: BackendHandle) -> Self {
        self.backend = Some(backend);
        self
    }

    pub fn with_options(mut self, options: SyncOptions) -> Self {
        self.options = options;
        self
    }

    /// Abort in-flight and queued transfers when `token` is cancelled. A
    /// cancelled sync still waits for every transfer to settle and then
    /// fails.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn backend(&self) -> Option<&BackendHandle> {
        self.backend.as_ref()
    }

    pub fn options(&self) -> &SyncOptions {
        &self.options
    }

    /// The local set, as of the last [`fetch_local`](Self::fetch_local).
    pub fn local_files(&self) -> &[F] {
        &self.local_files
    }

    /// The remote set, as of the last [`fetch_remote`](Self::fetch_remote)
    /// (or whatever was added by hand since).
    pub fn remote_files(&self) -> &[F] {
        &self.remote_files
    }

    /// Empty the remote set. For callers that build the remote set
    /// themselves instead of through [`fetch_remote`](Self::fetch_remote).
    pub fn clear_remote_files(&mut self) {
        self.remote_files.clear();
    }

    /// Append one file to the remote set.
    pub fn add_remote_file(&mut self, file: F) {
        self.remote_files.push(file);
    }

    /// Build a file handle for `relative_path` with this engine's factory.
    pub fn new_file(&self, relative_path: &Path) -> F {
        (self.factory)(&self.root, relative_path)
    }

    /// Replace the local set with one file per regular file below the root.
    ///
    /// Subdirectories are descended into but never become files themselves.
    /// The new set is sorted by relative path. If enumeration fails the
    /// previous set is left as it was.
    ///
    /// # Errors
    /// [`LocalIo`](ErrorKind::LocalIo) if the root is not a directory or
    /// cannot be read.
    #[instrument(skip(self), fields(root = %self.root.display()))]
    pub async fn fetch_local(&mut self) -> Result<usize> {
        let is_dir = fs::metadata(&self.root).await.map(|m| m.is_dir()).unwrap_or(false);
        if !is_dir {
            exn::bail!(ErrorKind::LocalIo(self.root.clone()));
        }
        let paths = walk_sorted(&self.root).await.or_raise(|| ErrorKind::LocalIo(self.root.clone()))?;
        self.local_files = paths.iter().map(|path| self.new_file(path)).collect();
        tracing::debug!(files = self.local_files.len(), "Fetched local files");
        Ok(self.local_files.len())
    }

    /// Replace the remote set with one file per entry the backend lists,
    /// sorted by relative path.
    ///
    /// # Errors
    /// - [`NotImplemented`](ErrorKind::NotImplemented) without a backend.
    /// - [`Remote`](ErrorKind::Remote) if listing fails or lists a path that
    ///   isn't a valid relative path; the previous set is left as it was.
    #[instrument(skip(self), fields(root = %self.root.display()))]
    pub async fn fetch_remote(&mut self) -> Result<usize> {
        let backend = self.require_backend("fetch_remote requires a remote backend")?;
        let entries = backend.list().await.or_raise(|| ErrorKind::Remote)?;
        // Listed paths are joined onto the local root by `sync_to_local`, so
        // they must not be able to point outside it.
        let mut paths = entries
            .iter()
            .map(|entry| validate_path(&entry.path).or_raise(|| ErrorKind::Remote))
            .collect::<Result<Vec<_>>>()?;
        paths.sort();
        let files: Vec<F> = paths.iter().map(|path| self.new_file(path)).collect();
        self.clear_remote_files();
        for file in files {
            self.add_remote_file(file);
        }
        tracing::debug!(backend = backend.name(), files = self.remote_files.len(), "Fetched remote files");
        Ok(self.remote_files.len())
    }

    /// Replace the remote store's contents with the local set.
    ///
    /// Clears the remote store first, so anything there that isn't in the
    /// local set is gone afterwards. Then every file in the local set is
    /// loaded from disk and saved to the remote store concurrently, and the
    /// call returns once all of them have settled.
    ///
    /// # Errors
    /// - [`NotImplemented`](ErrorKind::NotImplemented) without a backend.
    /// - [`Remote`](ErrorKind::Remote) if clearing fails; nothing is
    ///   uploaded.
    /// - [`Transfer`](ErrorKind::Transfer) if any file failed.
    /// - [`Cancelled`](ErrorKind::Cancelled) if cancelled before starting.
    #[instrument(skip(self), fields(root = %self.root.display(), files = self.local_files.len()))]
    pub async fn sync_to_remote(&mut self) -> Result<SyncReport> {
        let backend = self.require_backend("sync_to_remote requires a remote backend")?;
        self.check_cancelled()?;
        backend.clear().await.or_raise(|| ErrorKind::Remote)?;
        tracing::debug!(backend = backend.name(), "Cleared remote store");
        run_all(&mut self.local_files, Direction::ToRemote, &self.options, self.cancel.as_ref()).await
    }

    /// Copy every file in the remote set into the local root.
    ///
    /// Nothing local is deleted; files are created or overwritten. Parent
    /// directories are created as needed.
    ///
    /// # Errors
    /// - [`Transfer`](ErrorKind::Transfer) if any file failed.
    /// - [`Cancelled`](ErrorKind::Cancelled) if cancelled before starting.
    #[instrument(skip(self), fields(root = %self.root.display(), files = self.remote_files.len()))]
    pub async fn sync_to_local(&mut self) -> Result<SyncReport> {
        self.check_cancelled()?;
        run_all(&mut self.remote_files, Direction::ToLocal, &self.options, self.cancel.as_ref()).await
    }

    fn require_backend(&self, operation: &'static str) -> Result<BackendHandle> {
        match &self.backend {
            Some(backend) => Ok(Arc::clone(backend)),
            None => exn::bail!(ErrorKind::NotImplemented(operation)),
        }
    }

    fn check_cancelled(&self) -> Result<()> {
        if self.cancel.as_ref().is_some_and(CancellationToken::is_cancelled) {
            exn::bail!(ErrorKind::Cancelled);
        }
        Ok(())
    }
}

impl SyncEngine<File> {
    /// An engine of plain [`File`]s with no remote side.
    pub fn local(root: impl Into<PathBuf>) -> Result<Self> {
        Self::new(root, |root: &Path, relative_path: &Path| File::new(root, relative_path))
    }
}

impl SyncEngine<RemoteFile> {
    /// An engine whose files all talk to `backend`.
    pub fn remote(root: impl Into<PathBuf>, backend: BackendHandle) -> Result<Self> {
        Ok(Self::from_factory(root, RemoteFile::factory(Arc::clone(&backend)))?.with_backend(backend))
    }

    /// An engine built from loaded [`Config`]: its root, its remote backend,
    /// and its transfer options.
    pub fn from_config(config: &Config) -> Result<Self> {
        let backend = config.connect().or_raise(|| ErrorKind::Config)?;
        Ok(Self::remote(&config.root, backend)?.with_options(SyncOptions::from(config)))
    }
}

//! Remote backend trait and implementations.
//!
//! This module defines the `RemoteBackend` trait, the capability a concrete
//! remote protocol has to provide for the sync engine to push local files to
//! it and pull its files back down.

mod directory;
mod dry_run;
#[cfg(feature = "mock")]
mod mock;

pub use self::directory::DirectoryBackend;
pub use self::dry_run::DryRunBackend;
#[cfg(feature = "mock")]
pub use self::mock::{Call, MockBackend};
use crate::RemoteEntry;
use crate::error::Result;
use async_trait::async_trait;
use futures::{Stream, TryStreamExt};
use std::path::Path;
use std::pin::Pin;

pub type RemoteEntryStream<'a> = Pin<Box<dyn Stream<Item = Result<RemoteEntry>> + Send + 'a>>;

/// Unified interface for remote stores.
///
/// All operations are asynchronous; implementations are free to suspend on
/// network or disk I/O, and the sync engine calls them from many concurrent
/// transfers at once, so they must be safe to share (`&self` everywhere).
///
/// # Path Handling
/// All paths are relative to the store's root and must be validated using
/// [`validate_path`](crate::validate_path) before use. Implementations should
/// enforce this validation.
///
/// # Examples
///
/// ```
/// use std::path::Path;
/// use ogsync_storage::{backend::RemoteBackend, error::Result};
///
/// async fn mirror_one(from: &dyn RemoteBackend, to: &dyn RemoteBackend) -> Result<usize> {
///     let path = Path::new("slot1/save.dat");
///     let data = from.fetch(path).await?;
///     to.store(path, &data).await?;
///     Ok(data.len())
/// }
/// ```
#[async_trait]
pub trait RemoteBackend: Send + Sync {
    /// Name of the configured backend, used for logging only.
    fn name(&self) -> &str;

    /// List every entry in the store.
    ///
    /// Default implementation of this method is to collect all the results
    /// from [`list_stream()`](Self::list_stream) into a [`Vec`] before
    /// returning.
    async fn list(&self) -> Result<Vec<RemoteEntry>> {
        self.list_stream().try_collect().await
    }

    /// Stream every entry in the store.
    ///
    /// Yields results incrementally. Order is backend-defined.
    ///
    /// # Examples
    ///
    /// ```
    /// use futures::TryStreamExt;
    /// # use ogsync_storage::{backend::RemoteBackend, error::Result};
    /// # async fn example(backend: &dyn RemoteBackend) -> Result<()> {
    /// let mut stream = backend.list_stream();
    /// while let Some(entry) = stream.try_next().await? {
    ///     println!("{}: {} bytes", entry.path.display(), entry.size);
    /// }
    /// # Ok(())
    /// # }
    /// ```
    fn list_stream(&self) -> RemoteEntryStream<'_>;

    /// Fetch the complete contents of one entry.
    ///
    /// Returns [`NotFound`](crate::error::ErrorKind::NotFound) if the entry
    /// does not exist.
    async fn fetch(&self, path: &Path) -> Result<Vec<u8>>;

    /// Store the contents of one entry, creating or overwriting it.
    ///
    /// # Notes
    /// - Implementations should create intermediate "directories" as needed.
    async fn store(&self, path: &Path, data: &[u8]) -> Result<()>;

    /// Remove every entry from the store.
    ///
    /// Clearing an already-empty store succeeds.
    async fn clear(&self) -> Result<()>;
}

//! Fan-out / fan-in of per-file transfers.
//!
//! A directional sync turns every file of its source set into one transfer
//! (load, then save) and drives them all concurrently on the calling task
//! through a [`FuturesUnordered`]. The join waits for every transfer to
//! settle, failed or not, before reporting.

use crate::error::{ErrorKind, Result};
use crate::file::SyncFile;
use exn::ResultExt;
use futures::StreamExt;
use futures::stream::FuturesUnordered;
use ogsync_config::Config;
use std::collections::VecDeque;
use std::num::NonZeroUsize;
use tokio::fs;
use tokio_util::sync::CancellationToken;

/// Which way a directional sync moves content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Local files are loaded and saved to the remote store.
    ToRemote,
    /// Remote entries are loaded and saved to the local root.
    ToLocal,
}

/// Tuning for directional syncs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncOptions {
    /// Maximum transfers in flight at once. `None` starts every transfer
    /// immediately.
    pub concurrency: Option<NonZeroUsize>,
    /// [`unload()`](crate::File::unload) each file once it has been saved.
    pub release_content: bool,
}
impl From<&Config> for SyncOptions {
    fn from(config: &Config) -> Self {
        Self {
            concurrency: config.concurrency,
            release_content: config.release_content,
        }
    }
}

/// Outcome of a successful directional sync.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncReport {
    pub direction: Direction,
    /// Number of files transferred.
    pub files: usize,
    /// Total bytes transferred.
    pub bytes: u64,
}

/// Load-then-save for one file. Returns the number of bytes moved.
async fn transfer<F: SyncFile>(file: &mut F, direction: Direction, release_content: bool) -> Result<u64> {
    match direction {
        Direction::ToRemote => {
            file.file_mut().load_local().await?;
            file.save_remote().await?;
        },
        Direction::ToLocal => {
            file.load_remote().await?;
            // Remote entries can live in folders that don't exist locally yet.
            let local_path = file.file().local_path();
            if let Some(parent) = local_path.parent() {
                fs::create_dir_all(parent).await.or_raise(|| ErrorKind::LocalIo(parent.to_path_buf()))?;
            }
            file.file().save_local().await?;
        },
    }
    let bytes = file.file().content().map_or(0, |c| c.len() as u64);
    if release_content {
        file.file_mut().unload();
    }
    Ok(bytes)
}

async fn cancellable<T>(cancel: Option<&CancellationToken>, work: impl Future<Output = Result<T>>) -> Result<T> {
    match cancel {
        // Biased so that queued transfers promoted after cancellation never
        // start.
        Some(token) => tokio::select! {
            biased;
            _ = token.cancelled() => Err(exn::Exn::from(ErrorKind::Cancelled)),
            result = work => result,
        },
        None => work.await,
    }
}

/// Run one transfer per file and wait for all of them.
///
/// At most `options.concurrency` transfers are in flight; the rest wait in
/// FIFO order and are promoted as slots free up. Every failure is collected;
/// if there were any, the result is a [`Transfer`](ErrorKind::Transfer)
/// error carrying each per-file failure as a child.
pub(crate) async fn run_all<'a, F, I>(
    files: I,
    direction: Direction,
    options: &SyncOptions,
    cancel: Option<&CancellationToken>,
) -> Result<SyncReport>
where
    F: SyncFile + 'a,
    I: IntoIterator<Item = &'a mut F>,
{
    let release_content = options.release_content;
    let mut queued: VecDeque<_> = files
        .into_iter()
        .map(|file| async move {
            let path = file.file().relative_path().to_path_buf();
            let result = cancellable(cancel, transfer(file, direction, release_content)).await;
            (path, result)
        })
        .collect();
    let total = queued.len();
    let limit = options.concurrency.map_or(total, NonZeroUsize::get);
    tracing::debug!(?direction, files = total, limit, "Starting transfers");

    let mut processing = FuturesUnordered::new();
    processing.extend(queued.drain(..limit.min(total)));
    let mut failures = Vec::new();
    let mut bytes = 0u64;
    while let Some((path, result)) = processing.next().await {
        match result {
            Ok(moved) => {
                bytes += moved;
                tracing::debug!(path = %path.display(), bytes = moved, "Transferred");
            },
            Err(e) => {
                let kind: &ErrorKind = &e;
                tracing::warn!(path = %path.display(), error = %kind, "Transfer failed");
                failures.push(e.raise(ErrorKind::File(path)));
            },
        }
        if let Some(next) = queued.pop_front() {
            processing.push(next);
        }
    }

    if !failures.is_empty() {
        let failed = failures.len();
        tracing::warn!(?direction, failed, total, "Sync finished with failures");
        return Err(exn::Exn::raise_all(ErrorKind::Transfer { failed, total }, failures));
    }
    tracing::info!(?direction, files = total, bytes, "Sync complete");
    Ok(SyncReport { direction, files: total, bytes })
}

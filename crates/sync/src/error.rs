//! Sync Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction. Backend and configuration failures
//! are kept as children of the sync error that wraps them.

use derive_more::{Display, Error};
use std::path::PathBuf;

/// A sync error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for sync operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Classifies the origin of a sync failure.
///
/// ### Runtime Errors
/// - [`ErrorKind::LocalIo`]
/// - [`ErrorKind::Remote`]
/// - [`ErrorKind::Transfer`] - one or more files of a batch failed; every
///   per-file failure ([`ErrorKind::File`]) is attached as a child.
/// - [`ErrorKind::Cancelled`]
///
/// ### Programmer Errors
/// Never retried.
/// - [`ErrorKind::Precondition`]
/// - [`ErrorKind::NotImplemented`]
/// - [`ErrorKind::InvalidRoot`]
/// - [`ErrorKind::Config`]
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// Reading, writing or enumerating the local filesystem failed.
    #[display("local I/O error: {}", _0.display())]
    LocalIo(#[error(not(source))] PathBuf),
    /// The remote backend reported a failure.
    #[display("remote backend error")]
    Remote,
    /// An operation was called in a state that doesn't allow it (e.g. saving
    /// a file before anything was loaded into it).
    #[display("precondition failed: {_0}")]
    Precondition(#[error(not(source))] String),
    /// The operation needs a remote backend that was never supplied.
    #[display("not implemented: {_0}")]
    NotImplemented(#[error(not(source))] &'static str),
    /// The sync root is not an absolute path.
    #[display("invalid root: {}", _0.display())]
    InvalidRoot(#[error(not(source))] PathBuf),
    /// Configuration could not be turned into an engine.
    #[display("configuration error")]
    Config,
    /// Transferring a single file failed.
    #[display("transfer of {} failed", _0.display())]
    File(#[error(not(source))] PathBuf),
    /// At least one transfer of a directional sync failed.
    #[display("{failed} of {total} transfers failed")]
    Transfer { failed: usize, total: usize },
    /// The sync was cancelled before this unit of work completed.
    #[display("cancelled")]
    Cancelled,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::LocalIo(_) | Self::Remote | Self::Transfer { .. } | Self::Cancelled)
    }
}

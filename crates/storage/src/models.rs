//! Storage models.

use std::path::PathBuf;
use time::OffsetDateTime;

/// One entry in a remote store's listing.
///
/// Carries enough identity for the sync engine to construct a file handle
/// for it: the path relative to the store's root. Size and modification
/// time are informational.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteEntry {
    /// Relative path from the store's root
    pub path: PathBuf,
    /// Size in bytes
    pub size: u64,
    /// Last modified timestamp
    pub modified: OffsetDateTime,
}
impl RemoteEntry {
    pub fn new(path: impl Into<PathBuf>, size: u64, modified: impl Into<OffsetDateTime>) -> Self {
        Self {
            path: path.into(),
            size,
            modified: modified.into(),
        }
    }
}

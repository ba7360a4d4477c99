//! Bidirectional synchronisation between a local directory and a remote
//! store.
//!
//! A [`SyncEngine`] keeps two snapshots: the files below its local root, and
//! the entries in its remote store. [`fetch_local`](SyncEngine::fetch_local)
//! and [`fetch_remote`](SyncEngine::fetch_remote) rebuild them;
//! [`sync_to_remote`](SyncEngine::sync_to_remote) replaces the remote store
//! with the local snapshot and [`sync_to_local`](SyncEngine::sync_to_local)
//! copies the remote snapshot into the local root. Each file is transferred
//! independently and concurrently; one failure fails the whole sync, but
//! only after every other transfer has settled.
//!
//! The remote side is any [`RemoteBackend`](ogsync_storage::RemoteBackend).
//! What a "file" is can be swapped out through the [`SyncFile`] trait and a
//! [`FileFactory`].

pub mod error;

mod engine;
mod file;
mod remote;
mod transfer;

pub use engine::{FileFactory, SyncEngine};
pub use file::{File, SyncFile};
pub use ogsync_storage::BackendHandle;
pub use remote::RemoteFile;
pub use tokio_util::sync::CancellationToken;
pub use transfer::{Direction, SyncOptions, SyncReport};

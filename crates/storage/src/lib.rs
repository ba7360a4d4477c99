//! Remote storage for ogsync.
//!
//! A [`RemoteBackend`] is the only thing the sync engine knows about the far
//! side of a sync: how to list it, fetch one entry, store one entry, and wipe
//! it clean. Everything else (HTTP APIs, object stores, a second directory)
//! lives behind that trait.

pub mod backend;
pub mod error;
mod models;
mod path;
pub mod walk;

pub use crate::backend::RemoteBackend;
pub use crate::models::RemoteEntry;
pub use crate::path::{relative_to, validate as validate_path};
use std::sync::Arc;

pub type BackendHandle = Arc<dyn RemoteBackend + Send + Sync>;

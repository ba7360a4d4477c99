//! In-memory remote backend for testing.

use super::RemoteEntryStream;
use crate::error::{ErrorKind, Result};
use crate::path::validate as validate_path;
use crate::{RemoteBackend, RemoteEntry};
use async_stream::stream;
use async_trait::async_trait;
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use time::UtcDateTime;
use tokio::sync::RwLock;

/// One recorded call against a [`MockBackend`], in the order it arrived.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    List,
    Fetch(PathBuf),
    Store(PathBuf, Vec<u8>),
    Clear,
}

#[derive(Default)]
struct Faults {
    fetch: HashSet<PathBuf>,
    store: HashSet<PathBuf>,
    store_call: Option<usize>,
    clear: bool,
}

/// In-memory remote backend for testing.
///
/// Entries are stored in a `BTreeMap` behind a [`RwLock`], so all trait
/// methods can operate on `&self` without external synchronisation. Every
/// call is recorded (see [`calls()`](Self::calls)), failures can be injected
/// per path or per call, and an artificial latency makes concurrent callers
/// overlap.
///
/// # Examples
///
/// ```
/// use ogsync_storage::backend::{Call, MockBackend, RemoteBackend};
/// use std::path::Path;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> ogsync_storage::error::Result<()> {
/// let backend = MockBackend::with_files([("slot1/save.dat", b"level 3")]);
/// assert_eq!(backend.fetch(Path::new("slot1/save.dat")).await?, b"level 3");
///
/// backend.clear().await?;
/// assert!(backend.list().await?.is_empty());
/// assert_eq!(backend.calls().last(), Some(&Call::List));
/// # Ok(())
/// # }
/// ```
pub struct MockBackend {
    name: String,
    storage: RwLock<BTreeMap<PathBuf, (UtcDateTime, Vec<u8>)>>,
    calls: Mutex<Vec<Call>>,
    faults: Mutex<Faults>,
    latency: Option<Duration>,
    store_calls: AtomicUsize,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

impl MockBackend {
    /// Create a mock backend pre-populated with files.
    ///
    /// Panics if any path fails validation (e.g. path traversal). If test
    /// setup is wrong, then test should not pass.
    pub fn with_files(files: impl IntoIterator<Item = (impl Into<PathBuf>, impl Into<Vec<u8>>)>) -> Self {
        let mut map = BTreeMap::new();
        let now = UtcDateTime::now();
        for (path, data) in files {
            let path = path.into();
            let Ok(validated) = validate_path(&path) else {
                // The panic here is DELIBERATE. MockBackend is intended to be
                // used in tests; panics are expected. There is no error result.
                panic!("MockBackend::with_files: invalid path {}", path.display());
            };
            map.insert(validated, (now, data.into()));
        }
        Self {
            name: "mock".to_string(),
            storage: RwLock::new(map),
            calls: Mutex::new(Vec::new()),
            faults: Mutex::new(Faults::default()),
            latency: None,
            store_calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            peak_in_flight: AtomicUsize::new(0),
        }
    }

    /// Change the name of the mock backend.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Sleep for `latency` inside every fetch and store.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Make every fetch of `path` fail.
    pub fn fail_fetch(self, path: impl Into<PathBuf>) -> Self {
        self.faults().fetch.insert(path.into());
        self
    }

    /// Make every store to `path` fail.
    pub fn fail_store(self, path: impl Into<PathBuf>) -> Self {
        self.faults().store.insert(path.into());
        self
    }

    /// Make the `n`th store call (counting from 1, whatever its path) fail.
    pub fn fail_store_call(self, n: usize) -> Self {
        self.faults().store_call = Some(n);
        self
    }

    /// Make every clear fail.
    pub fn fail_clear(self) -> Self {
        self.faults().clear = true;
        self
    }

    /// Every call received so far, in arrival order.
    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Snapshot of the stored entries.
    pub async fn contents(&self) -> BTreeMap<PathBuf, Vec<u8>> {
        self.storage.read().await.iter().map(|(path, (_, data))| (path.clone(), data.clone())).collect()
    }

    /// Highest number of fetches and stores that were ever running at once.
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    fn faults(&self) -> std::sync::MutexGuard<'_, Faults> {
        self.faults.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).push(call);
    }

    async fn enter(&self) -> InFlight<'_> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        InFlight(&self.in_flight)
    }
}
impl Default for MockBackend {
    fn default() -> Self {
        let files: [(&str, &str); 0] = [];
        Self::with_files(files)
    }
}

struct InFlight<'a>(&'a AtomicUsize);
impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl RemoteBackend for MockBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn list_stream(&self) -> RemoteEntryStream<'_> {
        self.record(Call::List);
        Box::pin(stream! {
            // Snapshot under the read lock, then drop it before yielding to
            // avoid holding the lock across yield points.
            let entries: Vec<RemoteEntry> = {
                let guard = self.storage.read().await;
                guard
                    .iter()
                    .map(|(path, (inserted, data))| RemoteEntry::new(path.clone(), data.len() as u64, *inserted))
                    .collect()
            };
            for entry in entries {
                yield Ok(entry);
            }
        })
    }

    async fn fetch(&self, path: &Path) -> Result<Vec<u8>> {
        let path = validate_path(path)?;
        self.record(Call::Fetch(path.clone()));
        let _guard = self.enter().await;
        if self.faults().fetch.contains(&path) {
            exn::bail!(ErrorKind::Injected(format!("fetch {}", path.display())));
        }
        let (_inserted, data) =
            self.storage.read().await.get(&path).cloned().ok_or_else(|| exn::Exn::from(ErrorKind::NotFound(path)))?;
        Ok(data)
    }

    async fn store(&self, path: &Path, data: &[u8]) -> Result<()> {
        let path = validate_path(path)?;
        self.record(Call::Store(path.clone(), data.to_vec()));
        let call = self.store_calls.fetch_add(1, Ordering::SeqCst) + 1;
        let _guard = self.enter().await;
        let fail = {
            let faults = self.faults();
            faults.store.contains(&path) || faults.store_call == Some(call)
        };
        if fail {
            exn::bail!(ErrorKind::Injected(format!("store {}", path.display())));
        }
        self.storage.write().await.insert(path, (UtcDateTime::now(), data.to_vec()));
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        self.record(Call::Clear);
        if self.faults().clear {
            exn::bail!(ErrorKind::Injected("clear".to_string()));
        }
        self.storage.write().await.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_store_and_fetch() {
        let backend = MockBackend::default();
        backend.store(Path::new("test.dat"), b"hello").await.unwrap();
        assert_eq!(backend.fetch(Path::new("test.dat")).await.unwrap(), b"hello");
        assert_eq!(
            backend.calls(),
            vec![Call::Store(PathBuf::from("test.dat"), b"hello".to_vec()), Call::Fetch(PathBuf::from("test.dat"))]
        );
    }

    #[tokio::test]
    async fn test_fetch_not_found() {
        let backend = MockBackend::default();
        let err = backend.fetch(Path::new("missing.dat")).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::NotFound(_)));
    }

    #[tokio::test]
    async fn test_list_and_clear() {
        let backend = MockBackend::with_files([("b.dat", Vec::from(*b"2")), ("a/a.dat", Vec::from(*b"1"))]);
        let entries = backend.list().await.unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].path, PathBuf::from("a/a.dat"));
        backend.clear().await.unwrap();
        assert!(backend.contents().await.is_empty());
    }

    #[tokio::test]
    async fn test_injected_faults() {
        let backend = MockBackend::with_files([("a.dat", Vec::from(*b"1"))])
            .fail_fetch("a.dat")
            .fail_store("b.dat")
            .fail_clear();
        let err = backend.fetch(Path::new("a.dat")).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::Injected(_)));
        assert!(backend.store(Path::new("b.dat"), b"x").await.is_err());
        assert!(backend.store(Path::new("c.dat"), b"x").await.is_ok());
        assert!(backend.clear().await.is_err());
        // The failed clear didn't wipe anything.
        assert_eq!(backend.contents().await.len(), 2);
    }

    #[tokio::test]
    async fn test_fail_nth_store_call() {
        let backend = MockBackend::default().fail_store_call(2);
        assert!(backend.store(Path::new("1.dat"), b"1").await.is_ok());
        assert!(backend.store(Path::new("2.dat"), b"2").await.is_err());
        assert!(backend.store(Path::new("3.dat"), b"3").await.is_ok());
        assert_eq!(backend.contents().await.len(), 2);
    }

    #[tokio::test]
    async fn test_path_traversal_rejected() {
        let backend = MockBackend::default();
        assert!(backend.fetch(Path::new("../etc/passwd")).await.is_err());
        assert!(backend.store(Path::new("../escape"), b"bad").await.is_err());
        assert!(backend.calls().is_empty());
    }

    #[test]
    #[should_panic(expected = "invalid path")]
    fn test_with_files_panics_on_bad_path() {
        MockBackend::with_files([("../escape", Vec::from(*b"bad"))]);
    }
}

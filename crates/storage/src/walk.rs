//! Recursive enumeration of regular files below a directory.

use crate::error::{ErrorKind, Result};
use crate::path::relative_to;
use async_stream::stream;
use futures::{Stream, TryStreamExt};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use tokio::fs::{self, DirEntry};

pub type PathStream<'a> = Pin<Box<dyn Stream<Item = Result<PathBuf>> + Send + 'a>>;

enum WalkEntry {
    File(PathBuf),
    Descend(PathBuf),
    Skip,
}

pub(crate) fn map_io_error(e: std::io::Error, path: &Path) -> ErrorKind {
    match e.kind() {
        std::io::ErrorKind::NotFound => ErrorKind::NotFound(path.to_path_buf()),
        std::io::ErrorKind::PermissionDenied => ErrorKind::PermissionDenied(path.to_path_buf()),
        _ => ErrorKind::Io(e),
    }
}

async fn process_entry(root: &Path, entry: DirEntry) -> Result<WalkEntry> {
    let path = entry.path();
    let mut file_type = entry.file_type().await.map_err(|e| map_io_error(e, &path))?;
    if file_type.is_symlink() {
        // Links count as whatever they point at. Broken links are skipped.
        file_type = match fs::metadata(&path).await {
            Ok(metadata) => metadata.file_type(),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(WalkEntry::Skip),
            Err(e) => return Err(map_io_error(e, &path).into()),
        };
    }
    if file_type.is_dir() {
        return Ok(WalkEntry::Descend(path));
    }
    if file_type.is_file() {
        return Ok(WalkEntry::File(relative_to(root, &path)?));
    }
    // Sockets, FIFOs and the like are not part of a file set.
    Ok(WalkEntry::Skip)
}

/// Streams the path (relative to `root`) of every regular file below `root`.
///
/// Subdirectories are descended into but never yielded themselves. Symbolic
/// links are followed; a directory reached twice (a link cycle) is only read
/// once, and broken links are skipped. A `root` that does not exist yields
/// nothing, matching how object stores answer a listing for an unknown
/// prefix. Order is whatever the filesystem returns;
/// use [`walk_sorted`] when it matters.
pub fn walk(root: &Path) -> PathStream<'_> {
    let mut stack = vec![root.to_path_buf()];
    let mut visited = HashSet::new();
    Box::pin(stream! {
        'dirs: while let Some(current) = stack.pop() {
            let first_visit = match fs::canonicalize(&current).await {
                Ok(canonical) => visited.insert(canonical),
                Err(_) => true,
            };
            if !first_visit {
                continue 'dirs;
            }
            let mut entries = match fs::read_dir(&current).await {
                Ok(entries) => entries,
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => continue,
                Err(err) => {
                    yield Err(exn::Exn::from(map_io_error(err, &current)));
                    continue 'dirs;
                }
            };
            'entries: loop {
                let entry = match entries.next_entry().await {
                    Ok(Some(entry)) => entry,
                    Ok(None) => break 'entries,
                    Err(e) => { yield Err(exn::Exn::from(map_io_error(e, &current))); continue 'entries; },
                };
                match process_entry(root, entry).await {
                    Ok(WalkEntry::File(f)) => yield Ok(f),
                    Ok(WalkEntry::Descend(d)) => stack.push(d),
                    Ok(WalkEntry::Skip) => {},
                    Err(e) => yield Err(e),
                };
            }
        }
    })
}

/// Collects [`walk`] and sorts the result, so two walks over the same tree
/// always agree on order.
pub async fn walk_sorted(root: &Path) -> Result<Vec<PathBuf>> {
    let mut paths: Vec<PathBuf> = walk(root).try_collect().await?;
    paths.sort();
    Ok(paths)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(root: &Path, relative: &str) {
        let path = root.join(relative);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, relative.as_bytes()).unwrap();
    }

    #[tokio::test]
    async fn test_walk_nested() {
        let temp_dir = tempfile::tempdir().unwrap();
        touch(temp_dir.path(), "b.sav");
        touch(temp_dir.path(), "a/one.sav");
        touch(temp_dir.path(), "a/deep/er/two.sav");
        std::fs::create_dir_all(temp_dir.path().join("empty/dir")).unwrap();
        let paths = walk_sorted(temp_dir.path()).await.unwrap();
        assert_eq!(
            paths,
            vec![PathBuf::from("a/deep/er/two.sav"), PathBuf::from("a/one.sav"), PathBuf::from("b.sav")]
        );
    }

    #[tokio::test]
    async fn test_walk_empty() {
        let temp_dir = tempfile::tempdir().unwrap();
        assert!(walk_sorted(temp_dir.path()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_walk_missing_root() {
        let temp_dir = tempfile::tempdir().unwrap();
        let missing = temp_dir.path().join("nope");
        assert!(walk_sorted(&missing).await.unwrap().is_empty());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_walk_follows_symlinks() {
        let outside = tempfile::tempdir().unwrap();
        touch(outside.path(), "linked.sav");
        touch(outside.path(), "shared/inner.sav");
        let temp_dir = tempfile::tempdir().unwrap();
        touch(temp_dir.path(), "real.sav");
        std::os::unix::fs::symlink(outside.path().join("linked.sav"), temp_dir.path().join("linked.sav")).unwrap();
        std::os::unix::fs::symlink(outside.path().join("shared"), temp_dir.path().join("shared")).unwrap();
        std::os::unix::fs::symlink(temp_dir.path().join("gone.sav"), temp_dir.path().join("broken.sav")).unwrap();
        let paths = walk_sorted(temp_dir.path()).await.unwrap();
        assert_eq!(
            paths,
            vec![PathBuf::from("linked.sav"), PathBuf::from("real.sav"), PathBuf::from("shared/inner.sav")]
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_walk_symlink_cycle() {
        let temp_dir = tempfile::tempdir().unwrap();
        touch(temp_dir.path(), "a/one.sav");
        std::os::unix::fs::symlink(temp_dir.path(), temp_dir.path().join("a/loop")).unwrap();
        let paths = walk_sorted(temp_dir.path()).await.unwrap();
        assert_eq!(paths, vec![PathBuf::from("a/one.sav")]);
    }
}

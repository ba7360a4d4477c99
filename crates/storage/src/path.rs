//! Path validation.
//!
//! Every path handed to a [`RemoteBackend`](crate::RemoteBackend) is relative
//! to the store's root. These helpers make sure it stays that way.

use std::path::{Component, Path, PathBuf};

use crate::error::{ErrorKind, Result};

/// Validates a relative storage path and returns its normalized form.
///
/// `.` components, duplicate separators and trailing separators are dropped,
/// and `..` is resolved as long as it never climbs above the root.
///
/// > **Note:** This does **not** normalize backslashes or non-UTF8 bytes. Null
/// >           bytes are explicitly rejected.
///
/// # Returns
/// Returns the normalized path if valid, or [`InvalidPath`](crate::error::ErrorKind::InvalidPath)
/// if invalid.
///
/// # Examples
///
/// ```
/// use std::path::Path;
/// use ogsync_storage::validate_path;
/// // Valid paths
/// assert!(validate_path("slot1/save.dat").is_ok());
/// assert!(validate_path("profiles/../slot1/save.dat").is_ok());
/// // Invalid paths
/// assert!(validate_path("../outside.dat").is_err());
/// assert!(validate_path("slot1/../../outside.dat").is_err());
/// assert!(validate_path("sa\0ve.dat").is_err());
/// // Paths get resolved
/// assert_eq!(
///     validate_path("./slot1//.//save.dat/").unwrap(),
///     Path::new("slot1/save.dat")
/// );
/// ```
pub fn validate(path: impl AsRef<Path>) -> Result<PathBuf> {
    let original = path.as_ref();
    let mut components = Vec::new();
    for component in original.components() {
        match component {
            Component::Normal(s) => {
                // Null bytes pass through Path::components() on Unix but cause
                // truncation in C-based syscalls.
                if s.as_encoded_bytes().contains(&0) {
                    exn::bail!(ErrorKind::InvalidPath(original.to_path_buf()));
                }
                components.push(s)
            },
            // A leading separator is treated as "the root of the store".
            Component::CurDir | Component::RootDir => {},
            Component::Prefix(_) => exn::bail!(ErrorKind::InvalidPath(original.to_path_buf())),
            Component::ParentDir => {
                if components.pop().is_none() {
                    exn::bail!(ErrorKind::InvalidPath(original.to_path_buf()));
                }
            },
        }
    }
    if components.is_empty() {
        exn::bail!(ErrorKind::InvalidPath(original.to_path_buf()));
    }
    Ok(components.into_iter().collect())
}

/// Strips `root` from an absolute `path` and validates what is left.
///
/// Fails with [`InvalidPath`](crate::error::ErrorKind::InvalidPath) when
/// `path` does not live under `root`.
pub fn relative_to(root: &Path, path: &Path) -> Result<PathBuf> {
    match path.strip_prefix(root) {
        Ok(relative) => validate(relative),
        Err(_) => exn::bail!(ErrorKind::InvalidPath(path.to_path_buf())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("slot1/save.dat", "slot1/save.dat")]
    #[case("save.dat", "save.dat")]
    #[case("a//b//c", "a/b/c")]
    #[case("a/./b/./c", "a/b/c")]
    #[case("/rooted/save.dat", "rooted/save.dat")]
    #[case("a/b/..", "a")]
    #[case("slot1///", "slot1")]
    fn test_valid_paths(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(validate(Path::new(input)).unwrap(), Path::new(expected));
    }

    #[rstest]
    #[case("../etc/passwd")]
    #[case("a/../../b")]
    #[case("..")]
    #[case("")]
    #[case(".")]
    #[case("./.")]
    #[case("//")]
    #[case("a\0b")]
    fn test_invalid_paths(#[case] input: &str) {
        let err = validate(Path::new(input)).unwrap_err();
        assert!(matches!(&*err, ErrorKind::InvalidPath(_)));
    }

    #[test]
    fn test_relative_to() {
        let root = Path::new("/saves/game");
        assert_eq!(relative_to(root, Path::new("/saves/game/slot1/a.dat")).unwrap(), Path::new("slot1/a.dat"));
        assert!(relative_to(root, Path::new("/elsewhere/a.dat")).is_err());
        // The root itself is not a file path.
        assert!(relative_to(root, root).is_err());
    }
}

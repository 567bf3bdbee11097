//! Validation of the directory argument.

use crate::errors::ResolveError;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Absolute, symlink-resolved path to a readable directory.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CanonicalPath(PathBuf);

impl CanonicalPath {
    pub fn as_path(&self) -> &Path {
        &self.0
    }
}

impl AsRef<Path> for CanonicalPath {
    fn as_ref(&self) -> &Path {
        &self.0
    }
}

impl std::fmt::Display for CanonicalPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.display().fmt(f)
    }
}

/// Resolve `raw_path` to a [`CanonicalPath`].
///
/// Only reads the filesystem: canonicalizes, checks the type, and opens the
/// directory listing once to surface permission problems before the run.
pub fn resolve(raw_path: &str) -> Result<CanonicalPath, ResolveError> {
    if raw_path.is_empty() {
        return Err(ResolveError::InvalidPath {
            path: raw_path.to_string(),
        });
    }

    let canonical = std::fs::canonicalize(raw_path).map_err(|e| io_to_resolve(raw_path, e))?;
    let meta = std::fs::metadata(&canonical).map_err(|e| io_to_resolve(raw_path, e))?;
    if !meta.is_dir() {
        return Err(ResolveError::NotADirectory {
            path: canonical.display().to_string(),
        });
    }

    std::fs::read_dir(&canonical).map_err(|e| ResolveError::Permission {
        path: canonical.display().to_string(),
        message: e.to_string(),
    })?;

    Ok(CanonicalPath(canonical))
}

fn io_to_resolve(raw_path: &str, e: std::io::Error) -> ResolveError {
    match e.kind() {
        ErrorKind::PermissionDenied => ResolveError::Permission {
            path: raw_path.to_string(),
            message: e.to_string(),
        },
        // ENOTDIR: a path component is a regular file ("file.txt/child").
        ErrorKind::NotADirectory => ResolveError::NotADirectory {
            path: raw_path.to_string(),
        },
        _ => ResolveError::InvalidPath {
            path: raw_path.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn resolves_existing_directory_to_absolute_path() {
        let dir = TempDir::new().unwrap();
        let resolved = resolve(dir.path().to_str().unwrap()).unwrap();
        assert!(resolved.as_path().is_absolute());
        assert_eq!(
            resolved.as_path(),
            std::fs::canonicalize(dir.path()).unwrap()
        );
    }

    #[test]
    fn missing_path_is_invalid() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("does-not-exist");
        let err = resolve(missing.to_str().unwrap()).unwrap_err();
        assert!(matches!(err, ResolveError::InvalidPath { .. }), "{err:?}");
    }

    #[test]
    fn empty_path_is_invalid() {
        assert!(matches!(
            resolve("").unwrap_err(),
            ResolveError::InvalidPath { .. }
        ));
    }

    #[test]
    fn regular_file_is_not_a_directory() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("plain.txt");
        std::fs::write(&file, "x").unwrap();
        let err = resolve(file.to_str().unwrap()).unwrap_err();
        assert!(matches!(err, ResolveError::NotADirectory { .. }), "{err:?}");
    }

    #[cfg(unix)]
    #[test]
    fn symlink_is_resolved_to_target() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("real");
        std::fs::create_dir(&target).unwrap();
        let link = dir.path().join("link");
        std::os::unix::fs::symlink(&target, &link).unwrap();

        let resolved = resolve(link.to_str().unwrap()).unwrap();
        assert_eq!(resolved.as_path(), std::fs::canonicalize(&target).unwrap());
    }
}

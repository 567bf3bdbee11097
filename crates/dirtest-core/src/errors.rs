//! Error types for path resolution, discovery and case manifests.
//!
//! Only [`ResolveError`] is fatal. Discovery and manifest errors are converted
//! to data (a report entry or an `Error` result) at the smallest scope.

use std::path::PathBuf;

/// Fatal, pre-run errors for the directory argument.
#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    /// Path does not exist.
    #[error("path does not exist: {path}")]
    InvalidPath { path: String },

    /// Path exists but is not a directory.
    #[error("not a directory: {path}")]
    NotADirectory { path: String },

    /// Path or its listing cannot be read.
    #[error("permission denied: {path}: {message}")]
    Permission { path: String, message: String },
}

impl ResolveError {
    /// Stable short code, used in logs and JSON output.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidPath { .. } => "E_INVALID_PATH",
            Self::NotADirectory { .. } => "E_NOT_A_DIRECTORY",
            Self::Permission { .. } => "E_PERMISSION",
        }
    }
}

/// An unreadable subtree encountered after traversal started.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("cannot read {}: {message}", path.display())]
pub struct DiscoveryError {
    pub path: PathBuf,
    pub message: String,
}

/// Invalid `case.yaml` manifest or `# dirtest:` directive.
#[derive(Debug, thiserror::Error)]
pub enum ManifestError {
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid manifest {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("invalid manifest {}: {reason}", path.display())]
    Invalid { path: PathBuf, reason: String },

    #[error("invalid directive on line {line}: {reason}")]
    Directive { line: usize, reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_error_messages_are_one_line() {
        let errs = [
            ResolveError::InvalidPath {
                path: "/nope".into(),
            },
            ResolveError::NotADirectory {
                path: "/etc/hosts".into(),
            },
            ResolveError::Permission {
                path: "/root".into(),
                message: "denied".into(),
            },
        ];
        for e in &errs {
            assert!(!e.to_string().contains('\n'), "multi-line: {e}");
        }
        assert_eq!(errs[0].code(), "E_INVALID_PATH");
        assert_eq!(errs[1].code(), "E_NOT_A_DIRECTORY");
        assert_eq!(errs[2].code(), "E_PERMISSION");
    }

    #[test]
    fn discovery_error_display_includes_path() {
        let e = DiscoveryError {
            path: PathBuf::from("/suite/locked"),
            message: "Permission denied".into(),
        };
        assert_eq!(e.to_string(), "cannot read /suite/locked: Permission denied");
    }
}

//! What counts as a test artifact.
//!
//! The traversal in [`super::Discovery`] never inspects names itself; it asks
//! an [`ArtifactPolicy`] about every entry. New conventions are new policies.

use crate::model::CaseKind;
use std::fs::FileType;
use std::path::Path;

/// Manifest file that turns a directory into a single test case.
pub const MANIFEST_FILE: &str = "case.yaml";

/// Suffix of the optional expected-stdout file next to a script case.
pub const EXPECTED_SUFFIX: &str = ".expected";

/// Decision for one filesystem entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    /// The entry is a test case; directories are not entered.
    Case(CaseKind),
    /// Walk into this directory.
    Descend,
    /// Not a test artifact; directories are not entered.
    Ignore,
}

pub trait ArtifactPolicy: Send + Sync {
    /// `file_type` is the type of the link target when links are followed.
    fn classify(&self, path: &Path, file_type: &FileType) -> Classification;
}

/// Default convention: `*.test` scripts and `case.yaml` directories.
/// Hidden entries are ignored.
#[derive(Debug, Clone)]
pub struct ConventionPolicy {
    suffixes: Vec<String>,
}

impl ConventionPolicy {
    pub fn new(suffixes: Vec<String>) -> Self {
        Self { suffixes }
    }

    pub fn suffixes(&self) -> &[String] {
        &self.suffixes
    }

    fn matches_suffix(&self, name: &str) -> bool {
        self.suffixes
            .iter()
            .any(|s| name.len() > s.len() && name.ends_with(s.as_str()))
    }
}

impl Default for ConventionPolicy {
    fn default() -> Self {
        Self::new(vec![crate::config::DEFAULT_SUFFIX.to_string()])
    }
}

impl ArtifactPolicy for ConventionPolicy {
    fn classify(&self, path: &Path, file_type: &FileType) -> Classification {
        let name = match path.file_name() {
            Some(n) => n.to_string_lossy(),
            None => return Classification::Descend,
        };
        if name.starts_with('.') {
            return Classification::Ignore;
        }

        if file_type.is_dir() {
            if path.join(MANIFEST_FILE).is_file() {
                return Classification::Case(CaseKind::Directory);
            }
            return Classification::Descend;
        }

        if file_type.is_file() && self.matches_suffix(&name) {
            return Classification::Case(CaseKind::File);
        }
        Classification::Ignore
    }
}

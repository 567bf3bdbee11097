//! Deterministic, lazy discovery of test cases under a root directory.
//!
//! Traversal is depth-first with entries sorted by file name at every level,
//! so an unchanged tree always yields the same sequence. Symlinks are
//! followed; a directory whose canonical path was already visited is skipped
//! with a warning. Unreadable subtrees are reported and the walk continues.

pub mod policy;

use crate::errors::DiscoveryError;
use crate::model::{DiscoveryWarning, TestCase, WarningKind};
use crate::resolve::CanonicalPath;
use policy::{ArtifactPolicy, Classification};
use std::collections::HashSet;
use std::path::{Component, Path, PathBuf};
use walkdir::WalkDir;

pub use policy::ConventionPolicy;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiscoveryEvent {
    Case(TestCase),
    Warning(DiscoveryWarning),
    Error(DiscoveryError),
}

/// Everything one traversal produced, in discovery order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiscoveredSuite {
    pub cases: Vec<TestCase>,
    pub warnings: Vec<DiscoveryWarning>,
    pub errors: Vec<DiscoveryError>,
}

impl DiscoveredSuite {
    pub fn is_empty(&self) -> bool {
        self.cases.is_empty()
    }
}

/// Start a traversal of `root`. Each call starts over from the beginning.
pub fn discover<'p>(root: &CanonicalPath, policy: &'p dyn ArtifactPolicy) -> Discovery<'p> {
    let walker = WalkDir::new(root.as_path())
        .follow_links(true)
        .sort_by_file_name()
        .into_iter();
    Discovery {
        root: root.as_path().to_path_buf(),
        walker,
        policy,
        visited: HashSet::new(),
    }
}

/// Lazy iterator over [`DiscoveryEvent`]s.
pub struct Discovery<'p> {
    root: PathBuf,
    walker: walkdir::IntoIter,
    policy: &'p dyn ArtifactPolicy,
    visited: HashSet<PathBuf>,
}

impl Discovery<'_> {
    /// Drain the traversal into cases, warnings and errors.
    pub fn collect_all(self) -> DiscoveredSuite {
        let mut suite = DiscoveredSuite::default();
        for event in self {
            match event {
                DiscoveryEvent::Case(c) => suite.cases.push(c),
                DiscoveryEvent::Warning(w) => suite.warnings.push(w),
                DiscoveryEvent::Error(e) => suite.errors.push(e),
            }
        }
        tracing::debug!(
            cases = suite.cases.len(),
            warnings = suite.warnings.len(),
            errors = suite.errors.len(),
            "discovery finished"
        );
        suite
    }

    /// Records `path`'s canonical form; `Some(event)` when it must be skipped.
    fn mark_visited(&mut self, path: &Path) -> Option<DiscoveryEvent> {
        match std::fs::canonicalize(path) {
            Ok(canonical) => {
                if self.visited.insert(canonical.clone()) {
                    return None;
                }
                tracing::warn!(path = %path.display(), target = %canonical.display(), "directory already visited, skipping");
                Some(DiscoveryEvent::Warning(DiscoveryWarning {
                    path: path.to_path_buf(),
                    kind: WarningKind::AlreadyVisited,
                    message: format!("already visited as {}", canonical.display()),
                }))
            }
            Err(e) => Some(DiscoveryEvent::Error(DiscoveryError {
                path: path.to_path_buf(),
                message: e.to_string(),
            })),
        }
    }

    fn walk_error(&self, err: walkdir::Error) -> DiscoveryEvent {
        let path = err
            .path()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.root.clone());

        if let Some(ancestor) = err.loop_ancestor() {
            tracing::warn!(path = %path.display(), ancestor = %ancestor.display(), "symlink cycle, skipping");
            return DiscoveryEvent::Warning(DiscoveryWarning {
                message: format!("symlink cycle back to {}", ancestor.display()),
                path,
                kind: WarningKind::SymlinkCycle,
            });
        }

        let message = err
            .io_error()
            .map(|e| e.to_string())
            .unwrap_or_else(|| err.to_string());
        tracing::warn!(path = %path.display(), error = %message, "unreadable entry during discovery");
        DiscoveryEvent::Error(DiscoveryError { path, message })
    }

    fn case_id(&self, path: &Path) -> String {
        let rel = path.strip_prefix(&self.root).unwrap_or(path);
        rel.components()
            .filter_map(|c| match c {
                Component::Normal(s) => Some(s.to_string_lossy().into_owned()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("/")
    }
}

impl Iterator for Discovery<'_> {
    type Item = DiscoveryEvent;

    fn next(&mut self) -> Option<DiscoveryEvent> {
        loop {
            let entry = match self.walker.next()? {
                Ok(entry) => entry,
                Err(err) => return Some(self.walk_error(err)),
            };
            let path = entry.path().to_path_buf();
            let file_type = entry.file_type();

            // The root itself is always walked.
            if entry.depth() == 0 {
                if let Some(event) = self.mark_visited(&path) {
                    self.walker.skip_current_dir();
                    return Some(event);
                }
                continue;
            }

            match self.policy.classify(&path, &file_type) {
                Classification::Ignore => {
                    if file_type.is_dir() {
                        self.walker.skip_current_dir();
                    }
                }
                Classification::Descend => {
                    if !file_type.is_dir() {
                        continue;
                    }
                    if let Some(event) = self.mark_visited(&path) {
                        self.walker.skip_current_dir();
                        return Some(event);
                    }
                }
                Classification::Case(kind) => {
                    if file_type.is_dir() {
                        self.walker.skip_current_dir();
                        if let Some(event) = self.mark_visited(&path) {
                            return Some(event);
                        }
                    }
                    let case = TestCase {
                        id: self.case_id(&path),
                        source_path: path,
                        kind,
                    };
                    tracing::debug!(case_id = %case.id, kind = ?kind, "discovered case");
                    return Some(DiscoveryEvent::Case(case));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::CaseKind;
    use crate::resolve::resolve;
    use std::fs;
    use tempfile::TempDir;

    fn root(tmp: &TempDir) -> CanonicalPath {
        resolve(tmp.path().to_str().unwrap()).unwrap()
    }

    fn ids(suite: &DiscoveredSuite) -> Vec<&str> {
        suite.cases.iter().map(|c| c.id.as_str()).collect()
    }

    #[test]
    fn lexicographic_depth_first_order() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("b/inner")).unwrap();
        fs::create_dir_all(tmp.path().join("a")).unwrap();
        fs::write(tmp.path().join("z.test"), "").unwrap();
        fs::write(tmp.path().join("b/inner/2.test"), "").unwrap();
        fs::write(tmp.path().join("b/1.test"), "").unwrap();
        fs::write(tmp.path().join("a/x.test"), "").unwrap();
        fs::write(tmp.path().join("a/notes.txt"), "").unwrap();

        let policy = ConventionPolicy::default();
        let suite = discover(&root(&tmp), &policy).collect_all();
        assert_eq!(ids(&suite), vec!["a/x.test", "b/1.test", "b/inner/2.test", "z.test"]);
        assert!(suite.warnings.is_empty());
        assert!(suite.errors.is_empty());
    }

    #[test]
    fn directory_case_is_not_recursed() {
        let tmp = TempDir::new().unwrap();
        let unit = tmp.path().join("unit");
        fs::create_dir_all(unit.join("deep")).unwrap();
        fs::write(unit.join(policy::MANIFEST_FILE), "command: [\"true\"]").unwrap();
        fs::write(unit.join("deep/hidden.test"), "").unwrap();

        let policy = ConventionPolicy::default();
        let suite = discover(&root(&tmp), &policy).collect_all();
        assert_eq!(ids(&suite), vec!["unit"]);
        assert_eq!(suite.cases[0].kind, CaseKind::Directory);
        assert!(suite.cases[0].source_path.is_absolute());
    }

    #[test]
    fn empty_tree_yields_nothing() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("readme.md"), "").unwrap();
        let policy = ConventionPolicy::default();
        assert!(discover(&root(&tmp), &policy).collect_all().is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn symlink_cycle_is_a_warning_not_a_hang() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("loop");
        fs::create_dir(&dir).unwrap();
        fs::write(dir.join("a.test"), "").unwrap();
        std::os::unix::fs::symlink(tmp.path(), dir.join("back")).unwrap();

        let policy = ConventionPolicy::default();
        let suite = discover(&root(&tmp), &policy).collect_all();
        assert_eq!(ids(&suite), vec!["loop/a.test"]);
        assert_eq!(suite.warnings.len(), 1);
        assert!(matches!(
            suite.warnings[0].kind,
            WarningKind::SymlinkCycle | WarningKind::AlreadyVisited
        ));
    }

    #[cfg(unix)]
    #[test]
    fn duplicate_link_is_visited_once() {
        let tmp = TempDir::new().unwrap();
        let real = tmp.path().join("real");
        fs::create_dir(&real).unwrap();
        fs::write(real.join("a.test"), "").unwrap();
        std::os::unix::fs::symlink(&real, tmp.path().join("zlink")).unwrap();

        let policy = ConventionPolicy::default();
        let suite = discover(&root(&tmp), &policy).collect_all();
        assert_eq!(ids(&suite), vec!["real/a.test"]);
        assert_eq!(suite.warnings.len(), 1);
        assert_eq!(suite.warnings[0].kind, WarningKind::AlreadyVisited);
    }

    #[cfg(unix)]
    #[test]
    fn dangling_link_is_an_error_and_walk_continues() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("a.test"), "").unwrap();
        std::os::unix::fs::symlink(tmp.path().join("missing"), tmp.path().join("b_dangling"))
            .unwrap();
        fs::write(tmp.path().join("c.test"), "").unwrap();
        fs::create_dir(tmp.path().join("d")).unwrap();
        fs::write(tmp.path().join("d/e.test"), "").unwrap();

        let policy = ConventionPolicy::default();
        let suite = discover(&root(&tmp), &policy).collect_all();
        assert_eq!(ids(&suite), vec!["a.test", "c.test", "d/e.test"]);
        assert_eq!(suite.errors.len(), 1);
        assert!(suite.errors[0].path.ends_with("b_dangling"), "{:?}", suite.errors[0]);
        assert!(suite.warnings.is_empty());
    }
}

//! Per-run temp root and per-case scratch directories.

use anyhow::Context;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::TempDir;

const SCRATCH_PREFIX_MAX: usize = 40;

struct FixtureInner {
    root: TempDir,
    active: AtomicUsize,
}

/// Temp root created once per run. Removed when the fixture and every
/// outstanding lease are dropped.
pub struct RunFixture {
    inner: Arc<FixtureInner>,
}

impl RunFixture {
    pub fn new() -> anyhow::Result<Self> {
        let root = tempfile::Builder::new()
            .prefix("dirtest-run-")
            .tempdir()
            .context("failed to create run fixture")?;
        tracing::debug!(root = %root.path().display(), "run fixture created");
        Ok(Self {
            inner: Arc::new(FixtureInner {
                root,
                active: AtomicUsize::new(0),
            }),
        })
    }

    pub fn root(&self) -> &Path {
        self.inner.root.path()
    }

    /// Handle held by one executing case.
    pub fn lease(&self) -> FixtureLease {
        self.inner.active.fetch_add(1, Ordering::SeqCst);
        FixtureLease {
            inner: Arc::clone(&self.inner),
        }
    }

    /// Number of leases currently held.
    pub fn active_cases(&self) -> usize {
        self.inner.active.load(Ordering::SeqCst)
    }
}

pub struct FixtureLease {
    inner: Arc<FixtureInner>,
}

impl FixtureLease {
    pub fn root(&self) -> &Path {
        self.inner.root.path()
    }

    /// Fresh scratch directory for `case_id`; removed when the returned
    /// guard is dropped.
    pub fn scratch(&self, case_id: &str) -> anyhow::Result<TempDir> {
        let prefix = format!("{}-", scratch_prefix(case_id));
        tempfile::Builder::new()
            .prefix(&prefix)
            .tempdir_in(self.root())
            .with_context(|| format!("failed to create scratch directory for {case_id}"))
    }
}

impl Drop for FixtureLease {
    fn drop(&mut self) {
        self.inner.active.fetch_sub(1, Ordering::SeqCst);
    }
}

fn scratch_prefix(case_id: &str) -> String {
    case_id
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .take(SCRATCH_PREFIX_MAX)
        .collect()
}

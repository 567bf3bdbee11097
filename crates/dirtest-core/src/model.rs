use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

/// What the discoverer found on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaseKind {
    /// A single script file, run through the configured interpreter.
    File,
    /// A directory with a `case.yaml` manifest, run as one unit.
    Directory,
}

/// One discovered test case. Immutable after discovery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestCase {
    /// `/`-separated path relative to the suite root; unique within a run.
    pub id: String,
    pub source_path: PathBuf,
    pub kind: CaseKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Pass,
    Fail,
    Error,
    Skip,
}

impl Outcome {
    pub const ALL: [Outcome; 4] = [Outcome::Pass, Outcome::Fail, Outcome::Error, Outcome::Skip];

    pub fn label(self) -> &'static str {
        match self {
            Outcome::Pass => "PASS",
            Outcome::Fail => "FAIL",
            Outcome::Error => "ERROR",
            Outcome::Skip => "SKIP",
        }
    }

    /// Fail and Error make the run fail.
    pub fn is_blocking(self) -> bool {
        matches!(self, Outcome::Fail | Outcome::Error)
    }
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Result of executing exactly one [`TestCase`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestResult {
    pub case_id: String,
    pub outcome: Outcome,
    #[serde(rename = "duration_ms", with = "duration_ms")]
    pub duration: Duration,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub captured_output: Option<String>,
}

impl TestResult {
    pub fn new(case_id: impl Into<String>, outcome: Outcome, duration: Duration) -> Self {
        Self {
            case_id: case_id.into(),
            outcome,
            duration,
            message: None,
            captured_output: None,
        }
    }

    /// Error result for a case that never produced output.
    pub fn error(case_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(case_id, Outcome::Error, Duration::ZERO).with_message(message)
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_output(mut self, output: Option<String>) -> Self {
        self.captured_output = output;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningKind {
    /// A symlink pointing back at one of its own ancestors.
    SymlinkCycle,
    /// A directory reached a second time through another link.
    AlreadyVisited,
}

/// Non-fatal discovery finding, reported as a SKIP line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveryWarning {
    pub path: PathBuf,
    pub kind: WarningKind,
    pub message: String,
}

/// Frozen, run-level summary handed to the reporter.
///
/// `total == results.len()` and the counts sum to `total`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub total: usize,
    pub counts_by_outcome: BTreeMap<Outcome, usize>,
    pub results: Vec<TestResult>,
    #[serde(rename = "wall_time_ms", with = "duration_ms")]
    pub wall_time: Duration,
    #[serde(default)]
    pub warnings: Vec<DiscoveryWarning>,
    #[serde(default)]
    pub discovery_errors: Vec<String>,
}

impl RunSummary {
    pub fn count(&self, outcome: Outcome) -> usize {
        self.counts_by_outcome.get(&outcome).copied().unwrap_or(0)
    }

    pub fn has_blocking(&self) -> bool {
        self.count(Outcome::Fail) > 0 || self.count(Outcome::Error) > 0
    }

    /// Zero-filled counts for `results`.
    pub fn tally(results: &[TestResult]) -> BTreeMap<Outcome, usize> {
        let mut counts: BTreeMap<Outcome, usize> = Outcome::ALL.iter().map(|o| (*o, 0)).collect();
        for r in results {
            *counts.entry(r.outcome).or_insert(0) += 1;
        }
        counts
    }
}

/// Durations serialize as integer milliseconds.
mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(d: &Duration, s: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        s.serialize_u64(d.as_millis().min(u128::from(u64::MAX)) as u64)
    }

    pub fn deserialize<'de, D>(d: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(Duration::from_millis(u64::deserialize(d)?))
    }
}

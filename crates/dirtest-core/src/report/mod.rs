//! Rendering of a finished run and the exit-code policy.

pub mod console;
pub mod json;
pub mod progress;

use crate::model::RunSummary;
use std::io::{self, Write};

pub use json::write_json;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReportOptions {
    /// Include captured output of FAIL/ERROR cases.
    pub show_output: bool,
}

/// Overall result of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunVerdict {
    /// No FAIL and no ERROR.
    Passed,
    /// At least one FAIL or ERROR.
    Failed,
    /// Nothing was discovered.
    Empty,
}

impl RunVerdict {
    pub fn from_summary(summary: &RunSummary) -> Self {
        if summary.total == 0 {
            Self::Empty
        } else if summary.has_blocking() {
            Self::Failed
        } else {
            Self::Passed
        }
    }

    pub fn exit_code(self) -> i32 {
        match self {
            Self::Passed => 0,
            Self::Failed => 1,
            Self::Empty => 2,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Passed => "passed",
            Self::Failed => "failed",
            Self::Empty => "empty",
        }
    }
}

/// Write the plain-text report and return the verdict.
pub fn report<W: Write>(
    summary: &RunSummary,
    out: &mut W,
    opts: &ReportOptions,
) -> io::Result<RunVerdict> {
    let verdict = RunVerdict::from_summary(summary);
    console::write_results(summary, out, opts)?;
    if verdict == RunVerdict::Empty {
        writeln!(out, "no test cases discovered")?;
    }
    writeln!(out, "{}", console::format_summary_line(summary))?;
    out.flush()?;
    Ok(verdict)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Outcome, TestResult};
    use std::time::Duration;

    fn summary(outcomes: &[Outcome]) -> RunSummary {
        let results: Vec<_> = outcomes
            .iter()
            .enumerate()
            .map(|(i, o)| TestResult::new(format!("case{i}"), *o, Duration::ZERO))
            .collect();
        RunSummary {
            total: results.len(),
            counts_by_outcome: RunSummary::tally(&results),
            results,
            wall_time: Duration::ZERO,
            warnings: vec![],
            discovery_errors: vec![],
        }
    }

    #[test]
    fn verdict_policy() {
        assert_eq!(RunVerdict::from_summary(&summary(&[])), RunVerdict::Empty);
        assert_eq!(
            RunVerdict::from_summary(&summary(&[Outcome::Pass, Outcome::Skip])),
            RunVerdict::Passed
        );
        assert_eq!(
            RunVerdict::from_summary(&summary(&[Outcome::Pass, Outcome::Error])),
            RunVerdict::Failed
        );
        assert_eq!(
            RunVerdict::from_summary(&summary(&[Outcome::Fail])),
            RunVerdict::Failed
        );
        assert_eq!(RunVerdict::Passed.exit_code(), 0);
        assert_eq!(RunVerdict::Failed.exit_code(), 1);
        assert_eq!(RunVerdict::Empty.exit_code(), 2);
    }

    #[test]
    fn report_lists_every_case_then_summary() {
        let s = summary(&[Outcome::Pass, Outcome::Fail]);
        let mut buf = Vec::new();
        let verdict = report(&s, &mut buf, &ReportOptions::default()).unwrap();
        assert_eq!(verdict, RunVerdict::Failed);
        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<_> = text.lines().collect();
        assert!(lines[0].starts_with("PASS  case0"));
        assert!(lines[1].starts_with("FAIL  case1"));
        assert!(lines.last().unwrap().starts_with("2 tests: 1 passed, 1 failed"));
        assert!(!text.contains('\u{1b}'), "no ANSI codes");
    }

    #[test]
    fn empty_report_says_so() {
        let mut buf = Vec::new();
        let verdict = report(&summary(&[]), &mut buf, &ReportOptions::default()).unwrap();
        assert_eq!(verdict, RunVerdict::Empty);
        assert!(String::from_utf8(buf).unwrap().contains("no test cases discovered"));
    }
}

use super::ReportOptions;
use crate::model::{Outcome, RunSummary, TestResult};
use std::io::{self, Write};
use std::time::Duration;

const DETAIL_INDENT: &str = "      ";

/// `PASS  a/x.test (0.12s)`
#[must_use]
pub fn format_result_line(r: &TestResult) -> String {
    format!(
        "{:<5} {} ({})",
        r.outcome.label(),
        r.case_id,
        format_secs(r.duration)
    )
}

#[must_use]
pub fn format_summary_line(summary: &RunSummary) -> String {
    format!(
        "{} {}: {} passed, {} failed, {} errors, {} skipped in {}",
        summary.total,
        if summary.total == 1 { "test" } else { "tests" },
        summary.count(Outcome::Pass),
        summary.count(Outcome::Fail),
        summary.count(Outcome::Error),
        summary.count(Outcome::Skip),
        format_secs(summary.wall_time)
    )
}

fn format_secs(d: Duration) -> String {
    format!("{:.2}s", d.as_secs_f64())
}

pub fn write_results<W: Write>(
    summary: &RunSummary,
    out: &mut W,
    opts: &ReportOptions,
) -> io::Result<()> {
    for r in &summary.results {
        writeln!(out, "{}", format_result_line(r))?;
        if r.outcome == Outcome::Skip {
            if let Some(reason) = &r.message {
                writeln!(out, "{DETAIL_INDENT}{reason}")?;
            }
            continue;
        }
        if !r.outcome.is_blocking() {
            continue;
        }
        if let Some(msg) = &r.message {
            writeln!(out, "{DETAIL_INDENT}{msg}")?;
        }
        if opts.show_output {
            if let Some(output) = &r.captured_output {
                for line in output.lines() {
                    writeln!(out, "{DETAIL_INDENT}| {line}")?;
                }
            }
        }
    }

    for w in &summary.warnings {
        writeln!(out, "{:<5} {} ({})", Outcome::Skip.label(), w.path.display(), w.message)?;
    }
    for e in &summary.discovery_errors {
        writeln!(out, "discovery error: {e}")?;
    }
    Ok(())
}

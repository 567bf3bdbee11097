//! Run progress. The runner emits one event per completed case, in
//! completion order; the CLI consumes them through a sink.

use crate::model::Outcome;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// One completed case.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressEvent {
    pub done: usize,
    pub total: usize,
    /// `None` when the worker task itself was lost.
    pub case_id: Option<String>,
    pub outcome: Outcome,
}

pub type ProgressSink = Arc<dyn Fn(ProgressEvent) + Send + Sync>;

/// Cases between two status lines: every case up to 10, then 10% steps.
fn status_step(total: usize) -> usize {
    (total / 10).max(1)
}

/// What to print for `ev`, given the FAIL/ERROR count so far (including
/// `ev`). Failures are named as they happen; otherwise a status line is
/// printed at each step and at the end.
pub fn progress_line(ev: &ProgressEvent, failing: usize) -> Option<String> {
    if ev.total == 0 {
        return None;
    }
    let prefix = format!("[{}/{}]", ev.done, ev.total);
    if ev.outcome.is_blocking() {
        let id = ev.case_id.as_deref().unwrap_or("<worker>");
        return Some(format!("{prefix} {} {id}", ev.outcome));
    }
    if ev.done != ev.total && ev.done % status_step(ev.total) != 0 {
        return None;
    }
    Some(match failing {
        0 => format!("{prefix} ok"),
        n => format!("{prefix} {n} failing"),
    })
}

/// Sink that prints [`progress_line`]s to stderr. `None` for an empty suite.
pub fn stderr_progress_sink(total: usize) -> Option<ProgressSink> {
    if total == 0 {
        return None;
    }
    let failing = AtomicUsize::new(0);
    Some(Arc::new(move |ev: ProgressEvent| {
        let mut seen = failing.load(Ordering::Relaxed);
        if ev.outcome.is_blocking() {
            seen = failing.fetch_add(1, Ordering::Relaxed) + 1;
        }
        if let Some(line) = progress_line(&ev, seen) {
            eprintln!("{line}");
        }
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(done: usize, total: usize, id: &str, outcome: Outcome) -> ProgressEvent {
        ProgressEvent {
            done,
            total,
            case_id: Some(id.to_string()),
            outcome,
        }
    }

    #[test]
    fn failures_are_named_immediately() {
        let ev = event(3, 40, "nested/bad.test", Outcome::Fail);
        assert_eq!(
            progress_line(&ev, 1).as_deref(),
            Some("[3/40] FAIL nested/bad.test")
        );
        let lost = ProgressEvent {
            case_id: None,
            ..event(4, 40, "", Outcome::Error)
        };
        assert_eq!(progress_line(&lost, 2).as_deref(), Some("[4/40] ERROR <worker>"));
    }

    #[test]
    fn passes_only_print_at_steps_and_the_end() {
        assert_eq!(progress_line(&event(3, 40, "a", Outcome::Pass), 0), None);
        assert_eq!(
            progress_line(&event(4, 40, "a", Outcome::Pass), 0).as_deref(),
            Some("[4/40] ok")
        );
        assert_eq!(
            progress_line(&event(8, 40, "a", Outcome::Skip), 2).as_deref(),
            Some("[8/40] 2 failing")
        );
        assert_eq!(
            progress_line(&event(39, 39, "a", Outcome::Pass), 0).as_deref(),
            Some("[39/39] ok")
        );
    }

    #[test]
    fn small_suites_report_every_case() {
        for done in 1..=5 {
            assert!(progress_line(&event(done, 5, "a", Outcome::Pass), 0).is_some());
        }
    }

    #[test]
    fn no_sink_for_empty_suite() {
        assert!(stderr_progress_sink(0).is_none());
        assert!(stderr_progress_sink(1).is_some());
    }
}

use super::cancel::CancelToken;
use super::executor::{CaseExecutor, Executor};
use super::fixture::RunFixture;
use crate::aggregate::Aggregator;
use crate::config::RunConfig;
use crate::discovery::DiscoveredSuite;
use crate::model::{Outcome, RunSummary, TestCase, TestResult};
use crate::report::progress::{ProgressEvent, ProgressSink};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

pub const CANCELLED_MESSAGE: &str = "cancelled before execution";

pub struct Runner {
    cfg: RunConfig,
    executor: Arc<dyn CaseExecutor>,
    cancel: CancelToken,
}

impl Runner {
    pub fn new(cfg: RunConfig) -> Self {
        let executor = Arc::new(Executor::new(&cfg));
        Self {
            cfg,
            executor,
            cancel: CancelToken::new(),
        }
    }

    pub fn with_executor(mut self, executor: Arc<dyn CaseExecutor>) -> Self {
        self.executor = executor;
        self
    }

    /// Token that stops scheduling when cancelled.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Run the suite on at most `cfg.workers` concurrent cases. Results are
    /// gathered in completion order and returned in discovery order. If
    /// `progress` is set, it is called after each case completes.
    pub async fn run(
        &self,
        suite: DiscoveredSuite,
        progress: Option<ProgressSink>,
    ) -> anyhow::Result<RunSummary> {
        let DiscoveredSuite {
            cases,
            warnings,
            errors,
        } = suite;
        let total = cases.len();
        let mut agg = Aggregator::new(&cases);
        for w in warnings {
            agg.note_warning(w);
        }
        for e in &errors {
            agg.note_discovery_error(e);
        }
        tracing::info!(total, workers = self.cfg.workers, "run started");

        let fixture = match RunFixture::new() {
            Ok(f) => f,
            Err(e) => {
                tracing::warn!(error = %format!("{e:#}"), "run fixture unavailable");
                for case in &cases {
                    agg.accumulate(TestResult::error(&case.id, format!("{e:#}")));
                }
                return Ok(agg.finalize());
            }
        };

        let sem = Arc::new(Semaphore::new(self.cfg.workers.max(1)));
        let mut join_set = JoinSet::new();
        let mut done = 0usize;
        let mut pending = cases.into_iter();
        let mut next = pending.next();

        while let Some(case) = next.take() {
            tokio::select! {
                biased;
                () = self.cancel.cancelled() => {
                    next = Some(case);
                    break;
                }
                Some(joined) = join_set.join_next(), if !join_set.is_empty() => {
                    next = Some(case);
                    Self::record(&mut agg, joined, &mut done, total, progress.as_ref());
                }
                permit = sem.clone().acquire_owned() => {
                    let permit = permit?;
                    let executor = Arc::clone(&self.executor);
                    let lease = fixture.lease();
                    tracing::debug!(case_id = %case.id, active = fixture.active_cases(), "case scheduled");
                    join_set.spawn(async move {
                        let _permit = permit;
                        let case_id = case.id.clone();
                        // Inner task so a panic is reported against its own case.
                        let inner = tokio::spawn(async move {
                            executor.execute(&case, &lease).await
                        });
                        match inner.await {
                            Ok(result) => result,
                            Err(e) => {
                                tracing::warn!(case_id = %case_id, error = %e, "case task failed");
                                TestResult::error(case_id, format!("internal fault: {}", fault_message(e)))
                            }
                        }
                    });
                    next = pending.next();
                }
            }
        }

        let unscheduled: Vec<TestCase> = next.into_iter().chain(pending).collect();
        if !unscheduled.is_empty() {
            tracing::info!(count = unscheduled.len(), "run cancelled, skipping remaining cases");
        }
        for case in unscheduled {
            agg.accumulate(TestResult::error(case.id, CANCELLED_MESSAGE));
            done += 1;
        }

        while let Some(joined) = join_set.join_next().await {
            Self::record(&mut agg, joined, &mut done, total, progress.as_ref());
        }
        drop(fixture);

        let summary = agg.finalize();
        tracing::info!(
            total = summary.total,
            wall_time_ms = summary.wall_time.as_millis() as u64,
            "run finished"
        );
        Ok(summary)
    }

    fn record(
        agg: &mut Aggregator,
        joined: Result<TestResult, tokio::task::JoinError>,
        done: &mut usize,
        total: usize,
        progress: Option<&ProgressSink>,
    ) {
        let (case_id, outcome) = match joined {
            Ok(result) => {
                let seen = (Some(result.case_id.clone()), result.outcome);
                agg.accumulate(result);
                seen
            }
            // The aggregator fills in the missing case at finalize.
            Err(e) => {
                tracing::warn!(error = %e, "worker task failed");
                (None, Outcome::Error)
            }
        };
        *done += 1;
        if total > 0 {
            if let Some(sink) = progress {
                sink(ProgressEvent {
                    done: *done,
                    total,
                    case_id,
                    outcome,
                });
            }
        }
    }
}

fn fault_message(e: tokio::task::JoinError) -> String {
    if !e.is_panic() {
        return e.to_string();
    }
    let payload = e.into_panic();
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "panic".to_string()
    }
}

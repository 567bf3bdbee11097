//! Folds per-case results, arriving in completion order, into a
//! [`RunSummary`] in discovery order.

use crate::errors::DiscoveryError;
use crate::model::{DiscoveryWarning, RunSummary, TestCase, TestResult};
use std::collections::HashMap;
use std::time::Instant;

pub const MISSING_RESULT_MESSAGE: &str = "no result recorded";

pub struct Aggregator {
    positions: HashMap<String, usize>,
    order: Vec<String>,
    slots: Vec<Option<TestResult>>,
    warnings: Vec<DiscoveryWarning>,
    discovery_errors: Vec<String>,
    started: Instant,
    frozen: Option<RunSummary>,
}

impl Aggregator {
    /// `order` is the discovery order; the wall clock starts here.
    pub fn new(order: &[TestCase]) -> Self {
        let mut positions = HashMap::with_capacity(order.len());
        let mut ids = Vec::with_capacity(order.len());
        for case in order {
            if positions.contains_key(&case.id) {
                tracing::warn!(case_id = %case.id, "duplicate case id in discovery order, ignoring");
                continue;
            }
            positions.insert(case.id.clone(), ids.len());
            ids.push(case.id.clone());
        }
        Self {
            slots: vec![None; ids.len()],
            positions,
            order: ids,
            warnings: Vec::new(),
            discovery_errors: Vec::new(),
            started: Instant::now(),
            frozen: None,
        }
    }

    pub fn accumulate(&mut self, result: TestResult) {
        if self.frozen.is_some() {
            tracing::warn!(case_id = %result.case_id, "result arrived after finalize, ignoring");
            return;
        }
        let Some(&pos) = self.positions.get(&result.case_id) else {
            tracing::warn!(case_id = %result.case_id, "result for unknown case, ignoring");
            return;
        };
        let slot = &mut self.slots[pos];
        if slot.is_some() {
            tracing::warn!(case_id = %result.case_id, "duplicate result, keeping the first");
            return;
        }
        *slot = Some(result);
    }

    pub fn note_warning(&mut self, warning: DiscoveryWarning) {
        if self.frozen.is_none() {
            self.warnings.push(warning);
        }
    }

    pub fn note_discovery_error(&mut self, error: &DiscoveryError) {
        if self.frozen.is_none() {
            self.discovery_errors.push(error.to_string());
        }
    }

    /// Freeze the summary. Later calls return the same summary.
    pub fn finalize(&mut self) -> RunSummary {
        if let Some(summary) = &self.frozen {
            return summary.clone();
        }

        let results: Vec<TestResult> = self
            .order
            .iter()
            .zip(self.slots.iter_mut())
            .map(|(id, slot)| {
                slot.take().unwrap_or_else(|| {
                    tracing::warn!(case_id = %id, "no result recorded");
                    TestResult::error(id, MISSING_RESULT_MESSAGE)
                })
            })
            .collect();

        let summary = RunSummary {
            total: results.len(),
            counts_by_outcome: RunSummary::tally(&results),
            results,
            wall_time: self.started.elapsed(),
            warnings: std::mem::take(&mut self.warnings),
            discovery_errors: std::mem::take(&mut self.discovery_errors),
        };
        self.frozen = Some(summary.clone());
        summary
    }
}

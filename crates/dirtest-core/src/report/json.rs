use super::RunVerdict;
use crate::model::RunSummary;
use anyhow::Context;
use std::path::Path;

pub fn write_json(summary: &RunSummary, out: &Path) -> anyhow::Result<()> {
    let verdict = RunVerdict::from_summary(summary);
    let v = serde_json::json!({
        "verdict": verdict.as_str(),
        "exit_code": verdict.exit_code(),
        "summary": summary,
    });
    std::fs::write(out, serde_json::to_string_pretty(&v)?)
        .with_context(|| format!("failed to write JSON report to {}", out.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Outcome, TestResult};
    use std::time::Duration;

    #[test]
    fn writes_summary_with_verdict() {
        let results = vec![TestResult::new("a.test", Outcome::Fail, Duration::from_millis(7))
            .with_message("exit code 1, expected 0")];
        let summary = RunSummary {
            total: 1,
            counts_by_outcome: RunSummary::tally(&results),
            results,
            wall_time: Duration::from_millis(20),
            warnings: vec![],
            discovery_errors: vec![],
        };
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.json");
        write_json(&summary, &path).unwrap();

        let v: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(v["verdict"], "failed");
        assert_eq!(v["exit_code"], 1);
        assert_eq!(v["summary"]["total"], 1);
        assert_eq!(v["summary"]["wall_time_ms"], 20);
        assert_eq!(v["summary"]["counts_by_outcome"]["fail"], 1);
        assert_eq!(v["summary"]["results"][0]["case_id"], "a.test");
    }
}

pub mod args;

use crate::exit_codes;
use args::Cli;
use dirtest_core::config::RunConfig;
use dirtest_core::discovery::discover;
use dirtest_core::engine::Runner;
use dirtest_core::report::{self, progress::stderr_progress_sink, ReportOptions};
use dirtest_core::resolve::resolve;

impl Cli {
    fn run_config(&self) -> RunConfig {
        let mut cfg = RunConfig::default()
            .with_timeout(self.timeout)
            .with_interpreter(self.interpreter.clone())
            .with_suffixes(self.suffixes.clone());
        if let Some(n) = self.workers {
            cfg = cfg.with_workers(usize::try_from(n).unwrap_or(usize::MAX));
        }
        cfg
    }
}

/// One run end to end; returns the process exit code.
pub async fn run(cli: Cli) -> anyhow::Result<i32> {
    let root = match resolve(&cli.directory_path) {
        Ok(root) => root,
        Err(e) => {
            tracing::debug!(code = e.code(), "path resolution failed");
            eprintln!("error: {e}");
            return Ok(exit_codes::PATH_ERROR);
        }
    };

    let cfg = cli.run_config();
    let policy = cfg.policy();
    tracing::debug!(suffixes = ?policy.suffixes(), workers = cfg.workers, "run config");
    let suite = discover(&root, &policy).collect_all();
    tracing::info!(root = %root, cases = suite.cases.len(), "discovered");

    let progress = if cli.no_progress {
        None
    } else {
        stderr_progress_sink(suite.cases.len())
    };

    let runner = Runner::new(cfg);
    let cancel = runner.cancel_token();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("Interrupted, finishing running cases...");
            cancel.cancel();
        }
    });
    let summary = runner.run(suite, progress).await;
    interrupt.abort();
    let summary = summary?;

    let opts = ReportOptions {
        show_output: cli.show_output,
    };
    let verdict = report::report(&summary, &mut std::io::stdout().lock(), &opts)?;
    if let Some(path) = &cli.json {
        report::write_json(&summary, path)?;
    }

    Ok(match verdict {
        report::RunVerdict::Passed => exit_codes::SUCCESS,
        report::RunVerdict::Failed => exit_codes::TEST_FAILED,
        report::RunVerdict::Empty => exit_codes::NO_TESTS,
    })
}

//! Discovery and execution engine for directory-driven test suites.
//!
//! A run flows through five stages:
//!
//! - [`resolve`] turns the raw CLI argument into a [`resolve::CanonicalPath`]
//! - [`discovery`] walks the tree and yields [`model::TestCase`]s in a stable order
//! - [`engine`] executes each case in its own scratch directory on a bounded worker pool
//! - [`aggregate`] folds results back into discovery order
//! - [`report`] renders the [`model::RunSummary`] and picks the exit code
//!
//! # Quick Start
//!
//! ```no_run
//! use dirtest_core::{config::RunConfig, engine::Runner, report};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let root = dirtest_core::resolve::resolve("tests/suite")?;
//! let cfg = RunConfig::default();
//! let suite = dirtest_core::discovery::discover(&root, &cfg.policy()).collect_all();
//!
//! let summary = Runner::new(cfg).run(suite, None).await?;
//! let verdict = report::report(&summary, &mut std::io::stdout(), &Default::default())?;
//! std::process::exit(verdict.exit_code());
//! # }
//! ```
//!
//! # Configuration
//!
//! | Environment Variable | Description |
//! |---------------------|-------------|
//! | `DIRTEST_WORKERS` | Worker pool size (default: available parallelism) |
//! | `DIRTEST_TIMEOUT` | Per-case timeout, humantime syntax (default: `30s`) |
//! | `DIRTEST_INTERPRETER` | Program used to run `*.test` files (default: `sh`) |
//!
//! The variables are read by the CLI; the core only sees [`config::RunConfig`].

pub mod aggregate;
pub mod config;
pub mod discovery;
pub mod engine;
pub mod errors;
pub mod manifest;
pub mod model;
pub mod report;
pub mod resolve;

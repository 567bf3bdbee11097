//! Case execution: the process executor, the bounded worker pool that drives
//! it, and the per-run fixture both share.

pub mod cancel;
pub mod executor;
pub mod fixture;
pub mod runner;

pub use cancel::CancelToken;
pub use executor::{CaseExecutor, Executor};
pub use fixture::{FixtureLease, RunFixture};
pub use runner::Runner;

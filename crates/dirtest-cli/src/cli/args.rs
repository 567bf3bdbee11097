use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(
    name = "dirtest",
    version,
    about = "Discover and run the test cases under a directory"
)]
pub struct Cli {
    /// Directory to search for test cases
    pub directory_path: String,

    /// Maximum number of cases running at once (default: available parallelism)
    #[arg(long, env = "DIRTEST_WORKERS", value_parser = clap::value_parser!(u64).range(1..))]
    pub workers: Option<u64>,

    /// Per-case timeout, e.g. `500ms`, `30s`, `2m`
    #[arg(long, env = "DIRTEST_TIMEOUT", default_value = "30s", value_parser = parse_duration)]
    pub timeout: Duration,

    /// Program used to run script cases
    #[arg(long, env = "DIRTEST_INTERPRETER", default_value = "sh")]
    pub interpreter: String,

    /// File name suffix that marks a script case (repeatable; default `.test`)
    #[arg(long = "suffix", value_name = "SUFFIX")]
    pub suffixes: Vec<String>,

    /// Also write the run summary as JSON to this path
    #[arg(long, value_name = "PATH")]
    pub json: Option<PathBuf>,

    /// Show captured output of failing cases
    #[arg(long)]
    pub show_output: bool,

    /// Do not print progress lines to stderr
    #[arg(long)]
    pub no_progress: bool,
}

fn parse_duration(s: &str) -> Result<Duration, String> {
    dirtest_core::config::parse_duration(s).map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_flags() {
        let cli = Cli::try_parse_from([
            "dirtest",
            "suite",
            "--workers",
            "3",
            "--timeout",
            "1500ms",
            "--suffix",
            ".check",
            "--suffix",
            ".test",
        ])
        .unwrap();
        assert_eq!(cli.directory_path, "suite");
        assert_eq!(cli.workers, Some(3));
        assert_eq!(cli.timeout, Duration::from_millis(1500));
        assert_eq!(cli.suffixes, vec![".check", ".test"]);
    }

    #[test]
    fn rejects_zero_workers_and_extra_positionals() {
        assert!(Cli::try_parse_from(["dirtest", "suite", "--workers", "0"]).is_err());
        assert!(Cli::try_parse_from(["dirtest", "a", "b"]).is_err());
        assert!(Cli::try_parse_from(["dirtest"]).is_err());
    }
}

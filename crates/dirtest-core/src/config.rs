use crate::discovery::policy::ConventionPolicy;
use std::time::Duration;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_INTERPRETER: &str = "sh";
pub const DEFAULT_SUFFIX: &str = ".test";
pub const DEFAULT_MAX_OUTPUT_BYTES: usize = 64 * 1024;

/// Settings for one run. The CLI fills this from flags and environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunConfig {
    /// Upper bound on concurrently executing cases (at least 1).
    pub workers: usize,
    /// Per-case timeout unless the case overrides it.
    pub timeout: Duration,
    /// Program that runs `File` cases: `<interpreter> <script>`.
    pub interpreter: String,
    /// File name suffixes recognised as `File` cases.
    pub suffixes: Vec<String>,
    /// Captured output is truncated to this many bytes.
    pub max_output_bytes: usize,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            timeout: DEFAULT_TIMEOUT,
            interpreter: DEFAULT_INTERPRETER.to_string(),
            suffixes: vec![DEFAULT_SUFFIX.to_string()],
            max_output_bytes: DEFAULT_MAX_OUTPUT_BYTES,
        }
    }
}

impl RunConfig {
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_interpreter(mut self, interpreter: impl Into<String>) -> Self {
        self.interpreter = interpreter.into();
        self
    }

    /// Replaces the suffix list; an empty list keeps the default.
    pub fn with_suffixes(mut self, suffixes: Vec<String>) -> Self {
        if !suffixes.is_empty() {
            self.suffixes = suffixes;
        }
        self
    }

    pub fn with_max_output_bytes(mut self, max: usize) -> Self {
        self.max_output_bytes = max;
        self
    }

    /// Discovery policy matching these settings.
    pub fn policy(&self) -> ConventionPolicy {
        ConventionPolicy::new(self.suffixes.clone())
    }
}

fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
        .max(1)
}

/// Parse a humantime duration (`500ms`, `2s`, `1m 30s`).
pub fn parse_duration(s: &str) -> Result<Duration, humantime::DurationError> {
    humantime::parse_duration(s.trim())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let cfg = RunConfig::default();
        assert!(cfg.workers >= 1);
        assert_eq!(cfg.timeout, Duration::from_secs(30));
        assert_eq!(cfg.interpreter, "sh");
        assert_eq!(cfg.suffixes, vec![".test".to_string()]);
    }

    #[test]
    fn workers_never_zero() {
        assert_eq!(RunConfig::default().with_workers(0).workers, 1);
    }

    #[test]
    fn empty_suffix_list_keeps_default() {
        let cfg = RunConfig::default().with_suffixes(vec![]);
        assert_eq!(cfg.suffixes, vec![".test".to_string()]);
    }

    #[test]
    fn parses_humantime() {
        assert_eq!(parse_duration("250ms").unwrap(), Duration::from_millis(250));
        assert_eq!(parse_duration(" 2s ").unwrap(), Duration::from_secs(2));
        assert!(parse_duration("soon").is_err());
    }
}

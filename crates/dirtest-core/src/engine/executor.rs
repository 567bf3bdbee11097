//! Runs one case as a child process inside its scratch directory.

use super::fixture::FixtureLease;
use crate::config::RunConfig;
use crate::manifest::{self, CaseSpec};
use crate::model::{CaseKind, Outcome, TestCase, TestResult};
use anyhow::Context;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio::task::JoinHandle;
use tokio::time::{timeout, timeout_at};

pub const TIMEOUT_MESSAGE: &str = "timeout exceeded";
pub const STDERR_MARKER: &str = "--- stderr ---";

/// How long output readers may keep draining after the process group is gone.
const DRAIN_GRACE: Duration = Duration::from_secs(2);

/// Turns a case into exactly one result. Implementations never fail; every
/// problem becomes an `Error` result.
#[async_trait]
pub trait CaseExecutor: Send + Sync {
    async fn execute(&self, case: &TestCase, fixture: &FixtureLease) -> TestResult;
}

/// Process-based executor for `File` and `Directory` cases.
#[derive(Debug, Clone)]
pub struct Executor {
    interpreter: String,
    default_timeout: Duration,
    max_output_bytes: usize,
}

impl Executor {
    pub fn new(cfg: &RunConfig) -> Self {
        Self {
            interpreter: cfg.interpreter.clone(),
            default_timeout: cfg.timeout,
            max_output_bytes: cfg.max_output_bytes,
        }
    }

    fn load(&self, case: &TestCase) -> Result<CaseSpec, crate::errors::ManifestError> {
        match case.kind {
            CaseKind::File => manifest::load_script_case(&case.source_path, &self.interpreter),
            CaseKind::Directory => manifest::load_directory_case(&case.source_path),
        }
    }

    async fn run_case(
        &self,
        case: &TestCase,
        fixture: &FixtureLease,
        started: Instant,
    ) -> TestResult {
        let spec = match self.load(case) {
            Ok(spec) => spec,
            Err(e) => {
                return TestResult::new(&case.id, Outcome::Error, started.elapsed())
                    .with_message(e.to_string())
            }
        };

        if let Some(reason) = &spec.skip {
            return TestResult::new(&case.id, Outcome::Skip, started.elapsed())
                .with_message(reason.clone());
        }

        // Setup and the process share one budget.
        let limit = spec.timeout.unwrap_or(self.default_timeout);
        let deadline = tokio::time::Instant::now() + limit;

        // Dropped on every return path below, which removes the directory.
        let scratch = match prepare_scratch(case, fixture, deadline).await {
            Ok(dir) => dir,
            Err(e) => {
                return TestResult::new(&case.id, Outcome::Error, started.elapsed())
                    .with_message(format!("{e:#}"))
            }
        };

        let run = match self.spawn_and_wait(case, &spec, scratch.path(), deadline).await {
            Ok(run) => run,
            Err(e) => {
                return TestResult::new(&case.id, Outcome::Error, started.elapsed())
                    .with_message(format!("{e:#}"))
            }
        };
        let output = combine_output(&run.stdout, &run.stderr, self.max_output_bytes);
        let duration = started.elapsed();

        let (outcome, message) = classify(&spec, &run);
        let result = TestResult::new(&case.id, outcome, duration).with_output(output);
        match message {
            Some(m) => result.with_message(m),
            None => result,
        }
    }

    async fn spawn_and_wait(
        &self,
        case: &TestCase,
        spec: &CaseSpec,
        scratch: &Path,
        deadline: tokio::time::Instant,
    ) -> anyhow::Result<ProcessRun> {
        let program = resolve_program(&spec.program, scratch);
        let mut cmd = Command::new(&program);
        cmd.args(&spec.args)
            .current_dir(scratch)
            .env("TMPDIR", scratch)
            .env("DIRTEST_SCRATCH", scratch)
            .env("DIRTEST_CASE_ID", &case.id)
            .env("DIRTEST_CASE_SOURCE", &case.source_path)
            .envs(&spec.env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        #[cfg(unix)]
        cmd.process_group(0);

        let mut child = cmd
            .spawn()
            .with_context(|| format!("failed to spawn {}", program.display()))?;
        // `id()` is gone once the child is reaped; the group id is needed after.
        let pgid = child.id().and_then(|p| i32::try_from(p).ok());
        tracing::debug!(case_id = %case.id, pid = ?pgid, "spawned");

        let stdout = Capture::spawn(child.stdout.take(), self.max_output_bytes);
        let stderr = Capture::spawn(child.stderr.take(), self.max_output_bytes);

        let waited = match timeout_at(deadline, child.wait()).await {
            Ok(status) => Some(status),
            Err(_) => {
                tracing::warn!(case_id = %case.id, "case timed out, killing");
                None
            }
        };

        // Background descendants would otherwise hold the pipes open and
        // outlive the scratch directory.
        kill_group(pgid);
        if waited.is_none() {
            if let Err(e) = child.kill().await {
                tracing::debug!(case_id = %case.id, error = %e, "kill after timeout failed");
            }
        }

        let stdout = Capture::collect(stdout).await;
        let stderr = Capture::collect(stderr).await;
        let status = waited
            .transpose()
            .context("failed to wait for case process")?;

        Ok(ProcessRun {
            status,
            stdout,
            stderr,
        })
    }
}

#[async_trait]
impl CaseExecutor for Executor {
    async fn execute(&self, case: &TestCase, fixture: &FixtureLease) -> TestResult {
        let started = Instant::now();
        tracing::debug!(case_id = %case.id, kind = ?case.kind, "case started");
        let result = self.run_case(case, fixture, started).await;
        tracing::debug!(
            case_id = %case.id,
            outcome = %result.outcome,
            duration_ms = result.duration.as_millis() as u64,
            "case finished"
        );
        result
    }
}

struct ProcessRun {
    /// `None` when the timeout fired.
    status: Option<ExitStatus>,
    stdout: Vec<u8>,
    stderr: Vec<u8>,
}

fn classify(spec: &CaseSpec, run: &ProcessRun) -> (Outcome, Option<String>) {
    let Some(status) = run.status else {
        return (Outcome::Error, Some(TIMEOUT_MESSAGE.to_string()));
    };
    let Some(code) = status.code() else {
        return (Outcome::Error, Some(describe_signal(status)));
    };
    if code != spec.expect_exit {
        return (
            Outcome::Fail,
            Some(format!("exit code {code}, expected {}", spec.expect_exit)),
        );
    }
    if let Some(expected) = &spec.expected_stdout {
        let actual = String::from_utf8_lossy(&run.stdout);
        if actual.trim_end() != expected.trim_end() {
            return (
                Outcome::Fail,
                Some("stdout did not match expected output".to_string()),
            );
        }
    }
    (Outcome::Pass, None)
}

#[cfg(unix)]
fn describe_signal(status: ExitStatus) -> String {
    use std::os::unix::process::ExitStatusExt;
    match status.signal() {
        Some(sig) => format!("terminated by signal {sig}"),
        None => format!("abnormal termination: {status}"),
    }
}

#[cfg(not(unix))]
fn describe_signal(status: ExitStatus) -> String {
    format!("abnormal termination: {status}")
}

/// Create the scratch directory and, for directory cases, copy the source
/// into it on the blocking pool, bounded by `deadline`.
async fn prepare_scratch(
    case: &TestCase,
    fixture: &FixtureLease,
    deadline: tokio::time::Instant,
) -> anyhow::Result<tempfile::TempDir> {
    let scratch = fixture.scratch(&case.id)?;
    if case.kind != CaseKind::Directory {
        return Ok(scratch);
    }

    let src = case.source_path.clone();
    let dst = scratch.path().to_path_buf();
    let copy = tokio::task::spawn_blocking(move || copy_tree(&src, &dst));
    match timeout_at(deadline, copy).await {
        Ok(Ok(Ok(()))) => Ok(scratch),
        Ok(Ok(Err(e))) => Err(e.context(format!(
            "failed to copy {} into scratch",
            case.source_path.display()
        ))),
        Ok(Err(e)) => Err(anyhow::anyhow!("scratch setup task failed: {e}")),
        Err(_) => {
            tracing::warn!(case_id = %case.id, "scratch setup timed out");
            Err(anyhow::anyhow!(TIMEOUT_MESSAGE))
        }
    }
}

/// Copy the contents of `src` into the existing directory `dst`.
///
/// Links are recreated, not followed. Special files (FIFOs, sockets,
/// devices) are skipped.
fn copy_tree(src: &Path, dst: &Path) -> anyhow::Result<()> {
    for entry in walkdir::WalkDir::new(src).min_depth(1) {
        let entry = entry?;
        let rel = entry.path().strip_prefix(src)?;
        let target = dst.join(rel);
        let file_type = entry.file_type();
        if file_type.is_dir() {
            std::fs::create_dir_all(&target)?;
        } else if file_type.is_file() {
            std::fs::copy(entry.path(), &target)
                .with_context(|| format!("copy {}", entry.path().display()))?;
        } else if file_type.is_symlink() {
            copy_symlink(entry.path(), &target)?;
        } else {
            tracing::debug!(path = %entry.path().display(), "skipping special file");
        }
    }
    Ok(())
}

#[cfg(unix)]
fn copy_symlink(link: &Path, target: &Path) -> anyhow::Result<()> {
    let dest = std::fs::read_link(link).with_context(|| format!("read link {}", link.display()))?;
    std::os::unix::fs::symlink(&dest, target)
        .with_context(|| format!("recreate link {}", link.display()))
}

#[cfg(not(unix))]
fn copy_symlink(link: &Path, _target: &Path) -> anyhow::Result<()> {
    tracing::debug!(path = %link.display(), "skipping symlink");
    Ok(())
}

/// Relative programs with a path separator (`./run.sh`) are taken relative
/// to the scratch directory; bare names go through `PATH`.
fn resolve_program(program: &str, scratch: &Path) -> PathBuf {
    let path = Path::new(program);
    if path.is_relative() && path.components().count() > 1 {
        scratch.join(path)
    } else {
        path.to_path_buf()
    }
}

/// One output pipe drained into a shared buffer, so the bytes survive even
/// when the reader has to be abandoned.
struct Capture {
    buf: Arc<Mutex<Vec<u8>>>,
    reader: JoinHandle<()>,
}

impl Capture {
    fn spawn<R>(pipe: Option<R>, cap: usize) -> Option<Self>
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let mut pipe = pipe?;
        let buf = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&buf);
        let reader = tokio::spawn(async move {
            let mut chunk = [0u8; 8192];
            loop {
                match pipe.read(&mut chunk).await {
                    Ok(0) | Err(_) => break,
                    Ok(n) => {
                        // Keep reading past the cap so the child never blocks on a full pipe.
                        let mut kept = sink.lock().unwrap_or_else(PoisonError::into_inner);
                        let room = cap.saturating_sub(kept.len());
                        kept.extend_from_slice(&chunk[..n.min(room)]);
                    }
                }
            }
        });
        Some(Self { buf, reader })
    }

    async fn collect(capture: Option<Self>) -> Vec<u8> {
        let Some(Self { buf, mut reader }) = capture else {
            return Vec::new();
        };
        if timeout(DRAIN_GRACE, &mut reader).await.is_err() {
            // A descendant that left the process group still holds the pipe.
            tracing::debug!("output pipe still open, keeping what was read");
            reader.abort();
        }
        let mut kept = buf.lock().unwrap_or_else(PoisonError::into_inner);
        std::mem::take(&mut *kept)
    }
}

#[cfg(unix)]
fn kill_group(pgid: Option<i32>) {
    use nix::errno::Errno;
    use nix::sys::signal::{killpg, Signal};
    use nix::unistd::Pid;

    let Some(pgid) = pgid else { return };
    match killpg(Pid::from_raw(pgid), Signal::SIGKILL) {
        // Nothing left in the group.
        Ok(()) | Err(Errno::ESRCH) => {}
        Err(e) => tracing::debug!(pgid, error = %e, "killpg failed"),
    }
}

#[cfg(not(unix))]
fn kill_group(_pgid: Option<i32>) {}

/// stdout, then a marker and stderr when stderr is non-empty, capped at
/// `max_bytes` on a char boundary. `None` when both streams are empty.
pub fn combine_output(stdout: &[u8], stderr: &[u8], max_bytes: usize) -> Option<String> {
    if stdout.is_empty() && stderr.is_empty() {
        return None;
    }
    let mut text = String::from_utf8_lossy(stdout).into_owned();
    if !stderr.is_empty() {
        if !text.is_empty() && !text.ends_with('\n') {
            text.push('\n');
        }
        text.push_str(STDERR_MARKER);
        text.push('\n');
        text.push_str(&String::from_utf8_lossy(stderr));
    }
    if text.len() > max_bytes {
        let mut cut = max_bytes;
        while !text.is_char_boundary(cut) {
            cut -= 1;
        }
        text.truncate(cut);
        text.push_str("\n[output truncated]");
    }
    Some(text)
}

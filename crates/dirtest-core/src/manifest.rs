//! How a case says what to run and what to expect.
//!
//! Directory cases carry a `case.yaml`:
//!
//! ```yaml
//! command: ["sh", "run.sh", "--fast"]
//! expect_exit: 0            # optional, default 0
//! expected_stdout: "ok\n"   # optional
//! skip: "flaky on CI"       # optional
//! timeout: 5s               # optional, humantime
//! env:                      # optional
//!   MODE: strict
//! ```
//!
//! Script cases put directives in their leading comment block:
//!
//! ```text
//! # dirtest: timeout 2s
//! # dirtest: exit 3
//! # dirtest: skip needs network
//! ```

use crate::discovery::policy::{EXPECTED_SUFFIX, MANIFEST_FILE};
use crate::errors::ManifestError;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

const DIRECTIVE_PREFIX: &str = "dirtest:";

/// Resolved execution plan for one case.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaseSpec {
    pub program: String,
    pub args: Vec<String>,
    pub env: BTreeMap<String, String>,
    pub expect_exit: i32,
    pub expected_stdout: Option<String>,
    /// `Some(reason)` when the case must not run.
    pub skip: Option<String>,
    /// Per-case override of the run timeout.
    pub timeout: Option<Duration>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawManifest {
    command: Vec<String>,
    #[serde(default)]
    expect_exit: i32,
    #[serde(default)]
    expected_stdout: Option<String>,
    #[serde(default)]
    skip: Option<SkipField>,
    #[serde(default)]
    timeout: Option<String>,
    #[serde(default)]
    env: BTreeMap<String, String>,
}

/// `skip: true` or `skip: "reason"`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SkipField {
    Flag(bool),
    Reason(String),
}

/// Load `<dir>/case.yaml`.
pub fn load_directory_case(dir: &Path) -> Result<CaseSpec, ManifestError> {
    let path = dir.join(MANIFEST_FILE);
    let content = std::fs::read_to_string(&path).map_err(|source| ManifestError::Read {
        path: path.clone(),
        source,
    })?;
    parse_manifest(&path, &content)
}

pub fn parse_manifest(path: &Path, content: &str) -> Result<CaseSpec, ManifestError> {
    let raw: RawManifest =
        serde_yaml::from_str(content).map_err(|source| ManifestError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

    let mut command = raw.command.into_iter();
    let program = command.next().filter(|p| !p.is_empty()).ok_or_else(|| {
        ManifestError::Invalid {
            path: path.to_path_buf(),
            reason: "command must not be empty".into(),
        }
    })?;

    let timeout = raw
        .timeout
        .as_deref()
        .map(crate::config::parse_duration)
        .transpose()
        .map_err(|e| ManifestError::Invalid {
            path: path.to_path_buf(),
            reason: format!("timeout: {e}"),
        })?;

    let skip = match raw.skip {
        None | Some(SkipField::Flag(false)) => None,
        Some(SkipField::Flag(true)) => Some("marked skip".to_string()),
        Some(SkipField::Reason(r)) => Some(r),
    };

    Ok(CaseSpec {
        program,
        args: command.collect(),
        env: raw.env,
        expect_exit: raw.expect_exit,
        expected_stdout: raw.expected_stdout,
        skip,
        timeout,
    })
}

/// Build the plan for a script case: directives plus an optional
/// `<script>.expected` file next to it.
pub fn load_script_case(script: &Path, interpreter: &str) -> Result<CaseSpec, ManifestError> {
    let content = std::fs::read(script).map_err(|source| ManifestError::Read {
        path: script.to_path_buf(),
        source,
    })?;
    let content = String::from_utf8_lossy(&content);

    let mut spec = CaseSpec {
        program: interpreter.to_string(),
        args: vec![script.display().to_string()],
        env: BTreeMap::new(),
        expect_exit: 0,
        expected_stdout: None,
        skip: None,
        timeout: None,
    };
    apply_directives(&mut spec, &content)?;

    let expected = expected_path(script);
    if expected.is_file() {
        let body = std::fs::read_to_string(&expected).map_err(|source| ManifestError::Read {
            path: expected.clone(),
            source,
        })?;
        spec.expected_stdout = Some(body);
    }
    Ok(spec)
}

pub fn expected_path(script: &Path) -> PathBuf {
    let mut name = script.as_os_str().to_owned();
    name.push(EXPECTED_SUFFIX);
    PathBuf::from(name)
}

/// Directives live in the leading run of `#` comment lines (a shebang is
/// allowed). Scanning stops at the first other line.
fn apply_directives(spec: &mut CaseSpec, content: &str) -> Result<(), ManifestError> {
    for (idx, line) in content.lines().enumerate() {
        let line_no = idx + 1;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let Some(comment) = trimmed.strip_prefix('#') else {
            break;
        };
        let Some(directive) = comment.trim_start().strip_prefix(DIRECTIVE_PREFIX) else {
            continue;
        };
        let directive = directive.trim();
        let (key, value) = directive
            .split_once(char::is_whitespace)
            .map(|(k, v)| (k, v.trim()))
            .unwrap_or((directive, ""));

        match key {
            "skip" => {
                spec.skip = Some(if value.is_empty() {
                    "marked skip".to_string()
                } else {
                    value.to_string()
                });
            }
            "timeout" => {
                let d = crate::config::parse_duration(value).map_err(|e| {
                    ManifestError::Directive {
                        line: line_no,
                        reason: format!("timeout: {e}"),
                    }
                })?;
                spec.timeout = Some(d);
            }
            "exit" => {
                spec.expect_exit = value.parse().map_err(|_| ManifestError::Directive {
                    line: line_no,
                    reason: format!("exit code must be an integer, got {value:?}"),
                })?;
            }
            other => {
                return Err(ManifestError::Directive {
                    line: line_no,
                    reason: format!("unknown directive {other:?}"),
                })
            }
        }
    }
    Ok(())
}

//! Benchmark measurements and the runner that produces them
//!
//! A [`MeasurementSet`] is the raw, line-oriented output of one benchmark run.
//! Its grammar belongs to the benchmark tool; this crate only recognizes
//! measurement lines by their `Benchmark` prefix.

use crate::error::RunnerError;
use async_trait::async_trait;
use bytes::Bytes;
use std::borrow::Cow;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;

/// Prefix that marks a measurement line
pub const MEASUREMENT_PREFIX: &str = "Benchmark";

/// Bytes of stderr kept in [`RunnerError::ExitStatus`]
const STDERR_TAIL: usize = 4096;

/// Immutable output of one benchmark execution
///
/// Cloning is cheap: all clones share the same buffer, so the set can be
/// uploaded under several keys without re-producing it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MeasurementSet {
    bytes: Bytes,
}

impl MeasurementSet {
    /// Wrap bytes verbatim, without validation
    pub fn from_bytes(bytes: impl Into<Bytes>) -> Self {
        Self {
            bytes: bytes.into(),
        }
    }

    /// Keep only measurement lines from raw runner output
    ///
    /// Each line is trimmed of ASCII whitespace; lines starting with
    /// `Benchmark` are kept byte for byte and joined with `\n`. Returns `None`
    /// when no line qualifies.
    ///
    /// # Example
    /// ```
    /// use benchkeeper::measurement::MeasurementSet;
    ///
    /// let raw = "goos: linux\n  BenchmarkFoo-8  100  120 ns/op\nPASS\n";
    /// let set = MeasurementSet::from_runner_output(raw.as_bytes()).unwrap();
    /// assert_eq!(set.to_text(), "BenchmarkFoo-8  100  120 ns/op");
    ///
    /// assert!(MeasurementSet::from_runner_output(b"PASS\nok\n").is_none());
    /// ```
    pub fn from_runner_output(raw: &[u8]) -> Option<Self> {
        let mut kept = Vec::with_capacity(raw.len());
        for line in recognized_lines(raw) {
            if !kept.is_empty() {
                kept.push(b'\n');
            }
            kept.extend_from_slice(line);
        }

        if kept.is_empty() {
            return None;
        }
        Some(Self::from_bytes(kept))
    }

    /// Lines recognizable as measurements
    ///
    /// Bytes that are not valid UTF-8 show up as U+FFFD; the stored set is
    /// never altered.
    pub fn measurement_lines(&self) -> impl Iterator<Item = Cow<'_, str>> {
        recognized_lines(&self.bytes).map(String::from_utf8_lossy)
    }

    /// A set is well formed when it holds at least one measurement line
    pub fn is_well_formed(&self) -> bool {
        recognized_lines(&self.bytes).next().is_some()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Shared handle to the underlying buffer
    pub fn bytes(&self) -> Bytes {
        self.bytes.clone()
    }

    pub fn to_text(&self) -> String {
        String::from_utf8_lossy(&self.bytes).into_owned()
    }
}

fn recognized_lines(raw: &[u8]) -> impl Iterator<Item = &[u8]> {
    raw.split(|b| *b == b'\n')
        .map(<[u8]>::trim_ascii)
        .filter(|line| line.starts_with(MEASUREMENT_PREFIX.as_bytes()))
}

/// Produces a [`MeasurementSet`] for a repository
///
/// Implementations must stop work and return [`RunnerError::Cancelled`] once
/// `cancel` fires.
#[async_trait]
pub trait MeasurementRunner: Send + Sync {
    async fn run(
        &self,
        repository: &str,
        cancel: &CancellationToken,
    ) -> Result<MeasurementSet, RunnerError>;
}

/// Runs the benchmark suite as a subprocess inside `{workspace}/{repository}`
#[derive(Debug, Clone)]
pub struct CommandRunner {
    program: String,
    args: Vec<String>,
    workspace: PathBuf,
}

impl CommandRunner {
    pub fn new(program: impl Into<String>, args: Vec<String>, workspace: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args,
            workspace: workspace.into(),
        }
    }

    /// Directory the suite runs in for `repository`
    pub fn working_dir(&self, repository: &str) -> PathBuf {
        self.workspace.join(repository)
    }
}

#[async_trait]
impl MeasurementRunner for CommandRunner {
    async fn run(
        &self,
        repository: &str,
        cancel: &CancellationToken,
    ) -> Result<MeasurementSet, RunnerError> {
        let dir = self.working_dir(repository);
        tracing::info!(
            repository,
            program = %self.program,
            dir = %dir.display(),
            "Starting benchmarks, this may take a while"
        );

        let child = Command::new(&self.program)
            .args(&self.args)
            .current_dir(&dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(RunnerError::Spawn)?;

        // Dropping the pending wait on cancellation kills the child.
        let output = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::warn!(repository, "Benchmark run cancelled, terminating runner");
                return Err(RunnerError::Cancelled);
            }
            output = child.wait_with_output() => output?,
        };

        if !output.status.success() {
            return Err(RunnerError::ExitStatus {
                code: output.status.code(),
                stderr: stderr_tail(&output.stderr),
            });
        }

        let set = MeasurementSet::from_runner_output(&output.stdout)
            .ok_or(RunnerError::NoBenchmarks)?;
        tracing::info!(
            repository,
            lines = set.measurement_lines().count(),
            "Done running benchmarks"
        );
        Ok(set)
    }
}

fn stderr_tail(stderr: &[u8]) -> String {
    let start = stderr.len().saturating_sub(STDERR_TAIL);
    String::from_utf8_lossy(&stderr[start..]).trim().to_string()
}

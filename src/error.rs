//! Error taxonomy for the snapshot-compare-promote pipeline
//!
//! Every failure names the stage it happened in and, where one applies, the
//! snapshot key involved, so a caller can tell "nothing happened" apart from
//! "partially happened". A run that finds no change is not an error; see
//! [`crate::pipeline::PipelineResult::NoChange`].

use std::collections::BTreeMap;
use thiserror::Error;

/// Errors raised by a [`crate::measurement::MeasurementRunner`]
#[derive(Error, Debug)]
pub enum RunnerError {
    #[error("failed to spawn benchmark runner: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("benchmark runner exited with status {code:?}: {stderr}")]
    ExitStatus { code: Option<i32>, stderr: String },

    #[error("no benchmarks found")]
    NoBenchmarks,

    #[error("benchmark run was cancelled")]
    Cancelled,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised by a [`crate::storage::BlobStore`]
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("object not found: {0}")]
    NotFound(String),

    #[error("invalid object key: {0}")]
    InvalidKey(String),

    #[error("storage backend error: {0}")]
    Backend(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised by a [`crate::comparison::Comparator`]
#[derive(Error, Debug)]
pub enum ComparatorError {
    #[error("comparison tool failed: {0}")]
    Tool(String),

    #[error("failed to decode comparison tables: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised by a [`crate::notify::Notifier`]
#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("delivery failed: {0}")]
    Delivery(String),

    #[error("failed to encode message: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Fatal outcomes of one pipeline invocation
#[derive(Error, Debug)]
pub enum PipelineError {
    /// The runner crashed or produced no recognizable measurement line.
    /// Nothing has been written.
    #[error("measurement failed for {repository}: {source}")]
    Measurement {
        repository: String,
        #[source]
        source: RunnerError,
    },

    /// The caller's cancellation signal fired while benchmarks were running.
    /// Nothing has been written.
    #[error("benchmark run for {repository} was cancelled")]
    Cancelled { repository: String },

    /// A baseline pointer exists (or its existence could not be determined)
    /// but it could not be retrieved. Nothing has been written.
    #[error("failed to read baseline {key}: {source}")]
    BaselineRead {
        key: String,
        #[source]
        source: StoreError,
    },

    /// The comparator could not diff the two measurement sets.
    /// Nothing has been written.
    #[error("comparison failed: {0}")]
    Comparison(#[from] ComparatorError),

    /// A snapshot write failed. Writes listed in `written` were already
    /// committed and are not rolled back.
    #[error("failed to persist snapshot {key} ({} earlier writes committed): {source}", written.len())]
    Persist {
        key: String,
        written: BTreeMap<String, String>,
        #[source]
        source: StoreError,
    },
}

impl PipelineError {
    /// Name of the stage that failed, for logs and HTTP error codes
    pub fn stage(&self) -> &'static str {
        match self {
            PipelineError::Measurement { .. } => "measurement",
            PipelineError::Cancelled { .. } => "cancelled",
            PipelineError::BaselineRead { .. } => "baseline_read",
            PipelineError::Comparison(_) => "comparison",
            PipelineError::Persist { .. } => "persist",
        }
    }

    /// Whether any snapshot was committed before the failure
    pub fn partially_applied(&self) -> bool {
        matches!(self, PipelineError::Persist { written, .. } if !written.is_empty())
    }
}

/// Rejections of an incoming benchmark request
#[derive(Error, Debug, PartialEq, Eq)]
pub enum RequestError {
    #[error("git_repo_url must not be empty")]
    MissingRepository,

    #[error("git_repo_url {0:?} is not a safe repository path")]
    UnsafeRepository(String),

    #[error("alert_emails must not be empty")]
    NoRecipients,

    #[error("alert_emails contains an invalid address {0:?}")]
    InvalidRecipient(String),
}

/// Failures surfaced to whoever triggered a run
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("invalid request: {0}")]
    InvalidRequest(#[from] RequestError),

    #[error("secret rejected for {repository}")]
    Unauthorized { repository: String },

    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    /// Snapshots were written but the notification could not be sent.
    /// `payload` is what would have been delivered.
    #[error("notification failed: {source}")]
    Notification {
        payload: crate::pipeline::ReportPayload,
        #[source]
        source: NotifyError,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_names() {
        let err = PipelineError::Cancelled {
            repository: "github.com/acme/widgets".to_string(),
        };
        assert_eq!(err.stage(), "cancelled");

        let err = PipelineError::Comparison(ComparatorError::Tool("boom".to_string()));
        assert_eq!(err.stage(), "comparison");
    }

    #[test]
    fn test_persist_error_reports_partial_writes() {
        let mut written = BTreeMap::new();
        written.insert("latest".to_string(), "mem://b/latest".to_string());

        let err = PipelineError::Persist {
            key: "repo/benchmarks/latest-results".to_string(),
            written,
            source: StoreError::Backend("quota exceeded".to_string()),
        };

        assert!(err.partially_applied());
        let message = err.to_string();
        assert!(message.contains("repo/benchmarks/latest-results"));
        assert!(message.contains("1 earlier writes committed"));
    }

    #[test]
    fn test_persist_error_without_writes_is_not_partial() {
        let err = PipelineError::Persist {
            key: "repo/benchmarks/latest".to_string(),
            written: BTreeMap::new(),
            source: StoreError::Backend("denied".to_string()),
        };
        assert!(!err.partially_applied());
    }

    #[test]
    fn test_service_error_wraps_pipeline_transparently() {
        let err: ServiceError = PipelineError::Cancelled {
            repository: "repo".to_string(),
        }
        .into();
        assert_eq!(err.to_string(), "benchmark run for repo was cancelled");

        let err: ServiceError = RequestError::NoRecipients.into();
        assert_eq!(err.to_string(), "invalid request: alert_emails must not be empty");
    }
}

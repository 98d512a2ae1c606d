//! Two-name snapshot versioning on top of a [`BlobStore`]

use super::blob::{BlobStore, Visibility};
use crate::error::StoreError;
use bytes::Bytes;
use chrono::{DateTime, Datelike, Utc};
use std::fmt;
use std::sync::Arc;

/// Time-derived unique token: `{year}-{month}-{day}/{unix_seconds}`
///
/// Not zero padded. Two runs in the same second produce the same token and
/// the later write wins; that collision is accepted.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TimeToken(String);

impl TimeToken {
    pub fn at(now: DateTime<Utc>) -> Self {
        Self(format!(
            "{}-{}-{}/{}",
            now.year(),
            now.month(),
            now.day(),
            now.timestamp()
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TimeToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Which snapshot of a repository a key names
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SnapshotVariant {
    /// Mutable pointer to the current baseline (raw measurements)
    Latest,
    /// Immutable raw measurements of one run
    Timestamped(TimeToken),
    /// Mutable pointer to the most recent change report
    LatestResults,
    /// Immutable change report of one run
    TimestampedResults(TimeToken),
}

impl SnapshotVariant {
    /// Raw-measurement variants for a run at `token`, in write order
    pub fn raw_pair(token: &TimeToken) -> [SnapshotVariant; 2] {
        [
            SnapshotVariant::Latest,
            SnapshotVariant::Timestamped(token.clone()),
        ]
    }

    /// Report variants for a run at `token`, in write order
    pub fn results_pair(token: &TimeToken) -> [SnapshotVariant; 2] {
        [
            SnapshotVariant::LatestResults,
            SnapshotVariant::TimestampedResults(token.clone()),
        ]
    }

    pub fn is_results(&self) -> bool {
        matches!(
            self,
            SnapshotVariant::LatestResults | SnapshotVariant::TimestampedResults(_)
        )
    }
}

impl fmt::Display for SnapshotVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SnapshotVariant::Latest => f.write_str("latest"),
            SnapshotVariant::Timestamped(token) => write!(f, "{token}"),
            SnapshotVariant::LatestResults => f.write_str("latest-results"),
            SnapshotVariant::TimestampedResults(token) => write!(f, "{token}-results"),
        }
    }
}

/// `{repository}/benchmarks/{variant}`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SnapshotKey {
    pub repository: String,
    pub variant: SnapshotVariant,
}

impl SnapshotKey {
    pub fn new(repository: impl Into<String>, variant: SnapshotVariant) -> Self {
        Self {
            repository: repository.into(),
            variant,
        }
    }

    /// The baseline pointer for `repository`
    pub fn baseline(repository: impl Into<String>) -> Self {
        Self::new(repository, SnapshotVariant::Latest)
    }

    pub fn object_key(&self) -> String {
        format!("{}/benchmarks/{}", self.repository, self.variant)
    }
}

impl fmt::Display for SnapshotKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/benchmarks/{}", self.repository, self.variant)
    }
}

/// Naming policy over a bucket of a [`BlobStore`]
#[derive(Clone)]
pub struct SnapshotStore {
    blobs: Arc<dyn BlobStore>,
    bucket: String,
}

impl fmt::Debug for SnapshotStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SnapshotStore")
            .field("bucket", &self.bucket)
            .finish_non_exhaustive()
    }
}

impl SnapshotStore {
    pub fn new(blobs: Arc<dyn BlobStore>, bucket: impl Into<String>) -> Self {
        Self {
            blobs,
            bucket: bucket.into(),
        }
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Whether a baseline was ever recorded for `repository`
    ///
    /// Only the raw `latest` key counts; `latest-results` is ignored.
    pub async fn exists(&self, repository: &str) -> Result<bool, StoreError> {
        self.has(&SnapshotKey::baseline(repository)).await
    }

    pub async fn has(&self, key: &SnapshotKey) -> Result<bool, StoreError> {
        self.blobs.exists(&self.bucket, &key.object_key()).await
    }

    pub async fn read(&self, key: &SnapshotKey) -> Result<Bytes, StoreError> {
        self.blobs.read(&self.bucket, &key.object_key()).await
    }

    /// Write one snapshot and return its locator
    ///
    /// Each call stands alone: there is no batching and no multi-key commit.
    pub async fn put(
        &self,
        key: &SnapshotKey,
        bytes: Bytes,
        visibility: Visibility,
    ) -> Result<String, StoreError> {
        let object_key = key.object_key();
        tracing::debug!(
            bucket = %self.bucket,
            key = %object_key,
            size = bytes.len(),
            public = visibility.is_public(),
            "Uploading snapshot"
        );
        self.blobs
            .write(&self.bucket, &object_key, bytes, visibility)
            .await
    }
}

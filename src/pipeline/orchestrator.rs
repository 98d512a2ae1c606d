//! Pipeline orchestration

use super::lease::RepoLeases;
use super::{BaselinePolicy, PipelineResult};
use crate::comparison::ChangeFilter;
use crate::error::{PipelineError, RunnerError};
use crate::measurement::{MeasurementRunner, MeasurementSet};
use crate::report;
use crate::storage::{SnapshotKey, SnapshotStore, SnapshotVariant, TimeToken, Visibility};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

/// Source of "now" for timestamped snapshot names
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Sequences measurement, comparison and snapshot promotion for one repository
pub struct PipelineOrchestrator {
    runner: Arc<dyn MeasurementRunner>,
    snapshots: SnapshotStore,
    filter: ChangeFilter,
    leases: RepoLeases,
    policy: BaselinePolicy,
    clock: Clock,
}

impl std::fmt::Debug for PipelineOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineOrchestrator")
            .field("snapshots", &self.snapshots)
            .field("filter", &self.filter)
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl PipelineOrchestrator {
    pub fn new(
        runner: Arc<dyn MeasurementRunner>,
        snapshots: SnapshotStore,
        filter: ChangeFilter,
    ) -> Self {
        Self {
            runner,
            snapshots,
            filter,
            leases: RepoLeases::new(),
            policy: BaselinePolicy::default(),
            clock: Arc::new(Utc::now),
        }
    }

    pub fn with_policy(mut self, policy: BaselinePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// Share a lease table with other orchestrators in the same process
    pub fn with_leases(mut self, leases: RepoLeases) -> Self {
        self.leases = leases;
        self
    }

    pub fn leases(&self) -> &RepoLeases {
        &self.leases
    }

    /// Run the pipeline once for `repository`
    ///
    /// `cancel` aborts the benchmark run (and a pending lease wait) with
    /// [`PipelineError::Cancelled`]. Later stages are short and run to
    /// completion once started.
    pub async fn run(
        &self,
        repository: &str,
        visibility: Visibility,
        cancel: &CancellationToken,
    ) -> Result<PipelineResult, PipelineError> {
        let after = self
            .measure(repository, cancel)
            .instrument(tracing::info_span!("run_benchmarks", repository))
            .await?;

        let _lease = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                return Err(PipelineError::Cancelled { repository: repository.to_string() });
            }
            lease = self.leases.acquire(repository) => lease,
        };

        let token = TimeToken::at((self.clock)());
        let baseline_key = SnapshotKey::baseline(repository);

        let has_baseline = self.snapshots.exists(repository).await.map_err(|source| {
            PipelineError::BaselineRead {
                key: baseline_key.object_key(),
                source,
            }
        })?;

        if !has_baseline {
            tracing::info!(repository, "No stored benchmarks yet, recording the first baseline");
            let mut written = BTreeMap::new();
            self.persist(
                repository,
                &SnapshotVariant::raw_pair(&token),
                after.bytes(),
                visibility,
                &mut written,
            )
            .instrument(tracing::info_span!("persist_snapshots", repository))
            .await?;

            return Ok(PipelineResult::FirstRun {
                locators: written,
                measurements: after,
            });
        }

        let before = self
            .snapshots
            .read(&baseline_key)
            .instrument(tracing::info_span!("download_baseline", repository))
            .await
            .map(MeasurementSet::from_bytes)
            .map_err(|source| PipelineError::BaselineRead {
                key: baseline_key.object_key(),
                source,
            })?;

        let changed = self
            .filter
            .compare(&before, &after)
            .instrument(tracing::info_span!("compute_differences", repository))
            .await?;

        if changed.is_empty() {
            tracing::info!(repository, "No changes detected");
            let mut advanced = BTreeMap::new();
            if self.policy.advance_on_no_change {
                self.persist(
                    repository,
                    &SnapshotVariant::raw_pair(&token),
                    after.bytes(),
                    visibility,
                    &mut advanced,
                )
                .instrument(tracing::info_span!("persist_snapshots", repository))
                .await?;
            }
            return Ok(PipelineResult::NoChange { advanced });
        }

        let rendered = report::render(&changed);
        tracing::info!(
            repository,
            tables = changed.len(),
            rows = changed.iter().map(|t| t.rows.len()).sum::<usize>(),
            "Changes detected"
        );

        let mut written = BTreeMap::new();
        let results = Bytes::from(rendered.text.clone());
        async {
            self.persist(
                repository,
                &SnapshotVariant::raw_pair(&token),
                after.bytes(),
                visibility,
                &mut written,
            )
            .await?;
            self.persist(
                repository,
                &SnapshotVariant::results_pair(&token),
                results,
                visibility,
                &mut written,
            )
            .await
        }
        .instrument(tracing::info_span!("persist_snapshots", repository))
        .await?;

        Ok(PipelineResult::Changed {
            locators: written,
            tables: changed,
            report: rendered,
        })
    }

    async fn measure(
        &self,
        repository: &str,
        cancel: &CancellationToken,
    ) -> Result<MeasurementSet, PipelineError> {
        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(RunnerError::Cancelled),
            outcome = self.runner.run(repository, cancel) => outcome,
        };

        match outcome {
            Ok(set) if set.is_well_formed() => Ok(set),
            Ok(_) => Err(PipelineError::Measurement {
                repository: repository.to_string(),
                source: RunnerError::NoBenchmarks,
            }),
            Err(RunnerError::Cancelled) => Err(PipelineError::Cancelled {
                repository: repository.to_string(),
            }),
            Err(source) => Err(PipelineError::Measurement {
                repository: repository.to_string(),
                source,
            }),
        }
    }

    /// Write `bytes` under each variant in order, recording locators in
    /// `written`. Stops at the first failure; earlier writes stay.
    async fn persist(
        &self,
        repository: &str,
        variants: &[SnapshotVariant],
        bytes: Bytes,
        visibility: Visibility,
        written: &mut BTreeMap<String, String>,
    ) -> Result<(), PipelineError> {
        for variant in variants {
            let key = SnapshotKey::new(repository, variant.clone());
            match self.snapshots.put(&key, bytes.clone(), visibility).await {
                Ok(locator) => {
                    tracing::debug!(key = %key, %locator, "Snapshot written");
                    written.insert(variant.to_string(), locator);
                }
                Err(source) => {
                    tracing::warn!(key = %key, error = %source, "Snapshot write failed");
                    return Err(PipelineError::Persist {
                        key: key.object_key(),
                        written: written.clone(),
                        source,
                    });
                }
            }
        }
        Ok(())
    }
}

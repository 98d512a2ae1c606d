// Shared fakes for integration tests
//
// RatioComparator stands in for a statistics tool: a benchmark "changed" when
// its mean value moved by more than the threshold ratio.

#![allow(dead_code)]

use async_trait::async_trait;
use benchkeeper::comparison::{
    ChangeFilter, Comparator, ComparatorConfig, ComparisonRow, ComparisonTable, UNCHANGED,
};
use benchkeeper::error::{ComparatorError, RunnerError};
use benchkeeper::measurement::{MeasurementRunner, MeasurementSet};
use benchkeeper::pipeline::PipelineOrchestrator;
use benchkeeper::storage::{BlobStore, SnapshotStore};
use chrono::{TimeZone, Utc};
use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

pub const REPO: &str = "github.com/acme/widgets";
pub const BUCKET: &str = "census-demos";

/// Runner that replays queued outputs, repeating the last one
#[derive(Default)]
pub struct ScriptedRunner {
    outputs: Mutex<VecDeque<String>>,
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl ScriptedRunner {
    pub fn new(outputs: &[&str]) -> Self {
        Self {
            outputs: Mutex::new(outputs.iter().map(|s| s.to_string()).collect()),
            ..Self::default()
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MeasurementRunner for ScriptedRunner {
    async fn run(
        &self,
        _repository: &str,
        _cancel: &CancellationToken,
    ) -> Result<MeasurementSet, RunnerError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let mut outputs = self.outputs.lock().unwrap();
        let next = if outputs.len() > 1 {
            outputs.pop_front()
        } else {
            outputs.front().cloned()
        };
        next.map(MeasurementSet::from_bytes)
            .ok_or(RunnerError::NoBenchmarks)
    }
}

/// Mean value per benchmark name from `name iterations value unit` lines
pub fn means(set: &MeasurementSet) -> BTreeMap<String, f64> {
    let mut sums: BTreeMap<String, (f64, usize)> = BTreeMap::new();
    for line in set.measurement_lines() {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() < 3 {
            continue;
        }
        if let Ok(value) = fields[fields.len() - 2].parse::<f64>() {
            let entry = sums.entry(fields[0].to_string()).or_default();
            entry.0 += value;
            entry.1 += 1;
        }
    }
    sums.into_iter()
        .map(|(name, (sum, n))| (name, sum / n as f64))
        .collect()
}

pub struct RatioComparator {
    pub threshold: f64,
}

#[async_trait]
impl Comparator for RatioComparator {
    async fn compare(
        &self,
        before: &MeasurementSet,
        after: &MeasurementSet,
        _config: &ComparatorConfig,
    ) -> Result<Vec<ComparisonTable>, ComparatorError> {
        let before = means(before);
        let after = means(after);
        let rows = before
            .iter()
            .filter_map(|(name, old)| {
                let new = after.get(name)?;
                let ratio = (new - old) / old;
                let change = if ratio.abs() <= self.threshold {
                    UNCHANGED
                } else if ratio < 0.0 {
                    1
                } else {
                    -1
                };
                Some(ComparisonRow {
                    benchmark: name.clone(),
                    before: format!("{old}ns"),
                    after: format!("{new}ns"),
                    delta: format!("{:+.2}%", ratio * 100.0),
                    change,
                    p_value: Some(if change == UNCHANGED { 0.7 } else { 0.008 }),
                })
            })
            .collect();

        Ok(vec![ComparisonTable {
            metric: "time/op".to_string(),
            group: vec![("pkg".to_string(), "widgets".to_string())],
            rows,
        }])
    }
}

pub fn orchestrator(
    blobs: Arc<dyn BlobStore>,
    runner: Arc<dyn MeasurementRunner>,
) -> PipelineOrchestrator {
    PipelineOrchestrator::new(
        runner,
        SnapshotStore::new(blobs, BUCKET),
        ChangeFilter::new(Arc::new(RatioComparator { threshold: 0.1 })),
    )
    .with_clock(Arc::new(|| Utc.with_ymd_and_hms(2024, 3, 7, 9, 5, 0).unwrap()))
}

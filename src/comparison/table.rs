//! Comparison tables and the comparator capability

use crate::error::ComparatorError;
use crate::measurement::MeasurementSet;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Change value meaning "statistically indistinguishable from baseline"
pub const UNCHANGED: i32 = 0;

/// One benchmark case's before/after statistic
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonRow {
    /// Benchmark name, e.g. `BenchmarkFoo-8`
    pub benchmark: String,
    /// Formatted baseline statistic, e.g. `120ns ± 1%`
    pub before: String,
    /// Formatted new statistic
    pub after: String,
    /// Formatted delta, e.g. `+400.00%` or `~`
    pub delta: String,
    /// Direction of a significant change: `-1`, `+1`, or [`UNCHANGED`].
    /// Required: a row the tool did not classify is malformed output.
    pub change: i32,
    /// p-value reported by the significance test, when available
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub p_value: Option<f64>,
}

impl ComparisonRow {
    pub fn is_unchanged(&self) -> bool {
        self.change == UNCHANGED
    }
}

/// Rows for one metric within one group (package/OS/architecture)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonTable {
    /// Metric being compared, e.g. `time/op`
    pub metric: String,
    /// Grouping dimensions in split order, e.g. `[("pkg", "example.com/foo")]`
    #[serde(default)]
    pub group: Vec<(String, String)>,
    pub rows: Vec<ComparisonRow>,
}

impl ComparisonTable {
    /// `key:value` pairs joined by spaces, empty when ungrouped
    pub fn group_label(&self) -> String {
        self.group
            .iter()
            .map(|(key, value)| format!("{key}:{value}"))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Two-sample test used to classify deltas
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeltaTest {
    /// Mann-Whitney U test (non-parametric)
    UTest,
}

impl DeltaTest {
    pub fn as_str(self) -> &'static str {
        match self {
            DeltaTest::UTest => "utest",
        }
    }
}

/// Configuration handed to a [`Comparator`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparatorConfig {
    /// Significance threshold
    pub alpha: f64,
    /// Add a synthetic geometric-mean row per table
    pub add_geomean: bool,
    /// Dimensions tables are split by, in order
    pub split_by: Vec<String>,
    pub delta_test: DeltaTest,
}

impl ComparatorConfig {
    /// The fixed configuration used for change detection
    pub fn change_detection() -> Self {
        Self {
            alpha: 0.05,
            add_geomean: false,
            split_by: vec!["pkg".to_string(), "goos".to_string(), "goarch".to_string()],
            delta_test: DeltaTest::UTest,
        }
    }
}

/// Statistical diff of two measurement sets
///
/// Implementations own the benchmark grammar and the significance test.
/// Tables come back in grouping-key order, rows in the order produced.
#[async_trait]
pub trait Comparator: Send + Sync {
    async fn compare(
        &self,
        before: &MeasurementSet,
        after: &MeasurementSet,
        config: &ComparatorConfig,
    ) -> Result<Vec<ComparisonTable>, ComparatorError>;
}

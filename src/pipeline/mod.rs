// Snapshot-compare-promote pipeline
//
// One invocation: run the suite, look for a baseline, compare, decide, promote.
//
//   no baseline   -> write raw `latest` + timestamped, return FirstRun
//   no change     -> write nothing (unless the policy advances), return NoChange
//   change        -> write raw pair + results pair, return Changed with reports
//
// Writes are independent and never rolled back. A per-repository lease
// serializes the existence check through the final write.

mod lease;
mod orchestrator;

pub use lease::{RepoLease, RepoLeases};
pub use orchestrator::{Clock, PipelineOrchestrator};

use crate::comparison::ComparisonTable;
use crate::measurement::MeasurementSet;
use crate::report::Report;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// What happens to the baseline when a run finds no change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BaselinePolicy {
    /// Write the new raw measurements as `latest` (plus a timestamped copy)
    /// even when nothing changed. Off by default: a no-change run leaves the
    /// baseline exactly as it was.
    #[serde(default)]
    pub advance_on_no_change: bool,
}

/// Outcome of one pipeline invocation
#[derive(Debug, Clone)]
pub enum PipelineResult {
    /// No baseline existed; the measurements became the first one
    FirstRun {
        locators: BTreeMap<String, String>,
        measurements: MeasurementSet,
    },

    /// Every compared row was statistically unchanged. Success with no
    /// action: callers must not notify or retry.
    NoChange {
        /// Snapshots written under [`BaselinePolicy::advance_on_no_change`];
        /// empty by default
        advanced: BTreeMap<String, String>,
    },

    /// At least one row changed; four snapshots were written
    Changed {
        locators: BTreeMap<String, String>,
        tables: Vec<ComparisonTable>,
        report: Report,
    },
}

impl PipelineResult {
    pub fn is_no_change(&self) -> bool {
        matches!(self, PipelineResult::NoChange { .. })
    }

    /// Response body for the triggering request, `None` on no change
    pub fn payload(&self) -> Option<ReportPayload> {
        match self {
            PipelineResult::FirstRun {
                locators,
                measurements,
            } => Some(ReportPayload {
                urls: locators.clone(),
                benchmarks: measurements.to_text(),
                html_benchmarks: String::new(),
            }),
            PipelineResult::NoChange { .. } => None,
            PipelineResult::Changed {
                locators, report, ..
            } => Some(ReportPayload {
                urls: locators.clone(),
                benchmarks: report.text.clone(),
                html_benchmarks: report.html.clone(),
            }),
        }
    }
}

/// Outbound report: snapshot variant -> locator, plus both renderings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportPayload {
    pub urls: BTreeMap<String, String>,
    pub benchmarks: String,
    #[serde(default)]
    pub html_benchmarks: String,
}

//! Change filtering over comparator output

use super::table::{Comparator, ComparatorConfig, ComparisonTable};
use crate::error::ComparatorError;
use crate::measurement::MeasurementSet;
use std::sync::Arc;

/// Keeps only statistically changed rows
///
/// Runs the comparator with [`ComparatorConfig::change_detection`], drops
/// every unchanged row, then drops tables left empty. Ordering is the
/// comparator's own.
#[derive(Clone)]
pub struct ChangeFilter {
    comparator: Arc<dyn Comparator>,
    config: ComparatorConfig,
}

impl std::fmt::Debug for ChangeFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChangeFilter")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl ChangeFilter {
    pub fn new(comparator: Arc<dyn Comparator>) -> Self {
        Self {
            comparator,
            config: ComparatorConfig::change_detection(),
        }
    }

    pub fn config(&self) -> &ComparatorConfig {
        &self.config
    }

    /// Compare and filter. An empty result means no change was detected.
    pub async fn compare(
        &self,
        before: &MeasurementSet,
        after: &MeasurementSet,
    ) -> Result<Vec<ComparisonTable>, ComparatorError> {
        let tables = self.comparator.compare(before, after, &self.config).await?;
        let total = tables.len();
        let changed = retain_changed(tables);

        tracing::debug!(
            tables = total,
            changed_tables = changed.len(),
            changed_rows = changed.iter().map(|t| t.rows.len()).sum::<usize>(),
            "Filtered comparison tables"
        );
        Ok(changed)
    }
}

/// Drop unchanged rows, then tables without rows
pub(crate) fn retain_changed(tables: Vec<ComparisonTable>) -> Vec<ComparisonTable> {
    tables
        .into_iter()
        .filter_map(|mut table| {
            table.rows.retain(|row| !row.is_unchanged());
            (!table.rows.is_empty()).then_some(table)
        })
        .collect()
}

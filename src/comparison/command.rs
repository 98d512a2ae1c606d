//! Comparator backed by an external statistics tool
//!
//! The tool receives the before/after sets as files and must print a JSON
//! array of [`ComparisonTable`] on stdout. Arguments are a template; these
//! placeholders are substituted per invocation:
//!
//! | placeholder    | value                               |
//! |----------------|-------------------------------------|
//! | `{before}`     | path of the baseline file           |
//! | `{after}`      | path of the new measurements file   |
//! | `{alpha}`      | significance threshold              |
//! | `{split}`      | comma-separated split dimensions    |
//! | `{delta_test}` | `utest`                             |
//! | `{geomean}`    | `true` or `false`                   |

use super::table::{Comparator, ComparatorConfig, ComparisonTable};
use crate::error::ComparatorError;
use crate::measurement::MeasurementSet;
use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;

#[derive(Debug, Clone)]
pub struct CommandComparator {
    program: String,
    args: Vec<String>,
}

impl CommandComparator {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    fn render_args(&self, before: &Path, after: &Path, config: &ComparatorConfig) -> Vec<String> {
        let alpha = config.alpha.to_string();
        let split = config.split_by.join(",");
        let geomean = config.add_geomean.to_string();
        let before = before.display().to_string();
        let after = after.display().to_string();

        self.args
            .iter()
            .map(|arg| {
                arg.replace("{before}", &before)
                    .replace("{after}", &after)
                    .replace("{alpha}", &alpha)
                    .replace("{split}", &split)
                    .replace("{delta_test}", config.delta_test.as_str())
                    .replace("{geomean}", &geomean)
            })
            .collect()
    }
}

#[async_trait]
impl Comparator for CommandComparator {
    async fn compare(
        &self,
        before: &MeasurementSet,
        after: &MeasurementSet,
        config: &ComparatorConfig,
    ) -> Result<Vec<ComparisonTable>, ComparatorError> {
        let scratch = tempfile::tempdir()?;
        let before_path = scratch.path().join("before.txt");
        let after_path = scratch.path().join("after.txt");
        tokio::fs::write(&before_path, before.as_bytes()).await?;
        tokio::fs::write(&after_path, after.as_bytes()).await?;

        let args = self.render_args(&before_path, &after_path, config);
        tracing::debug!(program = %self.program, ?args, "Running comparison tool");

        let output = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| ComparatorError::Tool(format!("failed to run {}: {}", self.program, e)))?;

        if !output.status.success() {
            return Err(ComparatorError::Tool(format!(
                "{} exited with status {:?}: {}",
                self.program,
                output.status.code(),
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        Ok(serde_json::from_slice(&output.stdout)?)
    }
}

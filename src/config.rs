//! Configuration file
//!
//! One TOML file, read once at startup. Every section and field is optional.
//!
//! ```toml
//! [storage]
//! bucket = "census-demos"
//! root = "/var/lib/benchkeeper"
//!
//! [runner]
//! program = "go"
//! args = ["test", "-run=^$", "-bench=.", "-count=5", "./..."]
//! workspace = "/srv/checkouts"
//!
//! [comparator]
//! program = "benchstat-json"
//! args = ["-alpha={alpha}", "-split={split}", "{before}", "{after}"]
//!
//! [notify]
//! from = "benchkeeper@localhost"
//! outbox = "/var/spool/benchkeeper"
//!
//! [server]
//! port = 7788
//!
//! [auth]
//! require_secret = true
//! [auth.secrets]
//! "github.com/acme/widgets" = "<sha256 hex of the shared secret>"
//!
//! [policy]
//! advance_on_no_change = false
//! ```

use crate::pipeline::BaselinePolicy;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

pub const DEFAULT_BUCKET: &str = "census-demos";
pub const DEFAULT_PORT: u16 = 7788;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct KeeperConfig {
    pub storage: StorageConfig,
    pub runner: RunnerConfig,
    pub comparator: ComparatorToolConfig,
    pub notify: NotifyConfig,
    pub server: ServerConfig,
    pub auth: AuthConfig,
    pub policy: BaselinePolicy,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StorageConfig {
    pub bucket: String,
    /// Directory holding one subdirectory per bucket
    pub root: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            bucket: DEFAULT_BUCKET.to_string(),
            root: PathBuf::from("benchkeeper-data"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RunnerConfig {
    pub program: String,
    pub args: Vec<String>,
    /// Checkouts live at `{workspace}/{repository}`
    pub workspace: PathBuf,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            program: "go".to_string(),
            args: ["test", "-run=^$", "-bench=.", "-count=5", "./..."]
                .into_iter()
                .map(String::from)
                .collect(),
            workspace: PathBuf::from("."),
        }
    }
}

/// External comparison tool; see [`crate::comparison::CommandComparator`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ComparatorToolConfig {
    pub program: String,
    pub args: Vec<String>,
}

impl Default for ComparatorToolConfig {
    fn default() -> Self {
        Self {
            program: "benchstat-json".to_string(),
            args: [
                "-alpha={alpha}",
                "-split={split}",
                "-delta-test={delta_test}",
                "-geomean={geomean}",
                "{before}",
                "{after}",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NotifyConfig {
    pub from: String,
    pub outbox: PathBuf,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            from: "benchkeeper@localhost".to_string(),
            outbox: PathBuf::from("benchkeeper-outbox"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { port: DEFAULT_PORT }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AuthConfig {
    /// Reject repositories that have no stored secret digest
    pub require_secret: bool,
    /// Repository -> lowercase hex SHA-256 of its shared secret
    pub secrets: BTreeMap<String, String>,
}

impl KeeperConfig {
    /// Load and validate a config file
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config = Self::from_toml(&raw)
            .with_context(|| format!("Invalid config file {}", path.display()))?;
        Ok(config)
    }

    pub fn from_toml(raw: &str) -> Result<Self> {
        let config: Self = toml::from_str(raw).context("Failed to parse TOML")?;
        config.validate().map_err(anyhow::Error::msg)?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.storage.bucket.trim().is_empty() {
            return Err("storage.bucket must not be empty".to_string());
        }
        if self.storage.bucket.contains(&['/', '\\'][..]) || self.storage.bucket.starts_with('.') {
            return Err(format!(
                "storage.bucket must be a single path segment, got {:?}",
                self.storage.bucket
            ));
        }
        if self.runner.program.trim().is_empty() {
            return Err("runner.program must not be empty".to_string());
        }
        if self.comparator.program.trim().is_empty() {
            return Err("comparator.program must not be empty".to_string());
        }
        for placeholder in ["{before}", "{after}"] {
            if !self.comparator.args.iter().any(|a| a.contains(placeholder)) {
                return Err(format!("comparator.args must reference {placeholder}"));
            }
        }
        if self.notify.from.trim().is_empty() {
            return Err("notify.from must not be empty".to_string());
        }
        if self.server.port == 0 {
            return Err("server.port must be non-zero".to_string());
        }
        for (repository, digest) in &self.auth.secrets {
            if digest.len() != 64 || !digest.chars().all(|c| c.is_ascii_hexdigit()) {
                return Err(format!(
                    "auth.secrets.{repository:?} must be a 64-character hex SHA-256 digest"
                ));
            }
        }
        Ok(())
    }
}

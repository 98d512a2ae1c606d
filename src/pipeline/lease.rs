//! Per-repository mutual exclusion
//!
//! Two runs against the same repository would otherwise interleave their
//! baseline read and `latest` write and lose an update. Runs against
//! different repositories never wait on each other.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::OwnedMutexGuard;

/// In-process lease table keyed by repository
#[derive(Debug, Default, Clone)]
pub struct RepoLeases {
    locks: Arc<Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>>,
}

/// Held lease; released on drop
#[derive(Debug)]
pub struct RepoLease {
    _guard: OwnedMutexGuard<()>,
}

impl RepoLeases {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for and take the lease on `repository`
    pub async fn acquire(&self, repository: &str) -> RepoLease {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
            // Only the table references an idle entry.
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);
            locks.entry(repository.to_string()).or_default().clone()
        };

        RepoLease {
            _guard: lock.lock_owned().await,
        }
    }

    /// Number of repositories with a held or awaited lease
    pub fn active(&self) -> usize {
        self.locks
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .values()
            .filter(|lock| Arc::strong_count(lock) > 1)
            .count()
    }
}

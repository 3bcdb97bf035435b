use std::time::Duration;

use serde::{Deserialize, Serialize};

/// What an overwrite does with the entity's existing content id.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverwritePolicy {
    /// Write a new blob, link it, then release the old one. Readers of the
    /// persisted entity keep seeing the old blob until the entity is saved.
    #[default]
    Relink,
    /// Rewrite the existing blob in place under the same id.
    Reuse,
}

/// Tuning for the content template.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Maximum time an upload may hold backend resources, in milliseconds.
    /// Uploads that overrun are discarded.
    pub commit_timeout_ms: u64,
    /// Chunk size used when copying content streams.
    pub copy_buffer_size: usize,
    pub overwrite: OverwritePolicy,
}

impl StoreConfig {
    pub fn commit_timeout(&self) -> Duration {
        Duration::from_millis(self.commit_timeout_ms)
    }

    pub fn with_commit_timeout(mut self, timeout: Duration) -> Self {
        self.commit_timeout_ms = timeout.as_millis().try_into().unwrap_or(u64::MAX);
        self
    }

    pub fn with_overwrite(mut self, overwrite: OverwritePolicy) -> Self {
        self.overwrite = overwrite;
        self
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            commit_timeout_ms: 30_000,
            copy_buffer_size: 64 * 1024,
            overwrite: OverwritePolicy::Relink,
        }
    }
}

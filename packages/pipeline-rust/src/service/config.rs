use serde::{Deserialize, Serialize};

/// Runtime configuration for the interceptor pipeline.
///
/// Missing fields fall back to their defaults when loaded from JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Identifier for this process, attached to the root tracing span.
    pub node_id: String,
    /// Interval between background purges of expired cache entries in milliseconds.
    pub cache_sweep_interval_ms: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            node_id: String::new(),
            cache_sweep_interval_ms: 30_000,
        }
    }
}

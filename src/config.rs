//! Static configuration: the remote list and the load policy.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Priority tier a remote belongs to.
///
/// High-tier remotes load first; low-tier remotes are held back until every
/// high-tier remote has settled (loaded or permanently failed).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    /// Load as soon as the high tier is enabled.
    High,
    /// Load only after the high tier has settled.
    Low,
}

/// Declarative description of one remote module.
///
/// Supplied once by the embedding application and immutable for the lifetime
/// of a scheduler session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteDescriptor {
    /// Unique identifier for the remote.
    pub name: String,
    /// Entry script URL.
    pub url: String,
    /// Container scope the entry registers under (unique).
    pub scope: String,
    /// Module path to request from the container, e.g. `./Widget`.
    #[serde(rename = "module")]
    pub module_path: String,
    /// Tier assignment.
    pub priority: Priority,
}

/// Tuning knobs for loading, retrying, and tier activation.
#[derive(Debug, Clone)]
pub struct LoadPolicy {
    /// Append a fresh `t=<token>` query parameter to every entry fetch.
    pub bust_cache: bool,
    /// Total attempts per load sequence (0 is treated as 1).
    pub max_retries: u32,
    /// Fixed delay between failed attempts.
    pub retry_delay: Duration,
    /// Optional delay before the high tier is enabled.
    pub high_tier_start_delay: Duration,
    /// Delay between high-tier settlement and low-tier activation.
    pub low_tier_settle_delay: Duration,
}

impl Default for LoadPolicy {
    fn default() -> Self {
        Self {
            bust_cache: true,
            max_retries: 3,
            retry_delay: Duration::from_millis(1000),
            high_tier_start_delay: Duration::ZERO,
            low_tier_settle_delay: Duration::from_millis(100),
        }
    }
}

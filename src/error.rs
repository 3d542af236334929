//! Error types for remote module loading.

use thiserror::Error;

/// A single entry-script load attempt failed.
///
/// Carries the URL the attempt actually fetched (including any cache-bust
/// suffix), which is what an operator needs to reproduce the failure.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("loading entry script failed (missing: {url}): {reason}")]
pub struct ScriptLoadError {
    /// The resource URL that failed to load.
    pub url: String,
    /// Transport-level detail (status code, connection error, ...).
    pub reason: String,
}

/// Terminal failure of one remote's load sequence.
#[derive(Error, Debug)]
pub enum LoadError {
    /// Every attempt in the retry budget failed; wraps the last attempt's error.
    #[error("entry for '{scope}' failed after {attempts} attempt(s)")]
    RetriesExhausted {
        /// Remote scope whose entry never loaded.
        scope: String,
        /// Number of attempts actually made.
        attempts: u32,
        /// Failure from the final attempt.
        #[source]
        last: ScriptLoadError,
    },

    /// The entry script loaded but never registered its container.
    #[error("remote container '{scope}' not found; was the entry loaded?")]
    ContainerNotFound {
        /// Scope the container should have registered under.
        scope: String,
    },

    /// Container initialization against the share scope failed.
    #[error("container '{scope}' failed to initialize: {reason}")]
    ContainerInit {
        /// Scope of the failing container.
        scope: String,
        /// Error reported by the container.
        reason: String,
    },

    /// The container does not expose the requested module path.
    #[error("remote '{scope}' does not expose module '{module}'")]
    ModuleNotExposed {
        /// Scope of the container.
        scope: String,
        /// Module path that was requested.
        module: String,
    },
}

impl LoadError {
    /// Attempt count for exhausted retries, if that is what this error is.
    pub fn attempts(&self) -> Option<u32> {
        match self {
            LoadError::RetriesExhausted { attempts, .. } => Some(*attempts),
            _ => None,
        }
    }
}

/// Result type for loading operations.
pub type Result<T> = std::result::Result<T, LoadError>;

//! Entry script fetching: one attempt, one outcome.

use crate::container::ContainerRegistry;
use crate::error::ScriptLoadError;
use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::debug;
use url::Url;

/// Loads one remote entry script, exactly one attempt.
///
/// A successful fetch implies the entry's bootstrap ran, normally leaving a
/// container registered under `scope`. Implementations must not retry
/// internally; the retry loop owns that.
#[async_trait]
pub trait EntryFetcher: Send + Sync {
    /// Fetch the entry at `url` for `scope`.
    async fn fetch(&self, url: &str, scope: &str) -> Result<(), ScriptLoadError>;
}

/// Executes fetched entry bytes: registers the scope's container.
///
/// Stand-in for the browser evaluating a remote entry script and the script
/// assigning its container to `window[scope]`.
#[async_trait]
pub trait EntryBootstrap: Send + Sync {
    /// Run the entry for `scope`, registering its container in `registry`.
    async fn register(
        &self,
        scope: &str,
        bytes: &[u8],
        registry: &ContainerRegistry,
    ) -> anyhow::Result<()>;
}

/// HTTP entry fetcher backed by reqwest.
pub struct HttpEntryFetcher {
    client: reqwest::Client,
    registry: Arc<ContainerRegistry>,
    bootstrap: Arc<dyn EntryBootstrap>,
}

impl HttpEntryFetcher {
    /// Fetcher that registers containers into `registry` via `bootstrap`.
    pub fn new(registry: Arc<ContainerRegistry>, bootstrap: Arc<dyn EntryBootstrap>) -> Self {
        Self {
            client: reqwest::Client::new(),
            registry,
            bootstrap,
        }
    }
}

#[async_trait]
impl EntryFetcher for HttpEntryFetcher {
    async fn fetch(&self, url: &str, scope: &str) -> Result<(), ScriptLoadError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| ScriptLoadError {
                url: url.to_string(),
                reason: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ScriptLoadError {
                url: url.to_string(),
                reason: format!("HTTP {status}"),
            });
        }

        let bytes = response.bytes().await.map_err(|e| ScriptLoadError {
            url: url.to_string(),
            reason: e.to_string(),
        })?;
        debug!(%scope, bytes = bytes.len(), "fetched remote entry");

        self.bootstrap
            .register(scope, &bytes, &self.registry)
            .await
            .map_err(|e| ScriptLoadError {
                url: url.to_string(),
                reason: format!("entry bootstrap failed: {e}"),
            })
    }
}

static LAST_TOKEN: AtomicU64 = AtomicU64::new(0);

/// Fresh cache-bust token.
///
/// Derived from unix millis but forced strictly increasing, so two attempts
/// landing in the same millisecond still get distinct query values.
pub(crate) fn cache_token() -> u64 {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0);
    let mut token = 0;
    let _ = LAST_TOKEN.fetch_update(Ordering::Relaxed, Ordering::Relaxed, |prev| {
        token = now.max(prev + 1);
        Some(token)
    });
    token
}

/// Append a `t=<token>` query pair so intermediary caches cannot serve a
/// stale failed response.
pub(crate) fn bust_url(url: &str, token: u64) -> String {
    match Url::parse(url) {
        Ok(mut parsed) => {
            parsed
                .query_pairs_mut()
                .append_pair("t", &token.to_string());
            parsed.into()
        }
        // Not absolute; fall back to plain string surgery.
        Err(_) => {
            let sep = if url.contains('?') { '&' } else { '?' };
            format!("{url}{sep}t={token}")
        }
    }
}

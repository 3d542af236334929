//! Bounded retry loop for entry loading.
//!
//! Attempts are strictly sequential with a fixed delay between failures; a
//! congested or rate-limiting origin is never hammered with parallel retries
//! for the same remote. Different remotes retry independently.

use crate::config::LoadPolicy;
use crate::error::{LoadError, Result};
use crate::fetch::{bust_url, cache_token, EntryFetcher};
use tokio::time::sleep;
use tracing::{debug, warn};

/// Load a remote entry, retrying up to `policy.max_retries` attempts.
///
/// `on_attempt` fires with the attempt number (starting at 1) before each
/// attempt, letting the owner surface load progress. When cache-busting is
/// on, every attempt (including the first) fetches a distinct URL. Resolves
/// on the first success, discarding the remaining budget; after the last
/// failed attempt returns [`LoadError::RetriesExhausted`] wrapping the final
/// attempt's error.
pub async fn load_entry_with_retry(
    fetcher: &dyn EntryFetcher,
    url: &str,
    scope: &str,
    policy: &LoadPolicy,
    mut on_attempt: impl FnMut(u32),
) -> Result<()> {
    let max_attempts = policy.max_retries.max(1);
    let mut attempt = 0;

    loop {
        attempt += 1;
        on_attempt(attempt);

        let attempt_url = if policy.bust_cache {
            bust_url(url, cache_token())
        } else {
            url.to_string()
        };
        debug!(%scope, url = %attempt_url, "loading entry (attempt {attempt}/{max_attempts})");

        match fetcher.fetch(&attempt_url, scope).await {
            Ok(()) => {
                debug!(%scope, "entry loaded");
                return Ok(());
            }
            Err(err) if attempt >= max_attempts => {
                warn!(%scope, %err, "entry load failed; retry budget exhausted");
                return Err(LoadError::RetriesExhausted {
                    scope: scope.to_string(),
                    attempts: attempt,
                    last: err,
                });
            }
            Err(err) => {
                warn!(
                    %scope, %err,
                    "entry load attempt {attempt}/{max_attempts} failed; retrying in {:?}",
                    policy.retry_delay
                );
                sleep(policy.retry_delay).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ScriptLoadError;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;
    use tokio::time::Instant;

    /// Fails the first `fail_first` fetches, then succeeds; records URLs.
    struct ScriptedFetcher {
        fail_first: u32,
        calls: AtomicU32,
        urls: Mutex<Vec<String>>,
    }

    impl ScriptedFetcher {
        fn new(fail_first: u32) -> Self {
            Self {
                fail_first,
                calls: AtomicU32::new(0),
                urls: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl EntryFetcher for ScriptedFetcher {
        async fn fetch(&self, url: &str, _scope: &str) -> std::result::Result<(), ScriptLoadError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            self.urls.lock().unwrap().push(url.to_string());
            if call <= self.fail_first {
                Err(ScriptLoadError {
                    url: url.to_string(),
                    reason: "connection refused".into(),
                })
            } else {
                Ok(())
            }
        }
    }

    fn policy(max_retries: u32, retry_delay_ms: u64, bust_cache: bool) -> LoadPolicy {
        LoadPolicy {
            bust_cache,
            max_retries,
            retry_delay: Duration::from_millis(retry_delay_ms),
            ..LoadPolicy::default()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn fails_after_exactly_max_attempts() {
        let fetcher = ScriptedFetcher::new(u32::MAX);
        let start = Instant::now();
        let result =
            load_entry_with_retry(&fetcher, "http://x/remoteEntry.js", "x", &policy(3, 1000, false), |_| {})
                .await;

        assert_eq!(fetcher.calls(), 3);
        // Two inter-attempt delays.
        assert!(start.elapsed() >= Duration::from_millis(2000));
        match result {
            Err(LoadError::RetriesExhausted { attempts, last, .. }) => {
                assert_eq!(attempts, 3);
                assert_eq!(last.reason, "connection refused");
            }
            other => panic!("expected RetriesExhausted, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn success_stops_further_attempts() {
        let fetcher = ScriptedFetcher::new(1);
        let result =
            load_entry_with_retry(&fetcher, "http://x/remoteEntry.js", "x", &policy(5, 10, false), |_| {})
                .await;
        assert!(result.is_ok());
        assert_eq!(fetcher.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn succeeds_on_final_attempt() {
        let fetcher = ScriptedFetcher::new(2);
        let start = Instant::now();
        let result =
            load_entry_with_retry(&fetcher, "http://x/remoteEntry.js", "x", &policy(3, 1000, false), |_| {})
                .await;
        assert!(result.is_ok());
        assert_eq!(fetcher.calls(), 3);
        assert!(start.elapsed() >= Duration::from_millis(2000));
    }

    #[tokio::test(start_paused = true)]
    async fn zero_retry_budget_still_attempts_once() {
        let fetcher = ScriptedFetcher::new(u32::MAX);
        let result =
            load_entry_with_retry(&fetcher, "http://x/remoteEntry.js", "x", &policy(0, 10, false), |_| {})
                .await;
        assert_eq!(fetcher.calls(), 1);
        assert_eq!(result.unwrap_err().attempts(), Some(1));
    }

    #[tokio::test(start_paused = true)]
    async fn cache_busting_uses_distinct_urls_per_attempt() {
        let fetcher = ScriptedFetcher::new(u32::MAX);
        let _ =
            load_entry_with_retry(&fetcher, "http://x/remoteEntry.js", "x", &policy(3, 10, true), |_| {})
                .await;

        let urls = fetcher.urls.lock().unwrap().clone();
        assert_eq!(urls.len(), 3);
        for url in &urls {
            assert!(url.starts_with("http://x/remoteEntry.js?t="), "{url}");
        }
        let mut unique = urls.clone();
        unique.sort();
        unique.dedup();
        assert_eq!(unique.len(), 3, "cache-bust suffixes must differ: {urls:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn reports_attempt_numbers_in_order() {
        let fetcher = ScriptedFetcher::new(u32::MAX);
        let mut seen = Vec::new();
        let _ = load_entry_with_retry(
            &fetcher,
            "http://x/remoteEntry.js",
            "x",
            &policy(3, 10, false),
            |attempt| seen.push(attempt),
        )
        .await;
        assert_eq!(seen, vec![1, 2, 3]);
    }
}

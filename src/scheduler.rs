//! Tiered scheduling: high-priority remotes first, low-priority after
//! settlement.
//!
//! A session owns every spawned task; dropping it aborts the loaders and any
//! pending tier timer, so a torn-down host never schedules further attempts.

use crate::config::{LoadPolicy, Priority, RemoteDescriptor};
use crate::container::{ContainerRegistry, ShareScope};
use crate::fetch::EntryFetcher;
use crate::loader::{LoadState, RemoteHandle, RemoteLoader};
use futures::future::select_all;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, info};

/// Spawns prioritized loading sessions for a declarative remote list.
pub struct PriorityScheduler {
    policy: LoadPolicy,
    fetcher: Arc<dyn EntryFetcher>,
    registry: Arc<ContainerRegistry>,
    share: Arc<ShareScope>,
}

impl PriorityScheduler {
    /// Scheduler over a fetcher and the shared container/dependency registries.
    pub fn new(
        policy: LoadPolicy,
        fetcher: Arc<dyn EntryFetcher>,
        registry: Arc<ContainerRegistry>,
        share: Arc<ShareScope>,
    ) -> Self {
        Self {
            policy,
            fetcher,
            registry,
            share,
        }
    }

    /// Registry the session's entry loads register containers into.
    pub fn registry(&self) -> &Arc<ContainerRegistry> {
        &self.registry
    }

    /// Shared-dependency scope used during resolution.
    pub fn share_scope(&self) -> &Arc<ShareScope> {
        &self.share
    }

    /// Start loading `remotes`.
    ///
    /// Tier membership is fixed for the session; start a new session if the
    /// remote list changes. High-tier remotes activate after the optional
    /// start delay and load concurrently with no ordering within the tier.
    /// The low tier activates one settle delay after every high-tier remote
    /// has settled (loaded or permanently failed).
    pub fn start(&self, remotes: &[RemoteDescriptor]) -> ScheduleSession {
        let (high_gate_tx, high_gate_rx) = watch::channel(false);
        let (low_gate_tx, low_gate_rx) = watch::channel(false);
        let (all_high_tx, all_high_rx) = watch::channel(false);

        let mut high = Vec::new();
        let mut low = Vec::new();
        let mut high_status = Vec::new();
        let mut tasks = Vec::new();

        for descriptor in remotes {
            let descriptor = Arc::new(descriptor.clone());
            let gate = match descriptor.priority {
                Priority::High => high_gate_rx.clone(),
                Priority::Low => low_gate_rx.clone(),
            };
            let (handle, task) = RemoteLoader::spawn(
                descriptor.clone(),
                self.policy.clone(),
                self.fetcher.clone(),
                self.registry.clone(),
                self.share.clone(),
                gate,
            );
            tasks.push(task);
            match descriptor.priority {
                Priority::High => {
                    high_status.push(handle.subscribe());
                    high.push(handle);
                }
                Priority::Low => low.push(handle),
            }
        }
        debug!(high = high.len(), low = low.len(), "scheduler session started");

        let policy = self.policy.clone();
        tasks.push(tokio::spawn(Self::run_gates(
            policy,
            high_gate_tx,
            low_gate_tx,
            all_high_tx,
            high_status,
        )));

        ScheduleSession {
            high,
            low,
            all_high: all_high_rx,
            tasks,
        }
    }

    /// One-shot gate sequencing for a session.
    async fn run_gates(
        policy: LoadPolicy,
        high_gate: watch::Sender<bool>,
        low_gate: watch::Sender<bool>,
        all_high: watch::Sender<bool>,
        mut high_status: Vec<watch::Receiver<LoadState>>,
    ) {
        if high_status.is_empty() {
            // Nothing to wait on; the aggregate is trivially true.
            debug!("no high-priority remotes configured");
            let _ = all_high.send(true);
        } else {
            if !policy.high_tier_start_delay.is_zero() {
                debug!(
                    "waiting {:?} before enabling high-priority tier",
                    policy.high_tier_start_delay
                );
                sleep(policy.high_tier_start_delay).await;
            }
            info!(remotes = high_status.len(), "enabling high-priority tier");
            let _ = high_gate.send(true);

            wait_all_settled(&mut high_status).await;
            info!("all high-priority remotes settled");
            let _ = all_high.send(true);
        }

        if !policy.low_tier_settle_delay.is_zero() {
            sleep(policy.low_tier_settle_delay).await;
        }
        info!("enabling low-priority tier");
        let _ = low_gate.send(true);
    }
}

/// Wait until every receiver reports a settled state.
///
/// Settled remotes leave the wait set, so a later manual retry flipping one
/// back to `Loading` cannot re-open the gate.
async fn wait_all_settled(rxs: &mut Vec<watch::Receiver<LoadState>>) {
    loop {
        rxs.retain_mut(|rx| !rx.borrow_and_update().is_settled());
        if rxs.is_empty() {
            return;
        }
        let changes: Vec<_> = rxs.iter_mut().map(|rx| Box::pin(rx.changed())).collect();
        let (result, index, _) = select_all(changes).await;
        if result.is_err() {
            // Loader gone without settling; abandoned, not blocking.
            rxs.swap_remove(index);
        }
    }
}

/// A running prioritized loading session.
///
/// Owns every loader and gate task; dropping the session aborts them all.
pub struct ScheduleSession {
    high: Vec<RemoteHandle>,
    low: Vec<RemoteHandle>,
    all_high: watch::Receiver<bool>,
    tasks: Vec<JoinHandle<()>>,
}

impl ScheduleSession {
    /// Handles for the high-priority tier.
    pub fn high(&self) -> &[RemoteHandle] {
        &self.high
    }

    /// Handles for the low-priority tier.
    pub fn low(&self) -> &[RemoteHandle] {
        &self.low
    }

    /// All handles, high tier first.
    pub fn remotes(&self) -> impl Iterator<Item = &RemoteHandle> {
        self.high.iter().chain(self.low.iter())
    }

    /// Handle for a remote by name.
    pub fn get(&self, name: &str) -> Option<&RemoteHandle> {
        self.remotes().find(|handle| handle.name() == name)
    }

    /// Whether every high-priority remote has settled.
    ///
    /// Monotonic for the session lifetime: once true it stays true, even if
    /// a settled remote is later manually retried and fails again.
    pub fn all_high_priority_loaded(&self) -> bool {
        *self.all_high.borrow()
    }

    /// Watch receiver over the aggregate high-tier signal.
    pub fn subscribe_all_high_loaded(&self) -> watch::Receiver<bool> {
        self.all_high.clone()
    }

    /// Wait until every high-priority remote has settled.
    pub async fn wait_all_high_loaded(&self) {
        let mut rx = self.all_high.clone();
        loop {
            if *rx.borrow_and_update() {
                return;
            }
            if rx.changed().await.is_err() {
                return;
            }
        }
    }
}

impl Drop for ScheduleSession {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}

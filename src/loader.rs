//! Per-remote load state machine.
//!
//! Each remote gets one spawned task that exclusively owns its state and
//! publishes transitions through a watch channel:
//! `Idle -> Loading -> {Loaded, Failed}`, with manual retry re-entering
//! `Loading` from either terminal state. The task stays `Idle` until its
//! tier gate enables it.

use crate::config::{LoadPolicy, RemoteDescriptor};
use crate::container::{ContainerRegistry, ModuleHandle, ShareScope};
use crate::error::LoadError;
use crate::fetch::EntryFetcher;
use crate::resolver::resolve_module;
use crate::retry::load_entry_with_retry;
use std::fmt;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Loading progress of one remote.
#[derive(Clone)]
pub enum LoadState {
    /// Not yet enabled by the tier gate.
    Idle,
    /// Attempt sequence in flight.
    Loading {
        /// Current attempt number, starting at 1.
        attempt: u32,
    },
    /// Terminal success; carries the resolved module.
    Loaded(ModuleHandle),
    /// Terminal failure for this attempt sequence.
    Failed(Arc<LoadError>),
}

impl LoadState {
    /// Whether an attempt sequence is in flight.
    pub fn is_loading(&self) -> bool {
        matches!(self, LoadState::Loading { .. })
    }

    /// Whether this state is terminal for the current attempt sequence.
    pub fn is_settled(&self) -> bool {
        matches!(self, LoadState::Loaded(_) | LoadState::Failed(_))
    }

    /// Resolved module handle, if loaded.
    pub fn component(&self) -> Option<ModuleHandle> {
        match self {
            LoadState::Loaded(handle) => Some(handle.clone()),
            _ => None,
        }
    }

    /// Terminal error, if failed.
    pub fn error(&self) -> Option<Arc<LoadError>> {
        match self {
            LoadState::Failed(err) => Some(err.clone()),
            _ => None,
        }
    }
}

impl fmt::Debug for LoadState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadState::Idle => write!(f, "Idle"),
            LoadState::Loading { attempt } => write!(f, "Loading(attempt={attempt})"),
            LoadState::Loaded(_) => write!(f, "Loaded"),
            LoadState::Failed(err) => write!(f, "Failed({err})"),
        }
    }
}

/// Consumer surface for one remote: status snapshot plus the retry trigger.
#[derive(Clone)]
pub struct RemoteHandle {
    descriptor: Arc<RemoteDescriptor>,
    status: watch::Receiver<LoadState>,
    retry_tx: mpsc::UnboundedSender<()>,
}

impl RemoteHandle {
    /// Remote name from the descriptor.
    pub fn name(&self) -> &str {
        &self.descriptor.name
    }

    /// The descriptor this remote was configured with.
    pub fn descriptor(&self) -> &RemoteDescriptor {
        &self.descriptor
    }

    /// Current state snapshot.
    pub fn state(&self) -> LoadState {
        self.status.borrow().clone()
    }

    /// Whether an attempt sequence is currently in flight.
    pub fn loading(&self) -> bool {
        self.status.borrow().is_loading()
    }

    /// Terminal error from the last attempt sequence, if any.
    pub fn error(&self) -> Option<Arc<LoadError>> {
        self.status.borrow().error()
    }

    /// Resolved module handle, if loaded.
    pub fn component(&self) -> Option<ModuleHandle> {
        self.status.borrow().component()
    }

    /// Request a fresh attempt sequence.
    ///
    /// Re-enters `Loading` from `Failed` or `Loaded` with a full retry
    /// budget; a no-op while already loading. Works even after success, for
    /// manual refresh.
    pub fn retry(&self) {
        let _ = self.retry_tx.send(());
    }

    /// Watch receiver over this remote's state transitions.
    pub fn subscribe(&self) -> watch::Receiver<LoadState> {
        self.status.clone()
    }

    /// Wait until the current attempt sequence reaches a terminal state.
    pub async fn settled(&self) -> LoadState {
        let mut rx = self.status.clone();
        loop {
            let state = rx.borrow_and_update().clone();
            if state.is_settled() {
                return state;
            }
            if rx.changed().await.is_err() {
                // Loader task gone; report whatever it last published.
                return rx.borrow().clone();
            }
        }
    }
}

/// The spawned task driving one remote's state machine.
pub(crate) struct RemoteLoader {
    descriptor: Arc<RemoteDescriptor>,
    policy: LoadPolicy,
    fetcher: Arc<dyn EntryFetcher>,
    registry: Arc<ContainerRegistry>,
    share: Arc<ShareScope>,
    state_tx: watch::Sender<LoadState>,
    retry_rx: mpsc::UnboundedReceiver<()>,
    gate: watch::Receiver<bool>,
}

impl RemoteLoader {
    /// Spawn the loader task for `descriptor`, gated on `gate`.
    pub(crate) fn spawn(
        descriptor: Arc<RemoteDescriptor>,
        policy: LoadPolicy,
        fetcher: Arc<dyn EntryFetcher>,
        registry: Arc<ContainerRegistry>,
        share: Arc<ShareScope>,
        gate: watch::Receiver<bool>,
    ) -> (RemoteHandle, JoinHandle<()>) {
        let (state_tx, state_rx) = watch::channel(LoadState::Idle);
        let (retry_tx, retry_rx) = mpsc::unbounded_channel();
        let loader = Self {
            descriptor: descriptor.clone(),
            policy,
            fetcher,
            registry,
            share,
            state_tx,
            retry_rx,
            gate,
        };
        let task = tokio::spawn(loader.run());
        let handle = RemoteHandle {
            descriptor,
            status: state_rx,
            retry_tx,
        };
        (handle, task)
    }

    async fn run(mut self) {
        // Idle until the tier gate enables this remote.
        while !*self.gate.borrow_and_update() {
            if self.gate.changed().await.is_err() {
                return;
            }
        }
        debug!(name = %self.descriptor.name, "remote enabled");

        loop {
            self.load_once().await;

            // Retry requests that arrived mid-load are no-ops; the attempt
            // sequence that just finished already covered them.
            while self.retry_rx.try_recv().is_ok() {}

            match self.retry_rx.recv().await {
                Some(()) => info!(name = %self.descriptor.name, "manual retry requested"),
                None => return,
            }
        }
    }

    /// One full attempt sequence: retrying entry load, then resolution.
    async fn load_once(&mut self) {
        let descriptor = self.descriptor.clone();
        let state_tx = &self.state_tx;

        let entry = load_entry_with_retry(
            self.fetcher.as_ref(),
            &descriptor.url,
            &descriptor.scope,
            &self.policy,
            |attempt| {
                let _ = state_tx.send(LoadState::Loading { attempt });
            },
        )
        .await;

        let outcome = match entry {
            Ok(()) => {
                resolve_module(
                    &self.registry,
                    &self.share,
                    &descriptor.scope,
                    &descriptor.module_path,
                )
                .await
            }
            Err(err) => Err(err),
        };

        match outcome {
            Ok(handle) => {
                info!(name = %descriptor.name, "remote module loaded");
                let _ = state_tx.send(LoadState::Loaded(handle));
            }
            Err(err) => {
                warn!(name = %descriptor.name, error = %err, "remote module failed to load");
                let _ = state_tx.send(LoadState::Failed(Arc::new(err)));
            }
        }
    }
}

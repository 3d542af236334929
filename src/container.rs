//! Container and shared-dependency registries.
//!
//! A remote's entry script, once loaded, registers a [`RemoteContainer`]
//! under its scope name. Resolution then initializes the container against
//! the host [`ShareScope`] and asks it for a module factory. Both registries
//! are explicit objects rather than process globals so tests can instantiate
//! them without cross-test leakage.

use async_trait::async_trait;
use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{OnceCell, RwLock};
use tracing::debug;

/// Opaque handle to a resolved module.
pub type ModuleHandle = Arc<dyn Any + Send + Sync>;

/// Factory that materializes a module when invoked.
pub type ModuleFactory = Box<dyn FnOnce() -> ModuleHandle + Send>;

/// A remote's runtime registration object.
///
/// Obtained after the remote's entry script has loaded; exposed modules are
/// requested through it.
#[async_trait]
pub trait RemoteContainer: Send + Sync {
    /// Initialize the container against the host share scope.
    ///
    /// The container may consume shared dependencies or supply its own.
    /// Called once per load sequence; implementations should tolerate being
    /// called again on manual refresh.
    async fn init(&self, share: &ShareScope) -> anyhow::Result<()>;

    /// Factory for an exposed module path, or `None` if not exposed.
    fn get(&self, module_path: &str) -> Option<ModuleFactory>;
}

/// Shared-dependency registry, initialized at most once per instance.
///
/// `ensure_init` is safe to call redundantly from many concurrently
/// resolving remotes; host-seeded dependencies are installed exactly once
/// regardless of call order.
pub struct ShareScope {
    host_deps: Vec<(String, ModuleHandle)>,
    deps: RwLock<HashMap<String, ModuleHandle>>,
    init: OnceCell<()>,
}

impl ShareScope {
    /// Empty share scope with no host-provided dependencies.
    pub fn new() -> Self {
        Self::with_host_deps(Vec::new())
    }

    /// Share scope seeded with the host build's shared dependencies.
    pub fn with_host_deps(host_deps: Vec<(String, ModuleHandle)>) -> Self {
        Self {
            host_deps,
            deps: RwLock::new(HashMap::new()),
            init: OnceCell::new(),
        }
    }

    /// Idempotently initialize the scope, installing host dependencies once.
    pub async fn ensure_init(&self) {
        self.init
            .get_or_init(|| async {
                let mut deps = self.deps.write().await;
                for (name, handle) in &self.host_deps {
                    deps.insert(name.clone(), handle.clone());
                }
                debug!(deps = deps.len(), "share scope initialized");
            })
            .await;
    }

    /// Whether `ensure_init` has completed at least once.
    pub fn is_initialized(&self) -> bool {
        self.init.initialized()
    }

    /// Supply a shared dependency (containers may provide their own).
    pub async fn provide(&self, name: impl Into<String>, handle: ModuleHandle) {
        self.deps.write().await.insert(name.into(), handle);
    }

    /// Look up a shared dependency by name.
    pub async fn shared(&self, name: &str) -> Option<ModuleHandle> {
        self.deps.read().await.get(name).cloned()
    }
}

impl Default for ShareScope {
    fn default() -> Self {
        Self::new()
    }
}

/// Scope name → registered container.
#[derive(Default)]
pub struct ContainerRegistry {
    containers: RwLock<HashMap<String, Arc<dyn RemoteContainer>>>,
}

impl ContainerRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a container under its scope, replacing any previous one.
    ///
    /// Re-registration happens on manual refresh of an already loaded remote.
    pub async fn register(&self, scope: impl Into<String>, container: Arc<dyn RemoteContainer>) {
        let scope = scope.into();
        debug!(%scope, "registering remote container");
        self.containers.write().await.insert(scope, container);
    }

    /// Container registered for `scope`, if any.
    pub async fn get(&self, scope: &str) -> Option<Arc<dyn RemoteContainer>> {
        self.containers.read().await.get(scope).cloned()
    }

    /// Whether a container is registered for `scope`.
    pub async fn contains(&self, scope: &str) -> bool {
        self.containers.read().await.contains_key(scope)
    }
}

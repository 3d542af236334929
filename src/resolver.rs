//! Module resolution: from a loaded entry to a usable module handle.

use crate::container::{ContainerRegistry, ModuleHandle, ShareScope};
use crate::error::{LoadError, Result};
use tracing::debug;

/// Extract `module_path` from the container registered under `scope`.
///
/// Only meaningful after the scope's entry has loaded. Initializes the share
/// scope (idempotent), looks up and initializes the container, requests the
/// module factory, and invokes it.
pub async fn resolve_module(
    registry: &ContainerRegistry,
    share: &ShareScope,
    scope: &str,
    module_path: &str,
) -> Result<ModuleHandle> {
    share.ensure_init().await;

    // The entry may have loaded without correctly registering itself.
    let container = registry
        .get(scope)
        .await
        .ok_or_else(|| LoadError::ContainerNotFound {
            scope: scope.to_string(),
        })?;

    container
        .init(share)
        .await
        .map_err(|e| LoadError::ContainerInit {
            scope: scope.to_string(),
            reason: e.to_string(),
        })?;

    let factory = container
        .get(module_path)
        .ok_or_else(|| LoadError::ModuleNotExposed {
            scope: scope.to_string(),
            module: module_path.to_string(),
        })?;

    debug!(%scope, %module_path, "resolved module factory");
    Ok(factory())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::{ModuleFactory, RemoteContainer};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    struct WidgetContainer {
        exposed: &'static str,
        init_calls: AtomicU32,
        fail_init: bool,
    }

    impl WidgetContainer {
        fn new(exposed: &'static str) -> Self {
            Self {
                exposed,
                init_calls: AtomicU32::new(0),
                fail_init: false,
            }
        }
    }

    #[async_trait]
    impl RemoteContainer for WidgetContainer {
        async fn init(&self, share: &ShareScope) -> anyhow::Result<()> {
            self.init_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_init {
                anyhow::bail!("shared dependency version mismatch");
            }
            share
                .provide("widget-theme", Arc::new("dark".to_string()) as ModuleHandle)
                .await;
            Ok(())
        }

        fn get(&self, module_path: &str) -> Option<ModuleFactory> {
            if module_path == self.exposed {
                Some(Box::new(|| Arc::new("widget".to_string()) as ModuleHandle))
            } else {
                None
            }
        }
    }

    #[tokio::test]
    async fn resolves_exposed_module() {
        let registry = ContainerRegistry::new();
        let share = ShareScope::new();
        let container = Arc::new(WidgetContainer::new("./Widget"));
        registry.register("headerApp", container.clone()).await;

        let handle = resolve_module(&registry, &share, "headerApp", "./Widget")
            .await
            .unwrap();
        assert_eq!(handle.downcast_ref::<String>().unwrap(), "widget");
        assert_eq!(container.init_calls.load(Ordering::SeqCst), 1);
        // Container-supplied shared dep landed in the scope.
        assert!(share.shared("widget-theme").await.is_some());
        assert!(share.is_initialized());
    }

    #[tokio::test]
    async fn missing_container_is_reported() {
        let registry = ContainerRegistry::new();
        let share = ShareScope::new();
        let err = resolve_module(&registry, &share, "ghostApp", "./Widget")
            .await
            .unwrap_err();
        assert!(matches!(err, LoadError::ContainerNotFound { scope } if scope == "ghostApp"));
    }

    #[tokio::test]
    async fn unexposed_module_is_reported() {
        let registry = ContainerRegistry::new();
        let share = ShareScope::new();
        registry
            .register("headerApp", Arc::new(WidgetContainer::new("./Widget")))
            .await;

        let err = resolve_module(&registry, &share, "headerApp", "./Sidebar")
            .await
            .unwrap_err();
        assert!(
            matches!(err, LoadError::ModuleNotExposed { scope, module }
                if scope == "headerApp" && module == "./Sidebar")
        );
    }

    #[tokio::test]
    async fn container_init_failure_is_reported() {
        let registry = ContainerRegistry::new();
        let share = ShareScope::new();
        let mut container = WidgetContainer::new("./Widget");
        container.fail_init = true;
        registry.register("headerApp", Arc::new(container)).await;

        let err = resolve_module(&registry, &share, "headerApp", "./Widget")
            .await
            .unwrap_err();
        assert!(
            matches!(err, LoadError::ContainerInit { reason, .. }
                if reason.contains("version mismatch"))
        );
    }
}

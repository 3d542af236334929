//! Prioritized runtime loading for federated remote modules.
//!
//! A composite application is assembled at runtime from independently hosted
//! remote modules, each exposing one renderable component. This crate is the
//! bring-up machinery: a declarative remote list is split into high and low
//! priority tiers, every remote is loaded by its own retrying async task,
//! and the low tier is held back until each high-tier remote has settled —
//! loaded or permanently failed. A broken high-priority remote never stalls
//! the rest of the application.
//!
//! # Structure
//!
//! - [`fetch`]: one entry-script load attempt ([`EntryFetcher`]), with
//!   cache-busting and an HTTP implementation.
//! - [`retry`]: sequential bounded retry around the fetcher.
//! - [`container`] / [`resolver`]: container registry, idempotent
//!   shared-dependency scope, and module extraction.
//! - [`loader`]: the per-remote state machine
//!   (`Idle -> Loading -> {Loaded, Failed}`) with a manual retry trigger.
//! - [`scheduler`]: tier gates, settlement aggregation, and session
//!   teardown.
//!
//! # Example
//!
//! ```no_run
//! use modfed::{
//!     ContainerRegistry, HttpEntryFetcher, LoadPolicy, PriorityScheduler, RemoteDescriptor,
//!     ShareScope,
//! };
//! use std::sync::Arc;
//!
//! # fn bootstrap() -> Arc<dyn modfed::EntryBootstrap> { unimplemented!() }
//! # async fn demo() {
//! let registry = Arc::new(ContainerRegistry::new());
//! let share = Arc::new(ShareScope::new());
//! let fetcher = Arc::new(HttpEntryFetcher::new(registry.clone(), bootstrap()));
//!
//! let remotes: Vec<RemoteDescriptor> = serde_json::from_str(
//!     r#"[{"name": "headerApp",
//!          "url": "http://localhost:3001/remoteEntry.js",
//!          "scope": "headerApp",
//!          "module": "./Widget",
//!          "priority": "high"}]"#,
//! )
//! .unwrap();
//!
//! let scheduler = PriorityScheduler::new(LoadPolicy::default(), fetcher, registry, share);
//! let session = scheduler.start(&remotes);
//! session.wait_all_high_loaded().await;
//! for remote in session.remotes() {
//!     println!("{}: {:?}", remote.name(), remote.state());
//! }
//! # }
//! ```

pub mod config;
pub mod container;
pub mod error;
pub mod fetch;
pub mod loader;
pub mod resolver;
pub mod retry;
pub mod scheduler;

pub use config::{LoadPolicy, Priority, RemoteDescriptor};
pub use container::{ContainerRegistry, ModuleFactory, ModuleHandle, RemoteContainer, ShareScope};
pub use error::{LoadError, Result, ScriptLoadError};
pub use fetch::{EntryBootstrap, EntryFetcher, HttpEntryFetcher};
pub use loader::{LoadState, RemoteHandle};
pub use resolver::resolve_module;
pub use retry::load_entry_with_retry;
pub use scheduler::{PriorityScheduler, ScheduleSession};

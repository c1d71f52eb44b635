//! # corekit-runtime
//!
//! Runtime crate for corekit. Provides:
//!
//! - A typed event bus with one-shot waits and chained waits
//! - Lifecycle hooks with `pre` / main / `post` / `complete` phases
//! - The module registry with bounded, waitable resolution
//! - The plugin loader: catalog, directory discovery, dependency ordering
//! - The command dispatcher with at-most-once replies
//! - The application context that boots all of the above

pub mod application;
pub mod bus;
pub mod commands;
pub mod hooks;
pub mod loader;
pub mod prelude;
pub mod registry;
pub mod service_registry;

pub use application::Application;
pub use bus::{EventBus, Payload};
pub use commands::{CommandDispatcher, CommandEvent};
pub use hooks::HookEngine;
pub use loader::{ModuleCatalog, PluginLoader};
pub use registry::ModuleRegistry;

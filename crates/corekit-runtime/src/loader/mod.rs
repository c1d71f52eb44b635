//! Module loading: definitions, the compiled-in catalog, directory
//! discovery, dependency ordering, and the mount loop.

pub mod catalog;
pub mod definition;
pub mod discovery;
pub mod plugin_loader;
pub mod sort;

pub use catalog::ModuleCatalog;
pub use definition::{Factory, FnInitializer, Initializable, ModuleConfig, ModuleDefinition, init_fn};
pub use plugin_loader::{AfterMount, MountHandler, MountOptions, PluginLoader, mount_fn};
pub use sort::sort_by_dependencies;

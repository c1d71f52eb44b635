//! The contract every registered module instance fulfils.

use std::any::Any;
use std::fmt;
use std::sync::{Arc, OnceLock};

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// An error raised by a module after it was registered.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModuleFault {
    /// Human-readable description.
    pub message: String,
    /// Whether the module already dealt with the fault itself.
    #[serde(default)]
    pub handled_by_module: bool,
}

impl ModuleFault {
    /// A fault the application must handle.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            handled_by_module: false,
        }
    }

    /// A fault the module already handled; it is only logged.
    pub fn handled(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            handled_by_module: true,
        }
    }
}

impl fmt::Display for ModuleFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

/// Capabilities a registered module may expose. All of them are optional.
pub trait Module: Send + Sync + 'static {
    /// Identifier the module reports for itself. `None` means the
    /// registration name is used; see [`ModuleInstance::module_id`].
    fn module_id(&self) -> Option<String> {
        None
    }

    /// Receives the module's child logger span after registration.
    fn attach_logger(&self, _span: tracing::Span) {}

    /// Stream of faults the module raises while running.
    fn faults(&self) -> Option<broadcast::Receiver<ModuleFault>> {
        None
    }
}

/// A shared, type-erased handle to a registered module.
///
/// Cloning is cheap and every clone points at the same instance.
#[derive(Clone)]
pub struct ModuleInstance {
    any: Arc<dyn Any + Send + Sync>,
    module: Arc<dyn Module>,
    registered_as: Arc<OnceLock<String>>,
}

impl ModuleInstance {
    /// Wraps a freshly built module.
    pub fn new<T: Module>(module: T) -> Self {
        Self::from_arc(Arc::new(module))
    }

    /// Wraps a module that is already shared.
    pub fn from_arc<T: Module>(module: Arc<T>) -> Self {
        Self {
            any: module.clone(),
            module,
            registered_as: Arc::new(OnceLock::new()),
        }
    }

    /// Records the name the instance was first registered under. Later
    /// calls keep the first name.
    pub fn assign_name(&self, name: &str) {
        let _ = self.registered_as.set(name.to_string());
    }

    /// The module's own id, falling back to its registration name.
    pub fn module_id(&self) -> Option<String> {
        self.module
            .module_id()
            .or_else(|| self.registered_as.get().cloned())
    }

    /// Returns the module's capabilities.
    pub fn module(&self) -> &Arc<dyn Module> {
        &self.module
    }

    /// Returns the concrete instance if it is a `T`.
    pub fn downcast<T: Module>(&self) -> Option<Arc<T>> {
        self.any.clone().downcast::<T>().ok()
    }

    /// Whether both handles point at the same instance.
    pub fn ptr_eq(&self, other: &ModuleInstance) -> bool {
        Arc::ptr_eq(&self.any, &other.any)
    }
}

impl fmt::Debug for ModuleInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleInstance")
            .field("module_id", &self.module_id())
            .finish_non_exhaustive()
    }
}

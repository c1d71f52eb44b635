//! Prelude for writing modules and commands.

pub use async_trait::async_trait;

pub use corekit_core::error::{AppError, ErrorKind};
pub use corekit_core::events::{EventKey, Phase};
pub use corekit_core::result::AppResult;
pub use corekit_core::traits::{Module, ModuleFault, ModuleInstance};

pub use crate::application::Application;
pub use crate::bus::{Payload, listener};
pub use crate::commands::{Command, CommandCatalog, CommandEvent, Responder, command_fn};
pub use crate::loader::{Factory, Initializable, ModuleCatalog, ModuleConfig, ModuleDefinition, init_fn};

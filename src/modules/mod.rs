//! Built-in modules and commands compiled into the binary.
//!
//! `dispatcher` needs `logger`, and `repl` needs `dispatcher`.

pub mod dispatcher;
pub mod logger;
pub mod repl;
pub mod status;

use std::sync::Arc;

use corekit_runtime::commands::{Command, CommandCatalog};
use corekit_runtime::loader::{Factory, ModuleCatalog, ModuleDefinition};

pub use dispatcher::{Dispatcher, DispatcherInit};
pub use logger::{Logger, LoggerInit};
pub use repl::{Repl, ReplInit};
pub use status::StatusCommand;

/// Catalog of the built-in modules.
pub fn module_catalog() -> ModuleCatalog {
    let mut catalog = ModuleCatalog::new();
    catalog
        .register("logger", Factory::init(LoggerInit))
        .register_definition(
            ModuleDefinition::new("dispatcher", Factory::init(DispatcherInit))
                .with_dependencies(["logger"]),
        )
        .register_definition(
            ModuleDefinition::new("repl", Factory::init(ReplInit)).with_dependencies(["dispatcher"]),
        );
    catalog
}

/// Catalog of the built-in commands, bound through manifests in the
/// commands directory.
pub fn command_catalog() -> CommandCatalog {
    let mut catalog = CommandCatalog::new();
    catalog
        .register_with("status", |app| Arc::new(StatusCommand::new(&app)) as Arc<dyn Command>)
        .register("ping", status::ping());
    catalog
}

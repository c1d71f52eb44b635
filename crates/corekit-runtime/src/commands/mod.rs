//! Commands bound to event types.

pub mod dispatcher;
pub mod event;
pub mod handler;

pub use dispatcher::{CommandBinding, CommandDispatcher};
pub use event::{CommandEvent, CommandReply, Responder};
pub use handler::{Command, CommandCatalog, CommandFactory, CommandManifest, command_fn};

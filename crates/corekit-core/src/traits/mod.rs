//! Core traits implemented by modules and consumed by the runtime.

pub mod module;

pub use module::{Module, ModuleFault, ModuleInstance};

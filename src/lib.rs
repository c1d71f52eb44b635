//! # corekit
//!
//! Application bootstrap runtime. The binary in `main.rs` composes the
//! built-in modules below with the runtime from `corekit-runtime`.

pub mod modules;

pub use modules::{command_catalog, module_catalog};

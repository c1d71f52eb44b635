//! Typed event keys for the application event bus.
//!
//! Every event the runtime emits is addressed by an [`EventKey`], a
//! `(subject, phase)` pair. The string form (`"logger.registered"`,
//! `"run.pre"`, `"media.upload.done"`) is only used for display and for
//! parsing names that come from configuration files.

pub mod key;

pub use key::{EventKey, Phase};

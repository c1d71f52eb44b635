//! Lifecycle hooks.

pub mod engine;

pub use engine::HookEngine;

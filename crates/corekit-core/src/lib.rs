//! # corekit-core
//!
//! Core crate for corekit. Contains the unified error system, the
//! configuration schema and key-path config tree, typed event keys,
//! the module instance contract, and the name/uid helpers shared by
//! every other crate.
//!
//! This crate has **no** internal dependencies on other corekit crates.

pub mod config;
pub mod error;
pub mod events;
pub mod result;
pub mod traits;
pub mod types;

pub use error::AppError;
pub use result::AppResult;

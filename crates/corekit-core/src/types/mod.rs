//! Small shared helpers: module name sanitizing and unique identifiers.

pub mod name;
pub mod uid;

pub use name::{module_name_from_path, sanitize_name};
pub use uid::{DEFAULT_UID_LEN, get_uid};

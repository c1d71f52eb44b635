//! Unified application error types for corekit.
//!
//! All crates map their internal errors into [`AppError`] for consistent
//! propagation through the ? operator.

use std::fmt;
use std::time::Duration;

use thiserror::Error;

/// Top-level error kind categorization used across the runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum ErrorKind {
    /// A module definition could not be located.
    Load,
    /// The dependency graph contains a cycle.
    CyclicDependency,
    /// A module factory did not settle within the registration timeout.
    RegistrationTimeout,
    /// A module factory failed.
    RegistrationFailed,
    /// A module was not registered within the resolve timeout.
    ResolveTimeout,
    /// `resolve` was called without an identifier.
    InvalidIdentifier,
    /// A configuration error occurred.
    Configuration,
    /// A command failed to execute.
    Command,
    /// A registered module reported a fault it did not handle.
    Module,
    /// An internal error occurred.
    Internal,
    /// A serialization/deserialization error occurred.
    Serialization,
    /// A filesystem I/O error occurred.
    Io,
    /// An external service error occurred.
    ExternalService,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Load => write!(f, "LOAD"),
            Self::CyclicDependency => write!(f, "CYCLIC_DEPENDENCY"),
            Self::RegistrationTimeout => write!(f, "REGISTRATION_TIMEOUT"),
            Self::RegistrationFailed => write!(f, "REGISTRATION_FAILED"),
            Self::ResolveTimeout => write!(f, "RESOLVE_TIMEOUT"),
            Self::InvalidIdentifier => write!(f, "INVALID_IDENTIFIER"),
            Self::Configuration => write!(f, "CONFIGURATION"),
            Self::Command => write!(f, "COMMAND"),
            Self::Module => write!(f, "MODULE"),
            Self::Internal => write!(f, "INTERNAL"),
            Self::Serialization => write!(f, "SERIALIZATION"),
            Self::Io => write!(f, "IO"),
            Self::ExternalService => write!(f, "EXTERNAL_SERVICE"),
        }
    }
}

/// The unified application error used throughout corekit.
#[derive(Debug, Error)]
#[error("{kind}: {message}")]
pub struct AppError {
    /// The category of error.
    pub kind: ErrorKind,
    /// A human-readable error message.
    pub message: String,
    /// Optional underlying cause.
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl AppError {
    /// Create a new application error.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            source: None,
        }
    }

    /// Create a new application error with an underlying cause.
    pub fn with_source(
        kind: ErrorKind,
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            kind,
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a load error for a module that could not be located.
    pub fn load(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Load, message)
    }

    /// Create a cyclic dependency error naming the modules involved.
    pub fn cyclic_dependency<S: AsRef<str>>(ids: &[S]) -> Self {
        let chain: Vec<&str> = ids.iter().map(AsRef::as_ref).collect();
        Self::new(
            ErrorKind::CyclicDependency,
            format!("Cyclic dependency between modules: {}", chain.join(" -> ")),
        )
    }

    /// Create a registration timeout error.
    pub fn registration_timeout(module: &str, after: Duration) -> Self {
        Self::new(
            ErrorKind::RegistrationTimeout,
            format!(
                "Registering module \"{module}\" timed out after {}s",
                after.as_secs_f64()
            ),
        )
    }

    /// Create a registration failure wrapping the factory error.
    pub fn registration_failed(module: &str, cause: AppError) -> Self {
        Self::with_source(
            ErrorKind::RegistrationFailed,
            format!("Error registering module \"{module}\""),
            cause,
        )
    }

    /// Create a resolve timeout error.
    pub fn resolve_timeout(id: &str, after: Duration) -> Self {
        Self::new(
            ErrorKind::ResolveTimeout,
            format!(
                "Call to resolve(\"{id}\") timed out after {}s",
                after.as_secs_f64()
            ),
        )
    }

    /// Create an invalid identifier error.
    pub fn invalid_identifier(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidIdentifier, message)
    }

    /// Create a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Configuration, message)
    }

    /// Create a command error.
    pub fn command(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Command, message)
    }

    /// Create a module fault error.
    pub fn module(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Module, message)
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, message)
    }

    /// Create an external service error.
    pub fn external_service(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ExternalService, message)
    }

    /// Renders this error followed by every cause in its source chain.
    pub fn full_chain(&self) -> String {
        let mut out = self.to_string();
        let mut current = std::error::Error::source(self);
        while let Some(cause) = current {
            out.push_str("\n  caused by: ");
            out.push_str(&cause.to_string());
            current = cause.source();
        }
        out
    }
}

impl Clone for AppError {
    fn clone(&self) -> Self {
        Self {
            kind: self.kind,
            message: self.message.clone(),
            source: None,
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        Self::with_source(
            ErrorKind::Serialization,
            format!("JSON serialization error: {err}"),
            err,
        )
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        Self::with_source(ErrorKind::Io, format!("I/O error: {err}"), err)
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        Self::with_source(
            ErrorKind::Configuration,
            format!("Configuration error: {err}"),
            err,
        )
    }
}

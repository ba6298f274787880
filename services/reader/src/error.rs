//! services/reader/src/error.rs
//!
//! Defines the error types for the reader service.

use crate::config::ConfigError;
use novel_reader_core::ports::PortError;

/// The primary error type for the `reader` service.
#[derive(Debug, thiserror::Error)]
pub enum ReaderError {
    /// Represents an error that occurred during configuration loading.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Represents an error that propagated up from one of the core service ports.
    #[error("Service Port Error: {0}")]
    Port(#[from] PortError),

    /// Represents an error from the underlying HTTP client.
    #[error("HTTP Error: {0}")]
    Http(#[from] reqwest::Error),

    /// Represents a standard Input/Output error (e.g., reading the stored session).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A catch-all for any other unexpected errors.
    #[error("An unexpected internal error occurred: {0}")]
    Internal(String),
}

/// Errors returned by the session operations. The `Display` output is the
/// message shown inline on the auth and onboarding forms.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("No user found")]
    NoUser,

    #[error("Registration failed")]
    RegistrationFailed,

    #[error("Failed to upload profile picture: {0}")]
    Upload(PortError),

    /// Any backend failure, passed through with the backend's message.
    #[error("{0}")]
    Backend(#[from] PortError),
}

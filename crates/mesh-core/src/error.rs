//! Error types for the mesh control-plane core.

use thiserror::Error;

/// Errors surfaced by the core.
///
/// Lookup misses, admission rejections and malformed requests are ordinary
/// outcomes for a single call or message; none of them leaves the owning
/// component in a bad state.
#[derive(Debug, Error)]
pub enum MeshError {
    /// A lookup or enumeration found nothing.
    #[error("not found")]
    NotFound,

    /// The best route owner is the local node itself.
    #[error("no route")]
    NoRoute,

    /// The message is not scoped as mesh-management (TMF) traffic.
    #[error("not a TMF message")]
    NotTmf,

    /// A registration request is missing mandatory fields.
    #[error("malformed request: {0}")]
    MalformedRequest(String),

    /// The operation is not valid in the current state.
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// An argument is outside the accepted domain.
    #[error("invalid argument: {0}")]
    InvalidArgs(String),

    /// A bounded table or list has no room left.
    #[error("no buffers available")]
    NoBufs,

    /// The entry already exists.
    #[error("entry already exists")]
    Duplicated,

    /// The capability is not enabled in this node's configuration.
    #[error("{0} is not enabled")]
    Disabled(&'static str),

    /// Configuration validation error.
    #[error("invalid configuration for {field}: {message}")]
    Config {
        /// The field that failed validation.
        field: String,
        /// Error message.
        message: String,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("config decode error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl MeshError {
    /// Creates a configuration error.
    pub fn config(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Config {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Creates an invalid-state error.
    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::InvalidState(message.into())
    }

    /// Creates an invalid-argument error.
    pub fn invalid_args(message: impl Into<String>) -> Self {
        Self::InvalidArgs(message.into())
    }

    /// Creates a malformed-request error.
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedRequest(message.into())
    }
}

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, MeshError>;

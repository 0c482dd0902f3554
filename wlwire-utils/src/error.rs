//! Error types for wlwire
//!
//! Provides a unified error type used across all wlwire crates.
//!
//! Errors fall into four classes:
//! - transport (socket failure, peer hang-up): the connection is dead
//! - protocol (error event from the server): sticky, the connection is dead
//! - decode/framing ([`WireError`]): reported to the caller, not terminal
//! - local validation (bind checks, version requirements): recoverable

use std::path::PathBuf;

use wlwire_protocol::{ObjectId, WireError};

/// Main error type for wlwire operations
#[derive(Debug, thiserror::Error)]
pub enum WlwireError {
    // === IO Errors ===

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to read file {path}: {source}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    // === Connection Errors ===

    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Display socket not found at {path}")]
    DisplayNotFound { path: PathBuf },

    #[error("Connection closed")]
    ConnectionClosed,

    // === Protocol Errors ===

    #[error("Protocol error on object {object_id} (code {code}): {message}")]
    Protocol {
        object_id: ObjectId,
        code: u32,
        message: String,
    },

    #[error("Wire error: {0}")]
    Wire(#[from] WireError),

    // === Local Validation Errors ===

    #[error("Unknown global: {0}")]
    UnknownGlobal(u32),

    #[error("Global {name} is {actual}, not {expected}")]
    InterfaceMismatch {
        name: u32,
        expected: String,
        actual: String,
    },

    #[error("{interface} version {requested} requested, server advertises {advertised}")]
    UnsupportedVersion {
        interface: String,
        requested: u32,
        advertised: u32,
    },

    #[error("{interface} version {required} required, bound version is {actual}")]
    VersionTooLow {
        interface: String,
        required: u32,
        actual: u32,
    },

    #[error("Missing globals: {}", .0.join(", "))]
    MissingGlobals(Vec<String>),

    // === Configuration Errors ===

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid configuration at {path}: {message}")]
    ConfigInvalid { path: PathBuf, message: String },

    // === Internal Errors ===

    #[error("Internal error: {0}")]
    Internal(String),
}

impl WlwireError {
    /// Create a connection error
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::Connection(msg.into())
    }

    /// Create a config error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Check if the connection that produced this error is unusable
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Io(_) | Self::ConnectionClosed | Self::Protocol { .. }
        )
    }

    /// Check if this error was raised locally without touching the socket
    pub fn is_local(&self) -> bool {
        matches!(
            self,
            Self::UnknownGlobal(_)
                | Self::InterfaceMismatch { .. }
                | Self::UnsupportedVersion { .. }
                | Self::VersionTooLow { .. }
        )
    }
}

/// Result type alias using WlwireError
pub type Result<T> = std::result::Result<T, WlwireError>;

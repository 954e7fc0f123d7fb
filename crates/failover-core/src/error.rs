//! Error types for the failover system
//!
//! This module defines all error types used throughout the crate.

use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Result type alias for failover operations
pub type Result<T> = std::result::Result<T, Error>;

/// Which managed record a startup lookup was resolving
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordRole {
    /// The dynamic alias (CNAME) switched between the uplink targets
    Alias,
    /// The optional address-tracking A record
    AddressRecord,
}

impl fmt::Display for RecordRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordRole::Alias => f.write_str("dynamic alias"),
            RecordRole::AddressRecord => f.write_str("address record"),
        }
    }
}

/// Core error type for the failover system
#[derive(Error, Debug)]
pub enum Error {
    /// External address discovery failed
    #[error("Address resolution error: {0}")]
    Resolution(String),

    /// A managed record name could not be resolved to a record ID
    #[error("Could not resolve {role} {name} to a record ID: {message}")]
    RecordLookup {
        /// Which record was being resolved
        role: RecordRole,
        /// The record name
        name: String,
        /// Underlying cause
        message: String,
    },

    /// The record store rejected or failed a write
    #[error("Record write for {name} failed: {message}")]
    RecordWrite {
        /// The record name
        name: String,
        /// Underlying cause
        message: String,
    },

    /// Notification transport errors
    #[error("Notification error: {0}")]
    Notification(String),

    /// A collaborator call exceeded its time budget
    #[error("{operation} timed out after {after:?}")]
    Timeout {
        /// The operation that timed out
        operation: &'static str,
        /// The configured budget
        after: Duration,
    },

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// HTTP client errors (from collaborator APIs)
    #[error("HTTP error: {0}")]
    Http(String),

    /// Record not found
    #[error("Record not found: {0}")]
    NotFound(String),

    /// Provider-specific error
    #[error("Provider error ({provider}): {message}")]
    Provider {
        /// Provider name
        provider: String,
        /// Error message
        message: String,
    },

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create an address resolution error
    pub fn resolution(msg: impl Into<String>) -> Self {
        Self::Resolution(msg.into())
    }

    /// Create a startup record lookup error
    pub fn record_lookup(role: RecordRole, name: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::RecordLookup {
            role,
            name: name.into(),
            message: msg.into(),
        }
    }

    /// Create a record write error
    pub fn record_write(name: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::RecordWrite {
            name: name.into(),
            message: msg.into(),
        }
    }

    /// Create a notification error
    pub fn notification(msg: impl Into<String>) -> Self {
        Self::Notification(msg.into())
    }

    /// Create a timeout error
    pub fn timeout(operation: &'static str, after: Duration) -> Self {
        Self::Timeout { operation, after }
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an invalid input error
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Create an HTTP error
    pub fn http(msg: impl Into<String>) -> Self {
        Self::Http(msg.into())
    }

    /// Create a "not found" error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create a provider-specific error
    pub fn provider(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Provider {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// The record role of a startup lookup failure, if this is one
    pub fn lookup_role(&self) -> Option<RecordRole> {
        match self {
            Self::RecordLookup { role, .. } => Some(*role),
            _ => None,
        }
    }
}

impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(err.to_string())
    }
}

//! Error types and handling for pvloadctl
//!
//! One variant per subsystem, each carrying a human-readable message, so a
//! tick failure can be logged with context without every call site inventing
//! its own string formatting.

use thiserror::Error;

/// Result type alias for pvloadctl operations
pub type Result<T> = std::result::Result<T, LoadCtlError>;

/// Main error type for pvloadctl
#[derive(Debug, Error)]
pub enum LoadCtlError {
    /// Configuration-related errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Rejected operator input: unknown mode, out-of-range tunable, etc.
    #[error("Validation error: {field} - {message}")]
    Validation { field: String, message: String },

    /// Persistence (key-value store) read/write errors
    #[error("Persistence error: {message}")]
    Persistence { message: String },

    /// Station command transport errors
    #[error("Transport error: {message}")]
    Transport { message: String },

    /// HTTP/Web server errors
    #[error("Web server error: {message}")]
    Web { message: String },

    /// Serialization/deserialization errors
    #[error("Serialization error: {message}")]
    Serialization { message: String },

    /// File I/O errors
    #[error("I/O error: {message}")]
    Io { message: String },

    /// Generic errors with context
    #[error("Error: {message}")]
    Generic { message: String },
}

impl LoadCtlError {
    /// Create a new configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        LoadCtlError::Config {
            message: message.into(),
        }
    }

    /// Create a new validation error
    pub fn validation<F: Into<String>, M: Into<String>>(field: F, message: M) -> Self {
        LoadCtlError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create a new persistence error
    pub fn persistence<S: Into<String>>(message: S) -> Self {
        LoadCtlError::Persistence {
            message: message.into(),
        }
    }

    /// Create a new transport error
    pub fn transport<S: Into<String>>(message: S) -> Self {
        LoadCtlError::Transport {
            message: message.into(),
        }
    }

    /// Create a new web error
    pub fn web<S: Into<String>>(message: S) -> Self {
        LoadCtlError::Web {
            message: message.into(),
        }
    }

    /// Create a new I/O error
    pub fn io<S: Into<String>>(message: S) -> Self {
        LoadCtlError::Io {
            message: message.into(),
        }
    }

    /// Create a new generic error
    pub fn generic<S: Into<String>>(message: S) -> Self {
        LoadCtlError::Generic {
            message: message.into(),
        }
    }
}

impl From<std::io::Error> for LoadCtlError {
    fn from(err: std::io::Error) -> Self {
        LoadCtlError::io(err.to_string())
    }
}

impl From<serde_yaml::Error> for LoadCtlError {
    fn from(err: serde_yaml::Error) -> Self {
        LoadCtlError::Serialization {
            message: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for LoadCtlError {
    fn from(err: serde_json::Error) -> Self {
        LoadCtlError::Serialization {
            message: err.to_string(),
        }
    }
}

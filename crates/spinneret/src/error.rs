//! Error types for spinneret
//!
//! Provides the error classes the write pipeline distinguishes:
//! - Configuration errors (bad metadata, missing connection string) - fatal
//! - Unsupported logical types - fatal, surfaced at bind time
//! - Authentication failures - recoverable by connection-string rotation
//! - Connection and execution failures - fatal for the current operation

use std::fmt;
use thiserror::Error;

/// Result type for spinneret operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error categories for classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Invalid metadata or pipeline configuration (never retried)
    Configuration,
    /// Logical type outside the closed mapping (never retried)
    TypeMapping,
    /// Authentication failure (may be recovered by rotating the
    /// connection string)
    Authentication,
    /// Failure opening or closing a store connection
    Connection,
    /// Statement execution failure
    Execution,
}

impl ErrorCategory {
    /// Whether errors in this category are always fatal for the
    /// current operation
    #[inline]
    pub const fn is_fatal(self) -> bool {
        !matches!(self, Self::Authentication)
    }
}

/// Main error type for spinneret
#[derive(Error, Debug)]
#[allow(missing_docs)]
pub enum Error {
    /// Invalid metadata or pipeline configuration
    #[error("configuration error: {message}")]
    Configuration { message: String },

    /// Logical field type outside the closed mapping
    #[error("unsupported type: {type_name}")]
    UnsupportedType { type_name: String },

    /// Authentication against the store failed
    #[error("authentication failed: {message}")]
    Authentication { message: String },

    /// Opening or closing a connection failed
    #[error("connection error: {message}")]
    Connection {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Statement execution failed
    #[error("execution error: {message}")]
    Execution {
        message: String,
        sql: Option<String>,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl Error {
    /// Get the error category
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Configuration { .. } => ErrorCategory::Configuration,
            Self::UnsupportedType { .. } => ErrorCategory::TypeMapping,
            Self::Authentication { .. } => ErrorCategory::Authentication,
            Self::Connection { .. } => ErrorCategory::Connection,
            Self::Execution { .. } => ErrorCategory::Execution,
        }
    }

    /// Whether this error is always fatal for the current operation
    #[inline]
    pub fn is_fatal(&self) -> bool {
        self.category().is_fatal()
    }

    /// The raw message, without the variant prefix added by `Display`.
    ///
    /// Rotation classification (`ConnectionProvider::handle_write_failure`)
    /// matches on this value, so backends should pass store driver messages
    /// through unaltered.
    pub fn message(&self) -> &str {
        match self {
            Self::Configuration { message }
            | Self::Authentication { message }
            | Self::Connection { message, .. }
            | Self::Execution { message, .. } => message,
            Self::UnsupportedType { type_name } => type_name,
        }
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create an unsupported-type error naming the offending value
    pub fn unsupported_type(type_name: impl Into<String>) -> Self {
        Self::UnsupportedType {
            type_name: type_name.into(),
        }
    }

    /// Create an authentication error
    pub fn authentication(message: impl Into<String>) -> Self {
        Self::Authentication {
            message: message.into(),
        }
    }

    /// Create a connection error
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
            source: None,
        }
    }

    /// Create a connection error with source
    pub fn connection_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Connection {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create an execution error
    pub fn execution(message: impl Into<String>) -> Self {
        Self::Execution {
            message: message.into(),
            sql: None,
            source: None,
        }
    }

    /// Create an execution error with the statement that failed
    pub fn execution_with_sql(message: impl Into<String>, sql: impl Into<String>) -> Self {
        Self::Execution {
            message: message.into(),
            sql: Some(sql.into()),
            source: None,
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Configuration => write!(f, "configuration"),
            Self::TypeMapping => write!(f, "type_mapping"),
            Self::Authentication => write!(f, "authentication"),
            Self::Connection => write!(f, "connection"),
            Self::Execution => write!(f, "execution"),
        }
    }
}

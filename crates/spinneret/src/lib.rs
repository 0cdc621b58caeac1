//! # spinneret
//!
//! Metadata-driven relational write pipelines for scraped entities.
//!
//! An entity declares its shape once: fields with logical types, a primary
//! key, index and unique groups, and a table-naming policy. This crate
//! resolves that metadata into a write plan, provisions the target store,
//! and writes record batches through parameterized statements, rotating
//! connect strings when the store starts refusing credentials.
//!
//! ## Features
//!
//! - **Plan Resolution**: declared metadata validated once into frozen
//!   table names, column sets and key layout
//! - **SQL Dialect Abstraction**: MySQL and SQL Server statement and DDL
//!   generation behind one trait
//! - **Batch Writes**: one connection per attempt, per-record parameter
//!   binding in input order, whole-batch retry
//! - **Connect-String Rotation**: authentication failures pull a fresh
//!   connect string from a pluggable source with bounded retries
//! - **Operation Executors**: provisioning and writes dispatch under
//!   stable operation names, with an optional per-name circuit breaker
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use spinneret::prelude::*;
//!
//! let metadata = EntityMetadata::new(
//!     "repo",
//!     EntitySchema::new("repos").with_database("spider"),
//! )
//! .with_field("id", "STRING,64")
//! .with_field("title", "TEXT")
//! .with_field("starred", "BOOL")
//! .with_primary(["id"]);
//!
//! let pipeline = WritePipeline::new(
//!     &metadata,
//!     WriteMode::Insert,
//!     dialect_for("mysql")?,
//!     Arc::new(ConnectionProvider::fixed("mysql://root:pw@db01/spider")),
//!     Arc::new(DirectExecutor),
//! )?;
//!
//! pipeline.init().await?;
//! pipeline.process(&batch).await?;
//! ```
//!
//! ## Feature Flags
//!
//! - `mysql` - MySQL/MariaDB execution via mysql_async

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod connection;
pub mod dialect;
pub mod error;
pub mod executor;
pub mod metadata;
pub mod pipeline;
pub mod plan;
pub mod provider;
pub mod testing;
pub mod types;
pub mod writer;

// Backend implementations (conditionally compiled)
#[cfg(feature = "mysql")]
pub mod mysql;

/// Prelude module for convenient imports
pub mod prelude {
    // Error types
    pub use crate::error::{Error, ErrorCategory, Result};

    // Metadata and value types
    pub use crate::metadata::{EntityMetadata, EntitySchema, Field, TableSuffix, WriteMode};
    pub use crate::types::{ParamType, Parameter, Record, SensitiveString};

    // Plan resolution
    pub use crate::plan::WritePlan;

    // Dialect and connection seams
    pub use crate::connection::StoreConnection;
    pub use crate::dialect::{MySqlDialect, SqlDialect, SqlServerDialect, dialect_for};

    // Connect-string management
    pub use crate::provider::{
        ConnectStringSource, ConnectionProvider, RetryDecision, RotationPolicy,
    };

    // Execution
    pub use crate::executor::{
        CircuitBreakerConfig, CircuitBreakerExecutor, CircuitState, DirectExecutor, Operation,
        OperationExecutor,
    };
    pub use crate::writer::{AtomicWriterStats, BatchWriter, WriterStats};

    // Pipeline types
    pub use crate::pipeline::{
        OP_INIT, OP_WRITE, PipelineConfig, PipelineState, WritePipeline,
    };
}

// Re-export commonly used items at crate root
pub use error::{Error, Result};
pub use metadata::EntityMetadata;
pub use pipeline::WritePipeline;
pub use types::SensitiveString;

#[cfg(test)]
mod tests {
    use super::prelude::*;

    #[test]
    fn test_prelude_imports() {
        let _mode = WriteMode::Insert;
        let _policy = RotationPolicy::default();
        let _suffix = TableSuffix::FirstDayOfMonth;
        let _config = PipelineConfig::default();
        let _executor = DirectExecutor;
    }

    #[test]
    fn test_error_categories() {
        let err = Error::authentication("Authentication to host 'db01' failed");
        assert_eq!(err.category(), ErrorCategory::Authentication);
        assert!(!err.is_fatal());

        let err = Error::config("type must not be empty");
        assert!(err.is_fatal());
    }

    #[test]
    fn test_dialect_selection() {
        assert_eq!(dialect_for("mysql").unwrap().name(), "MySQL");
        assert_eq!(dialect_for("mariadb").unwrap().name(), "MySQL");
        assert_eq!(dialect_for("sqlserver").unwrap().name(), "SQL Server");
        assert!(dialect_for("oracle").is_err());
    }

    #[test]
    fn test_type_mapping() {
        assert_eq!(ParamType::from_logical("STRING,64").unwrap(), ParamType::String);
        assert_eq!(ParamType::from_logical("BOOL").unwrap(), ParamType::Boolean);
        assert!(ParamType::from_logical("bool").is_err());
    }
}

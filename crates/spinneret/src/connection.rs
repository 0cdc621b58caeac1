//! Store connection abstraction
//!
//! One [`StoreConnection`] serves exactly one batch attempt: the writer
//! opens it through the dialect, executes row-at-a-time, and closes it at
//! the end of the attempt whether the attempt succeeded or failed.

use async_trait::async_trait;

use crate::error::Result;
use crate::types::Parameter;

/// A live connection to a relational store.
///
/// Implementations take `&self` and manage interior mutability themselves,
/// so one connection value can be threaded through a batch loop without
/// borrow gymnastics. The bound set may be a superset of the parameters the
/// statement text references; binding is by name.
#[async_trait]
pub trait StoreConnection: Send + Sync {
    /// Execute one statement with the given parameters, returning the
    /// number of affected rows.
    async fn execute(&self, sql: &str, params: &[Parameter]) -> Result<u64>;

    /// Close the connection.
    ///
    /// Called at the end of every batch attempt. Closing an already-closed
    /// connection is a no-op.
    async fn close(&self) -> Result<()>;
}

//! Test doubles for exercising write pipelines without a live store
//!
//! Every mock records what it was asked to do and hands the log back to
//! the test. The mocks are cheap to clone and clones share state, so a
//! test can keep a handle while the pipeline owns another.

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::connection::StoreConnection;
use crate::dialect::SqlDialect;
use crate::error::{Error, Result};
use crate::executor::{Operation, OperationExecutor};
use crate::metadata::Field;
use crate::plan::WritePlan;
use crate::provider::ConnectStringSource;
use crate::types::Parameter;

// ============================================================================
// MockConnection
// ============================================================================

/// Connection that records every statement executed through it
#[derive(Clone, Debug, Default)]
pub struct MockConnection {
    executions: Arc<Mutex<Vec<(String, Vec<Parameter>)>>>,
    script: Arc<Mutex<VecDeque<Result<u64>>>>,
    close_count: Arc<AtomicUsize>,
}

impl MockConnection {
    /// Every `(sql, params)` pair executed on this connection, in order
    pub fn executions(&self) -> Vec<(String, Vec<Parameter>)> {
        self.executions.lock().clone()
    }

    /// Statement texts only, in execution order
    pub fn statements(&self) -> Vec<String> {
        self.executions.lock().iter().map(|(sql, _)| sql.clone()).collect()
    }

    /// Number of statements executed on this connection
    pub fn execution_count(&self) -> usize {
        self.executions.lock().len()
    }

    /// Number of times `close` was called
    pub fn close_count(&self) -> usize {
        self.close_count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StoreConnection for MockConnection {
    async fn execute(&self, sql: &str, params: &[Parameter]) -> Result<u64> {
        self.executions.lock().push((sql.to_string(), params.to_vec()));
        match self.script.lock().pop_front() {
            Some(result) => result,
            None => Ok(1),
        }
    }

    async fn close(&self) -> Result<()> {
        self.close_count.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

// ============================================================================
// MockDialect
// ============================================================================

/// Dialect with identity quoting that hands out [`MockConnection`]s
///
/// Connect strings listed via [`with_rejected_host`](Self::with_rejected_host)
/// fail at open time with an authentication error, which is what drives
/// connect-string rotation in provider tests. Results queued with
/// [`with_execute_result`](Self::with_execute_result) are consumed one per
/// `execute` call across all connections; once the queue is empty every
/// statement reports one affected row.
#[derive(Clone, Debug, Default)]
pub struct MockDialect {
    opened: Arc<Mutex<Vec<String>>>,
    connections: Arc<Mutex<Vec<MockConnection>>>,
    rejected_hosts: Arc<Mutex<HashSet<String>>>,
    script: Arc<Mutex<VecDeque<Result<u64>>>>,
}

impl MockDialect {
    /// Create a dialect that accepts every connect string
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject `host` at open time with an authentication failure
    pub fn with_rejected_host(self, host: impl Into<String>) -> Self {
        self.rejected_hosts.lock().insert(host.into());
        self
    }

    /// Queue the outcome of the next unscripted `execute` call
    pub fn with_execute_result(self, result: Result<u64>) -> Self {
        self.script.lock().push_back(result);
        self
    }

    /// Connect strings passed to `open_connection`, in order
    pub fn opened(&self) -> Vec<String> {
        self.opened.lock().clone()
    }

    /// Handles to every connection handed out so far
    pub fn connections(&self) -> Vec<MockConnection> {
        self.connections.lock().clone()
    }

    /// Number of connections handed out so far
    pub fn connection_count(&self) -> usize {
        self.connections.lock().len()
    }
}

#[async_trait]
impl SqlDialect for MockDialect {
    fn name(&self) -> &'static str {
        "mock"
    }

    fn quote_identifier(&self, name: &str) -> String {
        name.to_string()
    }

    fn native_type(&self, column: &Field) -> Result<String> {
        Ok(column.logical_type.clone())
    }

    fn create_schema_sql(&self, plan: &WritePlan) -> Option<String> {
        plan.database
            .as_ref()
            .map(|database| format!("CREATE SCHEMA {database}"))
    }

    fn create_table_sql(&self, plan: &WritePlan) -> Result<String> {
        Ok(format!("CREATE TABLE {}", plan.table))
    }

    async fn open_connection(&self, connect_string: &str) -> Result<Box<dyn StoreConnection>> {
        self.opened.lock().push(connect_string.to_string());
        if self.rejected_hosts.lock().contains(connect_string) {
            return Err(Error::authentication(format!(
                "Authentication to host '{connect_string}' failed: access denied"
            )));
        }
        let connection = MockConnection {
            executions: Arc::new(Mutex::new(Vec::new())),
            script: Arc::clone(&self.script),
            close_count: Arc::new(AtomicUsize::new(0)),
        };
        self.connections.lock().push(connection.clone());
        Ok(Box::new(connection))
    }
}

// ============================================================================
// MockConnectStringSource
// ============================================================================

/// Source that serves connect strings from a queue
///
/// Once the queue runs dry the last served value repeats, so a provider
/// retrying against a stable secret store sees a stable answer. A source
/// built with [`always_empty`](Self::always_empty) serves empty strings
/// forever.
pub struct MockConnectStringSource {
    values: Mutex<VecDeque<String>>,
    last: Mutex<Option<String>>,
    fetches: AtomicUsize,
}

impl MockConnectStringSource {
    /// Create a source serving `values` in order
    pub fn new<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            values: Mutex::new(values.into_iter().map(Into::into).collect()),
            last: Mutex::new(None),
            fetches: AtomicUsize::new(0),
        }
    }

    /// Create a source that never has a connect string to offer
    pub fn always_empty() -> Self {
        Self::new(Vec::<String>::new())
    }

    /// Number of times `get_new` was called
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ConnectStringSource for MockConnectStringSource {
    async fn get_new(&self) -> Result<String> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if let Some(value) = self.values.lock().pop_front() {
            *self.last.lock() = Some(value.clone());
            return Ok(value);
        }
        Ok(self.last.lock().clone().unwrap_or_default())
    }
}

// ============================================================================
// RecordingExecutor
// ============================================================================

/// Executor that records operation names and runs the work unchanged
#[derive(Clone, Default)]
pub struct RecordingExecutor {
    operations: Arc<Mutex<Vec<String>>>,
}

impl RecordingExecutor {
    /// Create a recording executor
    pub fn new() -> Self {
        Self::default()
    }

    /// Operation names in dispatch order
    pub fn operations(&self) -> Vec<String> {
        self.operations.lock().clone()
    }
}

#[async_trait]
impl OperationExecutor for RecordingExecutor {
    async fn execute<'a>(&self, name: &str, work: Operation<'a>) -> Result<()> {
        self.operations.lock().push(name.to_string());
        work.await
    }
}

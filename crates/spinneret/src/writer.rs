//! Batch writer
//!
//! [`BatchWriter`] turns a resolved [`WritePlan`] into executed statements.
//! Statement text is rendered once at construction; each batch then opens a
//! fresh connection, binds and executes the statement once per record in
//! input order, and closes the connection whether the batch succeeded or
//! not.
//!
//! A batch is retried as a whole. After any failure the writer asks the
//! [`ConnectionProvider`] whether a fresh connect string makes a retry
//! worthwhile; when it does, every record of the batch is written again on
//! a new connection. Statements are not transactional across records, so
//! delivery is at-least-once and re-delivered rows rely on key constraints
//! downstream.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{debug, warn};

use crate::dialect::SqlDialect;
use crate::error::Result;
use crate::metadata::Field;
use crate::plan::WritePlan;
use crate::provider::{ConnectionProvider, RetryDecision};
use crate::types::{ParamType, Parameter, Record};

/// Writer statistics
#[derive(Debug, Clone, Default, Serialize)]
pub struct WriterStats {
    /// Total records written
    pub records_written: u64,
    /// Total batches written
    pub batches_written: u64,
    /// Total batches abandoned after retries
    pub batches_failed: u64,
    /// Total retry attempts across all batches
    pub retries: u64,
    /// Total write duration (milliseconds)
    pub total_write_time_ms: u64,
    /// Average records per second
    pub records_per_second: f64,
}

/// Atomic writer statistics
#[derive(Debug, Default)]
#[allow(missing_docs)]
pub struct AtomicWriterStats {
    pub records_written: AtomicU64,
    pub batches_written: AtomicU64,
    pub batches_failed: AtomicU64,
    pub retries: AtomicU64,
    pub total_write_time_ms: AtomicU64,
}

impl AtomicWriterStats {
    /// Record a successful batch
    pub fn record_batch(&self, records: u64, duration: Duration) {
        self.records_written.fetch_add(records, Ordering::Relaxed);
        self.batches_written.fetch_add(1, Ordering::Relaxed);
        self.total_write_time_ms
            .fetch_add(duration.as_millis() as u64, Ordering::Relaxed);
    }

    /// Record a retry of a whole batch
    pub fn record_retry(&self) {
        self.retries.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a batch abandoned after its last attempt
    pub fn record_batch_failure(&self) {
        self.batches_failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Get a snapshot
    pub fn snapshot(&self) -> WriterStats {
        let records = self.records_written.load(Ordering::Relaxed);
        let time_ms = self.total_write_time_ms.load(Ordering::Relaxed);
        let rps = if time_ms > 0 {
            (records as f64 * 1000.0) / time_ms as f64
        } else {
            0.0
        };

        WriterStats {
            records_written: records,
            batches_written: self.batches_written.load(Ordering::Relaxed),
            batches_failed: self.batches_failed.load(Ordering::Relaxed),
            retries: self.retries.load(Ordering::Relaxed),
            total_write_time_ms: time_ms,
            records_per_second: rps,
        }
    }
}

/// Executes insert and update batches for one resolved plan
pub struct BatchWriter {
    dialect: Arc<dyn SqlDialect>,
    provider: Arc<ConnectionProvider>,
    plan: Arc<WritePlan>,
    insert_sql: String,
    update_sql: Option<String>,
    stats: AtomicWriterStats,
}

impl BatchWriter {
    /// Create a writer for `plan`, rendering its statements up front
    pub fn new(
        dialect: Arc<dyn SqlDialect>,
        provider: Arc<ConnectionProvider>,
        plan: Arc<WritePlan>,
    ) -> Self {
        let insert_sql = dialect.insert_sql(&plan);
        let update_sql = if plan.update_columns.is_empty() {
            None
        } else {
            Some(dialect.update_sql(&plan))
        };

        Self {
            dialect,
            provider,
            plan,
            insert_sql,
            update_sql,
            stats: AtomicWriterStats::default(),
        }
    }

    /// The plan this writer executes
    pub fn plan(&self) -> &WritePlan {
        &self.plan
    }

    /// Rendered insert statement
    pub fn insert_sql(&self) -> &str {
        &self.insert_sql
    }

    /// Rendered update statement, present only for update-mode plans
    pub fn update_sql(&self) -> Option<&str> {
        self.update_sql.as_deref()
    }

    /// Get a statistics snapshot
    pub fn stats(&self) -> WriterStats {
        self.stats.snapshot()
    }

    /// Insert `records` in order, binding every plan column per record
    pub async fn write_insert(&self, records: &[Record]) -> Result<u64> {
        let columns: Vec<&Field> = self.plan.columns.iter().collect();
        self.write_batch(&self.insert_sql, &columns, records).await
    }

    /// Update `records` in order, binding update columns then key columns
    pub async fn write_update(&self, records: &[Record]) -> Result<u64> {
        let sql = self.update_sql.as_deref().ok_or_else(|| {
            crate::error::Error::config(format!(
                "entity '{}' was not resolved for updates",
                self.plan.entity
            ))
        })?;
        let columns: Vec<&Field> = self
            .plan
            .update_columns
            .iter()
            .chain(self.plan.primary.iter())
            .collect();
        self.write_batch(sql, &columns, records).await
    }

    async fn write_batch(&self, sql: &str, columns: &[&Field], records: &[Record]) -> Result<u64> {
        if records.is_empty() {
            return Ok(0);
        }

        let start = Instant::now();
        let mut retries: u32 = 0;
        loop {
            match self.attempt(sql, columns, records).await {
                Ok(written) => {
                    self.stats.record_batch(written, start.elapsed());
                    debug!(
                        table = %self.plan.table,
                        records = written,
                        retries,
                        "batch committed"
                    );
                    return Ok(written);
                }
                Err(error) => {
                    retries += 1;
                    match self.provider.handle_write_failure(&error, retries).await {
                        RetryDecision::Retry => {
                            self.stats.record_retry();
                            warn!(
                                table = %self.plan.table,
                                error = %error,
                                retries,
                                "batch failed, retrying with fresh connect string"
                            );
                        }
                        RetryDecision::Propagate => {
                            self.stats.record_batch_failure();
                            return Err(error);
                        }
                    }
                }
            }
        }
    }

    /// One full pass over the batch on one connection
    async fn attempt(&self, sql: &str, columns: &[&Field], records: &[Record]) -> Result<u64> {
        let connect_string = self.provider.current()?;
        let connection = self
            .dialect
            .open_connection(connect_string.expose_secret())
            .await?;

        let result = async {
            let mut written = 0u64;
            for record in records {
                let params = bind(columns, record)?;
                connection.execute(sql, &params).await?;
                written += 1;
            }
            Ok(written)
        }
        .await;

        // the connection is per attempt, close it on both paths
        if let Err(close_error) = connection.close().await {
            debug!(error = %close_error, "error closing connection after batch");
        }
        result
    }
}

/// Build the parameter list for one record
fn bind(columns: &[&Field], record: &Record) -> Result<Vec<Parameter>> {
    columns
        .iter()
        .map(|column| {
            Ok(Parameter::new(
                column.name.clone(),
                record.get(&column.name),
                ParamType::from_logical(&column.logical_type)?,
            ))
        })
        .collect()
}

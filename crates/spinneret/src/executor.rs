//! Named-operation execution
//!
//! DDL and batch writes run through an injected [`OperationExecutor`] under
//! a stable operation name (`db-init`, `db-write`), so a host can wrap them
//! with its own resilience policy without this crate growing an ambient
//! global. [`DirectExecutor`] runs work unchanged; [`CircuitBreakerExecutor`]
//! keeps one circuit per operation name and fails fast while a name's
//! circuit is open.
//!
//! # States
//!
//! - **Closed**: normal operation, work passes through
//! - **Open**: the circuit is tripped, work is rejected immediately
//! - **Half-Open**: probing whether the store has recovered

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use futures::future::BoxFuture;
use parking_lot::RwLock;
use tracing::warn;

use crate::error::{Error, Result};

/// Unit of work passed to an executor
pub type Operation<'a> = BoxFuture<'a, Result<()>>;

/// Wraps DDL and batch-write calls under a stable operation name.
#[async_trait]
pub trait OperationExecutor: Send + Sync {
    /// Run `work` under `name`
    async fn execute<'a>(&self, name: &str, work: Operation<'a>) -> Result<()>;
}

/// Executor that runs work unchanged
#[derive(Debug, Clone, Copy, Default)]
pub struct DirectExecutor;

#[async_trait]
impl OperationExecutor for DirectExecutor {
    async fn execute<'a>(&self, _name: &str, work: Operation<'a>) -> Result<()> {
        work.await
    }
}

/// Circuit states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CircuitState {
    /// Normal operation - work passes through
    Closed = 0,
    /// Circuit is open - work is rejected immediately
    Open = 1,
    /// Probing whether the store has recovered
    HalfOpen = 2,
}

impl From<u8> for CircuitState {
    fn from(value: u8) -> Self {
        match value {
            1 => Self::Open,
            2 => Self::HalfOpen,
            _ => Self::Closed,
        }
    }
}

/// Configuration shared by all per-operation circuits
#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures before the circuit opens
    pub failure_threshold: u64,
    /// Time an open circuit waits before allowing a probe
    pub reset_timeout: Duration,
    /// Successful probes required to close a half-open circuit
    pub success_threshold: u64,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            reset_timeout: Duration::from_secs(30),
            success_threshold: 3,
        }
    }
}

/// One circuit, tracked per operation name
struct Circuit {
    state: AtomicU8,
    failures: AtomicU64,
    successes: AtomicU64,
    last_state_change: RwLock<Instant>,
}

impl Circuit {
    fn new() -> Self {
        Self {
            state: AtomicU8::new(CircuitState::Closed as u8),
            failures: AtomicU64::new(0),
            successes: AtomicU64::new(0),
            last_state_change: RwLock::new(Instant::now()),
        }
    }

    fn state(&self) -> CircuitState {
        self.state.load(Ordering::SeqCst).into()
    }

    fn is_allowed(&self, config: &CircuitBreakerConfig) -> bool {
        match self.state() {
            CircuitState::Closed | CircuitState::HalfOpen => true,
            CircuitState::Open => {
                let last_change = *self.last_state_change.read();
                if last_change.elapsed() >= config.reset_timeout {
                    self.transition_to(CircuitState::HalfOpen);
                    true
                } else {
                    false
                }
            }
        }
    }

    fn record_success(&self, config: &CircuitBreakerConfig) {
        match self.state() {
            CircuitState::Closed => {
                self.failures.store(0, Ordering::SeqCst);
            }
            CircuitState::HalfOpen => {
                let count = self.successes.fetch_add(1, Ordering::SeqCst) + 1;
                if count >= config.success_threshold {
                    self.transition_to(CircuitState::Closed);
                }
            }
            CircuitState::Open => {}
        }
    }

    fn record_failure(&self, config: &CircuitBreakerConfig) {
        match self.state() {
            CircuitState::Closed => {
                let count = self.failures.fetch_add(1, Ordering::SeqCst) + 1;
                if count >= config.failure_threshold {
                    self.transition_to(CircuitState::Open);
                }
            }
            // any failure while probing reopens the circuit
            CircuitState::HalfOpen => self.transition_to(CircuitState::Open),
            CircuitState::Open => {}
        }
    }

    fn transition_to(&self, new_state: CircuitState) {
        let old_state = self.state.swap(new_state as u8, Ordering::SeqCst);
        if old_state != new_state as u8 {
            *self.last_state_change.write() = Instant::now();
            self.failures.store(0, Ordering::SeqCst);
            self.successes.store(0, Ordering::SeqCst);
        }
    }
}

/// Executor keeping one circuit per operation name
pub struct CircuitBreakerExecutor {
    config: CircuitBreakerConfig,
    circuits: RwLock<HashMap<String, Arc<Circuit>>>,
}

impl Default for CircuitBreakerExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl CircuitBreakerExecutor {
    /// Create an executor with default circuit configuration
    pub fn new() -> Self {
        Self::with_config(CircuitBreakerConfig::default())
    }

    /// Create an executor with custom circuit configuration
    pub fn with_config(config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            circuits: RwLock::new(HashMap::new()),
        }
    }

    /// Current state of the circuit for `name`, if work ran under it
    pub fn state(&self, name: &str) -> Option<CircuitState> {
        self.circuits.read().get(name).map(|c| c.state())
    }

    fn circuit_for(&self, name: &str) -> Arc<Circuit> {
        if let Some(circuit) = self.circuits.read().get(name) {
            return Arc::clone(circuit);
        }
        Arc::clone(
            self.circuits
                .write()
                .entry(name.to_string())
                .or_insert_with(|| Arc::new(Circuit::new())),
        )
    }
}

#[async_trait]
impl OperationExecutor for CircuitBreakerExecutor {
    async fn execute<'a>(&self, name: &str, work: Operation<'a>) -> Result<()> {
        let circuit = self.circuit_for(name);
        if !circuit.is_allowed(&self.config) {
            return Err(Error::execution(format!(
                "operation '{name}' rejected: circuit open"
            )));
        }
        match work.await {
            Ok(()) => {
                circuit.record_success(&self.config);
                Ok(())
            }
            Err(error) => {
                circuit.record_failure(&self.config);
                warn!(operation = name, error = %error, "operation failed");
                Err(error)
            }
        }
    }
}

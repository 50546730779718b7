//! Connection Manager
//!
//! Owns the single shared database pool for the process. The pool is built
//! lazily by [`ConnectionManager::acquire_pool`] with a bounded number of
//! attempts separated by a fixed delay. Once built, a background keep-alive
//! task probes it on a fixed interval.
//!
//! Lifecycle:
//!
//! ```text
//! Uninitialized -> Connecting -> Connected
//!                       |            |
//!                       v            v (health check fails)
//!                     Failed     Connecting -> ...
//! ```
//!
//! `Failed` is terminal: once every attempt has been spent, later calls
//! return the stored error without touching the database again.
//!
//! The manager is generic over [`PoolBackend`] so the retry and recovery
//! logic can be driven by a scripted backend (see
//! `tests/connection_manager_tests.rs`).

use async_trait::async_trait;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::constants::{
    CONNECTION_RETRY_DELAY, DEFAULT_KEEPALIVE_INTERVAL, DEFAULT_MAX_CONNECTION_RETRIES,
    MIN_KEEPALIVE_INTERVAL,
};

// ============================================================================
// ERRORS AND STATE
// ============================================================================

/// Errors raised while building or probing the shared pool.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConnectionError {
    #[error("Failed to open database pool: {reason}")]
    Open { reason: String },

    #[error("Database probe failed: {reason}")]
    Probe { reason: String },

    #[error("Database connection failed after {attempts} attempts: {last_error}")]
    Exhausted { attempts: u32, last_error: String },
}

impl ConnectionError {
    pub fn open(reason: impl Into<String>) -> Self {
        Self::Open {
            reason: reason.into(),
        }
    }

    pub fn probe(reason: impl Into<String>) -> Self {
        Self::Probe {
            reason: reason.into(),
        }
    }
}

/// Observable lifecycle of the shared pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionPhase {
    Uninitialized,
    Connecting,
    Connected,
    Failed,
}

/// Retry and keep-alive behaviour.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total pool-open attempts, including the first. Values below 1 act as 1.
    pub max_attempts: u32,
    /// Fixed wait between attempts.
    pub retry_delay: Duration,
    /// Period of the keep-alive probe. Raised to `MIN_KEEPALIVE_INTERVAL`
    /// when shorter.
    pub keepalive_interval: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_CONNECTION_RETRIES,
            retry_delay: CONNECTION_RETRY_DELAY,
            keepalive_interval: DEFAULT_KEEPALIVE_INTERVAL,
        }
    }
}

impl RetryPolicy {
    fn attempts_allowed(&self) -> u32 {
        self.max_attempts.max(1)
    }

    /// Period the keep-alive task actually runs at.
    pub fn keepalive_period(&self) -> Duration {
        self.keepalive_interval.max(MIN_KEEPALIVE_INTERVAL)
    }
}

// ============================================================================
// SEAMS
// ============================================================================

/// Something that can build a connection pool and check it is alive.
#[async_trait]
pub trait PoolBackend: Send + Sync + 'static {
    /// Handle to a built pool. Clones share the same underlying pool.
    type Pool: Clone + Send + Sync + 'static;

    /// Build a new pool and verify it can reach the database.
    async fn open(&self) -> Result<Self::Pool, ConnectionError>;

    /// Run a trivial query through the pool.
    async fn probe(&self, pool: &Self::Pool) -> Result<(), ConnectionError>;

    /// Drop connections that have been idle too long. Runs after each
    /// keep-alive probe.
    fn evict_idle(&self, _pool: &Self::Pool) {}
}

/// Waits between connection attempts.
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// Sleeper backed by the tokio timer.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

// ============================================================================
// MANAGER
// ============================================================================

/// Aborts the keep-alive task when the pool it watches is dropped.
struct KeepAlive(JoinHandle<()>);

impl Drop for KeepAlive {
    fn drop(&mut self) {
        self.0.abort();
    }
}

struct LivePool<P> {
    pool: P,
    generation: u64,
    _keepalive: KeepAlive,
}

struct Slot<P> {
    live: Option<LivePool<P>>,
    generation: u64,
    failure: Option<ConnectionError>,
}

/// Process-wide owner of the database pool.
pub struct ConnectionManager<B: PoolBackend> {
    backend: Arc<B>,
    sleeper: Arc<dyn Sleeper>,
    policy: RetryPolicy,
    slot: Mutex<Slot<B::Pool>>,
    phase: watch::Sender<ConnectionPhase>,
    attempts: AtomicU32,
}

impl<B: PoolBackend> ConnectionManager<B> {
    pub fn new(backend: B, policy: RetryPolicy) -> Self {
        Self::with_sleeper(backend, policy, Arc::new(TokioSleeper))
    }

    pub fn with_sleeper(backend: B, policy: RetryPolicy, sleeper: Arc<dyn Sleeper>) -> Self {
        Self {
            backend: Arc::new(backend),
            sleeper,
            policy,
            slot: Mutex::new(Slot {
                live: None,
                generation: 0,
                failure: None,
            }),
            phase: watch::Sender::new(ConnectionPhase::Uninitialized),
            attempts: AtomicU32::new(0),
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Current lifecycle phase.
    pub fn phase(&self) -> ConnectionPhase {
        *self.phase.borrow()
    }

    /// Watch lifecycle transitions.
    pub fn subscribe(&self) -> watch::Receiver<ConnectionPhase> {
        self.phase.subscribe()
    }

    /// Failed attempts since the last successful build.
    pub fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }

    /// Return the shared pool, building it first if needed.
    ///
    /// Concurrent callers during a build wait for the same outcome; at most
    /// one build runs at a time.
    pub async fn acquire_pool(&self) -> Result<B::Pool, ConnectionError> {
        self.acquire_live().await.map(|(pool, _)| pool)
    }

    /// Return a pool that just answered a probe.
    ///
    /// If the probe fails the current pool is discarded and a fresh one is
    /// built through [`Self::acquire_pool`].
    pub async fn get_healthy_connection(&self) -> Result<B::Pool, ConnectionError> {
        let (pool, generation) = self.acquire_live().await?;

        match self.backend.probe(&pool).await {
            Ok(()) => Ok(pool),
            Err(e) => {
                warn!(error = %e, generation, "Database health check failed, reconnecting");
                self.invalidate(generation).await;
                self.acquire_pool().await
            }
        }
    }

    /// Drop the pool and stop the keep-alive task.
    ///
    /// A later `acquire_pool` builds a fresh pool. A terminal failure is kept.
    pub async fn shutdown(&self) {
        let mut slot = self.slot.lock().await;
        if slot.live.take().is_some() {
            info!("Database pool closed");
            self.set_phase(ConnectionPhase::Uninitialized);
        }
    }

    async fn acquire_live(&self) -> Result<(B::Pool, u64), ConnectionError> {
        let mut slot = self.slot.lock().await;

        if let Some(live) = &slot.live {
            return Ok((live.pool.clone(), live.generation));
        }
        if let Some(failure) = &slot.failure {
            return Err(failure.clone());
        }

        self.build(&mut slot).await
    }

    async fn build(&self, slot: &mut Slot<B::Pool>) -> Result<(B::Pool, u64), ConnectionError> {
        let max_attempts = self.policy.attempts_allowed();
        self.set_phase(ConnectionPhase::Connecting);

        loop {
            match self.backend.open().await {
                Ok(pool) => {
                    self.attempts.store(0, Ordering::SeqCst);
                    slot.generation += 1;
                    let generation = slot.generation;
                    let keepalive = self.spawn_keepalive(pool.clone(), generation);
                    slot.live = Some(LivePool {
                        pool: pool.clone(),
                        generation,
                        _keepalive: keepalive,
                    });
                    self.set_phase(ConnectionPhase::Connected);
                    info!(generation, "Database pool connected");
                    return Ok((pool, generation));
                }
                Err(e) => {
                    let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
                    error!(attempt, max_attempts, error = %e, "Database connection attempt failed");

                    if attempt >= max_attempts {
                        let failure = ConnectionError::Exhausted {
                            attempts: attempt,
                            last_error: e.to_string(),
                        };
                        slot.failure = Some(failure.clone());
                        self.set_phase(ConnectionPhase::Failed);
                        return Err(failure);
                    }

                    debug!(delay = ?self.policy.retry_delay, "Retrying database connection");
                    self.sleeper.sleep(self.policy.retry_delay).await;
                }
            }
        }
    }

    /// Discard the live pool if it is still the one that failed its probe.
    async fn invalidate(&self, generation: u64) {
        let mut slot = self.slot.lock().await;
        let current = slot.live.as_ref().map(|live| live.generation);
        if current == Some(generation) {
            slot.live = None;
            self.set_phase(ConnectionPhase::Connecting);
        }
    }

    fn spawn_keepalive(&self, pool: B::Pool, generation: u64) -> KeepAlive {
        let backend = Arc::clone(&self.backend);
        let period = self.policy.keepalive_period();

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;
                match backend.probe(&pool).await {
                    Ok(()) => debug!(generation, "Database keep-alive succeeded"),
                    Err(e) => warn!(generation, error = %e, "Database keep-alive failed"),
                }
                backend.evict_idle(&pool);
            }
        });

        KeepAlive(handle)
    }

    fn set_phase(&self, phase: ConnectionPhase) {
        self.phase.send_replace(phase);
    }
}

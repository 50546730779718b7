//! Shared fakes for integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use henry_api::{ConnectionError, PoolBackend, Sleeper};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Pool handle handed out by [`FakeBackend`]: the number of the open call
/// that produced it.
pub type FakePool = Arc<usize>;

/// Backend with scripted open and probe outcomes.
///
/// Opens succeed unless a failure has been queued; `always_failing` makes
/// every open fail.
#[derive(Default)]
pub struct FakeBackend {
    open_script: Mutex<VecDeque<bool>>,
    always_fail: bool,
    failing_probes: AtomicUsize,
    pub open_calls: AtomicUsize,
    pub probe_calls: AtomicUsize,
    pub evictions: AtomicUsize,
}

impl FakeBackend {
    pub fn healthy() -> Self {
        Self::default()
    }

    pub fn always_failing() -> Self {
        Self {
            always_fail: true,
            ..Self::default()
        }
    }

    /// Queue open outcomes; `false` fails that attempt.
    pub fn scripted(outcomes: &[bool]) -> Self {
        let backend = Self::default();
        if let Ok(mut script) = backend.open_script.lock() {
            script.extend(outcomes.iter().copied());
        }
        backend
    }

    pub fn fail_next_probes(&self, n: usize) {
        self.failing_probes.store(n, Ordering::SeqCst);
    }

    pub fn opens(&self) -> usize {
        self.open_calls.load(Ordering::SeqCst)
    }

    pub fn probes(&self) -> usize {
        self.probe_calls.load(Ordering::SeqCst)
    }

    /// Idle-eviction passes run by the keep-alive task.
    pub fn evicted(&self) -> usize {
        self.evictions.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PoolBackend for FakeBackend {
    type Pool = FakePool;

    async fn open(&self) -> Result<Self::Pool, ConnectionError> {
        let n = self.open_calls.fetch_add(1, Ordering::SeqCst) + 1;
        let scripted = self.open_script.lock().ok().and_then(|mut s| s.pop_front());
        let ok = !self.always_fail && scripted.unwrap_or(true);
        if ok {
            Ok(Arc::new(n))
        } else {
            Err(ConnectionError::open(format!("connection refused ({})", n)))
        }
    }

    async fn probe(&self, _pool: &Self::Pool) -> Result<(), ConnectionError> {
        self.probe_calls.fetch_add(1, Ordering::SeqCst);
        let failing = self
            .failing_probes
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            Err(ConnectionError::probe("server closed the connection"))
        } else {
            Ok(())
        }
    }

    fn evict_idle(&self, _pool: &Self::Pool) {
        self.evictions.fetch_add(1, Ordering::SeqCst);
    }
}

/// Sleeper that records requested delays and returns immediately.
#[derive(Default)]
pub struct RecordingSleeper {
    delays: Mutex<Vec<Duration>>,
}

impl RecordingSleeper {
    pub fn delays(&self) -> Vec<Duration> {
        self.delays.lock().map(|d| d.clone()).unwrap_or_default()
    }

    pub fn total(&self) -> Duration {
        self.delays().into_iter().sum()
    }
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        if let Ok(mut delays) = self.delays.lock() {
            delays.push(duration);
        }
    }
}

//! Runtime-wide counters.
//!
//! All counters are `AtomicU64` behind `Arc`, so the storage can be cloned into
//! resume handlers running on backend threads without any locking.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Lock-free counter storage shared by the orchestrator and dispatcher.
#[derive(Clone, Debug, Default)]
pub struct RuntimeMetricsStorage {
    pub(crate) volumes_allocated: Arc<AtomicU64>,
    pub(crate) volumes_created: Arc<AtomicU64>,
    pub(crate) volumes_failed: Arc<AtomicU64>,
    pub(crate) volumes_destroyed: Arc<AtomicU64>,
    pub(crate) templates_staged: Arc<AtomicU64>,
    pub(crate) template_staging_failed: Arc<AtomicU64>,
    pub(crate) calls_issued: Arc<AtomicU64>,
    pub(crate) calls_in_flight: Arc<AtomicU64>,
}

impl RuntimeMetricsStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn call_issued(&self) {
        self.calls_issued.fetch_add(1, Ordering::Relaxed);
        self.calls_in_flight.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn call_resumed(&self) {
        self.calls_in_flight.fetch_sub(1, Ordering::Relaxed);
    }
}

/// Point-in-time view over [`RuntimeMetricsStorage`].
///
/// Counters are monotonic except `calls_in_flight`. Delta calculation is the
/// caller's responsibility.
#[derive(Clone, Debug)]
pub struct RuntimeMetrics {
    storage: RuntimeMetricsStorage,
}

impl RuntimeMetrics {
    pub fn new(storage: RuntimeMetricsStorage) -> Self {
        Self { storage }
    }

    pub fn volumes_allocated_total(&self) -> u64 {
        self.storage.volumes_allocated.load(Ordering::Relaxed)
    }

    pub fn volumes_created_total(&self) -> u64 {
        self.storage.volumes_created.load(Ordering::Relaxed)
    }

    pub fn volumes_failed_total(&self) -> u64 {
        self.storage.volumes_failed.load(Ordering::Relaxed)
    }

    pub fn volumes_destroyed_total(&self) -> u64 {
        self.storage.volumes_destroyed.load(Ordering::Relaxed)
    }

    pub fn templates_staged_total(&self) -> u64 {
        self.storage.templates_staged.load(Ordering::Relaxed)
    }

    pub fn template_staging_failed_total(&self) -> u64 {
        self.storage.template_staging_failed.load(Ordering::Relaxed)
    }

    pub fn calls_issued_total(&self) -> u64 {
        self.storage.calls_issued.load(Ordering::Relaxed)
    }

    /// Backend calls issued whose completion has not been delivered yet.
    pub fn calls_in_flight(&self) -> u64 {
        self.storage.calls_in_flight.load(Ordering::Relaxed)
    }
}

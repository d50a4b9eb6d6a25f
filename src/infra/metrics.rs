//! Lock-free run counters and end-of-run reporting
//!
//! NOTE: All atomics use Relaxed ordering intentionally; these are statistical
//! counters only. Do NOT use these atomics for coordination or logic decisions.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::info;

/// Update an atomic max value using compare-and-swap loop
#[inline]
fn update_atomic_max(atomic_max: &AtomicU64, new_value: u64) {
    let mut current_max = atomic_max.load(Ordering::Relaxed);
    while new_value > current_max {
        match atomic_max.compare_exchange_weak(
            current_max,
            new_value,
            Ordering::Relaxed,
            Ordering::Relaxed,
        ) {
            Ok(_) => break,
            Err(actual) => current_max = actual,
        }
    }
}

/// Counters for one sync run
pub struct SyncMetrics {
    started_at: Instant,
    stores_synced: AtomicU64,
    stores_failed: AtomicU64,
    fetch_failures: AtomicU64,
    orders_fetched: AtomicU64,
    orders_invalid: AtomicU64,
    transactions_created: AtomicU64,
    customers_skipped: AtomicU64,
    empty_invoices: AtomicU64,
    lookup_failures: AtomicU64,
    publishes_ok: AtomicU64,
    publishes_failed: AtomicU64,
    persist_failures: AtomicU64,
    order_latency_sum_us: AtomicU64,
    order_latency_max_us: AtomicU64,
}

impl SyncMetrics {
    pub fn new() -> Self {
        Self {
            started_at: Instant::now(),
            stores_synced: AtomicU64::new(0),
            stores_failed: AtomicU64::new(0),
            fetch_failures: AtomicU64::new(0),
            orders_fetched: AtomicU64::new(0),
            orders_invalid: AtomicU64::new(0),
            transactions_created: AtomicU64::new(0),
            customers_skipped: AtomicU64::new(0),
            empty_invoices: AtomicU64::new(0),
            lookup_failures: AtomicU64::new(0),
            publishes_ok: AtomicU64::new(0),
            publishes_failed: AtomicU64::new(0),
            persist_failures: AtomicU64::new(0),
            order_latency_sum_us: AtomicU64::new(0),
            order_latency_max_us: AtomicU64::new(0),
        }
    }

    #[inline]
    pub fn record_store_synced(&self) {
        self.stores_synced.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_store_failed(&self) {
        self.stores_failed.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_fetch_failure(&self) {
        self.fetch_failures.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_orders_fetched(&self, count: u64) {
        self.orders_fetched.fetch_add(count, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_order_invalid(&self) {
        self.orders_invalid.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_transaction_created(&self) {
        self.transactions_created.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_customer_skipped(&self) {
        self.customers_skipped.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_empty_invoice(&self) {
        self.empty_invoices.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_lookup_failure(&self) {
        self.lookup_failures.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_publish(&self, ok: bool) {
        if ok {
            self.publishes_ok.fetch_add(1, Ordering::Relaxed);
        } else {
            self.publishes_failed.fetch_add(1, Ordering::Relaxed);
        }
    }

    #[inline]
    pub fn record_persist_failure(&self) {
        self.persist_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Record wall time spent on one order (fetch excluded)
    #[inline]
    pub fn record_order_latency(&self, latency_us: u64) {
        self.order_latency_sum_us.fetch_add(latency_us, Ordering::Relaxed);
        update_atomic_max(&self.order_latency_max_us, latency_us);
    }

    /// Snapshot of all counters
    pub fn summary(&self) -> SyncSummary {
        let orders_processed = self.transactions_created.load(Ordering::Relaxed)
            + self.customers_skipped.load(Ordering::Relaxed)
            + self.empty_invoices.load(Ordering::Relaxed);
        let latency_sum = self.order_latency_sum_us.load(Ordering::Relaxed);

        SyncSummary {
            elapsed_ms: self.started_at.elapsed().as_millis() as u64,
            stores_synced: self.stores_synced.load(Ordering::Relaxed),
            stores_failed: self.stores_failed.load(Ordering::Relaxed),
            fetch_failures: self.fetch_failures.load(Ordering::Relaxed),
            orders_fetched: self.orders_fetched.load(Ordering::Relaxed),
            orders_invalid: self.orders_invalid.load(Ordering::Relaxed),
            transactions_created: self.transactions_created.load(Ordering::Relaxed),
            customers_skipped: self.customers_skipped.load(Ordering::Relaxed),
            empty_invoices: self.empty_invoices.load(Ordering::Relaxed),
            lookup_failures: self.lookup_failures.load(Ordering::Relaxed),
            publishes_ok: self.publishes_ok.load(Ordering::Relaxed),
            publishes_failed: self.publishes_failed.load(Ordering::Relaxed),
            persist_failures: self.persist_failures.load(Ordering::Relaxed),
            avg_order_latency_us: if orders_processed > 0 {
                latency_sum / orders_processed
            } else {
                0
            },
            max_order_latency_us: self.order_latency_max_us.load(Ordering::Relaxed),
        }
    }
}

impl Default for SyncMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Counter snapshot taken at the end of a run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncSummary {
    pub elapsed_ms: u64,
    pub stores_synced: u64,
    pub stores_failed: u64,
    pub fetch_failures: u64,
    pub orders_fetched: u64,
    pub orders_invalid: u64,
    pub transactions_created: u64,
    pub customers_skipped: u64,
    pub empty_invoices: u64,
    pub lookup_failures: u64,
    pub publishes_ok: u64,
    pub publishes_failed: u64,
    pub persist_failures: u64,
    pub avg_order_latency_us: u64,
    pub max_order_latency_us: u64,
}

impl SyncSummary {
    pub fn log(&self) {
        info!(
            elapsed_ms = %self.elapsed_ms,
            stores_synced = %self.stores_synced,
            stores_failed = %self.stores_failed,
            fetch_failures = %self.fetch_failures,
            orders_fetched = %self.orders_fetched,
            orders_invalid = %self.orders_invalid,
            transactions_created = %self.transactions_created,
            customers_skipped = %self.customers_skipped,
            empty_invoices = %self.empty_invoices,
            lookup_failures = %self.lookup_failures,
            publishes_ok = %self.publishes_ok,
            publishes_failed = %self.publishes_failed,
            persist_failures = %self.persist_failures,
            avg_order_latency_us = %self.avg_order_latency_us,
            max_order_latency_us = %self.max_order_latency_us,
            "sync_summary"
        );
    }
}

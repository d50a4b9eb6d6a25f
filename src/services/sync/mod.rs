//! Sync orchestration across stores
//!
//! Per store: parse the watermark, fetch orders closed since then, run each
//! order through classification, customer resolution and the transaction
//! builder in ascending close-time order, then persist the advanced watermark
//! once for the whole batch.
//!
//! Stores are processed one at a time. A failure inside one store's batch
//! abandons that batch (no watermark write) and the run moves on.


use crate::domain::order::{RawOrder, ValidOrder};
use crate::domain::transaction::Store;
use crate::infra::config::SyncRules;
use crate::infra::error::{StoreError, SyncError};
use crate::infra::metrics::{SyncMetrics, SyncSummary};
use crate::io::publisher::Publisher;
use crate::io::square::OrderSource;
use crate::io::store::TransactionStore;
use crate::services::classifier::classify;
use crate::services::customer::CustomerResolver;
use crate::services::fetcher::OrderFetcher;
use crate::services::transaction_builder::{BuildOutcome, TransactionBuilder};
use crate::services::watermark::{advance, format_watermark, parse_watermark};
use anyhow::Context;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Admit an order into the pipeline, logging why it was rejected otherwise
pub fn validate_order<'a>(order: &'a RawOrder, metrics: &SyncMetrics) -> Option<ValidOrder<'a>> {
    match order.validate() {
        Ok(valid) => Some(valid),
        Err(reason) => {
            metrics.record_order_invalid();
            warn!(order_id = %order.id, reason = %reason.as_str(), "order_invalid");
            None
        }
    }
}

/// What one store's batch did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreReport {
    pub orders: usize,
    pub persisted: usize,
    pub skipped: usize,
    pub invalid: usize,
    /// Watermark written at the end of the batch, if any
    pub watermark: Option<String>,
}

impl StoreReport {
    fn record(&mut self, outcome: &BuildOutcome) {
        match outcome {
            BuildOutcome::Persisted { .. } => self.persisted += 1,
            BuildOutcome::AlreadyPersisted
            | BuildOutcome::SkippedCustomer { .. }
            | BuildOutcome::EmptyInvoice => self.skipped += 1,
        }
    }
}

pub struct SyncEngine {
    fetcher: OrderFetcher,
    resolver: CustomerResolver,
    builder: TransactionBuilder,
    store: Arc<dyn TransactionStore>,
    rules: SyncRules,
    metrics: Arc<SyncMetrics>,
}

impl SyncEngine {
    pub fn new(
        source: Arc<dyn OrderSource>,
        store: Arc<dyn TransactionStore>,
        publisher: Arc<dyn Publisher>,
        rules: SyncRules,
        metrics: Arc<SyncMetrics>,
    ) -> Self {
        Self {
            fetcher: OrderFetcher::new(source.clone(), metrics.clone()),
            resolver: CustomerResolver::new(source, metrics.clone()),
            builder: TransactionBuilder::new(store.clone(), publisher, metrics.clone()),
            store,
            rules,
            metrics,
        }
    }

    /// Sync every store once.
    ///
    /// Only a failure to list the stores is returned; per-store failures are
    /// logged and counted.
    pub async fn run(&self) -> anyhow::Result<SyncSummary> {
        let started = Instant::now();
        let stores = self.store.find_stores().await.context("Failed to load stores")?;
        info!(stores = %stores.len(), "sync_started");

        for store in &stores {
            match self.sync_store(store).await {
                Ok(report) => {
                    self.metrics.record_store_synced();
                    info!(
                        store = %store.short_name,
                        orders = %report.orders,
                        persisted = %report.persisted,
                        skipped = %report.skipped,
                        invalid = %report.invalid,
                        watermark = %report.watermark.as_deref().unwrap_or(&store.last_sync_time),
                        "store_synced"
                    );
                }
                Err(e) => {
                    self.metrics.record_store_failed();
                    error!(store = %store.short_name, store_id = %store.id, error = %e, "store_sync_failed");
                }
            }
        }

        info!(
            stores = %stores.len(),
            elapsed_ms = %started.elapsed().as_millis(),
            "sync_finished"
        );
        Ok(self.metrics.summary())
    }

    /// Process one store's batch and persist its watermark
    pub async fn sync_store(&self, store: &Store) -> Result<StoreReport, SyncError> {
        let since = parse_watermark(&store.last_sync_time).map_err(|source| {
            SyncError::Watermark { value: store.last_sync_time.clone(), source }
        })?;

        let orders = self.fetcher.fetch(&store.location_id, since).await;
        let mut report = StoreReport { orders: orders.len(), ..Default::default() };
        if orders.is_empty() {
            info!(store = %store.short_name, since = %store.last_sync_time, "no_new_orders");
            return Ok(report);
        }

        let mut watermark = since;
        for order in &orders {
            let Some(valid) = validate_order(order, &self.metrics) else {
                report.invalid += 1;
                continue;
            };

            let start = Instant::now();
            let outcome = self.process_order(&valid, store).await.map_err(|e| {
                self.metrics.record_persist_failure();
                error!(order_id = %order.id, store = %store.short_name, error = %e, "transaction_persist_failed");
                e
            })?;
            self.metrics.record_order_latency(start.elapsed().as_micros() as u64);
            report.record(&outcome);
            debug!(order_id = %order.id, outcome = %outcome.as_str(), "order_processed");

            watermark = advance(valid.closed_at, watermark, self.rules.watermark_quantum);
        }

        let value = format_watermark(watermark);
        self.store.update_watermark(&store.id, &value).await?;
        info!(store = %store.short_name, watermark = %value, "watermark_persisted");
        report.watermark = Some(value);
        Ok(report)
    }

    async fn process_order(
        &self,
        order: &ValidOrder<'_>,
        store: &Store,
    ) -> Result<BuildOutcome, StoreError> {
        let classified = classify(order.line_items, &self.rules);
        for title in &classified.unpriced_items {
            warn!(order_id = %order.order.id, item = %title, "item_price_missing");
        }
        let customer = self.resolver.resolve(&order.order.tenders).await;
        let payment_methods = order.order.payment_methods();
        self.builder
            .build(order, store, classified, customer, payment_methods, &self.rules)
            .await
    }
}

//! Transaction assembly, report publishing and invoicing guards
//!
//! Report rows go out first and are never rolled back: a skip-listed customer
//! or an empty invoice still leaves its report rows published.

use crate::domain::order::ValidOrder;
use crate::domain::transaction::{epoch_ms, new_uuid_v7, CustomerDetails, Store, Transaction};
use crate::infra::config::{SkippedCustomer, SyncRules};
use crate::infra::error::StoreError;
use crate::infra::metrics::SyncMetrics;
use crate::io::publisher::Publisher;
use crate::io::store::TransactionStore;
use crate::services::classifier::ClassifiedItems;
use crate::services::report::{build_row, RowContext};
use crate::services::watermark::format_watermark;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// What happened to one classified order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildOutcome {
    Persisted { transaction_id: String },
    /// The store already holds a transaction for this order
    AlreadyPersisted,
    SkippedCustomer { name: String, fiscal_id: String },
    EmptyInvoice,
}

impl BuildOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            BuildOutcome::Persisted { .. } => "persisted",
            BuildOutcome::AlreadyPersisted => "already_persisted",
            BuildOutcome::SkippedCustomer { .. } => "skipped_customer",
            BuildOutcome::EmptyInvoice => "empty_invoice",
        }
    }
}

/// Skip-list entry matching the customer's fiscal id, if any
pub fn skip_entry<'a>(
    customer: Option<&CustomerDetails>,
    skipped: &'a [SkippedCustomer],
) -> Option<&'a SkippedCustomer> {
    let fiscal_id = customer?.fiscal_id.as_deref()?;
    skipped.iter().find(|s| s.fiscal_id == fiscal_id)
}

/// Canonical transaction record for an order
pub fn assemble_transaction(
    order: &ValidOrder<'_>,
    store: &Store,
    classified: ClassifiedItems,
    customer: Option<CustomerDetails>,
    payment_methods: Vec<String>,
) -> Transaction {
    Transaction {
        id: new_uuid_v7(),
        order_id: order.order.id.clone(),
        location_short_name: store.short_name.clone(),
        location_id: order.order.location_id.clone(),
        register_id: store.register_id.clone(),
        closed_at: format_watermark(order.closed_at),
        payment_methods,
        line_items: classified.invoiced_items,
        customer: customer.filter(|c| !c.is_empty()),
        should_print: classified.print_flag,
        created_at: epoch_ms(),
    }
}

pub struct TransactionBuilder {
    store: Arc<dyn TransactionStore>,
    publisher: Arc<dyn Publisher>,
    metrics: Arc<SyncMetrics>,
}

impl TransactionBuilder {
    pub fn new(
        store: Arc<dyn TransactionStore>,
        publisher: Arc<dyn Publisher>,
        metrics: Arc<SyncMetrics>,
    ) -> Self {
        Self { store, publisher, metrics }
    }

    /// Publish report rows, apply the guards and persist the transaction.
    ///
    /// Only a failing `create` is returned as an error; publish failures are
    /// logged per channel.
    pub async fn build(
        &self,
        order: &ValidOrder<'_>,
        store: &Store,
        classified: ClassifiedItems,
        customer: Option<CustomerDetails>,
        payment_methods: Vec<String>,
        rules: &SyncRules,
    ) -> Result<BuildOutcome, StoreError> {
        self.publish_reports(order, store, &classified, customer.as_ref(), rules).await;

        if let Some(entry) = skip_entry(customer.as_ref(), &rules.skipped_customers) {
            self.metrics.record_customer_skipped();
            info!(
                order_id = %order.order.id,
                name = %entry.name,
                fiscal_id = %entry.fiscal_id,
                "customer_skipped"
            );
            return Ok(BuildOutcome::SkippedCustomer {
                name: entry.name.clone(),
                fiscal_id: entry.fiscal_id.clone(),
            });
        }

        if classified.invoiced_items.is_empty() {
            self.metrics.record_empty_invoice();
            info!(
                order_id = %order.order.id,
                print = %classified.print_flag,
                "empty_invoice_skipped"
            );
            return Ok(BuildOutcome::EmptyInvoice);
        }

        let transaction = assemble_transaction(order, store, classified, customer, payment_methods);
        if !self.store.create(&transaction).await? {
            info!(order_id = %transaction.order_id, "transaction_already_persisted");
            return Ok(BuildOutcome::AlreadyPersisted);
        }
        self.metrics.record_transaction_created();
        debug!(
            order_id = %transaction.order_id,
            transaction_id = %transaction.id,
            items = %transaction.line_items.len(),
            print = %transaction.should_print,
            "transaction_created"
        );
        Ok(BuildOutcome::Persisted { transaction_id: transaction.id })
    }

    async fn publish_reports(
        &self,
        order: &ValidOrder<'_>,
        store: &Store,
        classified: &ClassifiedItems,
        customer: Option<&CustomerDetails>,
        rules: &SyncRules,
    ) {
        let ctx = RowContext {
            order_id: &order.order.id,
            store,
            closed_at: order.closed_at,
            customer,
            settings: &rules.report,
        };

        for bucket in classified.non_empty_buckets() {
            let row = build_row(bucket, &ctx);
            match self.publisher.publish(&bucket.channel, &row).await {
                Ok(()) => {
                    self.metrics.record_publish(true);
                    debug!(
                        order_id = %order.order.id,
                        category = %bucket.category,
                        channel = %bucket.channel,
                        "report_published"
                    );
                }
                Err(e) => {
                    self.metrics.record_publish(false);
                    warn!(
                        order_id = %order.order.id,
                        category = %bucket.category,
                        channel = %bucket.channel,
                        error = %e,
                        "report_publish_failed"
                    );
                }
            }
        }
    }
}

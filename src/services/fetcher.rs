//! Order retrieval for one store location
//!
//! A failed fetch degrades to "no new orders": the error is logged and an
//! empty list returned, so one unreachable location never aborts the run.

use crate::domain::order::RawOrder;
use crate::infra::metrics::SyncMetrics;
use crate::io::square::{OrderQuery, OrderSource};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info};

pub struct OrderFetcher {
    source: Arc<dyn OrderSource>,
    metrics: Arc<SyncMetrics>,
}

impl OrderFetcher {
    pub fn new(source: Arc<dyn OrderSource>, metrics: Arc<SyncMetrics>) -> Self {
        Self { source, metrics }
    }

    /// Completed orders closed in `[since, now)`, ascending by close time
    pub async fn fetch(&self, location_id: &str, since: DateTime<Utc>) -> Vec<RawOrder> {
        self.fetch_until(location_id, since, Utc::now()).await
    }

    /// Same as `fetch` with an explicit upper bound
    pub async fn fetch_until(
        &self,
        location_id: &str,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Vec<RawOrder> {
        let query =
            OrderQuery { location_id: location_id.to_string(), start_at: since, end_at: until };
        let start = Instant::now();

        match self.source.search_orders(&query).await {
            Ok(mut orders) => {
                // Stable sort; orders lacking a close time sort first and get rejected later
                orders.sort_by_key(|o| o.closed_at);
                self.metrics.record_orders_fetched(orders.len() as u64);
                info!(
                    location_id = %location_id,
                    since = %since,
                    orders = %orders.len(),
                    latency_ms = %start.elapsed().as_millis(),
                    "orders_fetched"
                );
                orders
            }
            Err(e) => {
                self.metrics.record_fetch_failure();
                error!(
                    location_id = %location_id,
                    since = %since,
                    error = %e,
                    "orders_fetch_failed"
                );
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::order::SourceCustomer;
    use crate::infra::error::SourceError;
    use async_trait::async_trait;
    use chrono::TimeZone;
    use parking_lot::Mutex;

    struct ScriptedSource {
        orders: Option<Vec<RawOrder>>,
        queries: Mutex<Vec<OrderQuery>>,
    }

    #[async_trait]
    impl OrderSource for ScriptedSource {
        async fn search_orders(&self, query: &OrderQuery) -> Result<Vec<RawOrder>, SourceError> {
            self.queries.lock().push(query.clone());
            match &self.orders {
                Some(orders) => Ok(orders.clone()),
                None => Err(SourceError::Api { status: 401, body: "unauthorized".to_string() }),
            }
        }

        async fn retrieve_customer(
            &self,
            _customer_id: &str,
        ) -> Result<Option<SourceCustomer>, SourceError> {
            Ok(None)
        }
    }

    fn order(id: &str, minute: u32) -> RawOrder {
        RawOrder {
            id: id.to_string(),
            location_id: "LOC1".to_string(),
            closed_at: Some(Utc.with_ymd_and_hms(2020, 1, 15, 10, minute, 0).unwrap()),
            line_items: Some(vec![]),
            tenders: vec![],
        }
    }

    fn fetcher(orders: Option<Vec<RawOrder>>) -> (OrderFetcher, Arc<ScriptedSource>, Arc<SyncMetrics>) {
        let source = Arc::new(ScriptedSource { orders, queries: Mutex::new(Vec::new()) });
        let metrics = Arc::new(SyncMetrics::new());
        (OrderFetcher::new(source.clone(), metrics.clone()), source, metrics)
    }

    #[tokio::test]
    async fn test_fetch_sorts_ascending() {
        let (fetcher, _, metrics) =
            fetcher(Some(vec![order("c", 30), order("a", 10), order("b", 20)]));
        let since = Utc.with_ymd_and_hms(2020, 1, 15, 0, 0, 0).unwrap();

        let orders = fetcher.fetch("LOC1", since).await;
        let ids: Vec<&str> = orders.iter().map(|o| o.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
        assert_eq!(metrics.summary().orders_fetched, 3);
    }

    #[tokio::test]
    async fn test_fetch_passes_window() {
        let (fetcher, source, _) = fetcher(Some(vec![]));
        let since = Utc.with_ymd_and_hms(2020, 1, 15, 0, 0, 0).unwrap();
        let until = Utc.with_ymd_and_hms(2020, 1, 16, 0, 0, 0).unwrap();

        fetcher.fetch_until("LOC9", since, until).await;

        let queries = source.queries.lock();
        assert_eq!(queries.len(), 1);
        assert_eq!(queries[0].location_id, "LOC9");
        assert_eq!(queries[0].start_at, since);
        assert_eq!(queries[0].end_at, until);
    }

    #[tokio::test]
    async fn test_fetch_error_returns_empty() {
        let (fetcher, _, metrics) = fetcher(None);
        let since = Utc.with_ymd_and_hms(2020, 1, 15, 0, 0, 0).unwrap();

        assert!(fetcher.fetch("LOC1", since).await.is_empty());
        assert_eq!(metrics.summary().fetch_failures, 1);
    }
}

//! Customer resolution for an order
//!
//! An invoice carries at most one customer. The first tender holding a
//! customer reference is used; at most one lookup is issued per order.

use crate::domain::order::{SourceCustomer, Tender};
use crate::domain::transaction::{normalize_fiscal_id, CustomerDetails};
use crate::infra::metrics::SyncMetrics;
use crate::io::square::OrderSource;
use std::sync::Arc;
use tracing::{debug, error};

/// Normalize a source customer record into invoice form
pub fn normalize_customer(customer: &SourceCustomer) -> CustomerDetails {
    let fiscal_id = customer.reference_id.as_deref().and_then(normalize_fiscal_id);

    let name = [customer.given_name.as_deref(), customer.family_name.as_deref()]
        .into_iter()
        .flatten()
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ");

    CustomerDetails {
        fiscal_id,
        name,
        email: customer.email_address.clone().unwrap_or_default(),
    }
}

pub struct CustomerResolver {
    source: Arc<dyn OrderSource>,
    metrics: Arc<SyncMetrics>,
}

impl CustomerResolver {
    pub fn new(source: Arc<dyn OrderSource>, metrics: Arc<SyncMetrics>) -> Self {
        Self { source, metrics }
    }

    /// Resolve the order's customer.
    ///
    /// Returns `None` when no tender references a customer. A failed or empty
    /// lookup yields an empty `CustomerDetails` rather than an error.
    pub async fn resolve(&self, tenders: &[Tender]) -> Option<CustomerDetails> {
        let customer_id = tenders.iter().find_map(Tender::customer_ref)?;

        match self.source.retrieve_customer(customer_id).await {
            Ok(Some(customer)) => {
                let details = normalize_customer(&customer);
                debug!(
                    customer_id = %customer_id,
                    has_fiscal_id = %details.fiscal_id.is_some(),
                    "customer_resolved"
                );
                Some(details)
            }
            Ok(None) => {
                self.metrics.record_lookup_failure();
                error!(customer_id = %customer_id, "customer_not_found");
                Some(CustomerDetails::default())
            }
            Err(e) => {
                self.metrics.record_lookup_failure();
                error!(customer_id = %customer_id, error = %e, "customer_lookup_failed");
                Some(CustomerDetails::default())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::order::RawOrder;
    use crate::infra::error::SourceError;
    use crate::io::square::OrderQuery;
    use async_trait::async_trait;
    use parking_lot::Mutex;

    /// Source answering lookups from a fixed table and recording calls
    struct LookupSource {
        known: Vec<SourceCustomer>,
        fail: bool,
        calls: Mutex<Vec<String>>,
    }

    impl LookupSource {
        fn new(known: Vec<SourceCustomer>) -> Self {
            Self { known, fail: false, calls: Mutex::new(Vec::new()) }
        }

        fn failing() -> Self {
            Self { known: vec![], fail: true, calls: Mutex::new(Vec::new()) }
        }
    }

    #[async_trait]
    impl OrderSource for LookupSource {
        async fn search_orders(&self, _query: &OrderQuery) -> Result<Vec<RawOrder>, SourceError> {
            Ok(vec![])
        }

        async fn retrieve_customer(
            &self,
            customer_id: &str,
        ) -> Result<Option<SourceCustomer>, SourceError> {
            self.calls.lock().push(customer_id.to_string());
            if self.fail {
                return Err(SourceError::Api { status: 500, body: "boom".to_string() });
            }
            Ok(self.known.iter().find(|c| c.id.as_deref() == Some(customer_id)).cloned())
        }
    }

    fn customer(id: &str, given: Option<&str>, family: Option<&str>) -> SourceCustomer {
        SourceCustomer {
            id: Some(id.to_string()),
            given_name: given.map(str::to_string),
            family_name: family.map(str::to_string),
            email_address: None,
            reference_id: None,
        }
    }

    fn tender(kind: &str, customer_id: Option<&str>) -> Tender {
        Tender { id: None, kind: kind.to_string(), customer_id: customer_id.map(str::to_string) }
    }

    fn resolver(source: Arc<LookupSource>) -> CustomerResolver {
        CustomerResolver::new(source, Arc::new(SyncMetrics::new()))
    }

    #[test]
    fn test_normalize_full_customer() {
        let mut source = customer("C1", Some("Ana"), Some("Silva"));
        source.reference_id = Some(" 123 456\t789 ".to_string());
        source.email_address = Some("ana@example.com".to_string());

        let details = normalize_customer(&source);
        assert_eq!(details.fiscal_id.as_deref(), Some("123456789"));
        assert_eq!(details.name, "Ana Silva");
        assert_eq!(details.email, "ana@example.com");
    }

    #[test]
    fn test_normalize_missing_fields() {
        let details = normalize_customer(&customer("C1", None, None));
        assert_eq!(details.fiscal_id, None);
        assert_eq!(details.name, "");
        assert_eq!(details.email, "");

        assert_eq!(normalize_customer(&customer("C1", None, Some("Silva"))).name, "Silva");
        assert_eq!(normalize_customer(&customer("C1", Some("Ana"), None)).name, "Ana");
    }

    #[test]
    fn test_normalize_blank_fiscal_id_is_none() {
        let mut source = customer("C1", Some("Ana"), None);
        source.reference_id = Some("   ".to_string());
        assert_eq!(normalize_customer(&source).fiscal_id, None);
    }

    #[tokio::test]
    async fn test_no_customer_reference() {
        let source = Arc::new(LookupSource::new(vec![]));
        let resolved = resolver(source.clone())
            .resolve(&[tender("CASH", None), tender("CARD", Some(""))])
            .await;

        assert_eq!(resolved, None);
        assert!(source.calls.lock().is_empty());
    }

    #[tokio::test]
    async fn test_first_reference_wins_single_lookup() {
        let source = Arc::new(LookupSource::new(vec![
            customer("C1", Some("Ana"), None),
            customer("C2", Some("Rui"), None),
        ]));
        let resolved = resolver(source.clone())
            .resolve(&[tender("CASH", None), tender("CARD", Some("C1")), tender("CARD", Some("C2"))])
            .await
            .unwrap();

        assert_eq!(resolved.name, "Ana");
        assert_eq!(*source.calls.lock(), vec!["C1".to_string()]);
    }

    #[tokio::test]
    async fn test_failed_lookup_returns_empty_details() {
        let source = Arc::new(LookupSource::failing());
        let metrics = Arc::new(SyncMetrics::new());
        let resolver = CustomerResolver::new(source, metrics.clone());

        let resolved = resolver.resolve(&[tender("CARD", Some("C9"))]).await.unwrap();
        assert!(resolved.is_empty());
        assert_eq!(metrics.summary().lookup_failures, 1);
    }

    #[tokio::test]
    async fn test_unknown_customer_returns_empty_details() {
        let source = Arc::new(LookupSource::new(vec![]));
        let resolved = resolver(source).resolve(&[tender("CARD", Some("C9"))]).await.unwrap();
        assert!(resolved.is_empty());
    }
}

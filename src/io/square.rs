//! Square REST client for order search and customer lookup
//!
//! Only the two calls the sync engine needs are implemented. A single page of
//! results is requested per search.

use crate::domain::order::{RawOrder, SourceCustomer};
use crate::infra::config::Config;
use crate::infra::error::SourceError;
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;

/// Parameters of one order search
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderQuery {
    pub location_id: String,
    /// Inclusive lower bound on close time
    pub start_at: DateTime<Utc>,
    /// Exclusive upper bound on close time
    pub end_at: DateTime<Utc>,
}

/// Inbound side of the sync: where orders and customers come from
#[async_trait]
pub trait OrderSource: Send + Sync {
    /// Completed orders closed within the query window
    async fn search_orders(&self, query: &OrderQuery) -> Result<Vec<RawOrder>, SourceError>;

    /// Customer record for a reference; `Ok(None)` if the source does not know it
    async fn retrieve_customer(
        &self,
        customer_id: &str,
    ) -> Result<Option<SourceCustomer>, SourceError>;
}

#[derive(Debug, Deserialize)]
struct SearchOrdersResponse {
    #[serde(default)]
    orders: Vec<RawOrder>,
}

#[derive(Debug, Deserialize)]
struct RetrieveCustomerResponse {
    #[serde(default)]
    customer: Option<SourceCustomer>,
}

/// Request body for `orders/search`
pub fn search_body(query: &OrderQuery) -> Value {
    json!({
        "location_ids": [query.location_id],
        "query": {
            "filter": {
                "date_time_filter": {
                    "closed_at": {
                        "start_at": query.start_at.to_rfc3339_opts(SecondsFormat::Millis, true),
                        "end_at": query.end_at.to_rfc3339_opts(SecondsFormat::Millis, true),
                    }
                },
                "state_filter": { "states": ["COMPLETED"] }
            },
            "sort": { "sort_field": "CLOSED_AT", "sort_order": "ASC" }
        }
    })
}

pub struct SquareClient {
    http: reqwest::Client,
    base_url: reqwest::Url,
    api_version: String,
    access_token: String,
}

impl SquareClient {
    pub fn new(config: &Config) -> Result<Self, SourceError> {
        // Create HTTP client once for reuse (connection pooling)
        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.source_timeout_ms()))
            .build()?;

        let base_url = reqwest::Url::parse(config.source_base_url())
            .map_err(|e| SourceError::BaseUrl(format!("{}: {}", config.source_base_url(), e)))?;
        if base_url.cannot_be_a_base() {
            return Err(SourceError::BaseUrl(config.source_base_url().to_string()));
        }

        Ok(Self {
            http,
            base_url,
            api_version: config.source_api_version().to_string(),
            access_token: config.source_access_token().to_string(),
        })
    }

    /// Base URL extended by path segments, each percent-encoded
    fn endpoint(&self, segments: &[&str]) -> reqwest::Url {
        let mut url = self.base_url.clone();
        // Base URLs that cannot carry a path are rejected in `new`
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn request(&self, method: reqwest::Method, segments: &[&str]) -> reqwest::RequestBuilder {
        self.http
            .request(method, self.endpoint(segments))
            .header("Content-Type", "application/json")
            .header("Square-Version", &self.api_version)
            .bearer_auth(&self.access_token)
    }

    async fn read_body(response: reqwest::Response) -> Result<String, SourceError> {
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(SourceError::Api { status: status.as_u16(), body });
        }
        Ok(body)
    }
}

#[async_trait]
impl OrderSource for SquareClient {
    async fn search_orders(&self, query: &OrderQuery) -> Result<Vec<RawOrder>, SourceError> {
        let response = self
            .request(reqwest::Method::POST, &["orders", "search"])
            .json(&search_body(query))
            .send()
            .await?;

        let body = Self::read_body(response).await?;
        let parsed: SearchOrdersResponse = serde_json::from_str(&body)?;
        debug!(
            location_id = %query.location_id,
            orders = %parsed.orders.len(),
            bytes = %body.len(),
            "square_orders_received"
        );
        Ok(parsed.orders)
    }

    async fn retrieve_customer(
        &self,
        customer_id: &str,
    ) -> Result<Option<SourceCustomer>, SourceError> {
        let response = self
            .request(reqwest::Method::GET, &["customers", customer_id])
            .send()
            .await?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let body = Self::read_body(response).await?;
        let parsed: RetrieveCustomerResponse = serde_json::from_str(&body)?;
        Ok(parsed.customer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn query() -> OrderQuery {
        OrderQuery {
            location_id: "LOC1".to_string(),
            start_at: Utc.with_ymd_and_hms(2020, 1, 15, 10, 0, 0).unwrap(),
            end_at: Utc.with_ymd_and_hms(2020, 1, 15, 12, 30, 0).unwrap(),
        }
    }

    #[test]
    fn test_search_body() {
        let body = search_body(&query());

        assert_eq!(body["location_ids"], json!(["LOC1"]));
        let closed_at = &body["query"]["filter"]["date_time_filter"]["closed_at"];
        assert_eq!(closed_at["start_at"], "2020-01-15T10:00:00.000Z");
        assert_eq!(closed_at["end_at"], "2020-01-15T12:30:00.000Z");
        assert_eq!(body["query"]["filter"]["state_filter"]["states"], json!(["COMPLETED"]));
        assert_eq!(body["query"]["sort"]["sort_field"], "CLOSED_AT");
        assert_eq!(body["query"]["sort"]["sort_order"], "ASC");
    }

    #[test]
    fn test_endpoint_join() {
        let client = SquareClient::new(&Config::default()).unwrap();
        assert_eq!(
            client.endpoint(&["orders", "search"]).as_str(),
            "https://connect.squareup.com/v2/orders/search"
        );
        assert_eq!(
            client.endpoint(&["customers", "C1"]).as_str(),
            "https://connect.squareup.com/v2/customers/C1"
        );
    }

    #[test]
    fn test_customer_id_encoded_as_one_segment() {
        let client = SquareClient::new(&Config::default()).unwrap();
        let url = client.endpoint(&["customers", "../orders/search?x=1 y"]);
        assert_eq!(
            url.as_str(),
            "https://connect.squareup.com/v2/customers/..%2Forders%2Fsearch%3Fx=1%20y"
        );
        assert_eq!(url.path_segments().unwrap().count(), 3);
    }

    #[test]
    fn test_base_url_without_trailing_slash() {
        let config = Config::default().with_source_base_url("http://127.0.0.1:8080/v2");
        let client = SquareClient::new(&config).unwrap();
        assert_eq!(
            client.endpoint(&["customers", "C1"]).as_str(),
            "http://127.0.0.1:8080/v2/customers/C1"
        );
    }

    #[test]
    fn test_unusable_base_url_rejected() {
        for url in ["not a url", "mailto:orders@example.com"] {
            let config = Config::default().with_source_base_url(url);
            assert!(matches!(SquareClient::new(&config), Err(SourceError::BaseUrl(_))), "{}", url);
        }
    }

    #[test]
    fn test_search_response_without_orders() {
        let parsed: SearchOrdersResponse = serde_json::from_str("{}").unwrap();
        assert!(parsed.orders.is_empty());
    }

    #[test]
    fn test_customer_response() {
        let parsed: RetrieveCustomerResponse = serde_json::from_str(
            r#"{"customer": {"id": "C1", "given_name": "Ana", "reference_id": "123 456 789"}}"#,
        )
        .unwrap();
        let customer = parsed.customer.unwrap();
        assert_eq!(customer.given_name.as_deref(), Some("Ana"));
        assert_eq!(customer.family_name, None);
        assert_eq!(customer.reference_id.as_deref(), Some("123 456 789"));
    }
}

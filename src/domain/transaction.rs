//! Destination-side records: sync targets and persisted transactions

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

/// Generate a new UUIDv7 (time-sortable)
pub fn new_uuid_v7() -> String {
    Uuid::now_v7().to_string()
}

/// Get current epoch milliseconds
#[inline]
pub fn epoch_ms() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis() as u64
}

/// Fiscal id with all whitespace removed; `None` if nothing remains
pub fn normalize_fiscal_id(raw: &str) -> Option<String> {
    let id: String = raw.chars().filter(|c| !c.is_whitespace()).collect();
    (!id.is_empty()).then_some(id)
}

/// A sync target: one shop location mapped to one invoicing register
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Store {
    pub id: String,
    pub name: String,
    pub short_name: String,
    /// Location identifier in the order source
    pub location_id: String,
    /// Register identifier in the invoicing system
    pub register_id: String,
    /// ISO-8601 watermark; orders closed at or after it are not yet synced
    pub last_sync_time: String,
}

/// One invoiceable line in the destination's format
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedItem {
    pub reference: String,
    pub title: String,
    pub qty: Decimal,
    pub gross_price: Decimal,
    pub tax_id: String,
}

/// Customer identity attached to an invoice
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CustomerDetails {
    pub fiscal_id: Option<String>,
    pub name: String,
    pub email: String,
}

impl CustomerDetails {
    /// True for the placeholder produced when a lookup fails
    pub fn is_empty(&self) -> bool {
        self.fiscal_id.is_none() && self.name.is_empty() && self.email.is_empty()
    }
}

/// Persisted record handed over to the invoicing process
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: String,
    pub order_id: String,
    pub location_short_name: String,
    pub location_id: String,
    pub register_id: String,
    pub closed_at: String,
    pub payment_methods: Vec<String>,
    pub line_items: Vec<NormalizedItem>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer: Option<CustomerDetails>,
    pub should_print: bool,
    pub created_at: u64,
}

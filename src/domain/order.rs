//! Source-side order model (Square Orders API shapes)
//!
//! These types mirror the JSON returned by the order source closely enough to
//! deserialize it; everything beyond what the sync engine reads is ignored.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// A completed sale as returned by the order search
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct RawOrder {
    pub id: String,
    #[serde(default)]
    pub location_id: String,
    #[serde(default)]
    pub closed_at: Option<DateTime<Utc>>,
    /// `None` when the source omitted the field entirely
    #[serde(default)]
    pub line_items: Option<Vec<RawLineItem>>,
    #[serde(default)]
    pub tenders: Vec<Tender>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct RawLineItem {
    #[serde(default)]
    pub uid: Option<String>,
    #[serde(default)]
    pub catalog_object_id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub variation_name: Option<String>,
    #[serde(default = "default_quantity")]
    pub quantity: Decimal,
    #[serde(default)]
    pub base_price_money: Option<Money>,
    #[serde(default)]
    pub taxes: Vec<LineItemTax>,
    #[serde(default)]
    pub note: Option<String>,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

fn default_quantity() -> Decimal {
    Decimal::ONE
}

/// Monetary amount in the currency's minor unit (cents)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct Money {
    pub amount: i64,
}

impl Money {
    /// Amount in major units; exact, no floating point involved
    pub fn to_decimal(self) -> Decimal {
        Decimal::new(self.amount, 2)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct LineItemTax {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub percentage: Option<String>,
}

/// One payment attempt recorded against an order
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Tender {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub customer_id: Option<String>,
}

impl Tender {
    /// Customer reference, if present and non-empty
    pub fn customer_ref(&self) -> Option<&str> {
        self.customer_id.as_deref().filter(|id| !id.is_empty())
    }
}

/// Customer record as returned by the customer lookup
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct SourceCustomer {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub given_name: Option<String>,
    #[serde(default)]
    pub family_name: Option<String>,
    #[serde(default)]
    pub email_address: Option<String>,
    /// Carries the customer's fiscal number
    #[serde(default)]
    pub reference_id: Option<String>,
}

/// Why an order cannot enter the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum OrderRejection {
    #[error("order has no line items")]
    MissingLineItems,
    #[error("order has no close time")]
    MissingCloseTime,
}

impl OrderRejection {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderRejection::MissingLineItems => "missing_line_items",
            OrderRejection::MissingCloseTime => "missing_close_time",
        }
    }
}

/// An order that passed structural validation
#[derive(Debug, Clone, Copy)]
pub struct ValidOrder<'a> {
    pub order: &'a RawOrder,
    pub line_items: &'a [RawLineItem],
    pub closed_at: DateTime<Utc>,
}

impl RawOrder {
    /// Check the order carries what the pipeline needs.
    ///
    /// An absent or empty line-item list is rejected, as is a missing close time.
    pub fn validate(&self) -> Result<ValidOrder<'_>, OrderRejection> {
        let line_items = match self.line_items.as_deref() {
            Some(items) if !items.is_empty() => items,
            _ => return Err(OrderRejection::MissingLineItems),
        };
        let closed_at = self.closed_at.ok_or(OrderRejection::MissingCloseTime)?;
        Ok(ValidOrder { order: self, line_items, closed_at })
    }

    /// Tender types in the order they were recorded
    pub fn payment_methods(&self) -> Vec<String> {
        self.tenders.iter().map(|t| t.kind.clone()).collect()
    }
}

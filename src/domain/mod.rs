//! Domain models - order source input and destination records
//!
//! This module contains the canonical data types used throughout the system:
//! - `RawOrder` - a completed sale as delivered by the order source
//! - `Store` - a sync target carrying its watermark
//! - `Transaction` - the invoiceable record persisted per qualifying order

pub mod order;
pub mod transaction;

// Re-export commonly used types at module level
pub use order::{OrderRejection, RawLineItem, RawOrder, SourceCustomer, Tender, ValidOrder};
pub use transaction::{CustomerDetails, NormalizedItem, Store, Transaction};

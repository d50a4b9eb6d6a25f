//! Services - sync engine logic
//!
//! This module contains the core business logic services:
//! - `sync` - Per-store orchestration and watermark persistence
//! - `fetcher` - Order retrieval with failure degradation
//! - `classifier` - Line item classification into invoice lines and report buckets
//! - `tax` - Tax percentage to tier code mapping
//! - `customer` - Customer resolution from tenders
//! - `transaction_builder` - Report publishing, invoicing guards and persistence
//! - `report` - Report row layouts
//! - `watermark` - Watermark arithmetic and formatting

pub mod classifier;
pub mod customer;
pub mod fetcher;
pub mod report;
pub mod sync;
pub mod tax;
pub mod transaction_builder;
pub mod watermark;

// Re-export commonly used types
pub use classifier::{classify, ClassifiedItems};
pub use customer::CustomerResolver;
pub use fetcher::OrderFetcher;
pub use sync::{StoreReport, SyncEngine};
pub use transaction_builder::{BuildOutcome, TransactionBuilder};

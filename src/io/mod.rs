//! IO modules - external system interfaces
//!
//! This module contains all external IO operations:
//! - `square` - HTTP client for the order source (order search, customer lookup)
//! - `store` - Transaction store (store list, transactions, watermarks)
//! - `publisher` - Report channels (JSONL rows)

pub mod publisher;
pub mod square;
pub mod store;

// Re-export commonly used types
pub use publisher::{JsonlPublisher, Publisher, ReportRow};
pub use square::{OrderQuery, OrderSource, SquareClient};
pub use store::{FileStore, TransactionStore};

//! Infrastructure - configuration, metrics, and errors
//!
//! This module contains infrastructure concerns:
//! - `config` - Application configuration (TOML loading, defaults, sync rules)
//! - `metrics` - Lock-free run counters
//! - `error` - Adapter and sync error types

pub mod config;
pub mod error;
pub mod metrics;

// Re-export commonly used types
pub use config::{Config, SyncRules};
pub use error::{PublishError, SourceError, StoreError, SyncError};
pub use metrics::{SyncMetrics, SyncSummary};

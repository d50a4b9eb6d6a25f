//! Configuration loading from TOML files
//!
//! The file path comes from the command line (`--config`, `CONFIG_FILE`,
//! default `config/dev.toml`); this module only loads and flattens it.
//!
//! The source access token may be supplied through `SQUARE_ACCESS_TOKEN`
//! instead of the file.

use crate::domain::transaction::normalize_fiscal_id;
use anyhow::Context;
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::Path;

const ACCESS_TOKEN_ENV: &str = "SQUARE_ACCESS_TOKEN";

/// Shape of the report row a category publishes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RowLayout {
    /// Location, date, time, badge (customer name) and quantities
    Badge,
    /// Order id, location, customer, reservation and pickup dates, quantities
    Reservation,
}

/// Clock used to render report dates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportTimezone {
    #[default]
    Local,
    Utc,
}

/// Catalog reference counted under a report key
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CategoryItem {
    pub reference: String,
    pub key: String,
}

/// An auxiliary item category feeding one report channel.
///
/// Items of an `exclusive` category are withheld from the invoice; items of
/// a non-exclusive category are both counted and invoiced.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Category {
    pub name: String,
    pub channel: String,
    #[serde(default)]
    pub exclusive: bool,
    pub layout: RowLayout,
    #[serde(default)]
    pub items: Vec<CategoryItem>,
}

impl Category {
    /// Report key for a catalog reference, first match wins
    pub fn key_for(&self, reference: &str) -> Option<&str> {
        self.items.iter().find(|item| item.reference == reference).map(|item| item.key.as_str())
    }
}

/// Customer whose orders must never be invoiced
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SkippedCustomer {
    #[serde(default)]
    pub name: String,
    pub fiscal_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_api_version")]
    pub api_version: String,
    #[serde(default)]
    pub access_token: String,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_version: default_api_version(),
            access_token: String::new(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

fn default_base_url() -> String {
    "https://connect.squareup.com/v2/".to_string()
}

fn default_api_version() -> String {
    "2019-12-17".to_string()
}

fn default_timeout_ms() -> u64 {
    30_000
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Directory holding stores.json and transactions.jsonl
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self { data_dir: default_data_dir() }
    }
}

fn default_data_dir() -> String {
    "data".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct SyncConfig {
    /// Catalog reference of the "print receipt" control item
    #[serde(default)]
    pub print_reference: Option<String>,
    /// Tax tier for items without a recognised tax percentage
    #[serde(default = "default_tax_tier")]
    pub default_tax_tier: String,
    /// Step past a processed order's close time (milliseconds, at least 1)
    #[serde(default = "default_watermark_quantum_ms")]
    pub watermark_quantum_ms: i64,
    #[serde(default)]
    pub skipped_customers: Vec<SkippedCustomer>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            print_reference: None,
            default_tax_tier: default_tax_tier(),
            watermark_quantum_ms: default_watermark_quantum_ms(),
            skipped_customers: Vec::new(),
        }
    }
}

fn default_tax_tier() -> String {
    "ISE".to_string()
}

fn default_watermark_quantum_ms() -> i64 {
    1
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReportConfig {
    #[serde(default)]
    pub timezone: ReportTimezone,
    /// Written in place of a customer name when none is known
    #[serde(default = "default_placeholder")]
    pub placeholder: String,
    /// Days between a reservation and its pickup
    #[serde(default = "default_pickup_days")]
    pub pickup_days: u32,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            timezone: ReportTimezone::default(),
            placeholder: default_placeholder(),
            pickup_days: default_pickup_days(),
        }
    }
}

fn default_placeholder() -> String {
    "not-available".to_string()
}

fn default_pickup_days() -> u32 {
    1
}

/// Destination of one report channel (JSONL file)
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ChannelConfig {
    pub id: String,
    pub file: String,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct TomlConfig {
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub sync: SyncConfig,
    #[serde(default)]
    pub categories: Vec<Category>,
    #[serde(default)]
    pub report: ReportConfig,
    #[serde(default)]
    pub channels: Vec<ChannelConfig>,
}

/// Report rendering settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportSettings {
    pub timezone: ReportTimezone,
    pub placeholder: String,
    pub pickup_days: u32,
}

/// Business rules threaded through one sync run; read-only once built
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncRules {
    pub print_reference: Option<String>,
    pub default_tax_tier: String,
    pub categories: Vec<Category>,
    pub skipped_customers: Vec<SkippedCustomer>,
    pub watermark_quantum: chrono::TimeDelta,
    pub report: ReportSettings,
}

impl Default for SyncRules {
    fn default() -> Self {
        Config::default().sync_rules()
    }
}

/// Main configuration struct used throughout the application
#[derive(Debug, Clone)]
pub struct Config {
    source_base_url: String,
    source_api_version: String,
    source_access_token: String,
    source_timeout_ms: u64,
    data_dir: String,
    print_reference: Option<String>,
    default_tax_tier: String,
    watermark_quantum_ms: i64,
    skipped_customers: Vec<SkippedCustomer>,
    categories: Vec<Category>,
    report_timezone: ReportTimezone,
    report_placeholder: String,
    report_pickup_days: u32,
    channels: Vec<ChannelConfig>,
    config_file: String,
}

impl Default for Config {
    fn default() -> Self {
        Self::from_toml(TomlConfig::default(), "default".to_string())
    }
}

impl Config {
    fn from_toml(toml_config: TomlConfig, config_file: String) -> Self {
        Self {
            source_base_url: toml_config.source.base_url,
            source_api_version: toml_config.source.api_version,
            source_access_token: toml_config.source.access_token,
            source_timeout_ms: toml_config.source.timeout_ms,
            data_dir: toml_config.storage.data_dir,
            print_reference: toml_config.sync.print_reference.filter(|r| !r.is_empty()),
            default_tax_tier: toml_config.sync.default_tax_tier,
            watermark_quantum_ms: toml_config.sync.watermark_quantum_ms,
            skipped_customers: toml_config
                .sync
                .skipped_customers
                .into_iter()
                .map(|s| SkippedCustomer {
                    fiscal_id: normalize_fiscal_id(&s.fiscal_id).unwrap_or_default(),
                    name: s.name,
                })
                .collect(),
            categories: toml_config.categories,
            report_timezone: toml_config.report.timezone,
            report_placeholder: toml_config.report.placeholder,
            report_pickup_days: toml_config.report.pickup_days,
            channels: toml_config.channels,
            config_file,
        }
    }

    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;

        let toml_config: TomlConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;

        Ok(Self::from_toml(toml_config, path.display().to_string()))
    }

    /// Load configuration - tries TOML file first, falls back to defaults
    pub fn load_from_path(path: &str) -> Self {
        let config = match Self::from_file(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Warning: {:#}. Using defaults.", e);
                Self::default()
            }
        };
        config.with_env_overrides()
    }

    fn with_env_overrides(mut self) -> Self {
        if let Ok(token) = env::var(ACCESS_TOKEN_ENV) {
            if !token.is_empty() {
                self.source_access_token = token;
            }
        }
        self
    }

    /// Snapshot of the business rules for one run
    pub fn sync_rules(&self) -> SyncRules {
        SyncRules {
            print_reference: self.print_reference.clone(),
            default_tax_tier: self.default_tax_tier.clone(),
            categories: self.categories.clone(),
            skipped_customers: self.skipped_customers.clone(),
            watermark_quantum: chrono::TimeDelta::milliseconds(self.watermark_quantum_ms.max(1)),
            report: ReportSettings {
                timezone: self.report_timezone,
                placeholder: self.report_placeholder.clone(),
                pickup_days: self.report_pickup_days,
            },
        }
    }

    pub fn source_base_url(&self) -> &str {
        &self.source_base_url
    }

    pub fn source_api_version(&self) -> &str {
        &self.source_api_version
    }

    pub fn source_access_token(&self) -> &str {
        &self.source_access_token
    }

    pub fn source_timeout_ms(&self) -> u64 {
        self.source_timeout_ms
    }

    pub fn data_dir(&self) -> &str {
        &self.data_dir
    }

    pub fn print_reference(&self) -> Option<&str> {
        self.print_reference.as_deref()
    }

    pub fn default_tax_tier(&self) -> &str {
        &self.default_tax_tier
    }

    pub fn categories(&self) -> &[Category] {
        &self.categories
    }

    pub fn skipped_customers(&self) -> &[SkippedCustomer] {
        &self.skipped_customers
    }

    pub fn channels(&self) -> &[ChannelConfig] {
        &self.channels
    }

    pub fn report_timezone(&self) -> ReportTimezone {
        self.report_timezone
    }

    pub fn config_file(&self) -> &str {
        &self.config_file
    }

    /// Builder method for tests to set the watermark quantum
    #[cfg(test)]
    pub fn with_watermark_quantum_ms(mut self, ms: i64) -> Self {
        self.watermark_quantum_ms = ms;
        self
    }

    /// Builder method for tests to point at another API host
    #[cfg(test)]
    pub fn with_source_base_url(mut self, url: &str) -> Self {
        self.source_base_url = url.to_string();
        self
    }
}

//! Report channel publishing
//!
//! Rows are appended in JSONL format (one JSON object per line) to the file
//! configured for each channel. Publishing is best-effort: callers log and
//! move on when a publish fails.

use crate::infra::config::ChannelConfig;
use crate::infra::error::PublishError;
use async_trait::async_trait;
use std::collections::HashMap;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// One report row: field name to value
pub type ReportRow = serde_json::Map<String, serde_json::Value>;

#[async_trait]
pub trait Publisher: Send + Sync {
    async fn publish(&self, channel: &str, row: &ReportRow) -> Result<(), PublishError>;
}

/// Publisher writing each channel to its own JSONL file
pub struct JsonlPublisher {
    channels: HashMap<String, PathBuf>,
}

impl JsonlPublisher {
    pub fn new(channels: &[ChannelConfig]) -> Self {
        let channels: HashMap<String, PathBuf> =
            channels.iter().map(|c| (c.id.clone(), PathBuf::from(&c.file))).collect();
        info!(channels = %channels.len(), "publisher_initialized");
        Self { channels }
    }

    /// Append a line to a channel file
    fn append_line(path: &Path, line: &str) -> std::io::Result<()> {
        // Create parent directories if they don't exist
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        writeln!(file, "{}", line)?;
        Ok(())
    }
}

#[async_trait]
impl Publisher for JsonlPublisher {
    async fn publish(&self, channel: &str, row: &ReportRow) -> Result<(), PublishError> {
        let path = self
            .channels
            .get(channel)
            .ok_or_else(|| PublishError::UnknownChannel(channel.to_string()))?;

        let line = serde_json::to_string(row)?;
        Self::append_line(path, &line)?;
        debug!(channel = %channel, file = %path.display(), bytes = %line.len(), "row_published");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::fs;
    use tempfile::tempdir;

    fn row(key: &str, qty: u64) -> ReportRow {
        let mut row = ReportRow::new();
        row.insert("location".to_string(), json!("CHI"));
        row.insert(key.to_string(), json!(qty));
        row
    }

    #[tokio::test]
    async fn test_publish_appends_rows() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("nested").join("menu.jsonl");
        let publisher = JsonlPublisher::new(&[ChannelConfig {
            id: "menu".to_string(),
            file: file.to_str().unwrap().to_string(),
        }]);

        publisher.publish("menu", &row("soup", 2)).await.unwrap();
        publisher.publish("menu", &row("main", 1)).await.unwrap();

        let content = fs::read_to_string(&file).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        let first: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first["soup"], 2);
        assert_eq!(first["location"], "CHI");
    }

    #[tokio::test]
    async fn test_unknown_channel() {
        let publisher = JsonlPublisher::new(&[]);
        let result = publisher.publish("nope", &row("soup", 1)).await;
        assert!(matches!(result, Err(PublishError::UnknownChannel(c)) if c == "nope"));
    }
}

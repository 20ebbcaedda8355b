pub mod csv;
pub mod json;
pub mod memory;

pub use self::csv::parse_csv;
pub use self::json::parse_json;
pub use self::memory::MemoryLogSource;

use crate::core::{BagMessage, VirtualTime};
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::info;

/// One decoded record of a log
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub topic: String,
    pub message: BagMessage,
}

/// Everything the player needs from a decoded log
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IngestionResult {
    pub start_time: VirtualTime,
    pub end_time: VirtualTime,
    /// topic -> message type name
    pub connections: BTreeMap<String, String>,
    pub records: Vec<Record>,
}

impl IngestionResult {
    /// Build a result whose bounds span the earliest and latest record stamps
    pub fn from_records(connections: BTreeMap<String, String>, records: Vec<Record>) -> Self {
        let start_time = records.iter().map(|r| r.message.stamp()).min().unwrap_or_default();
        let end_time = records.iter().map(|r| r.message.stamp()).max().unwrap_or_default();
        Self {
            start_time,
            end_time,
            connections,
            records,
        }
    }
}

/// Input format detection result
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InputFormat {
    Json,
    Csv,
    Unknown,
}

/// Detect the format of a decoded log by looking at its first bytes
pub fn detect_format(data: &[u8]) -> InputFormat {
    if is_json(data) {
        return InputFormat::Json;
    }

    if is_csv(data) {
        return InputFormat::Csv;
    }

    InputFormat::Unknown
}

fn is_json(data: &[u8]) -> bool {
    data.iter().find(|b| !b.is_ascii_whitespace()) == Some(&b'{')
}

fn is_csv(data: &[u8]) -> bool {
    if data.len() < 10 {
        return false;
    }

    // A header line with at least one comma within the first 500 bytes
    let end = data.len().min(500);
    match std::str::from_utf8(&data[..end]) {
        Ok(text) => text.lines().next().is_some_and(|line| line.contains(',')),
        // The cut may have landed inside a multi-byte character
        Err(e) if e.valid_up_to() > 0 && e.error_len().is_none() => {
            is_csv(&data[..e.valid_up_to()])
        }
        Err(_) => false,
    }
}

/// Decode a log held in memory, auto-detecting its format
pub fn parse_log(data: &[u8]) -> Result<IngestionResult> {
    match detect_format(data) {
        InputFormat::Json => parse_json(data),
        InputFormat::Csv => parse_csv(data),
        InputFormat::Unknown => anyhow::bail!("Unknown input format"),
    }
}

/// Producer of decoded logs for the player
///
/// Ingestion is the only asynchronous step of playback: the caller awaits it
/// once and hands the result to the engine in a single bulk load.
#[async_trait]
pub trait LogSource: Send {
    /// Name shown in logs, usually the file path
    fn name(&self) -> &str;

    /// Decode the whole log
    async fn ingest(&mut self) -> Result<IngestionResult>;
}

/// Decoded log read from disk
pub struct FileLogSource {
    path: PathBuf,
    name: String,
}

impl FileLogSource {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref().to_path_buf();
        let name = path.to_string_lossy().to_string();
        Self { path, name }
    }
}

#[async_trait]
impl LogSource for FileLogSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn ingest(&mut self) -> Result<IngestionResult> {
        let data = tokio::fs::read(&self.path)
            .await
            .with_context(|| format!("Failed to read log file: {:?}", self.path))?;
        let result = parse_log(&data).with_context(|| format!("Failed to decode log file: {:?}", self.path))?;
        info!(
            "Decoded {} records on {} topics from {}",
            result.records.len(),
            result.connections.len(),
            self.name
        );
        Ok(result)
    }
}

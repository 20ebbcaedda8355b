use anyhow::Result;
use async_trait::async_trait;
use crate::input::{IngestionResult, LogSource};

/// In-memory log source
///
/// Serves a prepared ingestion result, or a prepared failure, without
/// touching the filesystem. Useful for tests and for hosts that decode logs
/// themselves.
pub struct MemoryLogSource {
    name: String,
    outcome: std::result::Result<IngestionResult, String>,
    ingest_count: usize,
}

impl MemoryLogSource {
    pub fn new(name: &str, result: IngestionResult) -> Self {
        Self {
            name: name.to_string(),
            outcome: Ok(result),
            ingest_count: 0,
        }
    }

    /// Source whose ingestion always fails with `reason`
    pub fn failing(name: &str, reason: &str) -> Self {
        Self {
            name: name.to_string(),
            outcome: Err(reason.to_string()),
            ingest_count: 0,
        }
    }

    /// Number of times the log was ingested
    pub fn ingest_count(&self) -> usize {
        self.ingest_count
    }
}

#[async_trait]
impl LogSource for MemoryLogSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn ingest(&mut self) -> Result<IngestionResult> {
        self.ingest_count += 1;
        match &self.outcome {
            Ok(result) => Ok(result.clone()),
            Err(reason) => Err(anyhow::anyhow!("{}: {}", self.name, reason)),
        }
    }
}

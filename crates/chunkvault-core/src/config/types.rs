use std::path::PathBuf;
use std::time::Duration;

use fastcdc::v2020::{
    AVERAGE_MAX, AVERAGE_MIN, MAXIMUM_MAX, MAXIMUM_MIN, MINIMUM_MAX, MINIMUM_MIN,
};
use serde::{Deserialize, Serialize};

use chunkvault_storage::{RetryConfig, StorageConfig};
use chunkvault_types::error::{ChunkVaultError, Result};

use super::defaults::*;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChunkVaultConfig {
    #[serde(default)]
    pub storage: StorageSection,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub chunker: ChunkerConfig,
    #[serde(default)]
    pub retry: RetryConfig,
}

impl ChunkVaultConfig {
    /// Reject settings the pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        let p = &self.pipeline;
        if p.flush_threshold == 0 {
            return Err(ChunkVaultError::Config(
                "pipeline.flush_threshold must be greater than zero".into(),
            ));
        }
        if p.workers == 0 {
            return Err(ChunkVaultError::Config(
                "pipeline.workers must be greater than zero".into(),
            ));
        }
        if p.task_queue_capacity == 0 {
            return Err(ChunkVaultError::Config(
                "pipeline.task_queue_capacity must be greater than zero".into(),
            ));
        }
        if p.session_flush_size == 0 {
            return Err(ChunkVaultError::Config(
                "pipeline.session_flush_size must be greater than zero".into(),
            ));
        }
        p.poll_interval()?;
        p.idle_timeout()?;
        if self.retrieval.fetch_threads == 0 {
            return Err(ChunkVaultError::Config(
                "retrieval.fetch_threads must be greater than zero".into(),
            ));
        }
        self.chunker.validate()
    }

    /// Storage settings for [`chunkvault_storage::backend_from_config`].
    pub fn storage_config(&self) -> StorageConfig {
        StorageConfig {
            blob_dir: self.storage.blob_dir.as_ref().map(PathBuf::from),
            index_dir: self.storage.index_dir.as_ref().map(PathBuf::from),
            retry: self.retry.clone(),
        }
    }
}

/// Where blobs and index records live. Unset directories select the
/// in-memory stores.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageSection {
    #[serde(default)]
    pub blob_dir: Option<String>,
    #[serde(default)]
    pub index_dir: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Chunks per task; also the size-flush trigger.
    #[serde(default = "default_flush_threshold")]
    pub flush_threshold: usize,
    /// How often the dispatcher inspects the queue (e.g. "10s").
    #[serde(default = "default_poll_interval")]
    pub poll_interval: String,
    /// Flush a partial task after this long without a flush (e.g. "60s").
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout: String,
    /// Number of upload workers.
    #[serde(default = "default_workers")]
    pub workers: usize,
    /// Tasks that may wait for a worker before `submit` blocks.
    #[serde(default = "default_task_queue_capacity")]
    pub task_queue_capacity: usize,
    /// Records an ingest session buffers before passing them through the dedup gate.
    #[serde(default = "default_session_flush_size")]
    pub session_flush_size: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            flush_threshold: default_flush_threshold(),
            poll_interval: default_poll_interval(),
            idle_timeout: default_idle_timeout(),
            workers: default_workers(),
            task_queue_capacity: default_task_queue_capacity(),
            session_flush_size: default_session_flush_size(),
        }
    }
}

impl PipelineConfig {
    pub fn poll_interval(&self) -> Result<Duration> {
        parse_human_duration(&self.poll_interval)
    }

    pub fn idle_timeout(&self) -> Result<Duration> {
        parse_human_duration(&self.idle_timeout)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Concurrent range reads per retrieval.
    #[serde(default = "default_fetch_threads")]
    pub fetch_threads: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            fetch_threads: default_fetch_threads(),
        }
    }
}

/// Content-defined chunking bounds used when splitting a local file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkerConfig {
    #[serde(default = "default_min_size")]
    pub min_size: u32,
    #[serde(default = "default_avg_size")]
    pub avg_size: u32,
    #[serde(default = "default_max_size")]
    pub max_size: u32,
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            min_size: default_min_size(),
            avg_size: default_avg_size(),
            max_size: default_max_size(),
        }
    }
}

impl ChunkerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.min_size > self.avg_size || self.avg_size > self.max_size {
            return Err(ChunkVaultError::Config(format!(
                "chunker sizes must satisfy min ({}) <= avg ({}) <= max ({})",
                self.min_size, self.avg_size, self.max_size
            )));
        }
        let bounds = [
            ("min_size", self.min_size, MINIMUM_MIN, MINIMUM_MAX),
            ("avg_size", self.avg_size, AVERAGE_MIN, AVERAGE_MAX),
            ("max_size", self.max_size, MAXIMUM_MIN, MAXIMUM_MAX),
        ];
        for (name, value, lo, hi) in bounds {
            if !(lo..=hi).contains(&value) {
                return Err(ChunkVaultError::Config(format!(
                    "chunker.{name} must be between {lo} and {hi}, got {value}"
                )));
            }
        }
        Ok(())
    }
}

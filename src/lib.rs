//! Sumi-Harvest: a resumable, polite acquisition pipeline
//!
//! This crate drives long-running, multi-phase acquisition jobs. Work is split
//! into fixed-size batches that are checkpointed to disk so an interrupted run
//! picks up where it stopped, and each item is acquired through a tiered
//! fetch protocol that escalates from a cheap method to an expensive one only
//! when the cheap result is missing required fields.

pub mod acquire;
pub mod config;
pub mod limiter;
pub mod pipeline;
pub mod record;
pub mod storage;
pub mod testing;
pub mod url;

use thiserror::Error;

/// Main error type for Sumi-Harvest operations
#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Checkpoint store error: {0}")]
    Store(#[from] storage::StoreError),

    #[error("Batch {batch} of phase '{phase}' failed: {source}")]
    BatchFailed {
        phase: String,
        batch: usize,
        source: Box<dyn std::error::Error + Send + Sync + 'static>,
    },

    #[error("Batch size must be at least 1")]
    InvalidBatchSize,

    #[error("Invalid phase name '{0}'")]
    InvalidPhase(String),

    #[error("Fetch error: {0}")]
    Fetch(#[from] acquire::FetchError),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Operation cancelled")]
    Cancelled,
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Invalid domain pattern: {0}")]
    InvalidPattern(String),
}

/// Result type alias for Sumi-Harvest operations
pub type Result<T> = std::result::Result<T, HarvestError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use acquire::{
    Acquisition, AcquisitionEscalator, Fetcher, Fields, RequiredFieldsEvaluator, RetryPolicy,
    SufficiencyEvaluator,
};
pub use config::Config;
pub use limiter::{Quota, RateLimiter};
pub use pipeline::{partition, process_concurrently, BatchPipeline};
pub use record::Record;
pub use storage::{CheckpointStore, FileCheckpointStore, MemoryCheckpointStore, StoreError};

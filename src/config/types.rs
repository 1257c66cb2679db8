use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Main configuration structure for Sumi-Harvest
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub acquisition: AcquisitionConfig,
    #[serde(rename = "rate-limit", default)]
    pub rate_limit: RateLimitConfig,
    #[serde(rename = "user-agent")]
    pub user_agent: UserAgentConfig,
}

/// Batch pipeline configuration
#[derive(Debug, Clone, Deserialize)]
pub struct PipelineConfig {
    /// Directory holding batch files and the phase marker document
    #[serde(rename = "checkpoint-dir")]
    pub checkpoint_dir: PathBuf,

    /// Default number of items per batch
    #[serde(rename = "batch-size")]
    pub batch_size: usize,

    /// Maximum number of items processed concurrently inside one batch
    #[serde(rename = "max-concurrent-workers")]
    pub max_concurrent_workers: usize,

    /// Per-phase overrides
    #[serde(rename = "phase", default)]
    pub phases: Vec<PhaseEntry>,
}

impl PipelineConfig {
    /// Returns the batch size for a phase, falling back to the default
    pub fn batch_size_for(&self, phase: &str) -> usize {
        self.phases
            .iter()
            .find(|entry| entry.name == phase)
            .and_then(|entry| entry.batch_size)
            .unwrap_or(self.batch_size)
    }
}

/// Per-phase pipeline settings
#[derive(Debug, Clone, Deserialize)]
pub struct PhaseEntry {
    pub name: String,

    #[serde(rename = "batch-size")]
    pub batch_size: Option<usize>,
}

/// Retry/backoff configuration for transient failures
#[derive(Debug, Clone, Deserialize)]
pub struct RetryConfig {
    #[serde(rename = "max-attempts")]
    pub max_attempts: u32,

    /// Delay before the second attempt (milliseconds)
    #[serde(rename = "wait-min-ms")]
    pub wait_min_ms: u64,

    /// Upper bound on any single delay (milliseconds)
    #[serde(rename = "wait-max-ms")]
    pub wait_max_ms: u64,

    pub multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            wait_min_ms: 1000,
            wait_max_ms: 30_000,
            multiplier: 2.0,
        }
    }
}

/// Tiered acquisition configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AcquisitionConfig {
    /// Total fetch attempts per item across all tiers
    #[serde(rename = "max-attempts")]
    pub max_attempts: u32,

    /// How many of those attempts use the cheap tier before escalating
    #[serde(rename = "tier1-attempts", default = "default_tier1_attempts")]
    pub tier1_attempts: u32,

    /// Fields an acquisition must produce to count as sufficient
    #[serde(rename = "required-fields", default)]
    pub required_fields: Vec<String>,
}

fn default_tier1_attempts() -> u32 {
    1
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            tier1_attempts: 1,
            required_fields: Vec::new(),
        }
    }
}

/// Rate limit configuration: a default quota plus per-domain overrides
#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    /// Admissions allowed per period
    #[serde(rename = "max-rate")]
    pub max_rate: u32,

    /// Length of the admission window (milliseconds)
    #[serde(rename = "period-ms")]
    pub period_ms: u64,

    #[serde(rename = "domain", default)]
    pub domains: Vec<DomainRateEntry>,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_rate: 1,
            period_ms: 1000,
            domains: Vec::new(),
        }
    }
}

/// Rate limit override for a domain pattern (e.g. "*.example.com")
#[derive(Debug, Clone, Deserialize)]
pub struct DomainRateEntry {
    pub domain: String,

    #[serde(rename = "max-rate")]
    pub max_rate: u32,

    #[serde(rename = "period-ms")]
    pub period_ms: u64,
}

impl DomainRateEntry {
    pub fn period(&self) -> Duration {
        Duration::from_millis(self.period_ms)
    }
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
pub struct UserAgentConfig {
    /// Name of the harvester
    #[serde(rename = "crawler-name")]
    pub crawler_name: String,

    /// Version of the harvester
    #[serde(rename = "crawler-version")]
    pub crawler_version: String,

    /// URL with information about the harvester
    #[serde(rename = "contact-url")]
    pub contact_url: String,

    /// Email address for harvester-related contact
    #[serde(rename = "contact-email")]
    pub contact_email: String,
}

impl UserAgentConfig {
    /// Formats the header value: `Name/Version (+ContactURL; ContactEmail)`
    pub fn header_value(&self) -> String {
        format!(
            "{}/{} (+{}; {})",
            self.crawler_name, self.crawler_version, self.contact_url, self.contact_email
        )
    }
}

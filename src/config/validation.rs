use crate::config::types::{
    AcquisitionConfig, Config, DomainRateEntry, PipelineConfig, RateLimitConfig, RetryConfig,
    UserAgentConfig,
};
use crate::storage::is_valid_phase_name;
use crate::ConfigError;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_pipeline_config(&config.pipeline)?;
    validate_retry_config(&config.retry)?;
    validate_acquisition_config(&config.acquisition)?;
    validate_rate_limit_config(&config.rate_limit)?;
    validate_user_agent_config(&config.user_agent)?;
    Ok(())
}

/// Validates pipeline configuration and per-phase overrides
fn validate_pipeline_config(config: &PipelineConfig) -> Result<(), ConfigError> {
    if config.checkpoint_dir.as_os_str().is_empty() {
        return Err(ConfigError::Validation(
            "checkpoint_dir cannot be empty".to_string(),
        ));
    }

    if config.batch_size < 1 {
        return Err(ConfigError::Validation(format!(
            "batch_size must be >= 1, got {}",
            config.batch_size
        )));
    }

    if config.max_concurrent_workers < 1 || config.max_concurrent_workers > 100 {
        return Err(ConfigError::Validation(format!(
            "max_concurrent_workers must be between 1 and 100, got {}",
            config.max_concurrent_workers
        )));
    }

    for entry in &config.phases {
        if !is_valid_phase_name(&entry.name) {
            return Err(ConfigError::Validation(format!(
                "Phase name '{}' may only contain alphanumerics, '-', '_' and '.', and cannot start with '.'",
                entry.name
            )));
        }

        if entry.batch_size == Some(0) {
            return Err(ConfigError::Validation(format!(
                "batch_size for phase '{}' must be >= 1",
                entry.name
            )));
        }
    }

    Ok(())
}

/// Validates retry configuration
fn validate_retry_config(config: &RetryConfig) -> Result<(), ConfigError> {
    if config.max_attempts < 1 {
        return Err(ConfigError::Validation(format!(
            "retry max_attempts must be >= 1, got {}",
            config.max_attempts
        )));
    }

    if config.wait_min_ms > config.wait_max_ms {
        return Err(ConfigError::Validation(format!(
            "wait_min_ms ({}) cannot exceed wait_max_ms ({})",
            config.wait_min_ms, config.wait_max_ms
        )));
    }

    if !config.multiplier.is_finite() || config.multiplier < 1.0 {
        return Err(ConfigError::Validation(format!(
            "multiplier must be a finite value >= 1.0, got {}",
            config.multiplier
        )));
    }

    Ok(())
}

/// Validates acquisition configuration
fn validate_acquisition_config(config: &AcquisitionConfig) -> Result<(), ConfigError> {
    if config.max_attempts < 1 {
        return Err(ConfigError::Validation(format!(
            "acquisition max_attempts must be >= 1, got {}",
            config.max_attempts
        )));
    }

    if config.tier1_attempts > config.max_attempts {
        return Err(ConfigError::Validation(format!(
            "tier1_attempts ({}) cannot exceed max_attempts ({})",
            config.tier1_attempts, config.max_attempts
        )));
    }

    if config.required_fields.iter().any(|f| f.trim().is_empty()) {
        return Err(ConfigError::Validation(
            "required_fields cannot contain empty names".to_string(),
        ));
    }

    Ok(())
}

/// Validates the default quota and every domain override
fn validate_rate_limit_config(config: &RateLimitConfig) -> Result<(), ConfigError> {
    validate_quota("default", config.max_rate, config.period_ms)?;

    for entry in &config.domains {
        validate_domain_rate_entry(entry)?;
    }

    Ok(())
}

fn validate_domain_rate_entry(entry: &DomainRateEntry) -> Result<(), ConfigError> {
    validate_domain_pattern(&entry.domain)?;
    validate_quota(&entry.domain, entry.max_rate, entry.period_ms)
}

fn validate_quota(label: &str, max_rate: u32, period_ms: u64) -> Result<(), ConfigError> {
    if max_rate < 1 {
        return Err(ConfigError::Validation(format!(
            "max_rate for '{}' must be >= 1, got {}",
            label, max_rate
        )));
    }

    if period_ms < 1 {
        return Err(ConfigError::Validation(format!(
            "period_ms for '{}' must be >= 1, got {}",
            label, period_ms
        )));
    }

    Ok(())
}

/// Validates user agent configuration
fn validate_user_agent_config(config: &UserAgentConfig) -> Result<(), ConfigError> {
    if config.crawler_name.is_empty() {
        return Err(ConfigError::Validation(
            "crawler_name cannot be empty".to_string(),
        ));
    }

    if !config
        .crawler_name
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-')
    {
        return Err(ConfigError::Validation(format!(
            "crawler_name must contain only alphanumeric characters and hyphens, got '{}'",
            config.crawler_name
        )));
    }

    Url::parse(&config.contact_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid contact_url: {}", e)))?;

    validate_email(&config.contact_email)?;

    Ok(())
}

/// Validates a domain pattern (supports a leading "*." wildcard)
fn validate_domain_pattern(pattern: &str) -> Result<(), ConfigError> {
    if pattern.is_empty() {
        return Err(ConfigError::InvalidPattern(
            "Domain pattern cannot be empty".to_string(),
        ));
    }

    match pattern.strip_prefix("*.") {
        Some(domain) => validate_domain_string(domain),
        None => validate_domain_string(pattern),
    }
}

/// Validates a domain string (without wildcard prefix)
fn validate_domain_string(domain: &str) -> Result<(), ConfigError> {
    if domain.is_empty() {
        return Err(ConfigError::InvalidPattern(
            "Domain cannot be empty".to_string(),
        ));
    }

    if !domain
        .chars()
        .all(|c| c.is_alphanumeric() || c == '.' || c == '-')
    {
        return Err(ConfigError::InvalidPattern(format!(
            "Domain '{}' contains invalid characters",
            domain
        )));
    }

    if domain.starts_with('.')
        || domain.ends_with('.')
        || domain.starts_with('-')
        || domain.ends_with('-')
    {
        return Err(ConfigError::InvalidPattern(format!(
            "Domain '{}' cannot start or end with '.' or '-'",
            domain
        )));
    }

    if domain.contains("..") {
        return Err(ConfigError::InvalidPattern(format!(
            "Domain '{}' cannot contain consecutive dots",
            domain
        )));
    }

    if !domain.contains('.') {
        return Err(ConfigError::InvalidPattern(format!(
            "Domain '{}' must contain at least one dot (e.g., 'example.com')",
            domain
        )));
    }

    Ok(())
}

/// Basic email validation
fn validate_email(email: &str) -> Result<(), ConfigError> {
    let (local, domain) = match email.split_once('@') {
        Some(parts) => parts,
        None => {
            return Err(ConfigError::Validation(format!(
                "Invalid email format: '{}'",
                email
            )))
        }
    };

    if local.is_empty() || domain.is_empty() || domain.contains('@') {
        return Err(ConfigError::Validation(format!(
            "Invalid email format: '{}'",
            email
        )));
    }

    if !domain.contains('.') {
        return Err(ConfigError::Validation(format!(
            "Invalid email domain: '{}'",
            email
        )));
    }

    Ok(())
}

use crate::config::RateLimitConfig;
use crate::limiter::bucket::{AdmissionBucket, Quota};
use crate::url::matches_domain_pattern;
use crate::ConfigError;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Mutex as AsyncMutex;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

type SharedBucket = Arc<AsyncMutex<AdmissionBucket>>;

/// Per-key rate limiter
///
/// Each distinct key (normally a host, see [`crate::url::rate_limit_key`])
/// gets its own [`AdmissionBucket`], created on first use with the quota of
/// the first matching domain override, or the default quota. Callers sharing
/// a key queue on that bucket's async mutex, which hands out the lock in
/// arrival order, so admission is first-come-first-served and no caller
/// waits forever while the rate is positive. Different keys never contend.
pub struct RateLimiter {
    default_quota: Quota,

    /// Ordered (pattern, quota) overrides; the first match wins
    overrides: Vec<(String, Quota)>,

    buckets: Mutex<HashMap<String, SharedBucket>>,
}

impl RateLimiter {
    /// Creates a limiter that applies `default_quota` to every key
    pub fn new(default_quota: Quota) -> Self {
        Self {
            default_quota,
            overrides: Vec::new(),
            buckets: Mutex::new(HashMap::new()),
        }
    }

    /// Adds a domain-pattern override (`example.com` or `*.example.com`)
    pub fn with_override(mut self, pattern: impl Into<String>, quota: Quota) -> Self {
        self.overrides.push((pattern.into().to_lowercase(), quota));
        self
    }

    /// Builds a limiter from the `[rate-limit]` configuration section
    pub fn from_config(config: &RateLimitConfig) -> Result<Self, ConfigError> {
        let default_quota =
            Quota::per_period(config.max_rate, Duration::from_millis(config.period_ms))
                .ok_or_else(|| {
                    ConfigError::Validation("default max_rate must be >= 1".to_string())
                })?;

        let mut limiter = Self::new(default_quota);
        for entry in &config.domains {
            let quota = Quota::per_period(entry.max_rate, entry.period()).ok_or_else(|| {
                ConfigError::Validation(format!("max_rate for '{}' must be >= 1", entry.domain))
            })?;
            limiter = limiter.with_override(entry.domain.clone(), quota);
        }

        Ok(limiter)
    }

    /// Resolves the quota a key's bucket is created with
    pub fn quota_for(&self, key: &str) -> Quota {
        self.overrides
            .iter()
            .find(|(pattern, _)| matches_domain_pattern(pattern, key))
            .map(|(_, quota)| *quota)
            .unwrap_or(self.default_quota)
    }

    /// Waits until `key` may make a request, then records the admission
    pub async fn acquire(&self, key: &str) {
        let bucket = self.bucket(key);
        let mut guard = bucket.lock().await;

        loop {
            match guard.try_admit(Instant::now()) {
                Ok(()) => return,
                Err(wait) => {
                    tracing::trace!("Rate limit for {} reached, waiting {:?}", key, wait);
                    tokio::time::sleep(wait).await;
                }
            }
        }
    }

    /// Like [`acquire`](Self::acquire), but gives up when `cancel` fires
    ///
    /// Returns `true` if the caller was admitted and `false` if it was
    /// cancelled first. A cancelled caller consumes no admission.
    pub async fn acquire_until(&self, key: &str, cancel: &CancellationToken) -> bool {
        let bucket = self.bucket(key);
        let mut guard = tokio::select! {
            biased;
            _ = cancel.cancelled() => return false,
            guard = bucket.lock() => guard,
        };

        loop {
            match guard.try_admit(Instant::now()) {
                Ok(()) => return true,
                Err(wait) => {
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => {
                            tracing::debug!("Admission wait for {} cancelled", key);
                            return false;
                        }
                        _ = tokio::time::sleep(wait) => {}
                    }
                }
            }
        }
    }

    /// Number of keys that have a bucket
    pub fn bucket_count(&self) -> usize {
        self.lock_buckets().len()
    }

    /// Total admissions granted to `key` so far
    pub async fn admitted(&self, key: &str) -> u64 {
        let bucket = self.lock_buckets().get(key).cloned();
        match bucket {
            Some(bucket) => bucket.lock().await.admitted,
            None => 0,
        }
    }

    fn bucket(&self, key: &str) -> SharedBucket {
        let mut buckets = self.lock_buckets();
        if let Some(bucket) = buckets.get(key) {
            return Arc::clone(bucket);
        }

        let quota = self.quota_for(key);
        tracing::debug!(
            "Creating admission bucket for {}: {} per {:?}",
            key,
            quota.max_rate,
            quota.period
        );
        let bucket = Arc::new(AsyncMutex::new(AdmissionBucket::new(quota)));
        buckets.insert(key.to_string(), Arc::clone(&bucket));
        bucket
    }

    fn lock_buckets(&self) -> std::sync::MutexGuard<'_, HashMap<String, SharedBucket>> {
        // The map is only touched for lookups and inserts, which cannot leave
        // it half-updated, so a poisoned lock is still safe to use.
        self.buckets
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

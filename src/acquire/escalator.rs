//! Tiered acquisition
//!
//! The escalator runs a small state machine per target:
//!
//! ```text
//! Tier1 ──► Evaluate ──► Done          (sufficient, or attempts exhausted)
//!              │
//!              └──► Tier1 / Tier2 ──► Evaluate ...
//! ```
//!
//! The first `tier1_attempts` fetches use the cheap tier; every later one
//! uses the expensive tier. Once an attempt has gone to tier 2 the escalator
//! never steps back down.

use crate::acquire::evaluator::SufficiencyEvaluator;
use crate::acquire::fetch::{FetchError, Fetcher, Fields};
use crate::acquire::retry::RetryPolicy;
use crate::config::AcquisitionConfig;
use crate::limiter::RateLimiter;
use crate::record::Record;
use crate::url::rate_limit_key;
use serde::Serialize;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Acquisition method tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Tier1,
    Tier2,
}

impl Tier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Tier1 => "tier1",
            Tier::Tier2 => "tier2",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Tier1,
    Evaluate,
    Tier2,
    Done,
}

/// Per-target working state; never persisted
#[derive(Debug)]
struct AttemptState {
    tier: Tier,
    data: Fields,
    missing_fields: Vec<String>,
    attempts_used: u32,
    sufficient: bool,
    errors: Vec<String>,
}

impl AttemptState {
    fn new(required: &[String]) -> Self {
        Self {
            tier: Tier::Tier1,
            data: Fields::new(),
            missing_fields: required.to_vec(),
            attempts_used: 0,
            sufficient: false,
            errors: Vec::new(),
        }
    }

    /// Folds a fetch result into the accumulated data; nulls never erase
    fn absorb(&mut self, fetched: Fields) {
        for (key, value) in fetched {
            if !value.is_null() {
                self.data.insert(key, value);
            }
        }
    }
}

/// Final outcome for one target
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Acquisition {
    /// Best-effort data merged across every successful fetch
    pub data: Fields,
    pub sufficient: bool,
    /// Empty when `sufficient` is true
    pub missing_fields: Vec<String>,
    /// Fetch passes consumed, at most `max_attempts`
    pub attempts: u32,
    /// Tier of the last fetch pass
    pub final_tier: Tier,
    /// Fetch and evaluation failures that were absorbed along the way
    pub errors: Vec<String>,
}

impl Acquisition {
    /// Flattens the outcome into a checkpoint record keyed by `id`
    ///
    /// Acquired fields come first; the outcome keys (`sufficient`,
    /// `missing_fields`, `attempts`, `tier`) overwrite any fetched field of
    /// the same name. An insufficient outcome that hit failures also carries
    /// them under `error`, marking the record as degraded.
    pub fn into_record(self, id: impl Into<String>) -> Record {
        let mut record = Record::new(id);
        record
            .fields
            .extend(self.data.into_iter().filter(|(key, _)| key != "id"));

        record.insert("sufficient", self.sufficient);
        record.insert("missing_fields", self.missing_fields);
        record.insert("attempts", self.attempts);
        record.insert("tier", self.final_tier.as_str());
        if !self.sufficient && !self.errors.is_empty() {
            record.insert("error", self.errors.join("; "));
        }
        record
    }
}

impl From<AttemptState> for Acquisition {
    fn from(state: AttemptState) -> Self {
        Self {
            data: state.data,
            sufficient: state.sufficient,
            missing_fields: if state.sufficient {
                Vec::new()
            } else {
                state.missing_fields
            },
            attempts: state.attempts_used,
            final_tier: state.tier,
            errors: state.errors,
        }
    }
}

/// Escalates from a cheap fetcher to an expensive one until the evaluator is
/// satisfied or the attempt budget runs out
///
/// Every fetch goes through the shared [`RateLimiter`] (keyed by the
/// target's host) and the configured [`RetryPolicy`]. The escalator itself
/// never fails: fetch and evaluator errors are logged, recorded in
/// [`Acquisition::errors`], and treated as "not sufficient yet".
pub struct AcquisitionEscalator {
    limiter: Arc<RateLimiter>,
    retry: RetryPolicy,
    evaluator: Arc<dyn SufficiencyEvaluator>,
    tier1: Arc<dyn Fetcher>,
    tier2: Arc<dyn Fetcher>,
    max_attempts: u32,
    tier1_attempts: u32,
    cancel: Option<CancellationToken>,
}

impl AcquisitionEscalator {
    pub fn new(
        limiter: Arc<RateLimiter>,
        evaluator: Arc<dyn SufficiencyEvaluator>,
        tier1: Arc<dyn Fetcher>,
        tier2: Arc<dyn Fetcher>,
    ) -> Self {
        Self {
            limiter,
            retry: RetryPolicy::default(),
            evaluator,
            tier1,
            tier2,
            max_attempts: 3,
            tier1_attempts: 1,
            cancel: None,
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = match &self.cancel {
            Some(token) => retry.with_cancellation(token.clone()),
            None => retry,
        };
        self
    }

    /// Sets the total attempt budget (at least 1)
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    /// Sets how many leading attempts use tier 1; 0 goes straight to tier 2
    pub fn with_tier1_attempts(mut self, tier1_attempts: u32) -> Self {
        self.tier1_attempts = tier1_attempts;
        self
    }

    pub fn with_config(self, config: &AcquisitionConfig) -> Self {
        self.with_max_attempts(config.max_attempts)
            .with_tier1_attempts(config.tier1_attempts)
    }

    /// Abandons limiter and backoff waits once `token` fires
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.retry = self.retry.clone().with_cancellation(token.clone());
        self.cancel = Some(token);
        self
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Acquires `target`, escalating until `required` is covered
    pub async fn acquire(&self, target: &str, required: &[String]) -> Acquisition {
        let mut state = AttemptState::new(required);
        let mut stage = self.next_fetch_stage(&state);

        loop {
            stage = match stage {
                Stage::Tier1 => {
                    self.fetch_pass(Tier::Tier1, target, &mut state).await;
                    Stage::Evaluate
                }
                Stage::Tier2 => {
                    self.fetch_pass(Tier::Tier2, target, &mut state).await;
                    Stage::Evaluate
                }
                Stage::Evaluate => self.evaluate(target, required, &mut state).await,
                Stage::Done => break,
            };
        }

        tracing::debug!(
            "Acquired {} in {} attempt(s), sufficient={}",
            target,
            state.attempts_used,
            state.sufficient
        );
        state.into()
    }

    /// Picks the tier for the next attempt, or `Done` when the budget is spent
    fn next_fetch_stage(&self, state: &AttemptState) -> Stage {
        if state.attempts_used >= self.max_attempts || self.is_cancelled() {
            return Stage::Done;
        }
        if state.tier == Tier::Tier1 && state.attempts_used < self.tier1_attempts {
            Stage::Tier1
        } else {
            Stage::Tier2
        }
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(|t| t.is_cancelled())
    }

    async fn fetch_pass(&self, tier: Tier, target: &str, state: &mut AttemptState) {
        state.tier = tier;
        state.attempts_used += 1;
        tracing::debug!(
            "Attempt {}/{} for {} using {:?}",
            state.attempts_used,
            self.max_attempts,
            target,
            tier
        );

        match self.fetch(tier, target).await {
            Ok(fields) => state.absorb(fields),
            Err(e) => {
                tracing::warn!("{:?} fetch failed for {}: {}", tier, target, e);
                state.errors.push(e.to_string());
            }
        }
    }

    /// One rate-limited, retried fetch
    async fn fetch(&self, tier: Tier, target: &str) -> Result<Fields, FetchError> {
        let fetcher: &dyn Fetcher = match tier {
            Tier::Tier1 => self.tier1.as_ref(),
            Tier::Tier2 => self.tier2.as_ref(),
        };
        let limiter: &RateLimiter = &self.limiter;
        let cancel = self.cancel.as_ref();
        let key = rate_limit_key(target);
        let key = key.as_str();

        self.retry
            .run(
                move || async move {
                    match cancel {
                        Some(token) => {
                            if !limiter.acquire_until(key, token).await {
                                return Err(FetchError::permanent(target, "cancelled"));
                            }
                        }
                        None => limiter.acquire(key).await,
                    }
                    fetcher.fetch(target).await
                },
                FetchError::is_transient,
            )
            .await
    }

    async fn evaluate(&self, target: &str, required: &[String], state: &mut AttemptState) -> Stage {
        match self.evaluator.evaluate(&state.data, required).await {
            Ok(verdict) if verdict.sufficient && verdict.missing_fields.is_empty() => {
                state.sufficient = true;
                state.missing_fields.clear();
                return Stage::Done;
            }
            Ok(verdict) => {
                if !verdict.missing_fields.is_empty() {
                    state.missing_fields = verdict.missing_fields;
                }
                tracing::debug!(
                    "{} insufficient after attempt {}: missing {:?}",
                    target,
                    state.attempts_used,
                    state.missing_fields
                );
            }
            Err(e) => {
                tracing::warn!("Evaluation failed for {}: {}", target, e);
                state.errors.push(e.to_string());
            }
        }

        self.next_fetch_stage(state)
    }
}

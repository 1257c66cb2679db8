//! Testing utilities including scripted collaborators.
//!
//! These make it possible to exercise the escalator and the pipeline without
//! network calls: each mock plays back a queue of prepared outcomes and
//! records how it was called.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};

use crate::acquire::{
    EvaluationError, FetchError, Fetcher, Fields, Sufficiency, SufficiencyEvaluator,
};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// A fetcher that replays queued results.
///
/// Once the queue is drained every call returns the fallback, which defaults
/// to an empty field map.
pub struct ScriptedFetcher {
    name: String,
    responses: Mutex<VecDeque<Result<Fields, FetchError>>>,
    fallback: Result<Fields, FetchError>,
    targets: Mutex<Vec<String>>,
}

impl ScriptedFetcher {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            responses: Mutex::new(VecDeque::new()),
            fallback: Ok(Fields::new()),
            targets: Mutex::new(Vec::new()),
        }
    }

    /// Queue a successful fetch.
    pub fn with_fields(self, fields: Fields) -> Self {
        lock(&self.responses).push_back(Ok(fields));
        self
    }

    /// Queue a failed fetch.
    pub fn with_error(self, error: FetchError) -> Self {
        lock(&self.responses).push_back(Err(error));
        self
    }

    /// Result returned once the queue is empty.
    pub fn with_fallback(mut self, fallback: Result<Fields, FetchError>) -> Self {
        self.fallback = fallback;
        self
    }

    /// Number of fetches made so far.
    pub fn calls(&self) -> usize {
        lock(&self.targets).len()
    }

    /// Targets in the order they were fetched.
    pub fn targets(&self) -> Vec<String> {
        lock(&self.targets).clone()
    }
}

#[async_trait]
impl Fetcher for ScriptedFetcher {
    async fn fetch(&self, target: &str) -> Result<Fields, FetchError> {
        lock(&self.targets).push(target.to_string());
        let next = lock(&self.responses).pop_front();
        next.unwrap_or_else(|| self.fallback.clone())
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// An evaluator that replays queued verdicts.
///
/// When the queue is drained it falls back to its default verdict: a
/// "missing everything required" answer unless configured otherwise.
#[derive(Default)]
pub struct ScriptedEvaluator {
    verdicts: Mutex<VecDeque<Result<Sufficiency, EvaluationError>>>,
    fallback: Option<Result<Sufficiency, EvaluationError>>,
    calls: Mutex<Vec<Fields>>,
}

impl ScriptedEvaluator {
    pub fn new() -> Self {
        Self::default()
    }

    /// An evaluator whose every call fails.
    pub fn always_failing() -> Self {
        Self {
            fallback: Some(Err(EvaluationError::Failed("evaluator offline".to_string()))),
            ..Self::default()
        }
    }

    pub fn with_verdict(self, verdict: Sufficiency) -> Self {
        lock(&self.verdicts).push_back(Ok(verdict));
        self
    }

    pub fn with_error(self, error: EvaluationError) -> Self {
        lock(&self.verdicts).push_back(Err(error));
        self
    }

    /// Number of evaluations made so far.
    pub fn calls(&self) -> usize {
        lock(&self.calls).len()
    }

    /// Data snapshots passed to each evaluation.
    pub fn inputs(&self) -> Vec<Fields> {
        lock(&self.calls).clone()
    }
}

#[async_trait]
impl SufficiencyEvaluator for ScriptedEvaluator {
    async fn evaluate(
        &self,
        data: &Fields,
        required: &[String],
    ) -> Result<Sufficiency, EvaluationError> {
        lock(&self.calls).push(data.clone());
        if let Some(next) = lock(&self.verdicts).pop_front() {
            return next;
        }
        match &self.fallback {
            Some(fallback) => fallback.clone(),
            None => Ok(Sufficiency::missing(required.to_vec())),
        }
    }
}

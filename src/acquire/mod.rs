//! Acquisition layer
//!
//! Fetching one target is split across small pieces:
//! - [`Fetcher`]: one acquisition method (a cheap tier and an expensive tier)
//! - [`RetryPolicy`]: bounded exponential backoff for transient failures
//! - [`SufficiencyEvaluator`]: decides whether the data gathered so far is enough
//! - [`AcquisitionEscalator`]: the state machine tying them together, with
//!   every fetch passing through a shared [`crate::limiter::RateLimiter`]

mod escalator;
mod evaluator;
mod fetch;
mod http;
mod retry;

pub use escalator::{Acquisition, AcquisitionEscalator, Tier};
pub use evaluator::{EvaluationError, RequiredFieldsEvaluator, Sufficiency, SufficiencyEvaluator};
pub use fetch::{FetchError, Fetcher, Fields};
pub use http::{build_http_client, FetchDepth, HttpFetcher};
pub use retry::RetryPolicy;

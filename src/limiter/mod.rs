//! Per-key admission control
//!
//! This module rate limits outbound acquisition traffic:
//! - `Quota`: how many admissions a key gets within a sliding window
//! - `AdmissionBucket`: the bookkeeping for one key
//! - `RateLimiter`: the shared, lazily populated map of buckets
//!
//! Buckets live for the lifetime of the limiter and are never persisted;
//! limits are best-effort per process run.

mod bucket;
mod rate_limiter;

pub use bucket::{AdmissionBucket, Quota};
pub use rate_limiter::RateLimiter;

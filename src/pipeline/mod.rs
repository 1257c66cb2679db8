//! Resumable batch pipeline
//!
//! This module drives one phase of work at a time:
//! - Deterministic partitioning of the input into batches
//! - Sequential batch processing with a checkpoint after every batch
//! - Resumption from the first missing batch after an interruption
//! - A bounded worker pool for parallelism inside a batch

mod partition;
mod runner;
mod workers;

pub use partition::{batch_count, partition};
pub use runner::BatchPipeline;
pub use workers::process_concurrently;

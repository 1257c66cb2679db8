//! Checkpoint storage for batch pipelines
//!
//! This module persists pipeline progress, including:
//! - Per-batch record files that can be loaded independently
//! - Merging and deduplicating records across batches
//! - Resume point computation from the persisted batch indices
//! - Phase completion markers

mod file;
mod memory;
mod traits;

pub use file::{batch_file_name, parse_batch_file_name, FileCheckpointStore, MARKER_FILE};
pub use memory::MemoryCheckpointStore;
pub use traits::{first_gap, merge_batches, CheckpointStore, StoreError, StoreResult};

/// Checks that a phase name is safe to use as a file name prefix
///
/// Allowed: ASCII alphanumerics, `-`, `_` and `.`, not starting with `.`.
pub fn is_valid_phase_name(phase: &str) -> bool {
    !phase.is_empty()
        && !phase.starts_with('.')
        && phase
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
}

pub(crate) fn validate_phase(phase: &str) -> StoreResult<()> {
    if is_valid_phase_name(phase) {
        Ok(())
    } else {
        Err(StoreError::InvalidPhase(phase.to_string()))
    }
}

//! Checkpoint store trait and error types
//!
//! This module defines the interface every checkpoint backend implements,
//! along with the merge and resume-point rules shared by all of them.

use crate::record::Record;
use indexmap::IndexMap;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur during checkpoint operations
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("No batches persisted for phase '{0}'")]
    PhaseNotFound(String),

    #[error("Batch {index} of phase '{phase}' not found")]
    BatchNotFound { phase: String, index: usize },

    #[error("Corrupt batch file {path} at line {line}: {reason}")]
    Corrupt {
        path: String,
        line: usize,
        reason: String,
    },

    #[error("Corrupt phase marker file {path}: {reason}")]
    CorruptMarker { path: String, reason: String },

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Invalid phase name '{0}'")]
    InvalidPhase(String),

    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl StoreError {
    /// Returns true if the phase simply has nothing persisted yet
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::PhaseNotFound(_) | Self::BatchNotFound { .. })
    }

    /// Returns true if persisted data exists but cannot be read back
    pub fn is_corrupt(&self) -> bool {
        matches!(self, Self::Corrupt { .. } | Self::CorruptMarker { .. })
    }
}

/// Result type for checkpoint operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Durable storage for batch output and phase progress
///
/// Batches are addressed by `(phase, index)`. A saved batch is replaced
/// whole or not at all. Record ids are only reconciled when batches are
/// loaded, so duplicates across batches are normal after a resumed run.
pub trait CheckpointStore {
    // ===== Batch Persistence =====

    /// Persists `records` as batch `index` of `phase`, replacing any prior content
    fn save_batch(&mut self, phase: &str, index: usize, records: &[Record]) -> StoreResult<()>;

    /// Loads a single batch in its stored order
    fn load_batch(&self, phase: &str, index: usize) -> StoreResult<Vec<Record>>;

    /// Sorted indices of every persisted batch for `phase`
    fn batch_indices(&self, phase: &str) -> StoreResult<Vec<usize>>;

    /// Loads every batch of `phase` and merges them
    ///
    /// Returns [`StoreError::PhaseNotFound`] if nothing has been saved, and
    /// propagates [`StoreError::Corrupt`] rather than skipping a bad batch.
    fn load_batches(&self, phase: &str) -> StoreResult<Vec<Record>> {
        let indices = self.batch_indices(phase)?;
        if indices.is_empty() {
            return Err(StoreError::PhaseNotFound(phase.to_string()));
        }

        let mut batches = Vec::with_capacity(indices.len());
        for index in indices {
            batches.push(self.load_batch(phase, index)?);
        }
        Ok(merge_batches(batches))
    }

    /// Loads and merges only the batches with index below `end`
    ///
    /// Used on resume to restore exactly the completed prefix of a phase.
    fn load_batches_before(&self, phase: &str, end: usize) -> StoreResult<Vec<Record>> {
        let mut batches = Vec::new();
        for index in self.batch_indices(phase)? {
            if index >= end {
                break;
            }
            batches.push(self.load_batch(phase, index)?);
        }
        Ok(merge_batches(batches))
    }

    /// Index of the first batch of `phase` that is not persisted
    fn resume_point(&self, phase: &str) -> StoreResult<usize> {
        Ok(first_gap(&self.batch_indices(phase)?))
    }

    // ===== Phase Markers =====

    /// Records that the driver finished `phase`; idempotent
    fn mark_phase_complete(&mut self, phase: &str) -> StoreResult<()>;

    /// Whether `phase` has been marked complete
    fn is_phase_complete(&self, phase: &str) -> StoreResult<bool>;

    /// Names of all phases marked complete, sorted
    fn completed_phases(&self) -> StoreResult<Vec<String>>;
}

/// Merges batches in order, keeping one record per dedup key
///
/// A record from a later batch replaces an earlier one with the same key but
/// keeps the position where that key was first seen.
pub fn merge_batches<I>(batches: I) -> Vec<Record>
where
    I: IntoIterator<Item = Vec<Record>>,
{
    let mut merged: IndexMap<String, Record> = IndexMap::new();
    for batch in batches {
        for record in batch {
            merged.insert(record.dedup_key(), record);
        }
    }
    merged.into_values().collect()
}

/// First missing index in the sequence `0, 1, 2, ...`
///
/// Not `max + 1`: a batch that was never written while later ones were is
/// picked up again instead of being orphaned.
pub fn first_gap(indices: &[usize]) -> usize {
    let mut sorted = indices.to_vec();
    sorted.sort_unstable();
    sorted.dedup();

    let mut expected = 0;
    for index in sorted {
        if index != expected {
            break;
        }
        expected += 1;
    }
    expected
}

//! In-memory checkpoint store
//!
//! Holds batches and markers in maps. Useful for tests and dry runs where
//! nothing should touch the disk; contents vanish with the process.

use crate::record::Record;
use crate::storage::traits::{CheckpointStore, StoreError, StoreResult};
use crate::storage::validate_phase;
use std::collections::{BTreeMap, HashMap};

#[derive(Debug, Default, Clone)]
pub struct MemoryCheckpointStore {
    batches: HashMap<String, BTreeMap<usize, Vec<Record>>>,
    markers: BTreeMap<String, bool>,

    /// Number of `save_batch` calls, including replacements
    pub saves: usize,
}

impl MemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drops one persisted batch, as if its write had never happened
    pub fn remove_batch(&mut self, phase: &str, index: usize) -> Option<Vec<Record>> {
        self.batches.get_mut(phase)?.remove(&index)
    }
}

impl CheckpointStore for MemoryCheckpointStore {
    fn save_batch(&mut self, phase: &str, index: usize, records: &[Record]) -> StoreResult<()> {
        validate_phase(phase)?;
        self.batches
            .entry(phase.to_string())
            .or_default()
            .insert(index, records.to_vec());
        self.saves += 1;
        Ok(())
    }

    fn load_batch(&self, phase: &str, index: usize) -> StoreResult<Vec<Record>> {
        validate_phase(phase)?;
        self.batches
            .get(phase)
            .and_then(|batches| batches.get(&index))
            .cloned()
            .ok_or_else(|| StoreError::BatchNotFound {
                phase: phase.to_string(),
                index,
            })
    }

    fn batch_indices(&self, phase: &str) -> StoreResult<Vec<usize>> {
        validate_phase(phase)?;
        Ok(self
            .batches
            .get(phase)
            .map(|batches| batches.keys().copied().collect())
            .unwrap_or_default())
    }

    fn mark_phase_complete(&mut self, phase: &str) -> StoreResult<()> {
        validate_phase(phase)?;
        self.markers.insert(phase.to_string(), true);
        Ok(())
    }

    fn is_phase_complete(&self, phase: &str) -> StoreResult<bool> {
        validate_phase(phase)?;
        Ok(self.markers.get(phase).copied().unwrap_or(false))
    }

    fn completed_phases(&self) -> StoreResult<Vec<String>> {
        Ok(self
            .markers
            .iter()
            .filter(|(_, done)| **done)
            .map(|(phase, _)| phase.clone())
            .collect())
    }
}

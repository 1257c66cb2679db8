//! Checkpointed batch runner

use crate::pipeline::partition::partition;
use crate::record::Record;
use crate::storage::{is_valid_phase_name, merge_batches, CheckpointStore};
use crate::{HarvestError, Result};
use std::future::Future;

/// Runs a phase batch by batch, persisting each batch before moving on
///
/// The pipeline owns its store. Batches of one phase run strictly in index
/// order; parallelism, if any, happens inside the processor (see
/// [`crate::pipeline::process_concurrently`]).
pub struct BatchPipeline<S: CheckpointStore> {
    store: S,
}

impl<S: CheckpointStore> BatchPipeline<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    /// Processes `items` for `phase`, skipping batches that are already saved
    ///
    /// # Flow
    ///
    /// 1. Partition `items` into batches of `batch_size`
    /// 2. Ask the store for the resume point and preload every batch below it
    /// 3. For each remaining batch: run `process`, then save its output
    /// 4. Return the preloaded and newly produced records, merged the same
    ///    way [`CheckpointStore::load_batches`] merges them
    ///
    /// The processor should turn per-item failures into degraded records. An
    /// error from the processor or from the store aborts the run at once; the
    /// failing batch is not saved, so the next run starts from it.
    pub async fn run<T, F, Fut>(
        &mut self,
        phase: &str,
        items: &[T],
        batch_size: usize,
        mut process: F,
    ) -> Result<Vec<Record>>
    where
        T: Clone,
        F: FnMut(Vec<T>) -> Fut,
        Fut: Future<Output = anyhow::Result<Vec<Record>>>,
    {
        if !is_valid_phase_name(phase) {
            return Err(HarvestError::InvalidPhase(phase.to_string()));
        }

        let batches = partition(items, batch_size)?;
        let start = self.store.resume_point(phase)?;

        // Markers are informational; an unreadable marker file never blocks a run
        match self.store.is_phase_complete(phase) {
            Ok(true) => tracing::info!("Phase '{}' is already marked complete", phase),
            Ok(false) => {}
            Err(e) => tracing::warn!("Could not read completion marker for '{}': {}", phase, e),
        }

        let mut produced = Vec::with_capacity(batches.len().saturating_sub(start) + 1);
        if start > 0 {
            tracing::info!(
                "Resuming phase '{}' at batch {} of {}",
                phase,
                start,
                batches.len()
            );
            produced.push(self.store.load_batches_before(phase, start)?);
        } else {
            tracing::info!(
                "Starting phase '{}': {} items in {} batches",
                phase,
                items.len(),
                batches.len()
            );
        }

        for (index, batch) in batches.iter().enumerate().skip(start) {
            tracing::debug!(
                "Processing batch {} of phase '{}' ({} items)",
                index,
                phase,
                batch.len()
            );

            let records = process(batch.to_vec()).await.map_err(|e| {
                tracing::warn!("Batch {} of phase '{}' failed: {:#}", index, phase, e);
                HarvestError::BatchFailed {
                    phase: phase.to_string(),
                    batch: index,
                    source: e.into(),
                }
            })?;

            self.store.save_batch(phase, index, &records)?;
            tracing::info!(
                "Saved batch {}/{} of phase '{}' ({} records)",
                index + 1,
                batches.len(),
                phase,
                records.len()
            );
            produced.push(records);
        }

        Ok(merge_batches(produced))
    }
}

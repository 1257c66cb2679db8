use crate::{HarvestError, Result};

/// Splits `items` into consecutive batches of `batch_size`
///
/// Boundaries depend only on `(items.len(), batch_size)`, so every run over
/// the same input sees the same batches. The last batch may be shorter and an
/// empty input yields no batches.
pub fn partition<T>(items: &[T], batch_size: usize) -> Result<Vec<&[T]>> {
    if batch_size == 0 {
        return Err(HarvestError::InvalidBatchSize);
    }
    Ok(items.chunks(batch_size).collect())
}

/// Number of batches `partition` would produce
pub fn batch_count(item_count: usize, batch_size: usize) -> Result<usize> {
    if batch_size == 0 {
        return Err(HarvestError::InvalidBatchSize);
    }
    Ok(item_count.div_ceil(batch_size))
}

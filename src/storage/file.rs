//! Directory-backed checkpoint store
//!
//! Layout inside the checkpoint directory:
//! - `{phase}-batch-{index}.jsonl`: one JSON record per line
//! - `phases.json`: `{ "phase": true, ... }` completion markers
//!
//! Every write goes to a sibling `.tmp` file that is synced and then renamed
//! over the target, so readers only ever see a complete file.

use crate::record::Record;
use crate::storage::traits::{CheckpointStore, StoreError, StoreResult};
use crate::storage::validate_phase;
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

/// File name of the shared phase marker document
pub const MARKER_FILE: &str = "phases.json";

const BATCH_SUFFIX: &str = ".jsonl";
const TEMP_SUFFIX: &str = ".tmp";

/// Checkpoint store writing flat files under a single directory
#[derive(Debug, Clone)]
pub struct FileCheckpointStore {
    root: PathBuf,
}

impl FileCheckpointStore {
    /// Opens (creating if needed) a checkpoint directory
    pub fn new(root: impl Into<PathBuf>) -> StoreResult<Self> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(|source| StoreError::Io {
            path: root.clone(),
            source,
        })?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the file holding batch `index` of `phase`
    pub fn batch_path(&self, phase: &str, index: usize) -> PathBuf {
        self.root.join(batch_file_name(phase, index))
    }

    pub fn marker_path(&self) -> PathBuf {
        self.root.join(MARKER_FILE)
    }

    fn read_markers(&self) -> StoreResult<BTreeMap<String, bool>> {
        let path = self.marker_path();
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(e) if e.kind() == ErrorKind::InvalidData => {
                return Err(StoreError::CorruptMarker {
                    path: path.display().to_string(),
                    reason: e.to_string(),
                })
            }
            Err(source) => return Err(StoreError::Io { path, source }),
        };

        serde_json::from_str(&content).map_err(|e| StoreError::CorruptMarker {
            path: path.display().to_string(),
            reason: e.to_string(),
        })
    }

    fn write_markers(&self, markers: &BTreeMap<String, bool>) -> StoreResult<()> {
        let encoded = serde_json::to_string_pretty(markers)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        write_atomic(&self.marker_path(), encoded.as_bytes())
    }
}

impl CheckpointStore for FileCheckpointStore {
    fn save_batch(&mut self, phase: &str, index: usize, records: &[Record]) -> StoreResult<()> {
        validate_phase(phase)?;

        let mut encoded = String::new();
        for record in records {
            let line = serde_json::to_string(record)
                .map_err(|e| StoreError::Serialization(e.to_string()))?;
            encoded.push_str(&line);
            encoded.push('\n');
        }

        let path = self.batch_path(phase, index);
        write_atomic(&path, encoded.as_bytes())?;

        tracing::debug!(
            "Saved batch {} of phase {} ({} records) to {}",
            index,
            phase,
            records.len(),
            path.display()
        );
        Ok(())
    }

    fn load_batch(&self, phase: &str, index: usize) -> StoreResult<Vec<Record>> {
        validate_phase(phase)?;

        let path = self.batch_path(phase, index);
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(StoreError::BatchNotFound {
                    phase: phase.to_string(),
                    index,
                })
            }
            Err(e) if e.kind() == ErrorKind::InvalidData => {
                return Err(StoreError::Corrupt {
                    path: path.display().to_string(),
                    line: 0,
                    reason: e.to_string(),
                })
            }
            Err(source) => return Err(StoreError::Io { path, source }),
        };

        parse_batch(&path, &content)
    }

    fn batch_indices(&self, phase: &str) -> StoreResult<Vec<usize>> {
        validate_phase(phase)?;

        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => {
                return Err(StoreError::Io {
                    path: self.root.clone(),
                    source,
                })
            }
        };

        let mut indices = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| StoreError::Io {
                path: self.root.clone(),
                source,
            })?;
            let file_name = entry.file_name();
            if let Some(index) = file_name
                .to_str()
                .and_then(|name| parse_batch_file_name(phase, name))
            {
                indices.push(index);
            }
        }

        indices.sort_unstable();
        Ok(indices)
    }

    fn mark_phase_complete(&mut self, phase: &str) -> StoreResult<()> {
        validate_phase(phase)?;

        let mut markers = self.read_markers()?;
        markers.insert(phase.to_string(), true);
        self.write_markers(&markers)?;

        tracing::info!("Marked phase {} complete", phase);
        Ok(())
    }

    fn is_phase_complete(&self, phase: &str) -> StoreResult<bool> {
        validate_phase(phase)?;
        Ok(self.read_markers()?.get(phase).copied().unwrap_or(false))
    }

    fn completed_phases(&self) -> StoreResult<Vec<String>> {
        Ok(self
            .read_markers()?
            .into_iter()
            .filter(|(_, done)| *done)
            .map(|(phase, _)| phase)
            .collect())
    }
}

/// `{phase}-batch-{index}.jsonl`
pub fn batch_file_name(phase: &str, index: usize) -> String {
    format!("{}-batch-{}{}", phase, index, BATCH_SUFFIX)
}

/// Recovers the batch index from a file name belonging to `phase`
///
/// Only canonical names match: the index must be plain decimal with no
/// leading zeros, so `p-batch-01.jsonl` or `p-batch-1.jsonl.tmp` are ignored.
pub fn parse_batch_file_name(phase: &str, file_name: &str) -> Option<usize> {
    let digits = file_name
        .strip_prefix(phase)?
        .strip_prefix("-batch-")?
        .strip_suffix(BATCH_SUFFIX)?;

    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    if digits.len() > 1 && digits.starts_with('0') {
        return None;
    }
    digits.parse().ok()
}

fn parse_batch(path: &Path, content: &str) -> StoreResult<Vec<Record>> {
    let mut records = Vec::new();
    for (number, line) in content.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let record = serde_json::from_str(line).map_err(|e| StoreError::Corrupt {
            path: path.display().to_string(),
            line: number + 1,
            reason: e.to_string(),
        })?;
        records.push(record);
    }
    Ok(records)
}

/// Replaces `path` with `bytes` via a synced temp file and a rename
///
/// On failure the temp file is removed and any previous content at `path`
/// is left as it was.
fn write_atomic(path: &Path, bytes: &[u8]) -> StoreResult<()> {
    let mut temp_name = path.file_name().unwrap_or_default().to_os_string();
    temp_name.push(TEMP_SUFFIX);
    let temp_path = path.with_file_name(temp_name);

    let result = (|| {
        let mut file = File::create(&temp_path)?;
        file.write_all(bytes)?;
        file.sync_all()?;
        fs::rename(&temp_path, path)
    })();

    if let Err(source) = result {
        let _ = fs::remove_file(&temp_path);
        return Err(StoreError::Io {
            path: path.to_path_buf(),
            source,
        });
    }

    // Persist the rename itself where the platform allows syncing a directory
    if let Some(parent) = path.parent() {
        if let Ok(dir) = File::open(parent) {
            if let Err(e) = dir.sync_all() {
                tracing::debug!("Could not sync directory {}: {}", parent.display(), e);
            }
        }
    }

    Ok(())
}

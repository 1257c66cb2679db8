//! Integration tests for the batch pipeline
//!
//! These tests run phases against a real checkpoint directory and reopen it
//! between runs to simulate a process restart.

use anyhow::anyhow;
use std::cell::RefCell;
use std::fs;
use sumi_harvest::config::load_config;
use sumi_harvest::storage::{
    batch_file_name, CheckpointStore, FileCheckpointStore, StoreError, MARKER_FILE,
};
use sumi_harvest::{BatchPipeline, HarvestError, Record};
use tempfile::TempDir;

fn record(n: u32) -> Record {
    Record::new(format!("item-{}", n)).with_field("n", n)
}

fn ids(records: &[Record]) -> Vec<String> {
    records.iter().filter_map(|r| r.id.clone()).collect()
}

#[tokio::test]
async fn test_resume_after_restart() {
    let dir = TempDir::new().unwrap();
    let items: Vec<u32> = (1..=7).collect();

    // First process: batch 0 succeeds, batch 1 crashes
    {
        let store = FileCheckpointStore::new(dir.path()).unwrap();
        let mut pipeline = BatchPipeline::new(store);

        let result = pipeline
            .run("p1", &items, 3, |batch| async move {
                if batch[0] == 4 {
                    return Err(anyhow!("simulated crash"));
                }
                Ok(batch.into_iter().map(record).collect())
            })
            .await;

        assert!(matches!(
            result,
            Err(HarvestError::BatchFailed { batch: 1, .. })
        ));
    }

    assert!(dir.path().join(batch_file_name("p1", 0)).exists());
    assert!(!dir.path().join(batch_file_name("p1", 1)).exists());

    // Second process picks up at batch 1
    let store = FileCheckpointStore::new(dir.path()).unwrap();
    assert_eq!(store.resume_point("p1").unwrap(), 1);

    let mut pipeline = BatchPipeline::new(store);
    let processed = RefCell::new(Vec::new());
    let records = pipeline
        .run("p1", &items, 3, |batch| {
            processed.borrow_mut().extend(batch.iter().copied());
            async move { Ok(batch.into_iter().map(record).collect()) }
        })
        .await
        .unwrap();

    assert_eq!(processed.into_inner(), vec![4, 5, 6, 7]);
    assert_eq!(
        ids(&records),
        (1..=7).map(|n| format!("item-{}", n)).collect::<Vec<_>>()
    );

    let reopened = FileCheckpointStore::new(dir.path()).unwrap();
    assert_eq!(reopened.batch_indices("p1").unwrap(), vec![0, 1, 2]);
    assert_eq!(reopened.load_batches("p1").unwrap(), records);
}

#[tokio::test]
async fn test_interrupted_and_uninterrupted_runs_agree() {
    let items: Vec<u32> = (1..=10).collect();

    let clean_dir = TempDir::new().unwrap();
    let mut clean = BatchPipeline::new(FileCheckpointStore::new(clean_dir.path()).unwrap());
    let expected = clean
        .run("p1", &items, 4, |batch| async move {
            Ok(batch.into_iter().map(record).collect())
        })
        .await
        .unwrap();

    let crash_dir = TempDir::new().unwrap();
    let mut crashing = BatchPipeline::new(FileCheckpointStore::new(crash_dir.path()).unwrap());
    let _ = crashing
        .run("p1", &items, 4, |batch| async move {
            if batch.contains(&9) {
                return Err(anyhow!("crash in last batch"));
            }
            Ok(batch.into_iter().map(record).collect())
        })
        .await;

    let mut resumed = BatchPipeline::new(FileCheckpointStore::new(crash_dir.path()).unwrap());
    let actual = resumed
        .run("p1", &items, 4, |batch| async move {
            Ok(batch.into_iter().map(record).collect())
        })
        .await
        .unwrap();

    assert_eq!(actual, expected);
}

#[tokio::test]
async fn test_corrupt_batch_is_reported_not_skipped() {
    let dir = TempDir::new().unwrap();
    let mut store = FileCheckpointStore::new(dir.path()).unwrap();
    store.save_batch("p1", 0, &[record(1)]).unwrap();
    store.save_batch("p1", 1, &[record(2)]).unwrap();

    fs::write(
        dir.path().join(batch_file_name("p1", 1)),
        "{\"id\":\"item-2\"}\n{not json\n",
    )
    .unwrap();

    match store.load_batches("p1") {
        Err(StoreError::Corrupt { line, .. }) => assert_eq!(line, 2),
        other => panic!("expected Corrupt, got {:?}", other),
    }

    // Resuming past the corrupt batch surfaces the same error
    let items: Vec<u32> = (1..=3).collect();
    let mut pipeline = BatchPipeline::new(store);
    let result = pipeline
        .run("p1", &items, 1, |batch| async move {
            Ok(batch.into_iter().map(record).collect())
        })
        .await;

    assert!(matches!(
        result,
        Err(HarvestError::Store(StoreError::Corrupt { .. }))
    ));
}

#[tokio::test]
async fn test_unknown_phase_is_not_found() {
    let dir = TempDir::new().unwrap();
    let store = FileCheckpointStore::new(dir.path()).unwrap();

    let err = store.load_batches("never-run").unwrap_err();
    assert!(err.is_not_found());
    assert_eq!(store.resume_point("never-run").unwrap(), 0);
}

#[tokio::test]
async fn test_phase_markers_survive_restart() {
    let dir = TempDir::new().unwrap();
    let items: Vec<u32> = (1..=2).collect();

    {
        let mut pipeline = BatchPipeline::new(FileCheckpointStore::new(dir.path()).unwrap());
        pipeline
            .run("stage-1", &items, 5, |batch| async move {
                Ok(batch.into_iter().map(record).collect())
            })
            .await
            .unwrap();

        assert!(!pipeline.store().is_phase_complete("stage-1").unwrap());
        pipeline.store_mut().mark_phase_complete("stage-1").unwrap();
        pipeline.store_mut().mark_phase_complete("stage-1").unwrap();
    }

    let store = FileCheckpointStore::new(dir.path()).unwrap();
    assert!(store.is_phase_complete("stage-1").unwrap());
    assert!(!store.is_phase_complete("stage-2").unwrap());
    assert_eq!(store.completed_phases().unwrap(), vec!["stage-1".to_string()]);
}

#[tokio::test]
async fn test_unreadable_marker_file_does_not_block_run() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join(MARKER_FILE), "{ truncated").unwrap();

    let items: Vec<u32> = (1..=3).collect();
    let mut pipeline = BatchPipeline::new(FileCheckpointStore::new(dir.path()).unwrap());
    let records = pipeline
        .run("p1", &items, 2, |batch| async move {
            Ok(batch.into_iter().map(record).collect())
        })
        .await
        .unwrap();

    assert_eq!(records.len(), 3);
    assert_eq!(pipeline.store().batch_indices("p1").unwrap(), vec![0, 1]);
    // Explicit marker queries still report the damage
    assert!(matches!(
        pipeline.store().is_phase_complete("p1"),
        Err(StoreError::CorruptMarker { .. })
    ));
}

#[tokio::test]
async fn test_failed_save_stops_run_before_next_batch() {
    let dir = TempDir::new().unwrap();
    let items: Vec<u32> = (1..=6).collect();

    // A directory squatting on the temp path makes the batch 1 write fail
    fs::create_dir(dir.path().join(format!("{}.tmp", batch_file_name("p1", 1)))).unwrap();

    let mut pipeline = BatchPipeline::new(FileCheckpointStore::new(dir.path()).unwrap());
    let calls = RefCell::new(0);
    let result = pipeline
        .run("p1", &items, 2, |batch| {
            *calls.borrow_mut() += 1;
            async move { Ok(batch.into_iter().map(record).collect()) }
        })
        .await;

    assert!(matches!(result, Err(HarvestError::Store(_))));
    assert_eq!(calls.into_inner(), 2);
    assert_eq!(pipeline.store().batch_indices("p1").unwrap(), vec![0]);
    assert_eq!(pipeline.store().resume_point("p1").unwrap(), 1);
}

#[tokio::test]
async fn test_phase_batch_size_from_config() {
    let dir = TempDir::new().unwrap();
    let checkpoints = dir.path().join("checkpoints");
    let config_path = dir.path().join("harvest.toml");

    fs::write(
        &config_path,
        format!(
            r#"
[pipeline]
checkpoint-dir = "{}"
batch-size = 25
max-concurrent-workers = 2

[[pipeline.phase]]
name = "stage-2-records"
batch-size = 2

[user-agent]
crawler-name = "TestBot"
crawler-version = "1.0"
contact-url = "https://example.com/about"
contact-email = "test@example.com"
"#,
            checkpoints.display().to_string().replace('\\', "/")
        ),
    )
    .unwrap();

    let config = load_config(&config_path).unwrap();
    let batch_size = config.pipeline.batch_size_for("stage-2-records");
    assert_eq!(batch_size, 2);

    let items: Vec<u32> = (1..=5).collect();
    let mut pipeline =
        BatchPipeline::new(FileCheckpointStore::new(&config.pipeline.checkpoint_dir).unwrap());
    pipeline
        .run("stage-2-records", &items, batch_size, |batch| async move {
            Ok(batch.into_iter().map(record).collect())
        })
        .await
        .unwrap();

    assert_eq!(
        pipeline.store().batch_indices("stage-2-records").unwrap(),
        vec![0, 1, 2]
    );
}

//! End-to-end pipeline scenarios over the filesystem store

mod utils;

use benchkeeper::error::PipelineError;
use benchkeeper::pipeline::{BaselinePolicy, PipelineResult, RepoLeases};
use benchkeeper::storage::{FsBlobStore, Visibility};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use utils::{orchestrator, ScriptedRunner, BUCKET, REPO};

const BASE: &str = "BenchmarkFoo-8   1000000    120 ns/op\nBenchmarkBar-8   500000    300 ns/op\n";
const NOISE: &str = "BenchmarkFoo-8   1000000    121 ns/op\nBenchmarkBar-8   500000    301 ns/op\n";
const SLOWER: &str = "BenchmarkFoo-8   1000000    600 ns/op\nBenchmarkBar-8   500000    301 ns/op\n";

fn object(root: &std::path::Path, suffix: &str) -> std::path::PathBuf {
    root.join(BUCKET).join(REPO).join("benchmarks").join(suffix)
}

#[tokio::test]
async fn test_first_run_then_change_then_quiet() {
    let dir = tempfile::tempdir().unwrap();
    let blobs = Arc::new(FsBlobStore::new(dir.path()));
    let runner = Arc::new(ScriptedRunner::new(&[BASE, SLOWER, SLOWER]));
    let pipeline = orchestrator(blobs, runner.clone());
    let cancel = CancellationToken::new();

    let first = pipeline.run(REPO, Visibility::Private, &cancel).await.unwrap();
    assert!(matches!(first, PipelineResult::FirstRun { .. }));
    assert_eq!(std::fs::read_to_string(object(dir.path(), "latest")).unwrap(), BASE);
    assert_eq!(
        std::fs::read_to_string(object(dir.path(), "2024-3-7/1709802300")).unwrap(),
        BASE
    );
    assert!(!object(dir.path(), "latest-results").exists());

    let second = pipeline.run(REPO, Visibility::Private, &cancel).await.unwrap();
    let PipelineResult::Changed { locators, report, .. } = second else {
        panic!("expected a change");
    };
    assert_eq!(locators.len(), 4);
    assert!(locators.values().all(|l| l.starts_with("file://")));
    assert!(report.text.contains("BenchmarkFoo-8"));
    assert!(!report.text.contains("BenchmarkBar-8"));
    assert_eq!(std::fs::read_to_string(object(dir.path(), "latest")).unwrap(), SLOWER);
    assert_eq!(
        std::fs::read_to_string(object(dir.path(), "latest-results")).unwrap(),
        report.text
    );
    assert!(object(dir.path(), "2024-3-7/1709802300-results").exists());

    // Same measurements against the promoted baseline
    let third = pipeline.run(REPO, Visibility::Private, &cancel).await.unwrap();
    assert!(third.is_no_change());
    assert_eq!(runner.calls(), 3);
}

#[tokio::test]
async fn test_noise_leaves_baseline_untouched() {
    let dir = tempfile::tempdir().unwrap();
    let blobs = Arc::new(FsBlobStore::new(dir.path()));
    let pipeline = orchestrator(blobs, Arc::new(ScriptedRunner::new(&[BASE, NOISE])));
    let cancel = CancellationToken::new();

    pipeline.run(REPO, Visibility::Private, &cancel).await.unwrap();
    let result = pipeline.run(REPO, Visibility::Private, &cancel).await.unwrap();

    assert!(result.is_no_change());
    assert!(result.payload().is_none());
    assert_eq!(std::fs::read_to_string(object(dir.path(), "latest")).unwrap(), BASE);
    assert!(!object(dir.path(), "latest-results").exists());
}

#[tokio::test]
async fn test_advancing_policy_replaces_baseline_with_noise() {
    let dir = tempfile::tempdir().unwrap();
    let blobs = Arc::new(FsBlobStore::new(dir.path()));
    let pipeline = orchestrator(blobs, Arc::new(ScriptedRunner::new(&[BASE, NOISE])))
        .with_policy(BaselinePolicy {
            advance_on_no_change: true,
        });
    let cancel = CancellationToken::new();

    pipeline.run(REPO, Visibility::Private, &cancel).await.unwrap();
    let result = pipeline.run(REPO, Visibility::Private, &cancel).await.unwrap();

    match result {
        PipelineResult::NoChange { advanced } => assert_eq!(advanced.len(), 2),
        other => panic!("unexpected result {other:?}"),
    }
    assert_eq!(std::fs::read_to_string(object(dir.path(), "latest")).unwrap(), NOISE);
    assert!(!object(dir.path(), "latest-results").exists());
}

#[tokio::test]
async fn test_output_without_benchmark_lines_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let blobs = Arc::new(FsBlobStore::new(dir.path()));
    let pipeline = orchestrator(blobs, Arc::new(ScriptedRunner::new(&["PASS\nok  widgets 0.1s\n"])));

    let err = pipeline
        .run(REPO, Visibility::Private, &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, PipelineError::Measurement { .. }));
    assert!(!dir.path().join(BUCKET).exists());
}

#[cfg(unix)]
#[tokio::test]
async fn test_public_snapshots_are_world_readable() {
    use std::os::unix::fs::PermissionsExt;

    let dir = tempfile::tempdir().unwrap();
    let blobs = Arc::new(FsBlobStore::new(dir.path()));
    let pipeline = orchestrator(blobs, Arc::new(ScriptedRunner::new(&[BASE])));

    pipeline
        .run(REPO, Visibility::Public, &CancellationToken::new())
        .await
        .unwrap();

    let mode = std::fs::metadata(object(dir.path(), "latest"))
        .unwrap()
        .permissions()
        .mode();
    assert_eq!(mode & 0o777, 0o644);
}

#[tokio::test]
async fn test_same_repository_runs_are_serialized() {
    let dir = tempfile::tempdir().unwrap();
    let blobs = Arc::new(FsBlobStore::new(dir.path()));
    let leases = RepoLeases::new();
    let a = Arc::new(
        orchestrator(blobs.clone(), Arc::new(ScriptedRunner::new(&[BASE])))
            .with_leases(leases.clone()),
    );
    let b = Arc::new(
        orchestrator(blobs, Arc::new(ScriptedRunner::new(&[BASE])))
            .with_leases(leases.clone()),
    );

    let cancel = CancellationToken::new();
    let (ra, rb) = tokio::join!(
        a.run(REPO, Visibility::Private, &cancel),
        b.run(REPO, Visibility::Private, &cancel)
    );

    // Exactly one of them saw an empty store
    let first_runs = [ra.unwrap(), rb.unwrap()]
        .iter()
        .filter(|r| matches!(r, PipelineResult::FirstRun { .. }))
        .count();
    assert_eq!(first_runs, 1);
    assert_eq!(leases.active(), 0);
}

#[tokio::test]
async fn test_cancel_during_slow_run() {
    let dir = tempfile::tempdir().unwrap();
    let blobs = Arc::new(FsBlobStore::new(dir.path()));
    let runner = ScriptedRunner::new(&[BASE]).with_delay(Duration::from_secs(30));
    let pipeline = orchestrator(blobs, Arc::new(runner));
    let cancel = CancellationToken::new();

    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let err = pipeline
        .run(REPO, Visibility::Private, &cancel)
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::Cancelled { .. }));
    assert!(!dir.path().join(BUCKET).exists());
}

#[cfg(unix)]
#[tokio::test]
async fn test_unclassified_comparator_rows_fail_the_run() {
    use benchkeeper::comparison::{ChangeFilter, CommandComparator};
    use benchkeeper::error::ComparatorError;
    use benchkeeper::pipeline::PipelineOrchestrator;
    use benchkeeper::storage::SnapshotStore;

    let dir = tempfile::tempdir().unwrap();
    let latest = object(dir.path(), "latest");
    std::fs::create_dir_all(latest.parent().unwrap()).unwrap();
    std::fs::write(&latest, BASE).unwrap();

    let json = r#"[{"metric":"time/op","group":[],"rows":[{"benchmark":"BenchmarkFoo-8","before":"120ns","after":"600ns","delta":"+400.00%"}]}]"#;
    let comparator = CommandComparator::new(
        "sh",
        vec![
            "-c".to_string(),
            format!("echo '{json}'"),
            "{before}".to_string(),
            "{after}".to_string(),
        ],
    );
    let pipeline = PipelineOrchestrator::new(
        Arc::new(ScriptedRunner::new(&[SLOWER])),
        SnapshotStore::new(Arc::new(FsBlobStore::new(dir.path())), BUCKET),
        ChangeFilter::new(Arc::new(comparator)),
    );

    let err = pipeline
        .run(REPO, Visibility::Private, &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        PipelineError::Comparison(ComparatorError::Decode(_))
    ));
    assert_eq!(std::fs::read_to_string(&latest).unwrap(), BASE);
    assert!(!object(dir.path(), "latest-results").exists());
}

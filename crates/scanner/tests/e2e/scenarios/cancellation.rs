//! Cancellation: a canceled or superseded pipeline never publishes.

use std::sync::Arc;

use tokio::sync::Semaphore;

use depwatch_scanner::{BuildSystem, ScanOutcome, ScanState, ScannerConfigBuilder};

use crate::helpers::env::{TestEnv, drain};
use crate::helpers::mocks::MockResolver;

/// Canceled while refreshing: no store write, no notification.
#[tokio::test]
async fn test_cancel_before_aggregating_publishes_nothing() {
    let env = TestEnv::new();
    let project = env.project("cancel");
    let mut results = project.bus().results.subscribe();
    let gate = Arc::new(Semaphore::new(0));
    let resolver = Arc::new(MockResolver::new(BuildSystem::Maven, env.root()).gated(Arc::clone(&gate)));
    let scanner = env.scanner(&project, resolver);

    let handle = scanner.trigger_scan(false, None);
    assert!(scanner.is_running());
    scanner.cancel();
    gate.add_permits(1);

    assert_eq!(handle.outcome().await, ScanOutcome::Canceled);
    assert!(drain(&mut results).is_empty());
    assert_eq!(env.issues.write_count(), 0);
    assert_eq!(env.licenses.write_count(), 0);
    assert_eq!(env.backend.call_count(), 0);
    assert!(scanner.last_tree().is_none());
    assert_eq!(scanner.state(), ScanState::Idle);
}

/// A new trigger after a cancel runs normally.
#[tokio::test]
async fn test_scan_after_cancel_publishes() {
    let env = TestEnv::new();
    let project = env.project("cancel-then-scan");
    let gate = Arc::new(Semaphore::new(0));
    let resolver = Arc::new(MockResolver::new(BuildSystem::Maven, env.root()).gated(Arc::clone(&gate)));
    let scanner = env.scanner(&project, resolver);

    let canceled = scanner.trigger_scan(false, None);
    scanner.cancel();
    gate.add_permits(1);
    assert_eq!(canceled.outcome().await, ScanOutcome::Canceled);

    let outcome = scanner.trigger_scan(false, None).outcome().await;
    assert!(outcome.is_completed(), "unexpected outcome: {outcome}");
    assert_eq!(env.issues.write_count(), 1);
}

/// Closing the project cancels the in-flight scan and rejects later triggers.
#[tokio::test]
async fn test_project_close_cancels_in_flight_scan() {
    let env = TestEnv::new();
    let project = env.project("closing");
    let mut results = project.bus().results.subscribe();
    let gate = Arc::new(Semaphore::new(0));
    let resolver = Arc::new(MockResolver::new(BuildSystem::Maven, env.root()).gated(Arc::clone(&gate)));
    let scanner = env.scanner(&project, resolver);

    let handle = scanner.trigger_scan(false, None);
    assert!(project.mark_closed());
    gate.add_permits(1);

    assert_eq!(handle.outcome().await, ScanOutcome::Canceled);
    assert!(drain(&mut results).is_empty());
    assert_eq!(
        scanner.trigger_scan(false, None).outcome().await,
        ScanOutcome::ProjectClosed
    );
}

/// A disposed scanner still finishes and publishes its in-flight scan once.
#[tokio::test]
async fn test_disposed_scanner_finishes_in_flight_scan() {
    let env = TestEnv::new();
    let project = env.project("disposed");
    let gate = Arc::new(Semaphore::new(0));
    let resolver = Arc::new(MockResolver::new(BuildSystem::Maven, env.root()).gated(Arc::clone(&gate)));
    let scanner = env.scanner(&project, resolver);

    let handle = scanner.trigger_scan(false, None);
    scanner.dispose();
    gate.add_permits(1);

    assert!(handle.outcome().await.is_completed());
    assert_eq!(env.issues.write_count(), 1);
}

/// Canceled while the backend holds a batch: the pipeline stops before
/// aggregating.
#[tokio::test]
async fn test_cancel_while_scanning_publishes_nothing() {
    let env = TestEnv::new();
    let project = env.project("cancel-scanning");
    let mut results = project.bus().results.subscribe();
    let gate = Arc::new(Semaphore::new(0));
    env.backend.hold_on(Arc::clone(&gate));
    let scanner = env.scanner(&project, Arc::new(MockResolver::new(BuildSystem::Maven, env.root())));

    let handle = scanner.trigger_scan(false, None);
    env.backend.wait_for_calls(1).await;
    assert_eq!(scanner.state(), ScanState::Scanning);
    scanner.cancel();
    gate.add_permits(1);

    assert_eq!(handle.outcome().await, ScanOutcome::Canceled);
    assert!(drain(&mut results).is_empty());
    assert_eq!(env.issues.write_count(), 0);
    assert_eq!(env.licenses.write_count(), 0);
    assert!(scanner.last_tree().is_none());
    assert_eq!(scanner.state(), ScanState::Idle);
}

/// With one component per batch, a cancel stops the remaining batches.
#[tokio::test]
async fn test_cancel_between_backend_batches() {
    let env = TestEnv::new();
    env.settings.update(
        ScannerConfigBuilder::new()
            .home_dir(env.home.path())
            .db_path("/opt/depwatch/vulndb")
            .backend_batch_size(1)
            .build()
            .unwrap(),
    );
    let project = env.project("cancel-batches");
    let gate = Arc::new(Semaphore::new(0));
    env.backend.hold_on(Arc::clone(&gate));
    let scanner = env.scanner(&project, Arc::new(MockResolver::new(BuildSystem::Maven, env.root())));

    let handle = scanner.trigger_scan(false, None);
    env.backend.wait_for_calls(1).await;
    scanner.cancel();
    gate.add_permits(1);

    assert_eq!(handle.outcome().await, ScanOutcome::Canceled);
    assert_eq!(env.backend.call_count(), 1);
    assert_eq!(env.backend.scanned().len(), 1);
    assert_eq!(env.issues.write_count(), 0);
    assert_eq!(scanner.state(), ScanState::Idle);
}

//! Single-flight: N concurrent triggers, exactly one pipeline.

use std::sync::Arc;
use std::sync::atomic::Ordering;

use tokio::sync::{Barrier, Semaphore};

use depwatch_scanner::{BuildSystem, ScanOutcome, ScanState};

use crate::helpers::env::TestEnv;
use crate::helpers::mocks::MockResolver;

const CONCURRENT_TRIGGERS: usize = 16;

/// Concurrent triggers from many tasks: one completes, the rest are dropped.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_triggers_run_exactly_one_scan() {
    let env = TestEnv::new();
    let project = env.project("single-flight");
    let gate = Arc::new(Semaphore::new(0));
    let resolver = Arc::new(MockResolver::new(BuildSystem::Maven, env.root()).gated(Arc::clone(&gate)));
    let scanner = env.scanner(&project, resolver.clone());

    let barrier = Arc::new(Barrier::new(CONCURRENT_TRIGGERS));
    let mut tasks = Vec::with_capacity(CONCURRENT_TRIGGERS);
    for i in 0..CONCURRENT_TRIGGERS {
        let scanner = Arc::clone(&scanner);
        let barrier = Arc::clone(&barrier);
        tasks.push(tokio::spawn(async move {
            barrier.wait().await;
            scanner.trigger_scan(i % 2 == 0, None)
        }));
    }

    let mut handles = Vec::with_capacity(CONCURRENT_TRIGGERS);
    for task in tasks {
        handles.push(task.await.unwrap());
    }

    // 모든 트리거가 반환된 뒤에야 파이프라인이 진행됩니다.
    assert!(scanner.is_running());
    gate.add_permits(1);

    let mut completed = 0;
    let mut already_running = 0;
    for handle in handles {
        match handle.outcome().await {
            ScanOutcome::Completed { .. } => completed += 1,
            ScanOutcome::AlreadyRunning => already_running += 1,
            other => panic!("unexpected outcome: {other}"),
        }
    }

    assert_eq!(completed, 1);
    assert_eq!(already_running, CONCURRENT_TRIGGERS - 1);
    assert_eq!(resolver.refresh_calls.load(Ordering::SeqCst), 1);
    assert_eq!(env.backend.call_count(), 1);
    assert_eq!(env.issues.write_count(), 1);
}

/// The lock is released after completion so a later trigger runs again.
#[tokio::test]
async fn test_lock_released_after_completion() {
    let env = TestEnv::new();
    let project = env.project("relock");
    let resolver = Arc::new(MockResolver::new(BuildSystem::Maven, env.root()));
    let scanner = env.scanner(&project, resolver.clone());

    let first = scanner.trigger_scan(false, None).outcome().await;
    let second = scanner.trigger_scan(false, None).outcome().await;

    assert_eq!(first, ScanOutcome::Completed { generation: 1 });
    assert_eq!(second, ScanOutcome::Completed { generation: 2 });
    assert_eq!(scanner.state(), ScanState::Idle);
    assert_eq!(resolver.refresh_calls.load(Ordering::SeqCst), 2);
}

/// A failed pipeline also releases the lock.
#[tokio::test]
async fn test_lock_released_after_failure() {
    let env = TestEnv::new();
    let project = env.project("failing");
    let resolver = Arc::new(MockResolver::new(BuildSystem::Maven, env.root()).failing());
    let scanner = env.scanner(&project, resolver);

    for _ in 0..2 {
        let outcome = scanner.trigger_scan(false, None).outcome().await;
        assert!(
            matches!(outcome, ScanOutcome::Failed { stage: ScanState::Refreshing, .. }),
            "unexpected outcome: {outcome}"
        );
    }
    assert!(!scanner.is_running());
    assert_eq!(env.issues.write_count(), 0);
}

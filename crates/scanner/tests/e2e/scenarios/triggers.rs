//! Trigger sources and skip rules.

use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use tokio::sync::Semaphore;

use depwatch_core::event::{FilesChanged, ProjectEvent};
use depwatch_core::types::GeneralInfo;
use depwatch_scanner::{
    BuildSystem, ComponentId, DependencyData, ModuleData, ScanOutcome, ScanState, TreeData,
};

use crate::helpers::env::{TestEnv, drain};
use crate::helpers::mocks::{MockResolver, clean_component};

const EVENT_TIMEOUT: Duration = Duration::from_secs(5);

/// Unconfigured backend: no lock, no state change, no notifications.
#[tokio::test]
async fn test_unconfigured_backend_returns_without_lock() {
    let env = TestEnv::unconfigured();
    let project = env.project("unconfigured");
    let mut results = project.bus().results.subscribe();
    let resolver = Arc::new(MockResolver::new(BuildSystem::Maven, env.root()));
    let scanner = env.scanner(&project, resolver.clone());

    for quick in [false, true] {
        let outcome = scanner.trigger_scan(quick, None).outcome().await;
        assert_eq!(outcome, ScanOutcome::NotConfigured);
    }

    assert!(!scanner.is_running());
    assert_eq!(scanner.state(), ScanState::Idle);
    assert_eq!(resolver.refresh_calls.load(Ordering::SeqCst), 0);
    assert_eq!(env.backend.call_count(), 0);
    assert!(drain(&mut results).is_empty());
}

/// `quick` changes logging only: outcomes are identical in both modes.
#[tokio::test]
async fn test_quick_flag_does_not_change_outcome() {
    let env = TestEnv::new();
    let project = env.project("quick");
    let gate = Arc::new(Semaphore::new(0));
    let resolver = Arc::new(MockResolver::new(BuildSystem::Maven, env.root()).gated(Arc::clone(&gate)));
    let scanner = env.scanner(&project, resolver);

    let running = scanner.trigger_scan(true, None);
    assert_eq!(
        scanner.trigger_scan(true, None).outcome().await,
        ScanOutcome::AlreadyRunning
    );
    assert_eq!(
        scanner.trigger_scan(false, None).outcome().await,
        ScanOutcome::AlreadyRunning
    );

    gate.add_permits(1);
    assert!(running.outcome().await.is_completed());
    assert!(scanner.trigger_scan(false, None).outcome().await.is_completed());
}

/// Indexing projects skip triggers without taking the lock.
#[tokio::test]
async fn test_indexing_project_skips_trigger() {
    let env = TestEnv::new();
    let project = env.project("indexing");
    let scanner = env.scanner(&project, Arc::new(MockResolver::new(BuildSystem::Maven, env.root())));

    project.set_indexing(true);
    assert_eq!(scanner.trigger_scan(false, None).outcome().await, ScanOutcome::Indexing);
    assert!(!scanner.is_running());

    project.set_indexing(false);
    assert!(scanner.trigger_scan(false, None).outcome().await.is_completed());
}

/// A hint replaces the resolver's own refresh result.
#[tokio::test]
async fn test_hint_is_used_for_tree() {
    let env = TestEnv::new();
    let project = env.project("hinted");
    let scanner = env.scanner(&project, Arc::new(MockResolver::new(BuildSystem::Maven, env.root())));

    let hint = TreeData {
        root: GeneralInfo::new("hinted", env.root(), "maven"),
        modules: vec![ModuleData {
            info: GeneralInfo::new("hinted-app", env.root(), "maven"),
            id: ComponentId::gav("org.example", "hinted-app", "1.0.0"),
            dependencies: vec![DependencyData::new(clean_component())],
        }],
    };

    assert!(scanner.trigger_scan(false, Some(hint)).outcome().await.is_completed());
    let tree = scanner.last_tree().unwrap();
    assert_eq!(tree.descendant_count(), 1);
    assert_eq!(tree.issue_count(), 0);
    assert_eq!(env.backend.scanned(), vec![clean_component()]);
}

/// A configuration change reaches every live scanner as a quick scan.
#[tokio::test]
async fn test_configuration_change_triggers_scan() {
    let env = TestEnv::new();
    let project = env.project("config-change");
    let mut results = project.bus().results.subscribe();
    let scanner = env.scanner(&project, Arc::new(MockResolver::new(BuildSystem::Maven, env.root())));
    let _listeners = scanner.spawn_listeners();

    let receivers = env
        .settings
        .update(TestEnv::config(env.home.path(), "/opt/depwatch/other-db"));
    assert!(receivers >= 1);

    let event = tokio::time::timeout(EVENT_TIMEOUT, results.recv())
        .await
        .unwrap()
        .unwrap();
    assert!(matches!(event, ProjectEvent::IssuesChanged(_)));
}

/// File changes trigger only on an exact match of the watched path.
#[tokio::test]
async fn test_file_change_exact_match_only() {
    let env = TestEnv::new();
    let project = env.project("files");
    let mut results = project.bus().results.subscribe();
    let resolver = Arc::new(MockResolver::new(BuildSystem::Maven, env.root()));
    let watched = resolver.watched_path();
    let scanner = env.scanner(&project, resolver);
    let _listeners = scanner.spawn_listeners();

    project.bus().files.publish(FilesChanged::new(vec![
        env.root().to_path_buf(),
        env.root().join("sub").join("deps.lock"),
    ]));
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(env.issues.write_count(), 0);
    assert!(drain(&mut results).is_empty());

    project.bus().files.publish(FilesChanged::new(vec![watched]));
    let event = tokio::time::timeout(EVENT_TIMEOUT, results.recv())
        .await
        .unwrap()
        .unwrap();
    assert!(matches!(event, ProjectEvent::IssuesChanged(_)));
}

/// Disposed scanners stop reacting to triggers.
#[tokio::test]
async fn test_disposed_scanner_ignores_file_changes() {
    let env = TestEnv::new();
    let project = env.project("disposed-listeners");
    let resolver = Arc::new(MockResolver::new(BuildSystem::Maven, env.root()));
    let watched = resolver.watched_path();
    let scanner = env.scanner(&project, resolver);
    let listeners = scanner.spawn_listeners();

    scanner.dispose();
    tokio::time::timeout(EVENT_TIMEOUT, listeners).await.unwrap().unwrap();

    project.bus().files.publish(FilesChanged::new(vec![watched]));
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(env.issues.write_count(), 0);
}

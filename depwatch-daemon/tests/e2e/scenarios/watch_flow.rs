//! Manifest polling: file changes reach the session and the registry.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;

use depwatch_core::event::ProjectEvent;
use depwatch_daemon::orchestrator::Daemon;
use depwatch_daemon::watcher::ManifestPoller;
use depwatch_scanner::{BuildSystem, ScannerId};

use crate::helpers::config::TestConfigBuilder;
use crate::helpers::fixtures::{GO_MOD, VULNERABLE_POM, package_json, write_file, write_vuln_db};

const EVENT_TIMEOUT: Duration = Duration::from_secs(5);
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// A new manifest in the project root adds a scanner.
#[tokio::test]
async fn test_e2e_new_manifest_adds_scanner() {
    let home = tempfile::tempdir().unwrap();
    let project = tempfile::tempdir().unwrap();
    write_file(project.path(), "pom.xml", VULNERABLE_POM);

    let config = TestConfigBuilder::new(home.path()).build();
    let daemon = Daemon::build_from_config(config, &[project.path().to_path_buf()], None)
        .await
        .unwrap();
    let session = Arc::clone(&daemon.sessions()[0]);
    let mut poller = ManifestPoller::new(Arc::clone(&session), POLL_INTERVAL);

    // Nothing changed yet
    let (changed, summary) = poller.poll_once().await;
    assert!(changed.is_empty());
    assert!(summary.is_none());

    write_file(project.path(), "package.json", &package_json("billing-ui"));
    let (changed, summary) = poller.poll_once().await;

    assert_eq!(changed, vec![project.path().join("package.json")]);
    let summary = summary.expect("manifest change should refresh the registry");
    assert_eq!(
        summary.added,
        vec![ScannerId::new(BuildSystem::Npm, project.path())]
    );
    assert_eq!(session.registry().list().len(), 2);

    daemon.shutdown().await;
}

/// Deleting the only manifest removes its scanner.
#[tokio::test]
async fn test_e2e_deleted_manifest_removes_scanner() {
    let home = tempfile::tempdir().unwrap();
    let project = tempfile::tempdir().unwrap();
    write_file(project.path(), "go.mod", GO_MOD);

    let config = TestConfigBuilder::new(home.path()).build();
    let daemon = Daemon::build_from_config(config, &[project.path().to_path_buf()], None)
        .await
        .unwrap();
    let session = Arc::clone(&daemon.sessions()[0]);
    let go = session.registry().get(BuildSystem::Go).unwrap();
    let mut poller = ManifestPoller::new(Arc::clone(&session), POLL_INTERVAL);

    std::fs::remove_file(project.path().join("go.mod")).unwrap();
    let (_, summary) = poller.poll_once().await;

    let summary = summary.expect("manifest removal should refresh the registry");
    assert_eq!(summary.removed, vec![go.id().clone()]);
    assert!(go.is_disposed());
    assert!(session.registry().list().is_empty());

    daemon.shutdown().await;
}

/// A lock file change triggers a quick scan of the owning scanner only.
#[tokio::test]
async fn test_e2e_lock_file_change_triggers_scan() {
    let home = tempfile::tempdir().unwrap();
    let db = tempfile::tempdir().unwrap();
    let project = tempfile::tempdir().unwrap();
    write_vuln_db(db.path());
    write_file(project.path(), "go.mod", GO_MOD);

    let config = TestConfigBuilder::new(home.path()).db_path(db.path()).build();
    let daemon = Daemon::build_from_config(config, &[project.path().to_path_buf()], None)
        .await
        .unwrap();
    let session = Arc::clone(&daemon.sessions()[0]);
    let mut results = session.project().bus().results.subscribe();
    let mut poller = ManifestPoller::new(Arc::clone(&session), POLL_INTERVAL);

    write_file(project.path(), "go.sum", "github.com/example/router v1.4.0 h1:abc=\n");
    let (changed, summary) = poller.poll_once().await;

    assert_eq!(changed, vec![project.path().join("go.sum")]);
    assert!(summary.is_none(), "lock files do not refresh the registry");

    let event = tokio::time::timeout(EVENT_TIMEOUT, results.recv())
        .await
        .expect("scan should publish within timeout")
        .unwrap();
    assert!(matches!(event, ProjectEvent::IssuesChanged(_)));
    assert_eq!(daemon.report()[0].issues, 1);

    daemon.shutdown().await;
}

/// The spawned poller stops on the shutdown broadcast.
#[tokio::test]
async fn test_e2e_poller_stops_on_shutdown() {
    let home = tempfile::tempdir().unwrap();
    let project = tempfile::tempdir().unwrap();
    write_file(project.path(), "pom.xml", VULNERABLE_POM);

    let config = TestConfigBuilder::new(home.path()).build();
    let daemon = Daemon::build_from_config(config, &[project.path().to_path_buf()], None)
        .await
        .unwrap();
    let poller = ManifestPoller::new(Arc::clone(&daemon.sessions()[0]), POLL_INTERVAL);
    assert!(poller.watched_count() > 0);

    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let task = poller.spawn(shutdown_rx);
    tokio::time::sleep(POLL_INTERVAL * 2).await;

    let _ = shutdown_tx.send(());
    let result = tokio::time::timeout(Duration::from_secs(1), task).await;
    assert!(result.is_ok(), "poller should shut down within timeout");

    daemon.shutdown().await;
}

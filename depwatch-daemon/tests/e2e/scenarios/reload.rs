//! Configuration reload (the `SIGHUP` path).

use std::time::Duration;

use depwatch_core::event::ProjectEvent;
use depwatch_daemon::orchestrator::Daemon;
use depwatch_scanner::ScanOutcome;

use crate::helpers::config::TestConfigBuilder;
use crate::helpers::fixtures::{VULNERABLE_POM, write_file, write_vuln_db};

const EVENT_TIMEOUT: Duration = Duration::from_secs(5);

/// Configuring the backend through a reload rescans every scanner.
#[tokio::test]
async fn test_e2e_reload_configures_backend_and_rescans() {
    // Given: a daemon started without a database
    let home = tempfile::tempdir().unwrap();
    let db = tempfile::tempdir().unwrap();
    let project = tempfile::tempdir().unwrap();
    write_vuln_db(db.path());
    write_file(project.path(), "pom.xml", VULNERABLE_POM);

    let config_path = TestConfigBuilder::new(home.path()).write_to(home.path());
    let daemon = Daemon::build(&config_path, &[project.path().to_path_buf()])
        .await
        .expect("daemon should build from file");
    assert_eq!(daemon.scan_once().await[0].outcome, ScanOutcome::NotConfigured);
    let mut results = daemon.sessions()[0].project().bus().results.subscribe();

    // When: the file now names a database and is reloaded
    TestConfigBuilder::new(home.path())
        .db_path(db.path())
        .write_to(home.path());
    let receivers = daemon.reload_config().await.expect("reload should succeed");

    // Then: settings changed and the listener scanned
    assert!(receivers >= 1);
    assert!(daemon.settings().is_configured());
    let event = tokio::time::timeout(EVENT_TIMEOUT, results.recv())
        .await
        .expect("rescan should publish within timeout")
        .unwrap();
    assert!(matches!(event, ProjectEvent::IssuesChanged(_)));

    daemon.shutdown().await;
}

/// A broken file leaves the running settings untouched.
#[tokio::test]
async fn test_e2e_invalid_reload_keeps_settings() {
    let home = tempfile::tempdir().unwrap();
    let db = tempfile::tempdir().unwrap();
    let config_path = TestConfigBuilder::new(home.path())
        .db_path(db.path())
        .write_to(home.path());
    let daemon = Daemon::build(&config_path, &[]).await.unwrap();

    std::fs::write(&config_path, "[general\nlog_level = ").unwrap();
    let err = daemon.reload_config().await.unwrap_err();
    assert!(err.to_string().contains("failed to reload config"));
    assert_eq!(
        daemon.settings().current().db_path,
        db.path().display().to_string()
    );

    daemon.shutdown().await;
}

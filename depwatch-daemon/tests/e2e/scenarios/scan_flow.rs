//! Scan flow: local database findings surface in the store summaries.

use depwatch_core::event::ProjectEvent;
use depwatch_core::types::Severity;
use depwatch_daemon::orchestrator::Daemon;
use depwatch_daemon::summary::TreeStatus;

use crate::helpers::config::TestConfigBuilder;
use crate::helpers::fixtures::{GO_MOD, VULNERABLE_POM, write_file, write_vuln_db};

/// A vulnerable Maven dependency is reported as Critical.
#[tokio::test]
async fn test_e2e_maven_vulnerability_reported() {
    // Given: a Maven project and a database with the log4j finding
    let home = tempfile::tempdir().unwrap();
    let db = tempfile::tempdir().unwrap();
    let project = tempfile::tempdir().unwrap();
    write_vuln_db(db.path());
    write_file(project.path(), "pom.xml", VULNERABLE_POM);

    let config = TestConfigBuilder::new(home.path()).db_path(db.path()).build();
    let daemon = Daemon::build_from_config(config, &[project.path().to_path_buf()], None)
        .await
        .unwrap();
    let mut results = daemon.sessions()[0].project().bus().results.subscribe();

    // When: scanning once
    let outcomes = daemon.scan_once().await;

    // Then: the scan completed and the store holds one Critical issue
    assert_eq!(outcomes.len(), 1);
    assert!(outcomes[0].outcome.is_completed());

    let report = daemon.report();
    assert_eq!(report.len(), 1);
    assert_eq!(report[0].root, "billing");
    assert_eq!(report[0].issues, 1);
    assert_eq!(report[0].worst_severity(), Some(Severity::Critical));
    assert_eq!(report[0].status, TreeStatus::Vulnerable);
    assert!(report[0].licenses.contains(&"Apache-2.0".to_owned()));

    let mut licenses_changed = 0;
    while let Ok(event) = results.try_recv() {
        if matches!(event, ProjectEvent::LicensesChanged(_)) {
            licenses_changed += 1;
        }
    }
    assert_eq!(licenses_changed, 1);

    daemon.shutdown().await;
}

/// Raising the minimum severity hides lower findings.
#[tokio::test]
async fn test_e2e_min_severity_filters_findings() {
    let home = tempfile::tempdir().unwrap();
    let db = tempfile::tempdir().unwrap();
    let project = tempfile::tempdir().unwrap();
    write_vuln_db(db.path());
    write_file(project.path(), "go.mod", GO_MOD);

    let config = TestConfigBuilder::new(home.path())
        .db_path(db.path())
        .min_severity("high")
        .build();
    let daemon = Daemon::build_from_config(config, &[project.path().to_path_buf()], None)
        .await
        .unwrap();

    assert!(daemon.scan_once().await[0].outcome.is_completed());
    let report = daemon.report();
    assert_eq!(report.len(), 1);
    assert_eq!(report[0].issues, 0);
    assert_eq!(report[0].status, TreeStatus::Clean);

    daemon.shutdown().await;
}

/// Projects are scanned independently and reported separately.
#[tokio::test]
async fn test_e2e_multiple_projects_reported() {
    let home = tempfile::tempdir().unwrap();
    let db = tempfile::tempdir().unwrap();
    let billing = tempfile::tempdir().unwrap();
    let gateway = tempfile::tempdir().unwrap();
    write_vuln_db(db.path());
    write_file(billing.path(), "pom.xml", VULNERABLE_POM);
    write_file(gateway.path(), "go.mod", GO_MOD);

    let config = TestConfigBuilder::new(home.path()).db_path(db.path()).build();
    let projects = vec![billing.path().to_path_buf(), gateway.path().to_path_buf()];
    let daemon = Daemon::build_from_config(config, &projects, None).await.unwrap();

    let outcomes = daemon.scan_once().await;
    assert!(outcomes.iter().all(|r| r.outcome.is_completed()));

    let mut statuses: Vec<(Option<Severity>, TreeStatus)> = daemon
        .report()
        .iter()
        .map(|s| (s.worst_severity(), s.status))
        .collect();
    statuses.sort_by_key(|(severity, _)| *severity);
    assert_eq!(
        statuses,
        vec![
            (Some(Severity::Medium), TreeStatus::Warning),
            (Some(Severity::Critical), TreeStatus::Vulnerable),
        ]
    );

    daemon.shutdown().await;
}

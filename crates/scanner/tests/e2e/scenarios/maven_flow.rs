//! End-to-end Maven project against the local vulnerability database.

use std::time::Duration;

use depwatch_core::event::ProjectEvent;
use depwatch_core::types::{License, ProjectKey, Severity};
use depwatch_scanner::{
    BuildSystem, ComponentId, PresentationStore, ScanOutcome, ScannerConfigBuilder,
};

use crate::helpers::env::{TestEnv, drain};
use crate::helpers::workspace::{VULNERABLE_POM, write_file, write_vuln_db};

/// One vulnerable dependency: one issue in the store, exactly one
/// `LicensesChanged` for the project key.
#[tokio::test]
async fn test_maven_project_end_to_end() {
    let db = tempfile::tempdir().unwrap();
    write_vuln_db(db.path());
    let env = TestEnv::with_local_db(db.path());
    write_file(env.root(), "pom.xml", VULNERABLE_POM);

    let session = env.open_session("demo").await;
    let scanners = session.registry().list();
    assert_eq!(scanners.len(), 1);
    assert_eq!(scanners[0].kind(), BuildSystem::Maven);

    let mut results = session.project().bus().results.subscribe();
    let outcome = scanners[0].trigger_scan(false, None).outcome().await;
    assert_eq!(outcome, ScanOutcome::Completed { generation: 1 });

    let tree = env.issues.last_tree().unwrap();
    assert_eq!(tree.descendant_count(), 1);
    let dependency = &tree.children[0];
    assert_eq!(
        dependency.component,
        ComponentId::gav("org.apache.logging.log4j", "log4j-core", "2.14.1")
    );
    assert_eq!(dependency.issues.len(), 1);
    assert_eq!(dependency.issues[0].id, "CVE-2021-44228");
    assert_eq!(dependency.issues[0].severity, Severity::Critical);
    assert!(dependency.licenses.contains(&License::new("Apache-2.0")));

    let key = ProjectKey::new("demo", tree.general_info.as_ref().unwrap());
    let events = drain(&mut results);
    let licenses_changed = events
        .iter()
        .filter(|e| matches!(e, ProjectEvent::LicensesChanged(k) if *k == key))
        .count();
    assert_eq!(licenses_changed, 1);
    assert_eq!(events.len(), 2);

    // 알림은 키만 담으므로 저장소에서 다시 읽습니다.
    let stored = env.licenses.snapshot(&key).unwrap();
    assert_eq!(stored.issue_count(), 1);
    assert!(
        session
            .project()
            .filters()
            .selected_licenses()
            .contains(&License::new("Apache-2.0"))
    );
    assert_eq!(env.issues.project_names(), vec!["demo".to_owned()]);
}

/// Fixed versions are not reported.
#[tokio::test]
async fn test_maven_fixed_version_has_no_issue() {
    let db = tempfile::tempdir().unwrap();
    write_vuln_db(db.path());
    let env = TestEnv::with_local_db(db.path());
    write_file(
        env.root(),
        "pom.xml",
        &VULNERABLE_POM.replace("2.14.1", "2.17.1"),
    );

    let session = env.open_session("patched").await;
    for handle in session.scan_all() {
        assert!(handle.outcome().await.is_completed());
    }

    let tree = env.issues.last_tree().unwrap();
    assert_eq!(tree.issue_count(), 0);
    assert_eq!(tree.descendant_count(), 1);
}

/// The second scan is served from the on-disk component cache.
#[tokio::test]
async fn test_component_cache_written_on_scan() {
    let db = tempfile::tempdir().unwrap();
    write_vuln_db(db.path());
    let env = TestEnv::with_local_db(db.path());
    write_file(env.root(), "pom.xml", VULNERABLE_POM);

    let session = env.open_session("cached").await;
    for handle in session.scan_all() {
        assert!(handle.outcome().await.is_completed());
    }

    let cache_dir = env.home.path().join("cache").join("cached");
    let entries = std::fs::read_dir(&cache_dir).unwrap().count();
    assert_eq!(entries, 1);

    // DB를 지워도 캐시에서 같은 결과가 나옵니다.
    std::fs::remove_file(db.path().join("maven.json")).unwrap();
    for handle in session.scan_all() {
        assert!(handle.outcome().await.is_completed());
    }
    assert_eq!(env.issues.last_tree().unwrap().issue_count(), 1);
}

/// Lowering the minimum severity surfaces findings for components already
/// in the cache.
#[tokio::test]
async fn test_lowered_min_severity_reveals_cached_issue() {
    let db = tempfile::tempdir().unwrap();
    write_vuln_db(db.path());
    write_file(
        db.path(),
        "maven.json",
        r#"[
  {
    "id": "CVE-2021-45046",
    "package": "org.apache.logging.log4j:log4j-core",
    "ecosystem": "maven",
    "affected_ranges": [{ "introduced": "2.0.0", "fixed": "2.16.0" }],
    "fixed_versions": ["2.16.0"],
    "severity": "High",
    "summary": "Incomplete fix for JNDI lookup"
  }
]"#,
    );
    let env = TestEnv::with_local_db(db.path());
    write_file(env.root(), "pom.xml", VULNERABLE_POM);
    let config = |min_severity: Severity| {
        ScannerConfigBuilder::new()
            .home_dir(env.home.path())
            .db_path(db.path().to_string_lossy())
            .min_severity(min_severity)
            .build()
            .unwrap()
    };
    env.settings.update(config(Severity::Critical));

    let session = env.open_session("severity").await;
    for handle in session.scan_all() {
        assert!(handle.outcome().await.is_completed());
    }
    assert_eq!(env.issues.last_tree().unwrap().issue_count(), 0);

    // 재스캔은 캐시에서만 응답해야 합니다.
    std::fs::remove_file(db.path().join("maven.json")).unwrap();
    let mut results = session.project().bus().results.subscribe();
    assert!(env.settings.update(config(Severity::Low)) >= 1);

    let event = tokio::time::timeout(Duration::from_secs(5), results.recv())
        .await
        .unwrap()
        .unwrap();
    assert!(matches!(event, ProjectEvent::IssuesChanged(_)));

    let tree = env.issues.last_tree().unwrap();
    assert_eq!(tree.issue_count(), 1);
    assert_eq!(tree.children[0].issues[0].id, "CVE-2021-45046");
    assert_eq!(tree.children[0].issues[0].severity, Severity::High);
}

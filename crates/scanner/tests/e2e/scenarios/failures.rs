//! Failure isolation: a failed stage publishes nothing and stays local to
//! its scanner.

use std::sync::Arc;

use depwatch_scanner::{BuildSystem, ScanOutcome, ScanState};

use crate::helpers::env::{TestEnv, drain};
use crate::helpers::mocks::MockResolver;
use crate::helpers::workspace::write_file;

const GO_MOD: &str = "module example.com/service\n\ngo 1.22\n\nrequire github.com/example/router v1.4.0\n";

/// A backend error fails the Scanning stage and returns the scanner to Idle.
#[tokio::test]
async fn test_backend_failure_fails_scanning_stage() {
    let env = TestEnv::new();
    let project = env.project("backend-down");
    let mut results = project.bus().results.subscribe();
    env.backend.set_failing(true);
    let scanner = env.scanner(&project, Arc::new(MockResolver::new(BuildSystem::Maven, env.root())));

    let outcome = scanner.trigger_scan(false, None).outcome().await;
    match outcome {
        ScanOutcome::Failed { stage, reason } => {
            assert_eq!(stage, ScanState::Scanning);
            assert!(reason.contains("mock backend unavailable"), "reason: {reason}");
        }
        other => panic!("expected Failed, got {other}"),
    }
    assert!(drain(&mut results).is_empty());
    assert_eq!(env.issues.write_count(), 0);
    assert_eq!(env.licenses.write_count(), 0);
    assert!(scanner.last_tree().is_none());
    assert_eq!(scanner.state(), ScanState::Idle);

    // 실패한 배치는 캐시에 남지 않으므로 복구 후 다시 조회합니다.
    env.backend.set_failing(false);
    let outcome = scanner.trigger_scan(false, None).outcome().await;
    assert!(outcome.is_completed(), "unexpected outcome: {outcome}");
    assert_eq!(env.backend.call_count(), 2);
    assert_eq!(env.issues.write_count(), 1);
}

/// One scanner failing to refresh does not affect another scanner of the
/// same project.
#[tokio::test]
async fn test_failed_scanner_does_not_affect_sibling() {
    let env = TestEnv::new();
    write_file(env.root(), "pom.xml", "<project><artifactId>broken</project>");
    write_file(env.root(), "go.mod", GO_MOD);

    let session = env.open_session("mixed").await;
    let maven = session.registry().get(BuildSystem::Maven).unwrap();
    let go = session.registry().get(BuildSystem::Go).unwrap();

    let maven_handle = maven.trigger_scan(false, None);
    let go_handle = go.trigger_scan(false, None);

    match maven_handle.outcome().await {
        ScanOutcome::Failed { stage, .. } => assert_eq!(stage, ScanState::Refreshing),
        other => panic!("expected Failed, got {other}"),
    }
    let outcome = go_handle.outcome().await;
    assert!(outcome.is_completed(), "unexpected outcome: {outcome}");

    assert!(maven.last_tree().is_none());
    assert!(go.last_tree().is_some());
    assert_eq!(env.issues.write_count(), 1);
    assert_eq!(maven.state(), ScanState::Idle);
    assert_eq!(session.registry().list().len(), 2);
}

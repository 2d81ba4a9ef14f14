//! Registry: detection, idempotent refresh, nested npm roots, removal.

use std::sync::Arc;

use depwatch_core::types::License;
use depwatch_scanner::{BuildSystem, ScannerId};

use crate::helpers::env::TestEnv;
use crate::helpers::workspace::{VULNERABLE_POM, package_json, write_file};

/// An empty workspace has no scanners.
#[tokio::test]
async fn test_empty_workspace_has_no_scanners() {
    let env = TestEnv::new();
    let session = env.open_session("empty").await;
    assert!(session.registry().list().is_empty());
    assert!(session.registry().all_licenses().is_empty());
}

/// A Maven-only project gets exactly one Maven scanner, and a second refresh
/// keeps the same instance.
#[tokio::test]
async fn test_refresh_is_idempotent() {
    let env = TestEnv::new();
    write_file(env.root(), "pom.xml", VULNERABLE_POM);
    let session = env.open_session("idempotent").await;

    let first = session.registry().list();
    assert_eq!(first.len(), 1);
    assert_eq!(first[0].kind(), BuildSystem::Maven);
    assert_eq!(first[0].id(), &ScannerId::new(BuildSystem::Maven, env.root()));

    let summary = session.registry().refresh().await;
    assert!(!summary.changed());
    assert_eq!(summary.live, 1);

    let second = session.registry().list();
    assert_eq!(second.len(), 1);
    assert!(Arc::ptr_eq(&first[0], &second[0]));
}

/// Nested application directories collapse into their outermost root.
#[tokio::test]
async fn test_nested_npm_manifests_are_excluded() {
    let env = TestEnv::new();
    write_file(env.root(), "pom.xml", VULNERABLE_POM);
    write_file(env.root(), "web/package.json", &package_json("web"));
    write_file(env.root(), "web/admin/package.json", &package_json("admin"));
    write_file(env.root(), "web/node_modules/dep/package.json", &package_json("dep"));
    write_file(env.root(), "tools/package.json", &package_json("tools"));

    let session = env.open_session("nested").await;
    let kinds: Vec<BuildSystem> = session.registry().list().iter().map(|s| s.kind()).collect();
    assert_eq!(kinds, vec![BuildSystem::Maven, BuildSystem::Npm]);

    let npm = session.registry().get(BuildSystem::Npm).unwrap();
    assert_eq!(
        npm.roots(),
        &[env.root().join("tools"), env.root().join("web")]
    );
    assert_eq!(npm.id(), &ScannerId::new(BuildSystem::Npm, env.root()));
}

/// Removing the manifest removes and disposes the scanner.
#[tokio::test]
async fn test_removed_manifest_disposes_scanner() {
    let env = TestEnv::new();
    write_file(env.root(), "pom.xml", VULNERABLE_POM);
    let session = env.open_session("removal").await;
    let maven = session.registry().get(BuildSystem::Maven).unwrap();

    std::fs::remove_file(env.root().join("pom.xml")).unwrap();
    let summary = session.registry().refresh().await;

    assert_eq!(summary.removed, vec![maven.id().clone()]);
    assert_eq!(summary.live, 0);
    assert!(maven.is_disposed());
    assert!(session.registry().list().is_empty());
}

/// A new manifest reported through the session adds a scanner and scans it.
#[tokio::test]
async fn test_manifest_change_adds_scanner() {
    let env = TestEnv::new();
    write_file(env.root(), "pom.xml", VULNERABLE_POM);
    let session = env.open_session("added").await;
    assert_eq!(session.registry().list().len(), 1);

    write_file(env.root(), "ui/package.json", &package_json("ui"));
    let summary = session
        .files_changed(vec![env.root().join("ui/package.json")])
        .await
        .unwrap();

    assert_eq!(
        summary.added,
        vec![ScannerId::new(BuildSystem::Npm, env.root())]
    );
    assert_eq!(session.registry().list().len(), 2);
}

/// Aggregate licenses are the union over every scanner's last tree.
#[tokio::test]
async fn test_all_licenses_after_scan() {
    let env = TestEnv::new();
    write_file(env.root(), "pom.xml", VULNERABLE_POM);
    let session = env.open_session("licenses").await;

    for handle in session.scan_all() {
        assert!(handle.outcome().await.is_completed());
    }
    assert!(session.registry().all_licenses().contains(&License::new("MIT")));
}

/// Closing the session disposes every scanner exactly once.
#[tokio::test]
async fn test_session_close_disposes_scanners() {
    let env = TestEnv::new();
    write_file(env.root(), "pom.xml", VULNERABLE_POM);
    let session = env.open_session("close").await;
    let maven = session.registry().get(BuildSystem::Maven).unwrap();

    assert!(session.close());
    assert!(!session.close());
    assert!(maven.is_disposed());
    assert!(session.registry().list().is_empty());
    assert!(session.files_changed(vec![env.root().join("pom.xml")]).await.is_none());
}

//! Manifest polling.
//!
//! The [`ManifestPoller`] stats every file a session cares about on a fixed
//! interval and hands changed paths to [`ProjectSession::files_changed`].
//! A path counts as changed when its modification time differs from the
//! previous poll, including appearing or disappearing.
//!
//! # Watched Paths
//!
//! - each live scanner's watched file (lock files, `go.sum`)
//! - build manifests in the project base directory
//! - build manifests in every scanner's project paths

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use depwatch_scanner::{BuildSystem, ProjectSession, RefreshSummary};

/// Manifest names that exist outside any single build system's detection.
const SETTINGS_FILES: [&str; 2] = ["settings.gradle", "settings.gradle.kts"];

/// Last seen modification times. `None` means the file did not exist.
pub type MtimeSnapshot = BTreeMap<PathBuf, Option<SystemTime>>;

/// Every build manifest file name that may appear in `dir`.
fn manifest_candidates(dir: &Path) -> impl Iterator<Item = PathBuf> + '_ {
    BuildSystem::ALL
        .iter()
        .flat_map(|kind| kind.manifest_files().iter().copied())
        .chain(SETTINGS_FILES)
        .map(move |name| dir.join(name))
}

/// Paths the poller should stat for `session`.
pub fn watched_paths(session: &ProjectSession) -> BTreeSet<PathBuf> {
    let mut paths: BTreeSet<PathBuf> = manifest_candidates(session.project().base_path()).collect();
    for scanner in session.registry().list() {
        if let Some(file) = scanner.watched_file() {
            paths.insert(file);
        }
        for dir in scanner.project_paths() {
            paths.extend(manifest_candidates(&dir));
        }
    }
    paths
}

/// Stat every path. Unreadable metadata is recorded as missing.
pub fn stat_all<'a>(paths: impl IntoIterator<Item = &'a PathBuf>) -> MtimeSnapshot {
    paths
        .into_iter()
        .map(|path| {
            let mtime = std::fs::metadata(path).and_then(|m| m.modified()).ok();
            (path.clone(), mtime)
        })
        .collect()
}

/// Paths whose state differs between two polls.
///
/// Paths new to `current` count as changed only when they exist; paths that
/// left the watched set are ignored.
pub fn changed_paths(previous: &MtimeSnapshot, current: &MtimeSnapshot) -> Vec<PathBuf> {
    current
        .iter()
        .filter(|(path, mtime)| match previous.get(*path) {
            Some(before) => before != *mtime,
            None => mtime.is_some(),
        })
        .map(|(path, _)| path.clone())
        .collect()
}

/// Polls one session's manifests.
pub struct ManifestPoller {
    session: Arc<ProjectSession>,
    interval: Duration,
    snapshot: MtimeSnapshot,
}

impl ManifestPoller {
    /// Create a poller and take the baseline snapshot.
    pub fn new(session: Arc<ProjectSession>, interval: Duration) -> Self {
        let snapshot = stat_all(&watched_paths(&session));
        Self {
            session,
            interval,
            snapshot,
        }
    }

    /// Number of paths currently watched.
    pub fn watched_count(&self) -> usize {
        self.snapshot.len()
    }

    /// Stat once and forward any changes to the session.
    ///
    /// Returns the changed paths and the registry refresh summary when a
    /// build manifest was among them.
    pub async fn poll_once(&mut self) -> (Vec<PathBuf>, Option<RefreshSummary>) {
        let paths = watched_paths(&self.session);
        let current = match tokio::task::spawn_blocking(move || stat_all(&paths)).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                tracing::warn!(project = self.session.name(), error = %e, "manifest stat task failed");
                return (Vec::new(), None);
            }
        };

        let changed = changed_paths(&self.snapshot, &current);
        self.snapshot = current;
        if changed.is_empty() {
            return (changed, None);
        }

        tracing::debug!(
            project = self.session.name(),
            changed = changed.len(),
            "watched files changed"
        );
        let summary = self.session.files_changed(changed.clone()).await;
        if let Some(summary) = &summary {
            if summary.changed() {
                tracing::info!(
                    project = self.session.name(),
                    added = summary.added.len(),
                    removed = summary.removed.len(),
                    live = summary.live,
                    "scanner set changed"
                );
            }
            // 스캐너 집합이 바뀌면 감시 경로도 바뀝니다.
            self.snapshot = stat_all(&watched_paths(&self.session));
        }
        (changed, summary)
    }

    /// Run until shutdown is broadcast or the session closes.
    pub fn spawn(mut self, mut shutdown_rx: broadcast::Receiver<()>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(self.interval);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            interval.tick().await;

            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        if self.session.project().is_closed() {
                            break;
                        }
                        self.poll_once().await;
                    }
                    _ = shutdown_rx.recv() => {
                        tracing::debug!(project = self.session.name(), "manifest poller shutting down");
                        break;
                    }
                }
            }
        })
    }
}

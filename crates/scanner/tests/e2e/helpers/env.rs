//! Test environment: temporary home/workspace, settings, task runner, stores.

use std::path::Path;
use std::sync::Arc;

use tokio::sync::broadcast;

use depwatch_core::event::{ApplicationBus, ProjectEvent};
use depwatch_scanner::paths::Detected;
use depwatch_scanner::{
    BuildSystem, DependencyResolver, GlobalSettings, LocalDbBackend, ManifestResolverFactory,
    Project, ProjectSession, ProjectStores, ScanBackend, ScanContext, Scanner, ScannerConfig,
    ScannerConfigBuilder, TaskRunner,
};

use super::mocks::{MockBackend, RecordingStore};

/// Everything a scenario needs, torn down when dropped.
#[allow(dead_code)]
pub struct TestEnv {
    pub home: tempfile::TempDir,
    pub workspace: tempfile::TempDir,
    pub settings: Arc<GlobalSettings>,
    pub backend: Arc<MockBackend>,
    pub issues: Arc<RecordingStore>,
    pub licenses: Arc<RecordingStore>,
    pub ctx: ScanContext,
}

#[allow(dead_code)]
impl TestEnv {
    /// Configured backend (mock).
    pub fn new() -> Self {
        Self::build("/opt/depwatch/vulndb", false)
    }

    /// Backend not configured (empty db path).
    pub fn unconfigured() -> Self {
        Self::build("", false)
    }

    /// Real local database backend reading `db_dir`.
    pub fn with_local_db(db_dir: &Path) -> Self {
        Self::build(&db_dir.to_string_lossy(), true)
    }

    fn build(db_path: &str, local_db: bool) -> Self {
        let home = tempfile::tempdir().unwrap();
        let workspace = tempfile::tempdir().unwrap();
        let config = Self::config(home.path(), db_path);
        let settings = Arc::new(GlobalSettings::new(config, ApplicationBus::new()));
        let mock = Arc::new(MockBackend::default());
        let backend: Arc<dyn ScanBackend> = if local_db {
            Arc::new(LocalDbBackend::new(Arc::clone(&settings)))
        } else {
            mock.clone()
        };
        let ctx = ScanContext::new(
            Arc::clone(&settings),
            Arc::new(TaskRunner::start()),
            backend,
            Arc::new(ManifestResolverFactory),
        );

        Self {
            home,
            workspace,
            settings,
            backend: mock,
            issues: Arc::new(RecordingStore::default()),
            licenses: Arc::new(RecordingStore::default()),
            ctx,
        }
    }

    /// Scanner configuration rooted at `home` with the given database path.
    pub fn config(home: &Path, db_path: &str) -> ScannerConfig {
        ScannerConfigBuilder::new()
            .home_dir(home)
            .db_path(db_path)
            .build()
            .unwrap()
    }

    /// Workspace root.
    pub fn root(&self) -> &Path {
        self.workspace.path()
    }

    /// Stores recording into `issues` and `licenses`.
    pub fn stores(&self) -> ProjectStores {
        ProjectStores {
            issues: self.issues.clone(),
            licenses: self.licenses.clone(),
        }
    }

    /// A project over the workspace using the recording stores.
    pub fn project(&self, name: &str) -> Arc<Project> {
        Arc::new(Project::new(name, self.root(), self.stores()))
    }

    /// Build a scanner directly around `resolver`.
    pub fn scanner(
        &self,
        project: &Arc<Project>,
        resolver: Arc<dyn DependencyResolver>,
    ) -> Arc<Scanner> {
        let detected = Detected::Manifest {
            kind: BuildSystem::Maven,
            root: self.root().to_path_buf(),
        };
        Arc::new(
            Scanner::new(
                &detected,
                resolver,
                Arc::clone(project),
                self.ctx.clone(),
                &self.settings.current(),
            )
            .unwrap(),
        )
    }

    /// Open a session over the workspace.
    pub async fn open_session(&self, name: &str) -> ProjectSession {
        ProjectSession::open(self.ctx.clone(), name, self.root(), self.stores()).await
    }
}

/// Drain every event currently buffered on `rx`.
#[allow(dead_code)]
pub fn drain(rx: &mut broadcast::Receiver<ProjectEvent>) -> Vec<ProjectEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

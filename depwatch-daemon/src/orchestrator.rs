//! Daemon orchestration -- context assembly, project sessions, and lifecycle.
//!
//! The [`Daemon`] is the central coordinator of `depwatch-daemon`. It turns
//! the loaded configuration into the shared scan context (settings, task
//! runner, backend, resolver factory), opens one [`ProjectSession`] per
//! project directory, and wires the background tasks around them.
//!
//! # Background Tasks (per session)
//!
//! 1. Result logger: re-reads the stores on every change notification
//! 2. Manifest poller: publishes file changes (when `watch.poll_interval_ms > 0`)
//!
//! # Signals
//!
//! - `SIGHUP`: reload the configuration file and publish the new settings
//! - `SIGTERM` / `SIGINT`: close every session, cancelling in-flight scans

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;

use depwatch_core::config::DepwatchConfig;
use depwatch_core::event::{ApplicationBus, ProjectEvent};
use depwatch_core::metrics as m;
use depwatch_scanner::aggregator::project_key;
use depwatch_scanner::{
    GlobalSettings, LocalDbBackend, ManifestResolverFactory, ProjectSession, ProjectStores,
    ScanContext, ScanOutcome, ScannerConfig, TaskRunner,
};

use crate::metrics_server;
use crate::summary::StoreSummary;
use crate::watcher::ManifestPoller;

/// Outcome of one scanner in a `--once` run.
#[derive(Debug, Clone)]
pub struct ScanResult {
    /// Project name.
    pub project: String,
    /// Scanner id (`kind@root`).
    pub scanner: String,
    /// Pipeline outcome.
    pub outcome: ScanOutcome,
}

/// The main daemon orchestrator.
pub struct Daemon {
    /// Configuration file, re-read on `SIGHUP`.
    config_path: Option<PathBuf>,
    /// Configuration the daemon was built from.
    config: DepwatchConfig,
    /// Process-wide scanner settings.
    settings: Arc<GlobalSettings>,
    /// Foreground/background task runner shared by all scanners.
    runner: Arc<TaskRunner>,
    /// One session per project directory.
    sessions: Vec<Arc<ProjectSession>>,
    /// Shutdown broadcast sender (signals all background tasks).
    shutdown_tx: broadcast::Sender<()>,
    /// Daemon start time (for uptime reporting).
    start_time: Instant,
}

impl Daemon {
    /// Load the configuration file and build the daemon.
    ///
    /// Fails if the file cannot be read or parsed, validation fails, or a
    /// project directory does not exist.
    pub async fn build(config_path: &Path, projects: &[PathBuf]) -> Result<Self> {
        let config = DepwatchConfig::load(config_path)
            .await
            .map_err(|e| anyhow::anyhow!("failed to load config: {}", e))?;
        Self::build_from_config(config, projects, Some(config_path.to_path_buf())).await
    }

    /// Build from an already-loaded configuration.
    ///
    /// Without a `config_path`, `SIGHUP` reloads are rejected.
    pub async fn build_from_config(
        config: DepwatchConfig,
        projects: &[PathBuf],
        config_path: Option<PathBuf>,
    ) -> Result<Self> {
        config
            .validate()
            .map_err(|e| anyhow::anyhow!("config validation failed: {}", e))?;
        let scanner_config = scanner_config(&config)?;

        if config.metrics.enabled {
            metrics_server::install_metrics_recorder(&config.metrics)?;
            tracing::info!(port = config.metrics.port, "metrics endpoint enabled");
        }

        if !scanner_config.is_backend_configured() {
            tracing::warn!("backend.db_path is empty, scans will be skipped until configured");
        }

        let settings = Arc::new(GlobalSettings::new(scanner_config, ApplicationBus::new()));
        let runner = Arc::new(TaskRunner::start());
        let ctx = ScanContext::new(
            Arc::clone(&settings),
            Arc::clone(&runner),
            Arc::new(LocalDbBackend::new(Arc::clone(&settings))),
            Arc::new(ManifestResolverFactory),
        );

        let mut sessions = Vec::with_capacity(projects.len());
        for dir in projects {
            if !dir.is_dir() {
                runner.shutdown().await;
                return Err(anyhow::anyhow!(
                    "project directory {} does not exist",
                    dir.display()
                ));
            }
            let name = project_name(dir);
            let session =
                ProjectSession::open(ctx.clone(), name, dir.clone(), ProjectStores::in_memory())
                    .await;
            sessions.push(Arc::new(session));
        }

        let (shutdown_tx, _) = broadcast::channel(16);
        tracing::info!(projects = sessions.len(), "daemon initialized");

        if config.metrics.enabled {
            record_daemon_metrics(sessions.len());
        }

        Ok(Self {
            config_path,
            config,
            settings,
            runner,
            sessions,
            shutdown_tx,
            start_time: Instant::now(),
        })
    }

    /// Open sessions.
    pub fn sessions(&self) -> &[Arc<ProjectSession>] {
        &self.sessions
    }

    /// Shared scanner settings.
    pub fn settings(&self) -> &Arc<GlobalSettings> {
        &self.settings
    }

    /// Configuration the daemon was built from.
    pub fn config(&self) -> &DepwatchConfig {
        &self.config
    }

    /// Manually scan every scanner of every session and wait for all outcomes.
    pub async fn scan_once(&self) -> Vec<ScanResult> {
        let mut pending = Vec::new();
        for session in &self.sessions {
            for scanner in session.registry().list() {
                let handle = scanner.trigger_scan(false, None);
                pending.push((session.name().to_owned(), scanner.id().to_string(), handle));
            }
        }

        let mut results = Vec::with_capacity(pending.len());
        for (project, scanner, handle) in pending {
            let outcome = handle.outcome().await;
            tracing::info!(project = %project, scanner = %scanner, outcome = %outcome, "scan finished");
            results.push(ScanResult {
                project,
                scanner,
                outcome,
            });
        }
        results
    }

    /// Summaries of every stored issue tree, read back from the stores.
    pub fn report(&self) -> Vec<StoreSummary> {
        let mut summaries = Vec::new();
        for session in &self.sessions {
            let stores = session.project().stores();
            for scanner in session.registry().list() {
                let Some(tree) = scanner.last_tree() else {
                    continue;
                };
                let key = project_key(session.name(), &tree);
                if let Some(stored) = stores.issues.snapshot(&key) {
                    summaries.push(StoreSummary::from_tree(&key, &stored));
                }
            }
        }
        summaries
    }

    /// Re-read the configuration file and publish the scanner settings.
    ///
    /// Returns the number of configuration subscribers notified. Logging and
    /// metrics settings are not re-applied.
    pub async fn reload_config(&self) -> Result<usize> {
        let path = self
            .config_path
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("daemon was built without a configuration file"))?;
        let config = DepwatchConfig::load(path)
            .await
            .map_err(|e| anyhow::anyhow!("failed to reload config: {}", e))?;
        let scanner_config = scanner_config(&config)?;
        Ok(self.settings.update(scanner_config))
    }

    /// Scan every project, then serve triggers until a shutdown signal.
    pub async fn run(&mut self) -> Result<()> {
        let mut signals = SignalListener::install()?;
        let mut tasks = Vec::new();

        for session in &self.sessions {
            tasks.push(spawn_result_logger(
                Arc::clone(session),
                self.shutdown_tx.subscribe(),
            ));

            if self.config.watch.poll_interval_ms > 0 {
                let poller = ManifestPoller::new(
                    Arc::clone(session),
                    Duration::from_millis(self.config.watch.poll_interval_ms),
                );
                tracing::debug!(
                    project = session.name(),
                    watched = poller.watched_count(),
                    "manifest poller started"
                );
                tasks.push(poller.spawn(self.shutdown_tx.subscribe()));
            }

            drop(session.scan_all());
        }

        if self.config.metrics.enabled {
            tasks.push(spawn_uptime_updater(
                self.start_time,
                self.shutdown_tx.subscribe(),
            ));
        }

        tracing::info!("entering main event loop");
        let signal = loop {
            match signals.next().await {
                DaemonSignal::Reload => match self.reload_config().await {
                    Ok(receivers) => {
                        tracing::info!(receivers, "configuration reloaded");
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "configuration reload failed, keeping previous settings");
                    }
                },
                DaemonSignal::Shutdown(name) => break name,
            }
        };
        tracing::info!(signal = signal, "shutdown signal received");

        let _ = self.shutdown_tx.send(());
        for task in tasks {
            let _ = task.await;
        }

        self.shutdown().await;
        Ok(())
    }

    /// Close every session and stop the task runner.
    ///
    /// Returns the number of sessions closed by this call.
    pub async fn shutdown(&self) -> usize {
        let closed = self.sessions.iter().filter(|s| s.close()).count();
        self.runner.shutdown().await;

        if self.config.metrics.enabled {
            metrics::gauge!(m::DAEMON_PROJECTS_OPEN).set(0.0);
        }
        tracing::info!(closed, "all project sessions closed");
        closed
    }
}

fn scanner_config(config: &DepwatchConfig) -> Result<ScannerConfig> {
    let scanner_config = ScannerConfig::from_core(config);
    scanner_config
        .validate()
        .map_err(|e| anyhow::anyhow!("scanner config validation failed: {}", e))?;
    Ok(scanner_config)
}

/// Session name for a project directory: its last path component.
pub fn project_name(dir: &Path) -> String {
    dir.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| dir.display().to_string())
}

enum DaemonSignal {
    Reload,
    Shutdown(&'static str),
}

struct SignalListener {
    hangup: tokio::signal::unix::Signal,
    terminate: tokio::signal::unix::Signal,
    interrupt: tokio::signal::unix::Signal,
}

impl SignalListener {
    fn install() -> Result<Self> {
        use tokio::signal::unix::{SignalKind, signal};

        let install = |kind: SignalKind, name: &str| {
            signal(kind).map_err(|e| anyhow::anyhow!("failed to install {} handler: {}", name, e))
        };
        Ok(Self {
            hangup: install(SignalKind::hangup(), "SIGHUP")?,
            terminate: install(SignalKind::terminate(), "SIGTERM")?,
            interrupt: install(SignalKind::interrupt(), "SIGINT")?,
        })
    }

    async fn next(&mut self) -> DaemonSignal {
        tokio::select! {
            _ = self.hangup.recv() => DaemonSignal::Reload,
            _ = self.terminate.recv() => DaemonSignal::Shutdown("SIGTERM"),
            _ = self.interrupt.recv() => DaemonSignal::Shutdown("SIGINT"),
        }
    }
}

/// Log a store summary for every change notification of `session`.
///
/// Notifications carry no payload, so each one re-reads the store it names.
pub fn spawn_result_logger(
    session: Arc<ProjectSession>,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> JoinHandle<()> {
    let mut results = session.project().bus().results.subscribe();
    tokio::spawn(async move {
        loop {
            tokio::select! {
                received = results.recv() => match received {
                    Ok(event) => log_event(&session, &event),
                    Err(RecvError::Lagged(missed)) => {
                        tracing::warn!(project = session.name(), missed, "result notifications dropped");
                    }
                    Err(RecvError::Closed) => break,
                },
                _ = shutdown_rx.recv() => {
                    tracing::debug!(project = session.name(), "result logger shutting down");
                    break;
                }
            }
        }
    })
}

fn log_event(session: &ProjectSession, event: &ProjectEvent) {
    let stores = session.project().stores();
    match event {
        ProjectEvent::IssuesChanged(key) => {
            let Some(tree) = stores.issues.snapshot(key) else {
                tracing::warn!(key = %key, "issues changed but store has no tree");
                return;
            };
            let summary = StoreSummary::from_tree(key, &tree);
            tracing::info!(
                project = %summary.project,
                root = %summary.root,
                dependencies = summary.dependencies,
                issues = summary.issues,
                worst = ?summary.worst_severity(),
                status = ?summary.status,
                "issues updated"
            );
        }
        ProjectEvent::LicensesChanged(key) => {
            let Some(tree) = stores.licenses.snapshot(key) else {
                tracing::warn!(key = %key, "licenses changed but store has no tree");
                return;
            };
            let summary = StoreSummary::from_tree(key, &tree);
            tracing::info!(
                project = %summary.project,
                root = %summary.root,
                licenses = summary.licenses.len(),
                selected = session.project().filters().selected_licenses().len(),
                "licenses updated"
            );
        }
    }
}

fn record_daemon_metrics(project_count: usize) {
    metrics::gauge!(m::DAEMON_BUILD_INFO, "version" => env!("CARGO_PKG_VERSION")).set(1.0);

    #[allow(clippy::cast_precision_loss)]
    metrics::gauge!(m::DAEMON_PROJECTS_OPEN).set(project_count as f64);
}

/// Update the uptime gauge every 10 seconds until shutdown.
fn spawn_uptime_updater(
    start_time: Instant,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(10));
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    #[allow(clippy::cast_precision_loss)]
                    metrics::gauge!(m::DAEMON_UPTIME_SECONDS).set(start_time.elapsed().as_secs() as f64);
                }
                _ = shutdown_rx.recv() => break,
            }
        }
    })
}

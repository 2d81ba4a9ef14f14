//! Test configuration builder for E2E tests.

use std::path::{Path, PathBuf};

use depwatch_core::config::DepwatchConfig;

/// Builder for test-friendly `DepwatchConfig` instances.
///
/// By default the home directory is the given temp dir, the backend is
/// unconfigured, polling is disabled and metrics are off.
#[allow(dead_code)]
pub struct TestConfigBuilder {
    config: DepwatchConfig,
}

#[allow(dead_code)]
impl TestConfigBuilder {
    /// Create a builder with its home under `home`.
    pub fn new(home: &Path) -> Self {
        let mut config = DepwatchConfig::default();
        config.general.home_dir = home.display().to_string();
        config.watch.poll_interval_ms = 0;
        config.metrics.enabled = false;
        Self { config }
    }

    /// Point the backend at a local database directory.
    pub fn db_path(mut self, dir: &Path) -> Self {
        self.config.backend.db_path = dir.display().to_string();
        self
    }

    /// Set the manifest poll interval.
    pub fn poll_interval_ms(mut self, ms: u64) -> Self {
        self.config.watch.poll_interval_ms = ms;
        self
    }

    /// Set the minimum reported severity.
    pub fn min_severity(mut self, severity: &str) -> Self {
        self.config.backend.min_severity = severity.to_owned();
        self
    }

    /// Build the configuration.
    pub fn build(self) -> DepwatchConfig {
        self.config
    }

    /// Serialize the configuration to `dir/depwatch.toml` and return the path.
    pub fn write_to(self, dir: &Path) -> PathBuf {
        let path = dir.join("depwatch.toml");
        let content = toml::to_string(&self.config).expect("config should serialize");
        std::fs::write(&path, content).expect("should write config file");
        path
    }
}

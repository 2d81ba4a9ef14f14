//! 설정 관리 -- depwatch.toml 파싱 및 런타임 설정
//!
//! [`DepwatchConfig`]는 데몬과 스캐너의 설정을 담는 최상위 구조체입니다.
//!
//! # 설정 로딩 우선순위
//! 1. CLI 인자 (최고 우선)
//! 2. 환경변수 (`DEPWATCH_BACKEND_DB_PATH=/opt/vuln-db` 형식)
//! 3. 설정 파일 (`depwatch.toml`)
//! 4. 기본값 (`Default` 구현)
//!
//! # 사용 예시
//! ```no_run
//! # async fn example() -> Result<(), depwatch_core::error::DepwatchError> {
//! use depwatch_core::config::DepwatchConfig;
//!
//! // 파일에서 로드 + 환경변수 오버라이드
//! let config = DepwatchConfig::load("depwatch.toml").await?;
//!
//! // TOML 문자열에서 직접 파싱
//! let config = DepwatchConfig::parse("[general]\nlog_level = \"debug\"")?;
//! # Ok(())
//! # }
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{ConfigError, DepwatchError};

/// 설정 파일 이름
pub const DEFAULT_CONFIG_FILE: &str = "depwatch.toml";

/// 캐시 기본 유효기간 (7일)
pub const DEFAULT_CACHE_TTL_SECS: u64 = 7 * 24 * 60 * 60;

/// 유효한 로그 레벨
const VALID_LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// 유효한 심각도
const VALID_SEVERITIES: [&str; 5] = ["info", "low", "medium", "high", "critical"];

/// depwatch 통합 설정
///
/// `depwatch.toml` 파일의 최상위 구조를 나타냅니다.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DepwatchConfig {
    /// 일반 설정
    #[serde(default)]
    pub general: GeneralConfig,
    /// 스캔 백엔드 설정
    #[serde(default)]
    pub backend: BackendConfig,
    /// 스캔 파이프라인 설정
    #[serde(default)]
    pub scan: ScanConfig,
    /// 매니페스트 감시 설정
    #[serde(default)]
    pub watch: WatchConfig,
    /// 메트릭 노출 설정
    #[serde(default)]
    pub metrics: MetricsConfig,
}

impl DepwatchConfig {
    /// TOML 파일에서 설정을 로드하고 환경변수 오버라이드를 적용합니다.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, DepwatchError> {
        let mut config = Self::from_file(path).await?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// TOML 파일에서 설정을 로드합니다 (환경변수 오버라이드 없음).
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, DepwatchError> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                DepwatchError::Config(ConfigError::FileNotFound {
                    path: path.display().to_string(),
                })
            } else {
                DepwatchError::Io(e)
            }
        })?;
        let config = Self::parse(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// TOML 문자열에서 설정을 파싱합니다.
    pub fn parse(toml_str: &str) -> Result<Self, DepwatchError> {
        toml::from_str(toml_str).map_err(|e| {
            DepwatchError::Config(ConfigError::ParseFailed {
                reason: e.to_string(),
            })
        })
    }

    /// 환경변수로 설정값을 오버라이드합니다.
    ///
    /// 환경변수 네이밍 규칙: `DEPWATCH_{SECTION}_{FIELD}`
    pub fn apply_env_overrides(&mut self) {
        override_string(&mut self.general.log_level, "DEPWATCH_GENERAL_LOG_LEVEL");
        override_string(&mut self.general.log_format, "DEPWATCH_GENERAL_LOG_FORMAT");
        override_string(&mut self.general.home_dir, "DEPWATCH_GENERAL_HOME_DIR");

        override_string(&mut self.backend.db_path, "DEPWATCH_BACKEND_DB_PATH");
        override_string(
            &mut self.backend.min_severity,
            "DEPWATCH_BACKEND_MIN_SEVERITY",
        );

        override_u64(&mut self.scan.cache_ttl_secs, "DEPWATCH_SCAN_CACHE_TTL_SECS");
        override_usize(
            &mut self.scan.max_manifest_size,
            "DEPWATCH_SCAN_MAX_MANIFEST_SIZE",
        );
        override_usize(&mut self.scan.max_walk_depth, "DEPWATCH_SCAN_MAX_WALK_DEPTH");
        override_usize(
            &mut self.scan.backend_batch_size,
            "DEPWATCH_SCAN_BACKEND_BATCH_SIZE",
        );

        override_u64(
            &mut self.watch.poll_interval_ms,
            "DEPWATCH_WATCH_POLL_INTERVAL_MS",
        );

        override_bool(&mut self.metrics.enabled, "DEPWATCH_METRICS_ENABLED");
        override_string(&mut self.metrics.listen_addr, "DEPWATCH_METRICS_LISTEN_ADDR");
        override_u16(&mut self.metrics.port, "DEPWATCH_METRICS_PORT");
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), DepwatchError> {
        if !VALID_LOG_LEVELS.contains(&self.general.log_level.as_str()) {
            return Err(invalid(
                "general.log_level",
                format!("must be one of: {}", VALID_LOG_LEVELS.join(", ")),
            ));
        }

        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&self.general.log_format.as_str()) {
            return Err(invalid(
                "general.log_format",
                format!("must be one of: {}", valid_formats.join(", ")),
            ));
        }

        if self.general.home_dir.trim().is_empty() {
            return Err(invalid("general.home_dir", "must not be empty".to_owned()));
        }

        if !VALID_SEVERITIES.contains(&self.backend.min_severity.to_lowercase().as_str()) {
            return Err(invalid(
                "backend.min_severity",
                format!("must be one of: {}", VALID_SEVERITIES.join(", ")),
            ));
        }

        if self.scan.max_manifest_size == 0 {
            return Err(invalid(
                "scan.max_manifest_size",
                "must be greater than 0".to_owned(),
            ));
        }

        if self.scan.backend_batch_size == 0 {
            return Err(invalid(
                "scan.backend_batch_size",
                "must be greater than 0".to_owned(),
            ));
        }

        if self.metrics.enabled && self.metrics.port == 0 {
            return Err(invalid(
                "metrics.port",
                "must be non-zero when metrics are enabled".to_owned(),
            ));
        }

        Ok(())
    }

    /// 백엔드가 설정되었는지 확인합니다.
    ///
    /// `backend.db_path`가 비어 있으면 미설정으로 간주합니다.
    pub fn is_backend_configured(&self) -> bool {
        !self.backend.db_path.trim().is_empty()
    }

    /// depwatch 홈 디렉토리
    pub fn home_path(&self) -> PathBuf {
        PathBuf::from(&self.general.home_dir)
    }

    /// 컴포넌트 캐시 루트 디렉토리 (`<home>/cache`)
    pub fn cache_root(&self) -> PathBuf {
        self.home_path().join("cache")
    }
}

fn invalid(field: &str, reason: String) -> DepwatchError {
    ConfigError::InvalidValue {
        field: field.to_owned(),
        reason,
    }
    .into()
}

/// 일반 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// 로그 레벨 (trace, debug, info, warn, error)
    pub log_level: String,
    /// 로그 형식 (json, pretty)
    pub log_format: String,
    /// 홈 디렉토리 (캐시 등 사용자별 데이터)
    pub home_dir: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_owned(),
            log_format: "json".to_owned(),
            home_dir: default_home_dir(),
        }
    }
}

fn default_home_dir() -> String {
    dirs::home_dir()
        .map(|home| home.join(".depwatch"))
        .unwrap_or_else(|| PathBuf::from(".depwatch"))
        .display()
        .to_string()
}

/// 스캔 백엔드 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// 로컬 취약점 데이터베이스 디렉토리 (비어 있으면 미설정)
    pub db_path: String,
    /// 보고할 최소 심각도 (info, low, medium, high, critical)
    pub min_severity: String,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            db_path: String::new(),
            min_severity: "low".to_owned(),
        }
    }
}

/// 스캔 파이프라인 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// 캐시 엔트리 유효기간 (초, 0이면 만료 없음)
    pub cache_ttl_secs: u64,
    /// 매니페스트 파일 최대 크기 (바이트)
    pub max_manifest_size: usize,
    /// npm 애플리케이션 탐색 최대 깊이
    pub max_walk_depth: usize,
    /// 백엔드 요청 당 최대 컴포넌트 수
    pub backend_batch_size: usize,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            cache_ttl_secs: DEFAULT_CACHE_TTL_SECS,
            max_manifest_size: 10 * 1024 * 1024,
            max_walk_depth: 8,
            backend_batch_size: 100,
        }
    }
}

/// 매니페스트 감시 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchConfig {
    /// 폴링 주기 (밀리초, 0이면 감시 비활성화)
    pub poll_interval_ms: u64,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 2_000,
        }
    }
}

/// 메트릭 노출 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// 활성화 여부
    pub enabled: bool,
    /// 리스닝 주소
    pub listen_addr: String,
    /// 리스닝 포트
    pub port: u16,
    /// 스크레이프 경로
    pub endpoint: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            listen_addr: "127.0.0.1".to_owned(),
            port: 9464,
            endpoint: "/metrics".to_owned(),
        }
    }
}

// --- 환경변수 오버라이드 헬퍼 ---

fn override_string(target: &mut String, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val;
    }
}

fn override_bool(target: &mut bool, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<bool>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse bool from env var, ignoring"
            ),
        }
    }
}

fn override_usize(target: &mut usize, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<usize>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse usize from env var, ignoring"
            ),
        }
    }
}

fn override_u16(target: &mut u16, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<u16>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse u16 from env var, ignoring"
            ),
        }
    }
}

fn override_u64(target: &mut u64, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<u64>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse u64 from env var, ignoring"
            ),
        }
    }
}

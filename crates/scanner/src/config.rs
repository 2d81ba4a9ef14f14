//! 스캐너 설정
//!
//! [`ScannerConfig`]는 core의 [`DepwatchConfig`](depwatch_core::config::DepwatchConfig)에서
//! 스캐너가 사용하는 필드만 추려 타입을 입힌 설정입니다.
//!
//! # 사용 예시
//!
//! ```
//! use depwatch_scanner::{ScannerConfig, ScannerConfigBuilder};
//!
//! let config = ScannerConfig::default();
//! config.validate().unwrap();
//!
//! let config = ScannerConfigBuilder::new()
//!     .home_dir("/tmp/depwatch")
//!     .max_walk_depth(3)
//!     .build()
//!     .unwrap();
//! assert_eq!(config.max_walk_depth, 3);
//! ```

use std::path::{Component, Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use depwatch_core::config::{DEFAULT_CACHE_TTL_SECS, DepwatchConfig};
use depwatch_core::types::Severity;

use crate::error::ScannerError;

/// 설정 상한값 상수
const MAX_MANIFEST_SIZE: usize = 100 * 1024 * 1024; // 100 MB
const MAX_WALK_DEPTH: usize = 64;
const MAX_BATCH_SIZE: usize = 10_000;

/// 스캐너 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScannerConfig {
    /// 홈 디렉토리. 캐시는 `<home>/cache/<project>/` 아래에 둡니다.
    pub home_dir: PathBuf,
    /// 로컬 취약점 DB 디렉토리 (비어 있으면 백엔드 미설정)
    pub db_path: String,
    /// 보고할 최소 심각도
    pub min_severity: Severity,
    /// 캐시 유효기간 (초, 0이면 만료 없음)
    pub cache_ttl_secs: u64,
    /// 매니페스트 최대 허용 크기 (바이트)
    pub max_manifest_size: usize,
    /// npm 애플리케이션 디렉토리 탐색 최대 깊이
    pub max_walk_depth: usize,
    /// 백엔드 요청 당 최대 컴포넌트 수
    pub backend_batch_size: usize,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        let core = DepwatchConfig::default();
        Self::from_core(&core)
    }
}

impl ScannerConfig {
    /// core 설정에서 스캐너 설정을 생성합니다.
    ///
    /// 알 수 없는 심각도 문자열은 `Low`로 처리합니다.
    pub fn from_core(core: &DepwatchConfig) -> Self {
        Self {
            home_dir: core.home_path(),
            db_path: core.backend.db_path.clone(),
            min_severity: Severity::from_str_loose(&core.backend.min_severity)
                .unwrap_or(Severity::Low),
            cache_ttl_secs: core.scan.cache_ttl_secs,
            max_manifest_size: core.scan.max_manifest_size,
            max_walk_depth: core.scan.max_walk_depth,
            backend_batch_size: core.scan.backend_batch_size,
        }
    }

    /// 설정 값의 유효성을 검증합니다.
    ///
    /// # 검증 규칙
    ///
    /// - `max_manifest_size`: 1-104857600 (100MB)
    /// - `max_walk_depth`: 1-64
    /// - `backend_batch_size`: 1-10000
    /// - `home_dir`: 비어 있지 않고 `..` 컴포넌트를 포함하지 않음
    pub fn validate(&self) -> Result<(), ScannerError> {
        if self.max_manifest_size == 0 || self.max_manifest_size > MAX_MANIFEST_SIZE {
            return Err(ScannerError::Config {
                field: "max_manifest_size".to_owned(),
                reason: format!("must be 1-{MAX_MANIFEST_SIZE}"),
            });
        }

        if self.max_walk_depth == 0 || self.max_walk_depth > MAX_WALK_DEPTH {
            return Err(ScannerError::Config {
                field: "max_walk_depth".to_owned(),
                reason: format!("must be 1-{MAX_WALK_DEPTH}"),
            });
        }

        if self.backend_batch_size == 0 || self.backend_batch_size > MAX_BATCH_SIZE {
            return Err(ScannerError::Config {
                field: "backend_batch_size".to_owned(),
                reason: format!("must be 1-{MAX_BATCH_SIZE}"),
            });
        }

        if self.home_dir.as_os_str().is_empty() {
            return Err(ScannerError::Config {
                field: "home_dir".to_owned(),
                reason: "must not be empty".to_owned(),
            });
        }

        if has_parent_component(&self.home_dir) {
            return Err(ScannerError::Config {
                field: "home_dir".to_owned(),
                reason: "home_dir contains path traversal pattern '..'".to_owned(),
            });
        }

        if has_parent_component(Path::new(&self.db_path)) {
            return Err(ScannerError::Config {
                field: "db_path".to_owned(),
                reason: "db_path contains path traversal pattern '..'".to_owned(),
            });
        }

        Ok(())
    }

    /// 백엔드가 설정되었는지 확인합니다.
    pub fn is_backend_configured(&self) -> bool {
        !self.db_path.trim().is_empty()
    }

    /// 캐시 루트 (`<home>/cache`)
    pub fn cache_root(&self) -> PathBuf {
        self.home_dir.join("cache")
    }

    /// 캐시 유효기간. 0이면 `None`(만료 없음).
    pub fn cache_ttl(&self) -> Option<Duration> {
        (self.cache_ttl_secs > 0).then(|| Duration::from_secs(self.cache_ttl_secs))
    }
}

fn has_parent_component(path: &Path) -> bool {
    path.components().any(|c| c == Component::ParentDir)
}

/// [`ScannerConfig`] 빌더
///
/// 빌드 시 유효성 검증을 수행합니다.
#[derive(Default)]
pub struct ScannerConfigBuilder {
    config: ScannerConfig,
}

impl ScannerConfigBuilder {
    /// 기본값을 가진 새 빌더를 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 홈 디렉토리를 설정합니다.
    pub fn home_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.home_dir = dir.into();
        self
    }

    /// 로컬 취약점 DB 경로를 설정합니다.
    pub fn db_path(mut self, path: impl Into<String>) -> Self {
        self.config.db_path = path.into();
        self
    }

    /// 최소 심각도를 설정합니다.
    pub fn min_severity(mut self, severity: Severity) -> Self {
        self.config.min_severity = severity;
        self
    }

    /// 캐시 유효기간(초)을 설정합니다.
    pub fn cache_ttl_secs(mut self, secs: u64) -> Self {
        self.config.cache_ttl_secs = secs;
        self
    }

    /// 매니페스트 최대 크기(바이트)를 설정합니다.
    pub fn max_manifest_size(mut self, size: usize) -> Self {
        self.config.max_manifest_size = size;
        self
    }

    /// npm 탐색 최대 깊이를 설정합니다.
    pub fn max_walk_depth(mut self, depth: usize) -> Self {
        self.config.max_walk_depth = depth;
        self
    }

    /// 백엔드 배치 크기를 설정합니다.
    pub fn backend_batch_size(mut self, size: usize) -> Self {
        self.config.backend_batch_size = size;
        self
    }

    /// 설정을 검증하고 빌드합니다.
    ///
    /// # Errors
    ///
    /// 유효성 검증 실패 시 `ScannerError::Config` 반환
    pub fn build(self) -> Result<ScannerConfig, ScannerError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

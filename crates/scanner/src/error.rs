//! 스캐너 에러 타입
//!
//! [`ScannerError`]는 스캐너 크레이트 내에서 발생할 수 있는 모든 에러를 나타냅니다.
//! `From<ScannerError> for DepwatchError` 구현을 통해 `?` 연산자로
//! 상위 에러 타입으로 전파됩니다.
//!
//! # 에러 카테고리
//!
//! - **설정**: `NotConfigured`, `Config`
//! - **적용성 탐지**: `Detection` (로그만 남기고 "적용 불가"로 처리)
//! - **파이프라인**: `Pipeline`, `Refresh`, `Backend`, `Cache`, `ManifestParse`
//! - **취소**: `Canceled` (에러가 아닌 신호, 사용자에게 노출하지 않음)
//! - **파일 I/O**: `Io`
//!
//! 파이프라인 에러는 스캐너 경계에서 종료됩니다. 레지스트리나 다른 스캐너로
//! 전파되지 않습니다.

use depwatch_core::error::{ConfigError, DepwatchError, ScanError};

use crate::types::BuildSystem;

/// 스캐너 도메인 에러
#[derive(Debug, thiserror::Error)]
pub enum ScannerError {
    /// 백엔드 미설정
    #[error("scan backend is not configured")]
    NotConfigured,

    /// 빌드 시스템 적용성 탐지 중 I/O 실패
    #[error("{kind} detection failed at {path}: {source}")]
    Detection {
        /// 탐지 대상 빌드 시스템
        kind: BuildSystem,
        /// 탐지 경로
        path: String,
        /// 원본 I/O 에러
        source: std::io::Error,
    },

    /// 파이프라인 단계 실패
    #[error("pipeline failed at {stage}: {reason}")]
    Pipeline {
        /// 실패한 단계
        stage: String,
        /// 실패 사유
        reason: String,
    },

    /// 의존성 새로고침 실패
    #[error("dependency refresh failed: {message}")]
    Refresh {
        /// 요약 메시지
        message: String,
        /// 상세 정보 (빌드 도구 출력 등)
        details: Option<String>,
    },

    /// 백엔드 조회 실패
    #[error("backend error: {0}")]
    Backend(String),

    /// 컴포넌트 캐시 실패
    #[error("cache error: {path}: {reason}")]
    Cache {
        /// 캐시 파일 또는 디렉토리 경로
        path: String,
        /// 실패 사유
        reason: String,
    },

    /// 매니페스트 파싱 실패
    #[error("manifest parse error: {path}: {reason}")]
    ManifestParse {
        /// 매니페스트 경로
        path: String,
        /// 파싱 실패 사유
        reason: String,
    },

    /// 협조적 취소
    #[error("scan canceled")]
    Canceled,

    /// 설정 에러
    #[error("config error: {field}: {reason}")]
    Config {
        /// 설정 필드명
        field: String,
        /// 에러 사유
        reason: String,
    },

    /// 파일 I/O 에러
    #[error("io error: {path}: {source}")]
    Io {
        /// 관련 파일 경로
        path: String,
        /// 원본 I/O 에러
        source: std::io::Error,
    },
}

impl ScannerError {
    /// 취소 신호인지 확인합니다.
    pub fn is_canceled(&self) -> bool {
        matches!(self, Self::Canceled)
    }
}

impl From<ScannerError> for DepwatchError {
    fn from(err: ScannerError) -> Self {
        match err {
            ScannerError::NotConfigured => DepwatchError::Scan(ScanError::NotConfigured),
            ScannerError::Detection { kind, path, source } => DepwatchError::Scan(
                ScanError::Detection(format!("{kind} at {path}: {source}")),
            ),
            ScannerError::Pipeline { stage, reason } => {
                DepwatchError::Scan(ScanError::PipelineFailed { stage, reason })
            }
            ScannerError::Refresh { message, .. } => {
                DepwatchError::Scan(ScanError::PipelineFailed {
                    stage: "refreshing".to_owned(),
                    reason: message,
                })
            }
            ScannerError::Backend(reason) => DepwatchError::Scan(ScanError::PipelineFailed {
                stage: "scanning".to_owned(),
                reason,
            }),
            ScannerError::Cache { path, reason } => {
                DepwatchError::Scan(ScanError::Cache(format!("{path}: {reason}")))
            }
            ScannerError::ManifestParse { path, reason } => {
                DepwatchError::Scan(ScanError::PipelineFailed {
                    stage: "tree-building".to_owned(),
                    reason: format!("{path}: {reason}"),
                })
            }
            ScannerError::Canceled => DepwatchError::Scan(ScanError::Canceled),
            ScannerError::Config { field, reason } => {
                DepwatchError::Config(ConfigError::InvalidValue { field, reason })
            }
            ScannerError::Io { source, .. } => DepwatchError::Io(source),
        }
    }
}

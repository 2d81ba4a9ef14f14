//! 에러 타입 -- 도메인별 에러 정의

/// depwatch 최상위 에러 타입
#[derive(Debug, thiserror::Error)]
pub enum DepwatchError {
    /// 설정 관련 에러
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// 스캔 관련 에러
    #[error("scan error: {0}")]
    Scan(#[from] ScanError),

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// 설정 관련 에러
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// 설정 파일을 찾을 수 없음
    #[error("config file not found: {path}")]
    FileNotFound { path: String },

    /// 설정 파싱 실패
    #[error("failed to parse config: {reason}")]
    ParseFailed { reason: String },

    /// 유효하지 않은 설정 값
    #[error("invalid config value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}

/// 스캔 관련 에러
///
/// 스캐너 크레이트의 세부 에러가 호스트로 전파될 때 사용하는 요약 표현입니다.
#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    /// 백엔드 자격 증명/설정이 없음
    #[error("scan backend is not configured")]
    NotConfigured,

    /// 빌드 시스템 탐지 실패
    #[error("build system detection failed: {0}")]
    Detection(String),

    /// 파이프라인 단계 실패
    #[error("scan pipeline failed at {stage}: {reason}")]
    PipelineFailed { stage: String, reason: String },

    /// 협조적 취소
    #[error("scan canceled")]
    Canceled,

    /// 컴포넌트 캐시 에러
    #[error("component cache error: {0}")]
    Cache(String),
}

//! 메트릭 상수 및 설명 등록
//!
//! 모든 Prometheus 메트릭의 이름과 설명을 중앙에서 정의합니다.
//! 스캔 파이프라인과 데몬은 이 상수로 `metrics::counter!()`, `metrics::gauge!()`,
//! `metrics::histogram!()` 매크로를 호출합니다.
//!
//! # 네이밍 컨벤션
//!
//! - 접두어: `depwatch_`
//! - 영역: `scanner_`, `cache_`, `registry_`, `daemon_`
//! - 접미어: `_total` (counter), `_seconds` (histogram), 없음 (gauge)

// ─── 레이블 키 상수 ────────────────────────────────────────────────

/// 빌드 시스템 레이블 키 (maven, gradle, npm, go)
pub const LABEL_KIND: &str = "kind";

/// 파이프라인 단계 레이블 키
pub const LABEL_STAGE: &str = "stage";

/// 심각도 레이블 키 (info, low, medium, high, critical)
pub const LABEL_SEVERITY: &str = "severity";

/// 스킵 사유 레이블 키 (already_running, not_configured, indexing)
pub const LABEL_REASON: &str = "reason";

// ─── 스캐너 메트릭 ─────────────────────────────────────────────────

/// 시작된 스캔 수 (counter, label: kind)
pub const SCANNER_SCANS_STARTED_TOTAL: &str = "depwatch_scanner_scans_started_total";

/// 완료된 스캔 수 (counter, label: kind)
pub const SCANNER_SCANS_COMPLETED_TOTAL: &str = "depwatch_scanner_scans_completed_total";

/// 실패한 스캔 수 (counter, labels: kind, stage)
pub const SCANNER_SCANS_FAILED_TOTAL: &str = "depwatch_scanner_scans_failed_total";

/// 취소된 스캔 수 (counter, label: kind)
pub const SCANNER_SCANS_CANCELED_TOTAL: &str = "depwatch_scanner_scans_canceled_total";

/// 건너뛴 트리거 수 (counter, labels: kind, reason)
pub const SCANNER_TRIGGERS_SKIPPED_TOTAL: &str = "depwatch_scanner_triggers_skipped_total";

/// 발견된 이슈 수 (counter, labels: kind, severity)
pub const SCANNER_ISSUES_FOUND_TOTAL: &str = "depwatch_scanner_issues_found_total";

/// 스캔 소요 시간 (histogram, 초, label: kind)
pub const SCANNER_SCAN_DURATION_SECONDS: &str = "depwatch_scanner_scan_duration_seconds";

// ─── 캐시 메트릭 ───────────────────────────────────────────────────

/// 캐시 적중 수 (counter)
pub const CACHE_HITS_TOTAL: &str = "depwatch_cache_hits_total";

/// 캐시 미스 수 (counter)
pub const CACHE_MISSES_TOTAL: &str = "depwatch_cache_misses_total";

// ─── 레지스트리 메트릭 ─────────────────────────────────────────────

/// 살아 있는 스캐너 수 (gauge)
pub const REGISTRY_LIVE_SCANNERS: &str = "depwatch_registry_live_scanners";

// ─── 데몬 메트릭 ───────────────────────────────────────────────────

/// 가동 시간 (gauge, 초)
pub const DAEMON_UPTIME_SECONDS: &str = "depwatch_daemon_uptime_seconds";

/// 열린 프로젝트 세션 수 (gauge)
pub const DAEMON_PROJECTS_OPEN: &str = "depwatch_daemon_projects_open";

/// 빌드 정보 (gauge, 항상 1, label: version)
pub const DAEMON_BUILD_INFO: &str = "depwatch_daemon_build_info";

// ─── 히스토그램 버킷 정의 ────────────────────────────────────────────

/// 스캔 소요 시간 히스토그램 버킷 (초)
///
/// 10ms ~ 300s 범위 (캐시 적중 시 매우 짧고, 백엔드 호출 시 길어짐)
pub const SCAN_DURATION_BUCKETS: [f64; 10] =
    [0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 10.0, 30.0, 120.0, 300.0];

// ─── 설명 등록 함수 ─────────────────────────────────────────────────

/// 모든 메트릭의 설명(description)을 등록합니다.
///
/// 전역 레코더 설치 후 한 번만 호출해야 합니다.
/// 일반적으로 `depwatch-daemon`의 시작 시점에서 호출합니다.
pub fn describe_all() {
    use metrics::{describe_counter, describe_gauge, describe_histogram};

    // Scanner
    describe_counter!(
        SCANNER_SCANS_STARTED_TOTAL,
        "Total number of scan pipelines that acquired the single-flight lock"
    );
    describe_counter!(
        SCANNER_SCANS_COMPLETED_TOTAL,
        "Total number of scans that published results"
    );
    describe_counter!(
        SCANNER_SCANS_FAILED_TOTAL,
        "Total number of scans that failed, by stage"
    );
    describe_counter!(
        SCANNER_SCANS_CANCELED_TOTAL,
        "Total number of scans canceled before publishing"
    );
    describe_counter!(
        SCANNER_TRIGGERS_SKIPPED_TOTAL,
        "Total number of scan triggers that were dropped, by reason"
    );
    describe_counter!(
        SCANNER_ISSUES_FOUND_TOTAL,
        "Total number of vulnerability findings merged into trees"
    );
    describe_histogram!(
        SCANNER_SCAN_DURATION_SECONDS,
        "Time to complete a single scan pipeline in seconds"
    );

    // Cache
    describe_counter!(CACHE_HITS_TOTAL, "Component cache hits");
    describe_counter!(CACHE_MISSES_TOTAL, "Component cache misses");

    // Registry
    describe_gauge!(
        REGISTRY_LIVE_SCANNERS,
        "Number of live scanners across open projects"
    );

    // Daemon
    describe_gauge!(DAEMON_UPTIME_SECONDS, "depwatch daemon uptime in seconds");
    describe_gauge!(DAEMON_PROJECTS_OPEN, "Number of open project sessions");
    describe_gauge!(
        DAEMON_BUILD_INFO,
        "Build information (always 1, with version label)"
    );
}

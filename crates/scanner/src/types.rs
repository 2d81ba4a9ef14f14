//! 도메인 타입 -- 스캐너 전용 데이터 구조
//!
//! 빌드 시스템 종류, 컴포넌트 좌표, 스캔 상태와 결과 등
//! 스캔 파이프라인의 핵심 타입을 정의합니다.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use depwatch_core::types::{Issue, License, Severity};

/// 빌드 시스템 종류
///
/// 레지스트리가 적용성을 평가하는 단위입니다. 프로젝트당 종류별로
/// 최대 하나의 스캐너가 살아 있습니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum BuildSystem {
    /// Maven (pom.xml)
    Maven,
    /// Gradle (build.gradle, build.gradle.kts)
    Gradle,
    /// npm (package.json / package-lock.json)
    Npm,
    /// Go modules (go.mod)
    Go,
}

impl BuildSystem {
    /// 레지스트리가 평가하는 모든 종류 (평가 순서)
    ///
    /// 경로 기반 종류(npm)는 다른 스캐너의 루트를 필요로 하므로 마지막에 평가합니다.
    pub const ALL: [BuildSystem; 4] = [Self::Maven, Self::Gradle, Self::Go, Self::Npm];

    /// 소문자 이름
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Maven => "maven",
            Self::Gradle => "gradle",
            Self::Npm => "npm",
            Self::Go => "go",
        }
    }

    /// 이 빌드 시스템의 존재를 알리는 매니페스트 파일 이름
    pub fn manifest_files(&self) -> &'static [&'static str] {
        match self {
            Self::Maven => &["pom.xml"],
            Self::Gradle => &["build.gradle", "build.gradle.kts"],
            Self::Npm => &["package.json"],
            Self::Go => &["go.mod"],
        }
    }

    /// 경로 기반 종류인지 확인합니다.
    ///
    /// 경로 기반 종류는 애플리케이션 디렉토리 탐색으로 적용성을 결정하며,
    /// 다른 스캐너가 기여한 루트와의 중첩을 제거합니다.
    pub fn is_path_based(&self) -> bool {
        matches!(self, Self::Npm)
    }

    /// 컴포넌트 좌표 접두사
    pub fn coordinate_prefix(&self) -> &'static str {
        match self {
            Self::Maven | Self::Gradle => ComponentId::GAV_PREFIX,
            Self::Npm => ComponentId::NPM_PREFIX,
            Self::Go => ComponentId::GO_PREFIX,
        }
    }

    /// 문자열에서 빌드 시스템을 파싱합니다 (대소문자 구분 없음).
    pub fn from_str_loose(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "maven" | "mvn" => Some(Self::Maven),
            "gradle" => Some(Self::Gradle),
            "npm" | "node" => Some(Self::Npm),
            "go" | "golang" => Some(Self::Go),
            _ => None,
        }
    }
}

impl fmt::Display for BuildSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 스캐너 식별자
///
/// (빌드 시스템 종류, 프로젝트 루트) 쌍입니다.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ScannerId {
    /// 빌드 시스템 종류
    pub kind: BuildSystem,
    /// 프로젝트 루트
    pub root: PathBuf,
}

impl ScannerId {
    pub fn new(kind: BuildSystem, root: impl Into<PathBuf>) -> Self {
        Self {
            kind,
            root: root.into(),
        }
    }
}

impl fmt::Display for ScannerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.kind, self.root.display())
    }
}

/// 컴포넌트 좌표
///
/// `gav://group:artifact:version`, `npm://name:version`, `go://module:version` 형식입니다.
/// 캐시 키와 백엔드 조회 키로 사용됩니다.
#[derive(
    Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct ComponentId(String);

impl ComponentId {
    /// Maven/Gradle 좌표 접두사
    pub const GAV_PREFIX: &'static str = "gav://";
    /// npm 좌표 접두사
    pub const NPM_PREFIX: &'static str = "npm://";
    /// Go 모듈 좌표 접두사
    pub const GO_PREFIX: &'static str = "go://";

    /// Maven 좌표를 생성합니다.
    pub fn gav(group: &str, artifact: &str, version: &str) -> Self {
        Self(format!("{}{group}:{artifact}:{version}", Self::GAV_PREFIX))
    }

    /// npm 좌표를 생성합니다.
    pub fn npm(name: &str, version: &str) -> Self {
        Self(format!("{}{name}:{version}", Self::NPM_PREFIX))
    }

    /// Go 모듈 좌표를 생성합니다.
    pub fn go(module: &str, version: &str) -> Self {
        Self(format!("{}{module}:{version}", Self::GO_PREFIX))
    }

    /// 임의 문자열에서 좌표를 만듭니다. 접두사를 검증하지 않습니다.
    pub fn from_raw(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// 좌표 문자열
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// 좌표 접두사 (`gav://` 등). 알 수 없으면 `None`.
    pub fn prefix(&self) -> Option<&'static str> {
        [Self::GAV_PREFIX, Self::NPM_PREFIX, Self::GO_PREFIX]
            .into_iter()
            .find(|p| self.0.starts_with(p))
    }

    /// (이름, 버전) 쌍으로 분해합니다.
    ///
    /// Maven 좌표의 이름은 `group:artifact` 입니다.
    pub fn name_and_version(&self) -> Option<(&str, &str)> {
        let prefix = self.prefix()?;
        let body = &self.0[prefix.len()..];
        let (name, version) = body.rsplit_once(':')?;
        if name.is_empty() || version.is_empty() {
            return None;
        }
        Some((name, version))
    }
}

impl fmt::Display for ComponentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// 백엔드가 보고한 컴포넌트 단위 결과
///
/// 캐시에 그대로 직렬화됩니다.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentReport {
    /// 라이선스 목록
    #[serde(default)]
    pub licenses: Vec<License>,
    /// 취약점 목록
    #[serde(default)]
    pub issues: Vec<Issue>,
}

impl ComponentReport {
    /// 보고 내용이 비어 있는지 확인합니다.
    pub fn is_empty(&self) -> bool {
        self.licenses.is_empty() && self.issues.is_empty()
    }

    /// `min_severity` 미만의 이슈를 제거합니다.
    ///
    /// 캐시에는 필터링 전 보고서가 저장되므로 설정의 최소 심각도는 조회 뒤에 적용합니다.
    pub fn retain_min_severity(&mut self, min_severity: Severity) {
        self.issues.retain(|issue| issue.severity >= min_severity);
    }
}

/// 스캐너 상태
///
/// `Idle → Refreshing → TreeBuilding → Scanning → Aggregating → Idle` 순서로 진행합니다.
/// `Canceled`와 `Failed`는 잠금 해제 후 `Idle`로 돌아가며 고정되지 않습니다.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScanState {
    /// 대기
    #[default]
    Idle,
    /// 빌드 시스템 의존성 새로고침
    Refreshing,
    /// 의존성 트리 구성
    TreeBuilding,
    /// 백엔드 스캔 (캐시 경유)
    Scanning,
    /// 결과 발행
    Aggregating,
    /// 취소됨
    Canceled,
    /// 실패
    Failed,
}

impl ScanState {
    /// 단계 이름 (로그/메트릭 레이블용)
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Refreshing => "refreshing",
            Self::TreeBuilding => "tree-building",
            Self::Scanning => "scanning",
            Self::Aggregating => "aggregating",
            Self::Canceled => "canceled",
            Self::Failed => "failed",
        }
    }

    /// 파이프라인이 진행 중인 상태인지 확인합니다.
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            Self::Refreshing | Self::TreeBuilding | Self::Scanning | Self::Aggregating
        )
    }
}

impl fmt::Display for ScanState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `trigger_scan` 결과
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanOutcome {
    /// 파이프라인이 완료되어 결과를 발행함
    Completed {
        /// 발행한 스캔 세대
        generation: u64,
    },
    /// 이미 스캔이 진행 중이어서 트리거를 무시함
    AlreadyRunning,
    /// 백엔드 미설정으로 중단함 (잠금 획득 없음)
    NotConfigured,
    /// 취소되어 발행하지 않음
    Canceled,
    /// 단계 실패로 발행하지 않음
    Failed {
        /// 실패한 단계
        stage: ScanState,
        /// 실패 사유
        reason: String,
    },
    /// 프로젝트가 닫혀 있어 제출하지 않음
    ProjectClosed,
    /// 프로젝트 인덱싱 중이라 건너뜀
    Indexing,
    /// 파이프라인 태스크가 결과 보고 없이 종료됨
    Aborted,
}

impl ScanOutcome {
    /// 결과를 발행했는지 확인합니다.
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed { .. })
    }
}

impl fmt::Display for ScanOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Completed { generation } => write!(f, "completed (generation {generation})"),
            Self::AlreadyRunning => write!(f, "already running"),
            Self::NotConfigured => write!(f, "not configured"),
            Self::Canceled => write!(f, "canceled"),
            Self::Failed { stage, reason } => write!(f, "failed at {stage}: {reason}"),
            Self::ProjectClosed => write!(f, "project closed"),
            Self::Indexing => write!(f, "project indexing"),
            Self::Aborted => write!(f, "aborted"),
        }
    }
}

//! 도메인 타입 -- 시스템 전역에서 사용되는 공통 타입
//!
//! 스캐너, 결과 저장소, 호스트(데몬)가 공유하는 데이터 구조를 정의합니다.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// 심각도 레벨
///
/// 취약점 발견의 심각도를 나타냅니다.
/// `Ord` 구현으로 심각도 비교가 가능합니다 (`Info < Low < Medium < High < Critical`).
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum Severity {
    /// 정보성
    #[default]
    Info,
    /// 낮은 심각도
    Low,
    /// 중간 심각도
    Medium,
    /// 높은 심각도
    High,
    /// 치명적
    Critical,
}

impl Severity {
    /// 문자열에서 심각도를 파싱합니다.
    ///
    /// 대소문자를 구분하지 않습니다.
    pub fn from_str_loose(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "info" | "informational" | "unknown" => Some(Self::Info),
            "low" => Some(Self::Low),
            "medium" | "med" | "moderate" => Some(Self::Medium),
            "high" => Some(Self::High),
            "critical" | "crit" => Some(Self::Critical),
            _ => None,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Info => write!(f, "Info"),
            Self::Low => write!(f, "Low"),
            Self::Medium => write!(f, "Medium"),
            Self::High => write!(f, "High"),
            Self::Critical => write!(f, "Critical"),
        }
    }
}

/// 라이선스
///
/// 이름(SPDX 식별자 또는 자유 형식)으로 식별됩니다.
/// 프로젝트 단위 집계는 `BTreeSet<License>`로 중복을 제거합니다.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct License {
    /// 라이선스 이름 (예: "MIT", "Apache-2.0")
    pub name: String,
}

impl License {
    /// 이름으로 라이선스를 생성합니다.
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    /// 라이선스 정보가 없는 컴포넌트에 붙는 값
    pub fn unknown() -> Self {
        Self::new("Unknown")
    }

    /// 알 수 없는 라이선스인지 확인합니다.
    pub fn is_unknown(&self) -> bool {
        self.name.eq_ignore_ascii_case("unknown")
    }
}

impl fmt::Display for License {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// 취약점 발견 (이슈)
///
/// 백엔드가 특정 컴포넌트에 대해 보고한 취약점입니다.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Issue {
    /// 취약점 ID (예: CVE-2024-1234)
    pub id: String,
    /// 영향받는 컴포넌트 좌표 (예: gav://org.foo:bar:1.0)
    pub component: String,
    /// 심각도
    pub severity: Severity,
    /// 요약
    pub summary: String,
    /// 수정된 버전 목록
    #[serde(default)]
    pub fixed_versions: Vec<String>,
}

impl fmt::Display for Issue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fixed = if self.fixed_versions.is_empty() {
            "N/A".to_owned()
        } else {
            self.fixed_versions.join(", ")
        };
        write!(
            f,
            "{} [{}] {} (fixed: {})",
            self.id, self.severity, self.component, fixed,
        )
    }
}

/// 트리 루트 노드의 일반 정보
///
/// 빌드 시스템이 보고한 모듈/애플리케이션의 이름과 위치입니다.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GeneralInfo {
    /// 모듈 또는 패키지 이름
    pub name: String,
    /// 그룹 ID (Maven/Gradle 전용)
    #[serde(default)]
    pub group_id: Option<String>,
    /// 버전
    #[serde(default)]
    pub version: Option<String>,
    /// 매니페스트가 위치한 디렉토리
    pub path: PathBuf,
    /// 패키지 타입 (maven, gradle, npm, go)
    pub pkg_type: String,
}

impl GeneralInfo {
    /// 이름, 경로, 패키지 타입으로 생성합니다.
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>, pkg_type: &str) -> Self {
        Self {
            name: name.into(),
            group_id: None,
            version: None,
            path: path.into(),
            pkg_type: pkg_type.to_owned(),
        }
    }

    /// 버전을 설정합니다.
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    /// 그룹 ID를 설정합니다.
    pub fn with_group_id(mut self, group_id: impl Into<String>) -> Self {
        self.group_id = Some(group_id.into());
        self
    }
}

/// 결과 저장소 주소
///
/// 프로젝트 이름과 트리 루트의 [`GeneralInfo`]로부터 만들어지며,
/// 스캐너 식별자와 무관하게 프레젠테이션 저장소를 가리킵니다.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ProjectKey {
    /// 호스트 프로젝트 이름
    pub project_name: String,
    /// 트리 루트 이름
    pub root_name: String,
    /// 트리 루트 경로
    pub root_path: PathBuf,
}

impl ProjectKey {
    /// 프로젝트 이름과 루트 정보로 키를 만듭니다.
    pub fn new(project_name: impl Into<String>, root: &GeneralInfo) -> Self {
        Self {
            project_name: project_name.into(),
            root_name: root.name.clone(),
            root_path: root.path.clone(),
        }
    }

    /// 키가 가리키는 루트 경로
    pub fn root_path(&self) -> &Path {
        &self.root_path
    }
}

impl fmt::Display for ProjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{} ({})",
            self.project_name,
            self.root_name,
            self.root_path.display(),
        )
    }
}

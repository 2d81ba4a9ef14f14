//! 의존성 리졸버 -- 빌드 시스템별 의존성 트리 구성
//!
//! [`DependencyResolver`]는 스캐너가 Refreshing/TreeBuilding 단계에서 호출하는
//! 확장 포인트입니다. [`ResolverFactory`]는 레지스트리가 탐지 결과로부터 리졸버를
//! 만들 때 사용하며, 기본 구현 [`ManifestResolverFactory`]는 매니페스트 파일을
//! 직접 읽는 참조 리졸버를 만듭니다.
//!
//! # 지원 형식
//!
//! - Maven: `pom.xml` -- [`MavenResolver`]
//! - Gradle: `build.gradle(.kts)`, `gradle.lockfile` -- [`GradleResolver`]
//! - npm: `package-lock.json` (v2/v3), `package.json` -- [`NpmResolver`]
//! - Go: `go.mod` -- [`GoResolver`]

pub mod go;
pub mod gradle;
pub mod maven;
pub mod npm;

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use depwatch_core::BoxFuture;
use depwatch_core::types::GeneralInfo;

use crate::config::ScannerConfig;
use crate::error::ScannerError;
use crate::paths::Detected;
use crate::project::Project;
use crate::tree::{DependencyTree, TreeData};
use crate::types::BuildSystem;

pub use go::GoResolver;
pub use gradle::GradleResolver;
pub use maven::MavenResolver;
pub use npm::NpmResolver;

/// 의존성 새로고침 실패
///
/// `details`에는 빌드 도구 출력처럼 긴 진단 정보가 담길 수 있으며, 로그에는
/// `details`가 있으면 그것을, 없으면 `message`를 남깁니다.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshFailure {
    /// 요약 메시지
    pub message: String,
    /// 상세 정보
    pub details: Option<String>,
}

impl RefreshFailure {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            details: None,
        }
    }

    /// 상세 정보를 붙입니다.
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

impl fmt::Display for RefreshFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl From<ScannerError> for RefreshFailure {
    fn from(err: ScannerError) -> Self {
        Self::new(err.to_string())
    }
}

impl From<RefreshFailure> for ScannerError {
    fn from(failure: RefreshFailure) -> Self {
        ScannerError::Refresh {
            message: failure.message,
            details: failure.details,
        }
    }
}

/// 빌드 시스템별 의존성 리졸버
pub trait DependencyResolver: Send + Sync {
    /// 담당 빌드 시스템
    fn kind(&self) -> BuildSystem;

    /// 빌드 시스템의 현재 의존성 데이터를 가져옵니다.
    ///
    /// 트리거가 미리 가져온 데이터(`hint`)를 넘기면 그대로 사용합니다.
    fn refresh_dependencies(
        &self,
        hint: Option<TreeData>,
    ) -> BoxFuture<'_, Result<TreeData, RefreshFailure>>;

    /// 의존성 데이터로 트리를 만듭니다.
    fn build_tree(&self, data: TreeData) -> io::Result<DependencyTree> {
        Ok(DependencyTree::from_data(data))
    }

    /// 이 리졸버가 기여하는 모듈/애플리케이션 루트
    ///
    /// 동기 I/O를 수행할 수 있습니다. 비동기 컨텍스트에서는
    /// `spawn_blocking` 내에서 호출해야 합니다.
    fn project_paths(&self) -> Vec<PathBuf>;

    /// 변경 시 빠른 스캔을 트리거하는 파일 (정확히 일치하는 경로만)
    fn watched_file(&self) -> Option<PathBuf>;
}

/// 탐지 결과로부터 리졸버를 만드는 팩토리
pub trait ResolverFactory: Send + Sync {
    /// 리졸버를 생성합니다.
    ///
    /// 동기 I/O를 수행할 수 있습니다.
    fn create(
        &self,
        detected: &Detected,
        project: &Project,
        config: &ScannerConfig,
    ) -> Result<Arc<dyn DependencyResolver>, ScannerError>;
}

/// 매니페스트 기반 참조 리졸버 팩토리
#[derive(Debug, Default, Clone, Copy)]
pub struct ManifestResolverFactory;

impl ResolverFactory for ManifestResolverFactory {
    fn create(
        &self,
        detected: &Detected,
        project: &Project,
        config: &ScannerConfig,
    ) -> Result<Arc<dyn DependencyResolver>, ScannerError> {
        let limit = config.max_manifest_size;
        let name = project.name();
        let resolver: Arc<dyn DependencyResolver> = match detected {
            Detected::Manifest {
                kind: BuildSystem::Maven,
                root,
            } => Arc::new(MavenResolver::new(name, root, limit)),
            Detected::Manifest {
                kind: BuildSystem::Gradle,
                root,
            } => Arc::new(GradleResolver::new(name, root, limit)),
            Detected::Manifest {
                kind: BuildSystem::Go,
                root,
            } => Arc::new(GoResolver::new(name, root, limit)),
            Detected::Applications {
                kind: BuildSystem::Npm,
                roots,
            } => Arc::new(NpmResolver::new(
                name,
                project.base_path(),
                roots.clone(),
                limit,
            )),
            other => {
                return Err(ScannerError::Pipeline {
                    stage: "detection".to_owned(),
                    reason: format!("no resolver for {} detection", other.kind()),
                });
            }
        };
        Ok(resolver)
    }
}

/// 매니페스트를 크기 제한과 함께 읽습니다.
pub(crate) fn read_manifest(path: &Path, max_size: usize) -> Result<String, ScannerError> {
    let metadata = std::fs::metadata(path).map_err(|e| ScannerError::Io {
        path: path.display().to_string(),
        source: e,
    })?;

    if metadata.len() > max_size as u64 {
        return Err(ScannerError::ManifestParse {
            path: path.display().to_string(),
            reason: format!(
                "file size {} bytes exceeds maximum {} bytes",
                metadata.len(),
                max_size
            ),
        });
    }

    std::fs::read_to_string(path).map_err(|e| ScannerError::Io {
        path: path.display().to_string(),
        source: e,
    })
}

/// 프로젝트 최상위 노드 정보
pub(crate) fn project_info(project_name: &str, base: &Path, kind: BuildSystem) -> GeneralInfo {
    GeneralInfo::new(project_name, base, kind.as_str())
}

/// 동기 파싱 작업을 blocking 스레드에서 실행합니다.
pub(crate) async fn run_blocking<F>(work: F) -> Result<TreeData, RefreshFailure>
where
    F: FnOnce() -> Result<TreeData, ScannerError> + Send + 'static,
{
    match tokio::task::spawn_blocking(work).await {
        Ok(result) => result.map_err(RefreshFailure::from),
        Err(e) => Err(RefreshFailure::new("manifest parsing task failed").with_details(e.to_string())),
    }
}

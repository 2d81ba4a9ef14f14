//! 프로젝트 경로 계산과 빌드 시스템 적용성 탐지
//!
//! 모든 함수는 동기 I/O를 수행합니다. 비동기 컨텍스트에서는
//! `tokio::task::spawn_blocking` 내에서 호출해야 합니다.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::ScannerError;
use crate::types::BuildSystem;

/// 탐색에서 제외하는 디렉토리 이름
const SKIPPED_DIRS: [&str; 4] = ["node_modules", "target", "build", "vendor"];

/// 탐지 결과
///
/// 빌드 시스템 종류별로 스캐너가 담당할 루트를 담습니다.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Detected {
    /// 프로젝트 루트의 매니페스트로 탐지된 종류 (Maven, Gradle, Go)
    Manifest {
        /// 빌드 시스템 종류
        kind: BuildSystem,
        /// 매니페스트가 있는 루트
        root: PathBuf,
    },
    /// 애플리케이션 디렉토리 탐색으로 탐지된 경로 기반 종류 (npm)
    Applications {
        /// 빌드 시스템 종류
        kind: BuildSystem,
        /// 중첩이 제거된 애플리케이션 디렉토리
        roots: Vec<PathBuf>,
    },
}

impl Detected {
    /// 탐지된 빌드 시스템 종류
    pub fn kind(&self) -> BuildSystem {
        match self {
            Self::Manifest { kind, .. } | Self::Applications { kind, .. } => *kind,
        }
    }

    /// 스캐너가 담당할 루트 목록
    pub fn roots(&self) -> Vec<PathBuf> {
        match self {
            Self::Manifest { root, .. } => vec![root.clone()],
            Self::Applications { roots, .. } => roots.clone(),
        }
    }
}

/// 다른 포함 경로의 하위 경로를 제거하고 정렬된 목록을 반환합니다.
///
/// 중복도 함께 제거됩니다.
pub fn filter_nested_paths<I>(paths: I) -> Vec<PathBuf>
where
    I: IntoIterator<Item = PathBuf>,
{
    // 정렬하면 상위 경로가 항상 하위 경로보다 먼저 옵니다.
    let sorted: BTreeSet<PathBuf> = paths.into_iter().collect();
    let mut kept: Vec<PathBuf> = Vec::with_capacity(sorted.len());
    for path in sorted {
        if kept.iter().any(|root| path.starts_with(root)) {
            continue;
        }
        kept.push(path);
    }
    kept
}

/// `root` 아래에서 `package.json`을 가진 디렉토리를 찾습니다.
///
/// `node_modules` 등 빌드 산출물 디렉토리와 숨김 디렉토리는 건너뜁니다.
/// 루트 디렉토리 자체를 읽지 못하면 에러를 반환하고, 하위 디렉토리 에러는
/// 경고 후 건너뜁니다.
pub fn find_application_dirs(root: &Path, max_depth: usize) -> Result<Vec<PathBuf>, ScannerError> {
    let mut found = Vec::new();
    if !root.is_dir() {
        return Ok(found);
    }

    // 루트 디렉토리 읽기 실패는 적용성 탐지 실패로 보고
    std::fs::read_dir(root).map_err(|e| ScannerError::Detection {
        kind: BuildSystem::Npm,
        path: root.display().to_string(),
        source: e,
    })?;

    let mut stack = vec![(root.to_path_buf(), 0usize)];
    while let Some((dir, depth)) = stack.pop() {
        if has_manifest(&dir, BuildSystem::Npm) {
            found.push(dir.clone());
        }
        if depth >= max_depth {
            continue;
        }

        let entries = match std::fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) => {
                warn!(dir = %dir.display(), error = %e, "failed to read directory, skipping");
                continue;
            }
        };

        for entry in entries.flatten() {
            let path = entry.path();
            let Ok(file_type) = entry.file_type() else {
                continue;
            };
            if !file_type.is_dir() {
                continue;
            }
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if name.starts_with('.') || SKIPPED_DIRS.contains(&name.as_ref()) {
                continue;
            }
            stack.push((path, depth + 1));
        }
    }

    found.sort();
    Ok(found)
}

/// 디렉토리에 해당 빌드 시스템의 매니페스트가 있는지 확인합니다.
pub fn has_manifest(dir: &Path, kind: BuildSystem) -> bool {
    kind.manifest_files()
        .iter()
        .any(|file| dir.join(file).is_file())
}

/// 적용성 판단에 영향을 주는 빌드 매니페스트 파일인지 확인합니다.
///
/// 이런 파일이 바뀌면 레지스트리를 다시 평가해야 합니다. 락파일처럼 스캐너
/// 하나의 빠른 스캔만 필요한 파일은 포함하지 않습니다.
pub fn is_build_manifest(path: &Path) -> bool {
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return false;
    };
    matches!(name, "settings.gradle" | "settings.gradle.kts")
        || BuildSystem::ALL
            .iter()
            .any(|kind| kind.manifest_files().contains(&name))
}

/// 한 종류의 적용성을 평가합니다.
///
/// 경로 기반 종류는 `covered_roots`(다른 스캐너가 기여한 루트)와 `base_path`의
/// 합집합에서 애플리케이션 디렉토리를 찾습니다. 적용 불가면 `Ok(None)`입니다.
pub fn detect(
    kind: BuildSystem,
    base_path: &Path,
    covered_roots: &[PathBuf],
    max_depth: usize,
) -> Result<Option<Detected>, ScannerError> {
    if !kind.is_path_based() {
        if !base_path.is_dir() {
            return Err(ScannerError::Detection {
                kind,
                path: base_path.display().to_string(),
                source: std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    "project base path is not a directory",
                ),
            });
        }
        return Ok(has_manifest(base_path, kind).then(|| Detected::Manifest {
            kind,
            root: base_path.to_path_buf(),
        }));
    }

    let search_roots = filter_nested_paths(
        covered_roots
            .iter()
            .cloned()
            .chain(std::iter::once(base_path.to_path_buf())),
    );

    let mut app_dirs = Vec::new();
    for root in &search_roots {
        app_dirs.extend(find_application_dirs(root, max_depth)?);
    }
    let roots = filter_nested_paths(app_dirs);
    debug!(
        kind = %kind,
        search_roots = search_roots.len(),
        applications = roots.len(),
        "path-based detection finished"
    );

    Ok((!roots.is_empty()).then_some(Detected::Applications { kind, roots }))
}

/// 모든 종류의 적용성을 평가합니다.
///
/// 종류별 I/O 에러는 로그를 남기고 "적용 불가"로 처리합니다.
/// 경로 기반 종류에는 앞서 탐지된 루트가 `covered_roots`로 추가됩니다.
pub fn detect_build_systems(base_path: &Path, max_depth: usize) -> Vec<Detected> {
    let mut detected: Vec<Detected> = Vec::new();
    for kind in BuildSystem::ALL {
        let covered: Vec<PathBuf> = detected.iter().flat_map(Detected::roots).collect();
        match detect(kind, base_path, &covered, max_depth) {
            Ok(Some(found)) => detected.push(found),
            Ok(None) => {}
            Err(e) => {
                warn!(kind = %kind, error = %e, "build system detection failed, treating as not applicable");
            }
        }
    }
    detected
}

//! Gradle 리졸버 -- build.gradle(.kts) / gradle.lockfile
//!
//! `gradle.lockfile`이 있으면 잠긴 해석 결과를 그대로 사용하고, 없으면 빌드
//! 스크립트의 문자열 표기(`"group:artifact:version"`)와 맵 표기
//! (`group: ..., name: ..., version: ...`) 의존성을 정규식으로 추출합니다.
//! `settings.gradle(.kts)`의 `include`는 하위 프로젝트 경로로 기여됩니다.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use regex::Regex;
use tracing::{debug, warn};

use depwatch_core::BoxFuture;
use depwatch_core::types::GeneralInfo;

use super::{DependencyResolver, RefreshFailure, project_info, read_manifest, run_blocking};
use crate::error::ScannerError;
use crate::tree::{DependencyData, ModuleData, TreeData};
use crate::types::{BuildSystem, ComponentId};

const BUILD_FILES: [&str; 2] = ["build.gradle.kts", "build.gradle"];
const SETTINGS_FILES: [&str; 2] = ["settings.gradle.kts", "settings.gradle"];
const LOCKFILE: &str = "gradle.lockfile";

/// 문자열 표기: `implementation 'group:artifact:version'`, `implementation("g:a:v")`
const SHORTHAND_PATTERN: &str = r#"(?m)^\s*(implementation|api|compileOnly|runtimeOnly|testImplementation|testRuntimeOnly|compile|runtime|testCompile)\s*\(?\s*["']([^:"'\s]+):([^:"'\s]+):([^:"'\s@]+)[^"']*["']"#;

/// 맵 표기: `implementation group: 'g', name: 'a', version: 'v'`
const MAP_PATTERN: &str = r#"(implementation|api|compileOnly|runtimeOnly|testImplementation)\s*\(?\s*group:\s*["']([^"']+)["']\s*,\s*name:\s*["']([^"']+)["']\s*,\s*version:\s*["']([^"']+)["']"#;

/// `include` 인자
const INCLUDE_PATTERN: &str = r#"["'](:?[A-Za-z0-9_.\-:]+)["']"#;

fn compile(pattern: &str, source_path: &Path) -> Result<Regex, ScannerError> {
    Regex::new(pattern).map_err(|e| ScannerError::ManifestParse {
        path: source_path.display().to_string(),
        reason: format!("invalid pattern: {e}"),
    })
}

/// Gradle 리졸버
#[derive(Debug, Clone)]
pub struct GradleResolver {
    project_name: String,
    root: PathBuf,
    max_manifest_size: usize,
}

impl GradleResolver {
    pub fn new(project_name: &str, root: &Path, max_manifest_size: usize) -> Self {
        Self {
            project_name: project_name.to_owned(),
            root: root.to_path_buf(),
            max_manifest_size,
        }
    }

    fn build_file(dir: &Path) -> Option<PathBuf> {
        BUILD_FILES
            .iter()
            .map(|f| dir.join(f))
            .find(|p| p.is_file())
    }

    /// settings 파일의 `include` 항목을 디렉토리로 바꿉니다.
    fn subprojects(&self) -> Result<Vec<PathBuf>, ScannerError> {
        let Some(settings) = SETTINGS_FILES
            .iter()
            .map(|f| self.root.join(f))
            .find(|p| p.is_file())
        else {
            return Ok(Vec::new());
        };
        let content = read_manifest(&settings, self.max_manifest_size)?;
        Ok(parse_includes(&content, &settings)?
            .into_iter()
            .map(|rel| self.root.join(rel))
            .collect())
    }

    /// 모든 (하위) 프로젝트를 읽어 트리 데이터를 만듭니다.
    pub fn resolve(&self) -> Result<TreeData, ScannerError> {
        let mut dirs = vec![self.root.clone()];
        dirs.extend(self.subprojects()?);

        let mut modules = Vec::new();
        for dir in &dirs {
            match self.resolve_module(dir) {
                Ok(Some(module)) => modules.push(module),
                Ok(None) => debug!(dir = %dir.display(), "no gradle build file, skipping"),
                // 루트 실패는 전체 실패, 하위 프로젝트 실패는 건너뜀
                Err(e) if dir == &self.root => return Err(e),
                Err(e) => warn!(dir = %dir.display(), error = %e, "skipping gradle subproject"),
            }
        }

        // 하위 프로젝트가 있으면 의존성 없는 루트는 제외
        if modules.len() > 1 && modules[0].dependencies.is_empty() {
            modules.remove(0);
        }

        Ok(TreeData {
            root: project_info(&self.project_name, &self.root, BuildSystem::Gradle),
            modules,
        })
    }

    fn resolve_module(&self, dir: &Path) -> Result<Option<ModuleData>, ScannerError> {
        let lockfile = dir.join(LOCKFILE);
        let dependencies = if lockfile.is_file() {
            parse_lockfile(&read_manifest(&lockfile, self.max_manifest_size)?)
        } else if let Some(build) = Self::build_file(dir) {
            parse_build_script(&read_manifest(&build, self.max_manifest_size)?, &build)?
        } else {
            return Ok(None);
        };

        let name = dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.project_name.clone());

        Ok(Some(ModuleData {
            info: GeneralInfo::new(name.clone(), dir, BuildSystem::Gradle.as_str()),
            id: ComponentId::from_raw(format!("{}{name}", ComponentId::GAV_PREFIX)),
            dependencies,
        }))
    }
}

impl DependencyResolver for GradleResolver {
    fn kind(&self) -> BuildSystem {
        BuildSystem::Gradle
    }

    fn refresh_dependencies(
        &self,
        hint: Option<TreeData>,
    ) -> BoxFuture<'_, Result<TreeData, RefreshFailure>> {
        Box::pin(async move {
            if let Some(data) = hint {
                return Ok(data);
            }
            let resolver = self.clone();
            run_blocking(move || resolver.resolve()).await
        })
    }

    fn project_paths(&self) -> Vec<PathBuf> {
        let mut paths = vec![self.root.clone()];
        match self.subprojects() {
            Ok(subprojects) => paths.extend(subprojects),
            Err(e) => warn!(root = %self.root.display(), error = %e, "failed to read gradle settings"),
        }
        paths
    }

    fn watched_file(&self) -> Option<PathBuf> {
        Self::build_file(&self.root)
    }
}

/// `include ':app', ':lib:core'` → `app`, `lib/core`
pub fn parse_includes(settings: &str, source_path: &Path) -> Result<Vec<PathBuf>, ScannerError> {
    let re = compile(INCLUDE_PATTERN, source_path)?;
    let mut dirs = Vec::new();
    for line in settings.lines().map(str::trim) {
        if !line.starts_with("include") {
            continue;
        }
        for caps in re.captures_iter(line) {
            let rel = caps[1].trim_start_matches(':').replace(':', "/");
            if !rel.is_empty() {
                dirs.push(PathBuf::from(rel));
            }
        }
    }
    Ok(dirs)
}

/// 빌드 스크립트의 문자열/맵 표기 의존성을 추출합니다.
///
/// 같은 좌표가 여러 구성에 선언되면 처음 선언된 구성을 스코프로 씁니다.
pub fn parse_build_script(
    script: &str,
    source_path: &Path,
) -> Result<Vec<DependencyData>, ScannerError> {
    let shorthand = compile(SHORTHAND_PATTERN, source_path)?;
    let map = compile(MAP_PATTERN, source_path)?;

    let mut seen: BTreeMap<ComponentId, String> = BTreeMap::new();
    for caps in shorthand.captures_iter(script).chain(map.captures_iter(script)) {
        let id = ComponentId::gav(&caps[2], &caps[3], &caps[4]);
        seen.entry(id).or_insert_with(|| caps[1].to_owned());
    }

    Ok(seen
        .into_iter()
        .map(|(id, config)| {
            let mut dep = DependencyData::new(id);
            dep.scope = Some(config);
            dep
        })
        .collect())
}

/// `gradle.lockfile` 형식(`group:artifact:version=conf1,conf2`)을 파싱합니다.
pub fn parse_lockfile(content: &str) -> Vec<DependencyData> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#') && !line.starts_with("empty="))
        .filter_map(|line| {
            let (coordinate, configs) = line.split_once('=').unwrap_or((line, ""));
            let mut parts = coordinate.splitn(3, ':');
            let (Some(group), Some(artifact), Some(version)) =
                (parts.next(), parts.next(), parts.next())
            else {
                return None;
            };
            let mut dep = DependencyData::new(ComponentId::gav(group, artifact, version));
            dep.scope = configs
                .split(',')
                .next()
                .filter(|c| !c.is_empty())
                .map(str::to_owned);
            Some(dep)
        })
        .collect()
}

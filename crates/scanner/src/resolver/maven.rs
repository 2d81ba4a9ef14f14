//! Maven 리졸버 -- pom.xml 파싱
//!
//! `quick-xml`로 `pom.xml`의 좌표, `<properties>`, `<dependencies>`,
//! `<dependencyManagement>`, `<modules>`를 읽습니다. 전이 의존성은 해석하지 않으며
//! 선언된 직접 의존성만 트리에 올립니다.
//!
//! `<modules>`에 선언된 하위 모듈 디렉토리는 프로젝트 경로로 기여되어,
//! 그 아래의 `package.json`이 별도 npm 애플리케이션으로 잡히지 않게 합니다.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use quick_xml::Reader;
use quick_xml::events::Event;
use tracing::{debug, warn};

use depwatch_core::BoxFuture;
use depwatch_core::types::GeneralInfo;

use super::{DependencyResolver, RefreshFailure, project_info, read_manifest, run_blocking};
use crate::error::ScannerError;
use crate::tree::{DependencyData, ModuleData, TreeData};
use crate::types::{BuildSystem, ComponentId};

const POM_FILE: &str = "pom.xml";

/// 하위 모듈 재귀 최대 깊이
const MAX_MODULE_DEPTH: usize = 8;

/// 보간 반복 최대 횟수 (순환 참조 방지)
const MAX_INTERPOLATION_ROUNDS: usize = 10;

/// pom.xml 기반 리졸버
#[derive(Debug, Clone)]
pub struct MavenResolver {
    project_name: String,
    root: PathBuf,
    max_manifest_size: usize,
}

impl MavenResolver {
    pub fn new(project_name: &str, root: &Path, max_manifest_size: usize) -> Self {
        Self {
            project_name: project_name.to_owned(),
            root: root.to_path_buf(),
            max_manifest_size,
        }
    }

    /// 루트 pom과 모든 하위 모듈을 읽어 트리 데이터를 만듭니다.
    pub fn resolve(&self) -> Result<TreeData, ScannerError> {
        let modules = load_modules(&self.root, self.max_manifest_size)?;
        let root_is_aggregator = modules.len() > 1;

        let module_data = modules
            .into_iter()
            .enumerate()
            .filter(|(idx, (_, pom))| {
                // 집계용 루트 pom은 의존성이 있을 때만 모듈로 취급
                !(root_is_aggregator && *idx == 0 && pom.dependencies.is_empty())
            })
            .map(|(_, (dir, pom))| pom.into_module(&dir))
            .collect();

        Ok(TreeData {
            root: project_info(&self.project_name, &self.root, BuildSystem::Maven),
            modules: module_data,
        })
    }
}

impl DependencyResolver for MavenResolver {
    fn kind(&self) -> BuildSystem {
        BuildSystem::Maven
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
        match load_modules(&self.root, self.max_manifest_size) {
            Ok(modules) => modules.into_iter().map(|(dir, _)| dir).collect(),
            Err(e) => {
                warn!(root = %self.root.display(), error = %e, "failed to read maven modules");
                vec![self.root.clone()]
            }
        }
    }

    fn watched_file(&self) -> Option<PathBuf> {
        Some(self.root.join(POM_FILE))
    }
}

/// pom.xml 하나의 파싱 결과
#[derive(Debug, Default, Clone)]
pub struct Pom {
    pub group_id: Option<String>,
    pub artifact_id: Option<String>,
    pub version: Option<String>,
    pub parent_group_id: Option<String>,
    pub parent_version: Option<String>,
    pub properties: HashMap<String, String>,
    pub dependencies: Vec<PomDependency>,
    pub managed_versions: HashMap<(String, String), String>,
    pub modules: Vec<String>,
}

/// `<dependency>` 항목
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PomDependency {
    pub group_id: String,
    pub artifact_id: String,
    pub version: Option<String>,
    pub scope: Option<String>,
}

impl Pom {
    /// pom.xml 내용을 파싱합니다.
    pub fn parse(content: &str, source_path: &str) -> Result<Self, ScannerError> {
        let parse_err = |reason: String| ScannerError::ManifestParse {
            path: source_path.to_owned(),
            reason,
        };

        let mut reader = Reader::from_str(content);
        reader.config_mut().trim_text(true);

        let mut pom = Pom::default();
        let mut path: Vec<String> = Vec::new();
        let mut current: Option<PomDependency> = None;

        loop {
            match reader.read_event() {
                Ok(Event::Start(e)) => {
                    let name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                    if name == "dependency" {
                        current = Some(PomDependency::default());
                    }
                    path.push(name);
                }
                Ok(Event::End(_)) => {
                    if path.last().is_some_and(|n| n == "dependency")
                        && let Some(dep) = current.take()
                    {
                        pom.finish_dependency(&path, dep);
                    }
                    path.pop();
                }
                Ok(Event::Text(t)) => {
                    let text = t
                        .unescape()
                        .map_err(|e| parse_err(e.to_string()))?
                        .into_owned();
                    pom.apply_text(&path, text, current.as_mut());
                }
                Ok(Event::Eof) => break,
                Ok(_) => {}
                Err(e) => {
                    return Err(parse_err(format!(
                        "at position {}: {e}",
                        reader.error_position()
                    )));
                }
            }
        }

        if pom.artifact_id.is_none() {
            return Err(parse_err("missing <artifactId>".to_owned()));
        }
        Ok(pom)
    }

    fn apply_text(&mut self, path: &[String], text: String, dep: Option<&mut PomDependency>) {
        let segments: Vec<&str> = path.iter().map(String::as_str).collect();
        match segments.as_slice() {
            ["project", "groupId"] => self.group_id = Some(text),
            ["project", "artifactId"] => self.artifact_id = Some(text),
            ["project", "version"] => self.version = Some(text),
            ["project", "parent", "groupId"] => self.parent_group_id = Some(text),
            ["project", "parent", "version"] => self.parent_version = Some(text),
            ["project", "properties", key] => {
                self.properties.insert((*key).to_owned(), text);
            }
            ["project", "modules", "module"] => self.modules.push(text),
            [.., "dependency", field] => {
                if let Some(dep) = dep {
                    match *field {
                        "groupId" => dep.group_id = text,
                        "artifactId" => dep.artifact_id = text,
                        "version" => dep.version = Some(text),
                        "scope" => dep.scope = Some(text),
                        _ => {}
                    }
                }
            }
            _ => {}
        }
    }

    fn finish_dependency(&mut self, path: &[String], dep: PomDependency) {
        let segments: Vec<&str> = path.iter().map(String::as_str).collect();
        match segments.as_slice() {
            ["project", "dependencies", "dependency"] => self.dependencies.push(dep),
            ["project", "dependencyManagement", "dependencies", "dependency"] => {
                if let Some(version) = dep.version {
                    self.managed_versions
                        .insert((dep.group_id, dep.artifact_id), version);
                }
            }
            // 플러그인 의존성 등은 무시
            _ => {}
        }
    }

    /// 부모 pom에서 좌표, 속성, 관리 버전을 상속합니다.
    fn inherit(&mut self, parent: &Pom) {
        if self.parent_group_id.is_none() {
            self.parent_group_id = parent.effective_group_id();
        }
        if self.parent_version.is_none() {
            self.parent_version = parent.effective_version();
        }
        for (key, value) in &parent.properties {
            self.properties
                .entry(key.clone())
                .or_insert_with(|| value.clone());
        }
        for (key, value) in &parent.managed_versions {
            self.managed_versions
                .entry(key.clone())
                .or_insert_with(|| value.clone());
        }
    }

    /// 실효 groupId (없으면 부모 groupId)
    pub fn effective_group_id(&self) -> Option<String> {
        self.group_id.clone().or_else(|| self.parent_group_id.clone())
    }

    /// 실효 version (없으면 부모 version)
    pub fn effective_version(&self) -> Option<String> {
        self.version
            .clone()
            .or_else(|| self.parent_version.clone())
            .map(|v| self.interpolate(&v))
    }

    /// `${...}` 참조를 속성과 프로젝트 좌표로 치환합니다.
    pub fn interpolate(&self, value: &str) -> String {
        let mut result = value.to_owned();
        for _ in 0..MAX_INTERPOLATION_ROUNDS {
            let Some(start) = result.find("${") else {
                break;
            };
            let Some(len) = result[start..].find('}') else {
                break;
            };
            let key = &result[start + 2..start + len];
            let replacement = match key {
                "project.version" | "pom.version" | "version" => self
                    .version
                    .clone()
                    .or_else(|| self.parent_version.clone()),
                "project.groupId" | "pom.groupId" => self.effective_group_id(),
                "project.artifactId" => self.artifact_id.clone(),
                "project.parent.version" => self.parent_version.clone(),
                other => self.properties.get(other).cloned(),
            };
            let Some(replacement) = replacement else {
                break;
            };
            result.replace_range(start..start + len + 1, &replacement);
        }
        result
    }

    fn into_module(self, dir: &Path) -> ModuleData {
        let group = self.effective_group_id().unwrap_or_default();
        let artifact = self.artifact_id.clone().unwrap_or_default();
        let version = self.effective_version().unwrap_or_default();

        let mut dependencies = Vec::with_capacity(self.dependencies.len());
        for dep in &self.dependencies {
            let group_id = self.interpolate(&dep.group_id);
            let version = dep
                .version
                .as_deref()
                .map(|v| self.interpolate(v))
                .or_else(|| {
                    self.managed_versions
                        .get(&(dep.group_id.clone(), dep.artifact_id.clone()))
                        .map(|v| self.interpolate(v))
                });
            let Some(version) = version.filter(|v| !v.is_empty() && !v.contains("${")) else {
                debug!(
                    artifact = %dep.artifact_id,
                    module = %artifact,
                    "dependency version unresolved, skipping"
                );
                continue;
            };

            let mut data = DependencyData::new(ComponentId::gav(&group_id, &dep.artifact_id, &version));
            data.scope = Some(dep.scope.clone().unwrap_or_else(|| "compile".to_owned()));
            dependencies.push(data);
        }

        let mut info = GeneralInfo::new(artifact.clone(), dir, BuildSystem::Maven.as_str())
            .with_group_id(group.clone());
        if !version.is_empty() {
            info = info.with_version(version.clone());
        }

        ModuleData {
            info,
            id: ComponentId::gav(&group, &artifact, &version),
            dependencies,
        }
    }
}

/// 루트 pom과 하위 모듈을 깊이 우선으로 읽습니다.
///
/// 첫 항목은 항상 루트입니다. 하위 모듈 pom을 읽지 못하면 경고 후 건너뜁니다.
fn load_modules(root: &Path, max_size: usize) -> Result<Vec<(PathBuf, Pom)>, ScannerError> {
    let root_path = root.join(POM_FILE);
    let content = read_manifest(&root_path, max_size)?;
    let root_pom = Pom::parse(&content, &root_path.display().to_string())?;

    let mut loaded = Vec::new();
    let mut stack = vec![(root.to_path_buf(), root_pom, 0usize)];
    while let Some((dir, pom, depth)) = stack.pop() {
        if depth < MAX_MODULE_DEPTH {
            for module in pom.modules.iter().rev() {
                let module_dir = dir.join(module);
                let module_path = module_dir.join(POM_FILE);
                let parsed = read_manifest(&module_path, max_size)
                    .and_then(|c| Pom::parse(&c, &module_path.display().to_string()));
                match parsed {
                    Ok(mut child) => {
                        child.inherit(&pom);
                        stack.push((module_dir, child, depth + 1));
                    }
                    Err(e) => {
                        warn!(module = %module_dir.display(), error = %e, "skipping unreadable maven module");
                    }
                }
            }
        }
        loaded.push((dir, pom));
    }
    Ok(loaded)
}

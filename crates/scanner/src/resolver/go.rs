//! Go 모듈 리졸버 -- go.mod
//!
//! `module` 지시문과 `require` 블록/단일 행을 읽습니다. `// indirect` 표시는
//! 스코프로 남기고, `replace`는 해석하지 않습니다. 변경 감시는 `go.sum`으로 합니다.

use std::path::{Path, PathBuf};

use depwatch_core::BoxFuture;
use depwatch_core::types::GeneralInfo;

use super::{DependencyResolver, RefreshFailure, project_info, read_manifest, run_blocking};
use crate::error::ScannerError;
use crate::tree::{DependencyData, ModuleData, TreeData};
use crate::types::{BuildSystem, ComponentId};

const GO_MOD: &str = "go.mod";
const GO_SUM: &str = "go.sum";

/// go.mod 파싱 결과
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct GoMod {
    /// 모듈 경로
    pub module: String,
    /// `go` 지시문 버전
    pub go_version: Option<String>,
    /// (모듈, 버전, indirect 여부)
    pub requires: Vec<(String, String, bool)>,
}

impl GoMod {
    /// go.mod 내용을 파싱합니다.
    pub fn parse(content: &str, source_path: &str) -> Result<Self, ScannerError> {
        let mut parsed = GoMod::default();
        let mut in_require_block = false;

        for raw in content.lines() {
            let (code, comment) = match raw.split_once("//") {
                Some((code, comment)) => (code.trim(), comment.trim()),
                None => (raw.trim(), ""),
            };
            let indirect = comment == "indirect";

            if in_require_block {
                if code == ")" {
                    in_require_block = false;
                } else if let Some(req) = parse_requirement(code) {
                    parsed.requires.push((req.0, req.1, indirect));
                }
                continue;
            }

            if let Some(rest) = code.strip_prefix("module ") {
                parsed.module = rest.trim().trim_matches('"').to_owned();
            } else if let Some(rest) = code.strip_prefix("go ") {
                parsed.go_version = Some(rest.trim().to_owned());
            } else if code == "require (" || code == "require(" {
                in_require_block = true;
            } else if let Some(rest) = code.strip_prefix("require ")
                && let Some(req) = parse_requirement(rest)
            {
                parsed.requires.push((req.0, req.1, indirect));
            }
        }

        if parsed.module.is_empty() {
            return Err(ScannerError::ManifestParse {
                path: source_path.to_owned(),
                reason: "missing module directive".to_owned(),
            });
        }
        Ok(parsed)
    }
}

fn parse_requirement(line: &str) -> Option<(String, String)> {
    let mut parts = line.split_whitespace();
    let module = parts.next()?;
    let version = parts.next()?;
    Some((module.trim_matches('"').to_owned(), version.to_owned()))
}

/// go.mod 기반 리졸버
#[derive(Debug, Clone)]
pub struct GoResolver {
    project_name: String,
    root: PathBuf,
    max_manifest_size: usize,
}

impl GoResolver {
    pub fn new(project_name: &str, root: &Path, max_manifest_size: usize) -> Self {
        Self {
            project_name: project_name.to_owned(),
            root: root.to_path_buf(),
            max_manifest_size,
        }
    }

    /// go.mod를 읽어 트리 데이터를 만듭니다.
    pub fn resolve(&self) -> Result<TreeData, ScannerError> {
        let path = self.root.join(GO_MOD);
        let content = read_manifest(&path, self.max_manifest_size)?;
        let go_mod = GoMod::parse(&content, &path.display().to_string())?;

        let dependencies = go_mod
            .requires
            .iter()
            .map(|(module, version, indirect)| {
                let mut dep = DependencyData::new(ComponentId::go(module, version));
                dep.scope = Some(if *indirect { "indirect" } else { "direct" }.to_owned());
                dep
            })
            .collect();

        let mut info = GeneralInfo::new(go_mod.module.clone(), &self.root, BuildSystem::Go.as_str());
        if let Some(version) = &go_mod.go_version {
            info = info.with_version(version.clone());
        }

        Ok(TreeData {
            root: project_info(&self.project_name, &self.root, BuildSystem::Go),
            modules: vec![ModuleData {
                info,
                id: ComponentId::from_raw(format!("{}{}", ComponentId::GO_PREFIX, go_mod.module)),
                dependencies,
            }],
        })
    }
}

impl DependencyResolver for GoResolver {
    fn kind(&self) -> BuildSystem {
        BuildSystem::Go
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
        vec![self.root.clone()]
    }

    fn watched_file(&self) -> Option<PathBuf> {
        Some(self.root.join(GO_SUM))
    }
}

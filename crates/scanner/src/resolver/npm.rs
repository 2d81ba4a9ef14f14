//! npm 리졸버 -- package-lock.json (v2/v3) / package.json
//!
//! 애플리케이션 디렉토리마다 모듈 하나를 만듭니다. `package-lock.json`이 있으면
//! `packages` 맵에서 Node 모듈 해석 규칙(가까운 `node_modules`부터 위로)을 따라
//! 중첩 트리를 구성하고, 없으면 `package.json`의 선언 범위에서 버전을 추려 평평한
//! 트리를 만듭니다.
//!
//! # package-lock.json v3 형식 예시
//!
//! ```json
//! {
//!   "lockfileVersion": 3,
//!   "packages": {
//!     "": { "name": "web", "version": "1.0.0", "dependencies": { "express": "^4.18.2" } },
//!     "node_modules/express": { "version": "4.18.2", "license": "MIT",
//!                               "dependencies": { "qs": "6.11.0" } },
//!     "node_modules/express/node_modules/qs": { "version": "6.11.0" }
//!   }
//! }
//! ```

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::{debug, warn};

use depwatch_core::BoxFuture;
use depwatch_core::types::{GeneralInfo, License};

use super::{DependencyResolver, RefreshFailure, project_info, read_manifest, run_blocking};
use crate::error::ScannerError;
use crate::tree::{DependencyData, ModuleData, TreeData};
use crate::types::{BuildSystem, ComponentId};

const PACKAGE_JSON: &str = "package.json";
const PACKAGE_LOCK: &str = "package-lock.json";
const NODE_MODULES: &str = "node_modules/";

/// 트리 최대 깊이 (비정상 lockfile 방어)
const MAX_TREE_DEPTH: usize = 64;

/// package.json (파싱용)
#[derive(Debug, Default, Deserialize)]
struct PackageJson {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    version: Option<String>,
    #[serde(default)]
    dependencies: BTreeMap<String, String>,
    #[serde(default, rename = "devDependencies")]
    dev_dependencies: BTreeMap<String, String>,
}

/// package-lock.json (파싱용)
#[derive(Debug, Deserialize)]
struct PackageLock {
    #[serde(default, rename = "lockfileVersion")]
    lockfile_version: Option<u32>,
    #[serde(default)]
    packages: HashMap<String, LockEntry>,
}

/// package-lock.json `packages` 항목 (파싱용)
#[derive(Debug, Default, Deserialize)]
struct LockEntry {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    version: Option<String>,
    #[serde(default)]
    license: Option<serde_json::Value>,
    #[serde(default)]
    dev: bool,
    #[serde(default)]
    dependencies: BTreeMap<String, String>,
    #[serde(default, rename = "devDependencies")]
    dev_dependencies: BTreeMap<String, String>,
    #[serde(default, rename = "optionalDependencies")]
    optional_dependencies: BTreeMap<String, String>,
}

impl LockEntry {
    fn licenses(&self) -> Vec<License> {
        match &self.license {
            Some(serde_json::Value::String(name)) if !name.is_empty() => {
                vec![License::new(name.clone())]
            }
            // 구형 `{ "type": "MIT" }` 표기
            Some(serde_json::Value::Object(obj)) => obj
                .get("type")
                .and_then(serde_json::Value::as_str)
                .map(|name| vec![License::new(name)])
                .unwrap_or_default(),
            _ => Vec::new(),
        }
    }

    fn runtime_dependency_names(&self) -> impl Iterator<Item = &String> {
        self.dependencies
            .keys()
            .chain(self.optional_dependencies.keys())
    }
}

/// npm 리졸버
#[derive(Debug, Clone)]
pub struct NpmResolver {
    project_name: String,
    base_path: PathBuf,
    roots: Vec<PathBuf>,
    max_manifest_size: usize,
}

impl NpmResolver {
    pub fn new(
        project_name: &str,
        base_path: &Path,
        roots: Vec<PathBuf>,
        max_manifest_size: usize,
    ) -> Self {
        Self {
            project_name: project_name.to_owned(),
            base_path: base_path.to_path_buf(),
            roots,
            max_manifest_size,
        }
    }

    /// 모든 애플리케이션 디렉토리를 읽어 트리 데이터를 만듭니다.
    ///
    /// 애플리케이션 하나의 실패는 경고 후 건너뛰며, 모두 실패하면 에러입니다.
    pub fn resolve(&self) -> Result<TreeData, ScannerError> {
        let mut modules = Vec::new();
        let mut last_error = None;
        for root in &self.roots {
            match self.resolve_application(root) {
                Ok(module) => modules.push(module),
                Err(e) => {
                    warn!(app = %root.display(), error = %e, "skipping npm application");
                    last_error = Some(e);
                }
            }
        }

        if modules.is_empty()
            && let Some(e) = last_error
        {
            return Err(e);
        }

        Ok(TreeData {
            root: project_info(&self.project_name, &self.base_path, BuildSystem::Npm),
            modules,
        })
    }

    fn resolve_application(&self, root: &Path) -> Result<ModuleData, ScannerError> {
        let manifest_path = root.join(PACKAGE_JSON);
        let manifest_content = read_manifest(&manifest_path, self.max_manifest_size)?;
        let manifest: PackageJson =
            serde_json::from_str(&manifest_content).map_err(|e| ScannerError::ManifestParse {
                path: manifest_path.display().to_string(),
                reason: e.to_string(),
            })?;

        let lock_path = root.join(PACKAGE_LOCK);
        let dependencies = if lock_path.is_file() {
            let content = read_manifest(&lock_path, self.max_manifest_size)?;
            let lock: PackageLock =
                serde_json::from_str(&content).map_err(|e| ScannerError::ManifestParse {
                    path: lock_path.display().to_string(),
                    reason: e.to_string(),
                })?;
            debug!(
                app = %root.display(),
                lockfile_version = lock.lockfile_version.unwrap_or_default(),
                packages = lock.packages.len(),
                "package-lock loaded"
            );
            dependencies_from_lock(&lock)
        } else {
            dependencies_from_manifest(&manifest)
        };

        let name = manifest.name.clone().unwrap_or_else(|| {
            root.file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| self.project_name.clone())
        });
        let version = manifest.version.clone().unwrap_or_else(|| "0.0.0".to_owned());

        Ok(ModuleData {
            info: GeneralInfo::new(name.clone(), root, BuildSystem::Npm.as_str())
                .with_version(version.clone()),
            id: ComponentId::npm(&name, &version),
            dependencies,
        })
    }
}

impl DependencyResolver for NpmResolver {
    fn kind(&self) -> BuildSystem {
        BuildSystem::Npm
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
        self.roots.clone()
    }

    fn watched_file(&self) -> Option<PathBuf> {
        let root = self.roots.first()?;
        let lock = root.join(PACKAGE_LOCK);
        if lock.is_file() {
            Some(lock)
        } else {
            Some(root.join(PACKAGE_JSON))
        }
    }
}

/// lockfile 루트 항목의 직접 의존성부터 중첩 트리를 만듭니다.
fn dependencies_from_lock(lock: &PackageLock) -> Vec<DependencyData> {
    let Some(root) = lock.packages.get("") else {
        return Vec::new();
    };

    let mut ancestors = HashSet::new();
    root.dependencies
        .keys()
        .chain(root.dev_dependencies.keys())
        .chain(root.optional_dependencies.keys())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .filter_map(|name| build_node(lock, "", name, &mut ancestors, 0))
        .collect()
}

fn build_node(
    lock: &PackageLock,
    parent_key: &str,
    name: &str,
    ancestors: &mut HashSet<String>,
    depth: usize,
) -> Option<DependencyData> {
    if depth >= MAX_TREE_DEPTH {
        return None;
    }
    let key = resolve_key(lock, parent_key, name)?;
    let entry = lock.packages.get(&key)?;
    let version = entry.version.as_deref()?;
    let package_name = entry.name.as_deref().unwrap_or(name);

    let mut node = DependencyData::new(ComponentId::npm(package_name, version));
    node.licenses = entry.licenses();
    node.scope = Some(if entry.dev { "dev" } else { "prod" }.to_owned());

    // 순환 의존성은 한 번만 펼침
    if ancestors.insert(key.clone()) {
        node.children = entry
            .runtime_dependency_names()
            .filter_map(|child| build_node(lock, &key, child, ancestors, depth + 1))
            .collect();
        ancestors.remove(&key);
    }
    Some(node)
}

/// Node 모듈 해석: `<parent>/node_modules/<name>`부터 상위로 올라가며 찾습니다.
fn resolve_key(lock: &PackageLock, parent_key: &str, name: &str) -> Option<String> {
    let mut base = parent_key.to_owned();
    loop {
        let candidate = if base.is_empty() {
            format!("{NODE_MODULES}{name}")
        } else {
            format!("{base}/{NODE_MODULES}{name}")
        };
        if lock.packages.contains_key(&candidate) {
            return Some(candidate);
        }
        if base.is_empty() {
            return None;
        }
        // 마지막 `node_modules/<pkg>` 구간 제거
        base = match base.rfind(NODE_MODULES) {
            Some(0) | None => String::new(),
            Some(pos) => base[..pos].trim_end_matches('/').to_owned(),
        };
    }
}

/// lockfile 없이 package.json 선언 범위에서 버전을 추립니다.
fn dependencies_from_manifest(manifest: &PackageJson) -> Vec<DependencyData> {
    let prod = manifest.dependencies.iter().map(|(n, r)| (n, r, "prod"));
    let dev = manifest.dev_dependencies.iter().map(|(n, r)| (n, r, "dev"));
    prod.chain(dev)
        .filter_map(|(name, range, scope)| {
            let Some(version) = pinned_version(range) else {
                debug!(package = %name, range = %range, "unpinnable version range, skipping");
                return None;
            };
            let mut dep = DependencyData::new(ComponentId::npm(name, &version));
            dep.scope = Some(scope.to_owned());
            Some(dep)
        })
        .collect()
}

/// `^4.17.21`, `~1.2.0`, `>=2.0.0 <3` 같은 범위의 하한 버전을 꺼냅니다.
///
/// URL, 태그(`latest`), 와일드카드는 `None`입니다.
pub fn pinned_version(range: &str) -> Option<String> {
    let first = range.split_whitespace().next()?;
    let version = first.trim_start_matches(['^', '~', '>', '=', 'v']);
    let starts_numeric = version.chars().next().is_some_and(|c| c.is_ascii_digit());
    let is_plain = version
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '+'));
    (starts_numeric && is_plain && !version.contains(['x', 'X', '*'])).then(|| version.to_owned())
}

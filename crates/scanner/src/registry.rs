//! 스캐너 레지스트리 -- 프로젝트별 스캐너 탐지와 생명주기
//!
//! [`ScannerRegistry`]는 프로젝트 하나의 스캐너 집합을 소유합니다. 집합은
//! 불변 스냅샷([`ScannerSet`])이며, [`ScannerRegistry::refresh`]가 완전한 새 집합을
//! 만든 뒤 원자적으로 교체합니다. 읽는 쪽은 잠금 없이 스냅샷을 복제해 씁니다.
//!
//! # 평가 순서
//!
//! [`BuildSystem::ALL`] 순서로 평가하며, 경로 기반 종류(npm)는 앞서 살아 있는
//! 스캐너들이 기여한 루트와 프로젝트 기준 경로의 합집합에서 탐색합니다.

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use std::sync::{Arc, PoisonError, RwLock};

use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use depwatch_core::metrics as m;
use depwatch_core::types::License;

use crate::config::ScannerConfig;
use crate::error::ScannerError;
use crate::paths::{Detected, detect};
use crate::project::Project;
use crate::scanner::{ScanContext, ScanHandle, Scanner};
use crate::types::{BuildSystem, ScannerId};

/// 살아 있는 스캐너의 불변 스냅샷
#[derive(Debug, Default)]
pub struct ScannerSet {
    scanners: BTreeMap<ScannerId, Arc<Scanner>>,
}

impl ScannerSet {
    /// 스캐너 수
    pub fn len(&self) -> usize {
        self.scanners.len()
    }

    /// 비어 있는지 확인합니다.
    pub fn is_empty(&self) -> bool {
        self.scanners.is_empty()
    }

    /// 식별자로 스캐너를 찾습니다.
    pub fn get(&self, id: &ScannerId) -> Option<&Arc<Scanner>> {
        self.scanners.get(id)
    }

    /// 종류로 스캐너를 찾습니다.
    pub fn by_kind(&self, kind: BuildSystem) -> Option<&Arc<Scanner>> {
        self.scanners.values().find(|s| s.kind() == kind)
    }

    /// 식별자 순서로 순회합니다.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<Scanner>> {
        self.scanners.values()
    }

    /// 식별자 목록
    pub fn ids(&self) -> Vec<ScannerId> {
        self.scanners.keys().cloned().collect()
    }

    fn contains_instance(&self, scanner: &Arc<Scanner>) -> bool {
        self.scanners
            .get(scanner.id())
            .is_some_and(|existing| Arc::ptr_eq(existing, scanner))
    }
}

/// `refresh` 결과 요약
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RefreshSummary {
    /// 새로 만든 스캐너
    pub added: Vec<ScannerId>,
    /// 제거한 스캐너
    pub removed: Vec<ScannerId>,
    /// 교체 후 살아 있는 스캐너 수
    pub live: usize,
}

impl RefreshSummary {
    /// 집합이 바뀌었는지 확인합니다.
    pub fn changed(&self) -> bool {
        !self.added.is_empty() || !self.removed.is_empty()
    }
}

/// 프로젝트 스캐너 레지스트리
pub struct ScannerRegistry {
    project: Arc<Project>,
    ctx: ScanContext,
    set: RwLock<Arc<ScannerSet>>,
    refresh_lock: Mutex<()>,
}

impl ScannerRegistry {
    /// 빈 레지스트리를 만듭니다. 스캐너는 [`refresh`](Self::refresh)에서 생깁니다.
    pub fn new(project: Arc<Project>, ctx: ScanContext) -> Self {
        Self {
            project,
            ctx,
            set: RwLock::new(Arc::new(ScannerSet::default())),
            refresh_lock: Mutex::new(()),
        }
    }

    /// 현재 스냅샷
    pub fn snapshot(&self) -> Arc<ScannerSet> {
        Arc::clone(&self.set.read().unwrap_or_else(PoisonError::into_inner))
    }

    /// 살아 있는 스캐너 목록
    pub fn list(&self) -> Vec<Arc<Scanner>> {
        self.snapshot().iter().cloned().collect()
    }

    /// 종류로 스캐너를 찾습니다.
    pub fn get(&self, kind: BuildSystem) -> Option<Arc<Scanner>> {
        self.snapshot().by_kind(kind).cloned()
    }

    /// 모든 스캐너의 마지막 트리 라이선스 합집합
    pub fn all_licenses(&self) -> BTreeSet<License> {
        self.snapshot()
            .iter()
            .flat_map(|scanner| scanner.licenses())
            .collect()
    }

    /// 모든 스캐너에 스캔을 트리거합니다.
    pub fn trigger_all(&self, quick: bool) -> Vec<ScanHandle> {
        self.snapshot()
            .iter()
            .map(|scanner| scanner.trigger_scan(quick, None))
            .collect()
    }

    /// 모든 빌드 시스템의 적용성을 다시 평가하고 스캐너 집합을 교체합니다.
    ///
    /// 호출은 내부에서 직렬화됩니다. 작업 공간이 바뀌지 않았으면 같은 인스턴스가
    /// 유지됩니다. 제거된 스캐너는 구독이 끊기지만, 진행 중인 스캔은 끝까지
    /// 진행되어 한 번 발행할 수 있습니다.
    pub async fn refresh(&self) -> RefreshSummary {
        let _serial = self.refresh_lock.lock().await;

        if self.project.is_closed() {
            debug!(project = self.project.name(), "project closed, registry refresh skipped");
            return RefreshSummary::default();
        }

        let current = self.snapshot();
        let previous = Arc::clone(&current);
        let project = Arc::clone(&self.project);
        let ctx = self.ctx.clone();
        let config = self.ctx.settings.current();

        let next = match tokio::task::spawn_blocking(move || {
            build_set(&project, &ctx, &config, &previous)
        })
        .await
        {
            Ok(set) => Arc::new(set),
            Err(e) => {
                error!(
                    project = self.project.name(),
                    error = %e,
                    "registry refresh task failed, keeping previous scanners"
                );
                return RefreshSummary {
                    live: current.len(),
                    ..RefreshSummary::default()
                };
            }
        };

        let added: Vec<Arc<Scanner>> = next
            .iter()
            .filter(|scanner| !current.contains_instance(scanner))
            .cloned()
            .collect();
        let removed: Vec<Arc<Scanner>> = current
            .iter()
            .filter(|scanner| !next.contains_instance(scanner))
            .cloned()
            .collect();

        for scanner in &added {
            scanner.spawn_listeners();
        }
        *self.set.write().unwrap_or_else(PoisonError::into_inner) = Arc::clone(&next);
        for scanner in &removed {
            scanner.dispose();
        }

        metrics::gauge!(m::REGISTRY_LIVE_SCANNERS).increment(added.len() as f64);
        metrics::gauge!(m::REGISTRY_LIVE_SCANNERS).decrement(removed.len() as f64);

        let summary = RefreshSummary {
            added: added.iter().map(|s| s.id().clone()).collect(),
            removed: removed.iter().map(|s| s.id().clone()).collect(),
            live: next.len(),
        };
        if summary.changed() {
            info!(
                project = self.project.name(),
                added = summary.added.len(),
                removed = summary.removed.len(),
                live = summary.live,
                "scanner registry refreshed"
            );
        } else {
            debug!(project = self.project.name(), live = summary.live, "scanner registry unchanged");
        }
        summary
    }

    /// 모든 스캐너를 제거하고 구독을 끊습니다. 제거한 수를 반환합니다.
    pub fn dispose_all(&self) -> usize {
        let previous = std::mem::take(&mut *self.set.write().unwrap_or_else(PoisonError::into_inner));
        for scanner in previous.iter() {
            scanner.dispose();
        }
        metrics::gauge!(m::REGISTRY_LIVE_SCANNERS).decrement(previous.len() as f64);
        previous.len()
    }
}

impl std::fmt::Debug for ScannerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScannerRegistry")
            .field("project", &self.project.name())
            .field("scanners", &self.snapshot().ids())
            .finish_non_exhaustive()
    }
}

/// 새 스캐너 집합을 만듭니다. 동기 I/O를 수행합니다.
fn build_set(
    project: &Arc<Project>,
    ctx: &ScanContext,
    config: &ScannerConfig,
    previous: &ScannerSet,
) -> ScannerSet {
    let mut next = ScannerSet::default();
    let mut covered: Vec<PathBuf> = Vec::new();

    for kind in BuildSystem::ALL {
        let detected = match detect(kind, project.base_path(), &covered, config.max_walk_depth) {
            Ok(Some(detected)) => detected,
            Ok(None) => continue,
            Err(e) => {
                warn!(
                    project = project.name(),
                    kind = %kind,
                    error = %e,
                    "build system detection failed, treating as not applicable"
                );
                continue;
            }
        };

        let id = ScannerId::new(kind, project.base_path());
        let reusable = previous
            .get(&id)
            .filter(|existing| existing.roots() == detected.roots().as_slice());

        let scanner = match reusable {
            Some(existing) => {
                existing.reload_project_paths();
                Arc::clone(existing)
            }
            None => match create_scanner(&detected, project, ctx, config) {
                Ok(scanner) => Arc::new(scanner),
                Err(e) => {
                    warn!(
                        project = project.name(),
                        kind = %kind,
                        error = %e,
                        "scanner construction failed, treating as not applicable"
                    );
                    continue;
                }
            },
        };

        covered.extend(scanner.project_paths());
        next.scanners.insert(id, scanner);
    }

    next
}

fn create_scanner(
    detected: &Detected,
    project: &Arc<Project>,
    ctx: &ScanContext,
    config: &ScannerConfig,
) -> Result<Scanner, ScannerError> {
    let resolver = ctx.resolvers.create(detected, project, config)?;
    Scanner::new(detected, resolver, Arc::clone(project), ctx.clone(), config)
}

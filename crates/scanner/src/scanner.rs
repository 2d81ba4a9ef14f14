//! 스캐너 -- 빌드 시스템 하나의 의존성 트리 생명주기와 스캔 상태
//!
//! [`Scanner`]는 [`DependencyResolver`] 변형 하나로 매개변수화된 단일 구조체입니다.
//! 모든 트리거(설정 변경, 파일 변경, 수동 요청)는 [`Scanner::trigger_scan`] 하나로
//! 들어오며, [`ScanCoordinator`]의 단일 실행 잠금을 통과한 호출만 파이프라인을
//! 백그라운드에 제출합니다.
//!
//! # 파이프라인
//!
//! ```text
//! trigger_scan --> [closed? indexing? configured?] --> try_begin (CAS)
//!                                                          |
//!   Refreshing --> TreeBuilding --> Scanning --> merge --> Aggregating --> Idle
//!   (resolver)     (build_tree)    (cache + backend)        (publish)
//! ```
//!
//! 취소는 TreeBuilding 전, Scanning 전, 백엔드 배치 사이, 발행 직전에 확인합니다.
//! 단계 에러는 파이프라인 최상단에서 잡혀 로그로만 남고 레지스트리나 다른
//! 스캐너로 전파되지 않습니다.

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Instant;

use tokio::sync::broadcast::error::RecvError;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use depwatch_core::metrics as m;
use depwatch_core::types::{License, Severity};

use crate::aggregator::{collect_licenses, project_key};
use crate::backend::{ScanBackend, ScanReports};
use crate::cache::ComponentCache;
use crate::config::ScannerConfig;
use crate::coordinator::{ScanCoordinator, ScanGuard};
use crate::error::ScannerError;
use crate::paths::Detected;
use crate::project::Project;
use crate::resolver::{DependencyResolver, ResolverFactory};
use crate::runner::TaskRunner;
use crate::settings::GlobalSettings;
use crate::tree::{DependencyTree, TreeData};
use crate::types::{BuildSystem, ComponentId, ScanOutcome, ScanState, ScannerId};

/// 스캐너들이 공유하는 애플리케이션 컨텍스트
///
/// 호스트가 한 번 만들어 모든 프로젝트 세션에 넘깁니다.
#[derive(Clone)]
pub struct ScanContext {
    /// 전역 설정과 애플리케이션 버스
    pub settings: Arc<GlobalSettings>,
    /// 포그라운드/백그라운드 실행기
    pub runner: Arc<TaskRunner>,
    /// 취약점/라이선스 백엔드
    pub backend: Arc<dyn ScanBackend>,
    /// 리졸버 팩토리
    pub resolvers: Arc<dyn ResolverFactory>,
}

impl ScanContext {
    pub fn new(
        settings: Arc<GlobalSettings>,
        runner: Arc<TaskRunner>,
        backend: Arc<dyn ScanBackend>,
        resolvers: Arc<dyn ResolverFactory>,
    ) -> Self {
        Self {
            settings,
            runner,
            backend,
            resolvers,
        }
    }
}

/// 제출된 스캔의 결과 핸들
///
/// 버려도 스캔은 계속 진행됩니다.
#[derive(Debug)]
pub struct ScanHandle {
    rx: oneshot::Receiver<ScanOutcome>,
}

impl ScanHandle {
    fn ready(outcome: ScanOutcome) -> Self {
        let (tx, rx) = oneshot::channel();
        let _ = tx.send(outcome);
        Self { rx }
    }

    /// 파이프라인이 끝날 때까지 기다려 결과를 반환합니다.
    ///
    /// 파이프라인 태스크가 결과를 보내지 못하고 사라지면(패닉, 런타임 종료,
    /// 제출 실패) [`ScanOutcome::Aborted`]입니다.
    pub async fn outcome(self) -> ScanOutcome {
        self.rx.await.unwrap_or(ScanOutcome::Aborted)
    }
}

/// 실패한 단계와 에러
type StageError = (ScanState, ScannerError);

/// 빌드 시스템별 스캐너
pub struct Scanner {
    id: ScannerId,
    resolver: Arc<dyn DependencyResolver>,
    project: Arc<Project>,
    ctx: ScanContext,
    cache: ComponentCache,
    coordinator: Arc<ScanCoordinator>,
    last_tree: RwLock<Option<Arc<DependencyTree>>>,
    roots: Vec<PathBuf>,
    project_paths: RwLock<Vec<PathBuf>>,
    subscriptions: CancellationToken,
}

impl Scanner {
    /// 스캐너를 생성합니다.
    ///
    /// 프로젝트 디렉토리를 확인하고 캐시 디렉토리를 만들며, 리졸버에서 기여 루트를
    /// 읽습니다. 동기 I/O를 수행하므로 비동기 컨텍스트에서는 `spawn_blocking`
    /// 안에서 호출해야 합니다. 에러는 호출자가 "적용 불가"로 처리합니다.
    pub fn new(
        detected: &Detected,
        resolver: Arc<dyn DependencyResolver>,
        project: Arc<Project>,
        ctx: ScanContext,
        config: &ScannerConfig,
    ) -> Result<Self, ScannerError> {
        let id = ScannerId::new(detected.kind(), project.base_path());
        if !project.base_path().is_dir() {
            return Err(ScannerError::Detection {
                kind: id.kind,
                path: project.base_path().display().to_string(),
                source: std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    "project base path is not a directory",
                ),
            });
        }

        let cache = ComponentCache::open(&config.cache_root(), project.name())?;
        let project_paths = resolver.project_paths();
        let coordinator = Arc::new(ScanCoordinator::new(project.cancel_token().clone()));
        let subscriptions = project.cancel_token().child_token();

        debug!(
            scanner = %id,
            project = project.name(),
            roots = project_paths.len(),
            cache = %cache.dir().display(),
            "scanner created"
        );

        Ok(Self {
            id,
            resolver,
            project,
            ctx,
            cache,
            coordinator,
            last_tree: RwLock::new(None),
            roots: detected.roots(),
            project_paths: RwLock::new(project_paths),
            subscriptions,
        })
    }

    /// 스캐너 식별자
    pub fn id(&self) -> &ScannerId {
        &self.id
    }

    /// 빌드 시스템 종류
    pub fn kind(&self) -> BuildSystem {
        self.id.kind
    }

    /// 탐지 시점의 담당 루트
    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }

    /// 이 스캐너가 기여하는 모듈/애플리케이션 루트
    pub fn project_paths(&self) -> Vec<PathBuf> {
        self.project_paths
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// 리졸버에서 기여 루트를 다시 읽습니다. 동기 I/O를 수행합니다.
    pub fn reload_project_paths(&self) -> Vec<PathBuf> {
        let paths = self.resolver.project_paths();
        *self
            .project_paths
            .write()
            .unwrap_or_else(PoisonError::into_inner) = paths.clone();
        paths
    }

    /// 빠른 스캔을 트리거하는 감시 파일
    pub fn watched_file(&self) -> Option<PathBuf> {
        self.resolver.watched_file()
    }

    /// 마지막으로 발행한 트리. 첫 스캔이 끝나기 전에는 `None`.
    pub fn last_tree(&self) -> Option<Arc<DependencyTree>> {
        self.last_tree
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// 마지막 트리의 라이선스 합집합
    pub fn licenses(&self) -> BTreeSet<License> {
        self.last_tree()
            .map(|tree| collect_licenses(&tree))
            .unwrap_or_default()
    }

    /// 현재 스캔 상태
    pub fn state(&self) -> ScanState {
        self.coordinator.state()
    }

    /// 스캔이 진행 중인지 확인합니다.
    pub fn is_running(&self) -> bool {
        self.coordinator.is_running()
    }

    /// 진행 중인 스캔을 취소합니다. 취소된 스캔은 발행하지 않습니다.
    pub fn cancel(&self) {
        self.coordinator.cancel();
    }

    /// 트리거 구독을 끊습니다.
    ///
    /// 이후 트리거는 이 스캐너에 도달하지 않습니다. 진행 중인 스캔은 끝까지
    /// 진행되어 한 번 발행할 수 있습니다.
    pub fn dispose(&self) {
        self.subscriptions.cancel();
        debug!(scanner = %self.id, "scanner disposed");
    }

    /// 구독이 끊겼는지 확인합니다.
    pub fn is_disposed(&self) -> bool {
        self.subscriptions.is_cancelled()
    }

    /// 설정 변경과 파일 변경 토픽을 구독하는 리스너 태스크를 시작합니다.
    ///
    /// 리스너는 스캐너를 약한 참조로 잡으므로 레지스트리에서 제거된 스캐너를
    /// 살려 두지 않습니다.
    pub fn spawn_listeners(self: &Arc<Self>) -> JoinHandle<()> {
        let weak = Arc::downgrade(self);
        let token = self.subscriptions.clone();
        let mut config_rx = self.ctx.settings.bus().configuration.subscribe();
        let mut files_rx = self.project.bus().files.subscribe();
        let watched = self.resolver.watched_file();
        let id = self.id.clone();

        tokio::spawn(async move {
            loop {
                let fire = tokio::select! {
                    biased;
                    _ = token.cancelled() => break,
                    msg = config_rx.recv() => match msg {
                        Ok(_) => true,
                        Err(RecvError::Lagged(skipped)) => {
                            debug!(scanner = %id, skipped, "configuration notifications lagged");
                            true
                        }
                        Err(RecvError::Closed) => break,
                    },
                    msg = files_rx.recv() => match msg {
                        Ok(batch) => watched.as_deref().is_some_and(|path| batch.contains(path)),
                        Err(RecvError::Lagged(skipped)) => {
                            warn!(scanner = %id, skipped, "file change notifications lagged");
                            watched.is_some()
                        }
                        Err(RecvError::Closed) => break,
                    },
                };

                if !fire {
                    continue;
                }
                let Some(scanner) = weak.upgrade() else {
                    break;
                };
                drop(scanner.trigger_scan(true, None));
            }
            debug!(scanner = %id, "scanner listeners stopped");
        })
    }

    /// 스캔을 트리거합니다.
    ///
    /// 동시에 호출해도 안전합니다. 잠금을 얻지 못한 호출은 대기열에 쌓이지 않고
    /// 즉시 [`ScanOutcome::AlreadyRunning`]으로 끝납니다. `quick`은 로그 수준에만
    /// 영향을 줍니다.
    pub fn trigger_scan(self: &Arc<Self>, quick: bool, hint: Option<TreeData>) -> ScanHandle {
        let kind = self.id.kind.as_str();

        if self.project.is_closed() {
            debug!(scanner = %self.id, "project closed, scan not submitted");
            return ScanHandle::ready(ScanOutcome::ProjectClosed);
        }

        if self.project.is_indexing() {
            debug!(scanner = %self.id, "project indexing, scan trigger skipped");
            metrics::counter!(m::SCANNER_TRIGGERS_SKIPPED_TOTAL, m::LABEL_KIND => kind, m::LABEL_REASON => "indexing")
                .increment(1);
            return ScanHandle::ready(ScanOutcome::Indexing);
        }

        if !self.ctx.settings.is_configured() {
            error!(
                scanner = %self.id,
                project = self.project.name(),
                "scan backend is not configured, scan aborted"
            );
            metrics::counter!(m::SCANNER_TRIGGERS_SKIPPED_TOTAL, m::LABEL_KIND => kind, m::LABEL_REASON => "not_configured")
                .increment(1);
            return ScanHandle::ready(ScanOutcome::NotConfigured);
        }

        let Some(guard) = self.coordinator.try_begin() else {
            if quick {
                debug!(scanner = %self.id, "scan already in progress, quick trigger dropped");
            } else {
                info!(scanner = %self.id, "scan already in progress, trigger ignored");
            }
            metrics::counter!(m::SCANNER_TRIGGERS_SKIPPED_TOTAL, m::LABEL_KIND => kind, m::LABEL_REASON => "already_running")
                .increment(1);
            return ScanHandle::ready(ScanOutcome::AlreadyRunning);
        };

        metrics::counter!(m::SCANNER_SCANS_STARTED_TOTAL, m::LABEL_KIND => kind).increment(1);
        debug!(
            scanner = %self.id,
            generation = guard.generation(),
            quick,
            hinted = hint.is_some(),
            "scan lock acquired, submitting pipeline"
        );

        let (tx, rx) = oneshot::channel();
        let scanner = Arc::clone(self);
        let title = format!(
            "Scanning {} dependencies of {}",
            self.id.kind,
            self.project.name()
        );
        let submitted = self.ctx.runner.submit_background(title, async move {
            let outcome = scanner.run_pipeline(guard, hint).await;
            let _ = tx.send(outcome);
        });
        if !submitted {
            warn!(scanner = %self.id, "task runner unavailable, scan dropped");
        }

        ScanHandle { rx }
    }

    /// 파이프라인을 실행하고 결과를 기록합니다. `guard`는 여기서 해제됩니다.
    async fn run_pipeline(&self, guard: ScanGuard, hint: Option<TreeData>) -> ScanOutcome {
        let started = Instant::now();
        let kind = self.id.kind.as_str();
        let generation = guard.generation();

        let outcome = match self.execute(&guard, hint).await {
            Ok(tree) => {
                let elapsed = started.elapsed();
                metrics::counter!(m::SCANNER_SCANS_COMPLETED_TOTAL, m::LABEL_KIND => kind)
                    .increment(1);
                metrics::histogram!(m::SCANNER_SCAN_DURATION_SECONDS, m::LABEL_KIND => kind)
                    .record(elapsed.as_secs_f64());
                info!(
                    scanner = %self.id,
                    project = self.project.name(),
                    generation,
                    components = tree.descendant_count(),
                    issues = tree.issue_count(),
                    elapsed_ms = elapsed.as_millis() as u64,
                    "scan completed"
                );
                ScanOutcome::Completed { generation }
            }
            Err((stage, err)) if err.is_canceled() => {
                guard.enter(ScanState::Canceled);
                metrics::counter!(m::SCANNER_SCANS_CANCELED_TOTAL, m::LABEL_KIND => kind)
                    .increment(1);
                info!(scanner = %self.id, generation, stage = %stage, "scan canceled");
                ScanOutcome::Canceled
            }
            Err((stage, err)) => {
                guard.enter(ScanState::Failed);
                metrics::counter!(m::SCANNER_SCANS_FAILED_TOTAL, m::LABEL_KIND => kind, m::LABEL_STAGE => stage.as_str())
                    .increment(1);
                match &err {
                    ScannerError::Refresh { message, details } => error!(
                        scanner = %self.id,
                        generation,
                        stage = %stage,
                        details = details.as_deref().unwrap_or(message),
                        "dependency refresh failed"
                    ),
                    other => error!(
                        scanner = %self.id,
                        generation,
                        stage = %stage,
                        error = %other,
                        "scan failed"
                    ),
                }
                ScanOutcome::Failed {
                    stage,
                    reason: err.to_string(),
                }
            }
        };

        drop(guard);
        outcome
    }

    async fn execute(
        &self,
        guard: &ScanGuard,
        hint: Option<TreeData>,
    ) -> Result<Arc<DependencyTree>, StageError> {
        // Refreshing (잠금 획득 시 진입)
        let data = self
            .resolver
            .refresh_dependencies(hint)
            .await
            .map_err(|failure| (ScanState::Refreshing, ScannerError::from(failure)))?;

        checkpoint(guard, ScanState::Refreshing)?;
        guard.enter(ScanState::TreeBuilding);
        let mut tree = self.build_tree(data).await?;

        checkpoint(guard, ScanState::TreeBuilding)?;
        guard.enter(ScanState::Scanning);
        let config = self.ctx.settings.current();
        let mut reports = self.scan_components(guard, &tree.components(), &config).await?;
        for report in reports.values_mut() {
            report.retain_min_severity(config.min_severity);
        }
        tree.merge_reports(&reports);

        checkpoint(guard, ScanState::Scanning)?;
        guard.enter(ScanState::Aggregating);
        let tree = Arc::new(tree);
        let key = project_key(self.project.name(), &tree);
        *self
            .last_tree
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(Arc::clone(&tree));
        self.project.aggregator().publish(&key, Arc::clone(&tree));
        debug!(scanner = %self.id, key = %key, "scan results published");

        Ok(tree)
    }

    async fn build_tree(&self, data: TreeData) -> Result<DependencyTree, StageError> {
        let resolver = Arc::clone(&self.resolver);
        let stage_error = |reason: String| {
            (
                ScanState::TreeBuilding,
                ScannerError::Pipeline {
                    stage: ScanState::TreeBuilding.as_str().to_owned(),
                    reason,
                },
            )
        };

        match tokio::task::spawn_blocking(move || resolver.build_tree(data)).await {
            Ok(Ok(tree)) => Ok(tree),
            Ok(Err(e)) => Err(stage_error(e.to_string())),
            Err(e) => Err(stage_error(format!("tree building task failed: {e}"))),
        }
    }

    /// 캐시를 먼저 보고, 미스만 배치 단위로 백엔드에 보냅니다.
    ///
    /// 돌려주는 보고서와 캐시에 쓰는 보고서는 모두 심각도 필터링 전 상태입니다.
    async fn scan_components(
        &self,
        guard: &ScanGuard,
        components: &[ComponentId],
        config: &ScannerConfig,
    ) -> Result<ScanReports, StageError> {
        let cache = self.cache.clone();
        let ids = components.to_vec();
        let ttl = config.cache_ttl();
        let (mut reports, misses) =
            tokio::task::spawn_blocking(move || cache.get_many(&ids, ttl))
                .await
                .map_err(|e| {
                    (
                        ScanState::Scanning,
                        ScannerError::Cache {
                            path: self.cache.dir().display().to_string(),
                            reason: format!("cache lookup task failed: {e}"),
                        },
                    )
                })?;

        if misses.is_empty() {
            debug!(scanner = %self.id, cached = reports.len(), "all components served from cache");
            return Ok(reports);
        }

        let mut fresh = ScanReports::with_capacity(misses.len());
        for batch in misses.chunks(config.backend_batch_size.max(1)) {
            checkpoint(guard, ScanState::Scanning)?;
            let batch_reports = self
                .ctx
                .backend
                .scan(batch)
                .await
                .map_err(|e| (ScanState::Scanning, e))?;
            if batch_reports.len() < batch.len() {
                warn!(
                    scanner = %self.id,
                    backend = self.ctx.backend.name(),
                    requested = batch.len(),
                    returned = batch_reports.len(),
                    "backend returned fewer reports than requested"
                );
            }
            fresh.extend(batch_reports);
        }

        debug!(
            scanner = %self.id,
            backend = self.ctx.backend.name(),
            cached = reports.len(),
            scanned = fresh.len(),
            "backend scan finished"
        );

        let cache = self.cache.clone();
        let to_store = fresh.clone();
        match tokio::task::spawn_blocking(move || cache.put_many(&to_store)).await {
            Ok(stored) => debug!(scanner = %self.id, stored, "component cache updated"),
            Err(e) => warn!(scanner = %self.id, error = %e, "cache write task failed"),
        }

        self.record_issues(&fresh, config.min_severity);
        reports.extend(fresh);
        Ok(reports)
    }

    /// 백엔드에서 새로 받은 보고서의 이슈만 셉니다. 캐시 적중분은 이미 집계되었습니다.
    fn record_issues(&self, fresh: &ScanReports, min_severity: Severity) {
        let kind = self.id.kind.as_str();
        for (severity, count) in fresh_issue_counts(fresh, min_severity) {
            metrics::counter!(
                m::SCANNER_ISSUES_FOUND_TOTAL,
                m::LABEL_KIND => kind,
                m::LABEL_SEVERITY => severity.to_string().to_lowercase()
            )
            .increment(count);
        }
    }
}

impl std::fmt::Debug for Scanner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scanner")
            .field("id", &self.id)
            .field("project", &self.project.name())
            .field("state", &self.state())
            .field("roots", &self.roots)
            .finish_non_exhaustive()
    }
}

/// 백엔드 보고서의 이슈 수를 심각도별로 셉니다. `min_severity` 미만은 제외합니다.
fn fresh_issue_counts(fresh: &ScanReports, min_severity: Severity) -> BTreeMap<Severity, u64> {
    let mut counts = BTreeMap::new();
    for issue in fresh.values().flat_map(|report| report.issues.iter()) {
        if issue.severity >= min_severity {
            *counts.entry(issue.severity).or_insert(0) += 1;
        }
    }
    counts
}

/// 취소되었거나 세대가 밀려났으면 `stage`에서 멈춥니다.
fn checkpoint(guard: &ScanGuard, stage: ScanState) -> Result<(), StageError> {
    if guard.is_stale() {
        return Err((stage, ScannerError::Canceled));
    }
    Ok(())
}

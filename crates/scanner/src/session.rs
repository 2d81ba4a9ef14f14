//! 프로젝트 세션 -- 열린 프로젝트 하나의 상태 보관자
//!
//! 호스트는 프로젝트를 열 때 [`ProjectSession::open`], 닫을 때
//! [`ProjectSession::close`]를 호출합니다. 레지스트리와 컨텍스트는 전역 상태 없이
//! 세션을 통해 명시적으로 전달됩니다.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, info};

use depwatch_core::event::FilesChanged;

use crate::paths::is_build_manifest;
use crate::project::{Project, ProjectStores};
use crate::registry::{RefreshSummary, ScannerRegistry};
use crate::scanner::{ScanContext, ScanHandle};

/// 열린 프로젝트 세션
#[derive(Debug)]
pub struct ProjectSession {
    project: Arc<Project>,
    registry: ScannerRegistry,
}

impl ProjectSession {
    /// 프로젝트를 열고 첫 레지스트리 평가를 수행합니다.
    pub async fn open(
        ctx: ScanContext,
        name: impl Into<String>,
        base_path: impl Into<PathBuf>,
        stores: ProjectStores,
    ) -> Self {
        let project = Arc::new(Project::new(name, base_path, stores));
        let registry = ScannerRegistry::new(Arc::clone(&project), ctx);
        let summary = registry.refresh().await;
        info!(
            project = project.name(),
            base_path = %project.base_path().display(),
            scanners = summary.live,
            "project session opened"
        );
        Self { project, registry }
    }

    /// 프로젝트 이름
    pub fn name(&self) -> &str {
        self.project.name()
    }

    /// 프로젝트 상태
    pub fn project(&self) -> &Arc<Project> {
        &self.project
    }

    /// 스캐너 레지스트리
    pub fn registry(&self) -> &ScannerRegistry {
        &self.registry
    }

    /// 모든 스캐너에 수동 스캔을 요청합니다 (`quick = false`).
    pub fn scan_all(&self) -> Vec<ScanHandle> {
        self.registry.trigger_all(false)
    }

    /// 파일 변경 배치를 전달합니다.
    ///
    /// 배치는 프로젝트 버스로 발행되어 감시 파일이 일치하는 스캐너가 빠른 스캔을
    /// 시작합니다. 빌드 매니페스트가 포함되어 있으면 레지스트리를 다시 평가하고,
    /// 새로 생긴 스캐너에는 빠른 스캔을 요청합니다.
    pub async fn files_changed(&self, paths: Vec<PathBuf>) -> Option<RefreshSummary> {
        if paths.is_empty() || self.project.is_closed() {
            return None;
        }

        let manifest_changed = paths.iter().any(|p| is_build_manifest(p));
        let receivers = self.project.bus().files.publish(FilesChanged::new(paths));
        debug!(project = self.name(), receivers, manifest_changed, "file changes published");

        if !manifest_changed {
            return None;
        }

        let summary = self.registry.refresh().await;
        let snapshot = self.registry.snapshot();
        for id in &summary.added {
            if let Some(scanner) = snapshot.get(id) {
                drop(scanner.trigger_scan(true, None));
            }
        }
        Some(summary)
    }

    /// 프로젝트를 닫습니다.
    ///
    /// 진행 중인 스캔은 취소되어 발행하지 않고, 모든 스캐너의 구독이 끊깁니다.
    /// 처음 닫을 때만 `true`를 반환합니다.
    pub fn close(&self) -> bool {
        if !self.project.mark_closed() {
            return false;
        }
        let disposed = self.registry.dispose_all();
        info!(project = self.name(), scanners = disposed, "project session closed");
        true
    }
}

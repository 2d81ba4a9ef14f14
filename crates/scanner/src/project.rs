//! 프로젝트 상태
//!
//! [`Project`]는 열린 프로젝트 하나의 이름, 기준 경로, 버스, 표시 저장소,
//! 생명주기 플래그를 담습니다. 스캐너와 레지스트리는 `Arc<Project>`를 공유합니다.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio_util::sync::CancellationToken;

use depwatch_core::event::ProjectBus;

use crate::aggregator::{FilterState, PresentationStore, ResultAggregator, ResultsStore};

/// 프로젝트의 표시 저장소 묶음
#[derive(Clone)]
pub struct ProjectStores {
    /// 이슈(취약점) 뷰
    pub issues: Arc<dyn PresentationStore>,
    /// 라이선스 뷰
    pub licenses: Arc<dyn PresentationStore>,
}

impl ProjectStores {
    /// 메모리 내 저장소 한 쌍
    pub fn in_memory() -> Self {
        Self {
            issues: Arc::new(ResultsStore::new("issues")),
            licenses: Arc::new(ResultsStore::new("licenses")),
        }
    }
}

/// 열린 프로젝트
pub struct Project {
    name: String,
    base_path: PathBuf,
    bus: ProjectBus,
    stores: ProjectStores,
    filters: Arc<FilterState>,
    cancel: CancellationToken,
    closed: AtomicBool,
    indexing: AtomicBool,
}

impl Project {
    pub fn new(name: impl Into<String>, base_path: impl Into<PathBuf>, stores: ProjectStores) -> Self {
        Self {
            name: name.into(),
            base_path: base_path.into(),
            bus: ProjectBus::new(),
            stores,
            filters: Arc::new(FilterState::new()),
            cancel: CancellationToken::new(),
            closed: AtomicBool::new(false),
            indexing: AtomicBool::new(false),
        }
    }

    /// 프로젝트 이름
    pub fn name(&self) -> &str {
        &self.name
    }

    /// 프로젝트 기준 경로
    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// 프로젝트 버스
    pub fn bus(&self) -> &ProjectBus {
        &self.bus
    }

    /// 표시 저장소
    pub fn stores(&self) -> &ProjectStores {
        &self.stores
    }

    /// 라이선스 필터
    pub fn filters(&self) -> &Arc<FilterState> {
        &self.filters
    }

    /// 프로젝트 수명 토큰. 닫힐 때 취소됩니다.
    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// 이 프로젝트의 결과 집계기
    pub fn aggregator(&self) -> ResultAggregator {
        ResultAggregator::new(
            self.name.clone(),
            Arc::clone(&self.stores.issues),
            Arc::clone(&self.stores.licenses),
            Arc::clone(&self.filters),
            self.bus.results.clone(),
        )
    }

    /// 프로젝트가 닫혔는지 확인합니다.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// 프로젝트를 닫힌 상태로 표시하고 수명 토큰을 취소합니다.
    ///
    /// 처음 닫을 때만 `true`를 반환합니다.
    pub fn mark_closed(&self) -> bool {
        let first = !self.closed.swap(true, Ordering::AcqRel);
        if first {
            self.cancel.cancel();
        }
        first
    }

    /// 인덱싱 중인지 확인합니다.
    pub fn is_indexing(&self) -> bool {
        self.indexing.load(Ordering::Acquire)
    }

    /// 인덱싱 상태를 설정합니다.
    pub fn set_indexing(&self, indexing: bool) {
        self.indexing.store(indexing, Ordering::Release);
    }
}

impl std::fmt::Debug for Project {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Project")
            .field("name", &self.name)
            .field("base_path", &self.base_path)
            .field("closed", &self.is_closed())
            .field("indexing", &self.is_indexing())
            .finish_non_exhaustive()
    }
}

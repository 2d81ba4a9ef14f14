//! 결과 집계와 발행
//!
//! 완료된 트리를 후처리(라이선스 수집, 필터 등록)한 뒤 표시 저장소에 쓰고
//! 변경 알림을 발행합니다. 알림은 [`ProjectKey`]만 담으며, 구독자는 저장소에서
//! 현재 상태를 다시 읽습니다.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex, PoisonError};

use tracing::debug;

use depwatch_core::event::{ProjectEvent, Topic};
use depwatch_core::types::{License, ProjectKey};

use crate::tree::DependencyTree;

/// 트리 전체 라이선스의 중복 없는 합집합
pub fn collect_licenses(tree: &DependencyTree) -> BTreeSet<License> {
    let mut licenses = tree.licenses.clone();
    for child in &tree.children {
        licenses.extend(collect_licenses(child));
    }
    licenses
}

/// 표시 계층 저장소
///
/// 같은 [`ProjectKey`]로 다시 쓰면 이전 트리를 교체합니다 (마지막 쓰기 우선).
pub trait PresentationStore: Send + Sync {
    /// 스캔 결과 트리를 반영합니다.
    fn add_scan_results(&self, project_name: &str, tree: Arc<DependencyTree>);

    /// 키에 해당하는 현재 트리
    fn snapshot(&self, key: &ProjectKey) -> Option<Arc<DependencyTree>>;
}

/// 발행된 트리의 루트에서 프로젝트 키를 만듭니다.
pub fn project_key(project_name: &str, tree: &DependencyTree) -> ProjectKey {
    match &tree.general_info {
        Some(info) => ProjectKey::new(project_name, info),
        None => ProjectKey::new(project_name, &Default::default()),
    }
}

/// 메모리 내 표시 저장소
#[derive(Debug, Default)]
pub struct ResultsStore {
    view: &'static str,
    trees: Mutex<BTreeMap<ProjectKey, Arc<DependencyTree>>>,
}

impl ResultsStore {
    /// 뷰 이름(로그용)으로 빈 저장소를 만듭니다.
    pub fn new(view: &'static str) -> Self {
        Self {
            view,
            trees: Mutex::new(BTreeMap::new()),
        }
    }

    /// 저장된 키 목록
    pub fn keys(&self) -> Vec<ProjectKey> {
        self.trees
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect()
    }

    /// 저장된 트리 수
    pub fn len(&self) -> usize {
        self.trees.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// 비어 있는지 확인합니다.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl PresentationStore for ResultsStore {
    fn add_scan_results(&self, project_name: &str, tree: Arc<DependencyTree>) {
        let key = project_key(project_name, &tree);
        debug!(view = self.view, key = %key, "scan results stored");
        self.trees
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key, tree);
    }

    fn snapshot(&self, key: &ProjectKey) -> Option<Arc<DependencyTree>> {
        self.trees
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }
}

/// 라이선스 필터 상태
///
/// 새로 등록된 라이선스는 선택된 상태로 시작하며, 이미 있는 라이선스의
/// 선택 여부는 유지됩니다.
#[derive(Debug, Default)]
pub struct FilterState {
    licenses: Mutex<BTreeMap<License, bool>>,
}

impl FilterState {
    pub fn new() -> Self {
        Self::default()
    }

    /// 라이선스를 등록합니다. 새로 추가된 개수를 반환합니다.
    pub fn add_licenses<I>(&self, licenses: I) -> usize
    where
        I: IntoIterator<Item = License>,
    {
        let mut map = self.licenses.lock().unwrap_or_else(PoisonError::into_inner);
        let before = map.len();
        for license in licenses {
            map.entry(license).or_insert(true);
        }
        map.len() - before
    }

    /// 선택 여부를 바꿉니다. 등록되지 않은 라이선스면 `false`.
    pub fn set_selected(&self, license: &License, selected: bool) -> bool {
        let mut map = self.licenses.lock().unwrap_or_else(PoisonError::into_inner);
        match map.get_mut(license) {
            Some(value) => {
                *value = selected;
                true
            }
            None => false,
        }
    }

    /// 선택된 라이선스 목록
    pub fn selected_licenses(&self) -> BTreeSet<License> {
        self.licenses
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|(_, selected)| **selected)
            .map(|(license, _)| license.clone())
            .collect()
    }

    /// 등록된 전체 라이선스
    pub fn all_licenses(&self) -> BTreeSet<License> {
        self.licenses
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect()
    }
}

/// 결과 집계기
///
/// 프로젝트의 저장소, 필터, 결과 토픽을 묶습니다.
#[derive(Clone)]
pub struct ResultAggregator {
    project_name: String,
    issues: Arc<dyn PresentationStore>,
    licenses: Arc<dyn PresentationStore>,
    filters: Arc<FilterState>,
    results: Topic<ProjectEvent>,
}

impl ResultAggregator {
    pub fn new(
        project_name: impl Into<String>,
        issues: Arc<dyn PresentationStore>,
        licenses: Arc<dyn PresentationStore>,
        filters: Arc<FilterState>,
        results: Topic<ProjectEvent>,
    ) -> Self {
        Self {
            project_name: project_name.into(),
            issues,
            licenses,
            filters,
            results,
        }
    }

    /// 트리를 저장소에 쓰고 변경 알림을 발행합니다.
    ///
    /// 자식이 있는 트리만 필터에 라이선스를 등록합니다.
    pub fn publish(&self, key: &ProjectKey, tree: Arc<DependencyTree>) {
        if !tree.is_leaf() {
            let added = self.filters.add_licenses(collect_licenses(&tree));
            debug!(key = %key, added, "licenses registered with filter");
        }

        self.issues
            .add_scan_results(&self.project_name, Arc::clone(&tree));
        self.results
            .publish(ProjectEvent::IssuesChanged(key.clone()));

        self.licenses.add_scan_results(&self.project_name, tree);
        self.results
            .publish(ProjectEvent::LicensesChanged(key.clone()));
    }
}

//! 의존성 트리
//!
//! [`TreeData`]는 리졸버가 새로고침 결과로 돌려주는 원시 데이터이고,
//! [`DependencyTree`]는 그로부터 만들어져 스캔 결과가 병합되는 트리입니다.
//!
//! 트리는 발행 직전까지만 변경되며, 발행 이후에는 `Arc<DependencyTree>`로
//! 공유되어 읽기 전용으로 취급됩니다.

use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

use depwatch_core::types::{GeneralInfo, Issue, License};

use crate::types::{ComponentId, ComponentReport};

/// 리졸버가 돌려주는 의존성 데이터
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TreeData {
    /// 프로젝트(최상위) 정보
    pub root: GeneralInfo,
    /// 모듈/애플리케이션 목록
    pub modules: Vec<ModuleData>,
}

/// 모듈 하나의 의존성 데이터
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModuleData {
    /// 모듈 정보
    pub info: GeneralInfo,
    /// 모듈 좌표
    pub id: ComponentId,
    /// 직접 의존성
    pub dependencies: Vec<DependencyData>,
}

/// 의존성 하나와 그 하위 의존성
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DependencyData {
    /// 컴포넌트 좌표
    pub id: ComponentId,
    /// 매니페스트에 선언된 라이선스
    #[serde(default)]
    pub licenses: Vec<License>,
    /// 스코프 (compile, test, dev 등)
    #[serde(default)]
    pub scope: Option<String>,
    /// 하위 의존성
    #[serde(default)]
    pub children: Vec<DependencyData>,
}

impl DependencyData {
    /// 좌표만으로 의존성을 생성합니다.
    pub fn new(id: ComponentId) -> Self {
        Self {
            id,
            licenses: Vec::new(),
            scope: None,
            children: Vec::new(),
        }
    }
}

/// 의존성 트리 노드
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DependencyTree {
    /// 컴포넌트 좌표
    pub component: ComponentId,
    /// 루트/모듈 노드의 일반 정보
    #[serde(default)]
    pub general_info: Option<GeneralInfo>,
    /// 라이선스
    #[serde(default)]
    pub licenses: BTreeSet<License>,
    /// 취약점 발견
    #[serde(default)]
    pub issues: Vec<Issue>,
    /// 스코프
    #[serde(default)]
    pub scope: Option<String>,
    /// 자식 노드
    #[serde(default)]
    pub children: Vec<DependencyTree>,
}

impl DependencyTree {
    /// 좌표로 빈 노드를 만듭니다.
    pub fn new(component: ComponentId) -> Self {
        Self {
            component,
            general_info: None,
            licenses: BTreeSet::new(),
            issues: Vec::new(),
            scope: None,
            children: Vec::new(),
        }
    }

    /// 일반 정보를 가진 루트 노드를 만듭니다.
    pub fn root(component: ComponentId, info: GeneralInfo) -> Self {
        let mut node = Self::new(component);
        node.general_info = Some(info);
        node
    }

    /// 리졸버 데이터에서 트리를 만듭니다.
    ///
    /// 모듈이 하나면 그 모듈이 루트가 되고, 여럿이면 프로젝트 노드 아래에
    /// 모듈 노드들이 붙습니다.
    pub fn from_data(data: TreeData) -> Self {
        let TreeData { root, mut modules } = data;
        if modules.len() == 1
            && let Some(module) = modules.pop()
        {
            return Self::from_module(module);
        }

        let mut tree = Self::root(ComponentId::from_raw(root.name.clone()), root);
        tree.children = modules.into_iter().map(Self::from_module).collect();
        tree
    }

    fn from_module(module: ModuleData) -> Self {
        let mut node = Self::root(module.id, module.info);
        node.children = module
            .dependencies
            .into_iter()
            .map(Self::from_dependency)
            .collect();
        node
    }

    fn from_dependency(dep: DependencyData) -> Self {
        let mut node = Self::new(dep.id);
        node.licenses = dep.licenses.into_iter().collect();
        node.scope = dep.scope;
        node.children = dep
            .children
            .into_iter()
            .map(Self::from_dependency)
            .collect();
        node
    }

    /// 자식을 추가합니다.
    pub fn add_child(&mut self, child: DependencyTree) {
        self.children.push(child);
    }

    /// 자식이 없는 노드인지 확인합니다.
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// 전위 순회로 모든 노드를 방문합니다.
    pub fn walk(&self) -> impl Iterator<Item = &DependencyTree> {
        let mut stack = vec![self];
        std::iter::from_fn(move || {
            let node = stack.pop()?;
            stack.extend(node.children.iter().rev());
            Some(node)
        })
    }

    /// 모듈 노드를 제외한 고유 컴포넌트 좌표 (정렬됨)
    pub fn components(&self) -> Vec<ComponentId> {
        self.walk()
            .filter(|node| node.general_info.is_none())
            .map(|node| node.component.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// 루트를 제외한 노드 수
    pub fn descendant_count(&self) -> usize {
        self.walk().count().saturating_sub(1)
    }

    /// 트리 전체의 취약점 수
    pub fn issue_count(&self) -> usize {
        self.walk().map(|node| node.issues.len()).sum()
    }

    /// 스캔 결과를 노드에 병합합니다.
    ///
    /// 같은 좌표를 가진 모든 노드에 라이선스와 취약점이 붙습니다.
    /// 보고된 라이선스가 없고 매니페스트 라이선스도 없는 컴포넌트 노드는
    /// `Unknown` 라이선스를 받습니다.
    pub fn merge_reports(&mut self, reports: &HashMap<ComponentId, ComponentReport>) {
        let is_component = self.general_info.is_none();
        if let Some(report) = reports.get(&self.component) {
            self.licenses.extend(report.licenses.iter().cloned());
            for issue in &report.issues {
                if !self.issues.contains(issue) {
                    self.issues.push(issue.clone());
                }
            }
        }
        if is_component && self.licenses.is_empty() {
            self.licenses.insert(License::unknown());
        }
        for child in &mut self.children {
            child.merge_reports(reports);
        }
    }
}

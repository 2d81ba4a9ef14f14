#![doc = include_str!("../README.md")]
//!
//! # 모듈 구조
//!
//! - [`types`]: 도메인 타입 (`BuildSystem`, `ScannerId`, `ComponentId`, `ScanState`, `ScanOutcome`)
//! - [`error`]: 에러 타입 (`ScannerError`)
//! - [`config`]: 스캐너 설정 (`ScannerConfig`, 빌더)
//! - [`settings`]: 전역 설정 핸들 (`GlobalSettings`)
//! - [`paths`]: 프로젝트 경로 계산과 적용성 탐지 (`Detected`, `detect_build_systems`)
//! - [`tree`]: 의존성 트리 (`DependencyTree`, `TreeData`)
//! - [`resolver`]: 빌드 시스템별 리졸버 (`DependencyResolver`, Maven/Gradle/npm/Go)
//! - [`backend`]: 스캔 백엔드 (`ScanBackend`, 로컬 JSON DB)
//! - [`cache`]: 컴포넌트 캐시 (`ComponentCache`)
//! - [`coordinator`]: 단일 실행 조정 (`ScanCoordinator`, `ScanGuard`)
//! - [`runner`]: 포그라운드/백그라운드 실행기 (`TaskRunner`)
//! - [`aggregator`]: 결과 집계와 발행 (`ResultAggregator`, `PresentationStore`)
//! - [`project`]: 프로젝트 상태 (`Project`, `ProjectStores`)
//! - [`scanner`]: 스캐너와 파이프라인 (`Scanner`, `ScanContext`, `ScanHandle`)
//! - [`registry`]: 스캐너 레지스트리 (`ScannerRegistry`)
//! - [`session`]: 프로젝트 세션 (`ProjectSession`)

pub mod aggregator;
pub mod backend;
pub mod cache;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod paths;
pub mod project;
pub mod registry;
pub mod resolver;
pub mod runner;
pub mod scanner;
pub mod session;
pub mod settings;
pub mod tree;
pub mod types;

// --- Public API Re-exports ---

// 세션과 레지스트리
pub use registry::{RefreshSummary, ScannerRegistry, ScannerSet};
pub use scanner::{ScanContext, ScanHandle, Scanner};
pub use session::ProjectSession;

// 설정
pub use config::{ScannerConfig, ScannerConfigBuilder};
pub use settings::GlobalSettings;

// 에러
pub use error::ScannerError;

// 타입
pub use tree::{DependencyData, DependencyTree, ModuleData, TreeData};
pub use types::{BuildSystem, ComponentId, ComponentReport, ScanOutcome, ScanState, ScannerId};

// 확장 포인트
pub use aggregator::{FilterState, PresentationStore, ResultAggregator, ResultsStore};
pub use backend::{LocalDbBackend, ScanBackend, ScanReports};
pub use resolver::{DependencyResolver, ManifestResolverFactory, RefreshFailure, ResolverFactory};

// 실행과 조정
pub use cache::ComponentCache;
pub use coordinator::{ScanCoordinator, ScanGuard};
pub use paths::{Detected, detect_build_systems, filter_nested_paths, is_build_manifest};
pub use project::{Project, ProjectStores};
pub use runner::TaskRunner;

//! 스캔 백엔드 -- 컴포넌트 좌표를 라이선스와 취약점으로 해석
//!
//! [`ScanBackend`]는 파이프라인의 Scanning 단계가 캐시 미스 컴포넌트를 배치 단위로
//! 넘기는 확장 포인트입니다. 기본 구현은 로컬 JSON DB를 읽는 [`LocalDbBackend`]입니다.
//!
//! # 계약
//!
//! - 요청한 모든 좌표에 대해 보고서를 돌려줍니다. 발견이 없는 컴포넌트는 빈
//!   [`ComponentReport`]로 보고하며, 캐시는 이것도 "깨끗함"으로 저장합니다.
//! - 백엔드가 설정되지 않았으면 [`ScannerError::NotConfigured`]를 반환합니다.

pub mod db;
pub mod local;
pub mod version;

use std::collections::HashMap;

use depwatch_core::BoxFuture;

use crate::error::ScannerError;
use crate::types::{ComponentId, ComponentReport};

pub use db::{Ecosystem, VersionRange, VulnDb, VulnDbEntry};
pub use local::LocalDbBackend;

/// 배치 스캔 결과
pub type ScanReports = HashMap<ComponentId, ComponentReport>;

/// 스캔 백엔드
pub trait ScanBackend: Send + Sync {
    /// 백엔드 이름 (로그용)
    fn name(&self) -> &str;

    /// 컴포넌트 배치를 스캔합니다.
    fn scan<'a>(
        &'a self,
        components: &'a [ComponentId],
    ) -> BoxFuture<'a, Result<ScanReports, ScannerError>>;
}

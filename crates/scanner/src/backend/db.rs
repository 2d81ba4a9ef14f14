//! 취약점 데이터베이스 -- 로컬 JSON DB 로딩 및 조회
//!
//! [`VulnDb`]는 로컬 파일시스템의 JSON 파일에서 취약점과 라이선스 데이터를 로드합니다.
//!
//! # DB 디렉토리 구조
//!
//! ```text
//! <db_path>/
//!   maven.json     # Maven/Gradle 좌표 취약점
//!   npm.json       # npm 패키지 취약점
//!   go.json        # Go 모듈 취약점
//!   licenses.json  # (선택) 패키지별 라이선스
//! ```
//!
//! # JSON 형식
//!
//! ```json
//! [
//!   {
//!     "id": "CVE-2021-44228",
//!     "package": "org.apache.logging.log4j:log4j-core",
//!     "ecosystem": "maven",
//!     "affected_ranges": [{ "introduced": "2.0.0", "fixed": "2.15.0" }],
//!     "fixed_versions": ["2.15.0"],
//!     "severity": "Critical",
//!     "summary": "Remote code execution via JNDI lookup"
//!   }
//! ]
//! ```
//!
//! `licenses.json`은 `{ "npm://lodash": ["MIT"] }`처럼 버전 없는 좌표를 키로 씁니다.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use depwatch_core::types::{License, Severity};

use crate::error::ScannerError;
use crate::types::ComponentId;

/// 취약점 DB 파일 최대 크기 (50 MB)
const MAX_VULN_DB_FILE_SIZE: u64 = 50 * 1024 * 1024;

/// 전체 취약점 DB 엔트리 최대 개수
const MAX_VULN_DB_ENTRIES: usize = 1_000_000;

/// 라이선스 파일 이름
const LICENSES_FILE: &str = "licenses.json";

/// 취약점 DB 생태계
///
/// Gradle은 Maven 좌표를 공유하므로 별도 생태계가 없습니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Ecosystem {
    /// Maven 좌표 (`gav://`)
    Maven,
    /// npm 패키지 (`npm://`)
    Npm,
    /// Go 모듈 (`go://`)
    Go,
}

impl Ecosystem {
    /// DB 파일 이름
    pub fn db_file(&self) -> &'static str {
        match self {
            Self::Maven => "maven.json",
            Self::Npm => "npm.json",
            Self::Go => "go.json",
        }
    }

    /// 컴포넌트 좌표의 접두사로 생태계를 판별합니다.
    pub fn of(id: &ComponentId) -> Option<Self> {
        match id.prefix()? {
            ComponentId::GAV_PREFIX => Some(Self::Maven),
            ComponentId::NPM_PREFIX => Some(Self::Npm),
            ComponentId::GO_PREFIX => Some(Self::Go),
            _ => None,
        }
    }

    const ALL: [Ecosystem; 3] = [Self::Maven, Self::Npm, Self::Go];
}

/// 취약점 DB 엔트리
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VulnDbEntry {
    /// 취약점 ID (예: CVE-2024-1234)
    pub id: String,
    /// 패키지 이름 (Maven은 `group:artifact`)
    pub package: String,
    /// 생태계
    pub ecosystem: Ecosystem,
    /// 영향받는 버전 범위
    pub affected_ranges: Vec<VersionRange>,
    /// 수정된 버전 목록
    #[serde(default)]
    pub fixed_versions: Vec<String>,
    /// 심각도
    pub severity: Severity,
    /// 요약
    #[serde(default)]
    pub summary: String,
}

/// 영향받는 버전 범위
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionRange {
    /// 도입 버전 (이 버전부터 영향)
    pub introduced: Option<String>,
    /// 수정 버전 (이 버전에서 수정됨, None이면 미수정)
    pub fixed: Option<String>,
}

/// 취약점 데이터베이스
///
/// `(package, ecosystem)` 쌍으로 인덱싱된 HashMap으로 O(1) 조회합니다.
#[derive(Debug, Default)]
pub struct VulnDb {
    entries: Vec<VulnDbEntry>,
    index: HashMap<(String, Ecosystem), Vec<usize>>,
    licenses: HashMap<String, Vec<License>>,
}

impl VulnDb {
    /// 빈 데이터베이스를 생성합니다.
    pub fn empty() -> Self {
        Self::default()
    }

    fn build_index(entries: &[VulnDbEntry]) -> HashMap<(String, Ecosystem), Vec<usize>> {
        let mut index: HashMap<(String, Ecosystem), Vec<usize>> = HashMap::new();
        for (idx, entry) in entries.iter().enumerate() {
            index
                .entry((entry.package.clone(), entry.ecosystem))
                .or_default()
                .push(idx);
        }
        index
    }

    /// 엔트리 목록으로 데이터베이스를 생성합니다.
    pub fn from_entries(entries: Vec<VulnDbEntry>) -> Self {
        let index = Self::build_index(&entries);
        Self {
            entries,
            index,
            licenses: HashMap::new(),
        }
    }

    /// 라이선스 맵을 추가합니다.
    pub fn with_licenses(mut self, licenses: HashMap<String, Vec<String>>) -> Self {
        self.licenses = licenses
            .into_iter()
            .map(|(key, names)| (key, names.into_iter().map(License::new).collect()))
            .collect();
        self
    }

    /// JSON 문자열에서 데이터베이스를 파싱합니다.
    pub fn from_json(json: &str) -> Result<Self, ScannerError> {
        let entries: Vec<VulnDbEntry> =
            serde_json::from_str(json).map_err(|e| ScannerError::Backend(format!(
                "failed to parse vuln db JSON: {e}"
            )))?;
        Ok(Self::from_entries(entries))
    }

    /// 디렉토리에서 모든 생태계의 취약점 DB와 라이선스 맵을 로드합니다.
    ///
    /// 파일이 존재하지 않으면 건너뜁니다.
    ///
    /// # Note
    ///
    /// 동기 I/O를 수행합니다. async 컨텍스트에서는 `spawn_blocking`으로 감싸세요.
    pub fn load_from_dir(dir_path: &Path) -> Result<Self, ScannerError> {
        if !dir_path.is_dir() {
            return Err(ScannerError::Backend(format!(
                "vuln db directory not found: {}",
                dir_path.display()
            )));
        }

        let mut all_entries = Vec::new();
        for ecosystem in Ecosystem::ALL {
            let file_path = dir_path.join(ecosystem.db_file());
            let Some(content) = read_db_file(&file_path)? else {
                continue;
            };

            let entries: Vec<VulnDbEntry> = serde_json::from_str(&content).map_err(|e| {
                ScannerError::Backend(format!("failed to parse {}: {e}", file_path.display()))
            })?;

            if all_entries.len() + entries.len() > MAX_VULN_DB_ENTRIES {
                tracing::warn!(
                    current = all_entries.len(),
                    new = entries.len(),
                    max = MAX_VULN_DB_ENTRIES,
                    "vulnerability database entry limit reached, truncating"
                );
                let remaining = MAX_VULN_DB_ENTRIES.saturating_sub(all_entries.len());
                all_entries.extend(entries.into_iter().take(remaining));
                break;
            }

            tracing::info!(
                path = %file_path.display(),
                entries = entries.len(),
                "loaded vuln db file"
            );
            all_entries.extend(entries);
        }

        let mut db = Self::from_entries(all_entries);

        let licenses_path = dir_path.join(LICENSES_FILE);
        if let Some(content) = read_db_file(&licenses_path)? {
            let licenses: HashMap<String, Vec<String>> = serde_json::from_str(&content)
                .map_err(|e| {
                    ScannerError::Backend(format!(
                        "failed to parse {}: {e}",
                        licenses_path.display()
                    ))
                })?;
            db = db.with_licenses(licenses);
        }

        Ok(db)
    }

    /// 전체 엔트리 수
    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }

    /// 패키지 이름과 생태계로 취약점을 조회합니다.
    pub fn lookup(&self, package: &str, ecosystem: Ecosystem) -> Vec<&VulnDbEntry> {
        self.index
            .get(&(package.to_owned(), ecosystem))
            .map(|indices| {
                indices
                    .iter()
                    .filter_map(|&idx| self.entries.get(idx))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// 버전 없는 좌표(`npm://lodash`)로 라이선스를 조회합니다.
    pub fn licenses_for(&self, unversioned: &str) -> &[License] {
        self.licenses
            .get(unversioned)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }
}

/// DB 파일을 읽습니다. 파일이 없으면 `Ok(None)`.
fn read_db_file(path: &Path) -> Result<Option<String>, ScannerError> {
    let metadata = match std::fs::metadata(path) {
        Ok(m) => m,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!(path = %path.display(), "vuln db file not found, skipping");
            return Ok(None);
        }
        Err(e) => {
            return Err(ScannerError::Io {
                path: path.display().to_string(),
                source: e,
            });
        }
    };

    if metadata.len() > MAX_VULN_DB_FILE_SIZE {
        return Err(ScannerError::Backend(format!(
            "{}: file size {} bytes exceeds maximum {} bytes",
            path.display(),
            metadata.len(),
            MAX_VULN_DB_FILE_SIZE
        )));
    }

    std::fs::read_to_string(path)
        .map(Some)
        .map_err(|e| ScannerError::Io {
            path: path.display().to_string(),
            source: e,
        })
}

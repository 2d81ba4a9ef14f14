//! 컴포넌트 결과 캐시
//!
//! 백엔드 보고서를 컴포넌트 좌표 단위로 디스크에 저장합니다.
//!
//! ```text
//! <home>/cache/<project>/<sha256(coordinate)>.json
//! ```
//!
//! 쓰기는 임시 파일에 기록한 뒤 rename하므로 동시에 읽는 쪽이 잘린 파일을 보지
//! 않습니다. 손상되었거나 만료된 엔트리는 캐시 미스로 처리합니다.
//!
//! 모든 메서드는 동기 I/O를 수행합니다. 비동기 컨텍스트에서는
//! `tokio::task::spawn_blocking` 내에서 호출해야 합니다.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use depwatch_core::metrics as m;

use crate::error::ScannerError;
use crate::types::{ComponentId, ComponentReport};

/// 캐시 파일에 저장되는 엔트리
#[derive(Debug, Clone, Serialize, Deserialize)]
struct CacheEntry {
    coordinate: ComponentId,
    /// UNIX epoch 초
    cached_at: u64,
    report: ComponentReport,
}

/// 프로젝트 단위 컴포넌트 캐시
#[derive(Debug, Clone)]
pub struct ComponentCache {
    dir: PathBuf,
}

impl ComponentCache {
    /// `<cache_root>/<project>` 디렉토리를 만들고 캐시를 엽니다.
    pub fn open(cache_root: &Path, project_name: &str) -> Result<Self, ScannerError> {
        let dir = cache_root.join(sanitize_dir_name(project_name));
        std::fs::create_dir_all(&dir).map_err(|e| ScannerError::Cache {
            path: dir.display().to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self { dir })
    }

    /// 캐시 디렉토리
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// 좌표의 캐시 파일 경로
    pub fn entry_path(&self, id: &ComponentId) -> PathBuf {
        let mut hasher = Sha256::new();
        hasher.update(id.as_str().as_bytes());
        self.dir.join(format!("{:x}.json", hasher.finalize()))
    }

    /// 좌표 하나를 조회합니다. `ttl`이 `None`이면 만료하지 않습니다.
    pub fn get(&self, id: &ComponentId, ttl: Option<Duration>) -> Option<ComponentReport> {
        let path = self.entry_path(id);
        let content = std::fs::read_to_string(&path).ok()?;
        let entry: CacheEntry = match serde_json::from_str(&content) {
            Ok(entry) => entry,
            Err(e) => {
                debug!(path = %path.display(), error = %e, "corrupt cache entry, treating as miss");
                return None;
            }
        };

        // 해시 충돌 방어
        if &entry.coordinate != id {
            return None;
        }

        if let Some(ttl) = ttl {
            let age = now_secs().saturating_sub(entry.cached_at);
            if age >= ttl.as_secs() {
                return None;
            }
        }

        Some(entry.report)
    }

    /// 좌표 하나를 저장합니다.
    pub fn put(&self, id: &ComponentId, report: &ComponentReport) -> Result<(), ScannerError> {
        let entry = CacheEntry {
            coordinate: id.clone(),
            cached_at: now_secs(),
            report: report.clone(),
        };
        let path = self.entry_path(id);
        let json = serde_json::to_vec(&entry).map_err(|e| ScannerError::Cache {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;

        let tmp = path.with_extension(format!("tmp-{}", uuid::Uuid::new_v4()));
        let write = std::fs::write(&tmp, json).and_then(|()| std::fs::rename(&tmp, &path));
        if let Err(e) = write {
            let _ = std::fs::remove_file(&tmp);
            return Err(ScannerError::Cache {
                path: path.display().to_string(),
                reason: e.to_string(),
            });
        }
        Ok(())
    }

    /// 여러 좌표를 조회해 (적중, 미스)로 나눕니다.
    pub fn get_many(
        &self,
        ids: &[ComponentId],
        ttl: Option<Duration>,
    ) -> (HashMap<ComponentId, ComponentReport>, Vec<ComponentId>) {
        let mut hits = HashMap::new();
        let mut misses = Vec::new();
        for id in ids {
            match self.get(id, ttl) {
                Some(report) => {
                    hits.insert(id.clone(), report);
                }
                None => misses.push(id.clone()),
            }
        }

        metrics::counter!(m::CACHE_HITS_TOTAL).increment(hits.len() as u64);
        metrics::counter!(m::CACHE_MISSES_TOTAL).increment(misses.len() as u64);
        debug!(hits = hits.len(), misses = misses.len(), "component cache lookup");
        (hits, misses)
    }

    /// 여러 보고서를 저장하고 성공한 개수를 반환합니다.
    ///
    /// 개별 쓰기 실패는 경고만 남기고 계속합니다.
    pub fn put_many(&self, reports: &HashMap<ComponentId, ComponentReport>) -> usize {
        let mut stored = 0;
        for (id, report) in reports {
            match self.put(id, report) {
                Ok(()) => stored += 1,
                Err(e) => warn!(component = %id, error = %e, "failed to write cache entry"),
            }
        }
        stored
    }
}

/// 프로젝트 이름을 디렉토리 이름으로 쓸 수 있게 바꿉니다.
fn sanitize_dir_name(name: &str) -> String {
    let sanitized: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect();
    if sanitized.is_empty() || sanitized.chars().all(|c| c == '.') {
        "_".to_owned()
    } else {
        sanitized
    }
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

//! 로컬 JSON DB 백엔드
//!
//! 설정의 `db_path` 디렉토리에서 [`VulnDb`]를 지연 로드합니다. `db_path`가 바뀌면
//! 다음 스캔에서 다시 로드합니다.
//!
//! 보고서는 심각도로 거르지 않습니다. 최소 심각도는 스캐너가 캐시 조회 뒤에 적용합니다.

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, info};

use depwatch_core::BoxFuture;
use depwatch_core::types::Issue;

use super::db::{Ecosystem, VulnDb};
use super::version;
use super::{ScanBackend, ScanReports};
use crate::error::ScannerError;
use crate::settings::GlobalSettings;
use crate::types::{ComponentId, ComponentReport};

struct LoadedDb {
    path: String,
    db: Arc<VulnDb>,
}

/// 로컬 취약점 DB 백엔드
pub struct LocalDbBackend {
    settings: Arc<GlobalSettings>,
    loaded: Mutex<Option<LoadedDb>>,
}

impl LocalDbBackend {
    /// 전역 설정을 따르는 백엔드를 생성합니다.
    pub fn new(settings: Arc<GlobalSettings>) -> Self {
        Self {
            settings,
            loaded: Mutex::new(None),
        }
    }

    async fn database(&self, path: &str) -> Result<Arc<VulnDb>, ScannerError> {
        let mut loaded = self.loaded.lock().await;
        if let Some(current) = loaded.as_ref()
            && current.path == path
        {
            return Ok(Arc::clone(&current.db));
        }

        let dir = std::path::PathBuf::from(path);
        let db = tokio::task::spawn_blocking(move || VulnDb::load_from_dir(&dir))
            .await
            .map_err(|e| ScannerError::Backend(format!("vuln db load task failed: {e}")))??;
        info!(path, entries = db.entry_count(), "vulnerability database loaded");

        let db = Arc::new(db);
        *loaded = Some(LoadedDb {
            path: path.to_owned(),
            db: Arc::clone(&db),
        });
        Ok(db)
    }
}

impl ScanBackend for LocalDbBackend {
    fn name(&self) -> &str {
        "local-db"
    }

    fn scan<'a>(
        &'a self,
        components: &'a [ComponentId],
    ) -> BoxFuture<'a, Result<ScanReports, ScannerError>> {
        Box::pin(async move {
            let config = self.settings.current();
            if !config.is_backend_configured() {
                return Err(ScannerError::NotConfigured);
            }

            let db = self.database(config.db_path.trim()).await?;
            let reports: ScanReports = components
                .iter()
                .map(|id| (id.clone(), match_component(&db, id)))
                .collect();

            debug!(
                components = components.len(),
                vulnerable = reports.values().filter(|r| !r.issues.is_empty()).count(),
                "local db batch scanned"
            );
            Ok(reports)
        })
    }
}

/// 컴포넌트 하나를 DB와 대조합니다.
///
/// 알 수 없는 좌표 형식은 빈 보고서를 돌려줍니다.
pub fn match_component(db: &VulnDb, id: &ComponentId) -> ComponentReport {
    let (Some(ecosystem), Some((name, version))) = (Ecosystem::of(id), id.name_and_version())
    else {
        return ComponentReport::default();
    };

    let issues = db
        .lookup(name, ecosystem)
        .into_iter()
        .filter(|entry| version::is_affected(version, &entry.affected_ranges))
        .map(|entry| Issue {
            id: entry.id.clone(),
            component: id.to_string(),
            severity: entry.severity,
            summary: entry.summary.clone(),
            fixed_versions: entry.fixed_versions.clone(),
        })
        .collect();

    let prefix = id.prefix().unwrap_or_default();
    let licenses = db.licenses_for(&format!("{prefix}{name}")).to_vec();

    ComponentReport { licenses, issues }
}

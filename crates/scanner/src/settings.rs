//! 전역 설정 핸들
//!
//! [`GlobalSettings`]는 프로세스 전체가 공유하는 스캐너 설정과 애플리케이션 버스를
//! 묶습니다. 설정이 바뀌면 `ConfigurationChanged`를 발행해 모든 프로젝트의
//! 스캐너가 빠른 스캔을 트리거하도록 합니다.

use std::sync::{Arc, PoisonError, RwLock};

use tracing::info;

use depwatch_core::event::{ApplicationBus, ConfigurationChanged};

use crate::config::ScannerConfig;

/// 프로세스 전역 설정
#[derive(Debug)]
pub struct GlobalSettings {
    config: RwLock<Arc<ScannerConfig>>,
    bus: ApplicationBus,
}

impl GlobalSettings {
    /// 설정과 버스로 핸들을 생성합니다.
    pub fn new(config: ScannerConfig, bus: ApplicationBus) -> Self {
        Self {
            config: RwLock::new(Arc::new(config)),
            bus,
        }
    }

    /// 현재 설정 스냅샷
    pub fn current(&self) -> Arc<ScannerConfig> {
        Arc::clone(&self.config.read().unwrap_or_else(PoisonError::into_inner))
    }

    /// 백엔드가 설정되어 있는지 확인합니다.
    pub fn is_configured(&self) -> bool {
        self.current().is_backend_configured()
    }

    /// 설정을 교체하고 변경 알림을 발행합니다.
    ///
    /// 발행은 잠금을 놓은 뒤에 이루어지므로 구독자가 곧바로 `current()`를 불러도
    /// 새 설정을 봅니다.
    pub fn update(&self, config: ScannerConfig) -> usize {
        let configured = config.is_backend_configured();
        {
            let mut guard = self.config.write().unwrap_or_else(PoisonError::into_inner);
            *guard = Arc::new(config);
        }
        let receivers = self.bus.configuration.publish(ConfigurationChanged::new());
        info!(configured, receivers, "scanner settings updated");
        receivers
    }

    /// 애플리케이션 버스
    pub fn bus(&self) -> &ApplicationBus {
        &self.bus
    }
}

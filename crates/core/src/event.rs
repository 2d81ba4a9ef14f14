//! 이벤트 시스템 -- 트리거와 결과 알림의 전달 단위
//!
//! 모든 모듈 간 통신은 타입이 지정된 토픽([`Topic`])을 통한 메시지 패싱으로 수행됩니다.
//! 전역 디스패처는 없으며, 버스([`ApplicationBus`], [`ProjectBus`])를 명시적으로
//! 전달받은 컴포넌트만 발행/구독할 수 있습니다.
//!
//! 전달은 fire-and-forget입니다. 구독자가 없으면 메시지는 버려지고,
//! 느린 구독자는 `RecvError::Lagged`로 누락을 알게 됩니다.

use std::fmt;
use std::path::PathBuf;
use std::time::SystemTime;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::types::ProjectKey;

// --- 모듈명 상수 ---

/// 전역 설정 모듈명
pub const MODULE_SETTINGS: &str = "settings";
/// 파일 감시 모듈명
pub const MODULE_WATCHER: &str = "watcher";
/// 스캐너 모듈명
pub const MODULE_SCANNER: &str = "depwatch-scanner";

// --- 이벤트 타입 상수 ---

/// 설정 변경 이벤트 타입
pub const EVENT_TYPE_CONFIG: &str = "config";
/// 파일 변경 이벤트 타입
pub const EVENT_TYPE_FILES: &str = "files";

/// 토픽 기본 버퍼 크기
pub const DEFAULT_TOPIC_CAPACITY: usize = 256;

/// 이벤트 메타데이터 -- 모든 이벤트에 공통으로 포함되는 추적 정보
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventMetadata {
    /// 이벤트 발생 시각
    pub timestamp: SystemTime,
    /// 이벤트를 생성한 모듈명
    pub source_module: String,
    /// 추적 ID -- 같은 흐름의 이벤트를 연결합니다
    pub trace_id: String,
}

impl EventMetadata {
    /// 기존 trace_id를 사용하여 새 메타데이터를 생성합니다.
    pub fn new(source_module: impl Into<String>, trace_id: impl Into<String>) -> Self {
        Self {
            timestamp: SystemTime::now(),
            source_module: source_module.into(),
            trace_id: trace_id.into(),
        }
    }

    /// 새로운 UUID v4 trace_id를 생성하여 메타데이터를 만듭니다.
    pub fn with_new_trace(source_module: impl Into<String>) -> Self {
        Self::new(source_module, uuid::Uuid::new_v4().to_string())
    }
}

impl fmt::Display for EventMetadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let secs = self
            .timestamp
            .duration_since(SystemTime::UNIX_EPOCH)
            .map(|d| d.as_secs().to_string())
            .unwrap_or_else(|_| "unknown".to_owned());
        write!(
            f,
            "[{secs}] source={} trace={}",
            self.source_module, self.trace_id,
        )
    }
}

/// 트리거 이벤트가 구현하는 기본 trait
///
/// `Send + Sync + 'static` 바운드로 토픽을 통한 태스크 간 전송을 보장합니다.
pub trait Event: Send + Sync + 'static {
    /// 이벤트 고유 ID (UUID v4)
    fn event_id(&self) -> &str;

    /// 이벤트 메타데이터
    fn metadata(&self) -> &EventMetadata;

    /// 이벤트 타입명 (로깅에 사용)
    fn event_type(&self) -> &str;
}

/// 백엔드 자격 증명/설정 변경 알림
///
/// 프로세스 전역 토픽으로 발행되며, 모든 프로젝트의 모든 스캐너가 구독합니다.
#[derive(Debug, Clone)]
pub struct ConfigurationChanged {
    /// 이벤트 고유 ID
    pub id: String,
    /// 이벤트 메타데이터
    pub metadata: EventMetadata,
}

impl ConfigurationChanged {
    /// 새로운 trace를 시작하는 설정 변경 이벤트를 생성합니다.
    pub fn new() -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            metadata: EventMetadata::with_new_trace(MODULE_SETTINGS),
        }
    }
}

impl Default for ConfigurationChanged {
    fn default() -> Self {
        Self::new()
    }
}

impl Event for ConfigurationChanged {
    fn event_id(&self) -> &str {
        &self.id
    }

    fn metadata(&self) -> &EventMetadata {
        &self.metadata
    }

    fn event_type(&self) -> &str {
        EVENT_TYPE_CONFIG
    }
}

/// 파일 변경 배치
///
/// 프로젝트 버스로 발행됩니다. 각 스캐너는 자신이 감시하는 경로와
/// 정확히 일치하는 항목이 있을 때만 반응합니다.
#[derive(Debug, Clone)]
pub struct FilesChanged {
    /// 이벤트 고유 ID
    pub id: String,
    /// 이벤트 메타데이터
    pub metadata: EventMetadata,
    /// 변경된 파일 경로 목록
    pub paths: Vec<PathBuf>,
}

impl FilesChanged {
    /// 변경 경로 목록으로 이벤트를 생성합니다.
    pub fn new(paths: Vec<PathBuf>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            metadata: EventMetadata::with_new_trace(MODULE_WATCHER),
            paths,
        }
    }

    /// 주어진 경로가 배치에 정확히 포함되어 있는지 확인합니다.
    pub fn contains(&self, path: &std::path::Path) -> bool {
        self.paths.iter().any(|p| p == path)
    }
}

impl Event for FilesChanged {
    fn event_id(&self) -> &str {
        &self.id
    }

    fn metadata(&self) -> &EventMetadata {
        &self.metadata
    }

    fn event_type(&self) -> &str {
        EVENT_TYPE_FILES
    }
}

impl fmt::Display for FilesChanged {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "FilesChanged[{}] paths={}",
            &self.id[..8.min(self.id.len())],
            self.paths.len(),
        )
    }
}

/// 스캔 결과 변경 알림
///
/// 키 외의 페이로드는 없습니다. 구독자는 알림을 받으면 저장소에서 현재 상태를
/// 다시 읽어야 합니다.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProjectEvent {
    /// 이슈(취약점) 뷰가 갱신됨
    IssuesChanged(ProjectKey),
    /// 라이선스 뷰가 갱신됨
    LicensesChanged(ProjectKey),
}

impl ProjectEvent {
    /// 알림이 가리키는 프로젝트 키
    pub fn key(&self) -> &ProjectKey {
        match self {
            Self::IssuesChanged(key) | Self::LicensesChanged(key) => key,
        }
    }
}

impl fmt::Display for ProjectEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::IssuesChanged(key) => write!(f, "IssuesChanged({key})"),
            Self::LicensesChanged(key) => write!(f, "LicensesChanged({key})"),
        }
    }
}

/// 타입 지정 브로드캐스트 토픽
///
/// `tokio::sync::broadcast` 위의 얇은 래퍼입니다. 복제 비용이 낮아
/// 여러 컴포넌트가 같은 토픽 핸들을 공유할 수 있습니다.
#[derive(Debug)]
pub struct Topic<T: Clone> {
    name: &'static str,
    sender: broadcast::Sender<T>,
}

impl<T: Clone> Clone for Topic<T> {
    fn clone(&self) -> Self {
        Self {
            name: self.name,
            sender: self.sender.clone(),
        }
    }
}

impl<T: Clone + Send + 'static> Topic<T> {
    /// 이름과 버퍼 크기로 토픽을 생성합니다.
    pub fn new(name: &'static str, capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { name, sender }
    }

    /// 메시지를 발행하고 수신한 구독자 수를 반환합니다.
    ///
    /// 구독자가 없으면 0을 반환하며 메시지는 버려집니다.
    pub fn publish(&self, message: T) -> usize {
        match self.sender.send(message) {
            Ok(receivers) => receivers,
            Err(_) => {
                tracing::trace!(topic = self.name, "no subscribers, message dropped");
                0
            }
        }
    }

    /// 새 구독을 만듭니다. 구독 이후 발행된 메시지만 수신합니다.
    pub fn subscribe(&self) -> broadcast::Receiver<T> {
        self.sender.subscribe()
    }

    /// 현재 구독자 수
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// 토픽 이름
    pub fn name(&self) -> &'static str {
        self.name
    }
}

/// 프로세스 전역 버스
#[derive(Debug, Clone)]
pub struct ApplicationBus {
    /// 백엔드 설정 변경
    pub configuration: Topic<ConfigurationChanged>,
}

impl ApplicationBus {
    pub fn new() -> Self {
        Self {
            configuration: Topic::new("configuration-changed", DEFAULT_TOPIC_CAPACITY),
        }
    }
}

impl Default for ApplicationBus {
    fn default() -> Self {
        Self::new()
    }
}

/// 프로젝트 단위 버스
#[derive(Debug, Clone)]
pub struct ProjectBus {
    /// 파일 변경 배치
    pub files: Topic<FilesChanged>,
    /// 스캔 결과 변경 알림
    pub results: Topic<ProjectEvent>,
}

impl ProjectBus {
    pub fn new() -> Self {
        Self {
            files: Topic::new("files-changed", DEFAULT_TOPIC_CAPACITY),
            results: Topic::new("scan-results-changed", DEFAULT_TOPIC_CAPACITY),
        }
    }
}

impl Default for ProjectBus {
    fn default() -> Self {
        Self::new()
    }
}

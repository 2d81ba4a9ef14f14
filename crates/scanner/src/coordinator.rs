//! 단일 실행 스캔 조정
//!
//! [`ScanCoordinator`]는 스캐너당 하나의 스캔만 진행되도록 보장합니다.
//! 잠금은 원자적 compare-and-swap으로 획득하며, 완료, 실패, 취소 어느 경로로
//! 끝나든 [`ScanGuard`]가 drop될 때 해제됩니다. 파이프라인 태스크가 중단(abort)되어
//! future가 drop되는 경우도 같습니다. 워크스페이스 프로필은 `panic = "abort"`이므로
//! 패닉은 언와인드 없이 프로세스를 종료합니다.
//!
//! 스캔 세대(generation)는 잠금 획득과 취소 때마다 증가합니다. 파이프라인은
//! 발행 직전에 자신의 세대가 여전히 최신인지 확인해, 취소된 실행의 결과가
//! 발행되지 않게 합니다.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tokio_util::sync::CancellationToken;
use tracing::trace;

use crate::types::ScanState;

/// 스캐너별 스캔 조정기
#[derive(Debug)]
pub struct ScanCoordinator {
    in_progress: AtomicBool,
    generation: AtomicU64,
    state: Mutex<ScanState>,
    current: Mutex<Option<CancellationToken>>,
    parent: CancellationToken,
}

impl ScanCoordinator {
    /// 프로젝트 토큰 아래에 조정기를 만듭니다.
    ///
    /// 각 스캔은 `parent`의 자식 토큰을 받으므로 프로젝트가 닫히면 진행 중인
    /// 스캔도 취소됩니다.
    pub fn new(parent: CancellationToken) -> Self {
        Self {
            in_progress: AtomicBool::new(false),
            generation: AtomicU64::new(0),
            state: Mutex::new(ScanState::Idle),
            current: Mutex::new(None),
            parent,
        }
    }

    /// 잠금 획득을 시도합니다. 이미 진행 중이면 `None`.
    pub fn try_begin(self: &Arc<Self>) -> Option<ScanGuard> {
        self.in_progress
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()?;

        let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
        let token = self.parent.child_token();
        *self.current.lock().unwrap_or_else(PoisonError::into_inner) = Some(token.clone());
        self.set_state(ScanState::Refreshing);
        trace!(generation, "scan lock acquired");

        Some(ScanGuard {
            coordinator: Arc::clone(self),
            generation,
            token,
        })
    }

    /// 진행 중인 스캔을 취소하고 세대를 무효화합니다.
    pub fn cancel(&self) {
        self.generation.fetch_add(1, Ordering::AcqRel);
        if let Some(token) = self
            .current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
        {
            token.cancel();
        }
    }

    /// 주어진 세대가 최신인지 확인합니다.
    pub fn is_current(&self, generation: u64) -> bool {
        self.generation.load(Ordering::Acquire) == generation
    }

    /// 스캔이 진행 중인지 확인합니다.
    pub fn is_running(&self) -> bool {
        self.in_progress.load(Ordering::Acquire)
    }

    /// 현재 상태
    pub fn state(&self) -> ScanState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_state(&self, state: ScanState) {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = state;
    }

    fn release(&self) {
        self.current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        self.set_state(ScanState::Idle);
        self.in_progress.store(false, Ordering::Release);
    }
}

/// 스캔 잠금 가드
///
/// 파이프라인 태스크가 소유하며 drop 시 잠금을 해제합니다.
#[derive(Debug)]
pub struct ScanGuard {
    coordinator: Arc<ScanCoordinator>,
    generation: u64,
    token: CancellationToken,
}

impl ScanGuard {
    /// 이 실행의 세대
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// 이 실행의 취소 토큰
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// 취소되었거나 세대가 밀려났는지 확인합니다.
    pub fn is_stale(&self) -> bool {
        self.token.is_cancelled() || !self.coordinator.is_current(self.generation)
    }

    /// 단계를 기록합니다.
    pub fn enter(&self, state: ScanState) {
        self.coordinator.set_state(state);
    }
}

impl Drop for ScanGuard {
    fn drop(&mut self) {
        self.coordinator.release();
        trace!(generation = self.generation, "scan lock released");
    }
}

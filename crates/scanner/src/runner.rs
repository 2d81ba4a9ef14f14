//! 포그라운드/백그라운드 태스크 분리
//!
//! [`TaskRunner`]는 단일 포그라운드 태스크(큐 소비자)를 소유합니다. 스캔 진행 보고는
//! 포그라운드에서 시작되어야 하므로, 백그라운드 파이프라인 제출은 항상
//! 포그라운드를 거칩니다.
//!
//! - 포그라운드에서 호출되면 백그라운드 태스크를 바로 spawn 합니다.
//! - 그 외의 컨텍스트에서 호출되면 포그라운드 큐에 먼저 게시하고, 포그라운드가
//!   백그라운드 태스크를 spawn 합니다.
//!
//! 각 백그라운드 태스크는 `scan_progress` span 아래에서 실행됩니다.

use std::future::Future;
use std::sync::{Mutex, PoisonError};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{Instrument, debug, info_span, warn};

tokio::task_local! {
    static FOREGROUND: ();
}

type Job = Box<dyn FnOnce() + Send>;

/// 포그라운드 큐와 백그라운드 spawn을 담당하는 실행기
#[derive(Debug)]
pub struct TaskRunner {
    queue: Mutex<Option<mpsc::UnboundedSender<Job>>>,
    consumer: Mutex<Option<JoinHandle<()>>>,
}

impl TaskRunner {
    /// 포그라운드 소비자 태스크를 시작합니다.
    ///
    /// tokio 런타임 안에서 호출해야 합니다.
    pub fn start() -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<Job>();
        let consumer = tokio::spawn(FOREGROUND.scope((), async move {
            while let Some(job) = rx.recv().await {
                job();
            }
            debug!("foreground queue closed");
        }));

        Self {
            queue: Mutex::new(Some(tx)),
            consumer: Mutex::new(Some(consumer)),
        }
    }

    /// 현재 실행 컨텍스트가 포그라운드인지 확인합니다.
    pub fn is_foreground() -> bool {
        FOREGROUND.try_with(|_| ()).is_ok()
    }

    /// 백그라운드 태스크를 제출합니다.
    ///
    /// 제출에 실패하면(러너 종료 후) `false`를 반환하며 future는 실행되지 않고
    /// drop 됩니다.
    pub fn submit_background<F>(&self, title: impl Into<String>, task: F) -> bool
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let title = title.into();
        let task = task.instrument(info_span!("scan_progress", title = %title));

        if Self::is_foreground() {
            tokio::spawn(task);
            return true;
        }

        let job: Job = Box::new(move || {
            tokio::spawn(task);
        });
        let queue = self.queue.lock().unwrap_or_else(PoisonError::into_inner);
        match queue.as_ref() {
            Some(tx) => match tx.send(job) {
                Ok(()) => true,
                Err(_) => {
                    warn!(title, "foreground queue closed, background task dropped");
                    false
                }
            },
            None => {
                warn!(title, "task runner shut down, background task dropped");
                false
            }
        }
    }

    /// 큐를 닫고 포그라운드 태스크가 남은 작업을 처리할 때까지 기다립니다.
    ///
    /// 이미 spawn된 백그라운드 태스크는 기다리지 않습니다.
    pub async fn shutdown(&self) {
        drop(
            self.queue
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .take(),
        );
        let consumer = self
            .consumer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = consumer
            && let Err(e) = handle.await
        {
            warn!(error = %e, "foreground task terminated abnormally");
        }
    }
}

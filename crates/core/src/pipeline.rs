//! 파이프라인 확장 포인트 공용 타입

use std::future::Future;
use std::pin::Pin;

/// dyn-compatible 비동기 trait 메서드의 반환 타입
///
/// RPITIT를 쓰는 trait은 `dyn`으로 쓸 수 없으므로, 리졸버와 백엔드처럼
/// `Arc<dyn ...>`로 교체 가능해야 하는 확장 포인트는 이 타입을 반환합니다.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

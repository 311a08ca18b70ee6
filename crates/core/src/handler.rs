//! 핸들러 디스패치 계약 — 업스트림이 이벤트를 라우팅하는 통일 인터페이스
//!
//! 업스트림 디스패처는 각 이벤트를, 선언한 이벤트 타입 집합이 일치하는
//! 모든 등록 핸들러에 전달합니다. 계약은 fire-and-forget입니다:
//! 핸들러의 반환값은 로컬 실패만을 의미하며, 다른 핸들러로의 디스패치는
//! 계속됩니다.

use std::future::Future;
use std::pin::Pin;

use crate::error::EvetapError;
use crate::event::{EVENT_TYPE_WILDCARD, EveEvent};

/// dyn-compatible Future 타입 별칭
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// 모든 이벤트 핸들러가 구현하는 계약
///
/// 핸들러는 디스패처의 여러 태스크에서 동시에 호출될 수 있으므로
/// 내부적으로 스레드 안전해야 합니다 (`&self` 수신자 + 내부 동기화).
///
/// # 구현 예시
/// ```ignore
/// struct CountingHandler { seen: AtomicU64 }
///
/// impl Handler for CountingHandler {
///     fn name(&self) -> &'static str { "counting" }
///
///     fn event_types(&self) -> Vec<String> {
///         vec!["*".to_owned()]
///     }
///
///     fn consume<'a>(&'a self, _event: &'a mut EveEvent)
///         -> BoxFuture<'a, Result<(), EvetapError>>
///     {
///         Box::pin(async move {
///             self.seen.fetch_add(1, Ordering::Relaxed);
///             Ok(())
///         })
///     }
/// }
/// ```
pub trait Handler: Send + Sync {
    /// 진단용 핸들러 이름
    fn name(&self) -> &'static str;

    /// 이 핸들러가 수신을 원하는 이벤트 타입 집합
    ///
    /// 센티널 `"*"`는 "모든 타입"을 의미하며, 디스패처는 이를 존중해야
    /// 합니다.
    fn event_types(&self) -> Vec<String>;

    /// 이벤트 한 건을 처리합니다.
    ///
    /// 레코드를 변경하거나 다운스트림 이벤트를 합성할 수 있습니다.
    /// 바운드 없는 I/O 블로킹은 허용되지 않습니다 (바운드 큐 전송 제외).
    fn consume<'a>(&'a self, event: &'a mut EveEvent) -> BoxFuture<'a, Result<(), EvetapError>>;

    /// 주어진 이벤트 타입을 이 핸들러가 수신하는지 확인합니다.
    fn wants(&self, event_type: &str) -> bool {
        self.event_types()
            .iter()
            .any(|t| t == EVENT_TYPE_WILDCARD || t == event_type)
    }
}

//! 이벤트 디스패처 — 이벤트를 등록된 핸들러로 라우팅
//!
//! 각 이벤트를, 선언한 이벤트 타입 집합이 일치하는 모든 핸들러에
//! 순서대로 전달합니다. 와일드카드 `"*"`를 선언한 핸들러는 모든
//! 이벤트를 받습니다. 핸들러 실패는 로컬 실패로 취급되어 경고만
//! 남기고 다음 핸들러로 계속 진행합니다.

use std::sync::Arc;

use evetap_core::event::EveEvent;
use evetap_core::handler::Handler;

/// 이벤트 디스패처
///
/// # 사용 예시
/// ```ignore
/// let mut dispatcher = EventDispatcher::new();
/// dispatcher.register(forward_handler.clone());
/// dispatcher.register(bloom_handler);
///
/// while let Some(mut event) = ingest_rx.recv().await {
///     dispatcher.dispatch(&mut event).await;
/// }
/// ```
pub struct EventDispatcher {
    handlers: Vec<Arc<dyn Handler>>,
}

impl EventDispatcher {
    /// 빈 디스패처를 생성합니다.
    pub fn new() -> Self {
        Self {
            handlers: Vec::new(),
        }
    }

    /// 핸들러를 등록합니다.
    pub fn register(&mut self, handler: Arc<dyn Handler>) {
        tracing::debug!(handler = handler.name(), types = ?handler.event_types(), "handler registered");
        self.handlers.push(handler);
    }

    /// 등록된 핸들러 수를 반환합니다.
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// 핸들러가 하나도 없는지 확인합니다.
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// 이벤트 한 건을 모든 매칭 핸들러에 전달합니다.
    pub async fn dispatch(&self, event: &mut EveEvent) {
        for handler in &self.handlers {
            if !handler.wants(&event.event_type) {
                continue;
            }
            if let Err(e) = handler.consume(event).await {
                tracing::warn!(
                    handler = handler.name(),
                    error = %e,
                    "handler failed to consume event"
                );
            }
        }
    }
}

impl Default for EventDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};

    use evetap_core::error::{EvetapError, PipelineError};
    use evetap_core::handler::BoxFuture;

    struct Counting {
        types: Vec<String>,
        seen: AtomicU64,
        fail: bool,
    }

    impl Counting {
        fn new(types: &[&str], fail: bool) -> Arc<Self> {
            Arc::new(Self {
                types: types.iter().map(|t| (*t).to_owned()).collect(),
                seen: AtomicU64::new(0),
                fail,
            })
        }
    }

    impl Handler for Counting {
        fn name(&self) -> &'static str {
            "counting"
        }

        fn event_types(&self) -> Vec<String> {
            self.types.clone()
        }

        fn consume<'a>(
            &'a self,
            _event: &'a mut EveEvent,
        ) -> BoxFuture<'a, Result<(), EvetapError>> {
            Box::pin(async move {
                self.seen.fetch_add(1, Ordering::Relaxed);
                if self.fail {
                    Err(EvetapError::Pipeline(PipelineError::Handler(
                        "intentional".to_owned(),
                    )))
                } else {
                    Ok(())
                }
            })
        }
    }

    fn event_of(event_type: &str) -> EveEvent {
        EveEvent {
            event_type: event_type.to_owned(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn dispatch_routes_by_declared_types() {
        let http_only = Counting::new(&["http"], false);
        let dns_only = Counting::new(&["dns"], false);

        let mut dispatcher = EventDispatcher::new();
        dispatcher.register(http_only.clone());
        dispatcher.register(dns_only.clone());

        dispatcher.dispatch(&mut event_of("http")).await;
        dispatcher.dispatch(&mut event_of("http")).await;
        dispatcher.dispatch(&mut event_of("dns")).await;

        assert_eq!(http_only.seen.load(Ordering::Relaxed), 2);
        assert_eq!(dns_only.seen.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn wildcard_handler_receives_everything() {
        let all = Counting::new(&["*"], false);
        let mut dispatcher = EventDispatcher::new();
        dispatcher.register(all.clone());

        for event_type in ["http", "dns", "tls", "flow", "fileinfo"] {
            dispatcher.dispatch(&mut event_of(event_type)).await;
        }
        assert_eq!(all.seen.load(Ordering::Relaxed), 5);
    }

    #[tokio::test]
    async fn handler_failure_does_not_halt_dispatch() {
        let failing = Counting::new(&["*"], true);
        let healthy = Counting::new(&["*"], false);

        let mut dispatcher = EventDispatcher::new();
        dispatcher.register(failing.clone());
        dispatcher.register(healthy.clone());

        dispatcher.dispatch(&mut event_of("http")).await;

        // 첫 핸들러가 실패해도 두 번째는 호출됨
        assert_eq!(failing.seen.load(Ordering::Relaxed), 1);
        assert_eq!(healthy.seen.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn register_and_len() {
        let mut dispatcher = EventDispatcher::default();
        assert!(dispatcher.is_empty());
        dispatcher.register(Counting::new(&["http"], false));
        assert_eq!(dispatcher.len(), 1);
    }
}

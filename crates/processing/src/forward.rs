//! 전달 엔진 — 이벤트 스트림을 unix 소켓에 개행 구분 JSON으로 기록
//!
//! [`ForwardHandler`]는 동시 이벤트 스트림을 다운스트림 소켓으로
//! 직렬화합니다. 싱크 재시작을 재연결 루프로 버티며, 그동안
//! 프로듀서를 블로킹하지 않습니다 (재연결 중 페이로드는 버려집니다 —
//! 재시도 버퍼는 없습니다).
//!
//! # 내부 아키텍처
//! ```text
//! consume() -> bounded mpsc(10000) -> writer task -> UnixStream
//!                                        |              ^
//!                                   write error    reconnector task
//!                                        v              |
//!                                  reconnect request ---+
//!
//! counter task: 500ms 주기로 처리량 스냅샷 -> PerformanceStatsEncoder
//! ```
//!
//! # 락 규칙
//! - 소켓 락([`ConnState`]): 페이로드+개행 기록 한 시퀀스 또는 카운터
//!   스냅샷 한 번 동안만 보유. 재연결 다이얼이나 통계 제출 중에는
//!   절대 보유하지 않습니다.
//! - 재연결 플래그: 원자적 test-and-set으로만 접근합니다.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use bytes::Bytes;
use tokio::io::AsyncWriteExt;
use tokio::net::UnixStream;
use tokio::sync::{Mutex, mpsc, oneshot};
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use evetap_core::config::ForwardConfig;
use evetap_core::error::{EvetapError, PipelineError};
use evetap_core::event::{EVENT_TYPE_WILDCARD, EveEvent};
use evetap_core::handler::{BoxFuture, Handler};
use evetap_core::metrics::FORWARD_RECONNECTS_TOTAL;
use evetap_core::stats::{ForwardStats, PerformanceStatsEncoder};

use crate::connector::{ContextCollector, RdnsEnricher, StenosisConnector};
use crate::error::ProcessingError;
use crate::json::escape_string;

/// 전달 큐 용량
pub const FORWARD_QUEUE_CAPACITY: usize = 10_000;

/// 재연결 재시도 간격
const RECONNECT_RETRY_DELAY: Duration = Duration::from_secs(10);

/// 카운터 태스크 틱 간격
const COUNTER_TICK: Duration = Duration::from_millis(500);

/// 소켓 락이 보호하는 상태: 라이브 소켓 핸들과 주기당 전달 카운터
struct ConnState {
    socket: Option<UnixStream>,
    forwarded: u64,
}

/// 실행 중 태스크의 정지 신호 묶음
struct Shutdown {
    stop_writer: CancellationToken,
    stop_counter: CancellationToken,
    stop_reconnect: CancellationToken,
    counter_ack: oneshot::Receiver<()>,
}

/// 전달 핸들러
///
/// 허용 목록에 있는 타입의 이벤트를 받아 JSON 표현을 바운드 큐에
/// 넣습니다. 인큐는 바운드-블로킹입니다: 큐가 가득 차면 프로듀서가
/// 잠시 대기합니다.
///
/// 선택 기능(`enable_rdns`, `add_fields`, `enable_stenosis`,
/// `submit_stats`, `set_context_collector`)은 [`run`](Self::run) 전에
/// 설정하는 것을 전제로 합니다.
pub struct ForwardHandler {
    config: ForwardConfig,
    /// 미리 렌더링된 added-fields 프래그먼트. 필드가 없으면 `"}"`.
    added_fields: String,
    rdns: Option<Arc<dyn RdnsEnricher>>,
    stenosis: Option<Arc<dyn StenosisConnector>>,
    context: Option<Arc<dyn ContextCollector>>,
    stats: Option<Arc<dyn PerformanceStatsEncoder>>,
    conn: Arc<Mutex<ConnState>>,
    reconnecting: Arc<AtomicBool>,
    running: AtomicBool,
    queue_tx: Mutex<Option<mpsc::Sender<Bytes>>>,
    reconnect_tx: Mutex<Option<mpsc::Sender<()>>>,
    shutdown: Mutex<Option<Shutdown>>,
    writer_ack: Arc<Mutex<Option<oneshot::Sender<()>>>>,
}

impl ForwardHandler {
    /// 새 전달 핸들러를 생성합니다.
    ///
    /// 설정을 검증하고 `config.added_fields`에서 스플라이스
    /// 프래그먼트를 미리 렌더링합니다.
    pub fn new(config: ForwardConfig) -> Result<Self, EvetapError> {
        config.validate()?;
        let added_fields = render_added_fields(&config.added_fields)?;

        Ok(Self {
            config,
            added_fields,
            rdns: None,
            stenosis: None,
            context: None,
            stats: None,
            conn: Arc::new(Mutex::new(ConnState {
                socket: None,
                forwarded: 0,
            })),
            reconnecting: Arc::new(AtomicBool::new(false)),
            running: AtomicBool::new(false),
            queue_tx: Mutex::new(None),
            reconnect_tx: Mutex::new(None),
            shutdown: Mutex::new(None),
            writer_ack: Arc::new(Mutex::new(None)),
        })
    }

    /// 전달되는 모든 이벤트에 주입할 최상위 필드를 교체합니다.
    ///
    /// 어떤 키/값이든 이스케이프에 실패하면 전체가 실패하며, 이전
    /// 프래그먼트가 그대로 유지됩니다.
    pub fn add_fields(&mut self, fields: &HashMap<String, String>) -> Result<(), ProcessingError> {
        self.added_fields = render_added_fields(fields)?;
        Ok(())
    }

    /// 나가는 이벤트에 대한 역방향 DNS 보강을 켭니다.
    pub fn enable_rdns(&mut self, enricher: Arc<dyn RdnsEnricher>) {
        self.rdns = Some(enricher);
    }

    /// 트래픽 캡처 커넥터를 연결합니다.
    ///
    /// 인터페이스 필터는 `config.stenosis.iface`를 따릅니다. 설정에
    /// stenosis 섹션이 없으면 커넥터는 사용되지 않습니다.
    pub fn enable_stenosis(&mut self, connector: Arc<dyn StenosisConnector>) {
        if self.config.stenosis.is_none() {
            tracing::warn!("stenosis connector set without stenosis config, ignoring");
            return;
        }
        self.stenosis = Some(connector);
    }

    /// 플로우 컨텍스트 수집기를 연결합니다.
    pub fn set_context_collector(&mut self, collector: Arc<dyn ContextCollector>) {
        self.context = Some(collector);
    }

    /// 런타임 통계 제출용 인코더를 등록합니다.
    pub fn submit_stats(&mut self, encoder: Arc<dyn PerformanceStatsEncoder>) {
        self.stats = Some(encoder);
    }

    /// 엔진이 실행 중인지 확인합니다.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// 전달을 시작합니다.
    ///
    /// 큐와 제어 채널을 할당하고 재연결/기록/카운터 태스크를 띄운 뒤,
    /// 최초 연결을 위한 재연결 요청 한 건을 보냅니다. 이미 실행
    /// 중이면 아무 일도 하지 않습니다 (멱등).
    pub fn run(&mut self) {
        if self.running.load(Ordering::Acquire) {
            return;
        }

        let (queue_tx, queue_rx) = mpsc::channel::<Bytes>(FORWARD_QUEUE_CAPACITY);
        let (reconnect_tx, reconnect_rx) = mpsc::channel::<()>(1);
        let (counter_ack_tx, counter_ack_rx) = oneshot::channel::<()>();

        let stop_writer = CancellationToken::new();
        let stop_counter = CancellationToken::new();
        let stop_reconnect = CancellationToken::new();

        tokio::spawn(run_reconnector(
            Arc::clone(&self.conn),
            Arc::clone(&self.reconnecting),
            self.config.socket.clone(),
            self.config.reconnect_times,
            reconnect_rx,
            stop_reconnect.clone(),
        ));

        // 최초 연결은 재연결 경로로 수립
        let _ = reconnect_tx.try_send(());

        tokio::spawn(run_writer(
            queue_rx,
            Arc::clone(&self.conn),
            Arc::clone(&self.reconnecting),
            reconnect_tx.clone(),
            stop_writer.clone(),
            Arc::clone(&self.writer_ack),
        ));

        tokio::spawn(run_counter(
            Arc::clone(&self.conn),
            self.stats.clone(),
            stop_counter.clone(),
            counter_ack_tx,
        ));

        *self.queue_tx.get_mut() = Some(queue_tx);
        *self.reconnect_tx.get_mut() = Some(reconnect_tx);
        *self.shutdown.get_mut() = Some(Shutdown {
            stop_writer,
            stop_counter,
            stop_reconnect,
            counter_ack: counter_ack_rx,
        });

        self.running.store(true, Ordering::Release);
        tracing::info!(socket = %self.config.socket, "forward engine started");
    }

    /// 전달을 정지합니다.
    ///
    /// 카운터를 멈추고 확인을 기다린 뒤, `ack`를 writer의 종료
    /// 채널로 저장하고 소켓/재연결 루프/큐를 차례로 닫습니다. writer는
    /// 정지를 관찰하면 `ack`를 통해 종료를 알립니다. 두 번째 호출은
    /// no-op입니다.
    pub async fn stop(&self, ack: oneshot::Sender<()>) {
        if !self.running.swap(false, Ordering::AcqRel) {
            return;
        }

        let Some(shutdown) = self.shutdown.lock().await.take() else {
            return;
        };

        shutdown.stop_counter.cancel();
        let _ = shutdown.counter_ack.await;

        *self.writer_ack.lock().await = Some(ack);

        {
            let mut state = self.conn.lock().await;
            state.socket = None;
        }

        shutdown.stop_reconnect.cancel();
        shutdown.stop_writer.cancel();

        *self.queue_tx.lock().await = None;
        *self.reconnect_tx.lock().await = None;

        tracing::info!("forward engine stopped");
    }

    /// 이벤트 한 건을 전달 경로로 처리합니다.
    ///
    /// 전달 대상이 아니면 즉시 반환합니다. 전달 이벤트에 대한 부수
    /// 효과: 알림이면 컨텍스트 수집기에 플로우 표시, RDNS 보강 (에러
    /// 전파), added-fields 스플라이스, stenosis 인계 또는 인큐 +
    /// 카운터 증가.
    async fn forward_event(&self, event: &mut EveEvent) -> Result<(), EvetapError> {
        if !self.config.allows(&event.event_type) {
            return Ok(());
        }

        // 알림이 보이면 해당 플로우를 관련 플로우로 표시
        if event.is_alert()
            && let Some(collector) = &self.context
        {
            collector.mark(&event.flow_id);
        }

        if let Some(rdns) = &self.rdns {
            rdns.enrich(event).await?;
        }

        // json_line의 마지막 '}'를 미리 렌더링한 프래그먼트로 교체.
        // 길이 1이면 added fields가 없다는 뜻이므로 건드리지 않음.
        if self.added_fields.len() > 1 && event.json_line.ends_with('}') {
            event.json_line.truncate(event.json_line.len() - 1);
            event.json_line.push_str(&self.added_fields);
        }

        // stenosis를 쓰는 경우, 매칭되는 알림은 커넥터가 소유권을 가짐
        let stenosis_takes = match (&self.stenosis, &self.config.stenosis) {
            (Some(_), Some(cfg)) => {
                event.is_alert()
                    && (cfg.iface == EVENT_TYPE_WILDCARD || event.iface == cfg.iface)
            }
            _ => false,
        };

        if stenosis_takes {
            if let Some(connector) = &self.stenosis {
                connector.accept(event.clone()).await;
            }
            return Ok(());
        }

        let tx = self.queue_tx.lock().await.clone();
        match tx {
            Some(tx) => {
                tx.send(Bytes::from(event.json_line.clone()))
                    .await
                    .map_err(|e| PipelineError::ChannelSend(e.to_string()))?;
                let mut state = self.conn.lock().await;
                state.forwarded += 1;
            }
            None => {
                tracing::debug!(event_type = %event.event_type, "forward engine not running, dropping event");
            }
        }
        Ok(())
    }
}

impl Handler for ForwardHandler {
    fn name(&self) -> &'static str {
        "forward"
    }

    fn event_types(&self) -> Vec<String> {
        if self.config.forward_all {
            vec![EVENT_TYPE_WILDCARD.to_owned()]
        } else {
            self.config.allowed_types.clone()
        }
    }

    fn consume<'a>(&'a self, event: &'a mut EveEvent) -> BoxFuture<'a, Result<(), EvetapError>> {
        Box::pin(self.forward_event(event))
    }
}

/// added-fields 스플라이스 프래그먼트를 렌더링합니다.
///
/// `{k: v}` 맵에서 `, "k":"v", ...}` 형태의 문자열을 만듭니다. 빈
/// 맵은 `"}"`만 냅니다. 이 프래그먼트는 이벤트 JSON의 마지막 중괄호를
/// O(1)로 교체하는 데 쓰입니다.
fn render_added_fields(fields: &HashMap<String, String>) -> Result<String, ProcessingError> {
    let mut fragment = String::new();
    for (key, value) in fields {
        let key = escape_string(key)?;
        let value = escape_string(value)?;
        fragment.push(',');
        fragment.push_str(&key);
        fragment.push(':');
        fragment.push_str(&value);
    }
    fragment.push('}');
    Ok(fragment)
}

/// writer 태스크 — 큐를 드레인하여 소켓에 기록합니다.
///
/// 재연결 진행 중에 관찰된 페이로드는 버려집니다. 페이로드와 뒤따르는
/// 개행은 소켓 락을 쥔 채 연달아 기록되므로 서로 끼어들지 않습니다.
async fn run_writer(
    mut queue_rx: mpsc::Receiver<Bytes>,
    conn: Arc<Mutex<ConnState>>,
    reconnecting: Arc<AtomicBool>,
    reconnect_tx: mpsc::Sender<()>,
    stop: CancellationToken,
    ack_slot: Arc<Mutex<Option<oneshot::Sender<()>>>>,
) {
    loop {
        let payload = tokio::select! {
            biased;
            _ = stop.cancelled() => break,
            item = queue_rx.recv() => match item {
                Some(payload) => payload,
                None => break,
            },
        };

        // 재연결 중에는 페이로드를 버림
        if reconnecting.load(Ordering::Acquire) {
            continue;
        }

        let mut state = conn.lock().await;
        let Some(socket) = state.socket.as_mut() else {
            continue;
        };

        let result = async {
            socket.write_all(&payload).await?;
            socket.write_all(b"\n").await
        }
        .await;

        if let Err(e) = result {
            state.socket = None;
            drop(state);
            tracing::warn!(error = %e, "write to output socket failed");
            let _ = reconnect_tx.try_send(());
        }
    }

    if let Some(ack) = ack_slot.lock().await.take() {
        let _ = ack.send(());
    }
}

/// reconnector 태스크 — 재연결 요청을 처리합니다.
///
/// 요청이 중복되면 한 번의 다이얼 캠페인으로 합칩니다. 다이얼 실패는
/// 10초 간격으로 `reconnect_times`회까지 재시도하며 (0이면 무한),
/// 소진되면 프로세스를 종료합니다 — 정책상 싱크 불가 상태는 조용한
/// 부분 동작보다 시끄러운 실패가 낫습니다.
async fn run_reconnector(
    conn: Arc<Mutex<ConnState>>,
    reconnecting: Arc<AtomicBool>,
    socket_path: String,
    reconnect_times: u32,
    mut reconnect_rx: mpsc::Receiver<()>,
    stop: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;
            _ = stop.cancelled() => return,
            request = reconnect_rx.recv() => {
                if request.is_none() {
                    return;
                }
            }
        }

        // 이미 재연결 중이면 요청 무시 (중복 제거)
        if reconnecting
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            continue;
        }

        tracing::info!(socket = %socket_path, "reconnecting to forwarding socket");
        metrics::counter!(FORWARD_RECONNECTS_TOTAL).increment(1);

        let mut attempts: u32 = 0;
        let socket = loop {
            match UnixStream::connect(&socket_path).await {
                Ok(socket) => break socket,
                Err(e) => {
                    if reconnect_times != 0 && attempts >= reconnect_times {
                        tracing::error!(
                            retries = attempts,
                            error = %e,
                            "permanent error connecting to output socket"
                        );
                        std::process::exit(1);
                    }
                    attempts += 1;
                    tracing::warn!(
                        retry = attempts,
                        max_retries = reconnect_times,
                        error = %e,
                        "error connecting to output socket, retrying"
                    );
                    tokio::select! {
                        _ = stop.cancelled() => return,
                        _ = tokio::time::sleep(RECONNECT_RETRY_DELAY) => {}
                    }
                }
            }
        };

        if attempts > 0 {
            tracing::info!(retry_attempts = attempts, "connection to output socket successful");
        }

        {
            let mut state = conn.lock().await;
            state.socket = Some(socket);
        }

        // 이번 캠페인 동안 쌓인 요청은 이미 처리된 것이므로 비움
        while reconnect_rx.try_recv().is_ok() {}
        reconnecting.store(false, Ordering::Release);
    }
}

/// counter 태스크 — 주기적으로 처리량 스냅샷을 제출합니다.
///
/// 제출이 느리더라도 프로듀서를 막지 않도록, 락을 쥔 동안에는
/// 스냅샷과 리셋만 수행하고 제출은 락을 푼 뒤에 합니다.
async fn run_counter(
    conn: Arc<Mutex<ConnState>>,
    stats: Option<Arc<dyn PerformanceStatsEncoder>>,
    stop: CancellationToken,
    ack: oneshot::Sender<()>,
) {
    let mut ticker = tokio::time::interval(COUNTER_TICK);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut period_start = Instant::now();

    loop {
        tokio::select! {
            biased;
            _ = stop.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let Some(encoder) = stats.as_ref() else {
            continue;
        };
        let period = encoder.submit_period();
        if period_start.elapsed() < period {
            continue;
        }

        let snapshot = {
            let mut state = conn.lock().await;
            let forwarded = state.forwarded;
            state.forwarded = 0;
            ForwardStats {
                forwarded_per_sec: forwarded / period.as_secs().max(1),
            }
        };

        encoder.submit(snapshot);
        period_start = Instant::now();
    }

    let _ = ack.send(());
}

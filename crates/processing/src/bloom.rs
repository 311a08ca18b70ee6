//! Bloom 스크리닝 핸들러 — 이벤트 필드를 인디케이터 필터에 대조
//!
//! http/dns/tls 이벤트에서 추출한 값(호스트, URL, 질의 이름, SNI)이
//! 필터에 히트하면 alert 이벤트를 합성하여 데이터베이스 채널로 먼저
//! 보내고, 이어서 전달 핸들러에 넘깁니다. 블록리스트에 있는
//! 인디케이터는 알림 발생이 억제됩니다.
//!
//! 핸들러 뮤텍스는 이벤트 한 건의 스크리닝 전체 동안 유지되므로,
//! 동시 [`reload`](BloomHandler::reload)가 반쯤 적용된 필터를 관찰하는
//! 일은 없습니다.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::{Mutex, mpsc};
use url::Url;

use evetap_core::config::{BloomConfig, ForwardConfig};
use evetap_core::error::{EvetapError, PipelineError};
use evetap_core::event::{
    DNS_TYPE_ANSWER, DNS_TYPE_QUERY, EVENT_TYPE_ALERT, EVENT_TYPE_DNS, EVENT_TYPE_HTTP,
    EVENT_TYPE_TLS, EveEvent,
};
use evetap_core::handler::{BoxFuture, Handler};
use evetap_core::metrics::{BLOOM_ALERTS_TOTAL, BLOOM_RELOADS_TOTAL, LABEL_HIT_KIND};
use evetap_filter::{BloomFilter, FilterError, load_filter};

use crate::alert::{HitKind, make_alert_for_hit};
use crate::error::ProcessingError;

/// 대체용 빈 기본 필터의 용량
pub const DEFAULT_FILTER_CAPACITY: usize = 100;

/// 대체용 빈 기본 필터의 거짓 양성률
pub const DEFAULT_FILTER_FPR: f64 = 1e-8;

/// 리로드를 위해 기억하는 필터 파일 출처
struct FilterSource {
    path: PathBuf,
    compressed: bool,
}

/// Bloom 스크리닝 핸들러
///
/// 합성된 알림은 데이터베이스 채널(백프레셔 시 블로킹이 의도된 흐름
/// 제어)로 먼저 전송된 뒤 전달 핸들러에 넘어갑니다.
pub struct BloomHandler {
    /// 교체 가능한 인디케이터 필터. 스크리닝 한 건 전체 동안 잠급니다.
    state: Mutex<BloomFilter>,
    /// 알림 발생을 억제할 인디케이터 집합 (생성 이후 불변)
    blocklist: HashSet<String>,
    database_tx: mpsc::Sender<EveEvent>,
    forward: Arc<dyn Handler>,
    do_forward_alert: bool,
    alert_prefix: String,
    source: Option<FilterSource>,
}

impl BloomHandler {
    /// 이미 로드된 필터로 핸들러를 생성합니다.
    ///
    /// `do_forward_alert`는 전달 정책에서 유도됩니다: 전체 전달이
    /// 켜져 있거나 alert 타입이 허용 목록에 있으면 참입니다.
    pub fn new(
        filter: BloomFilter,
        database_tx: mpsc::Sender<EveEvent>,
        forward: Arc<dyn Handler>,
        forward_policy: &ForwardConfig,
        alert_prefix: impl Into<String>,
    ) -> Self {
        tracing::info!(n = filter.len(), "bloom filter loaded");
        Self {
            state: Mutex::new(filter),
            blocklist: HashSet::new(),
            database_tx,
            forward,
            do_forward_alert: forward_policy.allows(EVENT_TYPE_ALERT),
            alert_prefix: alert_prefix.into(),
            source: None,
        }
    }

    /// 파일에서 필터를 로드하여 핸들러를 생성합니다.
    ///
    /// 빈 파일이거나 해시 함수 수가 비정상인 파일은 용량
    /// [`DEFAULT_FILTER_CAPACITY`], 거짓 양성률
    /// [`DEFAULT_FILTER_FPR`]의 빈 기본 필터로 대체하고 경고만
    /// 남깁니다. 블록리스트 항목이 필터에 존재하면 경고를 남깁니다.
    pub fn from_file(
        config: &BloomConfig,
        forward_policy: &ForwardConfig,
        database_tx: mpsc::Sender<EveEvent>,
        forward: Arc<dyn Handler>,
    ) -> Result<Self, EvetapError> {
        config.validate()?;
        tracing::info!(path = %config.filter_path, "loading bloom filter");

        let filter = load_or_default(config.filter_path.as_ref(), config.compressed)
            .map_err(EvetapError::from)?;

        let mut handler = Self::new(
            filter,
            database_tx,
            forward,
            forward_policy,
            config.alert_prefix.clone(),
        );
        for ioc in &config.blocklist {
            if handler.state.get_mut().check(ioc.as_bytes()) {
                tracing::warn!(indicator = %ioc, "filter contains blocked indicator");
            }
            handler.blocklist.insert(ioc.clone());
        }
        handler.source = Some(FilterSource {
            path: PathBuf::from(&config.filter_path),
            compressed: config.compressed,
        });
        tracing::info!(path = %config.filter_path, "filter loaded successfully");
        Ok(handler)
    }

    /// 필터 파일을 다시 읽어 현재 필터를 원자적으로 교체합니다.
    ///
    /// 생성 시와 같은 빈-기본 대체 규칙이 적용됩니다. 교체 후
    /// 블록리스트를 다시 스캔하여 "blocked-but-present" 경고를
    /// 남깁니다.
    ///
    /// # Errors
    /// 파일 없이 생성된 핸들러에는 [`ProcessingError::NoFilterFile`]을
    /// 반환합니다.
    pub async fn reload(&self) -> Result<(), ProcessingError> {
        let source = self.source.as_ref().ok_or(ProcessingError::NoFilterFile)?;
        let filter = load_or_default(&source.path, source.compressed)?;
        let n = filter.len();

        {
            let mut state = self.state.lock().await;
            *state = filter;
            for ioc in &self.blocklist {
                if state.check(ioc.as_bytes()) {
                    tracing::warn!(indicator = %ioc, "filter contains blocked indicator");
                }
            }
        }

        metrics::counter!(BLOOM_RELOADS_TOTAL).increment(1);
        tracing::info!(n, "bloom filter reloaded");
        Ok(())
    }

    /// 현재 필터의 공칭 원소 수를 반환합니다.
    pub async fn filter_len(&self) -> u64 {
        self.state.lock().await.len()
    }

    /// 알림을 내보냅니다: 데이터베이스 채널 전송 후 전달 핸들러 호출.
    ///
    /// 전달 핸들러의 실패는 로컬 실패일 뿐이므로 경고만 남깁니다
    /// (fire-and-forget 계약).
    async fn emit(&self, event: &EveEvent, kind: HitKind, ioc: &str) -> Result<(), EvetapError> {
        let mut alert = make_alert_for_hit(event, kind, &self.alert_prefix, ioc);
        metrics::counter!(BLOOM_ALERTS_TOTAL, LABEL_HIT_KIND => kind.as_str()).increment(1);

        self.database_tx
            .send(alert.clone())
            .await
            .map_err(|e| EvetapError::Pipeline(PipelineError::ChannelSend(e.to_string())))?;

        if self.do_forward_alert
            && let Err(e) = self.forward.consume(&mut alert).await
        {
            tracing::warn!(error = %e, "failed to forward synthesized alert");
        }
        Ok(())
    }

    async fn screen_http(&self, event: &EveEvent) -> Result<(), EvetapError> {
        let state = self.state.lock().await;

        // 호스트 먼저 검사: foo.bar.example
        if state.check(event.http_host.as_bytes()) && !self.blocklist.contains(&event.http_host) {
            self.emit(event, HitKind::HttpHost, &event.http_host).await?;
        }

        // 프록시 경유 관찰에서는 URL 필드가 이미 완전한 URL인 경우가
        // 있으므로 그대로 사용하고, 그 외에는 구성 요소로 조립합니다.
        let full_url = if event.http_url.contains("://") {
            event.http_url.clone()
        } else {
            format!("http://{}{}", event.http_host, event.http_url)
        };

        let parsed = match Url::parse(&full_url) {
            Ok(parsed) => parsed,
            Err(e) => {
                tracing::warn!(url = %full_url, error = %e, "could not parse URL");
                return Ok(());
            }
        };

        let host_port = match (parsed.host_str(), parsed.port()) {
            (Some(host), Some(port)) => format!("{host}:{port}"),
            (Some(host), None) => host.to_owned(),
            (None, _) => String::new(),
        };
        let host_path = format!("{}{}", host_port, parsed.path());
        let path = parsed.path();

        // 우선순위 캐스케이드: 히트가 나면 (억제 여부와 무관하게) 거기서
        // 멈추고, 미스일 때만 다음 단계로 내려갑니다.
        // http://foo.bar.example:123/baz
        if state.check(full_url.as_bytes()) {
            if !self.blocklist.contains(&full_url) {
                self.emit(event, HitKind::HttpUrl, &full_url).await?;
            }
        }
        // foo.bar.example:123/baz
        else if state.check(host_path.as_bytes()) {
            if !self.blocklist.contains(&host_path) {
                self.emit(event, HitKind::HttpUrl, &host_path).await?;
            }
        }
        // /baz
        else if state.check(path.as_bytes()) && !self.blocklist.contains(path) {
            self.emit(event, HitKind::HttpUrl, path).await?;
        }

        Ok(())
    }

    async fn screen_dns(&self, event: &EveEvent) -> Result<(), EvetapError> {
        let state = self.state.lock().await;
        if state.check(event.dns_rrname.as_bytes()) && !self.blocklist.contains(&event.dns_rrname) {
            let kind = match event.dns_type.as_str() {
                DNS_TYPE_QUERY => HitKind::DnsRequest,
                DNS_TYPE_ANSWER => HitKind::DnsResponse,
                other => {
                    tracing::warn!(dns_type = %other, "invalid DNS type");
                    return Ok(());
                }
            };
            self.emit(event, kind, &event.dns_rrname).await?;
        }
        Ok(())
    }

    async fn screen_tls(&self, event: &EveEvent) -> Result<(), EvetapError> {
        let state = self.state.lock().await;
        if state.check(event.tls_sni.as_bytes()) && !self.blocklist.contains(&event.tls_sni) {
            self.emit(event, HitKind::TlsSni, &event.tls_sni).await?;
        }
        Ok(())
    }
}

impl Handler for BloomHandler {
    fn name(&self) -> &'static str {
        "bloom"
    }

    fn event_types(&self) -> Vec<String> {
        vec![
            EVENT_TYPE_HTTP.to_owned(),
            EVENT_TYPE_DNS.to_owned(),
            EVENT_TYPE_TLS.to_owned(),
        ]
    }

    fn consume<'a>(&'a self, event: &'a mut EveEvent) -> BoxFuture<'a, Result<(), EvetapError>> {
        Box::pin(async move {
            match event.event_type.as_str() {
                EVENT_TYPE_HTTP => self.screen_http(event).await,
                EVENT_TYPE_DNS => self.screen_dns(event).await,
                EVENT_TYPE_TLS => self.screen_tls(event).await,
                _ => Ok(()),
            }
        })
    }
}

/// 필터를 로드하되, 빈 파일과 비정상 해시 함수 수는 빈 기본 필터로
/// 대체합니다.
fn load_or_default(
    path: &std::path::Path,
    compressed: bool,
) -> Result<BloomFilter, ProcessingError> {
    match load_filter(path, compressed) {
        Ok(filter) => Ok(filter),
        Err(FilterError::UnexpectedEof) => {
            tracing::warn!("filter file is empty, using empty default one");
            Ok(default_filter())
        }
        Err(e @ FilterError::TooManyHashFunctions { .. }) => {
            tracing::warn!(error = %e, "malformed bloom filter file, using empty default one");
            Ok(default_filter())
        }
        Err(e) => Err(e.into()),
    }
}

fn default_filter() -> BloomFilter {
    BloomFilter::with_fpr(DEFAULT_FILTER_CAPACITY, DEFAULT_FILTER_FPR)
}
